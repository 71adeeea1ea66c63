#![allow(dead_code)]

use async_trait::async_trait;
use base64::{engine::general_purpose::STANDARD, Engine as _};
use chrono::NaiveDate;
use rust_decimal::Decimal;
use sqlx::{
    sqlite::{SqliteConnectOptions, SqlitePoolOptions},
    SqlitePool,
};
use std::{
    path::PathBuf,
    sync::{
        atomic::{AtomicBool, AtomicUsize, Ordering},
        Arc, Mutex,
    },
    time::Duration,
};

use clubledger::{
    auth::AuthService,
    config::{BillingConfig, Settings},
    domain::{CreatePayerRequest, NewTransaction, Payer, Transaction},
    error::{AppError, Result as AppResult},
    notifications::{NotificationChannel, NotificationDispatcher, NotificationEvent},
    payments::{
        phonepe::callback_checksum, GatewayError, GatewayReport, GatewayState, PayRequest, PayResponse,
        PaymentGateway, PaymentSessionManager,
    },
    service::ServiceContext,
};

pub const SALT_KEY: &str = "test-salt-key";
pub const SALT_INDEX: &str = "1";

/// One connection, kept alive, so every query sees the same in-memory
/// database.
pub async fn test_pool() -> SqlitePool {
    let pool = SqlitePoolOptions::new()
        .max_connections(1)
        .idle_timeout(None)
        .max_lifetime(None)
        .connect("sqlite::memory:")
        .await
        .expect("in-memory database");

    sqlx::migrate!("./migrations")
        .run(&pool)
        .await
        .expect("migrations");

    pool
}

/// A throwaway on-disk database behind several connections, for tests
/// where writers must actually contend.
pub async fn file_pool() -> (SqlitePool, PathBuf) {
    let path = std::env::temp_dir().join(format!("clubledger-test-{}.db", uuid::Uuid::new_v4()));
    let options = SqliteConnectOptions::new()
        .filename(&path)
        .create_if_missing(true)
        .busy_timeout(Duration::from_secs(10));

    let pool = SqlitePoolOptions::new()
        .max_connections(8)
        .connect_with(options)
        .await
        .expect("file database");

    sqlx::migrate!("./migrations")
        .run(&pool)
        .await
        .expect("migrations");

    (pool, path)
}

/// Records every event it is handed. In failing mode it still records the
/// attempt, then reports an error.
#[derive(Default)]
pub struct RecordingChannel {
    events: Mutex<Vec<NotificationEvent>>,
    failing: AtomicBool,
}

impl RecordingChannel {
    pub fn failing() -> Self {
        let channel = Self::default();
        channel.failing.store(true, Ordering::SeqCst);
        channel
    }

    pub fn payments_received(&self) -> Vec<Transaction> {
        self.events
            .lock()
            .unwrap()
            .iter()
            .filter_map(|event| match event {
                NotificationEvent::PaymentReceived { transaction, .. } => Some(transaction.clone()),
                _ => None,
            })
            .collect()
    }

    pub fn onboarded(&self) -> Vec<Payer> {
        self.events
            .lock()
            .unwrap()
            .iter()
            .filter_map(|event| match event {
                NotificationEvent::PayerOnboarded(payer) => Some(payer.clone()),
                _ => None,
            })
            .collect()
    }
}

#[async_trait]
impl NotificationChannel for RecordingChannel {
    fn name(&self) -> &str {
        "recording"
    }

    fn is_enabled(&self) -> bool {
        true
    }

    async fn health_check(&self) -> AppResult<()> {
        Ok(())
    }

    async fn send(&self, event: &NotificationEvent) -> AppResult<()> {
        self.events.lock().unwrap().push(event.clone());
        if self.failing.load(Ordering::SeqCst) {
            return Err(AppError::ServiceUnavailable("channel down".to_string()));
        }
        Ok(())
    }
}

/// In-process stand-in for the payment gateway. Callbacks are checked
/// with the real checksum scheme.
pub struct FakeGateway {
    pub initiations: Mutex<Vec<PayRequest>>,
    pub status_calls: AtomicUsize,
    pub delay: Mutex<Option<Duration>>,
    pub fail_with: Mutex<Option<String>>,
    pub status_report: Mutex<Option<GatewayReport>>,
}

impl FakeGateway {
    pub fn new() -> Self {
        Self {
            initiations: Mutex::new(Vec::new()),
            status_calls: AtomicUsize::new(0),
            delay: Mutex::new(None),
            fail_with: Mutex::new(None),
            status_report: Mutex::new(None),
        }
    }

    pub fn initiation_count(&self) -> usize {
        self.initiations.lock().unwrap().len()
    }
}

#[async_trait]
impl PaymentGateway for FakeGateway {
    async fn initiate(&self, request: PayRequest) -> Result<PayResponse, GatewayError> {
        let delay = *self.delay.lock().unwrap();
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }

        let failure = self.fail_with.lock().unwrap().clone();
        let redirect_url = format!("https://gateway.test/pay/{}", request.merchant_order_id);
        self.initiations.lock().unwrap().push(request);

        match failure {
            Some(message) => Err(GatewayError::Rejected {
                code: "BAD_REQUEST".to_string(),
                message,
            }),
            None => Ok(PayResponse { redirect_url }),
        }
    }

    async fn order_status(&self, merchant_order_id: &str) -> Result<GatewayReport, GatewayError> {
        self.status_calls.fetch_add(1, Ordering::SeqCst);
        self.status_report
            .lock()
            .unwrap()
            .clone()
            .ok_or_else(|| GatewayError::Transport(format!("no status for {}", merchant_order_id)))
    }

    fn verify_callback(&self, payload: &str, checksum: &str) -> bool {
        callback_checksum(payload, SALT_KEY, SALT_INDEX) == checksum
    }
}

pub struct TestContext {
    pub pool: SqlitePool,
    pub ctx: Arc<ServiceContext>,
    pub channel: Arc<RecordingChannel>,
    pub gateway: Arc<FakeGateway>,
    pub payments: Arc<PaymentSessionManager>,
    db_path: Option<PathBuf>,
}

impl Drop for TestContext {
    fn drop(&mut self) {
        if let Some(path) = self.db_path.take() {
            for suffix in ["", "-wal", "-shm"] {
                let mut file = path.clone().into_os_string();
                file.push(suffix);
                let _ = std::fs::remove_file(file);
            }
        }
    }
}

pub async fn setup() -> TestContext {
    setup_with_channel(RecordingChannel::default()).await
}

pub async fn setup_with_channel(channel: RecordingChannel) -> TestContext {
    setup_on(test_pool().await, channel, None).await
}

pub async fn setup_file_backed() -> TestContext {
    let (pool, path) = file_pool().await;
    setup_on(pool, RecordingChannel::default(), Some(path)).await
}

async fn setup_on(pool: SqlitePool, channel: RecordingChannel, db_path: Option<PathBuf>) -> TestContext {
    let channel = Arc::new(channel);

    let notifier = Arc::new(NotificationDispatcher::new());
    notifier.register(channel.clone()).await;

    let auth_service = Arc::new(AuthService::new(pool.clone(), 24));
    let ctx = Arc::new(ServiceContext::new(
        pool.clone(),
        notifier,
        auth_service,
        &BillingConfig::default(),
    ));

    let gateway = Arc::new(FakeGateway::new());
    let payments = Arc::new(PaymentSessionManager::new(
        ctx.ledger.clone(),
        gateway.clone(),
        Duration::from_millis(200),
    ));

    TestContext {
        pool,
        ctx,
        channel,
        gateway,
        payments,
        db_path,
    }
}

pub fn test_settings() -> Settings {
    Settings::default()
}

pub fn date(y: i32, m: u32, d: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(y, m, d).unwrap()
}

pub fn payer_request(first_name: &str, phone_number: &str) -> CreatePayerRequest {
    CreatePayerRequest {
        first_name: first_name.to_string(),
        last_name: "Tester".to_string(),
        phone_number: Some(phone_number.to_string()),
        password: None,
        is_admin: false,
        monthly_rate: None,
    }
}

pub async fn onboard(ctx: &ServiceContext, first_name: &str, phone_number: &str) -> Payer {
    ctx.payer_service
        .onboard(payer_request(first_name, phone_number))
        .await
        .expect("onboard payer")
}

/// Writes an entry straight through the ledger.
pub async fn insert(ctx: &ServiceContext, new: NewTransaction) -> Transaction {
    let mut tx = ctx.ledger.begin().await.expect("begin");
    let transaction = tx.insert_transaction(new).await.expect("insert transaction");
    tx.commit().await.expect("commit");
    transaction
}

pub async fn unpaid_fee(ctx: &ServiceContext, payer: &Payer, amount: Decimal) -> Transaction {
    insert(
        ctx,
        NewTransaction::unpaid(
            payer.id,
            clubledger::domain::TransactionCategory::Tournament,
            amount,
            clubledger::domain::today(),
        ),
    )
    .await
}

/// A gateway callback body as the gateway would send it: base64 JSON plus
/// its checksum.
pub fn signed_callback(merchant_order_id: &str, code: &str, state: &str, amount_paise: i64) -> (String, String) {
    let body = serde_json::json!({
        "success": code == "PAYMENT_SUCCESS",
        "code": code,
        "message": "callback",
        "data": {
            "merchantId": "CLUBMID",
            "merchantTransactionId": merchant_order_id,
            "transactionId": "T2406150001",
            "amount": amount_paise,
            "state": state,
        }
    });
    let payload = STANDARD.encode(body.to_string());
    let checksum = callback_checksum(&payload, SALT_KEY, SALT_INDEX);
    (payload, checksum)
}

pub fn completed_report(merchant_order_id: &str) -> GatewayReport {
    GatewayReport {
        merchant_order_id: merchant_order_id.to_string(),
        state: GatewayState::Completed,
        code: "PAYMENT_SUCCESS".to_string(),
        gateway_transaction_id: Some("T2406150001".to_string()),
        amount_paise: None,
    }
}

pub async fn transaction(ctx: &ServiceContext, id: i64) -> Transaction {
    ctx.ledger
        .find_transaction(id)
        .await
        .expect("load transaction")
        .expect("transaction exists")
}

pub async fn count_transactions(pool: &SqlitePool) -> i64 {
    sqlx::query_scalar::<_, i64>("SELECT COUNT(*) FROM transactions")
        .fetch_one(pool)
        .await
        .expect("count transactions")
}

pub async fn registration_count(pool: &SqlitePool, payer: &Payer) -> i64 {
    sqlx::query_scalar::<_, i64>(
        "SELECT COUNT(*) FROM transactions WHERE payer_id = ? AND category = 'registration'",
    )
    .bind(payer.id.to_string())
    .fetch_one(pool)
    .await
    .expect("count registrations")
}

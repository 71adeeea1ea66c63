pub mod payer_service;
pub mod tournament_service;
pub mod inventory_service;

use std::sync::Arc;
use sqlx::SqlitePool;
use crate::repository::*;
use crate::auth::AuthService;
use crate::billing::BillingService;
use crate::config::BillingConfig;
use crate::fees::FeeSchedule;
use crate::ledger::LedgerStore;
use crate::notifications::NotificationDispatcher;
use payer_service::PayerService;
use tournament_service::TournamentService;
use inventory_service::InventoryService;

pub struct ServiceContext {
    pub payer_repo: Arc<dyn PayerRepository>,
    pub transaction_repo: Arc<dyn TransactionRepository>,
    pub tournament_repo: Arc<dyn TournamentRepository>,
    pub inventory_repo: Arc<dyn InventoryRepository>,
    pub notifier: Arc<NotificationDispatcher>,
    pub auth_service: Arc<AuthService>,
    pub ledger: Arc<LedgerStore>,
    pub billing_service: Arc<BillingService>,
    pub payer_service: Arc<PayerService>,
    pub tournament_service: Arc<TournamentService>,
    pub inventory_service: Arc<InventoryService>,
    pub db_pool: SqlitePool,
}

impl ServiceContext {
    pub fn new(
        db_pool: SqlitePool,
        notifier: Arc<NotificationDispatcher>,
        auth_service: Arc<AuthService>,
        billing: &BillingConfig,
    ) -> Self {
        let payer_repo: Arc<dyn PayerRepository> = Arc::new(SqlitePayerRepository::new(db_pool.clone()));
        let transaction_repo = Arc::new(SqliteTransactionRepository::new(db_pool.clone()));
        let tournament_repo: Arc<dyn TournamentRepository> =
            Arc::new(SqliteTournamentRepository::new(db_pool.clone()));
        let inventory_repo: Arc<dyn InventoryRepository> =
            Arc::new(SqliteInventoryRepository::new(db_pool.clone()));

        let ledger = Arc::new(LedgerStore::new(
            db_pool.clone(),
            payer_repo.clone(),
            notifier.clone(),
            billing.grace_days,
        ));
        let schedule = FeeSchedule::from(billing);

        let billing_service = Arc::new(BillingService::new(ledger.clone()));
        let payer_service = Arc::new(PayerService::new(
            ledger.clone(),
            payer_repo.clone(),
            notifier.clone(),
            schedule.clone(),
            billing.default_monthly_rate,
        ));
        let tournament_service = Arc::new(TournamentService::new(
            ledger.clone(),
            tournament_repo.clone(),
            schedule.clone(),
        ));
        let inventory_service = Arc::new(InventoryService::new(
            ledger.clone(),
            inventory_repo.clone(),
            schedule,
        ));

        Self {
            payer_repo,
            transaction_repo,
            tournament_repo,
            inventory_repo,
            notifier,
            auth_service,
            ledger,
            billing_service,
            payer_service,
            tournament_service,
            inventory_service,
            db_pool,
        }
    }
}

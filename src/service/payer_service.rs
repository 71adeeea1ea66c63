use rust_decimal::Decimal;
use serde::Serialize;
use std::sync::Arc;
use uuid::Uuid;
use validator::Validate;

use crate::{
    auth::AuthService,
    domain::{self, CreatePayerRequest, Membership, Payer, Subscription, UpdatePayerRequest},
    error::{AppError, Result},
    fees::{self, DomainEvent, FeeSchedule},
    ledger::LedgerStore,
    notifications::{NotificationDispatcher, NotificationEvent},
    repository::{PayerRepository, SqlitePayerRepository},
};

#[derive(Debug, Clone, Serialize)]
pub struct PayerProfile {
    #[serde(flatten)]
    pub payer: Payer,
    pub membership: Option<Membership>,
    pub subscription: Option<Subscription>,
    pub membership_active: bool,
}

pub struct PayerService {
    ledger: Arc<LedgerStore>,
    repo: Arc<dyn PayerRepository>,
    notifier: Arc<NotificationDispatcher>,
    schedule: FeeSchedule,
    default_monthly_rate: Decimal,
}

impl PayerService {
    pub fn new(
        ledger: Arc<LedgerStore>,
        repo: Arc<dyn PayerRepository>,
        notifier: Arc<NotificationDispatcher>,
        schedule: FeeSchedule,
        default_monthly_rate: Decimal,
    ) -> Self {
        Self {
            ledger,
            repo,
            notifier,
            schedule,
            default_monthly_rate,
        }
    }

    /// Creates a payer with membership and subscription records and the
    /// admission fee, all in one unit.
    pub async fn onboard(&self, request: CreatePayerRequest) -> Result<Payer> {
        request.validate()?;

        if let Some(phone_number) = &request.phone_number {
            if self.repo.find_by_phone(phone_number).await?.is_some() {
                return Err(AppError::Conflict("Phone number already registered".to_string()));
            }
        }

        let monthly_rate = request.monthly_rate.unwrap_or(self.default_monthly_rate);
        if monthly_rate < Decimal::ZERO {
            return Err(AppError::Validation("Monthly rate cannot be negative".to_string()));
        }

        let password_hash = match &request.password {
            Some(password) => Some(AuthService::hash_password(password).await?),
            None => None,
        };

        let today = domain::today();
        let mut tx = self.ledger.begin().await?;

        let payer = SqlitePayerRepository::insert(tx.conn(), &request, password_hash).await?;
        SqlitePayerRepository::insert_membership(tx.conn(), payer.id, today).await?;
        SqlitePayerRepository::insert_subscription(tx.conn(), payer.id, monthly_rate, today).await?;
        fees::apply(&mut tx, &DomainEvent::PayerCreated { payer: &payer, on: today }, &self.schedule).await?;

        tx.commit().await?;

        tracing::info!("Onboarded payer {} ({})", payer.id, payer.full_name());

        self.notifier
            .dispatch(NotificationEvent::PayerOnboarded(payer.clone()))
            .await;

        Ok(payer)
    }

    /// Profile edits never touch the ledger.
    pub async fn update(&self, id: Uuid, request: UpdatePayerRequest) -> Result<Payer> {
        request.validate()?;

        if self.repo.find_by_id(id).await?.is_none() {
            return Err(AppError::NotFound("Payer not found".to_string()));
        }

        self.repo.update(id, request).await
    }

    pub async fn profile(&self, payer: Payer) -> Result<PayerProfile> {
        let membership = self.repo.membership(payer.id).await?;
        let subscription = self.repo.subscription(payer.id).await?;
        let membership_active = self.ledger.membership_active(payer.id, domain::today()).await?;

        Ok(PayerProfile {
            payer,
            membership,
            subscription,
            membership_active,
        })
    }
}

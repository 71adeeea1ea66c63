use chrono::NaiveDate;
use rust_decimal::Decimal;
use serde::Serialize;
use std::sync::Arc;
use uuid::Uuid;

use crate::{
    domain::{self, BillingPeriod, NewTransaction, Payer, Transaction, TransactionCategory},
    error::{AppError, Result},
    ledger::{membership_active_in, LedgerStore},
    repository::{SqlitePayerRepository, SqliteTransactionRepository},
};

#[derive(Debug, Clone, Serialize)]
pub struct BillingResult {
    pub billing_date: NaiveDate,
    pub created_invoices: Vec<Transaction>,
    pub billable_payers: usize,
    pub skipped_existing: usize,
}

impl BillingResult {
    pub fn created_count(&self) -> usize {
        self.created_invoices.len()
    }
}

/// Bills every payer with an active membership and a usable monthly rate,
/// at most once per calendar month. A run commits as one unit.
pub struct BillingService {
    ledger: Arc<LedgerStore>,
}

impl BillingService {
    pub fn new(ledger: Arc<LedgerStore>) -> Self {
        Self { ledger }
    }

    /// Bills `payer_ids` (or every payer) for the month containing
    /// `billing_date` (default: today).
    pub async fn generate_monthly_invoices(
        &self,
        billing_date: Option<NaiveDate>,
        payer_ids: Option<&[Uuid]>,
    ) -> Result<BillingResult> {
        let billing_date = billing_date.unwrap_or_else(domain::today);
        let mut tx = self.ledger.begin().await?;

        let payers: Vec<Payer> = match payer_ids {
            Some(ids) => {
                let mut payers = Vec::with_capacity(ids.len());
                for id in ids {
                    let payer = SqlitePayerRepository::find_in(tx.conn(), *id)
                        .await?
                        .ok_or_else(|| AppError::NotFound(format!("Payer {} not found", id)))?;
                    payers.push(payer);
                }
                payers
            }
            None => SqlitePayerRepository::list_all_in(tx.conn()).await?,
        };

        let mut created_invoices = Vec::new();
        let mut billable_payers = 0;
        let mut skipped_existing = 0;

        for payer in &payers {
            let grace_days = tx.grace_days();
            if !membership_active_in(tx.conn(), payer.id, billing_date, grace_days).await? {
                tracing::debug!("Payer {} has an overdue monthly fee; not billed", payer.id);
                continue;
            }

            let rate = SqlitePayerRepository::subscription_in(tx.conn(), payer.id)
                .await?
                .and_then(|subscription| subscription.monthly_rate);
            let Some(rate) = rate.filter(|rate| *rate >= Decimal::ZERO) else {
                tracing::debug!("Payer {} has no usable monthly rate; not billed", payer.id);
                continue;
            };

            billable_payers += 1;

            let period = BillingPeriod::of(payer.id, billing_date);
            if SqliteTransactionRepository::exists_for_period(tx.conn(), &period).await? {
                skipped_existing += 1;
                continue;
            }

            let invoice = NewTransaction::unpaid(payer.id, TransactionCategory::Monthly, rate, billing_date);
            match tx.insert_transaction(invoice).await {
                Ok(transaction) => created_invoices.push(transaction),
                // another writer billed this period first
                Err(AppError::Conflict(_)) => skipped_existing += 1,
                Err(e) => return Err(e),
            }
        }

        tx.commit().await?;

        tracing::info!(
            "Monthly billing for {}: {} created, {} billable, {} already invoiced",
            billing_date,
            created_invoices.len(),
            billable_payers,
            skipped_existing
        );

        Ok(BillingResult {
            billing_date,
            created_invoices,
            billable_payers,
            skipped_existing,
        })
    }
}

/// Re-runs monthly billing on a fixed interval. Runs are idempotent, so
/// repeated runs within a month only bill payers added since.
pub fn spawn_scheduled(service: Arc<BillingService>, every: std::time::Duration) -> tokio::task::JoinHandle<()> {
    tokio::spawn(async move {
        let mut interval = tokio::time::interval(every);
        loop {
            interval.tick().await;
            if let Err(e) = service.generate_monthly_invoices(None, None).await {
                tracing::error!("Scheduled monthly billing failed: {}", e);
            }
        }
    })
}

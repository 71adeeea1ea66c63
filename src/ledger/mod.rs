use chrono::{Duration, NaiveDate};
use rust_decimal::Decimal;
use sqlx::{Sqlite, SqliteConnection, SqlitePool};
use std::sync::Arc;
use uuid::Uuid;

use crate::{
    domain::{self, NewTransaction, Transaction, TransactionUpdate},
    error::{AppError, Result},
    notifications::{NotificationDispatcher, NotificationEvent},
    repository::{PayerRepository, SqliteTransactionRepository},
};

/// Outcome of an UNPAID -> PAID request.
#[derive(Debug, Clone, PartialEq)]
pub enum Settlement {
    /// This call performed the transition.
    Settled(Transaction),
    /// The entry was already paid; nothing changed.
    AlreadyPaid(Transaction),
}

impl Settlement {
    pub fn transaction(&self) -> &Transaction {
        match self {
            Settlement::Settled(t) | Settlement::AlreadyPaid(t) => t,
        }
    }

    pub fn newly_settled(&self) -> bool {
        matches!(self, Settlement::Settled(_))
    }
}

/// The only writer of `transactions`. Every write goes through a
/// [`LedgerTx`]; callers never notify on their own.
pub struct LedgerStore {
    pool: SqlitePool,
    payer_repo: Arc<dyn PayerRepository>,
    notifier: Arc<NotificationDispatcher>,
    grace_days: i64,
}

impl LedgerStore {
    pub fn new(
        pool: SqlitePool,
        payer_repo: Arc<dyn PayerRepository>,
        notifier: Arc<NotificationDispatcher>,
        grace_days: i64,
    ) -> Self {
        Self {
            pool,
            payer_repo,
            notifier,
            grace_days,
        }
    }

    /// Opens a unit of work holding the database write lock from its first
    /// statement, so concurrent writers wait on the busy timeout instead of
    /// failing to upgrade a read lock.
    pub async fn begin(&self) -> Result<LedgerTx<'_>> {
        let mut tx = self.pool.begin().await?;

        // A write that matches no rows, equivalent to BEGIN IMMEDIATE.
        sqlx::query("UPDATE transactions SET paid = paid WHERE 0")
            .execute(&mut *tx)
            .await?;

        Ok(LedgerTx {
            tx,
            paid_edges: Vec::new(),
            store: self,
        })
    }

    pub fn grace_days(&self) -> i64 {
        self.grace_days
    }

    pub async fn find_transaction(&self, id: i64) -> Result<Option<Transaction>> {
        let mut conn = self.pool.acquire().await?;
        SqliteTransactionRepository::find_in(&mut conn, id).await
    }

    /// Derived membership state as of `as_of`; see [`membership_active_in`].
    pub async fn membership_active(&self, payer_id: Uuid, as_of: NaiveDate) -> Result<bool> {
        let mut conn = self.pool.acquire().await?;
        membership_active_in(&mut conn, payer_id, as_of, self.grace_days).await
    }

    async fn notify_paid(&self, transaction: Transaction) {
        match self.payer_repo.find_by_id(transaction.payer_id).await {
            Ok(Some(payer)) => {
                self.notifier
                    .dispatch(NotificationEvent::PaymentReceived { payer, transaction })
                    .await;
            }
            Ok(None) => {
                tracing::warn!(
                    "Transaction {} was paid but payer {} no longer exists; notification skipped",
                    transaction.id,
                    transaction.payer_id
                );
            }
            Err(e) => {
                tracing::error!(
                    "Could not load payer {} to notify about transaction {}: {}",
                    transaction.payer_id,
                    transaction.id,
                    e
                );
            }
        }
    }
}

/// A membership is active unless a monthly invoice has stayed unpaid for
/// more than `grace_days` before `as_of`.
pub async fn membership_active_in(
    conn: &mut SqliteConnection,
    payer_id: Uuid,
    as_of: NaiveDate,
    grace_days: i64,
) -> Result<bool> {
    let cutoff = as_of - Duration::days(grace_days);
    let overdue = SqliteTransactionRepository::has_unpaid_monthly_before(conn, payer_id, cutoff).await?;
    Ok(!overdue)
}

/// One database transaction over the ledger. Entries that turn from unpaid
/// into paid are remembered and each gets exactly one `PaymentReceived`
/// notification once the transaction commits. Dropping it without
/// committing rolls back and notifies nobody.
pub struct LedgerTx<'a> {
    tx: sqlx::Transaction<'static, Sqlite>,
    paid_edges: Vec<Transaction>,
    store: &'a LedgerStore,
}

impl<'a> LedgerTx<'a> {
    /// The underlying connection, for domain writes that must commit
    /// together with their ledger entries.
    pub fn conn(&mut self) -> &mut SqliteConnection {
        &mut *self.tx
    }

    pub fn grace_days(&self) -> i64 {
        self.store.grace_days
    }

    pub async fn insert_transaction(&mut self, new: NewTransaction) -> Result<Transaction> {
        if new.amount < Decimal::ZERO {
            return Err(AppError::Validation("Transaction amount cannot be negative".to_string()));
        }

        let transaction = SqliteTransactionRepository::insert(&mut *self.tx, &new).await?;

        tracing::info!(
            "Ledger entry {} created: {} {} for payer {} due {}{}",
            transaction.id,
            transaction.category.as_str(),
            transaction.amount,
            transaction.payer_id,
            transaction.due_date,
            if transaction.paid { " (settled)" } else { "" }
        );

        if transaction.paid {
            self.paid_edges.push(transaction.clone());
        }

        Ok(transaction)
    }

    pub async fn find_transaction(&mut self, id: i64) -> Result<Option<Transaction>> {
        SqliteTransactionRepository::find_in(&mut *self.tx, id).await
    }

    /// Settles an entry. Concurrent callers race on a compare-and-set, so
    /// exactly one of them observes [`Settlement::Settled`].
    pub async fn mark_paid(&mut self, id: i64, payment_date: NaiveDate) -> Result<Settlement> {
        let flipped =
            SqliteTransactionRepository::mark_paid_if_unpaid(&mut *self.tx, id, payment_date).await?;

        let transaction = self
            .find_transaction(id)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("Transaction {} not found", id)))?;

        if flipped {
            tracing::info!("Transaction {} marked paid on {}", id, payment_date);
            self.paid_edges.push(transaction.clone());
            Ok(Settlement::Settled(transaction))
        } else if transaction.paid {
            Ok(Settlement::AlreadyPaid(transaction))
        } else {
            Err(AppError::Database(format!(
                "Transaction {} could not be marked paid",
                id
            )))
        }
    }

    /// Administrative correction. Amounts are immutable and PAID is terminal.
    pub async fn update_transaction(&mut self, id: i64, update: TransactionUpdate) -> Result<Transaction> {
        let previous = self
            .find_transaction(id)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("Transaction {} not found", id)))?;

        if previous.paid && update.paid == Some(false) {
            return Err(AppError::Conflict("Paid transactions cannot be marked unpaid".to_string()));
        }

        let will_be_paid = previous.paid || update.paid == Some(true);
        if update.payment_date.is_some() && !will_be_paid {
            return Err(AppError::BadRequest(
                "payment_date can only be set on a paid transaction".to_string(),
            ));
        }

        if let Some(due_date) = update.due_date {
            SqliteTransactionRepository::set_due_date(&mut *self.tx, id, due_date).await?;
        }

        if previous.paid {
            if let Some(payment_date) = update.payment_date {
                SqliteTransactionRepository::set_payment_date(&mut *self.tx, id, payment_date).await?;
            }
        } else if update.paid == Some(true) {
            let payment_date = update.payment_date.unwrap_or_else(domain::today);
            self.mark_paid(id, payment_date).await?;
        }

        self.find_transaction(id)
            .await?
            .ok_or_else(|| AppError::Database("Failed to retrieve updated transaction".to_string()))
    }

    /// Commits, then notifies once per entry that became paid in this unit.
    pub async fn commit(self) -> Result<()> {
        let LedgerTx { tx, paid_edges, store } = self;
        tx.commit().await?;

        for transaction in paid_edges {
            store.notify_paid(transaction).await;
        }

        Ok(())
    }

    pub async fn rollback(self) -> Result<()> {
        self.tx.rollback().await?;
        Ok(())
    }
}

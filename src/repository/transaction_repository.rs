use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, NaiveDateTime, Utc};
use sqlx::{FromRow, SqliteConnection, SqlitePool};
use uuid::Uuid;

use crate::{
    domain::{BillingPeriod, NewTransaction, Transaction, TransactionCategory},
    error::{AppError, Result},
    repository::{amount_to_text, parse_amount, parse_uuid, TransactionRepository},
};

#[derive(FromRow)]
struct TransactionRow {
    id: i64,
    payer_id: String,
    category: String,
    amount: String,
    due_date: NaiveDate,
    paid: bool,
    payment_date: Option<NaiveDate>,
    created_at: NaiveDateTime,
}

const SELECT_COLUMNS: &str = r#"
    SELECT id, payer_id, category, amount, due_date, paid, payment_date, created_at
    FROM transactions
"#;

/// Storage for the `transactions` table. Every write takes the caller's
/// connection so it can share a database transaction with the write that
/// caused it; see [`crate::ledger::LedgerTx`].
pub struct SqliteTransactionRepository {
    pool: SqlitePool,
}

impl SqliteTransactionRepository {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    fn row_to_transaction(row: TransactionRow) -> Result<Transaction> {
        Ok(Transaction {
            id: row.id,
            payer_id: parse_uuid(&row.payer_id)?,
            category: row.category.parse().map_err(AppError::Database)?,
            amount: parse_amount(&row.amount)?,
            due_date: row.due_date,
            paid: row.paid,
            payment_date: row.payment_date,
            created_at: DateTime::from_naive_utc_and_offset(row.created_at, Utc),
        })
    }

    pub async fn insert(conn: &mut SqliteConnection, new: &NewTransaction) -> Result<Transaction> {
        let now_naive = Utc::now().naive_utc();

        let result = sqlx::query(
            r#"
            INSERT INTO transactions (
                payer_id, category, amount, due_date, paid, payment_date, created_at
            ) VALUES (?, ?, ?, ?, ?, ?, ?)
            "#
        )
        .bind(new.payer_id.to_string())
        .bind(new.category.as_str())
        .bind(amount_to_text(&new.amount))
        .bind(new.due_date)
        .bind(new.is_paid())
        .bind(new.payment_date)
        .bind(now_naive)
        .execute(&mut *conn)
        .await?;

        let id = result.last_insert_rowid();
        Self::find_in(conn, id).await?.ok_or_else(|| {
            AppError::Database("Failed to retrieve created transaction".to_string())
        })
    }

    pub async fn find_in(conn: &mut SqliteConnection, id: i64) -> Result<Option<Transaction>> {
        let row = sqlx::query_as::<_, TransactionRow>(&format!("{} WHERE id = ?", SELECT_COLUMNS))
            .bind(id)
            .fetch_optional(&mut *conn)
            .await?;

        row.map(Self::row_to_transaction).transpose()
    }

    /// Whether a monthly invoice already exists for the billing period.
    pub async fn exists_for_period(conn: &mut SqliteConnection, period: &BillingPeriod) -> Result<bool> {
        let count = sqlx::query_scalar::<_, i64>(
            r#"
            SELECT COUNT(*) FROM transactions
            WHERE payer_id = ? AND category = ? AND substr(due_date, 1, 7) = ?
            "#
        )
        .bind(period.payer_id.to_string())
        .bind(TransactionCategory::Monthly.as_str())
        .bind(period.month_key())
        .fetch_one(&mut *conn)
        .await?;

        Ok(count > 0)
    }

    /// Whether the payer has an unpaid monthly invoice due strictly before `cutoff`.
    pub async fn has_unpaid_monthly_before(
        conn: &mut SqliteConnection,
        payer_id: Uuid,
        cutoff: NaiveDate,
    ) -> Result<bool> {
        let count = sqlx::query_scalar::<_, i64>(
            r#"
            SELECT COUNT(*) FROM transactions
            WHERE payer_id = ? AND category = ? AND paid = 0 AND due_date < ?
            "#
        )
        .bind(payer_id.to_string())
        .bind(TransactionCategory::Monthly.as_str())
        .bind(cutoff)
        .fetch_one(&mut *conn)
        .await?;

        Ok(count > 0)
    }

    /// Compare-and-set of the UNPAID -> PAID transition. Returns `true` only
    /// for the caller whose statement actually flipped the row.
    pub async fn mark_paid_if_unpaid(
        conn: &mut SqliteConnection,
        id: i64,
        payment_date: NaiveDate,
    ) -> Result<bool> {
        let result = sqlx::query(
            "UPDATE transactions SET paid = 1, payment_date = ? WHERE id = ? AND paid = 0"
        )
        .bind(payment_date)
        .bind(id)
        .execute(&mut *conn)
        .await?;

        Ok(result.rows_affected() == 1)
    }

    pub async fn set_due_date(conn: &mut SqliteConnection, id: i64, due_date: NaiveDate) -> Result<()> {
        sqlx::query("UPDATE transactions SET due_date = ? WHERE id = ?")
            .bind(due_date)
            .bind(id)
            .execute(&mut *conn)
            .await?;

        Ok(())
    }

    /// Corrects the payment date of an entry that is already paid.
    pub async fn set_payment_date(conn: &mut SqliteConnection, id: i64, payment_date: NaiveDate) -> Result<()> {
        sqlx::query("UPDATE transactions SET payment_date = ? WHERE id = ? AND paid = 1")
            .bind(payment_date)
            .bind(id)
            .execute(&mut *conn)
            .await?;

        Ok(())
    }
}

#[async_trait]
impl TransactionRepository for SqliteTransactionRepository {
    async fn find_by_id(&self, id: i64) -> Result<Option<Transaction>> {
        let mut conn = self.pool.acquire().await?;
        Self::find_in(&mut conn, id).await
    }

    async fn list_by_payer(&self, payer_id: Uuid) -> Result<Vec<Transaction>> {
        let rows = sqlx::query_as::<_, TransactionRow>(&format!(
            "{} WHERE payer_id = ? ORDER BY due_date DESC, id DESC",
            SELECT_COLUMNS
        ))
        .bind(payer_id.to_string())
        .fetch_all(&self.pool)
        .await?;

        rows.into_iter().map(Self::row_to_transaction).collect()
    }

    async fn list(&self, limit: i64, offset: i64) -> Result<Vec<Transaction>> {
        let rows = sqlx::query_as::<_, TransactionRow>(&format!(
            "{} ORDER BY id DESC LIMIT ? OFFSET ?",
            SELECT_COLUMNS
        ))
        .bind(limit)
        .bind(offset)
        .fetch_all(&self.pool)
        .await?;

        rows.into_iter().map(Self::row_to_transaction).collect()
    }
}

use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, NaiveDateTime, Utc};
use rust_decimal::Decimal;
use sqlx::{FromRow, SqliteConnection, SqlitePool};
use uuid::Uuid;

use crate::{
    domain::{CreatePayerRequest, Membership, MembershipStatus, Payer, Subscription, UpdatePayerRequest},
    error::{AppError, Result},
    repository::{amount_to_text, parse_uuid, PayerRepository},
};

// Database row struct that matches SQLite schema
#[derive(FromRow)]
pub(crate) struct PayerRow {
    id: String,
    first_name: String,
    last_name: String,
    phone_number: Option<String>,
    is_admin: bool,
    created_at: NaiveDateTime,
    updated_at: NaiveDateTime,
}

#[derive(FromRow)]
struct MembershipRow {
    payer_id: String,
    join_date: NaiveDate,
    status: String,
}

#[derive(FromRow)]
struct SubscriptionRow {
    payer_id: String,
    monthly_rate: Option<String>,
    start_date: NaiveDate,
}

pub struct SqlitePayerRepository {
    pool: SqlitePool,
}

impl SqlitePayerRepository {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    pub(crate) fn row_to_payer(row: PayerRow) -> Result<Payer> {
        Ok(Payer {
            id: parse_uuid(&row.id)?,
            first_name: row.first_name,
            last_name: row.last_name,
            phone_number: row.phone_number,
            is_admin: row.is_admin,
            created_at: DateTime::from_naive_utc_and_offset(row.created_at, Utc),
            updated_at: DateTime::from_naive_utc_and_offset(row.updated_at, Utc),
        })
    }

    fn row_to_subscription(row: SubscriptionRow) -> Result<Subscription> {
        let payer_id = parse_uuid(&row.payer_id)?;
        // An unreadable rate makes the payer unbillable rather than failing a batch.
        let monthly_rate = match row.monthly_rate.as_deref() {
            Some(raw) => match raw.trim().parse::<Decimal>() {
                Ok(rate) => Some(rate),
                Err(e) => {
                    tracing::warn!("Ignoring malformed monthly rate {:?} for payer {}: {}", raw, payer_id, e);
                    None
                }
            },
            None => None,
        };

        Ok(Subscription {
            payer_id,
            monthly_rate,
            start_date: row.start_date,
        })
    }

    /// Inserts a payer. `password_hash` is an already hashed secret.
    pub async fn insert(
        conn: &mut SqliteConnection,
        request: &CreatePayerRequest,
        password_hash: Option<String>,
    ) -> Result<Payer> {
        let id = Uuid::new_v4();
        let now_naive = Utc::now().naive_utc();

        sqlx::query(
            r#"
            INSERT INTO payers (
                id, first_name, last_name, phone_number, password_hash,
                is_admin, created_at, updated_at
            ) VALUES (?, ?, ?, ?, ?, ?, ?, ?)
            "#
        )
        .bind(id.to_string())
        .bind(&request.first_name)
        .bind(&request.last_name)
        .bind(&request.phone_number)
        .bind(password_hash)
        .bind(request.is_admin)
        .bind(now_naive)
        .bind(now_naive)
        .execute(&mut *conn)
        .await?;

        Self::find_in(conn, id).await?.ok_or_else(|| {
            AppError::Database("Failed to retrieve created payer".to_string())
        })
    }

    pub async fn insert_membership(
        conn: &mut SqliteConnection,
        payer_id: Uuid,
        join_date: NaiveDate,
    ) -> Result<Membership> {
        let status = MembershipStatus::Pending;

        sqlx::query("INSERT INTO memberships (payer_id, join_date, status) VALUES (?, ?, ?)")
            .bind(payer_id.to_string())
            .bind(join_date)
            .bind(status.as_str())
            .execute(&mut *conn)
            .await?;

        Ok(Membership { payer_id, join_date, status })
    }

    pub async fn insert_subscription(
        conn: &mut SqliteConnection,
        payer_id: Uuid,
        monthly_rate: Decimal,
        start_date: NaiveDate,
    ) -> Result<Subscription> {
        sqlx::query("INSERT INTO subscriptions (payer_id, monthly_rate, start_date) VALUES (?, ?, ?)")
            .bind(payer_id.to_string())
            .bind(amount_to_text(&monthly_rate))
            .bind(start_date)
            .execute(&mut *conn)
            .await?;

        Ok(Subscription {
            payer_id,
            monthly_rate: Some(monthly_rate),
            start_date,
        })
    }

    pub async fn find_in(conn: &mut SqliteConnection, id: Uuid) -> Result<Option<Payer>> {
        let row = sqlx::query_as::<_, PayerRow>(
            r#"
            SELECT id, first_name, last_name, phone_number, is_admin,
                   created_at, updated_at
            FROM payers
            WHERE id = ?
            "#
        )
        .bind(id.to_string())
        .fetch_optional(&mut *conn)
        .await?;

        row.map(Self::row_to_payer).transpose()
    }

    /// Every payer, in a stable order, read through the caller's connection.
    pub async fn list_all_in(conn: &mut SqliteConnection) -> Result<Vec<Payer>> {
        let rows = sqlx::query_as::<_, PayerRow>(
            r#"
            SELECT id, first_name, last_name, phone_number, is_admin,
                   created_at, updated_at
            FROM payers
            ORDER BY created_at, id
            "#
        )
        .fetch_all(&mut *conn)
        .await?;

        rows.into_iter().map(Self::row_to_payer).collect()
    }

    pub async fn subscription_in(
        conn: &mut SqliteConnection,
        payer_id: Uuid,
    ) -> Result<Option<Subscription>> {
        let row = sqlx::query_as::<_, SubscriptionRow>(
            "SELECT payer_id, monthly_rate, start_date FROM subscriptions WHERE payer_id = ?"
        )
        .bind(payer_id.to_string())
        .fetch_optional(&mut *conn)
        .await?;

        row.map(Self::row_to_subscription).transpose()
    }
}

#[async_trait]
impl PayerRepository for SqlitePayerRepository {
    async fn find_by_id(&self, id: Uuid) -> Result<Option<Payer>> {
        let mut conn = self.pool.acquire().await?;
        Self::find_in(&mut conn, id).await
    }

    async fn find_by_phone(&self, phone_number: &str) -> Result<Option<Payer>> {
        let row = sqlx::query_as::<_, PayerRow>(
            r#"
            SELECT id, first_name, last_name, phone_number, is_admin,
                   created_at, updated_at
            FROM payers
            WHERE phone_number = ?
            "#
        )
        .bind(phone_number)
        .fetch_optional(&self.pool)
        .await?;

        row.map(Self::row_to_payer).transpose()
    }

    async fn list(&self, limit: i64, offset: i64) -> Result<Vec<Payer>> {
        let rows = sqlx::query_as::<_, PayerRow>(
            r#"
            SELECT id, first_name, last_name, phone_number, is_admin,
                   created_at, updated_at
            FROM payers
            ORDER BY last_name, first_name
            LIMIT ? OFFSET ?
            "#
        )
        .bind(limit)
        .bind(offset)
        .fetch_all(&self.pool)
        .await?;

        rows.into_iter().map(Self::row_to_payer).collect()
    }

    async fn update(&self, id: Uuid, update: UpdatePayerRequest) -> Result<Payer> {
        let now_naive = Utc::now().naive_utc();

        let result = sqlx::query(
            r#"
            UPDATE payers
            SET first_name = COALESCE(?, first_name),
                last_name = COALESCE(?, last_name),
                phone_number = COALESCE(?, phone_number),
                is_admin = COALESCE(?, is_admin),
                updated_at = ?
            WHERE id = ?
            "#
        )
        .bind(&update.first_name)
        .bind(&update.last_name)
        .bind(&update.phone_number)
        .bind(update.is_admin)
        .bind(now_naive)
        .bind(id.to_string())
        .execute(&self.pool)
        .await?;

        if result.rows_affected() == 0 {
            return Err(AppError::NotFound("Payer not found".to_string()));
        }

        self.find_by_id(id).await?.ok_or_else(|| {
            AppError::Database("Failed to retrieve updated payer".to_string())
        })
    }

    async fn membership(&self, payer_id: Uuid) -> Result<Option<Membership>> {
        let row = sqlx::query_as::<_, MembershipRow>(
            "SELECT payer_id, join_date, status FROM memberships WHERE payer_id = ?"
        )
        .bind(payer_id.to_string())
        .fetch_optional(&self.pool)
        .await?;

        row.map(|r| {
            Ok(Membership {
                payer_id: parse_uuid(&r.payer_id)?,
                join_date: r.join_date,
                status: r.status.parse().map_err(AppError::Database)?,
            })
        })
        .transpose()
    }

    async fn subscription(&self, payer_id: Uuid) -> Result<Option<Subscription>> {
        let mut conn = self.pool.acquire().await?;
        Self::subscription_in(&mut conn, payer_id).await
    }

    async fn password_hash(&self, phone_number: &str) -> Result<Option<String>> {
        let hash = sqlx::query_scalar::<_, Option<String>>(
            "SELECT password_hash FROM payers WHERE phone_number = ?"
        )
        .bind(phone_number)
        .fetch_optional(&self.pool)
        .await?;

        Ok(hash.flatten())
    }
}

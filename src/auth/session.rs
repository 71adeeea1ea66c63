use chrono::{DateTime, Utc};
use sha2::{Digest, Sha256};
use sqlx::SqlitePool;
use uuid::Uuid;

use crate::{
    domain::Payer,
    error::Result,
    repository::payer_repository::{PayerRow, SqlitePayerRepository},
};

/// A freshly opened login session. The token itself is only ever handed
/// to the client.
#[derive(Debug, Clone)]
pub struct Session {
    pub payer_id: Uuid,
    pub expires_at: DateTime<Utc>,
}

pub struct SessionStore {
    pool: SqlitePool,
}

impl SessionStore {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    pub async fn open(&self, payer_id: Uuid, token: &str, expires_at: DateTime<Utc>) -> Result<Session> {
        sqlx::query(
            r#"
            INSERT INTO sessions (token_hash, payer_id, expires_at, created_at)
            VALUES (?, ?, ?, ?)
            "#
        )
        .bind(hash_token(token))
        .bind(payer_id.to_string())
        .bind(expires_at.naive_utc())
        .bind(Utc::now().naive_utc())
        .execute(&self.pool)
        .await?;

        Ok(Session { payer_id, expires_at })
    }

    /// The payer behind an unexpired token.
    pub async fn payer_for_token(&self, token: &str) -> Result<Option<Payer>> {
        let row = sqlx::query_as::<_, PayerRow>(
            r#"
            SELECT p.id, p.first_name, p.last_name, p.phone_number, p.is_admin, p.created_at, p.updated_at
            FROM sessions s
            JOIN payers p ON p.id = s.payer_id
            WHERE s.token_hash = ? AND s.expires_at > ?
            "#
        )
        .bind(hash_token(token))
        .bind(Utc::now().naive_utc())
        .fetch_optional(&self.pool)
        .await?;

        row.map(SqlitePayerRepository::row_to_payer).transpose()
    }

    pub async fn close(&self, token: &str) -> Result<()> {
        sqlx::query("DELETE FROM sessions WHERE token_hash = ?")
            .bind(hash_token(token))
            .execute(&self.pool)
            .await?;

        Ok(())
    }

    pub async fn cleanup_expired(&self) -> Result<u64> {
        let result = sqlx::query("DELETE FROM sessions WHERE expires_at <= ?")
            .bind(Utc::now().naive_utc())
            .execute(&self.pool)
            .await?;

        Ok(result.rows_affected())
    }
}

fn hash_token(token: &str) -> String {
    hex::encode(Sha256::digest(token.as_bytes()))
}

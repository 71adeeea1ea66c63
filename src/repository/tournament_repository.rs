use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, NaiveDateTime, Utc};
use sqlx::{FromRow, SqliteConnection, SqlitePool};
use uuid::Uuid;

use crate::{
    domain::{CreateTournamentRequest, Participation, Tournament},
    error::{AppError, Result},
    repository::{amount_to_text, parse_amount, parse_uuid, TournamentRepository},
};

#[derive(FromRow)]
struct TournamentRow {
    id: String,
    name: String,
    start_date: NaiveDate,
    entry_fee: String,
    created_at: NaiveDateTime,
}

#[derive(FromRow)]
struct ParticipationRow {
    id: String,
    payer_id: String,
    tournament_id: String,
    created_at: NaiveDateTime,
}

pub struct SqliteTournamentRepository {
    pool: SqlitePool,
}

impl SqliteTournamentRepository {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    fn row_to_tournament(row: TournamentRow) -> Result<Tournament> {
        Ok(Tournament {
            id: parse_uuid(&row.id)?,
            name: row.name,
            start_date: row.start_date,
            entry_fee: parse_amount(&row.entry_fee)?,
            created_at: DateTime::from_naive_utc_and_offset(row.created_at, Utc),
        })
    }

    fn row_to_participation(row: ParticipationRow) -> Result<Participation> {
        Ok(Participation {
            id: parse_uuid(&row.id)?,
            payer_id: parse_uuid(&row.payer_id)?,
            tournament_id: parse_uuid(&row.tournament_id)?,
            created_at: DateTime::from_naive_utc_and_offset(row.created_at, Utc),
        })
    }

    pub async fn find_in(conn: &mut SqliteConnection, id: Uuid) -> Result<Option<Tournament>> {
        let row = sqlx::query_as::<_, TournamentRow>(
            "SELECT id, name, start_date, entry_fee, created_at FROM tournaments WHERE id = ?"
        )
        .bind(id.to_string())
        .fetch_optional(&mut *conn)
        .await?;

        row.map(Self::row_to_tournament).transpose()
    }

    /// Fails with `Conflict` when the payer is already entered, courtesy of
    /// the (payer_id, tournament_id) unique constraint.
    pub async fn insert_participation(
        conn: &mut SqliteConnection,
        payer_id: Uuid,
        tournament_id: Uuid,
    ) -> Result<Participation> {
        let id = Uuid::new_v4();
        let now = Utc::now();

        sqlx::query(
            r#"
            INSERT INTO tournament_participations (id, payer_id, tournament_id, created_at)
            VALUES (?, ?, ?, ?)
            "#
        )
        .bind(id.to_string())
        .bind(payer_id.to_string())
        .bind(tournament_id.to_string())
        .bind(now.naive_utc())
        .execute(&mut *conn)
        .await
        .map_err(|e| match AppError::from(e) {
            AppError::Conflict(_) => {
                AppError::Conflict("Payer is already entered in this tournament".to_string())
            }
            other => other,
        })?;

        Ok(Participation {
            id,
            payer_id,
            tournament_id,
            created_at: now,
        })
    }
}

#[async_trait]
impl TournamentRepository for SqliteTournamentRepository {
    async fn create(&self, request: CreateTournamentRequest) -> Result<Tournament> {
        let id = Uuid::new_v4();

        sqlx::query(
            r#"
            INSERT INTO tournaments (id, name, start_date, entry_fee, created_at)
            VALUES (?, ?, ?, ?, ?)
            "#
        )
        .bind(id.to_string())
        .bind(&request.name)
        .bind(request.start_date)
        .bind(amount_to_text(&request.entry_fee))
        .bind(Utc::now().naive_utc())
        .execute(&self.pool)
        .await?;

        self.find_by_id(id).await?.ok_or_else(|| {
            AppError::Database("Failed to retrieve created tournament".to_string())
        })
    }

    async fn find_by_id(&self, id: Uuid) -> Result<Option<Tournament>> {
        let mut conn = self.pool.acquire().await?;
        Self::find_in(&mut conn, id).await
    }

    async fn list(&self) -> Result<Vec<Tournament>> {
        let rows = sqlx::query_as::<_, TournamentRow>(
            "SELECT id, name, start_date, entry_fee, created_at FROM tournaments ORDER BY start_date DESC"
        )
        .fetch_all(&self.pool)
        .await?;

        rows.into_iter().map(Self::row_to_tournament).collect()
    }

    async fn participants(&self, tournament_id: Uuid) -> Result<Vec<Participation>> {
        let rows = sqlx::query_as::<_, ParticipationRow>(
            r#"
            SELECT id, payer_id, tournament_id, created_at
            FROM tournament_participations
            WHERE tournament_id = ?
            ORDER BY created_at
            "#
        )
        .bind(tournament_id.to_string())
        .fetch_all(&self.pool)
        .await?;

        rows.into_iter().map(Self::row_to_participation).collect()
    }
}

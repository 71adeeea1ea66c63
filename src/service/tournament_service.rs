use rust_decimal::Decimal;
use serde::Serialize;
use std::sync::Arc;
use uuid::Uuid;
use validator::Validate;

use crate::{
    domain::{self, CreateTournamentRequest, Participation, Tournament, Transaction},
    error::{AppError, Result},
    fees::{self, DomainEvent, FeeSchedule},
    ledger::LedgerStore,
    repository::{SqlitePayerRepository, SqliteTournamentRepository, TournamentRepository},
};

#[derive(Debug, Clone, Serialize)]
pub struct Enrollment {
    pub participation: Participation,
    pub entry_fee: Option<Transaction>,
}

pub struct TournamentService {
    ledger: Arc<LedgerStore>,
    repo: Arc<dyn TournamentRepository>,
    schedule: FeeSchedule,
}

impl TournamentService {
    pub fn new(ledger: Arc<LedgerStore>, repo: Arc<dyn TournamentRepository>, schedule: FeeSchedule) -> Self {
        Self { ledger, repo, schedule }
    }

    pub async fn create_tournament(&self, request: CreateTournamentRequest) -> Result<Tournament> {
        request.validate()?;

        if request.entry_fee < Decimal::ZERO {
            return Err(AppError::Validation("Entry fee cannot be negative".to_string()));
        }

        let tournament = self.repo.create(request).await?;
        tracing::info!("Created tournament {} ({})", tournament.id, tournament.name);
        Ok(tournament)
    }

    /// Enters a payer into a tournament and charges the entry fee. A repeat
    /// entry is rejected with `Conflict` and charges nothing.
    pub async fn enroll(&self, tournament_id: Uuid, payer_id: Uuid) -> Result<Enrollment> {
        let mut tx = self.ledger.begin().await?;

        let tournament = SqliteTournamentRepository::find_in(tx.conn(), tournament_id)
            .await?
            .ok_or_else(|| AppError::NotFound("Tournament not found".to_string()))?;
        if SqlitePayerRepository::find_in(tx.conn(), payer_id).await?.is_none() {
            return Err(AppError::NotFound("Payer not found".to_string()));
        }

        let participation =
            SqliteTournamentRepository::insert_participation(tx.conn(), payer_id, tournament_id).await?;
        let entry_fee = fees::apply(
            &mut tx,
            &DomainEvent::ParticipationCreated {
                participation: &participation,
                tournament: &tournament,
                on: domain::today(),
            },
            &self.schedule,
        )
        .await?;

        tx.commit().await?;

        tracing::info!("Payer {} entered tournament {}", payer_id, tournament.name);

        Ok(Enrollment {
            participation,
            entry_fee,
        })
    }
}

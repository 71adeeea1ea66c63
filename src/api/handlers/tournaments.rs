use axum::{
    extract::{Path, State},
    http::StatusCode,
    Json,
};
use serde::Deserialize;
use uuid::Uuid;

use crate::{
    api::state::AppState,
    domain::{CreateTournamentRequest, Participation, Tournament},
    error::{AppError, Result},
    service::tournament_service::Enrollment,
};

pub async fn list(State(state): State<AppState>) -> Result<Json<Vec<Tournament>>> {
    let tournaments = state.service_context.tournament_repo.list().await?;
    Ok(Json(tournaments))
}

pub async fn create(
    State(state): State<AppState>,
    Json(request): Json<CreateTournamentRequest>,
) -> Result<(StatusCode, Json<Tournament>)> {
    let tournament = state.service_context.tournament_service
        .create_tournament(request)
        .await?;

    Ok((StatusCode::CREATED, Json(tournament)))
}

#[derive(Debug, Deserialize)]
pub struct EnrollRequest {
    pub payer_id: Uuid,
}

pub async fn enroll(
    State(state): State<AppState>,
    Path(tournament_id): Path<Uuid>,
    Json(request): Json<EnrollRequest>,
) -> Result<(StatusCode, Json<Enrollment>)> {
    let enrollment = state.service_context.tournament_service
        .enroll(tournament_id, request.payer_id)
        .await?;

    Ok((StatusCode::CREATED, Json(enrollment)))
}

pub async fn participants(
    State(state): State<AppState>,
    Path(tournament_id): Path<Uuid>,
) -> Result<Json<Vec<Participation>>> {
    let repo = &state.service_context.tournament_repo;
    if repo.find_by_id(tournament_id).await?.is_none() {
        return Err(AppError::NotFound(format!("Tournament {} not found", tournament_id)));
    }

    Ok(Json(repo.participants(tournament_id).await?))
}

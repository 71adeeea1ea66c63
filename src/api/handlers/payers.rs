use axum::{
    extract::{Extension, Path, Query, State},
    http::StatusCode,
    Json,
};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::{
    api::{middleware::auth::CurrentUser, state::AppState},
    domain::{CreatePayerRequest, Payer, UpdatePayerRequest},
    error::Result,
    service::payer_service::PayerProfile,
};

#[derive(Debug, Deserialize)]
pub struct ListParams {
    #[serde(default = "default_limit")]
    limit: i64,
    #[serde(default)]
    offset: i64,
}

fn default_limit() -> i64 {
    50
}

#[derive(Debug, Serialize)]
pub struct ListResponse {
    payers: Vec<Payer>,
    total: usize,
}

pub async fn me(
    State(state): State<AppState>,
    Extension(user): Extension<CurrentUser>,
) -> Result<Json<PayerProfile>> {
    let profile = state.service_context.payer_service
        .profile(user.payer)
        .await?;

    Ok(Json(profile))
}

pub async fn list(
    State(state): State<AppState>,
    Query(params): Query<ListParams>,
) -> Result<Json<ListResponse>> {
    let payers = state.service_context.payer_repo
        .list(params.limit, params.offset)
        .await?;

    let total = payers.len();
    Ok(Json(ListResponse { payers, total }))
}

pub async fn create(
    State(state): State<AppState>,
    Json(request): Json<CreatePayerRequest>,
) -> Result<(StatusCode, Json<Payer>)> {
    let payer = state.service_context.payer_service
        .onboard(request)
        .await?;

    Ok((StatusCode::CREATED, Json(payer)))
}

pub async fn update(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    Json(request): Json<UpdatePayerRequest>,
) -> Result<Json<Payer>> {
    let payer = state.service_context.payer_service
        .update(id, request)
        .await?;

    Ok(Json(payer))
}

use axum::{body::Bytes, extract::State, Json};
use chrono::NaiveDate;
use serde::Deserialize;
use uuid::Uuid;

use crate::{
    api::state::AppState,
    billing::BillingResult,
    error::{AppError, Result},
};

#[derive(Debug, Default, Deserialize)]
pub struct RunBillingRequest {
    pub billing_date: Option<NaiveDate>,
    pub payer_ids: Option<Vec<Uuid>>,
}

/// An empty body bills every payer for today.
pub async fn run(
    State(state): State<AppState>,
    body: Bytes,
) -> Result<Json<BillingResult>> {
    let request = if body.iter().all(u8::is_ascii_whitespace) {
        RunBillingRequest::default()
    } else {
        serde_json::from_slice::<RunBillingRequest>(&body)
            .map_err(|e| AppError::BadRequest(format!("Invalid billing request: {}", e)))?
    };

    let result = state.service_context.billing_service
        .generate_monthly_invoices(request.billing_date, request.payer_ids.as_deref())
        .await?;

    Ok(Json(result))
}

use axum::{
    body::Bytes,
    extract::{Extension, Path, State},
    http::{header, HeaderMap},
    Json,
};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

use crate::{
    api::{middleware::auth::CurrentUser, state::AppState},
    error::{AppError, Result},
    payments::{CallbackOutcome, PaymentError, PaymentInitiation},
};

#[derive(Debug, Deserialize)]
pub struct InitiatePaymentRequest {
    pub transaction_id: Option<i64>,
}

pub async fn initiate(
    State(state): State<AppState>,
    Extension(user): Extension<CurrentUser>,
    Json(request): Json<InitiatePaymentRequest>,
) -> Result<Json<PaymentInitiation>> {
    let transaction_id = request
        .transaction_id
        .ok_or_else(|| AppError::BadRequest("Transaction ID is required".to_string()))?;

    let initiation = state
        .payments()?
        .initiate_payment(transaction_id, &user.payer)
        .await?;

    Ok(Json(initiation))
}

#[derive(Debug, Serialize)]
pub struct StatusResponse {
    pub status: &'static str,
    #[serde(flatten)]
    pub outcome: CallbackOutcome,
}

pub async fn status(
    State(state): State<AppState>,
    Extension(user): Extension<CurrentUser>,
    Path(merchant_order_id): Path<String>,
) -> Result<Json<StatusResponse>> {
    let outcome = state
        .payments()?
        .poll_status(&merchant_order_id, &user.payer)
        .await?;

    Ok(Json(StatusResponse {
        status: outcome.status(),
        outcome,
    }))
}

/// Body of a gateway callback: server-to-server calls send JSON, browser
/// redirects post a form. Either may carry the checksum inline.
#[derive(Debug, Default, Deserialize)]
pub struct CallbackBody {
    pub response: Option<String>,
    pub checksum: Option<String>,
}

fn parse_callback_body(headers: &HeaderMap, body: &Bytes) -> Result<CallbackBody> {
    let is_form = headers
        .get(header::CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .map(|v| v.starts_with("application/x-www-form-urlencoded"))
        .unwrap_or(false);

    let parsed = if is_form {
        serde_urlencoded::from_bytes::<CallbackBody>(body)
            .map_err(|e| AppError::BadRequest(format!("Invalid callback form: {}", e)))?
    } else {
        serde_json::from_slice::<CallbackBody>(body)
            .map_err(|e| AppError::BadRequest(format!("Invalid callback body: {}", e)))?
    };

    Ok(parsed)
}

pub async fn callback(
    State(state): State<AppState>,
    headers: HeaderMap,
    body: Bytes,
) -> Result<Json<Value>> {
    let body = parse_callback_body(&headers, &body)?;

    let payload = body
        .response
        .filter(|r| !r.trim().is_empty())
        .ok_or_else(|| AppError::BadRequest("Missing response payload".to_string()))?;

    let checksum = headers
        .get("X-VERIFY")
        .and_then(|v| v.to_str().ok())
        .map(str::to_string)
        .or(body.checksum)
        .ok_or_else(|| AppError::BadRequest("Missing checksum".to_string()))?;

    match state.payments()?.reconcile_callback(&payload, &checksum).await {
        Ok(outcome) => Ok(Json(json!({ "status": outcome.status() }))),
        Err(PaymentError::NotFound(id)) => {
            tracing::warn!("Payment callback for unknown transaction {}; acknowledged", id);
            Ok(Json(json!({ "status": "ignored" })))
        }
        Err(e) => Err(e.into()),
    }
}

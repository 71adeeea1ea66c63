use axum::{http::StatusCode, Json, response::IntoResponse};
use serde_json::json;

pub async fn root() -> impl IntoResponse {
    Json(json!({
        "name": "clubledger",
        "version": env!("CARGO_PKG_VERSION"),
        "description": "Billing and payments ledger for sports clubs",
        "status": "operational",
        "endpoints": {
            "health": "/health",
            "auth": "/auth/login",
            "api": "/api",
            "payment_callback": "/api/payments/callback",
            "admin": "/admin"
        }
    }))
}

pub async fn health_check() -> impl IntoResponse {
    (StatusCode::OK, Json(json!({
        "status": "healthy",
        "timestamp": chrono::Utc::now().to_rfc3339()
    })))
}

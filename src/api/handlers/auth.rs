use axum::{
    extract::State,
    http::StatusCode,
    Json,
};
use axum_extra::extract::CookieJar;
use serde::{Deserialize, Serialize};

use crate::{
    api::state::AppState,
    auth::{AuthService, SESSION_COOKIE},
    error::{AppError, Result},
};

#[derive(Debug, Deserialize)]
pub struct LoginRequest {
    pub phone_number: String,
    pub password: String,
}

#[derive(Debug, Serialize)]
pub struct LoginResponse {
    pub message: String,
}

pub async fn login(
    State(state): State<AppState>,
    jar: CookieJar,
    Json(req): Json<LoginRequest>,
) -> Result<(CookieJar, Json<LoginResponse>)> {
    let ctx = &state.service_context;

    let password_hash = ctx.payer_repo
        .password_hash(&req.phone_number)
        .await?
        .ok_or(AppError::Unauthorized)?;

    if !AuthService::verify_password(&req.password, &password_hash).await? {
        return Err(AppError::Unauthorized);
    }

    let payer = ctx.payer_repo
        .find_by_phone(&req.phone_number)
        .await?
        .ok_or(AppError::Unauthorized)?;

    let (_session, token) = ctx.auth_service.create_session(payer.id).await?;

    let secure = state.settings.server.base_url.starts_with("https://");
    let cookie = ctx.auth_service.create_session_cookie(&token, secure);

    tracing::debug!("Payer {} logged in", payer.id);

    Ok((
        jar.add(cookie),
        Json(LoginResponse {
            message: "Login successful".to_string(),
        })
    ))
}

pub async fn logout(
    State(state): State<AppState>,
    jar: CookieJar,
) -> Result<(CookieJar, StatusCode)> {
    if let Some(session_cookie) = jar.get(SESSION_COOKIE) {
        if let Err(e) = state.service_context.auth_service
            .invalidate_session(session_cookie.value())
            .await
        {
            tracing::warn!("Failed to invalidate session on logout: {}", e);
        }
    }

    let jar = jar.add(AuthService::create_logout_cookie());

    Ok((jar, StatusCode::NO_CONTENT))
}

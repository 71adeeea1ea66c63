use axum::{
    extract::{Request, State},
    middleware::Next,
    response::Response,
};
use axum_extra::extract::CookieJar;

use crate::{
    api::state::AppState,
    auth::SESSION_COOKIE,
    domain::Payer,
    error::AppError,
};

#[derive(Clone)]
pub struct CurrentUser {
    pub payer: Payer,
}

async fn authenticate(state: &AppState, jar: &CookieJar) -> Result<Payer, AppError> {
    let session_cookie = jar
        .get(SESSION_COOKIE)
        .ok_or(AppError::Unauthorized)?;

    state.service_context.auth_service
        .validate_session(session_cookie.value())
        .await?
        .ok_or(AppError::Unauthorized)
}

pub async fn require_auth(
    State(state): State<AppState>,
    jar: CookieJar,
    mut request: Request,
    next: Next,
) -> Result<Response, AppError> {
    let payer = authenticate(&state, &jar).await?;

    request.extensions_mut().insert(CurrentUser { payer });

    Ok(next.run(request).await)
}

pub async fn require_admin(
    State(state): State<AppState>,
    jar: CookieJar,
    mut request: Request,
    next: Next,
) -> Result<Response, AppError> {
    let payer = authenticate(&state, &jar).await?;

    if !payer.is_admin {
        return Err(AppError::Forbidden);
    }

    request.extensions_mut().insert(CurrentUser { payer });

    Ok(next.run(request).await)
}

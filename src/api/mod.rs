pub mod handlers;
pub mod middleware;
pub mod state;

use axum::{
    Router,
    routing::{get, post, put},
};
use tower_http::{
    cors::CorsLayer,
    trace::TraceLayer,
};
use std::sync::Arc;

use crate::{
    config::Settings,
    payments::PaymentSessionManager,
    service::ServiceContext,
};
use state::AppState;

pub fn create_app(
    service_context: Arc<ServiceContext>,
    payment_sessions: Option<Arc<PaymentSessionManager>>,
    settings: Arc<Settings>,
) -> Router {
    let app_state = AppState::new(service_context, payment_sessions, settings);

    Router::new()
        // Root and health endpoints
        .route("/", get(handlers::root::root))
        .route("/health", get(handlers::root::health_check))

        // Auth routes
        .route("/auth/login", post(handlers::auth::login))
        .route("/auth/logout", post(handlers::auth::logout))

        // API routes
        .nest("/api", api_routes(app_state.clone()))

        // Admin routes
        .nest("/admin", admin_routes(app_state.clone()))

        .with_state(app_state)

        .layer(CorsLayer::permissive())
        .layer(TraceLayer::new_for_http())
}

fn api_routes(state: AppState) -> Router<AppState> {
    Router::new()
        // Gateway-originated; authenticated by checksum, not session
        .route("/payments/callback", post(handlers::payments::callback))
        .merge(
            Router::new()
                .route("/payers/me", get(handlers::payers::me))
                .route("/transactions", get(handlers::transactions::list_mine))
                .route("/transactions/:id", get(handlers::transactions::get))
                .route("/sales", get(handlers::inventory::my_sales))
                .route("/payments/initiate", post(handlers::payments::initiate))
                .route("/payments/status/:merchant_order_id", get(handlers::payments::status))
                .route_layer(axum::middleware::from_fn_with_state(
                    state,
                    middleware::auth::require_auth,
                )),
        )
}

fn admin_routes(state: AppState) -> Router<AppState> {
    Router::new()
        .route("/payers", get(handlers::payers::list).post(handlers::payers::create))
        .route("/payers/:id", put(handlers::payers::update))
        .route("/transactions", post(handlers::transactions::create))
        .route("/transactions/:id", put(handlers::transactions::update))
        .route("/billing/run", post(handlers::billing::run))
        .route("/tournaments", get(handlers::tournaments::list).post(handlers::tournaments::create))
        .route("/tournaments/:id/participants", get(handlers::tournaments::participants).post(handlers::tournaments::enroll))
        .route("/inventory/items", get(handlers::inventory::list_items).post(handlers::inventory::create_item))
        .route("/sales", post(handlers::inventory::record_sale))
        .route_layer(axum::middleware::from_fn_with_state(
            state,
            middleware::auth::require_admin,
        ))
}

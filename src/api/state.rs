use std::sync::Arc;
use crate::{
    config::Settings,
    error::AppError,
    payments::PaymentSessionManager,
    service::ServiceContext,
};

#[derive(Clone)]
pub struct AppState {
    pub service_context: Arc<ServiceContext>,
    pub payment_sessions: Option<Arc<PaymentSessionManager>>,
    pub settings: Arc<Settings>,
}

impl AppState {
    pub fn new(
        service_context: Arc<ServiceContext>,
        payment_sessions: Option<Arc<PaymentSessionManager>>,
        settings: Arc<Settings>,
    ) -> Self {
        Self {
            service_context,
            payment_sessions,
            settings,
        }
    }

    pub fn payments(&self) -> Result<&PaymentSessionManager, AppError> {
        self.payment_sessions
            .as_deref()
            .ok_or_else(|| AppError::ServiceUnavailable("Online payments are not configured".to_string()))
    }
}

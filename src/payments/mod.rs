pub mod gateway;
pub mod order_id;
pub mod phonepe;
pub mod session;

pub use gateway::{GatewayError, GatewayReport, GatewayResponse, GatewayState, PayRequest, PayResponse, PaymentGateway};
pub use phonepe::PhonePeClient;
pub use session::{CallbackOutcome, PaymentInitiation, PaymentSessionManager};

use thiserror::Error;

use crate::error::AppError;

#[derive(Error, Debug)]
pub enum PaymentError {
    #[error("Transaction not found: {0}")]
    NotFound(String),

    #[error("Transaction belongs to another payer")]
    Forbidden,

    #[error("Transaction is already paid")]
    AlreadyPaid,

    #[error("Nothing to pay for transaction {0}")]
    NothingToPay(i64),

    #[error("Invalid signature")]
    InvalidSignature,

    #[error("Invalid payload: {0}")]
    InvalidPayload(String),

    #[error("Payment initiation failed: {0}")]
    InitiationFailed(String),

    #[error("Payment status unavailable: {0}")]
    StatusUnavailable(String),

    #[error(transparent)]
    Store(#[from] AppError),
}

impl From<PaymentError> for AppError {
    fn from(err: PaymentError) -> Self {
        match err {
            PaymentError::NotFound(what) => AppError::NotFound(format!("Transaction not found: {}", what)),
            PaymentError::Forbidden => AppError::Forbidden,
            PaymentError::AlreadyPaid => AppError::BadRequest("Transaction is already paid".to_string()),
            PaymentError::NothingToPay(id) => AppError::BadRequest(format!("Nothing to pay for transaction {}", id)),
            PaymentError::InvalidSignature => AppError::BadRequest("Invalid signature".to_string()),
            PaymentError::InvalidPayload(msg) => AppError::BadRequest(format!("Invalid payload: {}", msg)),
            PaymentError::InitiationFailed(detail) => AppError::Gateway(detail),
            PaymentError::StatusUnavailable(detail) => AppError::ServiceUnavailable(detail),
            PaymentError::Store(e) => e,
        }
    }
}

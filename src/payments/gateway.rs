use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// What the session manager asks the gateway to charge.
#[derive(Debug, Clone)]
pub struct PayRequest {
    pub merchant_order_id: String,
    pub amount_paise: i64,
    pub merchant_user_id: String,
    pub mobile_number: Option<String>,
}

#[derive(Debug, Clone)]
pub struct PayResponse {
    pub redirect_url: String,
}

#[derive(Error, Debug)]
pub enum GatewayError {
    #[error("gateway request timed out")]
    Timeout,

    #[error("gateway transport error: {0}")]
    Transport(String),

    #[error("gateway rejected the request ({code}): {message}")]
    Rejected { code: String, message: String },

    #[error("malformed gateway response: {0}")]
    Malformed(String),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum GatewayState {
    Completed,
    Pending,
    Failed,
}

impl GatewayState {
    pub fn from_gateway(code: &str, state: Option<&str>) -> Self {
        match (code, state) {
            ("PAYMENT_SUCCESS", _) | (_, Some("COMPLETED")) => GatewayState::Completed,
            ("PAYMENT_PENDING", _) | (_, Some("PENDING")) => GatewayState::Pending,
            _ => GatewayState::Failed,
        }
    }

    /// Acknowledgement status reported back to callers.
    pub fn as_str(&self) -> &'static str {
        match self {
            GatewayState::Completed => "success",
            GatewayState::Pending => "pending",
            GatewayState::Failed => "failed",
        }
    }
}

/// Envelope shared by callback payloads and status responses.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GatewayResponse {
    #[serde(default)]
    pub success: bool,
    pub code: String,
    #[serde(default)]
    pub message: Option<String>,
    #[serde(default)]
    pub data: Option<GatewayResponseData>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GatewayResponseData {
    pub merchant_transaction_id: String,
    #[serde(default)]
    pub transaction_id: Option<String>,
    #[serde(default)]
    pub amount: Option<i64>,
    #[serde(default)]
    pub state: Option<String>,
}

/// The gateway's view of one order.
#[derive(Debug, Clone, PartialEq)]
pub struct GatewayReport {
    pub merchant_order_id: String,
    pub state: GatewayState,
    pub code: String,
    pub gateway_transaction_id: Option<String>,
    pub amount_paise: Option<i64>,
}

impl TryFrom<GatewayResponse> for GatewayReport {
    type Error = GatewayError;

    fn try_from(response: GatewayResponse) -> Result<Self, Self::Error> {
        let data = response
            .data
            .ok_or_else(|| GatewayError::Malformed("missing data".to_string()))?;

        Ok(GatewayReport {
            state: GatewayState::from_gateway(&response.code, data.state.as_deref()),
            code: response.code,
            merchant_order_id: data.merchant_transaction_id,
            gateway_transaction_id: data.transaction_id,
            amount_paise: data.amount,
        })
    }
}

#[async_trait]
pub trait PaymentGateway: Send + Sync {
    async fn initiate(&self, request: PayRequest) -> Result<PayResponse, GatewayError>;

    async fn order_status(&self, merchant_order_id: &str) -> Result<GatewayReport, GatewayError>;

    /// Checks a callback's checksum against its raw (base64) payload.
    fn verify_callback(&self, payload: &str, checksum: &str) -> bool;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn gateway_states_map_onto_three_outcomes() {
        assert_eq!(GatewayState::from_gateway("PAYMENT_SUCCESS", None), GatewayState::Completed);
        assert_eq!(GatewayState::from_gateway("SUCCESS", Some("COMPLETED")), GatewayState::Completed);
        assert_eq!(GatewayState::from_gateway("PAYMENT_PENDING", None), GatewayState::Pending);
        assert_eq!(GatewayState::from_gateway("SUCCESS", Some("PENDING")), GatewayState::Pending);
        assert_eq!(GatewayState::from_gateway("PAYMENT_ERROR", Some("FAILED")), GatewayState::Failed);
        assert_eq!(GatewayState::from_gateway("", None), GatewayState::Failed);
    }

    #[test]
    fn callback_body_parses_into_a_report() {
        let body = r#"{
            "success": true,
            "code": "PAYMENT_SUCCESS",
            "message": "Your payment is successful.",
            "data": {
                "merchantId": "CLUBMID",
                "merchantTransactionId": "TXN12_0a1b2c3d",
                "transactionId": "T2406151200",
                "amount": 75000,
                "state": "COMPLETED"
            }
        }"#;

        let response: GatewayResponse = serde_json::from_str(body).unwrap();
        let report = GatewayReport::try_from(response).unwrap();

        assert_eq!(report.merchant_order_id, "TXN12_0a1b2c3d");
        assert_eq!(report.state, GatewayState::Completed);
        assert_eq!(report.amount_paise, Some(75000));
        assert_eq!(report.gateway_transaction_id.as_deref(), Some("T2406151200"));
    }

    #[test]
    fn report_requires_data() {
        let response = GatewayResponse {
            success: false,
            code: "INTERNAL_SERVER_ERROR".to_string(),
            message: None,
            data: None,
        };
        assert!(matches!(GatewayReport::try_from(response), Err(GatewayError::Malformed(_))));
    }
}

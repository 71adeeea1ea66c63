use async_trait::async_trait;
use base64::{engine::general_purpose::STANDARD, Engine as _};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::time::Duration;
use subtle::ConstantTimeEq;

use crate::{
    config::PhonePeConfig,
    payments::gateway::{
        GatewayError, GatewayReport, GatewayResponse, PayRequest, PayResponse, PaymentGateway,
    },
};

const PAY_PATH: &str = "/pg/v1/pay";
const DEFAULT_BASE_URL: &str = "https://api.phonepe.com/apis/hermes";

pub struct PhonePeClient {
    http: reqwest::Client,
    merchant_id: String,
    salt_key: String,
    salt_index: String,
    base_url: String,
    callback_url: String,
    redirect_url: String,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct PayPayload<'a> {
    merchant_id: &'a str,
    merchant_transaction_id: &'a str,
    merchant_user_id: &'a str,
    amount: i64,
    redirect_url: &'a str,
    redirect_mode: &'a str,
    callback_url: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    mobile_number: Option<&'a str>,
    payment_instrument: PaymentInstrument,
}

#[derive(Serialize)]
struct PaymentInstrument {
    #[serde(rename = "type")]
    kind: &'static str,
}

#[derive(Deserialize)]
struct PayApiResponse {
    #[serde(default)]
    success: bool,
    #[serde(default)]
    code: String,
    #[serde(default)]
    message: Option<String>,
    #[serde(default)]
    data: Option<PayApiData>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct PayApiData {
    instrument_response: Option<InstrumentResponse>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct InstrumentResponse {
    redirect_info: Option<RedirectInfo>,
}

#[derive(Deserialize)]
struct RedirectInfo {
    url: String,
}

impl PhonePeClient {
    /// Builds a client when the gateway is enabled and fully configured.
    pub fn from_config(config: &PhonePeConfig) -> Option<Self> {
        if !config.enabled {
            return None;
        }

        let (Some(merchant_id), Some(salt_key), Some(salt_index), Some(callback_url), Some(redirect_url)) = (
            config.merchant_id.clone(),
            config.salt_key.clone(),
            config.salt_index.clone(),
            config.callback_url.clone(),
            config.redirect_url.clone(),
        ) else {
            tracing::warn!("PhonePe enabled but merchant id, salt or callback URLs are missing");
            return None;
        };

        let http = match reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
        {
            Ok(client) => client,
            Err(e) => {
                tracing::error!("Failed to build PhonePe HTTP client: {}", e);
                return None;
            }
        };

        let base_url = config
            .base_url
            .clone()
            .unwrap_or_else(|| DEFAULT_BASE_URL.to_string())
            .trim_end_matches('/')
            .to_string();

        Some(Self {
            http,
            merchant_id,
            salt_key,
            salt_index,
            base_url,
            callback_url,
            redirect_url,
        })
    }

    fn sign(&self, body: &str, path: &str) -> String {
        request_checksum(body, path, &self.salt_key, &self.salt_index)
    }
}

/// `sha256hex(body + path + salt_key) + "###" + salt_index`, sent as
/// `X-VERIFY`. Callbacks are signed the same way without the path.
pub fn request_checksum(body: &str, path: &str, salt_key: &str, salt_index: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(body.as_bytes());
    hasher.update(path.as_bytes());
    hasher.update(salt_key.as_bytes());
    format!("{}###{}", hex::encode(hasher.finalize()), salt_index)
}

pub fn callback_checksum(response_b64: &str, salt_key: &str, salt_index: &str) -> String {
    request_checksum(response_b64, "", salt_key, salt_index)
}

fn transport_error(e: reqwest::Error) -> GatewayError {
    if e.is_timeout() {
        GatewayError::Timeout
    } else {
        GatewayError::Transport(e.to_string())
    }
}

#[async_trait]
impl PaymentGateway for PhonePeClient {
    async fn initiate(&self, request: PayRequest) -> Result<PayResponse, GatewayError> {
        let payload = PayPayload {
            merchant_id: &self.merchant_id,
            merchant_transaction_id: &request.merchant_order_id,
            merchant_user_id: &request.merchant_user_id,
            amount: request.amount_paise,
            redirect_url: &self.redirect_url,
            redirect_mode: "POST",
            callback_url: &self.callback_url,
            mobile_number: request.mobile_number.as_deref(),
            payment_instrument: PaymentInstrument { kind: "PAY_PAGE" },
        };

        let json = serde_json::to_vec(&payload)
            .map_err(|e| GatewayError::Malformed(format!("could not encode pay request: {}", e)))?;
        let encoded = STANDARD.encode(json);

        let response = self
            .http
            .post(format!("{}{}", self.base_url, PAY_PATH))
            .header("X-VERIFY", self.sign(&encoded, PAY_PATH))
            .json(&serde_json::json!({ "request": encoded }))
            .send()
            .await
            .map_err(transport_error)?;

        let status = response.status();
        let body: PayApiResponse = response
            .json()
            .await
            .map_err(|e| GatewayError::Malformed(format!("HTTP {}: {}", status, e)))?;

        if !body.success {
            return Err(GatewayError::Rejected {
                code: body.code,
                message: body.message.unwrap_or_default(),
            });
        }

        let redirect_url = body
            .data
            .and_then(|data| data.instrument_response)
            .and_then(|instrument| instrument.redirect_info)
            .map(|info| info.url)
            .ok_or_else(|| GatewayError::Malformed("no redirect URL in pay response".to_string()))?;

        tracing::debug!("PhonePe order {} initiated", request.merchant_order_id);

        Ok(PayResponse { redirect_url })
    }

    async fn order_status(&self, merchant_order_id: &str) -> Result<GatewayReport, GatewayError> {
        let path = format!("/pg/v1/status/{}/{}", self.merchant_id, merchant_order_id);

        let response = self
            .http
            .get(format!("{}{}", self.base_url, path))
            .header("X-VERIFY", self.sign("", &path))
            .header("X-MERCHANT-ID", &self.merchant_id)
            .send()
            .await
            .map_err(transport_error)?;

        let status = response.status();
        let body: GatewayResponse = response
            .json()
            .await
            .map_err(|e| GatewayError::Malformed(format!("HTTP {}: {}", status, e)))?;

        GatewayReport::try_from(body)
    }

    fn verify_callback(&self, payload: &str, checksum: &str) -> bool {
        let expected = callback_checksum(payload, &self.salt_key, &self.salt_index);
        expected.as_bytes().ct_eq(checksum.trim().as_bytes()).into()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const PAYLOAD: &str = "eyJtZXJjaGFudFRyYW5zYWN0aW9uSWQiOiJUWE4xXzAwMDAwMDAwIn0=";

    fn config() -> PhonePeConfig {
        PhonePeConfig {
            enabled: true,
            merchant_id: Some("CLUBMID".to_string()),
            salt_key: Some("salt-key".to_string()),
            salt_index: Some("1".to_string()),
            base_url: Some("https://api-preprod.phonepe.com/apis/pg-sandbox/".to_string()),
            callback_url: Some("http://localhost:8080/api/payments/callback".to_string()),
            redirect_url: Some("http://localhost:8080/".to_string()),
            timeout_secs: 5,
        }
    }

    #[test]
    fn pay_request_checksum_covers_the_path() {
        assert_eq!(
            request_checksum(PAYLOAD, PAY_PATH, "salt-key", "1"),
            "8e0797dbab266a5df1d330c2bf6a81bad7a89e9dabe40f6e577c88ca99a10d36###1"
        );
    }

    #[test]
    fn status_checksum_signs_the_path_alone() {
        assert_eq!(
            request_checksum("", "/pg/v1/status/CLUBMID/TXN1_00000000", "salt-key", "1"),
            "6366a1c671b5f55993ab657d3c2ffc426bb4a0ff1aaedb1bd15f17ef4eb761c5###1"
        );
    }

    #[test]
    fn callback_verification() {
        let client = PhonePeClient::from_config(&config()).unwrap();
        let valid = "1338be07e3a901dc9f76308b0440ba69c74391edfcbb1c87e44a6475dbc98783###1";

        assert_eq!(callback_checksum(PAYLOAD, "salt-key", "1"), valid);
        assert!(client.verify_callback(PAYLOAD, valid));
        assert!(!client.verify_callback(PAYLOAD, &valid.replace("###1", "###2")));
        assert!(!client.verify_callback("eyJ0YW1wZXJlZCI6dHJ1ZX0=", valid));
        assert!(!client.verify_callback(PAYLOAD, ""));
    }

    #[test]
    fn incomplete_config_disables_the_client() {
        let mut cfg = config();
        cfg.salt_key = None;
        assert!(PhonePeClient::from_config(&cfg).is_none());

        let mut cfg = config();
        cfg.enabled = false;
        assert!(PhonePeClient::from_config(&cfg).is_none());
    }

    #[test]
    fn base_url_is_normalised() {
        let client = PhonePeClient::from_config(&config()).unwrap();
        assert_eq!(client.base_url, "https://api-preprod.phonepe.com/apis/pg-sandbox");
    }
}

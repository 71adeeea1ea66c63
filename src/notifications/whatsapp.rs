use async_trait::async_trait;
use chrono::Local;
use std::time::Duration;

use crate::{
    config::WhatsAppConfig,
    error::{AppError, Result},
    notifications::{NotificationChannel, NotificationEvent},
};

/// Sends WhatsApp messages through the Twilio Messages API.
pub struct WhatsAppChannel {
    config: WhatsAppConfig,
    http: reqwest::Client,
}

impl WhatsAppChannel {
    pub fn new(config: Option<WhatsAppConfig>) -> Option<Self> {
        let cfg = config.filter(|cfg| cfg.enabled)?;

        let http = match reqwest::Client::builder()
            .timeout(Duration::from_secs(10))
            .build()
        {
            Ok(client) => client,
            Err(e) => {
                tracing::error!("Failed to build WhatsApp HTTP client: {}", e);
                return None;
            }
        };

        Some(Self { config: cfg, http })
    }

    async fn send_message(&self, phone_number: &str, body: &str) -> Result<()> {
        let Some(to) = format_whatsapp_number(phone_number) else {
            tracing::warn!("Invalid WhatsApp recipient {:?}; message skipped", phone_number);
            return Ok(());
        };

        let url = format!(
            "{}/2010-04-01/Accounts/{}/Messages.json",
            self.config.api_base.trim_end_matches('/'),
            self.config.account_sid
        );
        let from = format_whatsapp_number(&self.config.from_number)
            .unwrap_or_else(|| self.config.from_number.clone());

        let response = self
            .http
            .post(&url)
            .basic_auth(&self.config.account_sid, Some(&self.config.auth_token))
            .form(&[("Body", body), ("From", from.as_str()), ("To", to.as_str())])
            .send()
            .await
            .map_err(|e| AppError::ServiceUnavailable(format!("WhatsApp send failed: {}", e)))?;

        if !response.status().is_success() {
            return Err(AppError::ServiceUnavailable(format!(
                "WhatsApp send rejected with status {}",
                response.status()
            )));
        }

        tracing::info!("Queued WhatsApp message to {}", to);
        Ok(())
    }
}

/// Twilio wants `whatsapp:+<country><number>`. Numbers without a country
/// code cannot be routed and yield `None`.
pub fn format_whatsapp_number(phone_number: &str) -> Option<String> {
    let sanitized: String = phone_number.trim().chars().filter(|c| !c.is_whitespace()).collect();

    if sanitized.is_empty() {
        return None;
    }
    if sanitized.starts_with("whatsapp:") {
        return Some(sanitized);
    }
    if !sanitized.starts_with('+') {
        tracing::warn!("Phone number {} missing country code", phone_number);
        return None;
    }

    Some(format!("whatsapp:{}", sanitized))
}

pub fn message_body(event: &NotificationEvent) -> String {
    match event {
        NotificationEvent::PaymentReceived { payer, transaction } => {
            let paid_on = transaction
                .payment_date
                .unwrap_or_else(|| Local::now().date_naive());
            format!(
                "Hi {}, we received your payment of ₹{} for {} on {}. Thank you!",
                payer.first_name,
                transaction.amount,
                transaction.category.label(),
                paid_on
            )
        }
        NotificationEvent::PayerOnboarded(payer) => format!(
            "Welcome to the club, {}! Your membership and subscription are now active. \
             Admission invoice will appear in your account shortly.",
            payer.first_name
        ),
    }
}

#[async_trait]
impl NotificationChannel for WhatsAppChannel {
    fn name(&self) -> &str {
        "WhatsApp"
    }

    fn is_enabled(&self) -> bool {
        self.config.enabled
    }

    async fn health_check(&self) -> Result<()> {
        if self.config.account_sid.is_empty() || self.config.auth_token.is_empty() {
            return Err(AppError::ServiceUnavailable("Twilio credentials not configured".to_string()));
        }
        if self.config.from_number.is_empty() {
            return Err(AppError::ServiceUnavailable("WhatsApp sender number not configured".to_string()));
        }
        Ok(())
    }

    async fn send(&self, event: &NotificationEvent) -> Result<()> {
        let phone_number = match event {
            NotificationEvent::PaymentReceived { payer, .. } => payer.phone_number.as_deref(),
            NotificationEvent::PayerOnboarded(payer) => payer.phone_number.as_deref(),
        };

        let Some(phone_number) = phone_number else {
            tracing::debug!("Payer has no phone number; {} notification skipped", event.kind());
            return Ok(());
        };

        self.send_message(phone_number, &message_body(event)).await
    }
}

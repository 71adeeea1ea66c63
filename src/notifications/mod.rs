use async_trait::async_trait;
use std::sync::Arc;
use tokio::sync::RwLock;
use crate::domain::{Payer, Transaction};
use crate::error::Result;

pub mod whatsapp;

#[derive(Debug, Clone)]
pub enum NotificationEvent {
    /// A ledger entry flipped from unpaid to paid.
    PaymentReceived { payer: Payer, transaction: Transaction },
    PayerOnboarded(Payer),
}

impl NotificationEvent {
    pub fn kind(&self) -> &'static str {
        match self {
            NotificationEvent::PaymentReceived { .. } => "payment_received",
            NotificationEvent::PayerOnboarded(_) => "payer_onboarded",
        }
    }
}

#[async_trait]
pub trait NotificationChannel: Send + Sync {
    fn name(&self) -> &str;
    fn is_enabled(&self) -> bool;
    async fn health_check(&self) -> Result<()>;
    async fn send(&self, event: &NotificationEvent) -> Result<()>;
}

/// Fans events out to every registered channel. Delivery is best effort:
/// a failing channel is logged and never surfaces to the caller, so a
/// settled payment stays settled whatever happens here.
pub struct NotificationDispatcher {
    channels: RwLock<Vec<Arc<dyn NotificationChannel>>>,
}

impl NotificationDispatcher {
    pub fn new() -> Self {
        Self {
            channels: RwLock::new(Vec::new()),
        }
    }

    pub async fn register(&self, channel: Arc<dyn NotificationChannel>) {
        if channel.is_enabled() {
            tracing::info!("Registered notification channel: {}", channel.name());
            self.channels.write().await.push(channel);
        }
    }

    pub async fn dispatch(&self, event: NotificationEvent) {
        let channels = self.channels.read().await;

        if channels.is_empty() {
            tracing::debug!("No notification channels registered; dropping {} event", event.kind());
            return;
        }

        for channel in channels.iter() {
            if !channel.is_enabled() {
                continue;
            }

            match channel.send(&event).await {
                Ok(_) => {
                    tracing::debug!(
                        "Channel {} delivered {} notification",
                        channel.name(),
                        event.kind()
                    );
                }
                Err(e) => {
                    tracing::error!(
                        "Channel {} failed to deliver {} notification: {:?}",
                        channel.name(),
                        event.kind(),
                        e
                    );
                }
            }
        }
    }

    pub async fn health_check_all(&self) -> Vec<(String, Result<()>)> {
        let channels = self.channels.read().await;
        let mut results = Vec::new();

        for channel in channels.iter() {
            let name = channel.name().to_string();
            let result = channel.health_check().await;
            results.push((name, result));
        }

        results
    }
}

impl Default for NotificationDispatcher {
    fn default() -> Self {
        Self::new()
    }
}

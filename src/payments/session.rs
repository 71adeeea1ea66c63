use base64::{engine::general_purpose::STANDARD, Engine as _};
use rust_decimal::{prelude::ToPrimitive, Decimal};
use serde::Serialize;
use std::{sync::Arc, time::Duration};

use crate::{
    domain::{self, Payer, Transaction},
    ledger::LedgerStore,
    payments::{
        gateway::{GatewayError, GatewayReport, GatewayResponse, GatewayState, PayRequest, PaymentGateway},
        order_id, PaymentError,
    },
};

#[derive(Debug, Clone, Serialize)]
pub struct PaymentInitiation {
    pub payment_url: String,
    pub merchant_order_id: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct CallbackOutcome {
    pub transaction_id: i64,
    pub merchant_order_id: String,
    pub state: GatewayState,
    /// True only for the call that moved the transaction to paid.
    pub newly_settled: bool,
}

impl CallbackOutcome {
    pub fn status(&self) -> &'static str {
        self.state.as_str()
    }
}

/// Initiates payments against the gateway and reconciles what it reports
/// back. No session state is stored: the merchant order id carries the
/// transaction id and the transaction's paid flag is the only record of a
/// completed payment.
pub struct PaymentSessionManager {
    ledger: Arc<LedgerStore>,
    gateway: Arc<dyn PaymentGateway>,
    timeout: Duration,
}

impl PaymentSessionManager {
    pub fn new(ledger: Arc<LedgerStore>, gateway: Arc<dyn PaymentGateway>, timeout: Duration) -> Self {
        Self {
            ledger,
            gateway,
            timeout,
        }
    }

    pub async fn initiate_payment(
        &self,
        transaction_id: i64,
        payer: &Payer,
    ) -> Result<PaymentInitiation, PaymentError> {
        let transaction = self.owned_transaction(transaction_id, payer).await?;
        if transaction.paid {
            return Err(PaymentError::AlreadyPaid);
        }

        let amount_paise = to_paise(transaction.amount).ok_or(PaymentError::NothingToPay(transaction.id))?;

        let merchant_order_id = order_id::mint(transaction.id);
        let request = PayRequest {
            merchant_order_id: merchant_order_id.clone(),
            amount_paise,
            merchant_user_id: format!("MU{}", payer.id.simple()),
            mobile_number: payer.phone_number.clone(),
        };

        let response = match tokio::time::timeout(self.timeout, self.gateway.initiate(request)).await {
            Ok(Ok(response)) => response,
            Ok(Err(e)) => {
                tracing::error!("Payment initiation for transaction {} failed: {}", transaction.id, e);
                return Err(PaymentError::InitiationFailed(e.to_string()));
            }
            Err(_) => {
                tracing::error!(
                    "Payment initiation for transaction {} timed out after {:?}",
                    transaction.id,
                    self.timeout
                );
                return Err(PaymentError::InitiationFailed(GatewayError::Timeout.to_string()));
            }
        };

        tracing::info!(
            "Payment {} initiated for transaction {} ({} paise)",
            merchant_order_id,
            transaction.id,
            amount_paise
        );

        Ok(PaymentInitiation {
            payment_url: response.redirect_url,
            merchant_order_id,
        })
    }

    /// Verifies and applies a gateway callback. `payload` is the base64
    /// body exactly as received; nothing is read or written until the
    /// checksum matches.
    pub async fn reconcile_callback(
        &self,
        payload: &str,
        checksum: &str,
    ) -> Result<CallbackOutcome, PaymentError> {
        let payload = payload.trim();

        if !self.gateway.verify_callback(payload, checksum) {
            tracing::warn!("Rejected payment callback with an invalid checksum");
            return Err(PaymentError::InvalidSignature);
        }

        let decoded = STANDARD
            .decode(payload)
            .map_err(|e| PaymentError::InvalidPayload(format!("not base64: {}", e)))?;
        let response: GatewayResponse = serde_json::from_slice(&decoded)
            .map_err(|e| PaymentError::InvalidPayload(format!("not a gateway response: {}", e)))?;
        let report = GatewayReport::try_from(response)
            .map_err(|e| PaymentError::InvalidPayload(e.to_string()))?;

        self.settle(report).await
    }

    /// Asks the gateway directly, for payers who return before the
    /// callback has arrived.
    pub async fn poll_status(
        &self,
        merchant_order_id: &str,
        payer: &Payer,
    ) -> Result<CallbackOutcome, PaymentError> {
        let transaction_id = order_id::transaction_id(merchant_order_id)
            .ok_or_else(|| PaymentError::NotFound(merchant_order_id.to_string()))?;
        let transaction = self.owned_transaction(transaction_id, payer).await?;

        if transaction.paid {
            return Ok(CallbackOutcome {
                transaction_id,
                merchant_order_id: merchant_order_id.to_string(),
                state: GatewayState::Completed,
                newly_settled: false,
            });
        }

        let report = match tokio::time::timeout(self.timeout, self.gateway.order_status(merchant_order_id)).await {
            Ok(Ok(report)) => report,
            Ok(Err(e)) => return Err(PaymentError::StatusUnavailable(e.to_string())),
            Err(_) => return Err(PaymentError::StatusUnavailable(GatewayError::Timeout.to_string())),
        };

        if report.merchant_order_id != merchant_order_id {
            return Err(PaymentError::InvalidPayload(format!(
                "status response is for order {}",
                report.merchant_order_id
            )));
        }

        self.settle(report).await
    }

    async fn owned_transaction(&self, transaction_id: i64, payer: &Payer) -> Result<Transaction, PaymentError> {
        let transaction = self
            .ledger
            .find_transaction(transaction_id)
            .await?
            .ok_or_else(|| PaymentError::NotFound(transaction_id.to_string()))?;

        if transaction.payer_id != payer.id {
            tracing::warn!(
                "Payer {} attempted to pay transaction {} owned by {}",
                payer.id,
                transaction.id,
                transaction.payer_id
            );
            return Err(PaymentError::Forbidden);
        }

        Ok(transaction)
    }

    async fn settle(&self, report: GatewayReport) -> Result<CallbackOutcome, PaymentError> {
        let transaction_id = order_id::transaction_id(&report.merchant_order_id).ok_or_else(|| {
            PaymentError::InvalidPayload(format!("unrecognised merchant order id {}", report.merchant_order_id))
        })?;

        let mut tx = self.ledger.begin().await?;

        let Some(transaction) = tx.find_transaction(transaction_id).await? else {
            tx.rollback().await?;
            return Err(PaymentError::NotFound(transaction_id.to_string()));
        };

        if let (Some(reported), Some(expected)) = (report.amount_paise, to_paise(transaction.amount)) {
            if reported != expected {
                tracing::warn!(
                    "Gateway reported {} paise for transaction {} which is due {} paise",
                    reported,
                    transaction_id,
                    expected
                );
            }
        }

        let newly_settled = if report.state == GatewayState::Completed {
            let settlement = tx.mark_paid(transaction_id, domain::today()).await?;
            tx.commit().await?;
            if !settlement.newly_settled() {
                tracing::debug!("Transaction {} was already paid; callback ignored", transaction_id);
            }
            settlement.newly_settled()
        } else {
            tx.rollback().await?;
            tracing::info!(
                "Payment {} for transaction {} reported {} ({})",
                report.merchant_order_id,
                transaction_id,
                report.state.as_str(),
                report.code
            );
            false
        };

        Ok(CallbackOutcome {
            transaction_id,
            merchant_order_id: report.merchant_order_id,
            state: report.state,
            newly_settled,
        })
    }
}

/// `None` when there is nothing to charge.
fn to_paise(amount: Decimal) -> Option<i64> {
    (amount * Decimal::ONE_HUNDRED).round().to_i64().filter(|paise| *paise > 0)
}

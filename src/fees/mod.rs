use chrono::NaiveDate;
use rust_decimal::Decimal;

use crate::{
    config::BillingConfig,
    domain::{NewTransaction, Participation, Payer, Sale, Tournament, Transaction, TransactionCategory},
    error::Result,
    ledger::LedgerTx,
};

#[derive(Debug, Clone)]
pub struct FeeSchedule {
    pub admission_fee: Decimal,
}

impl From<&BillingConfig> for FeeSchedule {
    fn from(config: &BillingConfig) -> Self {
        Self {
            admission_fee: config.admission_fee,
        }
    }
}

/// A domain write that may carry a fee. Rules are pure; the write path
/// calls [`apply`] with the same [`LedgerTx`] it used for its own row, so
/// the entity and its fee commit or roll back together. Payer updates are
/// not events: re-saving a payer never charges anything.
#[derive(Debug, Clone, Copy)]
pub enum DomainEvent<'a> {
    PayerCreated {
        payer: &'a Payer,
        on: NaiveDate,
    },
    ParticipationCreated {
        participation: &'a Participation,
        tournament: &'a Tournament,
        on: NaiveDate,
    },
    SaleRecorded {
        sale: &'a Sale,
        unit_price: Decimal,
    },
}

pub fn fee_for(event: &DomainEvent<'_>, schedule: &FeeSchedule) -> Option<NewTransaction> {
    match *event {
        // onboarding: one admission fee, only ever on creation
        DomainEvent::PayerCreated { payer, on } => Some(NewTransaction::unpaid(
            payer.id,
            TransactionCategory::Registration,
            schedule.admission_fee,
            on,
        )),
        DomainEvent::ParticipationCreated {
            participation,
            tournament,
            on,
        } => Some(NewTransaction::unpaid(
            participation.payer_id,
            TransactionCategory::Tournament,
            tournament.entry_fee,
            on,
        )),
        // point of sale: settled immediately, no gateway round trip
        DomainEvent::SaleRecorded { sale, unit_price } => Some(NewTransaction::settled(
            sale.payer_id,
            TransactionCategory::Merchandise,
            unit_price * Decimal::from(sale.quantity),
            sale.sale_date,
        )),
    }
}

/// Evaluates the rule for `event` and writes its entry, if any, into `tx`.
pub async fn apply(
    tx: &mut LedgerTx<'_>,
    event: &DomainEvent<'_>,
    schedule: &FeeSchedule,
) -> Result<Option<Transaction>> {
    match fee_for(event, schedule) {
        Some(new) => Ok(Some(tx.insert_transaction(new).await?)),
        None => Ok(None),
    }
}

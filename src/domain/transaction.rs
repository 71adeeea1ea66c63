use chrono::{DateTime, Datelike, NaiveDate, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Ledger categories. The set is closed: the schema rejects anything else.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "lowercase")]
pub enum TransactionCategory {
    Registration,
    Monthly,
    Tournament,
    Merchandise,
}

impl TransactionCategory {
    pub fn as_str(&self) -> &'static str {
        match self {
            TransactionCategory::Registration => "registration",
            TransactionCategory::Monthly => "monthly",
            TransactionCategory::Tournament => "tournament",
            TransactionCategory::Merchandise => "merchandise",
        }
    }

    /// Human-readable label used in notifications.
    pub fn label(&self) -> &'static str {
        match self {
            TransactionCategory::Registration => "Registration Fee",
            TransactionCategory::Monthly => "Monthly Fee",
            TransactionCategory::Tournament => "Tournament Fee",
            TransactionCategory::Merchandise => "Merchandise",
        }
    }
}

impl std::str::FromStr for TransactionCategory {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "registration" => Ok(TransactionCategory::Registration),
            "monthly" => Ok(TransactionCategory::Monthly),
            "tournament" => Ok(TransactionCategory::Tournament),
            "merchandise" => Ok(TransactionCategory::Merchandise),
            _ => Err(format!("Invalid transaction category: {}", s)),
        }
    }
}

/// A single ledger entry. `payment_date` is set exactly when `paid` is.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Transaction {
    pub id: i64,
    pub payer_id: Uuid,
    pub category: TransactionCategory,
    pub amount: Decimal,
    pub due_date: NaiveDate,
    pub paid: bool,
    pub payment_date: Option<NaiveDate>,
    pub created_at: DateTime<Utc>,
}

/// A ledger entry that has not been written yet.
#[derive(Debug, Clone, PartialEq)]
pub struct NewTransaction {
    pub payer_id: Uuid,
    pub category: TransactionCategory,
    pub amount: Decimal,
    pub due_date: NaiveDate,
    pub payment_date: Option<NaiveDate>,
}

impl NewTransaction {
    pub fn unpaid(
        payer_id: Uuid,
        category: TransactionCategory,
        amount: Decimal,
        due_date: NaiveDate,
    ) -> Self {
        Self {
            payer_id,
            category,
            amount,
            due_date,
            payment_date: None,
        }
    }

    /// An entry settled on the spot, e.g. a point-of-sale purchase.
    pub fn settled(
        payer_id: Uuid,
        category: TransactionCategory,
        amount: Decimal,
        date: NaiveDate,
    ) -> Self {
        Self {
            payer_id,
            category,
            amount,
            due_date: date,
            payment_date: Some(date),
        }
    }

    pub fn is_paid(&self) -> bool {
        self.payment_date.is_some()
    }
}

/// Administrative correction of a ledger entry. The amount is not
/// editable, and a paid entry cannot be made unpaid again.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct TransactionUpdate {
    pub due_date: Option<NaiveDate>,
    pub paid: Option<bool>,
    pub payment_date: Option<NaiveDate>,
}

/// The (payer, year, month) key under which at most one monthly invoice exists.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct BillingPeriod {
    pub payer_id: Uuid,
    pub year: i32,
    pub month: u32,
}

impl BillingPeriod {
    pub fn of(payer_id: Uuid, date: NaiveDate) -> Self {
        Self {
            payer_id,
            year: date.year(),
            month: date.month(),
        }
    }

    /// `YYYY-MM`, the prefix of every due date inside this period.
    pub fn month_key(&self) -> String {
        format!("{:04}-{:02}", self.year, self.month)
    }
}

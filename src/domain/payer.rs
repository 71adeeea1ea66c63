use chrono::{DateTime, NaiveDate, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;
use validator::Validate;

/// A club member who owes or pays ledger entries.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Payer {
    pub id: Uuid,
    pub first_name: String,
    pub last_name: String,
    /// Contact handle used for payment notifications and as the login id.
    pub phone_number: Option<String>,
    pub is_admin: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Payer {
    pub fn full_name(&self) -> String {
        format!("{} {}", self.first_name, self.last_name)
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub enum MembershipStatus {
    Pending,
    Active,
    Inactive,
}

impl MembershipStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            MembershipStatus::Pending => "Pending",
            MembershipStatus::Active => "Active",
            MembershipStatus::Inactive => "Inactive",
        }
    }
}

impl std::str::FromStr for MembershipStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "Pending" => Ok(MembershipStatus::Pending),
            "Active" => Ok(MembershipStatus::Active),
            "Inactive" => Ok(MembershipStatus::Inactive),
            _ => Err(format!("Invalid membership status: {}", s)),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Membership {
    pub payer_id: Uuid,
    pub join_date: NaiveDate,
    pub status: MembershipStatus,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Subscription {
    pub payer_id: Uuid,
    /// `None` when no rate is configured or the stored value is unreadable;
    /// such a payer is not billable.
    pub monthly_rate: Option<Decimal>,
    pub start_date: NaiveDate,
}

#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct CreatePayerRequest {
    #[validate(length(min = 1, max = 50))]
    pub first_name: String,
    #[validate(length(min = 1, max = 50))]
    pub last_name: String,
    #[validate(length(min = 6, max = 20))]
    pub phone_number: Option<String>,
    #[validate(length(min = 8))]
    #[serde(skip_serializing)]
    pub password: Option<String>,
    #[serde(default)]
    pub is_admin: bool,
    /// Overrides the configured default monthly rate.
    pub monthly_rate: Option<Decimal>,
}

#[derive(Debug, Clone, Serialize, Deserialize, Default, Validate)]
pub struct UpdatePayerRequest {
    #[validate(length(min = 1, max = 50))]
    pub first_name: Option<String>,
    #[validate(length(min = 1, max = 50))]
    pub last_name: Option<String>,
    #[validate(length(min = 6, max = 20))]
    pub phone_number: Option<String>,
    pub is_admin: Option<bool>,
}

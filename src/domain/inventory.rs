use chrono::{DateTime, NaiveDate, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;
use validator::Validate;

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum ItemType {
    TeamKit,
    Merchandise,
}

impl ItemType {
    pub fn as_str(&self) -> &'static str {
        match self {
            ItemType::TeamKit => "team_kit",
            ItemType::Merchandise => "merchandise",
        }
    }
}

impl std::str::FromStr for ItemType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "team_kit" => Ok(ItemType::TeamKit),
            "merchandise" => Ok(ItemType::Merchandise),
            _ => Err(format!("Invalid item type: {}", s)),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InventoryItem {
    pub id: Uuid,
    pub name: String,
    pub description: String,
    pub item_type: ItemType,
    /// Only merchandise carries a price.
    pub price: Option<Decimal>,
    pub quantity: i64,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Sale {
    pub id: Uuid,
    pub item_id: Uuid,
    pub payer_id: Uuid,
    pub quantity: i64,
    pub sale_date: NaiveDate,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct CreateItemRequest {
    #[validate(length(min = 1, max = 100))]
    pub name: String,
    #[serde(default)]
    pub description: String,
    pub item_type: ItemType,
    pub price: Option<Decimal>,
    #[validate(range(min = 0))]
    #[serde(default)]
    pub quantity: i64,
}

#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct RecordSaleRequest {
    pub item_id: Uuid,
    pub payer_id: Uuid,
    #[validate(range(min = 1))]
    pub quantity: i64,
    /// Defaults to today.
    pub sale_date: Option<NaiveDate>,
}

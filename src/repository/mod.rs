use async_trait::async_trait;
use uuid::Uuid;
use crate::domain::*;
use crate::error::Result;

pub mod payer_repository;
pub mod transaction_repository;
pub mod tournament_repository;
pub mod inventory_repository;

pub use payer_repository::SqlitePayerRepository;
pub use transaction_repository::SqliteTransactionRepository;
pub use tournament_repository::SqliteTournamentRepository;
pub use inventory_repository::SqliteInventoryRepository;

// Read paths and single-statement writes live behind these traits. Writes
// that must commit together with a ledger entry are associated functions
// on the Sqlite* types taking the caller's `&mut SqliteConnection`.

#[async_trait]
pub trait PayerRepository: Send + Sync {
    async fn find_by_id(&self, id: Uuid) -> Result<Option<Payer>>;
    async fn find_by_phone(&self, phone_number: &str) -> Result<Option<Payer>>;
    async fn list(&self, limit: i64, offset: i64) -> Result<Vec<Payer>>;
    async fn update(&self, id: Uuid, update: UpdatePayerRequest) -> Result<Payer>;
    async fn membership(&self, payer_id: Uuid) -> Result<Option<Membership>>;
    async fn subscription(&self, payer_id: Uuid) -> Result<Option<Subscription>>;
    async fn password_hash(&self, phone_number: &str) -> Result<Option<String>>;
}

#[async_trait]
pub trait TransactionRepository: Send + Sync {
    async fn find_by_id(&self, id: i64) -> Result<Option<Transaction>>;
    async fn list_by_payer(&self, payer_id: Uuid) -> Result<Vec<Transaction>>;
    async fn list(&self, limit: i64, offset: i64) -> Result<Vec<Transaction>>;
}

#[async_trait]
pub trait TournamentRepository: Send + Sync {
    async fn create(&self, request: CreateTournamentRequest) -> Result<Tournament>;
    async fn find_by_id(&self, id: Uuid) -> Result<Option<Tournament>>;
    async fn list(&self) -> Result<Vec<Tournament>>;
    async fn participants(&self, tournament_id: Uuid) -> Result<Vec<Participation>>;
}

#[async_trait]
pub trait InventoryRepository: Send + Sync {
    async fn create_item(&self, request: CreateItemRequest) -> Result<InventoryItem>;
    async fn find_item(&self, id: Uuid) -> Result<Option<InventoryItem>>;
    async fn list_items(&self) -> Result<Vec<InventoryItem>>;
    async fn sales_for_payer(&self, payer_id: Uuid) -> Result<Vec<Sale>>;
}

/// Decimal amounts are stored as TEXT at currency scale.
pub(crate) fn amount_to_text(amount: &rust_decimal::Decimal) -> String {
    let mut scaled = amount.round_dp(2);
    scaled.rescale(2);
    scaled.to_string()
}

pub(crate) fn parse_amount(s: &str) -> Result<rust_decimal::Decimal> {
    s.parse::<rust_decimal::Decimal>()
        .map_err(|e| crate::error::AppError::Database(format!("Invalid amount {:?}: {}", s, e)))
}

pub(crate) fn parse_uuid(s: &str) -> Result<Uuid> {
    Uuid::parse_str(s).map_err(|e| crate::error::AppError::Database(e.to_string()))
}

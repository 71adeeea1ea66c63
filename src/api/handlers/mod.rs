pub mod auth;
pub mod billing;
pub mod inventory;
pub mod payers;
pub mod payments;
pub mod root;
pub mod tournaments;
pub mod transactions;

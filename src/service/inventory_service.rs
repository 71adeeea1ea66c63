use rust_decimal::Decimal;
use serde::Serialize;
use std::sync::Arc;
use validator::Validate;

use crate::{
    domain::{self, CreateItemRequest, InventoryItem, ItemType, RecordSaleRequest, Sale, Transaction},
    error::{AppError, Result},
    fees::{self, DomainEvent, FeeSchedule},
    ledger::LedgerStore,
    repository::{InventoryRepository, SqliteInventoryRepository, SqlitePayerRepository},
};

#[derive(Debug, Clone, Serialize)]
pub struct RecordedSale {
    pub sale: Sale,
    pub transaction: Option<Transaction>,
}

pub struct InventoryService {
    ledger: Arc<LedgerStore>,
    repo: Arc<dyn InventoryRepository>,
    schedule: FeeSchedule,
}

impl InventoryService {
    pub fn new(ledger: Arc<LedgerStore>, repo: Arc<dyn InventoryRepository>, schedule: FeeSchedule) -> Self {
        Self { ledger, repo, schedule }
    }

    pub async fn create_item(&self, request: CreateItemRequest) -> Result<InventoryItem> {
        request.validate()?;

        match (request.item_type, request.price) {
            (_, Some(price)) if price < Decimal::ZERO => {
                return Err(AppError::Validation("Price cannot be negative".to_string()));
            }
            (ItemType::Merchandise, None) => {
                return Err(AppError::Validation("Merchandise needs a price".to_string()));
            }
            _ => {}
        }

        self.repo.create_item(request).await
    }

    /// Records a point-of-sale transaction; the charge is settled on the
    /// sale date.
    pub async fn record_sale(&self, request: RecordSaleRequest) -> Result<RecordedSale> {
        request.validate()?;

        let sale_date = request.sale_date.unwrap_or_else(domain::today);
        let mut tx = self.ledger.begin().await?;

        let item = SqliteInventoryRepository::find_item_in(tx.conn(), request.item_id)
            .await?
            .ok_or_else(|| AppError::NotFound("Item not found".to_string()))?;
        if SqlitePayerRepository::find_in(tx.conn(), request.payer_id).await?.is_none() {
            return Err(AppError::NotFound("Payer not found".to_string()));
        }

        let unit_price = match (item.item_type, item.price) {
            (ItemType::Merchandise, Some(price)) => price,
            _ => {
                return Err(AppError::BadRequest(format!(
                    "{} is not priced merchandise and cannot be sold",
                    item.name
                )));
            }
        };

        let sale = SqliteInventoryRepository::insert_sale(
            tx.conn(),
            item.id,
            request.payer_id,
            request.quantity,
            sale_date,
        )
        .await?;
        let transaction = fees::apply(&mut tx, &DomainEvent::SaleRecorded { sale: &sale, unit_price }, &self.schedule).await?;

        tx.commit().await?;

        tracing::info!(
            "Sold {} x {} to payer {}",
            sale.quantity,
            item.name,
            sale.payer_id
        );

        Ok(RecordedSale { sale, transaction })
    }
}

use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, NaiveDateTime, Utc};
use sqlx::{FromRow, SqliteConnection, SqlitePool};
use uuid::Uuid;

use crate::{
    domain::{CreateItemRequest, InventoryItem, Sale},
    error::{AppError, Result},
    repository::{amount_to_text, parse_amount, parse_uuid, InventoryRepository},
};

#[derive(FromRow)]
struct ItemRow {
    id: String,
    name: String,
    description: String,
    item_type: String,
    price: Option<String>,
    quantity: i64,
    created_at: NaiveDateTime,
}

#[derive(FromRow)]
struct SaleRow {
    id: String,
    item_id: String,
    payer_id: String,
    quantity: i64,
    sale_date: NaiveDate,
    created_at: NaiveDateTime,
}

pub struct SqliteInventoryRepository {
    pool: SqlitePool,
}

impl SqliteInventoryRepository {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    fn row_to_item(row: ItemRow) -> Result<InventoryItem> {
        Ok(InventoryItem {
            id: parse_uuid(&row.id)?,
            name: row.name,
            description: row.description,
            item_type: row.item_type.parse().map_err(AppError::Database)?,
            price: row.price.as_deref().map(parse_amount).transpose()?,
            quantity: row.quantity,
            created_at: DateTime::from_naive_utc_and_offset(row.created_at, Utc),
        })
    }

    fn row_to_sale(row: SaleRow) -> Result<Sale> {
        Ok(Sale {
            id: parse_uuid(&row.id)?,
            item_id: parse_uuid(&row.item_id)?,
            payer_id: parse_uuid(&row.payer_id)?,
            quantity: row.quantity,
            sale_date: row.sale_date,
            created_at: DateTime::from_naive_utc_and_offset(row.created_at, Utc),
        })
    }

    pub async fn find_item_in(conn: &mut SqliteConnection, id: Uuid) -> Result<Option<InventoryItem>> {
        let row = sqlx::query_as::<_, ItemRow>(
            r#"
            SELECT id, name, description, item_type, price, quantity, created_at
            FROM inventory_items
            WHERE id = ?
            "#
        )
        .bind(id.to_string())
        .fetch_optional(&mut *conn)
        .await?;

        row.map(Self::row_to_item).transpose()
    }

    pub async fn insert_sale(
        conn: &mut SqliteConnection,
        item_id: Uuid,
        payer_id: Uuid,
        quantity: i64,
        sale_date: NaiveDate,
    ) -> Result<Sale> {
        let id = Uuid::new_v4();
        let now = Utc::now();

        sqlx::query(
            r#"
            INSERT INTO sales (id, item_id, payer_id, quantity, sale_date, created_at)
            VALUES (?, ?, ?, ?, ?, ?)
            "#
        )
        .bind(id.to_string())
        .bind(item_id.to_string())
        .bind(payer_id.to_string())
        .bind(quantity)
        .bind(sale_date)
        .bind(now.naive_utc())
        .execute(&mut *conn)
        .await?;

        Ok(Sale {
            id,
            item_id,
            payer_id,
            quantity,
            sale_date,
            created_at: now,
        })
    }
}

#[async_trait]
impl InventoryRepository for SqliteInventoryRepository {
    async fn create_item(&self, request: CreateItemRequest) -> Result<InventoryItem> {
        let id = Uuid::new_v4();

        sqlx::query(
            r#"
            INSERT INTO inventory_items (id, name, description, item_type, price, quantity, created_at)
            VALUES (?, ?, ?, ?, ?, ?, ?)
            "#
        )
        .bind(id.to_string())
        .bind(&request.name)
        .bind(&request.description)
        .bind(request.item_type.as_str())
        .bind(request.price.as_ref().map(amount_to_text))
        .bind(request.quantity)
        .bind(Utc::now().naive_utc())
        .execute(&self.pool)
        .await?;

        self.find_item(id).await?.ok_or_else(|| {
            AppError::Database("Failed to retrieve created item".to_string())
        })
    }

    async fn find_item(&self, id: Uuid) -> Result<Option<InventoryItem>> {
        let mut conn = self.pool.acquire().await?;
        Self::find_item_in(&mut conn, id).await
    }

    async fn list_items(&self) -> Result<Vec<InventoryItem>> {
        let rows = sqlx::query_as::<_, ItemRow>(
            r#"
            SELECT id, name, description, item_type, price, quantity, created_at
            FROM inventory_items
            ORDER BY name
            "#
        )
        .fetch_all(&self.pool)
        .await?;

        rows.into_iter().map(Self::row_to_item).collect()
    }

    async fn sales_for_payer(&self, payer_id: Uuid) -> Result<Vec<Sale>> {
        let rows = sqlx::query_as::<_, SaleRow>(
            r#"
            SELECT id, item_id, payer_id, quantity, sale_date, created_at
            FROM sales
            WHERE payer_id = ?
            ORDER BY sale_date DESC
            "#
        )
        .bind(payer_id.to_string())
        .fetch_all(&self.pool)
        .await?;

        rows.into_iter().map(Self::row_to_sale).collect()
    }
}

use axum::{
    extract::{Extension, State},
    http::StatusCode,
    Json,
};

use crate::{
    api::{middleware::auth::CurrentUser, state::AppState},
    domain::{CreateItemRequest, InventoryItem, RecordSaleRequest, Sale},
    error::Result,
    service::inventory_service::RecordedSale,
};

pub async fn list_items(State(state): State<AppState>) -> Result<Json<Vec<InventoryItem>>> {
    let items = state.service_context.inventory_repo.list_items().await?;
    Ok(Json(items))
}

pub async fn create_item(
    State(state): State<AppState>,
    Json(request): Json<CreateItemRequest>,
) -> Result<(StatusCode, Json<InventoryItem>)> {
    let item = state.service_context.inventory_service
        .create_item(request)
        .await?;

    Ok((StatusCode::CREATED, Json(item)))
}

pub async fn record_sale(
    State(state): State<AppState>,
    Json(request): Json<RecordSaleRequest>,
) -> Result<(StatusCode, Json<RecordedSale>)> {
    let sale = state.service_context.inventory_service
        .record_sale(request)
        .await?;

    Ok((StatusCode::CREATED, Json(sale)))
}

/// Purchases made by the signed-in payer.
pub async fn my_sales(
    State(state): State<AppState>,
    Extension(user): Extension<CurrentUser>,
) -> Result<Json<Vec<Sale>>> {
    let sales = state.service_context.inventory_repo
        .sales_for_payer(user.payer.id)
        .await?;

    Ok(Json(sales))
}

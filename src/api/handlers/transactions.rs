use axum::{
    extract::{Extension, Path, State},
    http::StatusCode,
    Json,
};
use chrono::NaiveDate;
use rust_decimal::Decimal;
use serde::Deserialize;
use uuid::Uuid;

use crate::{
    api::{middleware::auth::CurrentUser, state::AppState},
    domain::{self, NewTransaction, Transaction, TransactionCategory, TransactionUpdate},
    error::{AppError, Result},
};

pub async fn list_mine(
    State(state): State<AppState>,
    Extension(user): Extension<CurrentUser>,
) -> Result<Json<Vec<Transaction>>> {
    let transactions = state.service_context.transaction_repo
        .list_by_payer(user.payer.id)
        .await?;

    Ok(Json(transactions))
}

pub async fn get(
    State(state): State<AppState>,
    Extension(user): Extension<CurrentUser>,
    Path(id): Path<i64>,
) -> Result<Json<Transaction>> {
    let transaction = state.service_context.transaction_repo
        .find_by_id(id)
        .await?
        .ok_or_else(|| AppError::NotFound("Transaction not found".to_string()))?;

    if transaction.payer_id != user.payer.id && !user.payer.is_admin {
        return Err(AppError::Forbidden);
    }

    Ok(Json(transaction))
}

#[derive(Debug, Deserialize)]
pub struct CreateTransactionRequest {
    pub payer_id: Uuid,
    pub category: TransactionCategory,
    pub amount: Decimal,
    pub due_date: NaiveDate,
    #[serde(default)]
    pub paid: bool,
    pub payment_date: Option<NaiveDate>,
}

/// Manual ledger entry, e.g. a fee taken in cash at the ground.
pub async fn create(
    State(state): State<AppState>,
    Json(request): Json<CreateTransactionRequest>,
) -> Result<(StatusCode, Json<Transaction>)> {
    let ctx = &state.service_context;

    if ctx.payer_repo.find_by_id(request.payer_id).await?.is_none() {
        return Err(AppError::NotFound("Payer not found".to_string()));
    }

    let payment_date = match (request.paid, request.payment_date) {
        (true, date) => Some(date.unwrap_or_else(domain::today)),
        (false, None) => None,
        (false, Some(_)) => {
            return Err(AppError::BadRequest(
                "payment_date can only be set on a paid transaction".to_string(),
            ));
        }
    };

    let mut tx = ctx.ledger.begin().await?;
    let transaction = tx
        .insert_transaction(NewTransaction {
            payer_id: request.payer_id,
            category: request.category,
            amount: request.amount,
            due_date: request.due_date,
            payment_date,
        })
        .await?;
    tx.commit().await?;

    Ok((StatusCode::CREATED, Json(transaction)))
}

pub async fn update(
    State(state): State<AppState>,
    Path(id): Path<i64>,
    Json(update): Json<TransactionUpdate>,
) -> Result<Json<Transaction>> {
    let mut tx = state.service_context.ledger.begin().await?;
    let transaction = tx.update_transaction(id, update).await?;
    tx.commit().await?;

    Ok(Json(transaction))
}

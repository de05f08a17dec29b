use axum::extract::{Query, State};
use axum::Json;
use database::{wallet, Role, Wallet, WalletTransaction};
use serde::{Deserialize, Serialize};

use crate::context::Caller;
use crate::error::{ApiError, Result};
use crate::state::AppState;

const RECENT_TRANSACTIONS: i64 = 20;

#[derive(Debug, Default, Deserialize)]
pub struct WalletQuery {
    /// Admin only.
    student_id: Option<i64>,
}

#[derive(Debug, Serialize)]
pub struct WalletView {
    /// `null` until the student's first booking or top-up.
    pub wallet: Option<Wallet>,
    pub transactions: Vec<WalletTransaction>,
}

pub async fn show(
    State(state): State<AppState>,
    Caller(ctx): Caller,
    Query(query): Query<WalletQuery>,
) -> Result<Json<WalletView>> {
    let student_id = match (ctx.role, query.student_id) {
        (Role::Student, _) => ctx.user_id,
        (Role::Admin, Some(id)) => id,
        (Role::Admin, None) => return Err(ApiError::BadRequest("student_id is required".to_string())),
        (Role::Teacher, _) => return Err(ApiError::Forbidden("only students have wallets")),
    };

    let pool = state.db.pool();
    Ok(Json(WalletView {
        wallet: wallet::get_wallet(pool, student_id).await?,
        transactions: wallet::list_transactions(pool, student_id, RECENT_TRANSACTIONS).await?,
    }))
}

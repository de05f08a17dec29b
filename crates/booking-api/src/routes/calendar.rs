//! Calendar OAuth connection flow.

use axum::extract::{Query, State};
use axum::http::StatusCode;
use axum::Json;
use database::CalendarAccount;
use serde::{Deserialize, Serialize};

use crate::context::Caller;
use crate::error::{ApiError, Result};
use crate::state::AppState;

#[derive(Debug, Serialize)]
pub struct AuthorizationStart {
    pub url: String,
}

pub async fn start(State(state): State<AppState>, Caller(ctx): Caller) -> Result<Json<AuthorizationStart>> {
    let url = state.authorizer.start(ctx.user_id).await?;
    Ok(Json(AuthorizationStart { url }))
}

#[derive(Debug, Deserialize)]
pub struct CallbackQuery {
    code: Option<String>,
    state: Option<String>,
    /// Set by the provider when the user declined.
    error: Option<String>,
}

/// Provider redirect target. The state token, not a caller header,
/// identifies the user.
pub async fn callback(
    State(state): State<AppState>,
    Query(query): Query<CallbackQuery>,
) -> Result<Json<CalendarAccount>> {
    if let Some(error) = query.error {
        return Err(ApiError::BadRequest(format!("authorization denied: {}", error)));
    }
    let (Some(code), Some(oauth_state)) = (query.code, query.state) else {
        return Err(ApiError::BadRequest("code and state are required".to_string()));
    };

    Ok(Json(state.authorizer.complete(&code, &oauth_state).await?))
}

pub async fn disconnect(State(state): State<AppState>, Caller(ctx): Caller) -> Result<StatusCode> {
    if state.authorizer.disconnect(ctx.user_id).await? {
        Ok(StatusCode::NO_CONTENT)
    } else {
        Err(calendar_sync::CalendarError::NotConnected(ctx.user_id).into())
    }
}

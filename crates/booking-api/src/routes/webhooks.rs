use axum::body::Bytes;
use axum::extract::State;
use axum::http::HeaderMap;
use axum::Json;
use billing_ingress::IngressOutcome;
use serde::Serialize;
use tracing::warn;

use crate::error::Result;
use crate::state::AppState;

pub const SIGNATURE_HEADER: &str = "billing-signature";

#[derive(Debug, Serialize)]
pub struct Received {
    outcome: IngressOutcome,
}

/// Billing provider callback. The body is verified byte for byte, so it is
/// taken raw rather than as JSON.
pub async fn billing(State(state): State<AppState>, headers: HeaderMap, body: Bytes) -> Result<Json<Received>> {
    let signature = headers.get(SIGNATURE_HEADER).and_then(|v| v.to_str().ok());
    let outcome = state.ingress.receive(&body, signature).await.map_err(|e| {
        warn!(error = %e, "Rejected billing webhook");
        e
    })?;
    Ok(Json(Received { outcome }))
}

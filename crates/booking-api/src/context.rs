//! Caller identity supplied by the upstream auth layer.

use axum::async_trait;
use axum::extract::FromRequestParts;
use axum::http::request::Parts;
use booking_engine::RequestContext;
use database::Role;

use crate::error::ApiError;

pub const USER_ID_HEADER: &str = "x-user-id";
pub const USER_ROLE_HEADER: &str = "x-user-role";

/// Authenticated caller, stamped with the server clock.
#[derive(Debug, Clone, Copy)]
pub struct Caller(pub RequestContext);

impl Caller {
    pub fn require(&self, role: Role, reason: &'static str) -> Result<(), ApiError> {
        if self.0.role == role {
            Ok(())
        } else {
            Err(ApiError::Forbidden(reason))
        }
    }
}

#[async_trait]
impl<S> FromRequestParts<S> for Caller
where
    S: Send + Sync,
{
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        let header = |name: &'static str| {
            parts
                .headers
                .get(name)
                .and_then(|v| v.to_str().ok())
                .map(str::trim)
                .filter(|v| !v.is_empty())
        };

        let user_id: i64 = header(USER_ID_HEADER)
            .ok_or(ApiError::Unauthenticated("missing X-User-Id"))?
            .parse()
            .map_err(|_| ApiError::Unauthenticated("malformed X-User-Id"))?;
        let role: Role = header(USER_ROLE_HEADER)
            .ok_or(ApiError::Unauthenticated("missing X-User-Role"))?
            .parse()
            .map_err(|_| ApiError::Unauthenticated("unknown X-User-Role"))?;

        Ok(Caller(RequestContext::local_now(user_id, role)))
    }
}

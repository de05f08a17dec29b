//! OAuth authorization flow for connecting a calendar.

use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use database::{calendar_account, CalendarAccount, Database};
use tracing::{info, warn};

use crate::error::CalendarError;
use crate::provider::CalendarProvider;

/// How long an issued state token can be redeemed.
pub const STATE_TTL: Duration = Duration::from_secs(600);

/// Issues anti-forgery states and redeems authorization codes.
#[derive(Clone)]
pub struct CalendarAuthorizer {
    db: Database,
    provider: Arc<dyn CalendarProvider>,
}

impl CalendarAuthorizer {
    pub fn new(db: Database, provider: Arc<dyn CalendarProvider>) -> Self {
        Self { db, provider }
    }

    /// Consent URL for `user_id`. The embedded state is stored for the callback.
    pub async fn start(&self, user_id: i64) -> Result<String, CalendarError> {
        let state = uuid::Uuid::new_v4().simple().to_string();
        let url = self.provider.authorization_url(&state)?;
        calendar_account::create_oauth_state(self.db.pool(), &state, user_id).await?;
        Ok(url)
    }

    /// Redeem the callback parameters and store tokens for the user who
    /// started the flow.
    pub async fn complete(&self, code: &str, state: &str) -> Result<CalendarAccount, CalendarError> {
        let user_id = calendar_account::take_oauth_state(self.db.pool(), state, STATE_TTL)
            .await?
            .ok_or(CalendarError::InvalidState)?;

        let grant = self.provider.exchange_code(code).await.inspect_err(|e| {
            warn!(user_id, error = %e, "Calendar code exchange failed");
        })?;

        // Providers omit the refresh token when consent was granted before.
        let refresh_token = match grant.refresh_token {
            Some(token) => token,
            None => calendar_account::get_account(self.db.pool(), user_id)
                .await?
                .map(|account| account.refresh_token)
                .ok_or_else(|| CalendarError::Provider {
                    status: 400,
                    message: "token response carried no refresh token".to_string(),
                })?,
        };

        let expires_at = Utc::now() + chrono::Duration::seconds(grant.expires_in);
        let account = calendar_account::save_tokens(
            self.db.pool(),
            user_id,
            &grant.access_token,
            &refresh_token,
            expires_at,
        )
        .await?;

        info!(user_id, "Calendar connected");
        Ok(account)
    }

    /// Remove stored credentials. Returns whether an account existed.
    pub async fn disconnect(&self, user_id: i64) -> Result<bool, CalendarError> {
        Ok(calendar_account::disconnect(self.db.pool(), user_id).await?)
    }

    /// Drop states that can no longer be redeemed.
    pub async fn prune_states(&self) -> Result<u64, CalendarError> {
        Ok(calendar_account::prune_oauth_states(self.db.pool(), STATE_TTL).await?)
    }
}

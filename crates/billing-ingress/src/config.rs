//! Billing ingress settings.

use std::env;

use crate::signature::DEFAULT_TOLERANCE_SECS;

/// Webhook verification settings.
#[derive(Clone, Default)]
pub struct IngressConfig {
    /// Shared secret. Without one, signatures are not checked.
    pub webhook_secret: Option<String>,
    pub tolerance_secs: i64,
}

impl IngressConfig {
    pub fn new(webhook_secret: Option<String>) -> Self {
        Self {
            webhook_secret,
            tolerance_secs: DEFAULT_TOLERANCE_SECS,
        }
    }

    /// Reads `BILLING_WEBHOOK_SECRET` and `BILLING_WEBHOOK_TOLERANCE_SECS`.
    pub fn from_env() -> Self {
        let webhook_secret = env::var("BILLING_WEBHOOK_SECRET")
            .ok()
            .filter(|s| !s.trim().is_empty());
        let tolerance_secs = env::var("BILLING_WEBHOOK_TOLERANCE_SECS")
            .ok()
            .and_then(|v| v.parse().ok())
            .unwrap_or(DEFAULT_TOLERANCE_SECS);
        Self {
            webhook_secret,
            tolerance_secs,
        }
    }
}

impl std::fmt::Debug for IngressConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("IngressConfig")
            .field("webhook_secret", &self.webhook_secret.as_ref().map(|_| "[redacted]"))
            .field("tolerance_secs", &self.tolerance_secs)
            .finish()
    }
}

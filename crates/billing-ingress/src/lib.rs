//! Billing provider webhook ingress.
//!
//! Verifies `t=..,v1=..` HMAC-SHA256 signatures, parses the provider's
//! `{id, type, data: {object}}` envelope and dispatches by event type:
//!
//! | Event type | Effect |
//! |------------|--------|
//! | `checkout.session.completed` | credit the wallet (`mode=payment`) or activate a subscription |
//! | `invoice.paid` | credit the wallet, clear the payment-failed flag |
//! | `invoice.payment_failed` | flag the subscription |
//! | `customer.subscription.updated` | update status and billing-cycle day |
//! | `customer.subscription.deleted` | mark cancelled |
//!
//! Deliveries are at-least-once. Event ids are recorded in the same
//! transaction as their effects, and wallet credits carry the session or
//! invoice id as their ledger reference.

pub mod config;
pub mod error;
pub mod event;
pub mod ingress;
pub mod signature;

pub use config::IngressConfig;
pub use error::IngressError;
pub use event::{WebhookEvent, WebhookEventData};
pub use ingress::{BillingIngress, IngressOutcome};

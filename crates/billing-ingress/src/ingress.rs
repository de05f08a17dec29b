//! Event dispatch and idempotent handlers.

use database::{billing_event, subscription, wallet, Database, Posting, SubscriptionStatus};
use serde::Serialize;
use sqlx::SqliteConnection;
use tracing::{debug, info, warn};

use crate::config::IngressConfig;
use crate::error::IngressError;
use crate::event::WebhookEvent;
use crate::signature;

/// Outcome of webhook processing.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum IngressOutcome {
    /// Event was applied.
    Processed,
    /// Event type or content not relevant here; nothing recorded.
    Ignored,
    /// Event id was applied before.
    AlreadyProcessed,
}

/// Accepts billing-provider callbacks and reconciles wallets and
/// subscriptions.
///
/// Each event is applied in one transaction together with the record of
/// its id, so a redelivered event changes nothing.
#[derive(Clone)]
pub struct BillingIngress {
    db: Database,
    config: IngressConfig,
}

impl BillingIngress {
    pub fn new(db: Database, config: IngressConfig) -> Self {
        if config.webhook_secret.is_none() {
            warn!("No billing webhook secret configured; signatures will not be verified");
        }
        Self { db, config }
    }

    /// Verify the signature header (when a secret is configured) and parse
    /// the raw body.
    pub fn verify(&self, payload: &[u8], signature_header: Option<&str>) -> Result<WebhookEvent, IngressError> {
        if let Some(secret) = &self.config.webhook_secret {
            let header = signature_header.ok_or(IngressError::MissingSignature)?;
            let now = chrono::Utc::now().timestamp();
            signature::verify(secret, payload, header, now, self.config.tolerance_secs)?;
        }
        WebhookEvent::parse(payload)
    }

    /// Verify then handle a raw delivery.
    pub async fn receive(&self, payload: &[u8], signature_header: Option<&str>) -> Result<IngressOutcome, IngressError> {
        let event = self.verify(payload, signature_header)?;
        self.handle_event(&event).await
    }

    /// Apply a verified event at most once.
    pub async fn handle_event(&self, event: &WebhookEvent) -> Result<IngressOutcome, IngressError> {
        let mut tx = self.db.begin().await?;

        // Recording the id first also takes the write lock, so two
        // deliveries of the same event cannot both pass this point.
        if !billing_event::mark_processed(&mut tx, &event.id, &event.event_type).await? {
            debug!(event_id = %event.id, "Billing event already processed");
            return Ok(IngressOutcome::AlreadyProcessed);
        }

        let outcome = match event.event_type.as_str() {
            "checkout.session.completed" => checkout_completed(&mut tx, event).await?,
            "invoice.paid" => invoice_paid(&mut tx, event).await?,
            "invoice.payment_failed" => payment_failed(&mut tx, event).await?,
            "customer.subscription.updated" => subscription_updated(&mut tx, event).await?,
            "customer.subscription.deleted" => subscription_deleted(&mut tx, event).await?,
            _ => IngressOutcome::Ignored,
        };

        // Ignored events are not recorded; dropping the transaction undoes the mark.
        if outcome == IngressOutcome::Processed {
            tx.commit().await?;
            info!(event_id = %event.id, event_type = %event.event_type, "Billing event processed");
        } else {
            debug!(event_id = %event.id, event_type = %event.event_type, "Billing event ignored");
        }

        Ok(outcome)
    }
}

fn log_posting(event: &WebhookEvent, posting: &Posting) {
    let row = posting.transaction();
    if posting.was_applied() {
        info!(
            event_id = %event.id,
            student_id = row.student_id,
            amount_cents = row.amount_cents,
            reference = %row.reference,
            "Wallet credited"
        );
    } else {
        debug!(event_id = %event.id, reference = %row.reference, "Wallet credit already applied");
    }
}

async fn checkout_completed(conn: &mut SqliteConnection, event: &WebhookEvent) -> Result<IngressOutcome, IngressError> {
    let session_id = event.require_str("id")?;
    let student_id = event.require_student_id()?;

    match event.str_field("mode").unwrap_or("payment") {
        "payment" => {
            let amount = event.require_amount("amount_total")?;
            if amount <= 0 {
                return Ok(IngressOutcome::Ignored);
            }
            let posting = wallet::credit(
                &mut *conn,
                student_id,
                amount,
                &format!("checkout:{}", session_id),
                "Wallet top-up",
            )
            .await?;
            log_posting(event, &posting);
        }
        "subscription" => {
            let external_id = event.require_str("subscription")?;
            let cycle_day = event.cycle_day("billing_cycle_anchor").unwrap_or(1);
            let sub = subscription::activate(&mut *conn, student_id, external_id, cycle_day).await?;
            info!(
                student_id,
                subscription_id = %sub.external_subscription_id,
                billing_cycle_day = sub.billing_cycle_day,
                "Subscription activated"
            );
        }
        other => {
            debug!(event_id = %event.id, mode = other, "Unhandled checkout mode");
            return Ok(IngressOutcome::Ignored);
        }
    }

    Ok(IngressOutcome::Processed)
}

async fn invoice_paid(conn: &mut SqliteConnection, event: &WebhookEvent) -> Result<IngressOutcome, IngressError> {
    let invoice_id = event.require_str("id")?;
    let amount = event.require_amount("amount_paid")?;
    let external_id = event.str_field("subscription");

    let restored = match external_id {
        Some(id) => subscription::set_payment_failed(&mut *conn, id, false).await?,
        None => None,
    };

    let student_id = match restored.as_ref().map(|s| s.student_id).or_else(|| event.student_id()) {
        Some(id) => id,
        None => {
            warn!(event_id = %event.id, invoice_id, "Paid invoice matches no student");
            return Ok(IngressOutcome::Ignored);
        }
    };

    if amount > 0 {
        let posting = wallet::credit(
            &mut *conn,
            student_id,
            amount,
            &format!("invoice:{}", invoice_id),
            "Monthly credit replenishment",
        )
        .await?;
        log_posting(event, &posting);
    }

    Ok(IngressOutcome::Processed)
}

async fn payment_failed(conn: &mut SqliteConnection, event: &WebhookEvent) -> Result<IngressOutcome, IngressError> {
    let external_id = event.require_str("subscription")?;
    match subscription::set_payment_failed(&mut *conn, external_id, true).await? {
        Some(sub) => {
            warn!(
                student_id = sub.student_id,
                subscription_id = external_id,
                "Subscription payment failed"
            );
            Ok(IngressOutcome::Processed)
        }
        None => {
            warn!(event_id = %event.id, subscription_id = external_id, "Payment failure for unknown subscription");
            Ok(IngressOutcome::Ignored)
        }
    }
}

/// Provider status names that still grant access.
fn is_active_status(status: &str) -> bool {
    matches!(status, "active" | "trialing" | "past_due")
}

async fn subscription_updated(conn: &mut SqliteConnection, event: &WebhookEvent) -> Result<IngressOutcome, IngressError> {
    let external_id = event.require_str("id")?;
    let status = if is_active_status(event.require_str("status")?) {
        SubscriptionStatus::Active
    } else {
        SubscriptionStatus::Cancelled
    };
    let cycle_day = event
        .object_has("billing_cycle_anchor")
        .then(|| event.cycle_day("billing_cycle_anchor"))
        .flatten();

    match subscription::update_status(&mut *conn, external_id, status, cycle_day).await? {
        Some(sub) => {
            info!(subscription_id = external_id, status = ?sub.status, "Subscription updated");
            Ok(IngressOutcome::Processed)
        }
        None => {
            warn!(event_id = %event.id, subscription_id = external_id, "Update for unknown subscription");
            Ok(IngressOutcome::Ignored)
        }
    }
}

async fn subscription_deleted(conn: &mut SqliteConnection, event: &WebhookEvent) -> Result<IngressOutcome, IngressError> {
    let external_id = event.require_str("id")?;
    match subscription::update_status(&mut *conn, external_id, SubscriptionStatus::Cancelled, None).await? {
        Some(_) => {
            info!(subscription_id = external_id, "Subscription cancelled");
            Ok(IngressOutcome::Processed)
        }
        None => {
            warn!(event_id = %event.id, subscription_id = external_id, "Deletion of unknown subscription");
            Ok(IngressOutcome::Ignored)
        }
    }
}

//! Application state shared across handlers.

use std::sync::Arc;
use std::time::Duration;

use billing_ingress::{BillingIngress, IngressConfig};
use booking_engine::{BookingOrchestrator, EngineConfig, SlotResolver};
use calendar_sync::{
    CalendarAuthorizer, CalendarError, CalendarProvider, CalendarSync, DisabledProvider, HttpCalendarProvider,
};
use database::Database;
use tracing::info;

/// Shared application state.
#[derive(Clone)]
pub struct AppState {
    pub db: Database,
    pub engine: BookingOrchestrator,
    pub resolver: SlotResolver,
    pub ingress: BillingIngress,
    pub authorizer: CalendarAuthorizer,
}

impl AppState {
    /// Wire every component to one database and calendar provider.
    pub fn new(
        db: Database,
        provider: Arc<dyn CalendarProvider>,
        calendar_timeout: Duration,
        engine: EngineConfig,
        ingress: IngressConfig,
    ) -> Self {
        let calendar = CalendarSync::new(db.clone(), provider.clone(), calendar_timeout);
        Self {
            engine: BookingOrchestrator::new(db.clone(), calendar, engine),
            resolver: SlotResolver::new(db.clone()),
            ingress: BillingIngress::new(db.clone(), ingress),
            authorizer: CalendarAuthorizer::new(db.clone(), provider),
            db,
        }
    }

    /// Build state from loaded configuration.
    pub fn from_config(db: Database, config: &crate::config::Config) -> Result<Self, CalendarError> {
        let (provider, timeout): (Arc<dyn CalendarProvider>, _) = match &config.calendar {
            Some(calendar) => {
                info!(calendar_id = %calendar.calendar_id, "Calendar sync enabled");
                (Arc::new(HttpCalendarProvider::new(calendar.clone())?), calendar.timeout)
            }
            None => {
                info!("Calendar sync disabled");
                // Answers without I/O, so the timeout never fires.
                (Arc::new(DisabledProvider), Duration::from_secs(1))
            }
        };
        Ok(Self::new(
            db,
            provider,
            timeout,
            config.engine.clone(),
            config.ingress.clone(),
        ))
    }
}

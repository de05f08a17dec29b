//! Lesson booking engine.
//!
//! This crate turns a teacher's recurring weekly availability into bookable
//! slots and commits bookings against concurrent requests.
//!
//! # Architecture
//!
//! ```text
//! BookingRequest + RequestContext
//!          ↓
//! ┌─────────────────────────────────────────────────────────────┐
//! │                   BOOKING ORCHESTRATOR                      │
//! │                                                             │
//! │  1. Validate input (no database access)                     │
//! │         ↓                                                   │
//! │  2. One transaction:                                        │
//! │     • re-check feasibility against stored rules + bookings  │
//! │     • duplicate-start guard                                 │
//! │     • consume trial credit, or debit the wallet             │
//! │     • insert booking row                                    │
//! │         ↓                                                   │
//! │  3. Commit                                                  │
//! │         ↓                                                   │
//! │  4. Calendar sync on a detached task, bounded wait          │
//! └─────────────────────────────────────────────────────────────┘
//! ```
//!
//! Slot views ([`SlotResolver`]) use the same pure functions as step 2 and
//! are advisory only.
//!
//! # Example
//!
//! ```rust,no_run
//! use booking_engine::{BookingOrchestrator, BookingRequest, EngineConfig, RequestContext};
//! use calendar_sync::CalendarSync;
//! use database::{Database, Role};
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let db = Database::connect("sqlite:lessons.db?mode=rwc").await?;
//! db.migrate().await?;
//!
//! let engine = BookingOrchestrator::new(db.clone(), CalendarSync::disabled(db), EngineConfig::default());
//! let ctx = RequestContext::local_now(7, Role::Student);
//! let outcome = engine
//!     .book(&ctx, &BookingRequest::new(3, "2030-01-07", "10:00", "11:00"))
//!     .await?;
//! println!("booked #{} (trial: {})", outcome.booking.id, outcome.trial);
//! # Ok(())
//! # }
//! ```

pub mod config;
pub mod context;
pub mod error;
pub mod orchestrator;
pub mod pricing;
pub mod resolver;
pub mod slot;
pub mod validation;

pub use config::{ConfigError, EngineConfig};
pub use context::RequestContext;
pub use error::{BookingError, ErrorKind, ValidationError};
pub use orchestrator::{
    BookingOrchestrator, BookingOutcome, CalendarCleanup, CalendarStatus, CancellationOutcome, Refund,
};
pub use resolver::{bookable_slots, day_schedule, is_bookable, DaySchedule, SlotResolver};
pub use slot::{Slot, SlotState, TimeRange};
pub use validation::{BookingRequest, ValidatedBooking};

//! External calendar sync for booked lessons.
//!
//! Wraps a calendar provider's OAuth token lifecycle and lesson event
//! create/update/delete. Every call is bounded by a timeout and none of it
//! is ever part of a booking transaction: callers treat failures as
//! degraded results, not errors.
//!
//! # Example
//!
//! ```no_run
//! use std::sync::Arc;
//! use calendar_sync::{CalendarConfig, CalendarSync, HttpCalendarProvider};
//!
//! # async fn example(db: database::Database) -> Result<(), calendar_sync::CalendarError> {
//! let config = CalendarConfig::from_env()?;
//! let timeout = config.timeout;
//! let provider = Arc::new(HttpCalendarProvider::new(config)?);
//! let sync = CalendarSync::new(db, provider, timeout);
//!
//! let state = sync.account_state(42).await?;
//! println!("calendar of user 42: {:?}", state);
//! # Ok(())
//! # }
//! ```

pub mod config;
pub mod error;
pub mod http;
pub mod oauth;
pub mod provider;
pub mod sync;
pub mod testing;

pub use config::CalendarConfig;
pub use error::CalendarError;
pub use http::HttpCalendarProvider;
pub use oauth::CalendarAuthorizer;
pub use provider::{CalendarProvider, DisabledProvider, LessonEvent, TokenGrant};
pub use sync::{AccountState, CalendarSync, LessonSync};

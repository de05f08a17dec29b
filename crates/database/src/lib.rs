//! SQLite persistence layer for lesson booking.
//!
//! This crate provides async database operations for users, teacher
//! availability, bookings, student wallets, subscriptions and calendar
//! credentials using SQLx with SQLite.
//!
//! Every mutation of shared state (wallet balance, trial credits, booking
//! slots) is a conditional write so that concurrent requests are resolved by
//! the database, not by in-process locks. Wallet and booking functions take a
//! `&mut SqliteConnection` so callers can compose them inside one transaction.
//!
//! # Example
//!
//! ```no_run
//! use database::{Database, models::{NewUser, Role}, user};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let db = Database::connect("sqlite:lessons.db?mode=rwc").await?;
//!     db.migrate().await?;
//!
//!     let teacher = user::create_user(
//!         db.pool(),
//!         &NewUser {
//!             name: "Maria".to_string(),
//!             email: "maria@example.com".to_string(),
//!             role: Role::Teacher,
//!             hourly_rate_cents: Some(5000),
//!         },
//!     )
//!     .await?;
//!     println!("created teacher {}", teacher.id);
//!
//!     Ok(())
//! }
//! ```

pub mod availability;
pub mod billing_event;
pub mod booking;
pub mod calendar_account;
pub mod error;
pub mod models;
pub mod subscription;
pub mod user;
pub mod wallet;

pub use error::{DatabaseError, Result};
pub use models::{
    AvailabilityRule, Booking, BookingStatus, CalendarAccount, CalendarAccountStatus, DayOfWeek,
    NewAvailabilityRule, NewBooking, NewUser, Role, Subscription, SubscriptionStatus, User, Wallet,
    WalletTransaction,
};
pub use wallet::Posting;

use sqlx::sqlite::{SqliteConnectOptions, SqlitePoolOptions};
use sqlx::{Sqlite, SqlitePool, Transaction};
use std::str::FromStr;
use std::time::Duration;

/// Database connection wrapper.
#[derive(Debug, Clone)]
pub struct Database {
    pool: SqlitePool,
}

impl Database {
    /// Default pool size for database connections.
    const DEFAULT_POOL_SIZE: u32 = 20;

    /// How long a writer waits on a locked database before failing.
    const BUSY_TIMEOUT: Duration = Duration::from_secs(5);

    /// Connect to a SQLite database.
    ///
    /// The URL should be in the format `sqlite:path/to/db.sqlite?mode=rwc`.
    /// Use `?mode=rwc` to create the database file if it doesn't exist.
    ///
    /// # Example
    ///
    /// ```no_run
    /// # async fn example() -> database::Result<()> {
    /// let db = database::Database::connect("sqlite:data/lessons.db?mode=rwc").await?;
    /// # Ok(())
    /// # }
    /// ```
    pub async fn connect(url: &str) -> Result<Self> {
        Self::connect_with_pool_size(url, Self::DEFAULT_POOL_SIZE).await
    }

    /// Connect to a SQLite database with a custom pool size.
    pub async fn connect_with_pool_size(url: &str, pool_size: u32) -> Result<Self> {
        let options = SqliteConnectOptions::from_str(url)?
            .create_if_missing(true)
            .foreign_keys(true)
            .busy_timeout(Self::BUSY_TIMEOUT);

        let pool = SqlitePoolOptions::new()
            .max_connections(pool_size)
            .acquire_timeout(Duration::from_secs(30))
            .connect_with(options)
            .await?;

        tracing::info!(
            "Connected to database: {} (pool size: {})",
            url,
            pool_size
        );

        Ok(Self { pool })
    }

    /// Open a migrated in-memory database.
    ///
    /// Each SQLite connection to `:memory:` is a separate database, so the
    /// pool holds exactly one connection that never expires. Concurrent
    /// callers queue on it, which serializes their transactions.
    pub async fn in_memory() -> Result<Self> {
        let options = SqliteConnectOptions::from_str("sqlite::memory:")?.foreign_keys(true);

        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .idle_timeout(None)
            .max_lifetime(None)
            .connect_with(options)
            .await?;

        let db = Self { pool };
        db.migrate().await?;
        Ok(db)
    }

    /// Run database migrations.
    ///
    /// This should be called once after connecting to ensure the schema is up to date.
    pub async fn migrate(&self) -> Result<()> {
        tracing::info!("Running database migrations...");

        sqlx::migrate!("./migrations").run(&self.pool).await?;

        tracing::info!("Migrations complete");
        Ok(())
    }

    /// Get a reference to the connection pool.
    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }

    /// Start a transaction. Dropping it without `commit` rolls back.
    pub async fn begin(&self) -> Result<Transaction<'static, Sqlite>> {
        Ok(self.pool.begin().await?)
    }

    /// Close the database connection pool.
    pub async fn close(&self) {
        self.pool.close().await;
    }
}

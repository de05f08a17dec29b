//! HTTP route definitions.

mod availability;
mod bookings;
mod calendar;
mod health;
mod slots;
mod wallet;
mod webhooks;

use axum::routing::{delete, get, post};
use axum::Router;
use tower_http::trace::TraceLayer;

use crate::state::AppState;

/// Build the API router.
pub fn router() -> Router<AppState> {
    Router::new()
        .route("/health", get(health::health))
        // Schedule views
        .route("/api/teachers/:id/slots", get(slots::day))
        .route("/api/teachers/:id/schedule", get(slots::range))
        // Bookings
        .route("/api/bookings", get(bookings::list).post(bookings::create))
        .route("/api/bookings/:id/cancel", post(bookings::cancel))
        .route("/api/bookings/:id/complete", post(bookings::complete))
        // Availability
        .route(
            "/api/availability",
            get(availability::list)
                .post(availability::create)
                .put(availability::upsert),
        )
        .route("/api/availability/:id/toggle", post(availability::toggle))
        .route("/api/availability/:id", delete(availability::delete))
        // Wallet
        .route("/api/wallet", get(wallet::show))
        // Provider callbacks
        .route("/webhooks/billing", post(webhooks::billing))
        .route("/oauth/calendar", delete(calendar::disconnect))
        .route("/oauth/calendar/start", get(calendar::start))
        .route("/oauth/calendar/callback", get(calendar::callback))
        .layer(TraceLayer::new_for_http())
}

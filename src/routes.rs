use std::sync::Arc;

use axum::routing::{get, post, put};
use axum::Router;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;

use crate::handlers;
use crate::state::AppState;

pub fn router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/health", get(handlers::health::health))
        .route(
            "/api/profile",
            get(handlers::profile::get_profile).post(handlers::profile::update_profile),
        )
        .route(
            "/api/listings",
            get(handlers::listings::list_listings).post(handlers::listings::create_listing),
        )
        .route(
            "/api/listings/:id",
            get(handlers::listings::get_listing).patch(handlers::listings::update_listing),
        )
        .route(
            "/api/listings/:id/status",
            post(handlers::listings::set_listing_status),
        )
        .route(
            "/api/listings/:id/booked-dates",
            get(handlers::listings::booked_dates),
        )
        .route("/api/listings/:id/quote", get(handlers::listings::quote))
        .route(
            "/api/listings/:id/reviews",
            get(handlers::reviews::listing_reviews),
        )
        .route("/api/favorites", get(handlers::favorites::list_saved))
        .route(
            "/api/favorites/:listing_id",
            put(handlers::favorites::save).delete(handlers::favorites::unsave),
        )
        .route(
            "/api/bookings",
            get(handlers::bookings::list_bookings).post(handlers::bookings::create_booking),
        )
        .route("/api/bookings/events", get(handlers::bookings::events_stream))
        .route("/api/bookings/:id", get(handlers::bookings::get_booking))
        .route(
            "/api/bookings/:id/confirm",
            post(handlers::bookings::confirm_booking),
        )
        .route(
            "/api/bookings/:id/decline",
            post(handlers::bookings::decline_booking),
        )
        .route(
            "/api/bookings/:id/cancel",
            post(handlers::bookings::cancel_booking),
        )
        .route(
            "/api/bookings/:id/complete",
            post(handlers::bookings::complete_booking),
        )
        .route(
            "/api/bookings/:id/review",
            post(handlers::reviews::submit_review),
        )
        .route(
            "/api/payments/create-checkout",
            post(handlers::payments::create_checkout),
        )
        .route(
            "/api/payments/create-intent",
            post(handlers::payments::create_intent),
        )
        .route("/webhooks/stripe", post(handlers::webhook::stripe_webhook))
        .route("/api/dashboard", get(handlers::dashboard::get_dashboard))
        .route(
            "/calendar/listings/:id/feed.ics",
            get(handlers::calendar::listing_feed),
        )
        .route(
            "/calendar/:booking_id",
            get(handlers::calendar::download_ics),
        )
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
        .with_state(state)
}

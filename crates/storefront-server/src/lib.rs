//! # storefront-server
//!
//! Axum server for the storefront: license verification and issuance,
//! viewer progression, leaderboard, and live channel fan-out.
//!
//! ```text
//!   viewer app ──▶ /license/verify, /viewer/*, /leaderboard/*
//!              ◀── /events/{client_id} (SSE)  +  /live/snapshot (poll)
//!
//!   admin ──▶ /license/*, /admin/* ──▶ stores / LiveHub ──▶ viewers
//! ```

pub mod auth;
pub mod config;
pub mod error;
pub mod handlers;
pub mod hub;
pub mod state;

use axum::{
    Router,
    routing::{get, post, put},
};
use tower_http::{
    cors::{Any, CorsLayer},
    trace::TraceLayer,
};

pub use config::ServerConfig;
pub use error::{ErrorResponse, ServerError};
pub use hub::{LiveHub, PublishReport};
pub use state::AppState;

use crate::handlers::{admin, health_check, license, live, payments, viewer};

/// Build the full router
pub fn app(state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        // Health
        .route("/health", get(health_check))

        // Licensing
        .route("/license/verify", post(license::verify_license))
        .route("/license/generate", post(license::generate_license))
        .route("/license/deactivate", post(license::deactivate_license))
        .route("/license/list", get(license::list_licenses))
        .route("/license/stats", get(license::license_stats))

        // Progression
        .route("/viewer/register", post(viewer::register_viewer))
        .route("/viewer/{viewer_id}", get(viewer::get_viewer))
        .route("/viewer/activity/{viewer_id}", post(viewer::record_activity))
        .route("/leaderboard/top", get(viewer::leaderboard_top))
        .route("/leaderboard/stats", get(viewer::leaderboard_stats))

        // Live channels
        .route("/events/{client_id}", get(live::events))
        .route("/live/snapshot", get(live::snapshot))
        .route("/live/{channel}", get(live::get_channel))
        .route("/schedule", get(live::get_schedule))
        .route("/themes/current", get(live::get_theme))
        .route("/admin/content/about", get(live::get_about).put(live::put_about))
        .route("/admin/live/{channel}", put(live::publish_channel))
        .route("/admin/schedule", put(live::put_schedule))
        .route("/admin/theme", put(live::put_theme))

        // Progression admin
        .route("/admin/levels", get(admin::get_levels).put(admin::put_levels))
        .route("/admin/activities", get(admin::get_activities).put(admin::put_activities))
        .route("/admin/leaderboard", put(admin::put_leaderboard))
        .route("/admin/viewer/{viewer_id}/points", post(viewer::correct_points))

        // Payments
        .route("/checkout", post(payments::create_checkout))
        .route("/webhook/stripe", post(payments::stripe_webhook))

        .layer(cors)
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

//! Storefront HTTP Server

use std::sync::Arc;

use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use storefront_licensing::StripeCheckout;
use storefront_server::{AppState, ServerConfig, app};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load environment before reading RUST_LOG
    dotenvy::dotenv().ok();

    // Initialize tracing
    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::new(
            std::env::var("RUST_LOG").unwrap_or_else(|_| "info,tower_http=debug".into()),
        ))
        .with(tracing_subscriber::fmt::layer())
        .init();

    let config = ServerConfig::from_env();
    let mut state = AppState::new(&config);

    match StripeCheckout::from_env() {
        Ok(stripe) => {
            tracing::info!("Stripe configured");
            state = state.with_checkout(Arc::new(stripe));
        }
        Err(e) => {
            tracing::warn!(error = %e, "Stripe not configured - checkout disabled");
            tracing::warn!("  Set STRIPE_SECRET_KEY and STRIPE_WEBHOOK_SECRET in .env");
        }
    }

    if config.admin_token.is_none() {
        tracing::warn!("ADMIN_TOKEN not set - admin routes are open");
    }

    let listener = tokio::net::TcpListener::bind(&config.bind_addr).await?;

    tracing::info!(
        addr = %config.bind_addr,
        live_queue_capacity = config.live_queue_capacity,
        leaderboard_max_entries = config.leaderboard_max_entries,
        "Storefront server running"
    );

    axum::serve(listener, app(state)).await?;

    Ok(())
}

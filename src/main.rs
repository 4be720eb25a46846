use std::sync::{Arc, Mutex};
use std::time::Duration;

use tracing_subscriber::EnvFilter;

use huntstay::config::AppConfig;
use huntstay::db;
use huntstay::handlers::bookings::run_completion_sweep;
use huntstay::routes;
use huntstay::services::events::EventBus;
use huntstay::services::identity::hosted::HostedAuthProvider;
use huntstay::services::payments::stripe::StripeProvider;
use huntstay::state::AppState;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let _ = dotenvy::dotenv();

    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into()))
        .init();

    let config = AppConfig::from_env();

    anyhow::ensure!(!config.auth_url.is_empty(), "AUTH_URL must be set");
    if config.stripe_secret_key.is_empty() {
        tracing::warn!("STRIPE_SECRET_KEY is not set; payment requests will fail");
    }
    if config.stripe_webhook_secret.is_empty() {
        tracing::warn!("STRIPE_WEBHOOK_SECRET is not set; webhooks will be rejected");
    }

    let conn = db::init_db(&config.database_url)?;

    let state = Arc::new(AppState {
        db: Arc::new(Mutex::new(conn)),
        config: config.clone(),
        identity: Box::new(HostedAuthProvider::new(
            config.auth_url.clone(),
            config.auth_api_key.clone(),
        )),
        payments: Box::new(StripeProvider::new(config.stripe_secret_key.clone())),
        events: EventBus::new(),
    });

    let sweep_state = Arc::clone(&state);
    let sweep_every = Duration::from_secs(config.completion_sweep_secs.max(1));
    tokio::spawn(async move {
        let mut interval = tokio::time::interval(sweep_every);
        loop {
            interval.tick().await;
            match run_completion_sweep(&sweep_state) {
                Ok(0) => {}
                Ok(n) => tracing::info!(completed = n, "completed elapsed bookings"),
                Err(e) => tracing::error!(error = %e, "completion sweep failed"),
            }
        }
    });

    let app = routes::router(state);

    let addr = format!("0.0.0.0:{}", config.port);
    tracing::info!("starting server on {addr}");

    let listener = tokio::net::TcpListener::bind(&addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}

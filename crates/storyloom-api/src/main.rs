//! Storyloom API server entry point.

use std::sync::{Arc, Mutex};

use sqlx::postgres::PgPoolOptions;
use storyloom_core::clock::{Clock, SystemClock};
use storyloom_core::notifier::{LoggingNotifier, TurnNotifier};
use storyloom_core::repository::EventRepository;
use storyloom_core::rng::{DeterministicRng, SeededRng};
use storyloom_event_store::{InMemoryEventRepository, PgEventRepository, run_migrations};
use tracing_subscriber::EnvFilter;

use storyloom_api::config::ApiConfig;
use storyloom_api::error::AppError;
use storyloom_api::state::AppState;

#[tokio::main]
async fn main() -> Result<(), AppError> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .json()
        .init();

    tracing::info!("Starting Storyloom API server");

    let config = ApiConfig::from_env()?;
    let addr = config.socket_addr()?;

    let event_repository: Arc<dyn EventRepository> = match &config.database_url {
        Some(database_url) => {
            let pool = PgPoolOptions::new()
                .max_connections(config.database_max_connections)
                .connect(database_url)
                .await?;
            run_migrations(&pool).await.map_err(AppError::Migration)?;
            Arc::new(PgEventRepository::new(pool))
        }
        None => {
            tracing::warn!("DATABASE_URL not set; events are kept in memory and lost on exit");
            Arc::new(InMemoryEventRepository::new())
        }
    };

    let rng: Arc<Mutex<dyn DeterministicRng + Send>> = match config.rng_seed {
        Some(seed) => {
            tracing::info!(seed, "token draws use a fixed seed");
            Arc::new(Mutex::new(SeededRng::from_seed(seed)))
        }
        None => Arc::new(Mutex::new(SeededRng::from_entropy())),
    };
    let clock: Arc<dyn Clock> = Arc::new(SystemClock);
    let notifier: Arc<dyn TurnNotifier> = Arc::new(LoggingNotifier);

    let app = storyloom_api::app(AppState::new(clock, rng, event_repository, notifier));

    tracing::info!("Listening on {}", addr);
    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}

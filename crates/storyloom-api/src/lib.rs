//! HTTP surface of the Storyloom turn engine.
//!
//! Requests carry the acting player's id; authentication sits in front of
//! this service.

use axum::Router;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;

pub mod config;
pub mod error;
pub mod routes;
pub mod state;

use state::AppState;

/// Builds the application router over `state`.
pub fn app(state: AppState) -> Router {
    // TODO: restrict CORS to the web client's origin once it is deployed.
    Router::new()
        .merge(routes::health::router())
        .nest(
            "/api/v1/games",
            routes::games::router().merge(routes::turns::router()),
        )
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
        .with_state(state)
}

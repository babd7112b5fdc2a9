pub mod error;
pub mod handlers;
pub mod realtime;
pub mod routes;
pub mod scheduler;
pub mod state;

use axum::Router;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;

pub use state::AppState;

/// The full HTTP application with middleware applied.
pub fn build_app(state: AppState) -> Router {
    routes::create_router()
        .with_state(state)
        .layer(CorsLayer::permissive())
        .layer(TraceLayer::new_for_http())
}

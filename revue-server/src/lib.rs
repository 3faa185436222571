// Library exports for revue-server
// The client crate's end-to-end tests mount this router on an ephemeral port

pub mod api;
pub mod config;
pub mod db;
pub mod session;
pub mod state;

use axum::{
    routing::{get, post},
    Router,
};
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

use state::AppState;

/// Build the service router: the auth endpoints and the procedure dispatcher
pub fn router(state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        .route("/health", get(health_check))
        .route("/auth/v1/signup", post(api::auth::signup))
        .route("/auth/v1/token", post(api::auth::token))
        .route("/auth/v1/logout", post(api::auth::logout))
        .route("/rest/v1/rpc/:name", post(api::rpc::call))
        .with_state(state)
        .layer(TraceLayer::new_for_http())
        .layer(cors)
}

async fn health_check() -> &'static str {
    "OK"
}

use axum::{
    routing::{get, post},
    Router,
};
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;

pub mod handlers;
pub mod state;

pub use state::AppState;

pub fn create_app(state: AppState) -> Router {
    let cors = CorsLayer::permissive();

    Router::new()
        .route("/", get(handlers::root))
        .route("/health", get(handlers::health))
        .route("/article/info", get(handlers::article_info))
        .route("/article/save-to-feishu", post(handlers::save_to_feishu))
        .layer(TraceLayer::new_for_http())
        .layer(cors)
        .with_state(state)
}

pub mod prelude {
    pub use crate::{create_app, AppState};
    pub use mp_core::{Error, Result};
}

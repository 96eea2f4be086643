// libs/provider-cell/src/router.rs
use std::sync::Arc;

use axum::{
    middleware,
    routing::{get, post},
    Router,
};

use shared_config::AppConfig;
use shared_utils::extractor::auth_middleware;

use crate::handlers;

pub fn provider_routes(state: Arc<AppConfig>) -> Router {
    // All provider operations require authentication
    let protected_routes = Router::new()
        .route(
            "/availability",
            post(handlers::set_availability).get(handlers::my_availability),
        )
        .route("/{provider_id}", get(handlers::get_provider))
        .layer(middleware::from_fn_with_state(state.clone(), auth_middleware));

    Router::new().merge(protected_routes).with_state(state)
}

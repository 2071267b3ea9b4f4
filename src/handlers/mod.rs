pub mod cart;
pub mod health;
pub mod metrics;

pub use cart::*;
pub use health::*;
pub use metrics::*;

use axum::{middleware, routing::get, Router};
use std::sync::Arc;
use tower_http::cors::CorsLayer;

use crate::observability::{observability_middleware, Metrics};
use crate::services::NotifyingCart;

/// Build the full application router
pub fn create_app(cart: Arc<NotifyingCart>, metrics: Arc<Metrics>) -> Router {
    let metrics_for_middleware = metrics.clone();

    Router::new()
        .route("/health/status", get(health_check))
        .route("/metrics", get(metrics_handler))
        .with_state(metrics.clone())
        .merge(create_cart_router(cart, metrics))
        // Outermost layer last
        .layer(CorsLayer::permissive())
        .layer(middleware::from_fn(move |req, next| {
            observability_middleware(metrics_for_middleware.clone(), req, next)
        }))
}

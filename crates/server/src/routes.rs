//! Route configuration.

use crate::auth::require_update_key;
use crate::handlers;
use crate::metrics::metrics_handler;
use crate::state::AppState;
use axum::Router;
use axum::middleware;
use axum::routing::{get, post};
use tower_http::trace::TraceLayer;

/// Create the application router.
pub fn create_router(state: AppState) -> Router {
    let update_routes = Router::new()
        .route(
            "/deepdeepbim/api/update-revit-addin",
            post(handlers::update_revit_addin),
        )
        // Credential gate applies to the update surface only.
        .route_layer(middleware::from_fn_with_state(
            state.clone(),
            require_update_key,
        ));

    let mut router = Router::new()
        .merge(update_routes)
        // Health check (intentionally unauthenticated for load balancers/k8s probes)
        .route("/v1/health", get(handlers::health_check));

    // SECURITY: when enabled, this endpoint MUST be network-restricted
    // to authorized Prometheus scraper IPs only.
    if state.config.server.metrics_enabled {
        router = router.route("/metrics", get(metrics_handler));
    }

    router.layer(TraceLayer::new_for_http()).with_state(state)
}

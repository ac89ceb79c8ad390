//! Router assembly.
//!
//! Wraps the routes in the middleware chain. Layers added later run first,
//! so the chain below reads innermost to outermost.

use axum::{
    Router,
    body::Body,
    http::Request,
    middleware::{from_fn, from_fn_with_state},
};
use tower_http::trace::TraceLayer;

use crate::middleware::{
    create_session_layer, protected_paths_middleware, rate_limiter, request_id_middleware,
    security_headers_middleware, session_refresh_middleware,
};
use crate::routes;
use crate::state::AppState;

/// Build the full application: routes plus every middleware layer.
pub fn build_app(state: AppState) -> Router {
    let config = state.config().clone();

    let mut router = routes::routes(config.debug_endpoints)
        .layer(from_fn(protected_paths_middleware));

    if let Some(limiter) = rate_limiter(&config.rate_limit) {
        router = router.layer(limiter);
    }

    router
        .layer(from_fn_with_state(
            state.clone(),
            security_headers_middleware,
        ))
        .layer(from_fn_with_state(
            state.clone(),
            session_refresh_middleware,
        ))
        .layer(create_session_layer(&config))
        .with_state(state)
        .layer(from_fn(request_id_middleware))
        .layer(
            TraceLayer::new_for_http().make_span_with(|request: &Request<Body>| {
                tracing::info_span!(
                    "http_request",
                    method = %request.method(),
                    uri = %request.uri(),
                    request_id = tracing::field::Empty,
                )
            }),
        )
        // Sentry layers (outermost for full request coverage)
        .layer(sentry_tower::SentryHttpLayer::new().enable_transaction())
        .layer(sentry_tower::NewSentryLayer::new_from_top())
}

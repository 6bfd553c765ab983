use std::sync::Arc;

use axum::body::Body;
use axum::http::Request;
use axum::routing::get;
use axum::Router;
use http::HeaderName;
use tokio_util::sync::CancellationToken;
use tower::ServiceBuilder;
use tower_http::request_id::{MakeRequestUuid, PropagateRequestIdLayer, SetRequestIdLayer};
use tower_http::trace::TraceLayer;

use crate::core::cache_control::CacheControlRules;
use crate::storage::ObjectStore;

use super::handlers;

// ---------------------------------------------------------------------------
// Upload proxy router
// ---------------------------------------------------------------------------

pub const REQUEST_ID_HEADER: HeaderName = HeaderName::from_static("x-request-id");

/// State shared by every request handler.
///
/// Everything here is read-only after startup; the store is shared through
/// an `Arc` and the rules are never mutated.
pub struct AppState<S> {
    pub store: Arc<S>,
    pub rules: Arc<CacheControlRules>,
    pub bucket: Arc<str>,
    /// Root token; each request works on a child of it.
    pub shutdown: CancellationToken,
}

impl<S> AppState<S> {
    pub fn new(
        store: Arc<S>,
        rules: CacheControlRules,
        bucket: impl Into<Arc<str>>,
        shutdown: CancellationToken,
    ) -> Self {
        Self {
            store,
            rules: Arc::new(rules),
            bucket: bucket.into(),
            shutdown,
        }
    }
}

impl<S> Clone for AppState<S> {
    fn clone(&self) -> Self {
        Self {
            store: self.store.clone(),
            rules: self.rules.clone(),
            bucket: self.bucket.clone(),
            shutdown: self.shutdown.clone(),
        }
    }
}

/// Build the router.
///
/// Route table:
/// - `GET <healthcheck_path>`   liveness probe, 405 for other methods
/// - `POST|PUT /<key>`           upload the body as `<key>`
/// - `DELETE /<key>`             delete `<key>`
/// - anything else               405
pub fn build_router<S: ObjectStore>(state: AppState<S>, healthcheck_path: &str) -> Router {
    let middleware = ServiceBuilder::new()
        .layer(SetRequestIdLayer::new(REQUEST_ID_HEADER, MakeRequestUuid))
        .layer(
            TraceLayer::new_for_http().make_span_with(|req: &Request<Body>| {
                let request_id = req
                    .headers()
                    .get(&REQUEST_ID_HEADER)
                    .and_then(|v| v.to_str().ok())
                    .unwrap_or("-");
                tracing::info_span!(
                    "request",
                    method = %req.method(),
                    uri = %req.uri(),
                    request_id,
                )
            }),
        )
        .layer(PropagateRequestIdLayer::new(REQUEST_ID_HEADER));

    Router::new()
        .route(
            healthcheck_path,
            get(handlers::healthcheck).fallback(handlers::method_not_allowed),
        )
        .fallback(handlers::handle_object::<S>)
        .layer(middleware)
        .with_state(state)
}

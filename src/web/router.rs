//! Router configuration for the dashboard.

use axum::{
    extract::{Query, Request, State},
    http::StatusCode,
    middleware::{self, Next},
    response::{Html, IntoResponse, Response},
    routing::get,
    Router,
};
use std::sync::Arc;
use tower::ServiceBuilder;
use tower_http::trace::TraceLayer;

use super::error::ApiError;
use super::handlers::{daily_history, dashboard, get_stats, health, list_articles, AppState, KeyQuery};

/// Create the dashboard router.
///
/// Every route except `/health` requires `?key=` when a password is set.
pub fn create_router(app_state: Arc<AppState>) -> Router {
    let api_routes = Router::new()
        .route("/stats", get(get_stats))
        .route("/articles", get(list_articles))
        .route("/daily", get(daily_history));

    let protected = Router::new()
        .route("/", get(dashboard))
        .nest("/api", api_routes)
        .layer(middleware::from_fn_with_state(app_state.clone(), require_key));

    Router::new()
        .merge(protected)
        .merge(create_health_router())
        .layer(ServiceBuilder::new().layer(TraceLayer::new_for_http()))
        .with_state(app_state)
}

/// Create a health check router.
pub fn create_health_router<S: Clone + Send + Sync + 'static>() -> Router<S> {
    Router::new().route("/health", get(health))
}

/// Reject requests without the configured access key.
async fn require_key(State(state): State<Arc<AppState>>, req: Request, next: Next) -> Response {
    let key = Query::<KeyQuery>::try_from_uri(req.uri())
        .map(|Query(q)| q.key)
        .unwrap_or_default();

    if state.check_key(key.as_deref()) {
        return next.run(req).await;
    }

    tracing::warn!("Dashboard access denied for {}", req.uri().path());
    if req.uri().path().starts_with("/api") {
        ApiError::forbidden("invalid or missing key").into_response()
    } else {
        (
            StatusCode::FORBIDDEN,
            Html("<h1>Access Denied</h1><p>Add <code>?key=YOUR_PASSWORD</code> to the URL.</p>"),
        )
            .into_response()
    }
}

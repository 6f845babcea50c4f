//! Router setup and server startup.

use axum::extract::DefaultBodyLimit;
use axum::http::{header, HeaderValue, Method};
use axum::routing::{get, post};
use axum::Router;
use tower_http::compression::CompressionLayer;
use tower_http::cors::{AllowOrigin, CorsLayer};
use tower_http::trace::TraceLayer;

use tabletalk_core::error::TableTalkError;

use crate::handlers;
use crate::rate_limit::{rate_limit_middleware, RateLimiter, DEFAULT_REQUESTS_PER_SEC};
use crate::state::AppState;

/// Request bodies carry one query, so keep them small.
const MAX_BODY_BYTES: usize = 64 * 1024;

fn cors_layer(port: u16) -> CorsLayer {
    let origins: Vec<HeaderValue> = ["127.0.0.1", "localhost"]
        .iter()
        .filter_map(|host| format!("http://{}:{}", host, port).parse().ok())
        .collect();
    CorsLayer::new()
        .allow_origin(AllowOrigin::list(origins))
        .allow_methods([Method::GET, Method::POST, Method::DELETE, Method::OPTIONS])
        .allow_headers([header::CONTENT_TYPE, header::AUTHORIZATION, header::ACCEPT])
}

/// Build the router with all routes and middleware.
pub fn create_router(state: AppState) -> Router {
    let public_routes = Router::new().route("/health", get(handlers::health));

    let protected_routes = Router::new()
        .route("/dataset", get(handlers::dataset))
        .route(
            "/sessions",
            get(handlers::list_sessions).post(handlers::create_session),
        )
        .route("/sessions/{id}", axum::routing::delete(handlers::delete_session))
        .route("/sessions/{id}/turns", get(handlers::session_turns))
        .route("/sessions/{id}/query", post(handlers::submit_query))
        .route("/sessions/{id}/reset", post(handlers::reset_session))
        .layer(axum::middleware::from_fn(rate_limit_middleware))
        .layer(axum::Extension(RateLimiter::new(DEFAULT_REQUESTS_PER_SEC)))
        .route_layer(axum::middleware::from_fn_with_state(
            state.clone(),
            crate::auth::require_auth,
        ));

    public_routes
        .merge(protected_routes)
        .layer(DefaultBodyLimit::max(MAX_BODY_BYTES))
        .layer(CompressionLayer::new())
        .layer(TraceLayer::new_for_http())
        .layer(cors_layer(state.config.general.port))
        .with_state(state)
}

/// Serve the API on `127.0.0.1:{general.port}` until the process exits.
pub async fn start_server(state: AppState) -> Result<(), TableTalkError> {
    let addr = format!("127.0.0.1:{}", state.config.general.port);
    let router = create_router(state);

    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .map_err(|e| TableTalkError::Api(format!("failed to bind {}: {}", addr, e)))?;
    tracing::info!(addr = %addr, "API server listening");

    axum::serve(listener, router)
        .await
        .map_err(|e| TableTalkError::Api(format!("server error: {}", e)))?;
    Ok(())
}

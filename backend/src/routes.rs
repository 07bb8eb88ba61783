use std::sync::Arc;

use axum::body::Body;
use axum::extract::FromRef;
use axum::http::{header, HeaderValue, Method, Request};
use axum::routing::{get, patch, post};
use axum::Router;
use tower::ServiceBuilder;
use tower_http::cors::CorsLayer;
use tower_http::request_id::{
    MakeRequestId, PropagateRequestIdLayer, RequestId, SetRequestIdLayer,
};
use tower_http::trace::TraceLayer;
use uuid::Uuid;

use crate::ai::{AiAssistService, TextModel};
use crate::auth::TokenVerifier;
use crate::config::{ConfigError, DEFAULT_FRONTEND_URL};
use crate::handlers::{
    categorize_task, create_task, delete_task, get_task, health, list_tasks, parse_task, root,
    suggestions, summary, toggle_complete, update_task,
};
use crate::store::{DbPool, TaskStore};
use crate::tasks::TaskService;

#[derive(Clone, FromRef)]
pub struct AppState {
    pub tasks: TaskService,
    pub ai: AiAssistService,
    pub verifier: TokenVerifier,
}

impl AppState {
    pub fn new(pool: DbPool, model: Arc<dyn TextModel>, auth_secret: &str) -> Self {
        Self {
            tasks: TaskService::new(TaskStore::new(pool)),
            ai: AiAssistService::new(model),
            verifier: TokenVerifier::new(auth_secret),
        }
    }
}

#[derive(Debug, Clone, Copy, Default)]
struct UuidRequestId;

impl MakeRequestId for UuidRequestId {
    fn make_request_id<B>(&mut self, _request: &Request<B>) -> Option<RequestId> {
        let id = HeaderValue::from_str(&Uuid::new_v4().to_string()).ok()?;
        Some(RequestId::new(id))
    }
}

/// Allows the configured frontend plus the local development origin.
pub fn cors_layer(frontend_url: &str) -> Result<CorsLayer, ConfigError> {
    let mut origins = vec![HeaderValue::from_str(frontend_url)
        .map_err(|_| ConfigError::InvalidOrigin(frontend_url.to_string()))?];
    if frontend_url != DEFAULT_FRONTEND_URL {
        origins.push(HeaderValue::from_static(DEFAULT_FRONTEND_URL));
    }

    Ok(CorsLayer::new()
        .allow_origin(origins)
        .allow_credentials(true)
        .allow_methods([
            Method::GET,
            Method::POST,
            Method::PUT,
            Method::PATCH,
            Method::DELETE,
            Method::OPTIONS,
        ])
        .allow_headers([header::AUTHORIZATION, header::CONTENT_TYPE]))
}

pub fn router(state: AppState, cors: CorsLayer) -> Router {
    Router::new()
        .route("/", get(root))
        .route("/health", get(health))
        .route("/api/tasks", get(list_tasks).post(create_task))
        .route("/api/tasks/parse", post(parse_task))
        .route("/api/tasks/suggestions", get(suggestions))
        .route("/api/tasks/summary", get(summary))
        .route(
            "/api/tasks/:id",
            get(get_task).put(update_task).delete(delete_task),
        )
        .route("/api/tasks/:id/complete", patch(toggle_complete))
        .route("/api/tasks/:id/categorize", post(categorize_task))
        .layer(
            ServiceBuilder::new()
                .layer(SetRequestIdLayer::x_request_id(UuidRequestId))
                .layer(
                    TraceLayer::new_for_http().make_span_with(|request: &Request<Body>| {
                        let request_id = request
                            .headers()
                            .get("x-request-id")
                            .and_then(|value| value.to_str().ok())
                            .unwrap_or("-");
                        tracing::info_span!(
                            "http",
                            method = %request.method(),
                            uri = %request.uri(),
                            request_id,
                        )
                    }),
                )
                .layer(PropagateRequestIdLayer::x_request_id())
                .layer(cors),
        )
        .with_state(state)
}

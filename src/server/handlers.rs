use anyhow::{Context, Result};
use axum::body::Body;
use axum::extract::rejection::JsonRejection;
use axum::extract::State;
use axum::http::{HeaderMap, HeaderValue, Method, Request, Response, StatusCode};
use axum::middleware::Next;
use axum::response::IntoResponse;
use axum::routing::{get, post};
use axum::{Json, Router};
use std::sync::Arc;
use tracing::{info, warn};

use super::models::{ErrorResponse, ProcessRequest};
use super::state::ServerState;
use crate::classification::ZeroShotBackend;
use crate::languages::LanguageDetector;
use crate::pipeline::{Pipeline, ProcessResult};
use crate::translation::TranslationBackend;

pub(crate) struct ServerError {
    pub(crate) status: StatusCode,
    pub(crate) message: String,
}

impl ServerError {
    fn bad_request(message: impl Into<String>) -> Self {
        Self {
            status: StatusCode::BAD_REQUEST,
            message: message.into(),
        }
    }

    fn upstream(message: impl Into<String>) -> Self {
        Self {
            status: StatusCode::BAD_GATEWAY,
            message: message.into(),
        }
    }
}

impl IntoResponse for ServerError {
    fn into_response(self) -> axum::response::Response {
        (self.status, Json(ErrorResponse { error: self.message })).into_response()
    }
}

pub fn router<D, T, C>(pipeline: Pipeline<D, T, C>) -> Router
where
    D: LanguageDetector + 'static,
    T: TranslationBackend + 'static,
    C: ZeroShotBackend + 'static,
{
    let state = Arc::new(ServerState { pipeline });
    Router::new()
        .route("/health", get(health))
        .route("/process", post(process::<D, T, C>))
        .with_state(state)
        .layer(axum::middleware::from_fn(cors_middleware))
}

pub async fn run_server<D, T, C>(pipeline: Pipeline<D, T, C>, addr: String) -> Result<()>
where
    D: LanguageDetector + 'static,
    T: TranslationBackend + 'static,
    C: ZeroShotBackend + 'static,
{
    let app = router(pipeline);
    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .with_context(|| "failed to bind server address")?;
    info!(addr = %addr, "server.listening");
    axum::serve(listener, app).await?;
    Ok(())
}

async fn health() -> impl IntoResponse {
    (StatusCode::OK, Json(serde_json::json!({ "status": "ok" })))
}

async fn cors_middleware(req: Request<Body>, next: Next) -> Result<Response<Body>, StatusCode> {
    if req.method() == Method::OPTIONS {
        let mut response = Response::new(Body::empty());
        *response.status_mut() = StatusCode::NO_CONTENT;
        apply_cors_headers(response.headers_mut());
        return Ok(response);
    }
    let mut response = next.run(req).await;
    apply_cors_headers(response.headers_mut());
    Ok(response)
}

fn apply_cors_headers(headers: &mut HeaderMap) {
    headers.insert("access-control-allow-origin", HeaderValue::from_static("*"));
    headers.insert(
        "access-control-allow-methods",
        HeaderValue::from_static("GET,POST,OPTIONS"),
    );
    headers.insert(
        "access-control-allow-headers",
        HeaderValue::from_static("content-type"),
    );
}

async fn process<D, T, C>(
    State(state): State<Arc<ServerState<D, T, C>>>,
    payload: Result<Json<ProcessRequest>, JsonRejection>,
) -> Result<Json<ProcessResult>, ServerError>
where
    D: LanguageDetector + 'static,
    T: TranslationBackend + 'static,
    C: ZeroShotBackend + 'static,
{
    let Json(request) = payload.map_err(|err| ServerError::bad_request(err.body_text()))?;
    let result = state.pipeline.process(&request.text).await.map_err(|err| {
        warn!("process failed: {:#}", err);
        ServerError::upstream(format!("{:#}", err))
    })?;
    Ok(Json(result))
}

use crate::{
    archive::{self, ArchiveError},
    config::{parse_bool, parse_keywords},
    idempotency::IdempotencyCache,
    jobs::{self, JobQueue},
    models::{ApiError, BatchReport},
    pipeline::{
        BatchInput, BatchOptions, Pipeline, PipelineError, PipelineErrorKind, SourceFile,
    },
    security::{AuthContext, AuthState, QuotaExceeded, QuotaGrant, UploadQuota, require_api_auth},
    store::BatchStore,
};
use axum::{
    Json, Router,
    extract::{DefaultBodyLimit, Extension, Multipart, Path, State},
    http::{HeaderMap, HeaderValue, StatusCode, header},
    middleware,
    response::{Html, IntoResponse, Response},
    routing::{get, post},
};
use metrics_exporter_prometheus::PrometheusHandle;
use serde::Serialize;
use serde_json::json;
use std::{
    net::{IpAddr, Ipv4Addr, SocketAddr},
    sync::Arc,
};
use tower_http::{
    cors::{Any, CorsLayer},
    trace::TraceLayer,
};
use tracing::info;
use uuid::Uuid;

/// Label exports run to tens of megabytes; the default allows 200 MB.
pub const DEFAULT_BODY_LIMIT: usize = 200 * 1024 * 1024;

#[derive(Debug, Clone)]
pub struct ServerConfig {
    pub bind_addr: IpAddr,
    pub port: u16,
    pub body_limit: usize,
}

impl ServerConfig {
    pub fn from_env() -> Self {
        let bind_addr = std::env::var("BIND_ADDR")
            .ok()
            .and_then(|value| value.parse().ok())
            .unwrap_or(IpAddr::V4(Ipv4Addr::UNSPECIFIED));
        let port = std::env::var("PORT")
            .ok()
            .and_then(|value| value.parse().ok())
            .unwrap_or(8000);
        Self {
            bind_addr,
            port,
            body_limit: body_limit_from_env(),
        }
    }

    pub fn socket_addr(&self) -> SocketAddr {
        SocketAddr::new(self.bind_addr, self.port)
    }
}

fn body_limit_from_env() -> usize {
    std::env::var("REQUEST_MAX_BYTES")
        .ok()
        .and_then(|v| v.parse::<usize>().ok())
        .filter(|v| *v > 0)
        .unwrap_or(DEFAULT_BODY_LIMIT)
}

#[derive(Clone)]
pub struct AppState {
    pub pipeline: Pipeline,
    pub queue: JobQueue,
    pub store: BatchStore,
    pub openapi: Arc<serde_json::Value>,
    pub idempotency: IdempotencyCache,
    pub prometheus_handle: PrometheusHandle,
}

impl AppState {
    /// Wires the pipeline, store, and job worker together.
    pub fn new(
        pipeline: Pipeline,
        store: BatchStore,
        idempotency: IdempotencyCache,
        prometheus_handle: PrometheusHandle,
    ) -> Self {
        let (queue, _worker) = JobQueue::spawn(pipeline.clone(), store.clone());
        Self {
            pipeline,
            queue,
            store,
            openapi: Arc::new(load_openapi()),
            idempotency,
            prometheus_handle,
        }
    }
}

fn load_openapi() -> serde_json::Value {
    serde_yaml::from_str(include_str!("../docs/openapi.yaml"))
        .unwrap_or(json!({"openapi":"3.0.3"}))
}

pub fn router(state: AppState, auth: AuthState, body_limit: usize) -> Router {
    let cors = CorsLayer::new()
        .allow_headers(Any)
        .allow_methods(Any)
        .allow_origin(Any);

    let protected = Router::new()
        .route("/batches", post(create_batch))
        .route("/batches/{id}", get(get_batch))
        .route("/batches/{id}/files/{name}", get(download_file))
        .route("/batches/{id}/archive", get(download_archive))
        .nest(
            "/jobs",
            Router::new()
                .route("/batches", post(enqueue_batch_job))
                .route("/{id}", get(get_job_status)),
        )
        .route_layer(middleware::from_fn_with_state(auth, require_api_auth));

    Router::new()
        .route("/health", get(health))
        .route("/metrics", get(metrics_endpoint))
        .route("/openapi.json", get(openapi_json))
        .route("/docs", get(swagger_ui))
        .merge(protected)
        .with_state(state)
        .layer(cors)
        .layer(TraceLayer::new_for_http())
        .layer(DefaultBodyLimit::max(body_limit))
}

/// Health and readiness check.
///
/// - Method: `GET`
/// - Path: `/health`
/// - Auth: none
async fn health() -> Json<serde_json::Value> {
    Json(json!({
        "status": "ok",
        "service": "labelsort-rs",
    }))
}

async fn openapi_json(
    State(state): State<AppState>,
    headers: HeaderMap,
) -> Result<Json<serde_json::Value>, AppError> {
    if let Ok(key) = std::env::var("OPENAPI_KEY") {
        let presented = headers
            .get("X-Docs-Key")
            .and_then(|v| v.to_str().ok())
            .unwrap_or("");
        if presented != key {
            return Err(AppError::Pipeline(PipelineError::invalid_input(
                "docs",
                "unauthorized",
            )));
        }
    }
    Ok(Json((*state.openapi).clone()))
}

async fn swagger_ui() -> Html<&'static str> {
    Html(
        r#"<!doctype html>
<html>
<head>
  <meta charset='utf-8'/>
  <title>Labelsort API Docs</title>
  <link rel="stylesheet" href="https://unpkg.com/swagger-ui-dist@5/swagger-ui.css" />
</head>
<body>
  <div id="swagger-ui"></div>
  <script src="https://unpkg.com/swagger-ui-dist@5/swagger-ui-bundle.js"></script>
  <script>
    window.onload = () => {
      window.ui = SwaggerUIBundle({ url: '/openapi.json', dom_id: '#swagger-ui' });
    };
  </script>
</body>
</html>"#,
    )
}

async fn metrics_endpoint(State(state): State<AppState>, headers: HeaderMap) -> Response {
    if let Ok(secret) = std::env::var("METRICS_KEY") {
        let presented = headers
            .get("X-Metrics-Key")
            .and_then(|v| v.to_str().ok())
            .unwrap_or("");
        if presented != secret {
            return (StatusCode::UNAUTHORIZED, "unauthorized").into_response();
        }
    }
    (
        [(header::CONTENT_TYPE, "text/plain; version=0.0.4")],
        state.prometheus_handle.render(),
    )
        .into_response()
}

/// Reads the multipart upload: `file` parts plus optional
/// `hazmat_keywords` and `hazmat_sticker` fields.
async fn read_batch_upload(mut multipart: Multipart) -> Result<BatchInput, AppError> {
    let mut input = BatchInput {
        files: Vec::new(),
        options: BatchOptions::default(),
    };
    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|err| PipelineError::invalid_input("upload", err.body_text()))?
    {
        let name = field.name().unwrap_or_default().to_string();
        match name.as_str() {
            "file" | "files" => {
                let file_name = field
                    .file_name()
                    .map(str::to_string)
                    .unwrap_or_else(|| format!("upload-{}.pdf", input.files.len() + 1));
                let bytes = field
                    .bytes()
                    .await
                    .map_err(|err| PipelineError::invalid_input("upload", err.body_text()))?;
                input.files.push(SourceFile {
                    name: file_name,
                    bytes: bytes.to_vec(),
                });
            }
            "hazmat_keywords" => {
                let text = field
                    .text()
                    .await
                    .map_err(|err| PipelineError::invalid_input("upload", err.body_text()))?;
                let keywords = parse_keywords(&text);
                if !keywords.is_empty() {
                    input.options.hazmat_keywords = Some(keywords);
                }
            }
            "hazmat_sticker" => {
                let text = field
                    .text()
                    .await
                    .map_err(|err| PipelineError::invalid_input("upload", err.body_text()))?;
                let flag = parse_bool(&text).ok_or_else(|| {
                    PipelineError::invalid_input("upload", "hazmat_sticker must be true or false")
                })?;
                input.options.hazmat_sticker = Some(flag);
            }
            _ => {}
        }
    }
    Ok(input)
}

/// Process an uploaded batch of label exports.
///
/// - Method: `POST`
/// - Path: `/batches`
/// - Auth: `Authorization: Bearer <key>` or `X-Labelsort-Key: <key>`
/// - Body: multipart form
/// - Response: `BatchReport` (summary, output links, stage transcript)
async fn create_batch(
    State(state): State<AppState>,
    Extension(context): Extension<AuthContext>,
    Extension(quota): Extension<UploadQuota>,
    headers: HeaderMap,
    multipart: Multipart,
) -> Result<(QuotaGrant, Json<BatchReport>), AppError> {
    crate::metrics::inc_requests("/batches");
    let input = read_batch_upload(multipart).await?;
    let grant = quota.charge(&context.org_id, input.files.len()).await?;
    info!(
        target = "labelsort.api",
        org_id = %context.org_id,
        files = input.files.len(),
        "batch upload received",
    );

    let idempotency_key = headers
        .get("Idempotency-Key")
        .and_then(|v| v.to_str().ok())
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
        .map(|key| format!("{}:{key}", context.org_id));
    if let Some(key) = &idempotency_key
        && let Some(existing) = state.idempotency.get(key).await
    {
        return Ok((grant, Json(existing)));
    }

    let report = jobs::execute_batch(&state.pipeline, &state.store, input).await?;
    if let Some(key) = idempotency_key {
        state.idempotency.put(key, &report).await;
    }
    Ok((grant, Json(report)))
}

async fn get_batch(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<BatchReport>, AppError> {
    let batch = state
        .store
        .get(parse_id(&id, "batches")?)
        .await
        .ok_or(AppError::NotFound("batch_not_found"))?;
    Ok(Json(batch.report.clone()))
}

async fn download_file(
    State(state): State<AppState>,
    Path((id, name)): Path<(String, String)>,
) -> Result<Response, AppError> {
    crate::metrics::inc_requests("/batches/files");
    let batch = state
        .store
        .get(parse_id(&id, "batches")?)
        .await
        .ok_or(AppError::NotFound("batch_not_found"))?;
    let file = batch.file(&name).ok_or(AppError::NotFound("file_not_found"))?;
    Ok(attachment(
        &file.name,
        file.kind.content_type(),
        file.bytes.clone(),
    ))
}

async fn download_archive(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Response, AppError> {
    crate::metrics::inc_requests("/batches/archive");
    let batch = state
        .store
        .get(parse_id(&id, "batches")?)
        .await
        .ok_or(AppError::NotFound("batch_not_found"))?;
    let bytes = archive::bundle(&batch.files)?;
    Ok(attachment(
        &format!("labelsort-{id}.zip"),
        "application/zip",
        bytes,
    ))
}

fn attachment(file_name: &str, content_type: &'static str, bytes: Vec<u8>) -> Response {
    let disposition = HeaderValue::from_str(&format!("attachment; filename=\"{file_name}\""))
        .unwrap_or_else(|_| HeaderValue::from_static("attachment"));
    (
        [
            (header::CONTENT_TYPE, HeaderValue::from_static(content_type)),
            (header::CONTENT_DISPOSITION, disposition),
        ],
        bytes,
    )
        .into_response()
}

#[derive(Debug, Serialize)]
struct EnqueueResponse {
    job_id: String,
}

async fn enqueue_batch_job(
    State(state): State<AppState>,
    Extension(context): Extension<AuthContext>,
    Extension(quota): Extension<UploadQuota>,
    multipart: Multipart,
) -> Result<(QuotaGrant, Json<EnqueueResponse>), AppError> {
    crate::metrics::inc_requests("/jobs/batches");
    let input = read_batch_upload(multipart).await?;
    let grant = quota.charge(&context.org_id, input.files.len()).await?;
    let id = state
        .queue
        .enqueue_batch(input, context)
        .await
        .map_err(|err| AppError::Pipeline(PipelineError::internal("enqueue", err.error)))?;
    Ok((
        grant,
        Json(EnqueueResponse {
            job_id: id.to_string(),
        }),
    ))
}

async fn get_job_status(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<jobs::JobInfo>, AppError> {
    let uuid = parse_id(&id, "jobs")?;
    state
        .queue
        .get(uuid)
        .await
        .map(Json)
        .ok_or(AppError::NotFound("job_not_found"))
}

fn parse_id(raw: &str, stage: &'static str) -> Result<Uuid, AppError> {
    Uuid::parse_str(raw)
        .map_err(|_| AppError::Pipeline(PipelineError::invalid_input(stage, "invalid_id")))
}

#[derive(Debug)]
pub enum AppError {
    Pipeline(PipelineError),
    Archive(ArchiveError),
    Quota(QuotaExceeded),
    NotFound(&'static str),
}

impl From<QuotaExceeded> for AppError {
    fn from(value: QuotaExceeded) -> Self {
        Self::Quota(value)
    }
}

impl From<PipelineError> for AppError {
    fn from(value: PipelineError) -> Self {
        Self::Pipeline(value)
    }
}

impl From<ArchiveError> for AppError {
    fn from(value: ArchiveError) -> Self {
        Self::Archive(value)
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        match self {
            AppError::Pipeline(err) => {
                let status = match err.kind() {
                    PipelineErrorKind::InvalidInput => StatusCode::BAD_REQUEST,
                    PipelineErrorKind::Internal => StatusCode::INTERNAL_SERVER_ERROR,
                };
                let payload = ApiError {
                    error: err.stage().to_string(),
                    detail: Some(err.detail().to_string()),
                };
                (status, Json(payload)).into_response()
            }
            AppError::Archive(err) => {
                let payload = ApiError {
                    error: "archive".to_string(),
                    detail: Some(err.to_string()),
                };
                (StatusCode::INTERNAL_SERVER_ERROR, Json(payload)).into_response()
            }
            AppError::Quota(exceeded) => exceeded.into_response(),
            AppError::NotFound(code) => {
                let payload = ApiError {
                    error: code.to_string(),
                    detail: None,
                };
                (StatusCode::NOT_FOUND, Json(payload)).into_response()
            }
        }
    }
}

//! HTTP transport for the profiling pipeline
//!
//! Each stage has its own endpoint and `/api/analyze` runs all four. Input
//! problems map to 400 `incomplete_profile`; everything else is a generic 500
//! whose detail only reaches the log.

use std::sync::Arc;

use axum::{
    Json, Router,
    extract::{DefaultBodyLimit, Multipart, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post},
};
use serde_json::{Value, json};
use tower_http::cors::{Any, CorsLayer};
use uuid::Uuid;

use crate::config::Config;
use crate::error::ProfilerError;
use crate::profiler::{Factor, ParseOutcome, Profiler, RawInput, factors::answers_to_text, parser};

const INTERNAL_ERROR_MESSAGE: &str = "Internal server error. Check backend logs.";

/// Shared state for HTTP server
#[derive(Clone)]
pub struct HttpState {
    pub profiler: Arc<Profiler>,
}

/// Boundary errors with HTTP status mapping
#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    #[error("Incomplete profile: {0}")]
    IncompleteProfile(String),
    #[error("Internal error: {0}")]
    Internal(String),
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        match self {
            ApiError::IncompleteProfile(reason) => (
                StatusCode::BAD_REQUEST,
                Json(json!({"status": "incomplete_profile", "reason": reason})),
            )
                .into_response(),
            ApiError::Internal(detail) => {
                tracing::error!(detail = %detail, "API internal error");
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    Json(json!({"error": INTERNAL_ERROR_MESSAGE})),
                )
                    .into_response()
            }
        }
    }
}

impl From<ProfilerError> for ApiError {
    fn from(err: ProfilerError) -> Self {
        match err {
            ProfilerError::InputMissing { reason } => ApiError::IncompleteProfile(reason),
            other => ApiError::Internal(other.to_string()),
        }
    }
}

type ApiResult<T> = std::result::Result<T, ApiError>;

/// Build the application router
pub fn router(profiler: Profiler, max_upload_bytes: usize) -> Router {
    let state = HttpState {
        profiler: Arc::new(profiler),
    };
    Router::new()
        .route("/health", get(health_handler))
        .route("/api/parse", post(parse_handler))
        .route("/api/factors", post(factors_handler))
        .route("/api/risk", post(risk_handler))
        .route("/api/recommendations", post(recommendations_handler))
        .route("/api/analyze", post(analyze_handler))
        .layer(DefaultBodyLimit::max(max_upload_bytes))
        .layer(CorsLayer::new().allow_origin(Any).allow_methods(Any).allow_headers(Any))
        .with_state(state)
}

/// Health check endpoint
pub async fn health_handler() -> impl IntoResponse {
    "ok"
}

#[tracing::instrument(skip_all, fields(request_id = %Uuid::new_v4()))]
async fn parse_handler(
    State(state): State<HttpState>,
    multipart: Multipart,
) -> ApiResult<impl IntoResponse> {
    let input = read_survey_form(multipart).await?;
    let parsed = state.profiler.parse(input).await?;
    match parsed.outcome {
        ParseOutcome::Complete(normalized) => Ok(Json(normalized)),
        ParseOutcome::Incomplete { reason } => Err(ApiError::IncompleteProfile(reason)),
    }
}

#[tracing::instrument(skip_all, fields(request_id = %Uuid::new_v4()))]
async fn factors_handler(
    State(state): State<HttpState>,
    body: Option<Json<Value>>,
) -> ApiResult<impl IntoResponse> {
    let answers = body
        .as_ref()
        .and_then(|Json(b)| b.get("answers"))
        .ok_or_else(|| {
            ApiError::IncompleteProfile("Missing 'answers' field in input.".to_string())
        })?;
    let set = state.profiler.extract_factors(&answers_to_text(answers)).await;
    Ok(Json(set))
}

#[tracing::instrument(skip_all, fields(request_id = %Uuid::new_v4()))]
async fn risk_handler(
    State(state): State<HttpState>,
    body: Option<Json<Value>>,
) -> ApiResult<impl IntoResponse> {
    let factors = body
        .as_ref()
        .and_then(|Json(b)| b.get("factors"))
        .map(factors_from_value)
        .unwrap_or_default();
    if factors.is_empty() {
        return Err(ApiError::IncompleteProfile(
            "No factors provided for risk classification.".to_string(),
        ));
    }
    Ok(Json(state.profiler.classify(&factors).await))
}

#[tracing::instrument(skip_all, fields(request_id = %Uuid::new_v4()))]
async fn recommendations_handler(
    State(state): State<HttpState>,
    body: Option<Json<Value>>,
) -> ApiResult<impl IntoResponse> {
    let missing = || {
        ApiError::IncompleteProfile(
            "Missing required fields: risk_level or factors.".to_string(),
        )
    };
    let Some(Json(body)) = body else {
        return Err(missing());
    };
    let (Some(level), Some(factors)) = (body.get("risk_level"), body.get("factors")) else {
        return Err(missing());
    };
    let risk_level = match level {
        Value::String(s) => s.clone(),
        Value::Null => return Err(missing()),
        other => other.to_string(),
    };
    let names: Vec<String> = factors_from_value(factors)
        .into_iter()
        .map(|f| f.factor)
        .collect();
    Ok(Json(state.profiler.recommend(&risk_level, &names).await))
}

#[tracing::instrument(skip_all, fields(request_id = %Uuid::new_v4()))]
async fn analyze_handler(
    State(state): State<HttpState>,
    multipart: Multipart,
) -> ApiResult<impl IntoResponse> {
    let input = read_survey_form(multipart).await?;
    let report = state.profiler.analyze(input).await?;
    tracing::info!(
        risk_level = %report.risk_level,
        score = report.score,
        recommendations = report.recommendations.len(),
        "Analysis complete"
    );
    Ok(Json(report))
}

/// Read `textInput` and `imageInput`; images with other extensions are ignored
async fn read_survey_form(mut multipart: Multipart) -> ApiResult<RawInput> {
    let mut input = RawInput::default();
    loop {
        let field = match multipart.next_field().await {
            Ok(Some(field)) => field,
            Ok(None) => break,
            Err(e) => {
                tracing::warn!("Malformed multipart body: {}", e);
                return Err(ApiError::IncompleteProfile(
                    "Malformed form data.".to_string(),
                ));
            }
        };
        let name = field.name().unwrap_or_default().to_string();
        match name.as_str() {
            "textInput" => {
                input.text = field
                    .text()
                    .await
                    .map_err(|e| ApiError::Internal(format!("reading textInput: {}", e)))?;
            }
            "imageInput" => {
                let filename = field.file_name().unwrap_or_default().to_string();
                let data = field
                    .bytes()
                    .await
                    .map_err(|e| ApiError::Internal(format!("reading imageInput: {}", e)))?;
                input.image = parser::image_part_from_upload(&filename, data.to_vec());
                if input.image.is_none() && !filename.is_empty() {
                    tracing::warn!("Ignoring upload '{}': not an allowed image", filename);
                }
            }
            _ => {}
        }
    }
    Ok(input)
}

fn factors_from_value(value: &Value) -> Vec<Factor> {
    value
        .as_array()
        .map(|items| {
            items
                .iter()
                .filter_map(|item| serde_json::from_value::<Factor>(item.clone()).ok())
                .collect()
        })
        .unwrap_or_default()
}

/// Start the HTTP server
pub async fn start_http_server(config: &Config, profiler: Profiler) -> anyhow::Result<()> {
    let app = router(profiler, config.server.max_upload_bytes);

    let listener = tokio::net::TcpListener::bind(config.server.bind)
        .await
        .map_err(|e| anyhow::anyhow!("Failed to bind HTTP listener: {}", e))?;

    tracing::info!(
        "Starting HTTP server on {} (model {}, risk strategy {:?}, recommend strategy {:?})",
        config.server.bind,
        config.model.name,
        config.pipeline.risk_strategy,
        config.pipeline.recommend_strategy
    );

    axum::serve(listener, app)
        .await
        .map_err(|e| anyhow::anyhow!("HTTP server error: {}", e))?;

    Ok(())
}

//! Purpose: Provide the HTTP/JSON parsing service.
//! Exports: `ServeConfig`, `serve`.
//! Role: Axum-based server wrapping the extraction core.
//! Invariants: `/parse-pension-pdf` responds with exactly the three
//! documented top-level fields; error envelopes use `{"error":{...}}`.
//! Invariants: Uploads are bounded by `max_body_bytes` and parsed off the
//! async runtime in a blocking task.

use axum::extract::{DefaultBodyLimit, Multipart};
use axum::http::{HeaderValue, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use serde::Serialize;
use serde_json::json;
use std::future::IntoFuture;
use std::net::SocketAddr;
use tokio::time::Duration;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;
use tracing::info;
use tracing_subscriber::EnvFilter;

use semanas::core::error::{Error, ErrorKind};
use semanas::core::report;

#[derive(Clone, Debug)]
pub struct ServeConfig {
    pub bind: SocketAddr,
    pub max_body_bytes: u64,
    pub cors_allowed_origins: Vec<String>,
}

pub async fn serve(config: ServeConfig) -> Result<(), Error> {
    validate_config(&config)?;

    init_tracing();

    let max_body_bytes: usize = config
        .max_body_bytes
        .try_into()
        .map_err(|_| Error::new(ErrorKind::Usage).with_message("--max-body-bytes is too large"))?;

    let app = Router::new()
        .route("/", get(root))
        .route("/health", get(health))
        .route("/parse-pension-pdf", post(parse_pension_pdf))
        .layer(DefaultBodyLimit::max(max_body_bytes))
        .layer(cors_layer(&config.cors_allowed_origins)?)
        .layer(TraceLayer::new_for_http());

    let listener = tokio::net::TcpListener::bind(config.bind)
        .await
        .map_err(|err| {
            Error::new(ErrorKind::Io)
                .with_message("failed to bind server")
                .with_source(err)
        })?;
    info!(bind = %config.bind, "serving pension PDF parser");

    let (shutdown_tx, shutdown_rx) = tokio::sync::oneshot::channel::<()>();
    let server = axum::serve(listener, app)
        .with_graceful_shutdown(async {
            let _ = shutdown_rx.await;
        })
        .into_future();
    tokio::pin!(server);

    tokio::select! {
        result = &mut server => {
            result.map_err(|err| {
                Error::new(ErrorKind::Io)
                    .with_message("server failed")
                    .with_source(err)
            })?;
        }
        _ = shutdown_signal() => {
            let _ = shutdown_tx.send(());
            match tokio::time::timeout(Duration::from_secs(10), &mut server).await {
                Ok(result) => result.map_err(|err| {
                    Error::new(ErrorKind::Io)
                        .with_message("server failed")
                        .with_source(err)
                })?,
                Err(_) => {
                    return Err(Error::new(ErrorKind::Io).with_message("server shutdown timed out"));
                }
            }
        }
    };
    Ok(())
}

fn validate_config(config: &ServeConfig) -> Result<(), Error> {
    if config.max_body_bytes == 0 {
        return Err(Error::new(ErrorKind::Usage)
            .with_message("--max-body-bytes must be greater than zero")
            .with_hint("Use a positive value like 26214400."));
    }
    for origin in &config.cors_allowed_origins {
        if origin.parse::<HeaderValue>().is_err() {
            return Err(Error::new(ErrorKind::Usage)
                .with_message(format!("invalid CORS origin: {origin}"))
                .with_hint("Use origins like https://app.example.com."));
        }
    }
    Ok(())
}

// No configured origins means the open posture of the original deployment:
// any origin may call the parser.
fn cors_layer(origins: &[String]) -> Result<CorsLayer, Error> {
    if origins.is_empty() {
        return Ok(CorsLayer::new()
            .allow_origin(Any)
            .allow_methods(Any)
            .allow_headers(Any));
    }
    let mut values = Vec::with_capacity(origins.len());
    for origin in origins {
        let value = origin.parse::<HeaderValue>().map_err(|_| {
            Error::new(ErrorKind::Usage).with_message(format!("invalid CORS origin: {origin}"))
        })?;
        values.push(value);
    }
    Ok(CorsLayer::new().allow_origin(values))
}

fn init_tracing() {
    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let _ = tracing_subscriber::fmt()
        .with_env_filter(env_filter)
        .with_target(false)
        .try_init();
}

async fn shutdown_signal() {
    let ctrl_c = async {
        let _ = tokio::signal::ctrl_c().await;
    };
    #[cfg(unix)]
    let terminate = async {
        let mut signal = tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate())
            .expect("install SIGTERM handler");
        signal.recv().await;
    };
    #[cfg(unix)]
    tokio::select! {
        _ = ctrl_c => {}
        _ = terminate => {}
    }
    #[cfg(not(unix))]
    ctrl_c.await;
}

async fn root() -> Response {
    json_response(json!({ "status": "ok", "message": "Pension PDF parser" }))
}

async fn health() -> Response {
    json_response(json!({ "status": "healthy" }))
}

async fn parse_pension_pdf(mut multipart: Multipart) -> Response {
    loop {
        let field = match multipart.next_field().await {
            Ok(Some(field)) => field,
            Ok(None) => break,
            Err(err) => {
                return error_response(
                    Error::new(ErrorKind::Usage)
                        .with_message("invalid multipart body")
                        .with_source(err),
                );
            }
        };
        if field.name() != Some("file") {
            continue;
        }

        let Some(filename) = field.file_name().map(str::to_string) else {
            return error_response(
                Error::new(ErrorKind::Usage).with_message("file field requires a filename"),
            );
        };
        if !filename.to_lowercase().ends_with(".pdf") {
            return error_response(
                Error::new(ErrorKind::Usage)
                    .with_message("file must be a PDF")
                    .with_hint("Upload the report with a .pdf filename."),
            );
        }

        let bytes = match field.bytes().await {
            Ok(bytes) => bytes,
            Err(err) => {
                return error_response(
                    Error::new(ErrorKind::Usage)
                        .with_message("failed to read uploaded file")
                        .with_source(err),
                );
            }
        };

        info!(filename = %filename, size = bytes.len(), "processing uploaded PDF");
        let result = tokio::task::spawn_blocking(move || report::extract_bytes(&bytes)).await;
        return match result {
            Ok(Ok(report)) => match serde_json::to_value(&report) {
                Ok(value) => json_response(value),
                Err(err) => error_response(
                    Error::new(ErrorKind::Internal)
                        .with_message("failed to encode report")
                        .with_source(err),
                ),
            },
            Ok(Err(err)) => error_response(err),
            Err(err) => error_response(
                Error::new(ErrorKind::Internal)
                    .with_message("extraction task failed")
                    .with_source(err),
            ),
        };
    }

    error_response(
        Error::new(ErrorKind::Usage)
            .with_message("missing file field")
            .with_hint("Send multipart/form-data with a `file` part."),
    )
}

#[derive(Debug, Serialize)]
struct ErrorEnvelope {
    error: ErrorBody,
}

#[derive(Debug, Serialize)]
struct ErrorBody {
    kind: String,
    message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    hint: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    page: Option<u32>,
}

fn error_status(kind: ErrorKind) -> StatusCode {
    match kind {
        ErrorKind::Usage => StatusCode::BAD_REQUEST,
        ErrorKind::NotFound => StatusCode::NOT_FOUND,
        ErrorKind::Corrupt => StatusCode::UNPROCESSABLE_ENTITY,
        ErrorKind::Io | ErrorKind::Internal => StatusCode::INTERNAL_SERVER_ERROR,
    }
}

fn error_response(err: Error) -> Response {
    let body = ErrorEnvelope {
        error: ErrorBody {
            kind: format!("{:?}", err.kind()),
            message: err.message().unwrap_or("error").to_string(),
            hint: err.hint().map(str::to_string),
            page: err.page(),
        },
    };
    (error_status(err.kind()), Json(body)).into_response()
}

fn json_response(payload: serde_json::Value) -> Response {
    Json(payload).into_response()
}

use std::{net::SocketAddr, sync::Arc};

use axum::{
    extract::{DefaultBodyLimit, Multipart, Query, State},
    http::{header, StatusCode},
    response::{IntoResponse, Response},
    routing::{get, post},
    Router,
};

use energy_domain::query::restrict_to_window;
use time::PrimitiveDateTime;

use super::{sdat::parse_local_datetime, SourceFile};
use crate::batch::{Batch, BatchError, BatchInput, BatchOptions};
use crate::sinks::{render, OutputFormat, SinkError};

const SDAT_FIELD: &str = "sdatFiles";
const ESL_FIELD: &str = "eslFiles";

#[derive(thiserror::Error, Debug)]
pub enum UploadError {
    #[error("invalid bind addr: {0}")]
    BindAddr(String),
    #[error("server error: {0}")]
    Serve(#[from] std::io::Error),
    #[error(transparent)]
    Batch(#[from] BatchError),
    #[error("failed to render response: {0}")]
    Render(#[from] SinkError),
    #[error("batch task failed: {0}")]
    Task(String),
    #[error("invalid time window: {0}")]
    Window(String),
}

impl IntoResponse for UploadError {
    fn into_response(self) -> Response {
        let status = match &self {
            UploadError::Batch(_) | UploadError::Window(_) => StatusCode::BAD_REQUEST,
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        };
        (status, self.to_string()).into_response()
    }
}

#[derive(Clone)]
struct UploadState {
    options: Arc<BatchOptions>,
    default_format: OutputFormat,
}

#[derive(serde::Deserialize)]
struct UploadQuery {
    format: Option<OutputFormat>,
    from: Option<String>,
    to: Option<String>,
}

impl UploadQuery {
    /// `[from, to)` when either bound is given; a missing bound is open.
    fn window(&self) -> Result<Option<(PrimitiveDateTime, PrimitiveDateTime)>, UploadError> {
        if self.from.is_none() && self.to.is_none() {
            return Ok(None);
        }
        let start = window_bound(self.from.as_deref(), PrimitiveDateTime::MIN)?;
        let end = window_bound(self.to.as_deref(), PrimitiveDateTime::MAX)?;
        Ok(Some((start, end)))
    }
}

fn window_bound(raw: Option<&str>, open: PrimitiveDateTime) -> Result<PrimitiveDateTime, UploadError> {
    match raw {
        None => Ok(open),
        Some(raw) => parse_local_datetime(raw).map_err(|e| UploadError::Window(format!("{raw}: {e}"))),
    }
}

/// Multipart upload endpoint: every request is one independent batch.
///
/// `POST /api/files/upload` takes repeated `sdatFiles` and `eslFiles` parts
/// and answers with the merged meter model as JSON (or CSV with
/// `?format=csv`). `?from=` and `?to=` limit the answer to `[from, to)`.
pub struct UploadServer {
    addr: SocketAddr,
    router: Router,
}

impl UploadServer {
    pub fn new(
        bind_addr: &str,
        options: BatchOptions,
        default_format: OutputFormat,
        max_body_bytes: usize,
    ) -> Result<Self, UploadError> {
        let addr: SocketAddr = bind_addr
            .parse()
            .map_err(|e| UploadError::BindAddr(format!("{bind_addr}: {e}")))?;
        Ok(Self {
            addr,
            router: router(options, default_format, max_body_bytes),
        })
    }

    pub fn router(&self) -> Router {
        self.router.clone()
    }

    pub async fn serve(self) -> Result<(), UploadError> {
        let listener = tokio::net::TcpListener::bind(self.addr).await?;
        tracing::info!(addr = %self.addr, "upload endpoint listening");
        axum::serve(listener, self.router.into_make_service()).await?;
        Ok(())
    }
}

pub fn router(options: BatchOptions, default_format: OutputFormat, max_body_bytes: usize) -> Router {
    let state = UploadState {
        options: Arc::new(options),
        default_format,
    };
    Router::new()
        .route("/api/files/upload", post(upload_files))
        .route("/healthz", get(|| async { StatusCode::OK }))
        .layer(DefaultBodyLimit::max(max_body_bytes))
        .with_state(state)
}

async fn upload_files(
    State(state): State<UploadState>,
    Query(query): Query<UploadQuery>,
    mut multipart: Multipart,
) -> Response {
    metrics::counter!("http_upload_requests_total").increment(1);

    let window = match query.window() {
        Ok(window) => window,
        Err(e) => {
            tracing::warn!(error = %e, "upload rejected");
            return e.into_response();
        }
    };

    let mut input = BatchInput::default();
    loop {
        let field = match multipart.next_field().await {
            Ok(Some(field)) => field,
            Ok(None) => break,
            Err(e) => {
                metrics::counter!("http_upload_failed_total").increment(1);
                return (e.status(), e.body_text()).into_response();
            }
        };

        let name = field.name().unwrap_or_default().to_string();
        let filename = field.file_name().unwrap_or(name.as_str()).to_string();
        let bytes = match field.bytes().await {
            Ok(b) => b,
            Err(e) => {
                metrics::counter!("http_upload_failed_total").increment(1);
                return (e.status(), e.body_text()).into_response();
            }
        };

        let file = SourceFile::new(filename, bytes.to_vec());
        match name.as_str() {
            SDAT_FIELD => input.sdat_files.push(file),
            ESL_FIELD => input.esl_files.push(file),
            other => tracing::debug!(field = other, "ignoring unknown multipart field"),
        }
    }

    let format = query.format.unwrap_or(state.default_format);
    let options = state.options.clone();
    let result = tokio::task::spawn_blocking(move || -> Result<Vec<u8>, UploadError> {
        let outcome = Batch::new((*options).clone()).run(input)?.require_data()?;
        let model = match window {
            Some((start, end)) => restrict_to_window(&outcome.model, start, end),
            None => outcome.model,
        };
        Ok(render(&model, format)?)
    })
    .await
    .map_err(|e| UploadError::Task(e.to_string()))
    .and_then(|r| r);

    match result {
        Ok(body) => ([(header::CONTENT_TYPE, format.content_type())], body).into_response(),
        Err(e) => {
            if matches!(e, UploadError::Batch(_)) {
                tracing::warn!(error = %e, "upload rejected");
            } else {
                tracing::error!(error = %e, "upload failed");
                metrics::counter!("http_upload_failed_total").increment(1);
            }
            e.into_response()
        }
    }
}

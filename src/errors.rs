use std::time::Duration;

use thiserror::Error;

/// All errors that can occur when using the Inspector Cloud SDK.
#[derive(Error, Debug)]
pub enum InspectorError {
    /// The API key is missing or invalid (HTTP 401).
    #[error("authentication failed: {message}")]
    Authentication { message: String },

    /// The authenticated user does not have access to the requested resource (HTTP 403).
    #[error("permission denied: {message}")]
    PermissionDenied { message: String },

    /// The requested resource was not found (HTTP 404).
    #[error("not found: {message}")]
    NotFound { message: String },

    /// The request was rate-limited (HTTP 429).
    #[error("rate limited (retry after {retry_after:?}s): {message}")]
    RateLimit {
        message: String,
        retry_after: Option<f64>,
    },

    /// A non-specific API error with the HTTP status code and response body.
    #[error("API error {status_code}: {message}")]
    Api {
        status_code: u16,
        message: String,
        body: Option<serde_json::Value>,
    },

    /// A transport-level HTTP error from reqwest.
    #[error("request failed: {0}")]
    Http(#[from] reqwest::Error),

    /// An I/O error, typically from reading a local image file.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// The client was built without a required setting.
    #[error("invalid configuration: {message}")]
    Config { message: String },

    /// The instance URL or an endpoint path could not be parsed.
    #[error("invalid URL: {0}")]
    InvalidUrl(#[from] url::ParseError),

    /// A JSON payload did not have the expected shape.
    #[error("failed to decode {what}: {message}")]
    Decode { what: &'static str, message: String },

    /// Fetching a report failed while waiting for it. Not retried.
    #[error("failed to fetch report {id} on attempt {attempt}: {source}")]
    ReportFetch {
        id: i64,
        attempt: u32,
        #[source]
        source: Box<InspectorError>,
    },

    /// The report reached the terminal `ERROR` status.
    #[error("report {id} finished with status ERROR{}", .message.as_deref().map(|m| format!(": {m}")).unwrap_or_default())]
    ReportFailed { id: i64, message: Option<String> },

    /// Waiting exceeded the configured deadline.
    #[error("wait timed out after {0:?}")]
    Timeout(Duration),

    /// The caller cancelled the operation.
    #[error("operation cancelled")]
    Cancelled,

    /// Fetching or decoding a SKU page failed.
    #[error("failed to fetch SKU page at offset {offset}: {source}")]
    PageFetch {
        offset: usize,
        #[source]
        source: Box<InspectorError>,
    },

    /// The server handed back a cursor to a page that was already visited.
    #[error("detected pagination loop at offset {offset}")]
    PaginationLoop { offset: usize },

    /// The iterator hit its page-count safety cap.
    #[error("exceeded maximum page limit of {max_pages}")]
    PageLimitExceeded { max_pages: usize },
}

impl InspectorError {
    /// `true` for [`Timeout`](Self::Timeout) and [`Cancelled`](Self::Cancelled).
    pub fn is_timeout_or_cancelled(&self) -> bool {
        matches!(self, Self::Timeout(_) | Self::Cancelled)
    }

    pub(crate) fn decode(what: &'static str, err: impl std::fmt::Display) -> Self {
        Self::Decode {
            what,
            message: err.to_string(),
        }
    }
}

/// A convenience alias for `Result<T, InspectorError>`.
pub type Result<T> = std::result::Result<T, InspectorError>;

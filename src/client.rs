use std::path::Path;
use std::time::Duration;

use async_trait::async_trait;
use reqwest::header::{HeaderValue, AUTHORIZATION};
use reqwest::multipart::{Form, Part};
use reqwest::{Method, RequestBuilder, Response};
use serde::de::DeserializeOwned;
use serde_json::json;
use url::Url;

use crate::errors::{InspectorError, Result};
use crate::executor::RequestExecutor;
use crate::models::{
    Image, Pagination, RecognitionErrorRequest, RecognitionErrorResponse, RecognizeRequest,
    RecognizeResponse, Report, ReportWaitOptions, Sku, UploadByUrlRequest, Visit,
};
use crate::pagination::SkuIterator;
use crate::waiter::ReportWaiter;

/// Tracing target for HTTP traffic.
const TRACING_TARGET: &str = "inspector::client";

const DEFAULT_MAX_RETRIES: u32 = 3;
const DEFAULT_TIMEOUT: Duration = Duration::from_secs(30);

const ENV_API_KEY: &str = "INSPECTOR_API_KEY";
const ENV_INSTANCE: &str = "INSPECTOR_INSTANCE";

const ENDPOINT_UPLOADS: &str = "uploads/";
const ENDPOINT_UPLOADS_BY_URL: &str = "uploads/upload_by_url/";
const ENDPOINT_RECOGNIZE: &str = "recognize/";
const ENDPOINT_RECOGNITION_ERROR: &str = "recognition_error/";
const ENDPOINT_SKU: &str = "sku/";
const ENDPOINT_VISITS: &str = "visits/";

const FORM_FIELD_FILE: &str = "file";

/// Builder for constructing a [`Client`] with custom configuration.
///
/// # Example
///
/// ```no_run
/// use inspector::ClientBuilder;
/// use std::time::Duration;
///
/// # fn example() -> inspector::Result<()> {
/// let client = ClientBuilder::new()
///     .instance("https://acme.inspector-cloud.com/api/v1.5/")
///     .api_key("ic_token")
///     .max_retries(5)
///     .timeout(Duration::from_secs(120))
///     .build()?;
/// # Ok(())
/// # }
/// ```
pub struct ClientBuilder {
    instance: Option<String>,
    api_key: Option<String>,
    max_retries: u32,
    timeout: Duration,
    http: Option<reqwest::Client>,
}

impl ClientBuilder {
    /// Create a new builder with default settings.
    pub fn new() -> Self {
        Self {
            instance: None,
            api_key: None,
            max_retries: DEFAULT_MAX_RETRIES,
            timeout: DEFAULT_TIMEOUT,
            http: None,
        }
    }

    /// Base URL of your Inspector Cloud instance; endpoint paths are resolved
    /// against it.
    pub fn instance(mut self, url: impl Into<String>) -> Self {
        self.instance = Some(url.into());
        self
    }

    /// Set the API token for authentication.
    pub fn api_key(mut self, key: impl Into<String>) -> Self {
        self.api_key = Some(key.into());
        self
    }

    /// Set the maximum number of retries for transient GET failures (defaults to 3).
    pub fn max_retries(mut self, n: u32) -> Self {
        self.max_retries = n;
        self
    }

    /// Set the HTTP request timeout (defaults to 30 seconds). Ignored when a
    /// custom [`http_client`](Self::http_client) is supplied.
    pub fn timeout(mut self, d: Duration) -> Self {
        self.timeout = d;
        self
    }

    /// Use a preconfigured reqwest client (proxies, TLS, pooling).
    pub fn http_client(mut self, http: reqwest::Client) -> Self {
        self.http = Some(http);
        self
    }

    /// Build the [`Client`].
    ///
    /// Unset instance and key fall back to the `INSPECTOR_INSTANCE` and
    /// `INSPECTOR_API_KEY` environment variables.
    ///
    /// # Errors
    ///
    /// - [`InspectorError::Config`] if no instance URL is available.
    /// - [`InspectorError::Authentication`] if no usable key is available.
    /// - [`InspectorError::InvalidUrl`] if the instance URL does not parse.
    pub fn build(self) -> Result<Client> {
        let instance = self
            .instance
            .or_else(|| std::env::var(ENV_INSTANCE).ok())
            .ok_or_else(|| InspectorError::Config {
                message: format!(
                    "instance URL is required. Pass it to ClientBuilder::instance() \
                     or set the {ENV_INSTANCE} environment variable."
                ),
            })?;

        let api_key = self
            .api_key
            .or_else(|| std::env::var(ENV_API_KEY).ok())
            .ok_or_else(|| InspectorError::Authentication {
                message: format!(
                    "API key is required. Pass it to ClientBuilder::api_key() \
                     or set the {ENV_API_KEY} environment variable."
                ),
            })?;

        let mut auth = HeaderValue::from_str(&format!("Token {api_key}")).map_err(|_| {
            InspectorError::Authentication {
                message: "API key contains characters not allowed in a header".into(),
            }
        })?;
        auth.set_sensitive(true);

        let http = match self.http {
            Some(http) => http,
            None => reqwest::Client::builder()
                .timeout(self.timeout)
                .build()
                .map_err(InspectorError::Http)?,
        };

        Ok(Client {
            base_url: base_url(&instance)?,
            auth,
            http,
            max_retries: self.max_retries,
        })
    }
}

impl Default for ClientBuilder {
    fn default() -> Self {
        Self::new()
    }
}

/// Endpoint paths are relative, so the base must end in `/` for `join` to
/// keep its last segment.
fn base_url(instance: &str) -> Result<Url> {
    let trimmed = instance.trim_end_matches('/');
    Ok(Url::parse(&format!("{trimmed}/"))?)
}

/// The Inspector Cloud API client.
///
/// Cheap to clone; clones share the connection pool. Use [`Client::new`] for
/// quick construction or [`ClientBuilder`] for full control.
///
/// # Example
///
/// ```no_run
/// use inspector::{Client, RecognizeRequest, report_type};
///
/// # async fn example() -> inspector::Result<()> {
/// let client = Client::new("https://acme.inspector-cloud.com/api/v1.5/", "ic_token")?;
///
/// let image = client.upload_image("shelf.jpg").await?;
/// let recognition = client
///     .recognize(&RecognizeRequest {
///         images: vec![image.id],
///         report_types: vec![report_type::FACING_COUNT.into()],
///         ..Default::default()
///     })
///     .await?;
///
/// for (kind, id) in &recognition.reports {
///     let report = client.wait_for_report(*id, None).await?;
///     println!("{kind}: {} facings", report.facing_count()?.len());
/// }
/// # Ok(())
/// # }
/// ```
#[derive(Clone)]
pub struct Client {
    base_url: Url,
    auth: HeaderValue,
    http: reqwest::Client,
    max_retries: u32,
}

impl Client {
    /// Create a new client for `instance` with default settings.
    ///
    /// For customization, use [`ClientBuilder`] instead.
    pub fn new(instance: impl Into<String>, api_key: impl Into<String>) -> Result<Self> {
        ClientBuilder::new()
            .instance(instance)
            .api_key(api_key)
            .build()
    }

    /// Base URL all endpoint paths are resolved against.
    pub fn base_url(&self) -> &Url {
        &self.base_url
    }

    // -----------------------------------------------------------------------
    // Images
    // -----------------------------------------------------------------------

    /// Upload a local image file as `multipart/form-data`.
    ///
    /// # Errors
    ///
    /// - [`InspectorError::Io`] if the file cannot be read.
    pub async fn upload_image(&self, path: impl AsRef<Path>) -> Result<Image> {
        let path = path.as_ref();
        let file_name = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| "image.jpg".to_string());

        let bytes = tokio::fs::read(path).await.map_err(InspectorError::Io)?;
        self.upload_image_bytes(bytes, file_name).await
    }

    /// Upload in-memory image data under `file_name`.
    ///
    /// Sent once; multipart bodies are not retried.
    pub async fn upload_image_bytes(
        &self,
        bytes: impl Into<Vec<u8>>,
        file_name: impl Into<String>,
    ) -> Result<Image> {
        let file_name = file_name.into();
        let form = Form::new().part(
            FORM_FIELD_FILE,
            Part::bytes(bytes.into()).file_name(file_name.clone()),
        );

        let url = self.endpoint(ENDPOINT_UPLOADS)?;
        tracing::debug!(target: TRACING_TARGET, %url, file_name, "uploading image");

        let req = self
            .http
            .post(url)
            .header(AUTHORIZATION, self.auth.clone())
            .multipart(form);
        send_once(req).await
    }

    /// Have the service download an image from `image_url`.
    pub async fn upload_image_by_url(&self, image_url: &str) -> Result<Image> {
        let body = serde_json::to_value(UploadByUrlRequest { url: image_url })
            .map_err(|e| InspectorError::decode("upload request", e))?;
        self.request(Method::POST, self.endpoint(ENDPOINT_UPLOADS_BY_URL)?, Some(body))
            .await
    }

    // -----------------------------------------------------------------------
    // Visits
    // -----------------------------------------------------------------------

    /// Register a new visit.
    pub async fn add_visit(&self) -> Result<Visit> {
        self.request(Method::POST, self.endpoint(ENDPOINT_VISITS)?, Some(json!({})))
            .await
    }

    // -----------------------------------------------------------------------
    // Recognition
    // -----------------------------------------------------------------------

    /// Start asynchronous recognition of a group of images.
    ///
    /// The response maps each requested report type to a report id; pass
    /// those to [`wait_for_report`](Self::wait_for_report).
    pub async fn recognize(&self, req: &RecognizeRequest) -> Result<RecognizeResponse> {
        let body =
            serde_json::to_value(req).map_err(|e| InspectorError::decode("recognize request", e))?;
        self.request(Method::POST, self.endpoint(ENDPOINT_RECOGNIZE)?, Some(body))
            .await
    }

    /// Report a SKU that was recognized wrongly.
    pub async fn recognition_error(
        &self,
        req: &RecognitionErrorRequest,
    ) -> Result<RecognitionErrorResponse> {
        let body = serde_json::to_value(req)
            .map_err(|e| InspectorError::decode("recognition error request", e))?;
        self.request(
            Method::POST,
            self.endpoint(ENDPOINT_RECOGNITION_ERROR)?,
            Some(body),
        )
        .await
    }

    // -----------------------------------------------------------------------
    // Reports
    // -----------------------------------------------------------------------

    /// Fetch the current state of a report.
    pub async fn get_report(&self, id: i64) -> Result<Report> {
        self.request(Method::GET, self.endpoint(&format!("reports/{id}/"))?, None)
            .await
    }

    /// Poll a report until it is `READY`.
    ///
    /// Uses [`ReportWaitOptions::default`] when `opts` is `None`. For
    /// cancellation, build a [`ReportWaiter`] via
    /// [`report_waiter`](Self::report_waiter).
    ///
    /// # Errors
    ///
    /// - [`InspectorError::ReportFetch`] if a poll request fails.
    /// - [`InspectorError::ReportFailed`] if the report reaches `ERROR`.
    /// - [`InspectorError::Timeout`] if polling exceeds the configured timeout.
    pub async fn wait_for_report(
        &self,
        id: i64,
        opts: Option<ReportWaitOptions>,
    ) -> Result<Report> {
        self.report_waiter(opts.unwrap_or_default()).wait(id).await
    }

    pub fn report_waiter(&self, opts: ReportWaitOptions) -> ReportWaiter<'_, Self> {
        ReportWaiter::new(self, opts)
    }

    // -----------------------------------------------------------------------
    // SKU catalog
    // -----------------------------------------------------------------------

    /// Fetch one page of the SKU catalog.
    pub async fn get_sku(&self, offset: usize, limit: usize) -> Result<Pagination> {
        let mut url = self.endpoint(ENDPOINT_SKU)?;
        url.query_pairs_mut()
            .append_pair("limit", &limit.to_string())
            .append_pair("offset", &offset.to_string());
        self.request(Method::GET, url, None).await
    }

    /// Iterate the SKU catalog page by page. `0` means 100 per page.
    pub fn iterate_sku(&self, page_size: usize) -> SkuIterator<'_, Self> {
        SkuIterator::new(self, page_size)
    }

    /// Fetch the whole SKU catalog. `0` means 100 per page.
    pub async fn get_all_sku(&self, page_size: usize) -> Result<Vec<Sku>> {
        self.iterate_sku(page_size).collect_all().await
    }

    // -----------------------------------------------------------------------
    // Private helpers
    // -----------------------------------------------------------------------

    fn endpoint(&self, path: &str) -> Result<Url> {
        Ok(self.base_url.join(path)?)
    }

    /// Execute a JSON request with automatic retry for transient failures.
    ///
    /// Only GETs are retried, for:
    /// - HTTP 5xx server errors
    /// - HTTP 429 rate-limit responses
    /// - Network-level errors (connection refused, timeout, etc.)
    ///
    /// Exponential backoff is applied: 1s, 2s, 4s, ...
    async fn request<T: DeserializeOwned>(
        &self,
        method: Method,
        url: Url,
        body: Option<serde_json::Value>,
    ) -> Result<T> {
        let max_retries = if method == Method::GET {
            self.max_retries
        } else {
            0
        };

        let mut last_err: Option<InspectorError> = None;

        for attempt in 0..=max_retries {
            if attempt > 0 {
                let backoff = Duration::from_secs(1 << (attempt - 1).min(5));
                tracing::warn!(
                    target: TRACING_TARGET,
                    %method,
                    %url,
                    attempt,
                    ?backoff,
                    error = last_err.as_ref().map(tracing::field::display),
                    "retrying request"
                );
                tokio::time::sleep(backoff).await;
            }

            tracing::debug!(target: TRACING_TARGET, %method, %url, "sending request");

            let mut req = self
                .http
                .request(method.clone(), url.clone())
                .header(AUTHORIZATION, self.auth.clone());

            if let Some(ref b) = body {
                req = req.json(b);
            }

            let response = match req.send().await {
                Ok(r) => r,
                Err(e) => {
                    // Network-level error: retry if we have attempts left.
                    last_err = Some(InspectorError::Http(e));
                    continue;
                }
            };

            match decode_response(response).await {
                Ok(value) => return Ok(value),
                Err(err) if is_transient(&err) => last_err = Some(err),
                Err(err) => return Err(err),
            }
        }

        // All retries exhausted.
        Err(last_err.unwrap_or_else(|| InspectorError::Api {
            status_code: 0,
            message: "request failed after all retries".into(),
            body: None,
        }))
    }
}

#[async_trait]
impl RequestExecutor for Client {
    async fn fetch_report(&self, id: i64) -> Result<Report> {
        self.get_report(id).await
    }

    async fn fetch_sku_page(&self, offset: usize, limit: usize) -> Result<Pagination> {
        self.get_sku(offset, limit).await
    }
}

async fn send_once<T: DeserializeOwned>(req: RequestBuilder) -> Result<T> {
    let response = req.send().await.map_err(InspectorError::Http)?;
    decode_response(response).await
}

/// Deserialize a successful response, or map the status to a typed error.
async fn decode_response<T: DeserializeOwned>(response: Response) -> Result<T> {
    let status = response.status();

    if status.is_success() {
        return response.json().await.map_err(InspectorError::Http);
    }

    let status_code = status.as_u16();
    let response_text = response.text().await.unwrap_or_default();

    tracing::debug!(
        target: TRACING_TARGET,
        status_code,
        body = %response_text,
        "request failed"
    );

    let parsed_body: Option<serde_json::Value> = serde_json::from_str(&response_text).ok();

    // The service reports problems under `detail` (DRF style) or `error`.
    let message = parsed_body
        .as_ref()
        .and_then(|b| b.get("detail").or_else(|| b.get("error")))
        .and_then(|e| e.as_str())
        .unwrap_or(&response_text)
        .to_string();

    Err(match status_code {
        401 => InspectorError::Authentication { message },
        403 => InspectorError::PermissionDenied { message },
        404 => InspectorError::NotFound { message },
        429 => {
            let retry_after = parsed_body
                .as_ref()
                .and_then(|b| b.get("retryAfter").or_else(|| b.get("retry_after")))
                .and_then(|v| v.as_f64());

            InspectorError::RateLimit {
                message,
                retry_after,
            }
        }
        _ => InspectorError::Api {
            status_code,
            message,
            body: parsed_body,
        },
    })
}

fn is_transient(err: &InspectorError) -> bool {
    match err {
        InspectorError::RateLimit { .. } => true,
        InspectorError::Api { status_code, .. } => *status_code >= 500,
        _ => false,
    }
}

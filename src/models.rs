use std::collections::HashMap;
use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::decode::{
    decode_items, weak_bool, weak_f64, weak_i64, weak_opt_f64, weak_opt_i64, weak_string,
};
use crate::errors::{InspectorError, Result};

/// Report type identifiers accepted by [`RecognizeRequest::report_types`].
pub mod report_type {
    pub const FACING_COUNT: &str = "FACING_COUNT";
    pub const SHARE_OF_SPACE: &str = "SHARE_OF_SPAC";
    pub const REALOGRAM: &str = "REALOGRAM";
    pub const PRICE_TAGS: &str = "PRICE_TAGS";
    pub const MHL_COMPLIANCE: &str = "MHL_COMPLIANCE";
    pub const PLANOGRAM_COMPLIANCE: &str = "PLANOGRAM_COMPLIANCE";
}

/// An uploaded shelf photo.
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq)]
pub struct Image {
    pub id: i64,
    #[serde(default)]
    pub url: Option<String>,
    /// Pixels.
    #[serde(default)]
    pub width: u32,
    /// Pixels.
    #[serde(default)]
    pub height: u32,
    #[serde(default)]
    pub created_date: Option<DateTime<Utc>>,
}

/// A merchandiser visit that groups recognition requests.
#[derive(Debug, Clone, Default, Deserialize, Serialize, PartialEq)]
pub struct Visit {
    pub id: i64,
    /// Client-specific customer/outlet/shop.
    #[serde(default)]
    pub shop: Option<i64>,
    /// Client-specific agent name, id, or route.
    #[serde(default)]
    pub agent: Option<String>,
    /// UTC.
    #[serde(default)]
    pub started_date: Option<DateTime<Utc>>,
    #[serde(default)]
    pub latitude: Option<f64>,
    #[serde(default)]
    pub longitude: Option<f64>,
}

/// Body of `POST recognize/`.
#[derive(Debug, Clone, Default, Deserialize, Serialize, PartialEq)]
pub struct RecognizeRequest {
    pub images: Vec<i64>,
    /// See [`report_type`].
    pub report_types: Vec<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub display: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub visit: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub datetime: Option<DateTime<Utc>>,
    /// Reports are POSTed here one by one as soon as they are ready.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub webhook: Option<String>,
    /// Two-letter country of the products, e.g. "RU".
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub country_code: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub retail_chain: Option<String>,
}

/// Returned by `POST recognize/`.
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq)]
pub struct RecognizeResponse {
    pub id: i64,
    #[serde(default)]
    pub images: Vec<i64>,
    #[serde(default)]
    pub display: Option<i64>,
    /// UUID of the created scene.
    #[serde(default)]
    pub scene: String,
    /// Report type to report id, one per requested type.
    #[serde(default)]
    pub reports: HashMap<String, i64>,
}

/// Body of `POST recognition_error/`: flags a SKU that was recognized wrongly.
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq)]
pub struct RecognitionErrorRequest {
    pub images: Vec<i64>,
    #[serde(rename = "sku_gid")]
    pub sku_id: i64,
    pub scene: String,
    pub message: String,
}

#[derive(Debug, Clone, Deserialize, Serialize, PartialEq)]
pub struct RecognitionErrorResponse {
    pub recognition_error_id: i64,
}

/// Lifecycle of a report. Only [`Ready`](Self::Ready) and
/// [`Error`](Self::Error) are terminal.
#[derive(Debug, Clone, Copy, Default, Deserialize, Serialize, PartialEq, Eq)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ReportStatus {
    NotReady,
    Ready,
    Error,
    /// A missing status, or any status string this SDK does not know;
    /// treated as non-terminal.
    #[default]
    #[serde(other)]
    Unknown,
}

impl ReportStatus {
    pub fn is_terminal(self) -> bool {
        matches!(self, Self::Ready | Self::Error)
    }
}

/// A generated report. Check `status` or use the decoders for `json`.
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq)]
pub struct Report {
    pub id: i64,
    #[serde(default)]
    pub status: ReportStatus,
    #[serde(default)]
    pub report_type: String,
    #[serde(default)]
    pub created_date: Option<DateTime<Utc>>,
    #[serde(default)]
    pub updated_date: Option<DateTime<Utc>>,
    #[serde(default)]
    pub visit: Option<i64>,
    /// Server message, set when `status` is `ERROR`.
    #[serde(default)]
    pub error: Option<String>,
    /// Report data; its shape depends on `report_type`.
    #[serde(default)]
    pub json: serde_json::Value,
}

impl Report {
    /// Decode a `FACING_COUNT` payload.
    pub fn facing_count(&self) -> Result<Vec<FacingCount>> {
        decode_items(&self.json)
    }

    /// Decode a `PRICE_TAGS` payload.
    pub fn price_tags(&self) -> Result<Vec<PriceTag>> {
        decode_items(&self.json)
    }

    /// Decode a `REALOGRAM` payload.
    pub fn realogram(&self) -> Result<Vec<Realogram>> {
        decode_items(&self.json)
    }
}

#[derive(Debug, Clone, Default, Deserialize, Serialize, PartialEq)]
pub struct FacingCount {
    #[serde(default, deserialize_with = "weak_i64")]
    pub count: i64,
    #[serde(default, deserialize_with = "weak_i64")]
    pub sku_id: i64,
}

#[derive(Debug, Clone, Default, Deserialize, Serialize, PartialEq)]
pub struct PriceTag {
    #[serde(default, deserialize_with = "weak_string")]
    pub brand: String,
    #[serde(default, deserialize_with = "weak_string")]
    pub manufacturer: String,
    #[serde(default, deserialize_with = "weak_f64")]
    pub price: f64,
    #[serde(default, deserialize_with = "weak_string")]
    pub name: String,
    #[serde(default, deserialize_with = "weak_string")]
    pub category: String,
    #[serde(default, deserialize_with = "weak_string")]
    pub sku_image_url: String,
    /// `"1"` when the tag is a promotion.
    #[serde(default, deserialize_with = "weak_string")]
    pub promo: String,
    #[serde(default, deserialize_with = "weak_i64")]
    pub sku_id: i64,
}

#[derive(Debug, Clone, Default, Deserialize, Serialize, PartialEq)]
pub struct Realogram {
    #[serde(default, deserialize_with = "weak_i64")]
    pub image: i64,
    #[serde(default)]
    pub annotations: Vec<RealogramAnnotation>,
    #[serde(default)]
    pub shelf_annotations: Vec<ShelfAnnotation>,
}

/// A recognized product box, in image pixels.
#[derive(Debug, Clone, Default, Deserialize, Serialize, PartialEq)]
pub struct RealogramAnnotation {
    #[serde(default, deserialize_with = "weak_i64")]
    pub h: i64,
    #[serde(default, deserialize_with = "weak_i64")]
    pub w: i64,
    #[serde(default, deserialize_with = "weak_i64")]
    pub x: i64,
    #[serde(default, deserialize_with = "weak_i64")]
    pub y: i64,
    #[serde(default, deserialize_with = "weak_string")]
    pub name: String,
    #[serde(default, deserialize_with = "weak_i64")]
    pub sku_id: i64,
    #[serde(default, deserialize_with = "weak_bool")]
    pub duplicate: bool,
}

/// A detected shelf edge, from (x1, y1) to (x2, y2).
#[derive(Debug, Clone, Default, Deserialize, Serialize, PartialEq)]
pub struct ShelfAnnotation {
    #[serde(default, deserialize_with = "weak_i64")]
    pub x1: i64,
    #[serde(default, deserialize_with = "weak_i64")]
    pub y1: i64,
    #[serde(default, deserialize_with = "weak_i64")]
    pub x2: i64,
    #[serde(default, deserialize_with = "weak_i64")]
    pub y2: i64,
}

/// Body the service POSTs to a recognition webhook once reports are ready.
#[derive(Debug, Clone, Default, Deserialize, Serialize, PartialEq)]
pub struct WebhookReports {
    pub id: i64,
    #[serde(default)]
    pub display: Option<i64>,
    #[serde(default)]
    pub reports: WebhookReportSet,
}

#[derive(Debug, Clone, Default, Deserialize, Serialize, PartialEq)]
pub struct WebhookReportSet {
    #[serde(default, rename = "FACING_COUNT_1_5")]
    pub facing_count: Vec<FacingCount>,
    #[serde(default, rename = "PRICE_TAGS")]
    pub price_tags: Vec<PriceTag>,
    #[serde(default, rename = "REALOGRAM_1_5")]
    pub realogram: Vec<Realogram>,
}

impl WebhookReports {
    /// Parse a raw webhook request body.
    pub fn from_slice(body: &[u8]) -> Result<Self> {
        serde_json::from_slice(body).map_err(|e| InspectorError::decode("webhook reports", e))
    }
}

/// A catalog product.
#[derive(Debug, Clone, Default, Deserialize, Serialize, PartialEq)]
pub struct Sku {
    #[serde(deserialize_with = "weak_i64")]
    pub id: i64,
    /// Client-specific code.
    #[serde(default)]
    pub cid: Option<String>,
    #[serde(default)]
    pub ean13: Option<String>,
    /// Id of the SKU's reference image.
    #[serde(default, deserialize_with = "weak_opt_i64")]
    pub image: Option<i64>,
    #[serde(default)]
    pub name: String,
    #[serde(default, deserialize_with = "weak_opt_i64")]
    pub brand: Option<i64>,
    #[serde(default, deserialize_with = "weak_opt_i64")]
    pub category: Option<i64>,
    #[serde(default, deserialize_with = "weak_opt_i64")]
    pub manufacturer: Option<i64>,
    /// Width, mm.
    #[serde(default, deserialize_with = "weak_opt_f64")]
    pub size_x_mm: Option<f64>,
    /// Height, mm.
    #[serde(default, deserialize_with = "weak_opt_f64")]
    pub size_y_mm: Option<f64>,
    /// Depth, mm.
    #[serde(default, deserialize_with = "weak_opt_f64")]
    pub size_z_mm: Option<f64>,
}

/// One page of a list endpoint.
#[derive(Debug, Clone, Default, Deserialize, Serialize, PartialEq)]
pub struct Pagination {
    /// Total items, as reported by the server.
    #[serde(default)]
    pub count: u64,
    /// URL of the next page. `None` means no more results.
    #[serde(default)]
    pub next: Option<String>,
    #[serde(default)]
    pub previous: Option<String>,
    /// Untyped page items; see [`decode_items`](crate::decode_items).
    #[serde(default)]
    pub results: serde_json::Value,
}

impl Pagination {
    /// `true` if `next` is `Some`.
    pub fn has_more(&self) -> bool {
        self.next.is_some()
    }
}

/// Maps the attempt number and the previous interval to the next interval.
pub type BackoffFn = Box<dyn Fn(u32, Duration) -> Duration + Send + Sync>;

/// Called with every non-terminal report seen while waiting. The final
/// `READY` or `ERROR` report is not passed to it; it is the wait's result.
pub type ProgressFn = Box<dyn Fn(&Report) + Send + Sync>;

/// Polling config for [`wait_for_report`](crate::Client::wait_for_report).
pub struct ReportWaitOptions {
    /// Default: 2s. Zero is replaced by the default.
    pub interval: Duration,
    /// Default: 60s. `Some(0)` is replaced by the default; `None` waits with
    /// no deadline, so only cancellation stops it.
    pub timeout: Option<Duration>,
    /// Grows the interval after each non-terminal attempt.
    pub backoff: Option<BackoffFn>,
    pub on_progress: Option<ProgressFn>,
}

impl ReportWaitOptions {
    pub const DEFAULT_INTERVAL: Duration = Duration::from_secs(2);
    pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(60);

    /// Set the progress callback.
    pub fn on_progress(mut self, f: impl Fn(&Report) + Send + Sync + 'static) -> Self {
        self.on_progress = Some(Box::new(f));
        self
    }

    /// Set the interval backoff, e.g. [`exponential_backoff`](crate::exponential_backoff).
    pub fn backoff(mut self, f: BackoffFn) -> Self {
        self.backoff = Some(f);
        self
    }

    pub(crate) fn effective_interval(&self) -> Duration {
        if self.interval.is_zero() {
            Self::DEFAULT_INTERVAL
        } else {
            self.interval
        }
    }

    pub(crate) fn effective_timeout(&self) -> Option<Duration> {
        self.timeout.map(|t| {
            if t.is_zero() {
                Self::DEFAULT_TIMEOUT
            } else {
                t
            }
        })
    }
}

impl Default for ReportWaitOptions {
    fn default() -> Self {
        Self {
            interval: Self::DEFAULT_INTERVAL,
            timeout: Some(Self::DEFAULT_TIMEOUT),
            backoff: None,
            on_progress: None,
        }
    }
}

// ---------------------------------------------------------------------------
// Internal request bodies (not part of the public API surface)
// ---------------------------------------------------------------------------

/// Body of `POST uploads/upload_by_url/`.
#[derive(Serialize)]
pub(crate) struct UploadByUrlRequest<'a> {
    pub url: &'a str,
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    #[test]
    fn report_decodes_with_unknown_status() {
        let report: Report = serde_json::from_value(json!({
            "id": 1,
            "status": "QUEUED",
            "report_type": "FACING_COUNT_1_5"
        }))
        .unwrap();
        assert_eq!(report.status, ReportStatus::Unknown);
        assert!(!report.status.is_terminal());
        assert!(report.json.is_null());
    }

    #[test]
    fn report_without_status_is_not_terminal() {
        let report: Report = serde_json::from_value(json!({"id": 4, "status": ""})).unwrap();
        assert_eq!(report.status, ReportStatus::Unknown);

        let report: Report = serde_json::from_value(json!({"id": 4})).unwrap();
        assert_eq!(report.status, ReportStatus::Unknown);
        assert!(!report.status.is_terminal());
    }

    #[test]
    fn report_decodes_full_payload() {
        let report: Report = serde_json::from_value(json!({
            "id": 2831638,
            "status": "READY",
            "report_type": "FACING_COUNT_1_5",
            "created_date": "2019-08-26T16:33:30.563548Z",
            "updated_date": "2019-08-26T16:34:12.241644Z",
            "visit": 115604,
            "json": [{"count": 2, "sku_id": 2176}]
        }))
        .unwrap();

        assert_eq!(report.status, ReportStatus::Ready);
        assert_eq!(report.visit, Some(115604));
        assert_eq!(
            report.created_date.unwrap().to_rfc3339(),
            "2019-08-26T16:33:30.563548+00:00"
        );
        assert_eq!(
            report.facing_count().unwrap(),
            vec![FacingCount { count: 2, sku_id: 2176 }]
        );
    }

    #[test]
    fn price_tags_coerce_promo_flag() {
        let report = Report {
            id: 1,
            status: ReportStatus::Ready,
            report_type: report_type::PRICE_TAGS.into(),
            created_date: None,
            updated_date: None,
            visit: None,
            error: None,
            json: json!([{
                "promo": true,
                "category": "HOME & HYGIENE",
                "sku_image_url": "http://img.example.com/sku/9859.jpg",
                "manufacturer": "Henkel",
                "price": 360.0,
                "min_price": 360.0,
                "name": "Bref",
                "sku_id": 9859,
                "brand": "Bref",
                "price_tag_colors": ["white", "red"]
            }]),
        };

        assert_eq!(
            report.price_tags().unwrap(),
            vec![PriceTag {
                brand: "Bref".into(),
                manufacturer: "Henkel".into(),
                price: 360.0,
                name: "Bref".into(),
                category: "HOME & HYGIENE".into(),
                sku_image_url: "http://img.example.com/sku/9859.jpg".into(),
                promo: "1".into(),
                sku_id: 9859,
            }]
        );
    }

    #[test]
    fn realogram_decodes_nested_annotations() {
        let report = Report {
            id: 1,
            status: ReportStatus::Ready,
            report_type: report_type::REALOGRAM.into(),
            created_date: None,
            updated_date: None,
            visit: None,
            error: None,
            json: json!([{
                "image": 55801587,
                "annotations": [{
                    "h": 250, "w": 131, "x": 948, "y": 1214,
                    "name": "Losk Gel 30WL", "sku_id": 53733, "duplicate": false
                }],
                "shelf_annotations": [{"x1": -14, "x2": 1118, "y1": 1362, "y2": 1349}]
            }]),
        };

        let realogram = report.realogram().unwrap();
        assert_eq!(realogram.len(), 1);
        assert_eq!(realogram[0].image, 55801587);
        assert_eq!(realogram[0].annotations[0].sku_id, 53733);
        assert_eq!(
            realogram[0].shelf_annotations[0],
            ShelfAnnotation { x1: -14, y1: 1362, x2: 1118, y2: 1349 }
        );
    }

    #[test]
    fn webhook_reports_parse() {
        let body = br#"{
            "id": 406907,
            "display": 1,
            "reports": {
                "FACING_COUNT_1_5": [{"sku_id": 9857, "count": 4}],
                "PRICE_TAGS": [{"name": "Bref", "price": 360.0, "sku_id": 9859}]
            }
        }"#;

        let parsed = WebhookReports::from_slice(body).unwrap();
        assert_eq!(parsed.id, 406907);
        assert_eq!(parsed.display, Some(1));
        assert_eq!(
            parsed.reports.facing_count,
            vec![FacingCount { count: 4, sku_id: 9857 }]
        );
        assert_eq!(parsed.reports.price_tags[0].name, "Bref");
        assert!(parsed.reports.realogram.is_empty());
    }

    #[test]
    fn webhook_reports_reject_truncated_body() {
        let err = WebhookReports::from_slice(b"{").unwrap_err();
        assert!(matches!(err, InspectorError::Decode { what: "webhook reports", .. }));
    }

    #[test]
    fn sku_tolerates_nulls_and_extra_fields() {
        let skus: Vec<Sku> = decode_items(&json!([{
            "id": 12423,
            "cid": null,
            "ean13": null,
            "image": 3178440,
            "name": "AUTO:Mission_284537524",
            "brand": null,
            "category": 53,
            "is_new": true
        }]))
        .unwrap();

        assert_eq!(skus[0].id, 12423);
        assert_eq!(skus[0].cid, None);
        assert_eq!(skus[0].category, Some(53));
        assert_eq!(skus[0].size_x_mm, None);
    }

    #[test]
    fn sku_numbers_tolerate_float_encoding() {
        let skus: Vec<Sku> = decode_items(&json!([{
            "id": 5.0,
            "name": "x",
            "image": 1001.0,
            "category": "53",
            "size_x_mm": 100
        }]))
        .unwrap();

        assert_eq!(skus[0].id, 5);
        assert_eq!(skus[0].image, Some(1001));
        assert_eq!(skus[0].category, Some(53));
        assert_eq!(skus[0].brand, None);
        assert_eq!(skus[0].size_x_mm, Some(100.0));
    }

    #[test]
    fn wait_options_substitute_zero_values() {
        let opts = ReportWaitOptions {
            interval: Duration::ZERO,
            timeout: Some(Duration::ZERO),
            ..Default::default()
        };
        assert_eq!(opts.effective_interval(), ReportWaitOptions::DEFAULT_INTERVAL);
        assert_eq!(opts.effective_timeout(), Some(ReportWaitOptions::DEFAULT_TIMEOUT));

        let unbounded = ReportWaitOptions {
            timeout: None,
            ..Default::default()
        };
        assert_eq!(unbounded.effective_timeout(), None);
    }
}

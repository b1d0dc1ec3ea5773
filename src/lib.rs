//! # Inspector Cloud SDK for Rust
//!
//! Async client for the Inspector Cloud shelf image recognition API. Upload
//! shelf photos, start recognition, wait for the generated reports, and page
//! through your SKU catalog.
//!
//! ## Quick start
//!
//! ```no_run
//! use inspector::{Client, RecognizeRequest, report_type};
//!
//! #[tokio::main]
//! async fn main() -> inspector::Result<()> {
//!     let client = Client::new("https://acme.inspector-cloud.com/api/v1.5/", "ic_token")?;
//!
//!     let image = client.upload_image("shelf.jpg").await?;
//!     let recognition = client
//!         .recognize(&RecognizeRequest {
//!             images: vec![image.id],
//!             report_types: vec![report_type::PRICE_TAGS.into()],
//!             ..Default::default()
//!         })
//!         .await?;
//!
//!     for id in recognition.reports.values() {
//!         let report = client.wait_for_report(*id, None).await?;
//!         for tag in report.price_tags()? {
//!             println!("{} {:.2}", tag.name, tag.price);
//!         }
//!     }
//!
//!     Ok(())
//! }
//! ```
//!
//! ## Paging the catalog
//!
//! ```no_run
//! # async fn example(client: inspector::Client) -> inspector::Result<()> {
//! let mut pages = client.iterate_sku(100);
//! while let Some(skus) = pages.next_page().await? {
//!     println!("{} SKUs", skus.len());
//! }
//!
//! // Or all at once:
//! let all = client.get_all_sku(100).await?;
//! # Ok(())
//! # }
//! ```

mod client;
mod decode;
mod errors;
mod executor;
mod models;
mod pagination;
mod waiter;

#[cfg(test)]
mod mock;

pub use client::{Client, ClientBuilder};
pub use decode::decode_items;
pub use errors::{InspectorError, Result};
pub use executor::RequestExecutor;
pub use models::{
    report_type, BackoffFn, FacingCount, Image, Pagination, PriceTag, ProgressFn, Realogram,
    RealogramAnnotation, RecognitionErrorRequest, RecognitionErrorResponse, RecognizeRequest,
    RecognizeResponse, Report, ReportStatus, ReportWaitOptions, ShelfAnnotation, Sku, Visit,
    WebhookReportSet, WebhookReports,
};
pub use pagination::{parse_next_offset, SkuIterator, DEFAULT_PAGE_SIZE, MAX_PAGINATION_PAGES};
pub use waiter::{exponential_backoff, linear_backoff, ReportWaiter};

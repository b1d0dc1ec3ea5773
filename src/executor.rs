use async_trait::async_trait;

use crate::errors::Result;
use crate::models::{Pagination, Report};

/// The fetches the report waiter and the SKU iterator are built on.
///
/// [`Client`](crate::Client) implements this over HTTP. Implementations must
/// be safe to share between independent waiters and iterators.
#[async_trait]
pub trait RequestExecutor: Send + Sync {
    /// `GET reports/{id}/`.
    async fn fetch_report(&self, id: i64) -> Result<Report>;

    /// `GET sku/?limit={limit}&offset={offset}`.
    async fn fetch_sku_page(&self, offset: usize, limit: usize) -> Result<Pagination>;
}

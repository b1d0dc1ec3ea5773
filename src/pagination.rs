//! Offset pagination over the SKU catalog.

use std::collections::HashSet;

use tokio_util::sync::CancellationToken;
use url::Url;

use crate::decode::decode_items;
use crate::errors::{InspectorError, Result};
use crate::executor::RequestExecutor;
use crate::models::Sku;

/// Tracing target for pagination.
const TRACING_TARGET: &str = "inspector::pagination";

/// Page size used when the caller passes `0`.
pub const DEFAULT_PAGE_SIZE: usize = 100;

/// Hard cap on pages fetched by one iterator.
pub const MAX_PAGINATION_PAGES: usize = 1000;

/// Lazy, forward-only iteration over the SKU catalog.
///
/// Each [`next_page`](Self::next_page) fetches one page and advances to the
/// offset named by the server's `next` cursor. The iterator refuses to visit
/// the same offset twice and stops after [`MAX_PAGINATION_PAGES`] pages, so a
/// misbehaving server cannot keep it running forever. Once it has ended or
/// failed it cannot be restarted; build a new one instead.
///
/// # Example
///
/// ```no_run
/// # async fn example(client: inspector::Client) -> inspector::Result<()> {
/// let mut pages = client.iterate_sku(50);
/// while let Some(skus) = pages.next_page().await? {
///     for sku in &skus {
///         println!("{} {}", sku.id, sku.name);
///     }
/// }
/// # Ok(())
/// # }
/// ```
pub struct SkuIterator<'a, E: ?Sized> {
    executor: &'a E,
    cancel: CancellationToken,
    page_size: usize,
    offset: usize,
    has_more: bool,
    seen_offsets: HashSet<usize>,
    max_pages: usize,
}

impl<'a, E> SkuIterator<'a, E>
where
    E: RequestExecutor + ?Sized,
{
    /// `page_size` of `0` means [`DEFAULT_PAGE_SIZE`].
    pub fn new(executor: &'a E, page_size: usize) -> Self {
        Self {
            executor,
            cancel: CancellationToken::new(),
            page_size: if page_size == 0 {
                DEFAULT_PAGE_SIZE
            } else {
                page_size
            },
            offset: 0,
            has_more: true,
            seen_offsets: HashSet::new(),
            max_pages: MAX_PAGINATION_PAGES,
        }
    }

    /// Fail with [`InspectorError::Cancelled`] instead of fetching once
    /// `token` fires.
    pub fn with_cancellation(mut self, token: CancellationToken) -> Self {
        self.cancel = token;
        self
    }

    pub fn page_size(&self) -> usize {
        self.page_size
    }

    /// Fetch the next page.
    ///
    /// Returns `Ok(None)` once the server reports no further pages, and on
    /// every call after that. `Ok(Some(vec![]))` is an empty page, not the end.
    ///
    /// # Errors
    ///
    /// - [`InspectorError::Cancelled`] if the token has fired.
    /// - [`InspectorError::PaginationLoop`] if the cursor leads back to a
    ///   visited offset. A call retried after a failed fetch lands here too.
    /// - [`InspectorError::PageLimitExceeded`] after too many pages.
    /// - [`InspectorError::PageFetch`] if fetching or decoding the page fails.
    pub async fn next_page(&mut self) -> Result<Option<Vec<Sku>>> {
        if !self.has_more {
            return Ok(None);
        }
        if self.cancel.is_cancelled() {
            return Err(InspectorError::Cancelled);
        }
        if self.seen_offsets.contains(&self.offset) {
            return Err(InspectorError::PaginationLoop {
                offset: self.offset,
            });
        }
        if self.seen_offsets.len() >= self.max_pages {
            return Err(InspectorError::PageLimitExceeded {
                max_pages: self.max_pages,
            });
        }

        let offset = self.offset;
        self.seen_offsets.insert(offset);

        let fetched = tokio::select! {
            biased;
            _ = self.cancel.cancelled() => return Err(InspectorError::Cancelled),
            page = self.executor.fetch_sku_page(offset, self.page_size) => page,
        };
        let page = fetched.map_err(|source| InspectorError::PageFetch {
            offset,
            source: Box::new(source),
        })?;

        let skus: Vec<Sku> =
            decode_items(&page.results).map_err(|source| InspectorError::PageFetch {
                offset,
                source: Box::new(source),
            })?;

        let next_offset = match page.next.as_deref().and_then(parse_next_offset) {
            Some(next) => next,
            None => offset.checked_add(skus.len()).ok_or_else(|| {
                InspectorError::PageFetch {
                    offset,
                    source: Box::new(InspectorError::decode(
                        "next page offset",
                        format!("offset {offset} + {} overflows", skus.len()),
                    )),
                }
            })?,
        };
        self.has_more = page.next.is_some();
        self.offset = next_offset;

        tracing::debug!(
            target: TRACING_TARGET,
            offset,
            items = skus.len(),
            total = page.count,
            next_offset = self.offset,
            has_more = self.has_more,
            "fetched SKU page"
        );

        Ok(Some(skus))
    }

    /// Drain the iterator, concatenating every page in order.
    ///
    /// Stops at the first error without trying to resume.
    pub async fn collect_all(mut self) -> Result<Vec<Sku>> {
        let mut all = Vec::new();
        while let Some(page) = self.next_page().await? {
            all.extend(page);
        }
        Ok(all)
    }
}

/// Extract the `offset` query parameter from a `next` page URL.
///
/// Relative cursors such as `/api/v1.5/sku/?offset=20` are accepted. `None`
/// when the URL does not parse, has no `offset`, or the value is not a
/// non-negative integer; callers then advance by the page length instead.
pub fn parse_next_offset(next: &str) -> Option<usize> {
    let base = Url::parse("http://localhost/").ok()?;
    let url = Url::options().base_url(Some(&base)).parse(next).ok()?;
    let value = url
        .query_pairs()
        .find(|(key, _)| key == "offset")
        .map(|(_, value)| value)?;
    value.parse().ok()
}

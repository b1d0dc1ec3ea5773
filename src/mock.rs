//! In-memory executors for unit tests.

use std::collections::{HashMap, VecDeque};
use std::sync::Mutex;

use async_trait::async_trait;
use serde_json::json;

use crate::errors::{InspectorError, Result};
use crate::executor::RequestExecutor;
use crate::models::{Pagination, Report, ReportStatus};

pub(crate) fn report(id: i64, status: ReportStatus) -> Report {
    Report {
        id,
        status,
        report_type: "FACING_COUNT".into(),
        created_date: None,
        updated_date: None,
        visit: None,
        error: None,
        json: serde_json::Value::Null,
    }
}

/// A page whose results are SKUs with the given ids.
pub(crate) fn sku_page(ids: &[i64], next: Option<&str>) -> Pagination {
    Pagination {
        count: ids.len() as u64,
        next: next.map(str::to_string),
        previous: None,
        results: ids
            .iter()
            .map(|id| json!({"id": id, "cid": format!("SKU{id:03}"), "name": format!("Product {id}")}))
            .collect(),
    }
}

#[derive(Default)]
pub(crate) struct ScriptedExecutor {
    reports: Mutex<VecDeque<Result<Report>>>,
    report_fetches: Mutex<usize>,
    pages: Mutex<HashMap<usize, Result<Pagination>>>,
    page_requests: Mutex<Vec<(usize, usize)>>,
}

impl ScriptedExecutor {
    /// Reports are handed out in order, one per fetch.
    pub fn with_reports(reports: Vec<Result<Report>>) -> Self {
        Self {
            reports: Mutex::new(reports.into()),
            ..Default::default()
        }
    }

    /// Pages are keyed by offset. An offset can be served once.
    pub fn with_pages(pages: Vec<(usize, Result<Pagination>)>) -> Self {
        Self {
            pages: Mutex::new(pages.into_iter().collect()),
            ..Default::default()
        }
    }

    pub fn report_fetches(&self) -> usize {
        *self.report_fetches.lock().unwrap()
    }

    /// `(offset, limit)` of every page fetch, in order.
    pub fn page_requests(&self) -> Vec<(usize, usize)> {
        self.page_requests.lock().unwrap().clone()
    }
}

#[async_trait]
impl RequestExecutor for ScriptedExecutor {
    async fn fetch_report(&self, _id: i64) -> Result<Report> {
        *self.report_fetches.lock().unwrap() += 1;
        self.reports
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or_else(|| panic!("no scripted report left"))
    }

    async fn fetch_sku_page(&self, offset: usize, limit: usize) -> Result<Pagination> {
        self.page_requests.lock().unwrap().push((offset, limit));
        self.pages
            .lock()
            .unwrap()
            .remove(&offset)
            .unwrap_or_else(|| {
                Err(InspectorError::NotFound {
                    message: format!("no page at offset {offset}"),
                })
            })
    }
}

/// Serves an endless catalog: every page points at the next offset.
pub(crate) struct EndlessExecutor;

#[async_trait]
impl RequestExecutor for EndlessExecutor {
    async fn fetch_report(&self, id: i64) -> Result<Report> {
        Ok(report(id, ReportStatus::NotReady))
    }

    async fn fetch_sku_page(&self, offset: usize, limit: usize) -> Result<Pagination> {
        let next = format!("https://ic.example.com/api/v1.5/sku/?limit={limit}&offset={}", offset + limit);
        Ok(sku_page(&[offset as i64], Some(&next)))
    }
}

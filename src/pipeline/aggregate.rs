//! Accumulates per-page outcomes into a [`ConversionResult`].
//!
//! The aggregator is owned by a single conversion and is not shared across
//! threads. Pages are keyed by number, so the result lists come out in page
//! order regardless of the order outcomes were recorded in, and a page
//! promoted by the retry pass can never appear twice.

use crate::error::PageError;
use crate::output::{ConversionResult, RetriedPage};
use std::collections::{BTreeMap, BTreeSet};
use std::path::PathBuf;

#[derive(Debug, Default)]
pub struct ResultAggregator {
    total_pages: usize,
    files: BTreeMap<usize, PathBuf>,
    errors: BTreeMap<usize, PageError>,
    warning_pages: BTreeSet<usize>,
    retried: Vec<RetriedPage>,
    cancelled: bool,
}

impl ResultAggregator {
    pub fn new(total_pages: usize) -> Self {
        Self {
            total_pages,
            ..Default::default()
        }
    }

    pub fn record_success(&mut self, page: usize, path: PathBuf) {
        self.errors.remove(&page);
        self.files.insert(page, path);
    }

    /// Record a failed page. `flagged` adds it to the manual-inspection list.
    pub fn record_failure(&mut self, error: PageError, flagged: bool) {
        let page = error.page();
        if flagged {
            self.warning_pages.insert(page);
        }
        self.files.remove(&page);
        self.errors.insert(page, error);
    }

    /// Move a failed page to the successful set after a retry.
    ///
    /// Returns `false`, and changes nothing, if `page` is not currently failed.
    pub fn promote(&mut self, page: usize, path: PathBuf, dpi: f32) -> bool {
        if self.errors.remove(&page).is_none() {
            return false;
        }
        self.files.insert(page, path);
        self.retried.push(RetriedPage { page, dpi });
        true
    }

    pub fn mark_cancelled(&mut self) {
        self.cancelled = true;
    }

    /// Pages currently failed whose error is worth a retry, ascending.
    pub fn retryable_pages(&self) -> Vec<usize> {
        self.errors
            .values()
            .filter(|e| e.is_transient())
            .map(PageError::page)
            .collect()
    }

    pub fn failed_count(&self) -> usize {
        self.errors.len()
    }

    pub fn successful_count(&self) -> usize {
        self.files.len()
    }

    pub fn snapshot(&self) -> ConversionResult {
        ConversionResult {
            total_pages: self.total_pages,
            successful: self.files.len(),
            failed: self.errors.len(),
            output_files: self.files.values().cloned().collect(),
            errors: self.errors.values().cloned().collect(),
            warning_pages: self.warning_pages.iter().copied().collect(),
            retried_pages: self.retried.clone(),
            cancelled: self.cancelled,
        }
    }
}

//! Keyword search and batch runs.
//!
//! A run owns one sink: headers are written once, then every company of the batch
//! appends to the same tables. Companies run concurrently up to a fixed limit and
//! each one either succeeds or fails on its own.

use crate::errors::AppError;
use crate::extractors::items;
use crate::retrieval::{CompanyReport, CompanyRetriever};
use crate::sink::{RecordSink, RunId};
use chrono::Utc;
use futures::{stream, StreamExt};
use once_cell::sync::Lazy;
use regex::Regex;
use serde::Serialize;
use tokio::sync::watch;

/// Pagination of the single search call.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SearchParams {
    pub items_per_page: u32,
    pub start_index: u32,
}

impl Default for SearchParams {
    fn default() -> Self {
        Self {
            items_per_page: 25,
            start_index: 0,
        }
    }
}

/// Result of one company inside a batch.
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum CompanyOutcome {
    Succeeded { report: CompanyReport },
    Failed { company_number: String, error: String },
    Cancelled { company_number: String },
}

impl CompanyOutcome {
    pub fn company_number(&self) -> &str {
        match self {
            CompanyOutcome::Succeeded { report } => &report.company_number,
            CompanyOutcome::Failed { company_number, .. } => company_number,
            CompanyOutcome::Cancelled { company_number } => company_number,
        }
    }

    pub fn is_success(&self) -> bool {
        matches!(self, CompanyOutcome::Succeeded { .. })
    }
}

/// Summary of a run.
#[derive(Debug, Clone, Serialize)]
pub struct BatchSummary {
    pub run: RunId,
    pub keyword: Option<String>,
    pub succeeded: usize,
    pub failed: usize,
    pub cancelled: usize,
    pub companies: Vec<CompanyOutcome>,
    pub started_at: String,
    pub finished_at: String,
}

impl BatchSummary {
    pub fn outcome(&self, company_number: &str) -> Option<&CompanyOutcome> {
        self.companies
            .iter()
            .find(|c| c.company_number() == company_number)
    }
}

/// A cancel signal that never fires.
pub fn uncancellable() -> watch::Receiver<bool> {
    watch::channel(false).1
}

static COMPANY_NUMBER_REGEX: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^[A-Z0-9]{8}$").expect("company number pattern is valid"));

/// Normalizes a user-supplied company number.
///
/// Trims and upper-cases; purely numeric input shorter than eight digits is
/// zero-padded (`6` → `00000006`). Anything that is not eight alphanumerics is rejected.
pub fn normalize_company_number(input: &str) -> Result<String, AppError> {
    let mut number = input.trim().to_uppercase();
    if !number.is_empty() && number.len() < 8 && number.chars().all(|c| c.is_ascii_digit()) {
        number = format!("{:0>8}", number);
    }

    if COMPANY_NUMBER_REGEX.is_match(&number) {
        Ok(number)
    } else {
        Err(AppError::BadRequest(format!(
            "'{}' is not a valid company number",
            input.trim()
        )))
    }
}

/// Runs batches of companies against one sink.
#[derive(Clone)]
pub struct SearchOrchestrator {
    retriever: CompanyRetriever,
    max_concurrent_companies: usize,
}

impl SearchOrchestrator {
    pub fn new(retriever: CompanyRetriever, max_concurrent_companies: usize) -> Self {
        Self {
            retriever,
            max_concurrent_companies: max_concurrent_companies.max(1),
        }
    }

    pub fn retriever(&self) -> &CompanyRetriever {
        &self.retriever
    }

    /// Performs the single search call and returns the company numbers it lists.
    ///
    /// Results without a company number (e.g. officer hits) are ignored.
    pub async fn search_company_numbers(
        &self,
        keyword: &str,
        params: SearchParams,
    ) -> Result<Vec<String>, AppError> {
        let keyword = keyword.trim();
        if keyword.is_empty() {
            return Err(AppError::BadRequest("Search query is required".to_string()));
        }

        let raw = self
            .retriever
            .client()
            .search(keyword, params.items_per_page, params.start_index)
            .await?;

        let numbers: Vec<String> = items(&raw)
            .iter()
            .filter_map(|item| item.get("company_number").and_then(|v| v.as_str()))
            .map(str::trim)
            .filter(|n| !n.is_empty())
            .map(String::from)
            .collect();

        tracing::info!(
            "Search '{}' returned {} companies (of {} items)",
            keyword,
            numbers.len(),
            items(&raw).len()
        );
        Ok(numbers)
    }

    /// Keyword run: search, open the run's sink, write headers, retrieve every result.
    ///
    /// A failed search fails the run before `open_sink` is called, so no output
    /// exists for it. An empty result still yields header-only tables.
    pub async fn run_search<S, F>(
        &self,
        keyword: &str,
        params: SearchParams,
        open_sink: F,
        cancel: watch::Receiver<bool>,
    ) -> Result<(BatchSummary, S), AppError>
    where
        S: RecordSink,
        F: FnOnce(&RunId) -> Result<S, AppError>,
    {
        let numbers = self.search_company_numbers(keyword, params).await?;
        let run = RunId::for_keyword(keyword.trim());
        let sink = open_sink(&run)?;
        sink.write_headers()?;

        let mut summary = self.run_companies(run, numbers, &sink, cancel).await;
        summary.keyword = Some(keyword.trim().to_string());
        Ok((summary, sink))
    }

    /// Single-company run, prefixed by the company number.
    pub async fn run_company<S, F>(
        &self,
        company_number: &str,
        open_sink: F,
    ) -> Result<(BatchSummary, S), AppError>
    where
        S: RecordSink,
        F: FnOnce(&RunId) -> Result<S, AppError>,
    {
        let number = normalize_company_number(company_number)?;
        let run = RunId::new(number.clone());
        let sink = open_sink(&run)?;
        sink.write_headers()?;

        let summary = self
            .run_companies(run, vec![number], &sink, uncancellable())
            .await;
        Ok((summary, sink))
    }

    /// Retrieves each company into `sink`. Headers must already be written.
    ///
    /// Once `cancel` turns `true`, companies that have not started are reported as
    /// cancelled; companies already in flight run to completion.
    pub async fn run_companies(
        &self,
        run: RunId,
        company_numbers: Vec<String>,
        sink: &dyn RecordSink,
        cancel: watch::Receiver<bool>,
    ) -> BatchSummary {
        let started_at = Utc::now().to_rfc3339();
        let retriever = &self.retriever;

        tracing::info!(
            "Run {}_{}: retrieving {} companies ({} at a time)",
            run.prefix,
            run.timestamp,
            company_numbers.len(),
            self.max_concurrent_companies
        );

        let companies: Vec<CompanyOutcome> = stream::iter(company_numbers)
            .map(|company_number| {
                let cancel = cancel.clone();
                async move {
                    // Checked when the company starts; a started company always finishes.
                    if *cancel.borrow() {
                        tracing::warn!("Company {} cancelled before start", company_number);
                        return CompanyOutcome::Cancelled { company_number };
                    }

                    match retriever.retrieve(&company_number, sink).await {
                        Ok(report) => CompanyOutcome::Succeeded { report },
                        Err(err) => {
                            tracing::error!("Company {} failed: {}", company_number, err);
                            CompanyOutcome::Failed {
                                company_number,
                                error: err.to_string(),
                            }
                        }
                    }
                }
            })
            .buffer_unordered(self.max_concurrent_companies)
            .collect()
            .await;

        let succeeded = companies.iter().filter(|c| c.is_success()).count();
        let cancelled = companies
            .iter()
            .filter(|c| matches!(c, CompanyOutcome::Cancelled { .. }))
            .count();
        let failed = companies.len() - succeeded - cancelled;

        tracing::info!(
            "Run {}_{} complete: {} succeeded, {} failed, {} cancelled",
            run.prefix,
            run.timestamp,
            succeeded,
            failed,
            cancelled
        );

        BatchSummary {
            run,
            keyword: None,
            succeeded,
            failed,
            cancelled,
            companies,
            started_at,
            finished_at: Utc::now().to_rfc3339(),
        }
    }
}

#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions, clippy::cargo_common_metadata)]

//! Report execution.
//!
//! Runs an assembled request body against the reporting backend, one
//! unit of work at a time. By default the overall window is split into
//! single-day units, executed most recent day first, so long pulls hit
//! sampling less and a crash loses at most the unit in flight. Every
//! completed unit is appended to a recovery ledger that is discarded
//! only when the whole run finishes cleanly.

pub mod api;
pub mod ledger;
pub mod retry;

use std::collections::HashMap;
use std::path::PathBuf;
use std::time::Duration;

use ga_query_body::RequestBody;
use ga_query_models::wire::ReportData;
use ga_query_models::{DateWindow, ResultSet, SamplingPolicy};
use ga_query_names::VariableNameResolver;

pub use api::{HttpReportingApi, REPORTING_URL, ReportingApi};
pub use ledger::{DEFAULT_LEDGER_PATH, RecoveryLedger};

/// Label of the column added when sampled results are kept.
pub const SAMPLING_COLUMN: &str = "Sampling";

/// Delay between units of work, to stay clear of the rate limit.
const UNIT_PAUSE: Duration = Duration::from_millis(500);

/// Errors from report execution.
#[derive(Debug, thiserror::Error)]
pub enum FetchError {
    /// HTTP transport failure.
    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),

    /// The backend returned a non-retryable error status.
    #[error("HTTP {status}: {message}")]
    Status {
        /// HTTP status code.
        status: u16,
        /// Response body, when one was readable.
        message: String,
    },

    /// A request or response body could not be (de)serialized.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Recovery ledger access failed.
    #[error("recovery ledger error: {0}")]
    Ledger(#[from] rusqlite::Error),

    /// I/O error around the recovery ledger.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// The backend sampled the data and the run is set to fail on
    /// sampling.
    #[error(
        "report data is sampled: {percentage}% of the sampling space was read. \
         Narrow the query, or choose the 'save' or 'skip' sampling policy."
    )]
    Sampling {
        /// Share of the sampling space read, in percent, one decimal.
        percentage: f64,
        /// Recovery ledger holding the completed units, when any exist.
        recovery: Option<PathBuf>,
    },

    /// The response did not have the expected shape.
    #[error("malformed response: {message}")]
    MalformedResponse {
        /// What was missing or wrong.
        message: String,
    },
}

/// Run-level settings.
#[derive(Debug, Clone)]
pub struct RunOptions {
    /// Split the window into single-day units. On by default.
    pub per_day: bool,
    /// What to do when the backend samples a unit's data.
    pub sampling: SamplingPolicy,
    /// Replace API codes with display names in the result columns.
    pub clean_headers: bool,
    /// Recovery ledger location; `None` keeps it in memory (no
    /// artifact survives a crash).
    pub ledger_path: Option<PathBuf>,
    /// Delay between units of work.
    pub pause: Duration,
}

impl Default for RunOptions {
    fn default() -> Self {
        Self {
            per_day: true,
            sampling: SamplingPolicy::Fail,
            clean_headers: false,
            ledger_path: Some(PathBuf::from(DEFAULT_LEDGER_PATH)),
            pause: UNIT_PAUSE,
        }
    }
}

impl RunOptions {
    /// Creates the default options.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets whether the window is split into single-day units.
    #[must_use]
    pub const fn with_per_day(mut self, per_day: bool) -> Self {
        self.per_day = per_day;
        self
    }

    /// Sets the sampling policy.
    #[must_use]
    pub const fn with_sampling(mut self, sampling: SamplingPolicy) -> Self {
        self.sampling = sampling;
        self
    }

    /// Sets whether result columns carry display names instead of API
    /// codes.
    #[must_use]
    pub const fn with_clean_headers(mut self, clean_headers: bool) -> Self {
        self.clean_headers = clean_headers;
        self
    }

    /// Sets the recovery ledger location.
    #[must_use]
    pub fn with_ledger_path(mut self, path: Option<PathBuf>) -> Self {
        self.ledger_path = path;
        self
    }

    /// Sets the delay between units of work.
    #[must_use]
    pub const fn with_pause(mut self, pause: Duration) -> Self {
        self.pause = pause;
        self
    }
}

/// Rows and sampling state of one completed unit of work.
#[derive(Debug, Clone)]
struct UnitOutcome {
    rows: Vec<Vec<String>>,
    /// Largest sampled fraction seen across the unit's pages, when any
    /// page was sampled.
    sampled_fraction: Option<f64>,
}

/// Executes request bodies against a reporting backend.
///
/// The runner memoizes completed units on their serialized request, so
/// re-running an identical body (or overlapping windows) within the
/// runner's lifetime does not refetch.
pub struct QueryRunner<'a> {
    api: &'a dyn ReportingApi,
    options: RunOptions,
    memo: HashMap<String, UnitOutcome>,
}

impl<'a> QueryRunner<'a> {
    /// Creates a runner over the given backend.
    #[must_use]
    pub fn new(api: &'a dyn ReportingApi, options: RunOptions) -> Self {
        Self {
            api,
            options,
            memo: HashMap::new(),
        }
    }

    /// Runs one request body to completion and assembles the result.
    ///
    /// # Errors
    ///
    /// Returns [`FetchError::Sampling`] under the fail policy when a
    /// unit comes back sampled, with the recovery ledger location when
    /// completed units were retained. Any transport, decode, or ledger
    /// failure is returned as the corresponding [`FetchError`] variant.
    pub async fn run(
        &mut self,
        body: &RequestBody,
        resolver: &VariableNameResolver,
    ) -> Result<ResultSet, FetchError> {
        let windows = if self.options.per_day {
            day_windows(&body.window)
        } else {
            vec![body.window]
        };

        let mut ledger = match &self.options.ledger_path {
            Some(path) => RecoveryLedger::open(path)?,
            None => RecoveryLedger::open_in_memory()?,
        };

        log::info!(
            "running '{}' over {} unit(s) of work",
            body.name,
            windows.len()
        );

        let mut units = Vec::with_capacity(windows.len());
        for window in &windows {
            let key = format!(
                "{}:{}",
                body.resource_quota,
                serde_json::to_string(&body.wire_for(window, None, false))?
            );
            let unit = if let Some(hit) = self.memo.get(&key) {
                hit.clone()
            } else {
                let unit = self.fetch_unit(body, window, &ledger).await?;
                self.memo.insert(key, unit.clone());
                tokio::time::sleep(self.options.pause).await;
                unit
            };
            ledger.append_rows(&body.name, &unit.rows)?;
            log::debug!(
                "'{}' {}..{}: {} row(s)",
                body.name,
                window.start,
                window.end,
                unit.rows.len()
            );
            units.push(unit);
        }

        let mut columns = template_columns(body);
        let mut rows: Vec<Vec<String>> = Vec::new();
        let annotate = self.options.sampling == SamplingPolicy::Save
            && units.iter().any(|u| u.sampled_fraction.is_some());
        if annotate {
            columns.push(SAMPLING_COLUMN.to_owned());
        }
        for unit in units {
            let marker = unit
                .sampled_fraction
                .map(|fraction| format!("{:.1}", as_percentage(fraction)));
            for mut row in unit.rows {
                if annotate {
                    row.push(marker.clone().unwrap_or_default());
                }
                rows.push(row);
            }
        }

        if self.options.clean_headers {
            columns = columns
                .into_iter()
                .map(|column| {
                    resolver
                        .display_names(&[column.as_str()])
                        .map_or(column, |mut names| names.remove(0))
                })
                .collect();
        }

        ledger.discard()?;
        Ok(ResultSet { columns, rows })
    }

    /// Fetches all pages of one unit of work.
    ///
    /// A fresh wire document is derived from the template for every
    /// page, so no state leaks between pages or units. When the body
    /// opted into the resource quota and a page comes back sampled, the
    /// same page is reissued once with the quota enabled before the
    /// sampling policy applies.
    async fn fetch_unit(
        &self,
        body: &RequestBody,
        window: &DateWindow,
        ledger: &RecoveryLedger,
    ) -> Result<UnitOutcome, FetchError> {
        let mut quota_applied = false;
        let mut page_token: Option<String> = None;
        let mut rows = Vec::new();
        let mut sampled_fraction: Option<f64> = None;

        loop {
            let request = body.wire_for(window, page_token.clone(), quota_applied);
            let response = self.api.batch_get(&request).await?;
            let report = response
                .reports
                .into_iter()
                .next()
                .ok_or_else(|| FetchError::MalformedResponse {
                    message: "response contained no reports".to_owned(),
                })?;

            if let Some(fraction) = sampling_fraction(&report.data) {
                if body.resource_quota && !quota_applied {
                    log::warn!(
                        "'{}' window {}..{} is sampled; retrying once with the \
                         resource quota enabled",
                        body.name,
                        window.start,
                        window.end
                    );
                    quota_applied = true;
                    continue;
                }
                match self.options.sampling {
                    SamplingPolicy::Fail => {
                        return Err(FetchError::Sampling {
                            percentage: as_percentage(fraction),
                            recovery: if ledger.has_rows()? {
                                ledger.path().map(std::path::Path::to_path_buf)
                            } else {
                                None
                            },
                        });
                    }
                    SamplingPolicy::Save => {
                        sampled_fraction =
                            Some(sampled_fraction.map_or(fraction, |s: f64| s.max(fraction)));
                        rows.extend(page_rows(&report.data));
                    }
                    SamplingPolicy::Skip => {
                        log::warn!(
                            "'{}' window {}..{} is sampled ({:.1}%); skipping this page",
                            body.name,
                            window.start,
                            window.end,
                            as_percentage(fraction)
                        );
                    }
                }
            } else {
                rows.extend(page_rows(&report.data));
            }

            page_token = report.next_page_token;
            if page_token.is_none() {
                break;
            }
        }

        Ok(UnitOutcome {
            rows,
            sampled_fraction,
        })
    }
}

/// Single-day windows covering `window`, most recent day first.
fn day_windows(window: &DateWindow) -> Vec<DateWindow> {
    let mut days = Vec::with_capacity(usize::try_from(window.len_days()).unwrap_or_default());
    let mut day = window.end;
    while day >= window.start {
        days.push(DateWindow {
            start: day,
            end: day,
        });
        let Some(previous) = day.pred_opt() else {
            break;
        };
        day = previous;
    }
    days
}

/// Column labels in projection order, as API codes.
fn template_columns(body: &RequestBody) -> Vec<String> {
    body.template()
        .dimensions
        .iter()
        .map(|d| d.name.clone())
        .chain(body.template().metrics.iter().map(|m| m.expression.clone()))
        .collect()
}

/// Share of the sampling space the backend read, when it sampled.
fn sampling_fraction(data: &ReportData) -> Option<f64> {
    let read = sum_counts(data.samples_read_counts.as_deref()?);
    let space = sum_counts(data.sampling_space_sizes.as_deref()?);
    if space == 0 {
        return None;
    }
    #[allow(clippy::cast_precision_loss)]
    Some(read as f64 / space as f64)
}

fn sum_counts(counts: &[String]) -> u64 {
    counts.iter().filter_map(|c| c.parse::<u64>().ok()).sum()
}

fn as_percentage(fraction: f64) -> f64 {
    (fraction * 1000.0).round() / 10.0
}

/// Flattens a page into value rows: dimension values first, then the
/// first date range's metric values.
fn page_rows(data: &ReportData) -> Vec<Vec<String>> {
    data.rows
        .as_deref()
        .unwrap_or_default()
        .iter()
        .map(|row| {
            row.dimensions
                .iter()
                .cloned()
                .chain(
                    row.metrics
                        .first()
                        .map(|m| m.values.clone())
                        .unwrap_or_default(),
                )
                .collect()
        })
        .collect()
}

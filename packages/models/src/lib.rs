#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions, clippy::cargo_common_metadata)]

//! Shared data model for the reporting query engine.
//!
//! Holds the user-facing [`ReportSpecification`], the resolved variable and
//! filter predicate records produced while assembling a request, and the
//! wire-shape documents exchanged with the reporting API (see [`wire`]).

pub mod wire;

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use strum_macros::{AsRefStr, Display, EnumString};

/// The two reportable field kinds, plus their account-specific variants.
///
/// Custom dimensions and metrics behave like their standard counterparts in
/// every request; the distinction only matters for the local name cache,
/// which refuses to be extended twice with account-specific entries.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Display, EnumString, AsRefStr,
)]
pub enum VariableKind {
    /// Categorical attribute (e.g. `ga:deviceCategory`).
    Dimension,
    /// Numeric measure (e.g. `ga:sessions`).
    Metric,
    /// Account-specific dimension registered on a property.
    #[strum(serialize = "Custom Dimension")]
    #[serde(rename = "Custom Dimension")]
    CustomDimension,
    /// Account-specific metric registered on a property.
    #[strum(serialize = "Custom Metric")]
    #[serde(rename = "Custom Metric")]
    CustomMetric,
}

impl VariableKind {
    /// `true` for both standard and custom dimensions.
    #[must_use]
    pub const fn is_dimension(self) -> bool {
        matches!(self, Self::Dimension | Self::CustomDimension)
    }

    /// `true` for both standard and custom metrics.
    #[must_use]
    pub const fn is_metric(self) -> bool {
        matches!(self, Self::Metric | Self::CustomMetric)
    }
}

/// A variable name resolved to its canonical record.
///
/// Immutable once produced; cached entries are matched case-insensitively
/// on either `name` or `api_code`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResolvedVariable {
    /// Human-readable display name (e.g. `"Device Category"`).
    pub name: String,
    /// Whether this is a dimension or a metric.
    pub kind: VariableKind,
    /// API code used on the wire (e.g. `"ga:deviceCategory"`).
    pub api_code: String,
}

/// Server-side filter comparison operators.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Display)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
#[strum(serialize_all = "SCREAMING_SNAKE_CASE")]
pub enum FilterOperator {
    /// Exact string match (dimensions) or exact metric comparison.
    Exact,
    /// Substring match.
    Partial,
    /// Regular expression match.
    Regexp,
    /// Numeric equality.
    Equal,
    /// Numeric less-than.
    LessThan,
    /// Numeric greater-than.
    GreaterThan,
}

/// How multiple predicates within one filter clause combine.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Display, EnumString, AsRefStr,
)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
#[strum(serialize_all = "SCREAMING_SNAKE_CASE")]
pub enum LogicalOperator {
    /// All predicates must match.
    And,
    /// Any predicate may match.
    Or,
}

/// What to do when the backend reports sampled data.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Display, EnumString)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum SamplingPolicy {
    /// Abort the whole run, preserving any partial results already flushed.
    Fail,
    /// Keep sampled pages and annotate the output with the sampled fraction.
    Save,
    /// Drop the sampled page's rows and continue with the rest of the run.
    Skip,
}

/// A single parsed filter predicate.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FilterPredicate {
    /// API code of the filtered field.
    pub api_code: String,
    /// Kind of the filtered field.
    pub kind: VariableKind,
    /// Server-side operator, negation already stripped.
    pub operator: FilterOperator,
    /// Whether the match is negated.
    pub negated: bool,
    /// Right-hand comparison value, verbatim from the expression.
    pub value: String,
}

/// An inclusive calendar-date window, normalized to whole days.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct DateWindow {
    /// First day of the window.
    pub start: NaiveDate,
    /// Last day of the window (inclusive).
    pub end: NaiveDate,
}

impl DateWindow {
    /// Creates a window, swapping the bounds if given out of order.
    #[must_use]
    pub fn new(start: NaiveDate, end: NaiveDate) -> Self {
        if start <= end {
            Self { start, end }
        } else {
            Self {
                start: end,
                end: start,
            }
        }
    }

    /// Number of calendar days covered, inclusive.
    #[must_use]
    pub fn len_days(&self) -> u64 {
        u64::try_from((self.end - self.start).num_days() + 1).unwrap_or(0)
    }
}

/// User-supplied description of a report to run.
///
/// `view_id`, `dimensions`, and `metrics` are mandatory. The date boundary
/// must come from exactly one of (`start`, `end`) or `date_range`; the
/// builder rejects every other combination before any network call.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "snake_case")]
pub struct ReportSpecification {
    /// Reporting view (profile) identifier.
    pub view_id: String,
    /// Dimension display names or API codes, in projection order.
    pub dimensions: Vec<String>,
    /// Metric display names or API codes, in projection order.
    pub metrics: Vec<String>,
    /// Explicit window start; requires `end`.
    pub start: Option<NaiveDate>,
    /// Explicit window end; requires `start`.
    pub end: Option<NaiveDate>,
    /// Derived window, e.g. from a named date-range preset.
    pub date_range: Option<DateWindow>,
    /// Optional query name; autogenerated when absent.
    pub name: Option<String>,
    /// Segment ids to apply.
    pub segments: Vec<String>,
    /// Raw filter expressions (e.g. `"ga:country==Netherlands"`).
    pub filters: Vec<String>,
    /// Combines multiple same-kind filters; defaults to AND with a warning.
    pub logical_operator: Option<LogicalOperator>,
    /// Fields to order by; suffix `&&ASC` selects ascending order.
    pub order_by: Vec<String>,
    /// Rows per page; clamped to the server's documented bound.
    pub page_size: Option<u32>,
    /// Opt in to the account's resource quota to avoid sampling.
    pub resource_quota: bool,
}

/// Consolidated output of a query run.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResultSet {
    /// Column labels, dimensions first, then metrics.
    pub columns: Vec<String>,
    /// Row values as returned by the backend, one cell per column.
    pub rows: Vec<Vec<String>>,
}

impl ResultSet {
    /// `true` when no rows were collected.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }
}

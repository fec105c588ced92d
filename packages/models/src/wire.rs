//! Wire-shape documents for the v4 `reports:batchGet` exchange.
//!
//! Field names follow the backend's camelCase JSON exactly; optional
//! fields are omitted from the serialized body rather than sent as null,
//! so that two requests with the same settings serialize identically
//! (the fetch layer memoizes on the serialized form).

use serde::{Deserialize, Serialize};

use crate::{FilterOperator, LogicalOperator};

/// Top-level request body for a batch-get call.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BatchGetRequest {
    /// The report requests to execute (always exactly one here).
    pub report_requests: Vec<ReportRequest>,
    /// Opt in to the account's resource quota for this call.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub use_resource_quotas: Option<bool>,
}

/// A single report request within a batch.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReportRequest {
    /// Reporting view id.
    pub view_id: String,
    /// The date window(s) this request covers.
    pub date_ranges: Vec<WireDateRange>,
    /// Metric projections.
    pub metrics: Vec<MetricProjection>,
    /// Dimension projections.
    pub dimensions: Vec<DimensionProjection>,
    /// Requested sampling level; `LARGE` is the least approximate.
    pub sampling_level: String,
    /// Segment references, when segmentation is requested.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub segments: Option<Vec<SegmentRef>>,
    /// Dimension filter groups.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub dimension_filter_clauses: Option<Vec<DimensionFilterClause>>,
    /// Metric filter groups.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub metric_filter_clauses: Option<Vec<MetricFilterClause>>,
    /// Result ordering.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub order_bys: Option<Vec<OrderBy>>,
    /// Rows per page.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub page_size: Option<u32>,
    /// Pagination cursor from the previous page.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub page_token: Option<String>,
}

/// A `{startDate, endDate}` pair in ISO date form.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WireDateRange {
    /// Inclusive window start, `%Y-%m-%d`.
    pub start_date: String,
    /// Inclusive window end, `%Y-%m-%d`.
    pub end_date: String,
}

/// A metric projection entry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MetricProjection {
    /// Metric API code (or metric expression).
    pub expression: String,
}

/// A dimension projection entry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DimensionProjection {
    /// Dimension API code.
    pub name: String,
}

/// A segment reference.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SegmentRef {
    /// Segment id (e.g. `"gaid::-1"`).
    pub segment_id: String,
}

/// A group of dimension filters combined by one logical operator.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DimensionFilterClause {
    /// Present only when the group holds more than one filter.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub operator: Option<LogicalOperator>,
    /// The filters in this group, in expression order.
    pub filters: Vec<DimensionFilter>,
}

/// A single dimension filter.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DimensionFilter {
    /// Dimension API code.
    pub dimension_name: String,
    /// Comparison operator.
    pub operator: FilterOperator,
    /// Negates the match when `true`; omitted otherwise.
    #[serde(rename = "not", skip_serializing_if = "Option::is_none")]
    pub negated: Option<bool>,
    /// Values to compare against.
    pub expressions: Vec<String>,
}

/// A group of metric filters combined by one logical operator.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MetricFilterClause {
    /// Present only when the group holds more than one filter.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub operator: Option<LogicalOperator>,
    /// The filters in this group, in expression order.
    pub filters: Vec<MetricFilter>,
}

/// A single metric filter.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MetricFilter {
    /// Metric API code.
    pub metric_name: String,
    /// Comparison operator.
    pub operator: FilterOperator,
    /// Negates the comparison when `true`; omitted otherwise.
    #[serde(rename = "not", skip_serializing_if = "Option::is_none")]
    pub negated: Option<bool>,
    /// Right-hand comparison value.
    pub comparison_value: String,
}

/// A result ordering entry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OrderBy {
    /// Field API code to order by.
    pub field_name: String,
    /// Ordering mode; always `VALUE` here.
    pub order_type: String,
    /// `ASCENDING` or `DESCENDING`.
    pub sort_order: String,
}

/// Top-level response body of a batch-get call.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BatchGetResponse {
    /// One report per report request.
    #[serde(default)]
    pub reports: Vec<Report>,
}

/// A single report in a batch-get response.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Report {
    /// Column labels for the rows that follow.
    #[serde(default)]
    pub column_header: ColumnHeader,
    /// Row data plus sampling metadata.
    #[serde(default)]
    pub data: ReportData,
    /// Cursor for the next page; absent on the last page.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub next_page_token: Option<String>,
}

/// Column header section of a report.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ColumnHeader {
    /// Dimension API codes, in projection order.
    #[serde(default)]
    pub dimensions: Vec<String>,
    /// Metric header entries.
    #[serde(default)]
    pub metric_header: MetricHeader,
}

/// Metric header section of a column header.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MetricHeader {
    /// One entry per projected metric.
    #[serde(default)]
    pub metric_header_entries: Vec<MetricHeaderEntry>,
}

/// A single metric column label.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MetricHeaderEntry {
    /// Metric API code.
    pub name: String,
}

/// Data section of a report.
///
/// `rows` absent means the window legitimately has no data, an empty but
/// valid page rather than an error. The sampling arrays are present only
/// when the backend sampled; counts are decimal strings, one entry per
/// date range.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReportData {
    /// Result rows for this page.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub rows: Option<Vec<ReportRow>>,
    /// Total matching rows across all pages.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub row_count: Option<u64>,
    /// Rows actually read when sampling was applied.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub samples_read_counts: Option<Vec<String>>,
    /// Total population sizes the samples were drawn from.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sampling_space_sizes: Option<Vec<String>>,
}

/// A single result row.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReportRow {
    /// Dimension values, in projection order.
    #[serde(default)]
    pub dimensions: Vec<String>,
    /// Metric value groups, one per requested date range.
    #[serde(default)]
    pub metrics: Vec<DateRangeValues>,
}

/// Metric values for one date range of a row.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DateRangeValues {
    /// One value per projected metric, as decimal strings.
    #[serde(default)]
    pub values: Vec<String>,
}

#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions, clippy::cargo_common_metadata)]

//! Request body assembly.
//!
//! Turns a validated [`ReportSpecification`] into an immutable
//! [`RequestBody`] template. The template never changes after
//! construction; the fetch layer derives one wire document per unit of
//! work from it, overriding only the date window and pagination cursor.

pub mod filters;

use std::path::Path;
use std::sync::atomic::{AtomicU64, Ordering};

use ga_query_dates::ISO_DATE;
use ga_query_models::wire::{
    BatchGetRequest, DimensionProjection, MetricProjection, OrderBy, ReportRequest, SegmentRef,
    WireDateRange,
};
use ga_query_models::{DateWindow, ReportSpecification};
use ga_query_names::{NameError, SEGMENT_API_CODE, VariableNameResolver};

pub use filters::{FilterClauses, parse_filters};

/// Largest page size the backend accepts.
pub const MAX_PAGE_SIZE: u32 = 100_000;

/// Least-approximate sampling level, requested by default.
pub const DEFAULT_SAMPLING_LEVEL: &str = "LARGE";

/// Suffix marking an order-by field as ascending.
const ASCENDING_MARKER: &str = "&&ASC";

/// Errors from request body assembly.
#[derive(Debug, thiserror::Error)]
pub enum BodyError {
    /// The specification is incomplete or contradictory.
    #[error(
        "Missing mandatory fields in report specification: {fields}. \
         Required are view_id, dimensions, metrics, and either both of \
         start/end or a date_range."
    )]
    MissingMandatoryField {
        /// Comma-separated missing field names.
        fields: String,
    },

    /// A dimension, metric, filter subject, or order-by field could not
    /// be resolved.
    #[error(transparent)]
    Name(#[from] NameError),

    /// A specification file is not a JSON file.
    #[error("'{path}' is not a JSON file")]
    UnsupportedSpecFile {
        /// The offending path.
        path: String,
    },

    /// Specification file could not be read.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Specification file could not be parsed.
    #[error("JSON parse error: {0}")]
    Json(#[from] serde_json::Error),
}

/// Immutable request template plus the run-level settings the fetch
/// layer needs.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RequestBody {
    /// Query name, explicit or autogenerated; identifies the run.
    pub name: String,
    /// Overall date window the query covers.
    pub window: DateWindow,
    /// Whether the run may spend the account's resource quota to avoid
    /// sampling.
    pub resource_quota: bool,
    template: ReportRequest,
}

impl RequestBody {
    /// The underlying request template, without a window or cursor.
    #[must_use]
    pub const fn template(&self) -> &ReportRequest {
        &self.template
    }

    /// Derives the wire document for one unit of work.
    ///
    /// The template is cloned, never mutated, so no pagination or window
    /// state can leak between units.
    #[must_use]
    pub fn wire_for(
        &self,
        window: &DateWindow,
        page_token: Option<String>,
        use_resource_quotas: bool,
    ) -> BatchGetRequest {
        let mut request = self.template.clone();
        request.date_ranges = vec![WireDateRange {
            start_date: window.start.format(ISO_DATE).to_string(),
            end_date: window.end.format(ISO_DATE).to_string(),
        }];
        request.page_token = page_token;
        BatchGetRequest {
            report_requests: vec![request],
            use_resource_quotas: use_resource_quotas.then_some(true),
        }
    }
}

/// Builds [`RequestBody`] values and owns the sequence counter behind
/// autogenerated query names.
#[derive(Debug, Default)]
pub struct BodyFactory {
    seq: AtomicU64,
}

impl BodyFactory {
    /// Creates a factory whose name sequence starts at zero.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Assembles a request body from a specification.
    ///
    /// Optional specification fields are applied in a fixed order: name,
    /// segments, filters, order-by, page size, resource quota.
    ///
    /// # Errors
    ///
    /// Returns [`BodyError::MissingMandatoryField`] for an incomplete
    /// specification and [`BodyError::Name`] for unresolvable variable
    /// names. Both are raised before any network call.
    pub fn build(
        &self,
        spec: &ReportSpecification,
        resolver: &VariableNameResolver,
    ) -> Result<RequestBody, BodyError> {
        let window = validate(spec)?;

        let mut request = ReportRequest {
            view_id: spec.view_id.clone(),
            date_ranges: Vec::new(),
            metrics: resolver
                .api_codes(&spec.metrics)?
                .into_iter()
                .map(|expression| MetricProjection { expression })
                .collect(),
            dimensions: resolver
                .api_codes(&spec.dimensions)?
                .into_iter()
                .map(|name| DimensionProjection { name })
                .collect(),
            sampling_level: DEFAULT_SAMPLING_LEVEL.to_owned(),
            segments: None,
            dimension_filter_clauses: None,
            metric_filter_clauses: None,
            order_bys: None,
            page_size: None,
            page_token: None,
        };

        if !spec.segments.is_empty() {
            request.dimensions.push(DimensionProjection {
                name: SEGMENT_API_CODE.to_owned(),
            });
            request.segments = Some(
                spec.segments
                    .iter()
                    .map(|id| SegmentRef {
                        segment_id: id.clone(),
                    })
                    .collect(),
            );
        }

        if !spec.filters.is_empty() {
            let clauses = filters::parse_filters(resolver, &spec.filters, spec.logical_operator)?;
            request.dimension_filter_clauses = clauses.dimension.map(|clause| vec![clause]);
            request.metric_filter_clauses = clauses.metric.map(|clause| vec![clause]);
        }

        if !spec.order_by.is_empty() {
            request.order_bys = Some(order_bys(&spec.order_by, resolver)?);
        }

        request.page_size = spec.page_size.and_then(clamp_page_size);

        let name = spec.name.clone().unwrap_or_else(|| {
            format!("Query {}", self.seq.fetch_add(1, Ordering::Relaxed))
        });

        Ok(RequestBody {
            name,
            window,
            resource_quota: spec.resource_quota,
            template: request,
        })
    }

    /// Loads a specification from a JSON file and assembles it.
    ///
    /// # Errors
    ///
    /// Returns [`BodyError`] if the file cannot be read or parsed, or if
    /// assembly fails.
    pub fn build_from_json(
        &self,
        path: &Path,
        resolver: &VariableNameResolver,
    ) -> Result<RequestBody, BodyError> {
        self.build(&load_specification(path)?, resolver)
    }
}

fn order_bys(
    fields: &[String],
    resolver: &VariableNameResolver,
) -> Result<Vec<OrderBy>, BodyError> {
    let mut order_bys = Vec::with_capacity(fields.len());
    for field in fields {
        let (field, sort_order) = field.strip_suffix(ASCENDING_MARKER).map_or(
            (field.as_str(), "DESCENDING"),
            |stripped| (stripped, "ASCENDING"),
        );
        let mut codes = resolver.api_codes(&[field.trim()])?;
        order_bys.push(OrderBy {
            field_name: codes.remove(0),
            order_type: "VALUE".to_owned(),
            sort_order: sort_order.to_owned(),
        });
    }
    Ok(order_bys)
}

/// Reads a [`ReportSpecification`] from a JSON file.
///
/// # Errors
///
/// Returns [`BodyError::UnsupportedSpecFile`] for non-JSON paths and
/// [`BodyError::Io`]/[`BodyError::Json`] for read or parse failures.
pub fn load_specification(path: &Path) -> Result<ReportSpecification, BodyError> {
    if path.extension().and_then(|e| e.to_str()) != Some("json") {
        return Err(BodyError::UnsupportedSpecFile {
            path: path.display().to_string(),
        });
    }
    let contents = std::fs::read_to_string(path)?;
    Ok(serde_json::from_str(&contents)?)
}

/// Checks mandatory fields and resolves the date boundary.
///
/// Explicit start/end take precedence over a derived range; one of
/// start/end without the other is always an error.
fn validate(spec: &ReportSpecification) -> Result<DateWindow, BodyError> {
    let mut missing = Vec::new();
    if spec.view_id.trim().is_empty() {
        missing.push("view_id");
    }
    if spec.dimensions.is_empty() {
        missing.push("dimensions");
    }
    if spec.metrics.is_empty() {
        missing.push("metrics");
    }

    let window = match (spec.start, spec.end, spec.date_range) {
        (Some(start), Some(end), _) => Some(DateWindow::new(start, end)),
        (Some(_), None, _) => {
            missing.push("end");
            None
        }
        (None, Some(_), _) => {
            missing.push("start");
            None
        }
        (None, None, Some(window)) => Some(window),
        (None, None, None) => {
            missing.push("start/end or date_range");
            None
        }
    };

    if missing.is_empty() {
        // The match above guarantees a window when nothing is missing.
        window.ok_or_else(|| BodyError::MissingMandatoryField {
            fields: "start/end or date_range".to_owned(),
        })
    } else {
        Err(BodyError::MissingMandatoryField {
            fields: missing.join(", "),
        })
    }
}

fn clamp_page_size(size: u32) -> Option<u32> {
    if size == 0 {
        log::warn!("Page size is zero; using the server default page size");
        None
    } else if size > MAX_PAGE_SIZE {
        log::warn!("Page size too large, must be <= {MAX_PAGE_SIZE}. Clamping to {MAX_PAGE_SIZE}");
        Some(MAX_PAGE_SIZE)
    } else {
        Some(size)
    }
}

#[cfg(test)]
mod tests {
    use chrono::NaiveDate;
    use ga_query_models::{ResolvedVariable, VariableKind};

    use super::*;

    fn resolver() -> VariableNameResolver {
        VariableNameResolver::in_memory(&[
            ResolvedVariable {
                name: "Date".to_owned(),
                kind: VariableKind::Dimension,
                api_code: "ga:date".to_owned(),
            },
            ResolvedVariable {
                name: "Country".to_owned(),
                kind: VariableKind::Dimension,
                api_code: "ga:country".to_owned(),
            },
            ResolvedVariable {
                name: "Sessions".to_owned(),
                kind: VariableKind::Metric,
                api_code: "ga:sessions".to_owned(),
            },
        ])
        .unwrap()
    }

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    fn base_spec() -> ReportSpecification {
        ReportSpecification {
            view_id: "123456".to_owned(),
            dimensions: vec!["ga:date".to_owned()],
            metrics: vec!["Sessions".to_owned()],
            start: Some(date(2024, 1, 1)),
            end: Some(date(2024, 1, 2)),
            ..ReportSpecification::default()
        }
    }

    #[test]
    fn builds_minimal_body_with_defaults() {
        let body = BodyFactory::new().build(&base_spec(), &resolver()).unwrap();
        assert_eq!(body.template().view_id, "123456");
        assert_eq!(body.template().sampling_level, "LARGE");
        assert_eq!(body.template().metrics[0].expression, "ga:sessions");
        assert_eq!(body.template().dimensions[0].name, "ga:date");
        assert!(body.template().page_size.is_none());
        assert!(!body.resource_quota);
    }

    #[test]
    fn missing_dates_entirely_is_an_error() {
        let spec = ReportSpecification {
            start: None,
            end: None,
            ..base_spec()
        };
        let err = BodyFactory::new().build(&spec, &resolver()).unwrap_err();
        assert!(matches!(err, BodyError::MissingMandatoryField { .. }));
    }

    #[test]
    fn one_sided_bounds_are_errors_even_with_a_date_range() {
        let factory = BodyFactory::new();
        for (start, end) in [(Some(date(2024, 1, 1)), None), (None, Some(date(2024, 1, 2)))] {
            let spec = ReportSpecification {
                start,
                end,
                date_range: Some(DateWindow {
                    start: date(2024, 1, 1),
                    end: date(2024, 1, 2),
                }),
                ..base_spec()
            };
            assert!(matches!(
                factory.build(&spec, &resolver()),
                Err(BodyError::MissingMandatoryField { .. })
            ));
        }
    }

    #[test]
    fn explicit_bounds_and_equivalent_date_range_build_identically() {
        let factory = BodyFactory::new();
        let explicit = factory.build(&base_spec(), &resolver()).unwrap();

        let spec = ReportSpecification {
            start: None,
            end: None,
            date_range: Some(DateWindow {
                start: date(2024, 1, 1),
                end: date(2024, 1, 2),
            }),
            name: Some(explicit.name.clone()),
            ..base_spec()
        };
        let derived = factory.build(&spec, &resolver()).unwrap();
        assert_eq!(explicit, derived);
    }

    #[test]
    fn missing_projections_are_reported_together() {
        let spec = ReportSpecification {
            view_id: String::new(),
            dimensions: vec![],
            metrics: vec![],
            ..base_spec()
        };
        let err = BodyFactory::new().build(&spec, &resolver()).unwrap_err();
        let message = err.to_string();
        assert!(message.contains("view_id"));
        assert!(message.contains("dimensions"));
        assert!(message.contains("metrics"));
    }

    #[test]
    fn autogenerated_names_increment_per_factory() {
        let factory = BodyFactory::new();
        let first = factory.build(&base_spec(), &resolver()).unwrap();
        let second = factory.build(&base_spec(), &resolver()).unwrap();
        assert_eq!(first.name, "Query 0");
        assert_eq!(second.name, "Query 1");

        // A fresh factory starts over.
        let fresh = BodyFactory::new().build(&base_spec(), &resolver()).unwrap();
        assert_eq!(fresh.name, "Query 0");
    }

    #[test]
    fn explicit_name_is_honored() {
        let spec = ReportSpecification {
            name: Some("daily traffic".to_owned()),
            ..base_spec()
        };
        let body = BodyFactory::new().build(&spec, &resolver()).unwrap();
        assert_eq!(body.name, "daily traffic");
    }

    #[test]
    fn segments_inject_the_segment_dimension() {
        let spec = ReportSpecification {
            segments: vec!["gaid::-1".to_owned()],
            ..base_spec()
        };
        let body = BodyFactory::new().build(&spec, &resolver()).unwrap();
        let template = body.template();
        assert_eq!(template.dimensions.last().unwrap().name, "ga:segment");
        assert_eq!(
            template.segments.as_ref().unwrap()[0].segment_id,
            "gaid::-1"
        );
    }

    #[test]
    fn filters_attach_as_clause_groups() {
        let spec = ReportSpecification {
            filters: vec!["Country==Netherlands".to_owned(), "Sessions>10".to_owned()],
            ..base_spec()
        };
        let body = BodyFactory::new().build(&spec, &resolver()).unwrap();
        let template = body.template();
        assert!(template.dimension_filter_clauses.is_some());
        assert!(template.metric_filter_clauses.is_some());
    }

    #[test]
    fn order_by_defaults_descending_and_strips_the_ascending_marker() {
        let spec = ReportSpecification {
            order_by: vec!["Sessions".to_owned(), "Date&&ASC".to_owned()],
            ..base_spec()
        };
        let body = BodyFactory::new().build(&spec, &resolver()).unwrap();
        let order_bys = body.template().order_bys.as_ref().unwrap();
        assert_eq!(order_bys[0].field_name, "ga:sessions");
        assert_eq!(order_bys[0].sort_order, "DESCENDING");
        assert_eq!(order_bys[1].field_name, "ga:date");
        assert_eq!(order_bys[1].sort_order, "ASCENDING");
        assert_eq!(order_bys[1].order_type, "VALUE");
    }

    #[test]
    fn page_size_is_clamped_or_defaulted_without_failing() {
        let factory = BodyFactory::new();

        let spec = ReportSpecification {
            page_size: Some(500_000),
            ..base_spec()
        };
        let body = factory.build(&spec, &resolver()).unwrap();
        assert_eq!(body.template().page_size, Some(MAX_PAGE_SIZE));

        let spec = ReportSpecification {
            page_size: Some(0),
            ..base_spec()
        };
        let body = factory.build(&spec, &resolver()).unwrap();
        assert_eq!(body.template().page_size, None);

        let spec = ReportSpecification {
            page_size: Some(5000),
            ..base_spec()
        };
        let body = factory.build(&spec, &resolver()).unwrap();
        assert_eq!(body.template().page_size, Some(5000));
    }

    #[test]
    fn wire_for_overrides_window_and_cursor_without_touching_the_template() {
        let body = BodyFactory::new().build(&base_spec(), &resolver()).unwrap();
        let window = DateWindow {
            start: date(2024, 1, 1),
            end: date(2024, 1, 1),
        };

        let first = body.wire_for(&window, None, false);
        let request = &first.report_requests[0];
        assert_eq!(request.date_ranges[0].start_date, "2024-01-01");
        assert_eq!(request.date_ranges[0].end_date, "2024-01-01");
        assert!(request.page_token.is_none());
        assert!(first.use_resource_quotas.is_none());

        let second = body.wire_for(&window, Some("token-2".to_owned()), true);
        assert_eq!(
            second.report_requests[0].page_token.as_deref(),
            Some("token-2")
        );
        assert_eq!(second.use_resource_quotas, Some(true));

        // Template still has no window or cursor.
        assert!(body.template().date_ranges.is_empty());
        assert!(body.template().page_token.is_none());
    }

    #[test]
    fn loads_specification_from_json_only() {
        assert!(matches!(
            load_specification(Path::new("report.toml")),
            Err(BodyError::UnsupportedSpecFile { .. })
        ));
    }
}

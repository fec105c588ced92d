//! Filter expression parsing.
//!
//! Each raw expression contains exactly one operator token
//! (e.g. `"ga:country==Netherlands"` or `"Sessions>100"`). Tokens are
//! tried against an explicit ordered table, two-character tokens before
//! one-character ones, so overlapping token text never mis-splits an
//! expression. Malformed
//! expressions are dropped with a warning and never abort the parse.

use ga_query_models::wire::{
    DimensionFilter, DimensionFilterClause, MetricFilter, MetricFilterClause,
};
use ga_query_models::{FilterOperator, FilterPredicate, LogicalOperator, VariableKind};
use ga_query_names::{NameError, VariableNameResolver};

/// One operator token and its server-side meaning per field kind.
///
/// A `None` mapping means the token is not valid for that kind (e.g.
/// substring match on a metric).
struct OperatorToken {
    token: &'static str,
    dimension: Option<(FilterOperator, bool)>,
    metric: Option<(FilterOperator, bool)>,
}

/// Token table in match priority order.
const OPERATOR_TABLE: &[OperatorToken] = &[
    OperatorToken {
        token: "!=",
        dimension: Some((FilterOperator::Exact, true)),
        metric: Some((FilterOperator::Exact, true)),
    },
    OperatorToken {
        token: "==",
        dimension: Some((FilterOperator::Exact, false)),
        metric: Some((FilterOperator::Equal, false)),
    },
    OperatorToken {
        token: "!@",
        dimension: Some((FilterOperator::Partial, true)),
        metric: None,
    },
    OperatorToken {
        token: "=@",
        dimension: Some((FilterOperator::Partial, false)),
        metric: None,
    },
    OperatorToken {
        token: "!~",
        dimension: Some((FilterOperator::Regexp, true)),
        metric: None,
    },
    OperatorToken {
        token: "=~",
        dimension: Some((FilterOperator::Regexp, false)),
        metric: None,
    },
    OperatorToken {
        token: "<",
        dimension: None,
        metric: Some((FilterOperator::LessThan, false)),
    },
    OperatorToken {
        token: ">",
        dimension: None,
        metric: Some((FilterOperator::GreaterThan, false)),
    },
];

/// Parsed filter expressions, partitioned by field kind.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FilterClauses {
    /// Dimension filter group, when any dimension predicates parsed.
    pub dimension: Option<DimensionFilterClause>,
    /// Metric filter group, when any metric predicates parsed.
    pub metric: Option<MetricFilterClause>,
}

/// Parses raw filter expressions into kind-partitioned clause groups.
///
/// When more than one predicate lands in a partition the group needs a
/// logical operator; if the caller omitted one, `AND` is assumed with a
/// warning. Expressions matching no operator token are dropped with a
/// warning.
///
/// # Errors
///
/// Returns [`NameError`] if an expression's subject is a display name
/// that cannot be resolved.
pub fn parse_filters(
    resolver: &VariableNameResolver,
    expressions: &[String],
    logical_operator: Option<LogicalOperator>,
) -> Result<FilterClauses, NameError> {
    let mut dimension_predicates = Vec::new();
    let mut metric_predicates = Vec::new();

    for expression in expressions {
        match parse_expression(resolver, expression)? {
            Some(predicate) if predicate.kind.is_dimension() => {
                dimension_predicates.push(predicate);
            }
            Some(predicate) => metric_predicates.push(predicate),
            None => {}
        }
    }

    let needs_operator = dimension_predicates.len() > 1 || metric_predicates.len() > 1;
    let operator = if needs_operator {
        Some(logical_operator.unwrap_or_else(|| {
            log::warn!(
                "Multiple filters given, but no logical operator is supplied. \
                 Assuming 'AND' to combine filters."
            );
            LogicalOperator::And
        }))
    } else {
        None
    };

    Ok(FilterClauses {
        dimension: dimension_clause(&dimension_predicates, operator),
        metric: metric_clause(&metric_predicates, operator),
    })
}

/// Splits one expression on the first matching operator token and
/// classifies its subject. Returns `None` (after warning) for
/// expressions that cannot be processed.
fn parse_expression(
    resolver: &VariableNameResolver,
    expression: &str,
) -> Result<Option<FilterPredicate>, NameError> {
    for entry in OPERATOR_TABLE {
        let Some((subject, value)) = expression.split_once(entry.token) else {
            continue;
        };
        let subject = subject.trim();
        if subject.is_empty() {
            break;
        }

        let (kind, api_code) = classify_subject(resolver, subject)?;
        let mapping = if kind.is_dimension() {
            entry.dimension
        } else {
            entry.metric
        };
        let Some((operator, negated)) = mapping else {
            log::warn!(
                "Filter expression {expression} could not be processed. \
                 Operator '{}' is not valid for a {kind}.",
                entry.token
            );
            return Ok(None);
        };

        return Ok(Some(FilterPredicate {
            api_code,
            kind,
            operator,
            negated,
            value: value.trim().to_owned(),
        }));
    }

    log::warn!("Filter expression {expression} could not be processed. No matching operator found.");
    Ok(None)
}

/// Determines a subject's kind and canonical API code.
///
/// Raw generic codes are classified by their prefix alone; anything else
/// goes through the resolver.
fn classify_subject(
    resolver: &VariableNameResolver,
    subject: &str,
) -> Result<(VariableKind, String), NameError> {
    if subject.starts_with("ga:dimension") {
        return Ok((VariableKind::Dimension, subject.to_owned()));
    }
    if subject.starts_with("ga:metric") {
        return Ok((VariableKind::Metric, subject.to_owned()));
    }
    let record = resolver.resolve(&[subject])?.remove(0);
    Ok((record.kind, record.api_code))
}

fn dimension_clause(
    predicates: &[FilterPredicate],
    operator: Option<LogicalOperator>,
) -> Option<DimensionFilterClause> {
    if predicates.is_empty() {
        return None;
    }
    Some(DimensionFilterClause {
        operator: (predicates.len() > 1).then_some(operator).flatten(),
        filters: predicates
            .iter()
            .map(|p| DimensionFilter {
                dimension_name: p.api_code.clone(),
                operator: p.operator,
                negated: p.negated.then_some(true),
                expressions: vec![p.value.clone()],
            })
            .collect(),
    })
}

fn metric_clause(
    predicates: &[FilterPredicate],
    operator: Option<LogicalOperator>,
) -> Option<MetricFilterClause> {
    if predicates.is_empty() {
        return None;
    }
    Some(MetricFilterClause {
        operator: (predicates.len() > 1).then_some(operator).flatten(),
        filters: predicates
            .iter()
            .map(|p| MetricFilter {
                metric_name: p.api_code.clone(),
                operator: p.operator,
                negated: p.negated.then_some(true),
                comparison_value: p.value.clone(),
            })
            .collect(),
    })
}

#[cfg(test)]
mod tests {
    use ga_query_models::ResolvedVariable;

    use super::*;

    fn resolver() -> VariableNameResolver {
        VariableNameResolver::in_memory(&[
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

    fn exprs(list: &[&str]) -> Vec<String> {
        list.iter().map(|s| (*s).to_owned()).collect()
    }

    #[test]
    fn generic_dimension_code_parses_by_convention() {
        let clauses = parse_filters(&resolver(), &exprs(&["ga:dimensionX==foo"]), None).unwrap();
        let clause = clauses.dimension.unwrap();
        assert!(clauses.metric.is_none());
        assert_eq!(clause.operator, None);
        assert_eq!(clause.filters.len(), 1);
        let filter = &clause.filters[0];
        assert_eq!(filter.dimension_name, "ga:dimensionX");
        assert_eq!(filter.operator, FilterOperator::Exact);
        assert_eq!(filter.negated, None);
        assert_eq!(filter.expressions, vec!["foo"]);
    }

    #[test]
    fn negated_metric_expression_strips_the_marker() {
        let clauses = parse_filters(&resolver(), &exprs(&["ga:metric0!=5"]), None).unwrap();
        let clause = clauses.metric.unwrap();
        let filter = &clause.filters[0];
        assert_eq!(filter.metric_name, "ga:metric0");
        assert_eq!(filter.operator, FilterOperator::Exact);
        assert_eq!(filter.negated, Some(true));
        assert_eq!(filter.comparison_value, "5");
    }

    #[test]
    fn display_name_subject_resolves_to_kind_and_code() {
        let clauses = parse_filters(&resolver(), &exprs(&["Sessions>100"]), None).unwrap();
        let clause = clauses.metric.unwrap();
        assert_eq!(clause.filters[0].metric_name, "ga:sessions");
        assert_eq!(clause.filters[0].operator, FilterOperator::GreaterThan);
    }

    #[test]
    fn multiple_same_kind_filters_default_to_and() {
        let clauses = parse_filters(
            &resolver(),
            &exprs(&["ga:country==Netherlands", "ga:country!=Belgium"]),
            None,
        )
        .unwrap();
        let clause = clauses.dimension.unwrap();
        assert_eq!(clause.operator, Some(LogicalOperator::And));
        assert_eq!(clause.filters.len(), 2);
    }

    #[test]
    fn explicit_logical_operator_is_honored() {
        let clauses = parse_filters(
            &resolver(),
            &exprs(&["ga:country==Netherlands", "Country=@land"]),
            Some(LogicalOperator::Or),
        )
        .unwrap();
        assert_eq!(clauses.dimension.unwrap().operator, Some(LogicalOperator::Or));
    }

    #[test]
    fn mixed_kinds_partition_into_both_clauses() {
        let clauses = parse_filters(
            &resolver(),
            &exprs(&["Country=~^N", "Sessions<10"]),
            None,
        )
        .unwrap();
        let dimension = clauses.dimension.unwrap();
        let metric = clauses.metric.unwrap();
        // One predicate per partition, so neither group carries an operator.
        assert_eq!(dimension.operator, None);
        assert_eq!(metric.operator, None);
        assert_eq!(dimension.filters[0].operator, FilterOperator::Regexp);
        assert_eq!(metric.filters[0].operator, FilterOperator::LessThan);
    }

    #[test]
    fn expression_without_operator_is_dropped() {
        let clauses = parse_filters(
            &resolver(),
            &exprs(&["ga:country has Netherlands", "ga:country==Netherlands"]),
            None,
        )
        .unwrap();
        let clause = clauses.dimension.unwrap();
        assert_eq!(clause.filters.len(), 1);
        assert_eq!(clause.operator, None);
    }

    #[test]
    fn operator_invalid_for_kind_is_dropped() {
        let clauses = parse_filters(&resolver(), &exprs(&["Sessions=@5"]), None).unwrap();
        assert!(clauses.metric.is_none());
        assert!(clauses.dimension.is_none());
    }

    #[test]
    fn unknown_subject_is_fatal() {
        assert!(parse_filters(&resolver(), &exprs(&["Bogus==1"]), None).is_err());
    }

    #[test]
    fn no_expressions_yield_empty_clauses() {
        let clauses = parse_filters(&resolver(), &[], None).unwrap();
        assert_eq!(clauses, FilterClauses::default());
    }
}

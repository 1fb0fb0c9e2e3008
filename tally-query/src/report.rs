//! Report Aggregation Engine.
//!
//! A [`Report`] is planned against its object's fields ([`plan_report`]),
//! which validates groupings and aggregations and resolves the filters. The
//! plan yields the unpaged [`QuerySpec`] that fetches candidate records and
//! aggregates whatever records come back. [`describe`] renders the
//! human-readable formula and touches no data.

use std::cmp::Ordering;
use std::collections::HashMap;

use once_cell::sync::Lazy;
use serde::Serialize;
use serde_json::Value;
use tally_core::{
    AggregateFunction, AggregationSpec, FieldDataType, ObjectSchema, Record, Report, TallyError,
    TallyResult, Timestamp, ValidationError, COUNT_ALL_FIELD,
};

use crate::builder::{build_predicates, QuerySpec};
use crate::value::{as_number, sort_order, Typed};

static OBJECT_LABELS: Lazy<HashMap<&'static str, &'static str>> = Lazy::new(|| {
    HashMap::from([
        ("leads", "Leads"),
        ("clients", "Clients"),
        ("invoices", "Invoices"),
        ("meetings", "Meetings"),
        ("payments", "Payments"),
        ("services", "Services"),
        ("team_members", "Team Members"),
    ])
});

/// Human label for an object type; unknown types render as-is.
pub fn object_type_label(object_type: &str) -> &str {
    OBJECT_LABELS.get(object_type).copied().unwrap_or(object_type)
}

/// One grouping value of an aggregate row.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct GroupValue {
    pub field: String,
    pub value: Value,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
#[serde(untagged)]
pub enum AggregateValue {
    Count(u64),
    /// `None` when no record contributed a value (avg/min/max).
    Number(Option<f64>),
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AggregateCell {
    pub label: String,
    pub function: AggregateFunction,
    pub value: AggregateValue,
}

/// Grouping values plus one computed cell per aggregation, in report order.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AggregateRow {
    pub group: Vec<GroupValue>,
    pub values: Vec<AggregateCell>,
}

impl AggregateRow {
    pub fn value(&self, label: &str) -> Option<AggregateValue> {
        self.values.iter().find(|c| c.label == label).map(|c| c.value)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ReportOutput {
    pub rows: Vec<AggregateRow>,
    /// Visible column labels.
    pub columns: Vec<String>,
    pub description: String,
}

#[derive(Debug, Clone)]
struct PlannedGrouping {
    field: String,
    data_type: FieldDataType,
}

/// A report validated against its object's fields, filters resolved.
#[derive(Debug, Clone)]
pub struct ReportPlan {
    query: QuerySpec,
    groupings: Vec<PlannedGrouping>,
    aggregations: Vec<AggregationSpec>,
}

/// Validate `report` against `schema` and resolve its filters at `now`.
pub fn plan_report(report: &Report, schema: &ObjectSchema, now: Timestamp) -> TallyResult<ReportPlan> {
    let predicates = build_predicates(schema, &report.filters, now)?;

    let groupings = report
        .groupings
        .iter()
        .map(|name| {
            schema.field(name).map(|field| PlannedGrouping {
                field: field.api_name.clone(),
                data_type: field.data_type,
            })
        })
        .collect::<TallyResult<Vec<_>>>()?;

    for aggregation in &report.aggregations {
        if aggregation.function == AggregateFunction::Count && aggregation.field == COUNT_ALL_FIELD {
            continue;
        }
        let field = schema.field(&aggregation.field)?;
        if aggregation.function.requires_numeric() && !field.data_type.is_numeric() {
            return Err(ValidationError::invalid_field(
                &field.api_name,
                format!(
                    "{} requires a numeric field, found {}",
                    aggregation.function, field.data_type
                ),
            )
            .into());
        }
    }

    Ok(ReportPlan {
        query: QuerySpec::unpaged(schema.api_name(), predicates),
        groupings,
        aggregations: report.aggregations.clone(),
    })
}

impl ReportPlan {
    /// Unpaged query for the report's candidate records.
    pub fn query_spec(&self) -> &QuerySpec {
        &self.query
    }

    /// Aggregate `records` and attach the columns and description of `report`.
    pub fn output<'a, I>(&self, report: &Report, records: I) -> TallyResult<ReportOutput>
    where
        I: IntoIterator<Item = &'a Record>,
    {
        Ok(ReportOutput {
            rows: self.aggregate(records)?,
            columns: report.visible_columns().map(|c| c.label.clone()).collect(),
            description: describe(report),
        })
    }

    /// Group and aggregate. Records are re-checked against the filters, so a
    /// collaborator that over-fetches still yields the right result.
    pub fn aggregate<'a, I>(&self, records: I) -> TallyResult<Vec<AggregateRow>>
    where
        I: IntoIterator<Item = &'a Record>,
    {
        let mut groups: Vec<(Vec<Value>, Vec<&Record>)> = Vec::new();
        let mut index: HashMap<Vec<String>, usize> = HashMap::new();

        if self.groupings.is_empty() {
            groups.push((Vec::new(), Vec::new()));
        }

        for record in records.into_iter().filter(|r| self.query.matches(r)) {
            if self.groupings.is_empty() {
                groups[0].1.push(record);
                continue;
            }
            let values: Vec<Value> = self
                .groupings
                .iter()
                .map(|g| record.get(&g.field).cloned().unwrap_or(Value::Null))
                .collect();
            let key: Vec<String> = self
                .groupings
                .iter()
                .zip(&values)
                .map(|(g, v)| group_key(g.data_type, v))
                .collect();
            match index.get(&key) {
                Some(&i) => groups[i].1.push(record),
                None => {
                    index.insert(key, groups.len());
                    groups.push((values, vec![record]));
                }
            }
        }

        groups.sort_by(|(a, _), (b, _)| {
            self.groupings
                .iter()
                .zip(a.iter().zip(b))
                .map(|(g, (x, y))| sort_order(g.data_type, x, y))
                .find(|o| *o != Ordering::Equal)
                .unwrap_or(Ordering::Equal)
        });

        groups
            .into_iter()
            .map(|(values, members)| {
                let cells = self
                    .aggregations
                    .iter()
                    .map(|spec| {
                        Ok(AggregateCell {
                            label: spec.label.clone(),
                            function: spec.function,
                            value: compute(spec, &members)?,
                        })
                    })
                    .collect::<TallyResult<Vec<_>>>()?;
                Ok(AggregateRow {
                    group: self
                        .groupings
                        .iter()
                        .zip(values)
                        .map(|(g, value)| GroupValue {
                            field: g.field.clone(),
                            value,
                        })
                        .collect(),
                    values: cells,
                })
            })
            .collect()
    }
}

/// Grouping identity under the field's data type, so `5` and `5.0` share a group.
fn group_key(data_type: FieldDataType, value: &Value) -> String {
    match Typed::read(data_type, value) {
        // -0.0 and 0.0 compare equal and must share a group.
        Some(Typed::Number(n)) => format!("n:{}", if n == 0.0 { 0.0 } else { n }),
        Some(Typed::Instant(t)) => format!("t:{}", t.timestamp_micros()),
        Some(Typed::Bool(b)) => format!("b:{b}"),
        Some(Typed::Text(s)) => format!("s:{s}"),
        None => format!("raw:{value}"),
    }
}

fn compute(spec: &AggregationSpec, members: &[&Record]) -> TallyResult<AggregateValue> {
    let value = match spec.function {
        AggregateFunction::Count => return Ok(AggregateValue::Count(members.len() as u64)),
        AggregateFunction::Sum => Some(numeric_values(spec, members)?.iter().sum()),
        AggregateFunction::Avg => {
            let numbers = numeric_values(spec, members)?;
            (!numbers.is_empty()).then(|| numbers.iter().sum::<f64>() / numbers.len() as f64)
        }
        AggregateFunction::Min => numeric_values(spec, members)?.into_iter().reduce(f64::min),
        AggregateFunction::Max => numeric_values(spec, members)?.into_iter().reduce(f64::max),
    };
    Ok(AggregateValue::Number(value))
}

/// Non-null values of the aggregated field. Nulls and missing keys are skipped.
fn numeric_values(spec: &AggregationSpec, members: &[&Record]) -> TallyResult<Vec<f64>> {
    let mut numbers = Vec::with_capacity(members.len());
    for record in members {
        match record.get(&spec.field) {
            None | Some(Value::Null) => {}
            Some(value) => {
                let n = as_number(value).ok_or_else(|| {
                    TallyError::internal(format!(
                        "non-numeric value {value} in numeric field {}",
                        spec.field
                    ))
                })?;
                numbers.push(n);
            }
        }
    }
    Ok(numbers)
}

/// Plan, filter, group and describe in one pass over `records`.
pub fn evaluate<'a, I>(
    report: &Report,
    schema: &ObjectSchema,
    records: I,
    now: Timestamp,
) -> TallyResult<ReportOutput>
where
    I: IntoIterator<Item = &'a Record>,
{
    plan_report(report, schema, now)?.output(report, records)
}

/// Text for a filter value in a description.
pub fn describe_value(value: Option<&Value>) -> String {
    match value {
        None | Some(Value::Null) => "(empty)".to_string(),
        Some(Value::String(s)) => s.clone(),
        Some(Value::Array(items)) => {
            let items: Vec<String> = items.iter().map(|v| describe_value(Some(v))).collect();
            format!("[{}]", items.join(", "))
        }
        Some(other) => other.to_string(),
    }
}

/// Deterministic formula description of a report.
pub fn describe(report: &Report) -> String {
    let mut sections = vec![format!(
        "Data Source: {}",
        object_type_label(&report.object_type)
    )];

    if !report.filters.is_empty() {
        let mut lines = vec!["Filters:".to_string()];
        for filter in &report.filters {
            lines.push(format!(
                "  - {} {} {}",
                filter.field,
                filter.operator().display_text(),
                describe_value(filter.op.raw_value().as_ref())
            ));
        }
        sections.push(lines.join("\n"));
    }

    if !report.groupings.is_empty() {
        sections.push(format!("Grouped By: {}", report.groupings.join(", ")));
    }

    if !report.aggregations.is_empty() {
        let mut lines = vec!["Calculations:".to_string()];
        for aggregation in &report.aggregations {
            lines.push(format!(
                "  - {}: {}({})",
                aggregation.label,
                aggregation.function.as_str().to_uppercase(),
                aggregation.field
            ));
        }
        sections.push(lines.join("\n"));
    }

    let columns: Vec<&str> = report.visible_columns().map(|c| c.label.as_str()).collect();
    if !columns.is_empty() {
        sections.push(format!("Columns: {}", columns.join(", ")));
    }

    sections.join("\n\n")
}

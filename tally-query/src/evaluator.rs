//! In-memory execution of a [`QuerySpec`].
//!
//! Semantics follow what a relational backend does with the same query:
//! conditions are AND-ed, a null or missing value satisfies only `is_null`,
//! ascending sorts put nulls last and descending sorts put them first.

use std::cmp::Ordering;

use serde_json::Value;
use tally_core::{Record, SortDirection};

use crate::builder::{
    CompareOp, Condition, MatchPosition, OrderBy, Predicate, QuerySpec, SearchGroup,
};
use crate::value::{as_text, sort_order, values_equal, Typed};

static NULL: Value = Value::Null;

fn field_value<'a>(record: &'a Record, field: &str) -> &'a Value {
    record.get(field).unwrap_or(&NULL)
}

fn text_matches(haystack: &str, needle: &str, position: MatchPosition) -> bool {
    let haystack = haystack.to_lowercase();
    let needle = needle.to_lowercase();
    match position {
        MatchPosition::Anywhere => haystack.contains(&needle),
        MatchPosition::Prefix => haystack.starts_with(&needle),
        MatchPosition::Suffix => haystack.ends_with(&needle),
    }
}

impl Predicate {
    /// Whether `record` satisfies this condition.
    pub fn matches(&self, record: &Record) -> bool {
        let value = field_value(record, &self.field);
        match &self.condition {
            Condition::IsNull => value.is_null(),
            Condition::IsNotNull => !value.is_null(),
            _ if value.is_null() => false,
            Condition::Equals(expected) => values_equal(self.data_type, value, expected),
            Condition::NotEquals(expected) => {
                Typed::read(self.data_type, value).is_some()
                    && !values_equal(self.data_type, value, expected)
            }
            Condition::Like {
                needle,
                position,
                negated,
            } => match as_text(value) {
                Some(text) => text_matches(&text, needle, *position) != *negated,
                None => false,
            },
            Condition::Compare { op, value: bound } => {
                match self.ordering(value, bound) {
                    Some(ordering) => match op {
                        CompareOp::Gt => ordering == Ordering::Greater,
                        CompareOp::Lt => ordering == Ordering::Less,
                        CompareOp::Gte => ordering != Ordering::Less,
                        CompareOp::Lte => ordering != Ordering::Greater,
                    },
                    None => false,
                }
            }
            Condition::In(options) => options
                .iter()
                .any(|option| values_equal(self.data_type, value, option)),
            Condition::NotIn(options) => {
                Typed::read(self.data_type, value).is_some()
                    && !options
                        .iter()
                        .any(|option| values_equal(self.data_type, value, option))
            }
            Condition::Between { low, high } => {
                matches!(
                    self.ordering(value, low),
                    Some(Ordering::Greater | Ordering::Equal)
                ) && matches!(
                    self.ordering(value, high),
                    Some(Ordering::Less | Ordering::Equal)
                )
            }
            Condition::Window(window) => match Typed::read(self.data_type, value) {
                Some(Typed::Instant(instant)) => window.contains(instant),
                _ => false,
            },
        }
    }

    fn ordering(&self, value: &Value, bound: &Value) -> Option<Ordering> {
        let left = Typed::read(self.data_type, value)?;
        let right = Typed::read(self.data_type, bound)?;
        left.compare(&right)
    }
}

impl SearchGroup {
    /// Case-insensitive containment in any search field.
    pub fn matches(&self, record: &Record) -> bool {
        self.fields.iter().any(|field| {
            as_text(field_value(record, field))
                .is_some_and(|text| text_matches(&text, &self.term, MatchPosition::Anywhere))
        })
    }
}

impl QuerySpec {
    /// AND of every predicate and the search group.
    pub fn matches(&self, record: &Record) -> bool {
        self.predicates.iter().all(|p| p.matches(record))
            && self.search.as_ref().map_or(true, |s| s.matches(record))
    }

    /// Run the query over `records`: returns the page slice (projected to the
    /// requested columns) and the total number of matching records.
    pub fn execute<'a, I>(&self, records: I) -> (Vec<Record>, u64)
    where
        I: IntoIterator<Item = &'a Record>,
    {
        let mut matching: Vec<&Record> = records.into_iter().filter(|r| self.matches(r)).collect();
        let total = matching.len() as u64;

        if let Some(order) = &self.order {
            sort_records(&mut matching, order);
        }

        let page: Vec<&Record> = match self.page {
            Some(window) => matching
                .into_iter()
                .skip(usize::try_from(window.offset).unwrap_or(usize::MAX))
                .take(usize::try_from(window.page_size).unwrap_or(usize::MAX))
                .collect(),
            None => matching,
        };

        let rows = match self.columns() {
            Some(columns) => page
                .into_iter()
                .map(|record| project(record, &columns))
                .collect(),
            None => page.into_iter().cloned().collect(),
        };
        (rows, total)
    }
}

/// Stable sort by one field. Ascending puts nulls last, descending puts them first.
pub fn sort_records(records: &mut [&Record], order: &OrderBy) {
    records.sort_by(|a, b| {
        let ordering = sort_order(
            order.data_type,
            field_value(a, &order.field),
            field_value(b, &order.field),
        );
        match order.direction {
            SortDirection::Asc => ordering,
            SortDirection::Desc => ordering.reverse(),
        }
    });
}

fn project(record: &Record, columns: &[String]) -> Record {
    columns
        .iter()
        .filter_map(|c| record.get(c).map(|v| (c.clone(), v.clone())))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::builder::{build_predicate, QueryBuilder};
    use chrono::{TimeZone, Utc};
    use serde_json::json;
    use tally_core::{
        FieldDataType, FieldDefinition, FilterCondition, FilterOp, ListRequest, ObjectDefinition,
        ObjectSchema, SortConfig, Timestamp,
    };

    fn schema() -> ObjectSchema {
        ObjectSchema::new(
            ObjectDefinition {
                api_name: "leads".to_string(),
                label: "Lead".to_string(),
                plural_label: "Leads".to_string(),
            },
            vec![
                FieldDefinition::new("id", "ID", FieldDataType::Text).hidden(),
                FieldDefinition::new("name", "Name", FieldDataType::Text),
                FieldDefinition::new("email", "Email", FieldDataType::Email),
                FieldDefinition::new("status", "Status", FieldDataType::Select),
                FieldDefinition::new("value", "Value", FieldDataType::Number),
                FieldDefinition::new("created_at", "Created", FieldDataType::Datetime),
            ],
        )
    }

    fn now() -> Timestamp {
        Utc.with_ymd_and_hms(2026, 10, 18, 12, 0, 0).unwrap()
    }

    fn record(v: Value) -> Record {
        match v {
            Value::Object(map) => map,
            _ => panic!("record fixture must be an object"),
        }
    }

    fn leads() -> Vec<Record> {
        vec![
            record(json!({"id": "1", "name": "Acme Corp", "email": "ops@acme.io", "status": "open", "value": 1200, "created_at": "2026-10-17T10:00:00Z"})),
            record(json!({"id": "2", "name": "Globex", "email": null, "status": "won", "value": 800, "created_at": "2026-10-01T08:00:00Z"})),
            record(json!({"id": "3", "name": "Initech", "email": "bill@initech.com", "status": "open", "value": null, "created_at": "2026-09-12T08:00:00Z"})),
            record(json!({"id": "4", "name": "acme labs", "status": "lost", "value": "450", "created_at": "2026-10-18T11:59:00Z"})),
        ]
    }

    fn ids(rows: &[Record]) -> Vec<&str> {
        rows.iter().map(|r| r["id"].as_str().unwrap()).collect()
    }

    fn matching_ids(op: FilterOp, field: &str) -> Vec<String> {
        let p = build_predicate(&schema(), &FilterCondition::new(field, op), now()).unwrap();
        leads()
            .iter()
            .filter(|r| p.matches(r))
            .map(|r| r["id"].as_str().unwrap().to_string())
            .collect()
    }

    #[test]
    fn test_text_operators_case_insensitive() {
        assert_eq!(matching_ids(FilterOp::Contains("ACME".into()), "name"), ["1", "4"]);
        assert_eq!(matching_ids(FilterOp::StartsWith("glo".into()), "name"), ["2"]);
        assert_eq!(matching_ids(FilterOp::EndsWith(".COM".into()), "email"), ["3"]);
        // Null emails do not satisfy the negation.
        assert_eq!(matching_ids(FilterOp::NotContains("acme".into()), "email"), ["3"]);
    }

    #[test]
    fn test_equality_and_membership() {
        assert_eq!(matching_ids(FilterOp::Equals(json!("open")), "status"), ["1", "3"]);
        assert_eq!(matching_ids(FilterOp::NotEquals(json!("open")), "status"), ["2", "4"]);
        assert_eq!(
            matching_ids(FilterOp::In(vec![json!("won"), json!("lost")]), "status"),
            ["2", "4"]
        );
        assert_eq!(matching_ids(FilterOp::NotIn(vec![json!(800)]), "value"), ["1", "4"]);
    }

    #[test]
    fn test_numeric_comparison_and_between() {
        assert_eq!(matching_ids(FilterOp::GreaterThan(json!(800)), "value"), ["1"]);
        assert_eq!(matching_ids(FilterOp::GreaterOrEqual(json!(800)), "value"), ["1", "2"]);
        assert_eq!(matching_ids(FilterOp::LessThan(json!("1000")), "value"), ["2", "4"]);
        assert_eq!(
            matching_ids(FilterOp::Between(json!(450), json!(800)), "value"),
            ["2", "4"]
        );
    }

    #[test]
    fn test_null_operators() {
        assert_eq!(matching_ids(FilterOp::IsNull, "email"), ["2", "4"]);
        assert_eq!(matching_ids(FilterOp::IsNotNull, "value"), ["1", "2", "4"]);
    }

    #[test]
    fn test_relative_windows() {
        assert_eq!(matching_ids(FilterOp::ThisWeek, "created_at"), ["1", "4"]);
        assert_eq!(matching_ids(FilterOp::ThisMonth, "created_at"), ["1", "2", "4"]);
        assert_eq!(
            matching_ids(FilterOp::ThisQuarter, "created_at"),
            ["1", "2", "4"]
        );
        assert_eq!(matching_ids(FilterOp::LastNDays(7), "created_at"), ["1", "4"]);
        assert_eq!(
            matching_ids(FilterOp::LastNDays(60), "created_at"),
            ["1", "2", "3", "4"]
        );
    }

    #[test]
    fn test_execute_pages_sorts_and_counts() {
        let request = ListRequest::new()
            .with_sort(SortConfig::asc("value"))
            .with_page(1, 2);
        let spec = QueryBuilder::default().build(&schema(), &request, now()).unwrap();
        let records = leads();
        let (rows, total) = spec.execute(&records);
        assert_eq!(total, 4);
        assert_eq!(ids(&rows), ["4", "2"]);

        let request = request.with_page(2, 2);
        let spec = QueryBuilder::default().build(&schema(), &request, now()).unwrap();
        let (rows, total) = spec.execute(&records);
        assert_eq!(total, 4);
        // Ascending: nulls last.
        assert_eq!(ids(&rows), ["1", "3"]);
    }

    #[test]
    fn test_descending_puts_nulls_first() {
        let request = ListRequest::new().with_sort(SortConfig::desc("value"));
        let spec = QueryBuilder::default().build(&schema(), &request, now()).unwrap();
        let records = leads();
        let (rows, _) = spec.execute(&records);
        assert_eq!(ids(&rows), ["3", "1", "2", "4"]);
    }

    #[test]
    fn test_page_past_end_keeps_total() {
        let request = ListRequest::new().with_page(9, 10);
        let spec = QueryBuilder::default().build(&schema(), &request, now()).unwrap();
        let records = leads();
        let (rows, total) = spec.execute(&records);
        assert!(rows.is_empty());
        assert_eq!(total, 4);
    }

    #[test]
    fn test_search_is_anded_with_filters() {
        let request = ListRequest::new()
            .with_search("acme")
            .with_filter(FilterCondition::new("status", FilterOp::Equals(json!("open"))));
        let spec = QueryBuilder::default().build(&schema(), &request, now()).unwrap();
        let records = leads();
        let (rows, total) = spec.execute(&records);
        assert_eq!(total, 1);
        assert_eq!(ids(&rows), ["1"]);
    }

    #[test]
    fn test_projection_keeps_id_and_selected() {
        let request = ListRequest::new().with_select(vec!["name".to_string()]);
        let spec = QueryBuilder::default().build(&schema(), &request, now()).unwrap();
        let records = leads();
        let (rows, _) = spec.execute(&records);
        let keys: Vec<&String> = rows[0].keys().collect();
        assert_eq!(keys.len(), 2);
        assert!(rows[0].contains_key("id"));
        assert!(rows[0].contains_key("name"));
    }
}

#[cfg(test)]
mod prop_tests {
    use super::*;
    use crate::builder::build_predicates;
    use chrono::{TimeZone, Utc};
    use proptest::prelude::*;
    use serde_json::json;
    use tally_core::{
        FieldDataType, FieldDefinition, FilterCondition, FilterOp, ObjectDefinition, ObjectSchema,
    };

    fn schema() -> ObjectSchema {
        ObjectSchema::new(
            ObjectDefinition {
                api_name: "deals".to_string(),
                label: "Deal".to_string(),
                plural_label: "Deals".to_string(),
            },
            vec![
                FieldDefinition::new("stage", "Stage", FieldDataType::Select),
                FieldDefinition::new("amount", "Amount", FieldDataType::Number),
            ],
        )
    }

    fn arb_record() -> impl Strategy<Value = Record> {
        (
            prop::option::of(prop::sample::select(vec!["new", "won", "lost"])),
            prop::option::of(0i64..1000),
        )
            .prop_map(|(stage, amount)| {
                let mut record = Record::new();
                record.insert("stage".to_string(), json!(stage));
                record.insert("amount".to_string(), json!(amount));
                record
            })
    }

    fn arb_condition() -> impl Strategy<Value = FilterCondition> {
        prop_oneof![
            prop::sample::select(vec!["new", "won", "lost"])
                .prop_map(|s| FilterCondition::new("stage", FilterOp::Equals(json!(s)))),
            (0i64..1000).prop_map(|n| FilterCondition::new("amount", FilterOp::GreaterThan(json!(n)))),
            (0i64..1000).prop_map(|n| FilterCondition::new("amount", FilterOp::LessOrEqual(json!(n)))),
            Just(FilterCondition::new("amount", FilterOp::IsNull)),
            Just(FilterCondition::new("stage", FilterOp::IsNotNull)),
        ]
    }

    proptest! {
        #![proptest_config(ProptestConfig::with_cases(200))]

        /// The filtered set is exactly the records satisfying every condition.
        #[test]
        fn prop_filter_is_and_of_conditions(
            records in prop::collection::vec(arb_record(), 0..30),
            conditions in prop::collection::vec(arb_condition(), 0..4),
        ) {
            let now = Utc.with_ymd_and_hms(2026, 1, 1, 0, 0, 0).unwrap();
            let predicates = build_predicates(&schema(), &conditions, now).unwrap();
            let spec = QuerySpec::unpaged("deals", predicates.clone());
            let (rows, total) = spec.execute(&records);

            let expected: Vec<Record> = records
                .iter()
                .filter(|r| predicates.iter().all(|p| p.matches(r)))
                .cloned()
                .collect();
            prop_assert_eq!(total as usize, expected.len());
            prop_assert_eq!(rows, expected);
        }

        /// Total is independent of pagination.
        #[test]
        fn prop_total_independent_of_page(
            records in prop::collection::vec(arb_record(), 0..40),
            page in 1u64..6,
            page_size in 1u64..10,
        ) {
            let mut spec = QuerySpec::unpaged(
                "deals",
                vec![build_predicates(
                    &schema(),
                    &[FilterCondition::new("stage", FilterOp::IsNotNull)],
                    Utc::now(),
                ).unwrap().remove(0)],
            );
            let (_, unpaged_total) = spec.execute(&records);
            spec.page = Some(crate::builder::PageWindow {
                page,
                page_size,
                offset: (page - 1) * page_size,
            });
            let (rows, total) = spec.execute(&records);
            prop_assert_eq!(total, unpaged_total);
            prop_assert!(rows.len() as u64 <= page_size);
        }
    }
}

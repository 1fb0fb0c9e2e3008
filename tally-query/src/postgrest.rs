//! Rendering a [`QuerySpec`] as PostgREST query parameters.
//!
//! Pairs are returned unencoded; the HTTP client is expected to percent-encode
//! them. Relative date windows are already concrete instants by the time a
//! `QuerySpec` exists, so the rendered query is deterministic.

use serde::Serialize;
use serde_json::Value;
use tally_core::SortDirection;

use crate::builder::{CompareOp, Condition, MatchPosition, Predicate, QuerySpec, SearchGroup};
use crate::dates::DateWindow;

/// A PostgREST request for one table.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PostgrestQuery {
    pub table: String,
    pub params: Vec<(String, String)>,
    /// Send `Prefer: count=exact` so the total arrives in `Content-Range`.
    pub prefer_count_exact: bool,
}

impl PostgrestQuery {
    /// `key=value&key=value`, unencoded.
    pub fn query_string(&self) -> String {
        self.params
            .iter()
            .map(|(k, v)| format!("{k}={v}"))
            .collect::<Vec<_>>()
            .join("&")
    }
}

impl QuerySpec {
    pub fn to_postgrest(&self) -> PostgrestQuery {
        let mut params = Vec::new();

        let select = match self.columns() {
            Some(columns) => columns.join(","),
            None => "*".to_string(),
        };
        params.push(("select".to_string(), select));

        for predicate in &self.predicates {
            render_predicate(predicate, &mut params);
        }
        if let Some(search) = &self.search {
            params.push(("or".to_string(), render_search(search)));
        }
        if let Some(order) = &self.order {
            let nulls = match order.direction {
                SortDirection::Asc => "nullslast",
                SortDirection::Desc => "nullsfirst",
            };
            params.push((
                "order".to_string(),
                format!("{}.{}.{nulls}", order.field, order.direction.as_str()),
            ));
        }
        if let Some(page) = self.page {
            params.push(("offset".to_string(), page.offset.to_string()));
            params.push(("limit".to_string(), page.page_size.to_string()));
        }

        PostgrestQuery {
            table: self.object_type.clone(),
            params,
            prefer_count_exact: true,
        }
    }
}

fn render_predicate(predicate: &Predicate, params: &mut Vec<(String, String)>) {
    let mut push = |filter: String| params.push((predicate.field.clone(), filter));
    match &predicate.condition {
        Condition::Equals(v) => push(format!("eq.{}", literal(v))),
        Condition::NotEquals(v) => push(format!("neq.{}", literal(v))),
        Condition::Like {
            needle,
            position,
            negated,
        } => {
            let not = if *negated { "not." } else { "" };
            push(format!("{not}ilike.{}", pattern(needle, *position)));
        }
        Condition::Compare { op, value } => {
            let op = match op {
                CompareOp::Gt => "gt",
                CompareOp::Lt => "lt",
                CompareOp::Gte => "gte",
                CompareOp::Lte => "lte",
            };
            push(format!("{op}.{}", literal(value)));
        }
        Condition::IsNull => push("is.null".to_string()),
        Condition::IsNotNull => push("not.is.null".to_string()),
        Condition::In(values) => push(format!("in.({})", list(values))),
        Condition::NotIn(values) => push(format!("not.in.({})", list(values))),
        Condition::Between { low, high } => {
            push(format!("gte.{}", literal(low)));
            push(format!("lte.{}", literal(high)));
        }
        Condition::Window(window) => {
            let (start, end) = window_bounds(window);
            push(start);
            push(end);
        }
    }
}

fn window_bounds(window: &DateWindow) -> (String, String) {
    let end_op = if window.end_inclusive { "lte" } else { "lt" };
    (
        format!("gte.{}", window.start.to_rfc3339()),
        format!("{end_op}.{}", window.end.to_rfc3339()),
    )
}

fn render_search(search: &SearchGroup) -> String {
    let pattern = quoted(&pattern(&search.term, MatchPosition::Anywhere));
    let terms: Vec<String> = search
        .fields
        .iter()
        .map(|field| format!("{field}.ilike.{pattern}"))
        .collect();
    format!("({})", terms.join(","))
}

/// `ilike` pattern for a literal substring. `%`, `_` and `\\` are escaped with
/// the default LIKE escape. A literal `*` cannot be expressed (PostgREST turns
/// every `*` into `%`), so it becomes the single-character wildcard `_`.
fn pattern(needle: &str, position: MatchPosition) -> String {
    let mut escaped = String::with_capacity(needle.len());
    for c in needle.chars() {
        match c {
            '\\' | '%' | '_' => {
                escaped.push('\\');
                escaped.push(c);
            }
            '*' => escaped.push('_'),
            _ => escaped.push(c),
        }
    }
    let needle = escaped;
    match position {
        MatchPosition::Anywhere => format!("*{needle}*"),
        MatchPosition::Prefix => format!("{needle}*"),
        MatchPosition::Suffix => format!("*{needle}"),
    }
}

fn literal(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

fn list(values: &[Value]) -> String {
    values
        .iter()
        .map(|v| quoted(&literal(v)))
        .collect::<Vec<_>>()
        .join(",")
}

/// Double-quote a list or logic-tree element when it contains reserved characters.
fn quoted(text: &str) -> String {
    if text.contains([',', '.', ':', '(', ')', '"', '\\']) || text.trim() != text {
        let escaped = text.replace('\\', "\\\\").replace('"', "\\\"");
        format!("\"{escaped}\"")
    } else {
        text.to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::builder::QueryBuilder;
    use chrono::{TimeZone, Utc};
    use serde_json::json;
    use tally_core::{
        FieldDataType, FieldDefinition, FilterCondition, FilterOp, ListRequest, ObjectDefinition,
        ObjectSchema, SortConfig,
    };

    fn schema() -> ObjectSchema {
        ObjectSchema::new(
            ObjectDefinition {
                api_name: "clients".to_string(),
                label: "Client".to_string(),
                plural_label: "Clients".to_string(),
            },
            vec![
                FieldDefinition::new("id", "ID", FieldDataType::Text).hidden(),
                FieldDefinition::new("name", "Name", FieldDataType::Text),
                FieldDefinition::new("tier", "Tier", FieldDataType::Select),
                FieldDefinition::new("revenue", "Revenue", FieldDataType::Currency),
                FieldDefinition::new("created_at", "Created", FieldDataType::Datetime),
            ],
        )
    }

    fn param<'a>(query: &'a PostgrestQuery, key: &str) -> Vec<&'a str> {
        query
            .params
            .iter()
            .filter(|(k, _)| k == key)
            .map(|(_, v)| v.as_str())
            .collect()
    }

    #[test]
    fn test_renders_full_list_query() {
        let request = ListRequest::new()
            .with_filter(FilterCondition::new("tier", FilterOp::In(vec![json!("gold"), json!("a,b")])))
            .with_filter(FilterCondition::new("revenue", FilterOp::Between(json!(10), json!(20))))
            .with_filter(FilterCondition::new("name", FilterOp::NotContains("test".into())))
            .with_search("acme inc.")
            .with_sort(SortConfig::asc("revenue"))
            .with_page(3, 20);
        let now = Utc.with_ymd_and_hms(2026, 10, 18, 12, 0, 0).unwrap();
        let query = QueryBuilder::default()
            .build(&schema(), &request, now)
            .unwrap()
            .to_postgrest();

        assert_eq!(query.table, "clients");
        assert!(query.prefer_count_exact);
        assert_eq!(param(&query, "select"), ["id,name,tier,revenue,created_at"]);
        assert_eq!(param(&query, "tier"), ["in.(gold,\"a,b\")"]);
        assert_eq!(param(&query, "revenue"), ["gte.10", "lte.20"]);
        assert_eq!(param(&query, "name"), ["not.ilike.*test*"]);
        assert_eq!(param(&query, "or"), ["(name.ilike.\"*acme inc.*\")"]);
        assert_eq!(param(&query, "order"), ["revenue.asc.nullslast"]);
        assert_eq!(param(&query, "offset"), ["40"]);
        assert_eq!(param(&query, "limit"), ["20"]);
    }

    #[test]
    fn test_renders_resolved_window() {
        let now = Utc.with_ymd_and_hms(2026, 10, 18, 12, 0, 0).unwrap();
        let request = ListRequest::new()
            .with_filter(FilterCondition::new("created_at", FilterOp::ThisMonth))
            .with_filter(FilterCondition::new("name", FilterOp::IsNull));
        let query = QueryBuilder::default()
            .build(&schema(), &request, now)
            .unwrap()
            .to_postgrest();
        assert_eq!(
            param(&query, "created_at"),
            ["gte.2026-10-01T00:00:00+00:00", "lt.2026-11-01T00:00:00+00:00"]
        );
        assert_eq!(param(&query, "name"), ["is.null"]);
        assert_eq!(param(&query, "order"), ["created_at.desc.nullsfirst"]);
    }

    #[test]
    fn test_unpaged_spec_selects_everything() {
        let query = QuerySpec::unpaged("clients", Vec::new()).to_postgrest();
        assert_eq!(query.query_string(), "select=*");
    }

    #[test]
    fn test_like_wildcards_are_literal() {
        let request = ListRequest::new()
            .with_filter(FilterCondition::new("name", FilterOp::Contains("a_b".into())))
            .with_search("50%");
        let now = Utc.with_ymd_and_hms(2026, 10, 18, 12, 0, 0).unwrap();
        let spec = QueryBuilder::default().build(&schema(), &request, now).unwrap();
        let query = spec.to_postgrest();

        assert_eq!(param(&query, "name"), ["ilike.*a\\_b*"]);
        assert_eq!(param(&query, "or"), ["(name.ilike.\"*50\\\\%*\")"]);

        let lookalike = match json!({"id": "x", "name": "axb 500"}) {
            Value::Object(map) => map,
            _ => unreachable!(),
        };
        assert!(!spec.matches(&lookalike));
    }

    #[test]
    fn test_pattern_escapes() {
        assert_eq!(pattern("100%", MatchPosition::Prefix), "100\\%*");
        assert_eq!(pattern("c:\\tmp", MatchPosition::Suffix), "*c:\\\\tmp");
        assert_eq!(pattern("a*b", MatchPosition::Anywhere), "*a_b*");
    }

    #[test]
    fn test_quoting() {
        assert_eq!(quoted("plain"), "plain");
        assert_eq!(quoted("say \"hi\""), "\"say \\\"hi\\\"\"");
        assert_eq!(quoted(" padded"), "\" padded\"");
    }
}

//! Query composition.
//!
//! [`QueryBuilder::build`] turns an object's fields plus a [`ListRequest`] into
//! a [`QuerySpec`]: every field name checked against the schema, every
//! operator checked against its field's data type, every relative date
//! window resolved against the caller's `now`. A `QuerySpec` is fully
//! validated; storage collaborators and the in-memory evaluator execute it
//! without further checks.

use serde::Serialize;
use serde_json::Value;
use tally_core::{
    EngineConfig, FieldDataType, FieldDefinition, FilterCondition, FilterOp, ListRequest,
    ObjectSchema, Operator, SortConfig, SortDirection, TallyResult, Timestamp, ValidationError,
    ID_FIELD,
};
use tracing::debug;

use crate::dates::{DateWindow, RelativeWindow};
use crate::fields::{resolve_display_fields, resolve_search_fields};
use crate::value::Typed;

/// Where a case-insensitive text match must occur.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum MatchPosition {
    Anywhere,
    Prefix,
    Suffix,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum CompareOp {
    Gt,
    Lt,
    Gte,
    Lte,
}

/// A filter operator after validation and date resolution.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub enum Condition {
    Equals(Value),
    NotEquals(Value),
    Like {
        needle: String,
        position: MatchPosition,
        negated: bool,
    },
    Compare {
        op: CompareOp,
        value: Value,
    },
    IsNull,
    IsNotNull,
    In(Vec<Value>),
    NotIn(Vec<Value>),
    Between {
        low: Value,
        high: Value,
    },
    Window(DateWindow),
}

/// One validated condition bound to a known field.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Predicate {
    pub field: String,
    pub data_type: FieldDataType,
    /// Operator as the caller wrote it (relative windows become [`Condition::Window`]).
    pub operator: Operator,
    pub condition: Condition,
}

/// Free-text search, OR-ed across fields and AND-ed with the predicates.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SearchGroup {
    pub term: String,
    pub fields: Vec<String>,
}

/// Columns requested from storage.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub enum Projection {
    All,
    Fields(Vec<String>),
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct OrderBy {
    pub field: String,
    pub data_type: FieldDataType,
    pub direction: SortDirection,
}

/// Resolved page slice. `page` is already clamped to at least 1.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct PageWindow {
    pub page: u64,
    pub page_size: u64,
    pub offset: u64,
}

/// Executable query description for one object type.
///
/// Storage returns the rows of the page slice together with the exact count of
/// rows matching `predicates` and `search`, independent of `page`.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct QuerySpec {
    pub object_type: String,
    pub projection: Projection,
    pub predicates: Vec<Predicate>,
    pub search: Option<SearchGroup>,
    pub order: Option<OrderBy>,
    /// `None` means every matching row.
    pub page: Option<PageWindow>,
}

impl QuerySpec {
    /// Unpaged, unsorted query over all columns, as used by report evaluation.
    pub fn unpaged(object_type: impl Into<String>, predicates: Vec<Predicate>) -> Self {
        Self {
            object_type: object_type.into(),
            projection: Projection::All,
            predicates,
            search: None,
            order: None,
            page: None,
        }
    }

    /// Columns storage should return. Record identity is always included.
    pub fn columns(&self) -> Option<Vec<String>> {
        match &self.projection {
            Projection::All => None,
            Projection::Fields(fields) => {
                let mut columns = Vec::with_capacity(fields.len() + 1);
                columns.push(ID_FIELD.to_string());
                columns.extend(fields.iter().filter(|f| *f != ID_FIELD).cloned());
                Some(columns)
            }
        }
    }
}

/// Validate one condition against the schema and resolve it.
pub fn build_predicate(
    schema: &ObjectSchema,
    condition: &FilterCondition,
    now: Timestamp,
) -> TallyResult<Predicate> {
    let field = schema.field(&condition.field)?;
    let operator = condition.operator();
    check_applicable(field, operator)?;

    let condition_value = match &condition.op {
        FilterOp::Equals(v) => Condition::Equals(checked(field, operator, v)?),
        FilterOp::NotEquals(v) => Condition::NotEquals(checked(field, operator, v)?),
        FilterOp::Contains(s) => like(s, MatchPosition::Anywhere, false),
        FilterOp::NotContains(s) => like(s, MatchPosition::Anywhere, true),
        FilterOp::StartsWith(s) => like(s, MatchPosition::Prefix, false),
        FilterOp::EndsWith(s) => like(s, MatchPosition::Suffix, false),
        FilterOp::GreaterThan(v) => compare(CompareOp::Gt, checked(field, operator, v)?),
        FilterOp::LessThan(v) => compare(CompareOp::Lt, checked(field, operator, v)?),
        FilterOp::GreaterOrEqual(v) => compare(CompareOp::Gte, checked(field, operator, v)?),
        FilterOp::LessOrEqual(v) => compare(CompareOp::Lte, checked(field, operator, v)?),
        FilterOp::IsNull => Condition::IsNull,
        FilterOp::IsNotNull => Condition::IsNotNull,
        FilterOp::In(values) => Condition::In(checked_all(field, operator, values)?),
        FilterOp::NotIn(values) => Condition::NotIn(checked_all(field, operator, values)?),
        FilterOp::Between(low, high) => Condition::Between {
            low: checked(field, operator, low)?,
            high: checked(field, operator, high)?,
        },
        FilterOp::ThisWeek | FilterOp::ThisMonth | FilterOp::ThisQuarter | FilterOp::LastNDays(_) => {
            let window = RelativeWindow::from_op(&condition.op).ok_or_else(|| {
                ValidationError::invalid_operator(&field.api_name, operator.as_str(), "not a date window")
            })?;
            Condition::Window(window.resolve(&field.api_name, now)?)
        }
    };

    Ok(Predicate {
        field: field.api_name.clone(),
        data_type: field.data_type,
        operator,
        condition: condition_value,
    })
}

/// Validate and resolve a whole AND-list of conditions.
pub fn build_predicates(
    schema: &ObjectSchema,
    filters: &[FilterCondition],
    now: Timestamp,
) -> TallyResult<Vec<Predicate>> {
    filters
        .iter()
        .map(|condition| build_predicate(schema, condition, now))
        .collect()
}

fn check_applicable(field: &FieldDefinition, operator: Operator) -> TallyResult<()> {
    let data_type = field.data_type;
    let reason = match operator {
        Operator::Contains | Operator::NotContains | Operator::StartsWith | Operator::EndsWith
            if !data_type.is_textual() =>
        {
            Some(format!("text matching is not supported on {data_type} fields"))
        }
        Operator::GreaterThan
        | Operator::LessThan
        | Operator::GreaterOrEqual
        | Operator::LessOrEqual
        | Operator::Between
            if data_type == FieldDataType::Boolean =>
        {
            Some("boolean fields have no ordering".to_string())
        }
        Operator::ThisWeek | Operator::ThisMonth | Operator::ThisQuarter | Operator::LastNDays
            if !data_type.is_temporal() =>
        {
            Some(format!("date windows need a date field, not {data_type}"))
        }
        _ => None,
    };
    match reason {
        Some(reason) => {
            Err(ValidationError::invalid_operator(&field.api_name, operator.as_str(), reason).into())
        }
        None => Ok(()),
    }
}

fn checked(field: &FieldDefinition, operator: Operator, value: &Value) -> TallyResult<Value> {
    if Typed::read(field.data_type, value).is_none() {
        return Err(ValidationError::invalid_value(
            &field.api_name,
            operator.as_str(),
            format!("{value} is not a valid {} value", field.data_type),
        )
        .into());
    }
    Ok(value.clone())
}

fn checked_all(
    field: &FieldDefinition,
    operator: Operator,
    values: &[Value],
) -> TallyResult<Vec<Value>> {
    values.iter().map(|v| checked(field, operator, v)).collect()
}

fn like(needle: &str, position: MatchPosition, negated: bool) -> Condition {
    Condition::Like {
        needle: needle.to_string(),
        position,
        negated,
    }
}

fn compare(op: CompareOp, value: Value) -> Condition {
    Condition::Compare { op, value }
}

/// Composes [`QuerySpec`]s using the engine's field and page limits.
#[derive(Debug, Clone)]
pub struct QueryBuilder {
    display_field_limit: usize,
    search_field_limit: usize,
    default_page_size: i64,
    max_page_size: i64,
}

impl Default for QueryBuilder {
    fn default() -> Self {
        Self::new(&EngineConfig::default())
    }
}

impl QueryBuilder {
    pub fn new(config: &EngineConfig) -> Self {
        Self {
            display_field_limit: config.display_field_limit,
            search_field_limit: config.search_field_limit,
            default_page_size: config.default_page_size,
            max_page_size: config.max_page_size,
        }
    }

    /// Compose a list query. Fails with InvalidField / InvalidOperator /
    /// InvalidValue on the first bad input; nothing is silently defaulted.
    pub fn build(
        &self,
        schema: &ObjectSchema,
        request: &ListRequest,
        now: Timestamp,
    ) -> TallyResult<QuerySpec> {
        let predicates = build_predicates(schema, &request.filters, now)?;
        let order = self.order(schema, request.sort.as_ref())?;
        let page = self.page(request)?;
        let select = resolve_display_fields(
            schema,
            request.select.as_deref(),
            self.display_field_limit,
        )?;
        let search = self.search(schema, request)?;

        debug!(
            object_type = %schema.api_name(),
            predicates = predicates.len(),
            search = search.is_some(),
            sort = %order.field,
            page = page.page,
            page_size = page.page_size,
            "Composed list query"
        );

        Ok(QuerySpec {
            object_type: schema.api_name().to_string(),
            projection: Projection::Fields(select),
            predicates,
            search,
            order: Some(order),
            page: Some(page),
        })
    }

    fn order(&self, schema: &ObjectSchema, sort: Option<&SortConfig>) -> TallyResult<OrderBy> {
        let default_sort = SortConfig::default();
        let sort = sort.unwrap_or(&default_sort);
        let field = schema.field(&sort.field)?;
        Ok(OrderBy {
            field: field.api_name.clone(),
            data_type: field.data_type,
            direction: sort.direction,
        })
    }

    fn page(&self, request: &ListRequest) -> TallyResult<PageWindow> {
        let (page, page_size) = match request.pagination {
            Some(p) => (p.page, p.page_size.unwrap_or(self.default_page_size)),
            None => (1, self.default_page_size),
        };
        let invalid = |reason: String| ValidationError::invalid_value("page_size", "pagination", reason);
        if page_size <= 0 {
            return Err(invalid(format!("page size must be positive, got {page_size}")).into());
        }
        if page_size > self.max_page_size {
            return Err(invalid(format!(
                "page size {page_size} exceeds maximum {}",
                self.max_page_size
            ))
            .into());
        }
        let page = page.max(1);
        let offset = (page - 1)
            .checked_mul(page_size)
            .ok_or_else(|| ValidationError::invalid_value("page", "pagination", "page out of range"))?;
        Ok(PageWindow {
            page: page as u64,
            page_size: page_size as u64,
            offset: offset as u64,
        })
    }

    fn search(&self, schema: &ObjectSchema, request: &ListRequest) -> TallyResult<Option<SearchGroup>> {
        let fields = resolve_search_fields(
            schema,
            request.search_fields.as_deref(),
            self.search_field_limit,
        )?;
        let term = request.search.as_deref().map(str::trim).unwrap_or_default();
        if term.is_empty() || fields.is_empty() {
            return Ok(None);
        }
        Ok(Some(SearchGroup {
            term: term.to_string(),
            fields,
        }))
    }
}

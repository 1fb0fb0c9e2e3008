//! Filter vocabulary shared by record listing and reports.
//!
//! [`Operator`] is the closed set of operator tokens. [`FilterOp`] pairs an
//! operator with the payload of its arity class, so a `between` without two
//! bounds or an `in` without a list cannot be constructed. The loose wire
//! shape ([`RawFilterCondition`]) is converted with `TryFrom`, which is where
//! unknown operators and arity mismatches are rejected.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::{TallyError, TallyResult, ValidationError};

/// Operator token.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Operator {
    Equals,
    NotEquals,
    Contains,
    NotContains,
    StartsWith,
    EndsWith,
    GreaterThan,
    LessThan,
    GreaterOrEqual,
    LessOrEqual,
    IsNull,
    IsNotNull,
    In,
    NotIn,
    Between,
    ThisWeek,
    ThisMonth,
    ThisQuarter,
    LastNDays,
}

/// Shape of the value an operator takes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Arity {
    /// Single non-null scalar.
    Scalar,
    /// Single scalar read as text.
    Text,
    /// No value.
    None,
    /// List of scalars.
    List,
    /// Two-element inclusive range.
    Range,
    /// Positive integer day count.
    Days,
}

impl Operator {
    pub const ALL: [Operator; 19] = [
        Operator::Equals,
        Operator::NotEquals,
        Operator::Contains,
        Operator::NotContains,
        Operator::StartsWith,
        Operator::EndsWith,
        Operator::GreaterThan,
        Operator::LessThan,
        Operator::GreaterOrEqual,
        Operator::LessOrEqual,
        Operator::IsNull,
        Operator::IsNotNull,
        Operator::In,
        Operator::NotIn,
        Operator::Between,
        Operator::ThisWeek,
        Operator::ThisMonth,
        Operator::ThisQuarter,
        Operator::LastNDays,
    ];

    /// Wire token, e.g. `greater_or_equal`.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Equals => "equals",
            Self::NotEquals => "not_equals",
            Self::Contains => "contains",
            Self::NotContains => "not_contains",
            Self::StartsWith => "starts_with",
            Self::EndsWith => "ends_with",
            Self::GreaterThan => "greater_than",
            Self::LessThan => "less_than",
            Self::GreaterOrEqual => "greater_or_equal",
            Self::LessOrEqual => "less_or_equal",
            Self::IsNull => "is_null",
            Self::IsNotNull => "is_not_null",
            Self::In => "in",
            Self::NotIn => "not_in",
            Self::Between => "between",
            Self::ThisWeek => "this_week",
            Self::ThisMonth => "this_month",
            Self::ThisQuarter => "this_quarter",
            Self::LastNDays => "last_n_days",
        }
    }

    /// Parse a wire token. Returns `None` for anything outside the closed set.
    pub fn parse(token: &str) -> Option<Self> {
        Self::ALL.iter().copied().find(|op| op.as_str() == token)
    }

    /// Human-readable text used in report descriptions.
    pub fn display_text(&self) -> &'static str {
        match self {
            Self::Equals => "=",
            Self::NotEquals => "!=",
            Self::Contains => "contains",
            Self::NotContains => "does not contain",
            Self::StartsWith => "starts with",
            Self::EndsWith => "ends with",
            Self::GreaterThan => ">",
            Self::LessThan => "<",
            Self::GreaterOrEqual => ">=",
            Self::LessOrEqual => "<=",
            Self::IsNull => "is empty",
            Self::IsNotNull => "is not empty",
            Self::In => "is one of",
            Self::NotIn => "is not one of",
            Self::Between => "is between",
            Self::ThisWeek => "is this week",
            Self::ThisMonth => "is this month",
            Self::ThisQuarter => "is this quarter",
            Self::LastNDays => "in the last",
        }
    }

    pub fn arity(&self) -> Arity {
        match self {
            Self::Equals
            | Self::NotEquals
            | Self::GreaterThan
            | Self::LessThan
            | Self::GreaterOrEqual
            | Self::LessOrEqual => Arity::Scalar,
            Self::Contains | Self::NotContains | Self::StartsWith | Self::EndsWith => Arity::Text,
            Self::IsNull | Self::IsNotNull | Self::ThisWeek | Self::ThisMonth | Self::ThisQuarter => {
                Arity::None
            }
            Self::In | Self::NotIn => Arity::List,
            Self::Between => Arity::Range,
            Self::LastNDays => Arity::Days,
        }
    }
}

impl std::fmt::Display for Operator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// An operator together with its typed payload.
#[derive(Debug, Clone, PartialEq)]
pub enum FilterOp {
    Equals(Value),
    NotEquals(Value),
    Contains(String),
    NotContains(String),
    StartsWith(String),
    EndsWith(String),
    GreaterThan(Value),
    LessThan(Value),
    GreaterOrEqual(Value),
    LessOrEqual(Value),
    IsNull,
    IsNotNull,
    In(Vec<Value>),
    NotIn(Vec<Value>),
    Between(Value, Value),
    ThisWeek,
    ThisMonth,
    ThisQuarter,
    LastNDays(u32),
}

impl FilterOp {
    pub fn operator(&self) -> Operator {
        match self {
            Self::Equals(_) => Operator::Equals,
            Self::NotEquals(_) => Operator::NotEquals,
            Self::Contains(_) => Operator::Contains,
            Self::NotContains(_) => Operator::NotContains,
            Self::StartsWith(_) => Operator::StartsWith,
            Self::EndsWith(_) => Operator::EndsWith,
            Self::GreaterThan(_) => Operator::GreaterThan,
            Self::LessThan(_) => Operator::LessThan,
            Self::GreaterOrEqual(_) => Operator::GreaterOrEqual,
            Self::LessOrEqual(_) => Operator::LessOrEqual,
            Self::IsNull => Operator::IsNull,
            Self::IsNotNull => Operator::IsNotNull,
            Self::In(_) => Operator::In,
            Self::NotIn(_) => Operator::NotIn,
            Self::Between(_, _) => Operator::Between,
            Self::ThisWeek => Operator::ThisWeek,
            Self::ThisMonth => Operator::ThisMonth,
            Self::ThisQuarter => Operator::ThisQuarter,
            Self::LastNDays(_) => Operator::LastNDays,
        }
    }

    /// The payload in its loose JSON shape (`None` for nullary operators).
    pub fn raw_value(&self) -> Option<Value> {
        match self {
            Self::Equals(v)
            | Self::NotEquals(v)
            | Self::GreaterThan(v)
            | Self::LessThan(v)
            | Self::GreaterOrEqual(v)
            | Self::LessOrEqual(v) => Some(v.clone()),
            Self::Contains(s) | Self::NotContains(s) | Self::StartsWith(s) | Self::EndsWith(s) => {
                Some(Value::String(s.clone()))
            }
            Self::In(values) | Self::NotIn(values) => Some(Value::Array(values.clone())),
            Self::Between(low, high) => Some(Value::Array(vec![low.clone(), high.clone()])),
            Self::LastNDays(days) => Some(Value::from(*days)),
            Self::IsNull | Self::IsNotNull | Self::ThisWeek | Self::ThisMonth | Self::ThisQuarter => {
                None
            }
        }
    }

    /// Build the typed operator from a token and a loose value.
    pub fn from_parts(field: &str, operator: Operator, value: Option<Value>) -> TallyResult<Self> {
        let value = match value {
            Some(Value::Null) => None,
            other => other,
        };
        let invalid = |reason: &str| -> TallyError {
            ValidationError::invalid_value(field, operator.as_str(), reason).into()
        };

        let op = match operator.arity() {
            Arity::Scalar => {
                let v = value.ok_or_else(|| invalid("expected a value"))?;
                if !is_scalar(&v) {
                    return Err(invalid("expected a single scalar value"));
                }
                match operator {
                    Operator::Equals => Self::Equals(v),
                    Operator::NotEquals => Self::NotEquals(v),
                    Operator::GreaterThan => Self::GreaterThan(v),
                    Operator::LessThan => Self::LessThan(v),
                    Operator::GreaterOrEqual => Self::GreaterOrEqual(v),
                    _ => Self::LessOrEqual(v),
                }
            }
            Arity::Text => {
                let v = value.ok_or_else(|| invalid("expected a text value"))?;
                let text = scalar_text(&v).ok_or_else(|| invalid("expected a text value"))?;
                match operator {
                    Operator::Contains => Self::Contains(text),
                    Operator::NotContains => Self::NotContains(text),
                    Operator::StartsWith => Self::StartsWith(text),
                    _ => Self::EndsWith(text),
                }
            }
            Arity::None => {
                match value {
                    None => {}
                    Some(Value::String(ref s)) if s.is_empty() => {}
                    Some(_) => return Err(invalid("operator takes no value")),
                }
                match operator {
                    Operator::IsNull => Self::IsNull,
                    Operator::IsNotNull => Self::IsNotNull,
                    Operator::ThisWeek => Self::ThisWeek,
                    Operator::ThisMonth => Self::ThisMonth,
                    _ => Self::ThisQuarter,
                }
            }
            Arity::List => {
                let items = match value {
                    Some(Value::Array(items)) => items,
                    _ => return Err(invalid("expected a list of values")),
                };
                if !items.iter().all(is_scalar) {
                    return Err(invalid("list items must be non-null scalars"));
                }
                if operator == Operator::In {
                    Self::In(items)
                } else {
                    Self::NotIn(items)
                }
            }
            Arity::Range => match value {
                Some(Value::Array(mut bounds)) if bounds.len() == 2 => {
                    if !bounds.iter().all(is_scalar) {
                        return Err(invalid("range bounds must be non-null scalars"));
                    }
                    let high = bounds.pop().unwrap_or(Value::Null);
                    let low = bounds.pop().unwrap_or(Value::Null);
                    Self::Between(low, high)
                }
                _ => return Err(invalid("expected a two-element [low, high] range")),
            },
            Arity::Days => {
                let days = value
                    .as_ref()
                    .and_then(integer_value)
                    .ok_or_else(|| invalid("expected an integer day count"))?;
                if days <= 0 {
                    return Err(invalid("day count must be a positive integer"));
                }
                let days = u32::try_from(days).map_err(|_| invalid("day count is too large"))?;
                Self::LastNDays(days)
            }
        };
        Ok(op)
    }
}

fn is_scalar(value: &Value) -> bool {
    matches!(value, Value::String(_) | Value::Number(_) | Value::Bool(_))
}

fn scalar_text(value: &Value) -> Option<String> {
    match value {
        Value::String(s) => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        Value::Bool(b) => Some(b.to_string()),
        _ => None,
    }
}

fn integer_value(value: &Value) -> Option<i64> {
    match value {
        Value::Number(n) => n.as_i64(),
        Value::String(s) => s.trim().parse().ok(),
        _ => None,
    }
}

/// Loose wire shape of a filter condition, as sent by list pages and stored in reports.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RawFilterCondition {
    pub field: String,
    pub operator: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub value: Option<Value>,
}

/// One predicate narrowing a record set.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "RawFilterCondition", into = "RawFilterCondition")]
pub struct FilterCondition {
    /// Field api_name. Checked against the object's fields when a query is built.
    pub field: String,
    pub op: FilterOp,
}

impl FilterCondition {
    pub fn new(field: impl Into<String>, op: FilterOp) -> Self {
        Self {
            field: field.into(),
            op,
        }
    }

    pub fn operator(&self) -> Operator {
        self.op.operator()
    }
}

impl TryFrom<RawFilterCondition> for FilterCondition {
    type Error = TallyError;

    fn try_from(raw: RawFilterCondition) -> TallyResult<Self> {
        let operator = Operator::parse(&raw.operator).ok_or_else(|| {
            ValidationError::invalid_operator(&raw.field, &raw.operator, "unknown operator")
        })?;
        let op = FilterOp::from_parts(&raw.field, operator, raw.value)?;
        Ok(Self { field: raw.field, op })
    }
}

impl From<FilterCondition> for RawFilterCondition {
    fn from(condition: FilterCondition) -> Self {
        Self {
            operator: condition.op.operator().as_str().to_string(),
            value: condition.op.raw_value(),
            field: condition.field,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ErrorKind;
    use serde_json::json;

    fn raw(field: &str, operator: &str, value: Option<Value>) -> RawFilterCondition {
        RawFilterCondition {
            field: field.to_string(),
            operator: operator.to_string(),
            value,
        }
    }

    #[test]
    fn test_operator_tokens_round_trip() {
        for op in Operator::ALL {
            assert_eq!(Operator::parse(op.as_str()), Some(op));
        }
        assert_eq!(Operator::parse("like"), None);
    }

    #[test]
    fn test_unknown_operator_is_invalid_operator() {
        let err = FilterCondition::try_from(raw("status", "resembles", Some(json!("open"))))
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::InvalidOperator);
        assert!(err.to_string().contains("resembles"));
    }

    #[test]
    fn test_between_with_scalar_is_invalid_value() {
        let err =
            FilterCondition::try_from(raw("amount", "between", Some(json!(10)))).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::InvalidValue);

        let err = FilterCondition::try_from(raw("amount", "between", Some(json!([1, 2, 3]))))
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::InvalidValue);
    }

    #[test]
    fn test_between_builds_range() {
        let cond = FilterCondition::try_from(raw("amount", "between", Some(json!([10, 20]))))
            .unwrap();
        assert_eq!(cond.op, FilterOp::Between(json!(10), json!(20)));
    }

    #[test]
    fn test_in_requires_list() {
        let err = FilterCondition::try_from(raw("status", "in", Some(json!("open")))).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::InvalidValue);

        let cond =
            FilterCondition::try_from(raw("status", "in", Some(json!(["open", "won"])))).unwrap();
        assert_eq!(cond.op, FilterOp::In(vec![json!("open"), json!("won")]));
    }

    #[test]
    fn test_scalar_operators_reject_missing_and_null() {
        for value in [None, Some(Value::Null), Some(json!([1]))] {
            let err = FilterCondition::try_from(raw("status", "equals", value)).unwrap_err();
            assert_eq!(err.kind(), ErrorKind::InvalidValue);
        }
    }

    #[test]
    fn test_text_operators_stringify_scalars() {
        let cond = FilterCondition::try_from(raw("phone", "contains", Some(json!(555)))).unwrap();
        assert_eq!(cond.op, FilterOp::Contains("555".to_string()));
    }

    #[test]
    fn test_nullary_operators_reject_values() {
        let cond = FilterCondition::try_from(raw("email", "is_null", None)).unwrap();
        assert_eq!(cond.op, FilterOp::IsNull);
        let cond = FilterCondition::try_from(raw("created_at", "this_week", Some(json!(""))))
            .unwrap();
        assert_eq!(cond.op, FilterOp::ThisWeek);
        let err =
            FilterCondition::try_from(raw("email", "is_not_null", Some(json!("x")))).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::InvalidValue);
    }

    #[test]
    fn test_last_n_days_requires_positive_integer() {
        let cond =
            FilterCondition::try_from(raw("created_at", "last_n_days", Some(json!(7)))).unwrap();
        assert_eq!(cond.op, FilterOp::LastNDays(7));
        let cond =
            FilterCondition::try_from(raw("created_at", "last_n_days", Some(json!("30")))).unwrap();
        assert_eq!(cond.op, FilterOp::LastNDays(30));

        for value in [json!(0), json!(-3), json!(1.5), json!("soon")] {
            let err = FilterCondition::try_from(raw("created_at", "last_n_days", Some(value)))
                .unwrap_err();
            assert_eq!(err.kind(), ErrorKind::InvalidValue);
        }
    }

    #[test]
    fn test_serde_uses_wire_shape() {
        let cond: FilterCondition =
            serde_json::from_value(json!({"field": "status", "operator": "equals", "value": "open"}))
                .unwrap();
        assert_eq!(cond.op, FilterOp::Equals(json!("open")));

        let back = serde_json::to_value(&cond).unwrap();
        assert_eq!(back, json!({"field": "status", "operator": "equals", "value": "open"}));

        let nullary = serde_json::to_value(FilterCondition::new("email", FilterOp::IsNull)).unwrap();
        assert_eq!(nullary, json!({"field": "email", "operator": "is_null"}));

        let bad: Result<FilterCondition, _> =
            serde_json::from_value(json!({"field": "status", "operator": "near", "value": 1}));
        assert!(bad.is_err());
    }
}

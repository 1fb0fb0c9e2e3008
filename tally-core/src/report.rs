//! Persisted report definitions.

use serde::{Deserialize, Serialize};

use crate::{FilterCondition, ReportId};

/// Field sentinel for `count` aggregations that dereference no field.
pub const COUNT_ALL_FIELD: &str = "*";

/// Aggregate function applied per group.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AggregateFunction {
    Count,
    Sum,
    Avg,
    Min,
    Max,
}

impl AggregateFunction {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Count => "count",
            Self::Sum => "sum",
            Self::Avg => "avg",
            Self::Min => "min",
            Self::Max => "max",
        }
    }

    /// Functions other than `count` need a numeric field.
    pub fn requires_numeric(&self) -> bool {
        !matches!(self, Self::Count)
    }
}

impl std::fmt::Display for AggregateFunction {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One computed value per group.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AggregationSpec {
    pub field: String,
    pub function: AggregateFunction,
    pub label: String,
}

impl AggregationSpec {
    pub fn new(
        field: impl Into<String>,
        function: AggregateFunction,
        label: impl Into<String>,
    ) -> Self {
        Self {
            field: field.into(),
            function,
            label: label.into(),
        }
    }

    /// `count` over the sentinel field.
    pub fn count(label: impl Into<String>) -> Self {
        Self::new(COUNT_ALL_FIELD, AggregateFunction::Count, label)
    }
}

/// A displayed report column.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ColumnConfig {
    pub api_name: String,
    pub label: String,
    #[serde(default = "default_visible")]
    pub visible: bool,
}

fn default_visible() -> bool {
    true
}

impl ColumnConfig {
    pub fn new(api_name: impl Into<String>, label: impl Into<String>) -> Self {
        Self {
            api_name: api_name.into(),
            label: label.into(),
            visible: true,
        }
    }
}

/// A saved, re-evaluable query definition over one object type.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Report {
    pub id: ReportId,
    pub name: String,
    pub object_type: String,
    #[serde(default)]
    pub filters: Vec<FilterCondition>,
    #[serde(default)]
    pub groupings: Vec<String>,
    #[serde(default)]
    pub aggregations: Vec<AggregationSpec>,
    #[serde(default)]
    pub columns: Vec<ColumnConfig>,
}

impl Report {
    pub fn new(id: ReportId, name: impl Into<String>, object_type: impl Into<String>) -> Self {
        Self {
            id,
            name: name.into(),
            object_type: object_type.into(),
            filters: Vec::new(),
            groupings: Vec::new(),
            aggregations: Vec::new(),
            columns: Vec::new(),
        }
    }

    pub fn visible_columns(&self) -> impl Iterator<Item = &ColumnConfig> {
        self.columns.iter().filter(|c| c.visible)
    }
}

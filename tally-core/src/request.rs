//! Per-request listing parameters: sort, pagination, search and filters.
//!
//! These are ephemeral. They are built from query parameters, validated
//! against an object's fields by the query builder, then discarded.

use serde::{Deserialize, Serialize};

use crate::{
    FilterCondition, RawFilterCondition, TallyResult, ValidationError, CREATED_AT_FIELD,
};

/// Sort direction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SortDirection {
    Asc,
    #[default]
    Desc,
}

impl SortDirection {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Asc => "asc",
            Self::Desc => "desc",
        }
    }

    pub fn parse(token: &str) -> Option<Self> {
        match token.to_ascii_lowercase().as_str() {
            "asc" => Some(Self::Asc),
            "desc" => Some(Self::Desc),
            _ => None,
        }
    }
}

/// Sort field and direction. Defaults to newest first.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SortConfig {
    pub field: String,
    #[serde(default)]
    pub direction: SortDirection,
}

impl SortConfig {
    pub fn new(field: impl Into<String>, direction: SortDirection) -> Self {
        Self {
            field: field.into(),
            direction,
        }
    }

    pub fn asc(field: impl Into<String>) -> Self {
        Self::new(field, SortDirection::Asc)
    }

    pub fn desc(field: impl Into<String>) -> Self {
        Self::new(field, SortDirection::Desc)
    }
}

impl Default for SortConfig {
    fn default() -> Self {
        Self::desc(CREATED_AT_FIELD)
    }
}

/// 1-based page request. Out-of-range values are handled by the query builder:
/// `page` is clamped to 1, a non-positive `page_size` is rejected, and a
/// missing `page_size` takes the engine's configured default.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PaginationConfig {
    pub page: i64,
    #[serde(default)]
    pub page_size: Option<i64>,
}

impl PaginationConfig {
    pub fn new(page: i64, page_size: i64) -> Self {
        Self {
            page,
            page_size: Some(page_size),
        }
    }

    /// A page at the configured default size.
    pub fn page(page: i64) -> Self {
        Self {
            page,
            page_size: None,
        }
    }
}

/// Everything a list page asks of the engine for one object type.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ListRequest {
    #[serde(default)]
    pub filters: Vec<FilterCondition>,
    #[serde(default)]
    pub sort: Option<SortConfig>,
    #[serde(default)]
    pub pagination: Option<PaginationConfig>,
    #[serde(default)]
    pub search: Option<String>,
    /// `None` picks the default search fields; `Some(vec![])` disables search.
    #[serde(default)]
    pub search_fields: Option<Vec<String>>,
    /// Explicit display fields. `None` picks the default display fields.
    #[serde(default)]
    pub select: Option<Vec<String>>,
}

impl ListRequest {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_filter(mut self, condition: FilterCondition) -> Self {
        self.filters.push(condition);
        self
    }

    pub fn with_sort(mut self, sort: SortConfig) -> Self {
        self.sort = Some(sort);
        self
    }

    pub fn with_page(mut self, page: i64, page_size: i64) -> Self {
        self.pagination = Some(PaginationConfig::new(page, page_size));
        self
    }

    pub fn with_search(mut self, term: impl Into<String>) -> Self {
        self.search = Some(term.into());
        self
    }

    pub fn with_search_fields(mut self, fields: Vec<String>) -> Self {
        self.search_fields = Some(fields);
        self
    }

    pub fn with_select(mut self, fields: Vec<String>) -> Self {
        self.select = Some(fields);
        self
    }

    /// Build a request from URL query parameters.
    ///
    /// Recognized keys: `page`, `page_size` (or `pageSize`), `sort`
    /// (`field` or `field:asc|desc`), `q` (or `search`), `search_fields` and
    /// `fields` (comma-separated), and `filters` (a JSON array of
    /// `{field, operator, value}` objects). Unknown keys are ignored.
    pub fn from_query_pairs<'a, I>(pairs: I) -> TallyResult<Self>
    where
        I: IntoIterator<Item = (&'a str, &'a str)>,
    {
        let mut request = Self::default();
        let mut page: Option<i64> = None;
        let mut page_size: Option<i64> = None;

        for (key, value) in pairs {
            match key {
                "page" => page = Some(parse_int("page", value)?),
                "page_size" | "pageSize" => page_size = Some(parse_int("page_size", value)?),
                "sort" => request.sort = Some(parse_sort(value)?),
                "q" | "search" => request.search = Some(value.to_string()),
                "search_fields" => request.search_fields = Some(split_list(value)),
                "fields" => request.select = Some(split_list(value)),
                "filters" => {
                    let raw: Vec<RawFilterCondition> =
                        serde_json::from_str(value).map_err(|e| {
                            ValidationError::invalid_value("filters", "parse", e.to_string())
                        })?;
                    for condition in raw {
                        request.filters.push(FilterCondition::try_from(condition)?);
                    }
                }
                _ => {}
            }
        }

        if page.is_some() || page_size.is_some() {
            request.pagination = Some(PaginationConfig {
                page: page.unwrap_or(1),
                page_size,
            });
        }
        Ok(request)
    }
}

fn parse_int(field: &str, value: &str) -> TallyResult<i64> {
    value.trim().parse().map_err(|_| {
        ValidationError::invalid_value(field, "pagination", format!("not an integer: {value}"))
            .into()
    })
}

fn parse_sort(value: &str) -> TallyResult<SortConfig> {
    let (field, direction) = match value.split_once(':') {
        Some((field, dir)) => {
            let direction = SortDirection::parse(dir).ok_or_else(|| {
                ValidationError::invalid_value(field, "sort", format!("unknown direction: {dir}"))
            })?;
            (field, direction)
        }
        None => (value, SortDirection::default()),
    };
    Ok(SortConfig::new(field.trim(), direction))
}

fn split_list(value: &str) -> Vec<String> {
    value
        .split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
        .collect()
}

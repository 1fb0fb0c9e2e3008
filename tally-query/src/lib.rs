//! TALLY Query - Filter Composition and Report Aggregation
//!
//! Everything here is a pure function of its arguments. The reference
//! instant for relative date operators is always passed in by the caller.
//!
//! - [`dates`]: relative date windows (`this_week`, `last_n_days`, ...)
//! - [`fields`]: default display and search field selection
//! - [`builder`]: validated [`QuerySpec`] composition from a [`tally_core::ListRequest`]
//! - [`evaluator`]: in-memory execution of a `QuerySpec`
//! - [`report`]: grouping, aggregation and report descriptions
//! - [`postgrest`]: rendering a `QuerySpec` as PostgREST parameters

pub mod builder;
pub mod dates;
pub mod evaluator;
pub mod fields;
pub mod postgrest;
pub mod report;
pub mod value;

pub use builder::{
    build_predicate, build_predicates, CompareOp, Condition, MatchPosition, OrderBy, PageWindow,
    Predicate, Projection, QueryBuilder, QuerySpec, SearchGroup,
};
pub use dates::{last_n_days, this_month, this_quarter, this_week, DateWindow, RelativeWindow};
pub use evaluator::sort_records;
pub use fields::{
    default_display_fields, default_search_fields, resolve_display_fields, resolve_search_fields,
};
pub use postgrest::PostgrestQuery;
pub use report::{
    describe, describe_value, evaluate, object_type_label, plan_report, AggregateCell,
    AggregateRow, AggregateValue, GroupValue, ReportOutput, ReportPlan,
};

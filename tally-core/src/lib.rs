//! TALLY Core - Record Engine Types
//!
//! Pure data structures shared by the query builder, the report engine and
//! the storage facade: object/field metadata, the closed filter vocabulary,
//! per-request listing parameters, report definitions, errors and config.
//! No evaluation logic lives here.

pub mod config;
pub mod error;
pub mod filter;
pub mod identity;
pub mod report;
pub mod request;
pub mod schema;

pub use config::{EngineConfig, DEFAULT_PAGE_SIZE};
pub use error::{
    ConfigError, ErrorKind, NotFoundError, StorageError, TallyError, TallyResult, ValidationError,
};
pub use filter::{Arity, FilterCondition, FilterOp, Operator, RawFilterCondition};
pub use identity::{new_entity_id, EntityId, Record, ReportId, TenantId, Timestamp};
pub use report::{AggregateFunction, AggregationSpec, ColumnConfig, Report, COUNT_ALL_FIELD};
pub use request::{ListRequest, PaginationConfig, SortConfig, SortDirection};
pub use schema::{
    is_reserved_field, FieldDataType, FieldDefinition, ObjectDefinition, ObjectSchema,
    CREATED_AT_FIELD, ID_FIELD, RESERVED_FIELDS, UPDATED_AT_FIELD,
};

//! Identity types for TALLY entities

use chrono::{DateTime, Utc};
use serde_json::{Map, Value};
use uuid::Uuid;

/// Entity identifier using UUIDv7 for timestamp-sortable IDs.
pub type EntityId = Uuid;

/// Tenant (organization) owning objects, records and reports.
pub type TenantId = Uuid;

/// Persisted report identifier.
pub type ReportId = Uuid;

/// Timestamp type using UTC timezone.
pub type Timestamp = DateTime<Utc>;

/// One record of a tenant-defined object: field api_name to value.
pub type Record = Map<String, Value>;

/// Generate a new UUIDv7 EntityId (timestamp-sortable).
pub fn new_entity_id() -> EntityId {
    Uuid::now_v7()
}

//! Collaborator traits.
//!
//! The engine never talks to a database directly. Hosts implement these
//! traits over whatever backend holds their records (a PostgREST endpoint,
//! a SQL pool, an in-process map) and hand them to
//! [`RecordService`](crate::RecordService).

use async_trait::async_trait;
use tally_core::{ObjectSchema, Record, Report, ReportId, TallyResult, TenantId};
use tally_query::QuerySpec;

/// Executes composed queries against tenant-isolated record storage.
#[async_trait]
pub trait RecordStore: Send + Sync {
    /// Rows of the page slice described by `spec`, plus the exact number of
    /// rows matching its predicates and search, ignoring pagination.
    ///
    /// Both values must come from one consistent read.
    async fn query(&self, tenant_id: TenantId, spec: &QuerySpec)
        -> TallyResult<(Vec<Record>, u64)>;

    /// A single record by identity.
    async fn fetch(
        &self,
        tenant_id: TenantId,
        object_type: &str,
        record_id: &str,
    ) -> TallyResult<Option<Record>>;
}

/// Source of object definitions and their ordered fields.
#[async_trait]
pub trait MetadataStore: Send + Sync {
    /// `Ok(None)` when the tenant has no object with this api name.
    async fn load_object(&self, tenant_id: TenantId, api_name: &str)
        -> TallyResult<Option<ObjectSchema>>;
}

/// Report persistence. Opaque CRUD; the engine only reads.
#[async_trait]
pub trait ReportStore: Send + Sync {
    async fn get_report(&self, tenant_id: TenantId, report_id: ReportId)
        -> TallyResult<Option<Report>>;

    /// Insert or replace.
    async fn save_report(&self, tenant_id: TenantId, report: &Report) -> TallyResult<()>;

    /// Returns whether a report was removed.
    async fn delete_report(&self, tenant_id: TenantId, report_id: ReportId) -> TallyResult<bool>;

    /// Reports for the tenant, optionally restricted to one object type.
    async fn list_reports(
        &self,
        tenant_id: TenantId,
        object_type: Option<&str>,
    ) -> TallyResult<Vec<Report>>;
}

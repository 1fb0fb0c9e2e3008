//! Record Access Facade.
//!
//! [`RecordService`] is the single entry point the page layer calls for every
//! object type. It resolves metadata through the cache, composes and
//! validates the query before touching storage, runs each collaborator call
//! under the configured timeout and hands back either a complete result or a
//! typed error.

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use serde::Serialize;
use tally_core::{
    EngineConfig, ListRequest, NotFoundError, ObjectSchema, Record, Report, ReportId,
    StorageError, TallyError, TallyResult, TenantId, Timestamp,
};
use tally_query::{describe, plan_report, QueryBuilder, ReportOutput};
use tracing::{debug, instrument, warn};

use crate::cache::{CacheConfig, MetadataCache};
use crate::traits::{MetadataStore, RecordStore, ReportStore};

/// Source of the reference instant for relative date operators.
pub trait Clock: Send + Sync {
    fn now(&self) -> Timestamp;
}

#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> Timestamp {
        Utc::now()
    }
}

/// Always answers the same instant.
#[derive(Debug, Clone, Copy)]
pub struct FixedClock(pub Timestamp);

impl Clock for FixedClock {
    fn now(&self) -> Timestamp {
        self.0
    }
}

/// One page of a listing. `total` counts every matching record.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RecordPage {
    pub rows: Vec<Record>,
    pub total: u64,
    pub page: u64,
    pub page_size: u64,
}

impl RecordPage {
    /// Number of pages needed for `total` at this page size.
    pub fn page_count(&self) -> u64 {
        if self.page_size == 0 {
            0
        } else {
            self.total.div_ceil(self.page_size)
        }
    }
}

pub struct RecordService<R, M, P>
where
    R: RecordStore,
    M: MetadataStore,
    P: ReportStore,
{
    records: Arc<R>,
    metadata: MetadataCache<M>,
    reports: Arc<P>,
    builder: QueryBuilder,
    clock: Arc<dyn Clock>,
    storage_timeout: Duration,
}

impl<R, M, P> RecordService<R, M, P>
where
    R: RecordStore,
    M: MetadataStore,
    P: ReportStore,
{
    /// Fails with a config error when `config` does not validate.
    pub fn new(
        records: Arc<R>,
        metadata: Arc<M>,
        reports: Arc<P>,
        config: &EngineConfig,
    ) -> TallyResult<Self> {
        config.validate()?;
        Ok(Self {
            records,
            metadata: MetadataCache::new(metadata, CacheConfig::from(config)),
            reports,
            builder: QueryBuilder::new(config),
            clock: Arc::new(SystemClock),
            storage_timeout: config.storage_timeout,
        })
    }

    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    pub fn metadata_cache(&self) -> &MetadataCache<M> {
        &self.metadata
    }

    pub fn record_store(&self) -> &R {
        &self.records
    }

    pub fn report_store(&self) -> &P {
        &self.reports
    }

    /// Object definition and ordered fields, through the cache.
    pub async fn describe_object(
        &self,
        tenant_id: TenantId,
        object_type: &str,
    ) -> TallyResult<Arc<ObjectSchema>> {
        self.guarded("load_object", self.metadata.resolve(tenant_id, object_type))
            .await
    }

    /// A page of records plus the total matching count.
    #[instrument(skip(self, request))]
    pub async fn list_records(
        &self,
        tenant_id: TenantId,
        object_type: &str,
        request: &ListRequest,
    ) -> TallyResult<RecordPage> {
        let schema = self.describe_object(tenant_id, object_type).await?;
        let spec = self
            .builder
            .build(&schema, request, self.clock.now())
            .inspect_err(|e| warn!(error = %e, "Rejected list request"))?;
        let window = spec
            .page
            .ok_or_else(|| TallyError::internal("list query composed without a page"))?;

        let (rows, total) = self
            .guarded("query", self.records.query(tenant_id, &spec))
            .await?;
        if rows.len() as u64 > window.page_size || (rows.len() as u64) > total {
            return Err(TallyError::internal(format!(
                "storage returned {} rows for a page of {} with total {total}",
                rows.len(),
                window.page_size
            )));
        }

        debug!(rows = rows.len(), total, page = window.page, "Listed records");
        Ok(RecordPage {
            rows,
            total,
            page: window.page,
            page_size: window.page_size,
        })
    }

    /// Parse URL query parameters, then list. Malformed parameters fail
    /// before metadata or records are touched.
    pub async fn list_records_from_query<'a, I>(
        &self,
        tenant_id: TenantId,
        object_type: &str,
        pairs: I,
    ) -> TallyResult<RecordPage>
    where
        I: IntoIterator<Item = (&'a str, &'a str)>,
    {
        let request = ListRequest::from_query_pairs(pairs)
            .inspect_err(|e| warn!(error = %e, object_type, "Rejected query parameters"))?;
        self.list_records(tenant_id, object_type, &request).await
    }

    #[instrument(skip(self))]
    pub async fn get_record(
        &self,
        tenant_id: TenantId,
        object_type: &str,
        record_id: &str,
    ) -> TallyResult<Record> {
        let schema = self.describe_object(tenant_id, object_type).await?;
        self.guarded(
            "fetch",
            self.records.fetch(tenant_id, schema.api_name(), record_id),
        )
        .await?
        .ok_or_else(|| {
            NotFoundError::Record {
                object_type: object_type.to_string(),
                record_id: record_id.to_string(),
            }
            .into()
        })
    }

    /// Grouped aggregates and the description of `report`.
    #[instrument(skip(self, report), fields(report_id = %report.id))]
    pub async fn evaluate_report(
        &self,
        tenant_id: TenantId,
        report: &Report,
    ) -> TallyResult<ReportOutput> {
        let schema = self.describe_object(tenant_id, &report.object_type).await?;
        let plan = plan_report(report, &schema, self.clock.now())
            .inspect_err(|e| warn!(error = %e, "Rejected report definition"))?;
        let (records, _) = self
            .guarded("query", self.records.query(tenant_id, plan.query_spec()))
            .await?;
        let output = plan.output(report, &records)?;
        debug!(
            records = records.len(),
            groups = output.rows.len(),
            "Evaluated report"
        );
        Ok(output)
    }

    /// Load a saved report and evaluate it.
    pub async fn evaluate_report_by_id(
        &self,
        tenant_id: TenantId,
        report_id: ReportId,
    ) -> TallyResult<ReportOutput> {
        let report = self
            .guarded("get_report", self.reports.get_report(tenant_id, report_id))
            .await?
            .ok_or(NotFoundError::Report { report_id })?;
        self.evaluate_report(tenant_id, &report).await
    }

    /// The description alone. No metadata or data access.
    pub fn describe_report(&self, report: &Report) -> String {
        describe(report)
    }

    /// Run a collaborator call under the storage timeout.
    async fn guarded<T, F>(&self, operation: &'static str, call: F) -> TallyResult<T>
    where
        F: Future<Output = TallyResult<T>>,
    {
        match tokio::time::timeout(self.storage_timeout, call).await {
            Ok(Ok(value)) => Ok(value),
            Ok(Err(e)) => {
                if matches!(e, TallyError::Storage(_)) {
                    warn!(operation, error = %e, "Storage call failed");
                }
                Err(e)
            }
            Err(_) => {
                warn!(
                    operation,
                    timeout_ms = self.storage_timeout.as_millis() as u64,
                    "Storage call timed out"
                );
                Err(StorageError::Timeout {
                    elapsed: self.storage_timeout,
                }
                .into())
            }
        }
    }
}

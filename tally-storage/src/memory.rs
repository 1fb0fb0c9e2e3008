//! In-memory implementations of the collaborator traits.
//!
//! Queries run through the same evaluator the engine uses for reports, so
//! these stores behave like a relational backend given the same
//! [`QuerySpec`]. Each store carries [`Faults`] for simulating an outage or
//! a slow backend in tests.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, PoisonError, RwLock};
use std::time::Duration;

use async_trait::async_trait;
use tally_core::{
    ObjectSchema, Record, Report, ReportId, StorageError, TallyError, TallyResult, TenantId,
    ID_FIELD,
};
use tally_query::value::as_text;
use tally_query::QuerySpec;

use crate::traits::{MetadataStore, RecordStore, ReportStore};

fn poisoned<T>(_: PoisonError<T>) -> TallyError {
    TallyError::internal("in-memory store lock poisoned")
}

/// Injected failure modes and a call counter shared by a store's operations.
#[derive(Debug, Default)]
pub struct Faults {
    unavailable: RwLock<Option<String>>,
    delay: RwLock<Option<Duration>>,
    calls: AtomicU64,
}

impl Faults {
    /// Every subsequent call fails with StorageUnavailable.
    pub fn fail_with(&self, reason: impl Into<String>) {
        if let Ok(mut slot) = self.unavailable.write() {
            *slot = Some(reason.into());
        }
    }

    /// Every subsequent call sleeps this long before answering.
    pub fn delay_by(&self, delay: Duration) {
        if let Ok(mut slot) = self.delay.write() {
            *slot = Some(delay);
        }
    }

    pub fn clear(&self) {
        if let Ok(mut slot) = self.unavailable.write() {
            *slot = None;
        }
        if let Ok(mut slot) = self.delay.write() {
            *slot = None;
        }
    }

    /// Number of calls that reached the store.
    pub fn calls(&self) -> u64 {
        self.calls.load(Ordering::SeqCst)
    }

    async fn enter(&self) -> TallyResult<()> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let delay = *self.delay.read().map_err(poisoned)?;
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }
        let reason = self.unavailable.read().map_err(poisoned)?.clone();
        match reason {
            Some(reason) => Err(StorageError::Unavailable { reason }.into()),
            None => Ok(()),
        }
    }
}

type TableKey = (TenantId, String);

/// Records per tenant and object type, in insertion order.
#[derive(Debug, Default)]
pub struct InMemoryRecordStore {
    tables: Arc<RwLock<HashMap<TableKey, Vec<Record>>>>,
    faults: Faults,
}

impl InMemoryRecordStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&self, tenant_id: TenantId, object_type: &str, record: Record) -> TallyResult<()> {
        self.tables
            .write()
            .map_err(poisoned)?
            .entry((tenant_id, object_type.to_string()))
            .or_default()
            .push(record);
        Ok(())
    }

    pub fn extend<I>(&self, tenant_id: TenantId, object_type: &str, records: I) -> TallyResult<()>
    where
        I: IntoIterator<Item = Record>,
    {
        self.tables
            .write()
            .map_err(poisoned)?
            .entry((tenant_id, object_type.to_string()))
            .or_default()
            .extend(records);
        Ok(())
    }

    pub fn count(&self, tenant_id: TenantId, object_type: &str) -> usize {
        self.tables
            .read()
            .map(|tables| {
                tables
                    .get(&(tenant_id, object_type.to_string()))
                    .map_or(0, Vec::len)
            })
            .unwrap_or(0)
    }

    pub fn clear(&self) -> TallyResult<()> {
        self.tables.write().map_err(poisoned)?.clear();
        Ok(())
    }

    pub fn faults(&self) -> &Faults {
        &self.faults
    }
}

#[async_trait]
impl RecordStore for InMemoryRecordStore {
    async fn query(
        &self,
        tenant_id: TenantId,
        spec: &QuerySpec,
    ) -> TallyResult<(Vec<Record>, u64)> {
        self.faults.enter().await?;
        let tables = self.tables.read().map_err(poisoned)?;
        let key = (tenant_id, spec.object_type.clone());
        Ok(match tables.get(&key) {
            Some(records) => spec.execute(records),
            None => (Vec::new(), 0),
        })
    }

    async fn fetch(
        &self,
        tenant_id: TenantId,
        object_type: &str,
        record_id: &str,
    ) -> TallyResult<Option<Record>> {
        self.faults.enter().await?;
        let tables = self.tables.read().map_err(poisoned)?;
        Ok(tables
            .get(&(tenant_id, object_type.to_string()))
            .and_then(|records| {
                records.iter().find(|record| {
                    record
                        .get(ID_FIELD)
                        .and_then(as_text)
                        .is_some_and(|id| id == record_id)
                })
            })
            .cloned())
    }
}

/// Object schemas per tenant.
#[derive(Debug, Default)]
pub struct InMemoryMetadataStore {
    objects: Arc<RwLock<HashMap<TableKey, ObjectSchema>>>,
    faults: Faults,
}

impl InMemoryMetadataStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert or replace the schema for `schema.object.api_name`.
    pub fn put_object(&self, tenant_id: TenantId, schema: ObjectSchema) -> TallyResult<()> {
        let key = (tenant_id, schema.api_name().to_string());
        self.objects.write().map_err(poisoned)?.insert(key, schema);
        Ok(())
    }

    pub fn remove_object(&self, tenant_id: TenantId, api_name: &str) -> TallyResult<bool> {
        Ok(self
            .objects
            .write()
            .map_err(poisoned)?
            .remove(&(tenant_id, api_name.to_string()))
            .is_some())
    }

    pub fn faults(&self) -> &Faults {
        &self.faults
    }
}

#[async_trait]
impl MetadataStore for InMemoryMetadataStore {
    async fn load_object(
        &self,
        tenant_id: TenantId,
        api_name: &str,
    ) -> TallyResult<Option<ObjectSchema>> {
        self.faults.enter().await?;
        let objects = self.objects.read().map_err(poisoned)?;
        Ok(objects.get(&(tenant_id, api_name.to_string())).cloned())
    }
}

/// Saved reports per tenant.
#[derive(Debug, Default)]
pub struct InMemoryReportStore {
    reports: Arc<RwLock<HashMap<(TenantId, ReportId), Report>>>,
    faults: Faults,
}

impl InMemoryReportStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn faults(&self) -> &Faults {
        &self.faults
    }
}

#[async_trait]
impl ReportStore for InMemoryReportStore {
    async fn get_report(
        &self,
        tenant_id: TenantId,
        report_id: ReportId,
    ) -> TallyResult<Option<Report>> {
        self.faults.enter().await?;
        let reports = self.reports.read().map_err(poisoned)?;
        Ok(reports.get(&(tenant_id, report_id)).cloned())
    }

    async fn save_report(&self, tenant_id: TenantId, report: &Report) -> TallyResult<()> {
        self.faults.enter().await?;
        self.reports
            .write()
            .map_err(poisoned)?
            .insert((tenant_id, report.id), report.clone());
        Ok(())
    }

    async fn delete_report(&self, tenant_id: TenantId, report_id: ReportId) -> TallyResult<bool> {
        self.faults.enter().await?;
        Ok(self
            .reports
            .write()
            .map_err(poisoned)?
            .remove(&(tenant_id, report_id))
            .is_some())
    }

    async fn list_reports(
        &self,
        tenant_id: TenantId,
        object_type: Option<&str>,
    ) -> TallyResult<Vec<Report>> {
        self.faults.enter().await?;
        let reports = self.reports.read().map_err(poisoned)?;
        let mut found: Vec<Report> = reports
            .iter()
            .filter(|((tenant, _), report)| {
                *tenant == tenant_id && object_type.map_or(true, |t| report.object_type == t)
            })
            .map(|(_, report)| report.clone())
            .collect();
        found.sort_by(|a, b| a.name.cmp(&b.name).then(a.id.cmp(&b.id)));
        Ok(found)
    }
}

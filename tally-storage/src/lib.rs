//! TALLY Storage - Collaborator Traits and Record Access Facade
//!
//! Defines the boundary to the host's storage (records, object metadata,
//! saved reports), a tenant-scoped metadata cache, in-memory reference
//! implementations, and [`RecordService`], the entry point used for every
//! object type.

pub mod cache;
pub mod memory;
pub mod service;
pub mod traits;

pub use cache::{CacheConfig, CacheStats, MetadataCache, TenantScopedKey};
pub use memory::{Faults, InMemoryMetadataStore, InMemoryRecordStore, InMemoryReportStore};
pub use service::{Clock, FixedClock, RecordPage, RecordService, SystemClock};
pub use traits::{MetadataStore, RecordStore, ReportStore};

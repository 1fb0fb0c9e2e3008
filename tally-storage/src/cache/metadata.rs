//! Read-through cache of object schemas.
//!
//! Entries are `Arc` snapshots in a `DashMap`; readers clone the `Arc` and
//! drop the shard guard before anything awaits. Misses load from the
//! [`MetadataStore`] and are never negative-cached, so a newly created object
//! type is visible on the next lookup.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use dashmap::DashMap;
use tally_core::{EngineConfig, NotFoundError, ObjectSchema, TallyResult, TenantId};
use tracing::{debug, info};

use super::tenant_key::TenantScopedKey;
use crate::traits::MetadataStore;

/// Configuration for the metadata cache.
#[derive(Debug, Clone)]
pub struct CacheConfig {
    /// How long a loaded schema is served before it is reloaded.
    pub entry_ttl: Duration,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            entry_ttl: Duration::from_secs(300),
        }
    }
}

impl CacheConfig {
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the entry TTL.
    pub fn with_ttl(mut self, ttl: Duration) -> Self {
        self.entry_ttl = ttl;
        self
    }
}

impl From<&EngineConfig> for CacheConfig {
    fn from(config: &EngineConfig) -> Self {
        Self::new().with_ttl(config.metadata_cache_ttl)
    }
}

/// Statistics about cache usage.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CacheStats {
    pub hits: u64,
    pub misses: u64,
    /// Entries currently held, including expired ones not yet reloaded.
    pub entry_count: u64,
}

impl CacheStats {
    /// Calculate the hit rate (0.0 to 1.0).
    pub fn hit_rate(&self) -> f64 {
        let total = self.hits + self.misses;
        if total == 0 {
            0.0
        } else {
            self.hits as f64 / total as f64
        }
    }
}

#[derive(Debug)]
struct CachedSchema {
    schema: Arc<ObjectSchema>,
    loaded_at: Instant,
}

/// Field Metadata Resolver with a tenant-scoped read-through cache.
pub struct MetadataCache<M: MetadataStore> {
    store: Arc<M>,
    entries: DashMap<TenantScopedKey, CachedSchema>,
    config: CacheConfig,
    hits: AtomicU64,
    misses: AtomicU64,
}

impl<M: MetadataStore> MetadataCache<M> {
    pub fn new(store: Arc<M>, config: CacheConfig) -> Self {
        Self {
            store,
            entries: DashMap::new(),
            config,
            hits: AtomicU64::new(0),
            misses: AtomicU64::new(0),
        }
    }

    pub fn with_defaults(store: Arc<M>) -> Self {
        Self::new(store, CacheConfig::default())
    }

    pub fn config(&self) -> &CacheConfig {
        &self.config
    }

    pub fn store(&self) -> &M {
        &self.store
    }

    /// Object definition and ordered fields for `object_type`.
    ///
    /// Unknown object types fail with [`NotFoundError::ObjectType`].
    pub async fn resolve(
        &self,
        tenant_id: TenantId,
        object_type: &str,
    ) -> TallyResult<Arc<ObjectSchema>> {
        let key = TenantScopedKey::new(tenant_id, object_type);

        let cached = self.entries.get(&key).and_then(|entry| {
            (entry.loaded_at.elapsed() <= self.config.entry_ttl).then(|| Arc::clone(&entry.schema))
        });
        if let Some(schema) = cached {
            self.hits.fetch_add(1, Ordering::Relaxed);
            debug!(key = %key, "Metadata cache hit");
            return Ok(schema);
        }

        self.misses.fetch_add(1, Ordering::Relaxed);
        debug!(key = %key, "Metadata cache miss");

        let schema = self
            .store
            .load_object(tenant_id, object_type)
            .await?
            .ok_or_else(|| NotFoundError::ObjectType {
                object_type: object_type.to_string(),
            })?;
        let schema = Arc::new(schema);
        self.entries.insert(
            key,
            CachedSchema {
                schema: Arc::clone(&schema),
                loaded_at: Instant::now(),
            },
        );
        Ok(schema)
    }

    /// Drop one object type of one tenant. Returns whether it was cached.
    pub fn invalidate_object(&self, tenant_id: TenantId, object_type: &str) -> bool {
        let removed = self
            .entries
            .remove(&TenantScopedKey::new(tenant_id, object_type))
            .is_some();
        if removed {
            info!(tenant_id = %tenant_id, object_type, "Invalidated cached object schema");
        }
        removed
    }

    /// Drop every cached schema of a tenant. Returns the number removed.
    pub fn invalidate_tenant(&self, tenant_id: TenantId) -> u64 {
        let before = self.entries.len();
        self.entries.retain(|key, _| !key.belongs_to(tenant_id));
        let removed = before.saturating_sub(self.entries.len()) as u64;
        info!(tenant_id = %tenant_id, removed, "Invalidated tenant metadata");
        removed
    }

    /// Drop everything; the next lookups reload from the store.
    pub fn refresh(&self) -> u64 {
        let removed = self.entries.len() as u64;
        self.entries.clear();
        info!(removed, "Refreshed metadata cache");
        removed
    }

    pub fn stats(&self) -> CacheStats {
        CacheStats {
            hits: self.hits.load(Ordering::Relaxed),
            misses: self.misses.load(Ordering::Relaxed),
            entry_count: self.entries.len() as u64,
        }
    }
}

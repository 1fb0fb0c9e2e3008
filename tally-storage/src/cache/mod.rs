//! Metadata caching.
//!
//! - [`TenantScopedKey`]: cache keys that cannot cross tenants
//! - [`MetadataCache`]: read-through cache of object schemas

mod metadata;
mod tenant_key;

pub use metadata::{CacheConfig, CacheStats, MetadataCache};
pub use tenant_key::TenantScopedKey;

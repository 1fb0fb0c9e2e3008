//! Tenant-scoped cache keys.
//!
//! `TenantScopedKey` has a private inner struct, so a key can only be built
//! through [`TenantScopedKey::new`], which demands a tenant. Cached metadata
//! of one tenant is unreachable from another by construction.

use std::fmt;

use tally_core::TenantId;

/// Cache key for one object type of one tenant.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct TenantScopedKey {
    inner: TenantKeyInner,
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
struct TenantKeyInner {
    tenant_id: TenantId,
    object_type: String,
}

impl TenantScopedKey {
    pub fn new(tenant_id: TenantId, object_type: impl Into<String>) -> Self {
        Self {
            inner: TenantKeyInner {
                tenant_id,
                object_type: object_type.into(),
            },
        }
    }

    pub fn tenant_id(&self) -> TenantId {
        self.inner.tenant_id
    }

    pub fn object_type(&self) -> &str {
        &self.inner.object_type
    }

    /// Whether this key belongs to `tenant_id`.
    pub fn belongs_to(&self, tenant_id: TenantId) -> bool {
        self.inner.tenant_id == tenant_id
    }
}

impl fmt::Display for TenantScopedKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.inner.tenant_id, self.inner.object_type)
    }
}


#[cfg(test)]
mod prop_tests {
    use super::*;
    use proptest::prelude::*;
    use uuid::Uuid;

    proptest! {
        #![proptest_config(ProptestConfig::with_cases(100))]

        /// Keys are equal exactly when tenant and object type both match.
        #[test]
        fn prop_key_equality(
            t1 in any::<u128>(),
            t2 in any::<u128>(),
            o1 in "[a-z_]{1,12}",
            o2 in "[a-z_]{1,12}",
        ) {
            let a = TenantScopedKey::new(Uuid::from_u128(t1), o1.clone());
            let b = TenantScopedKey::new(Uuid::from_u128(t2), o2.clone());
            prop_assert_eq!(a == b, t1 == t2 && o1 == o2);
        }
    }
}

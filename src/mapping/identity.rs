use uuid::Uuid;

/// Identity capability every storable record provides.
///
/// A non-empty key uniquely identifies the record within its type and
/// namespace. The store calls `set_key` when it assigns a fresh identity on
/// write and when it materialises records from a key scan.
pub trait Identity {
    fn key(&self) -> &str;
    fn set_key(&mut self, key: String);
}

/// Source of new identities for records written without one.
pub trait IdentityAllocator: Send + Sync {
    /// Returns a new, globally unique identity.
    fn allocate(&self) -> String;
}

/// Allocates random (v4) UUIDs in their hyphenated form.
#[derive(Debug, Default, Clone, Copy)]
pub struct UuidAllocator;

impl IdentityAllocator for UuidAllocator {
    fn allocate(&self) -> String {
        Uuid::new_v4().to_string()
    }
}

impl<A: IdentityAllocator + ?Sized> IdentityAllocator for std::sync::Arc<A> {
    fn allocate(&self) -> String {
        (**self).allocate()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    #[test]
    fn test_uuid_allocator_is_unique() {
        let allocator = UuidAllocator;
        let ids: HashSet<String> = (0..1000).map(|_| allocator.allocate()).collect();
        assert_eq!(ids.len(), 1000);
        assert!(ids.iter().all(|id| Uuid::parse_str(id).is_ok()));
    }
}

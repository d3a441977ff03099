// ============================================================================
// hashstore Library
// ============================================================================

//! Typed entity persistence over a hash-based key-value store.
//!
//! Plain structs are mapped onto hashes: one hash per record, stored under
//! `[namespace:]Type:id`, with one hash field per mapped struct field.
//! [`EntityStore`] provides write, read, delete, batched read/delete and
//! listing over a pooled connection to any [`Backend`].
//!
//! # Examples
//!
//! ```
//! use hashstore::{Entity, EntityStore, StoreConfig};
//!
//! #[derive(Entity, Default, Debug, Clone, PartialEq)]
//! #[entity(name = "Hacker")]
//! struct Hacker {
//!     #[entity(key)]
//!     pub id: String,
//!     pub name: String,
//!     pub birthyear: i32,
//!     pub active: bool,
//! }
//!
//! # #[tokio::main]
//! # async fn main() -> hashstore::Result<()> {
//! let store = EntityStore::in_memory(StoreConfig::new().namespace("demo")).await?;
//!
//! let mut grace = Hacker {
//!     name: "Grace Hopper".into(),
//!     birthyear: 1906,
//!     active: true,
//!     ..Default::default()
//! };
//! store.write(&mut grace).await?;
//! assert!(!grace.id.is_empty());
//!
//! let mut loaded = Hacker { id: grace.id.clone(), ..Default::default() };
//! store.read(&mut loaded).await?;
//! assert_eq!(loaded, grace);
//!
//! store.delete(&loaded).await?;
//! assert!(store.read(&mut loaded).await.unwrap_err().is_not_found());
//! # Ok(())
//! # }
//! ```

extern crate self as hashstore;

pub mod connection;
pub mod core;
pub mod mapping;
pub mod store;

pub use crate::core::{ErrorKind, FieldKind, Reply, Result, StoreError, WireValue};

pub use crate::mapping::{
    Entity, FieldDescriptor, FieldMapper, FlatFieldMap, Identity, IdentityAllocator, KeyCodec,
    Primitive, UuidAllocator,
};

/// Derives [`Entity`] for a struct with named fields.
///
/// Public fields are mapped under their own names; private fields are left
/// out. Supported attributes:
///
/// - `#[entity(name = "...")]` on the struct overrides the type name used in keys.
/// - `#[entity(key)]` on a `String` field also derives [`Identity`] from it.
/// - `#[entity(rename = "...")]` on a field overrides its stored name.
/// - `#[entity(skip)]` on a field leaves it out of the mapping.
pub use hashstore_derive::Entity;

// Re-export connection API
pub use crate::connection::{
    Connection,
    backend::Backend,
    command::Command,
    config::ConnectionConfig,
    memory::MemoryBackend,
    pool::{ConnectionPool, PoolGuard, PoolStats},
};

pub use crate::store::{EntityStore, config::StoreConfig, cursor::ScanCursor};

pub mod entity;
pub mod field;
pub mod identity;
pub mod key;

pub use entity::Entity;
pub use field::{FieldDescriptor, FieldMapper, FlatFieldMap, Primitive};
pub use identity::{Identity, IdentityAllocator, UuidAllocator};
pub use key::KeyCodec;

pub mod error;
pub mod types;
pub mod value;

pub use error::{ErrorKind, Result, StoreError};
pub use types::FieldKind;
pub use value::{Reply, WireValue};

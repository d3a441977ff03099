use super::field::FieldDescriptor;
use super::identity::Identity;

/// A record type the store can persist.
///
/// Usually derived with `#[derive(Entity)]`, which lists every public field
/// together with its codec. `Default` supplies the zero value that scans and
/// batched reads populate.
pub trait Entity: Identity + Default + Send + Sync + 'static {
    /// Type segment of the storage key.
    fn type_name() -> &'static str;

    /// Mapped fields, in declaration order.
    fn fields() -> Vec<FieldDescriptor<Self>>;
}

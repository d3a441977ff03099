use std::fmt;

/// Declared kind of an entity field.
///
/// The primitive kinds have a wire encoding. `Struct`, `Slice`, `Map` and
/// `Pointer` are recognised so that a record carrying them fails with a
/// descriptive conversion error instead of being silently skipped.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FieldKind {
    String,
    I8,
    I16,
    I32,
    I64,
    Isize,
    U8,
    U16,
    U32,
    U64,
    Usize,
    F32,
    F64,
    Bool,
    Struct,
    Slice,
    Map,
    Pointer,
}

impl FieldKind {
    pub fn is_supported(&self) -> bool {
        !matches!(
            self,
            Self::Struct | Self::Slice | Self::Map | Self::Pointer
        )
    }

    pub fn is_signed(&self) -> bool {
        matches!(
            self,
            Self::I8 | Self::I16 | Self::I32 | Self::I64 | Self::Isize
        )
    }

    pub fn is_unsigned(&self) -> bool {
        matches!(
            self,
            Self::U8 | Self::U16 | Self::U32 | Self::U64 | Self::Usize
        )
    }

    pub fn is_float(&self) -> bool {
        matches!(self, Self::F32 | Self::F64)
    }

    pub fn name(&self) -> &'static str {
        match self {
            Self::String => "string",
            Self::I8 => "int8",
            Self::I16 => "int16",
            Self::I32 => "int32",
            Self::I64 => "int64",
            Self::Isize => "int",
            Self::U8 => "uint8",
            Self::U16 => "uint16",
            Self::U32 => "uint32",
            Self::U64 => "uint64",
            Self::Usize => "uint",
            Self::F32 => "float32",
            Self::F64 => "float64",
            Self::Bool => "bool",
            Self::Struct => "struct",
            Self::Slice => "slice",
            Self::Map => "map",
            Self::Pointer => "ptr",
        }
    }
}

impl fmt::Display for FieldKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_kind_classes() {
        assert!(FieldKind::I16.is_signed());
        assert!(FieldKind::Usize.is_unsigned());
        assert!(FieldKind::F32.is_float());
        assert!(FieldKind::Bool.is_supported());
        assert!(!FieldKind::Map.is_supported());
        assert!(!FieldKind::Pointer.is_unsigned());
    }
}

use crate::core::types::FieldKind;
use thiserror::Error;

/// Categorical error kind. Every `StoreError` maps onto exactly one of these.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    EmptyKey,
    NotFound,
    Conversion,
    Transport,
    Config,
}

#[derive(Error, Debug)]
pub enum StoreError {
    #[error("store: key is empty for {type_name}")]
    EmptyKey { type_name: String },

    #[error("store: key not found: {key}")]
    NotFound { key: String },

    #[error("store: deleted {deleted} of {requested} keys, the rest were not found")]
    PartialDelete { deleted: usize, requested: usize },

    #[error("store: cannot convert field {field} of kind {kind}")]
    Conversion { field: String, kind: FieldKind },

    #[error("store: {type_name} has no mapped fields to write")]
    NoFields { type_name: String },

    #[error("store: cannot decode field {field} of kind {kind} from {value:?}")]
    Decode {
        field: String,
        kind: FieldKind,
        value: String,
    },

    #[error("store: scanned key {key:?} does not start with {prefix:?}")]
    UnexpectedKey { key: String, prefix: String },

    #[error("store: transport error: {0}")]
    Transport(String),

    #[error("store: invalid configuration: {0}")]
    Config(String),
}

pub type Result<T> = std::result::Result<T, StoreError>;

impl StoreError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::EmptyKey { .. } => ErrorKind::EmptyKey,
            Self::NotFound { .. } | Self::PartialDelete { .. } => ErrorKind::NotFound,
            Self::Conversion { .. } | Self::NoFields { .. } | Self::Decode { .. } => {
                ErrorKind::Conversion
            }
            Self::UnexpectedKey { .. } | Self::Transport(_) => ErrorKind::Transport,
            Self::Config(_) => ErrorKind::Config,
        }
    }

    pub fn is_not_found(&self) -> bool {
        self.kind() == ErrorKind::NotFound
    }

    pub fn is_empty_key(&self) -> bool {
        self.kind() == ErrorKind::EmptyKey
    }

    /// Number of keys a multi-key delete actually removed before reporting
    /// the missing ones.
    pub fn deleted(&self) -> Option<usize> {
        match self {
            Self::PartialDelete { deleted, .. } => Some(*deleted),
            _ => None,
        }
    }

    pub(crate) fn transport(message: impl Into<String>) -> Self {
        Self::Transport(message.into())
    }
}

impl From<std::io::Error> for StoreError {
    fn from(err: std::io::Error) -> Self {
        Self::Transport(err.to_string())
    }
}

impl From<serde_json::Error> for StoreError {
    fn from(err: serde_json::Error) -> Self {
        Self::Config(err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_partial_delete_is_not_found() {
        let err = StoreError::PartialDelete {
            deleted: 2,
            requested: 3,
        };
        assert!(err.is_not_found());
        assert_eq!(err.deleted(), Some(2));
    }

    #[test]
    fn test_conversion_message_names_field_and_kind() {
        let err = StoreError::Conversion {
            field: "Profile".to_string(),
            kind: FieldKind::Struct,
        };
        assert_eq!(err.kind(), ErrorKind::Conversion);
        assert_eq!(
            err.to_string(),
            "store: cannot convert field Profile of kind struct"
        );
    }

    #[test]
    fn test_decode_error_is_conversion_kind() {
        let err = StoreError::Decode {
            field: "age".to_string(),
            kind: FieldKind::I32,
            value: "abc".to_string(),
        };
        assert_eq!(err.kind(), ErrorKind::Conversion);
        assert!(!err.is_not_found());
    }

    #[test]
    fn test_no_fields_is_conversion_kind() {
        let err = StoreError::NoFields {
            type_name: "Marker".to_string(),
        };
        assert_eq!(err.kind(), ErrorKind::Conversion);
        assert_eq!(
            err.to_string(),
            "store: Marker has no mapped fields to write"
        );
    }
}

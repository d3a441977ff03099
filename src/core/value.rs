use crate::core::{Result, StoreError};
use std::collections::HashMap;
use std::fmt;

/// An encoded primitive, as handed to the store for a single hash field.
///
/// Signed integers and booleans travel as text while unsigned integers and
/// floats keep their native numeric form. Stores written by earlier clients
/// rely on that split, so it must not be unified.
#[derive(Debug, Clone, PartialEq)]
pub enum WireValue {
    Text(String),
    Unsigned(u64),
    Float(f64),
}

impl WireValue {
    /// Textual rendering the store persists. Floats use the shortest
    /// representation that parses back to the same bits.
    pub fn to_wire_string(&self) -> String {
        match self {
            Self::Text(text) => text.clone(),
            Self::Unsigned(value) => value.to_string(),
            Self::Float(value) => value.to_string(),
        }
    }

    pub fn type_name(&self) -> &'static str {
        match self {
            Self::Text(_) => "TEXT",
            Self::Unsigned(_) => "UNSIGNED",
            Self::Float(_) => "FLOAT",
        }
    }
}

impl fmt::Display for WireValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_wire_string())
    }
}

/// A reply returned by the store for one command.
#[derive(Debug, Clone, PartialEq)]
pub enum Reply {
    Nil,
    Status(String),
    Integer(i64),
    Bulk(String),
    Array(Vec<Reply>),
    Error(String),
}

impl Reply {
    pub fn ok() -> Self {
        Self::Status("OK".to_string())
    }

    pub fn is_error(&self) -> bool {
        matches!(self, Self::Error(_))
    }

    /// Turns an error reply into a transport error, passing every other reply through.
    pub fn into_result(self) -> Result<Reply> {
        match self {
            Self::Error(message) => Err(StoreError::Transport(message)),
            other => Ok(other),
        }
    }

    pub fn into_integer(self) -> Result<i64> {
        match self.into_result()? {
            Self::Integer(value) => Ok(value),
            Self::Bulk(text) => text
                .parse()
                .map_err(|_| StoreError::transport(format!("expected integer reply, got {:?}", text))),
            other => Err(unexpected("integer", &other)),
        }
    }

    pub fn into_string(self) -> Result<String> {
        match self.into_result()? {
            Self::Bulk(text) | Self::Status(text) => Ok(text),
            Self::Integer(value) => Ok(value.to_string()),
            other => Err(unexpected("string", &other)),
        }
    }

    pub fn into_array(self) -> Result<Vec<Reply>> {
        match self.into_result()? {
            Self::Array(items) => Ok(items),
            Self::Nil => Ok(Vec::new()),
            other => Err(unexpected("array", &other)),
        }
    }

    pub fn into_strings(self) -> Result<Vec<String>> {
        self.into_array()?
            .into_iter()
            .map(Reply::into_string)
            .collect()
    }

    /// Interprets a flat `[field, value, field, value, ...]` reply as a map.
    pub fn into_field_map(self) -> Result<HashMap<String, String>> {
        let items = self.into_strings()?;
        if items.len() % 2 != 0 {
            return Err(StoreError::transport(format!(
                "expected an even number of hash entries, got {}",
                items.len()
            )));
        }

        let mut map = HashMap::with_capacity(items.len() / 2);
        let mut iter = items.into_iter();
        while let (Some(field), Some(value)) = (iter.next(), iter.next()) {
            map.insert(field, value);
        }
        Ok(map)
    }
}

fn unexpected(expected: &str, got: &Reply) -> StoreError {
    StoreError::transport(format!("expected {} reply, got {:?}", expected, got))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_float_wire_string_is_lossless() {
        let original = f64::from(1.234f32);
        let rendered = WireValue::Float(original).to_wire_string();
        let parsed: f64 = rendered.parse().unwrap();
        assert_eq!(parsed.to_bits(), original.to_bits());
        assert_eq!(parsed as f32, 1.234f32);
    }

    #[test]
    fn test_unsigned_renders_as_decimal() {
        assert_eq!(WireValue::Unsigned(u64::MAX).to_wire_string(), "18446744073709551615");
    }

    #[test]
    fn test_field_map_from_pairs() {
        let reply = Reply::Array(vec![
            Reply::Bulk("Name".into()),
            Reply::Bulk("Alan".into()),
            Reply::Bulk("Birthyear".into()),
            Reply::Bulk("1912".into()),
        ]);
        let map = reply.into_field_map().unwrap();
        assert_eq!(map.get("Name").map(String::as_str), Some("Alan"));
        assert_eq!(map.get("Birthyear").map(String::as_str), Some("1912"));
    }

    #[test]
    fn test_odd_field_map_is_rejected() {
        let reply = Reply::Array(vec![Reply::Bulk("Name".into())]);
        assert!(reply.into_field_map().is_err());
    }

    #[test]
    fn test_error_reply_becomes_transport_error() {
        let err = Reply::Error("WRONGTYPE".into()).into_integer().unwrap_err();
        assert!(matches!(err, StoreError::Transport(_)));
    }
}

use crate::core::{Result, StoreError};

/// Builds and parses storage keys of the form `[namespace ":"] type ":" id`.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct KeyCodec {
    namespace: Option<String>,
}

impl KeyCodec {
    pub fn new(namespace: Option<String>) -> Self {
        Self {
            namespace: namespace.filter(|ns| !ns.is_empty()),
        }
    }

    pub fn namespace(&self) -> Option<&str> {
        self.namespace.as_deref()
    }

    /// Leading segment shared by every key of `type_name`, separator included.
    pub fn prefix(&self, type_name: &str) -> String {
        match &self.namespace {
            Some(namespace) => format!("{}:{}:", namespace, type_name),
            None => format!("{}:", type_name),
        }
    }

    pub fn build(&self, type_name: &str, id: &str) -> Result<String> {
        if id.is_empty() {
            return Err(StoreError::EmptyKey {
                type_name: type_name.to_string(),
            });
        }
        let mut key = self.prefix(type_name);
        key.push_str(id);
        Ok(key)
    }

    /// Recovers the identity from a key returned by a scan.
    ///
    /// A key without the expected prefix means the scan filter matched
    /// something it should not have, so it is reported rather than skipped.
    pub fn strip_prefix(&self, key: &str, type_name: &str) -> Result<String> {
        let prefix = self.prefix(type_name);
        match key.strip_prefix(prefix.as_str()) {
            Some(id) if !id.is_empty() => Ok(id.to_string()),
            _ => Err(StoreError::UnexpectedKey {
                key: key.to_string(),
                prefix,
            }),
        }
    }

    /// Glob pattern matching every key of `type_name` in this namespace.
    pub fn scan_pattern(&self, type_name: &str) -> String {
        let prefix = self.prefix(type_name);
        let mut pattern = String::with_capacity(prefix.len() + 1);
        for c in prefix.chars() {
            if matches!(c, '*' | '?' | '[' | ']' | '\\') {
                pattern.push('\\');
            }
            pattern.push(c);
        }
        pattern.push('*');
        pattern
    }
}

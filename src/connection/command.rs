use crate::core::WireValue;
use std::fmt;

/// Commands understood by the store.
#[derive(Debug, Clone, PartialEq)]
pub enum Command {
    Ping,
    Auth { password: String },
    Select { index: u32 },
    HSet {
        key: String,
        field: String,
        value: WireValue,
    },
    HGetAll { key: String },
    Del { keys: Vec<String> },
    Scan {
        cursor: u64,
        pattern: Option<String>,
        count: Option<usize>,
    },
    Multi,
    Exec,
    Discard,
    FlushDb,
    DbSize,
}

impl Command {
    pub fn name(&self) -> &'static str {
        match self {
            Self::Ping => "PING",
            Self::Auth { .. } => "AUTH",
            Self::Select { .. } => "SELECT",
            Self::HSet { .. } => "HSET",
            Self::HGetAll { .. } => "HGETALL",
            Self::Del { .. } => "DEL",
            Self::Scan { .. } => "SCAN",
            Self::Multi => "MULTI",
            Self::Exec => "EXEC",
            Self::Discard => "DISCARD",
            Self::FlushDb => "FLUSHDB",
            Self::DbSize => "DBSIZE",
        }
    }

    pub fn hset(key: impl Into<String>, field: impl Into<String>, value: WireValue) -> Self {
        Self::HSet {
            key: key.into(),
            field: field.into(),
            value,
        }
    }

    pub fn hgetall(key: impl Into<String>) -> Self {
        Self::HGetAll { key: key.into() }
    }

    pub fn del<I, S>(keys: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self::Del {
            keys: keys.into_iter().map(Into::into).collect(),
        }
    }

    pub fn scan(cursor: u64, pattern: impl Into<String>, count: usize) -> Self {
        Self::Scan {
            cursor,
            pattern: Some(pattern.into()),
            count: Some(count),
        }
    }
}

impl fmt::Display for Command {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Auth { .. } => write!(f, "AUTH ***"),
            Self::Select { index } => write!(f, "SELECT {}", index),
            Self::HSet { key, field, value } => write!(f, "HSET {} {} {}", key, field, value),
            Self::HGetAll { key } => write!(f, "HGETALL {}", key),
            Self::Del { keys } => write!(f, "DEL {}", keys.join(" ")),
            Self::Scan {
                cursor,
                pattern,
                count,
            } => {
                write!(f, "SCAN {}", cursor)?;
                if let Some(pattern) = pattern {
                    write!(f, " MATCH {}", pattern)?;
                }
                if let Some(count) = count {
                    write!(f, " COUNT {}", count)?;
                }
                Ok(())
            }
            other => f.write_str(other.name()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_display_masks_password() {
        let auth = Command::Auth {
            password: "secret".into(),
        };
        assert_eq!(auth.to_string(), "AUTH ***");
    }

    #[test]
    fn test_scan_display() {
        let scan = Command::scan(17, "Hacker:*", 1024);
        assert_eq!(scan.to_string(), "SCAN 17 MATCH Hacker:* COUNT 1024");
    }
}

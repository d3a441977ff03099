use super::backend::Backend;
use super::command::Command;
use super::pattern::GlobMatcher;
use crate::core::{Reply, Result};
use async_trait::async_trait;
use std::collections::hash_map::Entry;
use std::collections::{BTreeMap, HashMap};
use tokio::sync::RwLock;

struct HashEntry {
    slot: u64,
    fields: HashMap<String, String>,
}

/// Keyspace of hashes.
///
/// Every key receives a slot number when it is created. SCAN walks slots in
/// ascending order and uses the next unvisited slot as its cursor, so a key
/// that lives through a whole scan is reported exactly once and a key created
/// or deleted mid-scan at most once.
#[derive(Default)]
struct Keyspace {
    entries: HashMap<String, HashEntry>,
    slots: BTreeMap<u64, String>,
    next_slot: u64,
}

impl Keyspace {
    fn query(&self, command: &Command) -> Reply {
        match command {
            Command::Ping => Reply::Status("PONG".to_string()),
            Command::HGetAll { key } => {
                let items = self
                    .entries
                    .get(key)
                    .map(|entry| {
                        entry
                            .fields
                            .iter()
                            .flat_map(|(field, value)| {
                                [Reply::Bulk(field.clone()), Reply::Bulk(value.clone())]
                            })
                            .collect()
                    })
                    .unwrap_or_default();
                Reply::Array(items)
            }
            Command::Scan {
                cursor,
                pattern,
                count,
            } => self.scan(*cursor, pattern.as_deref(), count.unwrap_or(10)),
            Command::DbSize => Reply::Integer(self.entries.len() as i64),
            Command::Select { index: 0 } => Reply::ok(),
            Command::Select { .. } => Reply::Error("ERR DB index is out of range".to_string()),
            other => Reply::Error(format!("ERR {} is not a read command", other.name())),
        }
    }

    fn apply(&mut self, command: &Command) -> Reply {
        match command {
            Command::HSet { key, field, value } => {
                let entry = self.entry_mut(key);
                let created = entry
                    .fields
                    .insert(field.clone(), value.to_wire_string())
                    .is_none();
                Reply::Integer(i64::from(created))
            }
            Command::Del { keys } => {
                if keys.is_empty() {
                    return Reply::Error(
                        "ERR wrong number of arguments for 'del' command".to_string(),
                    );
                }
                let removed = keys.iter().filter(|key| self.remove(key)).count();
                Reply::Integer(removed as i64)
            }
            Command::FlushDb => {
                self.entries.clear();
                self.slots.clear();
                Reply::ok()
            }
            Command::Multi | Command::Exec | Command::Discard => Reply::Error(format!(
                "ERR {} is handled by the connection",
                command.name()
            )),
            other => self.query(other),
        }
    }

    fn entry_mut(&mut self, key: &str) -> &mut HashEntry {
        match self.entries.entry(key.to_string()) {
            Entry::Occupied(entry) => entry.into_mut(),
            Entry::Vacant(entry) => {
                self.next_slot += 1;
                self.slots.insert(self.next_slot, key.to_string());
                entry.insert(HashEntry {
                    slot: self.next_slot,
                    fields: HashMap::new(),
                })
            }
        }
    }

    fn remove(&mut self, key: &str) -> bool {
        match self.entries.remove(key) {
            Some(entry) => {
                self.slots.remove(&entry.slot);
                true
            }
            None => false,
        }
    }

    fn scan(&self, cursor: u64, pattern: Option<&str>, count: usize) -> Reply {
        if count == 0 {
            return Reply::Error("ERR syntax error".to_string());
        }
        let matcher = match GlobMatcher::new(pattern) {
            Ok(matcher) => matcher,
            Err(err) => return Reply::Error(format!("ERR {}", err)),
        };

        let mut visited = self.slots.range(cursor..);
        let mut keys = Vec::new();
        for (_, key) in visited.by_ref().take(count) {
            if matcher.matches(key) {
                keys.push(Reply::Bulk(key.clone()));
            }
        }
        // slots start at 1, so 0 is free to mean "done"
        let next = visited.next().map(|(slot, _)| *slot).unwrap_or(0);

        Reply::Array(vec![Reply::Bulk(next.to_string()), Reply::Array(keys)])
    }
}

fn is_read_only(command: &Command) -> bool {
    matches!(
        command,
        Command::Ping
            | Command::Select { .. }
            | Command::HGetAll { .. }
            | Command::Scan { .. }
            | Command::DbSize
    )
}

/// In-process store backend holding hashes under string keys.
#[derive(Default)]
pub struct MemoryBackend {
    keyspace: RwLock<Keyspace>,
    password: Option<String>,
}

impl MemoryBackend {
    pub fn new() -> Self {
        Self::default()
    }

    /// Requires clients to authenticate with `password`.
    pub fn with_password(password: impl Into<String>) -> Self {
        Self {
            keyspace: RwLock::new(Keyspace::default()),
            password: Some(password.into()),
        }
    }

    fn authenticate(&self, given: &str) -> Reply {
        match &self.password {
            Some(expected) if expected == given => Reply::ok(),
            Some(_) => Reply::Error("WRONGPASS invalid password".to_string()),
            None => Reply::Error("ERR AUTH called without any password configured".to_string()),
        }
    }
}

#[async_trait]
impl Backend for MemoryBackend {
    async fn execute(&self, command: &Command) -> Result<Reply> {
        if let Command::Auth { password } = command {
            return Ok(self.authenticate(password));
        }

        if is_read_only(command) {
            let keyspace = self.keyspace.read().await;
            return Ok(keyspace.query(command));
        }

        let mut keyspace = self.keyspace.write().await;
        Ok(keyspace.apply(command))
    }

    async fn execute_batch(&self, commands: &[Command]) -> Result<Vec<Reply>> {
        let mut keyspace = self.keyspace.write().await;
        Ok(commands
            .iter()
            .map(|command| match command {
                Command::Auth { password } => self.authenticate(password),
                other => keyspace.apply(other),
            })
            .collect())
    }
}

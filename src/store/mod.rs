pub mod config;
pub mod cursor;

use crate::connection::backend::Backend;
use crate::connection::command::Command;
use crate::connection::memory::MemoryBackend;
use crate::connection::pool::{ConnectionPool, PoolGuard};
use crate::core::{Reply, Result, StoreError};
use crate::mapping::{Entity, FieldMapper, FlatFieldMap, IdentityAllocator, KeyCodec, UuidAllocator};
use config::StoreConfig;
use cursor::ScanCursor;
use std::collections::HashSet;
use std::sync::Arc;
use tracing::{Instrument, debug, info_span};

/// Maps entities onto hashes in the store.
///
/// Each entity lives under `[namespace:]Type:id` as a hash with one field
/// per mapped struct field. Every operation borrows one pooled connection
/// for its whole duration and holds no state between calls, so a single
/// store can be shared by concurrent callers.
///
/// # Examples
///
/// ```
/// use hashstore::{Entity, EntityStore, StoreConfig};
///
/// #[derive(Entity, Default, Debug, PartialEq)]
/// struct Hacker {
///     #[entity(key)]
///     pub id: String,
///     pub name: String,
///     pub birthyear: i32,
/// }
///
/// # #[tokio::main]
/// # async fn main() -> hashstore::Result<()> {
/// let store = EntityStore::in_memory(StoreConfig::new()).await?;
///
/// let mut alan = Hacker { name: "Alan Turing".into(), birthyear: 1912, ..Default::default() };
/// store.write(&mut alan).await?;
///
/// let mut hackers: Vec<Hacker> = store.list().await?;
/// store.read_multiple(&mut hackers).await?;
/// assert_eq!(hackers, vec![alan]);
/// # Ok(())
/// # }
/// ```
pub struct EntityStore<A: IdentityAllocator = UuidAllocator> {
    pool: Arc<ConnectionPool>,
    keys: KeyCodec,
    scan_count: usize,
    allocator: A,
}

impl EntityStore<UuidAllocator> {
    /// Builds a store over a pool owned by the caller.
    pub fn new(pool: Arc<ConnectionPool>, config: &StoreConfig) -> Result<Self> {
        config.validate()?;
        Ok(Self {
            pool,
            keys: KeyCodec::new(config.namespace.clone()),
            scan_count: config.scan_count,
            allocator: UuidAllocator,
        })
    }

    /// Creates a pool over `backend` from `config.connection` and wraps it.
    pub async fn connect(config: StoreConfig, backend: Arc<dyn Backend>) -> Result<Self> {
        config.validate()?;
        let pool = ConnectionPool::new(config.connection.clone(), backend).await?;
        Self::new(Arc::new(pool), &config)
    }

    /// A store backed by a fresh in-process keyspace.
    pub async fn in_memory(config: StoreConfig) -> Result<Self> {
        Self::connect(config, Arc::new(MemoryBackend::new())).await
    }
}

impl<A: IdentityAllocator> EntityStore<A> {
    /// Replaces the identity allocator used for records written without a key.
    pub fn with_allocator<B: IdentityAllocator>(self, allocator: B) -> EntityStore<B> {
        EntityStore {
            pool: self.pool,
            keys: self.keys,
            scan_count: self.scan_count,
            allocator,
        }
    }

    pub fn pool(&self) -> &Arc<ConnectionPool> {
        &self.pool
    }

    pub fn key_codec(&self) -> &KeyCodec {
        &self.keys
    }

    /// Storage key of `item`, failing when it has no identity yet.
    pub fn key_for<E: Entity>(&self, item: &E) -> Result<String> {
        self.keys.build(E::type_name(), item.key())
    }

    async fn connection(&self) -> Result<PoolGuard> {
        self.pool.get_connection().await
    }

    /// Writes every mapped field of `item`, assigning a new identity first
    /// when its key is empty.
    ///
    /// Fields are set one command each, pipelined over one connection. A
    /// field that cannot be encoded, or an entity with no mapped fields,
    /// fails the call before anything is sent. Writes are not rolled back if
    /// the store rejects one of the commands.
    pub async fn write<E: Entity>(&self, item: &mut E) -> Result<()> {
        self.assign_key(item);
        let fields = encode_fields(item)?;
        let key = self.key_for(item)?;

        let mut conn = self.connection().await?;
        let sent = fields.len();
        send_fields(&mut conn, &key, fields)?;
        conn.flush().await?;
        receive_replies(&mut conn, sent).await?;

        debug!(type_name = E::type_name(), %key, fields = sent, "write");
        Ok(())
    }

    /// Writes a batch of records in one MULTI/EXEC round trip.
    ///
    /// Identities are assigned and every record is encoded before the first
    /// command is sent, so a conversion failure leaves the store untouched.
    pub async fn write_multiple<E: Entity>(&self, items: &mut [E]) -> Result<()> {
        let mut batch = Vec::with_capacity(items.len());
        for item in items.iter_mut() {
            self.assign_key(item);
            let fields = encode_fields(item)?;
            batch.push((self.key_for(item)?, fields));
        }
        if batch.is_empty() {
            return Ok(());
        }

        let mut conn = self.connection().await?;
        conn.send(Command::Multi)?;
        let mut sent = 0;
        for (key, fields) in batch {
            sent += fields.len();
            send_fields(&mut conn, &key, fields)?;
        }
        conn.flush().await?;

        let replies = conn.do_command(Command::Exec).await?.into_array()?;
        if replies.len() != sent {
            return Err(StoreError::transport(format!(
                "EXEC returned {} replies for {} commands",
                replies.len(),
                sent
            )));
        }
        for reply in replies {
            reply.into_result()?;
        }

        debug!(type_name = E::type_name(), records = items.len(), fields = sent, "write_multiple");
        Ok(())
    }

    /// Loads the stored fields of `item`, located by its key.
    ///
    /// Fails with `EmptyKey` when the key is empty and `NotFound` when the
    /// store holds nothing for it.
    pub async fn read<E: Entity>(&self, item: &mut E) -> Result<()> {
        let key = self.key_for(item)?;

        let mut conn = self.connection().await?;
        let stored = conn
            .do_command(Command::hgetall(&key))
            .await?
            .into_field_map()?;
        drop(conn);

        if stored.is_empty() {
            return Err(StoreError::NotFound { key });
        }
        debug!(type_name = E::type_name(), %key, fields = stored.len(), "read");
        FieldMapper::decode(&stored, item)
    }

    /// Loads every record of `items` in one pipelined round trip.
    ///
    /// Position `i` of the result always belongs to position `i` of the
    /// input. Each element is rebuilt from its zero value and its key. The
    /// whole batch fails before any network call when one key is empty, and
    /// fails without touching `items` when one record is missing or cannot
    /// be decoded.
    pub async fn read_multiple<E: Entity>(&self, items: &mut [E]) -> Result<()> {
        let keys = items
            .iter()
            .map(|item| self.key_for(item))
            .collect::<Result<Vec<_>>>()?;
        if keys.is_empty() {
            return Ok(());
        }

        let mut conn = self.connection().await?;
        conn.send(Command::Multi)?;
        for key in &keys {
            conn.send(Command::hgetall(key))?;
        }
        conn.flush().await?;
        let replies = conn.do_command(Command::Exec).await?.into_array()?;
        drop(conn);

        if replies.len() != keys.len() {
            return Err(StoreError::transport(format!(
                "EXEC returned {} replies for {} keys",
                replies.len(),
                keys.len()
            )));
        }

        let mut loaded = Vec::with_capacity(items.len());
        for ((item, key), reply) in items.iter().zip(&keys).zip(replies) {
            let stored = reply.into_field_map()?;
            if stored.is_empty() {
                return Err(StoreError::NotFound { key: key.clone() });
            }
            let mut fresh = E::default();
            fresh.set_key(item.key().to_string());
            FieldMapper::decode(&stored, &mut fresh)?;
            loaded.push(fresh);
        }

        for (item, fresh) in items.iter_mut().zip(loaded) {
            *item = fresh;
        }
        debug!(type_name = E::type_name(), records = keys.len(), "read_multiple");
        Ok(())
    }

    /// Deletes the record stored under `item`'s key.
    pub async fn delete<E: Entity>(&self, item: &E) -> Result<()> {
        let key = self.key_for(item)?;

        let mut conn = self.connection().await?;
        let removed = conn
            .do_command(Command::del([key.as_str()]))
            .await?
            .into_integer()?;

        debug!(type_name = E::type_name(), %key, removed, "delete");
        if removed == 0 {
            return Err(StoreError::NotFound { key });
        }
        Ok(())
    }

    /// Deletes the records of `items` in one command and returns how many
    /// were removed.
    ///
    /// Records with an empty key are skipped. When fewer keys are removed
    /// than requested, the removed ones stay deleted and the call fails with
    /// `PartialDelete`, whose [`StoreError::deleted`] carries the count.
    pub async fn delete_multiple<E: Entity>(&self, items: &[E]) -> Result<usize> {
        let mut seen = HashSet::new();
        let mut keys = Vec::new();
        for item in items.iter().filter(|item| !item.key().is_empty()) {
            let key = self.key_for(item)?;
            if seen.insert(key.clone()) {
                keys.push(key);
            }
        }
        if keys.is_empty() {
            return Ok(0);
        }

        let requested = keys.len();
        let mut conn = self.connection().await?;
        let removed = conn
            .do_command(Command::Del { keys })
            .await?
            .into_integer()?;
        let deleted = usize::try_from(removed)
            .map_err(|_| StoreError::transport(format!("DEL returned {}", removed)))?;

        debug!(type_name = E::type_name(), requested, deleted, "delete_multiple");
        if deleted < requested {
            return Err(StoreError::PartialDelete { deleted, requested });
        }
        Ok(deleted)
    }

    /// Enumerates every stored record of type `E`.
    ///
    /// Only identities are filled in; follow up with [`read`](Self::read)
    /// or [`read_multiple`](Self::read_multiple) to load fields.
    pub async fn list<E: Entity>(&self) -> Result<Vec<E>> {
        let mut items = Vec::new();
        self.list_into(&mut items).await?;
        Ok(items)
    }

    /// Like [`list`](Self::list), reusing the caller's vector. Its previous
    /// contents are replaced and its length set to the number of records.
    pub async fn list_into<E: Entity>(&self, items: &mut Vec<E>) -> Result<()> {
        let type_name = E::type_name();
        let keys = self
            .scan_keys(type_name)
            .instrument(info_span!("hashstore.list", type_name))
            .await?;

        let ids = keys
            .iter()
            .map(|key| self.keys.strip_prefix(key, type_name))
            .collect::<Result<Vec<_>>>()?;

        items.clear();
        items.reserve_exact(ids.len());
        items.extend(ids.into_iter().map(|id| {
            let mut item = E::default();
            item.set_key(id);
            item
        }));
        Ok(())
    }

    /// Drives SCAN until the store reports the end of the keyspace.
    async fn scan_keys(&self, type_name: &str) -> Result<Vec<String>> {
        let pattern = self.keys.scan_pattern(type_name);
        let mut conn = self.connection().await?;

        let mut cursor = ScanCursor::NotStarted;
        let mut seen = HashSet::new();
        let mut keys = Vec::new();
        let mut pages = 0usize;
        while let Some(request) = cursor.request() {
            let reply = conn
                .do_command(Command::scan(request, pattern.as_str(), self.scan_count))
                .await?;
            let (next, page) = parse_scan_reply(reply)?;
            pages += 1;

            // the store may repeat a key across pages
            keys.extend(page.into_iter().filter(|key| seen.insert(key.clone())));
            cursor = cursor.advance(next);
        }

        debug!(%pattern, pages, keys = keys.len(), "scan complete");
        Ok(keys)
    }

    fn assign_key<E: Entity>(&self, item: &mut E) {
        if item.key().is_empty() {
            item.set_key(self.allocator.allocate());
        }
    }
}

/// An empty hash is never stored, so an entity without fields could not be
/// read back.
fn encode_fields<E: Entity>(item: &E) -> Result<FlatFieldMap> {
    let fields = FieldMapper::encode(item)?;
    if fields.is_empty() {
        return Err(StoreError::NoFields {
            type_name: E::type_name().to_string(),
        });
    }
    Ok(fields)
}

fn send_fields(conn: &mut PoolGuard, key: &str, fields: FlatFieldMap) -> Result<()> {
    for (field, value) in fields {
        conn.send(Command::hset(key, field, value))?;
    }
    Ok(())
}

/// Reads `count` pipelined replies, returning the first error after all of
/// them are consumed.
async fn receive_replies(conn: &mut PoolGuard, count: usize) -> Result<()> {
    let mut first_error = None;
    for _ in 0..count {
        if let Err(err) = conn.receive().await.and_then(Reply::into_result) {
            first_error.get_or_insert(err);
        }
    }
    match first_error {
        Some(err) => Err(err),
        None => Ok(()),
    }
}

/// Splits a SCAN reply into the next cursor and the page of keys.
fn parse_scan_reply(reply: Reply) -> Result<(u64, Vec<String>)> {
    let mut parts = reply.into_array()?.into_iter();
    let (Some(cursor), Some(page), None) = (parts.next(), parts.next(), parts.next()) else {
        return Err(StoreError::transport("SCAN reply must have two elements"));
    };

    let cursor = cursor.into_string()?;
    let cursor = cursor
        .parse()
        .map_err(|_| StoreError::transport(format!("invalid SCAN cursor {:?}", cursor)))?;
    Ok((cursor, page.into_strings()?))
}

//! In-process session store.
//!
//! Values are kept in their serialized form so that reads and writes go
//! through the same encoding as the Redis store.

use async_trait::async_trait;
use std::collections::BTreeMap;
use std::ops::Bound;
use stellvia_core::SessionKey;
use tokio::sync::RwLock;

use crate::config::SessionStoreConfig;
use crate::error::StoreError;
use crate::record::SessionRecord;
use crate::store::{
    ScanCursor, ScanPage, SessionStore, StoredSession, decode_record, encode_record,
};

/// A session store backed by an in-memory map.
#[derive(Debug, Default)]
pub struct InMemorySessionStore {
    config: SessionStoreConfig,
    entries: RwLock<BTreeMap<String, String>>,
}

impl InMemorySessionStore {
    /// Creates an empty store with the default key prefix.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates an empty store with the given configuration.
    #[must_use]
    pub fn with_config(config: SessionStoreConfig) -> Self {
        Self {
            config,
            entries: RwLock::new(BTreeMap::new()),
        }
    }

    /// Stores a raw value under a session, bypassing encoding.
    pub async fn insert_raw(&self, key: &SessionKey, value: impl Into<String>) {
        let store_key = key.storage_key(&self.config.key_prefix);
        self.entries.write().await.insert(store_key, value.into());
    }

    /// Returns the number of stored records.
    pub async fn len(&self) -> usize {
        self.entries.read().await.len()
    }

    /// Returns true if nothing is stored.
    pub async fn is_empty(&self) -> bool {
        self.entries.read().await.is_empty()
    }
}

#[async_trait]
impl SessionStore for InMemorySessionStore {
    async fn get(&self, key: &SessionKey) -> Result<Option<SessionRecord>, StoreError> {
        let store_key = key.storage_key(&self.config.key_prefix);
        let entries = self.entries.read().await;
        entries
            .get(&store_key)
            .map(|value| decode_record(&store_key, value))
            .transpose()
    }

    async fn put(&self, key: &SessionKey, record: &SessionRecord) -> Result<(), StoreError> {
        let value = encode_record(record)?;
        let store_key = key.storage_key(&self.config.key_prefix);
        self.entries.write().await.insert(store_key, value);
        Ok(())
    }

    async fn delete(&self, key: &SessionKey) -> Result<(), StoreError> {
        let store_key = key.storage_key(&self.config.key_prefix);
        self.entries.write().await.remove(&store_key);
        Ok(())
    }

    async fn scan(&self, cursor: &ScanCursor, limit: usize) -> Result<ScanPage, StoreError> {
        let prefix = &self.config.key_prefix;
        let entries = self.entries.read().await;
        let lower = match cursor.position() {
            Some(position) => Bound::Excluded(position.to_string()),
            None => Bound::Unbounded,
        };

        let mut sessions = Vec::new();
        let mut last = None;
        for (store_key, value) in entries
            .range::<String, _>((lower, Bound::Unbounded))
            .take(limit.max(1))
        {
            last = Some(store_key);
            let Some(key) = SessionKey::from_storage_key(prefix, store_key) else {
                continue;
            };
            match decode_record(store_key, value) {
                Ok(record) => sessions.push(StoredSession { key, record }),
                Err(e) => tracing::warn!(error = %e, "skipping unreadable session record"),
            }
        }

        let next = match last {
            Some(last)
                if entries
                    .range::<String, _>((Bound::Excluded(last.clone()), Bound::Unbounded))
                    .next()
                    .is_some() =>
            {
                ScanCursor::resume(last.clone())
            }
            _ => ScanCursor::start(),
        };
        Ok(ScanPage { sessions, next })
    }

    async fn ping(&self) -> Result<(), StoreError> {
        Ok(())
    }
}

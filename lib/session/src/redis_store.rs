//! Redis-backed session store.
//!
//! Records are stored as JSON strings under `<prefix>:<session key>` using
//! plain `GET`/`SET`/`DEL`. Sweeps enumerate records with a cursor `SCAN`
//! that the caller carries from one page to the next.

use async_trait::async_trait;
use redis::aio::MultiplexedConnection;
use redis::{Client, RedisError, RedisResult};
use rootcause::prelude::Report;
use stellvia_core::SessionKey;
use tracing::{debug, info, instrument, warn};

use crate::config::SessionStoreConfig;
use crate::error::StoreError;
use crate::record::SessionRecord;
use crate::store::{
    ScanCursor, ScanPage, SessionStore, StoredSession, decode_record, encode_record,
};

/// Keys requested per `SCAN` round trip.
const SCAN_BATCH: usize = 200;

/// Session store backed by a Redis server.
#[derive(Clone)]
pub struct RedisSessionStore {
    conn: MultiplexedConnection,
    config: SessionStoreConfig,
}

impl std::fmt::Debug for RedisSessionStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RedisSessionStore")
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}

impl RedisSessionStore {
    /// Connects to Redis and verifies the connection with `PING`.
    ///
    /// There is no degraded mode without a store, so callers treat an
    /// error here as fatal.
    pub async fn connect(
        redis_url: &str,
        config: SessionStoreConfig,
    ) -> Result<Self, Report<StoreError>> {
        let client = Client::open(redis_url).map_err(|e| StoreError::Connection {
            details: format!("invalid redis url: {e}"),
        })?;
        let conn = client
            .get_multiplexed_async_connection()
            .await
            .map_err(to_store_error)?;

        let store = Self { conn, config };
        store.ping().await?;

        info!(prefix = %store.config.key_prefix, "connected to session store");
        Ok(store)
    }

    fn store_key(&self, key: &SessionKey) -> String {
        key.storage_key(&self.config.key_prefix)
    }

    /// Collects about `limit` keys matching the session prefix, starting at
    /// `cursor`, and returns them with the cursor to resume from.
    ///
    /// Whole `SCAN` batches are kept so no key is stepped over; a page may
    /// exceed `limit` by up to one batch.
    async fn scan_keys(&self, cursor: u64, limit: usize) -> Result<(Vec<String>, u64), StoreError> {
        let mut conn = self.conn.clone();
        let pattern = self.config.scan_pattern();
        let mut cursor = cursor;
        let mut keys: Vec<String> = Vec::new();

        loop {
            let page: RedisResult<(u64, Vec<String>)> = scan_command(cursor, &pattern)
                .query_async(&mut conn)
                .await;
            let (next, batch) = page.map_err(to_store_error)?;
            cursor = next;

            for key in batch {
                // SCAN may return a key more than once.
                if !keys.contains(&key) {
                    keys.push(key);
                }
            }

            if cursor == 0 || keys.len() >= limit {
                break;
            }
        }

        Ok((keys, cursor))
    }

    async fn get_raw(&self, store_key: &str) -> Result<Option<String>, StoreError> {
        let mut conn = self.conn.clone();
        let value: RedisResult<Option<String>> = redis::cmd("GET")
            .arg(store_key)
            .query_async(&mut conn)
            .await;
        value.map_err(to_store_error)
    }
}

/// Builds one `SCAN` round trip over the session keys.
fn scan_command(cursor: u64, pattern: &str) -> redis::Cmd {
    let mut cmd = redis::cmd("SCAN");
    cmd.arg(cursor)
        .arg("MATCH")
        .arg(pattern)
        .arg("COUNT")
        .arg(SCAN_BATCH);
    cmd
}

/// Maps a `SCAN` cursor onto the store-neutral form; `0` is the start.
fn to_scan_cursor(cursor: u64) -> ScanCursor {
    if cursor == 0 {
        ScanCursor::start()
    } else {
        ScanCursor::resume(cursor.to_string())
    }
}

/// Reads a `SCAN` cursor back; anything unreadable restarts the pass.
fn from_scan_cursor(cursor: &ScanCursor) -> u64 {
    cursor
        .position()
        .and_then(|p| p.parse().ok())
        .unwrap_or(0)
}

/// Builds the `SET` command for a record, with expiry when configured.
fn set_command(store_key: &str, value: &str, ttl: Option<u64>) -> redis::Cmd {
    let mut cmd = redis::cmd("SET");
    cmd.arg(store_key).arg(value);
    if let Some(ttl) = ttl {
        cmd.arg("EX").arg(ttl);
    }
    cmd
}

fn to_store_error(e: RedisError) -> StoreError {
    if e.is_io_error() || e.is_connection_refusal() || e.is_connection_dropped() || e.is_timeout()
    {
        StoreError::Connection {
            details: e.to_string(),
        }
    } else {
        StoreError::Command {
            details: e.to_string(),
        }
    }
}

#[async_trait]
impl SessionStore for RedisSessionStore {
    #[instrument(skip_all, fields(session = %key))]
    async fn get(&self, key: &SessionKey) -> Result<Option<SessionRecord>, StoreError> {
        let store_key = self.store_key(key);
        self.get_raw(&store_key)
            .await?
            .map(|value| decode_record(&store_key, &value))
            .transpose()
    }

    #[instrument(skip_all, fields(session = %key, status = %record.status()))]
    async fn put(&self, key: &SessionKey, record: &SessionRecord) -> Result<(), StoreError> {
        let value = encode_record(record)?;
        let mut conn = self.conn.clone();
        let reply: RedisResult<()> = set_command(&self.store_key(key), &value, self.config.ttl())
            .query_async(&mut conn)
            .await;
        reply.map_err(to_store_error)
    }

    #[instrument(skip_all, fields(session = %key))]
    async fn delete(&self, key: &SessionKey) -> Result<(), StoreError> {
        let mut conn = self.conn.clone();
        let removed: RedisResult<i64> = redis::cmd("DEL")
            .arg(self.store_key(key))
            .query_async(&mut conn)
            .await;
        let removed = removed.map_err(to_store_error)?;
        debug!(removed, "deleted session record");
        Ok(())
    }

    #[instrument(skip_all, fields(limit = limit))]
    async fn scan(&self, cursor: &ScanCursor, limit: usize) -> Result<ScanPage, StoreError> {
        let (keys, next) = self.scan_keys(from_scan_cursor(cursor), limit).await?;
        let mut sessions = Vec::with_capacity(keys.len());

        for store_key in keys {
            let Some(key) = SessionKey::from_storage_key(&self.config.key_prefix, &store_key)
            else {
                continue;
            };
            // The key may have been deleted between SCAN and GET.
            let Some(value) = self.get_raw(&store_key).await? else {
                continue;
            };
            match decode_record(&store_key, &value) {
                Ok(record) => sessions.push(StoredSession { key, record }),
                Err(e) => warn!(error = %e, "skipping unreadable session record"),
            }
        }

        Ok(ScanPage {
            sessions,
            next: to_scan_cursor(next),
        })
    }

    async fn ping(&self) -> Result<(), StoreError> {
        let mut conn = self.conn.clone();
        let pong: RedisResult<String> = redis::cmd("PING").query_async(&mut conn).await;
        pong.map(|_| ()).map_err(to_store_error)
    }
}

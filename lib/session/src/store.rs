//! The shared session store abstraction.
//!
//! Every operation touches exactly one key and replaces or removes the
//! whole record, so concurrent writers resolve as last-writer-wins without
//! ever producing a half-updated record.

use async_trait::async_trait;
use stellvia_core::SessionKey;

use crate::error::StoreError;
use crate::record::SessionRecord;

/// A record found by a scan, with the session it belongs to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoredSession {
    /// The session identity.
    pub key: SessionKey,
    /// The record as stored at scan time.
    pub record: SessionRecord,
}

/// Position of a resumable scan. Opaque outside the store that made it.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ScanCursor(Option<String>);

impl ScanCursor {
    /// The beginning of the key space.
    #[must_use]
    pub fn start() -> Self {
        Self(None)
    }

    /// Resumes after a store-specific position.
    #[must_use]
    pub fn resume(position: impl Into<String>) -> Self {
        Self(Some(position.into()))
    }

    /// Returns true if this cursor points at the beginning.
    #[must_use]
    pub fn is_start(&self) -> bool {
        self.0.is_none()
    }

    /// Returns the store-specific position, if any.
    #[must_use]
    pub fn position(&self) -> Option<&str> {
        self.0.as_deref()
    }
}

/// One page of a scan.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScanPage {
    /// Decodable records found on this page.
    pub sessions: Vec<StoredSession>,
    /// Where the next page starts.
    pub next: ScanCursor,
}

/// Key-value storage for session records.
#[async_trait]
pub trait SessionStore: Send + Sync {
    /// Reads the record for a session. `Ok(None)` means `Unknown`.
    async fn get(&self, key: &SessionKey) -> Result<Option<SessionRecord>, StoreError>;

    /// Replaces the record for a session.
    async fn put(&self, key: &SessionKey, record: &SessionRecord) -> Result<(), StoreError>;

    /// Removes the record for a session. Removing an absent key succeeds.
    async fn delete(&self, key: &SessionKey) -> Result<(), StoreError>;

    /// Lists stored sessions starting at `cursor`, examining about `limit`
    /// keys.
    ///
    /// Passing each returned cursor back in walks the whole key space; a
    /// page whose cursor is back at the start ends a full pass. Values that
    /// cannot be decoded are skipped, so a single bad record cannot stall a
    /// sweep.
    async fn scan(&self, cursor: &ScanCursor, limit: usize) -> Result<ScanPage, StoreError>;

    /// Checks that the store is reachable.
    async fn ping(&self) -> Result<(), StoreError>;
}

/// Serializes a record into its stored JSON form.
///
/// # Errors
///
/// Returns an error if serialization fails.
pub fn encode_record(record: &SessionRecord) -> Result<String, StoreError> {
    serde_json::to_string(record).map_err(|e| StoreError::Encode {
        details: e.to_string(),
    })
}

/// Parses a stored JSON value into a record.
///
/// # Errors
///
/// Returns `StoreError::Decode` if the value is not a valid record.
pub fn decode_record(store_key: &str, value: &str) -> Result<SessionRecord, StoreError> {
    serde_json::from_str(value).map_err(|e| StoreError::Decode {
        key: store_key.to_string(),
        details: e.to_string(),
    })
}

//! Session records and the shared session store.
//!
//! This crate provides:
//! - `SessionRecord`: the per-identity authorization record (`Anonymous`
//!   with a login token, or `Authorized` with a token pair) plus optional
//!   multi-step input scratch state
//! - `SessionStore`: atomic single-key get/put/delete and a bounded scan
//! - `RedisSessionStore` for production and `InMemorySessionStore` for
//!   tests and embedding
//!
//! An absent key is the `Unknown` status. Absence is never an error.
//!
//! # Example
//!
//! ```
//! use stellvia_core::{LoginToken, SessionKey};
//! use stellvia_session::{SessionRecord, SessionStatus};
//!
//! let record = SessionRecord::anonymous(LoginToken::new());
//! assert_eq!(record.status(), SessionStatus::Anonymous);
//! assert!(record.credentials().is_none());
//!
//! let key = SessionKey::from(42_i64);
//! assert_eq!(key.storage_key("session"), "session:42");
//! ```

pub mod config;
pub mod error;
pub mod memory;
pub mod record;
pub mod redis_store;
pub mod store;

pub use config::SessionStoreConfig;
pub use error::{RecordError, StoreError};
pub use memory::InMemorySessionStore;
pub use record::{AuthState, Credentials, PendingFlow, PendingLogin, SessionRecord, SessionStatus};
pub use redis_store::RedisSessionStore;
pub use store::{
    ScanCursor, ScanPage, SessionStore, StoredSession, decode_record, encode_record,
};

//! Field Ops session state (client-local persistence).
//!
//! Keeps in-progress audits and navigation state under durable keys so a
//! restart resumes exactly where the user left off.

mod error;
pub mod kv;
pub mod nav;
pub mod snapshot;

pub use error::{Result, SessionError};
pub use kv::{FileKeyStore, KeyValueStore, MemoryKeyStore};
pub use nav::{NavState, NAV_KEY};
pub use snapshot::{
    audit_key, degrade, AuditPhase, AuditSnapshot, PersistOutcome, SessionStore, AUDIT_KEY_PREFIX,
};

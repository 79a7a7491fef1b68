//! Field Ops test utilities.
//!
//! In-memory stand-ins for the backing service plus small media fixtures.
//!
//! # Usage
//!
//! ```rust,ignore
//! use fieldops_test_utils::{MemoryBackend, fixtures};
//!
//! #[tokio::test]
//! async fn test_submit() {
//!     let backend = MemoryBackend::new();
//!     let db = backend.db();
//!     backend.remove_bucket("field-ops-photos");
//!     // ...
//!     assert_eq!(backend.upload_count(), 0);
//! }
//! ```

pub mod fixtures;
pub mod memory;

pub use memory::{FailureKind, MemoryBackend, Operation};

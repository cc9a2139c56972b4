//! # lumen-store: Storage Layer for Lumen POS
//!
//! One [`Storage`] contract, two structurally different backends, and a
//! factory that picks between them. Everything above this crate is
//! storage-agnostic.
//!
//! ## Responsibility Split
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────┐
//! │  ✅ THIS CRATE                        ❌ NOT THIS CRATE             │
//! │  ──────────────────────────────       ───────────────────────────   │
//! │  • The Storage contract               • Business rules (lumen-core) │
//! │  • SQLite backend (WAL, migrations)   • Checkout math               │
//! │  • Memory object-store backend        • Auth decisions              │
//! │  • Backend selection + fallback       • UI formatting               │
//! │  • Batch (transactional) execution                                  │
//! │  • Uniform audit retention                                          │
//! └─────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Atomicity Contract
//! [`Storage::execute_batch`] is documented all-or-nothing. The SQLite
//! backend honors it with a real transaction; the memory backend applies
//! ops sequentially without rollback. The conformance suite
//! (`tests/conformance.rs`) runs the same assertions against both
//! backends so the gap stays measured instead of anecdotal.

pub mod contract;
pub mod error;
pub mod factory;
pub mod memory;
pub mod retention;
pub mod sqlite;

pub use contract::{Storage, WriteBatch, WriteOp};
pub use error::{StoreError, StoreResult};
pub use factory::{open_store, BackendKind, StoreConfig};
pub use memory::{MemoryConfig, MemoryStore};
pub use retention::RetentionPolicy;
pub use sqlite::{SqliteConfig, SqliteStore};

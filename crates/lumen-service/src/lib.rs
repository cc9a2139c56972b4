//! # lumen-service: Checkout & Auth Services for Lumen POS
//!
//! The orchestration layer between the pure core and the storage
//! contract.
//!
//! ## Startup Sequence (for host applications)
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────┐
//! │  1. init_tracing()                                                  │
//! │  2. let store = lumen_store::open_store(config).await               │
//! │  3. let checkout = CheckoutProcessor::new(store.clone(), policy)    │
//! │  4. let auth = AuthManager::new(store.clone())                      │
//! │  5. inject all three wherever the UI needs them                     │
//! │                                                                     │
//! │  One construction at startup, explicit injection everywhere -       │
//! │  there is no global get_instance() anywhere in this workspace.      │
//! └─────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## What Lives Here
//! - [`CheckoutProcessor`]: cart → validated → one atomic write batch →
//!   [`Receipt`], plus void-with-stock-restore
//! - [`AuthManager`]: login/logout, session cache and recovery,
//!   permission checks, user management, best-effort audit trail
//! - [`CatalogService`]: validated product management, restock, and the
//!   barcode-scan SKU lookup
//! - [`telemetry::init_tracing`]: tracing bootstrap for hosts without
//!   their own subscriber

pub mod auth;
pub mod catalog;
pub mod checkout;
pub mod error;
pub mod receipt;
pub mod telemetry;

pub use auth::{ActiveSession, AuthManager, NewUser, SESSION_LIFETIME_HOURS};
pub use catalog::{CatalogService, NewProduct};
pub use checkout::{CheckoutOutcome, CheckoutPolicy, CheckoutProcessor};
pub use error::{ServiceError, ServiceResult};
pub use receipt::{Receipt, ReceiptLine, ReceiptTender};
pub use telemetry::init_tracing;

//! # Storage Contract
//!
//! The single interface every persistence backend must satisfy. The rest
//! of the application is storage-agnostic: it holds an `Arc<dyn Storage>`
//! handed out by the factory and never learns which backend is behind it.
//!
//! ## Contract Shape
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────┐
//! │  trait Storage                                                      │
//! │  ├── lifecycle         backend_name / health_check / close          │
//! │  ├── batches           execute_batch(WriteBatch)  ← all-or-nothing  │
//! │  ├── products          CRUD + lookup by SKU + stock adjustment      │
//! │  ├── sales             reads + cascading delete                     │
//! │  ├── users             CRUD + lookup by username/email              │
//! │  ├── credentials       opaque hash set/get                          │
//! │  ├── sessions          save / by-token / delete / expiry sweep      │
//! │  ├── audit             append (retention applied) / read-all        │
//! │  ├── settings/profiles get-or-default / save                        │
//! │  └── aggregates        get_stats / sales_summary_by_date            │
//! └─────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Read/Write Conventions
//! - Reads that can legitimately find nothing return `Ok(None)`.
//! - Writes return the materialized entity or a typed [`StoreError`].
//! - Unique secondary keys (sku, username, email, token) are enforced by
//!   every backend and surface as [`StoreError::UniqueViolation`].
//!
//! ## Batch Atomicity
//! [`Storage::execute_batch`] is the transactional envelope for the
//! checkout writer path: sale header, line items, payments, and stock
//! adjustments travel together. The contract is all-or-nothing with
//! rollback on error. The SQLite backend honors it with a real
//! transaction. The memory backend applies ops as a sequence of
//! independent single-collection writes and does NOT roll back on
//! failure; the conformance suite asserts this gap explicitly so it
//! stays visible instead of becoming a production surprise.

use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

use lumen_core::{
    AuditLog, AuthSession, BusinessSettings, DailySalesSummary, Payment, Product, Sale, SaleItem,
    SaleStatus, StoreStats, User, UserProfile,
};

use crate::error::StoreResult;

// =============================================================================
// Write Batch
// =============================================================================

/// One write in a [`WriteBatch`]: a contract call reified as data so the
/// whole sequence can be handed to a backend for transactional
/// execution.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum WriteOp {
    /// Insert a sale header.
    InsertSale(Sale),
    /// Insert a line item (its parent sale must be in the same batch or
    /// already persisted).
    InsertSaleItem(SaleItem),
    /// Insert a payment record.
    InsertPayment(Payment),
    /// Add `delta` (may be negative) to a product's stock.
    /// With `clamp_at_zero`, a result below zero is stored as zero; the
    /// oversell is logged either way.
    AdjustStock {
        product_id: String,
        delta: i64,
        clamp_at_zero: bool,
    },
    /// Transition a sale's status, stamping the matching timestamp.
    SetSaleStatus {
        sale_id: String,
        status: SaleStatus,
        at: DateTime<Utc>,
        reason: Option<String>,
    },
}

/// An ordered sequence of writes executed through
/// [`Storage::execute_batch`].
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct WriteBatch {
    ops: Vec<WriteOp>,
}

impl WriteBatch {
    pub fn new() -> Self {
        WriteBatch { ops: Vec::new() }
    }

    pub fn push(&mut self, op: WriteOp) -> &mut Self {
        self.ops.push(op);
        self
    }

    pub fn len(&self) -> usize {
        self.ops.len()
    }

    pub fn is_empty(&self) -> bool {
        self.ops.is_empty()
    }

    pub fn ops(&self) -> &[WriteOp] {
        &self.ops
    }

    pub fn into_ops(self) -> Vec<WriteOp> {
        self.ops
    }
}

impl From<Vec<WriteOp>> for WriteBatch {
    fn from(ops: Vec<WriteOp>) -> Self {
        WriteBatch { ops }
    }
}

// =============================================================================
// Storage Trait
// =============================================================================

/// Every persistence operation the application needs, declared once.
///
/// All operations are async and awaited sequentially by callers; the
/// contract does not promise parallel-safe concurrent writers. The one
/// hard atomicity requirement is [`execute_batch`](Storage::execute_batch).
#[async_trait]
pub trait Storage: Send + Sync {
    // -------------------------------------------------------------------------
    // Lifecycle
    // -------------------------------------------------------------------------

    /// Stable name of the backend ("sqlite" / "memory") for logs and
    /// diagnostics.
    fn backend_name(&self) -> &'static str;

    /// True when the backend can execute operations.
    async fn health_check(&self) -> bool;

    /// Releases backend resources. Operations after close fail.
    async fn close(&self);

    // -------------------------------------------------------------------------
    // Transactional execution
    // -------------------------------------------------------------------------

    /// Executes a batch of writes under the backend's transactional
    /// envelope. See the module docs for the atomicity contract and the
    /// memory backend's documented gap.
    async fn execute_batch(&self, batch: WriteBatch) -> StoreResult<()>;

    // -------------------------------------------------------------------------
    // Products
    // -------------------------------------------------------------------------

    async fn create_product(&self, product: Product) -> StoreResult<Product>;
    async fn get_product(&self, id: &str) -> StoreResult<Option<Product>>;
    async fn get_product_by_sku(&self, sku: &str) -> StoreResult<Option<Product>>;
    async fn list_products(&self) -> StoreResult<Vec<Product>>;
    async fn update_product(&self, product: Product) -> StoreResult<Product>;

    /// Soft delete: flips `is_active` so historical sale items keep a
    /// valid product reference.
    async fn deactivate_product(&self, id: &str) -> StoreResult<()>;

    /// Adds `delta` to a product's stock outside a batch (restock,
    /// manual correction). Returns the resulting stock level.
    async fn adjust_stock(
        &self,
        product_id: &str,
        delta: i64,
        clamp_at_zero: bool,
    ) -> StoreResult<i64>;

    // -------------------------------------------------------------------------
    // Sales
    // -------------------------------------------------------------------------

    async fn get_sale(&self, id: &str) -> StoreResult<Option<Sale>>;
    async fn list_sales(&self) -> StoreResult<Vec<Sale>>;
    async fn get_sale_items(&self, sale_id: &str) -> StoreResult<Vec<SaleItem>>;
    async fn get_payments(&self, sale_id: &str) -> StoreResult<Vec<Payment>>;

    /// Deletes a sale and cascades into its items and payments.
    /// One transaction on SQLite; a sequence of single-collection
    /// deletes on the memory backend.
    async fn delete_sale(&self, id: &str) -> StoreResult<()>;

    // -------------------------------------------------------------------------
    // Users
    // -------------------------------------------------------------------------

    async fn create_user(&self, user: User) -> StoreResult<User>;
    async fn get_user(&self, id: &str) -> StoreResult<Option<User>>;
    async fn get_user_by_username(&self, username: &str) -> StoreResult<Option<User>>;
    async fn get_user_by_email(&self, email: &str) -> StoreResult<Option<User>>;
    async fn list_users(&self) -> StoreResult<Vec<User>>;
    async fn update_user(&self, user: User) -> StoreResult<User>;

    /// Hard delete of a user and their credential/profile/sessions.
    /// Role rules (last active admin) are the service layer's job.
    async fn delete_user(&self, id: &str) -> StoreResult<()>;

    // -------------------------------------------------------------------------
    // Credentials
    // -------------------------------------------------------------------------
    // The stored value is opaque to the backend; hashing is the service
    // layer's concern.

    async fn set_password_hash(&self, user_id: &str, hash: &str) -> StoreResult<()>;
    async fn get_password_hash(&self, user_id: &str) -> StoreResult<Option<String>>;

    // -------------------------------------------------------------------------
    // Sessions
    // -------------------------------------------------------------------------

    async fn save_session(&self, session: AuthSession) -> StoreResult<AuthSession>;
    async fn get_session_by_token(&self, token: &str) -> StoreResult<Option<AuthSession>>;
    async fn delete_session(&self, token: &str) -> StoreResult<()>;

    /// Bulk-purges sessions whose expiry is at or before `now`.
    /// Returns the number purged. Expiry is otherwise evaluated lazily
    /// on access.
    async fn purge_expired_sessions(&self, now: DateTime<Utc>) -> StoreResult<u64>;

    // -------------------------------------------------------------------------
    // Audit Log
    // -------------------------------------------------------------------------

    /// Appends an audit entry, then applies the configured retention
    /// policy (drop oldest). Append-only otherwise.
    async fn append_audit(&self, entry: AuditLog) -> StoreResult<()>;
    async fn list_audit(&self) -> StoreResult<Vec<AuditLog>>;

    // -------------------------------------------------------------------------
    // Settings & Profiles
    // -------------------------------------------------------------------------

    /// Returns the singleton settings record, creating defaults on first
    /// access.
    async fn get_settings(&self) -> StoreResult<BusinessSettings>;
    async fn save_settings(&self, settings: BusinessSettings) -> StoreResult<BusinessSettings>;

    /// Returns a user's profile, creating defaults on first access.
    async fn get_profile(&self, user_id: &str) -> StoreResult<UserProfile>;
    async fn save_profile(&self, profile: UserProfile) -> StoreResult<UserProfile>;

    // -------------------------------------------------------------------------
    // Aggregates
    // -------------------------------------------------------------------------
    // Defined once at the contract level; every backend must compute
    // them identically (completed sales only).

    async fn get_stats(&self) -> StoreResult<StoreStats>;
    async fn sales_summary_by_date(
        &self,
        from: NaiveDate,
        to: NaiveDate,
    ) -> StoreResult<Vec<DailySalesSummary>>;
}

//! # Memory Object-Store Backend
//!
//! Fulfils the [`Storage`] contract over in-process named collections
//! with secondary index maps, optionally snapshotted to a JSON file.
//! This is the backend used where no SQL engine is available, and the
//! fallback when the SQLite backend fails to open.
//!
//! ## Collection Layout
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────┐
//! │  Collections (schema_version = 3)                                   │
//! │                                                                     │
//! │  products      HashMap<id, Product>   ──┐                           │
//! │  sales         HashMap<id, Sale>        │  primary collections      │
//! │  sale_items    HashMap<id, SaleItem>    │                           │
//! │  payments      HashMap<id, Payment>     │                           │
//! │  users         HashMap<id, User>        │                           │
//! │  credentials   HashMap<user_id, hash>   │                           │
//! │  sessions      HashMap<id, Session>     │                           │
//! │  audit_logs    Vec<AuditLog>            │                           │
//! │  settings      Option<Settings>         │                           │
//! │  profiles      HashMap<user_id, _>    ──┘                           │
//! │                                                                     │
//! │  sku / username / email / token index maps (rebuilt at open)        │
//! └─────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Schema Versioning
//! Collections are created once, at first open, keyed by
//! [`SCHEMA_VERSION`]. Upgrades are additive: loading an older snapshot
//! fills the missing collections with empty defaults and never drops
//! existing data.
//!
//! ## Atomicity Caveat
//! Every CRUD method takes its own lock acquisition; multi-collection
//! operations (cascading sale delete, [`Storage::execute_batch`]) run as
//! a *sequence* of independent single-collection writes. A failure
//! mid-sequence leaves the earlier writes in place - there is no
//! rollback. This is weaker than the SQLite backend and is asserted,
//! not hidden, by the conformance suite.

use std::collections::HashMap;
use std::fs;
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{RwLock, RwLockReadGuard, RwLockWriteGuard};

use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use lumen_core::{
    AuditLog, AuthSession, BusinessSettings, DailySalesSummary, Payment, Product, Sale, SaleItem,
    SaleStatus, StoreStats, User, UserProfile,
};

use crate::contract::{Storage, WriteBatch, WriteOp};
use crate::error::{StoreError, StoreResult};
use crate::retention::RetentionPolicy;

/// Version of the collection schema. Bump when adding collections;
/// never remove existing ones.
///
/// v1: catalog + sales collections
/// v2: users, credentials, sessions, audit log
/// v3: business settings, user profiles
pub const SCHEMA_VERSION: u32 = 3;

/// Names of every collection in the store, for diagnostics.
pub const COLLECTION_NAMES: [&str; 10] = [
    "products",
    "sales",
    "sale_items",
    "payments",
    "users",
    "credentials",
    "sessions",
    "audit_logs",
    "business_settings",
    "user_profiles",
];

// =============================================================================
// Collections
// =============================================================================

/// The whole object store. Serialized as-is for snapshots; index maps
/// are rebuilt at open rather than persisted.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
struct Collections {
    #[serde(default)]
    schema_version: u32,

    #[serde(default)]
    products: HashMap<String, Product>,
    #[serde(default)]
    sales: HashMap<String, Sale>,
    #[serde(default)]
    sale_items: HashMap<String, SaleItem>,
    #[serde(default)]
    payments: HashMap<String, Payment>,
    #[serde(default)]
    users: HashMap<String, User>,
    #[serde(default)]
    credentials: HashMap<String, String>,
    #[serde(default)]
    sessions: HashMap<String, AuthSession>,
    #[serde(default)]
    audit_logs: Vec<AuditLog>,
    #[serde(default)]
    settings: Option<BusinessSettings>,
    #[serde(default)]
    profiles: HashMap<String, UserProfile>,

    // Secondary indexes: value → primary id. Rebuilt at open.
    #[serde(skip)]
    sku_index: HashMap<String, String>,
    #[serde(skip)]
    username_index: HashMap<String, String>,
    #[serde(skip)]
    email_index: HashMap<String, String>,
    #[serde(skip)]
    token_index: HashMap<String, String>,
}

impl Collections {
    /// Additive schema upgrade: missing collections were already filled
    /// by serde defaults, so all that remains is stamping the version
    /// and rebuilding the secondary indexes.
    fn upgrade(&mut self) {
        if self.schema_version < SCHEMA_VERSION {
            info!(
                from = self.schema_version,
                to = SCHEMA_VERSION,
                "Upgrading object-store schema"
            );
            self.schema_version = SCHEMA_VERSION;
        }
        self.rebuild_indexes();
    }

    fn rebuild_indexes(&mut self) {
        self.sku_index = self
            .products
            .values()
            .map(|p| (p.sku.clone(), p.id.clone()))
            .collect();
        self.username_index = self
            .users
            .values()
            .map(|u| (u.username.clone(), u.id.clone()))
            .collect();
        self.email_index = self
            .users
            .values()
            .map(|u| (u.email.clone(), u.id.clone()))
            .collect();
        self.token_index = self
            .sessions
            .values()
            .map(|s| (s.token.clone(), s.id.clone()))
            .collect();
    }
}

// =============================================================================
// Configuration
// =============================================================================

/// Memory backend configuration.
#[derive(Debug, Clone, Default)]
pub struct MemoryConfig {
    /// When set, the collections are snapshotted to this JSON file after
    /// every write and reloaded at open.
    pub snapshot_path: Option<PathBuf>,

    /// Audit retention applied after every append.
    pub retention: RetentionPolicy,
}

impl MemoryConfig {
    /// Purely in-process store, nothing on disk.
    pub fn ephemeral() -> Self {
        MemoryConfig::default()
    }

    /// Store snapshotted to the given file.
    pub fn with_snapshot(path: impl Into<PathBuf>) -> Self {
        MemoryConfig {
            snapshot_path: Some(path.into()),
            retention: RetentionPolicy::unbounded(),
        }
    }

    pub fn retention(mut self, retention: RetentionPolicy) -> Self {
        self.retention = retention;
        self
    }
}

// =============================================================================
// Store
// =============================================================================

/// Memory-backed implementation of [`Storage`].
#[derive(Debug)]
pub struct MemoryStore {
    collections: RwLock<Collections>,
    snapshot_path: Option<PathBuf>,
    retention: RetentionPolicy,
    closed: AtomicBool,
}

impl MemoryStore {
    /// Opens the store, loading a snapshot when one exists.
    ///
    /// A corrupt or unreadable snapshot logs a warning and starts fresh;
    /// the memory backend is the fallback of last resort and must always
    /// come up.
    pub fn open(config: MemoryConfig) -> Self {
        let mut collections = match &config.snapshot_path {
            Some(path) if path.exists() => match Self::load_snapshot(path) {
                Ok(loaded) => loaded,
                Err(e) => {
                    warn!(path = %path.display(), error = %e, "Snapshot unreadable, starting fresh");
                    Collections::default()
                }
            },
            _ => Collections::default(),
        };
        collections.upgrade();

        info!(
            schema_version = collections.schema_version,
            snapshot = config.snapshot_path.is_some(),
            "Opened memory storage backend"
        );

        MemoryStore {
            collections: RwLock::new(collections),
            snapshot_path: config.snapshot_path,
            retention: config.retention,
            closed: AtomicBool::new(false),
        }
    }

    fn load_snapshot(path: &std::path::Path) -> StoreResult<Collections> {
        let bytes = fs::read(path).map_err(|e| StoreError::SnapshotFailed(e.to_string()))?;
        serde_json::from_slice(&bytes).map_err(|e| StoreError::SnapshotFailed(e.to_string()))
    }

    fn read(&self) -> RwLockReadGuard<'_, Collections> {
        self.collections.read().expect("collections lock poisoned")
    }

    fn write(&self) -> RwLockWriteGuard<'_, Collections> {
        self.collections.write().expect("collections lock poisoned")
    }

    /// Best-effort snapshot: serialize under a read lock, write to a
    /// temp file, atomically rename over the target. Failures are
    /// logged, never propagated - the in-memory state stays the source
    /// of truth.
    fn persist(&self) {
        let Some(path) = &self.snapshot_path else {
            return;
        };

        let json = {
            let collections = self.read();
            match serde_json::to_vec_pretty(&*collections) {
                Ok(json) => json,
                Err(e) => {
                    warn!(error = %e, "Failed to serialize snapshot");
                    return;
                }
            }
        };

        let tmp = path.with_extension("tmp");
        let result = fs::write(&tmp, &json).and_then(|_| fs::rename(&tmp, path));
        if let Err(e) = result {
            warn!(path = %path.display(), error = %e, "Failed to write snapshot");
        }
    }

    /// Applies one batch op under its own lock acquisition. Called in
    /// sequence by `execute_batch`; see the module docs for why this is
    /// not atomic.
    fn apply_write_op(&self, op: WriteOp) -> StoreResult<()> {
        match op {
            WriteOp::InsertSale(sale) => {
                let mut collections = self.write();
                if collections.sales.contains_key(&sale.id) {
                    return Err(StoreError::duplicate("sales.id", &sale.id));
                }
                collections.sales.insert(sale.id.clone(), sale);
                Ok(())
            }
            WriteOp::InsertSaleItem(item) => {
                let mut collections = self.write();
                if !collections.sales.contains_key(&item.sale_id) {
                    return Err(StoreError::ForeignKeyViolation {
                        message: format!("sale_items.sale_id -> {}", item.sale_id),
                    });
                }
                if !collections.products.contains_key(&item.product_id) {
                    return Err(StoreError::ForeignKeyViolation {
                        message: format!("sale_items.product_id -> {}", item.product_id),
                    });
                }
                if collections.sale_items.contains_key(&item.id) {
                    return Err(StoreError::duplicate("sale_items.id", &item.id));
                }
                collections.sale_items.insert(item.id.clone(), item);
                Ok(())
            }
            WriteOp::InsertPayment(payment) => {
                let mut collections = self.write();
                if !collections.sales.contains_key(&payment.sale_id) {
                    return Err(StoreError::ForeignKeyViolation {
                        message: format!("payments.sale_id -> {}", payment.sale_id),
                    });
                }
                if collections.payments.contains_key(&payment.id) {
                    return Err(StoreError::duplicate("payments.id", &payment.id));
                }
                collections.payments.insert(payment.id.clone(), payment);
                Ok(())
            }
            WriteOp::AdjustStock {
                product_id,
                delta,
                clamp_at_zero,
            } => self
                .adjust_stock_locked(&product_id, delta, clamp_at_zero)
                .map(|_| ()),
            WriteOp::SetSaleStatus {
                sale_id,
                status,
                at,
                reason,
            } => {
                let mut collections = self.write();
                let sale = collections
                    .sales
                    .get_mut(&sale_id)
                    .ok_or_else(|| StoreError::not_found("Sale", &sale_id))?;
                sale.status = status;
                match status {
                    SaleStatus::Completed => sale.completed_at = Some(at),
                    SaleStatus::Cancelled => {
                        sale.cancelled_at = Some(at);
                        sale.cancel_reason = reason;
                    }
                    SaleStatus::Pending => {}
                }
                Ok(())
            }
        }
    }

    fn adjust_stock_locked(
        &self,
        product_id: &str,
        delta: i64,
        clamp_at_zero: bool,
    ) -> StoreResult<i64> {
        let mut collections = self.write();
        let product = collections
            .products
            .get_mut(product_id)
            .ok_or_else(|| StoreError::not_found("Product", product_id))?;

        let mut new_qty = product.stock_qty + delta;
        if new_qty < 0 {
            warn!(
                product_id = %product_id,
                stock = product.stock_qty,
                delta,
                clamped = clamp_at_zero,
                "Stock adjustment would go negative"
            );
            if clamp_at_zero {
                new_qty = 0;
            }
        }

        product.stock_qty = new_qty;
        product.updated_at = Utc::now();
        Ok(new_qty)
    }
}

// =============================================================================
// Storage Implementation
// =============================================================================

#[async_trait]
impl Storage for MemoryStore {
    fn backend_name(&self) -> &'static str {
        "memory"
    }

    async fn health_check(&self) -> bool {
        !self.closed.load(Ordering::SeqCst)
    }

    async fn close(&self) {
        info!("Closing memory storage backend");
        self.persist();
        self.closed.store(true, Ordering::SeqCst);
    }

    // -------------------------------------------------------------------------
    // Transactional execution
    // -------------------------------------------------------------------------

    /// Applies ops in order, each under its own lock. On failure the ops
    /// already applied REMAIN - no rollback. See module docs.
    async fn execute_batch(&self, batch: WriteBatch) -> StoreResult<()> {
        debug!(ops = batch.len(), "Executing write batch (sequential)");

        for op in batch.into_ops() {
            if let Err(e) = self.apply_write_op(op) {
                self.persist();
                warn!(error = %e, "Write batch failed mid-sequence; earlier writes kept");
                return Err(e);
            }
        }

        self.persist();
        Ok(())
    }

    // -------------------------------------------------------------------------
    // Products
    // -------------------------------------------------------------------------

    async fn create_product(&self, product: Product) -> StoreResult<Product> {
        {
            let mut collections = self.write();
            if collections.sku_index.contains_key(&product.sku) {
                return Err(StoreError::duplicate("products.sku", &product.sku));
            }
            if collections.products.contains_key(&product.id) {
                return Err(StoreError::duplicate("products.id", &product.id));
            }
            collections
                .sku_index
                .insert(product.sku.clone(), product.id.clone());
            collections
                .products
                .insert(product.id.clone(), product.clone());
        }
        self.persist();
        Ok(product)
    }

    async fn get_product(&self, id: &str) -> StoreResult<Option<Product>> {
        Ok(self.read().products.get(id).cloned())
    }

    async fn get_product_by_sku(&self, sku: &str) -> StoreResult<Option<Product>> {
        let collections = self.read();
        Ok(collections
            .sku_index
            .get(sku)
            .and_then(|id| collections.products.get(id))
            .cloned())
    }

    async fn list_products(&self) -> StoreResult<Vec<Product>> {
        let mut products: Vec<Product> = self.read().products.values().cloned().collect();
        products.sort_by(|a, b| a.name.cmp(&b.name).then_with(|| a.id.cmp(&b.id)));
        Ok(products)
    }

    async fn update_product(&self, mut product: Product) -> StoreResult<Product> {
        {
            let mut collections = self.write();
            let existing = collections
                .products
                .get(&product.id)
                .ok_or_else(|| StoreError::not_found("Product", &product.id))?
                .clone();

            if existing.sku != product.sku {
                if let Some(other) = collections.sku_index.get(&product.sku) {
                    if other != &product.id {
                        return Err(StoreError::duplicate("products.sku", &product.sku));
                    }
                }
                collections.sku_index.remove(&existing.sku);
                collections
                    .sku_index
                    .insert(product.sku.clone(), product.id.clone());
            }

            product.updated_at = Utc::now();
            collections
                .products
                .insert(product.id.clone(), product.clone());
        }
        self.persist();
        Ok(product)
    }

    async fn deactivate_product(&self, id: &str) -> StoreResult<()> {
        {
            let mut collections = self.write();
            let product = collections
                .products
                .get_mut(id)
                .ok_or_else(|| StoreError::not_found("Product", id))?;
            product.is_active = false;
            product.updated_at = Utc::now();
        }
        self.persist();
        Ok(())
    }

    async fn adjust_stock(
        &self,
        product_id: &str,
        delta: i64,
        clamp_at_zero: bool,
    ) -> StoreResult<i64> {
        let new_qty = self.adjust_stock_locked(product_id, delta, clamp_at_zero)?;
        self.persist();
        Ok(new_qty)
    }

    // -------------------------------------------------------------------------
    // Sales
    // -------------------------------------------------------------------------

    async fn get_sale(&self, id: &str) -> StoreResult<Option<Sale>> {
        Ok(self.read().sales.get(id).cloned())
    }

    async fn list_sales(&self) -> StoreResult<Vec<Sale>> {
        let mut sales: Vec<Sale> = self.read().sales.values().cloned().collect();
        sales.sort_by(|a, b| {
            b.created_at
                .cmp(&a.created_at)
                .then_with(|| a.id.cmp(&b.id))
        });
        Ok(sales)
    }

    async fn get_sale_items(&self, sale_id: &str) -> StoreResult<Vec<SaleItem>> {
        let mut items: Vec<SaleItem> = self
            .read()
            .sale_items
            .values()
            .filter(|i| i.sale_id == sale_id)
            .cloned()
            .collect();
        items.sort_by(|a, b| {
            a.created_at
                .cmp(&b.created_at)
                .then_with(|| a.id.cmp(&b.id))
        });
        Ok(items)
    }

    async fn get_payments(&self, sale_id: &str) -> StoreResult<Vec<Payment>> {
        let mut payments: Vec<Payment> = self
            .read()
            .payments
            .values()
            .filter(|p| p.sale_id == sale_id)
            .cloned()
            .collect();
        payments.sort_by(|a, b| {
            a.created_at
                .cmp(&b.created_at)
                .then_with(|| a.id.cmp(&b.id))
        });
        Ok(payments)
    }

    /// Cascade delete as a sequence of single-collection writes: items,
    /// then payments, then the header. NOT one atomic unit; see the
    /// module docs.
    async fn delete_sale(&self, id: &str) -> StoreResult<()> {
        {
            let mut collections = self.write();
            collections.sale_items.retain(|_, i| i.sale_id != id);
        }
        {
            let mut collections = self.write();
            collections.payments.retain(|_, p| p.sale_id != id);
        }
        let removed = {
            let mut collections = self.write();
            collections.sales.remove(id).is_some()
        };
        self.persist();

        if removed {
            Ok(())
        } else {
            Err(StoreError::not_found("Sale", id))
        }
    }

    // -------------------------------------------------------------------------
    // Users
    // -------------------------------------------------------------------------

    async fn create_user(&self, user: User) -> StoreResult<User> {
        {
            let mut collections = self.write();
            if collections.username_index.contains_key(&user.username) {
                return Err(StoreError::duplicate("users.username", &user.username));
            }
            if collections.email_index.contains_key(&user.email) {
                return Err(StoreError::duplicate("users.email", &user.email));
            }
            collections
                .username_index
                .insert(user.username.clone(), user.id.clone());
            collections
                .email_index
                .insert(user.email.clone(), user.id.clone());
            collections.users.insert(user.id.clone(), user.clone());
        }
        self.persist();
        Ok(user)
    }

    async fn get_user(&self, id: &str) -> StoreResult<Option<User>> {
        Ok(self.read().users.get(id).cloned())
    }

    async fn get_user_by_username(&self, username: &str) -> StoreResult<Option<User>> {
        let collections = self.read();
        Ok(collections
            .username_index
            .get(username)
            .and_then(|id| collections.users.get(id))
            .cloned())
    }

    async fn get_user_by_email(&self, email: &str) -> StoreResult<Option<User>> {
        let collections = self.read();
        Ok(collections
            .email_index
            .get(email)
            .and_then(|id| collections.users.get(id))
            .cloned())
    }

    async fn list_users(&self) -> StoreResult<Vec<User>> {
        let mut users: Vec<User> = self.read().users.values().cloned().collect();
        users.sort_by(|a, b| a.username.cmp(&b.username));
        Ok(users)
    }

    async fn update_user(&self, mut user: User) -> StoreResult<User> {
        {
            let mut collections = self.write();
            let existing = collections
                .users
                .get(&user.id)
                .ok_or_else(|| StoreError::not_found("User", &user.id))?
                .clone();

            if existing.username != user.username {
                if let Some(other) = collections.username_index.get(&user.username) {
                    if other != &user.id {
                        return Err(StoreError::duplicate("users.username", &user.username));
                    }
                }
                collections.username_index.remove(&existing.username);
                collections
                    .username_index
                    .insert(user.username.clone(), user.id.clone());
            }
            if existing.email != user.email {
                if let Some(other) = collections.email_index.get(&user.email) {
                    if other != &user.id {
                        return Err(StoreError::duplicate("users.email", &user.email));
                    }
                }
                collections.email_index.remove(&existing.email);
                collections
                    .email_index
                    .insert(user.email.clone(), user.id.clone());
            }

            user.updated_at = Utc::now();
            collections.users.insert(user.id.clone(), user.clone());
        }
        self.persist();
        Ok(user)
    }

    /// Removes the user and, as separate collection writes, their
    /// credential, profile, and sessions.
    async fn delete_user(&self, id: &str) -> StoreResult<()> {
        let removed = {
            let mut collections = self.write();
            match collections.users.remove(id) {
                Some(user) => {
                    collections.username_index.remove(&user.username);
                    collections.email_index.remove(&user.email);
                    true
                }
                None => false,
            }
        };
        if !removed {
            return Err(StoreError::not_found("User", id));
        }

        {
            let mut collections = self.write();
            collections.credentials.remove(id);
        }
        {
            let mut collections = self.write();
            collections.profiles.remove(id);
        }
        {
            let mut collections = self.write();
            let stale: Vec<(String, String)> = collections
                .sessions
                .values()
                .filter(|s| s.user_id == id)
                .map(|s| (s.id.clone(), s.token.clone()))
                .collect();
            for (session_id, token) in stale {
                collections.sessions.remove(&session_id);
                collections.token_index.remove(&token);
            }
        }
        self.persist();
        Ok(())
    }

    // -------------------------------------------------------------------------
    // Credentials
    // -------------------------------------------------------------------------

    async fn set_password_hash(&self, user_id: &str, hash: &str) -> StoreResult<()> {
        {
            let mut collections = self.write();
            // Credentials never dangle; SQLite enforces the same via FK.
            if !collections.users.contains_key(user_id) {
                return Err(StoreError::ForeignKeyViolation {
                    message: format!("credentials.user_id -> {user_id}"),
                });
            }
            collections
                .credentials
                .insert(user_id.to_string(), hash.to_string());
        }
        self.persist();
        Ok(())
    }

    async fn get_password_hash(&self, user_id: &str) -> StoreResult<Option<String>> {
        Ok(self.read().credentials.get(user_id).cloned())
    }

    // -------------------------------------------------------------------------
    // Sessions
    // -------------------------------------------------------------------------

    async fn save_session(&self, session: AuthSession) -> StoreResult<AuthSession> {
        {
            let mut collections = self.write();
            if !collections.users.contains_key(&session.user_id) {
                return Err(StoreError::ForeignKeyViolation {
                    message: format!("sessions.user_id -> {}", session.user_id),
                });
            }
            if collections.token_index.contains_key(&session.token) {
                return Err(StoreError::duplicate("sessions.token", &session.token));
            }
            collections
                .token_index
                .insert(session.token.clone(), session.id.clone());
            collections
                .sessions
                .insert(session.id.clone(), session.clone());
        }
        self.persist();
        Ok(session)
    }

    async fn get_session_by_token(&self, token: &str) -> StoreResult<Option<AuthSession>> {
        let collections = self.read();
        Ok(collections
            .token_index
            .get(token)
            .and_then(|id| collections.sessions.get(id))
            .cloned())
    }

    async fn delete_session(&self, token: &str) -> StoreResult<()> {
        {
            let mut collections = self.write();
            if let Some(session_id) = collections.token_index.remove(token) {
                collections.sessions.remove(&session_id);
            }
        }
        self.persist();
        Ok(())
    }

    async fn purge_expired_sessions(&self, now: DateTime<Utc>) -> StoreResult<u64> {
        let purged = {
            let mut collections = self.write();
            let expired: Vec<(String, String)> = collections
                .sessions
                .values()
                .filter(|s| s.is_expired(now))
                .map(|s| (s.id.clone(), s.token.clone()))
                .collect();
            for (session_id, token) in &expired {
                collections.sessions.remove(session_id);
                collections.token_index.remove(token);
            }
            expired.len() as u64
        };
        if purged > 0 {
            debug!(purged, "Purged expired sessions");
            self.persist();
        }
        Ok(purged)
    }

    // -------------------------------------------------------------------------
    // Audit Log
    // -------------------------------------------------------------------------

    async fn append_audit(&self, entry: AuditLog) -> StoreResult<()> {
        {
            let mut collections = self.write();
            collections.audit_logs.push(entry);
            // Uniform retention: same policy, same helper as SQLite.
            let excess = self.retention.excess(collections.audit_logs.len());
            if excess > 0 {
                collections.audit_logs.drain(..excess);
            }
        }
        self.persist();
        Ok(())
    }

    async fn list_audit(&self) -> StoreResult<Vec<AuditLog>> {
        Ok(self.read().audit_logs.clone())
    }

    // -------------------------------------------------------------------------
    // Settings & Profiles
    // -------------------------------------------------------------------------

    async fn get_settings(&self) -> StoreResult<BusinessSettings> {
        let (settings, materialized) = {
            let mut collections = self.write();
            match &collections.settings {
                Some(settings) => (settings.clone(), false),
                None => {
                    let defaults = BusinessSettings::defaults(Utc::now());
                    collections.settings = Some(defaults.clone());
                    (defaults, true)
                }
            }
        };
        if materialized {
            self.persist();
        }
        Ok(settings)
    }

    async fn save_settings(&self, settings: BusinessSettings) -> StoreResult<BusinessSettings> {
        {
            let mut collections = self.write();
            collections.settings = Some(settings.clone());
        }
        self.persist();
        Ok(settings)
    }

    async fn get_profile(&self, user_id: &str) -> StoreResult<UserProfile> {
        let (profile, materialized) = {
            let mut collections = self.write();
            match collections.profiles.get(user_id) {
                Some(profile) => (profile.clone(), false),
                None => {
                    // Profiles belong to existing users only, matching
                    // the SQLite FK.
                    if !collections.users.contains_key(user_id) {
                        return Err(StoreError::ForeignKeyViolation {
                            message: format!("user_profiles.user_id -> {user_id}"),
                        });
                    }
                    let defaults = UserProfile::defaults(user_id, Utc::now());
                    collections
                        .profiles
                        .insert(user_id.to_string(), defaults.clone());
                    (defaults, true)
                }
            }
        };
        if materialized {
            self.persist();
        }
        Ok(profile)
    }

    async fn save_profile(&self, profile: UserProfile) -> StoreResult<UserProfile> {
        {
            let mut collections = self.write();
            if !collections.users.contains_key(&profile.user_id) {
                return Err(StoreError::ForeignKeyViolation {
                    message: format!("user_profiles.user_id -> {}", profile.user_id),
                });
            }
            collections
                .profiles
                .insert(profile.user_id.clone(), profile.clone());
        }
        self.persist();
        Ok(profile)
    }

    // -------------------------------------------------------------------------
    // Aggregates
    // -------------------------------------------------------------------------

    async fn get_stats(&self) -> StoreResult<StoreStats> {
        let collections = self.read();

        let product_count = collections.products.values().filter(|p| p.is_active).count() as i64;

        let completed: Vec<&Sale> = collections
            .sales
            .values()
            .filter(|s| s.status == SaleStatus::Completed)
            .collect();
        let cancelled_sales = collections
            .sales
            .values()
            .filter(|s| s.status == SaleStatus::Cancelled)
            .count() as i64;

        let completed_sales = completed.len() as i64;
        let revenue_cents: i64 = completed.iter().map(|s| s.total_cents).sum();
        let tax_collected_cents: i64 = completed.iter().map(|s| s.tax_cents).sum();

        // Integer division on purpose: both backends must agree exactly.
        let average_sale_cents = if completed_sales > 0 {
            revenue_cents / completed_sales
        } else {
            0
        };

        Ok(StoreStats {
            product_count,
            completed_sales,
            cancelled_sales,
            revenue_cents,
            tax_collected_cents,
            average_sale_cents,
        })
    }

    async fn sales_summary_by_date(
        &self,
        from: NaiveDate,
        to: NaiveDate,
    ) -> StoreResult<Vec<DailySalesSummary>> {
        let collections = self.read();

        let mut by_day: HashMap<NaiveDate, DailySalesSummary> = HashMap::new();
        for sale in collections.sales.values() {
            if sale.status != SaleStatus::Completed {
                continue;
            }
            let day = sale.created_at.date_naive();
            if day < from || day > to {
                continue;
            }
            let summary = by_day.entry(day).or_insert(DailySalesSummary {
                date: day,
                sales_count: 0,
                revenue_cents: 0,
                tax_cents: 0,
            });
            summary.sales_count += 1;
            summary.revenue_cents += sale.total_cents;
            summary.tax_cents += sale.tax_cents;
        }

        let mut summaries: Vec<DailySalesSummary> = by_day.into_values().collect();
        summaries.sort_by_key(|s| s.date);
        Ok(summaries)
    }
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    fn test_product(id: &str, sku: &str) -> Product {
        let now = Utc::now();
        Product {
            id: id.to_string(),
            sku: sku.to_string(),
            name: format!("Product {}", id),
            description: None,
            price_cents: 1000,
            cost_cents: None,
            tax_rate_bps: 800,
            stock_qty: 10,
            track_inventory: true,
            is_active: true,
            created_at: now,
            updated_at: now,
        }
    }

    #[tokio::test]
    async fn opens_at_current_schema_version() {
        let store = MemoryStore::open(MemoryConfig::ephemeral());
        assert_eq!(store.read().schema_version, SCHEMA_VERSION);
        assert!(store.health_check().await);
    }

    #[tokio::test]
    async fn duplicate_sku_rejected() {
        let store = MemoryStore::open(MemoryConfig::ephemeral());
        store
            .create_product(test_product("p1", "SKU-1"))
            .await
            .unwrap();

        let err = store
            .create_product(test_product("p2", "SKU-1"))
            .await
            .unwrap_err();
        assert!(matches!(err, StoreError::UniqueViolation { .. }));
    }

    #[tokio::test]
    async fn snapshot_roundtrip_preserves_collections() {
        let dir = std::env::temp_dir().join(format!("lumen-snap-{}", uuid::Uuid::new_v4()));
        fs::create_dir_all(&dir).unwrap();
        let path = dir.join("store.json");

        {
            let store = MemoryStore::open(MemoryConfig::with_snapshot(&path));
            store
                .create_product(test_product("p1", "SKU-1"))
                .await
                .unwrap();
            store.close().await;
        }

        let reopened = MemoryStore::open(MemoryConfig::with_snapshot(&path));
        let product = reopened.get_product_by_sku("SKU-1").await.unwrap();
        assert!(product.is_some());
        assert_eq!(product.unwrap().id, "p1");

        fs::remove_dir_all(&dir).ok();
    }

    #[tokio::test]
    async fn corrupt_snapshot_starts_fresh() {
        let dir = std::env::temp_dir().join(format!("lumen-snap-{}", uuid::Uuid::new_v4()));
        fs::create_dir_all(&dir).unwrap();
        let path = dir.join("store.json");
        fs::write(&path, b"not json at all").unwrap();

        let store = MemoryStore::open(MemoryConfig::with_snapshot(&path));
        assert!(store.list_products().await.unwrap().is_empty());

        fs::remove_dir_all(&dir).ok();
    }
}

//! # SQLite Backend
//!
//! Fulfils the [`Storage`] contract over a local SQLite file via sqlx.
//! This is the backend used on native runtimes, and the one that honors
//! the all-or-nothing batch contract with a real database transaction.
//!
//! ## Connection Pool
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────┐
//! │  SqliteConfig::new(path) ── pool settings, migration toggle         │
//! │        │                                                            │
//! │        ▼                                                            │
//! │  SqliteStore::open(config).await ── create pool + run migrations    │
//! │        │                                                            │
//! │        ▼                                                            │
//! │  SqlitePool (WAL mode, NORMAL sync, foreign keys ON)                │
//! └─────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! WAL mode keeps readers and writers from blocking each other; NORMAL
//! synchronous is the durability/speed balance appropriate for a local
//! single-writer POS terminal.

use chrono::{DateTime, NaiveDate, Utc};
use sqlx::sqlite::{
    SqliteConnectOptions, SqliteConnection, SqliteJournalMode, SqlitePoolOptions,
    SqliteSynchronous,
};
use sqlx::{Row, SqlitePool};
use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;
use tracing::{debug, info, warn};

use async_trait::async_trait;
use lumen_core::{
    AuditLog, AuthSession, BusinessSettings, DailySalesSummary, Payment, Product, Sale, SaleItem,
    SaleStatus, StoreStats, User, UserProfile,
};

use crate::contract::{Storage, WriteBatch, WriteOp};
use crate::error::{StoreError, StoreResult};
use crate::retention::RetentionPolicy;

/// Embedded migrations from `migrations/`.
///
/// The `sqlx::migrate!()` macro embeds the SQL files into the binary at
/// compile time; applied versions are tracked in `_sqlx_migrations`.
static MIGRATOR: sqlx::migrate::Migrator = sqlx::migrate!("./migrations");

// =============================================================================
// Configuration
// =============================================================================

/// SQLite backend configuration.
#[derive(Debug, Clone)]
pub struct SqliteConfig {
    /// Path to the database file. Created if it doesn't exist.
    pub database_path: PathBuf,

    /// Maximum pool connections. Default 5, plenty for a local POS.
    pub max_connections: u32,

    /// Minimum connections kept alive. Default 1.
    pub min_connections: u32,

    /// Connection acquire timeout. Default 30s.
    pub connect_timeout: Duration,

    /// Idle timeout before a connection is closed. Default 10 minutes.
    pub idle_timeout: Duration,

    /// Whether to run migrations on open. Default true.
    pub run_migrations: bool,

    /// Audit retention applied after every append.
    pub retention: RetentionPolicy,
}

impl SqliteConfig {
    /// Creates a configuration for the given database file path.
    pub fn new(path: impl Into<PathBuf>) -> Self {
        SqliteConfig {
            database_path: path.into(),
            max_connections: 5,
            min_connections: 1,
            connect_timeout: Duration::from_secs(30),
            idle_timeout: Duration::from_secs(600),
            run_migrations: true,
            retention: RetentionPolicy::unbounded(),
        }
    }

    pub fn max_connections(mut self, max: u32) -> Self {
        self.max_connections = max;
        self
    }

    pub fn min_connections(mut self, min: u32) -> Self {
        self.min_connections = min;
        self
    }

    pub fn connect_timeout(mut self, timeout: Duration) -> Self {
        self.connect_timeout = timeout;
        self
    }

    pub fn run_migrations(mut self, run: bool) -> Self {
        self.run_migrations = run;
        self
    }

    pub fn retention(mut self, retention: RetentionPolicy) -> Self {
        self.retention = retention;
        self
    }

    /// In-memory database configuration (test isolation).
    ///
    /// In-memory SQLite lives and dies with a single connection, so the
    /// pool is pinned to one.
    pub fn in_memory() -> Self {
        SqliteConfig {
            database_path: PathBuf::from(":memory:"),
            max_connections: 1,
            min_connections: 1,
            connect_timeout: Duration::from_secs(5),
            idle_timeout: Duration::from_secs(60),
            run_migrations: true,
            retention: RetentionPolicy::unbounded(),
        }
    }
}

// =============================================================================
// Store
// =============================================================================

/// SQLite-backed implementation of [`Storage`].
#[derive(Debug, Clone)]
pub struct SqliteStore {
    pool: SqlitePool,
    retention: RetentionPolicy,
}

impl SqliteStore {
    /// Opens the database: connect options, pool, migrations.
    pub async fn open(config: SqliteConfig) -> StoreResult<Self> {
        info!(
            path = %config.database_path.display(),
            "Opening SQLite storage backend"
        );

        let base_options = if config.database_path == PathBuf::from(":memory:") {
            SqliteConnectOptions::from_str("sqlite::memory:")
                .map_err(|e| StoreError::ConnectionFailed(e.to_string()))?
        } else {
            let url = format!("sqlite://{}?mode=rwc", config.database_path.display());
            SqliteConnectOptions::from_str(&url)
                .map_err(|e| StoreError::ConnectionFailed(e.to_string()))?
        };

        let connect_options = base_options
            // WAL: readers don't block writers, writers don't block readers
            .journal_mode(SqliteJournalMode::Wal)
            // NORMAL: safe from corruption, may lose the last txn on crash
            .synchronous(SqliteSynchronous::Normal)
            // SQLite ships with foreign keys off for backwards compatibility
            .foreign_keys(true)
            .create_if_missing(true);

        let pool = SqlitePoolOptions::new()
            .max_connections(config.max_connections)
            .min_connections(config.min_connections)
            .acquire_timeout(config.connect_timeout)
            .idle_timeout(Some(config.idle_timeout))
            .connect_with(connect_options)
            .await
            .map_err(|e| StoreError::ConnectionFailed(e.to_string()))?;

        let store = SqliteStore {
            pool,
            retention: config.retention,
        };

        if config.run_migrations {
            info!("Running database migrations");
            MIGRATOR.run(&store.pool).await?;
        }

        Ok(store)
    }

    /// Reference to the pool, for queries not covered by the contract.
    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }
}

// =============================================================================
// Batch op execution
// =============================================================================
// These helpers run on a plain connection so they serve both the
// transactional batch path and (for stock) the standalone contract call.

async fn insert_sale(conn: &mut SqliteConnection, sale: &Sale) -> StoreResult<()> {
    debug!(id = %sale.id, total = sale.total_cents, "Inserting sale");

    sqlx::query(
        r#"
        INSERT INTO sales (
            id, status, subtotal_cents, tax_cents, discount_cents, total_cents,
            cashier_id, note, created_at, completed_at, cancelled_at, cancel_reason
        ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12)
        "#,
    )
    .bind(&sale.id)
    .bind(sale.status)
    .bind(sale.subtotal_cents)
    .bind(sale.tax_cents)
    .bind(sale.discount_cents)
    .bind(sale.total_cents)
    .bind(&sale.cashier_id)
    .bind(&sale.note)
    .bind(sale.created_at)
    .bind(sale.completed_at)
    .bind(sale.cancelled_at)
    .bind(&sale.cancel_reason)
    .execute(&mut *conn)
    .await?;

    Ok(())
}

async fn insert_sale_item(conn: &mut SqliteConnection, item: &SaleItem) -> StoreResult<()> {
    sqlx::query(
        r#"
        INSERT INTO sale_items (
            id, sale_id, product_id, sku_snapshot, name_snapshot,
            unit_price_cents, quantity, line_total_cents, tax_cents, created_at
        ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10)
        "#,
    )
    .bind(&item.id)
    .bind(&item.sale_id)
    .bind(&item.product_id)
    .bind(&item.sku_snapshot)
    .bind(&item.name_snapshot)
    .bind(item.unit_price_cents)
    .bind(item.quantity)
    .bind(item.line_total_cents)
    .bind(item.tax_cents)
    .bind(item.created_at)
    .execute(&mut *conn)
    .await?;

    Ok(())
}

async fn insert_payment(conn: &mut SqliteConnection, payment: &Payment) -> StoreResult<()> {
    debug!(sale_id = %payment.sale_id, amount = payment.amount_cents, "Recording payment");

    sqlx::query(
        r#"
        INSERT INTO payments (id, sale_id, method, amount_cents, reference, created_at)
        VALUES (?1, ?2, ?3, ?4, ?5, ?6)
        "#,
    )
    .bind(&payment.id)
    .bind(&payment.sale_id)
    .bind(payment.method)
    .bind(payment.amount_cents)
    .bind(&payment.reference)
    .bind(payment.created_at)
    .execute(&mut *conn)
    .await?;

    Ok(())
}

async fn adjust_stock_on(
    conn: &mut SqliteConnection,
    product_id: &str,
    delta: i64,
    clamp_at_zero: bool,
) -> StoreResult<i64> {
    let stock: Option<i64> = sqlx::query_scalar("SELECT stock_qty FROM products WHERE id = ?1")
        .bind(product_id)
        .fetch_optional(&mut *conn)
        .await?;

    let stock = stock.ok_or_else(|| StoreError::not_found("Product", product_id))?;

    let mut new_qty = stock + delta;
    if new_qty < 0 {
        warn!(
            product_id = %product_id,
            stock,
            delta,
            clamped = clamp_at_zero,
            "Stock adjustment would go negative"
        );
        if clamp_at_zero {
            new_qty = 0;
        }
    }

    sqlx::query("UPDATE products SET stock_qty = ?2, updated_at = ?3 WHERE id = ?1")
        .bind(product_id)
        .bind(new_qty)
        .bind(Utc::now())
        .execute(&mut *conn)
        .await?;

    Ok(new_qty)
}

async fn set_sale_status(
    conn: &mut SqliteConnection,
    sale_id: &str,
    status: SaleStatus,
    at: DateTime<Utc>,
    reason: Option<&str>,
) -> StoreResult<()> {
    let result = match status {
        SaleStatus::Completed => {
            sqlx::query("UPDATE sales SET status = ?2, completed_at = ?3 WHERE id = ?1")
                .bind(sale_id)
                .bind(status)
                .bind(at)
                .execute(&mut *conn)
                .await?
        }
        SaleStatus::Cancelled => {
            sqlx::query(
                "UPDATE sales SET status = ?2, cancelled_at = ?3, cancel_reason = ?4 WHERE id = ?1",
            )
            .bind(sale_id)
            .bind(status)
            .bind(at)
            .bind(reason)
            .execute(&mut *conn)
            .await?
        }
        SaleStatus::Pending => {
            sqlx::query("UPDATE sales SET status = ?2 WHERE id = ?1")
                .bind(sale_id)
                .bind(status)
                .execute(&mut *conn)
                .await?
        }
    };

    if result.rows_affected() == 0 {
        return Err(StoreError::not_found("Sale", sale_id));
    }

    Ok(())
}

async fn apply_op(conn: &mut SqliteConnection, op: &WriteOp) -> StoreResult<()> {
    match op {
        WriteOp::InsertSale(sale) => insert_sale(conn, sale).await,
        WriteOp::InsertSaleItem(item) => insert_sale_item(conn, item).await,
        WriteOp::InsertPayment(payment) => insert_payment(conn, payment).await,
        WriteOp::AdjustStock {
            product_id,
            delta,
            clamp_at_zero,
        } => adjust_stock_on(conn, product_id, *delta, *clamp_at_zero)
            .await
            .map(|_| ()),
        WriteOp::SetSaleStatus {
            sale_id,
            status,
            at,
            reason,
        } => set_sale_status(conn, sale_id, *status, *at, reason.as_deref()).await,
    }
}

// =============================================================================
// Column lists
// =============================================================================

const PRODUCT_COLS: &str = "id, sku, name, description, price_cents, cost_cents, tax_rate_bps, \
                            stock_qty, track_inventory, is_active, created_at, updated_at";

const SALE_COLS: &str = "id, status, subtotal_cents, tax_cents, discount_cents, total_cents, \
                         cashier_id, note, created_at, completed_at, cancelled_at, cancel_reason";

const USER_COLS: &str = "id, username, email, first_name, last_name, role, is_active, \
                         created_at, updated_at, last_login_at";

// =============================================================================
// Storage Implementation
// =============================================================================

#[async_trait]
impl Storage for SqliteStore {
    fn backend_name(&self) -> &'static str {
        "sqlite"
    }

    async fn health_check(&self) -> bool {
        sqlx::query("SELECT 1").execute(&self.pool).await.is_ok()
    }

    async fn close(&self) {
        info!("Closing SQLite connection pool");
        self.pool.close().await;
    }

    // -------------------------------------------------------------------------
    // Transactional execution
    // -------------------------------------------------------------------------

    /// Runs the batch inside one BEGIN/COMMIT. Any op failure rolls the
    /// whole batch back; no partial state survives.
    async fn execute_batch(&self, batch: WriteBatch) -> StoreResult<()> {
        debug!(ops = batch.len(), "Executing write batch");

        let mut tx = self
            .pool
            .begin()
            .await
            .map_err(|e| StoreError::TransactionFailed(e.to_string()))?;

        for op in batch.ops() {
            if let Err(e) = apply_op(tx.as_mut(), op).await {
                // Dropping the transaction rolls it back; make the
                // rollback explicit so failure logs line up.
                tx.rollback()
                    .await
                    .map_err(|re| StoreError::TransactionFailed(re.to_string()))?;
                warn!(error = %e, "Write batch failed, rolled back");
                return Err(e);
            }
        }

        tx.commit()
            .await
            .map_err(|e| StoreError::TransactionFailed(e.to_string()))?;

        Ok(())
    }

    // -------------------------------------------------------------------------
    // Products
    // -------------------------------------------------------------------------

    async fn create_product(&self, product: Product) -> StoreResult<Product> {
        debug!(sku = %product.sku, "Creating product");

        sqlx::query(
            r#"
            INSERT INTO products (
                id, sku, name, description, price_cents, cost_cents, tax_rate_bps,
                stock_qty, track_inventory, is_active, created_at, updated_at
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12)
            "#,
        )
        .bind(&product.id)
        .bind(&product.sku)
        .bind(&product.name)
        .bind(&product.description)
        .bind(product.price_cents)
        .bind(product.cost_cents)
        .bind(product.tax_rate_bps)
        .bind(product.stock_qty)
        .bind(product.track_inventory)
        .bind(product.is_active)
        .bind(product.created_at)
        .bind(product.updated_at)
        .execute(&self.pool)
        .await?;

        Ok(product)
    }

    async fn get_product(&self, id: &str) -> StoreResult<Option<Product>> {
        let product = sqlx::query_as::<_, Product>(&format!(
            "SELECT {PRODUCT_COLS} FROM products WHERE id = ?1"
        ))
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(product)
    }

    async fn get_product_by_sku(&self, sku: &str) -> StoreResult<Option<Product>> {
        let product = sqlx::query_as::<_, Product>(&format!(
            "SELECT {PRODUCT_COLS} FROM products WHERE sku = ?1"
        ))
        .bind(sku)
        .fetch_optional(&self.pool)
        .await?;

        Ok(product)
    }

    async fn list_products(&self) -> StoreResult<Vec<Product>> {
        let products = sqlx::query_as::<_, Product>(&format!(
            "SELECT {PRODUCT_COLS} FROM products ORDER BY name, id"
        ))
        .fetch_all(&self.pool)
        .await?;

        Ok(products)
    }

    async fn update_product(&self, product: Product) -> StoreResult<Product> {
        let result = sqlx::query(
            r#"
            UPDATE products SET
                sku = ?2, name = ?3, description = ?4, price_cents = ?5,
                cost_cents = ?6, tax_rate_bps = ?7, stock_qty = ?8,
                track_inventory = ?9, is_active = ?10, updated_at = ?11
            WHERE id = ?1
            "#,
        )
        .bind(&product.id)
        .bind(&product.sku)
        .bind(&product.name)
        .bind(&product.description)
        .bind(product.price_cents)
        .bind(product.cost_cents)
        .bind(product.tax_rate_bps)
        .bind(product.stock_qty)
        .bind(product.track_inventory)
        .bind(product.is_active)
        .bind(Utc::now())
        .execute(&self.pool)
        .await?;

        if result.rows_affected() == 0 {
            return Err(StoreError::not_found("Product", &product.id));
        }

        Ok(product)
    }

    async fn deactivate_product(&self, id: &str) -> StoreResult<()> {
        let result =
            sqlx::query("UPDATE products SET is_active = 0, updated_at = ?2 WHERE id = ?1")
                .bind(id)
                .bind(Utc::now())
                .execute(&self.pool)
                .await?;

        if result.rows_affected() == 0 {
            return Err(StoreError::not_found("Product", id));
        }

        Ok(())
    }

    async fn adjust_stock(
        &self,
        product_id: &str,
        delta: i64,
        clamp_at_zero: bool,
    ) -> StoreResult<i64> {
        let mut conn = self.pool.acquire().await?;
        adjust_stock_on(&mut conn, product_id, delta, clamp_at_zero).await
    }

    // -------------------------------------------------------------------------
    // Sales
    // -------------------------------------------------------------------------

    async fn get_sale(&self, id: &str) -> StoreResult<Option<Sale>> {
        let sale =
            sqlx::query_as::<_, Sale>(&format!("SELECT {SALE_COLS} FROM sales WHERE id = ?1"))
                .bind(id)
                .fetch_optional(&self.pool)
                .await?;

        Ok(sale)
    }

    async fn list_sales(&self) -> StoreResult<Vec<Sale>> {
        let sales = sqlx::query_as::<_, Sale>(&format!(
            "SELECT {SALE_COLS} FROM sales ORDER BY created_at DESC, id"
        ))
        .fetch_all(&self.pool)
        .await?;

        Ok(sales)
    }

    async fn get_sale_items(&self, sale_id: &str) -> StoreResult<Vec<SaleItem>> {
        let items = sqlx::query_as::<_, SaleItem>(
            r#"
            SELECT id, sale_id, product_id, sku_snapshot, name_snapshot,
                   unit_price_cents, quantity, line_total_cents, tax_cents, created_at
            FROM sale_items
            WHERE sale_id = ?1
            ORDER BY created_at, id
            "#,
        )
        .bind(sale_id)
        .fetch_all(&self.pool)
        .await?;

        Ok(items)
    }

    async fn get_payments(&self, sale_id: &str) -> StoreResult<Vec<Payment>> {
        let payments = sqlx::query_as::<_, Payment>(
            r#"
            SELECT id, sale_id, method, amount_cents, reference, created_at
            FROM payments
            WHERE sale_id = ?1
            ORDER BY created_at, id
            "#,
        )
        .bind(sale_id)
        .fetch_all(&self.pool)
        .await?;

        Ok(payments)
    }

    /// Cascade delete in one transaction: items and payments go first,
    /// then the header.
    async fn delete_sale(&self, id: &str) -> StoreResult<()> {
        let mut tx = self
            .pool
            .begin()
            .await
            .map_err(|e| StoreError::TransactionFailed(e.to_string()))?;

        sqlx::query("DELETE FROM sale_items WHERE sale_id = ?1")
            .bind(id)
            .execute(tx.as_mut())
            .await?;

        sqlx::query("DELETE FROM payments WHERE sale_id = ?1")
            .bind(id)
            .execute(tx.as_mut())
            .await?;

        let result = sqlx::query("DELETE FROM sales WHERE id = ?1")
            .bind(id)
            .execute(tx.as_mut())
            .await?;

        if result.rows_affected() == 0 {
            tx.rollback()
                .await
                .map_err(|e| StoreError::TransactionFailed(e.to_string()))?;
            return Err(StoreError::not_found("Sale", id));
        }

        tx.commit()
            .await
            .map_err(|e| StoreError::TransactionFailed(e.to_string()))?;

        Ok(())
    }

    // -------------------------------------------------------------------------
    // Users
    // -------------------------------------------------------------------------

    async fn create_user(&self, user: User) -> StoreResult<User> {
        debug!(username = %user.username, "Creating user");

        sqlx::query(
            r#"
            INSERT INTO users (
                id, username, email, first_name, last_name, role,
                is_active, created_at, updated_at, last_login_at
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10)
            "#,
        )
        .bind(&user.id)
        .bind(&user.username)
        .bind(&user.email)
        .bind(&user.first_name)
        .bind(&user.last_name)
        .bind(user.role)
        .bind(user.is_active)
        .bind(user.created_at)
        .bind(user.updated_at)
        .bind(user.last_login_at)
        .execute(&self.pool)
        .await?;

        Ok(user)
    }

    async fn get_user(&self, id: &str) -> StoreResult<Option<User>> {
        let user =
            sqlx::query_as::<_, User>(&format!("SELECT {USER_COLS} FROM users WHERE id = ?1"))
                .bind(id)
                .fetch_optional(&self.pool)
                .await?;

        Ok(user)
    }

    async fn get_user_by_username(&self, username: &str) -> StoreResult<Option<User>> {
        let user = sqlx::query_as::<_, User>(&format!(
            "SELECT {USER_COLS} FROM users WHERE username = ?1"
        ))
        .bind(username)
        .fetch_optional(&self.pool)
        .await?;

        Ok(user)
    }

    async fn get_user_by_email(&self, email: &str) -> StoreResult<Option<User>> {
        let user =
            sqlx::query_as::<_, User>(&format!("SELECT {USER_COLS} FROM users WHERE email = ?1"))
                .bind(email)
                .fetch_optional(&self.pool)
                .await?;

        Ok(user)
    }

    async fn list_users(&self) -> StoreResult<Vec<User>> {
        let users = sqlx::query_as::<_, User>(&format!(
            "SELECT {USER_COLS} FROM users ORDER BY username"
        ))
        .fetch_all(&self.pool)
        .await?;

        Ok(users)
    }

    async fn update_user(&self, user: User) -> StoreResult<User> {
        let result = sqlx::query(
            r#"
            UPDATE users SET
                username = ?2, email = ?3, first_name = ?4, last_name = ?5,
                role = ?6, is_active = ?7, updated_at = ?8, last_login_at = ?9
            WHERE id = ?1
            "#,
        )
        .bind(&user.id)
        .bind(&user.username)
        .bind(&user.email)
        .bind(&user.first_name)
        .bind(&user.last_name)
        .bind(user.role)
        .bind(user.is_active)
        .bind(Utc::now())
        .bind(user.last_login_at)
        .execute(&self.pool)
        .await?;

        if result.rows_affected() == 0 {
            return Err(StoreError::not_found("User", &user.id));
        }

        Ok(user)
    }

    async fn delete_user(&self, id: &str) -> StoreResult<()> {
        // Credentials, sessions, and profile go with the user via
        // ON DELETE CASCADE.
        let result = sqlx::query("DELETE FROM users WHERE id = ?1")
            .bind(id)
            .execute(&self.pool)
            .await?;

        if result.rows_affected() == 0 {
            return Err(StoreError::not_found("User", id));
        }

        Ok(())
    }

    // -------------------------------------------------------------------------
    // Credentials
    // -------------------------------------------------------------------------

    async fn set_password_hash(&self, user_id: &str, hash: &str) -> StoreResult<()> {
        sqlx::query(
            r#"
            INSERT INTO credentials (user_id, password_hash, updated_at)
            VALUES (?1, ?2, ?3)
            ON CONFLICT(user_id) DO UPDATE SET password_hash = ?2, updated_at = ?3
            "#,
        )
        .bind(user_id)
        .bind(hash)
        .bind(Utc::now())
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    async fn get_password_hash(&self, user_id: &str) -> StoreResult<Option<String>> {
        let hash: Option<String> =
            sqlx::query_scalar("SELECT password_hash FROM credentials WHERE user_id = ?1")
                .bind(user_id)
                .fetch_optional(&self.pool)
                .await?;

        Ok(hash)
    }

    // -------------------------------------------------------------------------
    // Sessions
    // -------------------------------------------------------------------------

    async fn save_session(&self, session: AuthSession) -> StoreResult<AuthSession> {
        sqlx::query(
            r#"
            INSERT INTO sessions (id, user_id, token, expires_at, created_at)
            VALUES (?1, ?2, ?3, ?4, ?5)
            "#,
        )
        .bind(&session.id)
        .bind(&session.user_id)
        .bind(&session.token)
        .bind(session.expires_at)
        .bind(session.created_at)
        .execute(&self.pool)
        .await?;

        Ok(session)
    }

    async fn get_session_by_token(&self, token: &str) -> StoreResult<Option<AuthSession>> {
        let session = sqlx::query_as::<_, AuthSession>(
            "SELECT id, user_id, token, expires_at, created_at FROM sessions WHERE token = ?1",
        )
        .bind(token)
        .fetch_optional(&self.pool)
        .await?;

        Ok(session)
    }

    async fn delete_session(&self, token: &str) -> StoreResult<()> {
        // Idempotent: clearing an already-gone token is not an error.
        sqlx::query("DELETE FROM sessions WHERE token = ?1")
            .bind(token)
            .execute(&self.pool)
            .await?;

        Ok(())
    }

    async fn purge_expired_sessions(&self, now: DateTime<Utc>) -> StoreResult<u64> {
        let result = sqlx::query("DELETE FROM sessions WHERE expires_at <= ?1")
            .bind(now)
            .execute(&self.pool)
            .await?;

        let purged = result.rows_affected();
        if purged > 0 {
            debug!(purged, "Purged expired sessions");
        }
        Ok(purged)
    }

    // -------------------------------------------------------------------------
    // Audit Log
    // -------------------------------------------------------------------------

    async fn append_audit(&self, entry: AuditLog) -> StoreResult<()> {
        let detail = entry
            .detail
            .as_ref()
            .map(|d| serde_json::to_string(d).unwrap_or_default());

        sqlx::query(
            r#"
            INSERT INTO audit_logs (id, user_id, action, resource, detail, created_at)
            VALUES (?1, ?2, ?3, ?4, ?5, ?6)
            "#,
        )
        .bind(&entry.id)
        .bind(&entry.user_id)
        .bind(&entry.action)
        .bind(&entry.resource)
        .bind(detail)
        .bind(entry.created_at)
        .execute(&self.pool)
        .await?;

        // Uniform retention: drop the oldest entries past the cap.
        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM audit_logs")
            .fetch_one(&self.pool)
            .await?;
        let excess = self.retention.excess(count as usize);
        if excess > 0 {
            sqlx::query(
                r#"
                DELETE FROM audit_logs WHERE id IN (
                    SELECT id FROM audit_logs ORDER BY created_at ASC, id ASC LIMIT ?1
                )
                "#,
            )
            .bind(excess as i64)
            .execute(&self.pool)
            .await?;
        }

        Ok(())
    }

    async fn list_audit(&self) -> StoreResult<Vec<AuditLog>> {
        let rows = sqlx::query(
            r#"
            SELECT id, user_id, action, resource, detail, created_at
            FROM audit_logs
            ORDER BY created_at ASC, id ASC
            "#,
        )
        .fetch_all(&self.pool)
        .await?;

        let mut entries = Vec::with_capacity(rows.len());
        for row in rows {
            let detail: Option<String> = row.try_get("detail")?;
            entries.push(AuditLog {
                id: row.try_get("id")?,
                user_id: row.try_get("user_id")?,
                action: row.try_get("action")?,
                resource: row.try_get("resource")?,
                detail: detail.and_then(|d| serde_json::from_str(&d).ok()),
                created_at: row.try_get("created_at")?,
            });
        }

        Ok(entries)
    }

    // -------------------------------------------------------------------------
    // Settings & Profiles
    // -------------------------------------------------------------------------

    async fn get_settings(&self) -> StoreResult<BusinessSettings> {
        let settings = sqlx::query_as::<_, BusinessSettings>(
            r#"
            SELECT store_name, currency_code, default_tax_rate_bps, receipt_footer, updated_at
            FROM business_settings WHERE id = 1
            "#,
        )
        .fetch_optional(&self.pool)
        .await?;

        if let Some(settings) = settings {
            return Ok(settings);
        }

        // First access: materialize the defaults.
        let defaults = BusinessSettings::defaults(Utc::now());
        sqlx::query(
            r#"
            INSERT OR IGNORE INTO business_settings
                (id, store_name, currency_code, default_tax_rate_bps, receipt_footer, updated_at)
            VALUES (1, ?1, ?2, ?3, ?4, ?5)
            "#,
        )
        .bind(&defaults.store_name)
        .bind(&defaults.currency_code)
        .bind(defaults.default_tax_rate_bps)
        .bind(&defaults.receipt_footer)
        .bind(defaults.updated_at)
        .execute(&self.pool)
        .await?;

        Ok(defaults)
    }

    async fn save_settings(&self, settings: BusinessSettings) -> StoreResult<BusinessSettings> {
        sqlx::query(
            r#"
            INSERT INTO business_settings
                (id, store_name, currency_code, default_tax_rate_bps, receipt_footer, updated_at)
            VALUES (1, ?1, ?2, ?3, ?4, ?5)
            ON CONFLICT(id) DO UPDATE SET
                store_name = ?1, currency_code = ?2, default_tax_rate_bps = ?3,
                receipt_footer = ?4, updated_at = ?5
            "#,
        )
        .bind(&settings.store_name)
        .bind(&settings.currency_code)
        .bind(settings.default_tax_rate_bps)
        .bind(&settings.receipt_footer)
        .bind(settings.updated_at)
        .execute(&self.pool)
        .await?;

        Ok(settings)
    }

    async fn get_profile(&self, user_id: &str) -> StoreResult<UserProfile> {
        let profile = sqlx::query_as::<_, UserProfile>(
            r#"
            SELECT user_id, theme, notifications_enabled, updated_at
            FROM user_profiles WHERE user_id = ?1
            "#,
        )
        .bind(user_id)
        .fetch_optional(&self.pool)
        .await?;

        if let Some(profile) = profile {
            return Ok(profile);
        }

        let defaults = UserProfile::defaults(user_id, Utc::now());
        sqlx::query(
            r#"
            INSERT OR IGNORE INTO user_profiles (user_id, theme, notifications_enabled, updated_at)
            VALUES (?1, ?2, ?3, ?4)
            "#,
        )
        .bind(&defaults.user_id)
        .bind(defaults.theme)
        .bind(defaults.notifications_enabled)
        .bind(defaults.updated_at)
        .execute(&self.pool)
        .await?;

        Ok(defaults)
    }

    async fn save_profile(&self, profile: UserProfile) -> StoreResult<UserProfile> {
        sqlx::query(
            r#"
            INSERT INTO user_profiles (user_id, theme, notifications_enabled, updated_at)
            VALUES (?1, ?2, ?3, ?4)
            ON CONFLICT(user_id) DO UPDATE SET
                theme = ?2, notifications_enabled = ?3, updated_at = ?4
            "#,
        )
        .bind(&profile.user_id)
        .bind(profile.theme)
        .bind(profile.notifications_enabled)
        .bind(profile.updated_at)
        .execute(&self.pool)
        .await?;

        Ok(profile)
    }

    // -------------------------------------------------------------------------
    // Aggregates
    // -------------------------------------------------------------------------

    async fn get_stats(&self) -> StoreResult<StoreStats> {
        let product_count: i64 =
            sqlx::query_scalar("SELECT COUNT(*) FROM products WHERE is_active = 1")
                .fetch_one(&self.pool)
                .await?;

        let completed_sales: i64 =
            sqlx::query_scalar("SELECT COUNT(*) FROM sales WHERE status = 'completed'")
                .fetch_one(&self.pool)
                .await?;

        let cancelled_sales: i64 =
            sqlx::query_scalar("SELECT COUNT(*) FROM sales WHERE status = 'cancelled'")
                .fetch_one(&self.pool)
                .await?;

        let revenue_cents: i64 = sqlx::query_scalar(
            "SELECT COALESCE(SUM(total_cents), 0) FROM sales WHERE status = 'completed'",
        )
        .fetch_one(&self.pool)
        .await?;

        let tax_collected_cents: i64 = sqlx::query_scalar(
            "SELECT COALESCE(SUM(tax_cents), 0) FROM sales WHERE status = 'completed'",
        )
        .fetch_one(&self.pool)
        .await?;

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
        let rows = sqlx::query(
            r#"
            SELECT date(created_at) AS day,
                   COUNT(*) AS sales_count,
                   COALESCE(SUM(total_cents), 0) AS revenue_cents,
                   COALESCE(SUM(tax_cents), 0) AS tax_cents
            FROM sales
            WHERE status = 'completed'
              AND date(created_at) >= ?1
              AND date(created_at) <= ?2
            GROUP BY day
            ORDER BY day
            "#,
        )
        .bind(from.to_string())
        .bind(to.to_string())
        .fetch_all(&self.pool)
        .await?;

        let mut summaries = Vec::with_capacity(rows.len());
        for row in rows {
            let day: String = row.try_get("day")?;
            let date = NaiveDate::from_str(&day)
                .map_err(|e| StoreError::Internal(format!("bad summary date '{day}': {e}")))?;
            summaries.push(DailySalesSummary {
                date,
                sales_count: row.try_get("sales_count")?,
                revenue_cents: row.try_get("revenue_cents")?,
                tax_cents: row.try_get("tax_cents")?,
            });
        }

        Ok(summaries)
    }
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn in_memory_database_opens_and_migrates() {
        let store = SqliteStore::open(SqliteConfig::in_memory()).await.unwrap();
        assert!(store.health_check().await);
        assert_eq!(store.backend_name(), "sqlite");
    }

    #[tokio::test]
    async fn config_builder() {
        let config = SqliteConfig::new("/tmp/lumen-test.db")
            .max_connections(10)
            .min_connections(2)
            .run_migrations(false);

        assert_eq!(config.max_connections, 10);
        assert_eq!(config.min_connections, 2);
        assert!(!config.run_migrations);
    }
}

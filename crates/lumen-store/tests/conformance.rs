//! Conformance suite for the storage contract.
//!
//! Every test here runs the same assertions against BOTH backends so
//! behavioral drift between them is caught mechanically. The one known,
//! intentional divergence - batch atomicity - gets a dedicated pair of
//! per-backend tests at the bottom that pin down the gap instead of
//! letting it hide.

use std::sync::Arc;

use chrono::{Duration, Utc};

use lumen_core::{
    AuditLog, AuthSession, Payment, Product, Role, Sale, SaleItem, SaleStatus, TenderMethod,
    Theme, User,
};
use lumen_store::{
    MemoryConfig, MemoryStore, RetentionPolicy, SqliteConfig, SqliteStore, Storage, StoreError,
    WriteBatch, WriteOp,
};

// =============================================================================
// Fixtures
// =============================================================================

async fn backends() -> Vec<Arc<dyn Storage>> {
    backends_with_retention(RetentionPolicy::unbounded()).await
}

async fn backends_with_retention(retention: RetentionPolicy) -> Vec<Arc<dyn Storage>> {
    let sqlite = SqliteStore::open(SqliteConfig::in_memory().retention(retention))
        .await
        .expect("sqlite backend opens");
    let memory = MemoryStore::open(MemoryConfig::ephemeral().retention(retention));
    vec![Arc::new(sqlite), Arc::new(memory)]
}

fn product(id: &str, sku: &str, price_cents: i64, stock_qty: i64) -> Product {
    let now = Utc::now();
    Product {
        id: id.to_string(),
        sku: sku.to_string(),
        name: format!("Product {}", sku),
        description: None,
        price_cents,
        cost_cents: Some(price_cents / 2),
        tax_rate_bps: 800,
        stock_qty,
        track_inventory: true,
        is_active: true,
        created_at: now,
        updated_at: now,
    }
}

fn user(id: &str, username: &str, email: &str, role: Role) -> User {
    let now = Utc::now();
    User {
        id: id.to_string(),
        username: username.to_string(),
        email: email.to_string(),
        first_name: "Test".to_string(),
        last_name: "User".to_string(),
        role,
        is_active: true,
        created_at: now,
        updated_at: now,
        last_login_at: None,
    }
}

fn completed_sale(id: &str, total_cents: i64, tax_cents: i64) -> Sale {
    let now = Utc::now();
    Sale {
        id: id.to_string(),
        status: SaleStatus::Completed,
        subtotal_cents: total_cents - tax_cents,
        tax_cents,
        discount_cents: 0,
        total_cents,
        cashier_id: None,
        note: None,
        created_at: now,
        completed_at: Some(now),
        cancelled_at: None,
        cancel_reason: None,
    }
}

fn sale_item(id: &str, sale_id: &str, product: &Product, quantity: i64) -> SaleItem {
    SaleItem {
        id: id.to_string(),
        sale_id: sale_id.to_string(),
        product_id: product.id.clone(),
        sku_snapshot: product.sku.clone(),
        name_snapshot: product.name.clone(),
        unit_price_cents: product.price_cents,
        quantity,
        line_total_cents: product.price_cents * quantity,
        tax_cents: 0,
        created_at: Utc::now(),
    }
}

fn payment(id: &str, sale_id: &str, amount_cents: i64) -> Payment {
    Payment {
        id: id.to_string(),
        sale_id: sale_id.to_string(),
        method: TenderMethod::Cash,
        amount_cents,
        reference: None,
        created_at: Utc::now(),
    }
}

fn audit(id: &str, action: &str) -> AuditLog {
    AuditLog {
        id: id.to_string(),
        user_id: None,
        action: action.to_string(),
        resource: "test".to_string(),
        detail: None,
        created_at: Utc::now(),
    }
}

// =============================================================================
// Product CRUD
// =============================================================================

#[tokio::test]
async fn product_crud_and_sku_lookup() {
    for store in backends().await {
        let created = store
            .create_product(product("p1", "COKE-330", 250, 24))
            .await
            .unwrap();
        assert_eq!(created.sku, "COKE-330");

        // Read-after-write, by id and by unique key.
        let by_id = store.get_product("p1").await.unwrap().unwrap();
        assert_eq!(by_id.price_cents, 250);
        let by_sku = store.get_product_by_sku("COKE-330").await.unwrap().unwrap();
        assert_eq!(by_sku.id, "p1");

        // Absent reads are Ok(None), never errors.
        assert!(store.get_product("nope").await.unwrap().is_none());
        assert!(store.get_product_by_sku("nope").await.unwrap().is_none());

        // Update round-trips.
        let mut updated = by_id.clone();
        updated.price_cents = 275;
        store.update_product(updated).await.unwrap();
        let reread = store.get_product("p1").await.unwrap().unwrap();
        assert_eq!(reread.price_cents, 275);

        // Soft delete keeps the row but deactivates it.
        store.deactivate_product("p1").await.unwrap();
        let inactive = store.get_product("p1").await.unwrap().unwrap();
        assert!(!inactive.is_active);

        assert_eq!(store.list_products().await.unwrap().len(), 1);
    }
}

#[tokio::test]
async fn duplicate_sku_rejected() {
    for store in backends().await {
        store
            .create_product(product("p1", "SKU-A", 100, 0))
            .await
            .unwrap();
        let err = store
            .create_product(product("p2", "SKU-A", 100, 0))
            .await
            .unwrap_err();
        assert!(
            matches!(err, StoreError::UniqueViolation { .. }),
            "{}: expected unique violation, got {err:?}",
            store.backend_name()
        );
    }
}

#[tokio::test]
async fn stock_adjustment_clamps_or_goes_negative_as_requested() {
    for store in backends().await {
        store
            .create_product(product("p1", "SKU-A", 100, 3))
            .await
            .unwrap();

        // Clamped: 3 - 5 → 0, sale not blocked.
        let qty = store.adjust_stock("p1", -5, true).await.unwrap();
        assert_eq!(qty, 0);

        // Unclamped: 0 - 2 → -2 when negative stock is allowed.
        let qty = store.adjust_stock("p1", -2, false).await.unwrap();
        assert_eq!(qty, -2);

        // Restock brings it back up.
        let qty = store.adjust_stock("p1", 10, true).await.unwrap();
        assert_eq!(qty, 8);

        let err = store.adjust_stock("missing", -1, true).await.unwrap_err();
        assert!(matches!(err, StoreError::NotFound { .. }));
    }
}

// =============================================================================
// Users & Credentials
// =============================================================================

#[tokio::test]
async fn user_crud_and_unique_keys() {
    for store in backends().await {
        store
            .create_user(user("u1", "jane", "jane@example.com", Role::Admin))
            .await
            .unwrap();

        let by_username = store.get_user_by_username("jane").await.unwrap().unwrap();
        assert_eq!(by_username.id, "u1");
        let by_email = store
            .get_user_by_email("jane@example.com")
            .await
            .unwrap()
            .unwrap();
        assert_eq!(by_email.id, "u1");

        let dup_username = store
            .create_user(user("u2", "jane", "other@example.com", Role::Cashier))
            .await
            .unwrap_err();
        assert!(matches!(dup_username, StoreError::UniqueViolation { .. }));

        let dup_email = store
            .create_user(user("u3", "john", "jane@example.com", Role::Cashier))
            .await
            .unwrap_err();
        assert!(matches!(dup_email, StoreError::UniqueViolation { .. }));

        // Credential is opaque and keyed by user id.
        store.set_password_hash("u1", "$argon2id$stub").await.unwrap();
        assert_eq!(
            store.get_password_hash("u1").await.unwrap().as_deref(),
            Some("$argon2id$stub")
        );
        assert!(store.get_password_hash("u9").await.unwrap().is_none());

        // Deleting the user clears the credential with it.
        store.delete_user("u1").await.unwrap();
        assert!(store.get_user("u1").await.unwrap().is_none());
        assert!(store.get_password_hash("u1").await.unwrap().is_none());
    }
}

#[tokio::test]
async fn writes_referencing_a_missing_user_are_rejected() {
    for store in backends().await {
        let err = store
            .set_password_hash("ghost", "$argon2id$stub")
            .await
            .unwrap_err();
        assert!(
            matches!(err, StoreError::ForeignKeyViolation { .. }),
            "{}: credential for missing user, got {err:?}",
            store.backend_name()
        );

        let now = Utc::now();
        let orphan = AuthSession {
            id: "s1".to_string(),
            user_id: "ghost".to_string(),
            token: "tok".to_string(),
            expires_at: now + Duration::hours(8),
            created_at: now,
        };
        let err = store.save_session(orphan).await.unwrap_err();
        assert!(matches!(err, StoreError::ForeignKeyViolation { .. }));

        let err = store.get_profile("ghost").await.unwrap_err();
        assert!(matches!(err, StoreError::ForeignKeyViolation { .. }));
    }
}

// =============================================================================
// Sessions
// =============================================================================

#[tokio::test]
async fn session_lifecycle_and_expiry_sweep() {
    for store in backends().await {
        store
            .create_user(user("u1", "jane", "jane@example.com", Role::Cashier))
            .await
            .unwrap();

        let now = Utc::now();
        let live = AuthSession {
            id: "s1".to_string(),
            user_id: "u1".to_string(),
            token: "tok-live".to_string(),
            expires_at: now + Duration::hours(8),
            created_at: now,
        };
        let stale = AuthSession {
            id: "s2".to_string(),
            user_id: "u1".to_string(),
            token: "tok-stale".to_string(),
            expires_at: now - Duration::seconds(1),
            created_at: now - Duration::hours(9),
        };

        store.save_session(live.clone()).await.unwrap();
        store.save_session(stale).await.unwrap();

        let found = store.get_session_by_token("tok-live").await.unwrap();
        assert_eq!(found.unwrap().id, "s1");

        // The sweep purges only what is expired.
        let purged = store.purge_expired_sessions(now).await.unwrap();
        assert_eq!(purged, 1);
        assert!(store
            .get_session_by_token("tok-stale")
            .await
            .unwrap()
            .is_none());
        assert!(store
            .get_session_by_token("tok-live")
            .await
            .unwrap()
            .is_some());

        // Deleting is idempotent: clearing a gone token is fine.
        store.delete_session("tok-live").await.unwrap();
        store.delete_session("tok-live").await.unwrap();
        assert!(store
            .get_session_by_token("tok-live")
            .await
            .unwrap()
            .is_none());

        // Duplicate tokens are rejected like any unique key.
        store.save_session(live.clone()).await.unwrap();
        let mut clashing = live.clone();
        clashing.id = "s3".to_string();
        let err = store.save_session(clashing).await.unwrap_err();
        assert!(matches!(err, StoreError::UniqueViolation { .. }));
    }
}

// =============================================================================
// Settings & Profiles
// =============================================================================

#[tokio::test]
async fn settings_default_on_first_access_then_roundtrip() {
    for store in backends().await {
        let first = store.get_settings().await.unwrap();
        assert_eq!(first.store_name, "Lumen POS");
        assert_eq!(first.currency_code, "USD");

        let mut edited = first.clone();
        edited.store_name = "Corner Shop".to_string();
        edited.default_tax_rate_bps = 825;
        store.save_settings(edited).await.unwrap();

        let reread = store.get_settings().await.unwrap();
        assert_eq!(reread.store_name, "Corner Shop");
        assert_eq!(reread.default_tax_rate_bps, 825);
    }
}

#[tokio::test]
async fn profile_default_on_first_access_then_roundtrip() {
    for store in backends().await {
        store
            .create_user(user("u1", "jane", "jane@example.com", Role::Cashier))
            .await
            .unwrap();

        let first = store.get_profile("u1").await.unwrap();
        assert_eq!(first.theme, Theme::System);
        assert!(first.notifications_enabled);

        let mut edited = first.clone();
        edited.theme = Theme::Dark;
        edited.notifications_enabled = false;
        store.save_profile(edited).await.unwrap();

        let reread = store.get_profile("u1").await.unwrap();
        assert_eq!(reread.theme, Theme::Dark);
        assert!(!reread.notifications_enabled);
    }
}

// =============================================================================
// Audit Log
// =============================================================================

#[tokio::test]
async fn audit_retention_is_uniform_across_backends() {
    for store in backends_with_retention(RetentionPolicy::keep_latest(3)).await {
        for i in 1..=5 {
            store
                .append_audit(audit(&format!("a{i}"), &format!("action.{i}")))
                .await
                .unwrap();
        }

        let entries = store.list_audit().await.unwrap();
        assert_eq!(
            entries.len(),
            3,
            "{}: retention must cap the log",
            store.backend_name()
        );
        // Oldest dropped first, newest kept.
        let actions: Vec<&str> = entries.iter().map(|e| e.action.as_str()).collect();
        assert_eq!(actions, vec!["action.3", "action.4", "action.5"]);
    }
}

#[tokio::test]
async fn audit_detail_payload_roundtrips() {
    for store in backends().await {
        let mut entry = audit("a1", "auth.login");
        entry.user_id = Some("u1".to_string());
        entry.detail = Some(serde_json::json!({ "username": "jane" }));
        store.append_audit(entry).await.unwrap();

        let entries = store.list_audit().await.unwrap();
        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].user_id.as_deref(), Some("u1"));
        assert_eq!(
            entries[0].detail.as_ref().unwrap()["username"],
            serde_json::json!("jane")
        );
    }
}

// =============================================================================
// Aggregates
// =============================================================================

#[tokio::test]
async fn stats_consider_completed_sales_only() {
    for store in backends().await {
        store
            .create_product(product("p1", "SKU-A", 1000, 10))
            .await
            .unwrap();

        let mut batch = WriteBatch::new();
        batch.push(WriteOp::InsertSale(completed_sale("s1", 2160, 160)));
        batch.push(WriteOp::InsertSale(completed_sale("s2", 1080, 80)));
        let mut cancelled = completed_sale("s3", 5000, 370);
        cancelled.status = SaleStatus::Cancelled;
        batch.push(WriteOp::InsertSale(cancelled));
        store.execute_batch(batch).await.unwrap();

        let stats = store.get_stats().await.unwrap();
        assert_eq!(stats.product_count, 1);
        assert_eq!(stats.completed_sales, 2);
        assert_eq!(stats.cancelled_sales, 1);
        // Cancelled totals are excluded from every monetary aggregate.
        assert_eq!(stats.revenue_cents, 3240);
        assert_eq!(stats.tax_collected_cents, 240);
        assert_eq!(stats.average_sale_cents, 1620);
    }
}

#[tokio::test]
async fn sales_summary_groups_completed_sales_by_day() {
    for store in backends().await {
        let mut batch = WriteBatch::new();
        batch.push(WriteOp::InsertSale(completed_sale("s1", 1000, 0)));
        batch.push(WriteOp::InsertSale(completed_sale("s2", 500, 40)));
        let mut cancelled = completed_sale("s3", 9999, 999);
        cancelled.status = SaleStatus::Cancelled;
        batch.push(WriteOp::InsertSale(cancelled));
        store.execute_batch(batch).await.unwrap();

        let today = Utc::now().date_naive();
        let summaries = store.sales_summary_by_date(today, today).await.unwrap();

        assert_eq!(summaries.len(), 1, "{}", store.backend_name());
        assert_eq!(summaries[0].date, today);
        assert_eq!(summaries[0].sales_count, 2);
        assert_eq!(summaries[0].revenue_cents, 1500);
        assert_eq!(summaries[0].tax_cents, 40);

        // An empty window yields an empty summary.
        let yesterday = today - Duration::days(1);
        let none = store
            .sales_summary_by_date(yesterday, yesterday)
            .await
            .unwrap();
        assert!(none.is_empty());
    }
}

// =============================================================================
// Cascade delete
// =============================================================================

#[tokio::test]
async fn delete_sale_cascades_into_items_and_payments() {
    for store in backends().await {
        let p = product("p1", "SKU-A", 1000, 10);
        store.create_product(p.clone()).await.unwrap();

        let mut batch = WriteBatch::new();
        batch.push(WriteOp::InsertSale(completed_sale("s1", 2000, 0)));
        batch.push(WriteOp::InsertSaleItem(sale_item("i1", "s1", &p, 2)));
        batch.push(WriteOp::InsertPayment(payment("pay1", "s1", 2000)));
        store.execute_batch(batch).await.unwrap();

        store.delete_sale("s1").await.unwrap();

        assert!(store.get_sale("s1").await.unwrap().is_none());
        assert!(store.get_sale_items("s1").await.unwrap().is_empty());
        assert!(store.get_payments("s1").await.unwrap().is_empty());
    }
}

// =============================================================================
// Batch execution
// =============================================================================

#[tokio::test]
async fn successful_batch_is_fully_visible_afterwards() {
    for store in backends().await {
        let p = product("p1", "SKU-A", 1000, 10);
        store.create_product(p.clone()).await.unwrap();

        let mut batch = WriteBatch::new();
        batch.push(WriteOp::InsertSale(completed_sale("s1", 2160, 160)));
        batch.push(WriteOp::InsertSaleItem(sale_item("i1", "s1", &p, 2)));
        batch.push(WriteOp::InsertPayment(payment("pay1", "s1", 2500)));
        batch.push(WriteOp::InsertPayment(payment("pay2", "s1", -340)));
        batch.push(WriteOp::AdjustStock {
            product_id: "p1".to_string(),
            delta: -2,
            clamp_at_zero: true,
        });
        store.execute_batch(batch).await.unwrap();

        let sale = store.get_sale("s1").await.unwrap().unwrap();
        assert_eq!(sale.total_cents, 2160);
        assert_eq!(store.get_sale_items("s1").await.unwrap().len(), 1);
        assert_eq!(store.get_payments("s1").await.unwrap().len(), 2);
        assert_eq!(store.get_product("p1").await.unwrap().unwrap().stock_qty, 8);
    }
}

/// Builds a batch whose final op (the payment step) fails on every
/// backend: the second payment reuses the first payment's id.
fn poisoned_checkout_batch(p: &Product) -> WriteBatch {
    let mut batch = WriteBatch::new();
    batch.push(WriteOp::InsertSale(completed_sale("s1", 2160, 160)));
    batch.push(WriteOp::InsertSaleItem(sale_item("i1", "s1", p, 2)));
    batch.push(WriteOp::AdjustStock {
        product_id: p.id.clone(),
        delta: -2,
        clamp_at_zero: true,
    });
    batch.push(WriteOp::InsertPayment(payment("pay1", "s1", 2500)));
    batch.push(WriteOp::InsertPayment(payment("pay1", "s1", -340)));
    batch
}

#[tokio::test]
async fn sqlite_rolls_back_failed_batch_completely() {
    let store = SqliteStore::open(SqliteConfig::in_memory()).await.unwrap();
    let p = product("p1", "SKU-A", 1000, 10);
    store.create_product(p.clone()).await.unwrap();

    let err = store.execute_batch(poisoned_checkout_batch(&p)).await;
    assert!(err.is_err());

    // All-or-nothing: no sale, no items, no payments, stock untouched.
    assert!(store.get_sale("s1").await.unwrap().is_none());
    assert!(store.get_sale_items("s1").await.unwrap().is_empty());
    assert!(store.get_payments("s1").await.unwrap().is_empty());
    assert_eq!(
        store.get_product("p1").await.unwrap().unwrap().stock_qty,
        10
    );
}

/// The memory backend's known gap: a failed batch keeps every write
/// that preceded the failure. This test pins the divergence down so a
/// future fix (or regression) shows up as a test change, not a
/// production surprise.
#[tokio::test]
async fn memory_backend_keeps_partial_state_on_failed_batch() {
    let store = MemoryStore::open(MemoryConfig::ephemeral());
    let p = product("p1", "SKU-A", 1000, 10);
    store.create_product(p.clone()).await.unwrap();

    let err = store.execute_batch(poisoned_checkout_batch(&p)).await;
    assert!(err.is_err());

    // Partial state survives: sale, item, stock decrement, and the
    // first payment all landed before the failing op.
    assert!(store.get_sale("s1").await.unwrap().is_some());
    assert_eq!(store.get_sale_items("s1").await.unwrap().len(), 1);
    assert_eq!(store.get_payments("s1").await.unwrap().len(), 1);
    assert_eq!(store.get_product("p1").await.unwrap().unwrap().stock_qty, 8);
}

// =============================================================================
// Status transitions via batch
// =============================================================================

#[tokio::test]
async fn set_sale_status_stamps_cancellation_fields() {
    for store in backends().await {
        let mut batch = WriteBatch::new();
        batch.push(WriteOp::InsertSale(completed_sale("s1", 1000, 0)));
        store.execute_batch(batch).await.unwrap();

        let at = Utc::now();
        let mut batch = WriteBatch::new();
        batch.push(WriteOp::SetSaleStatus {
            sale_id: "s1".to_string(),
            status: SaleStatus::Cancelled,
            at,
            reason: Some("customer changed mind".to_string()),
        });
        store.execute_batch(batch).await.unwrap();

        let sale = store.get_sale("s1").await.unwrap().unwrap();
        assert_eq!(sale.status, SaleStatus::Cancelled);
        assert!(sale.cancelled_at.is_some());
        assert_eq!(sale.cancel_reason.as_deref(), Some("customer changed mind"));
    }
}

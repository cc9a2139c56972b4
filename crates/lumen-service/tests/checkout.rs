//! Checkout processor integration tests, run against both storage
//! backends through the same `Arc<dyn Storage>` the real application
//! injects.

use std::sync::Arc;

use chrono::Utc;

use lumen_core::{Cart, CoreError, Product, SaleStatus, TenderMethod};
use lumen_service::{CheckoutPolicy, CheckoutProcessor, ServiceError};
use lumen_store::{MemoryConfig, MemoryStore, SqliteConfig, SqliteStore, Storage};

// =============================================================================
// Fixtures
// =============================================================================

async fn stores() -> Vec<Arc<dyn Storage>> {
    let sqlite = SqliteStore::open(SqliteConfig::in_memory())
        .await
        .expect("sqlite backend opens");
    let memory = MemoryStore::open(MemoryConfig::ephemeral());
    vec![Arc::new(sqlite), Arc::new(memory)]
}

fn product(id: &str, sku: &str, price_cents: i64, tax_rate_bps: u32, stock_qty: i64) -> Product {
    let now = Utc::now();
    Product {
        id: id.to_string(),
        sku: sku.to_string(),
        name: format!("Product {}", sku),
        description: None,
        price_cents,
        cost_cents: None,
        tax_rate_bps,
        stock_qty,
        track_inventory: true,
        is_active: true,
        created_at: now,
        updated_at: now,
    }
}

fn processor(store: &Arc<dyn Storage>) -> CheckoutProcessor {
    CheckoutProcessor::new(store.clone(), CheckoutPolicy::default())
}

// =============================================================================
// The worked example
// =============================================================================

/// cart = [{price 10.00, qty 2}], 8% tax, cash 25.00 →
/// total 21.60, Payment(cash, 25.00) + Payment(cash, -3.40), stock -2.
#[tokio::test]
async fn checkout_cash_with_change() {
    for store in stores().await {
        let p = product("p1", "A", 1000, 800, 5);
        store.create_product(p.clone()).await.unwrap();

        let mut cart = Cart::new();
        cart.add_item(&p, 2).unwrap();

        let outcome = processor(&store)
            .checkout(&cart, TenderMethod::Cash, 2500, Some("cashier-1"))
            .await
            .unwrap();

        // Sale totals
        assert_eq!(outcome.sale.subtotal_cents, 2000);
        assert_eq!(outcome.sale.tax_cents, 160);
        assert_eq!(outcome.sale.total_cents, 2160);
        assert_eq!(outcome.sale.status, SaleStatus::Completed);
        assert_eq!(outcome.sale.cashier_id.as_deref(), Some("cashier-1"));

        // Two tenders: the cash handed over, and negative change.
        assert_eq!(outcome.payments.len(), 2);
        assert_eq!(outcome.payments[0].amount_cents, 2500);
        assert_eq!(outcome.payments[0].method, TenderMethod::Cash);
        assert_eq!(outcome.payments[1].amount_cents, -340);
        assert_eq!(outcome.payments[1].method, TenderMethod::Cash);

        // Receipt projection
        assert_eq!(outcome.receipt.total_cents, 2160);
        assert_eq!(outcome.receipt.tendered_cents, 2500);
        assert_eq!(outcome.receipt.change_cents, 340);
        assert_eq!(outcome.receipt.lines.len(), 1);
        assert_eq!(outcome.receipt.lines[0].quantity, 2);
        assert_eq!(outcome.receipt.lines[0].sku, "A");

        // Stock decremented by the sold quantity.
        let stock = store.get_product("p1").await.unwrap().unwrap().stock_qty;
        assert_eq!(stock, 3, "{}", store.backend_name());

        // Everything visible via the contract afterwards.
        let persisted = store.get_sale(&outcome.sale.id).await.unwrap().unwrap();
        assert_eq!(persisted.total_cents, 2160);
        assert_eq!(
            store.get_sale_items(&outcome.sale.id).await.unwrap().len(),
            1
        );
        assert_eq!(store.get_payments(&outcome.sale.id).await.unwrap().len(), 2);
    }
}

#[tokio::test]
async fn exact_payment_produces_single_tender_and_no_change() {
    for store in stores().await {
        let p = product("p1", "A", 1000, 800, 5);
        store.create_product(p.clone()).await.unwrap();

        let mut cart = Cart::new();
        cart.add_item(&p, 2).unwrap();

        let outcome = processor(&store)
            .checkout(&cart, TenderMethod::Card, 2160, None)
            .await
            .unwrap();

        assert_eq!(outcome.payments.len(), 1);
        assert_eq!(outcome.payments[0].method, TenderMethod::Card);
        assert_eq!(outcome.receipt.change_cents, 0);
    }
}

// =============================================================================
// Rejections (nothing persisted)
// =============================================================================

#[tokio::test]
async fn empty_cart_rejected() {
    for store in stores().await {
        let err = processor(&store)
            .checkout(&Cart::new(), TenderMethod::Cash, 1000, None)
            .await
            .unwrap_err();
        assert!(matches!(err, ServiceError::Core(CoreError::EmptyCart)));
    }
}

#[tokio::test]
async fn insufficient_payment_carries_both_amounts_and_persists_nothing() {
    for store in stores().await {
        let p = product("p1", "A", 1000, 800, 5);
        store.create_product(p.clone()).await.unwrap();

        let mut cart = Cart::new();
        cart.add_item(&p, 2).unwrap();

        let err = processor(&store)
            .checkout(&cart, TenderMethod::Cash, 2000, None)
            .await
            .unwrap_err();

        match err {
            ServiceError::Core(CoreError::InsufficientPayment {
                required_cents,
                received_cents,
            }) => {
                assert_eq!(required_cents, 2160);
                assert_eq!(received_cents, 2000);
            }
            other => panic!("expected InsufficientPayment, got {other:?}"),
        }

        // Rejected before persistence: no sale, stock untouched.
        assert!(store.list_sales().await.unwrap().is_empty());
        assert_eq!(store.get_product("p1").await.unwrap().unwrap().stock_qty, 5);
    }
}

#[tokio::test]
async fn cart_line_for_unknown_product_rejected() {
    for store in stores().await {
        // The product was never persisted; the cart only holds a copy.
        let ghost = product("ghost", "GONE", 500, 0, 1);
        let mut cart = Cart::new();
        cart.add_item(&ghost, 1).unwrap();

        let err = processor(&store)
            .checkout(&cart, TenderMethod::Cash, 1000, None)
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            ServiceError::Core(CoreError::ProductNotFound(_))
        ));
        assert!(store.list_sales().await.unwrap().is_empty());
    }
}

#[tokio::test]
async fn cart_line_for_deactivated_product_rejected() {
    for store in stores().await {
        let p = product("p1", "A", 1000, 0, 5);
        store.create_product(p.clone()).await.unwrap();
        store.deactivate_product("p1").await.unwrap();

        let mut cart = Cart::new();
        cart.add_item(&p, 1).unwrap();

        let err = processor(&store)
            .checkout(&cart, TenderMethod::Cash, 1000, None)
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            ServiceError::Core(CoreError::ProductInactive(_))
        ));
        assert!(store.list_sales().await.unwrap().is_empty());
    }
}

// =============================================================================
// Pricing source of truth
// =============================================================================

#[tokio::test]
async fn checkout_uses_current_catalog_price_not_the_cart_copy() {
    for store in stores().await {
        let p = product("p1", "A", 1000, 0, 5);
        store.create_product(p.clone()).await.unwrap();

        // Cart freezes $10.00 for display...
        let mut cart = Cart::new();
        cart.add_item(&p, 1).unwrap();

        // ...then the catalog price changes before checkout.
        let mut repriced = store.get_product("p1").await.unwrap().unwrap();
        repriced.price_cents = 1200;
        store.update_product(repriced).await.unwrap();

        let outcome = processor(&store)
            .checkout(&cart, TenderMethod::Cash, 1200, None)
            .await
            .unwrap();

        // The persisted line snapshots the price at time of sale.
        assert_eq!(outcome.sale.total_cents, 1200);
        assert_eq!(outcome.items[0].unit_price_cents, 1200);
    }
}

// =============================================================================
// Stock policy
// =============================================================================

#[tokio::test]
async fn oversell_clamps_stock_at_zero_by_default() {
    for store in stores().await {
        let p = product("p1", "A", 1000, 0, 1);
        store.create_product(p.clone()).await.unwrap();

        let mut cart = Cart::new();
        cart.add_item(&p, 3).unwrap();

        // The sale is NOT blocked; the stored stock clamps at zero.
        processor(&store)
            .checkout(&cart, TenderMethod::Cash, 3000, None)
            .await
            .unwrap();
        assert_eq!(store.get_product("p1").await.unwrap().unwrap().stock_qty, 0);
    }
}

#[tokio::test]
async fn oversell_goes_negative_when_policy_allows() {
    for store in stores().await {
        let p = product("p1", "A", 1000, 0, 1);
        store.create_product(p.clone()).await.unwrap();

        let mut cart = Cart::new();
        cart.add_item(&p, 3).unwrap();

        let lenient = CheckoutProcessor::new(
            store.clone(),
            CheckoutPolicy {
                allow_negative_stock: true,
            },
        );
        lenient
            .checkout(&cart, TenderMethod::Cash, 3000, None)
            .await
            .unwrap();
        assert_eq!(
            store.get_product("p1").await.unwrap().unwrap().stock_qty,
            -2
        );
    }
}

#[tokio::test]
async fn untracked_product_skips_stock_decrement() {
    for store in stores().await {
        let mut p = product("p1", "SVC", 5000, 0, 0);
        p.track_inventory = false;
        store.create_product(p.clone()).await.unwrap();

        let mut cart = Cart::new();
        cart.add_item(&p, 2).unwrap();

        processor(&store)
            .checkout(&cart, TenderMethod::Digital, 10000, None)
            .await
            .unwrap();
        assert_eq!(store.get_product("p1").await.unwrap().unwrap().stock_qty, 0);
    }
}

// =============================================================================
// Void
// =============================================================================

#[tokio::test]
async fn sell_then_void_restores_stock() {
    for store in stores().await {
        let p = product("p1", "A", 1000, 800, 5);
        store.create_product(p.clone()).await.unwrap();

        let mut cart = Cart::new();
        cart.add_item(&p, 2).unwrap();

        let checkout = processor(&store);
        let outcome = checkout
            .checkout(&cart, TenderMethod::Cash, 2500, None)
            .await
            .unwrap();
        assert_eq!(store.get_product("p1").await.unwrap().unwrap().stock_qty, 3);

        let voided = checkout
            .void_sale(&outcome.sale.id, "customer returned items")
            .await
            .unwrap();

        assert_eq!(voided.status, SaleStatus::Cancelled);
        assert_eq!(
            voided.cancel_reason.as_deref(),
            Some("customer returned items")
        );
        // Round-trip: stock is back to its pre-sale value.
        assert_eq!(store.get_product("p1").await.unwrap().unwrap().stock_qty, 5);
    }
}

#[tokio::test]
async fn voiding_a_cancelled_sale_is_rejected() {
    for store in stores().await {
        let p = product("p1", "A", 1000, 0, 5);
        store.create_product(p.clone()).await.unwrap();

        let mut cart = Cart::new();
        cart.add_item(&p, 1).unwrap();

        let checkout = processor(&store);
        let outcome = checkout
            .checkout(&cart, TenderMethod::Cash, 1000, None)
            .await
            .unwrap();

        checkout.void_sale(&outcome.sale.id, "first").await.unwrap();
        let err = checkout
            .void_sale(&outcome.sale.id, "second")
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            ServiceError::Core(CoreError::InvalidSaleStatus { .. })
        ));

        // Stock restored exactly once.
        assert_eq!(store.get_product("p1").await.unwrap().unwrap().stock_qty, 5);
    }
}

#[tokio::test]
async fn voiding_an_unknown_sale_is_rejected() {
    for store in stores().await {
        let err = processor(&store)
            .void_sale("no-such-sale", "reason")
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            ServiceError::Core(CoreError::SaleNotFound(_))
        ));
    }
}

// =============================================================================
// Aggregates after checkout
// =============================================================================

#[tokio::test]
async fn completed_and_voided_sales_feed_stats_correctly() {
    for store in stores().await {
        let p = product("p1", "A", 1000, 0, 10);
        store.create_product(p.clone()).await.unwrap();

        let checkout = processor(&store);

        let mut cart = Cart::new();
        cart.add_item(&p, 1).unwrap();
        checkout
            .checkout(&cart, TenderMethod::Cash, 1000, None)
            .await
            .unwrap();

        let mut cart = Cart::new();
        cart.add_item(&p, 2).unwrap();
        let voided = checkout
            .checkout(&cart, TenderMethod::Cash, 2000, None)
            .await
            .unwrap();
        checkout.void_sale(&voided.sale.id, "test").await.unwrap();

        let stats = store.get_stats().await.unwrap();
        assert_eq!(stats.completed_sales, 1);
        assert_eq!(stats.cancelled_sales, 1);
        assert_eq!(stats.revenue_cents, 1000);
        assert_eq!(stats.average_sale_cents, 1000);
    }
}

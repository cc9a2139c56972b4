//! # Transaction Processor
//!
//! Turns a cart into a consistent, atomically-recorded sale.
//!
//! ## Checkout State Machine
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────┐
//! │  checkout(cart, method, tendered)                                   │
//! │                                                                     │
//! │  Validating ──── empty cart? ───────────► Rejected (EmptyCart)      │
//! │      │      ──── product missing? ──────► Rejected (NotFound)       │
//! │      │      ──── tendered < total? ─────► Rejected (Insufficient)   │
//! │      ▼                                                              │
//! │  Persisting ── ONE WriteBatch:                                      │
//! │      │           sale header (Completed)                            │
//! │      │           one SaleItem per line (price frozen NOW)           │
//! │      │           payment(s), incl. negative cash change             │
//! │      │           one stock decrement per tracked line               │
//! │      │         any failure aborts the whole group                   │
//! │      ▼                                                              │
//! │  Completed ──► CheckoutOutcome { sale, items, payments, receipt }   │
//! └─────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! Nothing is written during validation; rejected checkouts are always
//! safe to retry after correction.

use std::sync::Arc;

use chrono::Utc;
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};
use uuid::Uuid;

use lumen_core::{
    Cart, CoreError, Money, Payment, Product, Sale, SaleItem, SaleStatus, TenderMethod,
};
use lumen_store::{Storage, WriteBatch, WriteOp};

use crate::error::{ServiceError, ServiceResult};
use crate::receipt::Receipt;

// =============================================================================
// Policy
// =============================================================================

/// Explicit, named oversell policy (never an implicit side effect).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
pub struct CheckoutPolicy {
    /// When false (default), a sale that would drive stock below zero
    /// still completes but the stored stock clamps at zero.
    /// When true, stock is allowed to go negative.
    /// Either way the oversell is logged.
    pub allow_negative_stock: bool,
}

// =============================================================================
// Outcome
// =============================================================================

/// Everything a caller needs after a successful checkout.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CheckoutOutcome {
    pub sale: Sale,
    pub items: Vec<SaleItem>,
    pub payments: Vec<Payment>,
    pub receipt: Receipt,
}

// =============================================================================
// Processor
// =============================================================================

/// The sole writer path for the Sale/SaleItem/Payment/stock group.
/// No other component creates a SaleItem outside a checkout batch.
pub struct CheckoutProcessor {
    store: Arc<dyn Storage>,
    policy: CheckoutPolicy,
}

/// One validated cart line, resolved against the current catalog.
struct ResolvedLine {
    product: Product,
    quantity: i64,
    line_total_cents: i64,
    tax_cents: i64,
}

impl CheckoutProcessor {
    pub fn new(store: Arc<dyn Storage>, policy: CheckoutPolicy) -> Self {
        CheckoutProcessor { store, policy }
    }

    /// Validates the cart against the current catalog and the tendered
    /// amount against the grand total, then persists the whole sale as
    /// one batch.
    ///
    /// Line prices and tax rates are re-read from the catalog at this
    /// moment, not taken from the cart's add-time copies; the cart copy
    /// only ever drives the on-screen preview.
    pub async fn checkout(
        &self,
        cart: &Cart,
        method: TenderMethod,
        tendered_cents: i64,
        cashier_id: Option<&str>,
    ) -> ServiceResult<CheckoutOutcome> {
        // --- Validating ---------------------------------------------------
        if cart.is_empty() {
            return Err(CoreError::EmptyCart.into());
        }

        let mut lines = Vec::with_capacity(cart.items.len());
        let mut subtotal_cents = 0i64;
        let mut tax_cents = 0i64;

        for cart_item in &cart.items {
            let product = self
                .store
                .get_product(&cart_item.product_id)
                .await?
                .ok_or_else(|| CoreError::ProductNotFound(cart_item.product_id.clone()))?;
            if !product.is_active {
                return Err(CoreError::ProductInactive(product.sku).into());
            }

            let line_total_cents = product.price_cents * cart_item.quantity;
            let line_tax_cents = Money::from_cents(line_total_cents)
                .calculate_tax(product.tax_rate())
                .cents();

            subtotal_cents += line_total_cents;
            tax_cents += line_tax_cents;
            lines.push(ResolvedLine {
                product,
                quantity: cart_item.quantity,
                line_total_cents,
                tax_cents: line_tax_cents,
            });
        }

        let total_cents = subtotal_cents + tax_cents;
        if tendered_cents < total_cents {
            return Err(CoreError::InsufficientPayment {
                required_cents: total_cents,
                received_cents: tendered_cents,
            }
            .into());
        }

        // --- Persisting ---------------------------------------------------
        let now = Utc::now();
        let sale = Sale {
            id: Uuid::new_v4().to_string(),
            status: SaleStatus::Completed,
            subtotal_cents,
            tax_cents,
            discount_cents: 0,
            total_cents,
            cashier_id: cashier_id.map(str::to_string),
            note: None,
            created_at: now,
            completed_at: Some(now),
            cancelled_at: None,
            cancel_reason: None,
        };

        let items: Vec<SaleItem> = lines
            .iter()
            .map(|line| SaleItem {
                id: Uuid::new_v4().to_string(),
                sale_id: sale.id.clone(),
                product_id: line.product.id.clone(),
                sku_snapshot: line.product.sku.clone(),
                name_snapshot: line.product.name.clone(),
                unit_price_cents: line.product.price_cents,
                quantity: line.quantity,
                line_total_cents: line.line_total_cents,
                tax_cents: line.tax_cents,
                created_at: now,
            })
            .collect();

        let mut payments = vec![Payment {
            id: Uuid::new_v4().to_string(),
            sale_id: sale.id.clone(),
            method,
            amount_cents: tendered_cents,
            reference: None,
            created_at: now,
        }];
        let change_cents = tendered_cents - total_cents;
        if change_cents > 0 {
            // Change is recorded as a synthetic negative cash tender so
            // the payments for a sale always sum to its total.
            payments.push(Payment {
                id: Uuid::new_v4().to_string(),
                sale_id: sale.id.clone(),
                method: TenderMethod::Cash,
                amount_cents: -change_cents,
                reference: None,
                created_at: now,
            });
        }

        let mut batch = WriteBatch::new();
        batch.push(WriteOp::InsertSale(sale.clone()));
        for item in &items {
            batch.push(WriteOp::InsertSaleItem(item.clone()));
        }
        for payment in &payments {
            batch.push(WriteOp::InsertPayment(payment.clone()));
        }
        for line in &lines {
            if !line.product.track_inventory {
                debug!(sku = %line.product.sku, "Inventory not tracked, skipping decrement");
                continue;
            }
            if line.product.stock_qty < line.quantity {
                warn!(
                    sku = %line.product.sku,
                    stock = line.product.stock_qty,
                    requested = line.quantity,
                    "Selling past available stock"
                );
            }
            batch.push(WriteOp::AdjustStock {
                product_id: line.product.id.clone(),
                delta: -line.quantity,
                clamp_at_zero: !self.policy.allow_negative_stock,
            });
        }

        self.store.execute_batch(batch).await?;

        // --- Completed ----------------------------------------------------
        let settings = self.store.get_settings().await?;
        let receipt = Receipt::build(&settings, &sale, &items, &payments);

        info!(
            sale_id = %sale.id,
            total_cents,
            tendered_cents,
            change_cents,
            lines = items.len(),
            "Checkout completed"
        );

        Ok(CheckoutOutcome {
            sale,
            items,
            payments,
            receipt,
        })
    }

    /// Voids a completed sale: status becomes Cancelled and every
    /// line's quantity is restored onto product stock, in one batch.
    ///
    /// Voiding a sale that is not Completed (already cancelled, or
    /// never finalized) is rejected.
    pub async fn void_sale(&self, sale_id: &str, reason: &str) -> ServiceResult<Sale> {
        let sale = self
            .store
            .get_sale(sale_id)
            .await?
            .ok_or_else(|| CoreError::SaleNotFound(sale_id.to_string()))?;

        if sale.status != SaleStatus::Completed {
            return Err(CoreError::InvalidSaleStatus {
                sale_id: sale_id.to_string(),
                current_status: sale.status.as_str().to_string(),
            }
            .into());
        }

        let items = self.store.get_sale_items(sale_id).await?;
        let now = Utc::now();

        let mut batch = WriteBatch::new();
        batch.push(WriteOp::SetSaleStatus {
            sale_id: sale_id.to_string(),
            status: SaleStatus::Cancelled,
            at: now,
            reason: Some(reason.to_string()),
        });
        for item in &items {
            match self.store.get_product(&item.product_id).await? {
                Some(product) if product.track_inventory => {
                    batch.push(WriteOp::AdjustStock {
                        product_id: item.product_id.clone(),
                        delta: item.quantity,
                        clamp_at_zero: false,
                    });
                }
                Some(_) => {}
                None => {
                    warn!(
                        product_id = %item.product_id,
                        "Voided line references a product no longer in the catalog"
                    );
                }
            }
        }

        self.store.execute_batch(batch).await?;

        info!(sale_id = %sale_id, reason = %reason, "Sale voided, stock restored");

        self.store
            .get_sale(sale_id)
            .await?
            .ok_or_else(|| CoreError::SaleNotFound(sale_id.to_string()).into())
    }
}

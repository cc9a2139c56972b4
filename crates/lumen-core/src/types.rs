//! # Domain Types
//!
//! Core entities shared by every layer of Lumen POS.
//!
//! ## Type Map
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────┐
//! │  Catalog & Sales             Accounts & Sessions                    │
//! │  ┌──────────┐  ┌──────────┐  ┌──────────┐  ┌─────────────┐         │
//! │  │ Product  │  │   Sale   │  │   User   │  │ AuthSession │         │
//! │  │ sku*     │  │ status   │  │ username*│  │ token*      │         │
//! │  │ price    │  │ totals   │  │ email*   │  │ expires_at  │         │
//! │  └──────────┘  └────┬─────┘  └──────────┘  └─────────────┘         │
//! │                     │                                               │
//! │         ┌───────────┴───────────┐          ┌──────────┐            │
//! │         │ SaleItem (snapshots)  │          │ AuditLog │            │
//! │         │ Payment  (tenders)    │          │ append-  │            │
//! │         └───────────────────────┘          │ only     │            │
//! │                                            └──────────┘            │
//! │  * = unique secondary key enforced by every storage backend        │
//! └─────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Dual-Key Identity Pattern
//! Every entity has an immutable UUID `id` for relations, plus a
//! human-facing business key where one exists (sku, username, token).
//!
//! ## Snapshot Pattern
//! `SaleItem` freezes sku, name, and unit price at the moment of sale.
//! Historical sales must not change when the catalog is edited later.

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

use crate::money::{Money, TaxRate};

// =============================================================================
// Product
// =============================================================================

/// A product available for sale.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
pub struct Product {
    /// Unique identifier (UUID v4).
    pub id: String,

    /// Stock Keeping Unit - unique business identifier.
    pub sku: String,

    /// Display name shown to cashier and on receipt.
    pub name: String,

    /// Optional description for product details.
    pub description: Option<String>,

    /// Unit price in cents.
    pub price_cents: i64,

    /// Unit cost in cents (for margin reporting).
    pub cost_cents: Option<i64>,

    /// Tax rate in basis points (800 = 8.00%).
    pub tax_rate_bps: u32,

    /// Current stock level. May go negative only when the checkout
    /// policy explicitly allows overselling.
    pub stock_qty: i64,

    /// Whether stock is decremented on sale for this product.
    pub track_inventory: bool,

    /// Soft-delete flag. Inactive products stay on historical sales.
    pub is_active: bool,

    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Product {
    /// Returns the price as a Money type.
    #[inline]
    pub fn price(&self) -> Money {
        Money::from_cents(self.price_cents)
    }

    /// Returns the tax rate.
    #[inline]
    pub fn tax_rate(&self) -> TaxRate {
        TaxRate::from_bps(self.tax_rate_bps)
    }
}

// =============================================================================
// Sale Status
// =============================================================================

/// The status of a sale transaction.
///
/// Transitions: `Pending → Completed` (normal checkout) and
/// `Completed → Cancelled` (void, which reverses stock effects).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[cfg_attr(feature = "sqlx", derive(sqlx::Type))]
#[cfg_attr(feature = "sqlx", sqlx(rename_all = "lowercase"))]
#[serde(rename_all = "snake_case")]
pub enum SaleStatus {
    /// Sale is in progress (not yet paid).
    Pending,
    /// Sale has been paid and finalized.
    Completed,
    /// Sale was voided; stock effects reversed.
    Cancelled,
}

impl SaleStatus {
    /// Lowercase wire/database representation.
    pub fn as_str(&self) -> &'static str {
        match self {
            SaleStatus::Pending => "pending",
            SaleStatus::Completed => "completed",
            SaleStatus::Cancelled => "cancelled",
        }
    }
}

impl Default for SaleStatus {
    fn default() -> Self {
        SaleStatus::Pending
    }
}

// =============================================================================
// Tender Method
// =============================================================================

/// How a payment was tendered.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[cfg_attr(feature = "sqlx", derive(sqlx::Type))]
#[cfg_attr(feature = "sqlx", sqlx(rename_all = "lowercase"))]
#[serde(rename_all = "snake_case")]
pub enum TenderMethod {
    /// Physical cash.
    Cash,
    /// Card payment on an external terminal.
    Card,
    /// Digital wallet / QR payment.
    Digital,
}

impl TenderMethod {
    pub fn as_str(&self) -> &'static str {
        match self {
            TenderMethod::Cash => "cash",
            TenderMethod::Card => "card",
            TenderMethod::Digital => "digital",
        }
    }
}

// =============================================================================
// Sale
// =============================================================================

/// A sale transaction header.
///
/// Created atomically with its line items and payments; see the storage
/// contract's batch semantics.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
pub struct Sale {
    pub id: String,
    pub status: SaleStatus,
    pub subtotal_cents: i64,
    pub tax_cents: i64,
    pub discount_cents: i64,
    pub total_cents: i64,
    /// Cashier who rang the sale up, when a session was active.
    pub cashier_id: Option<String>,
    pub note: Option<String>,
    pub created_at: DateTime<Utc>,
    pub completed_at: Option<DateTime<Utc>>,
    pub cancelled_at: Option<DateTime<Utc>>,
    pub cancel_reason: Option<String>,
}

// =============================================================================
// Sale Item
// =============================================================================

/// A line item in a sale. Product data is frozen at time of sale.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
pub struct SaleItem {
    pub id: String,
    pub sale_id: String,
    pub product_id: String,
    /// SKU at time of sale (frozen).
    pub sku_snapshot: String,
    /// Product name at time of sale (frozen).
    pub name_snapshot: String,
    /// Unit price in cents at time of sale (frozen).
    pub unit_price_cents: i64,
    pub quantity: i64,
    /// Line total before tax (unit_price × quantity).
    pub line_total_cents: i64,
    /// Tax for this line, computed from the product's own tax rate.
    pub tax_cents: i64,
    pub created_at: DateTime<Utc>,
}

impl SaleItem {
    #[inline]
    pub fn unit_price(&self) -> Money {
        Money::from_cents(self.unit_price_cents)
    }

    #[inline]
    pub fn line_total(&self) -> Money {
        Money::from_cents(self.line_total_cents)
    }
}

// =============================================================================
// Payment
// =============================================================================

/// A payment (tender) toward a sale.
///
/// A sale can hold multiple payments: split tenders, or the synthetic
/// negative cash entry that records change given back.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
pub struct Payment {
    pub id: String,
    pub sale_id: String,
    pub method: TenderMethod,
    /// Amount in cents. Negative for change given back.
    pub amount_cents: i64,
    /// External reference (card auth code, wallet txn id).
    pub reference: Option<String>,
    pub created_at: DateTime<Utc>,
}

impl Payment {
    #[inline]
    pub fn amount(&self) -> Money {
        Money::from_cents(self.amount_cents)
    }
}

// =============================================================================
// User & Role
// =============================================================================

/// Account role. Mapped to a fixed permission bundle in
/// [`crate::permissions`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[cfg_attr(feature = "sqlx", derive(sqlx::Type))]
#[cfg_attr(feature = "sqlx", sqlx(rename_all = "lowercase"))]
#[serde(rename_all = "snake_case")]
pub enum Role {
    Admin,
    Manager,
    Cashier,
}

impl Role {
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::Admin => "admin",
            Role::Manager => "manager",
            Role::Cashier => "cashier",
        }
    }
}

/// A user account.
///
/// The stored credential lives in its own table/collection, keyed 1:1 by
/// user id, and never travels with this struct.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
pub struct User {
    pub id: String,
    /// Unique login name.
    pub username: String,
    /// Unique contact address.
    pub email: String,
    pub first_name: String,
    pub last_name: String,
    pub role: Role,
    /// Inactive users cannot log in but keep their history.
    pub is_active: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub last_login_at: Option<DateTime<Utc>>,
}

// =============================================================================
// Auth Session
// =============================================================================

/// An authenticated session.
///
/// The token is opaque; expiry is evaluated lazily on access plus an
/// explicit bulk sweep exposed by the storage contract.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
pub struct AuthSession {
    pub id: String,
    pub user_id: String,
    /// Opaque unique token. Persisted so a session can be recovered
    /// across restarts.
    pub token: String,
    pub expires_at: DateTime<Utc>,
    pub created_at: DateTime<Utc>,
}

impl AuthSession {
    /// True when the session has passed its expiry instant.
    #[inline]
    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        self.expires_at <= now
    }
}

// =============================================================================
// Audit Log
// =============================================================================

/// An append-only audit record of a security or administrative action.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuditLog {
    pub id: String,
    /// Acting user; `None` means the system itself acted.
    pub user_id: Option<String>,
    /// Verb, e.g. "auth.login", "users.delete".
    pub action: String,
    /// Affected resource, e.g. "sessions", "users".
    pub resource: String,
    /// Optional structured payload.
    pub detail: Option<serde_json::Value>,
    pub created_at: DateTime<Utc>,
}

// =============================================================================
// Settings & Profiles
// =============================================================================

/// Singleton store-wide configuration, created with defaults on first
/// access.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
pub struct BusinessSettings {
    pub store_name: String,
    /// ISO 4217 code, display-only at this layer.
    pub currency_code: String,
    /// Default tax rate applied to new catalog entries.
    pub default_tax_rate_bps: u32,
    pub receipt_footer: Option<String>,
    pub updated_at: DateTime<Utc>,
}

impl BusinessSettings {
    /// The defaults materialized on first access.
    pub fn defaults(now: DateTime<Utc>) -> Self {
        BusinessSettings {
            store_name: "Lumen POS".to_string(),
            currency_code: "USD".to_string(),
            default_tax_rate_bps: 0,
            receipt_footer: None,
            updated_at: now,
        }
    }
}

/// UI theme preference stored per user.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[cfg_attr(feature = "sqlx", derive(sqlx::Type))]
#[cfg_attr(feature = "sqlx", sqlx(rename_all = "lowercase"))]
#[serde(rename_all = "snake_case")]
pub enum Theme {
    Light,
    Dark,
    System,
}

/// Per-user preferences, created with defaults on first access.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
pub struct UserProfile {
    pub user_id: String,
    pub theme: Theme,
    pub notifications_enabled: bool,
    pub updated_at: DateTime<Utc>,
}

impl UserProfile {
    /// The defaults materialized on first access.
    pub fn defaults(user_id: &str, now: DateTime<Utc>) -> Self {
        UserProfile {
            user_id: user_id.to_string(),
            theme: Theme::System,
            notifications_enabled: true,
            updated_at: now,
        }
    }
}

// =============================================================================
// Aggregates
// =============================================================================

/// Store-wide statistics. Monetary aggregates consider completed sales
/// only, regardless of backend.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StoreStats {
    pub product_count: i64,
    pub completed_sales: i64,
    pub cancelled_sales: i64,
    pub revenue_cents: i64,
    pub tax_collected_cents: i64,
    /// Mean completed-sale total; zero when there are no completed sales.
    pub average_sale_cents: i64,
}

/// One day of completed-sales totals.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DailySalesSummary {
    pub date: NaiveDate,
    pub sales_count: i64,
    pub revenue_cents: i64,
    pub tax_cents: i64,
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sale_status_wire_names() {
        assert_eq!(SaleStatus::Pending.as_str(), "pending");
        assert_eq!(SaleStatus::Completed.as_str(), "completed");
        assert_eq!(SaleStatus::Cancelled.as_str(), "cancelled");
        assert_eq!(SaleStatus::default(), SaleStatus::Pending);
    }

    #[test]
    fn session_expiry_is_lazy_boundary_inclusive() {
        let now = Utc::now();
        let session = AuthSession {
            id: "s1".to_string(),
            user_id: "u1".to_string(),
            token: "t1".to_string(),
            expires_at: now,
            created_at: now,
        };
        // Expiry exactly at `now` counts as expired.
        assert!(session.is_expired(now));
        assert!(!session.is_expired(now - chrono::Duration::seconds(1)));
    }

    #[test]
    fn settings_defaults() {
        let now = Utc::now();
        let settings = BusinessSettings::defaults(now);
        assert_eq!(settings.currency_code, "USD");
        assert_eq!(settings.default_tax_rate_bps, 0);
    }

    #[test]
    fn profile_defaults() {
        let now = Utc::now();
        let profile = UserProfile::defaults("u1", now);
        assert_eq!(profile.theme, Theme::System);
        assert!(profile.notifications_enabled);
    }
}

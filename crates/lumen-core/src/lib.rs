//! # lumen-core: Pure Business Logic for Lumen POS
//!
//! The heart of Lumen POS: all business rules as pure functions with zero
//! I/O dependencies.
//!
//! ## Architecture Position
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────┐
//! │  UI / presentation layer (out of scope for this workspace)          │
//! │        │                                                            │
//! │        ▼                                                            │
//! │  lumen-service ── checkout, receipts, auth/sessions                 │
//! │        │                                                            │
//! │        ▼                                                            │
//! │  ★ lumen-core (THIS CRATE) ★                                        │
//! │                                                                     │
//! │   ┌─────────┐ ┌─────────┐ ┌─────────┐ ┌────────────┐ ┌──────────┐  │
//! │   │  types  │ │  money  │ │  cart   │ │permissions │ │validation│  │
//! │   │ Product │ │  Money  │ │  Cart   │ │ role table │ │  rules   │  │
//! │   │  Sale   │ │ TaxRate │ │CartItem │ │            │ │          │  │
//! │   └─────────┘ └─────────┘ └─────────┘ └────────────┘ └──────────┘  │
//! │                                                                     │
//! │   NO I/O • NO DATABASE • NO NETWORK • PURE FUNCTIONS                │
//! │        │                                                            │
//! │        ▼                                                            │
//! │  lumen-store ── `Storage` contract + SQLite / memory backends       │
//! └─────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Design Principles
//!
//! 1. **Pure functions**: same input, same output
//! 2. **No I/O**: persistence and networking are forbidden here
//! 3. **Integer money**: all monetary values are cents (i64), never floats
//! 4. **Explicit errors**: typed enums, never strings or panics

// =============================================================================
// Module Declarations
// =============================================================================

pub mod cart;
pub mod error;
pub mod money;
pub mod permissions;
pub mod types;
pub mod validation;

// =============================================================================
// Re-exports for Convenience
// =============================================================================

pub use cart::{Cart, CartItem, CartTotals};
pub use error::{CoreError, CoreResult, ValidationError};
pub use money::{Money, TaxRate};
pub use permissions::{Permission, UserPermissions};
pub use types::*;

// =============================================================================
// Crate-Level Constants
// =============================================================================

/// Maximum lines allowed in a single cart.
///
/// Prevents runaway carts and keeps transaction sizes reasonable.
pub const MAX_CART_ITEMS: usize = 100;

/// Maximum quantity of a single line in a cart.
///
/// Prevents accidental over-ordering (e.g. typing 1000 instead of 10).
pub const MAX_ITEM_QUANTITY: i64 = 999;

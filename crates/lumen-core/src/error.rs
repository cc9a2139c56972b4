//! # Error Types
//!
//! Domain-specific error types for lumen-core.
//!
//! ## Error Hierarchy
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────┐
//! │  lumen-core errors (this file)                                      │
//! │  ├── CoreError        - Business rule violations                    │
//! │  └── ValidationError  - Input validation failures                   │
//! │                                                                     │
//! │  lumen-store errors (separate crate)                                │
//! │  └── StoreError       - Persistence failures                        │
//! │                                                                     │
//! │  lumen-service errors (separate crate)                              │
//! │  └── ServiceError     - Checkout/auth orchestration failures        │
//! │                                                                     │
//! │  Flow: ValidationError → CoreError → ServiceError → caller          │
//! └─────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Design Principles
//! 1. Use `thiserror` for derive macros (not manual impl)
//! 2. Include context in error messages (SKU, ID, amounts)
//! 3. Errors are enum variants, never String
//! 4. Validation errors are raised before any persistence is attempted

use thiserror::Error;

// =============================================================================
// Core Error
// =============================================================================

/// Core business logic errors.
///
/// These represent business rule violations. They are raised during the
/// validation phase of an operation, before anything is written, so the
/// caller can correct the input and retry.
#[derive(Debug, Error)]
pub enum CoreError {
    /// Checkout was attempted with an empty cart.
    #[error("Cannot check out an empty cart")]
    EmptyCart,

    /// Tendered amount does not cover the grand total.
    ///
    /// Carries both amounts so the UI can show
    /// "required $21.60, received $20.00".
    #[error("Insufficient payment: required {required_cents} cents, received {received_cents} cents")]
    InsufficientPayment {
        required_cents: i64,
        received_cents: i64,
    },

    /// Product cannot be found (deleted or never existed).
    #[error("Product not found: {0}")]
    ProductNotFound(String),

    /// Product exists but is not sellable (deactivated).
    #[error("Product is inactive: {0}")]
    ProductInactive(String),

    /// Sale not found.
    #[error("Sale not found: {0}")]
    SaleNotFound(String),

    /// Sale is not in a state that allows the requested operation,
    /// e.g. voiding an already-cancelled sale.
    #[error("Sale {sale_id} is {current_status}, cannot perform operation")]
    InvalidSaleStatus {
        sale_id: String,
        current_status: String,
    },

    /// Cart has exceeded the maximum allowed number of lines.
    #[error("Cart cannot have more than {max} items")]
    CartTooLarge { max: usize },

    /// Item quantity exceeds the maximum allowed.
    #[error("Quantity {requested} exceeds maximum allowed ({max})")]
    QuantityTooLarge { requested: i64, max: i64 },

    /// Validation error (wraps ValidationError).
    #[error("Validation error: {0}")]
    Validation(#[from] ValidationError),
}

// =============================================================================
// Validation Error
// =============================================================================

/// Input validation errors.
///
/// Raised when user input does not meet requirements, before business
/// logic runs.
#[derive(Debug, Error)]
pub enum ValidationError {
    /// A required field is missing or empty.
    #[error("{field} is required")]
    Required { field: String },

    /// Field value is too short.
    #[error("{field} must be at least {min} characters")]
    TooShort { field: String, min: usize },

    /// Field value is too long.
    #[error("{field} must be at most {max} characters")]
    TooLong { field: String, max: usize },

    /// Value must be positive.
    #[error("{field} must be positive")]
    MustBePositive { field: String },

    /// Invalid format (bad characters, malformed email, etc.).
    #[error("{field} has invalid format: {reason}")]
    InvalidFormat { field: String, reason: String },
}

// =============================================================================
// Result Type Alias
// =============================================================================

/// Convenience type alias for Results with CoreError.
pub type CoreResult<T> = Result<T, CoreError>;

// =============================================================================
// Unit Tests
// =============================================================================

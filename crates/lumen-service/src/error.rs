//! # Service Error Type
//!
//! Unified error for the orchestration layer. Wraps the domain and
//! storage errors and adds the auth-specific failures that only exist
//! at this level.

use thiserror::Error;

use lumen_core::CoreError;
use lumen_store::StoreError;

/// Errors surfaced by the checkout and auth services.
#[derive(Debug, Error)]
pub enum ServiceError {
    /// Business rule violation (empty cart, insufficient payment, ...).
    #[error(transparent)]
    Core(#[from] CoreError),

    /// Persistence failure, with backend/table context.
    #[error(transparent)]
    Store(#[from] StoreError),

    /// Login failed. Deliberately opaque: never reveals whether the
    /// username or the password was wrong.
    #[error("Invalid credentials")]
    InvalidCredentials,

    /// No active session.
    #[error("Not logged in")]
    NotLoggedIn,

    /// The session lacks a required permission.
    #[error("Access denied: missing permission '{permission}'")]
    AccessDenied { permission: String },

    /// Refusing to delete the last active admin account.
    #[error("Cannot delete the last active admin")]
    LastAdmin,

    /// Credential hashing failed (argon2 internal error).
    #[error("Password hashing failed: {0}")]
    PasswordHash(String),
}

/// Result type for service operations.
pub type ServiceResult<T> = Result<T, ServiceError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn core_errors_pass_through_transparently() {
        let err: ServiceError = CoreError::EmptyCart.into();
        assert_eq!(err.to_string(), "Cannot check out an empty cart");
    }

    #[test]
    fn invalid_credentials_is_opaque() {
        let err = ServiceError::InvalidCredentials;
        let msg = err.to_string();
        assert!(!msg.contains("username"));
        assert!(!msg.contains("password"));
    }
}

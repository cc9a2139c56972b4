//! # Auth / Session Manager
//!
//! Login, logout, session issuance and lazy expiry, permission checks,
//! and user management - all against the injected storage contract.
//!
//! ## Session Lifecycle
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────┐
//! │  login(username, password)                                          │
//! │    │ lookup active user ── fail ──► audit failed attempt,           │
//! │    │ verify argon2 hash ─ fail ──►   opaque InvalidCredentials      │
//! │    ▼                                                                │
//! │  mint opaque token, expiry = now + 8h                               │
//! │  persist session ── cache in memory ── audit "auth.login"           │
//! │                                                                     │
//! │  current_session()    cache hit + unexpired → session               │
//! │                       cache hit + expired   → clear stale token,    │
//! │                                               not logged in         │
//! │  resume_session(tok)  persisted token → re-hydrate user after a     │
//! │                       restart; expired/unknown tokens are cleared   │
//! │  logout()             delete persisted session, clear cache, audit  │
//! └─────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! Audit writes are best-effort: a failed audit insert is logged and
//! swallowed so it can never block a login or a checkout. Everything
//! else propagates.

use std::sync::{Arc, Mutex};

use argon2::{
    password_hash::{PasswordHash, PasswordVerifier, SaltString},
    Argon2, PasswordHasher,
};
use chrono::{Duration, Utc};
use password_hash::rand_core::OsRng;
use serde::{Deserialize, Serialize};
use tracing::{info, warn};
use uuid::Uuid;

use lumen_core::{
    validation, AuditLog, AuthSession, Permission, Role, User, UserPermissions,
};
use lumen_store::{Storage, StoreError};

use crate::error::{ServiceError, ServiceResult};

/// Sessions live this long from the moment of login.
pub const SESSION_LIFETIME_HOURS: i64 = 8;

// =============================================================================
// Active Session
// =============================================================================

/// The in-memory view of a logged-in user: the persisted session plus
/// the hydrated user record and the role-derived permission bundle.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ActiveSession {
    pub session: AuthSession,
    pub user: User,
    pub permissions: UserPermissions,
}

/// Input for creating a user account.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewUser {
    pub username: String,
    pub email: String,
    pub first_name: String,
    pub last_name: String,
    pub role: Role,
    pub password: String,
}

// =============================================================================
// Auth Manager
// =============================================================================

/// Authentication and account management over the storage contract.
///
/// One instance per process, constructed at startup and injected into
/// whatever needs it - deliberately not a global singleton.
pub struct AuthManager {
    store: Arc<dyn Storage>,
    current: Mutex<Option<ActiveSession>>,
}

impl AuthManager {
    pub fn new(store: Arc<dyn Storage>) -> Self {
        AuthManager {
            store,
            current: Mutex::new(None),
        }
    }

    // -------------------------------------------------------------------------
    // Login / Logout
    // -------------------------------------------------------------------------

    /// Authenticates a user and mints a session.
    ///
    /// Every failure path - unknown username, inactive account, wrong
    /// password - audits a failed attempt and returns the same opaque
    /// `InvalidCredentials` error.
    pub async fn login(&self, username: &str, password: &str) -> ServiceResult<ActiveSession> {
        let user = match self.store.get_user_by_username(username).await? {
            Some(user) if user.is_active => user,
            _ => {
                self.audit_failed_login(username).await;
                return Err(ServiceError::InvalidCredentials);
            }
        };

        let hash = match self.store.get_password_hash(&user.id).await? {
            Some(hash) => hash,
            None => {
                self.audit_failed_login(username).await;
                return Err(ServiceError::InvalidCredentials);
            }
        };

        if !verify_password(password, &hash) {
            self.audit_failed_login(username).await;
            return Err(ServiceError::InvalidCredentials);
        }

        let now = Utc::now();

        let mut user = user;
        user.last_login_at = Some(now);
        let user = self.store.update_user(user).await?;

        let session = AuthSession {
            id: Uuid::new_v4().to_string(),
            user_id: user.id.clone(),
            token: Uuid::new_v4().to_string(),
            expires_at: now + Duration::hours(SESSION_LIFETIME_HOURS),
            created_at: now,
        };
        let session = self.store.save_session(session).await?;

        let active = ActiveSession {
            permissions: UserPermissions::for_role(user.role),
            session,
            user,
        };

        *self.cache() = Some(active.clone());

        info!(username = %username, role = %active.user.role.as_str(), "User logged in");
        self.audit(
            Some(&active.user.id),
            "auth.login",
            "sessions",
            Some(serde_json::json!({ "username": username })),
        )
        .await;

        Ok(active)
    }

    /// Ends the current session: persisted token deleted, cache
    /// cleared, logout audited. A no-op when nobody is logged in.
    pub async fn logout(&self) -> ServiceResult<()> {
        let active = self.cache().take();

        if let Some(active) = active {
            self.store.delete_session(&active.session.token).await?;
            info!(username = %active.user.username, "User logged out");
            self.audit(Some(&active.user.id), "auth.logout", "sessions", None)
                .await;
        }

        Ok(())
    }

    // -------------------------------------------------------------------------
    // Session access
    // -------------------------------------------------------------------------

    /// Returns the cached session when it is still live. An expired
    /// cache entry is treated as "not logged in" and its persisted
    /// token is cleared as a side effect.
    pub async fn current_session(&self) -> Option<ActiveSession> {
        let cached = self.cache().clone();

        match cached {
            Some(active) if !active.session.is_expired(Utc::now()) => Some(active),
            Some(active) => {
                *self.cache() = None;
                if let Err(e) = self.store.delete_session(&active.session.token).await {
                    warn!(error = %e, "Failed to clear stale session token");
                }
                None
            }
            None => None,
        }
    }

    /// Re-hydrates a session from a persisted token (session recovery
    /// after restart). Expired or unresolvable tokens are cleared from
    /// storage and yield `None`.
    pub async fn resume_session(&self, token: &str) -> ServiceResult<Option<ActiveSession>> {
        let session = match self.store.get_session_by_token(token).await? {
            Some(session) => session,
            None => return Ok(None),
        };

        if session.is_expired(Utc::now()) {
            self.store.delete_session(token).await?;
            return Ok(None);
        }

        let user = match self.store.get_user(&session.user_id).await? {
            Some(user) if user.is_active => user,
            _ => {
                // Session for a deleted/deactivated user is stale too.
                self.store.delete_session(token).await?;
                return Ok(None);
            }
        };

        let active = ActiveSession {
            permissions: UserPermissions::for_role(user.role),
            session,
            user,
        };
        *self.cache() = Some(active.clone());

        Ok(Some(active))
    }

    // -------------------------------------------------------------------------
    // Permissions
    // -------------------------------------------------------------------------

    /// Total permission check: always a plain boolean, false when
    /// nobody is logged in or the cached session has expired.
    pub fn has_permission(&self, permission: Permission) -> bool {
        self.cache()
            .as_ref()
            .filter(|active| !active.session.is_expired(Utc::now()))
            .map(|active| active.permissions.has(permission))
            .unwrap_or(false)
    }

    /// Raises `AccessDenied` (or `NotLoggedIn`) when the permission is
    /// absent.
    pub fn require_permission(&self, permission: Permission) -> ServiceResult<()> {
        let logged_in = self.cache().is_some();
        if !logged_in {
            return Err(ServiceError::NotLoggedIn);
        }
        if self.has_permission(permission) {
            Ok(())
        } else {
            Err(ServiceError::AccessDenied {
                permission: format!("{:?}", permission),
            })
        }
    }

    // -------------------------------------------------------------------------
    // User management
    // -------------------------------------------------------------------------

    /// Creates a user account with a hashed credential.
    ///
    /// Duplicate username/email are rejected with a descriptive message
    /// before anything is written.
    pub async fn create_user(&self, new_user: NewUser) -> ServiceResult<User> {
        validation::validate_username(&new_user.username).map_err(lumen_core::CoreError::from)?;
        validation::validate_email(&new_user.email).map_err(lumen_core::CoreError::from)?;
        validation::validate_password(&new_user.password).map_err(lumen_core::CoreError::from)?;

        if self
            .store
            .get_user_by_username(&new_user.username)
            .await?
            .is_some()
        {
            return Err(StoreError::duplicate("username", &new_user.username).into());
        }
        if self
            .store
            .get_user_by_email(&new_user.email)
            .await?
            .is_some()
        {
            return Err(StoreError::duplicate("email", &new_user.email).into());
        }

        let now = Utc::now();
        let user = User {
            id: Uuid::new_v4().to_string(),
            username: new_user.username,
            email: new_user.email,
            first_name: new_user.first_name,
            last_name: new_user.last_name,
            role: new_user.role,
            is_active: true,
            created_at: now,
            updated_at: now,
            last_login_at: None,
        };

        let hash = hash_password(&new_user.password)?;
        let user = self.store.create_user(user).await?;
        self.store.set_password_hash(&user.id, &hash).await?;

        info!(username = %user.username, role = %user.role.as_str(), "User created");
        self.audit(
            self.acting_user_id().as_deref(),
            "users.create",
            "users",
            Some(serde_json::json!({ "username": user.username, "role": user.role.as_str() })),
        )
        .await;

        Ok(user)
    }

    /// Updates an existing user record (not their credential).
    pub async fn update_user(&self, user: User) -> ServiceResult<User> {
        let updated = self.store.update_user(user).await?;
        self.audit(
            self.acting_user_id().as_deref(),
            "users.update",
            "users",
            Some(serde_json::json!({ "username": updated.username })),
        )
        .await;
        Ok(updated)
    }

    /// Replaces a user's credential with a fresh hash.
    pub async fn set_password(&self, user_id: &str, new_password: &str) -> ServiceResult<()> {
        validation::validate_password(new_password).map_err(lumen_core::CoreError::from)?;

        // The user must exist; credentials never dangle.
        if self.store.get_user(user_id).await?.is_none() {
            return Err(StoreError::not_found("User", user_id).into());
        }

        let hash = hash_password(new_password)?;
        self.store.set_password_hash(user_id, &hash).await?;
        self.audit(
            self.acting_user_id().as_deref(),
            "users.set_password",
            "credentials",
            None,
        )
        .await;
        Ok(())
    }

    /// Deletes a user - refused when it would remove the last active
    /// admin, checked before any mutation.
    pub async fn delete_user(&self, user_id: &str) -> ServiceResult<()> {
        let user = self
            .store
            .get_user(user_id)
            .await?
            .ok_or_else(|| StoreError::not_found("User", user_id))?;

        if user.role == Role::Admin && user.is_active {
            let other_admins = self
                .store
                .list_users()
                .await?
                .iter()
                .filter(|u| u.role == Role::Admin && u.is_active && u.id != user.id)
                .count();
            if other_admins == 0 {
                return Err(ServiceError::LastAdmin);
            }
        }

        self.store.delete_user(user_id).await?;

        info!(username = %user.username, "User deleted");
        self.audit(
            self.acting_user_id().as_deref(),
            "users.delete",
            "users",
            Some(serde_json::json!({ "username": user.username })),
        )
        .await;

        Ok(())
    }

    pub async fn list_users(&self) -> ServiceResult<Vec<User>> {
        Ok(self.store.list_users().await?)
    }

    // -------------------------------------------------------------------------
    // Internals
    // -------------------------------------------------------------------------

    fn cache(&self) -> std::sync::MutexGuard<'_, Option<ActiveSession>> {
        self.current.lock().expect("session cache poisoned")
    }

    fn acting_user_id(&self) -> Option<String> {
        self.cache().as_ref().map(|active| active.user.id.clone())
    }

    async fn audit_failed_login(&self, username: &str) {
        self.audit(
            None,
            "auth.login_failed",
            "sessions",
            Some(serde_json::json!({ "username": username })),
        )
        .await;
    }

    /// Best-effort audit append: failures are logged, never raised, so
    /// audit logging can never block a primary operation.
    async fn audit(
        &self,
        user_id: Option<&str>,
        action: &str,
        resource: &str,
        detail: Option<serde_json::Value>,
    ) {
        let entry = AuditLog {
            id: Uuid::new_v4().to_string(),
            user_id: user_id.map(str::to_string),
            action: action.to_string(),
            resource: resource.to_string(),
            detail,
            created_at: Utc::now(),
        };
        if let Err(e) = self.store.append_audit(entry).await {
            warn!(action = %action, error = %e, "Audit log write failed");
        }
    }
}

// =============================================================================
// Password hashing
// =============================================================================

/// Hashes a password into a PHC string with a fresh random salt.
fn hash_password(password: &str) -> ServiceResult<String> {
    let salt = SaltString::generate(&mut OsRng);
    Argon2::default()
        .hash_password(password.as_bytes(), &salt)
        .map(|hash| hash.to_string())
        .map_err(|e| ServiceError::PasswordHash(e.to_string()))
}

/// Constant-time verification against a stored PHC string. A malformed
/// stored hash simply fails verification.
fn verify_password(password: &str, stored_hash: &str) -> bool {
    match PasswordHash::new(stored_hash) {
        Ok(parsed) => Argon2::default()
            .verify_password(password.as_bytes(), &parsed)
            .is_ok(),
        Err(_) => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn password_hash_roundtrip() {
        let hash = hash_password("correct horse battery staple").unwrap();
        assert!(hash.starts_with("$argon2"));
        assert!(verify_password("correct horse battery staple", &hash));
        assert!(!verify_password("wrong password", &hash));
    }

    #[test]
    fn malformed_stored_hash_fails_verification() {
        assert!(!verify_password("anything", "not-a-phc-string"));
    }
}

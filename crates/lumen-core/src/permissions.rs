//! # Role → Permission Table
//!
//! Fixed mapping from account roles to permission bundles.
//!
//! The table is data, not logic: it never special-cases individual users,
//! and every `(role, permission)` pair has a defined boolean answer.
//!
//! ```text
//! ┌──────────────────────┬───────┬─────────┬─────────┐
//! │ permission           │ admin │ manager │ cashier │
//! ├──────────────────────┼───────┼─────────┼─────────┤
//! │ process_sales        │   ✓   │    ✓    │    ✓    │
//! │ view_inventory       │   ✓   │    ✓    │    ✓    │
//! │ void_sales           │   ✓   │    ✓    │         │
//! │ manage_inventory     │   ✓   │    ✓    │         │
//! │ view_reports         │   ✓   │    ✓    │         │
//! │ manage_users         │   ✓   │         │         │
//! │ manage_settings      │   ✓   │         │         │
//! │ manage_backups       │   ✓   │         │         │
//! └──────────────────────┴───────┴─────────┴─────────┘
//! ```

use serde::{Deserialize, Serialize};

use crate::types::Role;

/// A named capability a session may hold.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Permission {
    ProcessSales,
    VoidSales,
    ViewInventory,
    ManageInventory,
    ViewReports,
    ManageUsers,
    ManageSettings,
    ManageBackups,
}

impl Permission {
    /// Every permission, for totality checks.
    pub const ALL: [Permission; 8] = [
        Permission::ProcessSales,
        Permission::VoidSales,
        Permission::ViewInventory,
        Permission::ManageInventory,
        Permission::ViewReports,
        Permission::ManageUsers,
        Permission::ManageSettings,
        Permission::ManageBackups,
    ];
}

/// The permission bundle derived from a role at login.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UserPermissions {
    pub can_process_sales: bool,
    pub can_void_sales: bool,
    pub can_view_inventory: bool,
    pub can_manage_inventory: bool,
    pub can_view_reports: bool,
    pub can_manage_users: bool,
    pub can_manage_settings: bool,
    pub can_manage_backups: bool,
}

impl UserPermissions {
    /// The fixed role→bundle table.
    pub const fn for_role(role: Role) -> Self {
        match role {
            Role::Admin => UserPermissions {
                can_process_sales: true,
                can_void_sales: true,
                can_view_inventory: true,
                can_manage_inventory: true,
                can_view_reports: true,
                can_manage_users: true,
                can_manage_settings: true,
                can_manage_backups: true,
            },
            Role::Manager => UserPermissions {
                can_process_sales: true,
                can_void_sales: true,
                can_view_inventory: true,
                can_manage_inventory: true,
                can_view_reports: true,
                can_manage_users: false,
                can_manage_settings: false,
                can_manage_backups: false,
            },
            Role::Cashier => UserPermissions {
                can_process_sales: true,
                can_void_sales: false,
                can_view_inventory: true,
                can_manage_inventory: false,
                can_view_reports: false,
                can_manage_users: false,
                can_manage_settings: false,
                can_manage_backups: false,
            },
        }
    }

    /// Total lookup: defined for every permission, always a boolean.
    pub const fn has(&self, permission: Permission) -> bool {
        match permission {
            Permission::ProcessSales => self.can_process_sales,
            Permission::VoidSales => self.can_void_sales,
            Permission::ViewInventory => self.can_view_inventory,
            Permission::ManageInventory => self.can_manage_inventory,
            Permission::ViewReports => self.can_view_reports,
            Permission::ManageUsers => self.can_manage_users,
            Permission::ManageSettings => self.can_manage_settings,
            Permission::ManageBackups => self.can_manage_backups,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn lookup_is_total_for_every_role_and_permission() {
        for role in [Role::Admin, Role::Manager, Role::Cashier] {
            let bundle = UserPermissions::for_role(role);
            for permission in Permission::ALL {
                // `has` returns a plain bool for every pair; the loop
                // itself is the totality assertion.
                let _ = bundle.has(permission);
            }
        }
    }

    #[test]
    fn admin_superset_of_manager_superset_of_cashier() {
        let admin = UserPermissions::for_role(Role::Admin);
        let manager = UserPermissions::for_role(Role::Manager);
        let cashier = UserPermissions::for_role(Role::Cashier);

        for permission in Permission::ALL {
            if cashier.has(permission) {
                assert!(manager.has(permission), "manager missing {:?}", permission);
            }
            if manager.has(permission) {
                assert!(admin.has(permission), "admin missing {:?}", permission);
            }
        }
    }

    #[test]
    fn shared_operational_permission_held_by_all_roles() {
        for role in [Role::Admin, Role::Manager, Role::Cashier] {
            assert!(UserPermissions::for_role(role).has(Permission::ProcessSales));
        }
    }

    #[test]
    fn cashier_cannot_manage() {
        let cashier = UserPermissions::for_role(Role::Cashier);
        assert!(!cashier.has(Permission::ManageUsers));
        assert!(!cashier.has(Permission::ManageSettings));
        assert!(!cashier.has(Permission::VoidSales));
        assert!(cashier.has(Permission::ViewInventory));
    }
}

/*!
 * # Role-Based Access Control (RBAC) Module
 *
 * Maps role names to transfer permissions. Permissions use the
 * `resource:action` form, with `resource:*` granting every action.
 */

use lazy_static::lazy_static;
use std::collections::{HashMap, HashSet};
use tracing::debug;

use super::{Role, TransferPolicy};
use crate::config::AppConfig;

pub const TRANSFERS_ALL: &str = "transfers:*";
pub const TRANSFERS_AUTO_APPROVE: &str = "transfers:auto-approve";
pub const TRANSFERS_APPROVE: &str = "transfers:approve";
pub const TRANSFERS_CANCEL_ANY: &str = "transfers:cancel-any";

// Roles absent from the table hold no transfer permissions but may still
// request transfers and cancel their own.
lazy_static! {
    pub static ref ROLE_PERMISSIONS: HashMap<&'static str, Vec<&'static str>> = {
        let mut roles = HashMap::new();
        roles.insert("owner", vec![TRANSFERS_ALL]);
        roles.insert("manager", vec![TRANSFERS_ALL]);
        roles
    };
}

/// Check if a granted permission satisfies a required permission
pub fn check_permission(granted: &str, required: &str) -> bool {
    if granted == "*" || granted == required {
        return true;
    }

    match granted.strip_suffix(":*") {
        Some(resource) => required
            .strip_prefix(resource)
            .map_or(false, |rest| rest.starts_with(':')),
        None => false,
    }
}

/// Transfer policy backed by the static role table, extended with any
/// roles configured as elevated.
#[derive(Debug, Clone, Default)]
pub struct RbacTransferPolicy {
    elevated: HashSet<Role>,
}

impl RbacTransferPolicy {
    pub fn new() -> Self {
        Self::default()
    }

    /// Grants full transfer authority to each of the given roles in
    /// addition to the static table.
    pub fn with_elevated_roles<I, R>(roles: I) -> Self
    where
        I: IntoIterator<Item = R>,
        R: Into<Role>,
    {
        Self {
            elevated: roles.into_iter().map(Into::into).collect(),
        }
    }

    pub fn from_config(config: &AppConfig) -> Self {
        Self::with_elevated_roles(config.elevated_roles.iter().map(String::as_str))
    }

    fn has_permission(&self, role: &Role, required: &str) -> bool {
        if self.elevated.contains(role) {
            return true;
        }

        let granted = ROLE_PERMISSIONS
            .get(role.as_str())
            .map(|granted| granted.iter().any(|p| check_permission(p, required)))
            .unwrap_or(false);

        if !granted {
            debug!(role = %role, permission = required, "Permission not granted");
        }
        granted
    }
}

impl TransferPolicy for RbacTransferPolicy {
    fn can_auto_approve(&self, role: &Role) -> bool {
        self.has_permission(role, TRANSFERS_AUTO_APPROVE)
    }

    fn can_approve(&self, role: &Role) -> bool {
        self.has_permission(role, TRANSFERS_APPROVE)
    }

    fn can_cancel_others(&self, role: &Role) -> bool {
        self.has_permission(role, TRANSFERS_CANCEL_ANY)
    }
}

//! Caller identity and the transfer authorization policy.
//!
//! Authentication happens upstream; operations here receive an already
//! verified actor id and role and only decide what that role may do.

pub mod rbac;

use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

pub use rbac::RbacTransferPolicy;

/// Opaque role name, compared case-insensitively.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub struct Role(String);

impl Role {
    pub fn new(name: impl AsRef<str>) -> Self {
        Self(name.as_ref().trim().to_ascii_lowercase())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for Role {
    fn from(value: &str) -> Self {
        Role::new(value)
    }
}

impl From<String> for Role {
    fn from(value: String) -> Self {
        Role::new(value)
    }
}

impl From<Role> for String {
    fn from(value: Role) -> Self {
        value.0
    }
}

/// Authenticated caller of an inventory operation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Actor {
    pub id: Uuid,
    pub role: Role,
}

impl Actor {
    pub fn new(id: Uuid, role: impl Into<Role>) -> Self {
        Self {
            id,
            role: role.into(),
        }
    }
}

/// Decides which roles may bypass or resolve the transfer approval workflow.
pub trait TransferPolicy: Send + Sync {
    /// Requests from this role complete immediately.
    fn can_auto_approve(&self, role: &Role) -> bool;

    /// This role may approve a pending transfer.
    fn can_approve(&self, role: &Role) -> bool;

    /// This role may cancel pending transfers requested by someone else.
    fn can_cancel_others(&self, role: &Role) -> bool;
}

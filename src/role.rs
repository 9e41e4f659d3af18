use crate::permission::Permission;
use crate::types::{RoleId, RoleName};
use std::collections::HashSet;

/// Named bundle of permissions plus an inheritance list.
///
/// Inheritance is by role name, not by id: resolution looks inherited roles
/// up by name among all known roles.
#[derive(Clone, Debug, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct Role {
    /// Store-assigned identifier.
    pub id: RoleId,
    /// Unique role name.
    pub name: RoleName,
    /// Permissions granted directly by this role.
    pub permissions: HashSet<Permission>,
    /// Names of roles this role inherits from.
    pub inherits: Vec<RoleName>,
    /// Human-readable description.
    pub description: String,
}

/// Payload for creating a role; the store assigns the id.
#[derive(Clone, Debug, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct NewRole {
    pub name: RoleName,
    pub permissions: HashSet<Permission>,
    pub inherits: Vec<RoleName>,
    pub description: String,
}

impl NewRole {
    pub(crate) fn into_role(self, id: RoleId) -> Role {
        Role {
            id,
            name: self.name,
            permissions: self.permissions,
            inherits: self.inherits,
            description: self.description,
        }
    }
}

/// Partial role update; absent fields retain their previous values.
#[derive(Clone, Debug, Default, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct RoleUpdate {
    pub id: RoleId,
    pub name: Option<RoleName>,
    pub permissions: Option<HashSet<Permission>>,
    pub inherits: Option<Vec<RoleName>>,
    pub description: Option<String>,
}

impl RoleUpdate {
    /// Creates an update that changes nothing yet.
    pub fn for_role(id: RoleId) -> Self {
        Self {
            id,
            ..Self::default()
        }
    }

    /// Merges the provided fields over `role`.
    pub fn apply_to(&self, role: &mut Role) {
        if let Some(name) = &self.name {
            role.name = name.clone();
        }
        if let Some(permissions) = &self.permissions {
            role.permissions = permissions.clone();
        }
        if let Some(inherits) = &self.inherits {
            role.inherits = inherits.clone();
        }
        if let Some(description) = &self.description {
            role.description = description.clone();
        }
    }
}

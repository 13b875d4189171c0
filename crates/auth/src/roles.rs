use std::borrow::Cow;

use serde::{Deserialize, Serialize};

use crate::Permission;

/// Role identifier used for RBAC.
///
/// Roles are opaque strings carried in tokens; [`permissions_for_roles`] maps
/// them to permissions.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Role(Cow<'static, str>);

impl Role {
    pub const ADMIN: Role = Role(Cow::Borrowed("admin"));
    pub const CATALOG_EDITOR: Role = Role(Cow::Borrowed("catalog_editor"));
    pub const CATALOG_VIEWER: Role = Role(Cow::Borrowed("catalog_viewer"));

    pub fn new(name: impl Into<Cow<'static, str>>) -> Self {
        Self(name.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl core::fmt::Display for Role {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str(&self.0)
    }
}

/// Static role → permission policy.
///
/// - `admin`: everything
/// - `catalog_editor`: read + write on products
/// - `catalog_viewer`: read on products
///
/// Unknown roles grant nothing.
pub fn permissions_for_roles(roles: &[Role]) -> Vec<Permission> {
    let mut out: Vec<Permission> = Vec::new();
    for role in roles {
        let granted: &[Permission] = match role.as_str() {
            "admin" => &[Permission::WILDCARD],
            "catalog_editor" => &[Permission::PRODUCTS_READ, Permission::PRODUCTS_WRITE],
            "catalog_viewer" => &[Permission::PRODUCTS_READ],
            _ => &[],
        };
        for perm in granted {
            if !out.contains(perm) {
                out.push(perm.clone());
            }
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn policy_maps_known_roles() {
        assert_eq!(permissions_for_roles(&[Role::ADMIN]), vec![Permission::WILDCARD]);
        assert_eq!(
            permissions_for_roles(&[Role::CATALOG_VIEWER, Role::CATALOG_EDITOR]),
            vec![Permission::PRODUCTS_READ, Permission::PRODUCTS_WRITE]
        );
        assert!(permissions_for_roles(&[Role::new("guest")]).is_empty());
    }
}

//! The static permission catalog and the built-in system roles.
//!
//! Which permissions exist is configuration, not data the engine decides
//! on. [`seed`] makes a store match this catalog and is safe to run on
//! every start.

use canopy_core::error::{CanopyError, CanopyResult};
use canopy_core::models::permission::{CreatePermission, Permission};
use canopy_core::models::role::RoleScope;
use canopy_core::repository::{PermissionRepository, RoleRepository, Stores};
use tracing::info;

use self::permissions::*;

pub mod permissions {
    pub const READ: &str = "READ";
    pub const WRITE: &str = "WRITE";
    pub const DELETE: &str = "DELETE";
    pub const RESOURCE_CREATE: &str = "RESOURCE_CREATE";
    pub const ASSIGN_ROLE: &str = "ASSIGN_ROLE";
    pub const ROLE_CREATE: &str = "ROLE_CREATE";
    pub const TENANT_CREATE: &str = "TENANT_CREATE";
    pub const TENANT_READ: &str = "TENANT_READ";
    pub const TENANT_LIST: &str = "TENANT_LIST";
    pub const AUDIT_READ: &str = "AUDIT_READ";
}

pub mod roles {
    pub const PLATFORM_ADMIN: &str = "PLATFORM_ADMIN";
    pub const TENANT_ADMIN: &str = "TENANT_ADMIN";
    pub const USER: &str = "USER";
}

/// Permissions that only mean something platform-wide. Holding one of
/// them is always decided by a global check, whatever the resource.
pub static GLOBAL_ONLY: &[&str] = &[TENANT_CREATE, TENANT_LIST];

pub fn is_global_only(permission: &str) -> bool {
    GLOBAL_ONLY.contains(&permission)
}

pub struct PermissionDef {
    pub name: &'static str,
    pub description: &'static str,
}

pub struct SystemRoleDef {
    pub name: &'static str,
    pub permissions: &'static [&'static str],
}

pub static PERMISSIONS: &[PermissionDef] = &[
    PermissionDef {
        name: READ,
        description: "Read a resource and everything below it",
    },
    PermissionDef {
        name: WRITE,
        description: "Modify a resource",
    },
    PermissionDef {
        name: DELETE,
        description: "Delete a resource",
    },
    PermissionDef {
        name: RESOURCE_CREATE,
        description: "Create child resources",
    },
    PermissionDef {
        name: ASSIGN_ROLE,
        description: "Assign and revoke roles on a resource",
    },
    PermissionDef {
        name: ROLE_CREATE,
        description: "Define custom roles",
    },
    PermissionDef {
        name: TENANT_CREATE,
        description: "Create tenants",
    },
    PermissionDef {
        name: TENANT_READ,
        description: "Read tenant details",
    },
    PermissionDef {
        name: TENANT_LIST,
        description: "List all tenants",
    },
    PermissionDef {
        name: AUDIT_READ,
        description: "Read audit logs",
    },
];

pub static SYSTEM_ROLES: &[SystemRoleDef] = &[
    SystemRoleDef {
        name: roles::PLATFORM_ADMIN,
        permissions: &[
            READ,
            WRITE,
            DELETE,
            RESOURCE_CREATE,
            ASSIGN_ROLE,
            ROLE_CREATE,
            TENANT_CREATE,
            TENANT_READ,
            TENANT_LIST,
            AUDIT_READ,
        ],
    },
    SystemRoleDef {
        name: roles::TENANT_ADMIN,
        permissions: &[
            READ,
            WRITE,
            DELETE,
            RESOURCE_CREATE,
            ASSIGN_ROLE,
            ROLE_CREATE,
            TENANT_READ,
            AUDIT_READ,
        ],
    },
    SystemRoleDef {
        name: roles::USER,
        permissions: &[READ],
    },
];

async fn ensure_permission<P: PermissionRepository>(
    repo: &P,
    def: &PermissionDef,
) -> CanopyResult<Permission> {
    match repo.get_by_name(def.name).await {
        Ok(existing) => Ok(existing),
        Err(CanopyError::NotFound { .. }) => {
            info!(permission = def.name, "Seeding permission");
            repo.create(CreatePermission {
                name: def.name.into(),
                description: def.description.into(),
            })
            .await
        }
        Err(e) => Err(e),
    }
}

/// Make the store's permissions and system roles match the catalog.
///
/// Missing entries are created and missing grants added; nothing is
/// removed, so administrator edits to system roles survive.
pub async fn seed<S: Stores>(stores: &S) -> CanopyResult<()> {
    let mut seeded = Vec::with_capacity(PERMISSIONS.len());
    for def in PERMISSIONS {
        seeded.push(ensure_permission(stores.permissions(), def).await?);
    }

    for def in SYSTEM_ROLES {
        let role = match stores.roles().find_global_by_name(def.name).await? {
            Some(role) => role,
            None => {
                info!(role = def.name, "Seeding system role");
                stores
                    .roles()
                    .create(def.name, RoleScope::Global, None)
                    .await?
            }
        };

        let granted = stores.roles().get_role_permissions(role.id).await?;
        for name in def.permissions {
            if granted.iter().any(|p| p.name == *name) {
                continue;
            }
            let permission = seeded
                .iter()
                .find(|p| p.name == *name)
                .ok_or_else(|| CanopyError::not_found("permission", name))?;
            stores
                .roles()
                .grant_permission(role.id, permission.id)
                .await?;
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn system_roles_only_reference_catalog_permissions() {
        for role in SYSTEM_ROLES {
            for name in role.permissions {
                assert!(
                    PERMISSIONS.iter().any(|p| p.name == *name),
                    "{} references unknown permission {name}",
                    role.name
                );
            }
        }
    }

    #[test]
    fn tenant_admin_holds_no_global_only_permission() {
        let tenant_admin = SYSTEM_ROLES
            .iter()
            .find(|r| r.name == roles::TENANT_ADMIN)
            .unwrap();
        assert!(!tenant_admin.permissions.iter().any(|p| is_global_only(p)));
        assert!(is_global_only(TENANT_LIST));
        assert!(!is_global_only(READ));
    }

    #[test]
    fn permission_names_are_unique() {
        let mut names: Vec<_> = PERMISSIONS.iter().map(|p| p.name).collect();
        names.sort_unstable();
        names.dedup();
        assert_eq!(names.len(), PERMISSIONS.len());
    }
}

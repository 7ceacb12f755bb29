//! Demo role graph
//!
//! A permission catalog for managing users, roles and permissions, an
//! `admin` role holding all of it and a `user` role holding the read side.
//! Re-running against a populated store reuses existing records by name and
//! reactivates any that were deactivated or suspended since.

use crate::admin::{PermissionUpdate, RbacAdmin, RoleUpdate};
use crate::error::{AuthzError, Result};
use crate::store::RbacStore;
use crate::types::{
    GrantSpec, Permission, PermissionStatus, PermissionType, Role, RoleStatus, User,
};
use futures::future::try_join_all;
use tracing::info;

/// (name, display name, description)
pub const PERMISSION_CATALOG: &[(&str, &str, &str)] = &[
    ("users.create", "Create Users", "Ability to create new users"),
    ("users.read", "Read Users", "Ability to view users"),
    ("users.update", "Update Users", "Ability to update users"),
    ("users.delete", "Delete Users", "Ability to delete users"),
    ("users.assign-roles", "Assign Roles to Users", "Ability to assign roles to users"),
    ("roles.create", "Create Roles", "Ability to create new roles"),
    ("roles.read", "Read Roles", "Ability to view roles"),
    ("roles.update", "Update Roles", "Ability to update roles"),
    ("roles.delete", "Delete Roles", "Ability to delete roles"),
    ("roles.assign-permissions", "Assign Permissions to Roles", "Ability to assign permissions to roles"),
    ("permissions.create", "Create Permissions", "Ability to create new permissions"),
    ("permissions.read", "Read Permissions", "Ability to view permissions"),
    ("permissions.update", "Update Permissions", "Ability to update permissions"),
    ("permissions.delete", "Delete Permissions", "Ability to delete permissions"),
    ("admin.access", "Admin Access", "Full administrative access"),
];

/// Permissions held by the `user` role
pub const USER_ROLE_PERMISSIONS: &[&str] = &["users.read", "roles.read", "permissions.read"];

pub const ADMIN_EMAIL: &str = "admin@example.com";
pub const USER_EMAIL: &str = "user@example.com";

/// What a seeding run produced
#[derive(Debug, Clone)]
pub struct SeedReport {
    pub permissions: Vec<Permission>,
    pub admin_role: Role,
    pub user_role: Role,
    pub admin_user: User,
    pub regular_user: User,
}

/// Populate the store with the demo role graph
pub async fn seed_demo(admin: &RbacAdmin) -> Result<SeedReport> {
    info!("Seeding {} permissions", PERMISSION_CATALOG.len());
    let permissions = try_join_all(
        PERMISSION_CATALOG
            .iter()
            .map(|(name, display, description)| ensure_permission(admin, name, display, description)),
    )
    .await?;

    let admin_role = ensure_role(admin, "admin", "Administrator with full access", 100).await?;
    admin
        .replace_role_grants(
            admin_role.id,
            permissions.iter().map(|p| GrantSpec::granted(p.id)).collect(),
        )
        .await?;

    let user_role = ensure_role(admin, "user", "Regular user with limited access", 10).await?;
    admin
        .replace_role_grants(
            user_role.id,
            permissions
                .iter()
                .filter(|p| USER_ROLE_PERMISSIONS.contains(&p.name.as_str()))
                .map(|p| GrantSpec::granted(p.id))
                .collect(),
        )
        .await?;

    let admin_user = ensure_user(admin, ADMIN_EMAIL, "Administrator").await?;
    admin
        .replace_role_assignments(admin_user.id, vec![admin_role.id])
        .await?;

    let regular_user = ensure_user(admin, USER_EMAIL, "Regular User").await?;
    admin
        .replace_role_assignments(regular_user.id, vec![user_role.id])
        .await?;

    info!("Seeding completed");
    Ok(SeedReport {
        permissions,
        admin_role,
        user_role,
        admin_user,
        regular_user,
    })
}

async fn ensure_permission(
    admin: &RbacAdmin,
    name: &str,
    display_name: &str,
    description: &str,
) -> Result<Permission> {
    if let Some(existing) = admin.store().permission_by_name(name).await? {
        if existing.is_active() {
            return Ok(existing);
        }
        info!("Reactivating permission '{}'", name);
        return admin
            .update_permission(
                existing.id,
                PermissionUpdate {
                    status: Some(PermissionStatus::Active),
                    ..Default::default()
                },
            )
            .await;
    }
    admin
        .create_permission(
            Permission::new(name)
                .with_display_name(display_name)
                .with_description(description)
                .with_kind(PermissionType::Action),
        )
        .await
}

async fn ensure_role(admin: &RbacAdmin, name: &str, description: &str, priority: i32) -> Result<Role> {
    if let Some(existing) = admin.store().role_by_name(name).await? {
        if existing.is_active() {
            return Ok(existing);
        }
        info!("Reactivating role '{}'", name);
        return admin
            .update_role(
                existing.id,
                RoleUpdate {
                    status: Some(RoleStatus::Active),
                    ..Default::default()
                },
            )
            .await;
    }
    admin
        .create_role(Role::new(name).with_description(description).with_priority(priority))
        .await
}

async fn ensure_user(admin: &RbacAdmin, email: &str, name: &str) -> Result<User> {
    match admin.create_user(email, name).await {
        Ok(user) => Ok(user),
        Err(AuthzError::Conflict(_)) => {
            let existing = admin.store().user_by_email(email).await?.ok_or_else(|| {
                AuthzError::Internal(format!("User {} vanished during seeding", email))
            })?;
            if existing.is_active() {
                Ok(existing)
            } else {
                admin.activate_user(existing.id).await
            }
        }
        Err(e) => Err(e),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::resolver::PermissionResolver;
    use crate::store::InMemoryRbacStore;
    use crate::types::ListQuery;
    use std::sync::Arc;

    #[tokio::test]
    async fn test_seed_resolves_expected_sets() {
        let store = Arc::new(InMemoryRbacStore::new());
        let admin = RbacAdmin::new(store.clone());
        let report = seed_demo(&admin).await.unwrap();

        let resolver = PermissionResolver::new(store);
        let admin_perms = resolver.resolve(report.admin_user.id).await.unwrap();
        assert_eq!(admin_perms.len(), PERMISSION_CATALOG.len());
        assert!(admin_perms.contains("admin.access"));

        let user_perms = resolver.resolve(report.regular_user.id).await.unwrap();
        assert_eq!(
            user_perms.sorted_names(),
            vec!["permissions.read", "roles.read", "users.read"]
        );
    }

    #[tokio::test]
    async fn test_seed_is_rerunnable() {
        let store = Arc::new(InMemoryRbacStore::new());
        let admin = RbacAdmin::new(store.clone());

        let first = seed_demo(&admin).await.unwrap();
        let second = seed_demo(&admin).await.unwrap();

        assert_eq!(first.admin_role.id, second.admin_role.id);
        assert_eq!(first.regular_user.id, second.regular_user.id);
        let listed = store.list_permissions(&ListQuery::new(1, 100)).await.unwrap();
        assert_eq!(listed.total as usize, PERMISSION_CATALOG.len());
    }

    #[tokio::test]
    async fn test_rerun_restores_deactivated_records() {
        let store = Arc::new(InMemoryRbacStore::new());
        let admin = RbacAdmin::new(store.clone());
        let first = seed_demo(&admin).await.unwrap();

        let read = store.permission_by_name("users.read").await.unwrap().unwrap();
        admin
            .update_permission(
                read.id,
                PermissionUpdate {
                    status: Some(PermissionStatus::Inactive),
                    ..Default::default()
                },
            )
            .await
            .unwrap();
        admin
            .update_role(
                first.user_role.id,
                RoleUpdate {
                    status: Some(RoleStatus::Inactive),
                    ..Default::default()
                },
            )
            .await
            .unwrap();
        admin.suspend_user(first.regular_user.id).await.unwrap();

        let second = seed_demo(&admin).await.unwrap();
        assert!(second.user_role.is_active());
        assert!(second.regular_user.is_active());

        let resolver = PermissionResolver::new(store);
        let user_perms = resolver.resolve(second.regular_user.id).await.unwrap();
        assert_eq!(
            user_perms.sorted_names(),
            vec!["permissions.read", "roles.read", "users.read"]
        );
    }
}

//! Administrative operations on the role graph
//!
//! Thin validation layer over [`RbacStore`]. Input shape problems are caught
//! here as `InvalidInput`; uniqueness and referential checks stay in the
//! store, where they run inside the write.

use crate::error::{AuthzError, Result};
use crate::store::{ensure_distinct, RbacStore};
use crate::types::{
    GrantSpec, ListQuery, Page, Permission, PermissionId, PermissionStatus, PermissionType, Role,
    RoleAssignment, RoleGrant, RoleId, RoleStatus, User, UserId, UserStatus,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{info, warn};

/// Partial user update; absent fields are left unchanged
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct UserUpdate {
    #[serde(default)]
    pub email: Option<String>,
    #[serde(default)]
    pub name: Option<String>,
}

/// Partial role update; absent fields are left unchanged
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RoleUpdate {
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub status: Option<RoleStatus>,
    #[serde(default)]
    pub priority: Option<i32>,
}

/// Partial permission update; absent fields are left unchanged
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PermissionUpdate {
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub display_name: Option<String>,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default, rename = "type")]
    pub kind: Option<PermissionType>,
    #[serde(default)]
    pub status: Option<PermissionStatus>,
}

/// Administrative service over a role graph store
#[derive(Clone)]
pub struct RbacAdmin {
    store: Arc<dyn RbacStore>,
}

impl RbacAdmin {
    pub fn new(store: Arc<dyn RbacStore>) -> Self {
        Self { store }
    }

    pub fn store(&self) -> &Arc<dyn RbacStore> {
        &self.store
    }

    // ------------------------------------------------------------------
    // Users
    // ------------------------------------------------------------------

    pub async fn create_user(&self, email: &str, name: &str) -> Result<User> {
        let email = valid_email(email)?;
        let name = non_empty(name, "User name")?;

        let user = self.store.insert_user(User::new(email, name)).await?;
        info!("Created user {} ({})", user.email, user.id);
        Ok(user)
    }

    /// Change email and/or name. A new email colliding with another user's,
    /// ignoring case, fails with `Conflict`.
    pub async fn update_user(&self, id: UserId, update: UserUpdate) -> Result<User> {
        let mut user = self
            .store
            .user(id)
            .await?
            .ok_or_else(|| AuthzError::NotFound(format!("User {}", id)))?;

        if let Some(email) = update.email {
            user.email = valid_email(&email)?.to_string();
        }
        if let Some(name) = update.name {
            user.name = non_empty(&name, "User name")?.to_string();
        }

        let user = self.store.update_user(user).await?;
        info!("Updated user {} ({})", user.email, user.id);
        Ok(user)
    }

    pub async fn list_users(&self, query: &ListQuery) -> Result<Page<User>> {
        validate_query(query)?;
        self.store.list_users(query).await
    }

    /// Suspended users resolve to no permissions until reactivated
    pub async fn suspend_user(&self, id: UserId) -> Result<User> {
        let user = self.store.set_user_status(id, UserStatus::Suspended).await?;
        info!("Suspended user {}", id);
        Ok(user)
    }

    pub async fn activate_user(&self, id: UserId) -> Result<User> {
        let user = self.store.set_user_status(id, UserStatus::Active).await?;
        info!("Activated user {}", id);
        Ok(user)
    }

    pub async fn delete_user(&self, id: UserId) -> Result<()> {
        self.store.delete_user(id).await?;
        info!("Deleted user {}", id);
        Ok(())
    }

    // ------------------------------------------------------------------
    // Roles
    // ------------------------------------------------------------------

    pub async fn create_role(&self, role: Role) -> Result<Role> {
        validate_role(&role)?;
        let role = self.store.insert_role(role).await?;
        info!("Created role '{}' ({})", role.name, role.id);
        Ok(role)
    }

    pub async fn update_role(&self, id: RoleId, update: RoleUpdate) -> Result<Role> {
        let mut role = self
            .store
            .role(id)
            .await?
            .ok_or_else(|| AuthzError::NotFound(format!("Role {}", id)))?;

        if let Some(name) = update.name {
            role.name = name;
        }
        if let Some(description) = update.description {
            role.description = Some(description);
        }
        if let Some(status) = update.status {
            role.status = status;
        }
        if let Some(priority) = update.priority {
            role.priority = priority;
        }
        validate_role(&role)?;

        let role = self.store.update_role(role).await?;
        info!("Updated role '{}' ({})", role.name, role.id);
        Ok(role)
    }

    pub async fn list_roles(&self, query: &ListQuery) -> Result<Page<Role>> {
        validate_query(query)?;
        self.store.list_roles(query).await
    }

    pub async fn delete_role(&self, id: RoleId) -> Result<()> {
        self.store.delete_role(id).await?;
        info!("Deleted role {}", id);
        Ok(())
    }

    // ------------------------------------------------------------------
    // Permissions
    // ------------------------------------------------------------------

    pub async fn create_permission(&self, permission: Permission) -> Result<Permission> {
        validate_permission(&permission)?;
        let permission = self.store.insert_permission(permission).await?;
        info!("Created permission '{}' ({})", permission.name, permission.id);
        Ok(permission)
    }

    pub async fn update_permission(
        &self,
        id: PermissionId,
        update: PermissionUpdate,
    ) -> Result<Permission> {
        let mut permission = self
            .store
            .permission(id)
            .await?
            .ok_or_else(|| AuthzError::NotFound(format!("Permission {}", id)))?;

        if let Some(name) = update.name {
            permission.name = name;
        }
        if let Some(display_name) = update.display_name {
            permission.display_name = display_name;
        }
        if let Some(description) = update.description {
            permission.description = Some(description);
        }
        if let Some(kind) = update.kind {
            permission.kind = kind;
        }
        if let Some(status) = update.status {
            permission.status = status;
        }
        validate_permission(&permission)?;

        let permission = self.store.update_permission(permission).await?;
        info!("Updated permission '{}' ({})", permission.name, permission.id);
        Ok(permission)
    }

    pub async fn list_permissions(&self, query: &ListQuery) -> Result<Page<Permission>> {
        validate_query(query)?;
        self.store.list_permissions(query).await
    }

    pub async fn delete_permission(&self, id: PermissionId) -> Result<()> {
        self.store.delete_permission(id).await?;
        info!("Deleted permission {}", id);
        Ok(())
    }

    // ------------------------------------------------------------------
    // Edge sets
    // ------------------------------------------------------------------

    /// Replace every grant of a role; all or nothing
    pub async fn replace_role_grants(
        &self,
        role_id: RoleId,
        grants: Vec<GrantSpec>,
    ) -> Result<Vec<RoleGrant>> {
        ensure_distinct(grants.iter().map(|g| g.permission_id), "permission")?;

        match self.store.replace_role_grants(role_id, grants).await {
            Ok(grants) => {
                info!("Role {} now has {} grant(s)", role_id, grants.len());
                Ok(grants)
            }
            Err(e) => {
                warn!("Grant replace for role {} rejected: {}", role_id, e);
                Err(e)
            }
        }
    }

    /// Replace every role assignment of a user; all or nothing
    pub async fn replace_role_assignments(
        &self,
        user_id: UserId,
        role_ids: Vec<RoleId>,
    ) -> Result<Vec<RoleAssignment>> {
        ensure_distinct(role_ids.iter().copied(), "role")?;

        match self.store.replace_role_assignments(user_id, role_ids).await {
            Ok(assignments) => {
                info!("User {} now holds {} role(s)", user_id, assignments.len());
                Ok(assignments)
            }
            Err(e) => {
                warn!("Role assignment replace for user {} rejected: {}", user_id, e);
                Err(e)
            }
        }
    }
}

fn non_empty<'a>(value: &'a str, what: &str) -> Result<&'a str> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        return Err(AuthzError::InvalidInput(format!("{} must not be empty", what)));
    }
    Ok(trimmed)
}

fn valid_email(email: &str) -> Result<&str> {
    let email = email.trim();
    if email.is_empty() || !email.contains('@') {
        return Err(AuthzError::InvalidInput(format!("Invalid email: '{}'", email)));
    }
    Ok(email)
}

fn validate_query(query: &ListQuery) -> Result<()> {
    if query.page == 0 || query.limit == 0 {
        return Err(AuthzError::InvalidInput(format!(
            "Page and limit must be >= 1, got page {} limit {}",
            query.page, query.limit
        )));
    }
    Ok(())
}

fn validate_role(role: &Role) -> Result<()> {
    non_empty(&role.name, "Role name")?;
    if role.priority < 0 {
        return Err(AuthzError::InvalidInput(format!(
            "Role priority must be >= 0, got {}",
            role.priority
        )));
    }
    Ok(())
}

fn validate_permission(permission: &Permission) -> Result<()> {
    non_empty(&permission.name, "Permission name")?;
    non_empty(&permission.display_name, "Permission display name")?;
    Ok(())
}

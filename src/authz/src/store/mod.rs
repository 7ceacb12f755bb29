//! Role graph storage
//!
//! [`RbacStore`] is the persistence contract the resolver and the mutation
//! operations need: point lookups, foreign-key lookups, filtered existence
//! checks, and the two atomic replace-the-whole-set writes.

use crate::error::{AuthzError, Result};
use crate::types::{
    GrantSpec, ListQuery, Page, Permission, PermissionId, Role, RoleAssignment, RoleGrant, RoleId,
    User, UserId, UserStatus,
};
use async_trait::async_trait;
use std::collections::HashSet;
use std::hash::Hash;

pub mod memory;

#[cfg(feature = "postgres")]
pub mod postgres;

pub use memory::InMemoryRbacStore;

#[cfg(feature = "postgres")]
pub use postgres::PostgresRbacStore;

/// Storage backend for users, roles, permissions and their edges
///
/// Every method call observes a point-in-time snapshot. The two replace
/// operations validate and swap their edge set inside one atomic unit, so a
/// concurrent reader sees either the whole old set or the whole new set.
#[async_trait]
pub trait RbacStore: Send + Sync {
    /// Get a user by ID
    async fn user(&self, id: UserId) -> Result<Option<User>>;

    /// Get a user by email, compared case-insensitively
    async fn user_by_email(&self, email: &str) -> Result<Option<User>>;

    /// Page through users ordered by email; search matches the email
    async fn list_users(&self, query: &ListQuery) -> Result<Page<User>>;

    /// Get a role by ID
    async fn role(&self, id: RoleId) -> Result<Option<Role>>;

    /// Get a role by its unique name
    async fn role_by_name(&self, name: &str) -> Result<Option<Role>>;

    /// Get every known role among `ids`; unknown ids are skipped
    async fn roles(&self, ids: &[RoleId]) -> Result<Vec<Role>>;

    /// Page through roles by priority then name; search matches name or description
    async fn list_roles(&self, query: &ListQuery) -> Result<Page<Role>>;

    /// Get a permission by ID
    async fn permission(&self, id: PermissionId) -> Result<Option<Permission>>;

    /// Get a permission by its unique name
    async fn permission_by_name(&self, name: &str) -> Result<Option<Permission>>;

    /// Get every known permission among `ids`; unknown ids are skipped
    async fn permissions(&self, ids: &[PermissionId]) -> Result<Vec<Permission>>;

    /// Page through permissions by name; search matches name, display name or description
    async fn list_permissions(&self, query: &ListQuery) -> Result<Page<Permission>>;

    /// Subset of `ids` naming ACTIVE permissions
    async fn active_permission_ids(&self, ids: &[PermissionId]) -> Result<HashSet<PermissionId>>;

    /// Role assignments held by a user
    async fn assignments_for_user(&self, user_id: UserId) -> Result<Vec<RoleAssignment>>;

    /// All grant edges of a role, granted or not
    async fn grants_for_role(&self, role_id: RoleId) -> Result<Vec<RoleGrant>>;

    /// Grant edges with `granted = true` for any of `role_ids`
    async fn granted_grants_for_roles(&self, role_ids: &[RoleId]) -> Result<Vec<RoleGrant>>;

    /// Insert a user; emails are unique case-insensitively
    async fn insert_user(&self, user: User) -> Result<User>;

    /// Overwrite a user's email and name; the email must stay unique
    async fn update_user(&self, user: User) -> Result<User>;

    /// Change a user's status
    async fn set_user_status(&self, id: UserId, status: UserStatus) -> Result<User>;

    /// Delete a user and its assignments
    async fn delete_user(&self, id: UserId) -> Result<()>;

    /// Insert a role; names are unique
    async fn insert_role(&self, role: Role) -> Result<Role>;

    /// Overwrite an existing role; a rename must not collide
    async fn update_role(&self, role: Role) -> Result<Role>;

    /// Delete a role and every edge touching it
    async fn delete_role(&self, id: RoleId) -> Result<()>;

    /// Insert a permission; names are unique
    async fn insert_permission(&self, permission: Permission) -> Result<Permission>;

    /// Overwrite an existing permission; a rename must not collide
    async fn update_permission(&self, permission: Permission) -> Result<Permission>;

    /// Delete a permission and every grant edge to it
    async fn delete_permission(&self, id: PermissionId) -> Result<()>;

    /// Atomically replace all grants of a role
    ///
    /// Fails with `NotFound` when the role is missing and `InvalidReference`
    /// when any permission is missing or not ACTIVE. Nothing is removed on failure.
    async fn replace_role_grants(&self, role_id: RoleId, grants: Vec<GrantSpec>)
        -> Result<Vec<RoleGrant>>;

    /// Atomically replace all role assignments of a user
    ///
    /// Fails with `NotFound` when the user is missing and `InvalidReference`
    /// when any role is missing or not ACTIVE. Nothing is removed on failure.
    async fn replace_role_assignments(
        &self,
        user_id: UserId,
        role_ids: Vec<RoleId>,
    ) -> Result<Vec<RoleAssignment>>;

    /// Counter bumped by every committed write
    async fn generation(&self) -> Result<u64>;
}

/// Reject replace lists naming the same target twice
pub(crate) fn ensure_distinct<T, I>(ids: I, what: &str) -> Result<()>
where
    T: Eq + Hash + std::fmt::Display,
    I: IntoIterator<Item = T>,
{
    let mut seen = HashSet::new();
    for id in ids {
        if seen.contains(&id) {
            return Err(AuthzError::InvalidInput(format!("Duplicate {} id: {}", what, id)));
        }
        seen.insert(id);
    }
    Ok(())
}

/// Ids in `wanted` that are absent from `found`, in request order
pub(crate) fn missing_ids<T: Eq + Hash + Copy>(wanted: &[T], found: &HashSet<T>) -> Vec<T> {
    wanted.iter().filter(|id| !found.contains(id)).copied().collect()
}

/// Case-insensitive substring match used by the in-memory listings
pub(crate) fn matches_search<'a>(
    term: Option<&str>,
    fields: impl IntoIterator<Item = Option<&'a str>>,
) -> bool {
    let Some(term) = term else {
        return true;
    };
    let term = term.to_lowercase();
    fields
        .into_iter()
        .flatten()
        .any(|field| field.to_lowercase().contains(&term))
}

pub(crate) fn format_ids<T: std::fmt::Display>(ids: &[T]) -> String {
    ids.iter().map(|id| id.to_string()).collect::<Vec<_>>().join(", ")
}

//! In-memory role graph store
//!
//! Flat tables keyed by id behind a single `RwLock`. Replace operations run
//! inside a [`Transaction`] that holds the write guard for its whole life, so
//! readers can never observe the gap between the delete and the insert.

use super::{ensure_distinct, format_ids, matches_search, missing_ids, RbacStore};
use crate::error::{AuthzError, Result};
use crate::types::{
    AssignmentId, GrantId, GrantSpec, ListQuery, Page, Permission, PermissionId, Role,
    RoleAssignment, RoleGrant, RoleId, User, UserId, UserStatus,
};
use async_trait::async_trait;
use chrono::Utc;
use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tokio::sync::{RwLock, RwLockWriteGuard};
use tracing::{debug, warn};

#[derive(Debug, Default)]
struct Tables {
    users: HashMap<UserId, User>,
    roles: HashMap<RoleId, Role>,
    permissions: HashMap<PermissionId, Permission>,
    assignments: HashMap<AssignmentId, RoleAssignment>,
    grants: HashMap<GrantId, RoleGrant>,
}

impl Tables {
    fn role_name_taken(&self, name: &str, except: Option<RoleId>) -> bool {
        self.roles
            .values()
            .any(|r| r.name == name && Some(r.id) != except)
    }

    fn permission_name_taken(&self, name: &str, except: Option<PermissionId>) -> bool {
        self.permissions
            .values()
            .any(|p| p.name == name && Some(p.id) != except)
    }

    fn email_taken(&self, email: &str, except: Option<UserId>) -> bool {
        let email = email.to_lowercase();
        self.users
            .values()
            .any(|u| u.email.to_lowercase() == email && Some(u.id) != except)
    }

    /// Subset of `ids` naming ACTIVE permissions
    fn active_permission_ids(&self, ids: &[PermissionId]) -> HashSet<PermissionId> {
        ids.iter()
            .filter(|id| self.permissions.get(*id).is_some_and(|p| p.is_active()))
            .copied()
            .collect()
    }

    /// Subset of `ids` naming ACTIVE roles
    fn active_role_ids(&self, ids: &[RoleId]) -> HashSet<RoleId> {
        ids.iter()
            .filter(|id| self.roles.get(*id).is_some_and(|r| r.is_active()))
            .copied()
            .collect()
    }
}

/// Compensating action recorded for every staged change
#[derive(Debug)]
enum Undo {
    RemoveGrant(GrantId),
    RestoreGrant(RoleGrant),
    RemoveAssignment(AssignmentId),
    RestoreAssignment(RoleAssignment),
}

/// Scoped write transaction over the tables
///
/// Holds the write lock until dropped. Dropping without [`commit`](Self::commit)
/// replays the undo log in reverse, restoring the pre-transaction state.
struct Transaction<'a> {
    tables: RwLockWriteGuard<'a, Tables>,
    generation: &'a AtomicU64,
    undo: Vec<Undo>,
    committed: bool,
}

impl<'a> Transaction<'a> {
    fn remove_grants_for_role(&mut self, role_id: RoleId) -> usize {
        let ids: Vec<GrantId> = self
            .tables
            .grants
            .values()
            .filter(|g| g.role_id == role_id)
            .map(|g| g.id)
            .collect();

        for id in &ids {
            if let Some(grant) = self.tables.grants.remove(id) {
                self.undo.push(Undo::RestoreGrant(grant));
            }
        }
        ids.len()
    }

    fn insert_grant(&mut self, grant: RoleGrant) {
        self.undo.push(Undo::RemoveGrant(grant.id));
        self.tables.grants.insert(grant.id, grant);
    }

    fn remove_assignments_for_user(&mut self, user_id: UserId) -> usize {
        let ids: Vec<AssignmentId> = self
            .tables
            .assignments
            .values()
            .filter(|a| a.user_id == user_id)
            .map(|a| a.id)
            .collect();

        for id in &ids {
            if let Some(assignment) = self.tables.assignments.remove(id) {
                self.undo.push(Undo::RestoreAssignment(assignment));
            }
        }
        ids.len()
    }

    fn insert_assignment(&mut self, assignment: RoleAssignment) {
        self.undo.push(Undo::RemoveAssignment(assignment.id));
        self.tables.assignments.insert(assignment.id, assignment);
    }

    /// Make staged changes permanent and publish a new generation
    fn commit(mut self) {
        self.undo.clear();
        self.committed = true;
        self.generation.fetch_add(1, Ordering::SeqCst);
    }

    fn rollback(&mut self) {
        while let Some(undo) = self.undo.pop() {
            match undo {
                Undo::RemoveGrant(id) => {
                    self.tables.grants.remove(&id);
                }
                Undo::RestoreGrant(grant) => {
                    self.tables.grants.insert(grant.id, grant);
                }
                Undo::RemoveAssignment(id) => {
                    self.tables.assignments.remove(&id);
                }
                Undo::RestoreAssignment(assignment) => {
                    self.tables.assignments.insert(assignment.id, assignment);
                }
            }
        }
    }
}

impl Drop for Transaction<'_> {
    fn drop(&mut self) {
        if !self.committed && !self.undo.is_empty() {
            warn!("Rolling back {} uncommitted change(s)", self.undo.len());
            self.rollback();
        }
    }
}

/// In-memory RBAC store
#[derive(Clone, Default)]
pub struct InMemoryRbacStore {
    tables: Arc<RwLock<Tables>>,
    generation: Arc<AtomicU64>,
}

impl InMemoryRbacStore {
    /// Create an empty store
    pub fn new() -> Self {
        Self::default()
    }

    async fn begin(&self) -> Transaction<'_> {
        Transaction {
            tables: self.tables.write().await,
            generation: &self.generation,
            undo: Vec::new(),
            committed: false,
        }
    }

    fn bump(&self) {
        self.generation.fetch_add(1, Ordering::SeqCst);
    }
}

#[async_trait]
impl RbacStore for InMemoryRbacStore {
    async fn user(&self, id: UserId) -> Result<Option<User>> {
        Ok(self.tables.read().await.users.get(&id).cloned())
    }

    async fn user_by_email(&self, email: &str) -> Result<Option<User>> {
        let email = email.to_lowercase();
        let tables = self.tables.read().await;
        Ok(tables.users.values().find(|u| u.email.to_lowercase() == email).cloned())
    }

    async fn list_users(&self, query: &ListQuery) -> Result<Page<User>> {
        let tables = self.tables.read().await;
        let term = query.search_term();
        let mut users: Vec<User> = tables
            .users
            .values()
            .filter(|u| matches_search(term, [Some(u.email.as_str())]))
            .cloned()
            .collect();
        users.sort_by(|a, b| a.email.to_lowercase().cmp(&b.email.to_lowercase()));
        Ok(Page::from_matches(users, query))
    }

    async fn role(&self, id: RoleId) -> Result<Option<Role>> {
        Ok(self.tables.read().await.roles.get(&id).cloned())
    }

    async fn role_by_name(&self, name: &str) -> Result<Option<Role>> {
        let tables = self.tables.read().await;
        Ok(tables.roles.values().find(|r| r.name == name).cloned())
    }

    async fn roles(&self, ids: &[RoleId]) -> Result<Vec<Role>> {
        let tables = self.tables.read().await;
        Ok(ids.iter().filter_map(|id| tables.roles.get(id).cloned()).collect())
    }

    async fn list_roles(&self, query: &ListQuery) -> Result<Page<Role>> {
        let tables = self.tables.read().await;
        let term = query.search_term();
        let mut roles: Vec<Role> = tables
            .roles
            .values()
            .filter(|r| matches_search(term, [Some(r.name.as_str()), r.description.as_deref()]))
            .cloned()
            .collect();
        roles.sort_by(|a, b| b.priority.cmp(&a.priority).then_with(|| a.name.cmp(&b.name)));
        Ok(Page::from_matches(roles, query))
    }

    async fn permission(&self, id: PermissionId) -> Result<Option<Permission>> {
        Ok(self.tables.read().await.permissions.get(&id).cloned())
    }

    async fn permission_by_name(&self, name: &str) -> Result<Option<Permission>> {
        let tables = self.tables.read().await;
        Ok(tables.permissions.values().find(|p| p.name == name).cloned())
    }

    async fn permissions(&self, ids: &[PermissionId]) -> Result<Vec<Permission>> {
        let tables = self.tables.read().await;
        Ok(ids
            .iter()
            .filter_map(|id| tables.permissions.get(id).cloned())
            .collect())
    }

    async fn list_permissions(&self, query: &ListQuery) -> Result<Page<Permission>> {
        let tables = self.tables.read().await;
        let term = query.search_term();
        let mut permissions: Vec<Permission> = tables
            .permissions
            .values()
            .filter(|p| {
                matches_search(
                    term,
                    [
                        Some(p.name.as_str()),
                        Some(p.display_name.as_str()),
                        p.description.as_deref(),
                    ],
                )
            })
            .cloned()
            .collect();
        permissions.sort_by(|a, b| a.name.cmp(&b.name));
        Ok(Page::from_matches(permissions, query))
    }

    async fn active_permission_ids(&self, ids: &[PermissionId]) -> Result<HashSet<PermissionId>> {
        Ok(self.tables.read().await.active_permission_ids(ids))
    }

    async fn assignments_for_user(&self, user_id: UserId) -> Result<Vec<RoleAssignment>> {
        let tables = self.tables.read().await;
        Ok(tables
            .assignments
            .values()
            .filter(|a| a.user_id == user_id)
            .cloned()
            .collect())
    }

    async fn grants_for_role(&self, role_id: RoleId) -> Result<Vec<RoleGrant>> {
        let tables = self.tables.read().await;
        Ok(tables
            .grants
            .values()
            .filter(|g| g.role_id == role_id)
            .cloned()
            .collect())
    }

    async fn granted_grants_for_roles(&self, role_ids: &[RoleId]) -> Result<Vec<RoleGrant>> {
        let wanted: HashSet<&RoleId> = role_ids.iter().collect();
        let tables = self.tables.read().await;
        Ok(tables
            .grants
            .values()
            .filter(|g| g.granted && wanted.contains(&g.role_id))
            .cloned()
            .collect())
    }

    async fn insert_user(&self, user: User) -> Result<User> {
        let mut tables = self.tables.write().await;
        if tables.email_taken(&user.email, None) {
            return Err(AuthzError::Conflict(
                "User with this email already exists".to_string(),
            ));
        }
        tables.users.insert(user.id, user.clone());
        self.bump();
        Ok(user)
    }

    async fn update_user(&self, user: User) -> Result<User> {
        let mut tables = self.tables.write().await;
        let existing = tables
            .users
            .get(&user.id)
            .ok_or_else(|| AuthzError::NotFound(format!("User {}", user.id)))?;
        let (status, created_at) = (existing.status, existing.created_at);
        if tables.email_taken(&user.email, Some(user.id)) {
            return Err(AuthzError::Conflict(
                "User with this email already exists".to_string(),
            ));
        }
        // Status has its own write path
        let user = User {
            status,
            created_at,
            ..user
        };
        tables.users.insert(user.id, user.clone());
        self.bump();
        Ok(user)
    }

    async fn set_user_status(&self, id: UserId, status: UserStatus) -> Result<User> {
        let mut tables = self.tables.write().await;
        let user = tables
            .users
            .get_mut(&id)
            .ok_or_else(|| AuthzError::NotFound(format!("User {}", id)))?;
        user.status = status;
        let user = user.clone();
        self.bump();
        Ok(user)
    }

    async fn delete_user(&self, id: UserId) -> Result<()> {
        let mut tables = self.tables.write().await;
        if tables.users.remove(&id).is_none() {
            return Err(AuthzError::NotFound(format!("User {}", id)));
        }
        tables.assignments.retain(|_, a| a.user_id != id);
        self.bump();
        Ok(())
    }

    async fn insert_role(&self, role: Role) -> Result<Role> {
        let mut tables = self.tables.write().await;
        if tables.role_name_taken(&role.name, None) {
            return Err(AuthzError::Conflict(
                "Role with this name already exists".to_string(),
            ));
        }
        tables.roles.insert(role.id, role.clone());
        self.bump();
        Ok(role)
    }

    async fn update_role(&self, mut role: Role) -> Result<Role> {
        let mut tables = self.tables.write().await;
        if !tables.roles.contains_key(&role.id) {
            return Err(AuthzError::NotFound(format!("Role {}", role.id)));
        }
        if tables.role_name_taken(&role.name, Some(role.id)) {
            return Err(AuthzError::Conflict(
                "Role with this name already exists".to_string(),
            ));
        }
        role.updated_at = Utc::now();
        tables.roles.insert(role.id, role.clone());
        self.bump();
        Ok(role)
    }

    async fn delete_role(&self, id: RoleId) -> Result<()> {
        let mut tables = self.tables.write().await;
        if tables.roles.remove(&id).is_none() {
            return Err(AuthzError::NotFound(format!("Role {}", id)));
        }
        tables.grants.retain(|_, g| g.role_id != id);
        tables.assignments.retain(|_, a| a.role_id != id);
        self.bump();
        Ok(())
    }

    async fn insert_permission(&self, permission: Permission) -> Result<Permission> {
        let mut tables = self.tables.write().await;
        if tables.permission_name_taken(&permission.name, None) {
            return Err(AuthzError::Conflict(
                "Permission with this name already exists".to_string(),
            ));
        }
        tables.permissions.insert(permission.id, permission.clone());
        self.bump();
        Ok(permission)
    }

    async fn update_permission(&self, mut permission: Permission) -> Result<Permission> {
        let mut tables = self.tables.write().await;
        if !tables.permissions.contains_key(&permission.id) {
            return Err(AuthzError::NotFound(format!("Permission {}", permission.id)));
        }
        if tables.permission_name_taken(&permission.name, Some(permission.id)) {
            return Err(AuthzError::Conflict(
                "Permission with this name already exists".to_string(),
            ));
        }
        permission.updated_at = Utc::now();
        tables.permissions.insert(permission.id, permission.clone());
        self.bump();
        Ok(permission)
    }

    async fn delete_permission(&self, id: PermissionId) -> Result<()> {
        let mut tables = self.tables.write().await;
        if tables.permissions.remove(&id).is_none() {
            return Err(AuthzError::NotFound(format!("Permission {}", id)));
        }
        tables.grants.retain(|_, g| g.permission_id != id);
        self.bump();
        Ok(())
    }

    async fn replace_role_grants(
        &self,
        role_id: RoleId,
        grants: Vec<GrantSpec>,
    ) -> Result<Vec<RoleGrant>> {
        ensure_distinct(grants.iter().map(|g| g.permission_id), "permission")?;

        let mut tx = self.begin().await;

        if !tx.tables.roles.contains_key(&role_id) {
            return Err(AuthzError::NotFound(format!("Role {}", role_id)));
        }

        let wanted: Vec<PermissionId> = grants.iter().map(|g| g.permission_id).collect();
        let active = tx.tables.active_permission_ids(&wanted);
        let missing = missing_ids(&wanted, &active);
        if !missing.is_empty() {
            warn!("Rejected grant replace for role {}: unknown or inactive permissions", role_id);
            return Err(AuthzError::InvalidReference(format!(
                "One or more permissions not found or inactive: {}",
                format_ids(&missing)
            )));
        }

        let removed = tx.remove_grants_for_role(role_id);
        let mut inserted = Vec::with_capacity(grants.len());
        for spec in grants {
            let grant = RoleGrant::from_spec(role_id, spec);
            tx.insert_grant(grant.clone());
            inserted.push(grant);
        }
        tx.commit();

        debug!(
            "Replaced grants of role {}: removed {}, inserted {}",
            role_id,
            removed,
            inserted.len()
        );
        Ok(inserted)
    }

    async fn replace_role_assignments(
        &self,
        user_id: UserId,
        role_ids: Vec<RoleId>,
    ) -> Result<Vec<RoleAssignment>> {
        ensure_distinct(role_ids.iter().copied(), "role")?;

        let mut tx = self.begin().await;

        if !tx.tables.users.contains_key(&user_id) {
            return Err(AuthzError::NotFound(format!("User {}", user_id)));
        }

        let active = tx.tables.active_role_ids(&role_ids);
        let missing = missing_ids(&role_ids, &active);
        if !missing.is_empty() {
            warn!("Rejected role assignment replace for user {}: unknown or inactive roles", user_id);
            return Err(AuthzError::InvalidReference(format!(
                "One or more roles not found or inactive: {}",
                format_ids(&missing)
            )));
        }

        let removed = tx.remove_assignments_for_user(user_id);
        let mut inserted = Vec::with_capacity(role_ids.len());
        for role_id in role_ids {
            let assignment = RoleAssignment::new(user_id, role_id);
            tx.insert_assignment(assignment.clone());
            inserted.push(assignment);
        }
        tx.commit();

        debug!(
            "Replaced role assignments of user {}: removed {}, inserted {}",
            user_id,
            removed,
            inserted.len()
        );
        Ok(inserted)
    }

    async fn generation(&self) -> Result<u64> {
        Ok(self.generation.load(Ordering::SeqCst))
    }
}

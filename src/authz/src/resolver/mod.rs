//! Permission resolution
//!
//! Computes a user's effective permission set from the role graph:
//!
//! ```text
//! User ──(ACTIVE?)──▶ RoleAssignment ──▶ Role (ACTIVE?) ──▶ RoleGrant (granted?) ──▶ Permission (ACTIVE?)
//! ```
//!
//! A permission is effective when at least one such path passes every check.
//! Missing records along a path drop that path silently; resolution never
//! fails for domain reasons, only when storage itself fails.

pub mod cache;

pub use cache::{CacheConfig, CacheStats, ResolutionCache};

use crate::error::Result;
use crate::store::RbacStore;
use crate::types::{Permission, PermissionId, Role, RoleId, UserId};
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use tracing::debug;

/// Deduplicated set of permission names held by a user
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct EffectivePermissions {
    names: HashSet<String>,
}

impl EffectivePermissions {
    /// Empty set
    pub fn new() -> Self {
        Self::default()
    }

    pub fn contains(&self, name: &str) -> bool {
        self.names.contains(name)
    }

    pub fn len(&self) -> usize {
        self.names.len()
    }

    pub fn is_empty(&self) -> bool {
        self.names.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &str> {
        self.names.iter().map(String::as_str)
    }

    /// Names in ascending order
    pub fn sorted_names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.names.iter().cloned().collect();
        names.sort();
        names
    }
}

impl FromIterator<String> for EffectivePermissions {
    fn from_iter<I: IntoIterator<Item = String>>(iter: I) -> Self {
        Self {
            names: iter.into_iter().collect(),
        }
    }
}

impl From<&[Permission]> for EffectivePermissions {
    fn from(permissions: &[Permission]) -> Self {
        permissions.iter().map(|p| p.name.clone()).collect()
    }
}

/// Resolves effective permissions against an [`RbacStore`]
///
/// Stateless apart from the optional cache; safe to share behind `Arc` and
/// call concurrently for any mix of users.
pub struct PermissionResolver {
    store: Arc<dyn RbacStore>,
    cache: Option<ResolutionCache>,
}

impl PermissionResolver {
    /// Create a resolver without caching
    pub fn new(store: Arc<dyn RbacStore>) -> Self {
        Self { store, cache: None }
    }

    /// Create a resolver with a generation-tagged cache
    pub fn with_cache(store: Arc<dyn RbacStore>, config: CacheConfig) -> Self {
        Self {
            store,
            cache: Some(ResolutionCache::new(config)),
        }
    }

    /// Underlying store
    pub fn store(&self) -> &Arc<dyn RbacStore> {
        &self.store
    }

    /// Effective permission names of a user
    ///
    /// Unknown and non-ACTIVE users resolve to the empty set.
    pub async fn resolve(&self, user_id: UserId) -> Result<EffectivePermissions> {
        let Some(cache) = &self.cache else {
            let permissions = self.resolve_permissions(user_id).await?;
            return Ok(EffectivePermissions::from(permissions.as_slice()));
        };

        // Read the generation first: a write landing mid-resolution leaves the
        // entry tagged with the older generation, so it is never served.
        let generation = self.store.generation().await?;
        if let Some(hit) = cache.get(&user_id, generation) {
            debug!("Resolution cache hit for user {}", user_id);
            return Ok(hit);
        }

        let permissions = self.resolve_permissions(user_id).await?;
        let effective = EffectivePermissions::from(permissions.as_slice());
        cache.put(user_id, generation, effective.clone());
        Ok(effective)
    }

    /// Effective permission records of a user, deduplicated and sorted by name
    pub async fn resolve_permissions(&self, user_id: UserId) -> Result<Vec<Permission>> {
        match self.store.user(user_id).await? {
            Some(user) if user.is_active() => {}
            Some(_) => {
                debug!("User {} is not active, no permissions", user_id);
                return Ok(Vec::new());
            }
            None => {
                debug!("User {} unknown, no permissions", user_id);
                return Ok(Vec::new());
            }
        }

        let active_roles = self.active_roles_for(user_id).await?;
        if active_roles.is_empty() {
            debug!("User {} holds no active roles", user_id);
            return Ok(Vec::new());
        }

        let role_ids: Vec<RoleId> = active_roles.iter().map(|r| r.id).collect();
        self.granted_permissions(&role_ids).await
    }

    /// ACTIVE roles assigned to a user
    pub async fn user_roles(&self, user_id: UserId) -> Result<Vec<Role>> {
        self.active_roles_for(user_id).await
    }

    /// Granted ACTIVE permissions of a single role
    pub async fn role_permissions(&self, role_id: RoleId) -> Result<Vec<Permission>> {
        self.granted_permissions(&[role_id]).await
    }

    /// Cache statistics, when caching is enabled
    pub fn cache_stats(&self) -> Option<CacheStats> {
        self.cache.as_ref().map(ResolutionCache::stats)
    }

    /// Drop every cached resolution
    pub fn clear_cache(&self) {
        if let Some(cache) = &self.cache {
            cache.clear();
        }
    }

    async fn active_roles_for(&self, user_id: UserId) -> Result<Vec<Role>> {
        let assignments = self.store.assignments_for_user(user_id).await?;

        let mut seen = HashSet::new();
        let role_ids: Vec<RoleId> = assignments
            .iter()
            .map(|a| a.role_id)
            .filter(|id| seen.insert(*id))
            .collect();
        if role_ids.is_empty() {
            return Ok(Vec::new());
        }

        let mut roles: Vec<Role> = self
            .store
            .roles(&role_ids)
            .await?
            .into_iter()
            .filter(Role::is_active)
            .collect();
        roles.sort_by(|a, b| a.name.cmp(&b.name));

        debug!(
            "User {}: {} assignment(s), {} active role(s)",
            user_id,
            assignments.len(),
            roles.len()
        );
        Ok(roles)
    }

    async fn granted_permissions(&self, role_ids: &[RoleId]) -> Result<Vec<Permission>> {
        let grants = self.store.granted_grants_for_roles(role_ids).await?;

        let mut seen = HashSet::new();
        let permission_ids: Vec<PermissionId> = grants
            .iter()
            .filter(|g| g.granted)
            .map(|g| g.permission_id)
            .filter(|id| seen.insert(*id))
            .collect();
        if permission_ids.is_empty() {
            return Ok(Vec::new());
        }

        // Keyed by id so a permission reachable through several roles counts once
        let by_id: HashMap<PermissionId, Permission> = self
            .store
            .permissions(&permission_ids)
            .await?
            .into_iter()
            .filter(Permission::is_active)
            .map(|p| (p.id, p))
            .collect();

        let mut permissions: Vec<Permission> = by_id.into_values().collect();
        permissions.sort_by(|a, b| a.name.cmp(&b.name));
        Ok(permissions)
    }
}

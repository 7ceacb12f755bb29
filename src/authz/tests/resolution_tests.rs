//! Permission resolution and replace-the-whole-set integration tests
//!
//! Role graph → Resolver, plus the all-or-nothing and atomicity guarantees of
//! the two replace operations under concurrent resolution.

use rbac_authz::resolver::{CacheConfig, PermissionResolver};
use rbac_authz::store::InMemoryRbacStore;
use rbac_authz::{
    AuthzError, GrantSpec, Permission, PermissionStatus, RbacAdmin, RbacStore, Role, RoleStatus,
    User,
};
use std::sync::Arc;
use uuid::Uuid;

struct Graph {
    store: Arc<InMemoryRbacStore>,
    admin: RbacAdmin,
    resolver: PermissionResolver,
}

impl Graph {
    fn new() -> Self {
        let store = Arc::new(InMemoryRbacStore::new());
        Self {
            admin: RbacAdmin::new(store.clone()),
            resolver: PermissionResolver::new(store.clone()),
            store,
        }
    }

    async fn permission(&self, name: &str) -> Permission {
        self.admin.create_permission(Permission::new(name)).await.unwrap()
    }

    async fn role(&self, name: &str, grants: Vec<GrantSpec>) -> Role {
        let role = self.admin.create_role(Role::new(name)).await.unwrap();
        self.admin.replace_role_grants(role.id, grants).await.unwrap();
        role
    }

    async fn user(&self, email: &str, roles: &[&Role]) -> User {
        let user = self.admin.create_user(email, "Test User").await.unwrap();
        self.admin
            .replace_role_assignments(user.id, roles.iter().map(|r| r.id).collect())
            .await
            .unwrap();
        user
    }
}

// ============================================================================
// RESOLUTION PROPERTIES
// ============================================================================

#[tokio::test]
async fn test_no_assignments_resolves_empty() {
    let graph = Graph::new();
    graph.permission("users.read").await;
    let user = graph.user("nobody@example.com", &[]).await;

    assert!(graph.resolver.resolve(user.id).await.unwrap().is_empty());
}

#[tokio::test]
async fn test_unknown_user_is_empty_not_error() {
    let graph = Graph::new();
    let result = graph.resolver.resolve(Uuid::new_v4()).await;
    assert!(result.unwrap().is_empty());
}

#[tokio::test]
async fn test_all_roles_inactive_resolves_empty() {
    let graph = Graph::new();
    let read = graph.permission("users.read").await;
    let update = graph.permission("users.update").await;
    let a = graph.role("reader", vec![GrantSpec::granted(read.id)]).await;
    let b = graph.role("writer", vec![GrantSpec::granted(update.id)]).await;
    let user = graph.user("u@example.com", &[&a, &b]).await;

    for role in [&a, &b] {
        graph
            .store
            .update_role(role.clone().with_status(RoleStatus::Inactive))
            .await
            .unwrap();
    }

    assert!(graph.resolver.resolve(user.id).await.unwrap().is_empty());
}

#[tokio::test]
async fn test_deleted_role_silently_excluded() {
    let graph = Graph::new();
    let read = graph.permission("users.read").await;
    let audit = graph.permission("audit.read").await;
    let kept = graph.role("reader", vec![GrantSpec::granted(read.id)]).await;
    let dropped = graph.role("auditor", vec![GrantSpec::granted(audit.id)]).await;
    let user = graph.user("u@example.com", &[&kept, &dropped]).await;

    graph.admin.delete_role(dropped.id).await.unwrap();

    let effective = graph.resolver.resolve(user.id).await.unwrap();
    assert_eq!(effective.sorted_names(), vec!["users.read"]);
}

#[tokio::test]
async fn test_two_roles_same_permission_deduplicated() {
    let graph = Graph::new();
    let read = graph.permission("users.read").await;
    let a = graph.role("support", vec![GrantSpec::granted(read.id)]).await;
    let b = graph.role("auditor", vec![GrantSpec::granted(read.id)]).await;
    let user = graph.user("u@example.com", &[&a, &b]).await;

    let effective = graph.resolver.resolve(user.id).await.unwrap();
    assert_eq!(effective.len(), 1);
    assert!(effective.contains("users.read"));
}

#[tokio::test]
async fn test_resolve_is_idempotent() {
    let graph = Graph::new();
    let read = graph.permission("users.read").await;
    let create = graph.permission("users.create").await;
    let role = graph
        .role("staff", vec![GrantSpec::granted(read.id), GrantSpec::granted(create.id)])
        .await;
    let user = graph.user("u@example.com", &[&role]).await;

    let first = graph.resolver.resolve(user.id).await.unwrap();
    let second = graph.resolver.resolve(user.id).await.unwrap();
    assert_eq!(first, second);
}

#[tokio::test]
async fn test_conditions_are_carried_not_evaluated() {
    let graph = Graph::new();
    let read = graph.permission("reports.read").await;
    let mut conditions = serde_json::Map::new();
    conditions.insert("department".to_string(), serde_json::json!("finance"));

    let role = graph
        .role(
            "finance",
            vec![GrantSpec::granted(read.id).with_conditions(conditions.clone())],
        )
        .await;
    let user = graph.user("u@example.com", &[&role]).await;

    let grants = graph.store.grants_for_role(role.id).await.unwrap();
    assert_eq!(grants[0].conditions.as_ref(), Some(&conditions));
    assert!(graph.resolver.resolve(user.id).await.unwrap().contains("reports.read"));
}

// ============================================================================
// SCENARIOS
// ============================================================================

#[tokio::test]
async fn test_admin_holds_users_delete() {
    let graph = Graph::new();
    let delete = graph.permission("users.delete").await;
    let admin = graph.role("admin", vec![GrantSpec::granted(delete.id)]).await;
    let user = graph.user("admin@example.com", &[&admin]).await;

    let effective = graph.resolver.resolve(user.id).await.unwrap();
    assert!(effective.contains("users.delete"));
}

#[tokio::test]
async fn test_editor_revoked_publish_excluded() {
    let graph = Graph::new();
    let publish = graph.permission("articles.publish").await;
    let editor = graph.role("editor", vec![GrantSpec::revoked(publish.id)]).await;
    let user = graph.user("editor@example.com", &[&editor]).await;

    let effective = graph.resolver.resolve(user.id).await.unwrap();
    assert!(!effective.contains("articles.publish"));

    // The edge is still on record
    assert_eq!(graph.store.grants_for_role(editor.id).await.unwrap().len(), 1);
}

// ============================================================================
// ALL-OR-NOTHING REPLACES
// ============================================================================

#[tokio::test]
async fn test_replace_grants_with_unknown_permission_keeps_prior_set() {
    let graph = Graph::new();
    let read = graph.permission("users.read").await;
    let update = graph.permission("users.update").await;
    let role = graph
        .role("staff", vec![GrantSpec::granted(read.id), GrantSpec::granted(update.id)])
        .await;
    let before = graph.store.grants_for_role(role.id).await.unwrap();

    let result = graph
        .admin
        .replace_role_grants(
            role.id,
            vec![GrantSpec::granted(read.id), GrantSpec::granted(Uuid::new_v4())],
        )
        .await;

    assert!(matches!(result, Err(AuthzError::InvalidReference(_))));
    let mut after = graph.store.grants_for_role(role.id).await.unwrap();
    let mut before = before;
    before.sort_by_key(|g| g.id);
    after.sort_by_key(|g| g.id);
    assert_eq!(before, after);
}

#[tokio::test]
async fn test_replace_grants_with_inactive_permission_rejected() {
    let graph = Graph::new();
    let read = graph.permission("users.read").await;
    let legacy = graph.permission("legacy.export").await;
    graph
        .store
        .update_permission(legacy.clone().with_status(PermissionStatus::Inactive))
        .await
        .unwrap();
    let role = graph.role("staff", vec![GrantSpec::granted(read.id)]).await;

    let result = graph
        .admin
        .replace_role_grants(role.id, vec![GrantSpec::granted(legacy.id)])
        .await;

    assert!(matches!(result, Err(AuthzError::InvalidReference(_))));
    assert_eq!(graph.store.grants_for_role(role.id).await.unwrap().len(), 1);
}

#[tokio::test]
async fn test_replace_assignments_for_missing_user() {
    let graph = Graph::new();
    let role = graph.role("staff", vec![]).await;

    let result = graph
        .admin
        .replace_role_assignments(Uuid::new_v4(), vec![role.id])
        .await;
    assert!(matches!(result, Err(AuthzError::NotFound(_))));
}

#[tokio::test]
async fn test_replace_assignments_with_inactive_role_keeps_prior_set() {
    let graph = Graph::new();
    let read = graph.permission("users.read").await;
    let active = graph.role("reader", vec![GrantSpec::granted(read.id)]).await;
    let retired = graph.role("retired", vec![]).await;
    graph
        .store
        .update_role(retired.clone().with_status(RoleStatus::Inactive))
        .await
        .unwrap();
    let user = graph.user("u@example.com", &[&active]).await;

    let result = graph
        .admin
        .replace_role_assignments(user.id, vec![retired.id])
        .await;

    assert!(matches!(result, Err(AuthzError::InvalidReference(_))));
    let assignments = graph.store.assignments_for_user(user.id).await.unwrap();
    assert_eq!(assignments.len(), 1);
    assert_eq!(assignments[0].role_id, active.id);
}

#[tokio::test]
async fn test_replace_with_empty_list_clears_edges() {
    let graph = Graph::new();
    let read = graph.permission("users.read").await;
    let role = graph.role("reader", vec![GrantSpec::granted(read.id)]).await;
    let user = graph.user("u@example.com", &[&role]).await;

    graph.admin.replace_role_grants(role.id, vec![]).await.unwrap();
    assert!(graph.resolver.resolve(user.id).await.unwrap().is_empty());
}

// ============================================================================
// CONCURRENCY
// ============================================================================

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_concurrent_resolve_never_sees_empty_grant_set() {
    let graph = Graph::new();
    let read = graph.permission("users.read").await;
    let update = graph.permission("users.update").await;
    let role = graph
        .role("staff", vec![GrantSpec::granted(read.id), GrantSpec::granted(update.id)])
        .await;
    let user = graph.user("u@example.com", &[&role]).await;

    let store = graph.store.clone();
    let writer = tokio::spawn(async move {
        for i in 0..200 {
            let grants = if i % 2 == 0 {
                vec![GrantSpec::granted(read.id)]
            } else {
                vec![GrantSpec::granted(read.id), GrantSpec::granted(update.id)]
            };
            store.replace_role_grants(role.id, grants).await.unwrap();
        }
    });

    let mut readers = Vec::new();
    for _ in 0..4 {
        let resolver = PermissionResolver::new(graph.store.clone());
        let user_id = user.id;
        readers.push(tokio::spawn(async move {
            for _ in 0..200 {
                let effective = resolver.resolve(user_id).await.unwrap();
                assert!(effective.contains("users.read"), "observed a partial grant set");
            }
        }));
    }

    writer.await.unwrap();
    for reader in readers {
        reader.await.unwrap();
    }
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_concurrent_resolve_never_sees_empty_assignment_set() {
    let graph = Graph::new();
    let read = graph.permission("users.read").await;
    let a = graph.role("reader-a", vec![GrantSpec::granted(read.id)]).await;
    let b = graph.role("reader-b", vec![GrantSpec::granted(read.id)]).await;
    let user = graph.user("u@example.com", &[&a]).await;

    let store = graph.store.clone();
    let user_id = user.id;
    let writer = tokio::spawn(async move {
        for i in 0..200 {
            let roles = if i % 2 == 0 { vec![b.id] } else { vec![a.id, b.id] };
            store.replace_role_assignments(user_id, roles).await.unwrap();
        }
    });

    let resolver = Arc::new(PermissionResolver::with_cache(
        graph.store.clone(),
        CacheConfig::default(),
    ));
    let mut readers = Vec::new();
    for _ in 0..4 {
        let resolver = resolver.clone();
        readers.push(tokio::spawn(async move {
            for _ in 0..200 {
                assert!(!resolver.resolve(user_id).await.unwrap().is_empty());
            }
        }));
    }

    writer.await.unwrap();
    for reader in readers {
        reader.await.unwrap();
    }
}

// ============================================================================
// CACHE CONSISTENCY
// ============================================================================

#[tokio::test]
async fn test_cached_resolution_reflects_every_write() {
    let graph = Graph::new();
    let resolver = PermissionResolver::with_cache(
        graph.store.clone(),
        CacheConfig {
            ttl: std::time::Duration::from_secs(3600),
            ..Default::default()
        },
    );
    let read = graph.permission("users.read").await;
    let role = graph.role("reader", vec![GrantSpec::granted(read.id)]).await;
    let user = graph.user("u@example.com", &[&role]).await;

    assert!(resolver.resolve(user.id).await.unwrap().contains("users.read"));

    graph.admin.suspend_user(user.id).await.unwrap();
    assert!(resolver.resolve(user.id).await.unwrap().is_empty());

    graph.admin.activate_user(user.id).await.unwrap();
    assert!(resolver.resolve(user.id).await.unwrap().contains("users.read"));

    graph
        .store
        .update_permission(read.clone().with_status(PermissionStatus::Inactive))
        .await
        .unwrap();
    assert!(resolver.resolve(user.id).await.unwrap().is_empty());

    let stats = resolver.cache_stats().unwrap();
    assert!(stats.stale >= 3);
}

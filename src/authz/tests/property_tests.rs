//! Property tests for resolution and decision evaluation

use proptest::prelude::*;
use rbac_authz::store::InMemoryRbacStore;
use rbac_authz::{
    decide, CheckMode, EffectivePermissions, GrantSpec, Permission, PermissionResolver,
    PermissionStatus, RbacStore, Role, RoleStatus, User, UserStatus,
};
use std::collections::{BTreeMap, BTreeSet, HashSet};
use std::sync::Arc;

const PERMISSIONS: usize = 6;
const ROLES: usize = 4;

/// Randomly generated role graph for a single user
#[derive(Debug, Clone)]
struct GraphSpec {
    permission_active: Vec<bool>,
    role_active: Vec<bool>,
    /// (role, permission) → granted
    grants: BTreeMap<(usize, usize), bool>,
    assigned: BTreeSet<usize>,
    user_active: bool,
}

impl GraphSpec {
    /// Effective permission names computed straight from the definition
    fn expected(&self) -> BTreeSet<String> {
        if !self.user_active {
            return BTreeSet::new();
        }
        self.grants
            .iter()
            .filter(|((r, p), granted)| {
                **granted
                    && self.assigned.contains(r)
                    && self.role_active[*r]
                    && self.permission_active[*p]
            })
            .map(|((_, p), _)| format!("perm.{}", p))
            .collect()
    }
}

fn graph_spec() -> impl Strategy<Value = GraphSpec> {
    (
        prop::collection::vec(any::<bool>(), PERMISSIONS),
        prop::collection::vec(any::<bool>(), ROLES),
        prop::collection::btree_map((0..ROLES, 0..PERMISSIONS), any::<bool>(), 0..16),
        prop::collection::btree_set(0..ROLES, 0..=ROLES),
        any::<bool>(),
    )
        .prop_map(|(permission_active, role_active, grants, assigned, user_active)| GraphSpec {
            permission_active,
            role_active,
            grants,
            assigned,
            user_active,
        })
}

/// Materialize `spec` into a fresh store, writing edges in the given order
async fn build(spec: &GraphSpec, reverse: bool) -> (Arc<InMemoryRbacStore>, uuid::Uuid) {
    let store = Arc::new(InMemoryRbacStore::new());

    let mut permissions = Vec::new();
    for p in 0..PERMISSIONS {
        let permission = store
            .insert_permission(Permission::new(format!("perm.{}", p)))
            .await
            .unwrap();
        permissions.push(permission);
    }

    let mut roles = Vec::new();
    for r in 0..ROLES {
        let role = store.insert_role(Role::new(format!("role.{}", r))).await.unwrap();
        let mut grants: Vec<GrantSpec> = spec
            .grants
            .iter()
            .filter(|((role_idx, _), _)| *role_idx == r)
            .map(|((_, p), granted)| GrantSpec {
                permission_id: permissions[*p].id,
                granted: *granted,
                conditions: None,
            })
            .collect();
        if reverse {
            grants.reverse();
        }
        store.replace_role_grants(role.id, grants).await.unwrap();
        roles.push(role);
    }

    let user = store.insert_user(User::new("prop@example.com", "Prop")).await.unwrap();
    let mut assigned: Vec<_> = spec.assigned.iter().map(|r| roles[*r].id).collect();
    if reverse {
        assigned.reverse();
    }
    store.replace_role_assignments(user.id, assigned).await.unwrap();

    // Statuses change after the edges exist
    for (p, active) in spec.permission_active.iter().enumerate() {
        if !active {
            store
                .update_permission(permissions[p].clone().with_status(PermissionStatus::Inactive))
                .await
                .unwrap();
        }
    }
    for (r, active) in spec.role_active.iter().enumerate() {
        if !active {
            store
                .update_role(roles[r].clone().with_status(RoleStatus::Inactive))
                .await
                .unwrap();
        }
    }
    if !spec.user_active {
        store.set_user_status(user.id, UserStatus::Suspended).await.unwrap();
    }

    (store, user.id)
}

fn names(effective: &EffectivePermissions) -> BTreeSet<String> {
    effective.iter().map(str::to_string).collect()
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(64))]

    #[test]
    fn test_resolve_matches_definition(spec in graph_spec()) {
        let actual = tokio_test::block_on(async {
            let (store, user_id) = build(&spec, false).await;
            PermissionResolver::new(store).resolve(user_id).await.unwrap()
        });

        prop_assert_eq!(names(&actual), spec.expected());
    }

    #[test]
    fn test_resolve_independent_of_edge_order(spec in graph_spec()) {
        let (forward, backward) = tokio_test::block_on(async {
            let (a, user_a) = build(&spec, false).await;
            let (b, user_b) = build(&spec, true).await;
            (
                PermissionResolver::new(a).resolve(user_a).await.unwrap(),
                PermissionResolver::new(b).resolve(user_b).await.unwrap(),
            )
        });

        prop_assert_eq!(names(&forward), names(&backward));
    }

    #[test]
    fn test_empty_requirement_always_satisfied(
        held in prop::collection::hash_set("[a-z]{1,6}\\.[a-z]{1,6}", 0..8),
        any_mode in any::<bool>()
    ) {
        let mode = if any_mode { CheckMode::Any } else { CheckMode::All };
        let effective: EffectivePermissions = held.into_iter().collect();
        let required: [&str; 0] = [];
        prop_assert!(decide(&required, mode, &effective));
    }

    #[test]
    fn test_all_implies_any(
        required in prop::collection::vec("[a-c]", 1..4),
        held in prop::collection::hash_set("[a-d]", 0..4)
    ) {
        let effective: EffectivePermissions = held.iter().cloned().collect();
        if decide(&required, CheckMode::All, &effective) {
            prop_assert!(decide(&required, CheckMode::Any, &effective));
        }
    }

    #[test]
    fn test_decide_matches_set_semantics(
        required in prop::collection::vec("[a-e]", 1..5),
        held in prop::collection::hash_set("[a-e]", 0..5)
    ) {
        let effective: EffectivePermissions = held.iter().cloned().collect();
        let required_set: HashSet<String> = required.iter().cloned().collect();

        prop_assert_eq!(
            decide(&required, CheckMode::All, &effective),
            required_set.is_subset(&held)
        );
        prop_assert_eq!(
            decide(&required, CheckMode::Any, &effective),
            !required_set.is_disjoint(&held)
        );
    }

    #[test]
    fn test_decide_ignores_required_order(
        required in prop::collection::vec("[a-e]", 1..5),
        held in prop::collection::hash_set("[a-e]", 0..5)
    ) {
        let effective: EffectivePermissions = held.into_iter().collect();
        let mut reversed = required.clone();
        reversed.reverse();

        for mode in [CheckMode::All, CheckMode::Any] {
            prop_assert_eq!(decide(&required, mode, &effective), decide(&reversed, mode, &effective));
        }
    }
}

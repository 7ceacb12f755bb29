//! # RBAC Authorization Core
//!
//! Role-based access control: users hold roles, roles are granted
//! permissions, and an access check asks whether a principal's effective
//! permission set satisfies a declared requirement.
//!
//! ## Features
//!
//! - **Permission resolution** over a flat role graph with ACTIVE filtering
//! - **ALL / ANY requirement evaluation** as a pure function
//! - **Declarative requirement registry** with group and operation scopes
//! - **Atomic replace-the-whole-set** mutations for grants and assignments
//! - **Pluggable storage**: in-memory or PostgreSQL (`postgres` feature)
//! - **Generation-tagged caching** that never serves a pre-write result
//!
//! ## Example
//!
//! ```rust
//! use rbac_authz::{
//!     EngineConfig, GrantSpec, OperationRef, Permission, PolicyEnforcementPoint,
//!     Principal, RbacStore, RequirementRegistry, Role, User,
//! };
//! use rbac_authz::store::InMemoryRbacStore;
//! use std::sync::Arc;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let store = Arc::new(InMemoryRbacStore::new());
//!
//!     let delete = store.insert_permission(Permission::new("users.delete")).await?;
//!     let admin = store.insert_role(Role::new("admin")).await?;
//!     store.replace_role_grants(admin.id, vec![GrantSpec::granted(delete.id)]).await?;
//!
//!     let alice = store.insert_user(User::new("alice@example.com", "Alice")).await?;
//!     store.replace_role_assignments(alice.id, vec![admin.id]).await?;
//!
//!     let registry = RequirementRegistry::builder()
//!         .operation("users", "remove")
//!         .require(["users.delete"])
//!         .build();
//!     let pep = PolicyEnforcementPoint::new(EngineConfig::default(), store, registry);
//!
//!     let decision = pep
//!         .enforce_operation(&OperationRef::new("users", "remove"), Some(&Principal::new(alice.id)))
//!         .await?;
//!
//!     if decision.allowed {
//!         println!("Access granted!");
//!     }
//!
//!     Ok(())
//! }
//! ```

pub mod admin;
pub mod config;
pub mod engine;
pub mod error;
pub mod resolver;
pub mod seed;
pub mod store;
pub mod types;

// Re-export commonly used types
pub use admin::{PermissionUpdate, RbacAdmin, RoleUpdate, UserUpdate};
pub use config::AuthzConfig;
pub use engine::{
    decide, CheckMode, Decision, DecisionReason, EngineConfig, OperationRef, PolicyEnforcementPoint,
    Requirement, RequirementRegistry,
};
pub use error::{AuthzError, Result};
pub use resolver::{EffectivePermissions, PermissionResolver};
pub use store::RbacStore;
pub use types::{
    GrantSpec, ListQuery, Page, Permission, PermissionId, PermissionStatus, PermissionType,
    Principal, Role, RoleAssignment, RoleGrant, RoleId, RoleStatus, User, UserId, UserStatus,
};

/// Crate version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

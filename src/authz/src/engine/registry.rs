//! Declarative requirement registry
//!
//! Requirements are declared at two scopes: a group of operations and a
//! single operation. The operation scope overrides the group scope, and it
//! does so separately for the permission list and the mode. Nothing is merged.

use super::evaluator::{CheckMode, Requirement};
use crate::error::{AuthzError, Result};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;

/// Identifies one protected operation within its group
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct OperationRef {
    pub group: String,
    pub operation: String,
}

impl OperationRef {
    pub fn new(group: impl Into<String>, operation: impl Into<String>) -> Self {
        Self {
            group: group.into(),
            operation: operation.into(),
        }
    }
}

impl fmt::Display for OperationRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}::{}", self.group, self.operation)
    }
}

/// What one scope declares; either half may be absent
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct Declaration {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub permissions: Option<Vec<String>>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub mode: Option<CheckMode>,
}

impl Declaration {
    fn is_empty(&self) -> bool {
        self.permissions.is_none() && self.mode.is_none()
    }
}

/// Serialized registry contents
///
/// ```json
/// {
///   "groups": { "users": { "permissions": ["users.read"] } },
///   "operations": {
///     "users": { "remove": { "permissions": ["users.delete"], "mode": "all" } }
///   }
/// }
/// ```
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RegistryDocument {
    #[serde(default)]
    pub groups: HashMap<String, Declaration>,

    #[serde(default)]
    pub operations: HashMap<String, HashMap<String, Declaration>>,
}

/// Read-only operation → requirement table, built once at startup
#[derive(Debug, Clone, Default)]
pub struct RequirementRegistry {
    groups: HashMap<String, Declaration>,
    operations: HashMap<OperationRef, Declaration>,
}

impl RequirementRegistry {
    pub fn builder() -> RegistryBuilder {
        RegistryBuilder::default()
    }

    /// Parse a registry from its JSON document form
    pub fn from_json(json: &str) -> Result<Self> {
        let document: RegistryDocument = serde_json::from_str(json)
            .map_err(|e| AuthzError::InvalidInput(format!("Invalid registry document: {}", e)))?;
        Ok(Self::from_document(document))
    }

    pub fn from_document(document: RegistryDocument) -> Self {
        let operations = document
            .operations
            .into_iter()
            .flat_map(|(group, ops)| {
                ops.into_iter()
                    .map(move |(operation, decl)| (OperationRef::new(group.clone(), operation), decl))
            })
            .filter(|(_, decl)| !decl.is_empty())
            .collect();
        let groups = document
            .groups
            .into_iter()
            .filter(|(_, decl)| !decl.is_empty())
            .collect();

        Self { groups, operations }
    }

    /// Effective requirement of an operation
    ///
    /// `None` means neither scope declared anything: the operation is public.
    pub fn lookup(&self, op: &OperationRef) -> Option<Requirement> {
        let group = self.groups.get(&op.group);
        let operation = self.operations.get(op);
        if group.is_none() && operation.is_none() {
            return None;
        }

        let permissions = operation
            .and_then(|d| d.permissions.clone())
            .or_else(|| group.and_then(|d| d.permissions.clone()))
            .unwrap_or_default();
        let mode = operation
            .and_then(|d| d.mode)
            .or_else(|| group.and_then(|d| d.mode))
            .unwrap_or_default();

        Some(Requirement { permissions, mode })
    }

    pub fn len(&self) -> usize {
        self.groups.len() + self.operations.len()
    }

    pub fn is_empty(&self) -> bool {
        self.groups.is_empty() && self.operations.is_empty()
    }
}

/// Fluent construction of a [`RequirementRegistry`]
#[derive(Debug, Default)]
pub struct RegistryBuilder {
    groups: HashMap<String, Declaration>,
    operations: HashMap<OperationRef, Declaration>,
}

impl RegistryBuilder {
    /// Start (or continue) declaring a group-scope requirement
    pub fn group(self, name: impl Into<String>) -> ScopeBuilder {
        ScopeBuilder {
            builder: self,
            target: Scope::Group(name.into()),
        }
    }

    /// Start (or continue) declaring an operation-scope requirement
    pub fn operation(self, group: impl Into<String>, operation: impl Into<String>) -> ScopeBuilder {
        ScopeBuilder {
            builder: self,
            target: Scope::Operation(OperationRef::new(group, operation)),
        }
    }

    pub fn build(self) -> RequirementRegistry {
        RequirementRegistry {
            groups: self.groups,
            operations: self.operations,
        }
    }

    fn declaration(&mut self, scope: &Scope) -> &mut Declaration {
        match scope {
            Scope::Group(name) => self.groups.entry(name.clone()).or_default(),
            Scope::Operation(op) => self.operations.entry(op.clone()).or_default(),
        }
    }
}

enum Scope {
    Group(String),
    Operation(OperationRef),
}

/// Declares the permission list and mode of one scope
pub struct ScopeBuilder {
    builder: RegistryBuilder,
    target: Scope,
}

impl ScopeBuilder {
    /// Declare the required permission list
    pub fn require<I, S>(mut self, permissions: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let permissions = permissions.into_iter().map(Into::into).collect();
        self.builder.declaration(&self.target).permissions = Some(permissions);
        self
    }

    /// Declare the check mode
    pub fn mode(mut self, mode: CheckMode) -> Self {
        self.builder.declaration(&self.target).mode = Some(mode);
        self
    }

    pub fn group(self, name: impl Into<String>) -> ScopeBuilder {
        self.builder.group(name)
    }

    pub fn operation(self, group: impl Into<String>, operation: impl Into<String>) -> ScopeBuilder {
        self.builder.operation(group, operation)
    }

    pub fn build(self) -> RequirementRegistry {
        self.builder.build()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_undeclared_operation_is_public() {
        let registry = RequirementRegistry::builder()
            .group("users")
            .require(["users.read"])
            .build();

        assert!(registry.lookup(&OperationRef::new("health", "check")).is_none());
    }

    #[test]
    fn test_group_scope_applies_to_operations() {
        let registry = RequirementRegistry::builder()
            .group("users")
            .require(["users.read"])
            .mode(CheckMode::Any)
            .build();

        let req = registry.lookup(&OperationRef::new("users", "list")).unwrap();
        assert_eq!(req.permissions, vec!["users.read"]);
        assert_eq!(req.mode, CheckMode::Any);
    }

    #[test]
    fn test_operation_list_replaces_group_list() {
        let registry = RequirementRegistry::builder()
            .group("users")
            .require(["users.read", "users.update"])
            .operation("users", "remove")
            .require(["users.delete"])
            .build();

        let req = registry.lookup(&OperationRef::new("users", "remove")).unwrap();
        assert_eq!(req.permissions, vec!["users.delete"]);
    }

    #[test]
    fn test_list_and_mode_override_independently() {
        let registry = RequirementRegistry::builder()
            .group("roles")
            .require(["roles.read"])
            .mode(CheckMode::Any)
            .operation("roles", "update")
            .require(["roles.update", "roles.assign-permissions"])
            .operation("roles", "audit")
            .mode(CheckMode::All)
            .build();

        let update = registry.lookup(&OperationRef::new("roles", "update")).unwrap();
        assert_eq!(update.permissions, vec!["roles.update", "roles.assign-permissions"]);
        assert_eq!(update.mode, CheckMode::Any);

        let audit = registry.lookup(&OperationRef::new("roles", "audit")).unwrap();
        assert_eq!(audit.permissions, vec!["roles.read"]);
        assert_eq!(audit.mode, CheckMode::All);
    }

    #[test]
    fn test_mode_only_declaration_has_empty_list() {
        let registry = RequirementRegistry::builder()
            .operation("profile", "me")
            .mode(CheckMode::All)
            .build();

        let req = registry.lookup(&OperationRef::new("profile", "me")).unwrap();
        assert!(req.permissions.is_empty());
    }

    #[test]
    fn test_from_json() {
        let json = r#"{
            "groups": { "users": { "permissions": ["users.read"] } },
            "operations": {
                "users": { "remove": { "permissions": ["users.delete"], "mode": "any" } },
                "health": { "check": {} }
            }
        }"#;
        let registry = RequirementRegistry::from_json(json).unwrap();

        let remove = registry.lookup(&OperationRef::new("users", "remove")).unwrap();
        assert_eq!(remove.permissions, vec!["users.delete"]);
        assert_eq!(remove.mode, CheckMode::Any);

        // An empty declaration declares nothing
        assert!(registry.lookup(&OperationRef::new("health", "check")).is_none());
        assert_eq!(registry.len(), 2);
    }

    #[test]
    fn test_from_json_rejects_malformed() {
        let result = RequirementRegistry::from_json(r#"{"groups": {"users": {"mode": "some"}}}"#);
        assert!(matches!(result, Err(AuthzError::InvalidInput(_))));
    }
}

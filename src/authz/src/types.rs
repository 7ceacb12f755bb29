//! Core RBAC entities
//!
//! Records are stored in flat tables keyed by id. Relations are plain
//! foreign-key fields resolved through store lookups; nothing holds a
//! back-reference to its parent.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use uuid::Uuid;

/// Unique user identifier
pub type UserId = Uuid;

/// Unique role identifier
pub type RoleId = Uuid;

/// Unique permission identifier
pub type PermissionId = Uuid;

/// Unique role assignment identifier
pub type AssignmentId = Uuid;

/// Unique role grant identifier
pub type GrantId = Uuid;

/// Opaque per-grant condition payload. Stored and returned, never evaluated.
pub type Conditions = Map<String, Value>;

/// User account status
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum UserStatus {
    #[default]
    Active,
    Suspended,
}

/// Role status
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RoleStatus {
    #[default]
    Active,
    Inactive,
}

/// Permission status
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PermissionStatus {
    #[default]
    Active,
    Inactive,
}

/// Informational permission category. Not consulted by resolution.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PermissionType {
    Module,
    Route,
    #[default]
    Action,
    Resource,
}

macro_rules! status_str {
    ($ty:ty { $($variant:ident => $s:literal),+ $(,)? }) => {
        impl $ty {
            /// Storage representation
            pub fn as_str(&self) -> &'static str {
                match self {
                    $(Self::$variant => $s),+
                }
            }

            /// Parse the storage representation
            pub fn parse(s: &str) -> Option<Self> {
                match s {
                    $($s => Some(Self::$variant),)+
                    _ => None,
                }
            }
        }
    };
}

status_str!(UserStatus { Active => "ACTIVE", Suspended => "SUSPENDED" });
status_str!(RoleStatus { Active => "active", Inactive => "inactive" });
status_str!(PermissionStatus { Active => "active", Inactive => "inactive" });
status_str!(PermissionType {
    Module => "module",
    Route => "route",
    Action => "action",
    Resource => "resource",
});

/// User account
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct User {
    pub id: UserId,

    /// Unique, compared case-insensitively
    pub email: String,

    pub name: String,

    #[serde(default)]
    pub status: UserStatus,

    pub created_at: DateTime<Utc>,
}

impl User {
    /// Create a new active user
    pub fn new(email: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            id: Uuid::new_v4(),
            email: email.into(),
            name: name.into(),
            status: UserStatus::Active,
            created_at: Utc::now(),
        }
    }

    pub fn is_active(&self) -> bool {
        self.status == UserStatus::Active
    }
}

/// Flat role. `priority` is advisory and never consulted by resolution.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Role {
    pub id: RoleId,

    /// Globally unique role name
    pub name: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,

    #[serde(default)]
    pub status: RoleStatus,

    #[serde(default)]
    pub priority: i32,

    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Role {
    /// Create a new active role with priority 0
    pub fn new(name: impl Into<String>) -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::new_v4(),
            name: name.into(),
            description: None,
            status: RoleStatus::Active,
            priority: 0,
            created_at: now,
            updated_at: now,
        }
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    pub fn with_status(mut self, status: RoleStatus) -> Self {
        self.status = status;
        self
    }

    pub fn with_priority(mut self, priority: i32) -> Self {
        self.priority = priority;
        self
    }

    pub fn is_active(&self) -> bool {
        self.status == RoleStatus::Active
    }
}

/// Catalog permission, identified at check time by its unique `name`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Permission {
    pub id: PermissionId,

    /// Globally unique permission name (e.g. "users.delete")
    pub name: String,

    pub display_name: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,

    #[serde(default, rename = "type")]
    pub kind: PermissionType,

    #[serde(default)]
    pub status: PermissionStatus,

    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Permission {
    /// Create a new active action permission; display name defaults to the name
    pub fn new(name: impl Into<String>) -> Self {
        let name = name.into();
        let now = Utc::now();
        Self {
            id: Uuid::new_v4(),
            display_name: name.clone(),
            name,
            description: None,
            kind: PermissionType::Action,
            status: PermissionStatus::Active,
            created_at: now,
            updated_at: now,
        }
    }

    pub fn with_display_name(mut self, display_name: impl Into<String>) -> Self {
        self.display_name = display_name.into();
        self
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    pub fn with_kind(mut self, kind: PermissionType) -> Self {
        self.kind = kind;
        self
    }

    pub fn with_status(mut self, status: PermissionStatus) -> Self {
        self.status = status;
        self
    }

    pub fn is_active(&self) -> bool {
        self.status == PermissionStatus::Active
    }
}

/// User → Role edge
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RoleAssignment {
    pub id: AssignmentId,
    pub user_id: UserId,
    pub role_id: RoleId,
}

impl RoleAssignment {
    pub fn new(user_id: UserId, role_id: RoleId) -> Self {
        Self {
            id: Uuid::new_v4(),
            user_id,
            role_id,
        }
    }
}

/// Role → Permission edge
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RoleGrant {
    pub id: GrantId,
    pub role_id: RoleId,
    pub permission_id: PermissionId,

    /// `false` keeps the edge on record without contributing the permission
    pub granted: bool,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub conditions: Option<Conditions>,
}

impl RoleGrant {
    /// Materialize a grant edge for `role_id` from its replace-list entry
    pub fn from_spec(role_id: RoleId, spec: GrantSpec) -> Self {
        Self {
            id: Uuid::new_v4(),
            role_id,
            permission_id: spec.permission_id,
            granted: spec.granted,
            conditions: spec.conditions,
        }
    }
}

/// One entry of a `replace_role_grants` list
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GrantSpec {
    pub permission_id: PermissionId,

    #[serde(default = "default_granted")]
    pub granted: bool,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub conditions: Option<Conditions>,
}

fn default_granted() -> bool {
    true
}

impl GrantSpec {
    /// A granted edge without conditions
    pub fn granted(permission_id: PermissionId) -> Self {
        Self {
            permission_id,
            granted: true,
            conditions: None,
        }
    }

    /// An edge kept on record but not granting the permission
    pub fn revoked(permission_id: PermissionId) -> Self {
        Self {
            permission_id,
            granted: false,
            conditions: None,
        }
    }

    pub fn with_conditions(mut self, conditions: Conditions) -> Self {
        self.conditions = Some(conditions);
        self
    }
}

/// Authenticated identity attached to a request
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Principal {
    pub user_id: UserId,
}

impl Principal {
    pub fn new(user_id: UserId) -> Self {
        Self { user_id }
    }
}

/// Paged listing request. `page` is 1-based.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ListQuery {
    #[serde(default = "default_page")]
    pub page: u32,

    #[serde(default = "default_limit")]
    pub limit: u32,

    /// Case-insensitive substring matched against the searchable text fields
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub search: Option<String>,
}

fn default_page() -> u32 {
    1
}

fn default_limit() -> u32 {
    10
}

impl Default for ListQuery {
    fn default() -> Self {
        Self {
            page: default_page(),
            limit: default_limit(),
            search: None,
        }
    }
}

impl ListQuery {
    pub fn new(page: u32, limit: u32) -> Self {
        Self {
            page,
            limit,
            search: None,
        }
    }

    pub fn with_search(mut self, search: impl Into<String>) -> Self {
        self.search = Some(search.into());
        self
    }

    /// Rows skipped before this page
    pub fn offset(&self) -> u64 {
        u64::from(self.page.saturating_sub(1)) * u64::from(self.limit)
    }

    /// Search term with surrounding whitespace removed; blank counts as none
    pub fn search_term(&self) -> Option<&str> {
        self.search.as_deref().map(str::trim).filter(|s| !s.is_empty())
    }
}

/// One page of a listing plus the total number of matching records
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Page<T> {
    pub items: Vec<T>,
    pub total: u64,
    pub page: u32,
    pub limit: u32,
}

impl<T> Page<T> {
    /// Slice an already filtered and ordered list down to `query`'s page
    pub fn from_matches(matches: Vec<T>, query: &ListQuery) -> Self {
        let total = matches.len() as u64;
        let items = matches
            .into_iter()
            .skip(query.offset() as usize)
            .take(query.limit as usize)
            .collect();
        Self {
            items,
            total,
            page: query.page,
            limit: query.limit,
        }
    }
}

//! Access decision evaluation
//!
//! Pure comparison of a requirement against an effective permission set.
//! Total over its inputs: unknown names never match, nothing fails.

use crate::resolver::EffectivePermissions;
use serde::{Deserialize, Serialize};
use std::fmt;

/// How a requirement's permission list is combined
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CheckMode {
    /// Every listed permission must be held
    #[default]
    All,

    /// At least one listed permission must be held
    Any,
}

impl CheckMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            CheckMode::All => "all",
            CheckMode::Any => "any",
        }
    }
}

impl fmt::Display for CheckMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Permissions a protected operation requires, and how to combine them
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct Requirement {
    /// Required permission names, in declaration order
    #[serde(default)]
    pub permissions: Vec<String>,

    #[serde(default)]
    pub mode: CheckMode,
}

impl Requirement {
    /// Require every one of `permissions`
    pub fn all<I, S>(permissions: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            permissions: permissions.into_iter().map(Into::into).collect(),
            mode: CheckMode::All,
        }
    }

    /// Require at least one of `permissions`
    pub fn any<I, S>(permissions: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            permissions: permissions.into_iter().map(Into::into).collect(),
            mode: CheckMode::Any,
        }
    }

    pub fn is_satisfied_by(&self, effective: &EffectivePermissions) -> bool {
        decide(&self.permissions, self.mode, effective)
    }
}

/// Decide whether `effective` satisfies `required` under `mode`
///
/// An empty `required` list is always satisfied, in both modes.
pub fn decide<S: AsRef<str>>(required: &[S], mode: CheckMode, effective: &EffectivePermissions) -> bool {
    if required.is_empty() {
        return true;
    }

    match mode {
        CheckMode::All => required.iter().all(|p| effective.contains(p.as_ref())),
        CheckMode::Any => required.iter().any(|p| effective.contains(p.as_ref())),
    }
}

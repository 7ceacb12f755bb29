//! Enforcement decision types

use super::evaluator::CheckMode;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Outcome of one enforcement check
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Decision {
    /// Unique decision ID
    pub id: String,

    /// Whether the operation may proceed
    pub allowed: bool,

    /// Reason for the decision
    pub reason: DecisionReason,

    /// Decision timestamp (milliseconds since epoch)
    pub timestamp: i64,
}

impl Decision {
    fn new(allowed: bool, reason: DecisionReason) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            allowed,
            reason,
            timestamp: chrono::Utc::now().timestamp_millis(),
        }
    }

    /// No requirement declared; the check was bypassed
    pub fn public() -> Self {
        Self::new(true, DecisionReason::Public)
    }

    /// Requirement satisfied
    pub fn granted() -> Self {
        Self::new(true, DecisionReason::Granted)
    }

    /// A requirement was declared but no principal was attached
    pub fn unauthenticated() -> Self {
        Self::new(false, DecisionReason::Unauthenticated)
    }

    /// Principal present but the requirement is not satisfied
    pub fn forbidden(required: Vec<String>, mode: CheckMode) -> Self {
        Self::new(false, DecisionReason::Forbidden { required, mode })
    }

    pub fn is_denied(&self) -> bool {
        !self.allowed
    }

    /// Caller-facing explanation, empty for allows
    ///
    /// Names the violated requirement only. The principal's held
    /// permissions are never part of the message.
    pub fn message(&self) -> String {
        match &self.reason {
            DecisionReason::Public | DecisionReason::Granted => String::new(),
            DecisionReason::Unauthenticated => "User not authenticated".to_string(),
            DecisionReason::Forbidden { required, mode } => format!(
                "Insufficient permissions. Required ({}): {}",
                mode,
                required.join(", ")
            ),
        }
    }
}

/// Reason for an enforcement decision
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum DecisionReason {
    /// Operation has no declared requirement
    Public,

    /// Effective permissions satisfy the requirement
    Granted,

    /// No authenticated principal
    Unauthenticated,

    /// Effective permissions do not satisfy the requirement
    Forbidden { required: Vec<String>, mode: CheckMode },
}

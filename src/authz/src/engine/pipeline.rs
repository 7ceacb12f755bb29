//! Explicit per-request stage chain
//!
//! The transport layer builds a [`Pipeline`] once, usually
//! authentication then authorization, and runs it before each handler.
//! Stages run in order and the first rejection ends the run.

use super::decision::Decision;
use super::registry::OperationRef;
use super::PolicyEnforcementPoint;
use crate::error::{AuthzError, Result};
use crate::types::Principal;
use async_trait::async_trait;
use std::sync::Arc;
use tracing::{debug, warn};

/// Request-scoped state threaded through the stages
#[derive(Debug, Clone)]
pub struct RequestContext {
    /// Operation being attempted
    pub operation: OperationRef,

    /// Raw credentials presented by the caller, if any
    pub credentials: Option<String>,

    /// Authenticated identity, filled in by authentication
    pub principal: Option<Principal>,

    /// Authorization outcome, filled in by authorization
    pub decision: Option<Decision>,
}

impl RequestContext {
    pub fn new(operation: OperationRef) -> Self {
        Self {
            operation,
            credentials: None,
            principal: None,
            decision: None,
        }
    }

    pub fn with_credentials(mut self, credentials: impl Into<String>) -> Self {
        self.credentials = Some(credentials.into());
        self
    }

    pub fn with_principal(mut self, principal: Principal) -> Self {
        self.principal = Some(principal);
        self
    }
}

/// Result of a single stage
#[derive(Debug, Clone)]
pub enum StageOutcome {
    Continue,
    Reject(Decision),
}

/// One step of the request pipeline
#[async_trait]
pub trait Stage: Send + Sync {
    /// Stage name for logging
    fn name(&self) -> &str;

    async fn process(&self, ctx: &mut RequestContext) -> Result<StageOutcome>;
}

/// Verifies caller credentials
///
/// Credential formats and token handling live outside this crate.
#[async_trait]
pub trait Authenticator: Send + Sync {
    /// `Ok(None)` for credentials that do not identify anyone
    async fn authenticate(&self, credentials: &str) -> Result<Option<Principal>>;
}

/// Attaches a principal when the credentials verify
///
/// Missing or unrecognised credentials leave the request anonymous. Whether
/// anonymous is acceptable is decided by authorization.
pub struct AuthenticationStage {
    authenticator: Arc<dyn Authenticator>,
}

impl AuthenticationStage {
    pub fn new(authenticator: Arc<dyn Authenticator>) -> Self {
        Self { authenticator }
    }
}

#[async_trait]
impl Stage for AuthenticationStage {
    fn name(&self) -> &str {
        "authentication"
    }

    async fn process(&self, ctx: &mut RequestContext) -> Result<StageOutcome> {
        if ctx.principal.is_some() {
            return Ok(StageOutcome::Continue);
        }

        if let Some(credentials) = ctx.credentials.as_deref() {
            ctx.principal = self.authenticator.authenticate(credentials).await?;
            if ctx.principal.is_none() {
                debug!("Credentials for {} did not verify", ctx.operation);
            }
        }

        Ok(StageOutcome::Continue)
    }
}

/// Enforces the operation's registered requirement
pub struct AuthorizationStage {
    pep: Arc<PolicyEnforcementPoint>,
}

impl AuthorizationStage {
    pub fn new(pep: Arc<PolicyEnforcementPoint>) -> Self {
        Self { pep }
    }
}

#[async_trait]
impl Stage for AuthorizationStage {
    fn name(&self) -> &str {
        "authorization"
    }

    async fn process(&self, ctx: &mut RequestContext) -> Result<StageOutcome> {
        let decision = self
            .pep
            .enforce_operation(&ctx.operation, ctx.principal.as_ref())
            .await?;

        if decision.allowed {
            ctx.decision = Some(decision);
            Ok(StageOutcome::Continue)
        } else {
            Ok(StageOutcome::Reject(decision))
        }
    }
}

/// Ordered stage chain
#[derive(Default)]
pub struct Pipeline {
    stages: Vec<Box<dyn Stage>>,
}

impl Pipeline {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a stage
    pub fn stage(mut self, stage: impl Stage + 'static) -> Self {
        self.stages.push(Box::new(stage));
        self
    }

    /// Authentication followed by authorization
    pub fn standard(authenticator: Arc<dyn Authenticator>, pep: Arc<PolicyEnforcementPoint>) -> Self {
        Self::new()
            .stage(AuthenticationStage::new(authenticator))
            .stage(AuthorizationStage::new(pep))
    }

    /// Run every stage in order
    ///
    /// Returns the first rejection, otherwise the decision recorded by
    /// authorization. A chain that finishes without recording a decision
    /// fails with `Internal` rather than allowing the request.
    pub async fn run(&self, ctx: &mut RequestContext) -> Result<Decision> {
        for stage in &self.stages {
            if let StageOutcome::Reject(decision) = stage.process(ctx).await? {
                debug!("Stage '{}' rejected {}: {}", stage.name(), ctx.operation, decision.message());
                return Ok(decision);
            }
        }

        ctx.decision.clone().ok_or_else(|| {
            warn!("No stage recorded a decision for {}", ctx.operation);
            AuthzError::Internal(format!("No authorization decision recorded for {}", ctx.operation))
        })
    }

    pub fn len(&self) -> usize {
        self.stages.len()
    }

    pub fn is_empty(&self) -> bool {
        self.stages.is_empty()
    }
}

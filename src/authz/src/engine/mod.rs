//! Policy enforcement
//!
//! Ties the declared per-operation requirements to permission resolution and
//! the decision evaluator, and turns the result into an allow/deny
//! [`Decision`] with a diagnostic message on deny.

pub mod decision;
pub mod evaluator;
pub mod metrics;
pub mod pipeline;
pub mod registry;

pub use decision::{Decision, DecisionReason};
pub use evaluator::{decide, CheckMode, Requirement};
pub use metrics::{EngineMetrics, MetricsCollector};
pub use pipeline::{
    AuthenticationStage, Authenticator, AuthorizationStage, Pipeline, RequestContext, Stage,
};
pub use registry::{Declaration, OperationRef, RegistryBuilder, RegistryDocument, RequirementRegistry};

use crate::error::Result;
use crate::resolver::{CacheConfig, CacheStats, PermissionResolver};
use crate::store::RbacStore;
use crate::types::Principal;

use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, info, warn};

/// Enforcement point configuration
#[derive(Debug, Clone)]
pub struct EngineConfig {
    /// Cache resolved permission sets
    pub enable_cache: bool,

    /// Resolution cache configuration
    pub cache_config: CacheConfig,

    /// Enable metrics collection
    pub enable_metrics: bool,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            enable_cache: true,
            cache_config: CacheConfig::default(),
            enable_metrics: true,
        }
    }
}

/// Policy Enforcement Point
///
/// ```text
/// operation → RequirementRegistry ──(None)──────────────────────────▶ Public
///                    │
///                    ▼ Requirement
///              principal? ──(absent)────────────────────────────────▶ Unauthenticated
///                    │
///                    ▼
///          PermissionResolver → decide(required, mode, effective) ─▶ Granted | Forbidden
/// ```
///
/// Single pass, no retries. Storage failures surface as `Err` and are never
/// turned into an allow.
pub struct PolicyEnforcementPoint {
    resolver: Arc<PermissionResolver>,

    registry: Arc<RequirementRegistry>,

    metrics: Option<Arc<MetricsCollector>>,

    config: EngineConfig,
}

impl PolicyEnforcementPoint {
    /// Create an enforcement point over `store` with the given registry
    pub fn new(
        config: EngineConfig,
        store: Arc<dyn RbacStore>,
        registry: RequirementRegistry,
    ) -> Self {
        let resolver = if config.enable_cache {
            PermissionResolver::with_cache(store, config.cache_config.clone())
        } else {
            PermissionResolver::new(store)
        };

        Self::with_resolver(config, Arc::new(resolver), Arc::new(registry))
    }

    /// Create an enforcement point sharing an existing resolver and registry
    pub fn with_resolver(
        config: EngineConfig,
        resolver: Arc<PermissionResolver>,
        registry: Arc<RequirementRegistry>,
    ) -> Self {
        let metrics = if config.enable_metrics {
            Some(Arc::new(MetricsCollector::new()))
        } else {
            None
        };

        info!(
            "PolicyEnforcementPoint initialized with cache={}, metrics={}, {} declaration(s)",
            config.enable_cache,
            config.enable_metrics,
            registry.len()
        );

        Self {
            resolver,
            registry,
            metrics,
            config,
        }
    }

    /// Check `principal` against an explicit requirement
    ///
    /// A declared requirement always needs a principal, even when its
    /// permission list is empty.
    pub async fn enforce(
        &self,
        requirement: &Requirement,
        principal: Option<&Principal>,
    ) -> Result<Decision> {
        let start = Instant::now();

        let Some(principal) = principal else {
            debug!("No principal attached, denying");
            let decision = Decision::unauthenticated();
            self.finalize(&decision, start).await;
            return Ok(decision);
        };

        let effective = match self.resolver.resolve(principal.user_id).await {
            Ok(effective) => effective,
            Err(e) => {
                warn!("Permission resolution failed for user {}: {}", principal.user_id, e);
                if let Some(metrics) = &self.metrics {
                    metrics.record_error().await;
                }
                return Err(e);
            }
        };

        let decision = if requirement.is_satisfied_by(&effective) {
            Decision::granted()
        } else {
            Decision::forbidden(requirement.permissions.clone(), requirement.mode)
        };

        info!(
            "Decision: {} for user {} (required {}: [{}])",
            if decision.allowed { "ALLOW" } else { "DENY" },
            principal.user_id,
            requirement.mode,
            requirement.permissions.join(", ")
        );

        self.finalize(&decision, start).await;
        Ok(decision)
    }

    /// Check `principal` against the registered requirement of `op`
    ///
    /// Operations without any declaration are public and bypass the check.
    pub async fn enforce_operation(
        &self,
        op: &OperationRef,
        principal: Option<&Principal>,
    ) -> Result<Decision> {
        match self.registry.lookup(op) {
            Some(requirement) => {
                debug!("Enforcing {} ({} permission(s))", op, requirement.permissions.len());
                self.enforce(&requirement, principal).await
            }
            None => {
                debug!("No requirement declared for {}, public", op);
                let decision = Decision::public();
                if let Some(metrics) = &self.metrics {
                    metrics.record_decision(&decision).await;
                }
                Ok(decision)
            }
        }
    }

    pub fn registry(&self) -> &RequirementRegistry {
        &self.registry
    }

    pub fn resolver(&self) -> &Arc<PermissionResolver> {
        &self.resolver
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    /// Get engine metrics
    pub async fn get_metrics(&self) -> Option<EngineMetrics> {
        match &self.metrics {
            Some(metrics) => Some(metrics.get_metrics().await),
            None => None,
        }
    }

    /// Get resolution cache statistics
    pub fn get_cache_stats(&self) -> Option<CacheStats> {
        self.resolver.cache_stats()
    }

    async fn finalize(&self, decision: &Decision, start: Instant) {
        if let Some(metrics) = &self.metrics {
            metrics.record_latency(start.elapsed()).await;
            metrics.record_decision(decision).await;
        }
    }
}

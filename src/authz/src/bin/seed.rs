//! Seed a role graph with the demo catalog and print what each user resolves to
//!
//! Uses PostgreSQL when `DATABASE_URL` is set (and the `postgres` feature is
//! enabled), otherwise an in-memory store that lives for this run only.

use anyhow::Context;
use rbac_authz::engine::{EngineConfig, PolicyEnforcementPoint, RequirementRegistry};
use rbac_authz::seed::{seed_demo, SeedReport};
use rbac_authz::store::InMemoryRbacStore;
use rbac_authz::{AuthzConfig, OperationRef, Principal, RbacAdmin, RbacStore};
use std::sync::Arc;
use tracing::{info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    info!("RBAC seed v{}", rbac_authz::VERSION);

    let config = AuthzConfig::from_env().context("loading configuration")?;
    let store = open_store(&config).await?;

    let admin = RbacAdmin::new(store.clone());
    let report = seed_demo(&admin).await.context("seeding role graph")?;

    info!(
        "Seeded {} permissions, roles '{}' and '{}'",
        report.permissions.len(),
        report.admin_role.name,
        report.user_role.name
    );

    print_summary(&config, store, &report).await
}

async fn open_store(config: &AuthzConfig) -> anyhow::Result<Arc<dyn RbacStore>> {
    match config.database_url.as_deref() {
        #[cfg(feature = "postgres")]
        Some(url) => {
            let store = rbac_authz::store::PostgresRbacStore::new(url)
                .await
                .context("connecting to PostgreSQL")?;
            store.run_migrations().await.context("running migrations")?;
            info!("Using PostgreSQL store");
            Ok(Arc::new(store))
        }
        #[cfg(not(feature = "postgres"))]
        Some(_) => {
            warn!("DATABASE_URL is set but the postgres feature is disabled; using in-memory store");
            Ok(Arc::new(InMemoryRbacStore::new()))
        }
        None => {
            warn!("DATABASE_URL not set; using in-memory store");
            Ok(Arc::new(InMemoryRbacStore::new()))
        }
    }
}

async fn print_summary(
    config: &AuthzConfig,
    store: Arc<dyn RbacStore>,
    report: &SeedReport,
) -> anyhow::Result<()> {
    let registry = RequirementRegistry::builder()
        .group("users")
        .require(["users.read"])
        .operation("users", "remove")
        .require(["users.delete"])
        .build();
    let engine_config: EngineConfig = config.engine_config();
    let pep = PolicyEnforcementPoint::new(engine_config, store, registry);
    let remove = OperationRef::new("users", "remove");

    for user in [&report.admin_user, &report.regular_user] {
        let effective = pep.resolver().resolve(user.id).await?;
        println!("{} ({} permissions)", user.email, effective.len());
        for name in effective.sorted_names() {
            println!("  - {}", name);
        }

        let decision = pep
            .enforce_operation(&remove, Some(&Principal::new(user.id)))
            .await?;
        if decision.allowed {
            println!("  {}: allowed", remove);
        } else {
            println!("  {}: denied ({})", remove, decision.message());
        }
    }

    Ok(())
}

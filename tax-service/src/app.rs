use std::sync::Arc;

use anyhow::{Context, Result};
use tax_core::db::{DbConfig, RepositoryRegistry};
use tax_core::{LoadError, TaxRepository, TaxResolver, TaxTables};
use tax_db_sqlite::SqliteRepositoryFactory;
use tracing::info;

use crate::config::ServiceConfig;

/// Every backend compiled into this binary.
pub fn build_registry() -> RepositoryRegistry {
    let mut registry = RepositoryRegistry::new();
    registry.register(Box::new(SqliteRepositoryFactory));
    registry
}

/// Shared by every request handler.
#[derive(Clone)]
pub struct AppState {
    pub resolver: Arc<TaxResolver>,
    tax_repo: Arc<dyn TaxRepository>,
    rebate_repo: Arc<dyn TaxRepository>,
}

impl AppState {
    /// Opens both databases named in `config` and loads the initial tables.
    ///
    /// Identical `[tax_db]` and `[rebate_db]` sections share one repository.
    pub async fn connect(config: &ServiceConfig) -> Result<Self> {
        let registry = build_registry();
        let tax_repo = open(&registry, &config.tax_db).await?;
        let rebate_repo = if config.rebate_db == config.tax_db {
            Arc::clone(&tax_repo)
        } else {
            open(&registry, &config.rebate_db).await?
        };

        Self::from_repositories(tax_repo, rebate_repo)
            .await
            .context("failed to load tax tables")
    }

    pub async fn from_repositories(
        tax_repo: Arc<dyn TaxRepository>,
        rebate_repo: Arc<dyn TaxRepository>,
    ) -> Result<Self, LoadError> {
        let resolver = TaxResolver::load(tax_repo.as_ref(), rebate_repo.as_ref()).await?;
        Ok(Self {
            resolver: Arc::new(resolver),
            tax_repo,
            rebate_repo,
        })
    }

    /// Re-reads both repositories; the old tables stay live on failure.
    pub async fn reload(&self) -> Result<Arc<TaxTables>, LoadError> {
        self.resolver
            .reload(self.tax_repo.as_ref(), self.rebate_repo.as_ref())
            .await
    }
}

async fn open(
    registry: &RepositoryRegistry,
    config: &DbConfig,
) -> Result<Arc<dyn TaxRepository>> {
    let repo = registry.create(config).await.with_context(|| {
        format!(
            "failed to open {} database '{}'",
            config.backend, config.connection_string
        )
    })?;
    info!(backend = %config.backend, connection = %config.connection_string, "repository opened");
    Ok(Arc::from(repo))
}

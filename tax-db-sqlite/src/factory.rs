use std::path::PathBuf;

use async_trait::async_trait;
use tracing::info;

use tax_core::db::repository::{RepositoryError, TaxRepository};
use tax_core::db::{DbConfig, RepositoryFactory};

use crate::repository::SqliteRepository;

/// Resolve the seeds directory at runtime so it works in both development and
/// packaged distribution.
///
/// Resolution order:
/// 1. **`TAX_DB_SQLITE_SEEDS_DIR`**: if set, use this path (override for
///    packagers or custom layouts).
/// 2. **`./seeds`**: if the directory exists in the current working directory.
/// 3. **Crate manifest dir**: `$CARGO_MANIFEST_DIR/seeds` as last resort
///    (dev/tests when run from the build tree).
pub fn seeds_dir() -> PathBuf {
    if let Ok(dir) = std::env::var("TAX_DB_SQLITE_SEEDS_DIR") {
        return PathBuf::from(dir);
    }
    let cwd_seeds = PathBuf::from("./seeds");
    if cwd_seeds.is_dir() {
        return cwd_seeds;
    }
    PathBuf::from(env!("CARGO_MANIFEST_DIR")).join("seeds")
}

/// Map a [`DbConfig`] connection string to a sqlx URL.
///
/// * `":memory:"` → `sqlite::memory:`
/// * anything already starting with `sqlite:` is passed through
/// * a bare path becomes `sqlite:<path>?mode=rwc` so the file is created
pub fn connection_url(connection_string: &str) -> String {
    let s = connection_string.trim();
    if s == ":memory:" {
        "sqlite::memory:".to_string()
    } else if s.starts_with("sqlite:") {
        s.to_string()
    } else {
        format!("sqlite:{s}?mode=rwc")
    }
}

/// [`RepositoryFactory`] for SQLite.
///
/// Register this with a [`tax_core::db::RepositoryRegistry`] to make the
/// `"sqlite"` backend available:
///
/// ```rust,no_run
/// use tax_core::db::RepositoryRegistry;
/// use tax_db_sqlite::SqliteRepositoryFactory;
///
/// let mut registry = RepositoryRegistry::new();
/// registry.register(Box::new(SqliteRepositoryFactory));
/// ```
pub struct SqliteRepositoryFactory;

#[async_trait]
impl RepositoryFactory for SqliteRepositoryFactory {
    fn backend_name(&self) -> &'static str {
        "sqlite"
    }

    /// Open the database, apply migrations, then the seed files.
    ///
    /// Seeds use `INSERT OR IGNORE`, so rows already present are left alone.
    async fn create(
        &self,
        config: &DbConfig,
    ) -> Result<Box<dyn TaxRepository>, RepositoryError> {
        let url = connection_url(&config.connection_string);
        let repo = SqliteRepository::new(&url)
            .await
            .map_err(|e| RepositoryError::Connection(format!("{e:#}")))?;
        repo.run_migrations()
            .await
            .map_err(|e| RepositoryError::Database(format!("{e:#}")))?;
        let seeds = seeds_dir();
        repo.run_seeds(&seeds)
            .await
            .map_err(|e| RepositoryError::Database(format!("{e:#}")))?;
        info!(url = %url, seeds = %seeds.display(), "sqlite repository ready");
        Ok(Box::new(repo))
    }
}

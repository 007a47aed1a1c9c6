//! Template repository factory

use std::sync::Arc;

use crate::config::StorageConfig;
use crate::postgres::PostgresPool;

use super::backend::TemplateRepository;
use super::memory_backend::MemoryTemplateRepository;
use super::postgres_backend::PostgresTemplateRepository;

/// Create a template repository based on configuration.
///
/// Returns the appropriate backend implementation based on the `backend` setting:
/// - `"postgres"`: Returns a `PostgresTemplateRepository` if a PostgreSQL pool is provided
/// - `"memory"` (default): Returns a `MemoryTemplateRepository`
///
/// The remote HTTP repository is not selected here; construct
/// `HttpTemplateRepository` directly with a `ClientConfig`.
///
/// # Example
///
/// ```rust,ignore
/// let repository = create_template_repository(&settings.storage, Some(pg_pool.clone()));
/// ```
pub fn create_template_repository(
    settings: &StorageConfig,
    postgres_pool: Option<Arc<PostgresPool>>,
) -> Arc<dyn TemplateRepository> {
    match settings.backend.as_str() {
        "postgres" => {
            if let Some(pool) = postgres_pool {
                tracing::info!(
                    backend = "postgres",
                    database = %pool.database_url_masked(),
                    "Creating PostgreSQL template repository"
                );
                Arc::new(PostgresTemplateRepository::new(pool.pool().clone()))
            } else {
                tracing::warn!(
                    "PostgreSQL backend requested but no pool provided, falling back to memory"
                );
                Arc::new(MemoryTemplateRepository::new())
            }
        }
        "memory" => {
            tracing::info!(backend = "memory", "Creating in-memory template repository");
            Arc::new(MemoryTemplateRepository::new())
        }
        other => {
            tracing::warn!(
                backend = %other,
                "Unknown storage backend, falling back to memory"
            );
            Arc::new(MemoryTemplateRepository::new())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_create_memory_repository() {
        let settings = StorageConfig {
            backend: "memory".to_string(),
        };
        let repo = create_template_repository(&settings, None);
        assert_eq!(repo.backend_name(), "memory");
    }

    #[test]
    fn test_postgres_without_pool_falls_back() {
        let settings = StorageConfig {
            backend: "postgres".to_string(),
        };
        let repo = create_template_repository(&settings, None);
        assert_eq!(repo.backend_name(), "memory");
    }

    #[test]
    fn test_unknown_backend_falls_back() {
        let settings = StorageConfig {
            backend: "mongodb".to_string(),
        };
        let repo = create_template_repository(&settings, None);
        assert_eq!(repo.backend_name(), "memory");
    }
}

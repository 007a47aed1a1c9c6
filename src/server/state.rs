use std::sync::Arc;
use std::time::Instant;

use crate::config::Settings;
use crate::postgres::PostgresPool;
use crate::store::{MemoryTemplateRepository, TemplateRepository};
use crate::template::ComponentRegistry;
use crate::upload::ImageStore;

#[derive(Clone)]
pub struct AppState {
    pub settings: Arc<Settings>,
    pub repository: Arc<dyn TemplateRepository>,
    pub registry: Arc<ComponentRegistry>,
    pub image_store: Arc<ImageStore>,
    pub postgres_pool: Option<Arc<PostgresPool>>,
    pub start_time: Instant,
}

impl AppState {
    pub fn new(
        settings: Settings,
        repository: Arc<dyn TemplateRepository>,
        postgres_pool: Option<Arc<PostgresPool>>,
    ) -> Self {
        let image_store = Arc::new(ImageStore::new(&settings.uploads));

        Self {
            settings: Arc::new(settings),
            repository,
            registry: Arc::new(ComponentRegistry::builtin()),
            image_store,
            postgres_pool,
            start_time: Instant::now(),
        }
    }

    /// State backed by the in-memory repository
    pub fn in_memory(settings: Settings) -> Self {
        Self::new(settings, Arc::new(MemoryTemplateRepository::new()), None)
    }
}

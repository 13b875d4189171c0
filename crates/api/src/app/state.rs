use std::sync::Arc;

use tracing::info;

use shopdesk_infra::{
    AppConfig, CatalogStore, InMemoryCatalogStore, PostgresCatalogStore, ProductsRepository,
    StoreError,
};

/// Shared per-process state handed to every handler.
#[derive(Clone)]
pub struct AppState {
    pub repo: ProductsRepository,
    /// Admin list page size.
    pub page_size: u32,
}

impl AppState {
    pub fn new(repo: ProductsRepository, page_size: u32) -> Self {
        Self { repo, page_size }
    }

    /// Postgres when a database URL is configured (schema applied on start),
    /// in-memory store otherwise.
    pub async fn from_config(config: &AppConfig) -> Result<Self, StoreError> {
        let store: Arc<dyn CatalogStore> = match &config.database_url {
            Some(url) => {
                let store = PostgresCatalogStore::connect(url).await?;
                store.migrate().await?;
                info!("using postgres catalog store");
                Arc::new(store)
            }
            None => {
                info!("using in-memory catalog store");
                Arc::new(InMemoryCatalogStore::new())
            }
        };

        let repo = ProductsRepository::new(store, config.distributions.clone());
        Ok(Self::new(repo, config.page_size))
    }
}

use std::sync::Arc;

use thiserror::Error;

use offerbook_core::SellerId;
use offerbook_infra::{
    CatalogError, CatalogService, Config, GatewayError, HttpTableDownloader, InMemoryCatalogStore,
    PostgresCatalogStore, ProductFilter, TableDownloader, UpdateReport,
};
use offerbook_products::{CandidateUpdate, CatalogEntry};

#[derive(Debug, Error)]
pub enum BootstrapError {
    #[error("database setup failed: {0}")]
    Database(#[from] sqlx::Error),

    #[error("http client setup failed: {0}")]
    Gateway(#[from] GatewayError),
}

/// Failure of a URL-based import: either the download or the catalog update.
#[derive(Debug, Error)]
pub enum ImportError {
    #[error(transparent)]
    Download(#[from] GatewayError),

    #[error(transparent)]
    Catalog(#[from] CatalogError),
}

#[derive(Clone)]
pub enum AppServices {
    InMemory {
        catalog: Arc<CatalogService<Arc<InMemoryCatalogStore>>>,
        downloader: Arc<dyn TableDownloader>,
    },
    Persistent {
        catalog: Arc<CatalogService<Arc<PostgresCatalogStore>>>,
        downloader: Arc<dyn TableDownloader>,
    },
}

pub async fn build_services(config: &Config) -> Result<AppServices, BootstrapError> {
    let downloader: Arc<dyn TableDownloader> = Arc::new(HttpTableDownloader::new(config.gateway_timeout)?);

    if config.use_persistent_stores {
        return build_persistent_services(config, downloader).await;
    }

    tracing::info!("using in-memory catalog store");
    Ok(AppServices::in_memory(downloader))
}

async fn build_persistent_services(
    config: &Config,
    downloader: Arc<dyn TableDownloader>,
) -> Result<AppServices, BootstrapError> {
    let store = PostgresCatalogStore::connect(config).await?;
    store.ensure_schema().await?;
    tracing::info!("using postgres catalog store");

    Ok(AppServices::Persistent {
        catalog: Arc::new(CatalogService::new(Arc::new(store)).with_decode_timeout(config.decode_timeout)),
        downloader,
    })
}

impl AppServices {
    /// In-memory wiring (dev/test).
    pub fn in_memory(downloader: Arc<dyn TableDownloader>) -> Self {
        AppServices::InMemory {
            catalog: Arc::new(CatalogService::new(Arc::new(InMemoryCatalogStore::new()))),
            downloader,
        }
    }

    fn downloader(&self) -> &Arc<dyn TableDownloader> {
        match self {
            AppServices::InMemory { downloader, .. } | AppServices::Persistent { downloader, .. } => downloader,
        }
    }

    pub async fn import_table(&self, seller_id: SellerId, table_url: &str) -> Result<UpdateReport, ImportError> {
        let bytes = self.downloader().download(table_url).await?;
        let report = match self {
            AppServices::InMemory { catalog, .. } => catalog.import_table(seller_id, bytes).await?,
            AppServices::Persistent { catalog, .. } => catalog.import_table(seller_id, bytes).await?,
        };
        Ok(report)
    }

    pub async fn update_catalog(
        &self,
        seller_id: SellerId,
        candidates: Vec<CandidateUpdate>,
    ) -> Result<UpdateReport, CatalogError> {
        match self {
            AppServices::InMemory { catalog, .. } => catalog.update_catalog(seller_id, candidates).await,
            AppServices::Persistent { catalog, .. } => catalog.update_catalog(seller_id, candidates).await,
        }
    }

    pub async fn products_by_filter(&self, filter: &ProductFilter) -> Result<Vec<CatalogEntry>, CatalogError> {
        match self {
            AppServices::InMemory { catalog, .. } => catalog.products_by_filter(filter).await,
            AppServices::Persistent { catalog, .. } => catalog.products_by_filter(filter).await,
        }
    }
}

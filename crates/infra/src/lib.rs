//! Infrastructure layer: catalog storage, orchestration, table download, config.

pub mod catalog_service;
pub mod catalog_store;
pub mod config;
pub mod gateway;

pub use catalog_service::{CatalogError, CatalogService, UpdateReport};
pub use catalog_store::{
    CatalogStore, InMemoryCatalogStore, PostgresCatalogStore, ProductFilter, StoreError,
};
pub use config::{Config, ConfigError};
pub use gateway::{GatewayError, HttpTableDownloader, TableDownloader};

//! Infrastructure layer: catalog stores (in-memory, Postgres), the repository
//! facade and configuration.

pub mod config;
pub mod error;
pub mod repository;
pub mod store;

pub use config::{AppConfig, ConfigError};
pub use error::{StoreError, StoreResult};
pub use repository::{ProductPage, ProductsRepository};
pub use store::{CatalogStore, InMemoryCatalogStore, PaymentLine, PostgresCatalogStore};

//! Catalog data-access boundary.
//!
//! [`CatalogStore`] is what the repository talks to. The in-memory store backs
//! dev runs and tests; the Postgres store is the production backend.

pub mod in_memory;
pub mod postgres;
pub mod r#trait;

pub use in_memory::{InMemoryCatalogStore, PaymentLine};
pub use postgres::PostgresCatalogStore;
pub use r#trait::CatalogStore;

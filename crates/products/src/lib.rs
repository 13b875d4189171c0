//! Products catalog domain.
//!
//! This crate contains the catalog rules (search, shop filters, reordering,
//! customer distributions) as deterministic domain logic: no IO, no HTTP, no
//! storage. Stores translate [`ProductQuery`] values into their own query
//! language.

pub mod distribution;
pub mod form;
pub mod metrics;
pub mod payment;
pub mod product;
pub mod query;
pub mod sorting;
pub mod stats;
pub mod tag;

pub use distribution::{
    DistributionBucket, DistributionConfig, DistributionLevels, DistributionMetric, MetricSample,
    ProductDistribution,
};
pub use form::{ProductInput, ProductSaved};
pub use payment::{Payment, PaymentItem, PaymentItemType, PaymentStatus};
pub use product::Product;
pub use query::{Pagination, Predicate, ProductOrder, ProductQuery, ShopFilter, parse_search_number};
pub use sorting::SortShift;
pub use stats::{ProductSalesStats, SalesPoint, SalesWindow, SoldProduct, StatsWindow};
pub use tag::Tag;

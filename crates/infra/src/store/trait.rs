use chrono::{DateTime, Utc};

use shopdesk_core::ProductId;
use shopdesk_products::{
    DistributionMetric, MetricSample, Product, ProductInput, ProductQuery, ProductSalesStats,
    SalesPoint, SalesWindow, SoldProduct, SortShift, StatsWindow, Tag,
};

use crate::error::StoreResult;

/// Storage operations behind the catalog admin.
///
/// Implementations must give every [`ProductQuery`] predicate the meaning of
/// `ProductQuery::matches`. Only `paid` payments and `product`-typed payment
/// items feed sales statistics and distributions, except [`sold_count`],
/// which counts every paid item of the product.
///
/// [`sold_count`]: CatalogStore::sold_count
#[async_trait::async_trait]
pub trait CatalogStore: Send + Sync {
    async fn find_product(&self, id: ProductId) -> StoreResult<Option<Product>>;

    /// Products matching `query`, ordered and windowed as it says.
    async fn query_products(&self, query: &ProductQuery) -> StoreResult<Vec<Product>>;

    /// Number of products matching `query`, ignoring its window.
    async fn count_products(&self, query: &ProductQuery) -> StoreResult<u64>;

    /// Products matching `base` that sold in `window`, best sellers first.
    async fn most_sold_products(
        &self,
        base: &ProductQuery,
        window: SalesWindow,
    ) -> StoreResult<Vec<SoldProduct>>;

    /// Apply a sorting shift to every product atomically.
    async fn shift_sorting(&self, shift: SortShift) -> StoreResult<()>;

    async fn decrease_stock(&self, id: ProductId, count: i64) -> StoreResult<()>;

    /// Insert a product, applying `shift` to the existing rows first. The
    /// shift and the insert commit together or not at all.
    ///
    /// A missing sorting appends after the current maximum. Duplicate codes
    /// are a [`StoreError::Conflict`](crate::StoreError::Conflict); unknown
    /// tag ids are a [`StoreError::Validation`](crate::StoreError::Validation).
    async fn insert_product(
        &self,
        input: &ProductInput,
        shift: Option<SortShift>,
    ) -> StoreResult<Product>;

    /// Overwrite a product's editable fields, atomically with `shift`. A
    /// missing sorting keeps the current one.
    async fn update_product(
        &self,
        id: ProductId,
        input: &ProductInput,
        shift: Option<SortShift>,
    ) -> StoreResult<Product>;

    /// `metric` for every customer with a paid product-typed item of
    /// `product_id`, ordered by user id.
    async fn metric_samples(
        &self,
        product_id: ProductId,
        metric: DistributionMetric,
        now: DateTime<Utc>,
    ) -> StoreResult<Vec<MetricSample>>;

    /// Sum of item counts over paid payment items of the product.
    async fn sold_count(&self, id: ProductId) -> StoreResult<i64>;

    async fn product_stats(&self, window: StatsWindow) -> StoreResult<Vec<ProductSalesStats>>;

    /// Sold quantity per payment creation day in `[from, to)`. Days without
    /// sales are absent.
    async fn daily_sales(
        &self,
        id: ProductId,
        from: DateTime<Utc>,
        to: DateTime<Utc>,
    ) -> StoreResult<Vec<SalesPoint>>;

    async fn list_tags(&self) -> StoreResult<Vec<Tag>>;
}

//! Catalog repository facade.
//!
//! `ProductsRepository` is what the HTTP layer talks to. It turns catalog
//! operations into [`ProductQuery`] values and store calls, owns the
//! distribution level configuration, and enforces the save rules (validation,
//! unique code, sorting shifts).

use std::sync::Arc;

use chrono::{DateTime, Duration, Months, Utc};
use serde::Serialize;
use tracing::{info, instrument};

use shopdesk_core::{ProductId, TagId};
use shopdesk_products::distribution::members_in_range;
use shopdesk_products::stats::fill_daily_series;
use shopdesk_products::{
    DistributionConfig, DistributionMetric, MetricSample, Pagination, Product,
    ProductDistribution, ProductInput, ProductQuery, ProductSalesStats, ProductSaved, SalesPoint,
    SalesWindow, ShopFilter, SoldProduct, SortShift, StatsWindow, Tag,
};

use crate::error::{StoreError, StoreResult};
use crate::store::CatalogStore;

/// Default number of related products.
pub const RELATED_PRODUCTS_LIMIT: u64 = 4;

/// One page of the admin product list.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ProductPage {
    pub products: Vec<Product>,
    /// Products matching the filter, across all pages.
    pub filtered_count: u64,
    /// All products.
    pub total_count: u64,
    pub pagination: Pagination,
    pub page_count: u64,
}

#[derive(Clone)]
pub struct ProductsRepository {
    store: Arc<dyn CatalogStore>,
    distributions: Arc<DistributionConfig>,
}

impl ProductsRepository {
    pub fn new(store: Arc<dyn CatalogStore>, distributions: DistributionConfig) -> Self {
        Self {
            store,
            distributions: Arc::new(distributions),
        }
    }

    pub fn distribution_config(&self) -> &DistributionConfig {
        &self.distributions
    }

    // -------------------------
    // Lookups
    // -------------------------

    pub async fn find(&self, id: ProductId) -> StoreResult<Option<Product>> {
        self.store.find_product(id).await
    }

    pub async fn find_by_ids(&self, ids: &[ProductId]) -> StoreResult<Vec<Product>> {
        if ids.is_empty() {
            return Ok(Vec::new());
        }
        self.store.query_products(&ProductQuery::by_ids(ids)).await
    }

    pub async fn get_by_code(&self, code: &str) -> StoreResult<Option<Product>> {
        let mut found = self.store.query_products(&ProductQuery::by_code(code).limit(1)).await?;
        Ok(found.pop())
    }

    pub async fn exists(&self, code: &str) -> StoreResult<bool> {
        Ok(self.store.count_products(&ProductQuery::by_code(code)).await? > 0)
    }

    pub async fn count(&self, query: &ProductQuery) -> StoreResult<u64> {
        self.store.count_products(query).await
    }

    pub async fn tags(&self) -> StoreResult<Vec<Tag>> {
        self.store.list_tags().await
    }

    // -------------------------
    // Listings
    // -------------------------

    pub async fn all(&self) -> StoreResult<Vec<Product>> {
        self.store.query_products(&ProductQuery::all()).await
    }

    /// Admin search. Blank text and no tags list everything.
    pub async fn search(&self, text: Option<&str>, tags: &[TagId]) -> StoreResult<Vec<Product>> {
        self.store
            .query_products(&ProductQuery::search(text, tags))
            .await
    }

    /// Admin search, one page at a time, with filtered and total counts.
    #[instrument(skip(self, tags), fields(tag_count = tags.len(), page = pagination.page), err)]
    pub async fn search_page(
        &self,
        text: Option<&str>,
        tags: &[TagId],
        pagination: Pagination,
    ) -> StoreResult<ProductPage> {
        let query = ProductQuery::search(text, tags);
        let filtered_count = self.store.count_products(&query).await?;
        let total_count = self.store.count_products(&ProductQuery::all()).await?;
        let products = self
            .store
            .query_products(&query.paginate(&pagination))
            .await?;

        Ok(ProductPage {
            products,
            filtered_count,
            total_count,
            page_count: pagination.page_count(filtered_count),
            pagination,
        })
    }

    pub async fn shop_products(&self, filter: &ShopFilter) -> StoreResult<Vec<Product>> {
        self.store.query_products(&ProductQuery::shop(filter)).await
    }

    /// Random visible, available shop products other than `product`.
    pub async fn related_products(
        &self,
        product: &Product,
        limit: Option<u64>,
    ) -> StoreResult<Vec<Product>> {
        let limit = limit.unwrap_or(RELATED_PRODUCTS_LIMIT);
        self.store
            .query_products(&ProductQuery::related(product, limit))
            .await
    }

    /// Visible, available shop products by quantity sold with `paid_at` in
    /// `[from, to)`.
    pub async fn most_sold_products(
        &self,
        from: Option<DateTime<Utc>>,
        to: Option<DateTime<Utc>>,
    ) -> StoreResult<Vec<SoldProduct>> {
        let base = ProductQuery::shop(&ShopFilter::default());
        self.store
            .most_sold_products(&base, SalesWindow::new(from, to))
            .await
    }

    // -------------------------
    // Writes
    // -------------------------

    /// Shift neighbours for a move to `new_sorting`. Returns `false` when
    /// nothing had to move.
    #[instrument(skip(self), err)]
    pub async fn update_sorting(
        &self,
        new_sorting: i64,
        old_sorting: Option<i64>,
    ) -> StoreResult<bool> {
        let Some(shift) = SortShift::plan(new_sorting, old_sorting) else {
            return Ok(false);
        };
        self.store.shift_sorting(shift).await?;
        info!(new_sorting, ?old_sorting, "product sorting shifted");
        Ok(true)
    }

    pub async fn decrease_stock(&self, id: ProductId, count: Option<i64>) -> StoreResult<()> {
        let count = count.unwrap_or(1);
        if count < 0 {
            return Err(StoreError::Validation("count cannot be negative".to_string()));
        }
        self.store.decrease_stock(id, count).await
    }

    /// Create (`id = None`) or update a product from form input.
    ///
    /// An explicit sorting shifts the neighbours in the same store write as
    /// the product row, so a rejected save leaves the order untouched.
    #[instrument(skip(self, input), fields(code = %input.code), err)]
    pub async fn save(
        &self,
        id: Option<ProductId>,
        input: ProductInput,
    ) -> StoreResult<ProductSaved> {
        input.validate()?;

        match id {
            None => {
                if self.exists(&input.code).await? {
                    return Err(StoreError::Conflict(format!(
                        "product code '{}' already exists",
                        input.code
                    )));
                }
                let shift = input.sorting.and_then(|s| SortShift::plan(s, None));
                let product = self.store.insert_product(&input, shift).await?;
                info!(product_id = %product.id, shifted = shift.is_some(), "product created");
                Ok(ProductSaved::Created(product))
            }
            Some(id) => {
                let existing = self
                    .store
                    .find_product(id)
                    .await?
                    .ok_or(StoreError::NotFound)?;
                if input.code != existing.code && self.exists(&input.code).await? {
                    return Err(StoreError::Conflict(format!(
                        "product code '{}' already exists",
                        input.code
                    )));
                }
                let shift = input
                    .sorting
                    .and_then(|s| SortShift::plan(s, Some(existing.sorting)));
                let product = self.store.update_product(id, &input, shift).await?;
                info!(product_id = %product.id, shifted = shift.is_some(), "product updated");
                Ok(ProductSaved::Updated(product))
            }
        }
    }

    // -------------------------
    // Distributions
    // -------------------------

    #[instrument(skip(self), fields(product_id = %product_id), err)]
    pub async fn distribution(
        &self,
        product_id: ProductId,
        metric: DistributionMetric,
    ) -> StoreResult<ProductDistribution> {
        let samples = self
            .store
            .metric_samples(product_id, metric, Utc::now())
            .await?;
        let levels = self.distributions.levels(metric);
        Ok(ProductDistribution::compute(metric, &levels, &samples))
    }

    /// Customers whose `metric` lies in `[from, to)`; `to = None` is open-ended.
    pub async fn distribution_list(
        &self,
        product_id: ProductId,
        metric: DistributionMetric,
        from: f64,
        to: Option<f64>,
    ) -> StoreResult<Vec<MetricSample>> {
        let samples = self
            .store
            .metric_samples(product_id, metric, Utc::now())
            .await?;
        Ok(members_in_range(&samples, from, to))
    }

    pub async fn user_amount_spent_distribution(
        &self,
        product_id: ProductId,
    ) -> StoreResult<ProductDistribution> {
        self.distribution(product_id, DistributionMetric::AmountSpent).await
    }

    pub async fn user_amount_spent_distribution_list(
        &self,
        product_id: ProductId,
        from: f64,
        to: Option<f64>,
    ) -> StoreResult<Vec<MetricSample>> {
        self.distribution_list(product_id, DistributionMetric::AmountSpent, from, to)
            .await
    }

    pub async fn user_payment_counts_distribution(
        &self,
        product_id: ProductId,
    ) -> StoreResult<ProductDistribution> {
        self.distribution(product_id, DistributionMetric::PaymentCount).await
    }

    pub async fn user_payment_counts_distribution_list(
        &self,
        product_id: ProductId,
        from: f64,
        to: Option<f64>,
    ) -> StoreResult<Vec<MetricSample>> {
        self.distribution_list(product_id, DistributionMetric::PaymentCount, from, to)
            .await
    }

    pub async fn product_days_from_last_order_distribution(
        &self,
        product_id: ProductId,
    ) -> StoreResult<ProductDistribution> {
        self.distribution(product_id, DistributionMetric::DaysFromLastOrder)
            .await
    }

    pub async fn product_days_from_last_order_distribution_list(
        &self,
        product_id: ProductId,
        from: f64,
        to: Option<f64>,
    ) -> StoreResult<Vec<MetricSample>> {
        self.distribution_list(product_id, DistributionMetric::DaysFromLastOrder, from, to)
            .await
    }

    pub async fn product_shop_counts_distribution(
        &self,
        product_id: ProductId,
    ) -> StoreResult<ProductDistribution> {
        self.distribution(product_id, DistributionMetric::ShopCount).await
    }

    pub async fn product_shop_counts_distribution_list(
        &self,
        product_id: ProductId,
        from: f64,
        to: Option<f64>,
    ) -> StoreResult<Vec<MetricSample>> {
        self.distribution_list(product_id, DistributionMetric::ShopCount, from, to)
            .await
    }

    // -------------------------
    // Sales
    // -------------------------

    /// Quantity sold over paid payment items of the product; 0 when none.
    pub async fn sold_count(&self, id: ProductId) -> StoreResult<i64> {
        self.store.sold_count(id).await
    }

    /// Daily sold quantity over the last month, one point per day.
    pub async fn sales_graph(
        &self,
        id: ProductId,
        now: DateTime<Utc>,
    ) -> StoreResult<Vec<SalesPoint>> {
        let from = now
            .checked_sub_months(Months::new(1))
            .unwrap_or(now - Duration::days(31));
        let points = self.store.daily_sales(id, from, now).await?;
        Ok(fill_daily_series(from.date_naive(), now.date_naive(), &points))
    }

    /// Per-product sold quantity and amount. With `from`, only payments with
    /// `paid_at BETWEEN from AND to` count; `to` defaults to now.
    pub async fn stats(
        &self,
        from: Option<DateTime<Utc>>,
        to: Option<DateTime<Utc>>,
    ) -> StoreResult<Vec<ProductSalesStats>> {
        self.store
            .product_stats(StatsWindow::new(from, to, Utc::now()))
            .await
    }
}

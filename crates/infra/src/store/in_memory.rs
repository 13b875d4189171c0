use std::collections::{BTreeMap, HashMap};
use std::sync::{RwLock, RwLockReadGuard, RwLockWriteGuard};

use chrono::{DateTime, Utc};

use shopdesk_core::{Money, PaymentId, PaymentItemId, ProductId, TagId, UserId};
use shopdesk_products::metrics::metric_samples;
use shopdesk_products::{
    DistributionMetric, MetricSample, Payment, PaymentItem, PaymentItemType, PaymentStatus,
    Product, ProductInput, ProductOrder, ProductQuery, ProductSalesStats, SalesPoint, SalesWindow,
    SoldProduct, SortShift, StatsWindow, Tag,
};

use super::r#trait::CatalogStore;
use crate::error::{StoreError, StoreResult};

/// One line of a recorded payment.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PaymentLine {
    pub product_id: Option<ProductId>,
    pub item_type: PaymentItemType,
    pub count: i64,
    /// Unit amount.
    pub amount: Money,
}

impl PaymentLine {
    pub fn product(product_id: ProductId, count: i64, amount: Money) -> Self {
        Self {
            product_id: Some(product_id),
            item_type: PaymentItemType::Product,
            count,
            amount,
        }
    }
}

#[derive(Debug, Default)]
struct CatalogState {
    products: BTreeMap<ProductId, Product>,
    tags: BTreeMap<TagId, Tag>,
    payments: Vec<Payment>,
    items: Vec<PaymentItem>,
}

impl CatalogState {
    /// Paid payments joined to their items.
    fn paid_items(&self) -> Vec<(&Payment, &PaymentItem)> {
        let paid: HashMap<PaymentId, &Payment> = self
            .payments
            .iter()
            .filter(|p| p.is_paid())
            .map(|p| (p.id, p))
            .collect();
        self.items
            .iter()
            .filter_map(|item| paid.get(&item.payment_id).map(|p| (*p, item)))
            .collect()
    }

    fn sold_counts(&self) -> HashMap<ProductId, i64> {
        let mut sold = HashMap::new();
        for (_, item) in self.paid_items() {
            if item.item_type != PaymentItemType::Product {
                continue;
            }
            if let Some(product_id) = item.product_id {
                *sold.entry(product_id).or_insert(0) += item.count;
            }
        }
        sold
    }

    fn code_taken(&self, code: &str, except: Option<ProductId>) -> bool {
        self.products
            .values()
            .any(|p| p.code == code && Some(p.id) != except)
    }

    fn check_tags(&self, tag_ids: &[TagId]) -> StoreResult<()> {
        match tag_ids.iter().find(|id| !self.tags.contains_key(id)) {
            Some(id) => Err(StoreError::Validation(format!("unknown tag id {id}"))),
            None => Ok(()),
        }
    }

    fn shift_sorting(&mut self, shift: SortShift) {
        for product in self.products.values_mut() {
            product.sorting = shift.apply(product.sorting);
        }
    }

    fn apply_input(product: &mut Product, input: &ProductInput) {
        product.code = input.code.clone();
        product.name = input.name.clone();
        product.user_label = input.effective_user_label().to_string();
        product.description = input.description.clone();
        product.price = input.price;
        product.catalog_price = input.catalog_price;
        product.stock = input.stock;
        product.visible = input.visible;
        product.shop = input.shop;
        if let Some(sorting) = input.sorting {
            product.sorting = sorting;
        }
        let mut tag_ids = input.tag_ids.clone();
        tag_ids.sort();
        tag_ids.dedup();
        product.tag_ids = tag_ids;
    }
}

fn sort_products(products: &mut [Product], order: ProductOrder, sold: &HashMap<ProductId, i64>) {
    match order {
        ProductOrder::SortingDescNameAsc => products.sort_by(|a, b| {
            b.sorting.cmp(&a.sorting).then_with(|| a.name.cmp(&b.name))
        }),
        ProductOrder::Sorting => products.sort_by_key(|p| (p.sorting, p.id)),
        ProductOrder::Name => products.sort_by(|a, b| a.name.cmp(&b.name)),
        ProductOrder::Random => fastrand::shuffle(products),
        ProductOrder::SoldCount => products.sort_by_key(|p| {
            (std::cmp::Reverse(sold.get(&p.id).copied().unwrap_or(0)), p.sorting)
        }),
    }
}

fn window(products: Vec<Product>, query: &ProductQuery) -> Vec<Product> {
    let skipped = products.into_iter().skip(query.offset as usize);
    match query.limit {
        Some(limit) => skipped.take(limit as usize).collect(),
        None => skipped.collect(),
    }
}

/// In-memory catalog store.
///
/// Intended for tests/dev. Not optimized for performance.
#[derive(Debug, Default)]
pub struct InMemoryCatalogStore {
    state: RwLock<CatalogState>,
}

impl InMemoryCatalogStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn read(&self) -> StoreResult<RwLockReadGuard<'_, CatalogState>> {
        self.state
            .read()
            .map_err(|_| StoreError::Database("lock poisoned".to_string()))
    }

    fn write(&self) -> StoreResult<RwLockWriteGuard<'_, CatalogState>> {
        self.state
            .write()
            .map_err(|_| StoreError::Database("lock poisoned".to_string()))
    }

    pub fn add_tag(&self, code: &str, user_label: Option<&str>) -> StoreResult<Tag> {
        let mut state = self.write()?;
        if state.tags.values().any(|t| t.code == code) {
            return Err(StoreError::Conflict(format!("tag code '{code}' already exists")));
        }
        let next = state.tags.keys().last().map(|id| id.get()).unwrap_or(0) + 1;
        let tag = Tag {
            id: TagId::new(next),
            code: code.to_string(),
            user_label: user_label.map(str::to_string),
        };
        state.tags.insert(tag.id, tag.clone());
        Ok(tag)
    }

    /// Record a payment. Its amount is the sum of the lines; paid payments
    /// are stamped `paid_at = created_at`.
    pub fn add_payment(
        &self,
        user_id: UserId,
        status: PaymentStatus,
        created_at: DateTime<Utc>,
        lines: &[PaymentLine],
    ) -> StoreResult<PaymentId> {
        let mut state = self.write()?;
        let id = PaymentId::new(state.payments.len() as i64 + 1);
        let amount = lines
            .iter()
            .map(|l| Money::from_cents(l.amount.cents() * l.count))
            .sum();
        state.payments.push(Payment {
            id,
            user_id,
            status,
            amount,
            created_at,
            paid_at: (status == PaymentStatus::Paid).then_some(created_at),
        });
        for line in lines {
            let item_id = PaymentItemId::new(state.items.len() as i64 + 1);
            state.items.push(PaymentItem {
                id: item_id,
                payment_id: id,
                product_id: line.product_id,
                item_type: line.item_type,
                count: line.count,
                amount: line.amount,
            });
        }
        Ok(id)
    }
}

#[async_trait::async_trait]
impl CatalogStore for InMemoryCatalogStore {
    async fn find_product(&self, id: ProductId) -> StoreResult<Option<Product>> {
        Ok(self.read()?.products.get(&id).cloned())
    }

    async fn query_products(&self, query: &ProductQuery) -> StoreResult<Vec<Product>> {
        let state = self.read()?;
        let mut products: Vec<Product> = state
            .products
            .values()
            .filter(|p| query.matches(p))
            .cloned()
            .collect();
        let sold = match query.order {
            ProductOrder::SoldCount => state.sold_counts(),
            _ => HashMap::new(),
        };
        sort_products(&mut products, query.order, &sold);
        Ok(window(products, query))
    }

    async fn count_products(&self, query: &ProductQuery) -> StoreResult<u64> {
        let state = self.read()?;
        Ok(state.products.values().filter(|p| query.matches(p)).count() as u64)
    }

    async fn most_sold_products(
        &self,
        base: &ProductQuery,
        window: SalesWindow,
    ) -> StoreResult<Vec<SoldProduct>> {
        let state = self.read()?;

        let mut sold: HashMap<ProductId, i64> = HashMap::new();
        for (payment, item) in state.paid_items() {
            if item.item_type != PaymentItemType::Product {
                continue;
            }
            let in_window = match payment.paid_at {
                Some(at) => window.contains(at),
                None => window.from.is_none() && window.to.is_none(),
            };
            if !in_window {
                continue;
            }
            if let Some(product_id) = item.product_id {
                *sold.entry(product_id).or_insert(0) += item.count;
            }
        }

        let mut ranked: Vec<SoldProduct> = state
            .products
            .values()
            .filter(|p| base.matches(p))
            .filter_map(|p| {
                sold.get(&p.id).map(|count| SoldProduct {
                    product: p.clone(),
                    sold_count: *count,
                })
            })
            .collect();
        ranked.sort_by(|a, b| {
            b.sold_count
                .cmp(&a.sold_count)
                .then_with(|| a.product.name.cmp(&b.product.name))
        });
        if let Some(limit) = base.limit {
            ranked.truncate(limit as usize);
        }
        Ok(ranked)
    }

    async fn shift_sorting(&self, shift: SortShift) -> StoreResult<()> {
        self.write()?.shift_sorting(shift);
        Ok(())
    }

    async fn decrease_stock(&self, id: ProductId, count: i64) -> StoreResult<()> {
        let mut state = self.write()?;
        let product = state.products.get_mut(&id).ok_or(StoreError::NotFound)?;
        product.decrease_stock(count);
        product.modified_at = Utc::now();
        Ok(())
    }

    async fn insert_product(
        &self,
        input: &ProductInput,
        shift: Option<SortShift>,
    ) -> StoreResult<Product> {
        let mut state = self.write()?;
        if state.code_taken(&input.code, None) {
            return Err(StoreError::Conflict(format!(
                "product code '{}' already exists",
                input.code
            )));
        }
        state.check_tags(&input.tag_ids)?;
        if let Some(shift) = shift {
            state.shift_sorting(shift);
        }

        let next_id = state.products.keys().last().map(|id| id.get()).unwrap_or(0) + 1;
        let next_sorting = state.products.values().map(|p| p.sorting).max().unwrap_or(0) + 1;
        let now = Utc::now();
        let mut product = Product {
            id: ProductId::new(next_id),
            code: String::new(),
            name: String::new(),
            user_label: String::new(),
            description: None,
            price: Money::ZERO,
            catalog_price: Money::ZERO,
            stock: 0,
            visible: false,
            shop: false,
            sorting: next_sorting,
            tag_ids: Vec::new(),
            created_at: now,
            modified_at: now,
        };
        CatalogState::apply_input(&mut product, input);
        state.products.insert(product.id, product.clone());
        Ok(product)
    }

    async fn update_product(
        &self,
        id: ProductId,
        input: &ProductInput,
        shift: Option<SortShift>,
    ) -> StoreResult<Product> {
        let mut state = self.write()?;
        if !state.products.contains_key(&id) {
            return Err(StoreError::NotFound);
        }
        if state.code_taken(&input.code, Some(id)) {
            return Err(StoreError::Conflict(format!(
                "product code '{}' already exists",
                input.code
            )));
        }
        state.check_tags(&input.tag_ids)?;
        if let Some(shift) = shift {
            state.shift_sorting(shift);
        }
        let product = state.products.get_mut(&id).ok_or(StoreError::NotFound)?;
        CatalogState::apply_input(product, input);
        product.modified_at = Utc::now();
        Ok(product.clone())
    }

    async fn metric_samples(
        &self,
        product_id: ProductId,
        metric: DistributionMetric,
        now: DateTime<Utc>,
    ) -> StoreResult<Vec<MetricSample>> {
        let state = self.read()?;
        Ok(metric_samples(metric, product_id, &state.payments, &state.items, now))
    }

    async fn sold_count(&self, id: ProductId) -> StoreResult<i64> {
        let state = self.read()?;
        Ok(state
            .paid_items()
            .into_iter()
            .filter(|(_, item)| item.product_id == Some(id))
            .map(|(_, item)| item.count)
            .sum())
    }

    async fn product_stats(&self, window: StatsWindow) -> StoreResult<Vec<ProductSalesStats>> {
        let state = self.read()?;
        let mut totals: BTreeMap<ProductId, (i64, i64)> = BTreeMap::new();
        for (payment, item) in state.paid_items() {
            if item.item_type != PaymentItemType::Product {
                continue;
            }
            let in_window = match payment.paid_at {
                Some(at) => window.contains(at),
                None => window.from.is_none(),
            };
            let Some(product_id) = item.product_id else {
                continue;
            };
            if !in_window {
                continue;
            }
            let entry = totals.entry(product_id).or_insert((0, 0));
            entry.0 += item.count;
            entry.1 += item.amount.cents() * item.count;
        }
        Ok(totals
            .into_iter()
            .map(|(product_id, (count, cents))| ProductSalesStats {
                product_id,
                product_count: count,
                product_amount: Money::from_cents(cents),
            })
            .collect())
    }

    async fn daily_sales(
        &self,
        id: ProductId,
        from: DateTime<Utc>,
        to: DateTime<Utc>,
    ) -> StoreResult<Vec<SalesPoint>> {
        let state = self.read()?;
        let mut days = BTreeMap::new();
        for (payment, item) in state.paid_items() {
            if !item.is_product_item_of(id) {
                continue;
            }
            if payment.created_at < from || payment.created_at >= to {
                continue;
            }
            *days.entry(payment.created_at.date_naive()).or_insert(0) += item.count;
        }
        Ok(days
            .into_iter()
            .map(|(day, sold_count)| SalesPoint { day, sold_count })
            .collect())
    }

    async fn list_tags(&self) -> StoreResult<Vec<Tag>> {
        let state = self.read()?;
        let mut tags: Vec<Tag> = state.tags.values().cloned().collect();
        tags.sort_by(|a, b| a.code.cmp(&b.code));
        Ok(tags)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    fn input(code: &str, name: &str, sorting: Option<i64>) -> ProductInput {
        ProductInput {
            code: code.to_string(),
            name: name.to_string(),
            price: Money::from_cents(500),
            stock: 1,
            visible: true,
            shop: true,
            sorting,
            ..ProductInput::default()
        }
    }

    #[tokio::test]
    async fn insert_appends_sorting_and_rejects_duplicate_codes() {
        let store = InMemoryCatalogStore::new();
        let a = store.insert_product(&input("a", "A", Some(7)), None).await.unwrap();
        let b = store.insert_product(&input("b", "B", None), None).await.unwrap();
        assert_eq!(a.sorting, 7);
        assert_eq!(b.sorting, 8);
        assert_eq!(a.user_label, "A");

        let err = store.insert_product(&input("a", "Again", None), None).await.unwrap_err();
        assert!(matches!(err, StoreError::Conflict(_)));
    }

    #[tokio::test]
    async fn update_keeps_sorting_when_missing() {
        let store = InMemoryCatalogStore::new();
        let a = store.insert_product(&input("a", "A", Some(3)), None).await.unwrap();
        let updated = store
            .update_product(a.id, &input("a2", "A2", None), None)
            .await
            .unwrap();
        assert_eq!(updated.sorting, 3);
        assert_eq!(updated.code, "a2");

        let missing = store
            .update_product(ProductId::new(99), &input("z", "Z", None), None)
            .await;
        assert_eq!(missing, Err(StoreError::NotFound));
    }

    #[tokio::test]
    async fn shift_sorting_moves_every_row_under_one_lock() {
        let store = InMemoryCatalogStore::new();
        for (i, code) in ["a", "b", "c"].iter().enumerate() {
            store
                .insert_product(&input(code, code, Some(i as i64 + 1)), None)
                .await
                .unwrap();
        }
        store
            .shift_sorting(SortShift::plan(1, None).unwrap())
            .await
            .unwrap();
        let sortings: Vec<i64> = store
            .query_products(&ProductQuery::all().order_by(ProductOrder::Sorting))
            .await
            .unwrap()
            .into_iter()
            .map(|p| p.sorting)
            .collect();
        assert_eq!(sortings, vec![2, 3, 4]);
    }

    #[tokio::test]
    async fn daily_sales_groups_by_creation_day() {
        let store = InMemoryCatalogStore::new();
        let p = store.insert_product(&input("a", "A", None), None).await.unwrap();
        let now = Utc::now();
        let line = PaymentLine::product(p.id, 2, Money::from_cents(100));
        store
            .add_payment(UserId::new(1), PaymentStatus::Paid, now - Duration::days(2), &[line])
            .unwrap();
        store
            .add_payment(UserId::new(2), PaymentStatus::Paid, now - Duration::days(2), &[line])
            .unwrap();
        store
            .add_payment(UserId::new(3), PaymentStatus::Fail, now - Duration::days(1), &[line])
            .unwrap();

        let points = store
            .daily_sales(p.id, now - Duration::days(30), now)
            .await
            .unwrap();
        assert_eq!(points.len(), 1);
        assert_eq!(points[0].sold_count, 4);
        assert_eq!(store.sold_count(p.id).await.unwrap(), 4);
    }

    #[tokio::test]
    async fn tags_are_unique_by_code() {
        let store = InMemoryCatalogStore::new();
        store.add_tag("vegan", Some("Vegan")).unwrap();
        assert!(matches!(store.add_tag("vegan", None), Err(StoreError::Conflict(_))));
        let tags = store.list_tags().await.unwrap();
        assert_eq!(tags.len(), 1);
    }

    #[tokio::test]
    async fn unknown_tag_ids_are_rejected() {
        let store = InMemoryCatalogStore::new();
        let vegan = store.add_tag("vegan", None).unwrap();

        let tagged = ProductInput {
            tag_ids: vec![vegan.id],
            ..input("a", "A", None)
        };
        let a = store.insert_product(&tagged, None).await.unwrap();
        assert_eq!(a.tag_ids, vec![vegan.id]);

        let bogus = ProductInput {
            tag_ids: vec![TagId::new(999)],
            ..input("x", "X", None)
        };
        let err = store.insert_product(&bogus, None).await.unwrap_err();
        assert!(matches!(err, StoreError::Validation(_)));

        let bogus = ProductInput {
            tag_ids: vec![vegan.id, TagId::new(999)],
            ..input("a", "A", None)
        };
        let err = store.update_product(a.id, &bogus, None).await.unwrap_err();
        assert!(matches!(err, StoreError::Validation(_)));
        assert_eq!(store.find_product(a.id).await.unwrap().unwrap().tag_ids, vec![vegan.id]);
        assert_eq!(store.list_tags().await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn rejected_write_leaves_sorting_untouched() {
        let store = InMemoryCatalogStore::new();
        let a = store.insert_product(&input("a", "A", Some(1)), None).await.unwrap();

        let shift = SortShift::plan(1, None);
        let duplicate = store.insert_product(&input("a", "Dup", Some(1)), shift).await;
        assert!(matches!(duplicate, Err(StoreError::Conflict(_))));

        let bogus = ProductInput {
            tag_ids: vec![TagId::new(42)],
            ..input("b", "B", Some(1))
        };
        assert!(store.insert_product(&bogus, shift).await.is_err());
        assert_eq!(store.find_product(a.id).await.unwrap().unwrap().sorting, 1);

        let b = store.insert_product(&input("b", "B", Some(1)), shift).await.unwrap();
        assert_eq!(b.sorting, 1);
        assert_eq!(store.find_product(a.id).await.unwrap().unwrap().sorting, 2);
    }
}

//! Postgres-backed catalog store.
//!
//! Product queries are assembled with `sqlx::QueryBuilder` from the
//! [`ProductQuery`] predicates. Tag associations come back as a `BIGINT[]`
//! column so a product is always one row.
//!
//! ## Error Mapping
//!
//! | SQLx Error | PostgreSQL Error Code | StoreError |
//! |------------|----------------------|------------|
//! | Database (unique violation) | `23505` | `Conflict` |
//! | Database (foreign key violation) | `23503` | `Validation` |
//! | Database (check constraint violation) | `23514` | `Validation` |
//! | Database (other) | Any other | `Database` |
//! | RowNotFound | N/A | `NotFound` |
//! | Other | N/A | `Database` |

use std::sync::Arc;

use chrono::{DateTime, NaiveDate, Utc};
use sqlx::{FromRow, PgPool, Postgres, QueryBuilder, Row, Transaction};
use tracing::{Span, instrument};

use shopdesk_core::{Money, ProductId, TagId, UserId};
use shopdesk_products::{
    DistributionMetric, MetricSample, Predicate, Product, ProductInput, ProductOrder,
    ProductQuery, ProductSalesStats, SalesPoint, SalesWindow, SoldProduct, SortShift, StatsWindow,
    Tag,
};

use super::r#trait::CatalogStore;
use crate::error::{StoreError, StoreResult};

const MIGRATION: &str = include_str!("../../migrations/0001_catalog.sql");

const PRODUCT_COLUMNS: &str = r#"
    p.id, p.code, p.name, p.user_label, p.description, p.price, p.catalog_price,
    p.stock, p.visible, p.shop, p.sorting, p.created_at, p.modified_at,
    ARRAY(SELECT pt.tag_id FROM product_tags pt WHERE pt.product_id = p.id ORDER BY pt.tag_id) AS tag_ids
"#;

/// Customers with a paid payment carrying a product-typed item of `$1`.
const BUYERS_CTE: &str = r#"
    WITH buyers AS (
        SELECT DISTINCT pa.user_id
        FROM payments pa
        JOIN payment_items pi ON pi.payment_id = pa.id
        WHERE pa.status = 'paid' AND pi.type = 'product' AND pi.product_id = $1
    )
"#;

#[derive(Debug, Clone)]
pub struct PostgresCatalogStore {
    pool: Arc<PgPool>,
}

impl PostgresCatalogStore {
    pub fn new(pool: PgPool) -> Self {
        Self {
            pool: Arc::new(pool),
        }
    }

    pub async fn connect(database_url: &str) -> StoreResult<Self> {
        let pool = PgPool::connect(database_url)
            .await
            .map_err(|e| map_sqlx_error("connect", e))?;
        Ok(Self::new(pool))
    }

    /// Create the catalog tables if they do not exist yet.
    #[instrument(skip(self), err)]
    pub async fn migrate(&self) -> StoreResult<()> {
        sqlx::raw_sql(MIGRATION)
            .execute(&*self.pool)
            .await
            .map_err(|e| map_sqlx_error("migrate", e))?;
        Ok(())
    }

    async fn fetch_products(
        &self,
        operation: &str,
        mut qb: QueryBuilder<'_, Postgres>,
    ) -> StoreResult<Vec<Product>> {
        let rows = qb
            .build()
            .fetch_all(&*self.pool)
            .await
            .map_err(|e| map_sqlx_error(operation, e))?;

        let mut products = Vec::with_capacity(rows.len());
        for row in rows {
            let product = ProductRow::from_row(&row).map_err(|e| {
                StoreError::Database(format!("failed to deserialize product row: {e}"))
            })?;
            products.push(product.into());
        }
        Ok(products)
    }
}

/// Escape `%`, `_` and `\` so the needle matches literally under `ESCAPE '\'`.
fn escape_like(needle: &str) -> String {
    let mut escaped = String::with_capacity(needle.len());
    for c in needle.chars() {
        if matches!(c, '%' | '_' | '\\') {
            escaped.push('\\');
        }
        escaped.push(c);
    }
    escaped
}

fn push_predicates(qb: &mut QueryBuilder<'_, Postgres>, predicates: &[Predicate]) {
    for predicate in predicates {
        match predicate {
            Predicate::Search { needle, amount } => {
                let pattern = format!("%{}%", escape_like(needle));
                qb.push(" AND (p.name ILIKE ");
                qb.push_bind(pattern.clone());
                qb.push(" ESCAPE '\\' OR p.code ILIKE ");
                qb.push_bind(pattern.clone());
                qb.push(" ESCAPE '\\' OR p.user_label ILIKE ");
                qb.push_bind(pattern);
                qb.push(" ESCAPE '\\'");
                if let Some(amount) = amount {
                    qb.push(" OR p.price = ");
                    qb.push_bind(amount.cents());
                    qb.push(" OR p.catalog_price = ");
                    qb.push_bind(amount.cents());
                }
                qb.push(")");
            }
            Predicate::TaggedAny(tags) => {
                let ids: Vec<i64> = tags.iter().map(|t| t.get()).collect();
                qb.push(
                    " AND EXISTS (SELECT 1 FROM product_tags pt WHERE pt.product_id = p.id AND pt.tag_id = ANY(",
                );
                qb.push_bind(ids);
                qb.push("))");
            }
            Predicate::Tagged(tag) => {
                qb.push(
                    " AND EXISTS (SELECT 1 FROM product_tags pt WHERE pt.product_id = p.id AND pt.tag_id = ",
                );
                qb.push_bind(tag.get());
                qb.push(")");
            }
            Predicate::Shop => {
                qb.push(" AND p.shop");
            }
            Predicate::Visible => {
                qb.push(" AND p.visible");
            }
            Predicate::InStock => {
                qb.push(" AND p.stock > 0");
            }
            Predicate::Excluding(id) => {
                qb.push(" AND p.id <> ");
                qb.push_bind(id.get());
            }
            Predicate::IdIn(ids) => {
                let ids: Vec<i64> = ids.iter().map(|id| id.get()).collect();
                qb.push(" AND p.id = ANY(");
                qb.push_bind(ids);
                qb.push(")");
            }
            Predicate::CodeEquals(code) => {
                qb.push(" AND p.code = ");
                qb.push_bind(code.clone());
            }
        }
    }
}

fn push_order(qb: &mut QueryBuilder<'_, Postgres>, order: ProductOrder) {
    qb.push(match order {
        ProductOrder::SortingDescNameAsc => " ORDER BY p.sorting DESC, p.name ASC",
        ProductOrder::Sorting => " ORDER BY p.sorting ASC, p.id ASC",
        ProductOrder::Name => " ORDER BY p.name ASC",
        ProductOrder::Random => " ORDER BY random()",
        ProductOrder::SoldCount => {
            r#" ORDER BY (
                SELECT COALESCE(SUM(pi.count), 0)
                FROM payment_items pi
                JOIN payments pa ON pa.id = pi.payment_id
                WHERE pi.product_id = p.id AND pi.type = 'product' AND pa.status = 'paid'
            ) DESC, p.sorting ASC"#
        }
    });
}

/// Postgres LIMIT/OFFSET are BIGINT; larger values saturate.
fn bigint_count(value: u64) -> i64 {
    i64::try_from(value).unwrap_or(i64::MAX)
}

fn push_window(qb: &mut QueryBuilder<'_, Postgres>, limit: Option<u64>, offset: u64) {
    if let Some(limit) = limit {
        qb.push(" LIMIT ");
        qb.push_bind(bigint_count(limit));
    }
    if offset > 0 {
        qb.push(" OFFSET ");
        qb.push_bind(bigint_count(offset));
    }
}

async fn replace_tags(
    tx: &mut Transaction<'_, Postgres>,
    product_id: i64,
    tag_ids: &[TagId],
) -> StoreResult<()> {
    sqlx::query("DELETE FROM product_tags WHERE product_id = $1")
        .bind(product_id)
        .execute(&mut **tx)
        .await
        .map_err(|e| map_sqlx_error("delete_product_tags", e))?;

    if tag_ids.is_empty() {
        return Ok(());
    }
    let ids: Vec<i64> = tag_ids.iter().map(|t| t.get()).collect();
    sqlx::query(
        r#"
        INSERT INTO product_tags (product_id, tag_id)
        SELECT $1, UNNEST($2::BIGINT[])
        ON CONFLICT DO NOTHING
        "#,
    )
    .bind(product_id)
    .bind(ids)
    .execute(&mut **tx)
    .await
    .map_err(|e| map_sqlx_error("insert_product_tags", e))?;
    Ok(())
}

async fn apply_shift(tx: &mut Transaction<'_, Postgres>, shift: SortShift) -> StoreResult<()> {
    if let Some(old) = shift.close_gap_after {
        sqlx::query("UPDATE products SET sorting = sorting - 1 WHERE sorting > $1")
            .bind(old)
            .execute(&mut **tx)
            .await
            .map_err(|e| map_sqlx_error("close_sorting_gap", e))?;
    }
    sqlx::query("UPDATE products SET sorting = sorting + 1 WHERE sorting >= $1")
        .bind(shift.open_gap_at)
        .execute(&mut **tx)
        .await
        .map_err(|e| map_sqlx_error("open_sorting_gap", e))?;
    Ok(())
}

#[async_trait::async_trait]
impl CatalogStore for PostgresCatalogStore {
    #[instrument(skip(self), fields(product_id = %id), err)]
    async fn find_product(&self, id: ProductId) -> StoreResult<Option<Product>> {
        let mut qb =
            QueryBuilder::new(format!("SELECT {PRODUCT_COLUMNS} FROM products p WHERE p.id = "));
        qb.push_bind(id.get());
        let mut products = self.fetch_products("find_product", qb).await?;
        Ok(products.pop())
    }

    #[instrument(
        skip(self, query),
        fields(
            predicates = query.predicates.len(),
            order = ?query.order,
            row_count = tracing::field::Empty
        ),
        err
    )]
    async fn query_products(&self, query: &ProductQuery) -> StoreResult<Vec<Product>> {
        let mut qb =
            QueryBuilder::new(format!("SELECT {PRODUCT_COLUMNS} FROM products p WHERE TRUE"));
        push_predicates(&mut qb, &query.predicates);
        push_order(&mut qb, query.order);
        push_window(&mut qb, query.limit, query.offset);

        let products = self.fetch_products("query_products", qb).await?;
        Span::current().record("row_count", products.len());
        Ok(products)
    }

    #[instrument(skip(self, query), err)]
    async fn count_products(&self, query: &ProductQuery) -> StoreResult<u64> {
        let mut qb = QueryBuilder::<Postgres>::new("SELECT COUNT(*) FROM products p WHERE TRUE");
        push_predicates(&mut qb, &query.predicates);
        let count: i64 = qb
            .build_query_scalar::<i64>()
            .fetch_one(&*self.pool)
            .await
            .map_err(|e| map_sqlx_error("count_products", e))?;
        Ok(count.max(0) as u64)
    }

    #[instrument(skip(self, base), fields(from = ?window.from, to = ?window.to), err)]
    async fn most_sold_products(
        &self,
        base: &ProductQuery,
        window: SalesWindow,
    ) -> StoreResult<Vec<SoldProduct>> {
        let mut qb = QueryBuilder::new(format!(
            r#"
            SELECT {PRODUCT_COLUMNS}, SUM(pi.count)::BIGINT AS sold_count
            FROM products p
            JOIN payment_items pi ON pi.product_id = p.id AND pi.type = 'product'
            JOIN payments pa ON pa.id = pi.payment_id AND pa.status = 'paid'
            WHERE TRUE"#
        ));
        push_predicates(&mut qb, &base.predicates);
        if let Some(from) = window.from {
            qb.push(" AND pa.paid_at >= ");
            qb.push_bind(from);
        }
        if let Some(to) = window.to {
            qb.push(" AND pa.paid_at < ");
            qb.push_bind(to);
        }
        qb.push(" GROUP BY p.id ORDER BY sold_count DESC, p.name ASC");
        push_window(&mut qb, base.limit, 0);

        let rows = qb
            .build()
            .fetch_all(&*self.pool)
            .await
            .map_err(|e| map_sqlx_error("most_sold_products", e))?;

        let mut ranked = Vec::with_capacity(rows.len());
        for row in rows {
            let product = ProductRow::from_row(&row).map_err(|e| {
                StoreError::Database(format!("failed to deserialize product row: {e}"))
            })?;
            let sold_count: i64 = row
                .try_get("sold_count")
                .map_err(|e| map_sqlx_error("most_sold_products", e))?;
            ranked.push(SoldProduct {
                product: product.into(),
                sold_count,
            });
        }
        Ok(ranked)
    }

    #[instrument(
        skip(self),
        fields(close_gap_after = ?shift.close_gap_after, open_gap_at = shift.open_gap_at),
        err
    )]
    async fn shift_sorting(&self, shift: SortShift) -> StoreResult<()> {
        let mut tx = self
            .pool
            .begin()
            .await
            .map_err(|e| map_sqlx_error("begin_transaction", e))?;

        apply_shift(&mut tx, shift).await?;

        tx.commit()
            .await
            .map_err(|e| map_sqlx_error("commit_transaction", e))?;
        Ok(())
    }

    #[instrument(skip(self), fields(product_id = %id), err)]
    async fn decrease_stock(&self, id: ProductId, count: i64) -> StoreResult<()> {
        let result = sqlx::query(
            "UPDATE products SET stock = stock - $2, modified_at = now() WHERE id = $1",
        )
        .bind(id.get())
        .bind(count)
        .execute(&*self.pool)
        .await
        .map_err(|e| map_sqlx_error("decrease_stock", e))?;

        if result.rows_affected() == 0 {
            return Err(StoreError::NotFound);
        }
        Ok(())
    }

    #[instrument(skip(self, input), fields(code = %input.code), err)]
    async fn insert_product(
        &self,
        input: &ProductInput,
        shift: Option<SortShift>,
    ) -> StoreResult<Product> {
        let mut tx = self
            .pool
            .begin()
            .await
            .map_err(|e| map_sqlx_error("begin_transaction", e))?;

        // Dropping the transaction on any later error rolls the shift back.
        if let Some(shift) = shift {
            apply_shift(&mut tx, shift).await?;
        }

        let sorting = match input.sorting {
            Some(sorting) => sorting,
            None => {
                sqlx::query_scalar::<_, i64>("SELECT COALESCE(MAX(sorting), 0) + 1 FROM products")
                    .fetch_one(&mut *tx)
                    .await
                    .map_err(|e| map_sqlx_error("next_sorting", e))?
            }
        };

        let id: i64 = sqlx::query_scalar(
            r#"
            INSERT INTO products (
                code, name, user_label, description, price, catalog_price,
                stock, visible, shop, sorting
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10)
            RETURNING id
            "#,
        )
        .bind(&input.code)
        .bind(&input.name)
        .bind(input.effective_user_label())
        .bind(&input.description)
        .bind(input.price.cents())
        .bind(input.catalog_price.cents())
        .bind(input.stock)
        .bind(input.visible)
        .bind(input.shop)
        .bind(sorting)
        .fetch_one(&mut *tx)
        .await
        .map_err(|e| map_sqlx_error("insert_product", e))?;

        replace_tags(&mut tx, id, &input.tag_ids).await?;

        tx.commit()
            .await
            .map_err(|e| map_sqlx_error("commit_transaction", e))?;

        self.find_product(ProductId::new(id))
            .await?
            .ok_or(StoreError::NotFound)
    }

    #[instrument(skip(self, input), fields(product_id = %id, code = %input.code), err)]
    async fn update_product(
        &self,
        id: ProductId,
        input: &ProductInput,
        shift: Option<SortShift>,
    ) -> StoreResult<Product> {
        let mut tx = self
            .pool
            .begin()
            .await
            .map_err(|e| map_sqlx_error("begin_transaction", e))?;

        if let Some(shift) = shift {
            apply_shift(&mut tx, shift).await?;
        }

        let result = sqlx::query(
            r#"
            UPDATE products SET
                code = $2,
                name = $3,
                user_label = $4,
                description = $5,
                price = $6,
                catalog_price = $7,
                stock = $8,
                visible = $9,
                shop = $10,
                sorting = COALESCE($11, sorting),
                modified_at = now()
            WHERE id = $1
            "#,
        )
        .bind(id.get())
        .bind(&input.code)
        .bind(&input.name)
        .bind(input.effective_user_label())
        .bind(&input.description)
        .bind(input.price.cents())
        .bind(input.catalog_price.cents())
        .bind(input.stock)
        .bind(input.visible)
        .bind(input.shop)
        .bind(input.sorting)
        .execute(&mut *tx)
        .await
        .map_err(|e| map_sqlx_error("update_product", e))?;

        if result.rows_affected() == 0 {
            tx.rollback()
                .await
                .map_err(|e| map_sqlx_error("rollback", e))?;
            return Err(StoreError::NotFound);
        }

        replace_tags(&mut tx, id.get(), &input.tag_ids).await?;

        tx.commit()
            .await
            .map_err(|e| map_sqlx_error("commit_transaction", e))?;

        self.find_product(id).await?.ok_or(StoreError::NotFound)
    }

    #[instrument(
        skip(self),
        fields(
            product_id = %product_id,
            metric = metric.config_key(),
            sample_count = tracing::field::Empty
        ),
        err
    )]
    async fn metric_samples(
        &self,
        product_id: ProductId,
        metric: DistributionMetric,
        now: DateTime<Utc>,
    ) -> StoreResult<Vec<MetricSample>> {
        let body = match metric {
            DistributionMetric::AmountSpent => {
                r#"
                SELECT b.user_id, SUM(pa.amount)::BIGINT AS cents
                FROM buyers b
                JOIN payments pa ON pa.user_id = b.user_id AND pa.status = 'paid'
                GROUP BY b.user_id
                ORDER BY b.user_id
                "#
            }
            DistributionMetric::PaymentCount => {
                r#"
                SELECT b.user_id, COUNT(*)::BIGINT AS n
                FROM buyers b
                JOIN payments pa ON pa.user_id = b.user_id AND pa.status = 'paid'
                GROUP BY b.user_id
                ORDER BY b.user_id
                "#
            }
            DistributionMetric::ShopCount => {
                r#"
                SELECT b.user_id, COUNT(DISTINCT pa.id)::BIGINT AS n
                FROM buyers b
                JOIN payments pa ON pa.user_id = b.user_id AND pa.status = 'paid'
                JOIN payment_items pi ON pi.payment_id = pa.id AND pi.type = 'product'
                GROUP BY b.user_id
                ORDER BY b.user_id
                "#
            }
            DistributionMetric::DaysFromLastOrder => {
                r#"
                SELECT b.user_id, MAX(COALESCE(pa.paid_at, pa.created_at)) AS last_order
                FROM buyers b
                JOIN payments pa ON pa.user_id = b.user_id AND pa.status = 'paid'
                JOIN payment_items pi ON pi.payment_id = pa.id
                    AND pi.type = 'product' AND pi.product_id = $1
                GROUP BY b.user_id
                ORDER BY b.user_id
                "#
            }
        };

        let rows = sqlx::query(&format!("{BUYERS_CTE}{body}"))
            .bind(product_id.get())
            .fetch_all(&*self.pool)
            .await
            .map_err(|e| map_sqlx_error("metric_samples", e))?;

        let mut samples = Vec::with_capacity(rows.len());
        for row in rows {
            let user_id: i64 = row
                .try_get("user_id")
                .map_err(|e| map_sqlx_error("metric_samples", e))?;
            let value = match metric {
                DistributionMetric::AmountSpent => {
                    let cents: i64 = row
                        .try_get("cents")
                        .map_err(|e| map_sqlx_error("metric_samples", e))?;
                    Money::from_cents(cents).as_decimal()
                }
                DistributionMetric::PaymentCount | DistributionMetric::ShopCount => {
                    let n: i64 = row
                        .try_get("n")
                        .map_err(|e| map_sqlx_error("metric_samples", e))?;
                    n as f64
                }
                DistributionMetric::DaysFromLastOrder => {
                    let last: DateTime<Utc> = row
                        .try_get("last_order")
                        .map_err(|e| map_sqlx_error("metric_samples", e))?;
                    (now - last).num_days().max(0) as f64
                }
            };
            samples.push(MetricSample {
                user_id: UserId::new(user_id),
                value,
            });
        }

        Span::current().record("sample_count", samples.len());
        Ok(samples)
    }

    #[instrument(skip(self), fields(product_id = %id), err)]
    async fn sold_count(&self, id: ProductId) -> StoreResult<i64> {
        sqlx::query_scalar(
            r#"
            SELECT COALESCE(SUM(pi.count), 0)::BIGINT
            FROM payment_items pi
            JOIN payments pa ON pa.id = pi.payment_id
            WHERE pi.product_id = $1 AND pa.status = 'paid'
            "#,
        )
        .bind(id.get())
        .fetch_one(&*self.pool)
        .await
        .map_err(|e| map_sqlx_error("sold_count", e))
    }

    #[instrument(skip(self), fields(from = ?window.from, to = %window.to), err)]
    async fn product_stats(&self, window: StatsWindow) -> StoreResult<Vec<ProductSalesStats>> {
        let mut qb = QueryBuilder::<Postgres>::new(
            r#"
            SELECT
                pi.product_id,
                SUM(pi.count)::BIGINT AS product_count,
                SUM(pi.amount * pi.count)::BIGINT AS product_amount
            FROM payment_items pi
            JOIN payments pa ON pa.id = pi.payment_id
            WHERE pa.status = 'paid' AND pi.type = 'product' AND pi.product_id IS NOT NULL"#,
        );
        if let Some(from) = window.from {
            qb.push(" AND pa.paid_at BETWEEN ");
            qb.push_bind(from);
            qb.push(" AND ");
            qb.push_bind(window.to);
        }
        qb.push(" GROUP BY pi.product_id ORDER BY pi.product_id");

        let rows = qb
            .build()
            .fetch_all(&*self.pool)
            .await
            .map_err(|e| map_sqlx_error("product_stats", e))?;

        let mut stats = Vec::with_capacity(rows.len());
        for row in rows {
            let row = StatsRow::from_row(&row).map_err(|e| map_sqlx_error("product_stats", e))?;
            stats.push(row.into());
        }
        Ok(stats)
    }

    #[instrument(skip(self), fields(product_id = %id), err)]
    async fn daily_sales(
        &self,
        id: ProductId,
        from: DateTime<Utc>,
        to: DateTime<Utc>,
    ) -> StoreResult<Vec<SalesPoint>> {
        let rows = sqlx::query(
            r#"
            SELECT
                (pa.created_at AT TIME ZONE 'UTC')::date AS day,
                SUM(pi.count)::BIGINT AS sold_count
            FROM payment_items pi
            JOIN payments pa ON pa.id = pi.payment_id
            WHERE pi.product_id = $1
              AND pi.type = 'product'
              AND pa.status = 'paid'
              AND pa.created_at >= $2
              AND pa.created_at < $3
            GROUP BY day
            ORDER BY day
            "#,
        )
        .bind(id.get())
        .bind(from)
        .bind(to)
        .fetch_all(&*self.pool)
        .await
        .map_err(|e| map_sqlx_error("daily_sales", e))?;

        let mut points = Vec::with_capacity(rows.len());
        for row in rows {
            let day: NaiveDate = row.try_get("day").map_err(|e| map_sqlx_error("daily_sales", e))?;
            let sold_count: i64 = row
                .try_get("sold_count")
                .map_err(|e| map_sqlx_error("daily_sales", e))?;
            points.push(SalesPoint { day, sold_count });
        }
        Ok(points)
    }

    #[instrument(skip(self), err)]
    async fn list_tags(&self) -> StoreResult<Vec<Tag>> {
        let rows = sqlx::query("SELECT id, code, user_label FROM tags ORDER BY code")
            .fetch_all(&*self.pool)
            .await
            .map_err(|e| map_sqlx_error("list_tags", e))?;

        let mut tags = Vec::with_capacity(rows.len());
        for row in rows {
            let row = TagRow::from_row(&row).map_err(|e| map_sqlx_error("list_tags", e))?;
            tags.push(row.into());
        }
        Ok(tags)
    }
}

/// Map SQLx errors to StoreError.
fn map_sqlx_error(operation: &str, err: sqlx::Error) -> StoreError {
    match err {
        sqlx::Error::Database(db_err) => {
            let msg = format!("database error in {}: {}", operation, db_err.message());

            match db_err.code().as_deref() {
                Some("23505") => {
                    if db_err.constraint() == Some("products_code_key") {
                        StoreError::Conflict("product code already exists".to_string())
                    } else {
                        StoreError::Conflict(msg)
                    }
                }
                // Foreign key (unknown tag id) or check constraint violation
                Some("23503") | Some("23514") => StoreError::Validation(msg),
                _ => StoreError::Database(msg),
            }
        }
        sqlx::Error::RowNotFound => StoreError::NotFound,
        sqlx::Error::PoolClosed => {
            StoreError::Database(format!("connection pool closed in {}", operation))
        }
        other => StoreError::Database(format!("sqlx error in {}: {}", operation, other)),
    }
}

// SQLx row types

#[derive(Debug)]
struct ProductRow {
    id: i64,
    code: String,
    name: String,
    user_label: String,
    description: Option<String>,
    price: i64,
    catalog_price: i64,
    stock: i64,
    visible: bool,
    shop: bool,
    sorting: i64,
    tag_ids: Vec<i64>,
    created_at: DateTime<Utc>,
    modified_at: DateTime<Utc>,
}

impl<'r> sqlx::FromRow<'r, sqlx::postgres::PgRow> for ProductRow {
    fn from_row(row: &'r sqlx::postgres::PgRow) -> Result<Self, sqlx::Error> {
        Ok(ProductRow {
            id: row.try_get("id")?,
            code: row.try_get("code")?,
            name: row.try_get("name")?,
            user_label: row.try_get("user_label")?,
            description: row.try_get("description")?,
            price: row.try_get("price")?,
            catalog_price: row.try_get("catalog_price")?,
            stock: row.try_get("stock")?,
            visible: row.try_get("visible")?,
            shop: row.try_get("shop")?,
            sorting: row.try_get("sorting")?,
            tag_ids: row.try_get("tag_ids")?,
            created_at: row.try_get("created_at")?,
            modified_at: row.try_get("modified_at")?,
        })
    }
}

impl From<ProductRow> for Product {
    fn from(row: ProductRow) -> Self {
        Product {
            id: ProductId::new(row.id),
            code: row.code,
            name: row.name,
            user_label: row.user_label,
            description: row.description,
            price: Money::from_cents(row.price),
            catalog_price: Money::from_cents(row.catalog_price),
            stock: row.stock,
            visible: row.visible,
            shop: row.shop,
            sorting: row.sorting,
            tag_ids: row.tag_ids.into_iter().map(TagId::new).collect(),
            created_at: row.created_at,
            modified_at: row.modified_at,
        }
    }
}

#[derive(Debug)]
struct TagRow {
    id: i64,
    code: String,
    user_label: Option<String>,
}

impl<'r> sqlx::FromRow<'r, sqlx::postgres::PgRow> for TagRow {
    fn from_row(row: &'r sqlx::postgres::PgRow) -> Result<Self, sqlx::Error> {
        Ok(TagRow {
            id: row.try_get("id")?,
            code: row.try_get("code")?,
            user_label: row.try_get("user_label")?,
        })
    }
}

impl From<TagRow> for Tag {
    fn from(row: TagRow) -> Self {
        Tag {
            id: TagId::new(row.id),
            code: row.code,
            user_label: row.user_label,
        }
    }
}

#[derive(Debug)]
struct StatsRow {
    product_id: i64,
    product_count: i64,
    product_amount: i64,
}

impl<'r> sqlx::FromRow<'r, sqlx::postgres::PgRow> for StatsRow {
    fn from_row(row: &'r sqlx::postgres::PgRow) -> Result<Self, sqlx::Error> {
        Ok(StatsRow {
            product_id: row.try_get("product_id")?,
            product_count: row.try_get("product_count")?,
            product_amount: row.try_get("product_amount")?,
        })
    }
}

impl From<StatsRow> for ProductSalesStats {
    fn from(row: StatsRow) -> Self {
        ProductSalesStats {
            product_id: ProductId::new(row.product_id),
            product_count: row.product_count,
            product_amount: Money::from_cents(row.product_amount),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn like_wildcards_are_escaped() {
        assert_eq!(escape_like("50%_off\\"), "50\\%\\_off\\\\");
        assert_eq!(escape_like("plain"), "plain");
    }

    #[test]
    fn search_predicate_adds_amount_clause_only_when_numeric() {
        let query = ProductQuery::search(Some("12,50"), &[TagId::new(3)]);
        let mut qb = QueryBuilder::<Postgres>::new("SELECT 1 FROM products p WHERE TRUE");
        push_predicates(&mut qb, &query.predicates);
        let sql = qb.sql();
        assert!(sql.contains("p.price = "));
        assert!(sql.contains("pt.tag_id = ANY("));

        let query = ProductQuery::search(Some("box"), &[]);
        let mut qb = QueryBuilder::<Postgres>::new("SELECT 1 FROM products p WHERE TRUE");
        push_predicates(&mut qb, &query.predicates);
        assert!(!qb.sql().contains("p.price = "));
        assert!(qb.sql().contains("ILIKE"));
    }

    #[test]
    fn window_counts_saturate_instead_of_wrapping() {
        assert_eq!(bigint_count(4), 4);
        assert_eq!(bigint_count(i64::MAX as u64), i64::MAX);
        assert_eq!(bigint_count(u64::MAX), i64::MAX);
    }

    #[test]
    fn admin_order_is_sorting_desc_then_name() {
        let mut qb = QueryBuilder::<Postgres>::new("SELECT 1 FROM products p");
        push_order(&mut qb, ProductOrder::default());
        assert!(qb.sql().ends_with("ORDER BY p.sorting DESC, p.name ASC"));
    }
}

//! Product queries.
//!
//! A [`ProductQuery`] is a plain value (predicates, ordering, window) handed to
//! a store. Every store must give a predicate the same meaning as
//! [`ProductQuery::matches`], which is also what the in-memory store executes.

use serde::{Deserialize, Serialize};

use shopdesk_core::{DomainError, Money, ProductId, TagId};

use crate::product::Product;

/// A single filter condition. Predicates in a query are AND-combined.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Predicate {
    /// OR-group: case-insensitive substring match of `needle` on name, code or
    /// user label, or (when the search text was numeric) exact price or
    /// catalog price equality.
    Search { needle: String, amount: Option<Money> },
    /// Associated with at least one of the tags.
    TaggedAny(Vec<TagId>),
    /// Associated with the tag.
    Tagged(TagId),
    /// Sellable through the shop channel.
    Shop,
    Visible,
    /// `stock > 0`.
    InStock,
    /// Every product except this one.
    Excluding(ProductId),
    IdIn(Vec<ProductId>),
    CodeEquals(String),
}

impl Predicate {
    pub fn matches(&self, product: &Product) -> bool {
        match self {
            Predicate::Search { needle, amount } => {
                let needle = needle.to_lowercase();
                let text_hit = [&product.name, &product.code, &product.user_label]
                    .iter()
                    .any(|field| field.to_lowercase().contains(&needle));
                let amount_hit = amount
                    .map(|a| product.price == a || product.catalog_price == a)
                    .unwrap_or(false);
                text_hit || amount_hit
            }
            Predicate::TaggedAny(tags) => product.has_any_tag(tags),
            Predicate::Tagged(tag) => product.has_tag(*tag),
            Predicate::Shop => product.shop,
            Predicate::Visible => product.visible,
            Predicate::InStock => product.is_available(),
            Predicate::Excluding(id) => product.id != *id,
            Predicate::IdIn(ids) => ids.contains(&product.id),
            Predicate::CodeEquals(code) => product.code == *code,
        }
    }
}

/// Result ordering.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ProductOrder {
    /// Admin listing order: sorting descending, then name ascending.
    #[default]
    SortingDescNameAsc,
    /// Manual display order (sorting ascending).
    Sorting,
    Name,
    Random,
    /// Best sellers first (sum of paid product-item counts, all time).
    SoldCount,
}

impl core::str::FromStr for ProductOrder {
    type Err = DomainError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "sorting" => Ok(ProductOrder::Sorting),
            "sorting_desc" => Ok(ProductOrder::SortingDescNameAsc),
            "name" => Ok(ProductOrder::Name),
            "random" => Ok(ProductOrder::Random),
            "sold_count" => Ok(ProductOrder::SoldCount),
            other => Err(DomainError::validation(format!("unknown order '{other}'"))),
        }
    }
}

/// Page-based pagination for admin listings.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Pagination {
    /// 1-based page number.
    pub page: u32,
    pub per_page: u32,
}

impl Pagination {
    pub fn new(page: Option<u32>, per_page: u32) -> Self {
        Self {
            page: page.unwrap_or(1).max(1),
            per_page: per_page.clamp(1, 1000),
        }
    }

    pub fn offset(&self) -> u64 {
        u64::from(self.page - 1) * u64::from(self.per_page)
    }

    pub fn page_count(&self, total: u64) -> u64 {
        total.div_ceil(u64::from(self.per_page)).max(1)
    }
}

/// Filters for shop-channel listings.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ShopFilter {
    pub visible_only: bool,
    pub available_only: bool,
    pub tag: Option<TagId>,
    pub order: ProductOrder,
}

impl Default for ShopFilter {
    fn default() -> Self {
        Self {
            visible_only: true,
            available_only: true,
            tag: None,
            order: ProductOrder::Sorting,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProductQuery {
    pub predicates: Vec<Predicate>,
    pub order: ProductOrder,
    pub limit: Option<u64>,
    pub offset: u64,
}

impl Default for ProductQuery {
    fn default() -> Self {
        Self::all()
    }
}

impl ProductQuery {
    /// Every product, in admin listing order.
    pub fn all() -> Self {
        Self {
            predicates: Vec::new(),
            order: ProductOrder::SortingDescNameAsc,
            limit: None,
            offset: 0,
        }
    }

    /// Admin search over free text and tags.
    ///
    /// Blank text and no tags yield [`ProductQuery::all`]. Text that reads as
    /// a number (comma accepted as decimal separator) additionally matches
    /// exact prices.
    pub fn search(text: Option<&str>, tags: &[TagId]) -> Self {
        let text = text.filter(|t| !t.trim().is_empty());
        let mut query = Self::all();

        if let Some(text) = text {
            let amount = parse_search_number(text).and_then(Money::from_decimal);
            query.predicates.push(Predicate::Search {
                needle: text.to_string(),
                amount,
            });
        }
        if !tags.is_empty() {
            query.predicates.push(Predicate::TaggedAny(tags.to_vec()));
        }
        query
    }

    pub fn shop(filter: &ShopFilter) -> Self {
        let mut predicates = vec![Predicate::Shop];
        if filter.visible_only {
            predicates.push(Predicate::Visible);
        }
        if filter.available_only {
            predicates.push(Predicate::InStock);
        }
        if let Some(tag) = filter.tag {
            predicates.push(Predicate::Tagged(tag));
        }
        Self {
            predicates,
            order: filter.order,
            limit: None,
            offset: 0,
        }
    }

    /// Random visible, available shop products other than `product`.
    pub fn related(product: &Product, limit: u64) -> Self {
        let filter = ShopFilter {
            order: ProductOrder::Random,
            ..ShopFilter::default()
        };
        Self::shop(&filter)
            .filter(Predicate::Excluding(product.id))
            .limit(limit)
    }

    pub fn by_ids(ids: &[ProductId]) -> Self {
        Self::all().filter(Predicate::IdIn(ids.to_vec()))
    }

    pub fn by_code(code: &str) -> Self {
        Self::all().filter(Predicate::CodeEquals(code.to_string()))
    }

    pub fn filter(mut self, predicate: Predicate) -> Self {
        self.predicates.push(predicate);
        self
    }

    pub fn order_by(mut self, order: ProductOrder) -> Self {
        self.order = order;
        self
    }

    pub fn limit(mut self, limit: u64) -> Self {
        self.limit = Some(limit);
        self
    }

    pub fn offset(mut self, offset: u64) -> Self {
        self.offset = offset;
        self
    }

    pub fn paginate(self, pagination: &Pagination) -> Self {
        self.limit(u64::from(pagination.per_page))
            .offset(pagination.offset())
    }

    /// Same filter, no limit/offset (used for counting).
    pub fn unwindowed(&self) -> Self {
        Self {
            predicates: self.predicates.clone(),
            order: self.order,
            limit: None,
            offset: 0,
        }
    }

    pub fn matches(&self, product: &Product) -> bool {
        self.predicates.iter().all(|p| p.matches(product))
    }
}

/// Interpret admin search text as a number, accepting `,` as decimal separator.
///
/// Returns `None` for anything that is not a finite number; callers skip the
/// numeric clause in that case.
pub fn parse_search_number(text: &str) -> Option<f64> {
    let normalized = text.trim().replace(',', ".");
    if normalized.is_empty() {
        return None;
    }
    // Rust also parses "inf"/"nan"; admin search never means those.
    if !normalized
        .chars()
        .all(|c| c.is_ascii_digit() || matches!(c, '.' | '+' | '-' | 'e' | 'E'))
    {
        return None;
    }
    normalized.parse::<f64>().ok().filter(|v| v.is_finite())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::product::fixtures::product;

    #[test]
    fn blank_search_is_unfiltered() {
        assert_eq!(ProductQuery::search(None, &[]), ProductQuery::all());
        assert_eq!(ProductQuery::search(Some(""), &[]), ProductQuery::all());
        assert_eq!(ProductQuery::search(Some("   "), &[]), ProductQuery::all());
        assert_eq!(ProductQuery::all().order, ProductOrder::SortingDescNameAsc);
    }

    #[test]
    fn numeric_text_adds_price_match() {
        let q = ProductQuery::search(Some("12,50"), &[]);
        assert_eq!(
            q.predicates,
            vec![Predicate::Search {
                needle: "12,50".to_string(),
                amount: Some(Money::from_cents(1250)),
            }]
        );

        let mut p = product(1, "magazine", "Monthly");
        p.price = Money::from_cents(1250);
        assert!(q.matches(&p));

        p.price = Money::from_cents(1300);
        p.catalog_price = Money::from_cents(1250);
        assert!(q.matches(&p));

        p.catalog_price = Money::from_cents(1300);
        assert!(!q.matches(&p));
    }

    #[test]
    fn non_numeric_text_only_matches_text_fields() {
        let q = ProductQuery::search(Some("ONTH"), &[]);
        assert_eq!(
            q.predicates,
            vec![Predicate::Search { needle: "ONTH".to_string(), amount: None }]
        );
        assert!(q.matches(&product(1, "magazine", "Monthly")));
        assert!(!q.matches(&product(2, "book", "Novel")));
    }

    #[test]
    fn tags_restrict_on_top_of_text() {
        let tag = TagId::new(3);
        let q = ProductQuery::search(Some("book"), &[tag]);

        let mut tagged = product(1, "book", "Book");
        tagged.tag_ids = vec![tag];
        let untagged = product(2, "book-2", "Book 2");

        assert!(q.matches(&tagged));
        assert!(!q.matches(&untagged));

        let tags_only = ProductQuery::search(None, &[tag]);
        assert_eq!(tags_only.predicates, vec![Predicate::TaggedAny(vec![tag])]);
    }

    #[test]
    fn parse_search_number_accepts_comma_decimal() {
        assert_eq!(parse_search_number("12,50"), Some(12.5));
        assert_eq!(parse_search_number(" 7 "), Some(7.0));
        assert_eq!(parse_search_number("-1.5"), Some(-1.5));
        assert_eq!(parse_search_number("1e2"), Some(100.0));
        assert_eq!(parse_search_number("12,5,0"), None);
        assert_eq!(parse_search_number("abc"), None);
        assert_eq!(parse_search_number("inf"), None);
        assert_eq!(parse_search_number("NaN"), None);
        assert_eq!(parse_search_number(""), None);
    }

    #[test]
    fn shop_filter_builds_expected_predicates() {
        let q = ProductQuery::shop(&ShopFilter::default());
        assert_eq!(
            q.predicates,
            vec![Predicate::Shop, Predicate::Visible, Predicate::InStock]
        );
        assert_eq!(q.order, ProductOrder::Sorting);

        let tag = TagId::new(4);
        let q = ProductQuery::shop(&ShopFilter {
            visible_only: false,
            available_only: false,
            tag: Some(tag),
            order: ProductOrder::Name,
        });
        assert_eq!(q.predicates, vec![Predicate::Shop, Predicate::Tagged(tag)]);
    }

    #[test]
    fn related_excludes_the_product_and_is_random() {
        let p = product(9, "x", "X");
        let q = ProductQuery::related(&p, 4);
        assert_eq!(q.order, ProductOrder::Random);
        assert_eq!(q.limit, Some(4));
        assert!(!q.matches(&p));
        assert!(q.matches(&product(10, "y", "Y")));
    }

    #[test]
    fn pagination_offsets_and_page_count() {
        let p = Pagination::new(Some(3), 20);
        assert_eq!(p.offset(), 40);
        assert_eq!(p.page_count(41), 3);
        assert_eq!(p.page_count(0), 1);

        let p = Pagination::new(Some(0), 0);
        assert_eq!(p.page, 1);
        assert_eq!(p.per_page, 1);

        let q = ProductQuery::all().paginate(&Pagination::new(Some(2), 10));
        assert_eq!((q.limit, q.offset), (Some(10), 10));
        assert_eq!(q.unwindowed().limit, None);
    }
}

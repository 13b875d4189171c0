use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use shopdesk_core::{ProductId, TagId};
use shopdesk_infra::ProductPage;
use shopdesk_products::{
    DistributionBucket, DistributionLevels, DistributionMetric, MetricSample, Product,
    ProductDistribution, ProductInput, ProductOrder, SalesPoint, ShopFilter, Tag,
};

use crate::app::errors::PRODUCTS_PATH;

// -------------------------
// Request DTOs
// -------------------------

/// Admin list filter, read from `?text=&tags[]=&page=`.
///
/// Parsed by hand because `tags[]` repeats.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ListQuery {
    pub text: Option<String>,
    pub tags: Vec<TagId>,
    pub page: Option<u32>,
}

impl ListQuery {
    pub fn parse(raw: Option<&str>) -> Result<Self, String> {
        let mut query = ListQuery::default();
        let Some(raw) = raw else {
            return Ok(query);
        };

        for (key, value) in url::form_urlencoded::parse(raw.as_bytes()) {
            match key.as_ref() {
                "text" => query.text = Some(value.into_owned()),
                "tags[]" | "tags" => {
                    if value.is_empty() {
                        continue;
                    }
                    let tag = value
                        .parse::<TagId>()
                        .map_err(|_| format!("invalid tag id '{value}'"))?;
                    query.tags.push(tag);
                }
                "page" => {
                    if value.is_empty() {
                        continue;
                    }
                    let page = value
                        .parse::<u32>()
                        .map_err(|_| format!("invalid page '{value}'"))?;
                    query.page = Some(page);
                }
                _ => {}
            }
        }
        Ok(query)
    }

    /// `/admin/products?text=...&tags[]=...` for this filter.
    pub fn list_location(&self) -> String {
        let mut ser = url::form_urlencoded::Serializer::new(String::new());
        ser.append_pair("text", self.text.as_deref().unwrap_or(""));
        for tag in &self.tags {
            ser.append_pair("tags[]", &tag.to_string());
        }
        format!("{PRODUCTS_PATH}?{}", ser.finish())
    }
}

/// Filter form submission.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct FilterRequest {
    pub text: Option<String>,
    pub tags: Vec<TagId>,
}

impl From<FilterRequest> for ListQuery {
    fn from(body: FilterRequest) -> Self {
        ListQuery {
            text: body.text,
            tags: body.tags,
            page: None,
        }
    }
}

#[derive(Debug, Deserialize)]
pub struct SortingRequest {
    pub new_sorting: i64,
    pub old_sorting: Option<i64>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DrilldownQuery {
    #[serde(rename = "type")]
    pub kind: Option<String>,
    pub from_level: Option<f64>,
    pub to_level: Option<f64>,
}

#[derive(Debug, Default, Deserialize)]
pub struct SalesRangeQuery {
    pub from: Option<DateTime<Utc>>,
    pub to: Option<DateTime<Utc>>,
}

#[derive(Debug, Default, Deserialize)]
pub struct ShopQuery {
    pub tag: Option<TagId>,
    pub visible_only: Option<bool>,
    pub available_only: Option<bool>,
    pub order: Option<String>,
}

impl ShopQuery {
    pub fn to_filter(&self) -> Result<ShopFilter, String> {
        let defaults = ShopFilter::default();
        let order = match self.order.as_deref() {
            Some(order) if !order.is_empty() => {
                order.parse::<ProductOrder>().map_err(|e| e.to_string())?
            }
            _ => defaults.order,
        };
        Ok(ShopFilter {
            visible_only: self.visible_only.unwrap_or(defaults.visible_only),
            available_only: self.available_only.unwrap_or(defaults.available_only),
            tag: self.tag,
            order,
        })
    }
}

#[derive(Debug, Default, Deserialize)]
pub struct RelatedQuery {
    pub limit: Option<u64>,
}

// -------------------------
// Response DTOs
// -------------------------

#[derive(Debug, Serialize)]
pub struct ProductListResponse {
    pub filter: ListQuery,
    #[serde(flatten)]
    pub page: ProductPage,
}

/// A distribution as shown on the detail page; `type` is the drill-down key.
#[derive(Debug, Serialize)]
pub struct DistributionView {
    #[serde(rename = "type")]
    pub kind: &'static str,
    pub metric: DistributionMetric,
    pub levels: DistributionLevels,
    pub buckets: Vec<DistributionBucket>,
}

impl From<ProductDistribution> for DistributionView {
    fn from(d: ProductDistribution) -> Self {
        DistributionView {
            kind: d.metric.drilldown_type(),
            metric: d.metric,
            levels: d.levels,
            buckets: d.buckets,
        }
    }
}

#[derive(Debug, Serialize)]
pub struct ProductDetailResponse {
    pub product: Product,
    pub sold_count: i64,
    pub distributions: Vec<DistributionView>,
    pub sales_graph: Vec<SalesPoint>,
}

#[derive(Debug, Serialize)]
pub struct DrilldownResponse {
    pub product_id: ProductId,
    #[serde(rename = "type")]
    pub kind: &'static str,
    pub from: f64,
    pub to: Option<f64>,
    pub users: Vec<MetricSample>,
}

#[derive(Debug, Serialize)]
pub struct ProductFormResponse {
    pub product_id: Option<ProductId>,
    pub form: ProductInput,
    pub tags: Vec<Tag>,
}

#[derive(Debug, Serialize)]
pub struct FilterFormResponse {
    pub text: String,
    pub tags: Vec<TagId>,
    /// Tag id → code.
    pub tag_options: std::collections::BTreeMap<TagId, String>,
}

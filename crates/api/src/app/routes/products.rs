//! Product admin: list/search, detail with customer distributions, forms,
//! reordering and sales reports.
//!
//! Missing products redirect back to the list with a flash message instead of
//! returning 404, so the admin UI lands somewhere useful.

use std::sync::Arc;

use axum::{
    Json, Router,
    extract::{Extension, Path, Query, RawQuery, rejection::JsonRejection},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post},
};
use chrono::Utc;

use shopdesk_auth::AccessLevel;
use shopdesk_core::ProductId;
use shopdesk_infra::StoreError;
use shopdesk_products::{DistributionMetric, Pagination, ProductInput};

use crate::app::errors::{self, Flash};
use crate::app::{AppState, dto};
use crate::authz;
use crate::context::PrincipalContext;

pub fn router() -> Router {
    Router::new()
        .route("/", get(list_products).post(create_product))
        .route("/new", get(new_product_form))
        .route("/sorting", post(update_sorting))
        .route("/filter", get(filter_form).post(submit_filter))
        .route("/filter/cancel", post(cancel_filter))
        .route("/most-sold", get(most_sold))
        .route("/stats", get(sales_stats))
        .route("/:id", get(product_detail).post(update_product))
        .route("/:id/edit", get(edit_product_form))
        .route("/:id/sales-graph", get(sales_graph))
        .route("/:id/users", get(distribution_users))
}

fn check_access(principal: &PrincipalContext, level: AccessLevel) -> Result<(), Response> {
    authz::require_access(principal, level).map_err(errors::forbidden)
}

fn parse_id(raw: &str) -> Result<ProductId, Response> {
    raw.parse().map_err(|_| errors::invalid_id())
}

fn invalid_body(rejection: JsonRejection) -> Response {
    errors::json_error(StatusCode::BAD_REQUEST, "invalid_body", rejection.body_text())
}

/// GET /admin/products?text=&tags[]=&page=
pub async fn list_products(
    Extension(state): Extension<Arc<AppState>>,
    Extension(principal): Extension<PrincipalContext>,
    RawQuery(raw): RawQuery,
) -> Response {
    if let Err(res) = check_access(&principal, AccessLevel::Read) {
        return res;
    }
    let filter = match dto::ListQuery::parse(raw.as_deref()) {
        Ok(q) => q,
        Err(msg) => return errors::json_error(StatusCode::BAD_REQUEST, "invalid_query", msg),
    };

    let pagination = Pagination::new(filter.page, state.page_size);
    match state
        .repo
        .search_page(filter.text.as_deref(), &filter.tags, pagination)
        .await
    {
        Ok(page) => Json(dto::ProductListResponse { filter, page }).into_response(),
        Err(e) => errors::store_error_to_response(e),
    }
}

/// GET /admin/products/:id
pub async fn product_detail(
    Extension(state): Extension<Arc<AppState>>,
    Extension(principal): Extension<PrincipalContext>,
    Path(id): Path<String>,
) -> Response {
    if let Err(res) = check_access(&principal, AccessLevel::Read) {
        return res;
    }
    let id = match parse_id(&id) {
        Ok(id) => id,
        Err(res) => return res,
    };

    let product = match state.repo.find(id).await {
        Ok(Some(p)) => p,
        Ok(None) => return errors::product_not_found("info"),
        Err(e) => return errors::store_error_to_response(e),
    };

    let mut distributions: Vec<dto::DistributionView> =
        Vec::with_capacity(DistributionMetric::ALL.len());
    for metric in DistributionMetric::ALL {
        match state.repo.distribution(id, metric).await {
            Ok(d) => distributions.push(d.into()),
            Err(e) => return errors::store_error_to_response(e),
        }
    }

    let sold_count = match state.repo.sold_count(id).await {
        Ok(n) => n,
        Err(e) => return errors::store_error_to_response(e),
    };
    let sales_graph = match state.repo.sales_graph(id, Utc::now()).await {
        Ok(points) => points,
        Err(e) => return errors::store_error_to_response(e),
    };

    Json(dto::ProductDetailResponse {
        product,
        sold_count,
        distributions,
        sales_graph,
    })
    .into_response()
}

/// GET /admin/products/:id/sales-graph
pub async fn sales_graph(
    Extension(state): Extension<Arc<AppState>>,
    Extension(principal): Extension<PrincipalContext>,
    Path(id): Path<String>,
) -> Response {
    if let Err(res) = check_access(&principal, AccessLevel::Read) {
        return res;
    }
    let id = match parse_id(&id) {
        Ok(id) => id,
        Err(res) => return res,
    };

    match state.repo.find(id).await {
        Ok(Some(_)) => {}
        Ok(None) => return errors::product_not_found("info"),
        Err(e) => return errors::store_error_to_response(e),
    }

    match state.repo.sales_graph(id, Utc::now()).await {
        Ok(points) => Json(serde_json::json!({
            "product_id": id,
            "points": points,
        }))
        .into_response(),
        Err(e) => errors::store_error_to_response(e),
    }
}

/// GET /admin/products/:id/users?type=&fromLevel=&toLevel=
pub async fn distribution_users(
    Extension(state): Extension<Arc<AppState>>,
    Extension(principal): Extension<PrincipalContext>,
    Path(id): Path<String>,
    Query(query): Query<dto::DrilldownQuery>,
) -> Response {
    if let Err(res) = check_access(&principal, AccessLevel::Read) {
        return res;
    }
    let id = match parse_id(&id) {
        Ok(id) => id,
        Err(res) => return res,
    };

    match state.repo.find(id).await {
        Ok(Some(_)) => {}
        Ok(None) => return errors::product_not_found("danger"),
        Err(e) => return errors::store_error_to_response(e),
    }

    let Some(metric) = query
        .kind
        .as_deref()
        .and_then(DistributionMetric::from_drilldown_type)
    else {
        return errors::redirect(&errors::product_path(id), None);
    };

    let from = query.from_level.unwrap_or(0.0);
    match state
        .repo
        .distribution_list(id, metric, from, query.to_level)
        .await
    {
        Ok(users) => Json(dto::DrilldownResponse {
            product_id: id,
            kind: metric.drilldown_type(),
            from,
            to: query.to_level,
            users,
        })
        .into_response(),
        Err(e) => errors::store_error_to_response(e),
    }
}

/// POST /admin/products/sorting
pub async fn update_sorting(
    Extension(state): Extension<Arc<AppState>>,
    Extension(principal): Extension<PrincipalContext>,
    body: Result<Json<dto::SortingRequest>, JsonRejection>,
) -> Response {
    if let Err(res) = check_access(&principal, AccessLevel::Write) {
        return res;
    }
    let Json(body) = match body {
        Ok(b) => b,
        Err(rejection) => return invalid_body(rejection),
    };

    match state
        .repo
        .update_sorting(body.new_sorting, body.old_sorting)
        .await
    {
        Ok(shifted) => Json(serde_json::json!({
            "new_sorting": body.new_sorting,
            "old_sorting": body.old_sorting,
            "shifted": shifted,
        }))
        .into_response(),
        Err(e) => errors::store_error_to_response(e),
    }
}

/// GET /admin/products/new
pub async fn new_product_form(
    Extension(state): Extension<Arc<AppState>>,
    Extension(principal): Extension<PrincipalContext>,
) -> Response {
    if let Err(res) = check_access(&principal, AccessLevel::Write) {
        return res;
    }
    match state.repo.tags().await {
        Ok(tags) => Json(dto::ProductFormResponse {
            product_id: None,
            form: ProductInput::default(),
            tags,
        })
        .into_response(),
        Err(e) => errors::store_error_to_response(e),
    }
}

/// POST /admin/products
pub async fn create_product(
    Extension(state): Extension<Arc<AppState>>,
    Extension(principal): Extension<PrincipalContext>,
    body: Result<Json<ProductInput>, JsonRejection>,
) -> Response {
    if let Err(res) = check_access(&principal, AccessLevel::Write) {
        return res;
    }
    let Json(input) = match body {
        Ok(b) => b,
        Err(rejection) => return invalid_body(rejection),
    };

    match state.repo.save(None, input).await {
        Ok(saved) => errors::redirect(
            &errors::product_path(saved.product().id),
            Some(Flash::new("success", saved.flash_message())),
        ),
        Err(e) => errors::store_error_to_response(e),
    }
}

/// GET /admin/products/:id/edit
pub async fn edit_product_form(
    Extension(state): Extension<Arc<AppState>>,
    Extension(principal): Extension<PrincipalContext>,
    Path(id): Path<String>,
) -> Response {
    if let Err(res) = check_access(&principal, AccessLevel::Write) {
        return res;
    }
    let id = match parse_id(&id) {
        Ok(id) => id,
        Err(res) => return res,
    };

    let product = match state.repo.find(id).await {
        Ok(Some(p)) => p,
        Ok(None) => return errors::product_not_found("info"),
        Err(e) => return errors::store_error_to_response(e),
    };

    match state.repo.tags().await {
        Ok(tags) => Json(dto::ProductFormResponse {
            product_id: Some(product.id),
            form: ProductInput::from_product(&product),
            tags,
        })
        .into_response(),
        Err(e) => errors::store_error_to_response(e),
    }
}

/// POST /admin/products/:id
pub async fn update_product(
    Extension(state): Extension<Arc<AppState>>,
    Extension(principal): Extension<PrincipalContext>,
    Path(id): Path<String>,
    body: Result<Json<ProductInput>, JsonRejection>,
) -> Response {
    if let Err(res) = check_access(&principal, AccessLevel::Write) {
        return res;
    }
    let id = match parse_id(&id) {
        Ok(id) => id,
        Err(res) => return res,
    };
    let Json(input) = match body {
        Ok(b) => b,
        Err(rejection) => return invalid_body(rejection),
    };

    match state.repo.save(Some(id), input).await {
        Ok(saved) => errors::redirect(
            &errors::product_path(saved.product().id),
            Some(Flash::new("success", saved.flash_message())),
        ),
        Err(StoreError::NotFound) => errors::product_not_found("info"),
        Err(e) => errors::store_error_to_response(e),
    }
}

/// GET /admin/products/filter
pub async fn filter_form(
    Extension(state): Extension<Arc<AppState>>,
    Extension(principal): Extension<PrincipalContext>,
    RawQuery(raw): RawQuery,
) -> Response {
    if let Err(res) = check_access(&principal, AccessLevel::Read) {
        return res;
    }
    let current = match dto::ListQuery::parse(raw.as_deref()) {
        Ok(q) => q,
        Err(msg) => return errors::json_error(StatusCode::BAD_REQUEST, "invalid_query", msg),
    };

    match state.repo.tags().await {
        Ok(tags) => Json(dto::FilterFormResponse {
            text: current.text.unwrap_or_default(),
            tags: current.tags,
            tag_options: tags.into_iter().map(|t| (t.id, t.code)).collect(),
        })
        .into_response(),
        Err(e) => errors::store_error_to_response(e),
    }
}

/// POST /admin/products/filter
pub async fn submit_filter(
    Extension(principal): Extension<PrincipalContext>,
    body: Result<Json<dto::FilterRequest>, JsonRejection>,
) -> Response {
    if let Err(res) = check_access(&principal, AccessLevel::Read) {
        return res;
    }
    let Json(body) = match body {
        Ok(b) => b,
        Err(rejection) => return invalid_body(rejection),
    };

    let filter = dto::ListQuery::from(body);
    errors::redirect(&filter.list_location(), None)
}

/// POST /admin/products/filter/cancel
pub async fn cancel_filter(Extension(principal): Extension<PrincipalContext>) -> Response {
    if let Err(res) = check_access(&principal, AccessLevel::Read) {
        return res;
    }
    errors::redirect(&dto::ListQuery::default().list_location(), None)
}

/// GET /admin/products/most-sold?from=&to=
pub async fn most_sold(
    Extension(state): Extension<Arc<AppState>>,
    Extension(principal): Extension<PrincipalContext>,
    Query(range): Query<dto::SalesRangeQuery>,
) -> Response {
    if let Err(res) = check_access(&principal, AccessLevel::Read) {
        return res;
    }
    match state.repo.most_sold_products(range.from, range.to).await {
        Ok(products) => Json(serde_json::json!({
            "from": range.from,
            "to": range.to,
            "products": products,
        }))
        .into_response(),
        Err(e) => errors::store_error_to_response(e),
    }
}

/// GET /admin/products/stats?from=&to=
pub async fn sales_stats(
    Extension(state): Extension<Arc<AppState>>,
    Extension(principal): Extension<PrincipalContext>,
    Query(range): Query<dto::SalesRangeQuery>,
) -> Response {
    if let Err(res) = check_access(&principal, AccessLevel::Read) {
        return res;
    }
    match state.repo.stats(range.from, range.to).await {
        Ok(stats) => Json(serde_json::json!({
            "from": range.from,
            "to": range.to,
            "stats": stats,
        }))
        .into_response(),
        Err(e) => errors::store_error_to_response(e),
    }
}

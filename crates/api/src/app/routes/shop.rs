//! Read-only shop listings.

use std::sync::Arc;

use axum::{
    Json, Router,
    extract::{Extension, Path, Query},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::get,
};

use shopdesk_core::ProductId;

use crate::app::{AppState, dto, errors};

pub fn router() -> Router {
    Router::new()
        .route("/products", get(list_products))
        .route("/products/:id/related", get(related_products))
}

/// GET /shop/products?tag=&visible_only=&available_only=&order=
pub async fn list_products(
    Extension(state): Extension<Arc<AppState>>,
    Query(query): Query<dto::ShopQuery>,
) -> Response {
    let filter = match query.to_filter() {
        Ok(f) => f,
        Err(msg) => return errors::json_error(StatusCode::BAD_REQUEST, "invalid_query", msg),
    };

    match state.repo.shop_products(&filter).await {
        Ok(products) => Json(serde_json::json!({ "products": products })).into_response(),
        Err(e) => errors::store_error_to_response(e),
    }
}

/// GET /shop/products/:id/related?limit=
pub async fn related_products(
    Extension(state): Extension<Arc<AppState>>,
    Path(id): Path<String>,
    Query(query): Query<dto::RelatedQuery>,
) -> Response {
    let id: ProductId = match id.parse() {
        Ok(v) => v,
        Err(_) => return errors::invalid_id(),
    };

    let product = match state.repo.find(id).await {
        Ok(Some(p)) => p,
        Ok(None) => {
            return errors::json_error(StatusCode::NOT_FOUND, "not_found", "product not found");
        }
        Err(e) => return errors::store_error_to_response(e),
    };

    match state.repo.related_products(&product, query.limit).await {
        Ok(products) => Json(serde_json::json!({
            "product_id": product.id,
            "products": products,
        }))
        .into_response(),
        Err(e) => errors::store_error_to_response(e),
    }
}

use axum::http::{StatusCode, header};
use axum::response::{IntoResponse, Response};
use serde::Serialize;
use serde_json::json;
use tracing::error;

use shopdesk_infra::StoreError;

pub const PRODUCTS_PATH: &str = "/admin/products";

pub fn json_error(status: StatusCode, code: &'static str, message: impl Into<String>) -> Response {
    (
        status,
        axum::Json(json!({
            "error": code,
            "message": message.into(),
        })),
    )
        .into_response()
}

pub fn store_error_to_response(err: StoreError) -> Response {
    match err {
        StoreError::NotFound => json_error(StatusCode::NOT_FOUND, "not_found", "not found"),
        StoreError::Conflict(msg) => json_error(StatusCode::CONFLICT, "conflict", msg),
        StoreError::Validation(msg) => json_error(StatusCode::BAD_REQUEST, "validation_error", msg),
        StoreError::Database(msg) => {
            error!(error = %msg, "catalog store failure");
            json_error(StatusCode::INTERNAL_SERVER_ERROR, "store_error", msg)
        }
    }
}

/// One-shot notice carried by a redirect.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Flash {
    pub level: &'static str,
    pub message: String,
}

impl Flash {
    pub fn new(level: &'static str, message: impl Into<String>) -> Self {
        Self {
            level,
            message: message.into(),
        }
    }
}

/// `303 See Other` to `location`, with the flash in the body.
pub fn redirect(location: &str, flash: Option<Flash>) -> Response {
    (
        StatusCode::SEE_OTHER,
        [(header::LOCATION, location.to_string())],
        axum::Json(json!({
            "redirect": location,
            "flash": flash,
        })),
    )
        .into_response()
}

/// Back to the product list after a lookup on a missing product.
pub fn product_not_found(level: &'static str) -> Response {
    redirect(PRODUCTS_PATH, Some(Flash::new(level, "product not found")))
}

pub fn product_path(id: impl std::fmt::Display) -> String {
    format!("{PRODUCTS_PATH}/{id}")
}

pub fn forbidden(err: impl std::fmt::Display) -> Response {
    json_error(StatusCode::FORBIDDEN, "forbidden", err.to_string())
}

pub fn invalid_id() -> Response {
    json_error(StatusCode::BAD_REQUEST, "invalid_id", "invalid product id")
}

use axum::{Router, routing::get};

pub mod products;
pub mod shop;
pub mod system;

/// Router for all authenticated endpoints.
pub fn router() -> Router {
    Router::new()
        .route("/whoami", get(system::whoami))
        .nest("/admin/products", products::router())
}

//! HTTP API: catalog admin routes, shop listings, auth middleware.

pub mod app;
pub mod authz;
pub mod context;
pub mod middleware;

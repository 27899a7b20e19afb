//! API routes for the PDF Q&A server

pub mod query;

use axum::{extract::DefaultBodyLimit, routing::post, Router};

use crate::server::state::AppState;

/// Build all API routes
pub fn api_routes(max_upload_size: usize) -> Router<AppState> {
    Router::new()
        .route(
            "/process-and-query/",
            post(query::process_and_query).layer(DefaultBodyLimit::max(max_upload_size)),
        )
        .route(
            "/process-and-query",
            post(query::process_and_query).layer(DefaultBodyLimit::max(max_upload_size)),
        )
}

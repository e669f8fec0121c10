use std::sync::Arc;

use axum::{
    extract::{Extension, Query},
    http::StatusCode,
    response::IntoResponse,
    routing::{get, post},
    Json, Router,
};

use crate::app::services::AppServices;
use crate::app::{dto, errors};

pub fn router() -> Router {
    Router::new()
        .route("/", get(list_products))
        .route("/import", post(import_table))
        .route("/batch", post(update_batch))
}

pub async fn import_table(
    Extension(services): Extension<Arc<AppServices>>,
    Json(body): Json<dto::ImportTableRequest>,
) -> axum::response::Response {
    match services.import_table(body.seller_id, &body.table_url).await {
        Ok(report) => (StatusCode::OK, Json(report)).into_response(),
        Err(e) => errors::import_error_to_response(e),
    }
}

pub async fn update_batch(
    Extension(services): Extension<Arc<AppServices>>,
    Json(body): Json<dto::BatchRequest>,
) -> axum::response::Response {
    let (seller_id, candidates) = body.into_candidates();
    match services.update_catalog(seller_id, candidates).await {
        Ok(report) => (StatusCode::OK, Json(report)).into_response(),
        Err(e) => errors::catalog_error_to_response(e),
    }
}

pub async fn list_products(
    Extension(services): Extension<Arc<AppServices>>,
    Query(query): Query<dto::ProductsQuery>,
) -> axum::response::Response {
    let filter = match query.into_filter() {
        Ok(f) => f,
        Err(res) => return res,
    };

    match services.products_by_filter(&filter).await {
        Ok(items) => (StatusCode::OK, Json(items)).into_response(),
        Err(e) => errors::catalog_error_to_response(e),
    }
}

use axum::http::StatusCode;
use axum::response::IntoResponse;
use serde_json::json;

use offerbook_core::{Classify, ErrorKind};
use offerbook_infra::{CatalogError, GatewayError};

use super::services::ImportError;

pub fn status_for(kind: ErrorKind) -> StatusCode {
    match kind {
        ErrorKind::BadInput => StatusCode::BAD_REQUEST,
        ErrorKind::Conflict => StatusCode::CONFLICT,
        ErrorKind::EmptyRequest => StatusCode::UNPROCESSABLE_ENTITY,
        ErrorKind::StorageFailure => StatusCode::INTERNAL_SERVER_ERROR,
    }
}

pub fn catalog_error_to_response(err: CatalogError) -> axum::response::Response {
    let kind = err.kind();
    if kind == ErrorKind::StorageFailure {
        tracing::error!(error = %err, "catalog storage failure");
    }
    json_error(status_for(kind), kind.as_str(), err.to_string())
}

pub fn gateway_error_to_response(err: GatewayError) -> axum::response::Response {
    json_error(StatusCode::BAD_REQUEST, "bad_table_url", err.to_string())
}

pub fn import_error_to_response(err: ImportError) -> axum::response::Response {
    match err {
        ImportError::Download(e) => gateway_error_to_response(e),
        ImportError::Catalog(e) => catalog_error_to_response(e),
    }
}

pub fn json_error(
    status: StatusCode,
    code: &'static str,
    message: impl Into<String>,
) -> axum::response::Response {
    (
        status,
        axum::Json(json!({
            "error": code,
            "message": message.into(),
        })),
    )
        .into_response()
}

#[cfg(test)]
mod tests {
    use super::*;
    use offerbook_infra::StoreError;

    #[test]
    fn every_kind_maps_to_a_distinct_status() {
        assert_eq!(status_for(ErrorKind::BadInput), StatusCode::BAD_REQUEST);
        assert_eq!(status_for(ErrorKind::Conflict), StatusCode::CONFLICT);
        assert_eq!(status_for(ErrorKind::EmptyRequest), StatusCode::UNPROCESSABLE_ENTITY);
        assert_eq!(status_for(ErrorKind::StorageFailure), StatusCode::INTERNAL_SERVER_ERROR);
    }

    #[test]
    fn storage_failures_are_server_errors() {
        let res = catalog_error_to_response(CatalogError::Store(StoreError::TimedOut));
        assert_eq!(res.status(), StatusCode::INTERNAL_SERVER_ERROR);
    }

    #[test]
    fn download_failures_are_bad_requests() {
        let res = import_error_to_response(ImportError::Download(GatewayError::Status(404)));
        assert_eq!(res.status(), StatusCode::BAD_REQUEST);
    }
}

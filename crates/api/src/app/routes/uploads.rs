use std::sync::Arc;

use axum::{
    Json, Router, extract::Extension, http::StatusCode, response::IntoResponse, routing::post,
};
use serde_json::json;

use crate::app::routes::invoices::object_key_for;
use crate::app::services::{AppServices, PRESIGN_TTL};
use crate::app::{dto, errors};

pub fn router() -> Router {
    Router::new().route("/presign", post(presign_upload))
}

pub async fn presign_upload(
    Extension(services): Extension<Arc<AppServices>>,
    Json(body): Json<dto::PresignRequest>,
) -> axum::response::Response {
    let (Some(filename), Some(content_type)) = (body.filename, body.content_type) else {
        return errors::json_error(
            StatusCode::BAD_REQUEST,
            "missing_fields",
            "filename and contentType are required",
        );
    };
    if filename.trim().is_empty() || content_type.trim().is_empty() {
        return errors::json_error(
            StatusCode::BAD_REQUEST,
            "missing_fields",
            "filename and contentType must be non-empty",
        );
    }

    let object_key = object_key_for(&filename);
    let url = match services
        .objects
        .presign_put(&object_key, &content_type, PRESIGN_TTL)
        .await
    {
        Ok(url) => url,
        Err(e) => return errors::internal_error(e),
    };

    (
        StatusCode::OK,
        Json(json!({ "objectKey": object_key, "url": url })),
    )
        .into_response()
}

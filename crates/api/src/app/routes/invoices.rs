use std::sync::Arc;

use axum::{
    Json, Router,
    extract::{Extension, Multipart, Path, Query},
    http::StatusCode,
    response::IntoResponse,
    routing::{get, post, put},
};
use serde::Deserialize;
use serde_json::json;
use uuid::Uuid;

use billscribe_core::{Invoice, InvoiceId, InvoiceItem, InvoiceItemDraft};
use billscribe_infra::{Job, JobKind};

use crate::app::services::{AppServices, PRESIGN_TTL};
use crate::app::{dto, errors};
use crate::context::CurrentUser;

pub fn router() -> Router {
    Router::new()
        .route("/", get(list_invoices).post(create_invoice))
        .route("/create_ai_invoice", post(create_ai_invoice))
        .route(
            "/:id",
            get(get_invoice).put(rename_invoice).delete(delete_invoice),
        )
        .route("/:id/items", put(replace_items))
}

#[derive(Debug, Deserialize)]
pub struct ListParams {
    pub search: Option<String>,
}

pub async fn list_invoices(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(user): Extension<CurrentUser>,
    Query(params): Query<ListParams>,
) -> axum::response::Response {
    let search = params.search.as_deref().filter(|s| !s.trim().is_empty());
    let invoices = match services
        .invoices
        .list_for_user(user.user_id(), search)
        .await
    {
        Ok(invoices) => invoices,
        Err(e) => return errors::internal_error(e),
    };

    let items: Vec<serde_json::Value> = invoices
        .iter()
        .map(|i| {
            json!({
                "id": i.id,
                "name": i.name,
                "status": i.status,
                "created_at": i.created_at,
            })
        })
        .collect();

    (StatusCode::OK, Json(json!({ "items": items }))).into_response()
}

pub async fn create_invoice(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(user): Extension<CurrentUser>,
    Json(body): Json<dto::CreateInvoiceRequest>,
) -> axum::response::Response {
    let (Some(name), Some(audio_key)) = (body.name, body.audio_key) else {
        return errors::json_error(
            StatusCode::BAD_REQUEST,
            "missing_fields",
            "name and audio_key are required",
        );
    };
    if name.trim().is_empty() || audio_key.trim().is_empty() {
        return errors::json_error(
            StatusCode::BAD_REQUEST,
            "missing_fields",
            "name and audio_key must be non-empty",
        );
    }

    insert_and_enqueue(&services, user.user_id(), name, audio_key).await
}

pub async fn create_ai_invoice(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(user): Extension<CurrentUser>,
    mut multipart: Multipart,
) -> axum::response::Response {
    let mut name: Option<String> = None;
    let mut file: Option<(String, String, Vec<u8>)> = None;

    loop {
        let field = match multipart.next_field().await {
            Ok(Some(field)) => field,
            Ok(None) => break,
            Err(e) => return multipart_error(e),
        };

        match field.name() {
            Some("name") => match field.text().await {
                Ok(text) => name = Some(text),
                Err(e) => return multipart_error(e),
            },
            Some("file") => {
                let filename = field
                    .file_name()
                    .unwrap_or("audio.wav")
                    .to_string();
                let content_type = field
                    .content_type()
                    .unwrap_or("application/octet-stream")
                    .to_string();
                match field.bytes().await {
                    Ok(bytes) => file = Some((filename, content_type, bytes.to_vec())),
                    Err(e) => return multipart_error(e),
                }
            }
            _ => {}
        }
    }

    let Some((filename, content_type, bytes)) = file else {
        return errors::json_error(StatusCode::BAD_REQUEST, "missing_fields", "file is required");
    };
    let name = name.filter(|n| !n.trim().is_empty()).unwrap_or_else(|| {
        // Fall back to the uploaded filename without its extension.
        filename
            .rsplit_once('.')
            .map(|(stem, _)| stem.to_string())
            .unwrap_or_else(|| filename.clone())
    });

    let audio_key = object_key_for(&filename);
    if let Err(e) = services.objects.put(&audio_key, &content_type, bytes).await {
        return errors::internal_error(e);
    }

    insert_and_enqueue(&services, user.user_id(), name, audio_key).await
}

async fn insert_and_enqueue(
    services: &AppServices,
    user_id: billscribe_core::UserId,
    name: String,
    audio_key: String,
) -> axum::response::Response {
    let invoice = Invoice::new(user_id, name, audio_key.clone());
    if let Err(e) = services.invoices.insert(&invoice).await {
        return errors::internal_error(e);
    }

    let job = Job::new(
        JobKind::TranscribeAndExtract,
        invoice.id,
        audio_key.clone(),
        json!({ "invoice_id": invoice.id, "audio_key": audio_key }),
    );
    if let Err(e) = services.jobs.enqueue(job).await {
        return errors::internal_error(e);
    }

    (StatusCode::OK, Json(json!({ "id": invoice.id }))).into_response()
}

pub async fn get_invoice(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(user): Extension<CurrentUser>,
    Path(id): Path<String>,
) -> axum::response::Response {
    let Some(invoice_id) = parse_invoice_id(&id) else {
        return not_found();
    };

    let invoice = match services
        .invoices
        .get_owned(invoice_id, user.user_id())
        .await
    {
        Ok(Some(invoice)) => invoice,
        Ok(None) => return not_found(),
        Err(e) => return errors::internal_error(e),
    };

    let items = match services.invoices.list_items(invoice.id).await {
        Ok(items) => items,
        Err(e) => return errors::internal_error(e),
    };

    let audio_url = match services
        .objects
        .presign_get(&invoice.audio_key, PRESIGN_TTL)
        .await
    {
        Ok(url) => url,
        Err(e) => return errors::internal_error(e),
    };

    (
        StatusCode::OK,
        Json(json!({
            "invoice": {
                "id": invoice.id,
                "name": invoice.name,
                "status": invoice.status,
                "transcript": invoice.transcript,
                "audio_key": invoice.audio_key,
                "audio_url": audio_url,
                "created_at": invoice.created_at,
                "updated_at": invoice.updated_at,
            },
            "items": items.iter().map(item_to_json).collect::<Vec<_>>(),
        })),
    )
        .into_response()
}

pub async fn rename_invoice(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(user): Extension<CurrentUser>,
    Path(id): Path<String>,
    Json(body): Json<dto::RenameInvoiceRequest>,
) -> axum::response::Response {
    let Some(invoice_id) = parse_invoice_id(&id) else {
        return not_found();
    };
    if body.name.trim().is_empty() {
        return errors::json_error(StatusCode::BAD_REQUEST, "missing_fields", "name is required");
    }

    match services
        .invoices
        .rename(invoice_id, user.user_id(), &body.name)
        .await
    {
        Ok(true) => (StatusCode::OK, Json(json!({ "ok": true }))).into_response(),
        Ok(false) => not_found(),
        Err(e) => errors::internal_error(e),
    }
}

pub async fn replace_items(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(user): Extension<CurrentUser>,
    Path(id): Path<String>,
    Json(body): Json<dto::ReplaceItemsRequest>,
) -> axum::response::Response {
    let Some(invoice_id) = parse_invoice_id(&id) else {
        return not_found();
    };

    // Ownership gate before touching items.
    match services
        .invoices
        .get_owned(invoice_id, user.user_id())
        .await
    {
        Ok(Some(_)) => {}
        Ok(None) => return not_found(),
        Err(e) => return errors::internal_error(e),
    }

    let drafts: Vec<InvoiceItemDraft> = body
        .items
        .into_iter()
        .map(|i| InvoiceItemDraft {
            item_date: i.item_date,
            description: i.description,
            quantity: i.quantity,
            amount: i.amount,
        })
        .collect();

    match services.invoices.replace_items(invoice_id, &drafts).await {
        Ok(()) => (StatusCode::OK, Json(json!({ "ok": true }))).into_response(),
        Err(e) => errors::internal_error(e),
    }
}

pub async fn delete_invoice(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(user): Extension<CurrentUser>,
    Path(id): Path<String>,
) -> axum::response::Response {
    let Some(invoice_id) = parse_invoice_id(&id) else {
        return not_found();
    };

    let audio_key = match services.invoices.delete(invoice_id, user.user_id()).await {
        Ok(Some(audio_key)) => audio_key,
        Ok(None) => return not_found(),
        Err(e) => return errors::internal_error(e),
    };

    // Best-effort: a dangling object must not fail the delete.
    if let Err(e) = services.objects.delete(&audio_key).await {
        tracing::warn!(error = %e, %audio_key, "audio object cleanup failed");
    }

    (StatusCode::OK, Json(json!({ "ok": true }))).into_response()
}

/// Object keys carry a fresh id plus the original extension.
pub fn object_key_for(filename: &str) -> String {
    let ext = filename
        .rsplit_once('.')
        .map(|(_, ext)| ext)
        .filter(|ext| !ext.is_empty())
        .unwrap_or("bin");
    format!("aiinvoice-{}.{}", Uuid::now_v7(), ext)
}

/// Map a multipart read failure to its own status; an upload past the body
/// limit surfaces here as 413 rather than a generic 400.
fn multipart_error(e: axum::extract::multipart::MultipartError) -> axum::response::Response {
    let status = e.status();
    let code = if status == StatusCode::PAYLOAD_TOO_LARGE {
        "payload_too_large"
    } else {
        "invalid_multipart"
    };
    errors::json_error(status, code, e.to_string())
}

fn item_to_json(item: &InvoiceItem) -> serde_json::Value {
    json!({
        "id": item.id,
        "item_date": item.item_date,
        "description": item.description,
        "quantity": item.quantity,
        "amount": item.amount,
    })
}

fn parse_invoice_id(id: &str) -> Option<InvoiceId> {
    id.parse().ok()
}

/// Absent and not-owned are deliberately indistinguishable.
fn not_found() -> axum::response::Response {
    errors::json_error(StatusCode::NOT_FOUND, "not_found", "invoice not found")
}

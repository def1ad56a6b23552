//! Request DTOs. Fields arriving as `Option` are validated in handlers so
//! missing values produce a 400 rather than an axum deserialize rejection.

use chrono::NaiveDate;
use serde::Deserialize;

#[derive(Debug, Deserialize)]
pub struct LoginRequest {
    pub email: Option<String>,
    pub password: Option<String>,
    #[serde(default, rename = "rememberMe")]
    pub remember_me: bool,
}

#[derive(Debug, Deserialize)]
pub struct CreateInvoiceRequest {
    pub name: Option<String>,
    pub audio_key: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct RenameInvoiceRequest {
    pub name: String,
}

#[derive(Debug, Deserialize)]
pub struct ItemPayload {
    pub item_date: NaiveDate,
    pub description: String,
    pub quantity: f64,
    pub amount: f64,
}

#[derive(Debug, Deserialize)]
pub struct ReplaceItemsRequest {
    pub items: Vec<ItemPayload>,
}

#[derive(Debug, Deserialize)]
pub struct PresignRequest {
    pub filename: Option<String>,
    #[serde(rename = "contentType")]
    pub content_type: Option<String>,
}

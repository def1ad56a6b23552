use std::sync::Arc;

use axum::{
    Json, Router,
    extract::Extension,
    http::{HeaderMap, StatusCode, header::SET_COOKIE},
    response::IntoResponse,
    routing::{get, post},
};
use chrono::Utc;
use serde_json::json;

use billscribe_auth::{
    generate_refresh_token, hash_refresh_token, sign_access_token, verify_password,
    verify_refresh_token,
};
use billscribe_core::{RefreshToken, RefreshTokenId};

use crate::app::cookies::{build_refresh_cookie, clear_refresh_cookie, extract_cookie};
use crate::app::services::AppServices;
use crate::app::{dto, errors};

pub fn router() -> Router {
    Router::new()
        .route("/login", post(login))
        .route("/refresh", post(refresh))
        .route("/logout", post(logout))
        .route("/me", get(me))
}

/// Liveness stub clients poll to see whether the API is reachable.
pub async fn me() -> axum::response::Response {
    (StatusCode::OK, Json(json!({ "ok": true }))).into_response()
}

pub async fn login(
    Extension(services): Extension<Arc<AppServices>>,
    Json(body): Json<dto::LoginRequest>,
) -> axum::response::Response {
    let (Some(email), Some(password)) = (body.email, body.password) else {
        return errors::json_error(
            StatusCode::BAD_REQUEST,
            "missing_fields",
            "email and password are required",
        );
    };

    let user = match services.users.find_by_email(&email).await {
        Ok(user) => user,
        Err(e) => return errors::internal_error(e),
    };
    // Same 401 whether the account is unknown or the password is wrong.
    let Some(user) = user else {
        return errors::json_error(
            StatusCode::UNAUTHORIZED,
            "invalid_credentials",
            "invalid email or password",
        );
    };
    if !verify_password(&password, &user.password_hash) {
        return errors::json_error(
            StatusCode::UNAUTHORIZED,
            "invalid_credentials",
            "invalid email or password",
        );
    }

    let access_token = match sign_access_token(
        &services.auth.jwt_secret,
        user.id,
        &user.email,
        services.auth.access_ttl,
    ) {
        Ok(token) => token,
        Err(e) => return errors::internal_error(e),
    };

    let raw_refresh = generate_refresh_token();
    let token_hash = match hash_refresh_token(&raw_refresh) {
        Ok(hash) => hash,
        Err(e) => return errors::internal_error(e),
    };

    let now = Utc::now();
    let refresh = RefreshToken {
        id: RefreshTokenId::new(),
        user_id: user.id,
        token_hash,
        expires_at: now + services.auth.refresh_ttl,
        remember_me: body.remember_me,
        created_at: now,
        updated_at: now,
    };
    if let Err(e) = services.refresh_tokens.insert(&refresh).await {
        return errors::internal_error(e);
    }

    let max_age = body.remember_me.then_some(services.auth.refresh_ttl);
    let cookie = build_refresh_cookie(&services.auth.cookie, &raw_refresh, max_age);

    (
        StatusCode::OK,
        [(SET_COOKIE, cookie)],
        Json(json!({
            "accessToken": access_token,
            "user": { "id": user.id, "email": user.email },
        })),
    )
        .into_response()
}

pub async fn refresh(
    Extension(services): Extension<Arc<AppServices>>,
    headers: HeaderMap,
) -> axum::response::Response {
    let Some(raw) = extract_cookie(&headers, &services.auth.cookie.name) else {
        return errors::json_error(StatusCode::UNAUTHORIZED, "no_refresh_token", "not signed in");
    };

    let active = match services.refresh_tokens.list_active(Utc::now()).await {
        Ok(rows) => rows,
        Err(e) => return errors::internal_error(e),
    };
    let Some(row) = active
        .into_iter()
        .find(|t| verify_refresh_token(&raw, &t.token_hash))
    else {
        return errors::json_error(
            StatusCode::UNAUTHORIZED,
            "invalid_refresh_token",
            "session expired",
        );
    };

    let user = match services.users.find_by_id(row.user_id).await {
        Ok(Some(user)) => user,
        Ok(None) => {
            return errors::json_error(
                StatusCode::UNAUTHORIZED,
                "invalid_refresh_token",
                "session expired",
            );
        }
        Err(e) => return errors::internal_error(e),
    };

    // Rotate in place: the presented value stops working immediately.
    let new_raw = generate_refresh_token();
    let new_hash = match hash_refresh_token(&new_raw) {
        Ok(hash) => hash,
        Err(e) => return errors::internal_error(e),
    };
    if let Err(e) = services
        .refresh_tokens
        .rotate(row.id, &new_hash, Utc::now() + services.auth.refresh_ttl)
        .await
    {
        return errors::internal_error(e);
    }

    let access_token = match sign_access_token(
        &services.auth.jwt_secret,
        user.id,
        &user.email,
        services.auth.access_ttl,
    ) {
        Ok(token) => token,
        Err(e) => return errors::internal_error(e),
    };

    let max_age = row.remember_me.then_some(services.auth.refresh_ttl);
    let cookie = build_refresh_cookie(&services.auth.cookie, &new_raw, max_age);

    (
        StatusCode::OK,
        [(SET_COOKIE, cookie)],
        Json(json!({
            "accessToken": access_token,
            "user": { "id": user.id, "email": user.email },
        })),
    )
        .into_response()
}

pub async fn logout(
    Extension(services): Extension<Arc<AppServices>>,
    headers: HeaderMap,
) -> axum::response::Response {
    // Best-effort revocation: a stale or missing cookie still logs out.
    if let Some(raw) = extract_cookie(&headers, &services.auth.cookie.name) {
        if let Ok(active) = services.refresh_tokens.list_active(Utc::now()).await {
            if let Some(row) = active
                .into_iter()
                .find(|t| verify_refresh_token(&raw, &t.token_hash))
            {
                if let Err(e) = services.refresh_tokens.delete(row.id).await {
                    tracing::warn!(error = %e, "refresh token revocation failed");
                }
            }
        }
    }

    (
        StatusCode::OK,
        [(SET_COOKIE, clear_refresh_cookie(&services.auth.cookie))],
        Json(json!({ "ok": true })),
    )
        .into_response()
}

use std::collections::HashMap;
use std::sync::Mutex;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::{FromRow, PgPool};
use uuid::Uuid;

use billscribe_core::{RefreshToken, RefreshTokenId, UserId};

use super::RepoError;

#[async_trait]
pub trait RefreshTokenRepo: Send + Sync {
    async fn insert(&self, token: &RefreshToken) -> Result<(), RepoError>;

    /// All non-expired tokens as of `now`, newest first. The caller matches
    /// the presented secret against each stored hash; only the hash ever
    /// touches storage.
    async fn list_active(&self, now: DateTime<Utc>) -> Result<Vec<RefreshToken>, RepoError>;

    /// Rotation in place: the matched row gets a new hash and expiry so the
    /// previous secret stops working the moment the new one is issued.
    async fn rotate(
        &self,
        id: RefreshTokenId,
        new_hash: &str,
        new_expires_at: DateTime<Utc>,
    ) -> Result<(), RepoError>;

    async fn delete(&self, id: RefreshTokenId) -> Result<(), RepoError>;
}

// ---------------------------------------------------------------------------
// In-memory
// ---------------------------------------------------------------------------

#[derive(Debug, Default)]
pub struct InMemoryRefreshTokenRepo {
    tokens: Mutex<HashMap<RefreshTokenId, RefreshToken>>,
}

impl InMemoryRefreshTokenRepo {
    pub fn new() -> Self {
        Self::default()
    }

    /// Every stored row, expired ones included. Test helper.
    pub fn all(&self) -> Vec<RefreshToken> {
        self.tokens.lock().unwrap().values().cloned().collect()
    }
}

#[async_trait]
impl RefreshTokenRepo for InMemoryRefreshTokenRepo {
    async fn insert(&self, token: &RefreshToken) -> Result<(), RepoError> {
        self.tokens.lock().unwrap().insert(token.id, token.clone());
        Ok(())
    }

    async fn list_active(&self, now: DateTime<Utc>) -> Result<Vec<RefreshToken>, RepoError> {
        let tokens = self.tokens.lock().unwrap();
        let mut active: Vec<RefreshToken> = tokens
            .values()
            .filter(|t| t.expires_at > now)
            .cloned()
            .collect();
        active.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(active)
    }

    async fn rotate(
        &self,
        id: RefreshTokenId,
        new_hash: &str,
        new_expires_at: DateTime<Utc>,
    ) -> Result<(), RepoError> {
        let mut tokens = self.tokens.lock().unwrap();
        let token = tokens.get_mut(&id).ok_or(RepoError::NotFound)?;
        token.token_hash = new_hash.to_string();
        token.expires_at = new_expires_at;
        token.updated_at = Utc::now();
        Ok(())
    }

    async fn delete(&self, id: RefreshTokenId) -> Result<(), RepoError> {
        self.tokens
            .lock()
            .unwrap()
            .remove(&id)
            .map(|_| ())
            .ok_or(RepoError::NotFound)
    }
}

// ---------------------------------------------------------------------------
// Postgres
// ---------------------------------------------------------------------------

#[derive(Debug, FromRow)]
struct RefreshTokenRow {
    id: Uuid,
    user_id: Uuid,
    token_hash: String,
    expires_at: DateTime<Utc>,
    remember_me: bool,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl From<RefreshTokenRow> for RefreshToken {
    fn from(row: RefreshTokenRow) -> Self {
        RefreshToken {
            id: RefreshTokenId::from_uuid(row.id),
            user_id: UserId::from_uuid(row.user_id),
            token_hash: row.token_hash,
            expires_at: row.expires_at,
            remember_me: row.remember_me,
            created_at: row.created_at,
            updated_at: row.updated_at,
        }
    }
}

#[derive(Debug, Clone)]
pub struct PostgresRefreshTokenRepo {
    pool: PgPool,
}

impl PostgresRefreshTokenRepo {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl RefreshTokenRepo for PostgresRefreshTokenRepo {
    async fn insert(&self, token: &RefreshToken) -> Result<(), RepoError> {
        sqlx::query(
            "INSERT INTO refresh_tokens (id, user_id, token_hash, expires_at, remember_me, created_at, updated_at) \
             VALUES ($1, $2, $3, $4, $5, $6, $7)",
        )
        .bind(token.id.as_uuid())
        .bind(token.user_id.as_uuid())
        .bind(&token.token_hash)
        .bind(token.expires_at)
        .bind(token.remember_me)
        .bind(token.created_at)
        .bind(token.updated_at)
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    async fn list_active(&self, now: DateTime<Utc>) -> Result<Vec<RefreshToken>, RepoError> {
        let rows = sqlx::query_as::<_, RefreshTokenRow>(
            "SELECT id, user_id, token_hash, expires_at, remember_me, created_at, updated_at \
             FROM refresh_tokens WHERE expires_at > $1 ORDER BY created_at DESC",
        )
        .bind(now)
        .fetch_all(&self.pool)
        .await?;

        Ok(rows.into_iter().map(RefreshToken::from).collect())
    }

    async fn rotate(
        &self,
        id: RefreshTokenId,
        new_hash: &str,
        new_expires_at: DateTime<Utc>,
    ) -> Result<(), RepoError> {
        let result = sqlx::query(
            "UPDATE refresh_tokens SET token_hash = $2, expires_at = $3, updated_at = now() \
             WHERE id = $1",
        )
        .bind(id.as_uuid())
        .bind(new_hash)
        .bind(new_expires_at)
        .execute(&self.pool)
        .await?;

        if result.rows_affected() == 0 {
            return Err(RepoError::NotFound);
        }
        Ok(())
    }

    async fn delete(&self, id: RefreshTokenId) -> Result<(), RepoError> {
        let result = sqlx::query("DELETE FROM refresh_tokens WHERE id = $1")
            .bind(id.as_uuid())
            .execute(&self.pool)
            .await?;

        if result.rows_affected() == 0 {
            return Err(RepoError::NotFound);
        }
        Ok(())
    }
}

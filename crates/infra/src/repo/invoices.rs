use std::collections::HashMap;
use std::str::FromStr;
use std::sync::Mutex;

use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, Utc};
use sqlx::{FromRow, PgPool, Postgres, Transaction};
use uuid::Uuid;

use billscribe_core::{
    Invoice, InvoiceId, InvoiceItem, InvoiceItemDraft, InvoiceItemId, InvoiceStatus, UserId,
};

use super::RepoError;

#[async_trait]
pub trait InvoiceRepo: Send + Sync {
    async fn insert(&self, invoice: &Invoice) -> Result<(), RepoError>;

    /// Invoices owned by `user_id`, newest first, optionally filtered by a
    /// case-insensitive substring match on the name.
    async fn list_for_user(
        &self,
        user_id: UserId,
        search: Option<&str>,
    ) -> Result<Vec<Invoice>, RepoError>;

    /// Owner-scoped lookup; `None` hides both "absent" and "not yours".
    async fn get_owned(
        &self,
        id: InvoiceId,
        user_id: UserId,
    ) -> Result<Option<Invoice>, RepoError>;

    /// Owner-agnostic lookup (worker path).
    async fn get(&self, id: InvoiceId) -> Result<Option<Invoice>, RepoError>;

    /// Rename an owned invoice. Returns false when no owned row matched.
    async fn rename(&self, id: InvoiceId, user_id: UserId, name: &str) -> Result<bool, RepoError>;

    /// Delete an owned invoice and its items. Returns the audio key of the
    /// deleted invoice so the caller can clean up the stored object.
    async fn delete(&self, id: InvoiceId, user_id: UserId) -> Result<Option<String>, RepoError>;

    async fn set_status(&self, id: InvoiceId, status: InvoiceStatus) -> Result<(), RepoError>;

    /// Items for an invoice, ordered by item date then id.
    async fn list_items(&self, invoice_id: InvoiceId) -> Result<Vec<InvoiceItem>, RepoError>;

    /// Wholesale replace: delete all current items, insert the given set.
    /// Both steps run in a single transaction so no empty-item window is
    /// ever observable.
    async fn replace_items(
        &self,
        invoice_id: InvoiceId,
        items: &[InvoiceItemDraft],
    ) -> Result<(), RepoError>;

    /// Terminal step of the transcription task: replace items, store the
    /// transcript, and mark the invoice ready, all in one transaction.
    async fn finalize_transcription(
        &self,
        invoice_id: InvoiceId,
        transcript: &str,
        items: &[InvoiceItemDraft],
    ) -> Result<(), RepoError>;
}

// ---------------------------------------------------------------------------
// In-memory
// ---------------------------------------------------------------------------

#[derive(Debug, Default)]
struct InMemoryInner {
    invoices: HashMap<InvoiceId, Invoice>,
    items: HashMap<InvoiceId, Vec<InvoiceItem>>,
}

#[derive(Debug, Default)]
pub struct InMemoryInvoiceRepo {
    inner: Mutex<InMemoryInner>,
}

impl InMemoryInvoiceRepo {
    pub fn new() -> Self {
        Self::default()
    }
}

fn drafts_to_items(invoice_id: InvoiceId, drafts: &[InvoiceItemDraft]) -> Vec<InvoiceItem> {
    drafts
        .iter()
        .map(|d| InvoiceItem {
            id: InvoiceItemId::new(),
            invoice_id,
            item_date: d.item_date,
            description: d.description.clone(),
            quantity: d.quantity,
            amount: d.amount,
        })
        .collect()
}

#[async_trait]
impl InvoiceRepo for InMemoryInvoiceRepo {
    async fn insert(&self, invoice: &Invoice) -> Result<(), RepoError> {
        let mut inner = self.inner.lock().unwrap();
        inner.invoices.insert(invoice.id, invoice.clone());
        Ok(())
    }

    async fn list_for_user(
        &self,
        user_id: UserId,
        search: Option<&str>,
    ) -> Result<Vec<Invoice>, RepoError> {
        let inner = self.inner.lock().unwrap();
        let needle = search.map(str::to_lowercase);
        let mut invoices: Vec<Invoice> = inner
            .invoices
            .values()
            .filter(|i| i.user_id == user_id)
            .filter(|i| match &needle {
                Some(n) => i.name.to_lowercase().contains(n),
                None => true,
            })
            .cloned()
            .collect();
        invoices.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(invoices)
    }

    async fn get_owned(
        &self,
        id: InvoiceId,
        user_id: UserId,
    ) -> Result<Option<Invoice>, RepoError> {
        let inner = self.inner.lock().unwrap();
        Ok(inner
            .invoices
            .get(&id)
            .filter(|i| i.user_id == user_id)
            .cloned())
    }

    async fn get(&self, id: InvoiceId) -> Result<Option<Invoice>, RepoError> {
        Ok(self.inner.lock().unwrap().invoices.get(&id).cloned())
    }

    async fn rename(&self, id: InvoiceId, user_id: UserId, name: &str) -> Result<bool, RepoError> {
        let mut inner = self.inner.lock().unwrap();
        match inner.invoices.get_mut(&id) {
            Some(invoice) if invoice.user_id == user_id => {
                invoice.name = name.to_string();
                invoice.updated_at = Utc::now();
                Ok(true)
            }
            _ => Ok(false),
        }
    }

    async fn delete(&self, id: InvoiceId, user_id: UserId) -> Result<Option<String>, RepoError> {
        let mut inner = self.inner.lock().unwrap();
        let owned = inner
            .invoices
            .get(&id)
            .is_some_and(|i| i.user_id == user_id);
        if !owned {
            return Ok(None);
        }
        inner.items.remove(&id);
        Ok(inner.invoices.remove(&id).map(|i| i.audio_key))
    }

    async fn set_status(&self, id: InvoiceId, status: InvoiceStatus) -> Result<(), RepoError> {
        let mut inner = self.inner.lock().unwrap();
        let invoice = inner.invoices.get_mut(&id).ok_or(RepoError::NotFound)?;
        invoice.status = status;
        invoice.updated_at = Utc::now();
        Ok(())
    }

    async fn list_items(&self, invoice_id: InvoiceId) -> Result<Vec<InvoiceItem>, RepoError> {
        let inner = self.inner.lock().unwrap();
        let mut items = inner.items.get(&invoice_id).cloned().unwrap_or_default();
        items.sort_by(|a, b| (a.item_date, a.id.as_uuid()).cmp(&(b.item_date, b.id.as_uuid())));
        Ok(items)
    }

    async fn replace_items(
        &self,
        invoice_id: InvoiceId,
        items: &[InvoiceItemDraft],
    ) -> Result<(), RepoError> {
        let mut inner = self.inner.lock().unwrap();
        if !inner.invoices.contains_key(&invoice_id) {
            return Err(RepoError::NotFound);
        }
        inner
            .items
            .insert(invoice_id, drafts_to_items(invoice_id, items));
        if let Some(invoice) = inner.invoices.get_mut(&invoice_id) {
            invoice.updated_at = Utc::now();
        }
        Ok(())
    }

    async fn finalize_transcription(
        &self,
        invoice_id: InvoiceId,
        transcript: &str,
        items: &[InvoiceItemDraft],
    ) -> Result<(), RepoError> {
        let mut inner = self.inner.lock().unwrap();
        if !inner.invoices.contains_key(&invoice_id) {
            return Err(RepoError::NotFound);
        }
        inner
            .items
            .insert(invoice_id, drafts_to_items(invoice_id, items));
        let invoice = inner
            .invoices
            .get_mut(&invoice_id)
            .ok_or(RepoError::NotFound)?;
        invoice.transcript = Some(transcript.to_string());
        invoice.status = InvoiceStatus::Ready;
        invoice.updated_at = Utc::now();
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Postgres
// ---------------------------------------------------------------------------

#[derive(Debug, FromRow)]
struct InvoiceRow {
    id: Uuid,
    user_id: Uuid,
    name: String,
    audio_key: String,
    status: String,
    transcript: Option<String>,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl TryFrom<InvoiceRow> for Invoice {
    type Error = RepoError;

    fn try_from(row: InvoiceRow) -> Result<Self, Self::Error> {
        Ok(Invoice {
            id: InvoiceId::from_uuid(row.id),
            user_id: UserId::from_uuid(row.user_id),
            name: row.name,
            audio_key: row.audio_key,
            status: InvoiceStatus::from_str(&row.status).map_err(RepoError::Storage)?,
            transcript: row.transcript,
            created_at: row.created_at,
            updated_at: row.updated_at,
        })
    }
}

#[derive(Debug, FromRow)]
struct InvoiceItemRow {
    id: Uuid,
    invoice_id: Uuid,
    item_date: NaiveDate,
    description: String,
    quantity: f64,
    amount: f64,
}

impl From<InvoiceItemRow> for InvoiceItem {
    fn from(row: InvoiceItemRow) -> Self {
        InvoiceItem {
            id: InvoiceItemId::from_uuid(row.id),
            invoice_id: InvoiceId::from_uuid(row.invoice_id),
            item_date: row.item_date,
            description: row.description,
            quantity: row.quantity,
            amount: row.amount,
        }
    }
}

#[derive(Debug, Clone)]
pub struct PostgresInvoiceRepo {
    pool: PgPool,
}

impl PostgresInvoiceRepo {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    async fn replace_items_in_tx(
        tx: &mut Transaction<'_, Postgres>,
        invoice_id: InvoiceId,
        items: &[InvoiceItemDraft],
    ) -> Result<(), RepoError> {
        sqlx::query("DELETE FROM invoice_items WHERE invoice_id = $1")
            .bind(invoice_id.as_uuid())
            .execute(&mut **tx)
            .await?;

        for item in items {
            sqlx::query(
                "INSERT INTO invoice_items (id, invoice_id, item_date, description, quantity, amount) \
                 VALUES ($1, $2, $3, $4, $5, $6)",
            )
            .bind(InvoiceItemId::new().as_uuid())
            .bind(invoice_id.as_uuid())
            .bind(item.item_date)
            .bind(&item.description)
            .bind(item.quantity)
            .bind(item.amount)
            .execute(&mut **tx)
            .await?;
        }

        Ok(())
    }
}

#[async_trait]
impl InvoiceRepo for PostgresInvoiceRepo {
    async fn insert(&self, invoice: &Invoice) -> Result<(), RepoError> {
        sqlx::query(
            "INSERT INTO invoices (id, user_id, name, audio_key, status, transcript, created_at, updated_at) \
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8)",
        )
        .bind(invoice.id.as_uuid())
        .bind(invoice.user_id.as_uuid())
        .bind(&invoice.name)
        .bind(&invoice.audio_key)
        .bind(invoice.status.as_str())
        .bind(&invoice.transcript)
        .bind(invoice.created_at)
        .bind(invoice.updated_at)
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    async fn list_for_user(
        &self,
        user_id: UserId,
        search: Option<&str>,
    ) -> Result<Vec<Invoice>, RepoError> {
        let rows = match search {
            Some(needle) => {
                sqlx::query_as::<_, InvoiceRow>(
                    "SELECT id, user_id, name, audio_key, status, transcript, created_at, updated_at \
                     FROM invoices WHERE user_id = $1 AND name ILIKE '%' || $2 || '%' \
                     ORDER BY created_at DESC",
                )
                .bind(user_id.as_uuid())
                .bind(needle)
                .fetch_all(&self.pool)
                .await?
            }
            None => {
                sqlx::query_as::<_, InvoiceRow>(
                    "SELECT id, user_id, name, audio_key, status, transcript, created_at, updated_at \
                     FROM invoices WHERE user_id = $1 ORDER BY created_at DESC",
                )
                .bind(user_id.as_uuid())
                .fetch_all(&self.pool)
                .await?
            }
        };

        rows.into_iter().map(Invoice::try_from).collect()
    }

    async fn get_owned(
        &self,
        id: InvoiceId,
        user_id: UserId,
    ) -> Result<Option<Invoice>, RepoError> {
        let row = sqlx::query_as::<_, InvoiceRow>(
            "SELECT id, user_id, name, audio_key, status, transcript, created_at, updated_at \
             FROM invoices WHERE id = $1 AND user_id = $2",
        )
        .bind(id.as_uuid())
        .bind(user_id.as_uuid())
        .fetch_optional(&self.pool)
        .await?;

        row.map(Invoice::try_from).transpose()
    }

    async fn get(&self, id: InvoiceId) -> Result<Option<Invoice>, RepoError> {
        let row = sqlx::query_as::<_, InvoiceRow>(
            "SELECT id, user_id, name, audio_key, status, transcript, created_at, updated_at \
             FROM invoices WHERE id = $1",
        )
        .bind(id.as_uuid())
        .fetch_optional(&self.pool)
        .await?;

        row.map(Invoice::try_from).transpose()
    }

    async fn rename(&self, id: InvoiceId, user_id: UserId, name: &str) -> Result<bool, RepoError> {
        let result = sqlx::query(
            "UPDATE invoices SET name = $3, updated_at = now() WHERE id = $1 AND user_id = $2",
        )
        .bind(id.as_uuid())
        .bind(user_id.as_uuid())
        .bind(name)
        .execute(&self.pool)
        .await?;

        Ok(result.rows_affected() > 0)
    }

    async fn delete(&self, id: InvoiceId, user_id: UserId) -> Result<Option<String>, RepoError> {
        // Items go via ON DELETE CASCADE.
        let row = sqlx::query(
            "DELETE FROM invoices WHERE id = $1 AND user_id = $2 RETURNING audio_key",
        )
        .bind(id.as_uuid())
        .bind(user_id.as_uuid())
        .fetch_optional(&self.pool)
        .await?;

        Ok(row.map(|r| sqlx::Row::get(&r, "audio_key")))
    }

    async fn set_status(&self, id: InvoiceId, status: InvoiceStatus) -> Result<(), RepoError> {
        let result =
            sqlx::query("UPDATE invoices SET status = $2, updated_at = now() WHERE id = $1")
                .bind(id.as_uuid())
                .bind(status.as_str())
                .execute(&self.pool)
                .await?;

        if result.rows_affected() == 0 {
            return Err(RepoError::NotFound);
        }
        Ok(())
    }

    async fn list_items(&self, invoice_id: InvoiceId) -> Result<Vec<InvoiceItem>, RepoError> {
        let rows = sqlx::query_as::<_, InvoiceItemRow>(
            "SELECT id, invoice_id, item_date, description, quantity, amount \
             FROM invoice_items WHERE invoice_id = $1 ORDER BY item_date ASC, id ASC",
        )
        .bind(invoice_id.as_uuid())
        .fetch_all(&self.pool)
        .await?;

        Ok(rows.into_iter().map(InvoiceItem::from).collect())
    }

    async fn replace_items(
        &self,
        invoice_id: InvoiceId,
        items: &[InvoiceItemDraft],
    ) -> Result<(), RepoError> {
        let mut tx = self.pool.begin().await?;

        Self::replace_items_in_tx(&mut tx, invoice_id, items).await?;
        sqlx::query("UPDATE invoices SET updated_at = now() WHERE id = $1")
            .bind(invoice_id.as_uuid())
            .execute(&mut *tx)
            .await?;

        tx.commit().await?;
        Ok(())
    }

    async fn finalize_transcription(
        &self,
        invoice_id: InvoiceId,
        transcript: &str,
        items: &[InvoiceItemDraft],
    ) -> Result<(), RepoError> {
        let mut tx = self.pool.begin().await?;

        Self::replace_items_in_tx(&mut tx, invoice_id, items).await?;
        sqlx::query(
            "UPDATE invoices SET transcript = $2, status = 'ready', updated_at = now() \
             WHERE id = $1",
        )
        .bind(invoice_id.as_uuid())
        .bind(transcript)
        .execute(&mut *tx)
        .await?;

        tx.commit().await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn draft(description: &str, amount: f64) -> InvoiceItemDraft {
        InvoiceItemDraft {
            item_date: NaiveDate::from_ymd_opt(2024, 1, 1).unwrap(),
            description: description.to_string(),
            quantity: 1.0,
            amount,
        }
    }

    #[tokio::test]
    async fn list_is_owner_scoped_and_search_filtered() {
        let repo = InMemoryInvoiceRepo::new();
        let owner = UserId::new();
        let other = UserId::new();

        repo.insert(&Invoice::new(owner, "March retainer", "a.wav"))
            .await
            .unwrap();
        repo.insert(&Invoice::new(owner, "April audit", "b.wav"))
            .await
            .unwrap();
        repo.insert(&Invoice::new(other, "March retainer", "c.wav"))
            .await
            .unwrap();

        assert_eq!(repo.list_for_user(owner, None).await.unwrap().len(), 2);
        let hits = repo.list_for_user(owner, Some("march")).await.unwrap();
        assert_eq!(hits.len(), 1);
        assert_eq!(hits[0].name, "March retainer");
    }

    #[tokio::test]
    async fn get_owned_hides_other_users_invoices() {
        let repo = InMemoryInvoiceRepo::new();
        let owner = UserId::new();
        let invoice = Invoice::new(owner, "x", "x.wav");
        repo.insert(&invoice).await.unwrap();

        assert!(repo.get_owned(invoice.id, owner).await.unwrap().is_some());
        assert!(
            repo.get_owned(invoice.id, UserId::new())
                .await
                .unwrap()
                .is_none()
        );
    }

    #[tokio::test]
    async fn replace_with_empty_list_clears_items() {
        let repo = InMemoryInvoiceRepo::new();
        let invoice = Invoice::new(UserId::new(), "x", "x.wav");
        repo.insert(&invoice).await.unwrap();

        repo.replace_items(invoice.id, &[draft("Consulting", 150.0)])
            .await
            .unwrap();
        assert_eq!(repo.list_items(invoice.id).await.unwrap().len(), 1);

        repo.replace_items(invoice.id, &[]).await.unwrap();
        assert!(repo.list_items(invoice.id).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn finalize_sets_transcript_status_and_items_together() {
        let repo = InMemoryInvoiceRepo::new();
        let invoice = Invoice::new(UserId::new(), "x", "x.wav");
        repo.insert(&invoice).await.unwrap();

        repo.finalize_transcription(invoice.id, "meeting notes", &[draft("Consulting", 150.0)])
            .await
            .unwrap();

        let stored = repo.get(invoice.id).await.unwrap().unwrap();
        assert_eq!(stored.status, InvoiceStatus::Ready);
        assert_eq!(stored.transcript.as_deref(), Some("meeting notes"));
        assert_eq!(repo.list_items(invoice.id).await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn delete_returns_audio_key_only_for_owner() {
        let repo = InMemoryInvoiceRepo::new();
        let owner = UserId::new();
        let invoice = Invoice::new(owner, "x", "audio-key.wav");
        repo.insert(&invoice).await.unwrap();

        assert!(
            repo.delete(invoice.id, UserId::new())
                .await
                .unwrap()
                .is_none()
        );
        assert_eq!(
            repo.delete(invoice.id, owner).await.unwrap().as_deref(),
            Some("audio-key.wav")
        );
        assert!(repo.get(invoice.id).await.unwrap().is_none());
    }
}

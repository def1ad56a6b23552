use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::{info, warn};

use billscribe_ai::{AiError, ItemExtractor, Transcriber};
use billscribe_core::{InvoiceItemDraft, InvoiceStatus};

use crate::jobs::{Job, JobKind, JobStore};
use crate::object_store::ObjectStore;
use crate::repo::InvoiceRepo;

const DEFAULT_AUDIO_FILENAME: &str = "audio.wav";

/// Handle to control and join a background worker.
#[derive(Debug)]
pub struct WorkerHandle {
    shutdown: watch::Sender<bool>,
    join: Option<JoinHandle<()>>,
}

impl WorkerHandle {
    /// Request graceful shutdown and wait for the worker to stop.
    pub async fn shutdown(mut self) {
        let _ = self.shutdown.send(true);
        if let Some(join) = self.join.take() {
            let _ = join.await;
        }
    }
}

/// Everything the worker touches, behind trait objects so tests can swap
/// each piece independently.
#[derive(Clone)]
pub struct WorkerDeps {
    pub jobs: Arc<dyn JobStore>,
    pub invoices: Arc<dyn InvoiceRepo>,
    pub objects: Arc<dyn ObjectStore>,
    pub transcriber: Arc<dyn Transcriber>,
    pub extractor: Arc<dyn ItemExtractor>,
}

#[derive(Debug, Clone)]
pub struct WorkerConfig {
    /// Sleep between polls when the queue came back empty.
    pub poll_interval: Duration,
    /// Deadline applied to each external call (download, transcription,
    /// extraction) individually.
    pub call_timeout: Duration,
}

impl Default for WorkerConfig {
    fn default() -> Self {
        Self {
            poll_interval: Duration::from_secs(2),
            call_timeout: Duration::from_secs(120),
        }
    }
}

/// Polling consumer of the job queue.
///
/// Each claimed job runs the full pipeline: download the audio, transcribe
/// it, extract line items, and finalize the invoice. Any error fails the
/// job with its message; the job row stays queryable for a manual retry.
pub struct TranscriptionWorker {
    deps: WorkerDeps,
    config: WorkerConfig,
}

impl TranscriptionWorker {
    pub fn new(deps: WorkerDeps, config: WorkerConfig) -> Self {
        Self { deps, config }
    }

    /// Spawn the polling loop on the current runtime.
    pub fn spawn(self) -> WorkerHandle {
        let (shutdown_tx, mut shutdown_rx) = watch::channel(false);

        let join = tokio::spawn(async move {
            info!(
                poll_interval_ms = self.config.poll_interval.as_millis() as u64,
                "transcription worker started"
            );
            loop {
                if *shutdown_rx.borrow() {
                    break;
                }

                let processed = match self.process_once().await {
                    Ok(processed) => processed,
                    Err(err) => {
                        warn!(error = %err, "job poll failed");
                        false
                    }
                };

                // Drain the queue back-to-back; sleep only when it is empty.
                if processed {
                    continue;
                }

                tokio::select! {
                    _ = tokio::time::sleep(self.config.poll_interval) => {}
                    _ = shutdown_rx.changed() => break,
                }
            }
            info!("transcription worker stopped");
        });

        WorkerHandle {
            shutdown: shutdown_tx,
            join: Some(join),
        }
    }

    /// Claim and run at most one job. Returns whether a job was claimed.
    ///
    /// Exposed so tests can drive the pipeline deterministically without
    /// the polling loop.
    pub async fn process_once(&self) -> Result<bool, anyhow::Error> {
        let Some(job) = self.deps.jobs.claim_next().await? else {
            return Ok(false);
        };

        match self.execute(&job).await {
            Ok(()) => {
                self.deps.jobs.complete(job.id).await?;
                info!(job_id = %job.id, invoice_id = %job.invoice_id, "job completed");
            }
            Err(err) => {
                let message = err.to_string();
                self.deps.jobs.fail(job.id, &message).await?;
                warn!(job_id = %job.id, invoice_id = %job.invoice_id, error = %message, "job failed");
            }
        }

        Ok(true)
    }

    async fn execute(&self, job: &Job) -> Result<(), anyhow::Error> {
        match job.kind {
            JobKind::TranscribeAndExtract => self.transcribe_and_extract(job).await,
        }
    }

    async fn transcribe_and_extract(&self, job: &Job) -> Result<(), anyhow::Error> {
        let Some(invoice) = self.deps.invoices.get(job.invoice_id).await? else {
            // The invoice was deleted while the job sat in the queue;
            // nothing left to do.
            warn!(job_id = %job.id, invoice_id = %job.invoice_id, "invoice gone, skipping");
            return Ok(());
        };

        self.deps
            .invoices
            .set_status(invoice.id, InvoiceStatus::Processing)
            .await?;

        let audio = self
            .bounded(self.deps.objects.get(&invoice.audio_key))
            .await??;

        let filename = invoice
            .audio_key
            .rsplit('/')
            .next()
            .filter(|name| !name.is_empty())
            .unwrap_or(DEFAULT_AUDIO_FILENAME);
        let transcript = self
            .bounded(self.deps.transcriber.transcribe(&audio, filename))
            .await??;

        let fallback_date = invoice.created_at.date_naive();
        let extracted = self
            .bounded(self.deps.extractor.extract_items(&transcript, fallback_date))
            .await??;

        let drafts: Vec<InvoiceItemDraft> = extracted
            .into_iter()
            .map(|item| InvoiceItemDraft {
                item_date: item.item_date,
                description: item.description,
                quantity: item.quantity,
                amount: item.amount,
            })
            .collect();

        self.deps
            .invoices
            .finalize_transcription(invoice.id, &transcript, &drafts)
            .await?;

        Ok(())
    }

    async fn bounded<F, T>(&self, fut: F) -> Result<T, AiError>
    where
        F: Future<Output = T>,
    {
        tokio::time::timeout(self.config.call_timeout, fut)
            .await
            .map_err(|_| AiError::Timeout(self.config.call_timeout.as_secs()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use async_trait::async_trait;
    use chrono::NaiveDate;

    use billscribe_ai::ExtractedItem;
    use billscribe_core::{Invoice, UserId};

    use crate::jobs::{InMemoryJobStore, JobState};
    use crate::object_store::InMemoryObjectStore;
    use crate::repo::{InMemoryInvoiceRepo, InvoiceRepo};

    struct FixedTranscriber(Result<String, String>);

    #[async_trait]
    impl Transcriber for FixedTranscriber {
        async fn transcribe(&self, _audio: &[u8], _filename: &str) -> Result<String, AiError> {
            self.0.clone().map_err(AiError::Transcription)
        }
    }

    struct FixedExtractor(Vec<ExtractedItem>);

    #[async_trait]
    impl ItemExtractor for FixedExtractor {
        async fn extract_items(
            &self,
            _transcript: &str,
            _fallback_date: NaiveDate,
        ) -> Result<Vec<ExtractedItem>, AiError> {
            Ok(self.0.clone())
        }
    }

    fn worker(
        jobs: Arc<InMemoryJobStore>,
        invoices: Arc<InMemoryInvoiceRepo>,
        objects: Arc<InMemoryObjectStore>,
        transcriber: Arc<dyn Transcriber>,
        extractor: Arc<dyn ItemExtractor>,
    ) -> TranscriptionWorker {
        TranscriptionWorker::new(
            WorkerDeps {
                jobs,
                invoices,
                objects,
                transcriber,
                extractor,
            },
            WorkerConfig::default(),
        )
    }

    async fn seed_invoice_and_job(
        jobs: &InMemoryJobStore,
        invoices: &InMemoryInvoiceRepo,
        objects: &InMemoryObjectStore,
    ) -> (Invoice, crate::jobs::JobId) {
        let invoice = Invoice::new(UserId::new(), "March retainer", "uploads/audio-1.wav");
        invoices.insert(&invoice).await.unwrap();
        objects
            .put(&invoice.audio_key, "audio/wav", vec![0u8; 16])
            .await
            .unwrap();
        let job = Job::new(
            JobKind::TranscribeAndExtract,
            invoice.id,
            invoice.audio_key.clone(),
            serde_json::json!({}),
        );
        let job_id = job.id;
        jobs.enqueue(job).await.unwrap();
        (invoice, job_id)
    }

    #[tokio::test]
    async fn successful_job_finalizes_invoice_and_completes() {
        let jobs = Arc::new(InMemoryJobStore::new());
        let invoices = Arc::new(InMemoryInvoiceRepo::new());
        let objects = Arc::new(InMemoryObjectStore::new());
        let (invoice, job_id) = seed_invoice_and_job(&jobs, &invoices, &objects).await;

        let extracted = vec![ExtractedItem {
            item_date: NaiveDate::from_ymd_opt(2024, 1, 1).unwrap(),
            description: "Consulting".to_string(),
            quantity: 2.0,
            amount: 150.0,
        }];
        let w = worker(
            jobs.clone(),
            invoices.clone(),
            objects,
            Arc::new(FixedTranscriber(Ok("meeting notes".to_string()))),
            Arc::new(FixedExtractor(extracted)),
        );

        assert!(w.process_once().await.unwrap());

        let stored = invoices.get(invoice.id).await.unwrap().unwrap();
        assert_eq!(stored.status, InvoiceStatus::Ready);
        assert_eq!(stored.transcript.as_deref(), Some("meeting notes"));
        let items = invoices.list_items(invoice.id).await.unwrap();
        assert_eq!(items.len(), 1);
        assert_eq!(items[0].description, "Consulting");

        let job = jobs.get(job_id).await.unwrap().unwrap();
        assert_eq!(job.state, JobState::Completed);
    }

    #[tokio::test]
    async fn transcription_error_fails_the_job_and_leaves_invoice_processing() {
        let jobs = Arc::new(InMemoryJobStore::new());
        let invoices = Arc::new(InMemoryInvoiceRepo::new());
        let objects = Arc::new(InMemoryObjectStore::new());
        let (invoice, job_id) = seed_invoice_and_job(&jobs, &invoices, &objects).await;

        let w = worker(
            jobs.clone(),
            invoices.clone(),
            objects,
            Arc::new(FixedTranscriber(Err("provider unavailable".to_string()))),
            Arc::new(FixedExtractor(vec![])),
        );

        assert!(w.process_once().await.unwrap());

        let failed = jobs.get(job_id).await.unwrap().unwrap();
        assert_eq!(failed.state, JobState::Failed);
        assert!(failed.last_error.as_deref().unwrap_or("").contains("provider unavailable"));

        let stored = invoices.get(invoice.id).await.unwrap().unwrap();
        assert_eq!(stored.status, InvoiceStatus::Processing);
        assert!(stored.transcript.is_none());
    }

    #[tokio::test]
    async fn job_for_deleted_invoice_completes_without_work() {
        let jobs = Arc::new(InMemoryJobStore::new());
        let invoices = Arc::new(InMemoryInvoiceRepo::new());
        let objects = Arc::new(InMemoryObjectStore::new());

        let orphan = Job::new(
            JobKind::TranscribeAndExtract,
            billscribe_core::InvoiceId::new(),
            "uploads/gone.wav",
            serde_json::json!({}),
        );
        let job_id = orphan.id;
        jobs.enqueue(orphan).await.unwrap();

        let w = worker(
            jobs.clone(),
            invoices,
            objects,
            Arc::new(FixedTranscriber(Ok(String::new()))),
            Arc::new(FixedExtractor(vec![])),
        );

        assert!(w.process_once().await.unwrap());
        let job = jobs.get(job_id).await.unwrap().unwrap();
        assert_eq!(job.state, JobState::Completed);
    }

    #[tokio::test]
    async fn empty_extraction_still_marks_invoice_ready() {
        let jobs = Arc::new(InMemoryJobStore::new());
        let invoices = Arc::new(InMemoryInvoiceRepo::new());
        let objects = Arc::new(InMemoryObjectStore::new());
        let (invoice, _job_id) = seed_invoice_and_job(&jobs, &invoices, &objects).await;

        let w = worker(
            jobs.clone(),
            invoices.clone(),
            objects,
            Arc::new(FixedTranscriber(Ok("nothing billable".to_string()))),
            Arc::new(FixedExtractor(vec![])),
        );

        assert!(w.process_once().await.unwrap());

        let stored = invoices.get(invoice.id).await.unwrap().unwrap();
        assert_eq!(stored.status, InvoiceStatus::Ready);
        assert!(invoices.list_items(invoice.id).await.unwrap().is_empty());
    }
}

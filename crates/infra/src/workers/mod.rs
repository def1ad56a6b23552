//! Background workers.

mod transcription_worker;

pub use transcription_worker::{TranscriptionWorker, WorkerConfig, WorkerDeps, WorkerHandle};

//! Batch pipeline.
//!
//! The stages a document chunk or concept proposal goes through in bulk:
//! 1. **Size** the run once from memory pressure ([`adaptive_batch_size`])
//! 2. **Process** each batch with bounded concurrency ([`BatchScheduler::run`])
//! 3. **Checkpoint** the storage engine after every batch
//! 4. **Report** progress and pause before the next batch

pub mod batch;
pub mod memory;

pub use batch::{
    adaptive_batch_size, BatchProgress, BatchRunConfig, BatchRunSummary, BatchScheduler,
    MIN_ADAPTIVE_BATCH_SIZE,
};
pub use memory::{FixedMemoryProbe, MemoryProbe, SystemMemoryProbe};

use std::future::Future;

use crate::embedder::{EmbedderClient, Embedding};
use crate::errors::Result;

/// Embed `texts` through `scheduler`, one `embed` call per text.
///
/// `checkpoint` runs after every batch (typically the store's flush). The
/// returned embeddings keep the order of `texts`.
pub async fn embed_texts<P, E, H, HFut>(
    scheduler: &BatchScheduler<P>,
    embedder: &E,
    texts: Vec<String>,
    checkpoint: H,
) -> Result<BatchRunSummary<Embedding>>
where
    P: MemoryProbe,
    E: EmbedderClient,
    H: FnMut() -> HFut,
    HFut: Future<Output = Result<()>>,
{
    scheduler
        .run(texts, move |text| async move { embedder.embed(&text).await }, checkpoint)
        .await
}

//! Batch scheduling for embedding and curation runs.
//!
//! A run splits its items into consecutive batches and processes them strictly
//! one after another. Within a batch at most `concurrency` items are in
//! flight and results keep input order. After each batch the caller's
//! checkpoint hook flushes the storage engine, a progress event is emitted,
//! and the scheduler pauses before the next batch. Bounding the work between
//! flush points is what keeps peak memory of the embedded store in check.

use std::future::Future;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};
use validator::Validate;

use crate::errors::{LoreError, Result};
use crate::pipeline::memory::{MemoryProbe, SystemMemoryProbe};
use crate::utils::try_join_ordered;

/// Adaptive sizing never shrinks a batch below this many items.
pub const MIN_ADAPTIVE_BATCH_SIZE: usize = 10;

/// Settings for one batch run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Validate)]
pub struct BatchRunConfig {
    /// Items per batch (before adaptive scaling).
    #[validate(range(min = 1))]
    pub batch_size: usize,
    /// Items in flight at once within a batch.
    #[validate(range(min = 1))]
    pub concurrency: usize,
    /// Pause between consecutive batches.
    pub batch_delay: Duration,
    /// Invoke the checkpoint hook after every batch.
    pub checkpoint_enabled: bool,
    /// Shrink `batch_size` under memory pressure, once at run start.
    pub adaptive_sizing: bool,
}

impl Default for BatchRunConfig {
    fn default() -> Self {
        Self {
            batch_size: 50,
            concurrency: 4,
            batch_delay: Duration::from_millis(100),
            checkpoint_enabled: true,
            adaptive_sizing: true,
        }
    }
}

/// Emitted once per completed batch.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct BatchProgress {
    /// 1-based.
    pub batch_index: usize,
    pub total_batches: usize,
    pub items_processed: usize,
    pub items_total: usize,
    /// `round(items_processed / items_total * 100)`.
    pub percent: u8,
}

impl BatchProgress {
    fn new(batch_index: usize, total_batches: usize, items_processed: usize, items_total: usize) -> Self {
        // Integer round-half-up of processed * 100 / total.
        let percent = (items_processed * 100 + items_total / 2) / items_total.max(1);
        Self {
            batch_index,
            total_batches,
            items_processed,
            items_total,
            percent: percent.min(100) as u8,
        }
    }
}

/// What a successful run produced.
#[derive(Debug, Clone, PartialEq)]
pub struct BatchRunSummary<R> {
    /// One result per input item, in input order.
    pub results: Vec<R>,
    pub batches: usize,
    pub items_processed: usize,
    /// Batch size actually used (after adaptive scaling).
    pub batch_size: usize,
}

/// Scale `base` by memory `pressure` (fraction in use).
///
/// | pressure | multiplier |
/// |---|---|
/// | < 0.50 | 1.00 |
/// | 0.50 – 0.70 | 0.75 |
/// | 0.70 – 0.85 | 0.50 |
/// | > 0.85 | 0.25 |
///
/// The result is never below [`MIN_ADAPTIVE_BATCH_SIZE`].
pub fn adaptive_batch_size(base: usize, pressure: f64) -> usize {
    let multiplier = if pressure > 0.85 {
        0.25
    } else if pressure > 0.70 {
        0.5
    } else if pressure >= 0.50 {
        0.75
    } else {
        1.0
    };
    ((base as f64 * multiplier).floor() as usize).max(MIN_ADAPTIVE_BATCH_SIZE)
}

type ProgressFn = Box<dyn Fn(&BatchProgress) + Send + Sync>;

/// Runs items through a processing function in gated, bounded batches.
pub struct BatchScheduler<P = SystemMemoryProbe> {
    config: BatchRunConfig,
    probe: P,
    on_progress: Option<ProgressFn>,
}

impl BatchScheduler<SystemMemoryProbe> {
    /// Scheduler reading memory pressure from the host.
    pub fn new(config: BatchRunConfig) -> Self {
        Self {
            config,
            probe: SystemMemoryProbe,
            on_progress: None,
        }
    }
}

impl<P: MemoryProbe> BatchScheduler<P> {
    /// Replace the memory probe used for adaptive sizing.
    pub fn with_probe<Q: MemoryProbe>(self, probe: Q) -> BatchScheduler<Q> {
        BatchScheduler {
            config: self.config,
            probe,
            on_progress: self.on_progress,
        }
    }

    /// Register a callback receiving every [`BatchProgress`] event.
    pub fn on_progress(mut self, callback: impl Fn(&BatchProgress) + Send + Sync + 'static) -> Self {
        self.on_progress = Some(Box::new(callback));
        self
    }

    pub fn config(&self) -> &BatchRunConfig {
        &self.config
    }

    /// Batch size for a run starting now.
    pub fn effective_batch_size(&self) -> usize {
        if !self.config.adaptive_sizing {
            return self.config.batch_size;
        }
        let pressure = self.probe.pressure();
        let size = adaptive_batch_size(self.config.batch_size, pressure);
        if size < self.config.batch_size {
            warn!(
                pressure_pct = (pressure * 100.0).round() as u64,
                base = self.config.batch_size,
                size,
                "memory pressure, shrinking batches"
            );
        }
        size
    }

    /// Process `items` with `process`, batch by batch.
    ///
    /// `checkpoint` runs after every batch when checkpointing is enabled; its
    /// failure ends the run. The first item failure also ends the run and no
    /// partial results are returned. Both surface as
    /// [`LoreError::RunAborted`] carrying the number of items processed.
    pub async fn run<T, R, F, Fut, H, HFut>(
        &self,
        items: Vec<T>,
        process: F,
        mut checkpoint: H,
    ) -> Result<BatchRunSummary<R>>
    where
        F: Fn(T) -> Fut,
        Fut: Future<Output = Result<R>>,
        H: FnMut() -> HFut,
        HFut: Future<Output = Result<()>>,
    {
        self.config
            .validate()
            .map_err(|e| LoreError::Validation(e.to_string()))?;

        let items_total = items.len();
        let batch_size = self.effective_batch_size();
        if items_total == 0 {
            return Ok(BatchRunSummary {
                results: Vec::new(),
                batches: 0,
                items_processed: 0,
                batch_size,
            });
        }

        let total_batches = items_total.div_ceil(batch_size);
        info!(
            items = items_total,
            batch_size,
            batches = total_batches,
            concurrency = self.config.concurrency,
            "starting batch run"
        );

        let mut results = Vec::with_capacity(items_total);
        let mut remaining = items.into_iter();

        for batch_index in 1..=total_batches {
            let batch: Vec<T> = remaining.by_ref().take(batch_size).collect();
            debug!(batch = batch_index, items = batch.len(), "processing batch");

            let outputs = try_join_ordered(batch.into_iter().map(&process), self.config.concurrency)
                .await
                .map_err(|e| {
                    warn!(batch = batch_index, processed = results.len(), error = %e, "batch run aborted");
                    aborted(results.len(), e)
                })?;
            results.extend(outputs);

            if self.config.checkpoint_enabled {
                checkpoint().await.map_err(|e| {
                    warn!(batch = batch_index, error = %e, "checkpoint failed, aborting run");
                    aborted(results.len(), as_checkpoint_error(e))
                })?;
            }

            let progress = BatchProgress::new(batch_index, total_batches, results.len(), items_total);
            info!(
                batch = progress.batch_index,
                total = progress.total_batches,
                processed = progress.items_processed,
                percent = progress.percent,
                "batch complete"
            );
            if let Some(callback) = &self.on_progress {
                callback(&progress);
            }

            if batch_index < total_batches && !self.config.batch_delay.is_zero() {
                tokio::time::sleep(self.config.batch_delay).await;
            }
        }

        Ok(BatchRunSummary {
            items_processed: results.len(),
            results,
            batches: total_batches,
            batch_size,
        })
    }
}

fn aborted(processed: usize, source: LoreError) -> LoreError {
    LoreError::RunAborted {
        processed,
        source: Box::new(source),
    }
}

fn as_checkpoint_error(e: LoreError) -> LoreError {
    match e {
        LoreError::Checkpoint(_) => e,
        other => LoreError::Checkpoint(other.to_string()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pipeline::memory::FixedMemoryProbe;

    fn config(batch_size: usize, concurrency: usize) -> BatchRunConfig {
        BatchRunConfig {
            batch_size,
            concurrency,
            batch_delay: Duration::ZERO,
            checkpoint_enabled: true,
            adaptive_sizing: false,
        }
    }

    #[test]
    fn default_run_adapts_to_memory_pressure() {
        let scheduler = BatchScheduler::new(BatchRunConfig::default()).with_probe(FixedMemoryProbe(0.9));
        assert!(scheduler.config().adaptive_sizing);
        assert_eq!(scheduler.effective_batch_size(), 12);
    }

    #[test]
    fn adaptive_table() {
        assert_eq!(adaptive_batch_size(100, 0.10), 100);
        assert_eq!(adaptive_batch_size(100, 0.49), 100);
        assert_eq!(adaptive_batch_size(100, 0.50), 75);
        assert_eq!(adaptive_batch_size(100, 0.70), 75);
        assert_eq!(adaptive_batch_size(100, 0.71), 50);
        assert_eq!(adaptive_batch_size(100, 0.85), 50);
        assert_eq!(adaptive_batch_size(100, 0.90), 25);
    }

    #[test]
    fn adaptive_floor() {
        for base in [1, 5, 10, 20, 39, 1000] {
            for pressure in [0.0, 0.5, 0.75, 0.99, 1.0] {
                assert!(adaptive_batch_size(base, pressure) >= MIN_ADAPTIVE_BATCH_SIZE);
            }
        }
        assert_eq!(adaptive_batch_size(20, 0.95), 10);
    }

    #[test]
    fn effective_size_uses_probe_only_when_adaptive() {
        let fixed = BatchScheduler::new(config(100, 1)).with_probe(FixedMemoryProbe(0.9));
        assert_eq!(fixed.effective_batch_size(), 100);

        let adaptive = BatchScheduler::new(BatchRunConfig {
            adaptive_sizing: true,
            ..config(100, 1)
        })
        .with_probe(FixedMemoryProbe(0.9));
        assert_eq!(adaptive.effective_batch_size(), 25);
    }

    #[test]
    fn progress_rounds_percent() {
        assert_eq!(BatchProgress::new(1, 3, 1, 3).percent, 33);
        assert_eq!(BatchProgress::new(2, 3, 2, 3).percent, 67);
        assert_eq!(BatchProgress::new(1, 8, 1, 8).percent, 13);
        assert_eq!(BatchProgress::new(3, 3, 3, 3).percent, 100);
    }

    #[tokio::test]
    async fn rejects_zero_batch_size() {
        let scheduler = BatchScheduler::new(config(0, 1));
        let err = scheduler
            .run(vec![1], |x: i32| async move { Ok(x) }, || async { Ok(()) })
            .await
            .unwrap_err();
        assert!(matches!(err, LoreError::Validation(_)));
    }

    #[tokio::test]
    async fn empty_input_touches_nothing() {
        let scheduler = BatchScheduler::new(config(2, 1));
        let mut hooks = 0;
        let summary = scheduler
            .run(Vec::<i32>::new(), |x| async move { Ok(x) }, || {
                hooks += 1;
                async { Ok(()) }
            })
            .await
            .unwrap();
        assert!(summary.results.is_empty());
        assert_eq!(summary.batches, 0);
        assert_eq!(hooks, 0);
    }

    #[tokio::test]
    async fn checkpoint_error_is_wrapped() {
        let scheduler = BatchScheduler::new(config(2, 1));
        let err = scheduler
            .run(vec![1, 2, 3], |x: i32| async move { Ok(x) }, || async {
                Err(LoreError::Store("wal full".into()))
            })
            .await
            .unwrap_err();
        match err {
            LoreError::RunAborted { processed, source } => {
                assert_eq!(processed, 2);
                assert!(matches!(*source, LoreError::Checkpoint(ref m) if m.contains("wal full")));
            }
            other => panic!("expected RunAborted, got {other:?}"),
        }
    }

    #[tokio::test(start_paused = true)]
    async fn pauses_between_batches_only() {
        let scheduler = BatchScheduler::new(BatchRunConfig {
            batch_delay: Duration::from_secs(1),
            ..config(2, 1)
        });
        let start = tokio::time::Instant::now();
        scheduler
            .run(vec![1, 2, 3, 4, 5], |x: i32| async move { Ok(x) }, || async { Ok(()) })
            .await
            .unwrap();
        // Three batches, two pauses.
        assert_eq!(start.elapsed(), Duration::from_secs(2));
    }
}

// SPDX-FileCopyrightText: 2026 Amora Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Bounded background worker for per-turn memory offloads.
//!
//! Summary updates and vector writes are best-effort: losing one under
//! backpressure is acceptable, an unbounded backlog is not. Jobs go
//! through a bounded queue with drop-and-log on overflow; submitted,
//! dropped, and failed counts are observable both as `metrics` counters
//! and on [`WorkerStats`].

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use amora_config::model::WorkerConfig;
use amora_core::ChatMessage;
use metrics::counter;
use tokio::sync::{Mutex, mpsc};
use tokio::task::JoinHandle;
use tracing::{debug, warn};

use crate::summary::SummaryService;
use crate::vector::VectorMemoryService;

/// One unit of deferred memory work.
#[derive(Debug)]
pub enum MemoryJob {
    UpdateSummary {
        conversation_id: String,
        evicted: Vec<ChatMessage>,
    },
    SaveVector {
        conversation_id: String,
        messages: Vec<ChatMessage>,
    },
}

impl MemoryJob {
    fn kind(&self) -> &'static str {
        match self {
            MemoryJob::UpdateSummary { .. } => "update_summary",
            MemoryJob::SaveVector { .. } => "save_vector",
        }
    }
}

/// Queue accounting, shared with the workers.
#[derive(Debug, Default)]
pub struct WorkerStats {
    pub submitted: AtomicU64,
    pub dropped: AtomicU64,
    pub failed: AtomicU64,
}

pub struct MemoryWorker {
    tx: mpsc::Sender<MemoryJob>,
    handles: Vec<JoinHandle<()>>,
    stats: Arc<WorkerStats>,
}

impl MemoryWorker {
    /// Spawns the worker tasks draining a bounded queue.
    pub fn spawn(
        config: &WorkerConfig,
        summary: Arc<SummaryService>,
        vector: Arc<VectorMemoryService>,
    ) -> Self {
        let (tx, rx) = mpsc::channel::<MemoryJob>(config.queue_capacity.max(1));
        let rx = Arc::new(Mutex::new(rx));
        let stats = Arc::new(WorkerStats::default());

        let workers = config.workers.max(1);
        let mut handles = Vec::with_capacity(workers);
        for _ in 0..workers {
            let rx = Arc::clone(&rx);
            let summary = Arc::clone(&summary);
            let vector = Arc::clone(&vector);
            let stats = Arc::clone(&stats);
            handles.push(tokio::spawn(async move {
                loop {
                    let job = { rx.lock().await.recv().await };
                    let Some(job) = job else { break };
                    run_job(job, &summary, &vector, &stats).await;
                }
            }));
        }

        Self { tx, handles, stats }
    }

    /// Enqueues a job without waiting. A full queue drops the job and
    /// counts it; the caller never blocks on memory work.
    pub fn submit(&self, job: MemoryJob) {
        let kind = job.kind();
        match self.tx.try_send(job) {
            Ok(()) => {
                self.stats.submitted.fetch_add(1, Ordering::Relaxed);
                counter!("amora_memory_jobs_submitted").increment(1);
            }
            Err(e) => {
                self.stats.dropped.fetch_add(1, Ordering::Relaxed);
                counter!("amora_memory_jobs_dropped").increment(1);
                warn!(kind, error = %e, "memory job dropped");
            }
        }
    }

    pub fn stats(&self) -> Arc<WorkerStats> {
        Arc::clone(&self.stats)
    }

    /// Closes the queue and waits for in-flight jobs to finish.
    pub async fn shutdown(self) {
        drop(self.tx);
        for handle in self.handles {
            if let Err(e) = handle.await {
                warn!(error = %e, "memory worker task panicked");
            }
        }
    }
}

async fn run_job(
    job: MemoryJob,
    summary: &SummaryService,
    vector: &VectorMemoryService,
    stats: &WorkerStats,
) {
    let kind = job.kind();
    let result = match job {
        MemoryJob::UpdateSummary {
            conversation_id,
            evicted,
        } => summary
            .update_summary(&conversation_id, &evicted)
            .await
            .map(|_| ()),
        MemoryJob::SaveVector {
            conversation_id,
            messages,
        } => vector.save_messages(&conversation_id, &messages).await,
    };

    match result {
        Ok(()) => debug!(kind, "memory job done"),
        Err(e) => {
            stats.failed.fetch_add(1, Ordering::Relaxed);
            counter!("amora_memory_jobs_failed").increment(1);
            warn!(kind, error = %e, "memory job failed");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::window::test_support::StubKv;
    use amora_config::model::{SummaryConfig, VectorConfig};
    use amora_core::{AmoraError, Document, VectorStoreAdapter};
    use async_trait::async_trait;

    struct SinkVectorStore;

    #[async_trait]
    impl VectorStoreAdapter for SinkVectorStore {
        async fn add_documents(&self, _documents: &[Document]) -> Result<(), AmoraError> {
            Ok(())
        }

        async fn similarity_search(
            &self,
            _query: &str,
            _top_k: usize,
            _threshold: f64,
            _filter: &str,
        ) -> Result<Vec<Document>, AmoraError> {
            Ok(Vec::new())
        }
    }

    struct BrokenVectorStore;

    #[async_trait]
    impl VectorStoreAdapter for BrokenVectorStore {
        async fn add_documents(&self, _documents: &[Document]) -> Result<(), AmoraError> {
            Err(AmoraError::Internal("store down".into()))
        }

        async fn similarity_search(
            &self,
            _query: &str,
            _top_k: usize,
            _threshold: f64,
            _filter: &str,
        ) -> Result<Vec<Document>, AmoraError> {
            Ok(Vec::new())
        }
    }

    fn services(
        store: Arc<dyn VectorStoreAdapter>,
    ) -> (Arc<SummaryService>, Arc<VectorMemoryService>) {
        (
            Arc::new(SummaryService::new(
                Arc::new(StubKv::default()),
                None,
                SummaryConfig::default(),
            )),
            Arc::new(VectorMemoryService::new(store, VectorConfig::default())),
        )
    }

    #[tokio::test]
    async fn jobs_run_and_are_counted() {
        let (summary, vector) = services(Arc::new(SinkVectorStore));
        let worker = MemoryWorker::spawn(&WorkerConfig::default(), Arc::clone(&summary), vector);
        let stats = worker.stats();

        worker.submit(MemoryJob::UpdateSummary {
            conversation_id: "c1".to_string(),
            evicted: vec![ChatMessage::user("你好")],
        });
        worker.submit(MemoryJob::SaveVector {
            conversation_id: "c1".to_string(),
            messages: vec![ChatMessage::user("你好")],
        });
        worker.shutdown().await;

        assert_eq!(stats.submitted.load(Ordering::Relaxed), 2);
        assert_eq!(stats.dropped.load(Ordering::Relaxed), 0);
        assert_eq!(stats.failed.load(Ordering::Relaxed), 0);
        assert!(summary.get_summary("c1").await.contains("你好"));
    }

    #[tokio::test]
    async fn overflow_drops_jobs_instead_of_blocking() {
        let (summary, vector) = services(Arc::new(SinkVectorStore));
        let config = WorkerConfig {
            workers: 1,
            queue_capacity: 1,
        };
        let worker = MemoryWorker::spawn(&config, summary, vector);
        let stats = worker.stats();

        // Flood the queue synchronously; with one worker some submissions
        // must overflow the single-slot queue.
        for i in 0..200 {
            worker.submit(MemoryJob::SaveVector {
                conversation_id: "c1".to_string(),
                messages: vec![ChatMessage::user(format!("m{i}"))],
            });
        }
        worker.shutdown().await;

        let submitted = stats.submitted.load(Ordering::Relaxed);
        let dropped = stats.dropped.load(Ordering::Relaxed);
        assert_eq!(submitted + dropped, 200);
        assert!(dropped > 0);
    }

    #[tokio::test]
    async fn failed_jobs_are_counted_not_fatal() {
        let (summary, vector) = services(Arc::new(BrokenVectorStore));
        let worker = MemoryWorker::spawn(&WorkerConfig::default(), summary, vector);
        let stats = worker.stats();

        worker.submit(MemoryJob::SaveVector {
            conversation_id: "c1".to_string(),
            messages: vec![ChatMessage::user("你好")],
        });
        worker.shutdown().await;

        assert_eq!(stats.failed.load(Ordering::Relaxed), 1);
    }
}

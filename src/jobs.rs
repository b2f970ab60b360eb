use crate::{
    models::{ApiError, BatchReport, OutputDescriptor},
    pipeline::{BatchInput, Pipeline, PipelineError},
    security::AuthContext,
    store::{BatchStore, StoredBatch},
};
use chrono::Utc;
use serde::Serialize;
use std::{
    collections::{HashMap, VecDeque},
    sync::Arc,
};
use tokio::{
    sync::{Mutex, mpsc},
    task::JoinHandle,
};
use tracing::{info, warn};
use uuid::Uuid;

/// Runs a batch on the blocking pool, stores its outputs, and returns the report.
pub async fn execute_batch(
    pipeline: &Pipeline,
    store: &BatchStore,
    input: BatchInput,
) -> Result<BatchReport, PipelineError> {
    let worker = pipeline.clone();
    let outcome = tokio::task::spawn_blocking(move || worker.run(input))
        .await
        .map_err(|err| PipelineError::internal("worker", err.to_string()))??;

    let batch_id = Uuid::new_v4();
    let outputs = outcome
        .files
        .iter()
        .map(|file| OutputDescriptor {
            name: file.name.clone(),
            kind: file.kind,
            size_bytes: file.bytes.len(),
            download_url: format!("/batches/{batch_id}/files/{}", file.name),
        })
        .collect();
    let report = BatchReport {
        batch_id: batch_id.to_string(),
        created_at: Utc::now(),
        summary: outcome.summary,
        outputs,
        archive_url: format!("/batches/{batch_id}/archive"),
        log: outcome.log,
        stages: outcome.stages,
    };
    crate::metrics::batch_completed(report.summary.total_orders, report.outputs.len());
    store
        .insert(
            batch_id,
            StoredBatch {
                report: report.clone(),
                files: outcome.files,
            },
        )
        .await;
    Ok(report)
}

#[derive(Clone)]
pub struct JobQueue {
    tx: mpsc::Sender<Job>,
    book: Arc<Mutex<JobBook>>,
}

struct Job {
    id: Uuid,
    input: BatchInput,
    context: AuthContext,
}

#[derive(Clone, Serialize)]
#[serde(tag = "state", rename_all = "snake_case")]
pub enum JobState {
    Queued,
    Running,
    Completed {
        report: BatchReport,
    },
    Failed {
        error: String,
        stage: Option<String>,
    },
}

#[derive(Clone, Serialize)]
pub struct JobInfo {
    pub id: String,
    #[serde(flatten)]
    pub state: JobState,
}

/// Job states by id. Pending jobs are always kept; only the newest
/// `retention` finished jobs are.
struct JobBook {
    retention: usize,
    states: HashMap<Uuid, JobState>,
    finished: VecDeque<Uuid>,
}

impl JobBook {
    fn new(retention: usize) -> Self {
        Self {
            retention: retention.max(1),
            states: HashMap::new(),
            finished: VecDeque::new(),
        }
    }

    fn set(&mut self, id: Uuid, state: JobState) {
        self.states.insert(id, state);
    }

    fn finish(&mut self, id: Uuid, state: JobState) {
        self.states.insert(id, state);
        self.finished.push_back(id);
        while self.finished.len() > self.retention {
            if let Some(evicted) = self.finished.pop_front() {
                self.states.remove(&evicted);
            }
        }
    }
}

impl JobQueue {
    pub fn spawn(pipeline: Pipeline, store: BatchStore) -> (Self, JoinHandle<()>) {
        Self::with_limits(
            pipeline,
            store,
            queue_capacity_from_env(),
            job_retention_from_env(),
        )
    }

    pub fn with_limits(
        pipeline: Pipeline,
        store: BatchStore,
        capacity: usize,
        retention: usize,
    ) -> (Self, JoinHandle<()>) {
        let (tx, mut rx) = mpsc::channel::<Job>(capacity.max(1));
        let book = Arc::new(Mutex::new(JobBook::new(retention)));
        let book_bg = book.clone();

        let handle = tokio::spawn(async move {
            while let Some(job) = rx.recv().await {
                book_bg.lock().await.set(job.id, JobState::Running);

                let result = execute_batch(&pipeline, &store, job.input).await;
                let state = match result {
                    Ok(report) => {
                        info!(
                            target = "labelsort.api",
                            job_id = %job.id,
                            org_id = %job.context.org_id,
                            batch_id = %report.batch_id,
                            "batch job completed"
                        );
                        JobState::Completed { report }
                    }
                    Err(err) => {
                        warn!(
                            target = "labelsort.api",
                            job_id = %job.id,
                            org_id = %job.context.org_id,
                            error = %err,
                            "batch job failed"
                        );
                        JobState::Failed {
                            error: err.detail().to_string(),
                            stage: Some(err.stage().to_string()),
                        }
                    }
                };
                book_bg.lock().await.finish(job.id, state);
            }
        });

        (Self { tx, book }, handle)
    }

    pub async fn enqueue_batch(
        &self,
        input: BatchInput,
        context: AuthContext,
    ) -> Result<Uuid, ApiError> {
        let id = Uuid::new_v4();
        self.book.lock().await.set(id, JobState::Queued);
        let job = Job { id, input, context };
        if self.tx.send(job).await.is_err() {
            self.book.lock().await.states.remove(&id);
            return Err(ApiError {
                error: "queue_send_failed".into(),
                detail: Some("worker not available".into()),
            });
        }
        Ok(id)
    }

    pub async fn get(&self, id: Uuid) -> Option<JobInfo> {
        let book = self.book.lock().await;
        book.states.get(&id).cloned().map(|state| JobInfo {
            id: id.to_string(),
            state,
        })
    }
}

fn queue_capacity_from_env() -> usize {
    std::env::var("QUEUE_CAPACITY")
        .ok()
        .and_then(|v| v.parse::<usize>().ok())
        .filter(|v| *v > 0)
        .unwrap_or(64)
}

fn job_retention_from_env() -> usize {
    std::env::var("JOB_RETENTION")
        .ok()
        .and_then(|v| v.parse::<usize>().ok())
        .filter(|v| *v > 0)
        .unwrap_or(128)
}

use crate::models::BatchReport;
use crate::pipeline::OutputFile;
use std::collections::{HashMap, VecDeque};
use std::sync::Arc;
use tokio::sync::Mutex;
use tracing::info;
use uuid::Uuid;

/// A finished batch: the report plus the generated files it lists.
#[derive(Debug)]
pub struct StoredBatch {
    pub report: BatchReport,
    pub files: Vec<OutputFile>,
}

impl StoredBatch {
    pub fn file(&self, name: &str) -> Option<&OutputFile> {
        self.files.iter().find(|file| file.name == name)
    }
}

/// Bounded in-memory home for finished batches; the oldest is evicted first.
#[derive(Clone)]
pub struct BatchStore {
    capacity: usize,
    inner: Arc<Mutex<StoreInner>>,
}

#[derive(Default)]
struct StoreInner {
    order: VecDeque<Uuid>,
    batches: HashMap<Uuid, Arc<StoredBatch>>,
}

impl BatchStore {
    pub fn new(capacity: usize) -> Self {
        Self {
            capacity: capacity.max(1),
            inner: Arc::new(Mutex::new(StoreInner::default())),
        }
    }

    pub fn from_env() -> Self {
        let capacity = std::env::var("BATCH_RETENTION")
            .ok()
            .and_then(|v| v.parse::<usize>().ok())
            .filter(|v| *v > 0)
            .unwrap_or(32);
        Self::new(capacity)
    }

    pub async fn insert(&self, id: Uuid, batch: StoredBatch) -> Arc<StoredBatch> {
        let batch = Arc::new(batch);
        let mut guard = self.inner.lock().await;
        if guard.batches.insert(id, batch.clone()).is_none() {
            guard.order.push_back(id);
        }
        while guard.order.len() > self.capacity {
            if let Some(evicted) = guard.order.pop_front() {
                guard.batches.remove(&evicted);
                info!(target = "labelsort.api", batch_id = %evicted, "batch_evicted");
            }
        }
        batch
    }

    pub async fn get(&self, id: Uuid) -> Option<Arc<StoredBatch>> {
        self.inner.lock().await.batches.get(&id).cloned()
    }

    pub async fn len(&self) -> usize {
        self.inner.lock().await.batches.len()
    }
}

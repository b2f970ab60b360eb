use crate::models::BatchReport;
use redis::AsyncCommands;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::Mutex;

const KEY_PREFIX: &str = "labelsort:idem:";

/// Replays the report of an earlier upload that carried the same
/// `Idempotency-Key`. Redis when configured, process memory otherwise;
/// both forget a key after `ttl_secs`.
#[derive(Clone)]
pub struct IdempotencyCache {
    redis: Option<redis::Client>,
    memory: Arc<Mutex<HashMap<String, (Instant, BatchReport)>>>,
    ttl_secs: u64,
}

impl IdempotencyCache {
    pub fn new(redis: Option<redis::Client>, ttl_secs: u64) -> Self {
        Self {
            redis,
            memory: Arc::new(Mutex::new(HashMap::new())),
            ttl_secs,
        }
    }

    pub fn from_env() -> Self {
        let redis = std::env::var("REDIS_URL")
            .ok()
            .and_then(|url| redis::Client::open(url).ok());
        let ttl_secs = std::env::var("IDEMPOTENCY_TTL_SECS")
            .ok()
            .and_then(|v| v.parse::<u64>().ok())
            .unwrap_or(3600);
        Self::new(redis, ttl_secs)
    }

    pub async fn get(&self, key: &str) -> Option<BatchReport> {
        match &self.redis {
            Some(client) => redis_get(client, key).await,
            None => {
                let ttl = self.ttl();
                let mut memory = self.memory.lock().await;
                if memory
                    .get(key)
                    .is_some_and(|(stored_at, _)| stored_at.elapsed() >= ttl)
                {
                    memory.remove(key);
                }
                memory.get(key).map(|(_, report)| report.clone())
            }
        }
    }

    pub async fn put(&self, key: String, report: &BatchReport) {
        match &self.redis {
            Some(client) => redis_set(client, &key, report, self.ttl_secs).await,
            None => {
                let ttl = self.ttl();
                let mut memory = self.memory.lock().await;
                memory.retain(|_, (stored_at, _)| stored_at.elapsed() < ttl);
                memory.insert(key, (Instant::now(), report.clone()));
            }
        }
    }

    fn ttl(&self) -> Duration {
        Duration::from_secs(self.ttl_secs)
    }
}

pub async fn redis_get(client: &redis::Client, key: &str) -> Option<BatchReport> {
    let mut conn = match client.get_multiplexed_async_connection().await {
        Ok(c) => c,
        Err(_) => return None,
    };
    let s: Option<String> = conn.get(format!("{KEY_PREFIX}{key}")).await.ok();
    s.and_then(|v| serde_json::from_str(&v).ok())
}

pub async fn redis_set(client: &redis::Client, key: &str, value: &BatchReport, ttl_secs: u64) {
    if let Ok(mut conn) = client.get_multiplexed_async_connection().await
        && let Ok(json) = serde_json::to_string(value)
    {
        let _: Result<(), _> = conn
            .set_ex(format!("{KEY_PREFIX}{key}"), json, ttl_secs)
            .await;
    }
}

//! API keys and the per-organisation upload quota.
//!
//! Keys are read from `LABELSORT_API_KEYS` as comma separated `org:key`
//! pairs. Only uploads are metered: each file in a batch costs one token
//! from the organisation's bucket.

use crate::models::ApiError;
use axum::{
    Json,
    body::Body,
    extract::State,
    http::{HeaderMap, HeaderValue, Request, StatusCode, header},
    middleware::Next,
    response::{IntoResponse, IntoResponseParts, Response, ResponseParts},
};
use std::{collections::HashMap, convert::Infallible, env, sync::Arc, time::Instant};
use tokio::sync::Mutex;
use tracing::{info, warn};

pub const API_KEY_HEADER: &str = "X-Labelsort-Key";
const DEFAULT_KEYS: &str = "local:local-key";

/// The organisation a request was authenticated as.
#[derive(Clone, Debug)]
pub struct AuthContext {
    pub org_id: String,
}

#[derive(Clone)]
pub struct AuthState {
    /// secret -> organisation
    orgs: Arc<HashMap<String, String>>,
    quota: UploadQuota,
}

impl AuthState {
    pub fn from_env() -> Self {
        let raw = env::var("LABELSORT_API_KEYS").unwrap_or_else(|_| {
            warn!(
                target = "labelsort.api",
                "LABELSORT_API_KEYS not set; accepting the local development key"
            );
            DEFAULT_KEYS.to_string()
        });
        Self::new(&raw, UploadQuota::from_env())
    }

    pub fn new(raw_keys: &str, quota: UploadQuota) -> Self {
        let orgs = parse_keys(raw_keys);
        if orgs.is_empty() {
            warn!(
                target = "labelsort.api",
                "no usable API keys; protected routes will reject every request"
            );
        } else {
            info!(target = "labelsort.api", key_count = orgs.len(), "loaded API keys");
        }
        Self {
            orgs: Arc::new(orgs),
            quota,
        }
    }

    fn authenticate(&self, secret: &str) -> Option<AuthContext> {
        self.orgs.get(secret).map(|org_id| AuthContext {
            org_id: org_id.clone(),
        })
    }
}

/// Rejects requests without a known key. Authenticated requests carry an
/// [`AuthContext`] and the shared [`UploadQuota`] as extensions.
pub async fn require_api_auth(
    State(state): State<AuthState>,
    mut request: Request<Body>,
    next: Next,
) -> Result<Response, Infallible> {
    let Some(secret) = presented_key(request.headers()) else {
        return Ok(rejection(
            StatusCode::UNAUTHORIZED,
            "missing_api_key",
            "Provide X-Labelsort-Key or Bearer token",
        ));
    };
    let Some(context) = state.authenticate(secret) else {
        return Ok(rejection(
            StatusCode::UNAUTHORIZED,
            "invalid_api_key",
            "Key not recognized",
        ));
    };

    request.extensions_mut().insert(context);
    request.extensions_mut().insert(state.quota.clone());
    Ok(next.run(request).await)
}

fn presented_key(headers: &HeaderMap) -> Option<&str> {
    let bearer = headers
        .get(header::AUTHORIZATION)
        .and_then(|value| value.to_str().ok())
        .and_then(|raw| {
            let (scheme, token) = raw.split_once(' ')?;
            scheme.eq_ignore_ascii_case("bearer").then_some(token)
        });
    bearer
        .or_else(|| {
            headers
                .get(API_KEY_HEADER)
                .and_then(|value| value.to_str().ok())
        })
        .map(str::trim)
        .filter(|key| !key.is_empty())
}

fn rejection(status: StatusCode, code: &str, detail: &str) -> Response {
    let payload = ApiError {
        error: code.to_string(),
        detail: Some(detail.to_string()),
    };
    (status, Json(payload)).into_response()
}

fn parse_keys(raw: &str) -> HashMap<String, String> {
    raw.split(',')
        .map(str::trim)
        .filter(|entry| !entry.is_empty())
        .filter_map(|entry| {
            let parsed = entry
                .split_once(':')
                .map(|(org, secret)| (org.trim(), secret.trim()))
                .filter(|(org, secret)| !org.is_empty() && !secret.is_empty());
            if parsed.is_none() {
                warn!(
                    target = "labelsort.api",
                    "ignored malformed LABELSORT_API_KEYS entry: {entry}"
                );
            }
            parsed.map(|(org, secret)| (secret.to_string(), org.to_string()))
        })
        .collect()
}

/// Token buckets keyed by organisation, refilled continuously.
/// One token buys one uploaded file.
#[derive(Clone)]
pub struct UploadQuota {
    files_per_sec: f64,
    burst: f64,
    buckets: Arc<Mutex<HashMap<String, Bucket>>>,
}

struct Bucket {
    tokens: f64,
    refilled_at: Instant,
}

impl UploadQuota {
    pub fn new(files_per_sec: f64, burst: f64) -> Self {
        Self {
            files_per_sec,
            burst: burst.max(1.0),
            buckets: Arc::new(Mutex::new(HashMap::new())),
        }
    }

    pub fn from_env() -> Self {
        let files_per_sec = env::var("RATE_LIMIT_PER_SEC")
            .ok()
            .and_then(|value| value.parse::<f64>().ok())
            .filter(|value| *value > 0.0)
            .unwrap_or(2.0);
        let burst = env::var("RATE_LIMIT_CAPACITY")
            .ok()
            .and_then(|value| value.parse::<f64>().ok())
            .filter(|value| *value >= 1.0)
            .unwrap_or(50.0);
        Self::new(files_per_sec, burst)
    }

    /// Takes `files` tokens from the organisation's bucket. An upload with
    /// more files than the burst size needs a full bucket.
    pub async fn charge(&self, org_id: &str, files: usize) -> Result<QuotaGrant, QuotaExceeded> {
        let cost = (files.max(1) as f64).min(self.burst);
        let now = Instant::now();
        let mut buckets = self.buckets.lock().await;
        let bucket = buckets.entry(org_id.to_string()).or_insert(Bucket {
            tokens: self.burst,
            refilled_at: now,
        });

        let elapsed = now.duration_since(bucket.refilled_at).as_secs_f64();
        bucket.tokens = (bucket.tokens + elapsed * self.files_per_sec).min(self.burst);
        bucket.refilled_at = now;

        if bucket.tokens >= cost {
            bucket.tokens -= cost;
            Ok(QuotaGrant {
                burst: self.burst,
                remaining: bucket.tokens,
            })
        } else {
            let retry_after_secs = ((cost - bucket.tokens) / self.files_per_sec).ceil() as u64;
            warn!(
                target = "labelsort.api",
                org_id,
                files,
                retry_after_secs,
                "upload quota exhausted"
            );
            Err(QuotaExceeded {
                burst: self.burst,
                retry_after_secs: retry_after_secs.max(1),
            })
        }
    }
}

/// Quota left after a successful charge, reported as `X-RateLimit-*` headers.
#[derive(Debug, Clone)]
pub struct QuotaGrant {
    burst: f64,
    remaining: f64,
}

impl IntoResponseParts for QuotaGrant {
    type Error = Infallible;

    fn into_response_parts(self, mut res: ResponseParts) -> Result<ResponseParts, Self::Error> {
        let headers = res.headers_mut();
        headers.insert("X-RateLimit-Limit", HeaderValue::from(self.burst as u64));
        headers.insert(
            "X-RateLimit-Remaining",
            HeaderValue::from(self.remaining.max(0.0).floor() as u64),
        );
        Ok(res)
    }
}

#[derive(Debug, Clone)]
pub struct QuotaExceeded {
    burst: f64,
    pub retry_after_secs: u64,
}

impl IntoResponse for QuotaExceeded {
    fn into_response(self) -> Response {
        let detail = format!("upload quota exhausted; retry in {}s", self.retry_after_secs);
        let mut response = rejection(StatusCode::TOO_MANY_REQUESTS, "rate_limited", &detail);
        let headers = response.headers_mut();
        headers.insert(header::RETRY_AFTER, HeaderValue::from(self.retry_after_secs));
        headers.insert("X-RateLimit-Limit", HeaderValue::from(self.burst as u64));
        headers.insert("X-RateLimit-Remaining", HeaderValue::from_static("0"));
        response
    }
}

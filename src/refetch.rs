//! Wholesale re-fetch of cached queries that a push could not be merged into.
//!
//! Refetches are fire-and-forget: a target is queued at most once while
//! outstanding, a failure is logged and dropped (the cache keeps its last
//! coherent state), and nothing retries. The next push that misses the same
//! cache queues it again.

use std::collections::HashSet;
use std::sync::{Arc, Mutex};

use anyhow::Context;
use async_trait::async_trait;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use crate::cache::CacheHandle;
use crate::model::{FollowEdge, MyRsvpRow};
use crate::reconcile::RefetchTarget;

/// Fetches one cached query from the backing API and replaces it wholesale.
#[async_trait]
pub trait Refetcher: Send + Sync {
    async fn refetch(&self, target: RefetchTarget, cache: &CacheHandle) -> anyhow::Result<()>;
}

/// Deduplicating queue in front of a [`Refetcher`], drained by one worker
/// task so refetches for the same connection never race each other.
#[derive(Clone)]
pub struct RefetchQueue {
    tx: mpsc::UnboundedSender<RefetchTarget>,
    pending: Arc<Mutex<HashSet<RefetchTarget>>>,
}

impl RefetchQueue {
    pub fn spawn(
        refetcher: Arc<dyn Refetcher>,
        cache: CacheHandle,
    ) -> (Self, JoinHandle<()>) {
        let (tx, mut rx) = mpsc::unbounded_channel();
        let pending: Arc<Mutex<HashSet<RefetchTarget>>> = Arc::default();
        let queue = Self {
            tx,
            pending: Arc::clone(&pending),
        };
        let worker = tokio::spawn(async move {
            while let Some(target) = rx.recv().await {
                match refetcher.refetch(target, &cache).await {
                    Ok(()) => info!(?target, "cache refetched"),
                    Err(error) => warn!(?target, %error, "refetch failed; cache left as-is"),
                }
                if let Ok(mut pending) = pending.lock() {
                    pending.remove(&target);
                }
            }
        });
        (queue, worker)
    }

    /// Queue a refetch unless the same target is already outstanding.
    /// Returns whether the target was actually queued.
    pub fn schedule(&self, target: RefetchTarget) -> bool {
        {
            let Ok(mut pending) = self.pending.lock() else {
                return false;
            };
            if !pending.insert(target) {
                debug!(?target, "refetch already queued");
                return false;
            }
        }
        self.tx.send(target).is_ok()
    }
}

/// [`Refetcher`] backed by the social API over HTTP.
pub struct HttpRefetcher {
    client: reqwest::Client,
    api_base: String,
    token: Option<String>,
}

impl HttpRefetcher {
    pub fn new(api_base: impl Into<String>, token: Option<String>) -> Self {
        Self {
            client: reqwest::Client::new(),
            api_base: api_base.into().trim_end_matches('/').to_string(),
            token,
        }
    }

    async fn fetch_json<T: serde::de::DeserializeOwned>(&self, path: &str) -> anyhow::Result<T> {
        let url = format!("{}{path}", self.api_base);
        let mut request = self.client.get(&url);
        if let Some(token) = self.token.as_deref() {
            request = request.bearer_auth(token);
        }
        let response = request
            .send()
            .await
            .with_context(|| format!("GET {url}"))?
            .error_for_status()
            .with_context(|| format!("GET {url}"))?;
        response.json().await.with_context(|| format!("decoding {url}"))
    }
}

#[async_trait]
impl Refetcher for HttpRefetcher {
    async fn refetch(&self, target: RefetchTarget, cache: &CacheHandle) -> anyhow::Result<()> {
        match target {
            RefetchTarget::Following => {
                let edges: Vec<FollowEdge> = self.fetch_json("/api/follows/following").await?;
                cache.write().await.populate_following(edges);
            }
            RefetchTarget::MyRsvps => {
                let rows: Vec<MyRsvpRow> = self
                    .fetch_json("/api/events/my-rsvps?includeCancelled=true")
                    .await?;
                cache.write().await.populate_my_rsvps(rows);
            }
        }
        Ok(())
    }
}

/// Test double that records the targets it was asked for and optionally
/// blocks until released, to observe dedupe while a refetch is in flight.
#[cfg(test)]
pub struct RecordingRefetcher {
    pub calls: Mutex<Vec<RefetchTarget>>,
    pub gate: tokio::sync::Semaphore,
    pub fail: bool,
}

#[cfg(test)]
impl RecordingRefetcher {
    pub fn new() -> Self {
        Self {
            calls: Mutex::new(Vec::new()),
            gate: tokio::sync::Semaphore::new(0),
            fail: false,
        }
    }
}

#[cfg(test)]
#[async_trait]
impl Refetcher for RecordingRefetcher {
    async fn refetch(&self, target: RefetchTarget, _cache: &CacheHandle) -> anyhow::Result<()> {
        if let Ok(permit) = self.gate.acquire().await {
            permit.forget();
        }
        self.calls.lock().unwrap().push(target);
        if self.fail {
            anyhow::bail!("refetch rejected");
        }
        Ok(())
    }
}

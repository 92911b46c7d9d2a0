//! Request scheduler
//!
//! Every upstream call goes through [`RequestScheduler::execute`]. Each API
//! name gets its own lane: a FIFO queue with a priority fast path, a one-minute
//! dispatch window, a minimum inter-request interval and a single worker that
//! drains the queue. Throttled attempts are requeued at the head with
//! exponential backoff; other failures go straight back to the caller.
//!
//! The scheduler is an ordinary value. Build one per process and share it as
//! `Arc<RequestScheduler>`.

mod backoff;
mod lane;
mod window;

pub use backoff::{backoff_delay, RetryDecision};
pub use window::SlidingWindow;

use crate::config::{ApiLimitConfig, ApisConfig};
use crate::errors::{SyncError, SyncResult};
use crate::logger::{self, LogTag};
use futures::future::BoxFuture;
use lane::{Job, Lane, QueuedRequest};
use parking_lot::Mutex;
use std::any::Any;
use std::collections::HashMap;
use std::future::Future;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tokio::sync::oneshot;

/// Queue position for a new request
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Priority {
    #[default]
    Normal,
    /// Jumps ahead of everything already queued
    High,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SchedulerStatus {
    pub api: String,
    pub requests_in_last_minute: usize,
    pub max_requests: u32,
    pub min_interval_ms: u64,
    pub queue_length: usize,
}

pub struct RequestScheduler {
    limits: ApisConfig,
    lanes: Mutex<HashMap<String, Arc<Lane>>>,
    next_id: AtomicU64,
}

impl RequestScheduler {
    pub fn new(limits: ApisConfig) -> Self {
        Self {
            limits,
            lanes: Mutex::new(HashMap::new()),
            next_id: AtomicU64::new(1),
        }
    }

    /// Register explicit limits for an API name (replaces the lane if idle)
    pub fn with_api(self, api: &str, limits: ApiLimitConfig) -> Self {
        self.lanes
            .lock()
            .insert(api.to_string(), Arc::new(Lane::new(api, limits)));
        self
    }

    fn lane(&self, api: &str) -> Arc<Lane> {
        let mut lanes = self.lanes.lock();
        let lane = lanes
            .entry(api.to_string())
            .or_insert_with(|| Arc::new(Lane::new(api, self.limits.limits_for(api))));
        Arc::clone(lane)
    }

    /// Run `op` under the `api` lane at normal priority
    pub async fn execute<T, F, Fut>(&self, api: &str, op: F) -> SyncResult<T>
    where
        T: Send + 'static,
        F: FnMut() -> Fut + Send + 'static,
        Fut: Future<Output = SyncResult<T>> + Send + 'static,
    {
        self.execute_with_priority(api, Priority::Normal, op).await
    }

    /// Run `op` under the `api` lane
    ///
    /// `op` is called once per attempt, so it must build a fresh request each
    /// time. Resolves with the first non-throttled outcome, or
    /// `UpstreamUnavailable` once the retry budget is spent.
    pub async fn execute_with_priority<T, F, Fut>(
        &self,
        api: &str,
        priority: Priority,
        mut op: F,
    ) -> SyncResult<T>
    where
        T: Send + 'static,
        F: FnMut() -> Fut + Send + 'static,
        Fut: Future<Output = SyncResult<T>> + Send + 'static,
    {
        let job: Job = Box::new(move || -> BoxFuture<'static, lane::JobOutput> {
            let fut = op();
            Box::pin(async move { fut.await.map(|value| Box::new(value) as Box<dyn Any + Send>) })
        });

        let (tx, rx) = oneshot::channel();
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        let lane = self.lane(api);

        logger::verbose(
            LogTag::Scheduler,
            &format!("Queueing request #{} on {} ({:?})", id, api, priority),
        );

        lane.enqueue(
            QueuedRequest {
                id,
                job,
                retries: 0,
                not_before: None,
                respond: tx,
            },
            priority == Priority::High,
        );

        let output = rx
            .await
            .map_err(|_| SyncError::internal(format!("scheduler dropped request #{}", id)))??;

        output
            .downcast::<T>()
            .map(|boxed| *boxed)
            .map_err(|_| SyncError::internal(format!("scheduler result type mismatch on #{}", id)))
    }

    /// Window usage and queue depth for one API name
    /// Read-only: an API with no lane yet reports its configured limits and
    /// zero usage
    pub fn status(&self, api: &str) -> SchedulerStatus {
        let lane = self.lanes.lock().get(api).cloned();
        let ((in_window, queued), limits) = match lane {
            Some(lane) => (lane.snapshot(), lane.limits().clone()),
            None => ((0, 0), self.limits.limits_for(api)),
        };
        SchedulerStatus {
            api: api.to_string(),
            requests_in_last_minute: in_window,
            max_requests: limits.max_requests_per_minute,
            min_interval_ms: limits.min_request_interval_ms,
            queue_length: queued,
        }
    }

    /// Status for every configured API plus any lane created on demand
    pub fn all_status(&self) -> Vec<SchedulerStatus> {
        let mut names: Vec<String> = self
            .limits
            .named()
            .into_iter()
            .map(|(name, _)| name.to_string())
            .collect();
        for name in self.lanes.lock().keys() {
            if !names.contains(name) {
                names.push(name.clone());
            }
        }
        names.iter().map(|name| self.status(name)).collect()
    }
}

/// Map a request URL to its scheduler API name
pub fn api_name_from_url(url: &str) -> &'static str {
    let host = url::Url::parse(url)
        .ok()
        .and_then(|u| u.host_str().map(|h| h.to_lowercase()))
        .unwrap_or_else(|| url.to_lowercase());

    if host.contains("geckoterminal") {
        "geckoterminal"
    } else if host.contains("jup.ag") {
        "jupiter"
    } else if host.contains("dexscreener") {
        "dexscreener"
    } else {
        "default"
    }
}

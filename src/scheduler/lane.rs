//! Per-API queue and its single worker loop

use super::backoff::{decide, RetryDecision};
use super::window::SlidingWindow;
use crate::config::ApiLimitConfig;
use crate::errors::SyncError;
use crate::logger::{self, LogTag};
use futures::future::BoxFuture;
use parking_lot::Mutex;
use std::any::Any;
use std::collections::VecDeque;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::oneshot;
use tokio::time::Instant;

pub(crate) type JobOutput = Result<Box<dyn Any + Send>, SyncError>;
pub(crate) type Job = Box<dyn FnMut() -> BoxFuture<'static, JobOutput> + Send>;

pub(crate) struct QueuedRequest {
    pub id: u64,
    pub job: Job,
    pub retries: u32,
    pub not_before: Option<Instant>,
    pub respond: oneshot::Sender<JobOutput>,
}

struct LaneState {
    queue: VecDeque<QueuedRequest>,
    window: SlidingWindow,
    last_dispatch: Option<Instant>,
    worker_running: bool,
}

pub(crate) struct Lane {
    api: String,
    limits: ApiLimitConfig,
    state: Mutex<LaneState>,
}

enum Step {
    Dispatch(QueuedRequest),
    Wait(Instant),
    Idle,
}

impl Lane {
    pub fn new(api: &str, limits: ApiLimitConfig) -> Self {
        Self {
            api: api.to_string(),
            limits,
            state: Mutex::new(LaneState {
                queue: VecDeque::new(),
                window: SlidingWindow::one_minute(),
                last_dispatch: None,
                worker_running: false,
            }),
        }
    }

    pub fn limits(&self) -> &ApiLimitConfig {
        &self.limits
    }

    fn min_interval(&self) -> Duration {
        Duration::from_millis(self.limits.min_request_interval_ms)
    }

    /// Queue a request and make sure a worker is draining this lane
    pub fn enqueue(self: &Arc<Self>, request: QueuedRequest, front: bool) {
        let spawn_worker = {
            let mut state = self.state.lock();
            if front {
                state.queue.push_front(request);
            } else {
                state.queue.push_back(request);
            }
            let idle = !state.worker_running;
            state.worker_running = true;
            idle
        };

        if spawn_worker {
            let lane = Arc::clone(self);
            tokio::spawn(async move { lane.run_worker().await });
        }
    }

    /// (requests in the last minute, queue length)
    pub fn snapshot(&self) -> (usize, usize) {
        let mut state = self.state.lock();
        let now = Instant::now();
        let in_window = state.window.count(now);
        (in_window, state.queue.len())
    }

    fn next_step(&self) -> Step {
        let mut state = self.state.lock();
        let now = Instant::now();

        // Callers that gave up are dropped before they cost a dispatch
        while state
            .queue
            .front()
            .map(|r| r.respond.is_closed())
            .unwrap_or(false)
        {
            state.queue.pop_front();
        }

        let not_before = match state.queue.front() {
            Some(head) => head.not_before,
            None => {
                state.worker_running = false;
                return Step::Idle;
            }
        };

        let max = self.limits.max_requests_per_minute as usize;
        let mut ready_at = state.window.next_slot(now, max);
        if let Some(last) = state.last_dispatch {
            ready_at = ready_at.max(last + self.min_interval());
        }
        if let Some(nb) = not_before {
            ready_at = ready_at.max(nb);
        }

        if ready_at > now {
            return Step::Wait(ready_at);
        }

        match state.queue.pop_front() {
            Some(request) => {
                state.window.record(now);
                state.last_dispatch = Some(now);
                Step::Dispatch(request)
            }
            None => {
                state.worker_running = false;
                Step::Idle
            }
        }
    }

    async fn run_worker(self: Arc<Self>) {
        loop {
            match self.next_step() {
                Step::Idle => return,
                Step::Wait(ready_at) => {
                    let remaining = ready_at.saturating_duration_since(Instant::now());
                    let step = if self.min_interval().is_zero() {
                        remaining
                    } else {
                        remaining.min(self.min_interval())
                    };
                    tokio::time::sleep(step).await;
                }
                // One call in flight per lane
                Step::Dispatch(request) => self.run_request(request).await,
            }
        }
    }

    /// Throttled attempts go back to the head of the queue for this same worker
    async fn run_request(self: &Arc<Self>, mut request: QueuedRequest) {
        let result = (request.job)().await;

        let err = match result {
            Ok(value) => {
                let _ = request.respond.send(Ok(value));
                return;
            }
            Err(err) => err,
        };

        if !err.is_throttling() {
            let _ = request.respond.send(Err(err));
            return;
        }

        let initial = Duration::from_millis(self.limits.initial_backoff_ms);
        match decide(initial, request.retries, self.limits.max_retries) {
            RetryDecision::Retry(delay) => {
                logger::warning(
                    LogTag::Scheduler,
                    &format!(
                        "{} throttled (request #{}, retry {}/{}), backing off {}ms",
                        self.api,
                        request.id,
                        request.retries + 1,
                        self.limits.max_retries,
                        delay.as_millis()
                    ),
                );
                request.retries += 1;
                request.not_before = Some(Instant::now() + delay);
                self.enqueue(request, true);
            }
            RetryDecision::GiveUp => {
                logger::error(
                    LogTag::Scheduler,
                    &format!(
                        "{} still throttled after {} retries, giving up on request #{}",
                        self.api, request.retries, request.id
                    ),
                );
                let _ = request.respond.send(Err(SyncError::UpstreamUnavailable {
                    api: self.api.clone(),
                    attempts: request.retries + 1,
                    message: err.to_string(),
                }));
            }
        }
    }
}

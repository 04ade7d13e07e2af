//! # Download Scheduler
//!
//! Bounded-concurrency FIFO queue of media downloads with per-URL dedup.
//!
//! - At most `concurrency` downloads run at once. Workers are spawned lazily
//!   on the tokio runtime and exit when the queue is empty.
//! - At most one download per distinct URL is in flight. A request for a URL
//!   that is already downloading subscribes to that download instead of
//!   starting another one, and so does any queued request for the same URL at
//!   the moment its download starts.
//! - A failed download is reported to its subscribers only; the worker moves
//!   on to the next queued URL.
//!
//! Queue, in-flight map and counter live behind one `parking_lot::Mutex`
//! that is never held across an `.await`.

use crate::error::{MediaCacheError, Result};
use async_trait::async_trait;
use parking_lot::Mutex;
use std::collections::{HashMap, VecDeque};
use std::sync::Arc;
use tokio::sync::oneshot;
use tracing::{debug, trace, warn};

/// The work performed for one URL: fetch, store, index, format.
#[async_trait]
pub trait DownloadPipeline: Send + Sync {
    /// Produce the value handed back to every caller waiting on `url`.
    async fn download(&self, url: &str) -> Result<String>;
}

type Responder = oneshot::Sender<Result<String>>;

struct PendingRequest {
    url: String,
    responder: Responder,
}

#[derive(Default)]
struct SchedulerState {
    queue: VecDeque<PendingRequest>,
    in_flight: HashMap<String, Vec<Responder>>,
    in_progress: usize,
}

impl SchedulerState {
    /// Pop the next URL that is not already downloading and register it as
    /// in flight together with every queued request for the same URL.
    ///
    /// Queued requests for URLs that are in flight are attached on the way.
    fn claim_next(&mut self) -> Option<String> {
        while let Some(request) = self.queue.pop_front() {
            if let Some(subscribers) = self.in_flight.get_mut(&request.url) {
                subscribers.push(request.responder);
                continue;
            }

            let url = request.url;
            let mut subscribers = vec![request.responder];
            let mut remaining = VecDeque::with_capacity(self.queue.len());
            for queued in self.queue.drain(..) {
                if queued.url == url {
                    subscribers.push(queued.responder);
                } else {
                    remaining.push_back(queued);
                }
            }
            self.queue = remaining;
            self.in_flight.insert(url.clone(), subscribers);
            return Some(url);
        }
        None
    }
}

pub struct DownloadScheduler {
    pipeline: Arc<dyn DownloadPipeline>,
    concurrency: usize,
    state: Mutex<SchedulerState>,
}

impl DownloadScheduler {
    pub fn new(pipeline: Arc<dyn DownloadPipeline>, concurrency: usize) -> Self {
        Self {
            pipeline,
            concurrency: concurrency.max(1),
            state: Mutex::new(SchedulerState::default()),
        }
    }

    /// Queue `url` and wait for the outcome of its download.
    pub async fn request(self: &Arc<Self>, url: impl Into<String>) -> Result<String> {
        let (responder, receiver) = oneshot::channel();
        self.enqueue(PendingRequest {
            url: url.into(),
            responder,
        });

        receiver.await.map_err(|_| {
            MediaCacheError::FetchFailure("download worker stopped before completing".to_string())
        })?
    }

    /// Number of downloads currently running.
    pub fn in_progress(&self) -> usize {
        self.state.lock().in_progress
    }

    /// Number of requests waiting for a free slot.
    pub fn queued(&self) -> usize {
        self.state.lock().queue.len()
    }

    /// Whether a download for `url` is running.
    pub fn is_in_flight(&self, url: &str) -> bool {
        self.state.lock().in_flight.contains_key(url)
    }

    fn enqueue(self: &Arc<Self>, request: PendingRequest) {
        let job = {
            let mut state = self.state.lock();

            if let Some(subscribers) = state.in_flight.get_mut(&request.url) {
                trace!(subscribers = subscribers.len() + 1, "Joined in-flight download");
                subscribers.push(request.responder);
                return;
            }

            state.queue.push_back(request);
            if state.in_progress >= self.concurrency {
                trace!(queued = state.queue.len(), "All download slots busy");
                return;
            }

            let job = state.claim_next();
            if job.is_some() {
                state.in_progress += 1;
            }
            job
        };

        if let Some(url) = job {
            self.spawn_worker(url);
        }
    }

    fn spawn_worker(self: &Arc<Self>, url: String) {
        let scheduler = Arc::clone(self);
        tokio::spawn(async move {
            scheduler.run_worker(url).await;
        });
    }

    /// Download `url`, notify its subscribers, then keep taking work from the
    /// queue until it is empty.
    async fn run_worker(self: Arc<Self>, first: String) {
        let mut slot = WorkerSlot {
            scheduler: Arc::clone(&self),
            url: Some(first),
        };

        while let Some(url) = slot.url.clone() {
            debug!(in_progress = self.in_progress(), "Starting download");
            let result = self.pipeline.download(&url).await;

            let subscribers = {
                let mut state = self.state.lock();
                let subscribers = state.in_flight.remove(&url).unwrap_or_default();
                slot.url = state.claim_next();
                if slot.url.is_none() {
                    state.in_progress -= 1;
                }
                subscribers
            };

            for subscriber in subscribers {
                // A caller that stopped waiting is not an error
                let _ = subscriber.send(result.clone());
            }
        }
    }

    /// Give up the slot of a worker that died mid-download.
    ///
    /// Dropping the responders wakes the subscribers with an error. The slot
    /// is handed to the next queued URL when a runtime is still available.
    fn abandon(self: &Arc<Self>, url: &str) {
        let handle = tokio::runtime::Handle::try_current().ok();

        let (subscribers, next) = {
            let mut state = self.state.lock();
            let subscribers = state.in_flight.remove(url);
            let next = match handle {
                Some(_) => state.claim_next(),
                None => None,
            };
            if next.is_none() {
                state.in_progress -= 1;
            }
            (subscribers, next)
        };

        warn!(
            subscribers = subscribers.as_ref().map_or(0, Vec::len),
            "Download worker stopped unexpectedly"
        );
        drop(subscribers);

        if let (Some(handle), Some(next)) = (handle, next) {
            let scheduler = Arc::clone(self);
            handle.spawn(async move {
                scheduler.run_worker(next).await;
            });
        }
    }
}

/// The URL a worker is responsible for. Still set when the worker is
/// dropped only if the download panicked or the task was cancelled.
struct WorkerSlot {
    scheduler: Arc<DownloadScheduler>,
    url: Option<String>,
}

impl Drop for WorkerSlot {
    fn drop(&mut self) {
        if let Some(url) = self.url.take() {
            self.scheduler.abandon(&url);
        }
    }
}

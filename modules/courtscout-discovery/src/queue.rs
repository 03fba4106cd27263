//! In-process job queue with priority lanes, delayed starts, and
//! retry-with-backoff.
//!
//! Jobs live in a single mutex-guarded state table; workers are plain
//! tokio tasks that pop the highest-priority waiting job, run it through
//! the processor, and reschedule on retryable failure. Completed and
//! failed jobs are retained in a bounded ring so recent outcomes stay
//! inspectable.

use std::collections::{HashMap, VecDeque};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio::sync::Notify;
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};
use uuid::Uuid;

use courtscout_common::Sport;

use crate::error::DiscoveryError;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum JobPriority {
    High,
    Normal,
    Low,
}

impl JobPriority {
    fn lane(self) -> usize {
        match self {
            JobPriority::High => 0,
            JobPriority::Normal => 1,
            JobPriority::Low => 2,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum JobStatus {
    Waiting,
    Delayed,
    Active,
    Completed,
    Failed,
}

/// Payload of one discovery job: the search-area tuple to cover.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DiscoveryJobData {
    pub latitude: f64,
    pub longitude: f64,
    pub radius_m: i32,
    pub sport: Sport,
}

/// Point-in-time view of a job for callers and logs.
#[derive(Debug, Clone)]
pub struct JobSnapshot {
    pub id: Uuid,
    pub data: DiscoveryJobData,
    pub priority: JobPriority,
    pub status: JobStatus,
    pub attempts: u32,
    pub progress: u8,
    pub last_error: Option<String>,
    pub enqueued_at: DateTime<Utc>,
}

#[derive(Debug, Clone)]
pub struct QueueConfig {
    pub concurrency: usize,
    pub max_attempts: u32,
    pub backoff_base: Duration,
    /// How many finished jobs to keep around for inspection.
    pub retention: usize,
}

impl Default for QueueConfig {
    fn default() -> Self {
        Self {
            concurrency: 2,
            max_attempts: 3,
            backoff_base: Duration::from_secs(2),
            retention: 100,
        }
    }
}

/// Reports pass progress back onto the owning job. Values only move
/// forward; a late low milestone never rolls the bar back.
pub trait ProgressSink: Send + Sync {
    fn set(&self, pct: u8);
}

/// Discards progress updates. Used for direct (non-queued) runs.
pub struct NoProgress;

impl ProgressSink for NoProgress {
    fn set(&self, _pct: u8) {}
}

#[async_trait]
pub trait JobProcessor: Send + Sync + 'static {
    async fn process(
        &self,
        data: &DiscoveryJobData,
        progress: &dyn ProgressSink,
    ) -> Result<(), DiscoveryError>;
}

struct JobRecord {
    id: Uuid,
    data: DiscoveryJobData,
    priority: JobPriority,
    status: JobStatus,
    attempts: u32,
    progress: u8,
    last_error: Option<String>,
    enqueued_at: DateTime<Utc>,
    /// Earliest start time for Delayed jobs.
    run_at: Option<DateTime<Utc>>,
}

impl JobRecord {
    fn snapshot(&self) -> JobSnapshot {
        JobSnapshot {
            id: self.id,
            data: self.data.clone(),
            priority: self.priority,
            status: self.status,
            attempts: self.attempts,
            progress: self.progress,
            last_error: self.last_error.clone(),
            enqueued_at: self.enqueued_at,
        }
    }
}

#[derive(Default)]
struct State {
    records: HashMap<Uuid, JobRecord>,
    /// One FIFO lane per priority, drained high to low.
    waiting: [VecDeque<Uuid>; 3],
    delayed: Vec<Uuid>,
    finished: VecDeque<Uuid>,
}

struct Inner {
    config: QueueConfig,
    state: Mutex<State>,
    wake: Notify,
    shutting_down: AtomicBool,
}

pub struct JobQueue {
    inner: Arc<Inner>,
    running: AtomicBool,
    workers: Mutex<Vec<JoinHandle<()>>>,
}

/// Handle to one enqueued job.
pub struct JobHandle {
    id: Uuid,
    inner: Arc<Inner>,
}

impl JobHandle {
    pub fn id(&self) -> Uuid {
        self.id
    }

    pub fn snapshot(&self) -> Option<JobSnapshot> {
        let state = self.inner.state.lock().unwrap_or_else(|e| e.into_inner());
        state.records.get(&self.id).map(|r| r.snapshot())
    }
}

/// Progress writer bound to one active job.
struct JobProgress {
    id: Uuid,
    inner: Arc<Inner>,
}

impl ProgressSink for JobProgress {
    fn set(&self, pct: u8) {
        let pct = pct.min(100);
        let mut state = self.inner.state.lock().unwrap_or_else(|e| e.into_inner());
        if let Some(record) = state.records.get_mut(&self.id) {
            if pct > record.progress {
                record.progress = pct;
            }
        }
    }
}

impl JobQueue {
    pub fn new(config: QueueConfig) -> Self {
        Self {
            inner: Arc::new(Inner {
                config,
                state: Mutex::new(State::default()),
                wake: Notify::new(),
                shutting_down: AtomicBool::new(false),
            }),
            running: AtomicBool::new(false),
            workers: Mutex::new(Vec::new()),
        }
    }

    /// Enqueue a discovery job. `delay` holds the job in the delayed set
    /// until its start time; `None` makes it immediately runnable.
    pub fn enqueue(
        &self,
        data: DiscoveryJobData,
        priority: JobPriority,
        delay: Option<Duration>,
    ) -> JobHandle {
        let id = Uuid::new_v4();
        let now = Utc::now();
        let run_at = delay.map(|d| {
            now + chrono::Duration::from_std(d).unwrap_or_else(|_| chrono::Duration::zero())
        });
        let record = JobRecord {
            id,
            data,
            priority,
            status: if run_at.is_some() { JobStatus::Delayed } else { JobStatus::Waiting },
            attempts: 0,
            progress: 0,
            last_error: None,
            enqueued_at: now,
            run_at,
        };

        {
            let mut state = self.inner.state.lock().unwrap_or_else(|e| e.into_inner());
            if record.run_at.is_some() {
                state.delayed.push(id);
            } else {
                state.waiting[priority.lane()].push_back(id);
            }
            state.records.insert(id, record);
        }
        debug!(job_id = %id, ?priority, delayed = delay.is_some(), "Job enqueued");
        self.inner.wake.notify_waiters();

        JobHandle { id, inner: self.inner.clone() }
    }

    pub fn snapshot(&self, id: Uuid) -> Option<JobSnapshot> {
        let state = self.inner.state.lock().unwrap_or_else(|e| e.into_inner());
        state.records.get(&id).map(|r| r.snapshot())
    }

    /// Retained completed and failed jobs, most recent first.
    pub fn recent(&self) -> Vec<JobSnapshot> {
        let state = self.inner.state.lock().unwrap_or_else(|e| e.into_inner());
        state
            .finished
            .iter()
            .rev()
            .filter_map(|id| state.records.get(id))
            .map(|r| r.snapshot())
            .collect()
    }

    /// Count of jobs not yet finished.
    pub fn pending(&self) -> usize {
        let state = self.inner.state.lock().unwrap_or_else(|e| e.into_inner());
        state
            .records
            .values()
            .filter(|r| !matches!(r.status, JobStatus::Completed | JobStatus::Failed))
            .count()
    }

    /// Spawn the worker pool. Calling twice is a logged no-op.
    pub fn start(&self, processor: Arc<dyn JobProcessor>) {
        if self.running.swap(true, Ordering::SeqCst) {
            warn!("Job queue already started; ignoring");
            return;
        }
        info!(
            concurrency = self.inner.config.concurrency,
            max_attempts = self.inner.config.max_attempts,
            "Starting job queue workers"
        );
        let mut workers = self.workers.lock().unwrap_or_else(|e| e.into_inner());
        for worker_id in 0..self.inner.config.concurrency {
            let inner = self.inner.clone();
            let processor = processor.clone();
            workers.push(tokio::spawn(async move {
                worker_loop(worker_id, inner, processor).await;
            }));
        }
    }

    /// Stop accepting work and wait for in-flight jobs to finish.
    pub async fn shutdown(&self) {
        if !self.running.swap(false, Ordering::SeqCst) {
            return;
        }
        info!("Shutting down job queue");
        self.inner.shutting_down.store(true, Ordering::SeqCst);
        self.inner.wake.notify_waiters();
        let handles: Vec<_> = {
            let mut workers = self.workers.lock().unwrap_or_else(|e| e.into_inner());
            workers.drain(..).collect()
        };
        for handle in handles {
            if let Err(err) = handle.await {
                error!(error = %err, "Queue worker panicked");
            }
        }
        self.inner.shutting_down.store(false, Ordering::SeqCst);
    }
}

/// Move due delayed jobs into their waiting lanes. Returns the earliest
/// not-yet-due start time, if any.
fn promote_due(state: &mut State, now: DateTime<Utc>) -> Option<DateTime<Utc>> {
    let mut next_due = None;
    let mut still_delayed = Vec::with_capacity(state.delayed.len());
    for id in state.delayed.drain(..) {
        let Some(record) = state.records.get_mut(&id) else {
            continue;
        };
        match record.run_at {
            Some(due) if due > now => {
                next_due = Some(next_due.map_or(due, |d: DateTime<Utc>| d.min(due)));
                still_delayed.push(id);
            }
            _ => {
                record.status = JobStatus::Waiting;
                record.run_at = None;
                state.waiting[record.priority.lane()].push_back(id);
            }
        }
    }
    state.delayed = still_delayed;
    next_due
}

fn pop_waiting(state: &mut State) -> Option<Uuid> {
    for lane in &mut state.waiting {
        if let Some(id) = lane.pop_front() {
            return Some(id);
        }
    }
    None
}

/// Cap the finished ring at the retention limit, dropping oldest first.
fn trim_finished(state: &mut State, retention: usize) {
    while state.finished.len() > retention {
        if let Some(old) = state.finished.pop_front() {
            state.records.remove(&old);
        }
    }
}

enum WorkerStep {
    Claimed(Option<(Uuid, DiscoveryJobData, u32)>),
    Exit,
    Wait(Duration),
}

async fn worker_loop(worker_id: usize, inner: Arc<Inner>, processor: Arc<dyn JobProcessor>) {
    loop {
        let mut notified = std::pin::pin!(inner.wake.notified());
        let step = {
            let mut state = inner.state.lock().unwrap_or_else(|e| e.into_inner());
            let next_due = promote_due(&mut state, Utc::now());
            match pop_waiting(&mut state) {
                Some(id) => {
                    let record = state.records.get_mut(&id);
                    match record {
                        Some(record) => {
                            record.status = JobStatus::Active;
                            record.attempts += 1;
                            WorkerStep::Claimed(Some((id, record.data.clone(), record.attempts)))
                        }
                        None => WorkerStep::Claimed(None),
                    }
                }
                None => {
                    if inner.shutting_down.load(Ordering::SeqCst) {
                        debug!(worker_id, "Queue worker exiting");
                        WorkerStep::Exit
                    } else {
                        // Register the wakeup while still holding the lock, so
                        // an enqueue landing right after the unlock reaches this
                        // worker instead of waiting out the fallback timer.
                        notified.as_mut().enable();
                        let fallback = match next_due {
                            Some(due) => (due - Utc::now()).to_std().unwrap_or(Duration::ZERO),
                            None => Duration::from_secs(60),
                        };
                        WorkerStep::Wait(fallback)
                    }
                }
            }
        };

        let claimed = match step {
            WorkerStep::Claimed(claimed) => claimed,
            WorkerStep::Exit => return,
            WorkerStep::Wait(fallback) => {
                tokio::select! {
                    _ = notified => {}
                    _ = tokio::time::sleep(fallback) => {}
                }
                continue;
            }
        };

        let Some((id, data, attempt)) = claimed else {
            continue;
        };

        debug!(job_id = %id, attempt, worker_id, "Job started");
        let progress = JobProgress { id, inner: inner.clone() };
        let result = processor.process(&data, &progress).await;

        let mut state = inner.state.lock().unwrap_or_else(|e| e.into_inner());
        let Some(record) = state.records.get_mut(&id) else {
            continue;
        };
        match result {
            Ok(()) => {
                record.status = JobStatus::Completed;
                record.progress = 100;
                record.last_error = None;
                state.finished.push_back(id);
                info!(job_id = %id, attempt, "Job completed");
            }
            Err(err) => {
                record.last_error = Some(err.to_string());
                if err.retryable() && attempt < inner.config.max_attempts {
                    // Exponential backoff: base * 2^(attempt-1).
                    let backoff = inner.config.backoff_base * 2u32.saturating_pow(attempt - 1);
                    record.status = JobStatus::Delayed;
                    record.run_at = Some(
                        Utc::now()
                            + chrono::Duration::from_std(backoff)
                                .unwrap_or_else(|_| chrono::Duration::zero()),
                    );
                    state.delayed.push(id);
                    warn!(
                        job_id = %id,
                        attempt,
                        backoff_ms = backoff.as_millis() as u64,
                        error = %err,
                        "Job failed; retrying"
                    );
                } else {
                    record.status = JobStatus::Failed;
                    state.finished.push_back(id);
                    error!(
                        job_id = %id,
                        attempt,
                        retryable = err.retryable(),
                        error = %err,
                        "Job failed permanently"
                    );
                }
            }
        }
        trim_finished(&mut state, inner.config.retention);
        drop(state);
        inner.wake.notify_waiters();
    }
}

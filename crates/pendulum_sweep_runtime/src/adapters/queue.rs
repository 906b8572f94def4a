use std::collections::{HashMap, HashSet};
use std::panic::{self, AssertUnwindSafe};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::mpsc::{self, Receiver, RecvTimeoutError, Sender};
use std::sync::{Arc, Mutex, PoisonError};
use std::thread;
use std::time::{Duration, Instant};

use pendulum_sim::{SimulationWorker, WorkerError};
use pendulum_sweep_core::contract::{ParameterPoint, ResultSet, SimulationResult};

use crate::adapters::broker::{BrokerIntrospection, QueueStats};
use crate::error::{Result, SweepError};

pub const DEFAULT_QUEUE_NAME: &str = "worker";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct JobHandle(u64);

impl JobHandle {
    pub fn new(id: u64) -> Self {
        Self(id)
    }

    pub fn id(self) -> u64 {
        self.0
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SimulationJob {
    /// Position of the point in the grid, used only for logging.
    pub index: usize,
    pub point: ParameterPoint,
}

#[derive(Debug, Clone, PartialEq)]
pub enum JobState {
    Pending,
    Running { attempt: u32 },
    Retrying { attempt: u32 },
    Done,
    Aborted { error: WorkerError },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    pub max_attempts: u32,
    pub initial_backoff: Duration,
    pub max_backoff: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            initial_backoff: Duration::from_millis(100),
            max_backoff: Duration::from_secs(5),
        }
    }
}

impl RetryPolicy {
    pub fn no_retry() -> Self {
        Self {
            max_attempts: 1,
            ..Self::default()
        }
    }

    /// Delay before the attempt following `attempt` (1-based).
    pub fn backoff_for(&self, attempt: u32) -> Duration {
        let exponent = attempt.saturating_sub(1).min(16);
        self.initial_backoff
            .saturating_mul(1u32 << exponent)
            .min(self.max_backoff)
    }

    fn attempts(&self) -> u32 {
        self.max_attempts.max(1)
    }
}

/// Dispatch side of a fan-out/fan-in sweep.
pub trait TaskQueue {
    fn submit(&self, job: SimulationJob) -> Result<JobHandle>;

    /// Blocks until every handle has produced a result or `timeout` elapses.
    ///
    /// Fails with `IncompleteSweep` as soon as any job is aborted, without
    /// waiting for the rest.
    fn await_all(&self, handles: &[JobHandle], timeout: Duration) -> Result<ResultSet>;
}

#[derive(Debug)]
enum JobEvent {
    Finished {
        handle: JobHandle,
        result: SimulationResult,
    },
    Aborted {
        handle: JobHandle,
        error: WorkerError,
    },
}

type JobStates = Arc<Mutex<HashMap<JobHandle, JobState>>>;

/// Runs jobs on a private rayon pool inside the current process.
pub struct InProcessQueue {
    name: String,
    pool: rayon::ThreadPool,
    worker: Arc<dyn SimulationWorker>,
    retry: RetryPolicy,
    next_id: AtomicU64,
    states: JobStates,
    events_tx: Sender<JobEvent>,
    events_rx: Mutex<Receiver<JobEvent>>,
}

impl InProcessQueue {
    pub fn new(
        name: impl Into<String>,
        worker: Arc<dyn SimulationWorker>,
        threads: Option<usize>,
        retry: RetryPolicy,
    ) -> Result<Self> {
        let name = name.into();
        let mut builder = rayon::ThreadPoolBuilder::new()
            .thread_name(|idx| format!("sweep-worker-{idx}"));
        if let Some(threads) = threads {
            builder = builder.num_threads(threads);
        }
        let pool = builder
            .build()
            .map_err(|error| SweepError::Transport(format!("queue '{name}': {error}")))?;
        let (events_tx, events_rx) = mpsc::channel();

        Ok(Self {
            name,
            pool,
            worker,
            retry,
            next_id: AtomicU64::new(0),
            states: Arc::new(Mutex::new(HashMap::new())),
            events_tx,
            events_rx: Mutex::new(events_rx),
        })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn job_state(&self, handle: JobHandle) -> Option<JobState> {
        lock(&self.states).get(&handle).cloned()
    }
}

impl TaskQueue for InProcessQueue {
    fn submit(&self, job: SimulationJob) -> Result<JobHandle> {
        let handle = JobHandle::new(self.next_id.fetch_add(1, Ordering::Relaxed));
        lock(&self.states).insert(handle, JobState::Pending);

        let worker = Arc::clone(&self.worker);
        let states = Arc::clone(&self.states);
        let events = self.events_tx.clone();
        let retry = self.retry;
        self.pool
            .spawn(move || run_job(handle, job, worker.as_ref(), retry, &states, &events));

        Ok(handle)
    }

    fn await_all(&self, handles: &[JobHandle], timeout: Duration) -> Result<ResultSet> {
        let deadline = Instant::now() + timeout;
        let mut pending: HashSet<JobHandle> = handles.iter().copied().collect();
        let mut results = ResultSet::with_expected(handles.len());
        let events = lock(&self.events_rx);

        while !pending.is_empty() {
            let remaining = deadline.saturating_duration_since(Instant::now());
            if remaining.is_zero() {
                return Err(SweepError::incomplete(
                    handles.len(),
                    results.len(),
                    "sweep deadline elapsed",
                ));
            }

            match events.recv_timeout(remaining) {
                Ok(JobEvent::Finished { handle, result }) => {
                    if pending.remove(&handle) {
                        results.push(result);
                    }
                }
                Ok(JobEvent::Aborted { handle, error }) => {
                    if pending.contains(&handle) {
                        return Err(SweepError::incomplete(
                            handles.len(),
                            results.len(),
                            format!("job {} aborted: {error}", handle.id()),
                        ));
                    }
                }
                Err(RecvTimeoutError::Timeout) => {
                    return Err(SweepError::incomplete(
                        handles.len(),
                        results.len(),
                        "sweep deadline elapsed",
                    ));
                }
                Err(RecvTimeoutError::Disconnected) => {
                    return Err(SweepError::Transport(format!(
                        "queue '{}' event channel closed",
                        self.name
                    )));
                }
            }
        }

        Ok(results)
    }
}

impl BrokerIntrospection for InProcessQueue {
    fn list_queues(&self) -> Result<Vec<QueueStats>> {
        let waiting = lock(&self.states)
            .values()
            .filter(|state| matches!(state, JobState::Pending | JobState::Retrying { .. }))
            .count();

        Ok(vec![QueueStats {
            name: self.name.clone(),
            messages: waiting as u64,
            consumers: self.pool.current_num_threads() as u64,
        }])
    }
}

fn run_job(
    handle: JobHandle,
    job: SimulationJob,
    worker: &dyn SimulationWorker,
    retry: RetryPolicy,
    states: &Mutex<HashMap<JobHandle, JobState>>,
    events: &Sender<JobEvent>,
) {
    let attempts = retry.attempts();
    for attempt in 1..=attempts {
        set_state(states, handle, JobState::Running { attempt });

        let outcome = panic::catch_unwind(AssertUnwindSafe(|| worker.simulate(&job.point)))
            .unwrap_or_else(|payload| Err(WorkerError::Crashed(panic_message(payload.as_ref()))));

        let event = match outcome {
            Ok(result) => {
                set_state(states, handle, JobState::Done);
                JobEvent::Finished { handle, result }
            }
            Err(error) if error.is_retryable() && attempt < attempts => {
                let backoff = retry.backoff_for(attempt);
                set_state(states, handle, JobState::Retrying { attempt });
                tracing::warn!(
                    component = "task_queue",
                    event = "job_retry",
                    job_id = handle.id(),
                    point_index = job.index,
                    attempt,
                    backoff_ms = backoff.as_millis() as u64,
                    error = %error,
                );
                thread::sleep(backoff);
                continue;
            }
            Err(error) => {
                set_state(
                    states,
                    handle,
                    JobState::Aborted {
                        error: error.clone(),
                    },
                );
                tracing::error!(
                    component = "task_queue",
                    event = "job_aborted",
                    job_id = handle.id(),
                    point_index = job.index,
                    attempt,
                    error_code = error.code(),
                    error = %error,
                );
                JobEvent::Aborted { handle, error }
            }
        };

        // The receiver only goes away with the queue itself.
        let _ = events.send(event);
        return;
    }
}

fn set_state(states: &Mutex<HashMap<JobHandle, JobState>>, handle: JobHandle, state: JobState) {
    lock(states).insert(handle, state);
}

fn lock<T>(mutex: &Mutex<T>) -> std::sync::MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

fn panic_message(payload: &(dyn std::any::Any + Send)) -> String {
    if let Some(message) = payload.downcast_ref::<&str>() {
        (*message).to_string()
    } else if let Some(message) = payload.downcast_ref::<String>() {
        message.clone()
    } else {
        "worker panicked".to_string()
    }
}

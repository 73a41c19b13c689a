//! Named worker pool: lazy creation, request correlation, timeouts, teardown.
//!
//! Each logical worker name maps to at most one live [`WorkerHandle`]. A handle
//! runs one task at a time; concurrent callers for the same name queue on the
//! handle in FIFO order. The turn is held by a settle task until the runtime
//! answers, so a caller that abandons its call cannot let the next task in
//! early. A timed-out or disconnected handle is terminated and removed, and
//! the next call for that name transparently creates a new one.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError, mpsc};
use std::time::Duration;

use chrono::{DateTime, Utc};
use policylens_core::{ErrorKind, RequestEnvelope, ResponseEnvelope, TaskStatus};
use serde_json::Value;
use tokio::sync::{OwnedMutexGuard, oneshot};
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use crate::config::PoolConfig;
use crate::error::PoolError;
use crate::runtime::{CancelToken, Dispatch, WorkerFactory, spawn_runtime};

type PendingMap = Arc<Mutex<HashMap<String, oneshot::Sender<ResponseEnvelope>>>>;
type Registry = Arc<Mutex<HashMap<String, Arc<WorkerHandle>>>>;

/// Lifecycle state of a live handle. A name with no handle is "uncreated".
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WorkerState {
    Idle,
    Busy,
    Terminated,
}

/// Point-in-time view of a worker handle.
#[derive(Debug, Clone)]
pub struct WorkerSnapshot {
    pub name: String,
    pub state: WorkerState,
    pub busy: bool,
    pub completed_task_count: u64,
    pub created_at: DateTime<Utc>,
}

/// Pool-side handle to one runtime thread.
struct WorkerHandle {
    name: String,
    /// `None` once terminated; dropping the sender stops the runtime loop.
    requests: Mutex<Option<mpsc::Sender<Dispatch>>>,
    pending: PendingMap,
    /// Held from dispatch until the runtime answers, so only one task is
    /// ever in flight.
    turn: Arc<tokio::sync::Mutex<()>>,
    /// Cancellation for the task in flight, if any.
    current: Mutex<Option<CancelToken>>,
    busy: AtomicBool,
    terminated: AtomicBool,
    completed: AtomicU64,
    created_at: DateTime<Utc>,
    router: JoinHandle<()>,
}

impl WorkerHandle {
    fn spawn(name: &str, factory: &dyn WorkerFactory) -> Result<Arc<Self>, PoolError> {
        let construction = |reason: String| PoolError::Construction {
            name: name.to_string(),
            reason,
        };

        let handler = factory.create(name).map_err(|e| construction(e.to_string()))?;
        let channels = spawn_runtime(name, handler).map_err(|e| construction(e.to_string()))?;

        let pending: PendingMap = Arc::default();
        let router = tokio::spawn(route_responses(
            name.to_string(),
            channels.responses,
            pending.clone(),
        ));

        Ok(Arc::new(Self {
            name: name.to_string(),
            requests: Mutex::new(Some(channels.requests)),
            pending,
            turn: Arc::new(tokio::sync::Mutex::new(())),
            current: Mutex::new(None),
            busy: AtomicBool::new(false),
            terminated: AtomicBool::new(false),
            completed: AtomicU64::new(0),
            created_at: Utc::now(),
            router,
        }))
    }

    fn is_terminated(&self) -> bool {
        self.terminated.load(Ordering::SeqCst)
    }

    fn send(&self, dispatch: Dispatch) -> bool {
        match lock(&self.requests).as_ref() {
            Some(tx) => tx.send(dispatch).is_ok(),
            None => false,
        }
    }

    /// Stop the runtime and fail any pending call. Idempotent.
    fn terminate(&self) {
        if self.terminated.swap(true, Ordering::SeqCst) {
            return;
        }
        if let Some(cancel) = lock(&self.current).take() {
            cancel.cancel();
        }
        lock(&self.requests).take();
        self.router.abort();
        lock(&self.pending).clear();
        self.busy.store(false, Ordering::SeqCst);
        info!(worker = %self.name, "worker terminated");
    }

    fn complete(&self, response: ResponseEnvelope) -> Result<Value, PoolError> {
        match response.status() {
            TaskStatus::Success => {
                self.completed.fetch_add(1, Ordering::SeqCst);
                debug!(worker = %self.name, task_id = %response.task_id, "task complete");
                Ok(response.result.unwrap_or(Value::Null))
            }
            TaskStatus::Error => {
                let message = response
                    .error
                    .unwrap_or_else(|| "worker reported an error".to_string());
                debug!(worker = %self.name, task_id = %response.task_id, error = %message, "task failed");
                Err(match response.error_kind {
                    Some(ErrorKind::Protocol) => PoolError::Protocol(message),
                    _ => PoolError::Task(message),
                })
            }
        }
    }

    fn snapshot(&self) -> WorkerSnapshot {
        let busy = self.busy.load(Ordering::SeqCst);
        let state = if self.is_terminated() {
            WorkerState::Terminated
        } else if busy {
            WorkerState::Busy
        } else {
            WorkerState::Idle
        };
        WorkerSnapshot {
            name: self.name.clone(),
            state,
            busy,
            completed_task_count: self.completed.load(Ordering::SeqCst),
            created_at: self.created_at,
        }
    }
}

/// Deliver each response to the call waiting on its `taskId`.
async fn route_responses(
    worker: String,
    mut responses: tokio::sync::mpsc::UnboundedReceiver<ResponseEnvelope>,
    pending: PendingMap,
) {
    while let Some(response) = responses.recv().await {
        let waiter = lock(&pending).remove(&response.task_id);
        match waiter {
            Some(tx) => {
                if tx.send(response).is_err() {
                    debug!(worker = %worker, "caller went away before response arrived");
                }
            }
            None => warn!(
                worker = %worker,
                task_id = %response.task_id,
                "dropping response with no pending call"
            ),
        }
    }
    // Runtime exited: dropping the senders wakes any waiter with an error.
    lock(&pending).clear();
    debug!(worker = %worker, "response router stopped");
}

/// A task accepted by a runtime thread and not yet answered.
struct InFlight {
    task_id: String,
    response: oneshot::Receiver<ResponseEnvelope>,
    cancel: CancelToken,
}

/// Wait for the runtime's answer to `flight`, then release the turn.
///
/// Runs as its own task: if the caller stops waiting, the handle still leaves
/// `Busy` only when the runtime answers or the handle is torn down.
async fn settle(
    workers: Registry,
    handle: Arc<WorkerHandle>,
    flight: InFlight,
    _turn: OwnedMutexGuard<()>,
    timeout: Duration,
) -> Result<Value, PoolError> {
    let InFlight {
        task_id,
        response,
        cancel,
    } = flight;

    let outcome = tokio::time::timeout(timeout, response).await;
    handle.busy.store(false, Ordering::SeqCst);
    lock(&handle.current).take();

    match outcome {
        Ok(Ok(response)) => handle.complete(response),
        Ok(Err(_)) => {
            warn!(worker = %handle.name, task_id = %task_id, "worker disconnected mid-task");
            discard(&workers, &handle);
            Err(PoolError::Disconnected {
                name: handle.name.clone(),
            })
        }
        Err(_) => {
            cancel.cancel();
            lock(&handle.pending).remove(&task_id);
            let timeout_ms = u64::try_from(timeout.as_millis()).unwrap_or(u64::MAX);
            warn!(worker = %handle.name, task_id = %task_id, timeout_ms, "task timed out");
            discard(&workers, &handle);
            Err(PoolError::Timeout {
                name: handle.name.clone(),
                task_id,
                timeout_ms,
            })
        }
    }
}

/// Terminate `handle` and remove it if it is still the registered one.
fn discard(workers: &Registry, handle: &Arc<WorkerHandle>) {
    {
        let mut workers = lock(workers);
        if workers
            .get(&handle.name)
            .is_some_and(|current| Arc::ptr_eq(current, handle))
        {
            workers.remove(&handle.name);
        }
    }
    handle.terminate();
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

/// Owns every named worker and dispatches tasks to them.
pub struct WorkerPool {
    config: PoolConfig,
    factory: Arc<dyn WorkerFactory>,
    workers: Registry,
    next_task: AtomicU64,
}

impl WorkerPool {
    pub fn new(config: PoolConfig, factory: Arc<dyn WorkerFactory>) -> Self {
        Self {
            config,
            factory,
            workers: Registry::default(),
            next_task: AtomicU64::new(1),
        }
    }

    pub fn config(&self) -> &PoolConfig {
        &self.config
    }

    /// Run one task on the named worker and wait for its result.
    ///
    /// `task_type` is the wire name and is validated by the worker, so an
    /// unknown type yields [`PoolError::Protocol`] and leaves the worker idle.
    /// `timeout` defaults to the configured timeout and counts from dispatch;
    /// time spent queued behind another task on the same worker is not
    /// included.
    ///
    /// Dropping the returned future does not cancel a dispatched task: the
    /// worker stays busy until it answers or times out, and later calls queue
    /// behind it.
    ///
    /// # Panics
    ///
    /// Must be polled within a Tokio runtime; creating a worker and waiting
    /// for its answer both spawn Tokio tasks.
    pub async fn run_task(
        &self,
        name: &str,
        task_type: &str,
        payload: Value,
        timeout: Option<Duration>,
    ) -> Result<Value, PoolError> {
        let timeout = timeout.unwrap_or_else(|| self.config.default_timeout());

        loop {
            let handle = self.acquire(name)?;
            let turn = handle.turn.clone().lock_owned().await;
            // A queued caller may find the handle torn down by the task ahead.
            if handle.is_terminated() {
                continue;
            }
            let flight = self.dispatch(&handle, task_type, payload)?;
            let settled = tokio::spawn(settle(
                self.workers.clone(),
                handle.clone(),
                flight,
                turn,
                timeout,
            ));
            return settled.await.unwrap_or_else(|e| {
                warn!(worker = %name, error = %e, "settle task did not finish");
                Err(PoolError::Disconnected {
                    name: name.to_string(),
                })
            });
        }
    }

    /// Hand one request to the handle's runtime thread.
    fn dispatch(
        &self,
        handle: &Arc<WorkerHandle>,
        task_type: &str,
        payload: Value,
    ) -> Result<InFlight, PoolError> {
        let task_id = format!(
            "{}-{}",
            handle.name,
            self.next_task.fetch_add(1, Ordering::Relaxed)
        );
        let (tx, rx) = oneshot::channel();
        lock(&handle.pending).insert(task_id.clone(), tx);

        let cancel = CancelToken::new();
        *lock(&handle.current) = Some(cancel.clone());
        handle.busy.store(true, Ordering::SeqCst);
        let sent = handle.send(Dispatch {
            request: RequestEnvelope::new(task_id.clone(), task_type, payload),
            cancel: cancel.clone(),
        });
        if !sent {
            lock(&handle.pending).remove(&task_id);
            discard(&self.workers, handle);
            return Err(PoolError::Disconnected {
                name: handle.name.clone(),
            });
        }
        debug!(worker = %handle.name, task_id = %task_id, task_type, "task dispatched");

        Ok(InFlight {
            task_id,
            response: rx,
            cancel,
        })
    }

    /// Live handle for `name`, creating one if needed.
    fn acquire(&self, name: &str) -> Result<Arc<WorkerHandle>, PoolError> {
        let mut workers = lock(&self.workers);
        if let Some(handle) = workers.get(name) {
            if !handle.is_terminated() {
                return Ok(handle.clone());
            }
            workers.remove(name);
        }

        if workers.len() >= self.config.max_workers {
            return Err(PoolError::Construction {
                name: name.to_string(),
                reason: format!("pool is full ({} workers)", self.config.max_workers),
            });
        }

        let handle = WorkerHandle::spawn(name, self.factory.as_ref())?;
        workers.insert(name.to_string(), handle.clone());
        info!(worker = %name, live = workers.len(), "worker created");
        Ok(handle)
    }

    /// Terminate the named worker. Returns `false` if none was live.
    pub fn terminate(&self, name: &str) -> bool {
        let removed = lock(&self.workers).remove(name);
        match removed {
            Some(handle) => {
                handle.terminate();
                true
            }
            None => false,
        }
    }

    /// Terminate every worker. Later calls create fresh workers on demand.
    pub fn shutdown(&self) {
        let drained: Vec<_> = lock(&self.workers).drain().map(|(_, h)| h).collect();
        for handle in &drained {
            handle.terminate();
        }
        info!(count = drained.len(), "worker pool shut down");
    }

    /// Snapshots of all live workers, sorted by name.
    pub fn workers(&self) -> Vec<WorkerSnapshot> {
        let mut snapshots: Vec<_> = lock(&self.workers)
            .values()
            .map(|h| h.snapshot())
            .collect();
        snapshots.sort_by(|a, b| a.name.cmp(&b.name));
        snapshots
    }

    pub fn contains(&self, name: &str) -> bool {
        lock(&self.workers).contains_key(name)
    }

    pub fn len(&self) -> usize {
        lock(&self.workers).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl Drop for WorkerPool {
    fn drop(&mut self) {
        for handle in lock(&self.workers).values() {
            handle.terminate();
        }
    }
}

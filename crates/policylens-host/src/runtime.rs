//! Worker runtime: an isolated OS thread that executes one task at a time.
//!
//! The runtime owns its handler and communicates with the pool only through
//! channels: [`Dispatch`] messages in, [`ResponseEnvelope`]s out. It holds no
//! state between tasks and never exits because a task failed; it stops when
//! the pool drops its request sender or stops reading responses.

use std::any::Any;
use std::panic::{self, AssertUnwindSafe};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::mpsc;
use std::thread;

use policylens_core::{
    AnalyzePolicyPayload, ErrorKind, ExtractClausesPayload, RequestEnvelope, ResponseEnvelope,
    RiskScorePayload, TaskType,
};
use serde::Serialize;
use serde::de::DeserializeOwned;
use serde_json::Value;
use tokio::sync::mpsc::{UnboundedReceiver, UnboundedSender, unbounded_channel};
use tracing::{debug, info};

/// Worker name served by [`AnalysisWorkerFactory`].
pub const ANALYSIS_WORKER: &str = "analysis";

/// Cooperative cancellation flag shared between the pool and a running task.
///
/// The pool cancels the token when a task times out; handlers doing long work
/// may poll [`is_cancelled`](Self::is_cancelled) and return early.
#[derive(Debug, Clone, Default)]
pub struct CancelToken(Arc<AtomicBool>);

impl CancelToken {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}

/// Executes a recognised task. Errors become `ERROR` responses.
pub trait TaskHandler: Send + Sync + 'static {
    fn handle(&self, task: TaskType, data: Value, cancel: &CancelToken) -> Result<Value, String>;
}

/// Production handler: routes each task type to its analysis algorithm.
#[derive(Debug, Clone, Copy, Default)]
pub struct AnalysisHandler;

impl TaskHandler for AnalysisHandler {
    fn handle(&self, task: TaskType, data: Value, _cancel: &CancelToken) -> Result<Value, String> {
        match task {
            TaskType::AnalyzePolicy => {
                let payload: AnalyzePolicyPayload = decode(data)?;
                encode(&policylens_analysis::analyze_policy(
                    &payload.text,
                    payload.options,
                ))
            }
            TaskType::ExtractClauses => {
                let payload: ExtractClausesPayload = decode(data)?;
                encode(&policylens_analysis::extract_clauses(&payload.text))
            }
            TaskType::CalculateRiskScore => {
                let payload: RiskScorePayload = decode(data)?;
                encode(&policylens_analysis::calculate_risk_score(&payload.clauses))
            }
        }
    }
}

fn decode<T: DeserializeOwned>(data: Value) -> Result<T, String> {
    serde_json::from_value(data).map_err(|e| format!("invalid payload: {e}"))
}

fn encode<T: Serialize>(value: &T) -> Result<Value, String> {
    serde_json::to_value(value).map_err(|e| format!("failed to encode result: {e}"))
}

/// Creates the handler behind a named worker.
///
/// Returning an error means the worker cannot be constructed; the pool
/// rejects the call without registering anything.
pub trait WorkerFactory: Send + Sync + 'static {
    fn create(&self, name: &str) -> anyhow::Result<Arc<dyn TaskHandler>>;
}

/// Serves [`ANALYSIS_WORKER`] with an [`AnalysisHandler`]; any other name fails.
#[derive(Debug, Clone, Copy, Default)]
pub struct AnalysisWorkerFactory;

impl WorkerFactory for AnalysisWorkerFactory {
    fn create(&self, name: &str) -> anyhow::Result<Arc<dyn TaskHandler>> {
        anyhow::ensure!(name == ANALYSIS_WORKER, "no worker registered under '{name}'");
        Ok(Arc::new(AnalysisHandler))
    }
}

/// One unit of work sent to a runtime thread.
pub(crate) struct Dispatch {
    pub request: RequestEnvelope,
    pub cancel: CancelToken,
}

/// Execute a request against `handler`, producing exactly one response.
///
/// Unknown task types become `protocol` errors. Handler errors and panics
/// become `algorithm` errors.
pub fn process_request(
    handler: &dyn TaskHandler,
    request: RequestEnvelope,
    cancel: &CancelToken,
) -> ResponseEnvelope {
    let RequestEnvelope {
        task_type,
        data,
        task_id,
    } = request;

    let task = match task_type.parse::<TaskType>() {
        Ok(task) => task,
        Err(e) => return ResponseEnvelope::failure(task_id, ErrorKind::Protocol, e.to_string()),
    };

    match panic::catch_unwind(AssertUnwindSafe(|| handler.handle(task, data, cancel))) {
        Ok(Ok(result)) => ResponseEnvelope::success(task_id, task, result),
        Ok(Err(message)) => ResponseEnvelope::failure(task_id, ErrorKind::Algorithm, message),
        Err(panic) => ResponseEnvelope::failure(
            task_id,
            ErrorKind::Algorithm,
            format!("handler panicked: {}", panic_message(panic.as_ref())),
        ),
    }
}

fn panic_message(panic: &(dyn Any + Send)) -> &str {
    if let Some(s) = panic.downcast_ref::<&str>() {
        s
    } else if let Some(s) = panic.downcast_ref::<String>() {
        s.as_str()
    } else {
        "unknown panic"
    }
}

/// Channels connecting the pool to a freshly spawned runtime thread.
pub(crate) struct RuntimeChannels {
    pub requests: mpsc::Sender<Dispatch>,
    pub responses: UnboundedReceiver<ResponseEnvelope>,
}

/// Spawn a runtime thread named `policylens-<name>`.
pub(crate) fn spawn_runtime(
    name: &str,
    handler: Arc<dyn TaskHandler>,
) -> std::io::Result<RuntimeChannels> {
    let (request_tx, request_rx) = mpsc::channel::<Dispatch>();
    let (response_tx, response_rx) = unbounded_channel();
    let worker = name.to_string();

    thread::Builder::new()
        .name(format!("policylens-{name}"))
        .spawn(move || run_loop(&worker, handler.as_ref(), request_rx, response_tx))?;

    info!(worker = %name, "worker runtime started");
    Ok(RuntimeChannels {
        requests: request_tx,
        responses: response_rx,
    })
}

fn run_loop(
    worker: &str,
    handler: &dyn TaskHandler,
    requests: mpsc::Receiver<Dispatch>,
    responses: UnboundedSender<ResponseEnvelope>,
) {
    while let Ok(Dispatch { request, cancel }) = requests.recv() {
        let task_id = request.task_id.clone();
        debug!(worker, task_id = %task_id, task_type = %request.task_type, "task received");
        let response = process_request(handler, request, &cancel);
        if responses.send(response).is_err() {
            debug!(worker, task_id = %task_id, "response channel closed");
            break;
        }
    }
    debug!(worker, "worker runtime stopped");
}

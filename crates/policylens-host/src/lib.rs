//! Worker host: isolated runtime threads, the named worker pool, and the typed
//! task API callers use to reach them.

mod api;
mod config;
mod error;
mod pool;
mod runtime;

pub use api::AnalysisClient;
pub use config::{DEFAULT_MAX_WORKERS, DEFAULT_TIMEOUT_MS, PoolConfig};
pub use error::PoolError;
pub use pool::{WorkerPool, WorkerSnapshot, WorkerState};
pub use runtime::{
    ANALYSIS_WORKER, AnalysisHandler, AnalysisWorkerFactory, CancelToken, TaskHandler,
    WorkerFactory, process_request,
};

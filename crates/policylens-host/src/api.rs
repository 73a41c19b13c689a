//! Typed entry points over the worker pool.

use std::sync::Arc;

use policylens_core::{
    AnalyzeOptions, AnalyzePolicyPayload, ClauseRecord, ExtractClausesPayload, PolicyAnalysis,
    RiskScorePayload, RiskScoreResult, TaskType,
};
use serde::Serialize;
use serde::de::DeserializeOwned;
use serde_json::Value;

use crate::config::PoolConfig;
use crate::error::PoolError;
use crate::pool::WorkerPool;
use crate::runtime::{ANALYSIS_WORKER, AnalysisWorkerFactory};

/// Stable, typed surface for the analysis engine.
///
/// Every call runs on the [`ANALYSIS_WORKER`] worker and either resolves or
/// rejects exactly once; nothing is retried.
#[derive(Clone)]
pub struct AnalysisClient {
    pool: Arc<WorkerPool>,
}

impl AnalysisClient {
    pub fn new(pool: Arc<WorkerPool>) -> Self {
        Self { pool }
    }

    /// Client over a fresh pool backed by the production analysis worker.
    pub fn with_config(config: PoolConfig) -> Self {
        Self::new(Arc::new(WorkerPool::new(
            config,
            Arc::new(AnalysisWorkerFactory),
        )))
    }

    pub fn pool(&self) -> &Arc<WorkerPool> {
        &self.pool
    }

    pub async fn analyze_policy_text(
        &self,
        text: &str,
        options: Option<AnalyzeOptions>,
    ) -> Result<PolicyAnalysis, PoolError> {
        let payload = AnalyzePolicyPayload {
            text: text.to_string(),
            options: options.unwrap_or_default(),
        };
        self.call(TaskType::AnalyzePolicy, &payload).await
    }

    pub async fn extract_clauses(&self, text: &str) -> Result<Vec<ClauseRecord>, PoolError> {
        let payload = ExtractClausesPayload {
            text: text.to_string(),
        };
        self.call(TaskType::ExtractClauses, &payload).await
    }

    /// `user_profile` is forwarded to the worker but does not affect weighting.
    pub async fn calculate_risk_score(
        &self,
        clauses: &[ClauseRecord],
        user_profile: Option<Value>,
    ) -> Result<RiskScoreResult, PoolError> {
        let payload = RiskScorePayload {
            clauses: clauses.to_vec(),
            user_profile,
        };
        self.call(TaskType::CalculateRiskScore, &payload).await
    }

    async fn call<P, R>(&self, task: TaskType, payload: &P) -> Result<R, PoolError>
    where
        P: Serialize,
        R: DeserializeOwned,
    {
        let data = serde_json::to_value(payload)?;
        let result = self
            .pool
            .run_task(ANALYSIS_WORKER, task.as_str(), data, None)
            .await?;
        Ok(serde_json::from_value(result)?)
    }
}

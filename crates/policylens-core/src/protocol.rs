//! Task protocol shared by the pool (caller side) and worker runtimes.
//!
//! A request travels caller → worker as a [`RequestEnvelope`]; exactly one
//! [`ResponseEnvelope`] travels back. The request keeps its `type` as the raw
//! wire string so that an unrecognised task type still reaches the worker and
//! is answered with an `ERROR` response instead of failing on the caller side.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use serde_json::Value;
use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ProtocolError {
    #[error("Unknown task type: {0}")]
    UnknownTaskType(String),
}

/// The closed set of tasks a worker runtime knows how to execute.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum TaskType {
    AnalyzePolicy,
    CalculateRiskScore,
    ExtractClauses,
}

impl TaskType {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::AnalyzePolicy => "ANALYZE_POLICY",
            Self::CalculateRiskScore => "CALCULATE_RISK_SCORE",
            Self::ExtractClauses => "EXTRACT_CLAUSES",
        }
    }

    /// Response type emitted when this task completes successfully.
    pub fn completion(&self) -> ResponseKind {
        match self {
            Self::AnalyzePolicy => ResponseKind::AnalysisComplete,
            Self::CalculateRiskScore => ResponseKind::RiskScoreComplete,
            Self::ExtractClauses => ResponseKind::ClausesExtracted,
        }
    }
}

impl fmt::Display for TaskType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for TaskType {
    type Err = ProtocolError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "ANALYZE_POLICY" => Ok(Self::AnalyzePolicy),
            "CALCULATE_RISK_SCORE" => Ok(Self::CalculateRiskScore),
            "EXTRACT_CLAUSES" => Ok(Self::ExtractClauses),
            other => Err(ProtocolError::UnknownTaskType(other.to_string())),
        }
    }
}

/// Caller → worker message.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RequestEnvelope {
    /// Wire name of the task type; not validated until the worker sees it.
    #[serde(rename = "type")]
    pub task_type: String,
    pub data: Value,
    pub task_id: String,
}

impl RequestEnvelope {
    pub fn new(task_id: impl Into<String>, task_type: impl Into<String>, data: Value) -> Self {
        Self {
            task_type: task_type.into(),
            data,
            task_id: task_id.into(),
        }
    }
}

/// Worker → caller message type.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ResponseKind {
    AnalysisComplete,
    RiskScoreComplete,
    ClausesExtracted,
    Error,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum TaskStatus {
    Success,
    Error,
}

/// Why a worker answered with `ERROR`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ErrorKind {
    /// The request named a task type the worker does not know.
    Protocol,
    /// The task's handler failed (bad payload, panic, handler error).
    Algorithm,
}

/// Worker → caller message. Carries the originating `taskId` so the pool
/// can correlate it with the pending call.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ResponseEnvelope {
    #[serde(rename = "type")]
    pub kind: ResponseKind,
    pub task_id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub result: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error_kind: Option<ErrorKind>,
}

impl ResponseEnvelope {
    pub fn success(task_id: impl Into<String>, task_type: TaskType, result: Value) -> Self {
        Self {
            kind: task_type.completion(),
            task_id: task_id.into(),
            result: Some(result),
            error: None,
            error_kind: None,
        }
    }

    pub fn failure(task_id: impl Into<String>, kind: ErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind: ResponseKind::Error,
            task_id: task_id.into(),
            result: None,
            error: Some(message.into()),
            error_kind: Some(kind),
        }
    }

    pub fn status(&self) -> TaskStatus {
        match self.kind {
            ResponseKind::Error => TaskStatus::Error,
            _ => TaskStatus::Success,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn task_type_parses_wire_names() {
        for t in [
            TaskType::AnalyzePolicy,
            TaskType::CalculateRiskScore,
            TaskType::ExtractClauses,
        ] {
            assert_eq!(t.as_str().parse::<TaskType>(), Ok(t));
        }
    }

    #[test]
    fn unknown_task_type_is_rejected() {
        let err = "SUMMARISE".parse::<TaskType>().unwrap_err();
        assert_eq!(err, ProtocolError::UnknownTaskType("SUMMARISE".into()));
        assert_eq!(err.to_string(), "Unknown task type: SUMMARISE");
    }

    #[test]
    fn request_envelope_wire_shape() {
        let req = RequestEnvelope::new("analysis-1", "EXTRACT_CLAUSES", json!({"text": "x"}));
        let v = serde_json::to_value(&req).unwrap();
        assert_eq!(
            v,
            json!({"type": "EXTRACT_CLAUSES", "data": {"text": "x"}, "taskId": "analysis-1"})
        );
    }

    #[test]
    fn success_response_wire_shape() {
        let resp = ResponseEnvelope::success("t-1", TaskType::CalculateRiskScore, json!({"score": 0}));
        assert_eq!(resp.status(), TaskStatus::Success);
        let v = serde_json::to_value(&resp).unwrap();
        assert_eq!(
            v,
            json!({"type": "RISK_SCORE_COMPLETE", "taskId": "t-1", "result": {"score": 0}})
        );
    }

    #[test]
    fn error_response_wire_shape() {
        let resp = ResponseEnvelope::failure("t-2", ErrorKind::Protocol, "Unknown task type: X");
        assert_eq!(resp.status(), TaskStatus::Error);
        let v = serde_json::to_value(&resp).unwrap();
        assert_eq!(
            v,
            json!({
                "type": "ERROR",
                "taskId": "t-2",
                "error": "Unknown task type: X",
                "errorKind": "protocol"
            })
        );
    }

    #[test]
    fn completion_kinds() {
        assert_eq!(TaskType::AnalyzePolicy.completion(), ResponseKind::AnalysisComplete);
        assert_eq!(TaskType::ExtractClauses.completion(), ResponseKind::ClausesExtracted);
    }
}

pub mod model;
pub mod protocol;

pub use model::{
    AnalyzeOptions, AnalyzePolicyPayload, Category, ClauseRecord, ExtractClausesPayload, KeyTerm,
    PatternMatch, PolicyAnalysis, RiskIndicator, RiskLevel, RiskScorePayload, RiskScoreResult,
};
pub use protocol::{
    ErrorKind, ProtocolError, RequestEnvelope, ResponseEnvelope, ResponseKind, TaskStatus,
    TaskType,
};

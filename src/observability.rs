//! Observability module for correlating a swap across its stages

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Correlation ID for tracking one swap across components
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Hash)]
pub struct CorrelationId(String);

impl CorrelationId {
    /// Create a new correlation ID
    pub fn new() -> Self {
        Self(Uuid::new_v4().to_string())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Default for CorrelationId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for CorrelationId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<&str> for CorrelationId {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

/// Per-execution trace context
///
/// Created once per `execute` call; every log line and span for that swap
/// carries its correlation id.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SwapTrace {
    pub correlation_id: CorrelationId,

    /// Operation name ("execute", "preview")
    pub operation: String,

    pub started_at: DateTime<Utc>,
}

impl SwapTrace {
    pub fn new(operation: &str) -> Self {
        Self {
            correlation_id: CorrelationId::new(),
            operation: operation.to_string(),
            started_at: Utc::now(),
        }
    }

    /// Milliseconds since the trace was created
    pub fn elapsed_ms(&self) -> u64 {
        (Utc::now() - self.started_at).num_milliseconds().max(0) as u64
    }
}

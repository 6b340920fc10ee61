//! Resolution telemetry
//!
//! Every terminal resolution (resolved / clarification / unresolved) is
//! recorded for offline quality analysis. Writes go through the
//! conversation store and are best-effort: a failed append must never
//! block the user-visible reply.

use serde::{Deserialize, Serialize};

use crate::metric::{ConfidenceBand, Intent};
use crate::planner::ResolutionTier;

/// How a turn ended, from the resolver's point of view.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ResolutionOutcome {
    Resolved,
    Clarification,
    Unresolved,
}

impl ResolutionOutcome {
    pub fn as_str(&self) -> &'static str {
        match self {
            ResolutionOutcome::Resolved => "resolved",
            ResolutionOutcome::Clarification => "clarification",
            ResolutionOutcome::Unresolved => "unresolved",
        }
    }
}

/// One telemetry record per terminal resolution.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TelemetryEvent {
    pub normalized_prompt: String,
    pub outcome: ResolutionOutcome,
    pub tier: Option<ResolutionTier>,
    pub intent: Option<Intent>,
    pub confidence: Option<ConfidenceBand>,
    pub target: Option<String>,
}

impl TelemetryEvent {
    pub fn unresolved(normalized_prompt: impl Into<String>) -> Self {
        TelemetryEvent {
            normalized_prompt: normalized_prompt.into(),
            outcome: ResolutionOutcome::Unresolved,
            tier: None,
            intent: None,
            confidence: None,
            target: None,
        }
    }
}

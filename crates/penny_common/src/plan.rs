//! Query plans and session context
//!
//! A `QueryPlan` is the resolved-but-not-yet-executed interpretation of a
//! question. Deriving a `Query` from it assigns an id and applies the
//! per-intent default and clamped result limit. `SessionContext` is the
//! only cross-turn memory on the query side; the contextual-continuation
//! tier is its sole consumer.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::dates::{DateRange, PeriodUnit};
use crate::metric::{ConfidenceBand, Intent, Metric};

/// Result limits are clamped into this range when a query is derived.
pub const RESULT_LIMIT_MIN: u32 = 1;
pub const RESULT_LIMIT_MAX: u32 = 20;

/// Resolved interpretation of a user question, not yet executed.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QueryPlan {
    pub metric: Metric,
    pub date_range: Option<DateRange>,
    pub result_limit: Option<u32>,
    pub confidence: ConfidenceBand,
    pub target_name: Option<String>,
    pub period_unit: Option<PeriodUnit>,
}

impl QueryPlan {
    pub fn new(metric: Metric, confidence: ConfidenceBand) -> Self {
        QueryPlan {
            metric,
            date_range: None,
            result_limit: None,
            confidence,
            target_name: None,
            period_unit: None,
        }
    }

    pub fn with_date_range(mut self, range: DateRange) -> Self {
        self.date_range = Some(range);
        self
    }

    pub fn with_target(mut self, target: impl Into<String>) -> Self {
        self.target_name = Some(target.into());
        self
    }

    pub fn with_limit(mut self, limit: u32) -> Self {
        self.result_limit = Some(limit);
        self
    }

    /// Derive the executable query: generated id, defaulted and clamped
    /// result limit.
    pub fn to_query(&self) -> Query {
        let limit = self
            .result_limit
            .unwrap_or_else(|| self.metric.default_result_limit())
            .clamp(RESULT_LIMIT_MIN, RESULT_LIMIT_MAX);
        Query {
            id: Uuid::new_v4(),
            intent: self.metric.intent(),
            date_range: self.date_range,
            result_limit: limit,
            target_name: self.target_name.clone(),
        }
    }
}

/// Fully executable query handed to the query execution engine.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Query {
    pub id: Uuid,
    pub intent: Intent,
    pub date_range: Option<DateRange>,
    pub result_limit: u32,
    pub target_name: Option<String>,
}

/// Per-conversation memory consumed by the continuation tier.
///
/// Updated after every successfully executed query; cleared together with
/// any pending state when the user clears the conversation.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SessionContext {
    pub last_metric: Option<Metric>,
    pub last_date_range: Option<DateRange>,
    pub last_target_name: Option<String>,
    pub last_result_limit: Option<u32>,
    pub last_period_unit: Option<PeriodUnit>,
}

impl SessionContext {
    /// Record an executed plan. The result limit is only retained for
    /// rankable metrics; "top 3 categories" followed by "card spend" must
    /// not leak the 3 into the card query.
    pub fn record(&mut self, plan: &QueryPlan) {
        self.last_metric = Some(plan.metric);
        self.last_date_range = plan.date_range;
        self.last_target_name = plan.target_name.clone();
        self.last_result_limit = if plan.metric.is_rankable() {
            plan.result_limit
        } else {
            None
        };
        self.last_period_unit = plan.period_unit;
    }

    pub fn clear(&mut self) {
        *self = SessionContext::default();
    }
}

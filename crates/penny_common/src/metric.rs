//! Metrics, intents and confidence bands
//!
//! A `Metric` is the budgeting question type the planner resolves to; its
//! `Intent` is the externally addressable identity of the same thing. The
//! mapping is total and bidirectional - a new metric without an intent (or
//! vice versa) is a compile error, never a runtime default.
//!
//! The per-metric policy tables (which metrics expect a date range, which
//! need a target, which keep a result limit in session) are deliberate
//! explicit match functions rather than scattered control flow: they are
//! policy data the clarification engine and planner both consult, and the
//! test suite pins their membership.

use serde::{Deserialize, Serialize};

use crate::entities::EntityKind;

/// The budgeting question types Penny can answer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Metric {
    Overview,
    SpendTotal,
    TopCategories,
    CardSpend,
    IncomeShare,
    PresetDueSoon,
    IncomeAverage,
    CardVariableSpendingHabits,
    CategorySpendShare,
    MonthOverMonth,
    PresetHighestCost,
    TopCategory,
    CategorySpend,
    SavingsAverageRecentPeriods,
    IncomeShareTrend,
    CategoryShareTrend,
}

/// Externally addressable identity of a metric, 1:1 with `Metric`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Intent {
    Overview,
    SpendTotal,
    TopCategories,
    CardSpend,
    IncomeShare,
    PresetDueSoon,
    IncomeAverage,
    CardVariableSpendingHabits,
    CategorySpendShare,
    MonthOverMonth,
    PresetHighestCost,
    TopCategory,
    CategorySpend,
    SavingsAverageRecentPeriods,
    IncomeShareTrend,
    CategoryShareTrend,
}

impl Metric {
    /// Every metric has exactly one intent.
    pub fn intent(&self) -> Intent {
        match self {
            Metric::Overview => Intent::Overview,
            Metric::SpendTotal => Intent::SpendTotal,
            Metric::TopCategories => Intent::TopCategories,
            Metric::CardSpend => Intent::CardSpend,
            Metric::IncomeShare => Intent::IncomeShare,
            Metric::PresetDueSoon => Intent::PresetDueSoon,
            Metric::IncomeAverage => Intent::IncomeAverage,
            Metric::CardVariableSpendingHabits => Intent::CardVariableSpendingHabits,
            Metric::CategorySpendShare => Intent::CategorySpendShare,
            Metric::MonthOverMonth => Intent::MonthOverMonth,
            Metric::PresetHighestCost => Intent::PresetHighestCost,
            Metric::TopCategory => Intent::TopCategory,
            Metric::CategorySpend => Intent::CategorySpend,
            Metric::SavingsAverageRecentPeriods => Intent::SavingsAverageRecentPeriods,
            Metric::IncomeShareTrend => Intent::IncomeShareTrend,
            Metric::CategoryShareTrend => Intent::CategoryShareTrend,
        }
    }

    /// Which entity kind this metric needs as its target, if any.
    pub fn target_kind(&self) -> Option<EntityKind> {
        match self {
            Metric::CardSpend | Metric::CardVariableSpendingHabits => Some(EntityKind::Card),
            Metric::CategorySpend | Metric::CategorySpendShare | Metric::CategoryShareTrend => {
                Some(EntityKind::Category)
            }
            Metric::IncomeShare | Metric::IncomeAverage | Metric::IncomeShareTrend => {
                Some(EntityKind::IncomeSource)
            }
            Metric::Overview
            | Metric::SpendTotal
            | Metric::TopCategories
            | Metric::PresetDueSoon
            | Metric::MonthOverMonth
            | Metric::PresetHighestCost
            | Metric::TopCategory
            | Metric::SavingsAverageRecentPeriods => None,
        }
    }

    /// Whether the clarification engine treats a missing date range as a
    /// gap worth asking about.
    pub fn expects_date_range(&self) -> bool {
        !matches!(
            self,
            Metric::PresetHighestCost
                | Metric::TopCategory
                | Metric::CategorySpend
                | Metric::SavingsAverageRecentPeriods
                | Metric::IncomeShareTrend
                | Metric::CategoryShareTrend
        )
    }

    /// Rankable/listable metrics keep their result limit in session so a
    /// continuation like "again for last month" preserves "top 3".
    pub fn is_rankable(&self) -> bool {
        matches!(self, Metric::TopCategories | Metric::PresetDueSoon)
    }

    /// Default result limit applied when deriving a `Query`.
    pub fn default_result_limit(&self) -> u32 {
        match self {
            Metric::TopCategories => 5,
            Metric::PresetDueSoon => 5,
            _ => 10,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Metric::Overview => "overview",
            Metric::SpendTotal => "spend_total",
            Metric::TopCategories => "top_categories",
            Metric::CardSpend => "card_spend",
            Metric::IncomeShare => "income_share",
            Metric::PresetDueSoon => "preset_due_soon",
            Metric::IncomeAverage => "income_average",
            Metric::CardVariableSpendingHabits => "card_variable_spending_habits",
            Metric::CategorySpendShare => "category_spend_share",
            Metric::MonthOverMonth => "month_over_month",
            Metric::PresetHighestCost => "preset_highest_cost",
            Metric::TopCategory => "top_category",
            Metric::CategorySpend => "category_spend",
            Metric::SavingsAverageRecentPeriods => "savings_average_recent_periods",
            Metric::IncomeShareTrend => "income_share_trend",
            Metric::CategoryShareTrend => "category_share_trend",
        }
    }
}

impl Intent {
    /// Every intent has exactly one metric.
    pub fn metric(&self) -> Metric {
        match self {
            Intent::Overview => Metric::Overview,
            Intent::SpendTotal => Metric::SpendTotal,
            Intent::TopCategories => Metric::TopCategories,
            Intent::CardSpend => Metric::CardSpend,
            Intent::IncomeShare => Metric::IncomeShare,
            Intent::PresetDueSoon => Metric::PresetDueSoon,
            Intent::IncomeAverage => Metric::IncomeAverage,
            Intent::CardVariableSpendingHabits => Metric::CardVariableSpendingHabits,
            Intent::CategorySpendShare => Metric::CategorySpendShare,
            Intent::MonthOverMonth => Metric::MonthOverMonth,
            Intent::PresetHighestCost => Metric::PresetHighestCost,
            Intent::TopCategory => Metric::TopCategory,
            Intent::CategorySpend => Metric::CategorySpend,
            Intent::SavingsAverageRecentPeriods => Metric::SavingsAverageRecentPeriods,
            Intent::IncomeShareTrend => Metric::IncomeShareTrend,
            Intent::CategoryShareTrend => Metric::CategoryShareTrend,
        }
    }
}

/// How certain the planner is about a resolved plan.
///
/// High runs silently. Medium runs but hedges wording and may offer
/// narrowing chips. Low blocks until the user picks a suggestion.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ConfidenceBand {
    Low,
    Medium,
    High,
}

impl ConfidenceBand {
    pub fn as_str(&self) -> &'static str {
        match self {
            ConfidenceBand::Low => "low",
            ConfidenceBand::Medium => "medium",
            ConfidenceBand::High => "high",
        }
    }
}

//! Plan resolution pipeline
//!
//! Three ordered tiers, first success wins:
//!   1. pattern parser - fixed linguistic patterns plus explicit date
//!      phrases and a bare limit number
//!   2. contextual continuation - reuses the last executed query when the
//!      prompt reads like a follow-up
//!   3. entity-aware heuristics - keyword combinations tied to specific
//!      metrics
//!
//! Every resolved plan then goes through entity enrichment: metrics that
//! need a card/category/income-source target get it resolved alias-first,
//! and confidence is upgraded to High exactly when a target lands.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::alias::resolve_alias;
use crate::dates::{has_explicit_date_phrase, parse_date_phrase};
use crate::entities::{EntityKind, WorkspaceEntities};
use crate::fuzzy::best_match;
use crate::metric::{ConfidenceBand, Metric};
use crate::normalize::{contains_any, contains_phrase, normalize, tokens};
use crate::plan::{QueryPlan, SessionContext};

/// Which tier produced a plan; recorded to telemetry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ResolutionTier {
    Pattern,
    Continuation,
    Heuristic,
}

impl ResolutionTier {
    pub fn as_str(&self) -> &'static str {
        match self {
            ResolutionTier::Pattern => "pattern",
            ResolutionTier::Continuation => "continuation",
            ResolutionTier::Heuristic => "heuristic",
        }
    }
}

/// A resolved plan plus the tier that produced it.
#[derive(Debug, Clone, PartialEq)]
pub struct ResolvedPlan {
    pub plan: QueryPlan,
    pub tier: ResolutionTier,
}

const RANKING_WORDS: [&str; 4] = ["top", "biggest", "largest", "highest"];
const COMPARISON_WORDS: [&str; 3] = ["compare", "versus", "vs"];
const SPEND_WORDS: [&str; 4] = ["spend", "spending", "spent", "cost"];
const SHARE_WORDS: [&str; 4] = ["share", "percent", "percentage", "portion"];
const HABIT_WORDS: [&str; 6] = ["habit", "habits", "pattern", "patterns", "trend", "trends"];
const BROAD_PHRASES: [&str; 4] = ["how am i doing", "overview", "summary", "snapshot"];
const CONTINUATION_PHRASES: [&str; 6] = [
    "how about",
    "what about",
    "and last",
    "again",
    "same for",
    "instead",
];

/// Broad-overview phrases ("how am i doing", "summary", ...) checked by
/// both tier 1 and the clarification engine.
pub fn has_broad_phrase(normalized: &str) -> bool {
    BROAD_PHRASES.iter().any(|p| contains_phrase(normalized, p))
}

/// Whether the prompt explicitly asks for all entities of a kind, which
/// suppresses target resolution and target clarifications.
pub fn says_all_of(normalized: &str, kind: EntityKind) -> bool {
    let phrases: &[&str] = match kind {
        EntityKind::Card => &["all cards", "every card", "all my cards"],
        EntityKind::Category => &["all categories", "every category", "all my categories"],
        EntityKind::IncomeSource => &[
            "all sources",
            "all income sources",
            "every source",
            "every income source",
        ],
        EntityKind::Preset => &["all presets", "every preset"],
    };
    phrases.iter().any(|p| contains_phrase(normalized, p))
}

/// Bare limit number: the first standalone integer in 1..=20 that is not
/// part of a date phrase ("last 7 days") or an ISO date.
fn extract_limit(words: &[&str]) -> Option<u32> {
    for (i, w) in words.iter().enumerate() {
        if w.len() == 4 {
            // Years are never limits.
            continue;
        }
        let Ok(n) = w.parse::<u32>() else { continue };
        if !(1..=20).contains(&n) {
            continue;
        }
        let prev = if i > 0 { words[i - 1] } else { "" };
        let next = if i + 1 < words.len() { words[i + 1] } else { "" };
        if prev == "last" && next == "days" {
            continue;
        }
        // Part of a normalized ISO date like "2024 03 01": a number that
        // follows another number is never a limit.
        if prev.parse::<u32>().is_ok() {
            continue;
        }
        return Some(n);
    }
    None
}

/// Tier 1: fixed linguistic patterns.
fn resolve_pattern(normalized: &str, words: &[&str]) -> Option<Metric> {
    let has_ranking = contains_any(words, &RANKING_WORDS);
    let has_trend = contains_any(words, &HABIT_WORDS);

    if has_ranking && contains_any(words, &["categories"]) {
        return Some(Metric::TopCategories);
    }
    if has_ranking && contains_any(words, &["category"]) && !contains_any(words, &SHARE_WORDS) {
        return Some(Metric::TopCategory);
    }
    if contains_any(words, &COMPARISON_WORDS) || contains_phrase(normalized, "month over month") {
        return Some(Metric::MonthOverMonth);
    }
    if has_broad_phrase(normalized) {
        return Some(Metric::Overview);
    }
    if contains_any(words, &["card", "cards"])
        && contains_any(words, &SPEND_WORDS)
        && !has_trend
        && !contains_phrase(normalized, "variable spending")
    {
        return Some(Metric::CardSpend);
    }
    if contains_any(words, &["income"])
        && contains_any(words, &["share"])
        && !has_trend
    {
        return Some(Metric::IncomeShare);
    }
    if contains_any(words, &["preset", "presets", "bill", "bills"])
        && contains_any(words, &["due", "upcoming"])
    {
        return Some(Metric::PresetDueSoon);
    }
    if contains_any(words, &SPEND_WORDS)
        && (contains_any(words, &["total"]) || contains_phrase(normalized, "how much"))
        && !contains_any(words, &["category", "categories"])
    {
        return Some(Metric::SpendTotal);
    }
    None
}

/// Tier 3: entity-aware keyword-combination heuristics, checked in order.
fn resolve_heuristic(normalized: &str, words: &[&str]) -> Option<Metric> {
    let has_income = contains_any(words, &["income", "incomes"]);
    let has_card = contains_any(words, &["card", "cards"]);
    let has_category = contains_any(words, &["category", "categories"]);
    let has_share = contains_any(words, &SHARE_WORDS);
    let has_trend = contains_any(words, &HABIT_WORDS);
    let has_spend = contains_any(words, &SPEND_WORDS);
    let has_average = contains_any(words, &["average", "avg"]);

    if has_income && has_share && has_trend {
        return Some(Metric::IncomeShareTrend);
    }
    if has_category && has_share && has_trend {
        return Some(Metric::CategoryShareTrend);
    }
    if has_income && has_average {
        return Some(Metric::IncomeAverage);
    }
    if has_card && (has_trend || contains_phrase(normalized, "variable spending")) {
        return Some(Metric::CardVariableSpendingHabits);
    }
    if has_category && has_spend && has_share {
        return Some(Metric::CategorySpendShare);
    }
    if contains_any(words, &["preset", "presets", "bill", "bills"])
        && contains_any(words, &["due", "upcoming"])
    {
        return Some(Metric::PresetDueSoon);
    }
    if contains_any(words, &["preset", "presets"])
        && contains_any(words, &["highest", "biggest", "expensive", "costliest"])
    {
        return Some(Metric::PresetHighestCost);
    }
    if contains_any(words, &["savings", "saved", "saving"]) && has_average {
        return Some(Metric::SavingsAverageRecentPeriods);
    }
    if has_category && has_spend {
        return Some(Metric::CategorySpend);
    }
    None
}

/// Resolve a target name for the prompt, alias table first then fuzzy
/// matching over the workspace names for the kind.
fn resolve_target(prompt: &str, kind: EntityKind, entities: &WorkspaceEntities) -> Option<String> {
    if let Some(target) = resolve_alias(prompt, kind, &entities.alias_rules) {
        return Some(target);
    }
    best_match(prompt, entities.names_for(kind))
}

/// Entity enrichment applied to every resolved plan: attach a missing
/// target (unless the prompt says "all X") and any missing explicit date
/// range, and upgrade confidence to High exactly when a target is found.
fn enrich(
    mut plan: QueryPlan,
    prompt: &str,
    normalized: &str,
    entities: &WorkspaceEntities,
    today: NaiveDate,
) -> QueryPlan {
    if plan.date_range.is_none() {
        if let Some(parsed) = parse_date_phrase(normalized, today) {
            plan.date_range = Some(parsed.range);
            plan.period_unit = Some(parsed.unit);
        }
    }
    if let Some(kind) = plan.metric.target_kind() {
        if plan.target_name.is_none() && !says_all_of(normalized, kind) {
            if let Some(target) = resolve_target(prompt, kind, entities) {
                debug!(target = %target, kind = kind.as_str(), "target resolved");
                plan.target_name = Some(target);
                plan.confidence = ConfidenceBand::High;
            }
        } else if plan.target_name.is_some() {
            plan.confidence = ConfidenceBand::High;
        }
    }
    plan
}

/// Run the full pipeline. Returns None when no tier resolves.
pub fn resolve_plan(
    prompt: &str,
    entities: &WorkspaceEntities,
    session: &SessionContext,
    today: NaiveDate,
) -> Option<ResolvedPlan> {
    let normalized = normalize(prompt);
    let words = tokens(&normalized);

    // Tier 1: pattern parser.
    if let Some(metric) = resolve_pattern(&normalized, &words) {
        let confidence = if metric.target_kind().is_none() {
            ConfidenceBand::High
        } else {
            ConfidenceBand::Medium
        };
        let mut plan = QueryPlan::new(metric, confidence);
        if let Some(limit) = extract_limit(&words) {
            plan.result_limit = Some(limit);
        }
        let plan = enrich(plan, prompt, &normalized, entities, today);
        debug!(metric = metric.as_str(), "tier 1 pattern match");
        return Some(ResolvedPlan {
            plan,
            tier: ResolutionTier::Pattern,
        });
    }

    // Tier 2: contextual continuation. Needs a prior metric and either a
    // continuation phrase or an explicit date phrase.
    if let Some(last_metric) = session.last_metric {
        let is_continuation = CONTINUATION_PHRASES
            .iter()
            .any(|p| contains_phrase(&normalized, p))
            || has_explicit_date_phrase(&normalized, today);
        if is_continuation {
            let mut plan = QueryPlan::new(last_metric, ConfidenceBand::Medium);
            plan.target_name = session.last_target_name.clone();
            plan.result_limit = session.last_result_limit;
            plan.period_unit = session.last_period_unit;
            plan.date_range = session.last_date_range;
            if let Some(parsed) = parse_date_phrase(&normalized, today) {
                plan.date_range = Some(parsed.range);
                plan.period_unit = Some(parsed.unit);
            }
            // Continuations are inherently less certain; enrichment must
            // not upgrade the band.
            debug!(metric = last_metric.as_str(), "tier 2 continuation");
            return Some(ResolvedPlan {
                plan,
                tier: ResolutionTier::Continuation,
            });
        }
    }

    // Tier 3: entity-aware heuristics.
    if let Some(metric) = resolve_heuristic(&normalized, &words) {
        let plan = QueryPlan::new(metric, ConfidenceBand::Medium);
        let mut plan = enrich(plan, prompt, &normalized, entities, today);
        if let Some(limit) = extract_limit(&words) {
            plan.result_limit = Some(limit);
        }
        debug!(metric = metric.as_str(), "tier 3 heuristic match");
        return Some(ResolvedPlan {
            plan,
            tier: ResolutionTier::Heuristic,
        });
    }

    None
}

#[cfg(test)]
mod tests {
    use super::*;

    fn day(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    fn workspace() -> WorkspaceEntities {
        WorkspaceEntities {
            cards: vec!["Chase Freedom".to_string(), "Amex Gold".to_string()],
            categories: vec!["Groceries".to_string(), "Dining".to_string()],
            income_sources: vec!["Salary".to_string(), "Freelance".to_string()],
            ..Default::default()
        }
    }

    #[test]
    fn tier1_top_categories_with_limit_and_month() {
        let today = day(2024, 3, 10);
        let resolved = resolve_plan(
            "top 3 categories this month",
            &workspace(),
            &SessionContext::default(),
            today,
        )
        .unwrap();
        assert_eq!(resolved.tier, ResolutionTier::Pattern);
        assert_eq!(resolved.plan.metric, Metric::TopCategories);
        assert_eq!(resolved.plan.result_limit, Some(3));
        assert_eq!(resolved.plan.confidence, ConfidenceBand::High);
        let range = resolved.plan.date_range.unwrap();
        assert_eq!(range.start(), day(2024, 3, 1));
        assert_eq!(range.end(), day(2024, 3, 31));
    }

    #[test]
    fn tier1_wins_even_with_session_context() {
        let today = day(2024, 3, 10);
        let mut session = SessionContext::default();
        session.last_metric = Some(Metric::CardSpend);
        let resolved = resolve_plan("top categories this month", &workspace(), &session, today)
            .unwrap();
        assert_eq!(resolved.tier, ResolutionTier::Pattern);
        assert_eq!(resolved.plan.metric, Metric::TopCategories);
    }

    #[test]
    fn tier2_continuation_reuses_metric_and_target() {
        let today = day(2024, 3, 10);
        let mut session = SessionContext::default();
        session.last_metric = Some(Metric::CardSpend);
        session.last_target_name = Some("Chase Freedom".to_string());
        let resolved =
            resolve_plan("how about last month", &workspace(), &session, today).unwrap();
        assert_eq!(resolved.tier, ResolutionTier::Continuation);
        assert_eq!(resolved.plan.metric, Metric::CardSpend);
        assert_eq!(resolved.plan.target_name.as_deref(), Some("Chase Freedom"));
        assert_eq!(resolved.plan.confidence, ConfidenceBand::Medium);
        let range = resolved.plan.date_range.unwrap();
        assert_eq!(range.start(), day(2024, 2, 1));
        assert_eq!(range.end(), day(2024, 2, 29));
    }

    #[test]
    fn tier2_requires_continuation_phrase_or_date() {
        let today = day(2024, 3, 10);
        let mut session = SessionContext::default();
        session.last_metric = Some(Metric::CardSpend);
        assert!(resolve_plan("bananas", &workspace(), &session, today).is_none());
    }

    #[test]
    fn tier3_income_average() {
        let today = day(2024, 3, 10);
        let resolved = resolve_plan(
            "average income from salary",
            &workspace(),
            &SessionContext::default(),
            today,
        )
        .unwrap();
        assert_eq!(resolved.tier, ResolutionTier::Heuristic);
        assert_eq!(resolved.plan.metric, Metric::IncomeAverage);
        assert_eq!(resolved.plan.target_name.as_deref(), Some("Salary"));
        assert_eq!(resolved.plan.confidence, ConfidenceBand::High);
    }

    #[test]
    fn tier3_card_habits_without_target_stays_medium() {
        let today = day(2024, 3, 10);
        let resolved = resolve_plan(
            "card spending habits",
            &workspace(),
            &SessionContext::default(),
            today,
        )
        .unwrap();
        assert_eq!(resolved.plan.metric, Metric::CardVariableSpendingHabits);
        assert_eq!(resolved.plan.target_name, None);
        assert_eq!(resolved.plan.confidence, ConfidenceBand::Medium);
    }

    #[test]
    fn all_cards_suppresses_target_resolution() {
        let today = day(2024, 3, 10);
        let resolved = resolve_plan(
            "spend across all cards this month",
            &workspace(),
            &SessionContext::default(),
            today,
        )
        .unwrap();
        assert_eq!(resolved.plan.target_name, None);
    }

    #[test]
    fn alias_beats_fuzzy_in_enrichment() {
        let today = day(2024, 3, 10);
        let mut entities = workspace();
        entities.alias_rules.push(crate::entities::AliasRule {
            kind: EntityKind::Card,
            alias: "daily driver".to_string(),
            target: "Amex Gold".to_string(),
        });
        let resolved = resolve_plan(
            "spend on my daily driver card",
            &entities,
            &SessionContext::default(),
            today,
        )
        .unwrap();
        assert_eq!(resolved.plan.metric, Metric::CardSpend);
        assert_eq!(resolved.plan.target_name.as_deref(), Some("Amex Gold"));
    }
}

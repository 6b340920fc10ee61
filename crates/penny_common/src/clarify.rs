//! Clarification and disambiguation engine
//!
//! Looks at a resolved plan and decides whether to run it silently, run it
//! with hedged wording plus narrowing chips, or block and ask. Entity
//! disambiguation is checked first, independent of confidence: a metric
//! that needs a card/category/income-source target with two or more
//! plausible candidates always blocks.

use crate::dates::{has_explicit_date_phrase, DateRange};
use crate::entities::{EntityKind, WorkspaceEntities};
use crate::fuzzy::ranked_matches;
use crate::metric::{ConfidenceBand, Metric};
use crate::normalize::normalize;
use crate::plan::QueryPlan;
use crate::planner::{has_broad_phrase, says_all_of};
use chrono::NaiveDate;

/// Maximum suggestion chips shown to the user.
pub const MAX_SUGGESTIONS: usize = 4;

/// Why the engine wants to clarify before (or while) running a plan.
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ClarifyReason {
    LowConfidenceLanguage,
    MissingDate,
    BroadPrompt,
    MissingCategoryTarget,
    MissingCardTarget,
    MissingIncomeSourceTarget,
}

impl ClarifyReason {
    /// One-line prompt shown in the clarification subtitle.
    pub fn prompt_line(&self) -> &'static str {
        match self {
            ClarifyReason::LowConfidenceLanguage => "I'm not fully sure what you meant.",
            ClarifyReason::MissingDate => "Which period should I use?",
            ClarifyReason::BroadPrompt => "That's a broad one.",
            ClarifyReason::MissingCategoryTarget => "Which category did you mean?",
            ClarifyReason::MissingCardTarget => "Which card did you mean?",
            ClarifyReason::MissingIncomeSourceTarget => "Which income source did you mean?",
        }
    }
}

/// A one-tap alternative query offered to the user.
#[derive(Debug, Clone, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct Suggestion {
    pub title: String,
    pub query: QueryPlan,
}

/// The engine's decision about a resolved plan.
///
/// `should_run_best_effort = true` means "execute now and still show the
/// chips"; false means "block and ask".
#[derive(Debug, Clone, PartialEq)]
pub struct ClarificationDecision {
    pub reasons: Vec<ClarifyReason>,
    pub subtitle: String,
    pub suggestions: Vec<Suggestion>,
    pub should_run_best_effort: bool,
}

fn push_reason(reasons: &mut Vec<ClarifyReason>, reason: ClarifyReason) {
    // Set semantics with first-seen order.
    if !reasons.contains(&reason) {
        reasons.push(reason);
    }
}

fn push_suggestion(suggestions: &mut Vec<Suggestion>, suggestion: Suggestion) {
    if suggestions.len() >= MAX_SUGGESTIONS {
        return;
    }
    // Title uniqueness, first occurrence wins.
    if suggestions.iter().any(|s| s.title == suggestion.title) {
        return;
    }
    suggestions.push(suggestion);
}

fn this_month(today: NaiveDate) -> Option<DateRange> {
    crate::dates::parse_date_phrase("this month", today).map(|p| p.range)
}

fn last_month(today: NaiveDate) -> Option<DateRange> {
    crate::dates::parse_date_phrase("last month", today).map(|p| p.range)
}

fn date_override(plan: &QueryPlan, range: Option<DateRange>) -> QueryPlan {
    let mut next = plan.clone();
    next.date_range = range;
    next.confidence = ConfidenceBand::High;
    next
}

fn target_override(plan: &QueryPlan, target: Option<String>) -> QueryPlan {
    let mut next = plan.clone();
    next.target_name = target;
    next.confidence = ConfidenceBand::High;
    next
}

fn generic_fallback(today: NaiveDate) -> Vec<Suggestion> {
    let month = this_month(today);
    let mut overview = QueryPlan::new(Metric::Overview, ConfidenceBand::High);
    overview.date_range = month;
    let mut spend = QueryPlan::new(Metric::SpendTotal, ConfidenceBand::High);
    spend.date_range = month;
    let mut top = QueryPlan::new(Metric::TopCategories, ConfidenceBand::High);
    top.date_range = month;
    let compare = QueryPlan::new(Metric::MonthOverMonth, ConfidenceBand::High);
    vec![
        Suggestion {
            title: "Show overview".to_string(),
            query: overview,
        },
        Suggestion {
            title: "Spend total this month".to_string(),
            query: spend,
        },
        Suggestion {
            title: "Top categories this month".to_string(),
            query: top,
        },
        Suggestion {
            title: "Compare with last month".to_string(),
            query: compare,
        },
    ]
}

fn missing_target_reason(kind: EntityKind) -> ClarifyReason {
    match kind {
        EntityKind::Category => ClarifyReason::MissingCategoryTarget,
        EntityKind::Card => ClarifyReason::MissingCardTarget,
        EntityKind::IncomeSource => ClarifyReason::MissingIncomeSourceTarget,
        // Presets never require a target; fall back to the card wording.
        EntityKind::Preset => ClarifyReason::MissingCardTarget,
    }
}

/// Entity disambiguation: metric needs a target, none resolved, and the
/// workspace has 2+ plausible candidates. Blocking.
fn resolve_entity_disambiguation(
    plan: &QueryPlan,
    prompt: &str,
    entities: &WorkspaceEntities,
) -> Option<ClarificationDecision> {
    let kind = plan.metric.target_kind()?;
    if plan.target_name.is_some() {
        return None;
    }
    let normalized = normalize(prompt);
    if says_all_of(&normalized, kind) {
        return None;
    }

    let pool = entities.names_for(kind);
    let mut candidates = ranked_matches(prompt, pool, 3);
    if candidates.len() < 2 {
        // Nothing in the prompt narrowed the pool; with 2+ entities of the
        // kind the question is still ambiguous, so offer the pool itself.
        if pool.len() >= 2 {
            candidates = pool.iter().take(3).cloned().collect();
        } else {
            return None;
        }
    }

    let reason = missing_target_reason(kind);
    let mut suggestions = Vec::new();
    for name in &candidates {
        push_suggestion(
            &mut suggestions,
            Suggestion {
                title: name.clone(),
                query: target_override(plan, Some(name.clone())),
            },
        );
    }
    let all_title = format!(
        "All {}",
        kind.plural_label()
    );
    push_suggestion(
        &mut suggestions,
        Suggestion {
            title: all_title,
            query: target_override(plan, None),
        },
    );

    Some(ClarificationDecision {
        reasons: vec![reason],
        subtitle: format!(
            "I found more than one match. {}",
            reason.prompt_line()
        ),
        suggestions,
        should_run_best_effort: false,
    })
}

/// Per-reason canned suggestions, up to 2 each.
fn suggestions_for_reason(
    reason: ClarifyReason,
    plan: &QueryPlan,
    today: NaiveDate,
) -> Vec<Suggestion> {
    match reason {
        ClarifyReason::MissingDate => vec![
            Suggestion {
                title: "Use this month".to_string(),
                query: date_override(plan, this_month(today)),
            },
            Suggestion {
                title: "Use last month".to_string(),
                query: date_override(plan, last_month(today)),
            },
        ],
        ClarifyReason::BroadPrompt => {
            let compare = QueryPlan::new(Metric::MonthOverMonth, ConfidenceBand::High);
            vec![
                Suggestion {
                    title: "Compare with last month".to_string(),
                    query: compare,
                },
                Suggestion {
                    title: "Use this month".to_string(),
                    query: date_override(plan, this_month(today)),
                },
            ]
        }
        ClarifyReason::LowConfidenceLanguage => {
            let mut overview = QueryPlan::new(Metric::Overview, ConfidenceBand::High);
            overview.date_range = this_month(today);
            let mut top = QueryPlan::new(Metric::TopCategories, ConfidenceBand::High);
            top.date_range = this_month(today);
            vec![
                Suggestion {
                    title: "Show overview".to_string(),
                    query: overview,
                },
                Suggestion {
                    title: "Top categories this month".to_string(),
                    query: top,
                },
            ]
        }
        ClarifyReason::MissingCategoryTarget => vec![Suggestion {
            title: "All categories".to_string(),
            query: target_override(plan, None),
        }],
        ClarifyReason::MissingCardTarget => vec![Suggestion {
            title: "All cards".to_string(),
            query: target_override(plan, None),
        }],
        ClarifyReason::MissingIncomeSourceTarget => vec![Suggestion {
            title: "All income sources".to_string(),
            query: target_override(plan, None),
        }],
    }
}

/// Decide whether `plan` needs clarification. None means run silently.
pub fn resolve(
    plan: &QueryPlan,
    prompt: &str,
    entities: &WorkspaceEntities,
    today: NaiveDate,
) -> Option<ClarificationDecision> {
    if plan.confidence == ConfidenceBand::High {
        return None;
    }

    if let Some(decision) = resolve_entity_disambiguation(plan, prompt, entities) {
        return Some(decision);
    }

    let normalized = normalize(prompt);
    let mut reasons: Vec<ClarifyReason> = Vec::new();

    if plan.confidence == ConfidenceBand::Low {
        push_reason(&mut reasons, ClarifyReason::LowConfidenceLanguage);
    }
    if plan.date_range.is_none()
        && plan.metric.expects_date_range()
        && !has_explicit_date_phrase(&normalized, today)
    {
        push_reason(&mut reasons, ClarifyReason::MissingDate);
    }
    if plan.metric == Metric::Overview
        && plan.date_range.is_none()
        && has_broad_phrase(&normalized)
    {
        push_reason(&mut reasons, ClarifyReason::BroadPrompt);
    }
    // Exactly one missing-target reason, category before card before income.
    if let Some(kind) = plan.metric.target_kind() {
        if plan.target_name.is_none() && !says_all_of(&normalized, kind) {
            push_reason(&mut reasons, missing_target_reason(kind));
        }
    }

    if reasons.is_empty() {
        // Medium band with nothing concrete to ask about: proceed silently.
        return None;
    }

    let lead_in = match plan.confidence {
        ConfidenceBand::Medium => "Likely match complete.",
        _ => "I need one more detail before I run this.",
    };
    let mut subtitle = lead_in.to_string();
    for reason in reasons.iter().take(2) {
        subtitle.push(' ');
        subtitle.push_str(reason.prompt_line());
    }

    let mut suggestions: Vec<Suggestion> = Vec::new();
    for reason in &reasons {
        for s in suggestions_for_reason(*reason, plan, today) {
            push_suggestion(&mut suggestions, s);
        }
    }
    if suggestions.is_empty() {
        for s in generic_fallback(today) {
            push_suggestion(&mut suggestions, s);
        }
    }
    if reasons.contains(&ClarifyReason::BroadPrompt) {
        if let Some(pos) = suggestions
            .iter()
            .position(|s| s.title == "Compare with last month")
        {
            let s = suggestions.remove(pos);
            suggestions.insert(0, s);
        }
    }

    Some(ClarificationDecision {
        reasons,
        subtitle,
        suggestions,
        should_run_best_effort: plan.confidence == ConfidenceBand::Medium,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn day(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    fn today() -> NaiveDate {
        day(2024, 3, 10)
    }

    fn workspace() -> WorkspaceEntities {
        WorkspaceEntities {
            cards: vec!["Chase Freedom".to_string(), "Chase Sapphire".to_string()],
            categories: vec!["Groceries".to_string()],
            income_sources: vec!["Salary".to_string()],
            ..Default::default()
        }
    }

    #[test]
    fn high_confidence_skips_entirely() {
        let plan = QueryPlan::new(Metric::CardSpend, ConfidenceBand::High);
        assert!(resolve(&plan, "card spend", &workspace(), today()).is_none());
    }

    #[test]
    fn medium_with_no_reasons_runs_silently() {
        let mut plan = QueryPlan::new(Metric::SpendTotal, ConfidenceBand::Medium);
        plan.date_range = crate::dates::parse_date_phrase("this month", today()).map(|p| p.range);
        assert!(resolve(&plan, "spend total this month", &workspace(), today()).is_none());
    }

    #[test]
    fn low_confidence_always_clarifies() {
        let mut plan = QueryPlan::new(Metric::SpendTotal, ConfidenceBand::Low);
        plan.date_range = crate::dates::parse_date_phrase("this month", today()).map(|p| p.range);
        let decision = resolve(&plan, "spend total this month", &workspace(), today()).unwrap();
        assert!(decision
            .reasons
            .contains(&ClarifyReason::LowConfidenceLanguage));
        assert!(!decision.should_run_best_effort);
        assert!(decision.subtitle.starts_with("I need one more detail"));
    }

    #[test]
    fn two_close_cards_block_with_chips() {
        let plan = QueryPlan::new(Metric::CardSpend, ConfidenceBand::Medium);
        let decision = resolve(&plan, "card spend", &workspace(), today()).unwrap();
        assert!(!decision.should_run_best_effort);
        assert_eq!(decision.reasons, vec![ClarifyReason::MissingCardTarget]);
        let titles: Vec<&str> = decision.suggestions.iter().map(|s| s.title.as_str()).collect();
        assert_eq!(titles, vec!["Chase Freedom", "Chase Sapphire", "All cards"]);
    }

    #[test]
    fn single_candidate_pool_falls_through_to_reasons() {
        let mut entities = workspace();
        entities.cards = vec!["Chase Freedom".to_string()];
        let plan = QueryPlan::new(Metric::CardSpend, ConfidenceBand::Medium);
        let decision = resolve(&plan, "card spend", &entities, today()).unwrap();
        // Hedged run with chips, not a block.
        assert!(decision.should_run_best_effort);
        assert!(decision.reasons.contains(&ClarifyReason::MissingCardTarget));
    }

    #[test]
    fn missing_date_offers_month_overrides() {
        let plan = QueryPlan::new(Metric::SpendTotal, ConfidenceBand::Medium);
        let decision = resolve(&plan, "spend total", &workspace(), today()).unwrap();
        assert!(decision.should_run_best_effort);
        let titles: Vec<&str> = decision.suggestions.iter().map(|s| s.title.as_str()).collect();
        assert!(titles.contains(&"Use this month"));
        assert!(titles.contains(&"Use last month"));
        let this_month = decision
            .suggestions
            .iter()
            .find(|s| s.title == "Use this month")
            .unwrap();
        assert_eq!(
            this_month.query.date_range.unwrap().start(),
            day(2024, 3, 1)
        );
    }

    #[test]
    fn broad_prompt_floats_comparison_first() {
        let plan = QueryPlan::new(Metric::Overview, ConfidenceBand::Medium);
        let decision = resolve(&plan, "how am i doing", &workspace(), today()).unwrap();
        assert!(decision.reasons.contains(&ClarifyReason::BroadPrompt));
        assert_eq!(decision.suggestions[0].title, "Compare with last month");
        assert!(decision.should_run_best_effort);
    }

    #[test]
    fn suggestions_are_unique_and_capped() {
        let plan = QueryPlan::new(Metric::Overview, ConfidenceBand::Low);
        let decision = resolve(&plan, "how am i doing", &workspace(), today()).unwrap();
        assert!(decision.suggestions.len() <= MAX_SUGGESTIONS);
        let mut titles: Vec<&str> = decision.suggestions.iter().map(|s| s.title.as_str()).collect();
        let before = titles.len();
        titles.sort();
        titles.dedup();
        assert_eq!(titles.len(), before);
    }

    #[test]
    fn subtitle_takes_at_most_two_reason_lines() {
        let plan = QueryPlan::new(Metric::CardSpend, ConfidenceBand::Low);
        let mut entities = workspace();
        entities.cards = vec!["Chase Freedom".to_string()];
        let decision = resolve(&plan, "hmm cards maybe", &entities, today()).unwrap();
        // Low + missing date + missing card target = 3 reasons, 2 lines.
        assert_eq!(decision.reasons.len(), 3);
        let line_count = decision
            .subtitle
            .matches('?')
            .count()
            + decision.subtitle.matches('.').count();
        assert!(line_count <= 3);
    }
}

//! Candidate ranking for mutation targets
//!
//! When a mutation names an existing record loosely ("delete the $40
//! expense from yesterday"), this module scores every candidate record
//! additively and the state machine acts on the count of survivors:
//! zero means no match, one auto-applies, two or more enters a
//! disambiguation pending state.
//!
//! Disqualifiers remove a record outright regardless of other bonuses:
//! a record on the wrong calendar day, or (for edits carrying an original
//! amount) an amount off by a cent or more.

use crate::command::CommandPlan;
use crate::entities::{ExpenseRecord, IncomeRecord, PlannedExpenseRecord};

const AMOUNT_TOLERANCE: f64 = 0.01;

const SCORE_DAY: u32 = 4;
const SCORE_ORIGINAL_AMOUNT: u32 = 4;
const SCORE_PLAIN_AMOUNT: u32 = 2;
const SCORE_NOTE: u32 = 3;
const SCORE_TITLE: u32 = 5;
const SCORE_INCOME_FLAG: u32 = 1;

fn amounts_match(a: f64, b: f64) -> bool {
    (a - b).abs() < AMOUNT_TOLERANCE
}

/// Shared date/amount scoring. Returns None when the record is
/// disqualified.
fn base_score(plan: &CommandPlan, amount: f64, date: Option<chrono::NaiveDate>) -> Option<u32> {
    let mut score = 0;

    if let Some(wanted_day) = plan.date {
        match date {
            Some(d) if d == wanted_day => score += SCORE_DAY,
            _ => return None,
        }
    }

    if let Some(original) = plan.original_amount {
        if !amounts_match(amount, original) {
            return None;
        }
        score += SCORE_ORIGINAL_AMOUNT;
    } else if let Some(plain) = plan.amount {
        if amounts_match(amount, plain) {
            score += SCORE_PLAIN_AMOUNT;
        }
    }

    Some(score)
}

fn note_matches(notes: &Option<String>, text: &str) -> bool {
    match notes {
        Some(n) if !n.trim().is_empty() => text.to_lowercase().contains(&n.trim().to_lowercase()),
        _ => false,
    }
}

/// Rank variable expenses against a mutation plan, best first.
pub fn rank_expenses(plan: &CommandPlan, records: &[ExpenseRecord]) -> Vec<ExpenseRecord> {
    let mut scored: Vec<(u32, usize, &ExpenseRecord)> = Vec::new();
    for (idx, rec) in records.iter().enumerate() {
        let Some(mut score) = base_score(plan, rec.amount, Some(rec.date)) else {
            continue;
        };
        if note_matches(&plan.notes, &rec.description) {
            score += SCORE_NOTE;
        }
        if score > 0 {
            scored.push((score, idx, rec));
        }
    }
    sort_scored(&mut scored, |r| Some(r.date));
    scored.into_iter().map(|(_, _, r)| r.clone()).collect()
}

/// Rank income records. A planned/actual flag match adds a small bonus on
/// top of the shared scoring; the note fragment is matched against the
/// income source.
pub fn rank_incomes(plan: &CommandPlan, records: &[IncomeRecord]) -> Vec<IncomeRecord> {
    let mut scored: Vec<(u32, usize, &IncomeRecord)> = Vec::new();
    for (idx, rec) in records.iter().enumerate() {
        let Some(mut score) = base_score(plan, rec.amount, Some(rec.date)) else {
            continue;
        };
        let source_hit = match &plan.source {
            Some(s) if !s.trim().is_empty() => {
                rec.source.to_lowercase().contains(&s.trim().to_lowercase())
            }
            _ => false,
        };
        if source_hit || note_matches(&plan.notes, &rec.source) {
            score += SCORE_NOTE;
        }
        if let Some(planned) = plan.is_planned_income {
            if rec.planned == planned {
                score += SCORE_INCOME_FLAG;
            }
        }
        if score > 0 {
            scored.push((score, idx, rec));
        }
    }
    sort_scored(&mut scored, |r| Some(r.date));
    scored.into_iter().map(|(_, _, r)| r.clone()).collect()
}

/// Rank planned expenses. Title containment is checked against the full
/// raw prompt, not just the extracted notes field, because preset titles
/// ("Netflix") usually appear verbatim in the sentence.
pub fn rank_planned_expenses(
    plan: &CommandPlan,
    records: &[PlannedExpenseRecord],
) -> Vec<PlannedExpenseRecord> {
    let raw_lower = plan.raw_prompt.to_lowercase();
    let mut scored: Vec<(u32, usize, &PlannedExpenseRecord)> = Vec::new();
    for (idx, rec) in records.iter().enumerate() {
        let Some(mut score) = base_score(plan, rec.amount, rec.due_date) else {
            continue;
        };
        let title = rec.title.trim().to_lowercase();
        if !title.is_empty() && raw_lower.contains(&title) {
            score += SCORE_TITLE;
        }
        if note_matches(&plan.notes, &rec.title) {
            score += SCORE_NOTE;
        }
        if score > 0 {
            scored.push((score, idx, rec));
        }
    }
    sort_scored(&mut scored, |r| r.due_date);
    scored.into_iter().map(|(_, _, r)| r.clone()).collect()
}

/// Descending score, then most-recent date, then original order.
fn sort_scored<T>(
    scored: &mut [(u32, usize, &T)],
    date_of: impl Fn(&T) -> Option<chrono::NaiveDate>,
) {
    scored.sort_by(|a, b| {
        b.0.cmp(&a.0)
            .then_with(|| date_of(b.2).cmp(&date_of(a.2)))
            .then_with(|| a.1.cmp(&b.1))
    });
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::command::CommandIntent;
    use chrono::NaiveDate;

    fn day(d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, 3, d).unwrap()
    }

    fn expense(id: &str, amount: f64, d: u32, desc: &str) -> ExpenseRecord {
        ExpenseRecord {
            id: id.to_string(),
            amount,
            date: day(d),
            description: desc.to_string(),
            card_name: None,
            category_name: None,
        }
    }

    #[test]
    fn wrong_day_disqualifies_regardless_of_other_score() {
        let mut plan = CommandPlan::new(CommandIntent::DeleteExpense, "delete the $40 expense");
        plan.date = Some(day(9));
        plan.amount = Some(40.0);
        plan.notes = Some("coffee".to_string());

        let records = vec![expense("a", 40.0, 8, "coffee")];
        assert!(rank_expenses(&plan, &records).is_empty());
    }

    #[test]
    fn original_amount_mismatch_disqualifies() {
        let mut plan = CommandPlan::new(CommandIntent::EditExpense, "change the $40 coffee to $45");
        plan.original_amount = Some(40.0);

        let records = vec![expense("a", 40.0, 8, "coffee"), expense("b", 52.0, 8, "coffee")];
        let ranked = rank_expenses(&plan, &records);
        assert_eq!(ranked.len(), 1);
        assert_eq!(ranked[0].id, "a");
    }

    #[test]
    fn plain_amount_is_a_bonus_not_a_filter() {
        let mut plan = CommandPlan::new(CommandIntent::DeleteExpense, "delete the coffee expense");
        plan.amount = Some(40.0);
        plan.notes = Some("coffee".to_string());

        let records = vec![expense("a", 52.0, 8, "coffee run"), expense("b", 40.0, 7, "coffee")];
        let ranked = rank_expenses(&plan, &records);
        // Both survive (note match), the amount match outranks recency.
        assert_eq!(ranked.len(), 2);
        assert_eq!(ranked[0].id, "b");
    }

    #[test]
    fn zero_score_records_are_excluded() {
        let plan = CommandPlan::new(CommandIntent::DeleteExpense, "delete something");
        let records = vec![expense("a", 12.0, 8, "coffee")];
        assert!(rank_expenses(&plan, &records).is_empty());
    }

    #[test]
    fn ties_break_by_most_recent_date() {
        let mut plan = CommandPlan::new(CommandIntent::DeleteExpense, "delete the coffee expense");
        plan.notes = Some("coffee".to_string());

        let records = vec![expense("old", 10.0, 1, "coffee"), expense("new", 10.0, 9, "coffee")];
        let ranked = rank_expenses(&plan, &records);
        assert_eq!(ranked[0].id, "new");
    }

    #[test]
    fn income_flag_bonus_breaks_ties() {
        let mut plan = CommandPlan::new(CommandIntent::DeleteIncome, "delete the planned salary");
        plan.source = Some("salary".to_string());
        plan.is_planned_income = Some(true);

        let records = vec![
            IncomeRecord {
                id: "actual".to_string(),
                amount: 100.0,
                date: day(9),
                source: "Salary".to_string(),
                planned: false,
            },
            IncomeRecord {
                id: "planned".to_string(),
                amount: 100.0,
                date: day(1),
                source: "Salary".to_string(),
                planned: true,
            },
        ];
        let ranked = rank_incomes(&plan, &records);
        assert_eq!(ranked[0].id, "planned");
    }

    #[test]
    fn planned_title_matches_raw_prompt() {
        let plan = CommandPlan::new(
            CommandIntent::DeletePlannedExpense,
            "remove the Netflix preset",
        );
        let records = vec![
            PlannedExpenseRecord {
                id: "n".to_string(),
                title: "Netflix".to_string(),
                amount: 15.99,
                due_date: None,
            },
            PlannedExpenseRecord {
                id: "s".to_string(),
                title: "Spotify".to_string(),
                amount: 9.99,
                due_date: None,
            },
        ];
        let ranked = rank_planned_expenses(&plan, &records);
        assert_eq!(ranked.len(), 1);
        assert_eq!(ranked[0].id, "n");
    }
}

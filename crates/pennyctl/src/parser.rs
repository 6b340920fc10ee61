//! Reference command parser
//!
//! Keyword and amount extraction good enough to drive every mutation flow
//! from the REPL. The engine treats whatever parser the host supplies as
//! authoritative, so this one stays conservative: when in doubt it
//! returns None and lets the prompt fall through to query resolution.

use chrono::NaiveDate;

use penny_common::dates::{parse_date_phrase, PeriodUnit};
use penny_common::fuzzy::best_match;
use penny_common::normalize::{contains_any, contains_phrase, normalize, tokens};
use penny_common::{CommandIntent, CommandParser, CommandPlan, WorkspaceEntities};

pub struct KeywordCommandParser;

const ADD_WORDS: [&str; 4] = ["add", "log", "spent", "bought"];
const EDIT_WORDS: [&str; 3] = ["change", "edit", "update"];
const DELETE_WORDS: [&str; 2] = ["delete", "remove"];
const CREATE_WORDS: [&str; 3] = ["create", "new", "make"];

/// Pull every number out of the token stream, in order. "$12.50" was
/// normalized to "12 50", so adjacent small-number pairs are rejoined as
/// a decimal.
fn extract_amounts(words: &[&str]) -> Vec<f64> {
    let mut amounts = Vec::new();
    let mut i = 0;
    while i < words.len() {
        if let Ok(whole) = words[i].parse::<u64>() {
            if i + 1 < words.len() && words[i + 1].len() == 2 {
                if let Ok(cents) = words[i + 1].parse::<u64>() {
                    amounts.push(whole as f64 + cents as f64 / 100.0);
                    i += 2;
                    continue;
                }
            }
            amounts.push(whole as f64);
        }
        i += 1;
    }
    amounts
}

/// Name tail after a marker word in the raw prompt, preserving casing.
/// "create card Chase Sapphire" yields "Chase Sapphire".
fn tail_after(raw: &str, markers: &[&str]) -> Option<String> {
    // ASCII-only folding keeps every byte offset valid in `raw`; full
    // Unicode lowercasing can change byte lengths and misalign the slice.
    let lower: String = raw.chars().map(|c| c.to_ascii_lowercase()).collect();
    for marker in markers {
        if let Some(pos) = lower.find(marker) {
            let tail = raw[pos + marker.len()..].trim();
            let tail = tail.trim_start_matches(|c: char| !c.is_alphanumeric());
            if !tail.is_empty() {
                return Some(tail.trim_end_matches('.').trim().to_string());
            }
        }
    }
    None
}

fn attach_date(plan: &mut CommandPlan, normalized: &str, today: NaiveDate) {
    if let Some(parsed) = parse_date_phrase(normalized, today) {
        if parsed.unit == PeriodUnit::Day {
            plan.date = Some(parsed.range.start());
        } else {
            plan.date_range = Some(parsed.range);
        }
    }
}

impl CommandParser for KeywordCommandParser {
    fn parse(
        &self,
        prompt: &str,
        entities: &WorkspaceEntities,
        today: NaiveDate,
    ) -> Option<CommandPlan> {
        let normalized = normalize(prompt);
        let words = tokens(&normalized);
        let amounts = extract_amounts(&words);

        // Alias definitions: "alias my daily driver to Chase Freedom".
        if words.first().copied() == Some("alias") {
            if let Some(rest) = tail_after(prompt, &["alias "]) {
                let lower: String = rest.chars().map(|c| c.to_ascii_lowercase()).collect();
                if let Some(split) = lower.rfind(" to ") {
                    let mut plan = CommandPlan::new(CommandIntent::SetAlias, prompt);
                    plan.notes = Some(rest[..split].trim().to_string());
                    plan.card_name = Some(rest[split + 4..].trim().to_string());
                    return Some(plan);
                }
            }
            return None;
        }

        // Entity creation before record commands, so "create card" is not
        // mistaken for an expense on a card.
        if contains_any(&words, &CREATE_WORDS) || contains_phrase(&normalized, "set up") {
            if contains_any(&words, &["budget"]) {
                return Some(CommandPlan::new(CommandIntent::CreateBudget, prompt));
            }
            if contains_any(&words, &["card"]) {
                let mut plan = CommandPlan::new(CommandIntent::CreateCard, prompt);
                plan.entity_name = tail_after(prompt, &["card called ", "card named ", "card "]);
                return Some(plan);
            }
            if contains_any(&words, &["category"]) {
                let mut plan = CommandPlan::new(CommandIntent::CreateCategory, prompt);
                plan.entity_name =
                    tail_after(prompt, &["category called ", "category named ", "category "]);
                return Some(plan);
            }
        }

        if contains_any(&words, &["style"]) && contains_any(&words, &["card"]) {
            let mut plan = CommandPlan::new(CommandIntent::StyleCard, prompt);
            plan.card_name = best_match(prompt, &entities.cards);
            return Some(plan);
        }

        let mentions_planned = contains_any(&words, &["planned", "preset"]);
        let mentions_expense = contains_any(&words, &["expense", "spent", "bought"]);
        let mentions_income = contains_any(&words, &["income", "paycheck"])
            || contains_phrase(&normalized, "got paid");

        let action = if contains_any(&words, &DELETE_WORDS) {
            Action::Delete
        } else if contains_any(&words, &EDIT_WORDS) {
            Action::Edit
        } else if contains_any(&words, &ADD_WORDS) {
            Action::Add
        } else {
            return None;
        };

        let intent = match (action, mentions_planned, mentions_expense, mentions_income) {
            (Action::Add, true, _, false) => CommandIntent::AddPlannedExpense,
            (Action::Edit, true, _, false) => CommandIntent::EditPlannedExpense,
            (Action::Delete, true, _, false) => CommandIntent::DeletePlannedExpense,
            (Action::Add, false, _, true) => CommandIntent::AddIncome,
            (Action::Edit, false, _, true) => CommandIntent::EditIncome,
            (Action::Delete, false, _, true) => CommandIntent::DeleteIncome,
            (Action::Add, false, true, false) => CommandIntent::AddExpense,
            (Action::Edit, false, true, false) => CommandIntent::EditExpense,
            (Action::Delete, false, true, false) => CommandIntent::DeleteExpense,
            _ => return None,
        };

        let mut plan = CommandPlan::new(intent, prompt);
        attach_date(&mut plan, &normalized, today);

        match intent {
            CommandIntent::AddExpense | CommandIntent::AddIncome
            | CommandIntent::AddPlannedExpense => {
                plan.amount = amounts.first().copied();
            }
            CommandIntent::EditExpense | CommandIntent::EditIncome
            | CommandIntent::EditPlannedExpense => {
                // "change the $40 coffee to $45": before then after.
                if amounts.len() >= 2 {
                    plan.original_amount = Some(amounts[0]);
                    plan.amount = Some(amounts[1]);
                } else {
                    plan.amount = amounts.first().copied();
                }
            }
            CommandIntent::DeleteExpense | CommandIntent::DeleteIncome
            | CommandIntent::DeletePlannedExpense => {
                plan.original_amount = amounts.first().copied();
            }
            _ => {}
        }

        match intent {
            CommandIntent::AddExpense | CommandIntent::EditExpense
            | CommandIntent::DeleteExpense => {
                plan.card_name = best_match(prompt, &entities.cards);
                plan.category_name = best_match(prompt, &entities.categories);
                plan.notes = tail_after(prompt, &[" for ", " on "]).map(|s| s.to_lowercase());
            }
            CommandIntent::AddIncome | CommandIntent::EditIncome | CommandIntent::DeleteIncome => {
                plan.source = best_match(prompt, &entities.income_sources);
            }
            CommandIntent::AddPlannedExpense
            | CommandIntent::EditPlannedExpense
            | CommandIntent::DeletePlannedExpense => {
                plan.entity_name =
                    tail_after(prompt, &[" for ", " called ", " named "]);
                plan.notes = plan.entity_name.as_ref().map(|s| s.to_lowercase());
            }
            _ => {}
        }

        Some(plan)
    }
}

#[derive(Clone, Copy, PartialEq)]
enum Action {
    Add,
    Edit,
    Delete,
}

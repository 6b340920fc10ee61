//! Pending-turn state machine
//!
//! At most one "awaiting user reply" state exists per conversation. The
//! turn handler routes raw input here before any fresh parsing, and states
//! are checked in one fixed priority chain, so two states can never be
//! live at once. An unrecognized reply re-presents the same prompt; the
//! state only clears on a valid reply or a conversation clear.

use serde::{Deserialize, Serialize};

use crate::command::{AmountTarget, CommandIntent, CommandPlan};
use crate::entities::{ExpenseRecord, IncomeRecord, PlannedExpenseRecord};
use crate::fuzzy::best_match;
use crate::normalize::normalize;

/// Themes offered by the card styling wizard.
pub const CARD_THEMES: [&str; 4] = ["Midnight", "Ocean", "Sunset", "Forest"];
/// Finish effects offered by the card styling wizard.
pub const CARD_EFFECTS: [&str; 4] = ["Classic", "Glossy", "Matte", "Holo"];

/// Steps of the card styling wizard, entered automatically after creating
/// a card with no explicit theme or effect.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CardStyleStep {
    Offer,
    ThemeSelection,
    EffectSelection,
}

/// Steps of the budget creation wizard: cards-choice, optional
/// cards-selection, presets-choice, optional presets-selection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BudgetCreationStep {
    CardsChoice,
    CardsSelection,
    PresetsChoice,
    PresetsSelection,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DeleteKind {
    Expense,
    Income,
}

/// The single outstanding awaiting-reply condition.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum PendingState {
    CategoryColorConfirmation {
        plan: CommandPlan,
        proposed_color: String,
    },
    CardStyle {
        step: CardStyleStep,
        card_name: String,
        theme: Option<String>,
    },
    BudgetCreation {
        step: BudgetCreationStep,
        plan: CommandPlan,
        card_options: Vec<String>,
        preset_options: Vec<String>,
    },
    DeleteConfirmation {
        kind: DeleteKind,
        plan: CommandPlan,
        candidate_label: String,
    },
    ExpenseDisambiguation {
        plan: CommandPlan,
        candidates: Vec<ExpenseRecord>,
    },
    PlannedExpenseDisambiguation {
        plan: CommandPlan,
        candidates: Vec<PlannedExpenseRecord>,
    },
    IncomeDisambiguation {
        plan: CommandPlan,
        candidates: Vec<IncomeRecord>,
    },
    CardSelection {
        plan: CommandPlan,
        options: Vec<String>,
    },
    PresetCardSelection {
        plan: CommandPlan,
        options: Vec<String>,
    },
    IncomeKind {
        plan: CommandPlan,
    },
    PlannedExpenseAmountTarget {
        plan: CommandPlan,
    },
}

/// Result of feeding a reply to the active pending state.
#[derive(Debug, Clone, PartialEq)]
pub enum PendingOutcome {
    /// Reply not understood: keep the state, re-present this prompt.
    Reprompt(String),
    /// Wizard advanced to another pending state.
    Advance {
        next: PendingState,
        message: String,
    },
    /// Replay the augmented command plan through the command flow.
    Replay(CommandPlan),
    /// Terminal: hand the plan to the mutation service.
    Execute(CommandPlan),
    /// User backed out; state cleared, nothing performed.
    Cancelled,
}

fn expense_label(rec: &ExpenseRecord) -> String {
    format!("{} ${:.2} on {}", rec.description, rec.amount, rec.date)
}

fn income_label(rec: &IncomeRecord) -> String {
    let kind = if rec.planned { "planned" } else { "actual" };
    format!("{} ${:.2} ({}) on {}", rec.source, rec.amount, kind, rec.date)
}

fn planned_label(rec: &PlannedExpenseRecord) -> String {
    format!("{} ${:.2}", rec.title, rec.amount)
}

fn numbered(options: &[String]) -> String {
    options
        .iter()
        .enumerate()
        .map(|(i, o)| format!("{}. {}", i + 1, o))
        .collect::<Vec<_>>()
        .join("\n")
}

/// "yes"/"no" vocabulary. None when the reply is neither.
fn parse_yes_no(reply: &str) -> Option<bool> {
    match normalize(reply).as_str() {
        "yes" | "y" | "yeah" | "yep" | "confirm" | "ok" | "sure" | "do it" => Some(true),
        "no" | "n" | "nope" | "cancel" | "skip" | "nah" => Some(false),
        _ => None,
    }
}

fn is_skip(reply: &str) -> bool {
    matches!(normalize(reply).as_str(), "skip" | "none" | "no" | "n")
}

/// Parse a reply as a 1-based index into `options`, or a fuzzy match
/// against the option labels.
fn parse_choice(reply: &str, options: &[String]) -> Option<usize> {
    let norm = normalize(reply);
    if let Ok(n) = norm.parse::<usize>() {
        if (1..=options.len()).contains(&n) {
            return Some(n - 1);
        }
    }
    let hit = best_match(reply, options)?;
    options.iter().position(|o| *o == hit)
}

/// Parse a multi-select reply ("1 and 3", "chase, amex") into option
/// values, preserving option order and deduplicating.
fn parse_multi_choice(reply: &str, options: &[String]) -> Vec<String> {
    // Commas must be split off the raw reply; normalization turns them
    // into spaces and would fuse the parts into one fuzzy lookup.
    let mut picked_idx: Vec<usize> = Vec::new();
    for raw_part in reply.split(',') {
        let norm = normalize(raw_part);
        for part in norm.split(" and ") {
            let part = part.trim();
            if part.is_empty() {
                continue;
            }
            if let Some(idx) = parse_choice(part, options) {
                if !picked_idx.contains(&idx) {
                    picked_idx.push(idx);
                }
            }
        }
    }
    picked_idx.sort_unstable();
    picked_idx.into_iter().map(|i| options[i].clone()).collect()
}

fn owned(options: &[&str]) -> Vec<String> {
    options.iter().map(|s| s.to_string()).collect()
}

impl PendingState {
    /// The clarifying prompt for this state, used both when entering it
    /// and when re-presenting after an unrecognized reply.
    pub fn prompt(&self) -> String {
        match self {
            PendingState::CategoryColorConfirmation { proposed_color, plan } => format!(
                "Use {} for {}? (yes/no)",
                proposed_color,
                plan.entity_name.as_deref().unwrap_or("the new category")
            ),
            PendingState::CardStyle { step, card_name, .. } => match step {
                CardStyleStep::Offer => format!(
                    "Want to pick a look for {}? (yes/no)",
                    card_name
                ),
                CardStyleStep::ThemeSelection => format!(
                    "Pick a theme for {}:\n{}",
                    card_name,
                    numbered(&owned(&CARD_THEMES))
                ),
                CardStyleStep::EffectSelection => format!(
                    "And a finish for {}:\n{}",
                    card_name,
                    numbered(&owned(&CARD_EFFECTS))
                ),
            },
            PendingState::BudgetCreation { step, card_options, preset_options, .. } => match step {
                BudgetCreationStep::CardsChoice => {
                    "Attach cards to this budget? (all / choose / skip)".to_string()
                }
                BudgetCreationStep::CardsSelection => format!(
                    "Which cards?\n{}",
                    numbered(card_options)
                ),
                BudgetCreationStep::PresetsChoice => {
                    "Attach presets to this budget? (all / choose / skip)".to_string()
                }
                BudgetCreationStep::PresetsSelection => format!(
                    "Which presets?\n{}",
                    numbered(preset_options)
                ),
            },
            PendingState::DeleteConfirmation { candidate_label, .. } => format!(
                "Delete {}? (yes/no)",
                candidate_label
            ),
            PendingState::ExpenseDisambiguation { candidates, .. } => format!(
                "I found several matching expenses. Which one?\n{}",
                numbered(&candidates.iter().map(expense_label).collect::<Vec<_>>())
            ),
            PendingState::PlannedExpenseDisambiguation { candidates, .. } => format!(
                "I found several matching presets. Which one?\n{}",
                numbered(&candidates.iter().map(planned_label).collect::<Vec<_>>())
            ),
            PendingState::IncomeDisambiguation { candidates, .. } => format!(
                "I found several matching income entries. Which one?\n{}",
                numbered(&candidates.iter().map(income_label).collect::<Vec<_>>())
            ),
            PendingState::CardSelection { options, .. } => format!(
                "Which card is this expense on?\n{}",
                numbered(options)
            ),
            PendingState::PresetCardSelection { options, .. } => format!(
                "Which card should this preset bill to?\n{}",
                numbered(options)
            ),
            PendingState::IncomeKind { .. } => {
                "Is this planned or actual income? (planned/actual)".to_string()
            }
            PendingState::PlannedExpenseAmountTarget { .. } => {
                "Apply that to the planned amount or the actual amount? (planned/actual)"
                    .to_string()
            }
        }
    }

    /// Fixed priority of this state in the turn-handling chain. Only one
    /// state is ever live, but the ordering is part of the contract.
    pub fn priority(&self) -> u8 {
        match self {
            PendingState::CategoryColorConfirmation { .. } => 0,
            PendingState::CardStyle { .. } => 1,
            PendingState::BudgetCreation { .. } => 2,
            PendingState::DeleteConfirmation { .. } => 3,
            PendingState::ExpenseDisambiguation { .. } => 4,
            PendingState::PlannedExpenseDisambiguation { .. } => 5,
            PendingState::IncomeDisambiguation { .. } => 6,
            PendingState::CardSelection { .. } => 7,
            PendingState::PresetCardSelection { .. } => 8,
            PendingState::IncomeKind { .. } => 9,
            PendingState::PlannedExpenseAmountTarget { .. } => 10,
        }
    }

    /// Feed the next raw user reply to this state.
    pub fn resolve_reply(&self, reply: &str) -> PendingOutcome {
        match self {
            PendingState::CategoryColorConfirmation { plan, proposed_color } => {
                match parse_yes_no(reply) {
                    Some(true) => {
                        PendingOutcome::Execute(plan.with_category_color(proposed_color.clone()))
                    }
                    Some(false) => PendingOutcome::Execute(plan.clone()),
                    None => PendingOutcome::Reprompt(self.prompt()),
                }
            }

            PendingState::CardStyle { step, card_name, theme } => {
                self.resolve_card_style(*step, card_name, theme.as_deref(), reply)
            }

            PendingState::BudgetCreation { step, plan, card_options, preset_options } => {
                self.resolve_budget(*step, plan, card_options, preset_options, reply)
            }

            PendingState::DeleteConfirmation { plan, .. } => match parse_yes_no(reply) {
                Some(true) => PendingOutcome::Execute(plan.clone()),
                Some(false) => PendingOutcome::Cancelled,
                None => PendingOutcome::Reprompt(self.prompt()),
            },

            PendingState::ExpenseDisambiguation { plan, candidates } => {
                let labels: Vec<String> = candidates.iter().map(expense_label).collect();
                match parse_choice(reply, &labels) {
                    Some(idx) => {
                        let chosen = &candidates[idx];
                        let picked = plan.with_target_record(chosen.id.clone());
                        if plan.intent == CommandIntent::DeleteExpense {
                            PendingOutcome::Advance {
                                next: PendingState::DeleteConfirmation {
                                    kind: DeleteKind::Expense,
                                    candidate_label: labels[idx].clone(),
                                    plan: picked,
                                },
                                message: String::new(),
                            }
                        } else {
                            PendingOutcome::Execute(picked)
                        }
                    }
                    None => PendingOutcome::Reprompt(self.prompt()),
                }
            }

            PendingState::PlannedExpenseDisambiguation { plan, candidates } => {
                let labels: Vec<String> = candidates.iter().map(planned_label).collect();
                match parse_choice(reply, &labels) {
                    Some(idx) => {
                        PendingOutcome::Execute(plan.with_target_record(candidates[idx].id.clone()))
                    }
                    None => PendingOutcome::Reprompt(self.prompt()),
                }
            }

            PendingState::IncomeDisambiguation { plan, candidates } => {
                let labels: Vec<String> = candidates.iter().map(income_label).collect();
                match parse_choice(reply, &labels) {
                    Some(idx) => {
                        let chosen = &candidates[idx];
                        let picked = plan.with_target_record(chosen.id.clone());
                        if plan.intent == CommandIntent::DeleteIncome {
                            PendingOutcome::Advance {
                                next: PendingState::DeleteConfirmation {
                                    kind: DeleteKind::Income,
                                    candidate_label: labels[idx].clone(),
                                    plan: picked,
                                },
                                message: String::new(),
                            }
                        } else {
                            PendingOutcome::Execute(picked)
                        }
                    }
                    None => PendingOutcome::Reprompt(self.prompt()),
                }
            }

            PendingState::CardSelection { plan, options } => {
                match parse_choice(reply, options) {
                    Some(idx) => PendingOutcome::Replay(plan.with_card_name(options[idx].clone())),
                    None => PendingOutcome::Reprompt(self.prompt()),
                }
            }

            PendingState::PresetCardSelection { plan, options } => {
                match parse_choice(reply, options) {
                    Some(idx) => PendingOutcome::Replay(plan.with_card_name(options[idx].clone())),
                    None => PendingOutcome::Reprompt(self.prompt()),
                }
            }

            PendingState::IncomeKind { plan } => {
                let norm = normalize(reply);
                let kind_options = owned(&["planned", "actual"]);
                let planned = if matches!(norm.as_str(), "planned" | "expected" | "upcoming") {
                    Some(true)
                } else if matches!(norm.as_str(), "actual" | "received" | "real") {
                    Some(false)
                } else {
                    parse_choice(reply, &kind_options).map(|idx| idx == 0)
                };
                match planned {
                    Some(p) => PendingOutcome::Replay(plan.with_income_kind(p)),
                    None => PendingOutcome::Reprompt(self.prompt()),
                }
            }

            PendingState::PlannedExpenseAmountTarget { plan } => {
                let norm = normalize(reply);
                let options = owned(&["planned amount", "actual amount"]);
                let target = if norm.starts_with("planned") {
                    Some(AmountTarget::Planned)
                } else if norm.starts_with("actual") {
                    Some(AmountTarget::Actual)
                } else {
                    parse_choice(reply, &options).map(|idx| {
                        if idx == 0 {
                            AmountTarget::Planned
                        } else {
                            AmountTarget::Actual
                        }
                    })
                };
                match target {
                    Some(t) => PendingOutcome::Replay(plan.with_amount_target(t)),
                    None => PendingOutcome::Reprompt(self.prompt()),
                }
            }
        }
    }

    fn resolve_card_style(
        &self,
        step: CardStyleStep,
        card_name: &str,
        theme: Option<&str>,
        reply: &str,
    ) -> PendingOutcome {
        match step {
            CardStyleStep::Offer => match parse_yes_no(reply) {
                Some(true) => {
                    let next = PendingState::CardStyle {
                        step: CardStyleStep::ThemeSelection,
                        card_name: card_name.to_string(),
                        theme: None,
                    };
                    let message = next.prompt();
                    PendingOutcome::Advance { next, message }
                }
                Some(false) => PendingOutcome::Cancelled,
                None => PendingOutcome::Reprompt(self.prompt()),
            },
            CardStyleStep::ThemeSelection => {
                if is_skip(reply) {
                    let next = PendingState::CardStyle {
                        step: CardStyleStep::EffectSelection,
                        card_name: card_name.to_string(),
                        theme: None,
                    };
                    let message = next.prompt();
                    return PendingOutcome::Advance { next, message };
                }
                match parse_choice(reply, &owned(&CARD_THEMES)) {
                    Some(idx) => {
                        let next = PendingState::CardStyle {
                            step: CardStyleStep::EffectSelection,
                            card_name: card_name.to_string(),
                            theme: Some(CARD_THEMES[idx].to_string()),
                        };
                        let message = next.prompt();
                        PendingOutcome::Advance { next, message }
                    }
                    None => PendingOutcome::Reprompt(self.prompt()),
                }
            }
            CardStyleStep::EffectSelection => {
                let effect = if is_skip(reply) {
                    None
                } else {
                    match parse_choice(reply, &owned(&CARD_EFFECTS)) {
                        Some(idx) => Some(CARD_EFFECTS[idx].to_string()),
                        None => return PendingOutcome::Reprompt(self.prompt()),
                    }
                };
                if theme.is_none() && effect.is_none() {
                    return PendingOutcome::Cancelled;
                }
                let mut style = CommandPlan::new(CommandIntent::StyleCard, reply);
                style.card_name = Some(card_name.to_string());
                style.card_theme = theme.map(|t| t.to_string());
                style.card_effect = effect;
                PendingOutcome::Execute(style)
            }
        }
    }

    fn resolve_budget(
        &self,
        step: BudgetCreationStep,
        plan: &CommandPlan,
        card_options: &[String],
        preset_options: &[String],
        reply: &str,
    ) -> PendingOutcome {
        let advance = |step: BudgetCreationStep, plan: CommandPlan| {
            let next = PendingState::BudgetCreation {
                step,
                plan,
                card_options: card_options.to_vec(),
                preset_options: preset_options.to_vec(),
            };
            let message = next.prompt();
            PendingOutcome::Advance { next, message }
        };
        let norm = normalize(reply);

        match step {
            BudgetCreationStep::CardsChoice => {
                if norm.contains("all") {
                    advance(BudgetCreationStep::PresetsChoice, plan.with_attach_all_cards())
                } else if norm.contains("choose") || norm.contains("specific") || norm.contains("pick") {
                    if card_options.is_empty() {
                        advance(BudgetCreationStep::PresetsChoice, plan.clone())
                    } else {
                        advance(BudgetCreationStep::CardsSelection, plan.clone())
                    }
                } else if is_skip(reply) {
                    advance(BudgetCreationStep::PresetsChoice, plan.clone())
                } else {
                    PendingOutcome::Reprompt(self.prompt())
                }
            }
            BudgetCreationStep::CardsSelection => {
                let picked = parse_multi_choice(reply, card_options);
                if picked.is_empty() {
                    PendingOutcome::Reprompt(self.prompt())
                } else {
                    advance(
                        BudgetCreationStep::PresetsChoice,
                        plan.with_selected_cards(picked),
                    )
                }
            }
            BudgetCreationStep::PresetsChoice => {
                if norm.contains("all") {
                    PendingOutcome::Execute(plan.with_attach_all_presets())
                } else if norm.contains("choose") || norm.contains("specific") || norm.contains("pick") {
                    if preset_options.is_empty() {
                        PendingOutcome::Execute(plan.clone())
                    } else {
                        advance(BudgetCreationStep::PresetsSelection, plan.clone())
                    }
                } else if is_skip(reply) {
                    PendingOutcome::Execute(plan.clone())
                } else {
                    PendingOutcome::Reprompt(self.prompt())
                }
            }
            BudgetCreationStep::PresetsSelection => {
                let picked = parse_multi_choice(reply, preset_options);
                if picked.is_empty() {
                    PendingOutcome::Reprompt(self.prompt())
                } else {
                    PendingOutcome::Execute(plan.with_selected_presets(picked))
                }
            }
        }
    }
}

//! Command plans
//!
//! A `CommandPlan` is the parsed form of a mutation request ("add a $12
//! coffee expense"). It is an immutable record: multi-turn wizards never
//! mutate one in place, they produce a copy with one field overridden via
//! the `with_*` constructors, so the original `raw_prompt` and
//! `original_amount` provenance survives every replay.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use crate::dates::DateRange;
use crate::metric::ConfidenceBand;

/// Mutation intents the state machine knows how to drive.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CommandIntent {
    AddExpense,
    EditExpense,
    DeleteExpense,
    AddIncome,
    EditIncome,
    DeleteIncome,
    AddPlannedExpense,
    EditPlannedExpense,
    DeletePlannedExpense,
    CreateCard,
    StyleCard,
    CreateCategory,
    CreateBudget,
    SetAlias,
}

impl CommandIntent {
    pub fn as_str(&self) -> &'static str {
        match self {
            CommandIntent::AddExpense => "add_expense",
            CommandIntent::EditExpense => "edit_expense",
            CommandIntent::DeleteExpense => "delete_expense",
            CommandIntent::AddIncome => "add_income",
            CommandIntent::EditIncome => "edit_income",
            CommandIntent::DeleteIncome => "delete_income",
            CommandIntent::AddPlannedExpense => "add_planned_expense",
            CommandIntent::EditPlannedExpense => "edit_planned_expense",
            CommandIntent::DeletePlannedExpense => "delete_planned_expense",
            CommandIntent::CreateCard => "create_card",
            CommandIntent::StyleCard => "style_card",
            CommandIntent::CreateCategory => "create_category",
            CommandIntent::CreateBudget => "create_budget",
            CommandIntent::SetAlias => "set_alias",
        }
    }
}

/// For planned-expense edits: does the new amount replace the planned
/// amount or the actual amount?
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AmountTarget {
    Planned,
    Actual,
}

/// Immutable record of a parsed mutation request.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CommandPlan {
    pub intent: CommandIntent,
    pub confidence: ConfidenceBand,
    /// The untouched user text that produced this plan.
    pub raw_prompt: String,
    pub amount: Option<f64>,
    /// For edits: the "before" amount ("change the $40 coffee to $45").
    pub original_amount: Option<f64>,
    pub date: Option<NaiveDate>,
    pub date_range: Option<DateRange>,
    pub notes: Option<String>,
    pub source: Option<String>,
    pub card_name: Option<String>,
    pub category_name: Option<String>,
    pub entity_name: Option<String>,
    pub is_planned_income: Option<bool>,
    pub card_theme: Option<String>,
    pub card_effect: Option<String>,
    pub category_color: Option<String>,
    pub planned_expense_amount_target: Option<AmountTarget>,
    pub attach_all_cards: bool,
    pub attach_all_presets: bool,
    pub selected_card_names: Vec<String>,
    pub selected_preset_titles: Vec<String>,
    /// Id of the ledger record this mutation was disambiguated to.
    pub target_record_id: Option<String>,
}

impl CommandPlan {
    pub fn new(intent: CommandIntent, raw_prompt: impl Into<String>) -> Self {
        CommandPlan {
            intent,
            confidence: ConfidenceBand::High,
            raw_prompt: raw_prompt.into(),
            amount: None,
            original_amount: None,
            date: None,
            date_range: None,
            notes: None,
            source: None,
            card_name: None,
            category_name: None,
            entity_name: None,
            is_planned_income: None,
            card_theme: None,
            card_effect: None,
            category_color: None,
            planned_expense_amount_target: None,
            attach_all_cards: false,
            attach_all_presets: false,
            selected_card_names: Vec::new(),
            selected_preset_titles: Vec::new(),
            target_record_id: None,
        }
    }

    pub fn with_amount(&self, amount: f64) -> Self {
        let mut next = self.clone();
        next.amount = Some(amount);
        next
    }

    pub fn with_date(&self, date: NaiveDate) -> Self {
        let mut next = self.clone();
        next.date = Some(date);
        next
    }

    pub fn with_card_name(&self, card: impl Into<String>) -> Self {
        let mut next = self.clone();
        next.card_name = Some(card.into());
        next
    }

    pub fn with_category_color(&self, color: impl Into<String>) -> Self {
        let mut next = self.clone();
        next.category_color = Some(color.into());
        next
    }

    pub fn with_income_kind(&self, planned: bool) -> Self {
        let mut next = self.clone();
        next.is_planned_income = Some(planned);
        next
    }

    pub fn with_amount_target(&self, target: AmountTarget) -> Self {
        let mut next = self.clone();
        next.planned_expense_amount_target = Some(target);
        next
    }

    pub fn with_attach_all_cards(&self) -> Self {
        let mut next = self.clone();
        next.attach_all_cards = true;
        next
    }

    pub fn with_attach_all_presets(&self) -> Self {
        let mut next = self.clone();
        next.attach_all_presets = true;
        next
    }

    pub fn with_selected_cards(&self, names: Vec<String>) -> Self {
        let mut next = self.clone();
        next.selected_card_names = names;
        next
    }

    pub fn with_selected_presets(&self, titles: Vec<String>) -> Self {
        let mut next = self.clone();
        next.selected_preset_titles = titles;
        next
    }

    pub fn with_target_record(&self, id: impl Into<String>) -> Self {
        let mut next = self.clone();
        next.target_record_id = Some(id.into());
        next
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn overrides_preserve_provenance() {
        let base = CommandPlan::new(CommandIntent::EditExpense, "change the $40 coffee to $45");
        let mut edited = base.with_amount(45.0);
        edited.original_amount = Some(40.0);

        let replayed = edited.with_card_name("Chase");
        assert_eq!(replayed.raw_prompt, "change the $40 coffee to $45");
        assert_eq!(replayed.original_amount, Some(40.0));
        assert_eq!(replayed.amount, Some(45.0));
        // The base plan is untouched.
        assert_eq!(base.amount, None);
        assert_eq!(base.card_name, None);
    }
}

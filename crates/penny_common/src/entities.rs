//! Workspace entity tables and ledger records
//!
//! The engine never owns storage. Each turn it is handed a read-only
//! snapshot of the workspace's lookup tables (cards, categories, income
//! sources, presets, alias rules) plus the ledger records that candidate
//! ranking may need to inspect when a mutation target is ambiguous.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

/// Entity kind used to scope alias rules and target resolution.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EntityKind {
    Card,
    Category,
    IncomeSource,
    Preset,
}

impl EntityKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            EntityKind::Card => "card",
            EntityKind::Category => "category",
            EntityKind::IncomeSource => "income_source",
            EntityKind::Preset => "preset",
        }
    }

    /// Plural label used in clarification copy ("All cards", ...).
    pub fn plural_label(&self) -> &'static str {
        match self {
            EntityKind::Card => "cards",
            EntityKind::Category => "categories",
            EntityKind::IncomeSource => "income sources",
            EntityKind::Preset => "presets",
        }
    }
}

/// User-defined alias: a phrase that should resolve to a canonical entity
/// name, scoped to one entity kind.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AliasRule {
    pub kind: EntityKind,
    /// The phrase the user types ("my daily driver").
    pub alias: String,
    /// The canonical entity name it maps to ("Chase Freedom").
    pub target: String,
}

/// A recorded variable expense.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExpenseRecord {
    pub id: String,
    pub amount: f64,
    pub date: NaiveDate,
    pub description: String,
    pub card_name: Option<String>,
    pub category_name: Option<String>,
}

/// A recorded income entry. `planned` distinguishes expected income from
/// income that actually landed.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IncomeRecord {
    pub id: String,
    pub amount: f64,
    pub date: NaiveDate,
    pub source: String,
    pub planned: bool,
}

/// A planned (preset) expense, e.g. a recurring bill.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PlannedExpenseRecord {
    pub id: String,
    pub title: String,
    pub amount: f64,
    pub due_date: Option<NaiveDate>,
}

/// Read-only per-turn snapshot of everything the engine can match against.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct WorkspaceEntities {
    pub cards: Vec<String>,
    pub categories: Vec<String>,
    pub income_sources: Vec<String>,
    pub presets: Vec<String>,
    pub variable_expenses: Vec<ExpenseRecord>,
    pub incomes: Vec<IncomeRecord>,
    pub planned_expenses: Vec<PlannedExpenseRecord>,
    pub alias_rules: Vec<AliasRule>,
}

impl WorkspaceEntities {
    /// Candidate names for a given entity kind, in stored order.
    pub fn names_for(&self, kind: EntityKind) -> &[String] {
        match kind {
            EntityKind::Card => &self.cards,
            EntityKind::Category => &self.categories,
            EntityKind::IncomeSource => &self.income_sources,
            EntityKind::Preset => &self.presets,
        }
    }
}

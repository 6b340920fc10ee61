//! In-memory demo ledger and reference collaborator implementations.
//!
//! Demo-quality only: enough to exercise every engine flow from the REPL.
//! Real hosts bring their own storage behind the same traits.

use std::cell::RefCell;
use std::collections::BTreeMap;
use std::rc::Rc;

use chrono::{Datelike, Days, NaiveDate};

use penny_common::{
    AliasRule, Answer, AnswerKind, AnswerRow, CommandIntent, CommandPlan, EntityKind,
    ExpenseRecord, IncomeRecord, Intent, MutationService, MutationSummary, PlannedExpenseRecord,
    Query, QueryExecutor, ValidationError, WorkspaceEntities,
};

pub type SharedLedger = Rc<RefCell<Ledger>>;

#[derive(Debug, Default)]
pub struct Ledger {
    pub entities: WorkspaceEntities,
    next_id: u64,
}

impl Ledger {
    /// Seed a small workspace with activity around `today`.
    pub fn demo(today: NaiveDate) -> SharedLedger {
        let mut ledger = Ledger::default();
        let e = &mut ledger.entities;
        e.cards = vec!["Chase Freedom".to_string(), "Amex Gold".to_string()];
        e.categories = vec![
            "Groceries".to_string(),
            "Dining".to_string(),
            "Transport".to_string(),
        ];
        e.income_sources = vec!["Salary".to_string(), "Freelance".to_string()];
        e.presets = vec!["Rent".to_string(), "Gym".to_string()];
        e.alias_rules = vec![AliasRule {
            kind: EntityKind::Card,
            alias: "my daily driver".to_string(),
            target: "Chase Freedom".to_string(),
        }];

        let ledger = Rc::new(RefCell::new(ledger));
        {
            let mut l = ledger.borrow_mut();
            let days_ago = |n: u64| today.checked_sub_days(Days::new(n)).unwrap_or(today);
            let samples = [
                (42.50, 1, "coffee and pastries", "Chase Freedom", "Dining"),
                (118.20, 3, "weekly groceries", "Amex Gold", "Groceries"),
                (23.00, 5, "train pass", "Chase Freedom", "Transport"),
                (64.75, 12, "dinner out", "Amex Gold", "Dining"),
                (97.10, 34, "groceries", "Amex Gold", "Groceries"),
            ];
            for (amount, ago, desc, card, category) in samples {
                let id = l.allocate_id("exp");
                l.entities.variable_expenses.push(ExpenseRecord {
                    id,
                    amount,
                    date: days_ago(ago),
                    description: desc.to_string(),
                    card_name: Some(card.to_string()),
                    category_name: Some(category.to_string()),
                });
            }
            let incomes = [(3200.0, 14, "Salary", false), (450.0, 6, "Freelance", false)];
            for (amount, ago, source, planned) in incomes {
                let id = l.allocate_id("inc");
                l.entities.incomes.push(IncomeRecord {
                    id,
                    amount,
                    date: days_ago(ago),
                    source: source.to_string(),
                    planned,
                });
            }
            let presets = [("Rent", 1450.0, 10), ("Gym", 39.0, 4)];
            for (title, amount, due_in) in presets {
                let id = l.allocate_id("pre");
                let due = today.checked_add_days(Days::new(due_in));
                l.entities.planned_expenses.push(PlannedExpenseRecord {
                    id,
                    title: title.to_string(),
                    amount,
                    due_date: due,
                });
            }
        }
        ledger
    }

    pub fn allocate_id(&mut self, prefix: &str) -> String {
        self.next_id += 1;
        format!("{}-{}", prefix, self.next_id)
    }
}

fn money(amount: f64) -> String {
    format!("${:.2}", amount)
}

fn in_range(query: &Query, date: NaiveDate) -> bool {
    query.date_range.map_or(true, |r| r.contains(date))
}

/// Reference query executor over the demo ledger.
pub struct DemoExecutor {
    ledger: SharedLedger,
}

impl DemoExecutor {
    pub fn new(ledger: SharedLedger) -> Self {
        DemoExecutor { ledger }
    }

    fn spend_total(&self, query: &Query, card: Option<&str>, category: Option<&str>) -> f64 {
        self.ledger
            .borrow()
            .entities
            .variable_expenses
            .iter()
            .filter(|e| in_range(query, e.date))
            .filter(|e| card.map_or(true, |c| e.card_name.as_deref() == Some(c)))
            .filter(|e| category.map_or(true, |c| e.category_name.as_deref() == Some(c)))
            .map(|e| e.amount)
            .sum()
    }

    fn category_totals(&self, query: &Query) -> Vec<(String, f64)> {
        let ledger = self.ledger.borrow();
        let mut totals: BTreeMap<String, f64> = BTreeMap::new();
        for e in &ledger.entities.variable_expenses {
            if !in_range(query, e.date) {
                continue;
            }
            let category = e
                .category_name
                .clone()
                .unwrap_or_else(|| "Uncategorized".to_string());
            *totals.entry(category).or_insert(0.0) += e.amount;
        }
        let mut ranked: Vec<(String, f64)> = totals.into_iter().collect();
        ranked.sort_by(|a, b| b.1.partial_cmp(&a.1).unwrap_or(std::cmp::Ordering::Equal));
        ranked
    }

    fn income_total(&self, query: &Query, source: Option<&str>) -> f64 {
        self.ledger
            .borrow()
            .entities
            .incomes
            .iter()
            .filter(|i| in_range(query, i.date))
            .filter(|i| source.map_or(true, |s| i.source == s))
            .map(|i| i.amount)
            .sum()
    }
}

impl QueryExecutor for DemoExecutor {
    fn execute(&self, query: &Query, _entities: &WorkspaceEntities, today: NaiveDate) -> Answer {
        let target = query.target_name.as_deref();
        match query.intent {
            Intent::Overview => {
                let spend = self.spend_total(query, None, None);
                let income = self.income_total(query, None);
                Answer {
                    title: "Overview".to_string(),
                    subtitle: None,
                    primary_value: Some(money(income - spend)),
                    rows: vec![
                        AnswerRow {
                            label: "Income".to_string(),
                            value: money(income),
                        },
                        AnswerRow {
                            label: "Spending".to_string(),
                            value: money(spend),
                        },
                    ],
                    kind: AnswerKind::Value,
                }
            }
            Intent::SpendTotal => {
                let total = self.spend_total(query, None, None);
                Answer {
                    title: "Total spending".to_string(),
                    subtitle: None,
                    primary_value: Some(money(total)),
                    rows: Vec::new(),
                    kind: AnswerKind::Value,
                }
            }
            Intent::CardSpend => {
                let total = self.spend_total(query, target, None);
                Answer {
                    title: match target {
                        Some(card) => format!("Spending on {}", card),
                        None => "Spending across all cards".to_string(),
                    },
                    subtitle: None,
                    primary_value: Some(money(total)),
                    rows: Vec::new(),
                    kind: AnswerKind::Value,
                }
            }
            Intent::CategorySpend => {
                let total = self.spend_total(query, None, target);
                Answer {
                    title: match target {
                        Some(c) => format!("Spending in {}", c),
                        None => "Spending across all categories".to_string(),
                    },
                    subtitle: None,
                    primary_value: Some(money(total)),
                    rows: Vec::new(),
                    kind: AnswerKind::Value,
                }
            }
            Intent::TopCategories | Intent::TopCategory => {
                let limit = if query.intent == Intent::TopCategory {
                    1
                } else {
                    query.result_limit as usize
                };
                let rows = self
                    .category_totals(query)
                    .into_iter()
                    .take(limit)
                    .map(|(label, total)| AnswerRow {
                        label,
                        value: money(total),
                    })
                    .collect();
                Answer {
                    title: "Top categories".to_string(),
                    subtitle: None,
                    primary_value: None,
                    rows,
                    kind: AnswerKind::List,
                }
            }
            Intent::CategorySpendShare => {
                let all = self.spend_total(&strip_range(query), None, None);
                let part = self.spend_total(&strip_range(query), None, target);
                let share = if all > 0.0 { part / all * 100.0 } else { 0.0 };
                Answer {
                    title: match target {
                        Some(c) => format!("{} share of spending", c),
                        None => "Category share of spending".to_string(),
                    },
                    subtitle: None,
                    primary_value: Some(format!("{:.1}%", share)),
                    rows: Vec::new(),
                    kind: AnswerKind::Value,
                }
            }
            Intent::IncomeShare => {
                let all = self.income_total(query, None);
                let part = self.income_total(query, target);
                let share = if all > 0.0 { part / all * 100.0 } else { 0.0 };
                Answer {
                    title: match target {
                        Some(s) => format!("{} share of income", s),
                        None => "Income by source".to_string(),
                    },
                    subtitle: None,
                    primary_value: Some(format!("{:.1}%", share)),
                    rows: Vec::new(),
                    kind: AnswerKind::Value,
                }
            }
            Intent::IncomeAverage => {
                let ledger = self.ledger.borrow();
                let amounts: Vec<f64> = ledger
                    .entities
                    .incomes
                    .iter()
                    .filter(|i| target.map_or(true, |t| i.source == t))
                    .map(|i| i.amount)
                    .collect();
                let avg = if amounts.is_empty() {
                    0.0
                } else {
                    amounts.iter().sum::<f64>() / amounts.len() as f64
                };
                Answer {
                    title: "Average income entry".to_string(),
                    subtitle: None,
                    primary_value: Some(money(avg)),
                    rows: Vec::new(),
                    kind: AnswerKind::Value,
                }
            }
            Intent::PresetDueSoon => {
                let ledger = self.ledger.borrow();
                let horizon = today.checked_add_days(Days::new(14)).unwrap_or(today);
                let mut due: Vec<&PlannedExpenseRecord> = ledger
                    .entities
                    .planned_expenses
                    .iter()
                    .filter(|p| p.due_date.map_or(false, |d| d >= today && d <= horizon))
                    .collect();
                due.sort_by_key(|p| p.due_date);
                let rows = due
                    .into_iter()
                    .take(query.result_limit as usize)
                    .map(|p| AnswerRow {
                        label: format!(
                            "{} (due {})",
                            p.title,
                            p.due_date.map_or("?".to_string(), |d| d.to_string())
                        ),
                        value: money(p.amount),
                    })
                    .collect();
                Answer {
                    title: "Due in the next two weeks".to_string(),
                    subtitle: None,
                    primary_value: None,
                    rows,
                    kind: AnswerKind::List,
                }
            }
            Intent::PresetHighestCost => {
                let ledger = self.ledger.borrow();
                let top = ledger
                    .entities
                    .planned_expenses
                    .iter()
                    .max_by(|a, b| {
                        a.amount
                            .partial_cmp(&b.amount)
                            .unwrap_or(std::cmp::Ordering::Equal)
                    });
                match top {
                    Some(p) => Answer {
                        title: format!("Biggest planned expense: {}", p.title),
                        subtitle: None,
                        primary_value: Some(money(p.amount)),
                        rows: Vec::new(),
                        kind: AnswerKind::Value,
                    },
                    None => Answer::message("No planned expenses yet.", AnswerKind::Message),
                }
            }
            Intent::MonthOverMonth => {
                let (this_start, this_end) = month_bounds(today.year(), today.month());
                let (y, m) = if today.month() == 1 {
                    (today.year() - 1, 12)
                } else {
                    (today.year(), today.month() - 1)
                };
                let (last_start, last_end) = month_bounds(y, m);
                let ledger = self.ledger.borrow();
                let total_in = |start: NaiveDate, end: NaiveDate| -> f64 {
                    ledger
                        .entities
                        .variable_expenses
                        .iter()
                        .filter(|e| e.date >= start && e.date <= end)
                        .map(|e| e.amount)
                        .sum()
                };
                let this_total = total_in(this_start, this_end);
                let last_total = total_in(last_start, last_end);
                Answer {
                    title: "This month vs last month".to_string(),
                    subtitle: None,
                    primary_value: Some(money(this_total - last_total)),
                    rows: vec![
                        AnswerRow {
                            label: "This month".to_string(),
                            value: money(this_total),
                        },
                        AnswerRow {
                            label: "Last month".to_string(),
                            value: money(last_total),
                        },
                    ],
                    kind: AnswerKind::Comparison,
                }
            }
            Intent::CardVariableSpendingHabits
            | Intent::SavingsAverageRecentPeriods
            | Intent::IncomeShareTrend
            | Intent::CategoryShareTrend => Answer::message(
                "The demo ledger doesn't chart trends; a real host computes these.",
                AnswerKind::Message,
            ),
        }
    }
}

fn strip_range(query: &Query) -> Query {
    let mut q = query.clone();
    q.date_range = None;
    q
}

fn month_bounds(year: i32, month: u32) -> (NaiveDate, NaiveDate) {
    let first = NaiveDate::from_ymd_opt(year, month, 1).unwrap_or_default();
    let (ny, nm) = if month == 12 {
        (year + 1, 1)
    } else {
        (year, month + 1)
    };
    let end = NaiveDate::from_ymd_opt(ny, nm, 1)
        .and_then(|d| d.pred_opt())
        .unwrap_or(first);
    (first, end)
}

/// Reference mutation service over the demo ledger.
pub struct DemoMutations {
    ledger: SharedLedger,
    today: NaiveDate,
}

impl DemoMutations {
    pub fn new(ledger: SharedLedger, today: NaiveDate) -> Self {
        DemoMutations { ledger, today }
    }

    fn require_amount(plan: &CommandPlan) -> Result<f64, ValidationError> {
        let amount = plan.amount.ok_or(ValidationError::MissingAmount)?;
        if amount <= 0.0 || !amount.is_finite() {
            return Err(ValidationError::InvalidAmount);
        }
        Ok(amount)
    }
}

impl MutationService for DemoMutations {
    fn perform(&mut self, plan: &CommandPlan) -> Result<MutationSummary, ValidationError> {
        let mut ledger = self.ledger.borrow_mut();
        match plan.intent {
            CommandIntent::AddExpense => {
                let amount = Self::require_amount(plan)?;
                let card = plan
                    .card_name
                    .clone()
                    .ok_or(ValidationError::MissingCard)?;
                let id = ledger.allocate_id("exp");
                let description = plan
                    .notes
                    .clone()
                    .unwrap_or_else(|| "expense".to_string());
                ledger.entities.variable_expenses.push(ExpenseRecord {
                    id,
                    amount,
                    date: plan.date.unwrap_or(self.today),
                    description: description.clone(),
                    card_name: Some(card.clone()),
                    category_name: plan.category_name.clone(),
                });
                Ok(MutationSummary {
                    message: format!("Added {} \"{}\" on {}.", money(amount), description, card),
                })
            }
            CommandIntent::EditExpense => {
                let id = plan
                    .target_record_id
                    .as_deref()
                    .ok_or(ValidationError::RecordMissing)?;
                let amount = Self::require_amount(plan)?;
                let record = ledger
                    .entities
                    .variable_expenses
                    .iter_mut()
                    .find(|e| e.id == id)
                    .ok_or(ValidationError::RecordMissing)?;
                record.amount = amount;
                Ok(MutationSummary {
                    message: format!("Updated \"{}\" to {}.", record.description, money(amount)),
                })
            }
            CommandIntent::DeleteExpense => {
                let id = plan
                    .target_record_id
                    .as_deref()
                    .ok_or(ValidationError::RecordMissing)?;
                let before = ledger.entities.variable_expenses.len();
                ledger.entities.variable_expenses.retain(|e| e.id != id);
                if ledger.entities.variable_expenses.len() == before {
                    return Err(ValidationError::RecordMissing);
                }
                Ok(MutationSummary {
                    message: "Expense deleted.".to_string(),
                })
            }
            CommandIntent::AddIncome => {
                let amount = Self::require_amount(plan)?;
                let source = plan
                    .source
                    .clone()
                    .ok_or(ValidationError::MissingSource)?;
                let id = ledger.allocate_id("inc");
                ledger.entities.incomes.push(IncomeRecord {
                    id,
                    amount,
                    date: plan.date.unwrap_or(self.today),
                    source: source.clone(),
                    planned: plan.is_planned_income.unwrap_or(false),
                });
                Ok(MutationSummary {
                    message: format!("Logged {} from {}.", money(amount), source),
                })
            }
            CommandIntent::EditIncome => {
                let id = plan
                    .target_record_id
                    .as_deref()
                    .ok_or(ValidationError::RecordMissing)?;
                let amount = Self::require_amount(plan)?;
                let record = ledger
                    .entities
                    .incomes
                    .iter_mut()
                    .find(|i| i.id == id)
                    .ok_or(ValidationError::RecordMissing)?;
                record.amount = amount;
                Ok(MutationSummary {
                    message: format!("Updated {} income to {}.", record.source, money(amount)),
                })
            }
            CommandIntent::DeleteIncome => {
                let id = plan
                    .target_record_id
                    .as_deref()
                    .ok_or(ValidationError::RecordMissing)?;
                let before = ledger.entities.incomes.len();
                ledger.entities.incomes.retain(|i| i.id != id);
                if ledger.entities.incomes.len() == before {
                    return Err(ValidationError::RecordMissing);
                }
                Ok(MutationSummary {
                    message: "Income entry deleted.".to_string(),
                })
            }
            CommandIntent::AddPlannedExpense => {
                let amount = Self::require_amount(plan)?;
                let title = plan
                    .entity_name
                    .clone()
                    .or_else(|| plan.notes.clone())
                    .ok_or_else(|| {
                        ValidationError::Other("Need a name for the planned expense.".to_string())
                    })?;
                let id = ledger.allocate_id("pre");
                ledger.entities.planned_expenses.push(PlannedExpenseRecord {
                    id,
                    title: title.clone(),
                    amount,
                    due_date: plan.date,
                });
                if !ledger.entities.presets.contains(&title) {
                    ledger.entities.presets.push(title.clone());
                }
                Ok(MutationSummary {
                    message: format!("Planned {} for {}.", money(amount), title),
                })
            }
            CommandIntent::EditPlannedExpense => {
                let id = plan
                    .target_record_id
                    .as_deref()
                    .ok_or(ValidationError::RecordMissing)?;
                let amount = Self::require_amount(plan)?;
                let record = ledger
                    .entities
                    .planned_expenses
                    .iter_mut()
                    .find(|p| p.id == id)
                    .ok_or(ValidationError::RecordMissing)?;
                record.amount = amount;
                Ok(MutationSummary {
                    message: format!("Updated {} to {}.", record.title, money(amount)),
                })
            }
            CommandIntent::DeletePlannedExpense => {
                let id = plan
                    .target_record_id
                    .as_deref()
                    .ok_or(ValidationError::RecordMissing)?;
                let before = ledger.entities.planned_expenses.len();
                ledger.entities.planned_expenses.retain(|p| p.id != id);
                if ledger.entities.planned_expenses.len() == before {
                    return Err(ValidationError::RecordMissing);
                }
                Ok(MutationSummary {
                    message: "Planned expense deleted.".to_string(),
                })
            }
            CommandIntent::CreateCard => {
                let name = plan.entity_name.clone().ok_or_else(|| {
                    ValidationError::Other("Need a name for the new card.".to_string())
                })?;
                if !ledger.entities.cards.contains(&name) {
                    ledger.entities.cards.push(name.clone());
                }
                Ok(MutationSummary {
                    message: format!("Card {} created.", name),
                })
            }
            CommandIntent::StyleCard => {
                let name = plan
                    .card_name
                    .clone()
                    .or_else(|| plan.entity_name.clone())
                    .ok_or(ValidationError::MissingCard)?;
                let theme = plan.card_theme.as_deref().unwrap_or("Classic");
                let effect = plan.card_effect.as_deref().unwrap_or("Classic");
                Ok(MutationSummary {
                    message: format!("{} styled with {} / {}.", name, theme, effect),
                })
            }
            CommandIntent::CreateCategory => {
                let name = plan
                    .entity_name
                    .clone()
                    .ok_or(ValidationError::MissingCategory)?;
                if !ledger.entities.categories.contains(&name) {
                    ledger.entities.categories.push(name.clone());
                }
                let color = plan.category_color.as_deref().unwrap_or("Teal");
                Ok(MutationSummary {
                    message: format!("Category {} created in {}.", name, color),
                })
            }
            CommandIntent::CreateBudget => {
                let cards = if plan.attach_all_cards {
                    "all cards".to_string()
                } else if plan.selected_card_names.is_empty() {
                    "no cards".to_string()
                } else {
                    plan.selected_card_names.join(", ")
                };
                let presets = if plan.attach_all_presets {
                    "all presets".to_string()
                } else if plan.selected_preset_titles.is_empty() {
                    "no presets".to_string()
                } else {
                    plan.selected_preset_titles.join(", ")
                };
                Ok(MutationSummary {
                    message: format!("Budget created with {} and {}.", cards, presets),
                })
            }
            CommandIntent::SetAlias => {
                let alias = plan.notes.clone().ok_or_else(|| {
                    ValidationError::Other("Need the alias phrase.".to_string())
                })?;
                let target = plan
                    .card_name
                    .clone()
                    .or_else(|| plan.entity_name.clone())
                    .ok_or_else(|| {
                        ValidationError::Other("Need the name the alias points to.".to_string())
                    })?;
                ledger.entities.alias_rules.push(AliasRule {
                    kind: EntityKind::Card,
                    alias: alias.clone(),
                    target: target.clone(),
                });
                Ok(MutationSummary {
                    message: format!("\"{}\" now means {}.", alias, target),
                })
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn day(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    #[test]
    fn add_expense_requires_card() {
        let ledger = Ledger::demo(day(2024, 3, 15));
        let mut mutations = DemoMutations::new(ledger, day(2024, 3, 15));
        let mut plan = CommandPlan::new(CommandIntent::AddExpense, "add a 12 coffee");
        plan.amount = Some(12.0);
        assert_eq!(
            mutations.perform(&plan),
            Err(ValidationError::MissingCard)
        );
    }

    #[test]
    fn add_and_delete_expense_round_trip() {
        let ledger = Ledger::demo(day(2024, 3, 15));
        let mut mutations = DemoMutations::new(ledger.clone(), day(2024, 3, 15));
        let plan = CommandPlan::new(CommandIntent::AddExpense, "add a 12 coffee")
            .with_amount(12.0)
            .with_card_name("Chase Freedom");
        mutations.perform(&plan).unwrap();

        let added_id = ledger
            .borrow()
            .entities
            .variable_expenses
            .last()
            .unwrap()
            .id
            .clone();
        let delete = CommandPlan::new(CommandIntent::DeleteExpense, "delete it")
            .with_target_record(added_id.clone());
        mutations.perform(&delete).unwrap();
        assert!(ledger
            .borrow()
            .entities
            .variable_expenses
            .iter()
            .all(|e| e.id != added_id));
    }

    #[test]
    fn invalid_amount_is_rejected() {
        let ledger = Ledger::demo(day(2024, 3, 15));
        let mut mutations = DemoMutations::new(ledger, day(2024, 3, 15));
        let plan = CommandPlan::new(CommandIntent::AddExpense, "add a -5 thing")
            .with_amount(-5.0)
            .with_card_name("Chase Freedom");
        assert_eq!(mutations.perform(&plan), Err(ValidationError::InvalidAmount));
    }
}

//! End-to-end turn handling against stub collaborators.

use std::cell::RefCell;
use std::rc::Rc;

use chrono::NaiveDate;

use crate::command::{CommandIntent, CommandPlan};
use crate::engine::{
    Answer, AnswerKind, CommandParser, ConversationEngine, MutationService, MutationSummary,
    QueryExecutor, TurnInput, ValidationError,
};
use crate::entities::{ExpenseRecord, WorkspaceEntities};
use crate::metric::{Intent, Metric};
use crate::pending::{CardStyleStep, DeleteKind, PendingState};
use crate::persona::PersonaId;
use crate::plan::{Query, SessionContext};
use crate::store::{ConversationStore, InMemoryStore};
use crate::telemetry::ResolutionOutcome;

#[derive(Clone, Default)]
struct SpyExecutor {
    queries: Rc<RefCell<Vec<Query>>>,
}

impl QueryExecutor for SpyExecutor {
    fn execute(&self, query: &Query, _entities: &WorkspaceEntities, _today: NaiveDate) -> Answer {
        self.queries.borrow_mut().push(query.clone());
        Answer::message(format!("ran {:?}", query.intent), AnswerKind::Value)
    }
}

#[derive(Clone, Default)]
struct SpyMutations {
    performed: Rc<RefCell<Vec<CommandPlan>>>,
    fail_with: Option<ValidationError>,
}

impl MutationService for SpyMutations {
    fn perform(&mut self, plan: &CommandPlan) -> Result<MutationSummary, ValidationError> {
        if let Some(err) = self.fail_with.clone() {
            return Err(err);
        }
        self.performed.borrow_mut().push(plan.clone());
        Ok(MutationSummary {
            message: format!("{} applied", plan.intent.as_str()),
        })
    }
}

#[derive(Clone, Default)]
struct FixedParser {
    plan: Option<CommandPlan>,
}

impl CommandParser for FixedParser {
    fn parse(
        &self,
        _prompt: &str,
        _entities: &WorkspaceEntities,
        _today: NaiveDate,
    ) -> Option<CommandPlan> {
        self.plan.clone()
    }
}

type TestEngine = ConversationEngine<SpyExecutor, SpyMutations, FixedParser, InMemoryStore>;

struct Harness {
    engine: TestEngine,
    queries: Rc<RefCell<Vec<Query>>>,
    performed: Rc<RefCell<Vec<CommandPlan>>>,
}

fn harness(parser: FixedParser, mutations: SpyMutations) -> Harness {
    let executor = SpyExecutor::default();
    let queries = executor.queries.clone();
    let performed = mutations.performed.clone();
    Harness {
        engine: ConversationEngine::new(executor, mutations, parser, InMemoryStore::new()),
        queries,
        performed,
    }
}

fn query_harness() -> Harness {
    harness(FixedParser::default(), SpyMutations::default())
}

fn day(y: i32, m: u32, d: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(y, m, d).unwrap()
}

fn today() -> NaiveDate {
    day(2024, 3, 15)
}

fn expense(id: &str, amount: f64, date: NaiveDate, description: &str) -> ExpenseRecord {
    ExpenseRecord {
        id: id.to_string(),
        amount,
        date,
        description: description.to_string(),
        card_name: Some("Chase Freedom".to_string()),
        category_name: Some("Dining".to_string()),
    }
}

fn workspace() -> WorkspaceEntities {
    WorkspaceEntities {
        cards: vec!["Chase Freedom".to_string(), "Chase Sapphire".to_string()],
        categories: vec!["Groceries".to_string(), "Dining".to_string()],
        income_sources: vec!["Salary".to_string()],
        presets: Vec::new(),
        variable_expenses: Vec::new(),
        incomes: Vec::new(),
        planned_expenses: Vec::new(),
        alias_rules: Vec::new(),
    }
}

fn turn<'a>(prompt: &'a str, entities: &'a WorkspaceEntities) -> TurnInput<'a> {
    TurnInput {
        raw_prompt: prompt,
        entities,
        session: SessionContext::default(),
        pending: None,
        today: today(),
        persona: PersonaId::Analyst,
        session_seed: 7,
        workspace_id: "w1",
    }
}

#[test]
fn top_categories_resolves_on_first_tier_and_runs() {
    let entities = workspace();
    let mut h = query_harness();

    let out = h.engine.handle_turn(turn("top 3 categories this month", &entities));

    let queries = h.queries.borrow();
    assert_eq!(queries.len(), 1);
    assert_eq!(queries[0].intent, Intent::TopCategories);
    assert_eq!(queries[0].result_limit, 3);
    let range = queries[0].date_range.unwrap();
    assert_eq!(range.start(), day(2024, 3, 1));
    assert_eq!(range.end(), day(2024, 3, 31));

    assert!(out.pending.is_none());
    assert!(out.suggestions.is_empty());
    assert_eq!(out.session.last_metric, Some(Metric::TopCategories));
    assert_eq!(out.session.last_result_limit, Some(3));
}

#[test]
fn continuation_reuses_prior_metric_and_target() {
    let entities = workspace();
    let mut h = query_harness();

    let mut input = turn("how about last month", &entities);
    input.session.last_metric = Some(Metric::CardSpend);
    input.session.last_target_name = Some("Chase Freedom".to_string());

    let out = h.engine.handle_turn(input);

    let queries = h.queries.borrow();
    assert_eq!(queries.len(), 1);
    assert_eq!(queries[0].intent, Intent::CardSpend);
    assert_eq!(queries[0].target_name.as_deref(), Some("Chase Freedom"));
    let range = queries[0].date_range.unwrap();
    assert_eq!(range.start(), day(2024, 2, 1));
    assert_eq!(range.end(), day(2024, 2, 29));

    // Medium band with nothing left to clarify runs without chips.
    assert!(out.suggestions.is_empty());
    assert!(out.pending.is_none());
}

#[test]
fn ambiguous_card_blocks_with_candidate_chips() {
    let entities = workspace();
    let mut h = query_harness();

    let out = h.engine.handle_turn(turn("card spend", &entities));

    assert_eq!(out.answer.kind, AnswerKind::Clarification);
    let titles: Vec<&str> = out.suggestions.iter().map(|s| s.title.as_str()).collect();
    assert!(titles.contains(&"Chase Freedom"));
    assert!(titles.contains(&"Chase Sapphire"));
    assert!(titles.contains(&"All cards"));

    // Blocking: nothing executed, no pending state either.
    assert!(h.queries.borrow().is_empty());
    assert!(out.pending.is_none());

    let events = h.engine.store().events_for("w1");
    assert_eq!(
        events.last().unwrap().outcome,
        ResolutionOutcome::Clarification
    );
}

#[test]
fn delete_with_amount_and_date_narrows_to_single_candidate() {
    let yesterday = day(2024, 3, 14);
    let mut entities = workspace();
    entities.variable_expenses = vec![
        expense("e1", 40.0, yesterday, "coffee"),
        expense("e2", 52.0, yesterday, "groceries"),
    ];

    let mut plan = CommandPlan::new(
        CommandIntent::DeleteExpense,
        "delete the $40 expense from yesterday",
    );
    plan.original_amount = Some(40.0);
    plan.date = Some(yesterday);

    let mut h = harness(FixedParser { plan: Some(plan) }, SpyMutations::default());
    let out = h
        .engine
        .handle_turn(turn("delete the $40 expense from yesterday", &entities));

    // The $52 record is disqualified by the amount, so one candidate
    // goes straight to a delete confirmation without disambiguation.
    match &out.pending {
        Some(PendingState::DeleteConfirmation {
            kind: DeleteKind::Expense,
            plan,
            ..
        }) => assert_eq!(plan.target_record_id.as_deref(), Some("e1")),
        other => panic!("expected delete confirmation, got {:?}", other),
    }
    assert!(h.performed.borrow().is_empty());

    let mut confirm = turn("yes", &entities);
    confirm.pending = out.pending;
    let out2 = h.engine.handle_turn(confirm);

    assert!(out2.pending.is_none());
    let performed = h.performed.borrow();
    assert_eq!(performed.len(), 1);
    assert_eq!(performed[0].target_record_id.as_deref(), Some("e1"));
}

#[test]
fn clearing_conversation_drops_pending_and_session_together() {
    let entities = workspace();
    let mut h = query_harness();

    let mut session = SessionContext::default();
    session.last_metric = Some(Metric::Overview);
    let mut pending = Some(PendingState::CardStyle {
        step: CardStyleStep::ThemeSelection,
        card_name: "Chase Freedom".to_string(),
        theme: None,
    });

    TestEngine::clear_conversation(&mut session, &mut pending);
    assert!(pending.is_none());
    assert_eq!(session, SessionContext::default());

    // The next prompt routes as a fresh query, not to the old wizard.
    let mut input = turn("top categories", &entities);
    input.session = session;
    input.pending = pending;
    let out = h.engine.handle_turn(input);

    assert_eq!(h.queries.borrow()[0].intent, Intent::TopCategories);
    assert!(out.pending.is_none());
}

#[test]
fn validation_failure_keeps_pending_state_for_retry() {
    let entities = workspace();
    let mutations = SpyMutations {
        performed: Rc::new(RefCell::new(Vec::new())),
        fail_with: Some(ValidationError::MissingCard),
    };
    let mut h = harness(FixedParser::default(), mutations);

    let pending = PendingState::DeleteConfirmation {
        kind: DeleteKind::Expense,
        plan: CommandPlan::new(CommandIntent::DeleteExpense, "delete the coffee")
            .with_target_record("e1"),
        candidate_label: "coffee $40.00 on 2024-03-14".to_string(),
    };
    let mut input = turn("yes", &entities);
    input.pending = Some(pending.clone());

    let out = h.engine.handle_turn(input);

    assert_eq!(out.answer.title, "Need a card for this.");
    assert_eq!(out.pending, Some(pending));
    assert!(h.performed.borrow().is_empty());
}

#[test]
fn unresolved_prompt_is_flavored_and_recorded() {
    let entities = workspace();
    let mut h = query_harness();

    let out = h.engine.handle_turn(turn("flurble wurble", &entities));

    assert_eq!(out.answer.kind, AnswerKind::Message);
    assert!(out.pending.is_none());
    assert!(h.queries.borrow().is_empty());

    let events = h.engine.store().events_for("w1");
    assert_eq!(events.len(), 1);
    assert_eq!(events[0].outcome, ResolutionOutcome::Unresolved);
    assert_eq!(events[0].normalized_prompt, "flurble wurble");
}

#[test]
fn unrecognized_reply_represents_same_prompt() {
    let entities = workspace();
    let mut h = query_harness();

    let pending = PendingState::IncomeKind {
        plan: CommandPlan::new(CommandIntent::AddIncome, "log 100 income"),
    };
    let mut input = turn("banana", &entities);
    input.pending = Some(pending.clone());

    let out = h.engine.handle_turn(input);

    assert_eq!(out.answer.kind, AnswerKind::Clarification);
    assert_eq!(out.answer.title, pending.prompt());
    assert_eq!(out.pending, Some(pending));
}

#[test]
fn add_expense_without_card_walks_selection_then_replays() {
    let entities = workspace();
    let plan =
        CommandPlan::new(CommandIntent::AddExpense, "add a 12 coffee").with_amount(12.0);
    let mut h = harness(FixedParser { plan: Some(plan) }, SpyMutations::default());

    let out = h.engine.handle_turn(turn("add a 12 coffee", &entities));
    match &out.pending {
        Some(PendingState::CardSelection { options, .. }) => {
            assert_eq!(options.len(), 2);
        }
        other => panic!("expected card selection, got {:?}", other),
    }
    assert!(h.performed.borrow().is_empty());

    let mut reply = turn("2", &entities);
    reply.pending = out.pending;
    let out2 = h.engine.handle_turn(reply);

    assert!(out2.pending.is_none());
    let performed = h.performed.borrow();
    assert_eq!(performed.len(), 1);
    assert_eq!(performed[0].card_name.as_deref(), Some("Chase Sapphire"));
    assert_eq!(performed[0].amount, Some(12.0));
    assert_eq!(performed[0].raw_prompt, "add a 12 coffee");
}

#[test]
fn answers_are_appended_to_conversation_history() {
    let entities = workspace();
    let mut h = query_harness();

    h.engine.handle_turn(turn("top 3 categories this month", &entities));
    h.engine.handle_turn(turn("flurble wurble", &entities));

    let answers = h.engine.store().load_answers("w1").unwrap();
    assert_eq!(answers.len(), 2);
}

//! Per-turn conversation engine
//!
//! One turn runs to completion before the next is accepted: pending state
//! first, then a mutation command parse, then query resolution, then the
//! clarification decision, then persona wording. The only cross-turn
//! state is the `SessionContext` and the single active `PendingState`,
//! both owned by the caller and returned updated in `TurnOutput`, so
//! concurrent conversations in different workspaces cannot
//! cross-contaminate.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{debug, info, warn};

use crate::clarify::{self, Suggestion};
use crate::command::{CommandIntent, CommandPlan};
use crate::entities::WorkspaceEntities;
use crate::normalize::normalize;
use crate::pending::{
    BudgetCreationStep, CardStyleStep, DeleteKind, PendingOutcome, PendingState,
};
use crate::persona::{self, PersonaId, ResponseCategory};
use crate::plan::{QueryPlan, SessionContext};
use crate::planner::{self, ResolutionTier};
use crate::ranking;
use crate::store::ConversationStore;
use crate::telemetry::{ResolutionOutcome, TelemetryEvent};

/// Colors proposed for new categories, picked deterministically by name.
const CATEGORY_PALETTE: [&str; 6] = ["Teal", "Coral", "Indigo", "Amber", "Olive", "Plum"];

/// Candidates shown in a disambiguation prompt.
const MAX_DISAMBIGUATION_CANDIDATES: usize = 3;

/// Shape of every reply the engine produces.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Answer {
    pub title: String,
    pub subtitle: Option<String>,
    pub primary_value: Option<String>,
    pub rows: Vec<AnswerRow>,
    pub kind: AnswerKind,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AnswerRow {
    pub label: String,
    pub value: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AnswerKind {
    Value,
    List,
    Comparison,
    Message,
    Clarification,
}

impl Answer {
    pub fn message(title: impl Into<String>, kind: AnswerKind) -> Self {
        Answer {
            title: title.into(),
            subtitle: None,
            primary_value: None,
            rows: Vec::new(),
            kind,
        }
    }

    pub fn with_subtitle(mut self, subtitle: impl Into<String>) -> Self {
        self.subtitle = Some(subtitle.into());
        self
    }
}

/// Successful mutation result from the data service.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MutationSummary {
    pub message: String,
}

/// Validation failure from the data service. Surfaced as a corrective
/// message; never advances or clears pending state.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ValidationError {
    #[error("Need an expense amount.")]
    MissingAmount,
    #[error("Need a card for this.")]
    MissingCard,
    #[error("Need a category name.")]
    MissingCategory,
    #[error("Need an income source.")]
    MissingSource,
    #[error("That amount doesn't look right.")]
    InvalidAmount,
    #[error("I couldn't find that record anymore.")]
    RecordMissing,
    #[error("{0}")]
    Other(String),
}

/// Query execution collaborator: computes the numeric answer for a fully
/// resolved query.
pub trait QueryExecutor {
    fn execute(
        &self,
        query: &crate::plan::Query,
        entities: &WorkspaceEntities,
        today: NaiveDate,
    ) -> Answer;
}

/// Mutation collaborator: performs the actual ledger change.
pub trait MutationService {
    fn perform(&mut self, plan: &CommandPlan) -> Result<MutationSummary, ValidationError>;
}

/// Upstream command parser: detects mutation phrasing and extracts fields.
/// The engine consumes its output; it never second-guesses it.
pub trait CommandParser {
    fn parse(
        &self,
        prompt: &str,
        entities: &WorkspaceEntities,
        today: NaiveDate,
    ) -> Option<CommandPlan>;
}

/// Everything the engine needs for one turn.
#[derive(Debug, Clone)]
pub struct TurnInput<'a> {
    pub raw_prompt: &'a str,
    pub entities: &'a WorkspaceEntities,
    pub session: SessionContext,
    pub pending: Option<PendingState>,
    pub today: NaiveDate,
    pub persona: PersonaId,
    pub session_seed: u64,
    pub workspace_id: &'a str,
}

/// The reply plus the updated cross-turn state.
#[derive(Debug, Clone)]
pub struct TurnOutput {
    pub answer: Answer,
    pub suggestions: Vec<Suggestion>,
    pub session: SessionContext,
    pub pending: Option<PendingState>,
}

pub struct ConversationEngine<Q, M, P, S> {
    executor: Q,
    mutations: M,
    parser: P,
    store: S,
}

impl<Q, M, P, S> ConversationEngine<Q, M, P, S>
where
    Q: QueryExecutor,
    M: MutationService,
    P: CommandParser,
    S: ConversationStore,
{
    pub fn new(executor: Q, mutations: M, parser: P, store: S) -> Self {
        ConversationEngine {
            executor,
            mutations,
            parser,
            store,
        }
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    /// Clearing the conversation resets the session and whatever pending
    /// state was active, together and unconditionally.
    pub fn clear_conversation(session: &mut SessionContext, pending: &mut Option<PendingState>) {
        session.clear();
        *pending = None;
    }

    /// Process one user turn to completion.
    pub fn handle_turn(&mut self, input: TurnInput<'_>) -> TurnOutput {
        let output = self.route_turn(&input);
        self.append_history(input.workspace_id, &output.answer);
        output
    }

    fn route_turn(&mut self, input: &TurnInput<'_>) -> TurnOutput {
        // 1. An outstanding pending state consumes the turn outright.
        if let Some(state) = input.pending.clone() {
            debug!(priority = state.priority(), "routing to pending state");
            return self.handle_pending(state, input);
        }

        // 2. Mutation command?
        if let Some(plan) = self
            .parser
            .parse(input.raw_prompt, input.entities, input.today)
        {
            info!(intent = plan.intent.as_str(), "command parsed");
            return self.handle_command(plan, input);
        }

        // 3. Query resolution.
        self.handle_query(input)
    }

    // ------------------------------------------------------------------
    // Pending state routing
    // ------------------------------------------------------------------

    fn handle_pending(&mut self, state: PendingState, input: &TurnInput<'_>) -> TurnOutput {
        match state.resolve_reply(input.raw_prompt) {
            PendingOutcome::Reprompt(prompt) => TurnOutput {
                answer: Answer::message(prompt, AnswerKind::Clarification),
                suggestions: Vec::new(),
                session: input.session.clone(),
                pending: Some(state),
            },
            PendingOutcome::Advance { next, message } => {
                let text = if message.is_empty() {
                    next.prompt()
                } else {
                    message
                };
                TurnOutput {
                    answer: Answer::message(text, AnswerKind::Clarification),
                    suggestions: Vec::new(),
                    session: input.session.clone(),
                    pending: Some(next),
                }
            }
            PendingOutcome::Replay(plan) => self.handle_command(plan, input),
            PendingOutcome::Execute(plan) => self.perform(plan, input),
            PendingOutcome::Cancelled => TurnOutput {
                answer: Answer::message(
                    persona::flavored(
                        input.persona,
                        ResponseCategory::Cancelled,
                        input.session_seed,
                        input.raw_prompt,
                    ),
                    AnswerKind::Message,
                ),
                suggestions: Vec::new(),
                session: input.session.clone(),
                pending: None,
            },
        }
    }

    // ------------------------------------------------------------------
    // Mutation command flows
    // ------------------------------------------------------------------

    fn handle_command(&mut self, plan: CommandPlan, input: &TurnInput<'_>) -> TurnOutput {
        // A plan pinned to a record by disambiguation executes directly.
        if plan.target_record_id.is_some() {
            return self.perform(plan, input);
        }

        match plan.intent {
            CommandIntent::AddExpense => self.add_expense_flow(plan, input),
            CommandIntent::AddIncome => {
                if plan.is_planned_income.is_none() {
                    self.enter_pending(PendingState::IncomeKind { plan }, input)
                } else {
                    self.perform(plan, input)
                }
            }
            CommandIntent::AddPlannedExpense => {
                if plan.card_name.is_none() && input.entities.cards.len() > 1 {
                    let options = input.entities.cards.clone();
                    self.enter_pending(PendingState::PresetCardSelection { plan, options }, input)
                } else {
                    self.perform(plan, input)
                }
            }
            CommandIntent::EditExpense | CommandIntent::DeleteExpense => {
                self.expense_target_flow(plan, input)
            }
            CommandIntent::EditIncome | CommandIntent::DeleteIncome => {
                self.income_target_flow(plan, input)
            }
            CommandIntent::EditPlannedExpense => {
                if plan.amount.is_some() && plan.planned_expense_amount_target.is_none() {
                    return self
                        .enter_pending(PendingState::PlannedExpenseAmountTarget { plan }, input);
                }
                self.planned_target_flow(plan, input)
            }
            CommandIntent::DeletePlannedExpense => self.planned_target_flow(plan, input),
            CommandIntent::CreateCard => self.create_card_flow(plan, input),
            CommandIntent::CreateCategory => {
                if plan.category_color.is_none() {
                    let name = plan.entity_name.clone().unwrap_or_default();
                    let idx =
                        (persona::fnv1a64(&name) % CATEGORY_PALETTE.len() as u64) as usize;
                    let proposed_color = CATEGORY_PALETTE[idx].to_string();
                    self.enter_pending(
                        PendingState::CategoryColorConfirmation {
                            plan,
                            proposed_color,
                        },
                        input,
                    )
                } else {
                    self.perform(plan, input)
                }
            }
            CommandIntent::CreateBudget => {
                let untouched = !plan.attach_all_cards
                    && !plan.attach_all_presets
                    && plan.selected_card_names.is_empty()
                    && plan.selected_preset_titles.is_empty();
                if untouched {
                    let state = PendingState::BudgetCreation {
                        step: BudgetCreationStep::CardsChoice,
                        plan,
                        card_options: input.entities.cards.clone(),
                        preset_options: input
                            .entities
                            .planned_expenses
                            .iter()
                            .map(|p| p.title.clone())
                            .collect(),
                    };
                    self.enter_pending(state, input)
                } else {
                    self.perform(plan, input)
                }
            }
            CommandIntent::StyleCard | CommandIntent::SetAlias => self.perform(plan, input),
        }
    }

    fn add_expense_flow(&mut self, plan: CommandPlan, input: &TurnInput<'_>) -> TurnOutput {
        if plan.card_name.is_some() {
            return self.perform(plan, input);
        }
        match input.entities.cards.len() {
            0 => self.perform(plan, input),
            1 => {
                let card = input.entities.cards[0].clone();
                self.perform(plan.with_card_name(card), input)
            }
            _ => {
                let options = input.entities.cards.clone();
                self.enter_pending(PendingState::CardSelection { plan, options }, input)
            }
        }
    }

    fn expense_target_flow(&mut self, plan: CommandPlan, input: &TurnInput<'_>) -> TurnOutput {
        let ranked = ranking::rank_expenses(&plan, &input.entities.variable_expenses);
        match ranked.len() {
            0 => self.no_match(input),
            1 => {
                let chosen = &ranked[0];
                let picked = plan.with_target_record(chosen.id.clone());
                if plan.intent == CommandIntent::DeleteExpense {
                    let label = format!(
                        "{} ${:.2} on {}",
                        chosen.description, chosen.amount, chosen.date
                    );
                    self.enter_pending(
                        PendingState::DeleteConfirmation {
                            kind: DeleteKind::Expense,
                            plan: picked,
                            candidate_label: label,
                        },
                        input,
                    )
                } else {
                    self.perform(picked, input)
                }
            }
            _ => {
                let candidates = ranked
                    .into_iter()
                    .take(MAX_DISAMBIGUATION_CANDIDATES)
                    .collect();
                self.enter_pending(PendingState::ExpenseDisambiguation { plan, candidates }, input)
            }
        }
    }

    fn income_target_flow(&mut self, plan: CommandPlan, input: &TurnInput<'_>) -> TurnOutput {
        let ranked = ranking::rank_incomes(&plan, &input.entities.incomes);
        match ranked.len() {
            0 => self.no_match(input),
            1 => {
                let chosen = &ranked[0];
                let picked = plan.with_target_record(chosen.id.clone());
                if plan.intent == CommandIntent::DeleteIncome {
                    let label = format!("{} ${:.2} on {}", chosen.source, chosen.amount, chosen.date);
                    self.enter_pending(
                        PendingState::DeleteConfirmation {
                            kind: DeleteKind::Income,
                            plan: picked,
                            candidate_label: label,
                        },
                        input,
                    )
                } else {
                    self.perform(picked, input)
                }
            }
            _ => {
                let candidates = ranked
                    .into_iter()
                    .take(MAX_DISAMBIGUATION_CANDIDATES)
                    .collect();
                self.enter_pending(PendingState::IncomeDisambiguation { plan, candidates }, input)
            }
        }
    }

    fn planned_target_flow(&mut self, plan: CommandPlan, input: &TurnInput<'_>) -> TurnOutput {
        let ranked = ranking::rank_planned_expenses(&plan, &input.entities.planned_expenses);
        match ranked.len() {
            0 => self.no_match(input),
            1 => self.perform(plan.with_target_record(ranked[0].id.clone()), input),
            _ => {
                let candidates = ranked
                    .into_iter()
                    .take(MAX_DISAMBIGUATION_CANDIDATES)
                    .collect();
                self.enter_pending(
                    PendingState::PlannedExpenseDisambiguation { plan, candidates },
                    input,
                )
            }
        }
    }

    fn create_card_flow(&mut self, plan: CommandPlan, input: &TurnInput<'_>) -> TurnOutput {
        let wants_styling = plan.card_theme.is_none() && plan.card_effect.is_none();
        let card_name = plan.entity_name.clone().or_else(|| plan.card_name.clone());
        let mut output = self.perform(plan, input);
        if output.pending.is_none() && wants_styling {
            // Mutation succeeded; offer the styling wizard.
            if let Some(card_name) = card_name {
                if output.answer.kind == AnswerKind::Message {
                    let offer = PendingState::CardStyle {
                        step: CardStyleStep::Offer,
                        card_name,
                        theme: None,
                    };
                    output.answer.subtitle = Some(offer.prompt());
                    output.pending = Some(offer);
                }
            }
        }
        output
    }

    fn enter_pending(&mut self, state: PendingState, input: &TurnInput<'_>) -> TurnOutput {
        TurnOutput {
            answer: Answer::message(state.prompt(), AnswerKind::Clarification),
            suggestions: Vec::new(),
            session: input.session.clone(),
            pending: Some(state),
        }
    }

    fn no_match(&mut self, input: &TurnInput<'_>) -> TurnOutput {
        TurnOutput {
            answer: Answer::message(
                persona::flavored(
                    input.persona,
                    ResponseCategory::MutationNoMatch,
                    input.session_seed,
                    input.raw_prompt,
                ),
                AnswerKind::Message,
            ),
            suggestions: Vec::new(),
            session: input.session.clone(),
            pending: None,
        }
    }

    /// Hand a fully resolved plan to the mutation service. Validation
    /// failures keep the caller's pending state so the turn can be
    /// retried with corrected input.
    fn perform(&mut self, plan: CommandPlan, input: &TurnInput<'_>) -> TurnOutput {
        match self.mutations.perform(&plan) {
            Ok(summary) => TurnOutput {
                answer: Answer::message(
                    persona::flavored(
                        input.persona,
                        ResponseCategory::MutationApplied,
                        input.session_seed,
                        plan.intent.as_str(),
                    ),
                    AnswerKind::Message,
                )
                .with_subtitle(summary.message),
                suggestions: Vec::new(),
                session: input.session.clone(),
                pending: None,
            },
            Err(validation) => {
                warn!(error = %validation, "mutation validation failed");
                TurnOutput {
                    answer: Answer::message(validation.to_string(), AnswerKind::Message),
                    suggestions: Vec::new(),
                    session: input.session.clone(),
                    pending: input.pending.clone(),
                }
            }
        }
    }

    // ------------------------------------------------------------------
    // Query flow
    // ------------------------------------------------------------------

    fn handle_query(&mut self, input: &TurnInput<'_>) -> TurnOutput {
        let resolved = planner::resolve_plan(
            input.raw_prompt,
            input.entities,
            &input.session,
            input.today,
        );

        let Some(resolved) = resolved else {
            self.record_event(
                input.workspace_id,
                TelemetryEvent::unresolved(normalize(input.raw_prompt)),
            );
            return TurnOutput {
                answer: Answer::message(
                    persona::flavored(
                        input.persona,
                        ResponseCategory::UnresolvedPrompt,
                        input.session_seed,
                        input.raw_prompt,
                    ),
                    AnswerKind::Message,
                ),
                suggestions: Vec::new(),
                session: input.session.clone(),
                pending: None,
            };
        };

        let plan = resolved.plan;
        let tier = resolved.tier;

        match clarify::resolve(&plan, input.raw_prompt, input.entities, input.today) {
            None => self.run_query(plan, tier, Vec::new(), None, input),
            Some(decision) if decision.should_run_best_effort => {
                let subtitle = decision.subtitle.clone();
                self.run_query(plan, tier, decision.suggestions, Some(subtitle), input)
            }
            Some(decision) => {
                self.record_event(
                    input.workspace_id,
                    TelemetryEvent {
                        normalized_prompt: normalize(input.raw_prompt),
                        outcome: ResolutionOutcome::Clarification,
                        tier: Some(tier),
                        intent: Some(plan.metric.intent()),
                        confidence: Some(plan.confidence),
                        target: plan.target_name.clone(),
                    },
                );
                let lead = persona::flavored(
                    input.persona,
                    ResponseCategory::ClarificationLead,
                    input.session_seed,
                    input.raw_prompt,
                );
                TurnOutput {
                    answer: Answer::message(lead, AnswerKind::Clarification)
                        .with_subtitle(decision.subtitle),
                    suggestions: decision.suggestions,
                    session: input.session.clone(),
                    pending: None,
                }
            }
        }
    }

    /// Execute a resolved plan and update session context.
    pub fn run_plan(&mut self, plan: QueryPlan, input: &TurnInput<'_>) -> TurnOutput {
        // One-tap suggestion chips come back through here with confidence
        // already forced to High.
        self.run_query(plan, ResolutionTier::Pattern, Vec::new(), None, input)
    }

    fn run_query(
        &mut self,
        plan: QueryPlan,
        tier: ResolutionTier,
        suggestions: Vec<Suggestion>,
        hedge_subtitle: Option<String>,
        input: &TurnInput<'_>,
    ) -> TurnOutput {
        let query = plan.to_query();
        let mut answer = self.executor.execute(&query, input.entities, input.today);
        if let Some(hedge) = hedge_subtitle {
            // Medium confidence: run, but say so.
            answer.subtitle = Some(match answer.subtitle.take() {
                Some(existing) => format!("{} {}", hedge, existing),
                None => hedge,
            });
        }

        let mut session = input.session.clone();
        session.record(&plan);

        self.record_event(
            input.workspace_id,
            TelemetryEvent {
                normalized_prompt: normalize(input.raw_prompt),
                outcome: ResolutionOutcome::Resolved,
                tier: Some(tier),
                intent: Some(plan.metric.intent()),
                confidence: Some(plan.confidence),
                target: plan.target_name.clone(),
            },
        );
        info!(
            intent = plan.metric.as_str(),
            confidence = plan.confidence.as_str(),
            tier = tier.as_str(),
            "query executed"
        );

        TurnOutput {
            answer,
            suggestions,
            session,
            pending: None,
        }
    }

    // ------------------------------------------------------------------
    // Best-effort persistence
    // ------------------------------------------------------------------

    fn record_event(&mut self, workspace_id: &str, event: TelemetryEvent) {
        if let Err(err) = self.store.append_event(workspace_id, event) {
            // Telemetry must never block the reply.
            warn!(error = %err, "telemetry append failed");
        }
    }

    fn append_history(&mut self, workspace_id: &str, answer: &Answer) {
        let result = self
            .store
            .load_answers(workspace_id)
            .and_then(|mut answers| {
                answers.push(answer.clone());
                self.store.save_answers(workspace_id, &answers)
            });
        if let Err(err) = result {
            warn!(error = %err, "conversation history save failed");
        }
    }
}

//! Penny Common - Core resolution engine for the Penny budgeting assistant
//!
//! Turns free-text budgeting questions and commands into structured queries
//! and mutations, manages multi-turn disambiguation, and picks deterministic
//! persona copy. Execution of queries and mutations lives behind the
//! collaborator traits in `engine`; this crate owns only the language side.

pub mod alias;
pub mod clarify;
pub mod command;
pub mod dates;
pub mod engine;
pub mod entities;
pub mod fuzzy;
pub mod metric;
pub mod normalize;
pub mod pending;
pub mod persona;
pub mod plan;
pub mod planner;
pub mod ranking;
pub mod store;
pub mod telemetry;

#[cfg(test)]
mod engine_tests;

pub use clarify::{ClarificationDecision, ClarifyReason, Suggestion};
pub use command::{CommandIntent, CommandPlan};
pub use dates::DateRange;
pub use engine::{
    Answer, AnswerKind, AnswerRow, CommandParser, ConversationEngine, MutationService,
    MutationSummary, QueryExecutor, TurnInput, TurnOutput, ValidationError,
};
pub use entities::{
    AliasRule, EntityKind, ExpenseRecord, IncomeRecord, PlannedExpenseRecord, WorkspaceEntities,
};
pub use metric::{ConfidenceBand, Intent, Metric};
pub use pending::PendingState;
pub use persona::PersonaId;
pub use plan::{Query, QueryPlan, SessionContext};
pub use store::{ConversationStore, InMemoryStore, JsonFileStore};

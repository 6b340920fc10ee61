//! Interactive console loop wiring the engine to the demo ledger.

use std::io::{self, BufRead, Write};

use anyhow::Result;
use chrono::{Local, NaiveDate};
use console::style;
use tracing::debug;

use penny_common::{
    Answer, AnswerKind, ConversationEngine, InMemoryStore, PendingState, PersonaId,
    SessionContext, Suggestion, TurnInput, TurnOutput,
};

use crate::ledger::{DemoExecutor, DemoMutations, Ledger, SharedLedger};
use crate::parser::KeywordCommandParser;

type Engine = ConversationEngine<DemoExecutor, DemoMutations, KeywordCommandParser, InMemoryStore>;

pub struct Repl {
    engine: Engine,
    ledger: SharedLedger,
    workspace: String,
    persona: PersonaId,
    seed: u64,
    session: SessionContext,
    pending: Option<PendingState>,
    last_suggestions: Vec<Suggestion>,
}

impl Repl {
    pub fn new(workspace: String, persona: PersonaId, seed: u64) -> Self {
        let today = today();
        let ledger = Ledger::demo(today);
        let engine = ConversationEngine::new(
            DemoExecutor::new(ledger.clone()),
            DemoMutations::new(ledger.clone(), today),
            KeywordCommandParser,
            InMemoryStore::new(),
        );
        Repl {
            engine,
            ledger,
            workspace,
            persona,
            seed,
            session: SessionContext::default(),
            pending: None,
            last_suggestions: Vec::new(),
        }
    }

    /// Run one prompt through the engine and print the reply.
    pub fn ask(&mut self, prompt: &str) {
        debug!(workspace = %self.workspace, prompt, "handling turn");
        let entities = self.ledger.borrow().entities.clone();
        let input = TurnInput {
            raw_prompt: prompt,
            entities: &entities,
            session: self.session.clone(),
            pending: self.pending.take(),
            today: today(),
            persona: self.persona,
            session_seed: self.seed,
            workspace_id: &self.workspace,
        };

        // A bare number with chips on screen and no wizard active picks
        // the chip, not a new prompt.
        let chip = if input.pending.is_none() {
            prompt
                .parse::<usize>()
                .ok()
                .filter(|n| *n >= 1 && *n <= self.last_suggestions.len())
                .map(|n| self.last_suggestions[n - 1].query.clone())
        } else {
            None
        };

        let output = match chip {
            Some(plan) => self.engine.run_plan(plan, &input),
            None => self.engine.handle_turn(input),
        };
        self.absorb(output);
    }

    fn absorb(&mut self, output: TurnOutput) {
        self.session = output.session;
        self.pending = output.pending;
        render(&output.answer, &output.suggestions);
        self.last_suggestions = output.suggestions;
    }

    pub fn run(&mut self) -> Result<()> {
        println!(
            "{}",
            style("Penny - ask about your budget, or type a command.").bold()
        );
        println!(
            "{}",
            style("\"clear\" resets the conversation, \"quit\" exits.").dim()
        );

        let stdin = io::stdin();
        loop {
            print!("{} ", style(">").cyan().bold());
            io::stdout().flush()?;

            let mut line = String::new();
            if stdin.lock().read_line(&mut line)? == 0 {
                break;
            }
            let line = line.trim();
            if line.is_empty() {
                continue;
            }
            match line {
                "quit" | "exit" => break,
                "clear" => {
                    Engine::clear_conversation(&mut self.session, &mut self.pending);
                    println!("{}", style("Conversation cleared.").dim());
                }
                _ => self.ask(line),
            }
        }
        Ok(())
    }
}

fn today() -> NaiveDate {
    Local::now().date_naive()
}

fn render(answer: &Answer, suggestions: &[Suggestion]) {
    match answer.kind {
        AnswerKind::Clarification => println!("{}", style(&answer.title).yellow()),
        AnswerKind::Message => println!("{}", style(&answer.title).bold()),
        _ => println!("{}", style(&answer.title).green().bold()),
    }
    if let Some(subtitle) = &answer.subtitle {
        println!("{}", style(subtitle).dim());
    }
    if let Some(value) = &answer.primary_value {
        println!("  {}", style(value).bold());
    }
    for row in &answer.rows {
        println!("  {:<28} {}", row.label, style(&row.value).bold());
    }
    if !suggestions.is_empty() {
        let titles: Vec<String> = suggestions
            .iter()
            .enumerate()
            .map(|(i, s)| format!("[{}] {}", i + 1, s.title))
            .collect();
        println!("{} {}", style("Try:").dim(), titles.join("  "));
    }
}

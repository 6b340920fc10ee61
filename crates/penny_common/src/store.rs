//! Conversation and telemetry persistence contract
//!
//! The engine never owns durable storage; the host supplies something
//! implementing `ConversationStore`. Both collections are append-only with
//! a fixed retention cap: once the cap is exceeded the oldest entries are
//! dropped.

use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};

use crate::engine::Answer;
use crate::telemetry::TelemetryEvent;

/// Answers kept per workspace.
pub const ANSWER_RETENTION_CAP: usize = 50;
/// Telemetry events kept per workspace.
pub const EVENT_RETENTION_CAP: usize = 300;

/// Key-value persistence collaborator, scoped by workspace id.
pub trait ConversationStore {
    fn load_answers(&self, workspace_id: &str) -> Result<Vec<Answer>>;
    fn save_answers(&mut self, workspace_id: &str, answers: &[Answer]) -> Result<()>;
    fn append_event(&mut self, workspace_id: &str, event: TelemetryEvent) -> Result<()>;
}

/// In-memory reference store. Hosts wanting durability wrap their own
/// storage behind the same trait.
#[derive(Debug, Default)]
pub struct InMemoryStore {
    answers: HashMap<String, Vec<Answer>>,
    events: HashMap<String, Vec<TelemetryEvent>>,
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn events_for(&self, workspace_id: &str) -> &[TelemetryEvent] {
        self.events.get(workspace_id).map_or(&[], |v| v.as_slice())
    }
}

fn trim_front<T>(items: &mut Vec<T>, cap: usize) {
    if items.len() > cap {
        let excess = items.len() - cap;
        items.drain(0..excess);
    }
}

impl ConversationStore for InMemoryStore {
    fn load_answers(&self, workspace_id: &str) -> Result<Vec<Answer>> {
        Ok(self.answers.get(workspace_id).cloned().unwrap_or_default())
    }

    fn save_answers(&mut self, workspace_id: &str, answers: &[Answer]) -> Result<()> {
        let mut kept = answers.to_vec();
        trim_front(&mut kept, ANSWER_RETENTION_CAP);
        self.answers.insert(workspace_id.to_string(), kept);
        Ok(())
    }

    fn append_event(&mut self, workspace_id: &str, event: TelemetryEvent) -> Result<()> {
        let events = self.events.entry(workspace_id.to_string()).or_default();
        events.push(event);
        trim_front(events, EVENT_RETENTION_CAP);
        Ok(())
    }
}

/// Durable store: one JSON document per workspace and collection,
/// written whole on every save. Retention caps are applied on write.
#[derive(Debug)]
pub struct JsonFileStore {
    dir: PathBuf,
}

impl JsonFileStore {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        JsonFileStore { dir: dir.into() }
    }

    fn path_for(&self, workspace_id: &str, collection: &str) -> PathBuf {
        let safe: String = workspace_id
            .chars()
            .map(|c| if c.is_alphanumeric() || c == '-' || c == '_' { c } else { '-' })
            .collect();
        self.dir.join(format!("{}.{}.json", safe, collection))
    }

    fn read_json<T: serde::de::DeserializeOwned>(path: &Path) -> Result<Vec<T>> {
        if !path.exists() {
            return Ok(Vec::new());
        }
        let raw =
            fs::read_to_string(path).with_context(|| format!("reading {}", path.display()))?;
        serde_json::from_str(&raw).with_context(|| format!("parsing {}", path.display()))
    }

    fn write_json<T: serde::Serialize>(&self, path: &Path, items: &[T]) -> Result<()> {
        fs::create_dir_all(&self.dir)
            .with_context(|| format!("creating {}", self.dir.display()))?;
        let raw = serde_json::to_string_pretty(items)?;
        fs::write(path, raw).with_context(|| format!("writing {}", path.display()))
    }
}

impl ConversationStore for JsonFileStore {
    fn load_answers(&self, workspace_id: &str) -> Result<Vec<Answer>> {
        Self::read_json(&self.path_for(workspace_id, "answers"))
    }

    fn save_answers(&mut self, workspace_id: &str, answers: &[Answer]) -> Result<()> {
        let mut kept = answers.to_vec();
        trim_front(&mut kept, ANSWER_RETENTION_CAP);
        self.write_json(&self.path_for(workspace_id, "answers"), &kept)
    }

    fn append_event(&mut self, workspace_id: &str, event: TelemetryEvent) -> Result<()> {
        let path = self.path_for(workspace_id, "events");
        let mut events: Vec<TelemetryEvent> = Self::read_json(&path)?;
        events.push(event);
        trim_front(&mut events, EVENT_RETENTION_CAP);
        self.write_json(&path, &events)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::{Answer, AnswerKind};

    fn answer(title: &str) -> Answer {
        Answer::message(title, AnswerKind::Message)
    }

    #[test]
    fn answers_trimmed_to_cap_oldest_first() {
        let mut store = InMemoryStore::new();
        let many: Vec<Answer> = (0..60).map(|i| answer(&format!("a{}", i))).collect();
        store.save_answers("w", &many).unwrap();
        let loaded = store.load_answers("w").unwrap();
        assert_eq!(loaded.len(), ANSWER_RETENTION_CAP);
        assert_eq!(loaded[0].title, "a10");
        assert_eq!(loaded.last().unwrap().title, "a59");
    }

    #[test]
    fn events_trimmed_to_cap() {
        let mut store = InMemoryStore::new();
        for i in 0..310 {
            store
                .append_event("w", TelemetryEvent::unresolved(format!("p{}", i)))
                .unwrap();
        }
        let events = store.events_for("w");
        assert_eq!(events.len(), EVENT_RETENTION_CAP);
        assert_eq!(events[0].normalized_prompt, "p10");
    }

    #[test]
    fn json_file_store_round_trips() {
        let dir = tempfile::tempdir().unwrap();
        let mut store = JsonFileStore::new(dir.path());

        assert!(store.load_answers("w").unwrap().is_empty());
        store
            .save_answers("w", &[answer("hello"), answer("again")])
            .unwrap();
        store
            .append_event("w", TelemetryEvent::unresolved("p"))
            .unwrap();

        let reopened = JsonFileStore::new(dir.path());
        let loaded = reopened.load_answers("w").unwrap();
        assert_eq!(loaded.len(), 2);
        assert_eq!(loaded[0].title, "hello");
    }

    #[test]
    fn workspaces_are_isolated() {
        let mut store = InMemoryStore::new();
        store.append_event("a", TelemetryEvent::unresolved("x")).unwrap();
        assert!(store.events_for("b").is_empty());
        assert_eq!(store.events_for("a").len(), 1);
    }
}

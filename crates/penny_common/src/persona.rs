//! Persona copy and deterministic variant selection
//!
//! Replies vary by persona and across sessions, but never across runs:
//! variant choice is a 64-bit FNV-1a hash of `"{seed}|{key}"` reduced
//! modulo the option count. The hash is pinned (not the platform default
//! hasher) so golden-output tests hold on every implementation.
//!
//! Copy tables are compiled in, with a required fallback per persona, so
//! an unknown response category can never produce empty copy.

use serde::{Deserialize, Serialize};

const FNV_OFFSET: u64 = 0xcbf29ce484222325;
const FNV_PRIME: u64 = 0x100000001b3;

/// FNV-1a over the raw bytes of `input`.
pub fn fnv1a64(input: &str) -> u64 {
    let mut hash = FNV_OFFSET;
    for byte in input.as_bytes() {
        hash ^= u64::from(*byte);
        hash = hash.wrapping_mul(FNV_PRIME);
    }
    hash
}

/// Pick one option deterministically for a (session seed, semantic key)
/// pair. Returns None only for an empty slice.
pub fn pick<'a, T>(options: &'a [T], session_seed: u64, key: &str) -> Option<&'a T> {
    if options.is_empty() {
        return None;
    }
    let hash = fnv1a64(&format!("{}|{}", session_seed, key));
    let idx = (hash % options.len() as u64) as usize;
    options.get(idx.min(options.len() - 1))
}

/// Closed set of reply personas.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PersonaId {
    Coach,
    Analyst,
    Deadpan,
}

impl PersonaId {
    pub fn as_str(&self) -> &'static str {
        match self {
            PersonaId::Coach => "coach",
            PersonaId::Analyst => "analyst",
            PersonaId::Deadpan => "deadpan",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "coach" => Some(PersonaId::Coach),
            "analyst" => Some(PersonaId::Analyst),
            "deadpan" => Some(PersonaId::Deadpan),
            _ => None,
        }
    }
}

/// Reply situations with persona-flavored copy.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ResponseCategory {
    UnresolvedPrompt,
    ClarificationLead,
    MutationApplied,
    MutationNoMatch,
    Cancelled,
}

/// Copy variants for a persona and situation. Always non-empty: every
/// persona has a baked-in fallback arm.
pub fn copy_for(persona: PersonaId, category: ResponseCategory) -> &'static [&'static str] {
    match (persona, category) {
        (PersonaId::Coach, ResponseCategory::UnresolvedPrompt) => &[
            "I didn't catch that one - want to try it another way?",
            "Hmm, that one got past me. Give it another shot?",
            "Not sure what you meant there, but we'll get it - rephrase for me?",
        ],
        (PersonaId::Coach, ResponseCategory::ClarificationLead) => &[
            "Quick check before we run with it:",
            "One thing first:",
        ],
        (PersonaId::Coach, ResponseCategory::MutationApplied) => &[
            "Done! Nice bookkeeping.",
            "Logged it - keep it up.",
            "All set. Your ledger thanks you.",
        ],
        (PersonaId::Coach, ResponseCategory::MutationNoMatch) => &[
            "I couldn't find anything matching that.",
            "No luck - nothing in the ledger matches.",
        ],
        (PersonaId::Coach, ResponseCategory::Cancelled) => &[
            "No problem, scrapped it.",
            "Okay, leaving things as they are.",
        ],
        (PersonaId::Analyst, ResponseCategory::UnresolvedPrompt) => &[
            "I could not map that to a known question.",
            "That prompt did not resolve to a metric. Please rephrase.",
        ],
        (PersonaId::Analyst, ResponseCategory::ClarificationLead) => &[
            "Clarification required:",
            "Before executing:",
        ],
        (PersonaId::Analyst, ResponseCategory::MutationApplied) => &[
            "Recorded.",
            "Mutation applied.",
        ],
        (PersonaId::Analyst, ResponseCategory::MutationNoMatch) => &[
            "Zero matching records.",
            "No record satisfies those constraints.",
        ],
        (PersonaId::Analyst, ResponseCategory::Cancelled) => &[
            "Cancelled. No changes made.",
        ],
        (PersonaId::Deadpan, ResponseCategory::UnresolvedPrompt) => &[
            "No idea what that means.",
            "That's not a thing I know.",
        ],
        (PersonaId::Deadpan, ResponseCategory::ClarificationLead) => &[
            "Hold on.",
            "Wait.",
        ],
        (PersonaId::Deadpan, ResponseCategory::MutationApplied) => &[
            "Fine. It's in.",
            "Done.",
        ],
        (PersonaId::Deadpan, ResponseCategory::MutationNoMatch) => &[
            "Nothing matches. Shocking.",
            "Found nothing.",
        ],
        (PersonaId::Deadpan, ResponseCategory::Cancelled) => &[
            "Dropped it.",
        ],
    }
}

/// Deterministic flavored line for a persona, situation and content key.
pub fn flavored(
    persona: PersonaId,
    category: ResponseCategory,
    session_seed: u64,
    content_key: &str,
) -> &'static str {
    let options = copy_for(persona, category);
    let key = format!("{}|{:?}|{}", persona.as_str(), category, content_key);
    // Tables above are non-empty by construction.
    pick(options, session_seed, &key).copied().unwrap_or("Okay.")
}

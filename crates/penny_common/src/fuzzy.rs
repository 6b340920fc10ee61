//! Fuzzy entity matching
//!
//! Resolves a free-text fragment to the closest known entity name. Two
//! passes: an exact-substring pass that always wins, then token-overlap
//! scoring. Everything iterates candidate lists in insertion order so the
//! same inputs always produce the same output - no hash-map iteration
//! anywhere on this path.

use std::collections::HashSet;

use crate::normalize::normalize;

/// Best single match for `prompt` among `candidates`, or None.
///
/// Substring containment beats token scoring: if a candidate's normalized
/// name appears inside the normalized prompt, the first such candidate wins
/// outright.
pub fn best_match(prompt: &str, candidates: &[String]) -> Option<String> {
    let norm_prompt = normalize(prompt);
    if norm_prompt.is_empty() {
        return None;
    }

    // Substring pass.
    for cand in candidates {
        let norm_cand = normalize(cand);
        if !norm_cand.is_empty() && norm_prompt.contains(&norm_cand) {
            return Some(cand.clone());
        }
    }

    // Token-overlap pass. Strictly-higher wins; ties keep the first seen.
    let prompt_tokens: HashSet<&str> = norm_prompt.split_whitespace().collect();
    let mut best: Option<(&String, usize)> = None;
    for cand in candidates {
        let norm_cand = normalize(cand);
        if norm_cand.is_empty() {
            continue;
        }
        let cand_tokens: HashSet<&str> = norm_cand.split_whitespace().collect();
        let score = cand_tokens.intersection(&prompt_tokens).count();
        if score == 0 {
            continue;
        }
        match best {
            Some((_, best_score)) if score <= best_score => {}
            _ => best = Some((cand, score)),
        }
    }
    best.map(|(cand, _)| cand.clone())
}

/// Top `limit` candidates by the same token-overlap score, best first.
///
/// A substring hit counts as a very strong score so it sorts ahead of any
/// token overlap. Fewer than two results means "no ambiguity", not
/// "no match". Stable: equal scores keep insertion order.
pub fn ranked_matches(prompt: &str, candidates: &[String], limit: usize) -> Vec<String> {
    let norm_prompt = normalize(prompt);
    if norm_prompt.is_empty() || limit == 0 {
        return Vec::new();
    }
    let prompt_tokens: HashSet<&str> = norm_prompt.split_whitespace().collect();

    let mut scored: Vec<(usize, usize, &String)> = Vec::new();
    for (idx, cand) in candidates.iter().enumerate() {
        let norm_cand = normalize(cand);
        if norm_cand.is_empty() {
            continue;
        }
        let score = if norm_prompt.contains(&norm_cand) {
            // Dominates any possible token overlap.
            usize::MAX
        } else {
            let cand_tokens: HashSet<&str> = norm_cand.split_whitespace().collect();
            cand_tokens.intersection(&prompt_tokens).count()
        };
        if score > 0 {
            scored.push((score, idx, cand));
        }
    }

    // Descending score, insertion order within equal scores.
    scored.sort_by(|a, b| b.0.cmp(&a.0).then(a.1.cmp(&b.1)));
    scored
        .into_iter()
        .take(limit)
        .map(|(_, _, cand)| cand.clone())
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn cands(names: &[&str]) -> Vec<String> {
        names.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn substring_beats_token_overlap() {
        let candidates = cands(&["Chase", "My Card Bill Tracker"]);
        assert_eq!(
            best_match("my chase card bill", &candidates),
            Some("Chase".to_string())
        );
    }

    #[test]
    fn token_overlap_picks_highest() {
        let candidates = cands(&["Groceries", "Dining Out", "Dining Out West"]);
        assert_eq!(
            best_match("what did dining out west cost", &candidates),
            // "Dining Out" is a substring of the prompt, so it wins first.
            Some("Dining Out".to_string())
        );
        assert_eq!(
            best_match("west out dining spend", &candidates),
            Some("Dining Out West".to_string())
        );
    }

    #[test]
    fn ties_keep_first_seen() {
        let candidates = cands(&["Alpha Fund", "Beta Fund"]);
        assert_eq!(
            best_match("fund balance", &candidates),
            Some("Alpha Fund".to_string())
        );
    }

    #[test]
    fn zero_score_is_no_match() {
        let candidates = cands(&["Groceries", "Utilities"]);
        assert_eq!(best_match("show me my income", &candidates), None);
    }

    #[test]
    fn empty_candidates_are_dropped() {
        let candidates = cands(&["  ?! ", "Chase"]);
        assert_eq!(
            best_match("chase balance", &candidates),
            Some("Chase".to_string())
        );
    }

    #[test]
    fn ranked_is_deterministic() {
        let candidates = cands(&["Chase Freedom", "Chase Sapphire", "Amex Gold"]);
        let a = ranked_matches("card spend chase", &candidates, 3);
        let b = ranked_matches("card spend chase", &candidates, 3);
        assert_eq!(a, b);
        assert_eq!(a, vec!["Chase Freedom".to_string(), "Chase Sapphire".to_string()]);
    }

    #[test]
    fn ranked_respects_limit() {
        let candidates = cands(&["Card A", "Card B", "Card C"]);
        let out = ranked_matches("card", &candidates, 2);
        assert_eq!(out.len(), 2);
    }
}

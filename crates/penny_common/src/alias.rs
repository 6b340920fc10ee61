//! Alias resolution
//!
//! User-defined aliases ("my daily driver" -> "Chase Freedom") are checked
//! before fuzzy matching. Exact whole-word hits are tried longest-alias
//! first so "chase sapphire reserve" outranks a plain "chase" alias; only
//! if nothing matches exactly do we fall back to fuzzy matching over the
//! alias keys themselves.

use regex::Regex;
use tracing::debug;

use crate::entities::{AliasRule, EntityKind};
use crate::fuzzy;
use crate::normalize::normalize;

/// Resolve `prompt` to a canonical entity name via the alias table for
/// `kind`. Returns None when no rule for the kind matches.
pub fn resolve_alias(prompt: &str, kind: EntityKind, rules: &[AliasRule]) -> Option<String> {
    let mut scoped: Vec<&AliasRule> = rules
        .iter()
        .filter(|r| {
            r.kind == kind && !r.alias.trim().is_empty() && !r.target.trim().is_empty()
        })
        .collect();
    if scoped.is_empty() {
        return None;
    }

    let norm_prompt = normalize(prompt);

    // Exact word-boundary pass, longest alias first.
    scoped.sort_by(|a, b| b.alias.len().cmp(&a.alias.len()));
    for rule in &scoped {
        let norm_alias = normalize(&rule.alias);
        if norm_alias.is_empty() {
            continue;
        }
        let pattern = format!(r"\b{}\b", regex::escape(&norm_alias));
        // Pattern is built from escaped text; compilation cannot fail.
        if let Ok(re) = Regex::new(&pattern) {
            if re.is_match(&norm_prompt) {
                debug!(alias = %rule.alias, target = %rule.target, "alias exact match");
                return Some(rule.target.clone());
            }
        }
    }

    // Fuzzy pass over alias keys, mapping the winning key back to its target.
    let keys: Vec<String> = scoped.iter().map(|r| r.alias.clone()).collect();
    let hit = fuzzy::best_match(prompt, &keys)?;
    scoped
        .iter()
        .find(|r| r.alias == hit)
        .map(|r| r.target.clone())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn rule(kind: EntityKind, alias: &str, target: &str) -> AliasRule {
        AliasRule {
            kind,
            alias: alias.to_string(),
            target: target.to_string(),
        }
    }

    #[test]
    fn longest_alias_wins() {
        let rules = vec![
            rule(EntityKind::Card, "card", "Plain Card"),
            rule(EntityKind::Card, "my favorite card", "Sapphire"),
        ];
        assert_eq!(
            resolve_alias("use my favorite card", EntityKind::Card, &rules),
            Some("Sapphire".to_string())
        );
    }

    #[test]
    fn whole_word_match_hits() {
        let rules = vec![rule(EntityKind::Card, "visa", "Visa Classic")];
        assert_eq!(
            resolve_alias("my visa bill", EntityKind::Card, &rules),
            Some("Visa Classic".to_string())
        );
        assert_eq!(
            resolve_alias("my mastercard bill", EntityKind::Card, &rules),
            None
        );
    }

    #[test]
    fn scoped_to_kind() {
        let rules = vec![rule(EntityKind::Category, "food", "Groceries")];
        assert_eq!(resolve_alias("food spend", EntityKind::Card, &rules), None);
        assert_eq!(
            resolve_alias("food spend", EntityKind::Category, &rules),
            Some("Groceries".to_string())
        );
    }

    #[test]
    fn fuzzy_fallback_maps_key_to_target() {
        let rules = vec![rule(EntityKind::Card, "sapphire reserve card", "Sapphire")];
        // "reserve" overlaps one token of the alias key but is not a
        // whole-phrase boundary hit.
        assert_eq!(
            resolve_alias("spend on reserve", EntityKind::Card, &rules),
            Some("Sapphire".to_string())
        );
    }

    #[test]
    fn blank_rules_are_ignored() {
        let rules = vec![rule(EntityKind::Card, "  ", "X"), rule(EntityKind::Card, "y", " ")];
        assert_eq!(resolve_alias("y", EntityKind::Card, &rules), None);
    }
}

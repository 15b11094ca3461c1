// SPDX-License-Identifier: Apache-2.0

//! Match Rules
//!
//! Case-insensitive substring rules evaluated against statement text.
//! Every rule is evaluated; a statement may match several at once.

use std::collections::HashSet;

use tracing::debug;

use super::types::{MatchRule, Severity};
use crate::engine::error::{EngineError, EngineResult};

/// Built-in rules: any index DDL, and the index migrations are known to own
pub fn builtin_rules() -> Vec<MatchRule> {
    vec![
        MatchRule::new("create-index", "CREATE INDEX", Severity::Warning),
        MatchRule::new("created-at-index", "created_at_idx", Severity::Error),
    ]
}

struct CompiledRule {
    rule: MatchRule,
    needle: String,
}

/// Ordered, validated rule set
pub struct RuleSet {
    rules: Vec<CompiledRule>,
}

impl RuleSet {
    /// Builds a rule set, rejecting empty patterns and duplicate IDs
    pub fn new(rules: Vec<MatchRule>) -> EngineResult<Self> {
        let mut seen = HashSet::new();
        let mut compiled = Vec::with_capacity(rules.len());

        for rule in rules {
            if rule.pattern.trim().is_empty() {
                return Err(EngineError::config(format!(
                    "Rule '{}' has an empty pattern",
                    rule.id
                )));
            }
            if !seen.insert(rule.id.clone()) {
                return Err(EngineError::config(format!(
                    "Rule with ID '{}' already exists",
                    rule.id
                )));
            }
            let needle = rule.pattern.to_lowercase();
            compiled.push(CompiledRule { rule, needle });
        }

        debug!("Compiled {} match rules", compiled.len());
        Ok(Self { rules: compiled })
    }

    pub fn builtin() -> Self {
        let rules = builtin_rules()
            .into_iter()
            .map(|rule| CompiledRule {
                needle: rule.pattern.to_lowercase(),
                rule,
            })
            .collect();
        Self { rules }
    }

    /// All rules matching `statement`, in registration order
    pub fn matching(&self, statement: &str) -> Vec<&MatchRule> {
        let haystack = statement.to_lowercase();
        self.rules
            .iter()
            .filter(|c| haystack.contains(&c.needle))
            .map(|c| &c.rule)
            .collect()
    }

    pub fn rules(&self) -> impl Iterator<Item = &MatchRule> {
        self.rules.iter().map(|c| &c.rule)
    }

    pub fn len(&self) -> usize {
        self.rules.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rules.is_empty()
    }
}

impl Default for RuleSet {
    fn default() -> Self {
        Self::builtin()
    }
}

/// Highest severity among the matched rules
pub fn highest_severity(matched: &[&MatchRule]) -> Option<Severity> {
    matched.iter().map(|r| r.severity).max()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ids(rules: &[&MatchRule]) -> Vec<String> {
        rules.iter().map(|r| r.id.clone()).collect()
    }

    #[test]
    fn test_matches_any_casing() {
        let rules = RuleSet::builtin();
        for stmt in [
            "CREATE INDEX ix ON t(a)",
            "create index ix on t(a)",
            "Create Index If Not Exists ix ON t(a)",
        ] {
            assert_eq!(ids(&rules.matching(stmt)), vec!["create-index"], "{stmt}");
        }
    }

    #[test]
    fn test_evaluates_every_rule() {
        let rules = RuleSet::builtin();
        let matched = rules.matching("CREATE INDEX IF NOT EXISTS created_at_idx ON t(created_at)");
        assert_eq!(ids(&matched), vec!["create-index", "created-at-index"]);
        assert_eq!(highest_severity(&matched), Some(Severity::Error));
    }

    #[test]
    fn test_no_match() {
        let rules = RuleSet::builtin();
        let matched = rules.matching("SELECT * FROM upload_files");
        assert!(matched.is_empty());
        assert_eq!(highest_severity(&matched), None);
    }

    #[test]
    fn test_rejects_invalid_rules() {
        let empty = RuleSet::new(vec![MatchRule::new("blank", "  ", Severity::Warning)]);
        assert!(empty.is_err());

        let dup = RuleSet::new(vec![
            MatchRule::new("a", "DROP", Severity::Warning),
            MatchRule::new("a", "ALTER", Severity::Warning),
        ]);
        assert!(dup.is_err());
    }

    #[test]
    fn test_registration_order_preserved() {
        let rules = RuleSet::new(vec![
            MatchRule::new("second", "idx", Severity::Error),
            MatchRule::new("first", "create", Severity::Warning),
        ])
        .unwrap();
        let matched = rules.matching("create unique index my_idx on t(a)");
        assert_eq!(ids(&matched), vec!["second", "first"]);
    }
}

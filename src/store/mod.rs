//! Rule persistence consumed by the interception handler.
//!
//! The engine only reads; writes come from the admin CLI. Implementations
//! own their consistency: concurrent readers must never observe a partially
//! written rule set.

pub mod error;
pub mod json;

use std::sync::RwLock;

use crate::rules::{Rule, RuleKey};

pub use error::StoreError;
pub use json::JsonFileStore;

pub trait RuleStore: Send + Sync {
    /// Point lookup by natural key.
    fn lookup_alias(&self, key: &RuleKey) -> Result<Option<Rule>, StoreError>;

    /// Parameter-correction rules for `tool`, in application order.
    fn rules_for_tool(&self, tool: &str) -> Result<Vec<Rule>, StoreError>;

    /// Insert, or replace `to`/`message` of the row with the same key.
    fn upsert(&self, rule: Rule) -> Result<(), StoreError>;

    /// Returns whether a row was removed.
    fn delete(&self, key: &RuleKey) -> Result<bool, StoreError>;

    fn list(&self) -> Result<Vec<Rule>, StoreError>;
}

/// Insert `rule`, or update the existing row in place so its position and
/// creation time are kept.
pub(crate) fn upsert_into(rules: &mut Vec<Rule>, rule: Rule) {
    let key = rule.key();
    match rules.iter_mut().find(|existing| key.matches(existing)) {
        Some(existing) => {
            existing.to = rule.to;
            existing.message = rule.message;
        }
        None => rules.push(rule),
    }
}

pub(crate) fn remove_from(rules: &mut Vec<Rule>, key: &RuleKey) -> bool {
    let before = rules.len();
    rules.retain(|rule| !key.matches(rule));
    rules.len() != before
}

pub(crate) fn select_for_tool(rules: &[Rule], tool: &str) -> Vec<Rule> {
    rules
        .iter()
        .filter(|rule| rule.tool == tool && !rule.is_tool_alias())
        .cloned()
        .collect()
}

/// Process-local store, used by tests and dry runs.
#[derive(Debug, Default)]
pub struct MemoryStore {
    rules: RwLock<Vec<Rule>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_rules(rules: impl IntoIterator<Item = Rule>) -> Self {
        let mut all = Vec::new();
        for rule in rules {
            upsert_into(&mut all, rule);
        }
        Self {
            rules: RwLock::new(all),
        }
    }
}

impl RuleStore for MemoryStore {
    fn lookup_alias(&self, key: &RuleKey) -> Result<Option<Rule>, StoreError> {
        let rules = self.rules.read().map_err(|e| StoreError::Unavailable(e.to_string()))?;
        Ok(rules.iter().find(|rule| key.matches(rule)).cloned())
    }

    fn rules_for_tool(&self, tool: &str) -> Result<Vec<Rule>, StoreError> {
        let rules = self.rules.read().map_err(|e| StoreError::Unavailable(e.to_string()))?;
        Ok(select_for_tool(&rules, tool))
    }

    fn upsert(&self, rule: Rule) -> Result<(), StoreError> {
        let mut rules = self.rules.write().map_err(|e| StoreError::Unavailable(e.to_string()))?;
        upsert_into(&mut rules, rule);
        Ok(())
    }

    fn delete(&self, key: &RuleKey) -> Result<bool, StoreError> {
        let mut rules = self.rules.write().map_err(|e| StoreError::Unavailable(e.to_string()))?;
        Ok(remove_from(&mut rules, key))
    }

    fn list(&self) -> Result<Vec<Rule>, StoreError> {
        let rules = self.rules.read().map_err(|e| StoreError::Unavailable(e.to_string()))?;
        Ok(rules.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::rules::MatchKind;

    #[test]
    fn upsert_replaces_target_and_keeps_position() {
        let store = MemoryStore::new();
        store.upsert(Rule::alias("ReadFile", "Read")).unwrap();
        store
            .upsert(Rule::correction("Bash", "command", MatchKind::Command, "grep", "rg"))
            .unwrap();
        let original_created = store.list().unwrap()[0].created_at;

        store
            .upsert(Rule::alias("ReadFile", "View").with_message("use View"))
            .unwrap();

        let all = store.list().unwrap();
        assert_eq!(all.len(), 2);
        assert_eq!(all[0].to, "View");
        assert_eq!(all[0].message.as_deref(), Some("use View"));
        assert_eq!(all[0].created_at, original_created);
    }

    #[test]
    fn lookup_uses_the_full_key() {
        let store = MemoryStore::with_rules([
            Rule::alias("ReadFile", "Read"),
            Rule::correction("Bash", "command", MatchKind::Literal, "ReadFile", "cat"),
        ]);
        let found = store.lookup_alias(&RuleKey::tool_alias("ReadFile")).unwrap();
        assert_eq!(found.map(|r| r.to), Some("Read".to_string()));
        assert!(store.lookup_alias(&RuleKey::tool_alias("Read")).unwrap().is_none());
    }

    #[test]
    fn rules_for_tool_skips_aliases_and_other_tools() {
        let store = MemoryStore::with_rules([
            Rule::alias("Bash", "Shell"),
            Rule::correction("Bash", "command", MatchKind::Command, "grep", "rg"),
            Rule::correction("Grep", "path", MatchKind::Literal, "scr", "src"),
            Rule::correction("Bash", "command", MatchKind::Flag, "r", "R").scoped_to("scp"),
        ]);
        let rules = store.rules_for_tool("Bash").unwrap();
        assert_eq!(rules.len(), 2);
        assert_eq!(rules[0].match_kind, MatchKind::Command);
        assert_eq!(rules[1].match_kind, MatchKind::Flag);
    }

    #[test]
    fn delete_reports_whether_a_row_was_removed() {
        let rule = Rule::correction("Bash", "command", MatchKind::Command, "grep", "rg");
        let store = MemoryStore::with_rules([rule.clone()]);
        assert!(store.delete(&rule.key()).unwrap());
        assert!(!store.delete(&rule.key()).unwrap());
        assert!(store.list().unwrap().is_empty());
    }
}

//! Correction rule data model.
//!
//! A rule is either a tool-name alias (blocks calls to a tool that does not
//! exist) or a parameter correction that rewrites one field of a tool's input.

pub mod error;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

pub use error::RuleError;

/// Selects the matching/rewriting algorithm a rule uses.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MatchKind {
    /// Rows written without a kind are tool-name aliases.
    #[default]
    #[serde(alias = "")]
    Alias,
    Literal,
    Flag,
    Command,
    Regex,
    Recipe,
}

impl MatchKind {
    pub fn as_str(self) -> &'static str {
        match self {
            MatchKind::Alias => "alias",
            MatchKind::Literal => "literal",
            MatchKind::Flag => "flag",
            MatchKind::Command => "command",
            MatchKind::Regex => "regex",
            MatchKind::Recipe => "recipe",
        }
    }
}

impl fmt::Display for MatchKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for MatchKind {
    type Err = RuleError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "" | "alias" => Ok(MatchKind::Alias),
            "literal" => Ok(MatchKind::Literal),
            "flag" => Ok(MatchKind::Flag),
            "command" => Ok(MatchKind::Command),
            "regex" => Ok(MatchKind::Regex),
            "recipe" => Ok(MatchKind::Recipe),
            other => Err(RuleError::UnknownMatchKind(other.to_string())),
        }
    }
}

/// Persisted correction rule.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Rule {
    pub from: String,
    pub to: String,
    #[serde(default)]
    pub tool: String,
    #[serde(default)]
    pub param: String,
    #[serde(default)]
    pub command: String,
    #[serde(default)]
    pub match_kind: MatchKind,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    #[serde(default = "Utc::now")]
    pub created_at: DateTime<Utc>,
}

impl Rule {
    /// Tool-name alias: calls to `from` are blocked with a hint to use `to`.
    pub fn alias(from: impl Into<String>, to: impl Into<String>) -> Self {
        Self {
            from: from.into(),
            to: to.into(),
            tool: String::new(),
            param: String::new(),
            command: String::new(),
            match_kind: MatchKind::Alias,
            message: None,
            created_at: Utc::now(),
        }
    }

    /// Parameter correction for `tool`'s `param` field.
    pub fn correction(
        tool: impl Into<String>,
        param: impl Into<String>,
        match_kind: MatchKind,
        from: impl Into<String>,
        to: impl Into<String>,
    ) -> Self {
        Self {
            from: from.into(),
            to: to.into(),
            tool: tool.into(),
            param: param.into(),
            command: String::new(),
            match_kind,
            message: None,
            created_at: Utc::now(),
        }
    }

    /// Restrict the rule to segments whose command token is `command`.
    pub fn scoped_to(mut self, command: impl Into<String>) -> Self {
        self.command = command.into();
        self
    }

    pub fn with_message(mut self, message: impl Into<String>) -> Self {
        self.message = Some(message.into());
        self
    }

    pub fn key(&self) -> RuleKey {
        RuleKey {
            from: self.from.clone(),
            tool: self.tool.clone(),
            param: self.param.clone(),
            command: self.command.clone(),
            match_kind: self.match_kind,
        }
    }

    pub fn is_tool_alias(&self) -> bool {
        self.match_kind == MatchKind::Alias
            && self.tool.is_empty()
            && self.param.is_empty()
            && self.command.is_empty()
    }

    /// Message shown when a tool-name alias blocks a call.
    pub fn block_message(&self) -> String {
        match self.message.as_deref().filter(|m| !m.trim().is_empty()) {
            Some(custom) => custom.to_string(),
            None => format!("{} is not a valid tool; use {} instead", self.from, self.to),
        }
    }

    /// Check the rule is well-formed before it is written to a store.
    ///
    /// The hook itself never calls this: a malformed row that slipped into a
    /// store is simply skipped at match time.
    pub fn validate(&self) -> Result<(), RuleError> {
        if self.from.is_empty() {
            return Err(RuleError::EmptyPattern);
        }

        if self.match_kind == MatchKind::Alias {
            if !self.tool.is_empty() || !self.param.is_empty() || !self.command.is_empty() {
                return Err(RuleError::AliasWithScope);
            }
            return Ok(());
        }

        if self.tool.trim().is_empty() || self.param.trim().is_empty() {
            return Err(RuleError::MissingTarget {
                kind: self.match_kind,
            });
        }

        match self.match_kind {
            MatchKind::Regex => {
                regex::Regex::new(&self.from).map_err(|source| RuleError::InvalidRegex {
                    pattern: self.from.clone(),
                    source,
                })?;
            }
            MatchKind::Flag => {
                let name = self.from.trim_start_matches('-');
                if name.is_empty() || name.chars().any(char::is_whitespace) {
                    return Err(RuleError::InvalidFlag(self.from.clone()));
                }
                // A bare short flag is one character; anything longer must be spelled --long.
                if !self.from.starts_with("--") && name.chars().count() != 1 {
                    return Err(RuleError::InvalidFlag(self.from.clone()));
                }
            }
            MatchKind::Command => {
                if self.from.split_whitespace().count() != 1 || self.from.trim() != self.from {
                    return Err(RuleError::InvalidCommand(self.from.clone()));
                }
            }
            MatchKind::Literal | MatchKind::Recipe | MatchKind::Alias => {}
        }

        Ok(())
    }
}

/// Natural key of a rule: `(from, tool, param, command, match_kind)`.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct RuleKey {
    pub from: String,
    pub tool: String,
    pub param: String,
    pub command: String,
    pub match_kind: MatchKind,
}

impl RuleKey {
    /// Key of the tool-name alias for `tool_name`.
    pub fn tool_alias(tool_name: &str) -> Self {
        Self {
            from: tool_name.to_string(),
            tool: String::new(),
            param: String::new(),
            command: String::new(),
            match_kind: MatchKind::Alias,
        }
    }

    pub fn matches(&self, rule: &Rule) -> bool {
        self.from == rule.from
            && self.tool == rule.tool
            && self.param == rule.param
            && self.command == rule.command
            && self.match_kind == rule.match_kind
    }
}

impl fmt::Display for RuleKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}[{}] {}.{}",
            self.match_kind,
            if self.command.is_empty() { "*" } else { self.command.as_str() },
            if self.tool.is_empty() { "-" } else { self.tool.as_str() },
            if self.param.is_empty() { "-" } else { self.param.as_str() },
        )?;
        write!(f, " {:?}", self.from)
    }
}

use thiserror::Error;

use super::MatchKind;

#[derive(Debug, Error)]
pub enum RuleError {
    #[error("unknown match kind: {0} (expected alias, literal, flag, command, regex or recipe)")]
    UnknownMatchKind(String),

    #[error("rule pattern (from) cannot be empty")]
    EmptyPattern,

    #[error("tool-name aliases cannot be scoped to a tool, param or command")]
    AliasWithScope,

    #[error("{kind} rules need both a tool and a param")]
    MissingTarget { kind: MatchKind },

    #[error("invalid regex pattern {pattern:?}: {source}")]
    InvalidRegex {
        pattern: String,
        #[source]
        source: regex::Error,
    },

    #[error("flag rules must name exactly one flag, got {0:?}")]
    InvalidFlag(String),

    #[error("command rules must name a single command word, got {0:?}")]
    InvalidCommand(String),
}

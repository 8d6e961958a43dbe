//! Interception handler.
//!
//! One evaluation per tool call, no state kept between calls. Phase 1 blocks
//! calls to tool names that have an alias rule. Phase 2 rewrites parameters
//! from the tool's correction rules. Everything that goes wrong on the way
//! ends in a plain allow.

use serde_json::{Map, Value};
use std::sync::Arc;

use crate::config::Config;
use crate::engine::{compose_corrections, matches_tool_alias, ParamCorrection};
use crate::rules::RuleKey;
use crate::store::{RuleStore, StoreError};
use crate::{HookInput, PreToolUseOutput};

/// Outcome of one interception.
#[derive(Debug, Clone, PartialEq)]
pub enum Decision {
    /// Let the call through untouched; the hook prints nothing.
    Allow,
    /// Deny the call: the tool name does not exist.
    Block { message: String },
    /// Let the call through with corrected parameters.
    Rewrite { corrections: Vec<ParamCorrection> },
}

impl Decision {
    pub fn is_block(&self) -> bool {
        matches!(self, Decision::Block { .. })
    }

    /// `updatedInput`: only the corrected parameters.
    pub fn updated_input(&self) -> Option<Map<String, Value>> {
        let Decision::Rewrite { corrections } = self else {
            return None;
        };
        Some(
            corrections
                .iter()
                .map(|c| (c.param.clone(), Value::String(c.corrected.clone())))
                .collect(),
        )
    }

    /// All rule descriptions, in application order, joined with `"; "`.
    pub fn additional_context(&self) -> Option<String> {
        let Decision::Rewrite { corrections } = self else {
            return None;
        };
        Some(
            corrections
                .iter()
                .flat_map(|c| c.descriptions.iter().map(String::as_str))
                .collect::<Vec<_>>()
                .join("; "),
        )
    }

    /// Hook response, or `None` for a plain allow.
    pub fn to_output(&self) -> Option<PreToolUseOutput> {
        match self {
            Decision::Allow => None,
            Decision::Block { message } => Some(PreToolUseOutput::deny(message.clone())),
            Decision::Rewrite { .. } => Some(PreToolUseOutput::allow_with_rewrite(
                self.updated_input().unwrap_or_default(),
                self.additional_context().unwrap_or_default(),
            )),
        }
    }
}

pub struct Interceptor {
    store: Arc<dyn RuleStore>,
    config: Config,
}

impl Interceptor {
    pub fn new(store: Arc<dyn RuleStore>, config: Config) -> Self {
        Self { store, config }
    }

    /// Decode a raw hook payload and evaluate it. Undecodable input allows.
    pub fn evaluate_raw(&self, raw: &str) -> Decision {
        match serde_json::from_str::<HookInput>(raw) {
            Ok(input) => self.evaluate(&input),
            Err(e) => {
                tracing::debug!(error = %e, "undecodable hook payload, allowing");
                Decision::Allow
            }
        }
    }

    pub fn evaluate(&self, input: &HookInput) -> Decision {
        if !self.config.enabled {
            return Decision::Allow;
        }

        let tool_name = input.tool_name.as_str();
        if tool_name.is_empty() {
            return Decision::Allow;
        }

        // Phase 2 only runs once the store has confirmed there is no alias.
        match self.check_tool_alias(tool_name) {
            Ok(Some(message)) => {
                tracing::info!(tool = tool_name, "blocking call to aliased tool name");
                return Decision::Block { message };
            }
            Ok(None) => {}
            Err(e) => {
                tracing::warn!(tool = tool_name, error = %e, "alias lookup failed, allowing");
                return Decision::Allow;
            }
        }

        let rules = match self.store.rules_for_tool(tool_name) {
            Ok(rules) if rules.is_empty() => return Decision::Allow,
            Ok(rules) => rules,
            Err(e) => {
                tracing::warn!(tool = tool_name, error = %e, "rule lookup failed, allowing");
                return Decision::Allow;
            }
        };

        let corrections = compose_corrections(tool_name, &input.tool_input, &rules);
        if corrections.is_empty() {
            return Decision::Allow;
        }

        tracing::info!(
            tool = tool_name,
            params = corrections.len(),
            "rewriting tool input"
        );
        Decision::Rewrite { corrections }
    }

    /// Run [`Interceptor::evaluate_raw`] on the blocking pool, bounded by the
    /// configured timeout.
    ///
    /// A timed-out or panicked evaluation yields an allow. On timeout the
    /// blocking task is left running; callers that exit right away should
    /// not wait for it.
    pub async fn evaluate_with_budget(self, raw: String) -> Evaluation {
        let budget = self.config.timeout;
        let task = tokio::task::spawn_blocking(move || self.evaluate_raw(&raw));
        match tokio::time::timeout(budget, task).await {
            Ok(Ok(decision)) => Evaluation::Done(decision),
            Ok(Err(e)) => {
                tracing::warn!(error = %e, "interception task failed, allowing");
                Evaluation::Done(Decision::Allow)
            }
            Err(_) => {
                tracing::warn!(
                    timeout_ms = budget.as_millis() as u64,
                    "interception timed out, allowing"
                );
                Evaluation::TimedOut
            }
        }
    }

    /// Phase 1: the block message when `tool_name` is an alias.
    fn check_tool_alias(&self, tool_name: &str) -> Result<Option<String>, StoreError> {
        let rule = self.store.lookup_alias(&RuleKey::tool_alias(tool_name))?;
        Ok(rule
            .filter(|rule| matches_tool_alias(rule, tool_name))
            .map(|rule| rule.block_message()))
    }
}

/// Result of a budgeted evaluation.
#[derive(Debug, Clone, PartialEq)]
pub enum Evaluation {
    Done(Decision),
    TimedOut,
}

impl Evaluation {
    /// The decision to report; a timeout is a plain allow.
    pub fn decision(&self) -> Decision {
        match self {
            Evaluation::Done(decision) => decision.clone(),
            Evaluation::TimedOut => Decision::Allow,
        }
    }
}

//! PreToolUse correction hooks: block calls to tool names that do not
//! exist and rewrite tool parameters from persisted correction rules.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// One-line preview of a rule value for listings: newlines become `⏎` and
/// text past `max_chars` characters is cut with a trailing `…`.
pub fn preview_line(text: &str, max_chars: usize) -> String {
    let flat = text.replace('\n', "⏎");
    if flat.char_indices().nth(max_chars).is_none() {
        return flat;
    }
    let end = flat
        .char_indices()
        .nth(max_chars.saturating_sub(1))
        .map_or(flat.len(), |(i, _)| i);
    format!("{}…", &flat[..end])
}

/// Runtime configuration (env, config file, `.env`)
pub mod config;

/// Command segmentation, rule matching and correction composition
pub mod engine;

/// Two-phase interception: tool-name block check, then parameter rewrite
pub mod hook;

/// tracing subscriber setup shared by the binaries
pub mod logging;

/// Correction rule data model
pub mod rules;

/// Rule persistence
pub mod store;

pub use config::{load_config, Config, ConfigWarning, LoadedConfig};
pub use engine::{compose_corrections, split_segments, ParamCorrection, Segment};
pub use hook::{Decision, Evaluation, Interceptor};
pub use rules::{MatchKind, Rule, RuleError, RuleKey};
pub use store::{JsonFileStore, MemoryStore, RuleStore, StoreError};

/// Claude Code Hook input data structure - actual fields from Claude Code
#[derive(Debug, Clone, Deserialize)]
pub struct HookInput {
    #[serde(default)]
    pub tool_name: String,
    #[serde(default)]
    pub tool_input: HashMap<String, serde_json::Value>,
    #[serde(default)]
    pub session_id: Option<String>,
    #[serde(default)]
    pub transcript_path: Option<String>,
    #[serde(default)]
    pub cwd: Option<String>,
    #[serde(default)]
    pub hook_event_name: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum PermissionDecision {
    Allow,
    Deny,
}

/// PreToolUse hook output
#[derive(Debug, Serialize)]
pub struct PreToolUseOutput {
    #[serde(rename = "hookSpecificOutput")]
    pub hook_specific_output: PreToolUseHookOutput,
}

#[derive(Debug, Serialize)]
pub struct PreToolUseHookOutput {
    #[serde(rename = "hookEventName")]
    pub hook_event_name: String,
    #[serde(rename = "permissionDecision")]
    pub permission_decision: PermissionDecision,
    #[serde(rename = "permissionDecisionReason", skip_serializing_if = "Option::is_none")]
    pub permission_decision_reason: Option<String>,
    #[serde(rename = "updatedInput", skip_serializing_if = "Option::is_none")]
    pub updated_input: Option<serde_json::Map<String, serde_json::Value>>,
    #[serde(rename = "additionalContext", skip_serializing_if = "Option::is_none")]
    pub additional_context: Option<String>,
}

impl PreToolUseOutput {
    pub fn deny(reason: String) -> Self {
        Self {
            hook_specific_output: PreToolUseHookOutput {
                hook_event_name: "PreToolUse".to_string(),
                permission_decision: PermissionDecision::Deny,
                permission_decision_reason: Some(reason),
                updated_input: None,
                additional_context: None,
            },
        }
    }

    pub fn allow_with_rewrite(
        updated_input: serde_json::Map<String, serde_json::Value>,
        additional_context: String,
    ) -> Self {
        Self {
            hook_specific_output: PreToolUseHookOutput {
                hook_event_name: "PreToolUse".to_string(),
                permission_decision: PermissionDecision::Allow,
                permission_decision_reason: None,
                updated_input: Some(updated_input),
                additional_context: Some(additional_context),
            },
        }
    }
}

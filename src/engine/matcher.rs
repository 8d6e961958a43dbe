use regex::Regex;
use std::ops::Range;

use super::segment::{rewrite_segments, word_ranges, Segment};
use crate::rules::{MatchKind, Rule};

/// Result of one rule applied to one parameter value.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Correction {
    pub value: String,
    pub description: String,
}

/// Exact, case-sensitive tool-name match for an alias rule.
pub fn matches_tool_alias(rule: &Rule, tool_name: &str) -> bool {
    rule.is_tool_alias() && rule.from == tool_name
}

/// Apply `rule` to `value`. `None` means the rule did not change anything.
///
/// Alias rules never rewrite parameters; they are decided before any
/// parameter is looked at.
pub fn apply_rule(rule: &Rule, value: &str) -> Option<Correction> {
    if rule.from.is_empty() {
        return None;
    }

    let corrected = match rule.match_kind {
        MatchKind::Alias => None,
        MatchKind::Flag => correct_flag(rule, value),
        MatchKind::Command => correct_command(rule, value),
        MatchKind::Literal => correct_literal(rule, value),
        MatchKind::Regex => correct_regex(rule, value),
        MatchKind::Recipe => correct_recipe(rule, value),
    }?;

    if corrected == value {
        return None;
    }

    tracing::debug!(
        kind = %rule.match_kind,
        from = %rule.from,
        to = %rule.to,
        "rule applied"
    );

    Some(Correction {
        value: corrected,
        description: describe(rule),
    })
}

/// Human-readable text for an applied rule: the custom message, or a
/// generated one per match kind.
pub fn describe(rule: &Rule) -> String {
    if let Some(message) = rule.message.as_deref().filter(|m| !m.trim().is_empty()) {
        return message.to_string();
    }

    match rule.match_kind {
        MatchKind::Alias => rule.block_message(),
        MatchKind::Flag => {
            let scope = if rule.command.is_empty() {
                "flag"
            } else {
                rule.command.as_str()
            };
            match FlagSpec::parse(&rule.from) {
                Some(spec) => format!(
                    "{}: use {} instead of {}",
                    scope,
                    spec.replacement_token(&rule.to),
                    spec.display()
                ),
                None => format!("{}: use {} instead of {}", scope, rule.to, rule.from),
            }
        }
        MatchKind::Command => format!("use {} instead of {}", rule.to, rule.from),
        MatchKind::Literal => format!("replaced {:?} with {:?}", rule.from, rule.to),
        MatchKind::Regex => format!("rewrote /{}/ as {:?}", rule.from, rule.to),
        MatchKind::Recipe => format!("{:?} is replaced by: {}", rule.from, rule.to),
    }
}

/// A segment qualifies when the rule is unscoped or names its command.
fn qualifies(rule: &Rule, segment: &Segment<'_>) -> bool {
    rule.command.is_empty() || segment.command == rule.command
}

fn correct_command(rule: &Rule, value: &str) -> Option<String> {
    rewrite_segments(value, |segment| {
        if !qualifies(rule, segment) || segment.command != rule.from {
            return None;
        }
        let args = segment.text.get(segment.command.len()..)?;
        Some(format!("{}{}", rule.to, args))
    })
}

fn correct_literal(rule: &Rule, value: &str) -> Option<String> {
    let to_contains_from = rule.to.contains(rule.from.as_str());
    rewrite_segments(value, |segment| {
        if !qualifies(rule, segment) || !segment.text.contains(rule.from.as_str()) {
            return None;
        }
        // Already corrected: a second pass must not grow the text again.
        if to_contains_from && segment.text.contains(rule.to.as_str()) {
            return None;
        }
        Some(segment.text.replace(rule.from.as_str(), &rule.to))
    })
}

fn correct_regex(rule: &Rule, value: &str) -> Option<String> {
    let re = match Regex::new(&rule.from) {
        Ok(re) => re,
        Err(e) => {
            tracing::warn!(pattern = %rule.from, error = %e, "skipping rule with invalid regex");
            return None;
        }
    };

    if !re.is_match(value) {
        return None;
    }
    Some(re.replace_all(value, rule.to.as_str()).into_owned())
}

fn correct_recipe(rule: &Rule, value: &str) -> Option<String> {
    rewrite_segments(value, |segment| {
        if !qualifies(rule, segment) || segment.text == rule.to {
            return None;
        }
        let rest = segment.text.strip_prefix(rule.from.as_str())?;
        match rest.chars().next() {
            Some(next) if is_identifier_char(next) => None,
            _ => Some(rule.to.clone()),
        }
    })
}

/// Characters that continue a word: `--wisp` must not match `--wispy`,
/// `await-signal` must not match `await-signal-all`.
fn is_identifier_char(c: char) -> bool {
    c.is_ascii_alphanumeric() || c == '_' || c == '-'
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum FlagSpec {
    Short(char),
    Long(String),
}

impl FlagSpec {
    fn parse(from: &str) -> Option<Self> {
        if from.starts_with("--") {
            return (from.len() > 2).then(|| FlagSpec::Long(from.to_string()));
        }
        let name = from.trim_start_matches('-');
        let mut chars = name.chars();
        match (chars.next(), chars.next()) {
            (Some(c), None) => Some(FlagSpec::Short(c)),
            _ => None,
        }
    }

    fn display(&self) -> String {
        match self {
            FlagSpec::Short(c) => format!("-{c}"),
            FlagSpec::Long(name) => name.clone(),
        }
    }

    /// Spelling of `to` as a standalone flag token.
    fn replacement_token(&self, to: &str) -> String {
        if to.starts_with('-') {
            return to.to_string();
        }
        if to.chars().count() == 1 {
            format!("-{to}")
        } else {
            format!("--{to}")
        }
    }
}

fn correct_flag(rule: &Rule, value: &str) -> Option<String> {
    let Some(spec) = FlagSpec::parse(&rule.from) else {
        tracing::warn!(flag = %rule.from, "skipping flag rule that does not name a single flag");
        return None;
    };
    if rule.to.trim_start_matches('-').is_empty() {
        tracing::warn!(flag = %rule.from, "skipping flag rule without a replacement flag");
        return None;
    }

    rewrite_segments(value, |segment| {
        if !qualifies(rule, segment) {
            return None;
        }
        rewrite_flags_in(segment.text, &spec, &rule.to)
    })
}

fn rewrite_flags_in(text: &str, spec: &FlagSpec, to: &str) -> Option<String> {
    let mut edits: Vec<(Range<usize>, String)> = Vec::new();

    // The first word is the command itself.
    for range in word_ranges(text).into_iter().skip(1) {
        let word = &text[range.clone()];
        if word == "--" {
            break;
        }
        let replacement = match spec {
            FlagSpec::Short(flag) => rewrite_short_group(word, *flag, spec, to),
            FlagSpec::Long(name) => rewrite_long_flag(word, name, spec, to),
        };
        if let Some(replacement) = replacement {
            edits.push((range, replacement));
        }
    }

    if edits.is_empty() {
        return None;
    }
    Some(splice(text, edits))
}

/// `-rP` with r→R becomes `-RP`, and `-rR` becomes `-R`; a multi-character
/// target is split out of the group (`-rP` with r→--recursive becomes
/// `-P --recursive`).
fn rewrite_short_group(word: &str, flag: char, spec: &FlagSpec, to: &str) -> Option<String> {
    let group = word.strip_prefix('-')?;
    if group.is_empty() || group.starts_with('-') {
        return None;
    }
    if !group.chars().all(|c| c.is_ascii_alphanumeric()) || !group.contains(flag) {
        return None;
    }

    let short_to = to.trim_start_matches('-');
    let mut short_chars = short_to.chars();
    if let (Some(c), None) = (short_chars.next(), short_chars.next()) {
        if !to.starts_with("--") {
            // Each flag appears once: the target replaces the first `from`
            // unless it is already in the group.
            let mut placed = group.contains(c);
            let mut out = String::with_capacity(group.len());
            for ch in group.chars() {
                if ch != flag {
                    out.push(ch);
                } else if !placed {
                    out.push(c);
                    placed = true;
                }
            }
            return Some(format!("-{out}"));
        }
    }

    let standalone = spec.replacement_token(to);
    let rest: String = group.chars().filter(|&ch| ch != flag).collect();
    if rest.is_empty() {
        Some(standalone)
    } else {
        Some(format!("-{rest} {standalone}"))
    }
}

/// `--colour=auto` with →--color becomes `--color=auto`. A short target
/// takes the value as its own word: `--recursive=x` with →r becomes `-r x`.
fn rewrite_long_flag(word: &str, name: &str, spec: &FlagSpec, to: &str) -> Option<String> {
    let standalone = spec.replacement_token(to);
    if word == name {
        return Some(standalone);
    }
    let value = word.strip_prefix(name)?.strip_prefix('=')?;
    if standalone.starts_with("--") {
        return Some(format!("{standalone}={value}"));
    }
    if value.is_empty() {
        Some(format!("{standalone} ''"))
    } else {
        Some(format!("{standalone} {value}"))
    }
}

/// Apply non-overlapping edits, given in ascending order, to `text`.
fn splice(text: &str, edits: Vec<(Range<usize>, String)>) -> String {
    let mut out = text.to_string();
    for (range, replacement) in edits.into_iter().rev() {
        out.replace_range(range, &replacement);
    }
    out
}

use serde_json::Value;
use std::collections::HashMap;

use super::matcher::apply_rule;
use crate::rules::{MatchKind, Rule};

/// Final corrected value of one parameter plus the descriptions of every
/// rule that changed it, in application order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParamCorrection {
    pub param: String,
    pub original: String,
    pub corrected: String,
    pub descriptions: Vec<String>,
}

/// Run every parameter rule of `tool_name` over the matching string values
/// of `tool_input`.
///
/// Rules for the same param are folded in the order given, each one seeing
/// the previous output. Params that end up unchanged are left out.
pub fn compose_corrections(
    tool_name: &str,
    tool_input: &HashMap<String, Value>,
    rules: &[Rule],
) -> Vec<ParamCorrection> {
    let mut order: Vec<&str> = Vec::new();
    let mut by_param: HashMap<&str, Vec<&Rule>> = HashMap::new();

    for rule in rules.iter().filter(|r| {
        r.match_kind != MatchKind::Alias && r.tool == tool_name && !r.param.is_empty()
    }) {
        by_param
            .entry(rule.param.as_str())
            .or_insert_with(|| {
                order.push(rule.param.as_str());
                Vec::new()
            })
            .push(rule);
    }

    let mut corrections = Vec::new();
    for param in order {
        let Some(Value::String(original)) = tool_input.get(param) else {
            continue;
        };
        let Some(rules) = by_param.get(param) else {
            continue;
        };
        if let Some(correction) = correct_value(param, original, rules) {
            corrections.push(correction);
        }
    }
    corrections
}

fn correct_value(param: &str, original: &str, rules: &[&Rule]) -> Option<ParamCorrection> {
    let mut current = original.to_string();
    let mut descriptions = Vec::new();

    for rule in rules {
        if let Some(correction) = apply_rule(rule, &current) {
            current = correction.value;
            descriptions.push(correction.description);
        }
    }

    if descriptions.is_empty() || current == original {
        return None;
    }

    Some(ParamCorrection {
        param: param.to_string(),
        original: original.to_string(),
        corrected: current,
        descriptions,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn input(pairs: &[(&str, Value)]) -> HashMap<String, Value> {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.clone()))
            .collect()
    }

    #[test]
    fn rules_on_same_param_compose_in_order() {
        let rules = vec![
            Rule::correction("Bash", "command", MatchKind::Flag, "r", "R").scoped_to("scp"),
            Rule::correction("Bash", "command", MatchKind::Literal, "h:/", "host:/srv/").scoped_to("scp"),
        ];
        let tool_input = input(&[("command", json!("scp -rP 22 f h:/"))]);

        let out = compose_corrections("Bash", &tool_input, &rules);
        assert_eq!(out.len(), 1);
        assert_eq!(out[0].param, "command");
        assert_eq!(out[0].corrected, "scp -RP 22 f host:/srv/");
        assert_eq!(out[0].descriptions.len(), 2);
        assert_eq!(out[0].descriptions[0], "scp: use -R instead of -r");
    }

    #[test]
    fn later_rule_sees_earlier_output() {
        let rules = vec![
            Rule::correction("Bash", "command", MatchKind::Command, "grep", "rg"),
            Rule::correction("Bash", "command", MatchKind::Flag, "E", "e").scoped_to("rg"),
        ];
        let tool_input = input(&[("command", json!("grep -E foo src"))]);
        let out = compose_corrections("Bash", &tool_input, &rules);
        assert_eq!(out[0].corrected, "rg -e foo src");
    }

    #[test]
    fn untouched_and_non_string_params_are_excluded() {
        let rules = vec![
            Rule::correction("Bash", "command", MatchKind::Command, "grep", "rg"),
            Rule::correction("Bash", "description", MatchKind::Literal, "zzz", "y"),
            Rule::correction("Bash", "timeout", MatchKind::Literal, "1", "2"),
        ];
        let tool_input = input(&[
            ("command", json!("ls")),
            ("description", json!("list files")),
            ("timeout", json!(1000)),
        ]);
        assert!(compose_corrections("Bash", &tool_input, &rules).is_empty());
    }

    #[test]
    fn params_are_corrected_independently() {
        let rules = vec![
            Rule::correction("Grep", "path", MatchKind::Literal, "scr/", "src/"),
            Rule::correction("Grep", "pattern", MatchKind::Regex, r"\\d", "[0-9]"),
        ];
        let tool_input = input(&[("path", json!("scr/lib")), ("pattern", json!(r"v\d+"))]);
        let out = compose_corrections("Grep", &tool_input, &rules);
        assert_eq!(out.len(), 2);
        assert_eq!(out[0].param, "path");
        assert_eq!(out[0].corrected, "src/lib");
        assert_eq!(out[1].param, "pattern");
        assert_eq!(out[1].corrected, "v[0-9]+");
    }

    #[test]
    fn rules_for_other_tools_and_aliases_are_ignored() {
        let rules = vec![
            Rule::alias("Bash", "Shell"),
            Rule::correction("Shell", "command", MatchKind::Command, "grep", "rg"),
        ];
        let tool_input = input(&[("command", json!("grep x"))]);
        assert!(compose_corrections("Bash", &tool_input, &rules).is_empty());
    }

    #[test]
    fn invalid_regex_does_not_stop_other_rules() {
        let rules = vec![
            Rule::correction("Bash", "command", MatchKind::Regex, "([", "x"),
            Rule::correction("Bash", "command", MatchKind::Command, "grep", "rg"),
        ];
        let tool_input = input(&[("command", json!("grep x"))]);
        let out = compose_corrections("Bash", &tool_input, &rules);
        assert_eq!(out[0].corrected, "rg x");
        assert_eq!(out[0].descriptions, vec!["use rg instead of grep".to_string()]);
    }
}

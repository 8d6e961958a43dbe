use std::sync::Arc;

use tool_correction_hooks::engine::apply_rule;
use tool_correction_hooks::{Config, Decision, Interceptor, MatchKind, MemoryStore, Rule};

fn bash_rule(kind: MatchKind, from: &str, to: &str) -> Rule {
    Rule::correction("Bash", "command", kind, from, to)
}

fn hook(rules: Vec<Rule>) -> Interceptor {
    Interceptor::new(Arc::new(MemoryStore::with_rules(rules)), Config::default())
}

fn run(hook: &Interceptor, command: &str) -> Decision {
    let raw = serde_json::json!({
        "tool_name": "Bash",
        "tool_input": {"command": command, "timeout": 120000}
    })
    .to_string();
    hook.evaluate_raw(&raw)
}

fn corrected_command(decision: &Decision) -> String {
    let updated = decision.updated_input().expect("rewrite expected");
    updated["command"].as_str().unwrap().to_string()
}

#[test]
fn flag_correction_keeps_combined_flags() {
    let rule = bash_rule(MatchKind::Flag, "r", "R").scoped_to("scp");
    let out = apply_rule(&rule, "scp -rP 22 f h:/").unwrap().value;
    assert!(out.contains("-RP"));
    assert!(!out.contains("-r"));
}

#[test]
fn command_substitution_keeps_other_segments_byte_identical() {
    let rule = bash_rule(MatchKind::Command, "grep", "rg");
    let out = apply_rule(&rule, "cat f | grep pat").unwrap().value;
    assert_eq!(out, "cat f | rg pat");
    assert!(out.starts_with("cat f |"));
}

#[test]
fn recipe_respects_word_boundary() {
    let rule = bash_rule(MatchKind::Recipe, "bd list --wisp", "bd list --type wisp");
    assert!(apply_rule(&rule, "bd list --wispy").is_none());
    assert_eq!(
        apply_rule(&rule, "bd list --wisp --limit 3").unwrap().value,
        "bd list --type wisp"
    );
}

#[test]
fn recipe_drops_trailing_args_and_keeps_neighbours() {
    let rule = bash_rule(MatchKind::Recipe, "gt await-signal", "gt mol status");
    assert_eq!(
        apply_rule(&rule, "gt await-signal --verbose").unwrap().value,
        "gt mol status"
    );
    assert_eq!(
        apply_rule(&rule, "echo start && gt await-signal").unwrap().value,
        "echo start && gt mol status"
    );
}

#[test]
fn regex_substitution() {
    let rule = bash_rule(MatchKind::Regex, r"curl\s+-k\b", "curl --cacert cert.pem");
    let out = apply_rule(&rule, "curl -k https://x").unwrap().value;
    assert!(out.contains("--cacert"));
    assert!(!out.contains("-k"));
}

#[test]
fn block_wins_over_parameter_rules() {
    let hook = hook(vec![
        bash_rule(MatchKind::Command, "grep", "rg"),
        Rule::alias("Bash", "Shell"),
    ]);
    let decision = run(&hook, "grep x");
    assert!(decision.is_block());
    assert!(decision.updated_input().is_none());
}

#[test]
fn untouched_and_non_string_params_are_left_out() {
    let hook = hook(vec![
        bash_rule(MatchKind::Command, "grep", "rg"),
        Rule::correction("Bash", "timeout", MatchKind::Literal, "120000", "60000"),
    ]);
    let decision = run(&hook, "grep x f");
    let updated = decision.updated_input().unwrap();
    assert_eq!(updated.len(), 1);
    assert!(updated.contains_key("command"));
}

#[test]
fn rules_compose_in_store_order() {
    let hook = hook(vec![
        bash_rule(MatchKind::Command, "grep", "rg"),
        bash_rule(MatchKind::Literal, "-rn", "-n").scoped_to("rg"),
    ]);
    let decision = run(&hook, "grep -rn pat .");
    assert_eq!(corrected_command(&decision), "rg -n pat .");
    assert_eq!(
        decision.additional_context().unwrap(),
        r#"use rg instead of grep; replaced "-rn" with "-n""#
    );
}

#[test]
fn corrected_output_is_stable_on_second_pass() {
    let rules = vec![
        bash_rule(MatchKind::Command, "grep", "rg"),
        bash_rule(MatchKind::Flag, "r", "R").scoped_to("scp"),
        bash_rule(MatchKind::Literal, "python", "python3"),
        bash_rule(MatchKind::Recipe, "gt await-signal", "gt mol status"),
    ];
    let hook = hook(rules);

    let first = run(
        &hook,
        "python run.py | grep ok; scp -r a h:/ && gt await-signal --all",
    );
    let once = corrected_command(&first);
    assert_eq!(once, "python3 run.py | rg ok; scp -R a h:/ && gt mol status");
    assert_eq!(run(&hook, &once), Decision::Allow);
}

#[test]
fn quoted_operators_do_not_split_segments() {
    let rule = bash_rule(MatchKind::Command, "grep", "rg");
    let out = apply_rule(&rule, r#"echo "a | grep b" && grep c"#).unwrap().value;
    assert_eq!(out, r#"echo "a | grep b" && rg c"#);
}

use anyhow::Context;
use tool_correction_hooks::{JsonFileStore, MatchKind, Rule, RuleError, RuleStore, StoreError};

fn validate(rule: &Rule) -> anyhow::Result<()> {
    rule.validate().context("Refusing to store invalid rule")?;
    Ok(())
}

#[test]
fn invalid_regex_surfaces_as_rule_error() {
    let rule = Rule::correction("Bash", "command", MatchKind::Regex, "(unclosed", "x");
    let err = validate(&rule).unwrap_err();
    let typed = err.downcast_ref::<RuleError>().expect("RuleError expected");
    match typed {
        RuleError::InvalidRegex { pattern, .. } => assert_eq!(pattern, "(unclosed"),
        _ => panic!("unexpected RuleError: {typed:?}"),
    }
}

#[test]
fn parameter_rule_without_target_is_rejected() {
    let rule = Rule::correction("", "command", MatchKind::Literal, "a", "b");
    let err = validate(&rule).unwrap_err();
    match err.downcast_ref::<RuleError>() {
        Some(RuleError::MissingTarget { kind }) => assert_eq!(*kind, MatchKind::Literal),
        other => panic!("expected MissingTarget, got {other:?}"),
    }

    let alias = Rule::alias("", "Read");
    let err = validate(&alias).unwrap_err();
    assert!(matches!(
        err.downcast_ref::<RuleError>(),
        Some(RuleError::EmptyPattern)
    ));
}

#[test]
fn unknown_match_kind_is_typed() {
    let err = "glob".parse::<MatchKind>().unwrap_err();
    assert!(matches!(err, RuleError::UnknownMatchKind(ref k) if k == "glob"));
}

#[test]
fn corrupt_rules_file_is_a_parse_error() {
    let dir = tempfile::tempdir().expect("tmp");
    let path = dir.path().join("rules.json");
    std::fs::write(&path, "[not json").expect("write");

    let store = JsonFileStore::new(&path);
    let err = store
        .rules_for_tool("Bash")
        .with_context(|| format!("Failed to read {}", path.display()))
        .unwrap_err();
    let typed = err.downcast_ref::<StoreError>().expect("StoreError expected");
    match typed {
        StoreError::Parse { path: p, .. } => assert_eq!(p, &path),
        _ => panic!("unexpected StoreError: {typed:?}"),
    }
}

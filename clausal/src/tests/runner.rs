use crate::{
    ArgumentSchema, CallOptions, ClausalError, EngineConfig, EngineSession, ErrorKind, PrologEngine,
    QueryResult, QueryRunner,
};
use serde_json::json;
use std::path::PathBuf;

fn fixture(name: &str) -> PathBuf {
    PathBuf::from(env!("CARGO_MANIFEST_DIR"))
        .join("tests/fixtures")
        .join(name)
}

fn family_runner() -> QueryRunner {
    let config = EngineConfig::new()
        .with_rules(fixture("family.pl"))
        .with_default_predicate("partner")
        .with_schema(ArgumentSchema::new("partner", ["X", "Y"]).unwrap());
    let session = EngineSession::spawn(PrologEngine::new).unwrap();
    QueryRunner::with_session(config, session).unwrap()
}

#[test]
fn test_mapping_with_nulls_lists_every_partner() {
    let runner = family_runner();
    let result = runner
        .invoke(json!({"X": null, "Y": null}), &CallOptions::default())
        .unwrap();
    let solutions = result.solutions();
    assert_eq!(solutions.len(), 3);
    assert_eq!(serde_json::to_value(&solutions[0]).unwrap(), json!({"X": "john", "Y": "bianca"}));
    assert_eq!(serde_json::to_value(&solutions[1]).unwrap(), json!({"X": "john", "Y": "bianca"}));
    assert_eq!(
        serde_json::to_value(&solutions[2]).unwrap(),
        json!({"X": "peter", "Y": "patricia"})
    );
}

#[test]
fn test_bare_arguments_and_ground_goals() {
    let runner = family_runner();
    let options = CallOptions::default();

    let result = runner.invoke("john, Y", &options).unwrap();
    assert_eq!(
        serde_json::to_value(&result).unwrap(),
        json!([{"Y": "bianca"}, {"Y": "bianca"}])
    );
    assert_eq!(runner.invoke("john, bianca", &options).unwrap(), QueryResult::Bool(true));
    assert_eq!(runner.invoke("john, patricia", &options).unwrap(), QueryResult::Bool(false));
    assert_eq!(runner.invoke("invalid_person, Y", &options).unwrap(), QueryResult::Bool(false));
    assert_eq!(runner.invoke("hello()", &options).unwrap(), QueryResult::Bool(true));
}

#[test]
fn test_mapping_string_variable_behaves_like_null() {
    let runner = family_runner();
    let options = CallOptions::default();
    let with_null = runner.invoke(json!({"X": "john", "Y": null}), &options).unwrap();
    let with_name = runner.invoke(json!({"X": "john", "Y": "Y"}), &options).unwrap();
    assert_eq!(with_null, with_name);
}

#[test]
fn test_validation_errors() {
    let runner = family_runner();
    let options = CallOptions::default();

    let err = runner.invoke("partner(X, Y", &options).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Validation);
    assert_eq!(err.to_string(), "Mismatched parentheses in query");

    let err = runner.invoke(json!(123), &options).unwrap_err();
    assert!(err.to_string().contains("Invalid input type"));

    let err = runner
        .invoke(json!({"invalid_field": "value"}), &options)
        .unwrap_err();
    assert!(err.to_string().contains("Unknown argument"));
}

#[test]
fn test_execution_errors() {
    let runner = family_runner();
    let options = CallOptions::default();

    let err = runner.invoke("partner(X, Y, Z)", &options).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Execution);
    assert_eq!(
        err.to_string(),
        "Prolog execution error: Unknown procedure: partner/3"
    );

    // Empty text runs the default predicate with no arguments
    let err = runner.invoke("", &options).unwrap_err();
    assert!(err.to_string().contains("partner/0"));
}

#[test]
fn test_max_results_and_context() {
    let runner = family_runner();
    let one = runner
        .invoke("partner(X, Y)", &CallOptions::new().with_max_results(1))
        .unwrap();
    let two = runner
        .invoke("partner(X, Y)", &CallOptions::new().with_max_results(2))
        .unwrap();
    assert_eq!(one.solutions().len(), 1);
    assert_eq!(two.solutions().len(), 2);

    let plain = runner.invoke("john, Y", &CallOptions::default()).unwrap();
    let tagged = runner
        .invoke("john, Y", &CallOptions::new().with_context(json!({"run": 7})))
        .unwrap();
    assert_eq!(plain, tagged);
}

#[test]
fn test_load_rules_and_switch_default_predicate() {
    let config = EngineConfig::new()
        .with_rules(fixture("facts_one.pl"))
        .with_default_predicate("fact1");
    let session = EngineSession::spawn(PrologEngine::new).unwrap();
    let runner = QueryRunner::with_session(config, session).unwrap();
    runner.load_rules(fixture("facts_two.pl")).unwrap();

    let options = CallOptions::default();
    let result = runner.invoke("X", &options).unwrap();
    assert_eq!(serde_json::to_value(&result).unwrap(), json!([{"X": "a"}]));

    runner.set_default_predicate(Some("fact2")).unwrap();
    let result = runner.invoke("X", &options).unwrap();
    assert_eq!(serde_json::to_value(&result).unwrap(), json!([{"X": "b"}]));

    assert_eq!(runner.config().rule_sources.len(), 2);
    assert_eq!(runner.session().loaded_sources().unwrap().len(), 2);
    assert!(runner.set_default_predicate(Some("Fact")).is_err());
}

#[test]
fn test_missing_and_broken_rule_files() {
    let session = EngineSession::spawn(PrologEngine::new).unwrap();
    let err = QueryRunner::with_session(
        EngineConfig::new().with_rules(fixture("nonexistent.pl")),
        session.clone(),
    )
    .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Resource);
    assert!(err.to_string().starts_with("Prolog rules file not found"));

    let err = QueryRunner::with_session(
        EngineConfig::new().with_rules(fixture("invalid_syntax.pl")),
        session,
    )
    .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Execution);
    assert!(matches!(err, ClausalError::Consult { .. }));
}

#[test]
fn test_engine_flags_applied_on_build() {
    let config = EngineConfig::new()
        .with_rules(fixture("family.pl"))
        .with_flag("unknown", "fail");
    let session = EngineSession::spawn(PrologEngine::new).unwrap();
    let runner = QueryRunner::with_session(config, session).unwrap();
    let result = runner.invoke("partner(X, Y, Z)", &CallOptions::default()).unwrap();
    assert_eq!(result, QueryResult::Bool(false));
}

#[test]
fn test_describe_mentions_schema_and_sources() {
    let runner = family_runner();
    let text = runner.describe();
    assert!(text.contains("family.pl"));
    assert!(text.contains("partner(X, Y)"));
    assert!(text.contains("true, false"));
}

#[test]
fn test_conflicting_flags_on_a_shared_session() {
    let session = EngineSession::spawn(PrologEngine::new).unwrap();
    let lenient = QueryRunner::with_session(
        EngineConfig::new()
            .with_rules(fixture("family.pl"))
            .with_flag("unknown", "fail"),
        session.clone(),
    )
    .unwrap();

    let err = QueryRunner::with_session(
        EngineConfig::new().with_flag("unknown", "error"),
        session.clone(),
    )
    .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Validation);
    assert!(err.to_string().contains("already set to fail"));

    QueryRunner::with_session(EngineConfig::new().with_flag("unknown", "fail"), session).unwrap();
    let result = lenient
        .invoke("partner(X, Y, Z)", &CallOptions::default())
        .unwrap();
    assert_eq!(result, QueryResult::Bool(false));
}

#[test]
fn test_cyclic_goal_fails_without_stopping_the_engine() {
    let dir = tempfile::tempdir().unwrap();
    let rules = dir.path().join("eq.pl");
    std::fs::write(&rules, "eq(A, A).\n").unwrap();
    let session = EngineSession::spawn(PrologEngine::new).unwrap();
    let runner = QueryRunner::with_session(EngineConfig::new().with_rules(rules), session).unwrap();

    let options = CallOptions::default();
    assert_eq!(
        runner.invoke("eq(X, f(X))", &options).unwrap(),
        QueryResult::Bool(false)
    );
    let result = runner.invoke("eq(X, f(a))", &options).unwrap();
    assert_eq!(serde_json::to_value(&result).unwrap(), json!([{"X": "f(a)"}]));
}

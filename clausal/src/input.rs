use crate::config::EngineConfig;
use crate::error::ClausalError;
use crate::goal::{is_variable_name, is_variable_token, quote_atom, Goal, Term};
use crate::query::parse_query;
use crate::schema::{ArgumentSchema, SchemaRecord};
use crate::ClausalResult;
use serde_json::{Map, Value};

/// Everything a caller may hand to a runner
#[derive(Debug, Clone, PartialEq)]
pub enum QueryInput {
    /// No input; runs the default predicate with no arguments
    Absent,
    /// Query text, either `name(args)` or a bare argument list
    Text(String),
    /// Argument values keyed by schema argument name
    Mapping(Map<String, Value>),
    /// A record built from the configured schema
    Record(SchemaRecord),
    /// Any other JSON value; always rejected
    Unsupported(Value),
}

impl QueryInput {
    fn shape(&self) -> &'static str {
        match self {
            QueryInput::Absent => "absent",
            QueryInput::Text(_) => "text",
            QueryInput::Mapping(_) => "mapping",
            QueryInput::Record(_) => "record",
            QueryInput::Unsupported(value) => json_type(value),
        }
    }
}

fn json_type(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

impl From<&str> for QueryInput {
    fn from(text: &str) -> Self {
        QueryInput::Text(text.to_string())
    }
}

impl From<String> for QueryInput {
    fn from(text: String) -> Self {
        QueryInput::Text(text)
    }
}

impl From<SchemaRecord> for QueryInput {
    fn from(record: SchemaRecord) -> Self {
        QueryInput::Record(record)
    }
}

impl From<Map<String, Value>> for QueryInput {
    fn from(map: Map<String, Value>) -> Self {
        QueryInput::Mapping(map)
    }
}

impl<T: Into<QueryInput>> From<Option<T>> for QueryInput {
    fn from(input: Option<T>) -> Self {
        input.map_or(QueryInput::Absent, Into::into)
    }
}

impl From<Value> for QueryInput {
    fn from(value: Value) -> Self {
        match value {
            Value::Null => QueryInput::Absent,
            Value::String(text) => QueryInput::Text(text),
            Value::Object(map) => QueryInput::Mapping(map),
            other => QueryInput::Unsupported(other),
        }
    }
}

/// Resolve caller input into a goal
pub fn normalize(input: QueryInput, config: &EngineConfig) -> ClausalResult<Goal> {
    let default_predicate = config.default_predicate.as_deref();
    match input {
        QueryInput::Absent => match default_predicate {
            Some(predicate) => Goal::new(predicate, Vec::new()),
            None => Err(ClausalError::validation(
                "Input data cannot be None: No default predicate set",
            )),
        },
        QueryInput::Text(text) => match default_predicate {
            Some(predicate) if text.trim().is_empty() => Goal::new(predicate, Vec::new()),
            _ => parse_query(&text, default_predicate),
        },
        QueryInput::Mapping(map) => {
            let schema = require_schema(config, "mapping")?;
            for key in map.keys() {
                if schema.position(key).is_none() {
                    return Err(schema.unknown_argument(key));
                }
            }
            let values = schema.arg_names().iter().map(|name| map.get(name));
            goal_from_values(schema, values)
        }
        QueryInput::Record(record) => {
            let schema = require_schema(config, "record")?;
            if record.schema() != schema {
                return Err(ClausalError::validation(format!(
                    "Record for '{}' does not conform to the configured schema for '{}'",
                    record.schema().predicate_name(),
                    schema.predicate_name()
                )));
            }
            goal_from_values(schema, record.values().iter().map(Option::as_ref))
        }
        other => Err(ClausalError::validation(format!(
            "Invalid input type: expected text, mapping or record, got {}",
            other.shape()
        ))),
    }
}

fn require_schema<'c>(config: &'c EngineConfig, shape: &str) -> ClausalResult<&'c ArgumentSchema> {
    config.query_schema.as_ref().ok_or_else(|| {
        ClausalError::validation(format!(
            "Cannot resolve {} input: missing schema in configuration",
            shape
        ))
    })
}

fn goal_from_values<'v>(
    schema: &ArgumentSchema,
    values: impl Iterator<Item = Option<&'v Value>>,
) -> ClausalResult<Goal> {
    let args = schema
        .arg_names()
        .iter()
        .zip(values)
        .map(|(name, value)| match value {
            None | Some(Value::Null) => Ok(Term::Free(name.clone())),
            Some(value) => value_token(name, value).map(Term::from_token),
        })
        .collect::<ClausalResult<Vec<_>>>()?;
    Goal::new(schema.predicate_name(), args)
}

/// Render a supplied value as engine term text
fn value_token(name: &str, value: &Value) -> ClausalResult<String> {
    match value {
        // A capitalised string that is not a bare variable name is an atom
        Value::String(s) if is_variable_token(s) && !is_variable_name(s) => Ok(quote_atom(s)),
        Value::String(s) => Ok(s.clone()),
        Value::Number(n) => Ok(n.to_string()),
        Value::Bool(b) => Ok(b.to_string()),
        Value::Array(items) => {
            let items = items
                .iter()
                .map(|item| value_token(name, item))
                .collect::<ClausalResult<Vec<_>>>()?;
            Ok(format!("[{}]", items.join(", ")))
        }
        Value::Null => Ok("_".to_string()),
        Value::Object(_) => Err(ClausalError::validation(format!(
            "Unsupported value for argument '{}': objects cannot be passed to the engine",
            name
        ))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn partner_config() -> EngineConfig {
        EngineConfig::new()
            .with_default_predicate("partner")
            .with_schema(ArgumentSchema::new("partner", ["X", "Y"]).unwrap())
    }

    fn mapping(value: Value) -> QueryInput {
        QueryInput::from(value)
    }

    #[test]
    fn test_absent_uses_default_predicate() {
        let goal = normalize(QueryInput::Absent, &partner_config()).unwrap();
        assert_eq!(goal.predicate(), "partner");
        assert_eq!(goal.arity(), 0);
    }

    #[test]
    fn test_absent_without_default() {
        let err = normalize(QueryInput::Absent, &EngineConfig::new()).unwrap_err();
        assert!(err.to_string().contains("Input data cannot be None"));
        assert!(err.to_string().contains("No default predicate set"));
    }

    #[test]
    fn test_empty_text_with_default_is_absent() {
        let goal = normalize("".into(), &partner_config()).unwrap();
        assert_eq!(goal.to_string(), "partner");
        let goal = normalize("   ".into(), &partner_config()).unwrap();
        assert_eq!(goal.arity(), 0);
    }

    #[test]
    fn test_empty_text_without_default() {
        let err = normalize("".into(), &EngineConfig::new()).unwrap_err();
        assert!(err.to_string().contains("No default predicate set"));
    }

    #[test]
    fn test_mapping_nulls_become_named_variables() {
        let goal = normalize(mapping(json!({"X": null, "Y": null})), &partner_config()).unwrap();
        assert_eq!(goal.to_string(), "partner(X, Y)");
        assert_eq!(goal.free_variables(), vec!["X", "Y"]);
    }

    #[test]
    fn test_mapping_missing_key_is_free() {
        let goal = normalize(mapping(json!({"X": "john"})), &partner_config()).unwrap();
        assert_eq!(goal.args(), &[Term::Bound("john".into()), Term::Free("Y".into())]);
    }

    #[test]
    fn test_mapping_values_rendered() {
        let schema = ArgumentSchema::new("p", ["A", "B", "C"]).unwrap();
        let config = EngineConfig::new().with_schema(schema);
        let goal = normalize(mapping(json!({"A": 3, "B": true, "C": ["x", 1]})), &config).unwrap();
        assert_eq!(goal.to_string(), "p(3, true, [x, 1])");
    }

    #[test]
    fn test_mapping_capitalised_phrase_is_an_atom() {
        let goal = normalize(
            mapping(json!({"X": "John Smith", "Y": "O'Brien"})),
            &partner_config(),
        )
        .unwrap();
        assert_eq!(
            goal.args(),
            &[
                Term::Bound("'John Smith'".into()),
                Term::Bound("'O\\'Brien'".into())
            ]
        );

        let goal = normalize(mapping(json!({"Y": "Partner"})), &partner_config()).unwrap();
        assert_eq!(goal.args()[1], Term::Free("Partner".into()));
    }

    #[test]
    fn test_mapping_without_schema() {
        let err = normalize(mapping(json!({"X": null})), &EngineConfig::new()).unwrap_err();
        assert!(err.to_string().contains("missing schema"));
    }

    #[test]
    fn test_mapping_unknown_key() {
        let err = normalize(mapping(json!({"invalid_field": "value"})), &partner_config())
            .unwrap_err();
        assert!(err.to_string().contains("Unknown argument 'invalid_field'"));
    }

    #[test]
    fn test_record_input() {
        let config = partner_config();
        let record = config
            .query_schema
            .as_ref()
            .unwrap()
            .record([("Y", Some(json!("bianca")))])
            .unwrap();
        let goal = normalize(record.into(), &config).unwrap();
        assert_eq!(goal.to_string(), "partner(X, bianca)");
    }

    #[test]
    fn test_record_from_other_schema() {
        let other = ArgumentSchema::new("parent", ["P", "C"]).unwrap();
        let record = other.record(Vec::<(&str, Option<Value>)>::new()).unwrap();
        let err = normalize(record.into(), &partner_config()).unwrap_err();
        assert!(err.to_string().contains("does not conform"));
    }

    #[test]
    fn test_invalid_input_type() {
        let err = normalize(json!(123).into(), &partner_config()).unwrap_err();
        assert!(err.to_string().contains("Invalid input type"));
        assert!(err.to_string().contains("number"));
    }

    #[test]
    fn test_option_conversion() {
        assert_eq!(QueryInput::from(None::<&str>), QueryInput::Absent);
        assert_eq!(
            QueryInput::from(Some("john, Y")),
            QueryInput::Text("john, Y".into())
        );
    }
}

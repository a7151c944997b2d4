use crate::engine::Solution;
use serde::Serialize;
use std::fmt;

/// Outcome of a query as handed to callers
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum QueryResult {
    /// The goal failed (`false`) or succeeded without bindings (`true`)
    Bool(bool),
    /// Bindings for every answer, in engine order, duplicates kept
    Solutions(Vec<Solution>),
}

impl QueryResult {
    pub fn as_bool(&self) -> Option<bool> {
        match self {
            QueryResult::Bool(b) => Some(*b),
            QueryResult::Solutions(_) => None,
        }
    }

    pub fn solutions(&self) -> &[Solution] {
        match self {
            QueryResult::Solutions(solutions) => solutions,
            QueryResult::Bool(_) => &[],
        }
    }

    /// True unless the goal failed
    pub fn is_success(&self) -> bool {
        !matches!(self, QueryResult::Bool(false))
    }
}

/// Fold engine answers into a caller-facing result
pub fn shape(solutions: Vec<Solution>) -> QueryResult {
    if solutions.is_empty() {
        QueryResult::Bool(false)
    } else if solutions.iter().all(|s| s.is_empty()) {
        QueryResult::Bool(true)
    } else {
        QueryResult::Solutions(solutions)
    }
}

impl fmt::Display for QueryResult {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            QueryResult::Bool(b) => write!(f, "{}", b),
            QueryResult::Solutions(solutions) => {
                for (i, solution) in solutions.iter().enumerate() {
                    if i > 0 {
                        f.write_str(";\n")?;
                    }
                    let bindings: Vec<String> = solution
                        .iter()
                        .map(|(name, value)| match value {
                            serde_json::Value::String(s) => format!("{} = {}", name, s),
                            other => format!("{} = {}", name, other),
                        })
                        .collect();
                    f.write_str(&bindings.join(", "))?;
                }
                Ok(())
            }
        }
    }
}

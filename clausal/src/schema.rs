//! Named argument positions for a predicate.
//!
//! An [`ArgumentSchema`] names each argument of one predicate signature, so that
//! callers can supply structured input (`{"X": null, "Y": "bianca"}`) instead of
//! query text, and so that free arguments come back labelled with those names.

use crate::error::ClausalError;
use crate::goal::is_atom_name;
use crate::ClausalResult;
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Argument names for one predicate signature
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ArgumentSchema {
    predicate_name: String,
    arg_names: Vec<String>,
}

impl ArgumentSchema {
    pub fn new<I, S>(predicate_name: impl Into<String>, arg_names: I) -> ClausalResult<Self>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let predicate_name = predicate_name.into();
        if !is_atom_name(&predicate_name) {
            return Err(ClausalError::validation(format!(
                "Invalid predicate name '{}' in schema",
                predicate_name
            )));
        }

        let mut names: Vec<String> = Vec::new();
        for name in arg_names {
            let name = name.into();
            if name.is_empty() {
                return Err(ClausalError::validation(format!(
                    "Empty argument name in schema for '{}'",
                    predicate_name
                )));
            }
            if names.contains(&name) {
                return Err(ClausalError::validation(format!(
                    "Duplicate argument name '{}' in schema for '{}'",
                    name, predicate_name
                )));
            }
            names.push(name);
        }

        Ok(Self {
            predicate_name,
            arg_names: names,
        })
    }

    pub fn predicate_name(&self) -> &str {
        &self.predicate_name
    }

    pub fn arg_names(&self) -> &[String] {
        &self.arg_names
    }

    pub fn arity(&self) -> usize {
        self.arg_names.len()
    }

    pub fn position(&self, name: &str) -> Option<usize> {
        self.arg_names.iter().position(|n| n == name)
    }

    /// Build a record for this schema. Fields that are not named are left empty
    /// (free); unknown field names are rejected.
    pub fn record<I, S>(&self, fields: I) -> ClausalResult<SchemaRecord>
    where
        I: IntoIterator<Item = (S, Option<Value>)>,
        S: AsRef<str>,
    {
        let mut values = vec![None; self.arg_names.len()];
        for (name, value) in fields {
            let name = name.as_ref();
            let position = self.position(name).ok_or_else(|| self.unknown_argument(name))?;
            values[position] = value.filter(|v| !v.is_null());
        }
        Ok(SchemaRecord {
            schema: self.clone(),
            values,
        })
    }

    pub(crate) fn unknown_argument(&self, name: &str) -> ClausalError {
        ClausalError::validation(format!(
            "Unknown argument '{}' for predicate '{}' (expected one of: {})",
            name,
            self.predicate_name,
            self.arg_names.join(", ")
        ))
    }
}

/// A set of argument values that conforms to an [`ArgumentSchema`]
#[derive(Debug, Clone, PartialEq)]
pub struct SchemaRecord {
    schema: ArgumentSchema,
    values: Vec<Option<Value>>,
}

impl SchemaRecord {
    pub fn schema(&self) -> &ArgumentSchema {
        &self.schema
    }

    /// Field values in schema order; `None` marks a free argument
    pub fn values(&self) -> &[Option<Value>] {
        &self.values
    }

    pub fn get(&self, name: &str) -> Option<&Value> {
        self.schema
            .position(name)
            .and_then(|i| self.values[i].as_ref())
    }
}

use crate::error::ClausalError;
use crate::ClausalResult;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::OnceLock;

fn atom_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| Regex::new(r"^[a-z][A-Za-z0-9_]*$").expect("valid atom pattern"))
}

fn variable_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| Regex::new(r"^[A-Z_][A-Za-z0-9_]*$").expect("valid variable pattern"))
}

/// True when `name` is a plain (unquoted) atom such as `partner` or `has_child`.
pub fn is_atom_name(name: &str) -> bool {
    atom_pattern().is_match(name)
}

/// True when `name` is a whole variable name such as `X` or `_Tail`.
pub fn is_variable_name(name: &str) -> bool {
    variable_pattern().is_match(name)
}

/// Quoted atom syntax for arbitrary text
pub fn quote_atom(text: &str) -> String {
    format!("'{}'", text.replace('\\', "\\\\").replace('\'', "\\'"))
}

/// True when `token` follows the free-variable convention: it starts with an
/// uppercase letter or an underscore.
pub fn is_variable_token(token: &str) -> bool {
    token
        .chars()
        .next()
        .is_some_and(|c| c.is_ascii_uppercase() || c == '_')
}

/// One argument position of a goal
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(tag = "type", content = "value", rename_all = "snake_case")]
pub enum Term {
    /// Raw source text handed to the engine's term reader
    Bound(String),
    /// Argument left open for the engine to fill in
    Free(String),
}

impl Term {
    /// Classify a raw token: variable-looking tokens become free variables,
    /// everything else is passed through as bound text.
    pub fn from_token(token: impl Into<String>) -> Self {
        let token = token.into();
        if is_variable_token(&token) {
            Term::Free(token)
        } else {
            Term::Bound(token)
        }
    }

    pub fn text(&self) -> &str {
        match self {
            Term::Bound(text) | Term::Free(text) => text,
        }
    }
}

impl fmt::Display for Term {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.text())
    }
}

/// A predicate name plus ordered argument terms
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Goal {
    predicate: String,
    args: Vec<Term>,
}

impl Goal {
    pub fn new(predicate: impl Into<String>, args: Vec<Term>) -> ClausalResult<Self> {
        let predicate = predicate.into();
        if !is_atom_name(&predicate) {
            return Err(ClausalError::validation(format!(
                "Invalid predicate name '{}'",
                predicate
            )));
        }
        Ok(Self { predicate, args })
    }

    pub fn predicate(&self) -> &str {
        &self.predicate
    }

    pub fn args(&self) -> &[Term] {
        &self.args
    }

    pub fn arity(&self) -> usize {
        self.args.len()
    }

    /// Names of the free-variable arguments, in argument order, without repeats
    pub fn free_variables(&self) -> Vec<&str> {
        let mut names: Vec<&str> = Vec::new();
        for arg in &self.args {
            if let Term::Free(name) = arg {
                if name != "_" && !names.contains(&name.as_str()) {
                    names.push(name);
                }
            }
        }
        names
    }
}

impl fmt::Display for Goal {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.predicate)?;
        if self.args.is_empty() {
            return Ok(());
        }
        f.write_str("(")?;
        for (i, arg) in self.args.iter().enumerate() {
            if i > 0 {
                f.write_str(", ")?;
            }
            write!(f, "{}", arg)?;
        }
        f.write_str(")")
    }
}

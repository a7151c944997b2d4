//! The boundary between the session and a concrete logic engine.

use crate::goal::Goal;
use indexmap::IndexMap;
use serde_json::Value;
use std::fmt;
use std::path::Path;
use tracing::debug;

/// One answer: free-variable name to bound value, in goal variable order
pub type Solution = IndexMap<String, Value>;

/// Per-query settings handed to the engine when a cursor is opened
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct QueryFlags {
    /// Stop searching after this many answers
    pub max_results: Option<usize>,
}

/// Diagnostic text reported by an engine, kept verbatim
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Diagnostic(pub String);

impl Diagnostic {
    pub fn new(message: impl Into<String>) -> Self {
        Self(message.into())
    }

    pub fn message(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Diagnostic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl std::error::Error for Diagnostic {}

/// A logic engine driven by one session worker.
///
/// Implementations are never called concurrently: the session builds the engine
/// on a dedicated thread and runs one operation at a time. At most one answer
/// stream is alive at any moment and it is dropped before the next operation
/// starts, so dropping [`LogicEngine::Answers`] must release the engine cursor.
pub trait LogicEngine: 'static {
    /// Live search state for one query
    type Answers<'a>: Iterator<Item = Result<Solution, Diagnostic>>
    where
        Self: 'a;

    /// Load the clauses of a rule file
    fn consult(&mut self, path: &Path) -> Result<(), Diagnostic>;

    /// Set an engine-wide flag
    fn set_flag(&mut self, name: &str, value: &str) -> Result<(), Diagnostic>;

    fn open_query<'a>(
        &'a mut self,
        goal: &Goal,
        flags: &QueryFlags,
    ) -> Result<Self::Answers<'a>, Diagnostic>;
}

/// Scoped ownership of an open cursor. The cursor is released when the guard
/// is dropped, whether the search was exhausted, abandoned or failed.
pub struct OpenQuery<'e, E: LogicEngine> {
    answers: E::Answers<'e>,
    remaining: Option<usize>,
    failed: bool,
}

impl<'e, E: LogicEngine> OpenQuery<'e, E> {
    pub fn open(engine: &'e mut E, goal: &Goal, flags: &QueryFlags) -> Result<Self, Diagnostic> {
        let answers = engine.open_query(goal, flags)?;
        debug!(%goal, "Opened query cursor");
        Ok(Self {
            answers,
            remaining: flags.max_results,
            failed: false,
        })
    }
}

impl<E: LogicEngine> Iterator for OpenQuery<'_, E> {
    type Item = Result<Solution, Diagnostic>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.failed || self.remaining == Some(0) {
            return None;
        }
        match self.answers.next()? {
            Ok(solution) => {
                if let Some(remaining) = self.remaining.as_mut() {
                    *remaining -= 1;
                }
                Some(Ok(solution))
            }
            Err(diagnostic) => {
                self.failed = true;
                Some(Err(diagnostic))
            }
        }
    }
}

impl<E: LogicEngine> Drop for OpenQuery<'_, E> {
    fn drop(&mut self) {
        debug!("Closed query cursor");
    }
}

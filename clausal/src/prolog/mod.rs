//! Logic engine backed by an embedded Scryer Prolog machine.
//!
//! Rule files are syntax-checked term by term and then consulted into the
//! `user` module. Goals run through [`Machine::run_query`], one lazy answer at
//! a time; bindings are reported in goal variable order. The occurs check is
//! switched on at startup so no answer can hold a cyclic term.

mod answer;

use crate::engine::{Diagnostic, LogicEngine, QueryFlags, Solution};
use crate::goal::{is_atom_name, quote_atom, Goal};
use answer::{describe, to_json, unbound};
use scryer_prolog::{LeafAnswer, Machine, MachineBuilder, Term};
use std::path::Path;
use tracing::{debug, warn};

/// Bound to the outcome of `call_with_inference_limit/3` when a limit is set
const LIMIT_OUTCOME: &str = "ClausalInferenceOutcome";

const SETUP: &[&str] = &[
    "use_module(library(iso_ext))",
    "set_prolog_flag(occurs_check, true)",
];

/// Embedded Prolog engine.
///
/// Wraps a Scryer Prolog [`Machine`]. The machine is not thread-safe, so the
/// session builds it on its own worker thread through
/// [`EngineSession::spawn`](crate::EngineSession::spawn).
pub struct PrologEngine {
    machine: Machine,
    max_inferences: Option<u64>,
}

impl PrologEngine {
    pub fn new() -> Self {
        let mut engine = Self {
            machine: MachineBuilder::default().build(),
            max_inferences: None,
        };
        for step in SETUP {
            if let Err(diagnostic) = engine.run_once(step) {
                warn!(%step, %diagnostic, "Engine setup step failed");
            }
        }
        engine
    }

    /// Run `query` for its first answer only. `Ok(false)` means it failed.
    fn run_once(&mut self, query: &str) -> Result<bool, Diagnostic> {
        let first = self.machine.run_query(format!("{}.", query)).next();
        match first {
            None | Some(Ok(LeafAnswer::False)) => Ok(false),
            Some(Ok(LeafAnswer::Exception(error))) | Some(Err(error)) => {
                Err(Diagnostic::new(describe(&error)))
            }
            Some(Ok(_)) => Ok(true),
        }
    }
}

impl Default for PrologEngine {
    fn default() -> Self {
        Self::new()
    }
}

impl LogicEngine for PrologEngine {
    type Answers<'a> = Answers<'a>;

    fn consult(&mut self, path: &Path) -> Result<(), Diagnostic> {
        let file = quote_atom(&path.to_string_lossy());
        // Read every term first so a syntax error leaves the database untouched
        let query = format!(
            "open({file}, read, S), \
             catch((repeat, read_term(S, T, []), T == end_of_file, !), E, (close(S), throw(E))), \
             close(S), consult({file})"
        );
        if self.run_once(&query)? {
            debug!(path = %path.display(), "Consulted rule file");
            Ok(())
        } else {
            Err(Diagnostic::new(format!("Cannot consult {}", path.display())))
        }
    }

    fn set_flag(&mut self, name: &str, value: &str) -> Result<(), Diagnostic> {
        match name {
            "max_inferences" => {
                let limit = value.parse::<u64>().ok().filter(|n| *n > 0).ok_or_else(|| {
                    Diagnostic::new(format!(
                        "Domain error: max_inferences expects a positive integer, found {}",
                        value
                    ))
                })?;
                self.max_inferences = Some(limit);
                Ok(())
            }
            "occurs_check" if value == "false" => Err(Diagnostic::new(
                "Domain error: occurs_check cannot be disabled, cyclic answers are not supported",
            )),
            _ if !is_atom_name(name) => Err(Diagnostic::new(format!(
                "Domain error: invalid flag name '{}'",
                name
            ))),
            _ => {
                let value = if is_atom_name(value) || value.parse::<i64>().is_ok() {
                    value.to_string()
                } else {
                    quote_atom(value)
                };
                if self.run_once(&format!("set_prolog_flag({}, {})", name, value))? {
                    Ok(())
                } else {
                    Err(Diagnostic::new(format!("Flag {} was not accepted", name)))
                }
            }
        }
    }

    fn open_query<'a>(
        &'a mut self,
        goal: &Goal,
        _flags: &QueryFlags,
    ) -> Result<Answers<'a>, Diagnostic> {
        let query = match self.max_inferences {
            Some(limit) => format!(
                "call_with_inference_limit({}, {}, {}).",
                goal, limit, LIMIT_OUTCOME
            ),
            None => format!("{}.", goal),
        };
        let variables = goal
            .free_variables()
            .into_iter()
            .map(str::to_string)
            .collect();
        Ok(Answers {
            inner: Box::new(self.machine.run_query(query)),
            variables,
            limited: self.max_inferences.is_some(),
            done: false,
        })
    }
}

/// Lazy answers for one goal. Dropping it releases the engine query.
pub struct Answers<'a> {
    inner: Box<dyn Iterator<Item = Result<LeafAnswer, Term>> + 'a>,
    variables: Vec<String>,
    limited: bool,
    done: bool,
}

impl Answers<'_> {
    fn solution<'t>(&self, lookup: impl Fn(&str) -> Option<&'t Term>) -> Solution {
        self.variables
            .iter()
            .enumerate()
            .map(|(position, name)| {
                let value = match lookup(name) {
                    Some(term) => to_json(term),
                    None => unbound(&format!("G{}", position)).into(),
                };
                (name.clone(), value)
            })
            .collect()
    }

    fn fail(&mut self, error: &Term) -> Option<Result<Solution, Diagnostic>> {
        self.done = true;
        Some(Err(Diagnostic::new(describe(error))))
    }
}

impl Iterator for Answers<'_> {
    type Item = Result<Solution, Diagnostic>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.done {
            return None;
        }
        match self.inner.next() {
            None | Some(Ok(LeafAnswer::False)) => {
                self.done = true;
                None
            }
            Some(Err(error)) | Some(Ok(LeafAnswer::Exception(error))) => self.fail(&error),
            Some(Ok(LeafAnswer::True)) => Some(Ok(self.solution(|_| None))),
            Some(Ok(LeafAnswer::LeafAnswer { bindings, .. })) => {
                let exceeded = self.limited
                    && matches!(
                        bindings.get(LIMIT_OUTCOME),
                        Some(Term::Atom(outcome)) if outcome == "inference_limit_exceeded"
                    );
                if exceeded {
                    self.done = true;
                    return Some(Err(Diagnostic::new("Inference limit exceeded")));
                }
                Some(Ok(self.solution(|name| bindings.get(name))))
            }
        }
    }
}

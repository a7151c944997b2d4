//! # Clausal
//!
//! **Typed queries against a logic engine**
//!
//! Clausal runs queries against Prolog-style facts and rules. Callers hand in
//! query text, a mapping of named arguments or a schema record; the runner
//! turns that into a goal, solves it on a single serialized engine and returns
//! `true`, `false` or the variable bindings of every answer.
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use clausal::{ArgumentSchema, CallOptions, ClausalResult, EngineConfig, QueryRunner};
//!
//! fn main() -> ClausalResult<()> {
//!     let config = EngineConfig::new()
//!         .with_rules("family.pl")
//!         .with_default_predicate("partner")
//!         .with_schema(ArgumentSchema::new("partner", ["X", "Y"])?);
//!     let runner = QueryRunner::new(config)?;
//!
//!     // partner(john, Y)
//!     let result = runner.invoke("john, Y", &CallOptions::default())?;
//!     println!("{}", result);
//!
//!     Ok(())
//! }
//! ```
//!
//! ## Core Concepts
//!
//! ### Goals
//! A goal is a predicate name plus arguments. Arguments starting with an
//! uppercase letter or `_` are free variables; the rest are passed to the
//! engine as written.
//!
//! ### Sessions
//! An [`EngineSession`] owns the engine on a worker thread. Loads and queries
//! from any number of runners are queued and run one at a time.
//!
//! ### Results
//! A goal with no answers is `false`, a goal whose answers bind nothing is
//! `true`, anything else is the list of bindings in engine order.

pub mod config;
pub mod engine;
pub mod error;
pub mod goal;
pub mod input;
pub mod prolog;
pub mod query;
pub mod runner;
pub mod schema;
pub mod session;
pub mod shaper;

pub use config::EngineConfig;
pub use engine::{Diagnostic, LogicEngine, OpenQuery, QueryFlags, Solution};
pub use error::{ClausalError, ErrorKind};
pub use goal::{Goal, Term};
pub use input::QueryInput;
pub use prolog::PrologEngine;
pub use query::parse_query;
pub use runner::{AsCompleted, AsCompletedAsync, CallOptions, QueryRunner, ResultStream};
pub use schema::{ArgumentSchema, SchemaRecord};
pub use session::{EngineSession, Solutions};
pub use shaper::{shape, QueryResult};

/// Result type for Clausal operations
pub type ClausalResult<T> = Result<T, ClausalError>;

#[cfg(test)]
mod tests;

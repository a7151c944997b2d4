//! The call orchestrator.
//!
//! A [`QueryRunner`] turns caller input into goals, queues them on an
//! [`EngineSession`] and shapes the answers. Every operation comes in a
//! blocking form and an `_async` form. The blocking forms must not be used from
//! inside an async runtime.

use crate::config::EngineConfig;
use crate::engine::{QueryFlags, Solution};
use crate::error::ClausalError;
use crate::goal::{is_atom_name, Goal};
use crate::input::{self, QueryInput};
use crate::session::{EngineSession, Solutions};
use crate::shaper::{shape, QueryResult};
use crate::ClausalResult;
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::VecDeque;
use std::path::Path;
use std::sync::Arc;
use tokio::task::JoinSet;
use tracing::debug;

/// Per-call options
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CallOptions {
    /// Stop after this many answers
    pub max_results: Option<usize>,
    /// In batches, keep going past failures and return them in place
    pub return_exceptions: bool,
    /// Opaque caller token, carried along and never interpreted
    pub context: Option<Value>,
}

impl CallOptions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_max_results(mut self, max_results: usize) -> Self {
        self.max_results = Some(max_results);
        self
    }

    pub fn with_return_exceptions(mut self, return_exceptions: bool) -> Self {
        self.return_exceptions = return_exceptions;
        self
    }

    pub fn with_context(mut self, context: Value) -> Self {
        self.context = Some(context);
        self
    }

    fn flags(&self) -> QueryFlags {
        QueryFlags {
            max_results: self.max_results,
        }
    }
}

/// Runs queries against rule files loaded into an engine session
#[derive(Debug, Clone)]
pub struct QueryRunner {
    session: EngineSession,
    config: Arc<RwLock<EngineConfig>>,
}

impl QueryRunner {
    /// Build a runner on the process-wide session, consulting the configured
    /// rule sources and applying engine flags.
    ///
    /// Runners built this way share one engine, so its loaded rules and flags
    /// are shared too. A configured flag that another runner already set to a
    /// different value is rejected; use [`QueryRunner::with_session`] with a
    /// private [`EngineSession`] to run with other flags.
    pub fn new(config: EngineConfig) -> ClausalResult<Self> {
        Self::with_session(config, EngineSession::shared()?)
    }

    pub fn with_session(config: EngineConfig, session: EngineSession) -> ClausalResult<Self> {
        for (name, value) in &config.engine_flags {
            session.apply_flag(name, value)?;
        }
        for path in &config.rule_sources {
            session.load(path)?;
        }
        Ok(Self::assemble(config, session))
    }

    pub async fn new_async(config: EngineConfig) -> ClausalResult<Self> {
        Self::with_session_async(config, EngineSession::shared()?).await
    }

    pub async fn with_session_async(
        config: EngineConfig,
        session: EngineSession,
    ) -> ClausalResult<Self> {
        for (name, value) in &config.engine_flags {
            session.apply_flag_async(name, value).await?;
        }
        for path in &config.rule_sources {
            session.load_async(path).await?;
        }
        Ok(Self::assemble(config, session))
    }

    fn assemble(config: EngineConfig, session: EngineSession) -> Self {
        debug!(
            rules = config.rule_sources.len(),
            default_predicate = ?config.default_predicate,
            "Query runner ready"
        );
        Self {
            session,
            config: Arc::new(RwLock::new(config)),
        }
    }

    pub fn session(&self) -> &EngineSession {
        &self.session
    }

    /// Snapshot of the current configuration
    pub fn config(&self) -> EngineConfig {
        self.config.read().clone()
    }

    /// Consult another rule file
    pub fn load_rules(&self, path: impl AsRef<Path>) -> ClausalResult<()> {
        let path = path.as_ref();
        self.session.load(path)?;
        self.remember_source(path);
        Ok(())
    }

    pub async fn load_rules_async(&self, path: impl AsRef<Path>) -> ClausalResult<()> {
        let path = path.as_ref();
        self.session.load_async(path).await?;
        self.remember_source(path);
        Ok(())
    }

    fn remember_source(&self, path: &Path) {
        let mut config = self.config.write();
        if !config.rule_sources.iter().any(|p| p == path) {
            config.rule_sources.push(path.to_path_buf());
        }
    }

    /// Replace (or clear) the predicate used for absent input and bare argument lists
    pub fn set_default_predicate(&self, predicate: Option<&str>) -> ClausalResult<()> {
        if let Some(name) = predicate {
            if !is_atom_name(name) {
                return Err(ClausalError::validation(format!(
                    "Invalid predicate name '{}'",
                    name
                )));
            }
        }
        self.config.write().default_predicate = predicate.map(str::to_string);
        Ok(())
    }

    /// Resolve input into a goal without running it
    pub fn normalize(&self, input: impl Into<QueryInput>) -> ClausalResult<Goal> {
        let goal = input::normalize(input.into(), &self.config.read())?;
        debug!(%goal, "Normalized input");
        Ok(goal)
    }

    fn submit(&self, input: impl Into<QueryInput>, options: &CallOptions) -> ClausalResult<Solutions> {
        let goal = self.normalize(input)?;
        if let Some(context) = &options.context {
            debug!(%goal, ?context, "Queueing goal");
        } else {
            debug!(%goal, "Queueing goal");
        }
        self.session.solve(goal, options.flags())
    }

    /// Run one query and shape every answer
    pub fn invoke(&self, input: impl Into<QueryInput>, options: &CallOptions) -> ClausalResult<QueryResult> {
        let solutions = self.submit(input, options)?;
        let answers = solutions.collect::<ClausalResult<Vec<Solution>>>()?;
        debug!(answers = answers.len(), "Shaping result");
        Ok(shape(answers))
    }

    pub async fn invoke_async(
        &self,
        input: impl Into<QueryInput>,
        options: &CallOptions,
    ) -> ClausalResult<QueryResult> {
        let solutions = self.submit(input, options)?;
        let answers = solutions.collect_async().await?;
        debug!(answers = answers.len(), "Shaping result");
        Ok(shape(answers))
    }

    /// Run one query and hand back answers as they are found. Input errors are
    /// returned immediately; engine errors arrive as stream items.
    pub fn stream(&self, input: impl Into<QueryInput>, options: &CallOptions) -> ClausalResult<ResultStream> {
        Ok(ResultStream::new(self.submit(input, options)?))
    }

    pub async fn stream_async(
        &self,
        input: impl Into<QueryInput>,
        options: &CallOptions,
    ) -> ClausalResult<ResultStream> {
        self.stream(input, options)
    }

    fn normalize_all<I, T>(&self, inputs: I) -> Vec<ClausalResult<Goal>>
    where
        I: IntoIterator<Item = T>,
        T: Into<QueryInput>,
    {
        let config = self.config.read();
        inputs
            .into_iter()
            .map(|input| input::normalize(input.into(), &config))
            .collect()
    }

    /// Queue every normalized goal in input order. Without `return_exceptions`
    /// a normalization failure aborts before anything is queued.
    fn submit_all<I, T>(
        &self,
        inputs: I,
        options: &CallOptions,
    ) -> ClausalResult<Vec<ClausalResult<Solutions>>>
    where
        I: IntoIterator<Item = T>,
        T: Into<QueryInput>,
    {
        let goals = self.normalize_all(inputs);
        if !options.return_exceptions {
            if let Some((index, Err(e))) = goals.iter().enumerate().find(|(_, g)| g.is_err()) {
                return Err(ClausalError::batch(index, e.clone()));
            }
        }
        debug!(inputs = goals.len(), "Queueing batch");
        Ok(goals
            .into_iter()
            .map(|goal| goal.and_then(|g| self.session.solve(g, options.flags())))
            .collect())
    }

    /// Run several queries. Results line up with inputs. Without
    /// `return_exceptions` the first failure aborts the call.
    pub fn batch<I, T>(&self, inputs: I, options: &CallOptions) -> ClausalResult<Vec<ClausalResult<QueryResult>>>
    where
        I: IntoIterator<Item = T>,
        T: Into<QueryInput>,
    {
        let pending = self.submit_all(inputs, options)?;
        let mut results = Vec::with_capacity(pending.len());
        for (index, solutions) in pending.into_iter().enumerate() {
            let result = solutions.and_then(|s| s.collect::<ClausalResult<Vec<_>>>().map(shape));
            match result {
                Err(e) if !options.return_exceptions => return Err(ClausalError::batch(index, e)),
                result => results.push(result),
            }
        }
        Ok(results)
    }

    pub async fn batch_async<I, T>(
        &self,
        inputs: I,
        options: &CallOptions,
    ) -> ClausalResult<Vec<ClausalResult<QueryResult>>>
    where
        I: IntoIterator<Item = T>,
        T: Into<QueryInput>,
    {
        let pending = self.submit_all(inputs, options)?;
        let mut results = Vec::with_capacity(pending.len());
        for (index, solutions) in pending.into_iter().enumerate() {
            let result = match solutions {
                Ok(s) => s.collect_async().await.map(shape),
                Err(e) => Err(e),
            };
            match result {
                Err(e) if !options.return_exceptions => return Err(ClausalError::batch(index, e)),
                result => results.push(result),
            }
        }
        Ok(results)
    }

    /// Run several queries and yield `(index, result)` pairs as each finishes.
    /// Failures are always returned in place.
    pub fn batch_as_completed<I, T>(&self, inputs: I, options: &CallOptions) -> AsCompleted
    where
        I: IntoIterator<Item = T>,
        T: Into<QueryInput>,
    {
        let goals = self.normalize_all(inputs);
        let mut ready = VecDeque::new();
        let mut pending = VecDeque::new();
        for (index, goal) in goals.into_iter().enumerate() {
            match goal.and_then(|g| self.session.solve(g, options.flags())) {
                Ok(solutions) => pending.push_back((index, solutions)),
                Err(e) => ready.push_back((index, Err(e))),
            }
        }
        AsCompleted { ready, pending }
    }

    pub async fn batch_as_completed_async<I, T>(&self, inputs: I, options: &CallOptions) -> AsCompletedAsync
    where
        I: IntoIterator<Item = T>,
        T: Into<QueryInput>,
    {
        let goals = self.normalize_all(inputs);
        let mut tasks = JoinSet::new();
        for (index, goal) in goals.into_iter().enumerate() {
            match goal.and_then(|g| self.session.solve(g, options.flags())) {
                Ok(solutions) => {
                    tasks.spawn(async move { (index, solutions.collect_async().await.map(shape)) });
                }
                Err(e) => {
                    tasks.spawn(async move { (index, Err(e)) });
                }
            }
        }
        AsCompletedAsync { tasks }
    }

    /// One-paragraph description of what this runner answers
    pub fn describe(&self) -> String {
        let config = self.config.read();
        let mut text = String::from("Answers logic queries");
        if config.rule_sources.is_empty() {
            text.push_str(" against an empty rule base");
        } else {
            let sources: Vec<String> = config
                .rule_sources
                .iter()
                .map(|p| p.display().to_string())
                .collect();
            text.push_str(&format!(" against the rules in {}", sources.join(", ")));
        }
        text.push('.');
        match (&config.query_schema, &config.default_predicate) {
            (Some(schema), _) => text.push_str(&format!(
                " Input is a query such as {}({}) or a mapping of {} to values; \
                 missing or null values are returned as bindings.",
                schema.predicate_name(),
                schema.arg_names().join(", "),
                schema.arg_names().join(", ")
            )),
            (None, Some(predicate)) => text.push_str(&format!(
                " Input is a query or a comma-separated argument list for {}.",
                predicate
            )),
            (None, None) => text.push_str(" Input is a query such as name(arg, Var)."),
        }
        text.push_str(
            " Arguments starting with an uppercase letter or underscore are variables. \
             The result is true, false or a list of variable bindings.",
        );
        text
    }
}

/// Answers of one streamed query.
///
/// Each engine answer arrives as a one-element [`QueryResult::Solutions`]. A
/// goal whose answers carry no bindings yields a single `Bool(true)`; a goal
/// with no answers yields a single `Bool(false)`. Iterating blocks; inside a
/// runtime use [`ResultStream::next_async`]. Dropping the stream releases the
/// engine cursor. Another call on the same session from the thread holding an
/// undrained stream never completes.
#[derive(Debug)]
pub struct ResultStream {
    answers: Option<Solutions>,
    emitted: usize,
}

impl ResultStream {
    fn new(answers: Solutions) -> Self {
        Self {
            answers: Some(answers),
            emitted: 0,
        }
    }

    pub async fn next_async(&mut self) -> Option<ClausalResult<QueryResult>> {
        let answer = self.answers.as_mut()?.next_async().await;
        self.step(answer)
    }

    fn step(&mut self, answer: Option<ClausalResult<Solution>>) -> Option<ClausalResult<QueryResult>> {
        match answer {
            Some(Ok(solution)) if solution.is_empty() => {
                self.answers = None;
                Some(Ok(QueryResult::Bool(true)))
            }
            Some(Ok(solution)) => {
                self.emitted += 1;
                Some(Ok(QueryResult::Solutions(vec![solution])))
            }
            Some(Err(e)) => {
                self.answers = None;
                Some(Err(e))
            }
            None => {
                self.answers = None;
                if self.emitted == 0 {
                    Some(Ok(QueryResult::Bool(false)))
                } else {
                    None
                }
            }
        }
    }
}

impl Iterator for ResultStream {
    type Item = ClausalResult<QueryResult>;

    fn next(&mut self) -> Option<Self::Item> {
        let answer = self.answers.as_mut()?.next();
        self.step(answer)
    }
}

/// Blocking completion-order batch results
#[derive(Debug)]
pub struct AsCompleted {
    ready: VecDeque<(usize, ClausalResult<QueryResult>)>,
    pending: VecDeque<(usize, Solutions)>,
}

impl Iterator for AsCompleted {
    type Item = (usize, ClausalResult<QueryResult>);

    fn next(&mut self) -> Option<Self::Item> {
        if let Some(done) = self.ready.pop_front() {
            return Some(done);
        }
        let (index, solutions) = self.pending.pop_front()?;
        let result = solutions.collect::<ClausalResult<Vec<_>>>().map(shape);
        Some((index, result))
    }
}

/// Async completion-order batch results
#[derive(Debug)]
pub struct AsCompletedAsync {
    tasks: JoinSet<(usize, ClausalResult<QueryResult>)>,
}

impl AsCompletedAsync {
    pub async fn next(&mut self) -> Option<(usize, ClausalResult<QueryResult>)> {
        loop {
            match self.tasks.join_next().await? {
                Ok(done) => return Some(done),
                Err(e) if e.is_panic() => std::panic::resume_unwind(e.into_panic()),
                Err(_) => continue,
            }
        }
    }

    /// Number of results not yet yielded
    pub fn len(&self) -> usize {
        self.tasks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tasks.is_empty()
    }
}

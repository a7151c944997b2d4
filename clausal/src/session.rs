//! Serialized access to a logic engine.
//!
//! An [`EngineSession`] is a cheap, cloneable handle to a worker thread that
//! owns the engine. Every request goes through one FIFO queue, so loads, flag
//! changes and queries run strictly one after another and a cursor is always
//! closed before the next request is taken.
//!
//! Blocking methods must not be called from inside an async runtime; use the
//! `_async` variants there. A caller that keeps a [`Solutions`] stream
//! undrained while issuing another request from the same thread waits forever,
//! since the worker is still serving the first query.

use crate::engine::{LogicEngine, OpenQuery, QueryFlags, Solution};
use crate::error::ClausalError;
use crate::goal::Goal;
use crate::prolog::PrologEngine;
use crate::ClausalResult;
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::OnceLock;
use std::thread;
use tokio::sync::{mpsc, oneshot};
use tracing::{debug, info, warn};

enum Request {
    Consult {
        path: PathBuf,
        reply: oneshot::Sender<ClausalResult<bool>>,
    },
    SetFlag {
        name: String,
        value: String,
        /// Refuse to change a flag that already holds another value
        keep_existing: bool,
        reply: oneshot::Sender<ClausalResult<()>>,
    },
    Solve {
        goal: Goal,
        flags: QueryFlags,
        answers: mpsc::Sender<ClausalResult<Solution>>,
    },
    LoadedSources {
        reply: oneshot::Sender<Vec<PathBuf>>,
    },
}

/// Handle to the engine worker
#[derive(Debug, Clone)]
pub struct EngineSession {
    requests: mpsc::UnboundedSender<Request>,
}

impl std::fmt::Debug for Request {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Request::Consult { path, .. } => write!(f, "Consult({})", path.display()),
            Request::SetFlag { name, value, .. } => write!(f, "SetFlag({}={})", name, value),
            Request::Solve { goal, .. } => write!(f, "Solve({})", goal),
            Request::LoadedSources { .. } => f.write_str("LoadedSources"),
        }
    }
}

impl EngineSession {
    /// Start a worker thread, build the engine on it with `build` and return a
    /// handle to it. The worker exits once every handle has been dropped.
    pub fn spawn<E, F>(build: F) -> ClausalResult<Self>
    where
        E: LogicEngine,
        F: FnOnce() -> E + Send + 'static,
    {
        let (requests, receiver) = mpsc::unbounded_channel();
        thread::Builder::new()
            .name("clausal-engine".to_string())
            .spawn(move || Worker::new(build()).run(receiver))
            .map_err(|e| ClausalError::execution(format!("Cannot start engine worker: {}", e)))?;
        debug!("Engine session started");
        Ok(Self { requests })
    }

    /// The process-wide session backed by a [`PrologEngine`].
    ///
    /// Every runner built with [`QueryRunner::new`](crate::QueryRunner::new)
    /// shares it, along with its loaded rules and engine flags.
    pub fn shared() -> ClausalResult<Self> {
        static SHARED: OnceLock<EngineSession> = OnceLock::new();
        if let Some(session) = SHARED.get() {
            return Ok(session.clone());
        }
        let session = Self::spawn(PrologEngine::new)?;
        Ok(SHARED.get_or_init(|| session).clone())
    }

    fn submit(&self, request: Request) -> ClausalResult<()> {
        debug!(?request, "Queueing engine request");
        self.requests
            .send(request)
            .map_err(|_| ClausalError::SessionClosed)
    }

    fn enqueue_consult(&self, path: &Path) -> ClausalResult<oneshot::Receiver<ClausalResult<bool>>> {
        if !path.exists() {
            return Err(ClausalError::RulesNotFound {
                path: path.to_path_buf(),
            });
        }
        let (reply, receiver) = oneshot::channel();
        self.submit(Request::Consult {
            path: path.to_path_buf(),
            reply,
        })?;
        Ok(receiver)
    }

    /// Consult a rule file. Returns `false` when the file was already loaded.
    pub fn load(&self, path: &Path) -> ClausalResult<bool> {
        let receiver = self.enqueue_consult(path)?;
        receiver
            .blocking_recv()
            .map_err(|_| ClausalError::SessionClosed)?
    }

    pub async fn load_async(&self, path: &Path) -> ClausalResult<bool> {
        let receiver = self.enqueue_consult(path)?;
        receiver.await.map_err(|_| ClausalError::SessionClosed)?
    }

    fn enqueue_flag(
        &self,
        name: &str,
        value: &str,
        keep_existing: bool,
    ) -> ClausalResult<oneshot::Receiver<ClausalResult<()>>> {
        let (reply, receiver) = oneshot::channel();
        self.submit(Request::SetFlag {
            name: name.to_string(),
            value: value.to_string(),
            keep_existing,
            reply,
        })?;
        Ok(receiver)
    }

    /// Set an engine flag for everyone using this session, replacing any
    /// earlier value
    pub fn set_flag(&self, name: &str, value: &str) -> ClausalResult<()> {
        self.enqueue_flag(name, value, false)?
            .blocking_recv()
            .map_err(|_| ClausalError::SessionClosed)?
    }

    pub async fn set_flag_async(&self, name: &str, value: &str) -> ClausalResult<()> {
        self.enqueue_flag(name, value, false)?
            .await
            .map_err(|_| ClausalError::SessionClosed)?
    }

    /// Like [`EngineSession::set_flag`], but fails when the flag already holds
    /// a different value
    pub fn apply_flag(&self, name: &str, value: &str) -> ClausalResult<()> {
        self.enqueue_flag(name, value, true)?
            .blocking_recv()
            .map_err(|_| ClausalError::SessionClosed)?
    }

    pub async fn apply_flag_async(&self, name: &str, value: &str) -> ClausalResult<()> {
        self.enqueue_flag(name, value, true)?
            .await
            .map_err(|_| ClausalError::SessionClosed)?
    }

    /// Queue `goal` and return its answer stream. Nothing runs until earlier
    /// requests are done; dropping the stream abandons the query.
    pub fn solve(&self, goal: Goal, flags: QueryFlags) -> ClausalResult<Solutions> {
        let (answers, receiver) = mpsc::channel(1);
        self.submit(Request::Solve {
            goal,
            flags,
            answers,
        })?;
        Ok(Solutions { answers: receiver })
    }

    /// Canonical paths of every consulted rule file, in load order
    pub fn loaded_sources(&self) -> ClausalResult<Vec<PathBuf>> {
        let (reply, receiver) = oneshot::channel();
        self.submit(Request::LoadedSources { reply })?;
        receiver.blocking_recv().map_err(|_| ClausalError::SessionClosed)
    }

    pub async fn loaded_sources_async(&self) -> ClausalResult<Vec<PathBuf>> {
        let (reply, receiver) = oneshot::channel();
        self.submit(Request::LoadedSources { reply })?;
        receiver.await.map_err(|_| ClausalError::SessionClosed)
    }
}

/// Answers for one queued goal.
///
/// Iterating blocks the current thread; inside a runtime use [`Solutions::next_async`].
#[derive(Debug)]
pub struct Solutions {
    answers: mpsc::Receiver<ClausalResult<Solution>>,
}

impl Solutions {
    pub async fn next_async(&mut self) -> Option<ClausalResult<Solution>> {
        self.answers.recv().await
    }

    /// Drain every answer, stopping at the first error
    pub async fn collect_async(mut self) -> ClausalResult<Vec<Solution>> {
        let mut solutions = Vec::new();
        while let Some(answer) = self.answers.recv().await {
            solutions.push(answer?);
        }
        Ok(solutions)
    }
}

impl Iterator for Solutions {
    type Item = ClausalResult<Solution>;

    fn next(&mut self) -> Option<Self::Item> {
        self.answers.blocking_recv()
    }
}

struct Worker<E: LogicEngine> {
    engine: E,
    loaded: Vec<PathBuf>,
    flags: BTreeMap<String, String>,
}

impl<E: LogicEngine> Worker<E> {
    fn new(engine: E) -> Self {
        Self {
            engine,
            loaded: Vec::new(),
            flags: BTreeMap::new(),
        }
    }

    fn run(mut self, mut requests: mpsc::UnboundedReceiver<Request>) {
        while let Some(request) = requests.blocking_recv() {
            match request {
                Request::Consult { path, reply } => {
                    let _ = reply.send(self.consult(path));
                }
                Request::SetFlag {
                    name,
                    value,
                    keep_existing,
                    reply,
                } => {
                    let _ = reply.send(self.set_flag(name, value, keep_existing));
                }
                Request::Solve {
                    goal,
                    flags,
                    answers,
                } => self.solve(&goal, &flags, &answers),
                Request::LoadedSources { reply } => {
                    let _ = reply.send(self.loaded.clone());
                }
            }
        }
        debug!("Engine session closed");
    }

    fn set_flag(&mut self, name: String, value: String, keep_existing: bool) -> ClausalResult<()> {
        match self.flags.get(&name) {
            Some(current) if *current == value => return Ok(()),
            Some(current) if keep_existing => {
                return Err(ClausalError::Config(format!(
                    "Engine flag {} is already set to {} on this session, cannot set it to {}",
                    name, current, value
                )));
            }
            Some(current) => warn!(%name, %current, %value, "Replacing engine flag"),
            None => {}
        }
        self.engine.set_flag(&name, &value).map_err(|d| {
            ClausalError::Config(format!("Invalid engine flag {}={}: {}", name, value, d))
        })?;
        debug!(%name, %value, "Engine flag set");
        self.flags.insert(name, value);
        Ok(())
    }

    fn consult(&mut self, path: PathBuf) -> ClausalResult<bool> {
        let canonical = match path.canonicalize() {
            Ok(canonical) => canonical,
            Err(_) => return Err(ClausalError::RulesNotFound { path }),
        };
        if self.loaded.contains(&canonical) {
            debug!(path = %canonical.display(), "Rule file already loaded");
            return Ok(false);
        }

        self.engine
            .consult(&canonical)
            .map_err(|d| ClausalError::Consult {
                path: path.clone(),
                diagnostic: d.0,
            })?;

        info!(path = %canonical.display(), "Loaded rule file");
        self.loaded.push(canonical);
        Ok(true)
    }

    fn solve(
        &mut self,
        goal: &Goal,
        flags: &QueryFlags,
        answers: &mpsc::Sender<ClausalResult<Solution>>,
    ) {
        if answers.is_closed() {
            warn!(%goal, "Query abandoned before it started");
            return;
        }

        let mut query = match OpenQuery::open(&mut self.engine, goal, flags) {
            Ok(query) => query,
            Err(diagnostic) => {
                let _ = answers.blocking_send(Err(ClausalError::execution(diagnostic.0)));
                return;
            }
        };

        let mut produced = 0usize;
        loop {
            if answers.is_closed() {
                warn!(%goal, produced, "Query abandoned, closing cursor");
                break;
            }
            let Some(answer) = query.next() else {
                break;
            };
            let answer = answer.map_err(|d| ClausalError::execution(d.0));
            if answers.blocking_send(answer).is_err() {
                break;
            }
            produced += 1;
        }
        debug!(%goal, produced, "Query finished");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::query::parse_query;
    use std::io::Write;

    fn rules(text: &str) -> tempfile::NamedTempFile {
        let mut file = tempfile::Builder::new().suffix(".pl").tempfile().unwrap();
        file.write_all(text.as_bytes()).unwrap();
        file
    }

    #[test]
    fn test_load_and_solve() {
        let session = EngineSession::spawn(PrologEngine::new).unwrap();
        let file = rules("color(red).\ncolor(green).\n");
        assert!(session.load(file.path()).unwrap());

        let goal = parse_query("color(X)", None).unwrap();
        let answers: Vec<_> = session
            .solve(goal, QueryFlags::default())
            .unwrap()
            .collect::<ClausalResult<_>>()
            .unwrap();
        assert_eq!(answers.len(), 2);
        assert_eq!(answers[1]["X"], "green");
    }

    #[test]
    fn test_reload_is_skipped() {
        let session = EngineSession::spawn(PrologEngine::new).unwrap();
        let file = rules("color(red).\n");
        assert!(session.load(file.path()).unwrap());
        assert!(!session.load(file.path()).unwrap());
        assert_eq!(session.loaded_sources().unwrap().len(), 1);

        let goal = parse_query("color(X)", None).unwrap();
        let count = session.solve(goal, QueryFlags::default()).unwrap().count();
        assert_eq!(count, 1);
    }

    #[test]
    fn test_missing_file() {
        let session = EngineSession::spawn(PrologEngine::new).unwrap();
        let err = session.load(Path::new("/no/such/rules.pl")).unwrap_err();
        assert!(matches!(err, ClausalError::RulesNotFound { .. }));
        assert!(session.loaded_sources().unwrap().is_empty());
    }

    #[test]
    fn test_max_results_stops_search() {
        let session = EngineSession::spawn(PrologEngine::new).unwrap();
        let file = rules("n(1).\nn(2).\nn(3).\n");
        session.load(file.path()).unwrap();
        let goal = parse_query("n(X)", None).unwrap();
        let flags = QueryFlags {
            max_results: Some(2),
        };
        assert_eq!(session.solve(goal, flags).unwrap().count(), 2);
    }

    #[test]
    fn test_abandoned_stream_releases_worker() {
        let session = EngineSession::spawn(PrologEngine::new).unwrap();
        let file = rules("n(1).\nn(2).\nn(3).\n");
        session.load(file.path()).unwrap();

        let goal = parse_query("n(X)", None).unwrap();
        let mut first = session.solve(goal.clone(), QueryFlags::default()).unwrap();
        assert!(first.next().is_some());
        drop(first);

        assert_eq!(session.solve(goal, QueryFlags::default()).unwrap().count(), 3);
    }

    #[test]
    fn test_bad_flag_value() {
        let session = EngineSession::spawn(PrologEngine::new).unwrap();
        let err = session.set_flag("unknown", "maybe").unwrap_err();
        assert!(err.to_string().contains("Invalid engine flag unknown=maybe"));
        session.set_flag("unknown", "fail").unwrap();
    }

    #[test]
    fn test_apply_flag_keeps_existing_value() {
        let session = EngineSession::spawn(PrologEngine::new).unwrap();
        session.apply_flag("unknown", "fail").unwrap();
        session.apply_flag("unknown", "fail").unwrap();

        let err = session.apply_flag("unknown", "error").unwrap_err();
        assert!(err.to_string().contains("already set to fail"));

        session.set_flag("unknown", "error").unwrap();
        session.apply_flag("unknown", "error").unwrap();
    }
}

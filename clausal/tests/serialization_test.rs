//! Checks that the session never lets two engine operations overlap.

use clausal::{
    CallOptions, Diagnostic, EngineConfig, EngineSession, Goal, LogicEngine, PrologEngine,
    QueryFlags, QueryRunner, Solution,
};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::thread;

/// Wraps the Prolog engine and records how many cursors are open at once
struct Instrumented {
    inner: PrologEngine,
    open: Arc<AtomicUsize>,
    peak: Arc<AtomicUsize>,
    opened: Arc<AtomicUsize>,
    closed: Arc<AtomicUsize>,
}

/// Answer stream that counts itself closed when dropped
struct Tracked<'a> {
    inner: <PrologEngine as LogicEngine>::Answers<'a>,
    open: Arc<AtomicUsize>,
    closed: Arc<AtomicUsize>,
}

impl Iterator for Tracked<'_> {
    type Item = Result<Solution, Diagnostic>;

    fn next(&mut self) -> Option<Self::Item> {
        self.inner.next()
    }
}

impl Drop for Tracked<'_> {
    fn drop(&mut self) {
        self.open.fetch_sub(1, Ordering::SeqCst);
        self.closed.fetch_add(1, Ordering::SeqCst);
    }
}

impl LogicEngine for Instrumented {
    type Answers<'a> = Tracked<'a>;

    fn consult(&mut self, path: &Path) -> Result<(), Diagnostic> {
        assert_eq!(self.open.load(Ordering::SeqCst), 0, "consult during a query");
        self.inner.consult(path)
    }

    fn set_flag(&mut self, name: &str, value: &str) -> Result<(), Diagnostic> {
        self.inner.set_flag(name, value)
    }

    fn open_query<'a>(
        &'a mut self,
        goal: &Goal,
        flags: &QueryFlags,
    ) -> Result<Tracked<'a>, Diagnostic> {
        let inner = self.inner.open_query(goal, flags)?;
        let now = self.open.fetch_add(1, Ordering::SeqCst) + 1;
        self.peak.fetch_max(now, Ordering::SeqCst);
        self.opened.fetch_add(1, Ordering::SeqCst);
        // Give other callers a chance to interleave if they could
        thread::yield_now();
        Ok(Tracked {
            inner,
            open: self.open.clone(),
            closed: self.closed.clone(),
        })
    }
}

struct Counters {
    peak: Arc<AtomicUsize>,
    opened: Arc<AtomicUsize>,
    closed: Arc<AtomicUsize>,
}

fn instrumented_runner() -> (QueryRunner, Counters) {
    let counters = Counters {
        peak: Arc::new(AtomicUsize::new(0)),
        opened: Arc::new(AtomicUsize::new(0)),
        closed: Arc::new(AtomicUsize::new(0)),
    };
    let (peak, opened, closed) = (
        counters.peak.clone(),
        counters.opened.clone(),
        counters.closed.clone(),
    );
    let build = move || Instrumented {
        inner: PrologEngine::new(),
        open: Arc::new(AtomicUsize::new(0)),
        peak,
        opened,
        closed,
    };
    let rules = PathBuf::from(env!("CARGO_MANIFEST_DIR")).join("tests/fixtures/family.pl");
    let config = EngineConfig::new()
        .with_rules(rules)
        .with_default_predicate("partner");
    let session = EngineSession::spawn(build).unwrap();
    (QueryRunner::with_session(config, session).unwrap(), counters)
}

#[test]
fn concurrent_threads_never_overlap_cursors() {
    let (runner, counters) = instrumented_runner();

    let handles: Vec<_> = (0..8)
        .map(|i| {
            let runner = runner.clone();
            thread::spawn(move || {
                for _ in 0..25 {
                    let input = if i % 2 == 0 { "X, Y" } else { "grandparent(tom, Z)" };
                    let result = runner.invoke(input, &CallOptions::default()).unwrap();
                    assert!(result.is_success());
                }
            })
        })
        .collect();
    for handle in handles {
        handle.join().unwrap();
    }

    assert_eq!(counters.peak.load(Ordering::SeqCst), 1);
    assert_eq!(counters.opened.load(Ordering::SeqCst), 200);
    assert_eq!(counters.closed.load(Ordering::SeqCst), 200);
}

#[test]
fn abandoned_and_limited_queries_close_their_cursors() {
    let (runner, counters) = instrumented_runner();

    let mut stream = runner.stream("X, Y", &CallOptions::default()).unwrap();
    assert!(stream.next().is_some());
    drop(stream);

    runner
        .invoke("X, Y", &CallOptions::new().with_max_results(1))
        .unwrap();
    runner
        .invoke("partner(X, Y, Z)", &CallOptions::default())
        .unwrap_err();

    // A final round trip guarantees the worker has finished the earlier requests
    runner.session().loaded_sources().unwrap();

    let opened = counters.opened.load(Ordering::SeqCst);
    assert_eq!(opened, 3);
    assert_eq!(counters.closed.load(Ordering::SeqCst), opened);
}

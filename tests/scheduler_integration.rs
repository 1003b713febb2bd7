//! Integration tests for handler scheduling
//!
//! These tests validate the dependency scheduler end to end:
//! - Exactly-once firing per qualifying event
//! - Re-entrant writes queued behind the running handler
//! - Join modes and error containment
//! - The per-component worker strategy

mod common;

use common::builders::{Action, NodeBuilder};
use common::{drain, entries, new_log, test_timeout};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{mpsc, Arc};
use std::time::Duration;
use visflow::pipeline::{
    BufferPolicy, Component, InPort, Interface, JoinMode, LifecycleState, OutPort, Pipeline,
    PipelineError, PipelineResult,
};

fn running(mut pipeline: Pipeline) -> Pipeline {
    pipeline.prepare_all().unwrap();
    pipeline
}

fn start(pipeline: &mut Pipeline) {
    pipeline.init_all().unwrap();
    pipeline.start_all().unwrap();
}

#[test]
fn test_handler_fires_once_per_write_on_its_port_only() {
    let log = new_log();
    let mut p = Pipeline::new();
    NodeBuilder::new("n", &log)
        .input("a", BufferPolicy::queue())
        .input("b", BufferPolicy::queue())
        .handler("on_a", &["a"], Action::Record)
        .add_to(&mut p)
        .unwrap();
    let mut p = running(p);

    let (fa, fb) = (OutPort::<i32>::new("fa"), OutPort::<i32>::new("fb"));
    p.connect_external(&fa, "n.a").unwrap();
    p.connect_external(&fb, "n.b").unwrap();
    start(&mut p);

    fa.write(1).unwrap();
    fa.write(2).unwrap();
    fb.write(9).unwrap();
    assert_eq!(p.run_until_idle(), 2);
    assert_eq!(entries(&log)[2..], ["on_a:a=1", "on_a:a=2"]);

    let snapshot = p.describe();
    let handler = &snapshot.component("n").unwrap().handlers[0];
    assert_eq!(handler.fired, 2);
    assert_eq!(handler.failed, 0);
}

#[test]
fn test_any_join_fires_per_arrival_on_either_port() {
    let log = new_log();
    let mut p = Pipeline::new();
    NodeBuilder::new("n", &log)
        .input("a", BufferPolicy::Newest)
        .input("b", BufferPolicy::Newest)
        .handler("both", &["a", "b"], Action::Record)
        .add_to(&mut p)
        .unwrap();
    let mut p = running(p);
    let (fa, fb) = (OutPort::<i32>::new("fa"), OutPort::<i32>::new("fb"));
    p.connect_external(&fa, "n.a").unwrap();
    p.connect_external(&fb, "n.b").unwrap();
    start(&mut p);

    fa.write(1).unwrap();
    fb.write(2).unwrap();
    assert_eq!(p.run_until_idle(), 2);
    assert_eq!(
        entries(&log)[2..],
        ["both:a=1", "both:b=-", "both:a=1", "both:b=2"]
    );
}

#[test]
fn test_all_join_waits_for_every_dependency() {
    let log = new_log();
    let mut p = Pipeline::new();
    NodeBuilder::new("n", &log)
        .input("a", BufferPolicy::queue())
        .input("b", BufferPolicy::queue())
        .handler("pair", &["a", "b"], Action::Record)
        .join(JoinMode::All)
        .add_to(&mut p)
        .unwrap();
    let mut p = running(p);
    let (fa, fb) = (OutPort::<i32>::new("fa"), OutPort::<i32>::new("fb"));
    p.connect_external(&fa, "n.a").unwrap();
    p.connect_external(&fb, "n.b").unwrap();
    start(&mut p);

    fa.write(1).unwrap();
    fa.write(2).unwrap();
    assert_eq!(p.run_until_idle(), 0);
    fb.write(10).unwrap();
    assert_eq!(p.run_until_idle(), 1);
    assert_eq!(entries(&log)[2..], ["pair:a=1", "pair:b=10"]);
}

#[test]
fn test_pipeline_default_join_mode_applies_to_handlers() {
    let log = new_log();
    let mut p = Pipeline::with_join_mode(JoinMode::All);
    NodeBuilder::new("n", &log)
        .input("a", BufferPolicy::queue())
        .input("b", BufferPolicy::queue())
        .handler("pair", &["a", "b"], Action::Record)
        .add_to(&mut p)
        .unwrap();
    let p = running(p);
    let snapshot = p.describe();
    assert_eq!(
        snapshot.component("n").unwrap().handlers[0].join_mode,
        JoinMode::All
    );
}

#[test]
fn test_reentrant_write_runs_after_current_handler() {
    let log = new_log();
    let mut p = Pipeline::new();
    NodeBuilder::new("a", &log)
        .input("in", BufferPolicy::queue())
        .output("out")
        .handler("fwd", &["in"], Action::Forward("out".into()))
        .add_to(&mut p)
        .unwrap();
    NodeBuilder::new("b", &log)
        .input("in", BufferPolicy::queue())
        .output("out")
        .handler("fwd", &["in"], Action::Forward("out".into()))
        .add_to(&mut p)
        .unwrap();
    let mut p = running(p);
    p.connect("a.out", "b.in").unwrap();

    let feed = OutPort::<i32>::new("feed");
    let sink = InPort::<i32>::queue("sink");
    p.connect_external(&feed, "a.in").unwrap();
    p.tap("b.out", &sink).unwrap();
    start(&mut p);
    log.lock().unwrap().clear();

    feed.write(1).unwrap();
    assert_eq!(p.step(), Some(1));
    // b has not run yet: its event is queued behind a's handler.
    assert_eq!(entries(&log), ["fwd:in=1", "fwd:done"]);
    assert_eq!(p.pending(), 1);

    assert_eq!(p.run_until_idle(), 1);
    assert_eq!(drain(&sink), vec![3]);
}

#[test]
fn test_diamond_fires_each_handler_once_per_event() {
    let log = new_log();
    let mut p = Pipeline::new();
    NodeBuilder::new("src", &log)
        .input("in", BufferPolicy::queue())
        .output("out")
        .handler("fwd", &["in"], Action::Forward("out".into()))
        .add_to(&mut p)
        .unwrap();
    for name in ["left", "right"] {
        NodeBuilder::new(name, &log)
            .input("in", BufferPolicy::queue())
            .output("out")
            .handler("fwd", &["in"], Action::Forward("out".into()))
            .add_to(&mut p)
            .unwrap();
    }
    NodeBuilder::new("join", &log)
        .input("l", BufferPolicy::queue())
        .input("r", BufferPolicy::queue())
        .handler("pair", &["l", "r"], Action::Record)
        .join(JoinMode::All)
        .add_to(&mut p)
        .unwrap();
    let mut p = running(p);
    p.connect("src.out", "left.in").unwrap();
    p.connect("src.out", "right.in").unwrap();
    p.connect("left.out", "join.l").unwrap();
    p.connect("right.out", "join.r").unwrap();

    let feed = OutPort::<i32>::new("feed");
    p.connect_external(&feed, "src.in").unwrap();
    start(&mut p);

    for v in [10, 20] {
        feed.write(v).unwrap();
    }
    // src x2, left x2, right x2, join x2
    assert_eq!(p.run_until_idle(), 8);
    let pairs: Vec<_> = entries(&log)
        .into_iter()
        .filter(|e| e.starts_with("pair:"))
        .collect();
    assert_eq!(pairs, ["pair:l=12", "pair:r=12", "pair:l=22", "pair:r=22"]);
}

#[test]
fn test_failing_handler_does_not_stop_the_pipeline() {
    let log = new_log();
    let mut p = Pipeline::new();
    NodeBuilder::new("n", &log)
        .input("in", BufferPolicy::queue())
        .handler("bad", &["in"], Action::Fail)
        .handler("crash", &["in"], Action::Panic)
        .handler("good", &["in"], Action::Record)
        .add_to(&mut p)
        .unwrap();
    let mut p = running(p);
    let feed = OutPort::<i32>::new("feed");
    p.connect_external(&feed, "n.in").unwrap();
    start(&mut p);

    feed.write(1).unwrap();
    feed.write(2).unwrap();
    assert_eq!(p.run_until_idle(), 6);
    assert_eq!(p.state("n").unwrap(), LifecycleState::Running);

    let snapshot = p.describe();
    let handlers = &snapshot.component("n").unwrap().handlers;
    assert_eq!((handlers[0].fired, handlers[0].failed), (2, 2));
    assert_eq!((handlers[1].fired, handlers[1].failed), (2, 2));
    assert_eq!((handlers[2].fired, handlers[2].failed), (2, 0));
    // Both queued values were consumed by the recording handler.
    assert!(entries(&log).contains(&"good:in=2".to_string()));
}

#[test]
fn test_trigger_requires_running() {
    let log = new_log();
    let mut p = Pipeline::new();
    NodeBuilder::new("n", &log)
        .handler("poke", &[], Action::Record)
        .handler("bad", &[], Action::Fail)
        .add_to(&mut p)
        .unwrap();
    let mut p = running(p);

    assert!(matches!(p.trigger("n", "poke"), Err(PipelineError::NotRunning(_))));
    start(&mut p);
    p.trigger("n", "poke").unwrap();
    assert!(matches!(
        p.trigger("n", "missing"),
        Err(PipelineError::UnknownHandler { .. })
    ));
    assert!(matches!(p.trigger("n", "bad"), Err(PipelineError::Handler { .. })));
}

#[test]
fn test_controller_trigger_is_queued() {
    let log = new_log();
    let mut p = Pipeline::new();
    NodeBuilder::new("n", &log)
        .handler("poke", &[], Action::Fail)
        .add_to(&mut p)
        .unwrap();
    let mut p = running(p);
    start(&mut p);

    p.controller().trigger("n", "poke").unwrap();
    assert_eq!(p.run_until_idle(), 1);
    assert_eq!(entries(&log).last().unwrap(), "poke:fail");
}

#[test]
fn test_threaded_pipeline_preserves_per_port_order() {
    let log = new_log();
    let mut p = Pipeline::new();
    for name in ["a", "b"] {
        NodeBuilder::new(name, &log)
            .input("in", BufferPolicy::queue())
            .output("out")
            .handler("fwd", &["in"], Action::Forward("out".into()))
            .add_to(&mut p)
            .unwrap();
    }
    let mut p = running(p);
    p.connect("a.out", "b.in").unwrap();
    let feed = OutPort::<i32>::new("feed");
    let sink = InPort::<i32>::queue("sink");
    p.connect_external(&feed, "a.in").unwrap();
    p.tap("b.out", &sink).unwrap();

    let threaded = p.spawn().unwrap();
    for name in ["a", "b"] {
        threaded.init(name).unwrap();
        threaded.start(name).unwrap();
    }
    for v in 0..50 {
        feed.write(v).unwrap();
    }
    assert_eq!(threaded.stop("a").unwrap(), LifecycleState::Stopped);
    assert_eq!(threaded.stop("b").unwrap(), LifecycleState::Stopped);

    let p = threaded.shutdown().unwrap();
    assert_eq!(drain(&sink), (2..52).collect::<Vec<_>>());
    assert_eq!(p.state("b").unwrap(), LifecycleState::Stopped);
}

/// Signals when its handler starts, then takes a while to finish.
struct Slow {
    input: InPort<i32>,
    started: mpsc::Sender<i32>,
    done: Arc<AtomicBool>,
}

impl Component for Slow {
    fn prepare_interface(&mut self, iface: &mut Interface<'_>) -> PipelineResult<()> {
        let (input, started, done) = (
            self.input.clone(),
            self.started.clone(),
            Arc::clone(&self.done),
        );
        iface.register_handler("work", move || {
            let v = input.read()?;
            started.send(v)?;
            std::thread::sleep(Duration::from_millis(200));
            done.store(true, Ordering::SeqCst);
            Ok(())
        })?;
        iface.add_dependency("work", &self.input)
    }
}

#[test]
fn test_threaded_stop_waits_for_in_flight_handler() {
    let (started_tx, started_rx) = mpsc::channel();
    let done = Arc::new(AtomicBool::new(false));
    let mut p = Pipeline::new();
    p.add_component(
        "slow",
        "Slow",
        Box::new(Slow {
            input: InPort::queue("in"),
            started: started_tx,
            done: Arc::clone(&done),
        }),
    )
    .unwrap();
    let mut p = running(p);
    let feed = OutPort::<i32>::new("feed");
    p.connect_external(&feed, "slow.in").unwrap();

    let threaded = p.spawn().unwrap();
    threaded.init("slow").unwrap();
    threaded.start("slow").unwrap();
    feed.write(7).unwrap();

    assert_eq!(started_rx.recv_timeout(test_timeout()).unwrap(), 7);
    assert!(!done.load(Ordering::SeqCst));
    assert_eq!(threaded.stop("slow").unwrap(), LifecycleState::Stopped);
    assert!(done.load(Ordering::SeqCst));

    let p = threaded.shutdown().unwrap();
    assert_eq!(p.state("slow").unwrap(), LifecycleState::Stopped);
    assert_eq!(p.describe().component("slow").unwrap().handlers[0].fired, 1);
}

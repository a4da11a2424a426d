#![cfg(not(feature = "loom"))]
#![allow(missing_docs)]

mod common;

use common::{wait_until, Log, Tally};
use rstest::rstest;
use std::{
    sync::{
        atomic::{AtomicUsize, Ordering},
        Arc,
    },
    thread,
    time::Duration,
};
use workgraph::{
    builder::TaskGraph,
    helpers::{post_and_wait, Conditional, EventHub, Outcome, Pipeline, Timer},
    scheduler::{Policy, Scheduler},
};

#[rstest]
#[case::takes_the_true_branch(true)]
#[case::takes_the_false_branch(false)]
fn conditional_posts_exactly_one_branch(#[case] outcome: bool) {
    let scheduler = Scheduler::new(Policy::RoundRobin, 2, 1);
    let log = Log::default();
    let dropped = Arc::new(AtomicUsize::new(0));

    let taken = TaskGraph::new(log.mark("taken"), 0, 0);
    let skipped = {
        let tally = Tally(Arc::clone(&dropped));
        let log = log.clone();
        TaskGraph::new(
            move || {
                let _tally = &tally;
                log.push("skipped");
            },
            0,
            0,
        )
    };
    let (on_true, on_false) = if outcome {
        (taken, skipped)
    } else {
        (skipped, taken)
    };

    Conditional::new(scheduler.handle(), move || outcome, 0, 0)
        .on_true(on_true)
        .on_false(on_false)
        .post();

    wait_until("the taken branch", || log.count_of("taken") == 1);
    // The untaken branch is reclaimed without running.
    wait_until("the skipped branch to drop", || {
        dropped.load(Ordering::SeqCst) == 1
    });
    assert_eq!(log.count_of("skipped"), 0);
}

#[test]
fn outcome_success_posts_only_the_success_graph() {
    let scheduler = Scheduler::new(Policy::RoundRobin, 2, 1);
    let log = Log::default();
    let dropped = Arc::new(AtomicUsize::new(0));

    let failure = {
        let tally = Tally(Arc::clone(&dropped));
        let log = log.clone();
        TaskGraph::new(
            move || {
                let _tally = &tally;
                log.push("failure");
            },
            0,
            0,
        )
    };
    Outcome::<_, &str>::new(scheduler.handle(), || Ok(()), 0, 0)
        .on_success(TaskGraph::new(log.mark("success"), 0, 0))
        .on_failure(failure)
        .post();

    wait_until("the success graph", || log.count_of("success") == 1);
    wait_until("the failure graph to drop", || {
        dropped.load(Ordering::SeqCst) == 1
    });
    assert_eq!(log.count_of("failure"), 0);
}

#[test]
fn outcome_error_reaches_the_typed_handler() {
    let scheduler = Scheduler::new(Policy::RoundRobin, 2, 1);
    let log = Log::default();

    let handler_log = log.clone();
    Outcome::new(scheduler.handle(), || Err("no disk"), 0, 0)
        .on_success(TaskGraph::new(log.mark("success"), 0, 0))
        .on_error(
            move |error: &str| handler_log.push(format!("error:{error}")),
            0,
            0,
        )
        .post();

    wait_until("the error handler", || log.count_of("error:no disk") == 1);
    assert_eq!(log.count_of("success"), 0);
}

#[test]
fn pipeline_threads_values_through_stages() {
    let scheduler = Scheduler::new(Policy::RoundRobin, 2, 1);
    let log = Log::default();

    let sink = log.clone();
    let mut graph = Pipeline::start(|| 21u64, 0, 0)
        .then(|value| value * 2, 0, 0)
        .finish(move |value| sink.push(value.to_string()), 0, 0);
    post_and_wait(&scheduler, &mut graph);

    assert_eq!(log.entries(), vec!["42"]);
}

#[test]
fn pipeline_split_shares_the_value_and_joins_before_the_tail() {
    let scheduler = Scheduler::new(Policy::RoundRobin, 3, 1);
    let log = Log::default();

    let sum_log = log.clone();
    let len_log = log.clone();
    let mut graph = Pipeline::start(|| vec![1u64, 2, 3], 0, 0)
        .split()
        .branch(
            move |values| sum_log.push(format!("sum:{}", values.iter().sum::<u64>())),
            0,
            0,
        )
        .branch(
            move |values| len_log.push(format!("len:{}", values.len())),
            0,
            0,
        )
        .join();
    graph.then(log.mark("tail"), 0, 0);
    post_and_wait(&scheduler, &mut graph);

    let entries = log.entries();
    assert_eq!(entries.len(), 3);
    // Both branches observed the shared value before the tail ran.
    assert_eq!(entries[2], "tail");
    assert_eq!(log.count_of("sum:6"), 1);
    assert_eq!(log.count_of("len:3"), 1);
}

#[test]
fn event_hub_dispatches_bound_keys_only() {
    let scheduler = Scheduler::new(Policy::RoundRobin, 2, 1);
    let log = Log::default();

    let mut hub = EventHub::new(scheduler.handle());
    let ping_log = log.clone();
    hub.bind(
        "ping",
        move |value: u64| ping_log.push(format!("ping:{value}")),
        0,
        0,
    );

    assert!(hub.post_event(&"ping", 7));
    assert!(!hub.post_event(&"pong", 8));
    wait_until("the ping handler", || log.count_of("ping:7") == 1);

    hub.unbind(&"ping");
    assert!(!hub.post_event(&"ping", 9));
    assert_eq!(log.len(), 1);
}

#[test]
fn timer_reschedules_until_the_handler_declines() {
    let scheduler = Scheduler::new(Policy::RoundRobin, 2, 1);
    let timer = Timer::new(scheduler.handle(), Duration::from_millis(5));

    let periodic = Arc::new(AtomicUsize::new(0));
    {
        let periodic = Arc::clone(&periodic);
        timer.schedule(
            move || periodic.fetch_add(1, Ordering::SeqCst) + 1 < 3,
            Duration::from_millis(10),
            0,
            0,
        );
    }
    let oneshot = Arc::new(AtomicUsize::new(0));
    {
        let oneshot = Arc::clone(&oneshot);
        timer.schedule(
            move || {
                oneshot.fetch_add(1, Ordering::SeqCst);
                false
            },
            Duration::from_millis(10),
            0,
            0,
        );
    }

    wait_until("three periodic firings", || {
        periodic.load(Ordering::SeqCst) >= 3
    });
    wait_until("the one-shot firing", || oneshot.load(Ordering::SeqCst) == 1);

    // Declining handlers stay declined.
    thread::sleep(Duration::from_millis(60));
    assert_eq!(oneshot.load(Ordering::SeqCst), 1);
    assert_eq!(periodic.load(Ordering::SeqCst), 3);
}

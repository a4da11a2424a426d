use crate::{builder::TaskGraph, scheduler::Scheduler};
use std::sync::{Arc, Condvar, Mutex};

/// Appends a completion signal to `graph`, posts it, and blocks the calling
/// thread until every node of the graph has finished.
///
/// The signal is an ordinary `then` continuation, so it fires only after
/// the leaf (and any also-group the leaf closes) has completed.
///
/// # Panics
/// If `graph` is uninitialised or already closed.
pub fn post_and_wait(scheduler: &Scheduler, graph: &mut TaskGraph) {
    let done = Arc::new((Mutex::new(false), Condvar::new()));
    let signal = Arc::clone(&done);
    graph.then(
        move || {
            let (flag, signalled) = &*signal;
            *flag.lock().expect("post_and_wait: [1]") = true;
            signalled.notify_all();
        },
        0,
        0,
    );
    scheduler.post_graph(graph);

    let (flag, signalled) = &*done;
    let mut finished = flag.lock().expect("post_and_wait: [2]");
    while !*finished {
        finished = signalled.wait(finished).expect("post_and_wait: [3]");
    }
}

use crate::{
    builder::TaskGraph,
    scheduler::SchedulerHandle,
    types::{Priority, WorkerId},
};
use std::{
    collections::BinaryHeap,
    sync::{
        atomic::{AtomicBool, Ordering},
        Arc, Mutex,
    },
    thread,
    time::{Duration, Instant},
};
use tracing::debug;

type TimerHandler = Arc<dyn Fn() -> bool + Send + Sync>;

/// Posts handlers periodically from a dedicated timer thread.
///
/// The thread wakes every `granularity`, posts each due handler as a
/// one-off action on its configured worker/priority, and reschedules it
/// when the handler returns `true`. Due-time resolution is therefore the
/// granularity, not the handler period.
#[must_use]
pub struct Timer {
    state: Arc<TimerState>,
    thread: Option<thread::JoinHandle<()>>,
}

struct TimerState {
    handle: SchedulerHandle,
    running: AtomicBool,
    entries: Mutex<BinaryHeap<TimerEntry>>,
}

struct TimerEntry {
    due: Instant,
    period: Duration,
    worker: WorkerId,
    priority: Priority,
    handler: TimerHandler,
}

impl PartialEq for TimerEntry {
    fn eq(&self, other: &Self) -> bool {
        self.due == other.due
    }
}

impl Eq for TimerEntry {}

impl PartialOrd for TimerEntry {
    fn partial_cmp(&self, other: &Self) -> Option<core::cmp::Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for TimerEntry {
    fn cmp(&self, other: &Self) -> core::cmp::Ordering {
        // Earliest due time first on the max-heap.
        other.due.cmp(&self.due)
    }
}

impl TimerState {
    fn reschedule(&self, entry: TimerEntry) {
        self.entries.lock().expect("TimerState::reschedule: [1]").push(entry);
    }
}

impl Timer {
    /// Starts the timer thread, checking for due handlers every
    /// `granularity`.
    ///
    /// # Panics
    /// If the timer thread cannot be spawned.
    pub fn new(handle: SchedulerHandle, granularity: Duration) -> Self {
        let state = Arc::new(TimerState {
            handle,
            running: AtomicBool::new(true),
            entries: Mutex::new(BinaryHeap::new()),
        });
        let loop_state = Arc::clone(&state);
        let thread = thread::Builder::new()
            .name("workgraph-timer".into())
            .spawn(move || run(&loop_state, granularity))
            .expect("Timer::new: [1]");
        Self {
            state,
            thread: Some(thread),
        }
    }

    /// Schedules `handler` to be posted every `period` on `worker` (0 =
    /// any) at `priority`. The handler keeps firing for as long as it
    /// returns `true`.
    pub fn schedule(
        &self,
        handler: impl Fn() -> bool + Send + Sync + 'static,
        period: Duration,
        worker: WorkerId,
        priority: Priority,
    ) {
        self.state.reschedule(TimerEntry {
            due: Instant::now() + period,
            period,
            worker,
            priority,
            handler: Arc::new(handler),
        });
    }

    /// Stops the timer thread and joins it. Already-posted handler actions
    /// still run on the scheduler; nothing new is posted afterwards.
    pub fn shutdown(&mut self) {
        self.state.running.store(false, Ordering::Release);
        if let Some(thread) = self.thread.take() {
            let _ = thread.join();
            debug!("timer stopped");
        }
    }
}

impl Drop for Timer {
    fn drop(&mut self) {
        self.shutdown();
    }
}

fn run(state: &Arc<TimerState>, granularity: Duration) {
    while state.running.load(Ordering::Acquire) {
        {
            let mut entries = state.entries.lock().expect("Timer::run: [1]");
            let now = Instant::now();
            while entries.peek().is_some_and(|entry| entry.due <= now) {
                let entry = entries.pop().expect("Timer::run: [2]");
                post_due(state, entry);
            }
        }
        thread::sleep(granularity);
    }
}

fn post_due(state: &Arc<TimerState>, entry: TimerEntry) {
    let TimerEntry {
        due: _,
        period,
        worker,
        priority,
        handler,
    } = entry;
    let timer = Arc::clone(state);
    let action_handler = Arc::clone(&handler);
    state.handle.post_graph(&mut TaskGraph::new(
        move || {
            if (*action_handler)() && timer.running.load(Ordering::Acquire) {
                timer.reschedule(TimerEntry {
                    due: Instant::now() + period,
                    period,
                    worker,
                    priority,
                    handler,
                });
            }
        },
        worker,
        priority,
    ));
}

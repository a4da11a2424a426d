use crate::{
    builder::TaskGraph,
    graph::Node,
    queue::{Counting, FifoQueue, PriorityQueue, WorkQueue},
    types::{Priority, WorkerId},
};
use core::fmt;
use std::{
    any::Any,
    panic::{self, AssertUnwindSafe},
    sync::{
        atomic::{AtomicBool, AtomicUsize, Ordering},
        Arc, Mutex, OnceLock,
    },
    thread,
};
use tracing::{debug, trace};

/// Worker-selection policy for actions posted without affinity.
///
/// The policy fixes both the queue flavour and the selection rule once, at
/// construction; no per-node dynamic dispatch is involved.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Policy {
    /// Rotate across strict FIFO queues via an atomic cursor.
    RoundRobin,
    /// Rotate across priority-ordered queues.
    RoundRobinPriority,
    /// Scan all queue lengths and pick the smallest (first match wins on
    /// ties); strict FIFO queues.
    LeastBusy,
    /// The least-busy scan over priority-ordered queues.
    LeastBusyPriority,
}

/// Opaque payload recovered from a panicking action, as delivered to the
/// exception handler.
pub type PanicPayload = Box<dyn Any + Send + 'static>;

struct ExceptionHook {
    handler: Arc<dyn Fn(PanicPayload) + Send + Sync>,
    worker: WorkerId,
    priority: Priority,
}

enum SelectMode {
    Rotate,
    LeastBusy,
}

/// The engine behind a scheduler instance, generic over the queue flavour
/// the policy picked. Erased behind `Arc<dyn Engine>` so handles and
/// helpers need not carry the queue type around.
trait Engine: Send + Sync {
    fn post(&self, root: Box<Node>);
    fn install_hook(&self, hook: ExceptionHook) -> bool;
    fn shutdown(&self);
}

struct Core<Q> {
    queues: Box<[Q]>,
    mode: SelectMode,
    step: usize,
    rotor: AtomicUsize,
    hook: OnceLock<ExceptionHook>,
    closing: AtomicBool,
    workers: Mutex<Vec<thread::JoinHandle<()>>>,
}

impl<Q: WorkQueue> Core<Q> {
    fn start(mode: SelectMode, num_workers: usize, step: usize) -> Arc<Self> {
        assert!(
            num_workers >= 1,
            "Scheduler::new: at least one worker is required"
        );
        let queues: Box<[Q]> = (0..num_workers).map(|_| Q::default()).collect();
        let core = Arc::new(Self {
            queues,
            mode,
            step,
            rotor: AtomicUsize::new(0),
            hook: OnceLock::new(),
            closing: AtomicBool::new(false),
            workers: Mutex::new(Vec::with_capacity(num_workers)),
        });
        let mut workers = core.workers.lock().expect("Core::start: [1]");
        for index in 0..num_workers {
            let worker_core = Arc::clone(&core);
            let handle = thread::Builder::new()
                .name(format!("workgraph-{index}"))
                .spawn(move || worker_core.run(index))
                .expect("Core::start: [2]");
            workers.push(handle);
        }
        drop(workers);
        core
    }

    /// The worker loop: drain up to `step` nodes, execute each, resolve
    /// joins and continuations, yield, repeat until the queue closes.
    fn run(&self, index: usize) {
        trace!(worker = index, "worker started");
        let queue = &self.queues[index];
        let mut batch = Vec::new();
        loop {
            if queue.pop(self.step, &mut batch) == 0 {
                break;
            }
            for node in batch.drain(..) {
                self.execute(node);
            }
            thread::yield_now();
        }
        trace!(worker = index, "worker exiting");
    }

    fn execute(&self, node: Box<Node>) {
        let Node {
            action,
            priority: _,
            worker: _,
            continuation,
            join,
            next_peer,
        } = *node;
        if let Err(payload) = panic::catch_unwind(AssertUnwindSafe(action)) {
            self.deliver_panic(payload);
        }
        match join {
            Some(counter) => {
                // The member observing zero owns the group continuation;
                // the counter itself is released when the last Arc drops.
                if counter.decrement() == 0 {
                    if let Some(next) = counter.take_continuation() {
                        self.post(next);
                    }
                }
            }
            None => {
                if let Some(next) = continuation {
                    self.post(next);
                }
            }
        }
        // Peers are detached at post time; a popped node that still carries
        // one is treated as an ordinary separate post.
        if let Some(peer) = next_peer {
            self.post(peer);
        }
    }

    fn deliver_panic(&self, payload: PanicPayload) {
        let Some(hook) = self.hook.get() else {
            debug!("action panicked with no exception handler installed; payload dropped");
            return;
        };
        debug!("action panicked; posting the exception handler");
        let handler = Arc::clone(&hook.handler);
        let node = Node::new(
            Box::new(move || (*handler)(payload)),
            hook.worker,
            hook.priority,
        );
        self.post(Box::new(node));
    }

    fn select(&self, node: &Node) -> usize {
        let num_queues = self.queues.len();
        if node.worker() > 0 {
            return node.worker() % num_queues;
        }
        match self.mode {
            SelectMode::Rotate => self.rotor.fetch_add(1, Ordering::Relaxed) % num_queues,
            SelectMode::LeastBusy => {
                let mut best = 0;
                let mut best_len = self.queues[0].len();
                for (index, queue) in self.queues.iter().enumerate().skip(1) {
                    let len = queue.len();
                    if len < best_len {
                        best = index;
                        best_len = len;
                    }
                }
                best
            }
        }
    }
}

impl<Q: WorkQueue> Engine for Core<Q> {
    fn post(&self, root: Box<Node>) {
        if self.closing.load(Ordering::Acquire) {
            debug!("post after shutdown; dropping the graph");
            return;
        }
        let mut node = root;
        loop {
            let peer = node.next_peer.take();
            let target = self.select(&node);
            trace!(queue = target, priority = node.priority(), "enqueue");
            self.queues[target].push(node);
            match peer {
                Some(next) => node = next,
                None => break,
            }
        }
    }

    fn install_hook(&self, hook: ExceptionHook) -> bool {
        self.hook.set(hook).is_ok()
    }

    fn shutdown(&self) {
        if self.closing.swap(true, Ordering::AcqRel) {
            return;
        }
        debug!("scheduler shutting down");
        for queue in &*self.queues {
            queue.close();
        }
        let handles: Vec<_> = {
            let mut workers = self.workers.lock().expect("Core::shutdown: [1]");
            workers.drain(..).collect()
        };
        for handle in handles {
            let _ = handle.join();
        }
        // Free whatever was posted but never drained.
        let mut leftovers = Vec::new();
        for queue in &*self.queues {
            queue.drain(&mut leftovers);
        }
        drop(leftovers);
        debug!("scheduler stopped");
    }
}

/// A fixed pool of worker threads, one queue per worker, dispatching task
/// graphs by the configured [`Policy`].
///
/// Dropping the scheduler shuts it down: queues are closed, workers joined,
/// and undrained nodes freed. [`shutdown`](Self::shutdown) does the same
/// eagerly and is idempotent. Do not call it from inside an action: a
/// worker cannot join itself.
#[must_use]
pub struct Scheduler {
    engine: Arc<dyn Engine>,
}

impl fmt::Debug for Scheduler {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Scheduler").finish_non_exhaustive()
    }
}

impl Scheduler {
    /// Starts `num_workers` (≥ 1) worker threads dispatching by `policy`.
    ///
    /// `step` caps how many nodes a worker drains per pop; 0 means "drain
    /// whatever is available".
    ///
    /// # Panics
    /// If `num_workers` is zero or a worker thread cannot be spawned.
    pub fn new(policy: Policy, num_workers: usize, step: usize) -> Self {
        let engine: Arc<dyn Engine> = match policy {
            Policy::RoundRobin => Core::<FifoQueue>::start(SelectMode::Rotate, num_workers, step),
            Policy::RoundRobinPriority => {
                Core::<PriorityQueue>::start(SelectMode::Rotate, num_workers, step)
            }
            Policy::LeastBusy => {
                Core::<Counting<FifoQueue>>::start(SelectMode::LeastBusy, num_workers, step)
            }
            Policy::LeastBusyPriority => {
                Core::<Counting<PriorityQueue>>::start(SelectMode::LeastBusy, num_workers, step)
            }
        };
        debug!(?policy, num_workers, step, "scheduler started");
        Self { engine }
    }

    /// Posts a sealed graph root.
    ///
    /// Walks the root's peer chain, detaches each node and enqueues it on
    /// the queue chosen by affinity or policy. Thread-safe, and callable
    /// from inside actions. After [`shutdown`](Self::shutdown) this is a
    /// silent drop.
    pub fn post(&self, root: Box<Node>) {
        self.engine.post(root);
    }

    /// Closes `graph` and posts its root, if any.
    pub fn post_graph(&self, graph: &mut TaskGraph) {
        if let Some(root) = graph.close() {
            self.engine.post(root);
        }
    }

    /// Installs the handler receiving panic payloads from failed actions.
    ///
    /// The handler itself runs as a posted action on the given worker and
    /// priority. Must be installed at most once, before the scheduler is
    /// shared (hence `&mut self`).
    ///
    /// # Panics
    /// If a handler is already installed.
    pub fn set_exception_handler<F>(&mut self, handler: F, worker: WorkerId, priority: Priority)
    where
        F: Fn(PanicPayload) + Send + Sync + 'static,
    {
        let installed = self.engine.install_hook(ExceptionHook {
            handler: Arc::new(handler),
            worker,
            priority,
        });
        assert!(
            installed,
            "Scheduler::set_exception_handler: handler already installed"
        );
    }

    /// A cheap cloneable handle for posting from inside actions or helper
    /// wrappers.
    pub fn handle(&self) -> SchedulerHandle {
        SchedulerHandle {
            engine: Arc::clone(&self.engine),
        }
    }

    /// Gracefully stops the pool: closes every queue, unblocks and joins
    /// every worker, and frees undrained nodes. Idempotent.
    pub fn shutdown(&self) {
        self.engine.shutdown();
    }
}

impl Drop for Scheduler {
    fn drop(&mut self) {
        self.engine.shutdown();
    }
}

/// Cloneable posting handle to a [`Scheduler`].
///
/// Holding a handle does not keep the pool running: once the scheduler is
/// shut down (or dropped), posts through any handle become silent drops.
#[derive(Clone)]
pub struct SchedulerHandle {
    engine: Arc<dyn Engine>,
}

impl fmt::Debug for SchedulerHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SchedulerHandle").finish_non_exhaustive()
    }
}

impl SchedulerHandle {
    /// Same as [`Scheduler::post`].
    pub fn post(&self, root: Box<Node>) {
        self.engine.post(root);
    }

    /// Same as [`Scheduler::post_graph`].
    pub fn post_graph(&self, graph: &mut TaskGraph) {
        if let Some(root) = graph.close() {
            self.engine.post(root);
        }
    }
}

use crate::{
    sync::{Arc, AtomicUsize, Mutex, Ordering},
    types::{Action, Priority, WorkerId},
};
use derive_more::Debug;

/// One unit of scheduling: a user action plus its links into the graph.
///
/// Nodes are produced by the [`TaskGraph`](crate::builder::TaskGraph)
/// builder and consumed by the scheduler. Ownership is strictly linear: at
/// any moment a node is owned by the builder, by one queue slot, or by the
/// worker executing it. A continuation is moved out exactly once, either
/// from its predecessor node or, for an also-group, from the group's
/// [`JoinCounter`] by the last member to finish.
#[must_use]
#[derive(Debug)]
pub struct Node {
    /// The callable to execute. Taken by the worker; runs exactly once.
    #[debug(skip)]
    pub(crate) action: Action,
    /// Scheduling priority; lower is served first on priority queues.
    pub(crate) priority: Priority,
    /// Worker affinity; 0 defers to the dispatch policy.
    pub(crate) worker: WorkerId,
    /// The node that runs after this one. `None` for members of an
    /// also-group, whose common continuation lives in the join counter.
    pub(crate) continuation: Option<Box<Node>>,
    /// Present exactly when this node belongs to an also-group.
    pub(crate) join: Option<Arc<JoinCounter>>,
    /// Next also/fork peer attached to the same predecessor. `post`
    /// detaches the chain node by node while enqueueing.
    pub(crate) next_peer: Option<Box<Node>>,
}

impl Node {
    pub(crate) fn new(action: Action, worker: WorkerId, priority: Priority) -> Self {
        Self {
            action,
            priority,
            worker,
            continuation: None,
            join: None,
            next_peer: None,
        }
    }

    /// The priority recorded for this node at graph-construction time.
    #[must_use]
    pub fn priority(&self) -> Priority {
        self.priority
    }

    /// The worker affinity recorded for this node (0 = any worker).
    #[must_use]
    pub fn worker(&self) -> WorkerId {
        self.worker
    }
}

/// Atomic count shared by every member of one also-group, plus the slot
/// holding the group's common continuation.
///
/// The counter starts at the number of participating nodes (the group's
/// predecessor and each also-peer). Every finishing member decrements it;
/// the member whose decrement reaches zero takes the continuation out of
/// the slot and posts it. The counter itself is reference-counted, so the
/// last node dropped releases it with no further bookkeeping.
#[derive(Debug)]
pub(crate) struct JoinCounter {
    remaining: AtomicUsize,
    #[debug(skip)]
    continuation: Mutex<Option<Box<Node>>>,
}

impl JoinCounter {
    pub(crate) fn new(initial: usize) -> Self {
        Self {
            remaining: AtomicUsize::new(initial),
            continuation: Mutex::new(None),
        }
    }

    /// Records one more member in the group. Called only by the builder,
    /// before the graph is sealed.
    pub(crate) fn increment(&self) {
        self.remaining.fetch_add(1, Ordering::Relaxed);
    }

    /// Marks one member finished and returns the number still running.
    ///
    /// `AcqRel` so the member observing zero also observes every effect of
    /// its peers' actions before running the continuation.
    pub(crate) fn decrement(&self) -> usize {
        let previous = self.remaining.fetch_sub(1, Ordering::AcqRel);
        debug_assert!(previous > 0, "JoinCounter::decrement: [1]");
        previous - 1
    }

    /// Stores the group's common continuation. Called only by the builder,
    /// before the graph is sealed.
    pub(crate) fn set_continuation(&self, node: Box<Node>) {
        let mut slot = self
            .continuation
            .lock()
            .expect("JoinCounter::set_continuation: [1]");
        debug_assert!(slot.is_none(), "JoinCounter::set_continuation: [2]");
        *slot = Some(node);
    }

    /// Takes the continuation out of the slot. Called exactly once, by the
    /// member whose decrement observed zero.
    pub(crate) fn take_continuation(&self) -> Option<Box<Node>> {
        self.continuation
            .lock()
            .expect("JoinCounter::take_continuation: [1]")
            .take()
    }
}

use crate::{
    builder::TaskGraph,
    graph::Node,
    scheduler::SchedulerHandle,
    types::{Priority, WorkerId},
};

/// Run-time branch: evaluates a predicate on a worker and posts exactly one
/// of two pre-built graphs, discarding the other.
///
/// ```ignore
/// let node = Conditional::new(scheduler.handle(), || cache.is_warm(), 0, 0)
///     .on_true(serve_from_cache)
///     .on_false(rebuild_cache)
///     .close();
/// scheduler.post(node);
/// ```
#[must_use]
pub struct Conditional<P> {
    handle: SchedulerHandle,
    predicate: P,
    worker: WorkerId,
    priority: Priority,
    on_true: TaskGraph,
    on_false: TaskGraph,
}

impl<P: FnOnce() -> bool + Send + 'static> Conditional<P> {
    /// Creates the branch point. `worker` and `priority` place the
    /// predicate evaluation itself.
    pub fn new(
        handle: SchedulerHandle,
        predicate: P,
        worker: WorkerId,
        priority: Priority,
    ) -> Self {
        Self {
            handle,
            predicate,
            worker,
            priority,
            on_true: TaskGraph::default(),
            on_false: TaskGraph::default(),
        }
    }

    /// The graph to post when the predicate holds.
    pub fn on_true(mut self, graph: TaskGraph) -> Self {
        self.on_true = graph;
        self
    }

    /// The graph to post when the predicate does not hold.
    pub fn on_false(mut self, graph: TaskGraph) -> Self {
        self.on_false = graph;
        self
    }

    /// Seals the wrapper into a single postable node.
    ///
    /// The untaken branch is dropped inside the action, so its nodes are
    /// reclaimed without ever being scheduled.
    pub fn close(self) -> Box<Node> {
        let Self {
            handle,
            predicate,
            worker,
            priority,
            mut on_true,
            mut on_false,
        } = self;
        let true_root = on_true.close();
        let false_root = on_false.close();
        TaskGraph::new(
            move || {
                if predicate() {
                    if let Some(root) = true_root {
                        handle.post(root);
                    }
                    drop(false_root);
                } else {
                    if let Some(root) = false_root {
                        handle.post(root);
                    }
                    drop(true_root);
                }
            },
            worker,
            priority,
        )
        .close()
        .expect("Conditional::close: [1]")
    }

    /// Convenience: seals and posts in one step.
    pub fn post(self) {
        let handle = self.handle.clone();
        handle.post(self.close());
    }
}

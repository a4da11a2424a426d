use crate::{
    builder::TaskGraph,
    types::{Priority, WorkerId},
};
use std::sync::{Arc, Mutex};

/// Entry point for typed value-passing pipelines.
///
/// Each stage produces a value consumed by the next stage. The value lives
/// in one heap slot per stage and is taken out, freeing the slot, by its
/// reader; the then-chain underneath guarantees the write happens before
/// the read. [`Stage::split`] fans the current value out to parallel
/// branches that share it through reference counting, joined before
/// whatever the pipeline appends next.
pub struct Pipeline;

impl Pipeline {
    /// Starts a pipeline with a producing action on `worker` (0 = any) at
    /// `priority`.
    pub fn start<T, F>(producer: F, worker: WorkerId, priority: Priority) -> Stage<T>
    where
        T: Send + 'static,
        F: FnOnce() -> T + Send + 'static,
    {
        let slot = Arc::new(Mutex::new(None));
        let write = Arc::clone(&slot);
        let graph = TaskGraph::new(
            move || {
                *write.lock().expect("Pipeline::start: [1]") = Some(producer());
            },
            worker,
            priority,
        );
        Stage { graph, slot }
    }
}

/// A pipeline whose last stage produces a `T`.
#[must_use]
pub struct Stage<T> {
    graph: TaskGraph,
    slot: Arc<Mutex<Option<T>>>,
}

impl<T: Send + 'static> Stage<T> {
    /// Appends a stage transforming the previous value into the next one.
    /// Priority is relative to the previous stage, as in
    /// [`TaskGraph::then`].
    pub fn then<U, F>(mut self, stage: F, worker: WorkerId, priority: Priority) -> Stage<U>
    where
        U: Send + 'static,
        F: FnOnce(T) -> U + Send + 'static,
    {
        let next = Arc::new(Mutex::new(None));
        let write = Arc::clone(&next);
        let read = self.slot;
        self.graph.then(
            move || {
                let value = read
                    .lock()
                    .expect("Stage::then: [1]")
                    .take()
                    .expect("Stage::then: [2]");
                *write.lock().expect("Stage::then: [3]") = Some(stage(value));
            },
            worker,
            priority,
        );
        Stage {
            graph: self.graph,
            slot: next,
        }
    }

    /// Appends a terminal consumer and returns the underlying graph, ready
    /// to post.
    pub fn finish<F>(mut self, consumer: F, worker: WorkerId, priority: Priority) -> TaskGraph
    where
        F: FnOnce(T) + Send + 'static,
    {
        let read = self.slot;
        self.graph.then(
            move || {
                let value = read
                    .lock()
                    .expect("Stage::finish: [1]")
                    .take()
                    .expect("Stage::finish: [2]");
                consumer(value);
            },
            worker,
            priority,
        );
        self.graph
    }

    /// Converts the current value into shared ownership so parallel
    /// branches can read it concurrently.
    pub fn split(mut self) -> SplitStage<T>
    where
        T: Sync,
    {
        let shared = Arc::new(Mutex::new(None));
        let write = Arc::clone(&shared);
        let read = self.slot;
        self.graph.then(
            move || {
                let value = read
                    .lock()
                    .expect("Stage::split: [1]")
                    .take()
                    .expect("Stage::split: [2]");
                *write.lock().expect("Stage::split: [3]") = Some(Arc::new(value));
            },
            0,
            0,
        );
        SplitStage {
            graph: self.graph,
            shared,
            branches: 0,
        }
    }
}

/// A pipeline fanned out after [`Stage::split`]: every branch receives the
/// shared value; the value is freed when its last reader drops its clone.
#[must_use]
pub struct SplitStage<T> {
    graph: TaskGraph,
    shared: Arc<Mutex<Option<Arc<T>>>>,
    branches: usize,
}

impl<T: Send + Sync + 'static> SplitStage<T> {
    /// Adds a concurrent branch consuming the shared value. Branches after
    /// the first are `also`-peers of it, so they run in parallel and join
    /// before whatever the caller appends to the returned graph.
    pub fn branch<F>(mut self, consumer: F, worker: WorkerId, priority: Priority) -> Self
    where
        F: FnOnce(Arc<T>) + Send + 'static,
    {
        let read = Arc::clone(&self.shared);
        let action = move || {
            let value = read
                .lock()
                .expect("SplitStage::branch: [1]")
                .as_ref()
                .map(Arc::clone)
                .expect("SplitStage::branch: [2]");
            consumer(value);
        };
        if self.branches == 0 {
            self.graph.then(action, worker, priority);
        } else {
            self.graph.also(action, worker, priority);
        }
        self.branches += 1;
        self
    }

    /// Returns the underlying graph. Appending a `then` to it (or wrapping
    /// it with [`post_and_wait`](super::post_and_wait)) waits for every
    /// branch.
    pub fn join(self) -> TaskGraph {
        self.graph
    }
}

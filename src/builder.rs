use crate::{
    graph::{JoinCounter, Node},
    sync::Arc,
    types::{Priority, WorkerId},
};
use thiserror::Error;

/// Error kind for builder misuse.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[non_exhaustive]
pub enum GraphError {
    /// [`TaskGraph::init`] was called on a builder that already holds a
    /// root node.
    #[error("builder already holds a root node")]
    AlreadyInitialised,
}

/// Fluent builder producing a postable task graph.
///
/// Usage is daisy-chained: `TaskGraph::new(a, 0, 0).then(b, 0, 0).also(c, 0, 0)`.
/// Every method takes the action plus a worker affinity (0 = any) and a
/// priority. The plain methods record the priority **relative** to the
/// parent node (parent's priority + the argument); the `_absolute` variants
/// record the argument verbatim. Lower priority values are served first.
///
/// Relationships:
/// - [`then`](Self::then): the new action runs after the current leaf (and,
///   if the leaf closes an also-group, after every member of that group).
/// - [`also`](Self::also): the new action runs concurrently with the leaf;
///   a later `then` waits for the whole group.
/// - [`fork`](Self::fork): the new action runs concurrently but nothing
///   ever waits for it.
///
/// [`close`](Self::close) seals the graph and hands over the root; the
/// builder is empty afterwards and a second `close` returns `None`.
#[must_use]
#[derive(Debug, Default)]
pub struct TaskGraph {
    segments: Vec<Segment>,
}

/// One continuation step of the graph under construction: a head node plus
/// the also/fork peers spliced next to it. Consecutive segments are linked
/// head-to-head by `close`.
#[derive(Debug)]
struct Segment {
    /// Nodes in final peer-chain order; `nodes[0]` is the segment head.
    nodes: Vec<Node>,
    /// Index of the current leaf within `nodes`. Moved by `also`, left in
    /// place by `fork`.
    leaf: usize,
    /// The group's join counter, allocated by the first `also` in this
    /// segment.
    gate: Option<Arc<JoinCounter>>,
}

impl Segment {
    fn root(node: Node) -> Self {
        Self {
            nodes: vec![node],
            leaf: 0,
            gate: None,
        }
    }
}

impl TaskGraph {
    /// Creates a builder whose root runs `action` on `worker` (0 = any)
    /// with the given absolute `priority`.
    pub fn new(
        action: impl FnOnce() + Send + 'static,
        worker: WorkerId,
        priority: Priority,
    ) -> Self {
        let mut graph = Self::default();
        graph
            .segments
            .push(Segment::root(Node::new(Box::new(action), worker, priority)));
        graph
    }

    /// Initialises a builder created with [`TaskGraph::default`].
    ///
    /// # Errors
    /// [`GraphError::AlreadyInitialised`] if the builder already holds a
    /// root node.
    pub fn init(
        &mut self,
        action: impl FnOnce() + Send + 'static,
        worker: WorkerId,
        priority: Priority,
    ) -> Result<&mut Self, GraphError> {
        if !self.segments.is_empty() {
            return Err(GraphError::AlreadyInitialised);
        }
        self.segments
            .push(Segment::root(Node::new(Box::new(action), worker, priority)));
        Ok(self)
    }

    /// Whether the builder currently holds a graph.
    #[must_use]
    pub fn is_initialised(&self) -> bool {
        !self.segments.is_empty()
    }

    /// Appends an action that runs after the leaf and, if the leaf closes
    /// an also-group, after every member of that group. Priority is
    /// relative to the leaf's.
    ///
    /// # Panics
    /// If the builder is uninitialised.
    pub fn then(
        &mut self,
        action: impl FnOnce() + Send + 'static,
        worker: WorkerId,
        priority: Priority,
    ) -> &mut Self {
        let priority = self.leaf_priority().saturating_add(priority);
        self.then_absolute(action, worker, priority)
    }

    /// [`then`](Self::then) with a verbatim priority.
    ///
    /// # Panics
    /// If the builder is uninitialised.
    pub fn then_absolute(
        &mut self,
        action: impl FnOnce() + Send + 'static,
        worker: WorkerId,
        priority: Priority,
    ) -> &mut Self {
        assert!(
            !self.segments.is_empty(),
            "graph operation on an uninitialised TaskGraph"
        );
        self.segments
            .push(Segment::root(Node::new(Box::new(action), worker, priority)));
        self
    }

    /// Appends an action that runs concurrently with the leaf; a later
    /// `then` waits for the whole group. Priority is relative to the
    /// group predecessor's, uniformly for every peer.
    ///
    /// # Panics
    /// If the builder is uninitialised.
    pub fn also(
        &mut self,
        action: impl FnOnce() + Send + 'static,
        worker: WorkerId,
        priority: Priority,
    ) -> &mut Self {
        let priority = self.group_priority().saturating_add(priority);
        self.also_absolute(action, worker, priority)
    }

    /// [`also`](Self::also) with a verbatim priority.
    ///
    /// # Panics
    /// If the builder is uninitialised.
    pub fn also_absolute(
        &mut self,
        action: impl FnOnce() + Send + 'static,
        worker: WorkerId,
        priority: Priority,
    ) -> &mut Self {
        let segment = self.current();
        let gate = match &segment.gate {
            Some(gate) => {
                gate.increment();
                Arc::clone(gate)
            }
            None => {
                // The group opens at the segment head: the leaf can only have
                // moved off it if a previous `also` already created the gate.
                debug_assert_eq!(segment.leaf, 0, "TaskGraph::also_absolute: [1]");
                let gate = Arc::new(JoinCounter::new(2));
                segment.nodes[0].join = Some(Arc::clone(&gate));
                segment.gate = Some(Arc::clone(&gate));
                gate
            }
        };
        let mut node = Node::new(Box::new(action), worker, priority);
        node.join = Some(gate);
        segment.nodes.insert(segment.leaf + 1, node);
        segment.leaf += 1;
        self
    }

    /// Appends an action that runs concurrently with the leaf but joins
    /// nothing: no later `then` ever waits for it. The leaf is left in
    /// place. Priority is relative to the leaf's.
    ///
    /// # Panics
    /// If the builder is uninitialised.
    pub fn fork(
        &mut self,
        action: impl FnOnce() + Send + 'static,
        worker: WorkerId,
        priority: Priority,
    ) -> &mut Self {
        let priority = self.leaf_priority().saturating_add(priority);
        self.fork_absolute(action, worker, priority)
    }

    /// [`fork`](Self::fork) with a verbatim priority.
    ///
    /// # Panics
    /// If the builder is uninitialised.
    pub fn fork_absolute(
        &mut self,
        action: impl FnOnce() + Send + 'static,
        worker: WorkerId,
        priority: Priority,
    ) -> &mut Self {
        let segment = self.current();
        let node = Node::new(Box::new(action), worker, priority);
        segment.nodes.insert(segment.leaf + 1, node);
        self
    }

    /// Seals the graph and returns its root, leaving the builder empty.
    ///
    /// Returns `None` from an empty (never initialised or already closed)
    /// builder. Consecutive segments are linked here: a plain segment's
    /// head receives the next segment as its continuation; a segment with
    /// an also-group hands the continuation to the group's join counter
    /// instead, so the last member to finish posts it.
    pub fn close(&mut self) -> Option<Box<Node>> {
        let mut continuation: Option<Box<Node>> = None;
        for segment in self.segments.drain(..).rev() {
            let Segment {
                nodes,
                leaf: _,
                gate,
            } = segment;
            let mut chained: Option<Box<Node>> = None;
            for mut node in nodes.into_iter().rev() {
                node.next_peer = chained;
                chained = Some(Box::new(node));
            }
            let mut head = chained.expect("TaskGraph::close: [1]");
            match gate {
                Some(gate) => {
                    if let Some(next) = continuation {
                        gate.set_continuation(next);
                    }
                }
                None => head.continuation = continuation,
            }
            continuation = Some(head);
        }
        continuation
    }

    fn current(&mut self) -> &mut Segment {
        self.segments
            .last_mut()
            .expect("graph operation on an uninitialised TaskGraph")
    }

    fn leaf_priority(&self) -> Priority {
        let segment = self
            .segments
            .last()
            .expect("graph operation on an uninitialised TaskGraph");
        segment.nodes[segment.leaf].priority
    }

    fn group_priority(&self) -> Priority {
        let segment = self
            .segments
            .last()
            .expect("graph operation on an uninitialised TaskGraph");
        segment.nodes[0].priority
    }
}

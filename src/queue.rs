use crate::{
    graph::Node,
    sync::{AtomicUsize, Condvar, Mutex, Ordering},
    types::Priority,
};
use std::collections::{BinaryHeap, VecDeque};

/// Contract shared by every per-worker queue variant.
///
/// `push` is non-blocking and thread-safe. `pop` blocks until at least one
/// node is available or the queue has been closed, then moves up to `max`
/// nodes into `out` (`max == 0` means "no cap": the caller gets the full
/// drain) and returns the actual count, which is 0 only when the queue is
/// closed. Blocking uses a mutex and condition variable; no spinning.
pub(crate) trait WorkQueue: Default + Send + Sync + 'static {
    fn push(&self, node: Box<Node>);
    fn pop(&self, max: usize, out: &mut Vec<Box<Node>>) -> usize;
    /// Wakes every blocked `pop` and makes it (and future pushes) return
    /// without touching the queued nodes.
    fn close(&self);
    /// Takes every queued node without blocking. Shutdown uses this to free
    /// work that was posted but never drained.
    fn drain(&self, out: &mut Vec<Box<Node>>);
    /// Best-effort length; meaningful only on [`Counting`] queues.
    fn len(&self) -> usize {
        0
    }
}

fn batch_len(max: usize, available: usize) -> usize {
    if max == 0 {
        available
    } else {
        max.min(available)
    }
}

/// Strict FIFO queue: push tail, pop head.
pub(crate) struct FifoQueue {
    state: Mutex<FifoState>,
    available: Condvar,
}

#[derive(Default)]
struct FifoState {
    nodes: VecDeque<Box<Node>>,
    closed: bool,
}

impl Default for FifoQueue {
    fn default() -> Self {
        Self {
            state: Mutex::new(FifoState::default()),
            available: Condvar::new(),
        }
    }
}

impl WorkQueue for FifoQueue {
    fn push(&self, node: Box<Node>) {
        {
            let mut state = self.state.lock().expect("FifoQueue::push: [1]");
            if state.closed {
                return;
            }
            state.nodes.push_back(node);
        }
        // Exactly one worker consumes this queue.
        self.available.notify_one();
    }

    fn pop(&self, max: usize, out: &mut Vec<Box<Node>>) -> usize {
        let mut state = self.state.lock().expect("FifoQueue::pop: [1]");
        loop {
            if state.closed {
                return 0;
            }
            if !state.nodes.is_empty() {
                break;
            }
            state = self.available.wait(state).expect("FifoQueue::pop: [2]");
        }
        let count = batch_len(max, state.nodes.len());
        out.extend(state.nodes.drain(..count));
        count
    }

    fn close(&self) {
        self.state.lock().expect("FifoQueue::close: [1]").closed = true;
        self.available.notify_all();
    }

    fn drain(&self, out: &mut Vec<Box<Node>>) {
        let mut state = self.state.lock().expect("FifoQueue::drain: [1]");
        out.extend(state.nodes.drain(..));
    }
}

/// Priority-ordered queue: a binary min-heap on node priority, FIFO among
/// equal priorities via a monotone insertion sequence.
pub(crate) struct PriorityQueue {
    state: Mutex<HeapState>,
    available: Condvar,
}

#[derive(Default)]
struct HeapState {
    heap: BinaryHeap<HeapEntry>,
    seq: u64,
    closed: bool,
}

struct HeapEntry {
    priority: Priority,
    seq: u64,
    node: Box<Node>,
}

impl PartialEq for HeapEntry {
    fn eq(&self, other: &Self) -> bool {
        (self.priority, self.seq) == (other.priority, other.seq)
    }
}

impl Eq for HeapEntry {}

impl PartialOrd for HeapEntry {
    fn partial_cmp(&self, other: &Self) -> Option<core::cmp::Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for HeapEntry {
    fn cmp(&self, other: &Self) -> core::cmp::Ordering {
        // `BinaryHeap` is a max-heap; invert so the lowest (priority, seq)
        // pair pops first.
        (other.priority, other.seq).cmp(&(self.priority, self.seq))
    }
}

impl Default for PriorityQueue {
    fn default() -> Self {
        Self {
            state: Mutex::new(HeapState::default()),
            available: Condvar::new(),
        }
    }
}

impl WorkQueue for PriorityQueue {
    fn push(&self, node: Box<Node>) {
        {
            let mut state = self.state.lock().expect("PriorityQueue::push: [1]");
            if state.closed {
                return;
            }
            let seq = state.seq;
            state.seq += 1;
            state.heap.push(HeapEntry {
                priority: node.priority(),
                seq,
                node,
            });
        }
        self.available.notify_one();
    }

    fn pop(&self, max: usize, out: &mut Vec<Box<Node>>) -> usize {
        let mut state = self.state.lock().expect("PriorityQueue::pop: [1]");
        loop {
            if state.closed {
                return 0;
            }
            if !state.heap.is_empty() {
                break;
            }
            state = self.available.wait(state).expect("PriorityQueue::pop: [2]");
        }
        let count = batch_len(max, state.heap.len());
        for _ in 0..count {
            let entry = state.heap.pop().expect("PriorityQueue::pop: [3]");
            out.push(entry.node);
        }
        count
    }

    fn close(&self) {
        self.state.lock().expect("PriorityQueue::close: [1]").closed = true;
        self.available.notify_all();
    }

    fn drain(&self, out: &mut Vec<Box<Node>>) {
        let mut state = self.state.lock().expect("PriorityQueue::drain: [1]");
        while let Some(entry) = state.heap.pop() {
            out.push(entry.node);
        }
    }
}

/// Wrapper adding a best-effort length to either queue variant.
///
/// The length is tracked outside the inner queue's lock, so it can be stale
/// relative to concurrent pushes and pops. That only shifts where the
/// least-busy policies place work, which tolerates it.
pub(crate) struct Counting<Q> {
    inner: Q,
    length: AtomicUsize,
}

impl<Q: Default> Default for Counting<Q> {
    fn default() -> Self {
        Self {
            inner: Q::default(),
            length: AtomicUsize::new(0),
        }
    }
}

impl<Q: WorkQueue> WorkQueue for Counting<Q> {
    fn push(&self, node: Box<Node>) {
        self.inner.push(node);
        self.length.fetch_add(1, Ordering::Relaxed);
    }

    fn pop(&self, max: usize, out: &mut Vec<Box<Node>>) -> usize {
        let count = self.inner.pop(max, out);
        self.length.fetch_sub(count, Ordering::Relaxed);
        count
    }

    fn close(&self) {
        self.inner.close();
    }

    fn drain(&self, out: &mut Vec<Box<Node>>) {
        let before = out.len();
        self.inner.drain(out);
        self.length.fetch_sub(out.len() - before, Ordering::Relaxed);
    }

    fn len(&self) -> usize {
        self.length.load(Ordering::Relaxed)
    }
}

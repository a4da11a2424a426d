//! Task-graph scheduler with per-worker queues and pluggable dispatch
//! policies.
//!
//! This crate runs short user-supplied actions across a fixed pool of worker
//! threads. Work is described not as isolated callables but as **task
//! graphs**: directed structures of actions linked by sequential
//! continuation (`then`), synchronized concurrency (`also`, joined before a
//! common continuation), and fire-and-forget concurrency (`fork`). It:
//! - Guarantees the ordering encoded in the graph: a continuation never runs
//!   before its whole also-group has finished, enforced by an atomic join
//!   counter that fires exactly once.
//! - Distributes unpinned actions across workers by a policy chosen at
//!   construction (round-robin or least-busy, each with an optional
//!   priority-ordered queue variant).
//! - Honours per-action worker affinity and best-effort priorities.
//!
//! Key modules:
//! - `builder`: the fluent [`TaskGraph`](builder::TaskGraph) API that
//!   produces a graph from a sequence of `then`/`also`/`fork` calls.
//! - `graph`: the runtime representation: nodes and the join counters that
//!   gate continuations.
//! - `scheduler`: the dispatch engine: worker threads, per-worker queues,
//!   the selection policy, and graceful shutdown.
//! - `helpers`: orchestrations of the core primitives (conditional posting,
//!   fallible actions with success/failure paths, typed pipelines, event
//!   dispatch by key, and a periodic timer).
//!
//! Quick start:
//! 1. Create a [`Scheduler`](scheduler::Scheduler) with a policy, a worker
//!    count, and a drain step.
//! 2. Build a graph: `TaskGraph::new(a, 0, 0).then(b, 0, 0).also(c, 0, 0)`.
//! 3. Post it with [`Scheduler::post_graph`](scheduler::Scheduler::post_graph)
//!    (or block on completion with [`helpers::post_and_wait`]).
//!
//! Actions are synchronous closures; a panicking action is recovered by the
//! worker and its payload is delivered to the scheduler's exception handler
//! without disturbing siblings or continuations.

/// The fluent graph builder.
///
/// Exposes [`TaskGraph`](builder::TaskGraph), which records a chain of
/// `then`/`also`/`fork` calls and seals it into a postable root node via
/// `close`.
pub mod builder;
/// Runtime graph representation: scheduling nodes and join counters.
pub mod graph;
/// Helper wrappers composed out of the core contract.
///
/// None of these extend the scheduler itself; each is an orchestration of
/// `post`, graph building, and join semantics.
pub mod helpers;
mod queue;
/// The dispatch engine: policies, the scheduler, and its worker loop.
pub mod scheduler;
mod sync;
/// Core aliases used across the crate.
pub mod types;

use crate::{
    builder::TaskGraph,
    scheduler::SchedulerHandle,
    types::{HashMap, Priority, WorkerId},
};
use core::hash::Hash;
use std::sync::Arc;

/// A key→handler registry dispatching events as one-off actions.
///
/// Binding is not synchronised: bind handlers before sharing the hub, the
/// same way the scheduler's exception handler is installed up front.
/// Posting an event looks up the key and schedules the bound handler on its
/// configured worker and priority; unknown keys are ignored.
#[must_use]
pub struct EventHub<K, E> {
    handle: SchedulerHandle,
    bindings: HashMap<K, Binding<E>>,
}

struct Binding<E> {
    handler: Arc<dyn Fn(E) + Send + Sync>,
    worker: WorkerId,
    priority: Priority,
}

impl<K: Eq + Hash, E: Send + 'static> EventHub<K, E> {
    /// Creates an empty hub posting through `handle`.
    pub fn new(handle: SchedulerHandle) -> Self {
        Self {
            handle,
            bindings: HashMap::default(),
        }
    }

    /// Binds `key` to a handler running on `worker` (0 = any) at
    /// `priority`. Rebinding a key replaces the previous handler.
    pub fn bind(
        &mut self,
        key: K,
        handler: impl Fn(E) + Send + Sync + 'static,
        worker: WorkerId,
        priority: Priority,
    ) -> &mut Self {
        self.bindings.insert(
            key,
            Binding {
                handler: Arc::new(handler),
                worker,
                priority,
            },
        );
        self
    }

    /// Removes the binding for `key`, if any.
    pub fn unbind(&mut self, key: &K) -> &mut Self {
        self.bindings.remove(key);
        self
    }

    /// Schedules the handler bound to `key` with `event`. Returns whether a
    /// handler was found.
    pub fn post_event(&self, key: &K, event: E) -> bool {
        let Some(binding) = self.bindings.get(key) else {
            return false;
        };
        let handler = Arc::clone(&binding.handler);
        self.handle.post_graph(&mut TaskGraph::new(
            move || (*handler)(event),
            binding.worker,
            binding.priority,
        ));
        true
    }
}

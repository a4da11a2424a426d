use crate::{
    builder::TaskGraph,
    graph::Node,
    scheduler::SchedulerHandle,
    types::{Priority, WorkerId},
};

/// Wraps a fallible action so that exactly one of two follow-up paths runs:
/// the success graph on `Ok`, the failure path on `Err`, never both.
///
/// The failure path is either a pre-built graph ([`on_failure`](Self::on_failure))
/// or a typed handler receiving the error value
/// ([`on_error`](Self::on_error)); when both are set the handler wins and
/// the failure graph is dropped.
#[must_use]
pub struct Outcome<F, E> {
    handle: SchedulerHandle,
    action: F,
    worker: WorkerId,
    priority: Priority,
    on_success: TaskGraph,
    on_failure: TaskGraph,
    error_handler: Option<ErrorHandler<E>>,
}

struct ErrorHandler<E> {
    handler: Box<dyn FnOnce(E) + Send + 'static>,
    worker: WorkerId,
    priority: Priority,
}

impl<F, E> Outcome<F, E>
where
    F: FnOnce() -> Result<(), E> + Send + 'static,
    E: Send + 'static,
{
    /// Creates the wrapper. `worker` and `priority` place the wrapped
    /// action itself.
    pub fn new(handle: SchedulerHandle, action: F, worker: WorkerId, priority: Priority) -> Self {
        Self {
            handle,
            action,
            worker,
            priority,
            on_success: TaskGraph::default(),
            on_failure: TaskGraph::default(),
            error_handler: None,
        }
    }

    /// The graph to post when the action returns `Ok`.
    pub fn on_success(mut self, graph: TaskGraph) -> Self {
        self.on_success = graph;
        self
    }

    /// The graph to post when the action returns `Err`.
    pub fn on_failure(mut self, graph: TaskGraph) -> Self {
        self.on_failure = graph;
        self
    }

    /// A typed error handler posted as its own action on `worker` with
    /// `priority`. Takes precedence over [`on_failure`](Self::on_failure).
    pub fn on_error(
        mut self,
        handler: impl FnOnce(E) + Send + 'static,
        worker: WorkerId,
        priority: Priority,
    ) -> Self {
        self.error_handler = Some(ErrorHandler {
            handler: Box::new(handler),
            worker,
            priority,
        });
        self
    }

    /// Seals the wrapper into a single postable node. The path not taken is
    /// dropped inside the action without being scheduled.
    pub fn close(self) -> Box<Node> {
        let Self {
            handle,
            action,
            worker,
            priority,
            mut on_success,
            mut on_failure,
            error_handler,
        } = self;
        let success_root = on_success.close();
        let failure_root = on_failure.close();
        TaskGraph::new(
            move || match action() {
                Ok(()) => {
                    if let Some(root) = success_root {
                        handle.post(root);
                    }
                    drop(failure_root);
                }
                Err(error) => {
                    drop(success_root);
                    match error_handler {
                        Some(ErrorHandler {
                            handler,
                            worker,
                            priority,
                        }) => {
                            drop(failure_root);
                            handle.post_graph(&mut TaskGraph::new(
                                move || handler(error),
                                worker,
                                priority,
                            ));
                        }
                        None => {
                            if let Some(root) = failure_root {
                                handle.post(root);
                            }
                        }
                    }
                }
            },
            worker,
            priority,
        )
        .close()
        .expect("Outcome::close: [1]")
    }

    /// Convenience: seals and posts in one step.
    pub fn post(self) {
        let handle = self.handle.clone();
        handle.post(self.close());
    }
}

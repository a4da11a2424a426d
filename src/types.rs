use rustc_hash::FxBuildHasher;
use std::collections::HashMap as _HashMap;

/// A user-supplied action: a zero-argument callable with no return value,
/// executed exactly once by some worker thread.
pub type Action = Box<dyn FnOnce() + Send + 'static>;

/// Scheduling priority. **Lower is higher priority**, so absolute deadline
/// timestamps can be used directly as priorities.
pub type Priority = u64;

/// Worker affinity. `0` means "any worker, let the policy decide"; a
/// positive value `w` pins the action to the queue of worker `w % N` for a
/// pool of `N` workers.
pub type WorkerId = usize;

pub(crate) type HashMap<K, V> = _HashMap<K, V, FxBuildHasher>;

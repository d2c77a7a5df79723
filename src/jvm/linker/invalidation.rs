use crate::jvm::class_graph::MethodId;
use parking_lot::Mutex;

/// A compiled caller whose assumption that `callee` is never overridden just broke
#[derive(Copy, Clone, PartialEq, Eq, Hash, Debug)]
pub struct Invalidation {
    pub caller: MethodId,
    pub callee: MethodId,

    /// Method whose linking overrode `callee`
    pub overrider: MethodId,
}

/// Worklist of callers that need recompiling
#[derive(Default)]
pub struct InvalidationQueue {
    pending: Mutex<Vec<Invalidation>>,
}

impl InvalidationQueue {
    pub fn new() -> InvalidationQueue {
        InvalidationQueue::default()
    }

    pub fn push(&self, invalidation: Invalidation) {
        log::debug!(
            "Invalidating caller {:?}: {:?} was overridden by {:?}",
            invalidation.caller,
            invalidation.callee,
            invalidation.overrider
        );
        self.pending.lock().push(invalidation);
    }

    /// Drain the worklist
    pub fn take(&self) -> Vec<Invalidation> {
        std::mem::take(&mut *self.pending.lock())
    }

    pub fn len(&self) -> usize {
        self.pending.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

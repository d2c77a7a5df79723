use bumpalo::Bump;
use std::ops::Deref;
use std::sync::atomic::{AtomicUsize, Ordering};

/// Scratch memory for linking, resolution, and class definition
///
/// Temporary data (candidate miranda methods, parsed member lists, lookup worklists) is
/// allocated in a bump arena
/// that lives exactly as long as the checkpoint it was taken from. Nothing allocated in a
/// checkpoint outlives it, so release is implicit on every exit path, including errors.
#[derive(Default)]
pub struct DumpArena {
    outstanding: AtomicUsize,
    peak: AtomicUsize,
    allocated: AtomicUsize,
}

impl DumpArena {
    pub fn new() -> DumpArena {
        DumpArena::default()
    }

    /// Start a scope of scratch allocations
    pub fn checkpoint(&self) -> DumpScope<'_> {
        let outstanding = self.outstanding.fetch_add(1, Ordering::AcqRel) + 1;
        self.peak.fetch_max(outstanding, Ordering::AcqRel);
        DumpScope {
            arena: self,
            bump: Bump::new(),
        }
    }

    /// Number of live checkpoints
    pub fn outstanding(&self) -> usize {
        self.outstanding.load(Ordering::Acquire)
    }

    /// Highest number of simultaneously live checkpoints seen
    pub fn peak(&self) -> usize {
        self.peak.load(Ordering::Acquire)
    }

    /// Total bytes handed out by checkpoints that have been released
    pub fn allocated_bytes(&self) -> usize {
        self.allocated.load(Ordering::Acquire)
    }
}

/// Live checkpoint: allocate from it like a [`Bump`], everything is freed on drop
pub struct DumpScope<'a> {
    arena: &'a DumpArena,
    bump: Bump,
}

impl<'a> Deref for DumpScope<'a> {
    type Target = Bump;

    fn deref(&self) -> &Bump {
        &self.bump
    }
}

impl<'a> Drop for DumpScope<'a> {
    fn drop(&mut self) {
        let used = self.bump.allocated_bytes();
        self.arena.allocated.fetch_add(used, Ordering::AcqRel);
        self.arena.outstanding.fetch_sub(1, Ordering::AcqRel);
        log::trace!("Released dump checkpoint ({} bytes)", used);
    }
}

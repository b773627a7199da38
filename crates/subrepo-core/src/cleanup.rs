//! Scoped cleanup
//!
//! [`Defer`] collects undo actions while a multi-step operation makes
//! progress. If the scope is left early (an error propagated with `?`, a
//! panic) the actions run in reverse registration order. Once the operation
//! has fully succeeded, [`Defer::release`] drops them without running.

/// Handle to a single deferred action.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Deferred(usize);

/// A stack of undo actions executed on drop.
#[derive(Default)]
pub struct Defer<'a> {
    actions: Vec<Option<Box<dyn FnOnce() + 'a>>>,
}

impl<'a> Defer<'a> {
    pub fn new() -> Self {
        Self {
            actions: Vec::new(),
        }
    }

    /// Register an action to run when this scope is left without release.
    pub fn defer(&mut self, action: impl FnOnce() + 'a) -> Deferred {
        self.actions.push(Some(Box::new(action)));
        Deferred(self.actions.len() - 1)
    }

    /// Drop one action without running it.
    pub fn cancel(&mut self, handle: Deferred) {
        if let Some(slot) = self.actions.get_mut(handle.0) {
            slot.take();
        }
    }

    /// Run one action right away; it will not run again on drop.
    pub fn run(&mut self, handle: Deferred) {
        if let Some(action) = self.actions.get_mut(handle.0).and_then(Option::take) {
            action();
        }
    }

    /// Drop all pending actions without running them.
    pub fn release(&mut self) {
        self.actions.clear();
    }

    /// Number of actions still pending.
    pub fn pending(&self) -> usize {
        self.actions.iter().filter(|a| a.is_some()).count()
    }
}

impl Drop for Defer<'_> {
    fn drop(&mut self) {
        while let Some(slot) = self.actions.pop() {
            if let Some(action) = slot {
                action();
            }
        }
    }
}

impl std::fmt::Debug for Defer<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Defer")
            .field("pending", &self.pending())
            .finish()
    }
}

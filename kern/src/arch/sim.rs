//! Host-runnable architecture backend.
//!
//! Stands in for a real context switch when the kernel is compiled for the
//! host (i.e. whenever `target_os` isn't `"none"`). There is no real register
//! file to save here, just a `usize` standing for "the stack pointer", which
//! is enough for the scheduling and TCB-pool tests to exercise every code
//! path that touches `ArchState` without any inline assembly.

use super::ArchState;

#[derive(Copy, Clone)]
pub struct SavedState {
    sp: usize,
}

impl SavedState {
    pub const ZERO: SavedState = SavedState { sp: 0 };
}

impl ArchState for SavedState {
    fn stack_pointer(&self) -> usize {
        self.sp
    }

    fn set_stack_pointer(&mut self, sp: usize) {
        self.sp = sp;
    }
}

/// Builds the saved context a freshly `run` thread starts life with.
///
/// The host backend has no exception-frame trick to play, so `entry`,
/// `tcb`, and `priority` are all unused here; `startup::dispatch_to_thread`
/// calls a thread's `start` descriptor directly instead of switching
/// stacks. The stack pointer is still recorded so the invariant that every
/// allocated TCB has a plausible `context` holds identically on both
/// backends.
pub fn make_initial_context(
    _entry: crate::task::ThreadFunc,
    _tcb: *mut crate::task::Tcb,
    stack_top: *mut u8,
    _priority: u8,
) -> SavedState {
    SavedState { sp: stack_top as usize }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn stack_pointer_round_trips() {
        let mut s = SavedState::ZERO;
        s.set_stack_pointer(0x2000_0400);
        assert_eq!(s.stack_pointer(), 0x2000_0400);
    }
}

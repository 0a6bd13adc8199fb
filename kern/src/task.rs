//! Thread control blocks and the priority ready-queue.
//!
//! This module owns the kernel's global mutable state -- the TCB pool, the
//! per-priority ready-queues, and the current-thread pointer -- as a single
//! aggregate (`Kernel`) so that the dispatcher and the interrupt entry have
//! exactly one thing to borrow. Everything that walks or mutates a
//! ready-queue goes through `attach_current`/`detach_current`, mirroring the
//! `putcurrent`/`getcurrent` pair of the kernel this is modeled on.

use bitflags::bitflags;

use crate::alloc::Heap;
use crate::config::{PRIORITY_NUM, THREAD_NAME_SIZE, THREAD_NUM, THREAD_STACK_SIZE};
use crate::mailbox::Mailbox;

bitflags! {
    /// TCB flags. READY is the only flag defined; it mirrors exactly whether
    /// the TCB is linked into a ready-queue.
    pub struct Flags: u32 {
        const READY = 1 << 0;
    }
}

/// Opaque identifier for a thread. Wraps a TCB pool index rather than
/// exposing the TCB's address to client code (see the design notes on
/// "pointer as opaque id").
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
#[repr(transparent)]
pub struct TaskId(u16);

impl TaskId {
    pub(crate) fn from_index(index: usize) -> Self {
        TaskId(index as u16)
    }

    pub fn index(self) -> usize {
        self.0 as usize
    }
}

/// A thread's entry point, in the C calling convention a real bootstrap
/// trampoline would call it with.
pub type ThreadFunc = extern "C" fn(argc: i32, argv: *const *const u8);

/// Start-up parameters captured at `run` time and read exactly once, by the
/// thread bootstrap trampoline (see `interrupt::thread_init`).
#[derive(Copy, Clone)]
pub struct StartDescriptor {
    pub entry: ThreadFunc,
    pub argc: i32,
    pub argv: *const *const u8,
}

/// A request written by the thread-facing veneer immediately before issuing
/// the trap, and consumed exactly once by the dispatcher. `response` points
/// at caller-owned storage that remains valid because per-thread stacks are
/// never reclaimed (a non-goal, see the top-level design).
#[derive(Copy, Clone)]
pub struct PendingRequest {
    pub request: crate::syscall::Request,
    pub response: *mut crate::syscall::Response,
}

/// Thread control block.
#[derive(Copy, Clone)]
pub struct Tcb {
    /// Link field for singly-linked ready-queue membership. `None` when the
    /// TCB is the tail of its queue, or not linked at all.
    next: Option<TaskId>,
    name: [u8; THREAD_NAME_SIZE + 1],
    name_len: u8,
    pub priority: u8,
    /// Base of this thread's bump-allocated stack band. Not reclaimed on
    /// exit (a non-goal).
    pub stack: *mut u8,
    flags: Flags,
    /// `None` iff this slot is free -- the pool-scan invariant from the
    /// design notes ("a slot is free iff its entry function pointer is
    /// null").
    pub start: Option<StartDescriptor>,
    pub pending: Option<PendingRequest>,
    pub context: crate::arch::SavedState,
}

impl Tcb {
    const fn empty() -> Self {
        Tcb {
            next: None,
            name: [0; THREAD_NAME_SIZE + 1],
            name_len: 0,
            priority: 0,
            stack: core::ptr::null_mut(),
            flags: Flags::empty(),
            start: None,
            pending: None,
            context: crate::arch::SavedState::ZERO,
        }
    }

    /// Zeroes this TCB back to the free state. Used by both `run`'s initial
    /// setup and `exit`.
    pub fn reset(&mut self) {
        *self = Tcb::empty();
    }

    pub fn set_name(&mut self, name: &str) {
        let bytes = name.as_bytes();
        let n = bytes.len().min(THREAD_NAME_SIZE);
        self.name[..n].copy_from_slice(&bytes[..n]);
        self.name[n] = 0;
        self.name_len = n as u8;
    }

    pub fn name(&self) -> &str {
        core::str::from_utf8(&self.name[..self.name_len as usize])
            .unwrap_or("?")
    }

    pub fn is_ready(&self) -> bool {
        self.flags.contains(Flags::READY)
    }
}

/// A single priority level's FIFO of ready threads.
#[derive(Copy, Clone, Default)]
struct Queue {
    head: Option<TaskId>,
    tail: Option<TaskId>,
}

/// All kernel state reachable from the dispatcher and the shared interrupt
/// entry, bundled into one aggregate per the design notes ("a single
/// kernel-state aggregate owned by the bootstrap and mutated exclusively
/// inside the dispatcher / interrupt entry").
pub struct Kernel {
    pub tasks: [Tcb; THREAD_NUM],
    ready: [Queue; PRIORITY_NUM],
    /// The currently running thread. Never linked into a ready-queue while
    /// a system call is being processed; handlers that want to keep it
    /// runnable must call `attach_current` explicitly.
    pub current: Option<TaskId>,
    pub mailboxes: [Mailbox; crate::config::MSGBOX_ID_NUM],
    pub heap: Heap,
    pub(crate) handlers: [Option<crate::interrupt::DriverHandler>;
        crate::config::SOFTVEC_TYPE_NUM],
    /// Backing storage for every thread's stack, indexed by TCB slot. A
    /// thread's stack band is `stacks[tcb_index]` for as long as that slot
    /// is allocated to it -- there is no separate stack allocator, and
    /// `run` hands out the band matching the TCB slot it just claimed.
    pub stacks: [[u8; THREAD_STACK_SIZE]; THREAD_NUM],
}

impl Kernel {
    pub const fn new() -> Self {
        Kernel {
            tasks: [Tcb::empty(); THREAD_NUM],
            ready: [Queue { head: None, tail: None }; PRIORITY_NUM],
            current: None,
            mailboxes: [Mailbox::empty(); crate::config::MSGBOX_ID_NUM],
            heap: Heap::new(),
            handlers: [None; crate::config::SOFTVEC_TYPE_NUM],
            stacks: [[0; THREAD_STACK_SIZE]; THREAD_NUM],
        }
    }

    /// `getcurrent()`: unlinks `current` from the head of its priority
    /// queue. No-op if `current` is `None` or already not READY -- this is
    /// what lets every dispatch handler call it unconditionally on entry.
    pub fn detach_current(&mut self) {
        let id = match self.current {
            Some(id) => id,
            None => return,
        };
        let idx = id.index();
        if !self.tasks[idx].is_ready() {
            return;
        }
        let prio = self.tasks[idx].priority as usize;
        let next = self.tasks[idx].next.take();
        self.ready[prio].head = next;
        if next.is_none() {
            self.ready[prio].tail = None;
        }
        self.tasks[idx].flags.remove(Flags::READY);
    }

    /// `putcurrent()`: appends `current` to the tail of its priority queue.
    /// No-op if `current` is `None` or already READY.
    pub fn attach_current(&mut self) {
        let id = match self.current {
            Some(id) => id,
            None => return,
        };
        let idx = id.index();
        if self.tasks[idx].is_ready() {
            return;
        }
        let prio = self.tasks[idx].priority as usize;
        self.tasks[idx].next = None;
        match self.ready[prio].tail {
            Some(tail) => self.tasks[tail.index()].next = Some(id),
            None => self.ready[prio].head = Some(id),
        }
        self.ready[prio].tail = Some(id);
        self.tasks[idx].flags.insert(Flags::READY);
    }

    /// Linear scan for a free TCB slot, per the "allocator for TCBs is
    /// linear scan of the pool" invariant.
    pub fn find_free_slot(&self) -> Option<TaskId> {
        self.tasks
            .iter()
            .position(|t| t.start.is_none())
            .map(TaskId::from_index)
    }

    /// Scans priority queues from 0 upward and makes the first non-empty
    /// queue's head the current thread. Panics the system if every queue is
    /// empty.
    pub fn schedule(&mut self) {
        for q in self.ready.iter() {
            if let Some(head) = q.head {
                self.current = Some(head);
                return;
            }
        }
        crate::err::sysdown(crate::err::Fault::NoRunnableTask);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn make_runnable(k: &mut Kernel, idx: usize, priority: u8) -> TaskId {
        let id = TaskId::from_index(idx);
        k.tasks[idx].reset();
        k.tasks[idx].priority = priority;
        k.tasks[idx].start = Some(StartDescriptor {
            entry: dummy_entry,
            argc: 0,
            argv: core::ptr::null(),
        });
        k.current = Some(id);
        k.attach_current();
        id
    }

    extern "C" fn dummy_entry(_argc: i32, _argv: *const *const u8) {}

    #[test]
    fn attach_detach_round_trips() {
        let mut k = Kernel::new();
        let id = make_runnable(&mut k, 0, 5);
        assert!(k.tasks[id.index()].is_ready());

        k.current = Some(id);
        k.detach_current();
        assert!(!k.tasks[id.index()].is_ready());

        // Idempotent: detaching an already-detached current is a no-op.
        k.detach_current();
        assert!(!k.tasks[id.index()].is_ready());
    }

    #[test]
    fn fifo_order_within_priority() {
        let mut k = Kernel::new();
        let a = make_runnable(&mut k, 0, 3);
        let b = make_runnable(&mut k, 1, 3);
        let c = make_runnable(&mut k, 2, 3);

        k.schedule();
        assert_eq!(k.current, Some(a));
        k.detach_current();
        k.current = Some(a);
        k.attach_current(); // round-robin: a goes to the tail

        k.schedule();
        assert_eq!(k.current, Some(b));
        k.detach_current();
        k.current = Some(b);
        k.attach_current();

        k.schedule();
        assert_eq!(k.current, Some(c));
    }

    #[test]
    fn schedule_prefers_lower_priority_number() {
        let mut k = Kernel::new();
        let _low = make_runnable(&mut k, 0, 10);
        let high = make_runnable(&mut k, 1, 1);

        k.schedule();
        assert_eq!(k.current, Some(high));
    }

    #[test]
    fn free_slot_scan_finds_reset_tcb() {
        let mut k = Kernel::new();
        assert_eq!(k.find_free_slot(), Some(TaskId::from_index(0)));
        let _ = make_runnable(&mut k, 0, 1);
        assert_eq!(k.find_free_slot(), Some(TaskId::from_index(1)));
    }
}

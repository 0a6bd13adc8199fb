//! Illustrative ARMv7-M backend.
//!
//! This sketches the shape a real Cortex-M port would take -- the exception
//! frame layout `make_initial_context` has to build so that the first
//! `exc_return` into a brand-new thread looks just like returning from any
//! other exception -- without implementing the trap entry, the SVCall
//! handler, or the actual PendSV context-switch sequence. Those need inline
//! assembly and a linked board support crate, both out of scope here (see
//! the top-level design's non-goals).
//!
//! # ARMv7-M exception frame
//!
//! On exception entry the processor automatically stacks eight words:
//! `r0-r3, r12, lr, pc, xpsr`. Building a fake one of these and pointing the
//! thread's saved stack pointer at it is the standard trick for seeding a
//! new thread without a dedicated "first run" code path in the scheduler --
//! the exception return sequence can't tell the frame apart from a real one.

use super::ArchState;

#[repr(C)]
struct ExceptionFrame {
    r0: u32,
    r1: u32,
    r2: u32,
    r3: u32,
    r12: u32,
    lr: u32,
    pc: u32,
    xpsr: u32,
}

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

/// Carves an `ExceptionFrame` off the top of `stack_top` and points a fresh
/// `SavedState` at it.
///
/// `pc` lands on `interrupt::thread_init` with its Thumb bit set, matching
/// how the hardware would actually decode it, and `r0` is preloaded with
/// `tcb` so `thread_init` can pull the real `(entry, argc, argv)` back out
/// of the TCB once it's running -- `entry` itself is accepted only to keep
/// this backend's signature uniform with `sim`'s.
///
/// `priority` is accepted for interface parity with the kernel this nucleus
/// is modeled on, whose initial context packs CCR/interrupt-mask bits into
/// the same word as the saved PC. ARMv7-M's automatically-stacked exception
/// frame has no such field -- there is no CCR, and PRIMASK/BASEPRI live in
/// separate special registers the hardware does not restore from the stack
/// on exception return. Masking a priority-0 thread's interrupts on this
/// architecture is the context-restore sequence's job (writing BASEPRI
/// explicitly before the exception return), not something `xpsr` can encode;
/// that sequence is inline assembly and out of scope here, so `priority` is
/// unused.
pub fn make_initial_context(
    _entry: crate::task::ThreadFunc,
    tcb: *mut crate::task::Tcb,
    stack_top: *mut u8,
    _priority: u8,
) -> SavedState {
    let frame_size = core::mem::size_of::<ExceptionFrame>();
    let frame_addr = (stack_top as usize - frame_size) & !0x7;
    let frame = frame_addr as *mut ExceptionFrame;
    unsafe {
        (*frame).r0 = tcb as u32;
        (*frame).r1 = 0;
        (*frame).r2 = 0;
        (*frame).r3 = 0;
        (*frame).r12 = 0;
        (*frame).lr = 0xFFFF_FFFD; // return to thread mode, use PSP
        (*frame).pc = crate::interrupt::thread_init as usize as u32 | 1;
        (*frame).xpsr = 1 << 24; // Thumb bit
    }
    SavedState { sp: frame_addr }
}

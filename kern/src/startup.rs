//! Kernel startup.
//!
//! The board support crate (outside this workspace, per the top-level
//! design's non-goals) is responsible for getting the processor into a
//! state where Rust code can run and RAM is zeroed, then calling
//! `kernel_start` exactly once with the very first thread's entry point.
//! Everything from there on is this kernel's problem.

use crate::config::THREAD_STACK_SIZE;
use crate::task::{Kernel, StartDescriptor, ThreadFunc};

static mut KERNEL: Kernel = Kernel::new();

/// Runs one request against the live kernel state and returns its response
/// directly, without the trap/context-switch machinery real hardware needs.
///
/// Only meaningful once `kernel_start` has initialized `KERNEL` and handed
/// control to a thread; `userlib`'s host-only `raw::trap` backend calls this
/// so that application code can be exercised by `kern`'s own test suite
/// without a board.
///
/// This harness has no coroutine underneath it, so a request that blocks
/// (`Wait`, `Sleep`, an empty-mailbox `Recv`) cannot actually suspend the
/// calling Rust function and resume it later with a real response -- it
/// returns `Response::Unit` immediately instead. Tests that need to observe
/// blocking behavior call `kern::syscall::dispatch` directly rather than
/// going through this path; see `kern`'s own `syscall`/`interrupt` test
/// modules.
///
/// # Safety
///
/// Must only be called from thread context on the same core that called
/// `kernel_start`, matching the single-core, run-to-completion dispatch
/// model this nucleus assumes throughout.
#[cfg(not(target_os = "none"))]
pub unsafe fn host_trap(request: crate::syscall::Request) -> crate::syscall::Response {
    let kernel = &mut KERNEL;
    let caller = kernel.current.expect("host_trap called outside thread context");
    let mut response = crate::syscall::Response::Unit;
    crate::interrupt::handle_syscall(kernel, caller, request, &mut response as *mut _);
    response
}

/// Brings up the nucleus and transfers control to `boot_entry`, the first
/// thread. Never returns: once the ready-queue has at least one thread in
/// it, control stays inside thread code and the interrupt vectors forever.
///
/// # Safety
///
/// Must be called at most once, before any interrupt is unmasked, and with
/// interrupts still masked on entry -- the kernel's static state isn't
/// synchronized against concurrent access, by design (see the top-level
/// design's note on single-core, run-to-completion dispatch).
pub unsafe fn kernel_start(boot_entry: ThreadFunc) -> ! {
    let kernel = &mut KERNEL;
    let id = kernel.find_free_slot().expect("thread pool has room for the boot thread");
    let idx = id.index();

    kernel.tasks[idx].reset();
    kernel.tasks[idx].set_name("boot");
    kernel.tasks[idx].priority = 0;
    kernel.tasks[idx].start = Some(StartDescriptor { entry: boot_entry, argc: 0, argv: core::ptr::null() });

    let stack_base = kernel.stacks[idx].as_mut_ptr();
    let stack_top = stack_base.add(THREAD_STACK_SIZE);
    kernel.tasks[idx].stack = stack_base;
    let tcb_ptr: *mut crate::task::Tcb = &mut kernel.tasks[idx];
    kernel.tasks[idx].context = crate::arch::make_initial_context(boot_entry, tcb_ptr, stack_top, 0);

    kernel.current = Some(id);
    kernel.attach_current();
    kernel.schedule();

    dispatch_to_thread(kernel)
}

/// Transfers control to whichever thread `kernel.current` names.
///
/// On a real board this is a context switch: restore the saved register
/// file from `context` and branch into it, never returning to this
/// function's caller. The `sim` backend has no register file to restore, so
/// it calls the thread's entry function directly and loops, re-dispatching
/// after every syscall the thread's entry function happens to make through
/// the host-side `userlib` veneer.
fn dispatch_to_thread(kernel: &mut Kernel) -> ! {
    loop {
        let id = kernel.current.expect("schedule always leaves a current thread");
        let start = kernel.tasks[id.index()]
            .start
            .expect("the current thread always has a start descriptor");
        (start.entry)(start.argc, start.argv);
        // The thread returned instead of calling `exit`: treat that as
        // exiting on its behalf, matching the original's convention that
        // falling off the end of a thread function is equivalent to
        // `thread_exit()`.
        kernel.tasks[id.index()].reset();
        kernel.schedule();
    }
}

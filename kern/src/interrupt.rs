//! Shared interrupt entry.
//!
//! Every trap into the kernel -- a thread's system call, a device interrupt
//! routed to a registered driver thread, or the processor's soft-error
//! vector catching a client programming mistake -- funnels through one of
//! the three functions here, and every one of them ends the same way: decide
//! what runs next and hand that decision back to the architecture layer as a
//! `TaskId` to resume.
//!
//! This mirrors the kernel this crate is modeled on having exactly one
//! `schedule()` call site reachable from three different trap vectors,
//! rather than duplicating the ready-queue bookkeeping per vector.

use crate::task::{Kernel, PendingRequest, TaskId, ThreadFunc};

/// A driver thread registered against one soft-vector slot by `SetIntr`. The
/// owner is recorded so a future revision could restrict who may `setintr`
/// a given slot a second time; the current dispatcher always allows
/// overwriting a slot, matching the system this nucleus is modeled on.
#[derive(Copy, Clone)]
pub struct DriverHandler {
    pub owner: TaskId,
    pub handler: ThreadFunc,
}

/// Runs one system call issued by `caller` via trap, and returns the thread
/// that should run next.
///
/// The caller is detached from its ready-queue unconditionally before
/// dispatch (matching `getcurrent()` at the top of the original's
/// `syscall_intr`); `syscall::dispatch` re-attaches it via `attach_current`
/// only if the request didn't block.
pub fn handle_syscall(
    kernel: &mut Kernel,
    caller: TaskId,
    request: crate::syscall::Request,
    response_slot: *mut crate::syscall::Response,
) -> TaskId {
    kernel.current = Some(caller);
    kernel.detach_current();

    match crate::syscall::dispatch(kernel, caller, request) {
        crate::syscall::Outcome::Done(response) => {
            unsafe {
                response_slot.write(response);
            }
            kernel.current = Some(caller);
            kernel.attach_current();
        }
        crate::syscall::Outcome::Blocked => {
            // `caller` stays detached; whatever wakes it (`wakeup`, a
            // matching `send`, or nothing, if it called `exit`) is
            // responsible for re-attaching it. Stash the request and the
            // caller's response slot so that whoever completes it later
            // (`deliver`) has somewhere to write the result back to --
            // mirrors the original storing `current->syscall.{type,param}`
            // before blocking so `recvmsg` can write through
            // `mboxp->receiver->syscall.param` once a sender shows up.
            kernel.tasks[caller.index()].pending = Some(PendingRequest { request, response: response_slot });
        }
    }

    kernel.schedule();
    kernel.current.expect("schedule always leaves a current thread")
}

/// Bootstrap entry point a freshly spawned thread's saved context starts at
/// on real hardware: `make_initial_context` points the initial program
/// counter here and preloads the first argument register with the thread's
/// own TCB address. Pulls `(entry, argc, argv)` back out of the TCB's
/// `StartDescriptor` and calls `entry`; a thread function that returns
/// instead of calling `exit` falls through to `thread_end`, mirroring
/// `thread_init`/`thread_end` in the kernel this nucleus is modeled on.
///
/// Only ever reached by a real context restore. The `sim` backend calls
/// straight through a `Tcb`'s `start` descriptor instead and never actually
/// switches onto this entry point.
///
/// # Safety
/// `tcb` must point at a live `Tcb` whose `start` is populated -- true by
/// construction for any thread a real restore sequence lands on.
pub unsafe extern "C" fn thread_init(tcb: *mut crate::task::Tcb) -> ! {
    let start = (*tcb).start.expect("a dispatched thread always has a start descriptor");
    (start.entry)(start.argc, start.argv);
    thread_end()
}

/// Where a thread function that returns instead of calling `exit` ends up.
/// A real backend's `thread_end` issues the `exit` trap; that trap, and the
/// asm that gets a Rust function running on no stack of its own here in the
/// first place, is out of scope for this illustrative backend.
pub extern "C" fn thread_end() -> ! {
    unimplemented!("thread_end issues the exit trap; the trap entry itself isn't modeled here")
}

/// Runs a request on a thread's behalf from interrupt context, bypassing the
/// trap path entirely. Used by a device ISR to fulfil the "wakeup the
/// registered driver thread" half of the interrupt contract described at
/// `setintr`, and by `softerr_intr` to give a faulting thread one last
/// `exit` before it's torn down.
pub fn handle_service_call(kernel: &mut Kernel, caller: TaskId, request: crate::syscall::Request) -> TaskId {
    // A service call never has anyone waiting on its response (it isn't
    // issued by the thread it concerns), so discard-on-completion is
    // correct; nothing reads this.
    let mut discard = crate::syscall::Response::Unit;
    handle_syscall(kernel, caller, request, &mut discard as *mut _)
}

/// The shared ARM soft-error vector (illegal instruction, bus fault, ...)
/// lands here. Unlike a kernel-invariant `Fault`, a `SoftError` tears down
/// only the thread that caused it -- this is the one place client
/// misbehavior is contained rather than escalated to `sysdown`.
///
/// Logs the offender's name with a "DOWN." suffix before tearing it down,
/// since `Request::Exit` resets the TCB (including its name) as part of
/// handling the exit.
pub fn softerr_intr(kernel: &mut Kernel, offender: TaskId, _error: crate::err::SoftError) -> TaskId {
    klog!("{} DOWN.\n", kernel.tasks[offender.index()].name());
    handle_service_call(kernel, offender, crate::syscall::Request::Exit)
}

/// Dispatches a hardware interrupt on `vector` to its registered driver
/// thread, if any, by waking it with `Request::Wakeup` run as a service
/// call. An interrupt with no registered handler is simply dropped, per the
/// "a vector with no registered driver is intentionally inert" design
/// decision -- this nucleus does not queue or count unhandled interrupts.
pub fn dispatch_device_interrupt(kernel: &mut Kernel, vector: usize) -> TaskId {
    if let Some(driver) = kernel.handlers[vector] {
        handle_service_call(kernel, driver.owner, crate::syscall::Request::Wakeup { target: driver.owner })
    } else {
        kernel.schedule();
        kernel.current.expect("schedule always leaves a current thread")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::syscall::{Request, Response};

    extern "C" fn dummy(_argc: i32, _argv: *const *const u8) {}

    /// `dispatch`'s `Run` handler ignores the caller id entirely (spawning
    /// doesn't depend on who asked), so any placeholder id works here.
    fn spawn(kernel: &mut Kernel, priority: u8) -> TaskId {
        let placeholder_caller = TaskId::from_index(0);
        match crate::syscall::dispatch(
            kernel,
            placeholder_caller,
            Request::Run { name: "t", priority, entry: dummy, argc: 0, argv: core::ptr::null() },
        ) {
            crate::syscall::Outcome::Done(Response::Run(Ok(id))) => id,
            _ => panic!("spawn failed"),
        }
    }

    #[test]
    fn syscall_with_no_blocking_resumes_caller_if_highest_priority() {
        let mut k = Kernel::new();
        let a = spawn(&mut k, 5);
        let mut resp = Response::Unit;
        let next = handle_syscall(&mut k, a, Request::GetId, &mut resp as *mut _);
        assert_eq!(next, a);
    }

    #[test]
    fn exit_removes_thread_from_rotation() {
        let mut k = Kernel::new();
        let a = spawn(&mut k, 5);
        let b = spawn(&mut k, 5);
        let mut resp = Response::Unit;
        let next = handle_syscall(&mut k, a, Request::Exit, &mut resp as *mut _);
        assert_eq!(next, b);
        assert!(k.tasks[a.index()].start.is_none());
    }

    #[test]
    fn unhandled_interrupt_just_reschedules() {
        let mut k = Kernel::new();
        let a = spawn(&mut k, 5);
        let next = dispatch_device_interrupt(&mut k, 3);
        assert_eq!(next, a);
    }

    #[test]
    fn softerr_tears_down_only_the_offender() {
        let mut k = Kernel::new();
        let offender = spawn(&mut k, 5);
        let other = spawn(&mut k, 5);
        let next = softerr_intr(&mut k, offender, crate::err::SoftError);
        assert_eq!(next, other);
        assert!(k.tasks[offender.index()].start.is_none());
    }

    #[test]
    fn wakeup_delivers_pending_response_to_a_sleeping_thread() {
        let mut k = Kernel::new();
        let sleeper = spawn(&mut k, 5);
        let waker = spawn(&mut k, 5);

        let mut sleep_resp = Response::Priority(9); // placeholder, must be overwritten
        let next = handle_syscall(&mut k, sleeper, Request::Sleep, &mut sleep_resp as *mut _);
        assert_eq!(next, waker);
        assert!(!k.tasks[sleeper.index()].is_ready());

        let mut wakeup_resp = Response::Unit;
        handle_syscall(&mut k, waker, Request::Wakeup { target: sleeper }, &mut wakeup_resp as *mut _);

        assert!(k.tasks[sleeper.index()].is_ready());
        match sleep_resp {
            Response::Unit => {}
            _ => panic!("expected the woken sleeper's response slot to be overwritten with Response::Unit"),
        }
    }
}

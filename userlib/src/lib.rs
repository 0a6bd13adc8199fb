// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Thread-facing veneer over the kernel's system calls.
//!
//! Each syscall stub is a thin wrapper: build a `kern::syscall::Request`,
//! hand it to `raw::trap`, and unwrap the matching `Response` variant. The
//! unwrap is safe because the dispatcher only ever produces the `Response`
//! variant that corresponds to the `Request` variant it was given -- see
//! `kern::syscall::dispatch`.
//!
//! `raw::trap` is the one place this crate is architecture-specific. On real
//! hardware it issues the trap instruction that drops into the kernel; the
//! actual trap sequence is outside this crate's scope (see the top-level
//! design's non-goals on the context-switch primitive). The host build used
//! by `kern`'s own test suite calls straight into the kernel's dispatcher
//! instead, so application logic under test never needs real hardware.

#![cfg_attr(target_os = "none", no_std)]

pub mod raw;

use kern::err::Sentinel;
use kern::syscall::{Request, Response};
use kern::task::{TaskId, ThreadFunc};

/// Starts a new thread. Returns `Sentinel::NoFreeThread` if the pool is
/// full.
pub fn run(name: &'static str, priority: u8, entry: ThreadFunc, argc: i32, argv: *const *const u8) -> Result<TaskId, Sentinel> {
    match raw::trap(Request::Run { name, priority, entry, argc, argv }) {
        Response::Run(result) => result,
        _ => unreachable!("Run always answers with Response::Run"),
    }
}

/// Ends the calling thread. Its stack is not reclaimed (a non-goal); its
/// slot in the thread pool is, and becomes eligible for a future `run`.
pub fn exit() -> ! {
    raw::trap(Request::Exit);
    unreachable!("a thread that has called exit is never resumed")
}

/// Yields to any other thread ready at the calling thread's own priority.
/// Does not block: the caller is immediately put back at the tail of its
/// priority's ready-queue, which is what makes equal-priority threads
/// round-robin.
pub fn wait() {
    raw::trap(Request::Wait);
}

/// Blocks the calling thread until some other thread calls `wakeup` on it.
/// Unlike `wait`, this does not return until woken.
pub fn sleep() {
    raw::trap(Request::Sleep);
}

/// Makes `target` runnable again. A no-op if `target` is already runnable.
pub fn wakeup(target: TaskId) {
    raw::trap(Request::Wakeup { target });
}

/// Returns the calling thread's own id.
pub fn getid() -> TaskId {
    match raw::trap(Request::GetId) {
        Response::Id(id) => id,
        _ => unreachable!("GetId always answers with Response::Id"),
    }
}

/// Changes the calling thread's priority with immediate effect: the next
/// `schedule` sees it at its new priority level. Returns the priority the
/// thread had before the change.
pub fn chpri(priority: u8) -> u8 {
    getpri_or_chpri(priority as i32)
}

/// Returns the calling thread's current priority without changing it.
pub fn getpri() -> u8 {
    getpri_or_chpri(-1)
}

fn getpri_or_chpri(priority: i32) -> u8 {
    match raw::trap(Request::ChangePriority { priority }) {
        Response::Priority(old) => old,
        _ => unreachable!("ChangePriority always answers with Response::Priority"),
    }
}

/// Allocates `size` bytes from the kernel's size-class heap. Returns
/// `Sentinel::OutOfMemory` if the matching class has no free block.
pub fn kmalloc(size: usize) -> Result<*mut u8, Sentinel> {
    match raw::trap(Request::Kmalloc { size }) {
        Response::Kmalloc(result) => result,
        _ => unreachable!("Kmalloc always answers with Response::Kmalloc"),
    }
}

/// Returns a block previously obtained from `kmalloc`.
pub fn kmfree(ptr: *mut u8) {
    raw::trap(Request::Kmfree { ptr });
}

/// Sends `size` bytes starting at `data` to `mailbox`. Does not block: the
/// message is either delivered straight to a waiting receiver or queued.
/// Returns the number of bytes accepted.
pub fn send(mailbox: usize, data: *mut u8, size: usize) -> usize {
    match raw::trap(Request::Send { mailbox, data, size }) {
        Response::Send(sent) => sent,
        _ => unreachable!("Send always answers with Response::Send"),
    }
}

/// Receives a message from `mailbox`, blocking if none is queued yet.
/// Returns the sender's id and the location/length of the payload.
pub fn recv(mailbox: usize) -> (TaskId, *mut u8, usize) {
    match raw::trap(Request::Recv { mailbox }) {
        Response::Recv { sender, data, size } => (sender, data, size),
        _ => unreachable!("Recv always answers with Response::Recv"),
    }
}

/// Registers the calling thread as the driver for software-interrupt vector
/// `kind`. `handler` is woken (via the same path as `wakeup`) every time
/// that vector fires until a later `setintr` replaces it.
pub fn setintr(kind: usize, handler: ThreadFunc) {
    raw::trap(Request::SetIntr { kind, handler });
}

// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! The trap boundary.
//!
//! Everything above this module is architecture-neutral; `trap` is the one
//! function that actually has to cross into the kernel, and how it does that
//! depends on where this crate was built for.

use kern::syscall::{Request, Response};

cfg_if::cfg_if! {
    if #[cfg(target_os = "none")] {
        /// Issues the trap instruction that drops into the kernel's SVCall
        /// handler.
        ///
        /// Not implemented here: doing this for real needs inline assembly
        /// to move `request` into the registers the ABI reserves for syscall
        /// arguments, which is the same context-switch primitive this
        /// workspace treats as an external collaborator (see the top-level
        /// design's non-goals). A board support crate supplies it.
        pub fn trap(_request: Request) -> Response {
            unimplemented!("issuing the SVC trap is board-specific and out of scope here")
        }
    } else {
        /// Host build: calls straight into the live kernel instance instead
        /// of trapping.
        pub fn trap(request: Request) -> Response {
            unsafe { kern::startup::host_trap(request) }
        }
    }
}

//! Architecture boundary.
//!
//! Everything above this module is architecture-independent. The `klog!`
//! macro and the `SavedState`/`halt` items are the only things the rest of
//! the nucleus reaches across the boundary for; constructing a thread's
//! initial register state and performing the actual context switch belong to
//! the backend.
//!
//! Two backends are selected at build time: `sim`, a host-runnable stand-in
//! used by the test suite, and `cortex_m`, which sketches the ARMv7-M
//! register layout this kernel targets without implementing the trap entry
//! itself (the context-switch primitive is an explicit non-goal).

/// Log from kernel context.
///
/// Two (architecture-specific) logging channels are available: semihosting
/// (`klog-semihosting`) or the ARM Instrumentation Trace Macrocell
/// (`klog-itm`). With neither feature enabled `klog!` compiles to nothing, so
/// the host `sim` build never links either dependency.
#[cfg(not(any(feature = "klog-semihosting", feature = "klog-itm")))]
macro_rules! klog {
    ($s:expr) => {};
    ($s:expr, $($tt:tt)*) => {};
}

#[cfg(feature = "klog-itm")]
macro_rules! klog {
    ($s:expr) => {
        #[allow(unused_unsafe)]
        unsafe {
            let stim = &mut (*cortex_m::peripheral::ITM::ptr()).stim[0];
            cortex_m::iprintln!(stim, $s);
        }
    };
    ($s:expr, $($tt:tt)*) => {
        #[allow(unused_unsafe)]
        unsafe {
            let stim = &mut (*cortex_m::peripheral::ITM::ptr()).stim[0];
            cortex_m::iprintln!(stim, $s, $($tt)*);
        }
    };
}

#[cfg(feature = "klog-semihosting")]
macro_rules! klog {
    ($s:expr) => { let _ = cortex_m_semihosting::hprintln!($s); };
    ($s:expr, $($tt:tt)*) => { let _ = cortex_m_semihosting::hprintln!($s, $($tt)*); };
}

cfg_if::cfg_if! {
    if #[cfg(target_os = "none")] {
        mod cortex_m_backend;
        pub use cortex_m_backend::{SavedState, make_initial_context};
    } else {
        mod sim;
        pub use sim::{SavedState, make_initial_context};
    }
}

/// Per-architecture view of a thread's saved context.
///
/// The dispatcher never does its own register save/restore; requests and
/// responses travel as the `syscall::Request`/`syscall::Response` enums
/// referenced from `task::PendingRequest`. All `ArchState` has to provide is
/// the one thing that really is architecture-specific: where this thread's
/// stack currently sits, so the context switch has somewhere to load from
/// and save to.
pub trait ArchState {
    fn stack_pointer(&self) -> usize;
    fn set_stack_pointer(&mut self, sp: usize);
}

/// Halts the processor. On real hardware this spins forever after the
/// `sysdown` message has been logged; the `sim` backend instead panics the
/// host thread so a test can observe the failure.
pub fn halt() -> ! {
    cfg_if::cfg_if! {
        if #[cfg(target_os = "none")] {
            loop {
                cortex_m::asm::wfi();
            }
        } else {
            panic!("sysdown: system halted");
        }
    }
}

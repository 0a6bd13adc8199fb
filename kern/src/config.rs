//! Compile-time kernel configuration.
//!
//! The original kernel expressed these as preprocessor `#define`s next to the
//! structures they size. Collecting them here gives a downstream board crate
//! one place to override them without hunting through the nucleus.

/// Number of thread control block slots in the fixed pool.
pub const THREAD_NUM: usize = 6;

/// Number of priority levels. 0 is the highest priority.
pub const PRIORITY_NUM: usize = 16;

/// Maximum length of a thread name, not counting the terminator.
pub const THREAD_NAME_SIZE: usize = 15;

/// Number of mailboxes in the fixed mailbox table.
pub const MSGBOX_ID_NUM: usize = 4;

/// Number of software-interrupt vector slots.
pub const SOFTVEC_TYPE_NUM: usize = 32;

/// Number of blocks initially available in each size class. A real board
/// would size this from the linker-defined allocator region; the host/sim
/// build uses a fixed count per class so the allocator region can live in a
/// `static` array.
pub const BLOCKS_PER_CLASS: usize = 8;

/// Bytes of stack reserved per thread slot. Stacks live in one static
/// `THREAD_NUM`-entry array carved up at startup; per-thread stack is not
/// reclaimed on exit (a non-goal).
pub const THREAD_STACK_SIZE: usize = 4096;

//! Kernel nucleus for a fixed-pool, static-priority, preemptive microkernel.
//!
//! This crate implements the three subsystems that make up the operating
//! system nucleus: the thread table and ready-queue, the mailbox-based
//! message-passing subsystem, and the size-class kernel allocator, tied
//! together by a system-call dispatcher and an interrupt-driven scheduler.
//!
//! Everything else -- the boot loader, serial I/O, the context-switch
//! primitive, and application threads -- is an external collaborator.
//!
//! # Algorithm Naivety Principles
//!
//! Like the kernel this crate is modeled on, this implementation uses really
//! naive algorithms: linear scans of small fixed-size tables everywhere. This
//! is deliberate:
//!
//! 1. Use safe Rust for as much as possible.
//! 2. Use easily understood and debugged algorithms.
//! 3. Revisit these decisions if they become performance problems.
//!
//! This is enabled by the total number of threads being fixed at build time
//! and small (`config::THREAD_NUM`, typically single digits to low tens).

#![cfg_attr(target_os = "none", no_std)]

#[macro_use]
pub mod arch;

pub mod alloc;
pub mod config;
pub mod err;
pub mod interrupt;
pub mod mailbox;
pub mod startup;
pub mod syscall;
pub mod task;

//! Mailbox-based message passing.
//!
//! A mailbox is a FIFO of envelopes plus at most one waiting receiver.
//! `send` either hands the envelope straight to a thread already blocked in
//! `recv`, or queues it; `recv` either takes the head of the queue
//! immediately or blocks. Exactly one of "queued envelopes" and "a waiting
//! receiver" can be true of a mailbox at any instant -- the rendezvous never
//! lets both sides queue up, matching the system this is modeled on.

use core::ptr::NonNull;

use crate::err::Fault;
use crate::task::TaskId;

/// A message in flight. `data`/`size` describe a region the sender owns
/// until `recv` copies out of it; the receiver never sees the sender's
/// pointer directly (see the design notes on ownership transfer at `recv`).
pub struct Envelope {
    next: Option<NonNull<Envelope>>,
    pub sender: TaskId,
    pub data: *mut u8,
    pub size: usize,
}

/// One mailbox's queue of envelopes and its (at most one) waiting receiver.
#[derive(Copy, Clone)]
pub struct Mailbox {
    head: Option<NonNull<Envelope>>,
    tail: Option<NonNull<Envelope>>,
    waiting_receiver: Option<TaskId>,
}

impl Mailbox {
    pub const fn empty() -> Self {
        Mailbox { head: None, tail: None, waiting_receiver: None }
    }

    fn push(&mut self, envelope: NonNull<Envelope>) {
        unsafe {
            (*envelope.as_ptr()).next = None;
        }
        match self.tail {
            Some(tail) => unsafe { (*tail.as_ptr()).next = Some(envelope) },
            None => self.head = Some(envelope),
        }
        self.tail = Some(envelope);
    }

    fn pop(&mut self) -> Option<NonNull<Envelope>> {
        let head = self.head?;
        let next = unsafe { (*head.as_ptr()).next };
        self.head = next;
        if next.is_none() {
            self.tail = None;
        }
        Some(head)
    }

    pub fn has_pending(&self) -> bool {
        self.head.is_some()
    }

    pub fn waiting_receiver(&self) -> Option<TaskId> {
        self.waiting_receiver
    }

    pub fn set_waiting_receiver(&mut self, id: Option<TaskId>) {
        self.waiting_receiver = id;
    }

    /// Enqueues `envelope`. The caller (the syscall dispatcher) is
    /// responsible for checking `waiting_receiver` first and delivering
    /// straight to that thread instead of calling this, per the rendezvous
    /// invariant that a mailbox never holds both a queue and a receiver.
    pub fn enqueue(&mut self, envelope: NonNull<Envelope>) {
        self.push(envelope);
    }

    /// Dequeues the oldest envelope, if any.
    pub fn dequeue(&mut self) -> Option<NonNull<Envelope>> {
        self.pop()
    }
}

/// Allocates an envelope from the kernel heap and fills it in.
///
/// A mailbox with no room left in its backing heap class is an unrecoverable
/// fault (`Fault::EnvelopeAllocFailed`), not a sentinel returned to the
/// caller -- see Open Question (a) in the design ledger for why sending is
/// not allowed to fail observably.
pub fn alloc_envelope(
    heap: &mut crate::alloc::Heap,
    sender: TaskId,
    data: *mut u8,
    size: usize,
) -> NonNull<Envelope> {
    let raw = heap
        .alloc(core::mem::size_of::<Envelope>())
        .unwrap_or_else(|_| crate::err::sysdown(Fault::EnvelopeAllocFailed));
    let envelope = raw as *mut Envelope;
    unsafe {
        envelope.write(Envelope { next: None, sender, data, size });
        NonNull::new_unchecked(envelope)
    }
}

pub fn free_envelope(heap: &mut crate::alloc::Heap, envelope: NonNull<Envelope>) {
    heap.free(envelope.as_ptr() as *mut u8);
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::alloc::Heap;

    #[test]
    fn fifo_order_preserved() {
        let mut heap = Heap::new();
        let mut mbox = Mailbox::empty();

        let e1 = alloc_envelope(&mut heap, TaskId::from_index(0), core::ptr::null_mut(), 0);
        let e2 = alloc_envelope(&mut heap, TaskId::from_index(1), core::ptr::null_mut(), 0);
        mbox.enqueue(e1);
        mbox.enqueue(e2);

        let first = mbox.dequeue().unwrap();
        assert_eq!(unsafe { (*first.as_ptr()).sender }, TaskId::from_index(0));
        let second = mbox.dequeue().unwrap();
        assert_eq!(unsafe { (*second.as_ptr()).sender }, TaskId::from_index(1));
        assert!(mbox.dequeue().is_none());
    }

    #[test]
    fn waiting_receiver_tracks_single_thread() {
        let mut mbox = Mailbox::empty();
        assert_eq!(mbox.waiting_receiver(), None);
        mbox.set_waiting_receiver(Some(TaskId::from_index(2)));
        assert_eq!(mbox.waiting_receiver(), Some(TaskId::from_index(2)));
    }
}

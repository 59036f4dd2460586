/* Copyright (c) 2018 University of Utah
 *
 * Permission to use, copy, modify, and distribute this software for any
 * purpose with or without fee is hereby granted, provided that the above
 * copyright notice and this permission notice appear in all copies.
 *
 * THE SOFTWARE IS PROVIDED "AS IS" AND THE AUTHOR(S) DISCLAIM ALL WARRANTIES
 * WITH REGARD TO THIS SOFTWARE INCLUDING ALL IMPLIED WARRANTIES OF
 * MERCHANTABILITY AND FITNESS. IN NO EVENT SHALL AUTHORS BE LIABLE FOR
 * ANY SPECIAL, DIRECT, INDIRECT, OR CONSEQUENTIAL DAMAGES OR ANY DAMAGES
 * WHATSOEVER RESULTING FROM LOSS OF USE, DATA OR PROFITS, WHETHER IN AN
 * ACTION OF CONTRACT, NEGLIGENCE OR OTHER TORTIOUS ACTION, ARISING OUT OF
 * OR IN CONNECTION WITH THE USE OR PERFORMANCE OF THIS SOFTWARE.
 */

//! The per-node table of outstanding re-entrant outbound calls, and the
//! wait/notify primitive it is built on.

use std::cell::RefCell;
use std::future::Future;
use std::pin::Pin;
use std::rc::Rc;
use std::task::{Context, Poll, Waker};
use std::time::Instant;

use crate::error::abort_node;
use crate::message::Response;
use crate::scheduler::Scheduler;

struct Slot {
    busy: bool,
    response: Option<Response>,
    waker: Option<Waker>,
}

struct Inner {
    slots: RefCell<Vec<Slot>>,
}

/// Per-node map from an outbound request id to the slot awaiting its reply.
/// Lives entirely on the node's own worker thread, so `allocate`/`complete`/
/// `take` need no locking: it is strictly per-node and only ever touched
/// from inside that node's scheduler.
#[derive(Clone)]
pub struct PendingTable {
    inner: Rc<Inner>,
}

impl PendingTable {
    pub fn new() -> PendingTable {
        PendingTable { inner: Rc::new(Inner { slots: RefCell::new(Vec::new()) }) }
    }

    /// Claim the smallest free index, growing the table if every existing
    /// slot is `busy`. The returned index is the id that goes out on the
    /// wire as `Command::id`.
    pub fn allocate(&self) -> usize {
        let mut slots = self.inner.slots.borrow_mut();
        for (idx, slot) in slots.iter_mut().enumerate() {
            if !slot.busy {
                slot.busy = true;
                slot.response = None;
                slot.waker = None;
                return idx;
            }
        }
        slots.push(Slot { busy: true, response: None, waker: None });
        slots.len() - 1
    }

    /// Fill in the reply for `id` and wake whoever is waiting on it. Must
    /// only ever be called by the event loop as it routes an inbound
    /// `Response`. A reply for an id that isn't currently `busy`, or a
    /// second reply for the same id, is a programmer error and aborts the
    /// node.
    pub fn complete(&self, id: usize, response: Response) {
        let mut slots = self.inner.slots.borrow_mut();
        let slot = match slots.get_mut(id) {
            Some(slot) => slot,
            None => abort_node(format!(
                "protocol violation: reply for id {id} which this node never allocated"
            )),
        };
        if !slot.busy {
            abort_node(format!("protocol violation: reply for id {id} which is not outstanding"));
        }
        if slot.response.is_some() {
            abort_node(format!("protocol violation: duplicate reply for id {id}"));
        }
        slot.response = Some(response);
        if let Some(waker) = slot.waker.take() {
            waker.wake();
        }
    }

    /// Build the future a `ClientStub` suspends on after sending its
    /// `Command` with `id`. Resolves once `complete` has been called for
    /// `id`, or once `deadline` (if given) has passed.
    pub fn wait(&self, id: usize, deadline: Option<Instant>, scheduler: Scheduler) -> Wait {
        Wait { table: self.clone(), id, deadline, scheduler, timer_registered: false }
    }

    fn take_response(&self, id: usize) -> Response {
        let mut slots = self.inner.slots.borrow_mut();
        let slot = &mut slots[id];
        slot.busy = false;
        slot.waker = None;
        slot.response.take().expect("take_response called before the slot was completed")
    }

    fn free(&self, id: usize) {
        let mut slots = self.inner.slots.borrow_mut();
        slots[id].busy = false;
        slots[id].waker = None;
    }
}

impl Default for PendingTable {
    fn default() -> Self { PendingTable::new() }
}

/// Outcome of waiting on a [`PendingTable`] slot.
pub enum WaitOutcome {
    Notified(Response),
    TimedOut,
}

/// The future behind waiting (with an optional timeout) for a reply,
/// specialized to waiting on one `PendingTable` slot.
pub struct Wait {
    table: PendingTable,
    id: usize,
    deadline: Option<Instant>,
    scheduler: Scheduler,
    timer_registered: bool,
}

impl Future for Wait {
    type Output = WaitOutcome;

    fn poll(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        let this = self.get_mut();

        let ready = {
            let mut slots = this.table.inner.slots.borrow_mut();
            slots[this.id].response.is_some()
        };
        if ready {
            this.table.free(this.id);
            let response = this.table.take_response_after_free(this.id);
            return Poll::Ready(WaitOutcome::Notified(response));
        }

        if let Some(deadline) = this.deadline {
            if Instant::now() >= deadline {
                // Leave the slot `busy`: an out-of-order reply could still
                // arrive later.
                return Poll::Ready(WaitOutcome::TimedOut);
            }
        }

        {
            let mut slots = this.table.inner.slots.borrow_mut();
            slots[this.id].waker = Some(cx.waker().clone());
        }

        if let Some(deadline) = this.deadline {
            if !this.timer_registered {
                this.scheduler.register_timer(deadline, cx.waker().clone());
                this.timer_registered = true;
            }
        }

        Poll::Pending
    }
}

impl PendingTable {
    // `take_response` already clears `busy`; this variant is for the path
    // above where we've just observed `response.is_some()` and want the
    // value without re-checking `busy` (already cleared by `free` a line
    // earlier, harmlessly cleared twice).
    fn take_response_after_free(&self, id: usize) -> Response {
        let mut slots = self.inner.slots.borrow_mut();
        slots[id].response.take().expect("response vanished between check and take")
    }
}

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

//! A per-node, single-threaded cooperative scheduler.
//!
//! A `RoundRobin`-style run-queue, shorn of everything that exists only to
//! keep a NIC fed (polling, work-stealing between sibling cores, packet
//! batching). What's left is a ready queue of lightweight tasks, run one at a
//! time, cooperatively, on the one OS thread this node owns.
//!
//! A task is a boxed, pinned future. `spawn`, yielding, and waiting on a
//! condition are all expressed in terms of `Future`/`Waker` rather than a
//! hand-rolled generator or state machine (see DESIGN.md for why).

use std::cell::RefCell;
use std::collections::VecDeque;
use std::future::Future;
use std::pin::Pin;
use std::rc::Rc;
use std::task::{Context, Poll, Waker};
use std::time::Instant;

use crate::waker::task_waker;

pub type Task = Pin<Box<dyn Future<Output = ()>>>;

struct Inner {
    tasks: RefCell<Vec<Option<Task>>>,
    ready: Rc<RefCell<VecDeque<usize>>>,
    timers: RefCell<Vec<(Instant, Waker)>>,
}

/// The cooperative task runtime owned by one node's worker thread.
///
/// Not `Send`/`Sync`: a `Scheduler` (like everything reachable from one)
/// never leaves the thread it was created on.
#[derive(Clone)]
pub struct Scheduler {
    inner: Rc<Inner>,
}

impl Scheduler {
    pub fn new() -> Scheduler {
        Scheduler {
            inner: Rc::new(Inner {
                tasks: RefCell::new(Vec::new()),
                ready: Rc::new(RefCell::new(VecDeque::new())),
                timers: RefCell::new(Vec::new()),
            }),
        }
    }

    /// Add a task to the ready set.
    pub fn spawn(&self, task: impl Future<Output = ()> + 'static) {
        let mut tasks = self.inner.tasks.borrow_mut();
        let id = tasks.len();
        tasks.push(Some(Box::pin(task)));
        drop(tasks);
        self.inner.ready.borrow_mut().push_back(id);
    }

    /// Run every currently-ready task until each either completes or
    /// suspends. Tasks that get woken (by a `Condition::notify`, or by a
    /// timer expiring) *while* this call is running are picked up in the
    /// same call, since waking just re-appends to the same ready queue
    /// this loop is draining.
    ///
    /// The event loop calls this once per inbound message, letting every
    /// dispatch task spawned so far make progress before the thread blocks
    /// on the mailbox again.
    pub fn run_ready(&self) {
        loop {
            let id = match self.inner.ready.borrow_mut().pop_front() {
                Some(id) => id,
                None => return,
            };

            // Take the future out before polling: the poll may itself call
            // `spawn` (a dispatch handler making another outbound call,
            // or the event loop reacting to a freshly-decoded command),
            // which needs its own borrow of `tasks`.
            let task = match self.inner.tasks.borrow_mut().get_mut(id).and_then(Option::take) {
                Some(task) => task,
                // Stale wake: the task already completed and was removed,
                // or (for a timer wake racing a notify) already ran to
                // completion on the duplicate entry. Nothing to do.
                None => continue,
            };

            let waker = task_waker(self.inner.ready.clone(), id);
            let mut cx = Context::from_waker(&waker);
            let mut task = task;
            match task.as_mut().poll(&mut cx) {
                Poll::Ready(()) => {
                    // Leave the slot as None; the id is never reused, but
                    // task ids are purely internal bookkeeping, unlike
                    // PendingTable slot indices which are the wire id.
                }
                Poll::Pending => {
                    self.inner.tasks.borrow_mut()[id] = Some(task);
                }
            }
        }
    }

    /// Register a wakeup for `deadline`. Used by a timed `Condition::wait`
    /// to guarantee it gets re-polled even if nothing ever notifies it.
    pub fn register_timer(&self, deadline: Instant, waker: Waker) {
        self.inner.timers.borrow_mut().push((deadline, waker));
    }

    /// The soonest outstanding timer deadline, if any. The event loop bounds
    /// its blocking mailbox receive by this so timed-out waits still make
    /// progress even with no new mail arriving.
    pub fn next_deadline(&self) -> Option<Instant> {
        self.inner.timers.borrow().iter().map(|(d, _)| *d).min()
    }

    /// Wake every timer whose deadline has passed. Safe to call even when
    /// nothing is due; called unconditionally after a bounded mailbox wait
    /// times out.
    pub fn expire_timers(&self) {
        let now = Instant::now();
        let due: Vec<Waker> = {
            let mut timers = self.inner.timers.borrow_mut();
            let mut still_pending = Vec::with_capacity(timers.len());
            let mut due = Vec::new();
            for (deadline, waker) in timers.drain(..) {
                if deadline <= now {
                    due.push(waker);
                } else {
                    still_pending.push((deadline, waker));
                }
            }
            *timers = still_pending;
            due
        };
        for waker in due {
            waker.wake();
        }
    }
}

impl Default for Scheduler {
    fn default() -> Self { Scheduler::new() }
}

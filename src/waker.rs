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

//! A `Waker` that pushes a task id onto a node-local ready queue.
//!
//! Every task spawned by [`Scheduler`](crate::scheduler::Scheduler) lives on
//! exactly one OS thread for its whole life, since no data inside a node is
//! ever shared across node threads, so the ready queue these wakers push
//! into never needs to be touched from more than one thread. That lets us
//! use a plain `Rc<RefCell<_>>` instead of the `Arc<Mutex<_>>` that
//! `std::task::Wake` would otherwise force on us: the scheduler is
//! single-threaded by construction, so there is no race to guard against
//! in the first place.
//!
//! Built with the raw-waker primitives rather than `std::task::Wake`
//! because `Wake` requires `Send + Sync`, which would force the ready
//! queue behind a `Mutex` for no benefit: this waker is never cloned across
//! threads, and its safety obligations (match `clone`/`wake`/`drop` to a
//! balanced `Rc` refcount) are fully met by the implementation below.

use std::collections::VecDeque;
use std::cell::RefCell;
use std::rc::Rc;
use std::task::{RawWaker, RawWakerVTable, Waker};

struct WakeTarget {
    ready: Rc<RefCell<VecDeque<usize>>>,
    task_id: usize,
}

static VTABLE: RawWakerVTable = RawWakerVTable::new(clone, wake, wake_by_ref, drop_waker);

unsafe fn clone(ptr: *const ()) -> RawWaker {
    Rc::increment_strong_count(ptr as *const WakeTarget);
    RawWaker::new(ptr, &VTABLE)
}

unsafe fn wake(ptr: *const ()) {
    let target = Rc::from_raw(ptr as *const WakeTarget);
    target.ready.borrow_mut().push_back(target.task_id);
}

unsafe fn wake_by_ref(ptr: *const ()) {
    let target = Rc::from_raw(ptr as *const WakeTarget);
    target.ready.borrow_mut().push_back(target.task_id);
    std::mem::forget(target);
}

unsafe fn drop_waker(ptr: *const ()) {
    drop(Rc::from_raw(ptr as *const WakeTarget));
}

/// Build a [`Waker`] that, when woken, pushes `task_id` onto `ready`.
pub fn task_waker(ready: Rc<RefCell<VecDeque<usize>>>, task_id: usize) -> Waker {
    let target = Rc::new(WakeTarget { ready, task_id });
    let ptr = Rc::into_raw(target) as *const ();
    unsafe { Waker::from_raw(RawWaker::new(ptr, &VTABLE)) }
}

/// A waker that does nothing. Used to poll a future that is known to
/// resolve without ever registering interest (the non-re-entrant
/// `ClientStub` path, see `stub::call`): it performs its blocking I/O
/// synchronously and never returns `Pending`, so nothing will ever be
/// woken.
pub fn noop_waker() -> Waker {
    fn noop_clone(_: *const ()) -> RawWaker { RawWaker::new(std::ptr::null(), &NOOP_VTABLE) }
    unsafe fn noop(_: *const ()) {}
    static NOOP_VTABLE: RawWakerVTable = RawWakerVTable::new(noop_clone, noop, noop, noop);
    unsafe { Waker::from_raw(RawWaker::new(std::ptr::null(), &NOOP_VTABLE)) }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn waking_enqueues_the_task_id() {
        let ready = Rc::new(RefCell::new(VecDeque::new()));
        let waker = task_waker(ready.clone(), 7);
        waker.wake_by_ref();
        waker.wake_by_ref();
        assert_eq!(*ready.borrow(), VecDeque::from([7, 7]));
        waker.wake();
        assert_eq!(ready.borrow().back(), Some(&7));
    }
}

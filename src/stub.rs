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

//! `ClientStub`: the single call path used both by code running inside a
//! node's dispatch tasks (re-entrant, suspends cooperatively) and by plain
//! application code calling in from outside any node (blocks the calling
//! thread).

use bytes::Bytes;

use crate::error::StubError;
use crate::mailbox::{Mailbox, MailboxHandle};
use crate::message::{Command, SENTINEL};
use crate::node;
use crate::pending::WaitOutcome;
use crate::waker::noop_waker;

use std::future::Future;
use std::pin::Pin;
use std::task::{Context, Poll};
use std::time::Instant;

/// Send `method(payload)` to `target` and return its reply.
///
/// If the calling thread is itself a node's worker thread (detected via the
/// thread-local context [`node::current`] set up by the event loop), the
/// call suspends the enclosing dispatch task cooperatively through that
/// node's own [`PendingTable`](crate::pending::PendingTable), allowing the
/// node to keep servicing other inbound messages, including a call back
/// into this very thread, which is how a cycle of peers resolves without
/// deadlocking. Otherwise, called from a plain thread with no node of its
/// own, it blocks the calling thread on a disposable, single-use mailbox.
pub async fn call(target: &MailboxHandle, method: &'static str, payload: Bytes) -> Result<Bytes, StubError> {
    match node::current() {
        Some(ctx) => {
            let id = ctx.pending.allocate();
            target.send(Command { origin: ctx.mailbox.clone(), id: id as u64, method, payload })?;

            let wait = ctx.pending.wait(id, None::<Instant>, ctx.scheduler.clone());
            match wait.await {
                WaitOutcome::Notified(response) => {
                    if response.success {
                        Ok(response.payload)
                    } else {
                        Err(StubError::Remote(String::from_utf8_lossy(&response.payload).into_owned()))
                    }
                }
                WaitOutcome::TimedOut => unreachable!("call() never sets a deadline"),
            }
        }
        None => call_blocking(target, method, payload),
    }
}

/// The non-re-entrant path: a disposable mailbox used for exactly one
/// round trip, read with a genuine blocking `recv` since there is no node
/// event loop on this thread to cooperatively suspend into.
fn call_blocking(target: &MailboxHandle, method: &'static str, payload: Bytes) -> Result<Bytes, StubError> {
    let reply_mailbox = Mailbox::new();
    target.send(Command { origin: reply_mailbox.handle(), id: SENTINEL, method, payload })?;
    let response = reply_mailbox.recv_one_response()?;
    if response.success {
        Ok(response.payload)
    } else {
        Err(StubError::Remote(String::from_utf8_lossy(&response.payload).into_owned()))
    }
}

/// Drive a future that is known to resolve without ever yielding control
/// past genuine blocking I/O (the non-re-entrant path above does its
/// blocking inside `std::sync::mpsc`, not inside `Future::poll`) to
/// completion with a waker that would simply be wrong to ever invoke.
///
/// Not currently needed by `call` itself (the non-re-entrant branch is
/// synchronous), but kept available for callers that want to drive a
/// `ClientStub` future from a plain, non-node `fn main` without pulling in
/// an async runtime.
pub fn block_on<F: Future>(mut future: F) -> F::Output {
    let waker = noop_waker();
    let mut cx = Context::from_waker(&waker);
    // Safety: `future` is a local we own outright and never move again
    // after this point.
    let mut future = unsafe { Pin::new_unchecked(&mut future) };
    loop {
        match future.as_mut().poll(&mut cx) {
            Poll::Ready(value) => return value,
            Poll::Pending => {
                panic!("block_on: future suspended without a way to be woken again")
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dispatch::{dispatch_command, MethodTable, Service};
    use crate::node::{self as node_mod, NodeOptions};
    use std::cell::RefCell;
    use std::rc::Rc;
    use std::sync::OnceLock;

    struct Echo;
    impl Service for Echo {
        fn method_table() -> &'static MethodTable<Echo> {
            static TABLE: OnceLock<MethodTable<Echo>> = OnceLock::new();
            TABLE.get_or_init(|| {
                let mut t = MethodTable::new();
                t.register(
                    "echo",
                    Box::new(|_s, payload| -> crate::dispatch::MethodFuture { Box::pin(async move { Ok(payload) }) }),
                );
                t
            })
        }
    }

    #[test]
    fn non_reentrant_call_blocks_and_returns_the_reply() {
        let handle = node_mod::spawn(|| Echo, NodeOptions::default());
        let target = handle.mailbox();
        let result = call_blocking(&target, "echo", Bytes::from_static(b"hi"));
        assert_eq!(result.unwrap(), Bytes::from_static(b"hi"));
    }

    #[test]
    fn dispatch_uses_the_cooperative_path_when_a_node_is_current() {
        // Simulate a dispatch task running inside a node: build a scheduler
        // + pending table by hand, mark this thread current, and spawn a
        // task that calls into a sibling's dispatch directly (rather than
        // a full second OS thread, to keep this a pure unit test of the
        // re-entrant branch).
        let sched = crate::scheduler::Scheduler::new();
        let pending = crate::pending::PendingTable::new();
        let me = crate::mailbox::Mailbox::new();

        node_mod::set_current_for_test(node_mod::test_context(me.handle(), sched.clone(), pending.clone()));

        let peer_service = Rc::new(RefCell::new(Echo));
        let peer_mailbox = crate::mailbox::Mailbox::new();
        let peer_handle = peer_mailbox.handle();

        let result = Rc::new(RefCell::new(None));
        let result2 = result.clone();
        let peer_handle2 = peer_handle.clone();
        sched.spawn(async move {
            let r = call(&peer_handle2, "echo", Bytes::from_static(b"yo")).await;
            *result2.borrow_mut() = Some(r);
        });

        sched.run_ready();
        let command = match peer_mailbox.recv().unwrap() {
            crate::message::Message::Command(c) => c,
            _ => panic!("expected a Command"),
        };
        sched.spawn(dispatch_command(peer_service, command));
        sched.run_ready();

        // Route the reply the way the event loop would.
        if let crate::message::Message::Response(r) = me.recv().unwrap() {
            pending.complete(r.id as usize, r);
        }
        sched.run_ready();

        node_mod::clear_current_for_test();
        assert_eq!(result.borrow().take().unwrap().unwrap(), Bytes::from_static(b"yo"));
    }
}

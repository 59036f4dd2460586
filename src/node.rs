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

//! Node lifecycle: spawning a node's dedicated worker thread and driving its
//! main loop.

use std::cell::RefCell;
use std::rc::Rc;
use std::thread;
use std::time::{Duration, Instant};

use crate::dispatch::{dispatch_command, Service};
use crate::handle::Handle;
use crate::mailbox::{Mailbox, MailboxHandle, Timed};
use crate::message::Message;
use crate::pending::PendingTable;
use crate::scheduler::Scheduler;

/// Tuning knobs for a node's worker thread. Currently just bounds how long
/// the main loop will block on its mailbox when no timer is outstanding;
/// kept as a struct (rather than a bare `Duration` argument) so later knobs
/// don't churn `spawn`'s signature.
#[derive(Debug, Clone, Copy)]
pub struct NodeOptions {
    /// Upper bound on how long a single mailbox wait blocks when there is no
    /// nearer timer deadline to bound it. The loop always wakes up at least
    /// this often even on an otherwise perfectly idle node, which keeps
    /// `Handle::join` on a misbehaving node from hanging forever rather than
    /// reacting to `OwnerTerminated`.
    pub recv_poll_interval: Duration,
}

impl Default for NodeOptions {
    fn default() -> Self {
        NodeOptions { recv_poll_interval: Duration::from_millis(250) }
    }
}

/// The per-thread state a re-entrant [`ClientStub`](crate::stub) call needs
/// to find without it being threaded through every function signature.
/// Thread-local rather than a process-global pointer, since each node owns
/// exactly one OS thread and no other thread should be able to see it.
#[derive(Clone)]
pub(crate) struct NodeContext {
    pub mailbox: MailboxHandle,
    pub scheduler: Scheduler,
    pub pending: PendingTable,
}

thread_local! {
    static CURRENT: RefCell<Option<NodeContext>> = const { RefCell::new(None) };
}

/// The context for the node running on the calling thread, if any. `None`
/// when called from a thread that never ran [`spawn`]'s event loop, which is
/// exactly the non-re-entrant case `stub::call` falls back to blocking for.
pub(crate) fn current() -> Option<NodeContext> {
    CURRENT.with(|c| c.borrow().clone())
}

fn set_current(ctx: Option<NodeContext>) {
    CURRENT.with(|c| *c.borrow_mut() = ctx);
}

/// Start a new node on its own OS thread running `ctor`'s service, and
/// return the owning [`Handle`]. The node's thread exits as soon as it
/// receives [`Message::OwnerTerminated`], or if every `Sender` to its
/// mailbox has been dropped.
pub fn spawn<S, F>(ctor: F, options: NodeOptions) -> Handle
where
    S: Service,
    F: FnOnce() -> S + Send + 'static,
{
    let mailbox = Mailbox::new();
    let handle_mailbox = mailbox.handle();

    let thread = thread::Builder::new()
        .name("meshloop-node".to_string())
        .spawn(move || {
            let service = Rc::new(RefCell::new(ctor()));
            run_event_loop(service, mailbox, options);
        })
        .expect("failed to spawn node worker thread");

    Handle::owning(handle_mailbox, thread)
}

fn run_event_loop<S: Service>(service: Rc<RefCell<S>>, mailbox: Mailbox, options: NodeOptions) {
    let scheduler = Scheduler::new();
    let pending = PendingTable::new();
    let own_mailbox = mailbox.handle();

    set_current(Some(NodeContext {
        mailbox: own_mailbox.clone(),
        scheduler: scheduler.clone(),
        pending: pending.clone(),
    }));

    loop {
        // Drain every ready task to quiescence before touching the mailbox
        // again. Nothing can become ready while this thread is legitimately
        // blocked below: the only thing that wakes a suspended task is this
        // same loop routing a Response or a timer expiring, both of which
        // happen right here.
        scheduler.run_ready();

        let wait_for = match scheduler.next_deadline() {
            Some(deadline) => deadline.saturating_duration_since(Instant::now()),
            None => options.recv_poll_interval,
        };

        match mailbox.recv_timeout(wait_for) {
            Timed::Got(Message::Command(command)) => {
                log::debug!("dispatching {:?} (id {})", command.method, command.id);
                scheduler.spawn(dispatch_command(service.clone(), command));
            }
            Timed::Got(Message::Response(response)) => {
                pending.complete(response.id as usize, response);
            }
            Timed::Got(Message::OwnerTerminated) => {
                // Exit now rather than draining to idle: a dispatch task
                // still suspended on an outbound call that will never get a
                // reply would otherwise keep this thread alive forever
                // instead of exiting within finite time. Any such task is
                // simply dropped along with the scheduler.
                log::debug!("owner handle dropped, shutting down");
                break;
            }
            Timed::TimedOut => {
                scheduler.expire_timers();
            }
            Timed::Closed => {
                // Every Sender this node ever handed out (including its own
                // owning Handle's copy) is gone; nothing will ever reach it
                // again.
                break;
            }
        }
    }

    set_current(None);
}

#[cfg(test)]
pub(crate) fn test_context(mailbox: MailboxHandle, scheduler: Scheduler, pending: PendingTable) -> NodeContext {
    NodeContext { mailbox, scheduler, pending }
}

#[cfg(test)]
pub(crate) fn set_current_for_test(ctx: NodeContext) {
    set_current(Some(ctx));
}

#[cfg(test)]
pub(crate) fn clear_current_for_test() {
    set_current(None);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_options_poll_faster_than_a_stuck_join_would_tolerate() {
        let opts = NodeOptions::default();
        assert!(opts.recv_poll_interval < Duration::from_secs(1));
    }
}

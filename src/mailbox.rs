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

//! Unbounded, multi-producer single-consumer mailboxes.
//!
//! Built directly on [`std::sync::mpsc`]: its `Sender` is natively
//! cloneable and thread-safe (the multi-producer half) and its `Receiver` is
//! natively single-consumer (nothing here has to re-implement either
//! property).

use std::hash::{Hash, Hasher};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::mpsc::{self, Receiver, RecvTimeoutError, Sender};
use std::time::Duration;

use crate::error::StubError;
use crate::message::{Message, Response};

static NEXT_MAILBOX_ID: AtomicU64 = AtomicU64::new(0);

/// A small, cheaply-cloneable, equality-comparable reference to a node's
/// mailbox. This is what travels inside [`Command::origin`](crate::message::Command),
/// gets stashed in test-side lookup tables, and is handed to
/// [`Handle::alias`](crate::handle::Handle::alias) to build a non-owner
/// handle.
#[derive(Clone, Debug)]
pub struct MailboxHandle {
    id: u64,
    tx: Sender<Message>,
}

impl MailboxHandle {
    /// Enqueue `msg`. Never blocks; the queue is unbounded. Fails only if
    /// the receiving node's thread has already exited.
    pub fn send(&self, msg: impl Into<Message>) -> Result<(), StubError> {
        self.tx.send(msg.into()).map_err(|_| StubError::MailboxClosed)
    }
}

impl PartialEq for MailboxHandle {
    fn eq(&self, other: &Self) -> bool { self.id == other.id }
}
impl Eq for MailboxHandle {}

impl Hash for MailboxHandle {
    fn hash<H: Hasher>(&self, state: &mut H) { self.id.hash(state); }
}

/// The receiving half of a node's mailbox. Each node owns exactly one of
/// these, used only from its own worker thread.
pub struct Mailbox {
    handle: MailboxHandle,
    rx: Receiver<Message>,
}

/// What blocked a [`Mailbox::recv_timeout`] call.
pub enum Timed<T> {
    Got(T),
    TimedOut,
    Closed,
}

impl Mailbox {
    /// Create a fresh mailbox with its own identity.
    pub fn new() -> Mailbox {
        let (tx, rx) = mpsc::channel();
        let id = NEXT_MAILBOX_ID.fetch_add(1, Ordering::Relaxed);
        Mailbox { handle: MailboxHandle { id, tx }, rx }
    }

    /// The handle other threads use to send to this mailbox.
    pub fn handle(&self) -> MailboxHandle { self.handle.clone() }

    /// Block until a message arrives.
    pub fn recv(&self) -> Result<Message, StubError> {
        self.rx.recv().map_err(|_| StubError::MailboxClosed)
    }

    /// Block until a message arrives or `timeout` elapses, whichever is
    /// first. Used by the event loop so outstanding timed `wait`s still get
    /// re-checked even when no new mail shows up.
    pub fn recv_timeout(&self, timeout: Duration) -> Timed<Message> {
        match self.rx.recv_timeout(timeout) {
            Ok(msg) => Timed::Got(msg),
            Err(RecvTimeoutError::Timeout) => Timed::TimedOut,
            Err(RecvTimeoutError::Disconnected) => Timed::Closed,
        }
    }

    /// Block for exactly the one `Response` a non-re-entrant [`ClientStub`]
    /// call is waiting on. Anything else arriving here would be a protocol
    /// violation: an ephemeral, single-use mailbox is never handed out as a
    /// `Command::origin` by anyone but the blocking stub call that owns it,
    /// and it is never reused afterwards.
    ///
    /// [`ClientStub`]: crate::stub
    pub fn recv_one_response(&self) -> Result<Response, StubError> {
        match self.recv()? {
            Message::Response(r) => Ok(r),
            other => panic!(
                "protocol violation: ephemeral reply mailbox received {:?}, expected a Response",
                other
            ),
        }
    }
}

impl Default for Mailbox {
    fn default() -> Self { Mailbox::new() }
}

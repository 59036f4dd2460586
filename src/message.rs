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

//! Wire-level message types exchanged between node mailboxes.
//!
//! Everything here is deliberately ignorant of *why* a command is being sent
//! or what its payload means, that is the binding layer's job (see the
//! crate-level docs). This module only has to get `Command`s and `Response`s
//! from one mailbox to another in order.

use bytes::Bytes;

use crate::mailbox::MailboxHandle;

/// Reserved request id meaning "the caller has no scheduler and will
/// block-receive exactly one `Response` itself; there is no pending slot to
/// fill in".
pub const SENTINEL: u64 = u64::MAX;

/// An inbound request. Immutable once sent.
#[derive(Debug, Clone)]
pub struct Command {
    /// Mailbox to send the `Response` back to.
    pub origin: MailboxHandle,
    /// Request id, copied verbatim into the `Response`. [`SENTINEL`] means
    /// the caller isn't re-entrant and isn't expecting it to be echoed back
    /// in anything other than the single `Response` it will block for.
    pub id: u64,
    /// Opaque method identifier. Must be unique across overloads.
    pub method: &'static str,
    /// Opaque, binding-layer-encoded argument tuple.
    pub payload: Bytes,
}

/// A reply to a previously sent [`Command`].
#[derive(Debug, Clone)]
pub struct Response {
    /// `true` if the method returned normally; `false` if it raised.
    pub success: bool,
    /// Copied from the `Command.id` this is replying to.
    pub id: u64,
    /// Encoded return value when `success`, human-readable error text
    /// otherwise.
    pub payload: Bytes,
}

/// The tagged union of everything that can land in a node's mailbox.
#[derive(Debug, Clone)]
pub enum Message {
    Command(Command),
    Response(Response),
    /// Sent exactly once, by the owner `Handle`'s destructor, to tell the
    /// event loop to shut down after the current iteration.
    OwnerTerminated,
}

impl From<Command> for Message {
    fn from(c: Command) -> Self { Message::Command(c) }
}

impl From<Response> for Message {
    fn from(r: Response) -> Self { Message::Response(r) }
}

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

//! The error taxonomy a caller can observe.
//!
//! Only two things are ever visible to a caller: "succeeded, here is the
//! decoded value" or "failed, here is why". Everything that isn't a
//! caller-visible failure (unknown method, a reply for an id that isn't
//! `busy`, a double reply) is a programming error and aborts the node's
//! thread instead of being represented here, see [`abort_node`].

use thiserror::Error;

/// Everything a [`ClientStub`](crate::stub) call can fail with.
#[derive(Debug, Error, Clone)]
pub enum StubError {
    /// The remote method raised, or the remote node failed to decode the
    /// request. The text is whatever the dispatcher captured.
    #[error("remote call failed: {0}")]
    Remote(String),

    /// The target node's worker thread has already exited (its mailbox is
    /// disconnected), or this node's own worker thread is gone.
    #[error("mailbox is closed; the node has shut down")]
    MailboxClosed,
}

/// Abort the current node's thread with a diagnostic. Used for protocol
/// violations that are programmer errors, not recoverable failures: an
/// unrecognized method identifier, and a reply whose id doesn't match a
/// `busy` slot. Since every node owns its OS thread exclusively, panicking
/// here tears down only that node; it is observed by peers as their next
/// send or blocking receive against it turning into
/// [`StubError::MailboxClosed`].
pub fn abort_node(diagnostic: impl Into<String>) -> ! {
    let diagnostic = diagnostic.into();
    log::error!("node aborting: {diagnostic}");
    panic!("{diagnostic}");
}

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

//! Handles returned by [`spawn`](crate::node::spawn): a node's address, plus
//! (for the handle that created the node) its ownership of that node's
//! lifetime.

use std::thread::JoinHandle;

use crate::mailbox::MailboxHandle;
use crate::message::Message;

/// A reference to a running node.
///
/// Cloning a `Handle` (via [`Handle::alias`]) never clones ownership: only
/// the handle returned by `spawn` itself is an owner. Two distinct `Handle`
/// values can name the same node this way, where dropping the alias does
/// nothing and dropping the original tells the node to shut down.
pub struct Handle {
    mailbox: MailboxHandle,
    owner: Option<JoinHandle<()>>,
}

impl Handle {
    /// The handle returned to whoever calls `spawn`; owns the node's thread.
    pub(crate) fn owning(mailbox: MailboxHandle, thread: JoinHandle<()>) -> Handle {
        Handle { mailbox, owner: Some(thread) }
    }

    /// A non-owning reference to `mailbox`. What a service hands out when it
    /// wants to let other nodes address it without granting them control
    /// over its lifetime (e.g. a node passing its own address to a peer it
    /// is registering with).
    pub fn alias(mailbox: MailboxHandle) -> Handle {
        Handle { mailbox, owner: None }
    }

    /// The address this handle refers to, for sending `Command`s or storing
    /// in a lookup table.
    pub fn mailbox(&self) -> MailboxHandle {
        self.mailbox.clone()
    }

    /// Whether dropping this handle will tear down the node: the handle
    /// returned by `spawn` owns the node, every other handle is just a
    /// reference to it.
    pub fn is_owner(&self) -> bool {
        self.owner.is_some()
    }

    /// Tell the node to shut down and block until its worker thread has
    /// exited. Only meaningful on an owning handle; a no-op on an alias.
    pub fn join(mut self) {
        if let Some(thread) = self.owner.take() {
            let _ = self.mailbox.send(Message::OwnerTerminated);
            let _ = thread.join();
        }
    }
}

impl Drop for Handle {
    fn drop(&mut self) {
        if self.owner.is_some() {
            let _ = self.mailbox.send(Message::OwnerTerminated);
        }
    }
}

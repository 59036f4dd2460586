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

//! An in-process harness for testing actor-style services: each node runs
//! its own single-threaded cooperative scheduler on a dedicated OS thread,
//! talks to other nodes only by message passing over mailboxes, and answers
//! calls, including calls back into itself, directly or through a cycle of
//! peers, without deadlocking.
//!
//! Start a node with [`spawn`], describe what it answers to by implementing
//! [`Service`], and reach any node (from inside another node's dispatch
//! code, or from a plain test thread) with [`stub::call`].

pub mod dispatch;
pub mod error;
pub mod handle;
pub mod mailbox;
pub mod message;
mod node;
pub mod pending;
pub mod scheduler;
pub mod stub;
mod waker;

pub use dispatch::{MethodTable, Service};
pub use error::StubError;
pub use handle::Handle;
pub use mailbox::MailboxHandle;
pub use message::{Command, Response};
pub use node::{spawn, NodeOptions};
pub use stub::call;

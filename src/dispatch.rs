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

//! The `Service` trait and the method table that routes an inbound
//! [`Command`] to one of its handlers.

use std::cell::RefCell;
use std::collections::HashMap;
use std::future::Future;
use std::pin::Pin;
use std::rc::Rc;

use bytes::Bytes;

use crate::error::abort_node;
use crate::message::{Command, Response};

/// What one registered method returns while it runs: its own future, so a
/// handler that needs to make an outbound call through [`crate::stub::call`]
/// can simply `.await` it and keep going, the same as any other async code
/// on this node, including the re-entrant call path.
pub type MethodFuture = Pin<Box<dyn Future<Output = Result<Bytes, String>>>>;

/// A single registered method: decode the payload, run the handler against
/// the service, and encode whatever it returns (or the error it raised)
/// back into wire bytes.
///
/// Boxed as `dyn Fn` rather than a bare function pointer because handlers
/// close over the service's own associated decode/encode types; the
/// signature is erased to `Bytes -> MethodFuture` at this layer so one
/// `MethodTable` can hold handlers of differing argument/return types.
pub type MethodFn<S> = Box<dyn Fn(Rc<RefCell<S>>, Bytes) -> MethodFuture>;

/// The set of methods a [`Service`] answers to, keyed by the same
/// `&'static str` identifiers a [`ClientStub`](crate::stub) calls by name
/// (overloading is purely a naming convention at the call site).
pub struct MethodTable<S> {
    methods: HashMap<&'static str, MethodFn<S>>,
}

impl<S> MethodTable<S> {
    pub fn new() -> MethodTable<S> {
        MethodTable { methods: HashMap::new() }
    }

    /// Register a handler under `name`. Service constructors call this once
    /// per method when building their static table; re-registering the same
    /// name silently replaces the previous handler, the same way a later
    /// `match` arm would shadow an earlier one.
    pub fn register(&mut self, name: &'static str, f: MethodFn<S>) -> &mut Self {
        self.methods.insert(name, f);
        self
    }

    fn get(&self, name: &str) -> Option<&MethodFn<S>> {
        self.methods.get(name)
    }
}

impl<S> Default for MethodTable<S> {
    fn default() -> Self { MethodTable::new() }
}

/// A handler object hosted on a node. Implementors describe their method
/// table once; everything about decoding arguments, running the method, and
/// encoding the reply is the table's business, not the event loop's.
pub trait Service: Sized + 'static {
    fn method_table() -> &'static MethodTable<Self>;
}

/// Resolve, decode, invoke, and reply to one inbound [`Command`] against
/// `service`. Spawned as its own scheduler task, so a handler that itself
/// calls out through a `ClientStub` suspends without blocking any other task
/// on the node, including one that calls back into this same node, which is
/// how a cycle of peers resolves without deadlocking.
///
/// An unrecognized method name is a dispatch-time protocol violation: the
/// caller built its `Command` from a name the service simply never
/// registered, which cannot happen without a programming mistake on one side
/// or the other.
pub async fn dispatch_command<S: Service>(service: Rc<RefCell<S>>, command: Command) {
    let Command { origin, id, method, payload } = command;

    let future = match S::method_table().get(method) {
        Some(handler) => handler(service, payload),
        None => abort_node(format!("unknown method {method:?} dispatched to this node")),
    };

    let (success, payload) = match future.await {
        Ok(reply) => (true, reply),
        Err(message) => (false, Bytes::from(message.into_bytes())),
    };

    // The origin is the caller's own mailbox, which may by now belong to a
    // node that has since shut down; that is an ordinary, reportable
    // failure for whichever `ClientStub::call` sent this, not ours to
    // abort over.
    let _ = origin.send(Response { success, id, payload });
}

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

//! Service implementations used only by the integration tests: real
//! `meshloop::Service`s with `serde`/`bincode`-encoded arguments, standing
//! in for the handwritten application services a real user of this crate
//! would bring.

use std::cell::RefCell;
use std::rc::Rc;
use std::sync::OnceLock;

use bytes::Bytes;
use meshloop::dispatch::{MethodFuture, MethodTable};
use meshloop::{call, MailboxHandle, Service, StubError};
use serde::{de::DeserializeOwned, Serialize};

/// Encode `req`, call `method` on `target`, and decode the reply. What a
/// generated client stub would do by hand for every method.
pub async fn call_as<Req, Resp>(target: &MailboxHandle, method: &'static str, req: &Req) -> Result<Resp, StubError>
where
    Req: Serialize,
    Resp: DeserializeOwned,
{
    let payload = Bytes::from(bincode::serialize(req).expect("request serializes"));
    let reply = call(target, method, payload).await?;
    Ok(bincode::deserialize(&reply).expect("reply deserializes"))
}

fn encode<Resp: Serialize>(resp: &Resp) -> Result<Bytes, String> {
    bincode::serialize(resp).map(Bytes::from).map_err(|e| format!("bad reply: {e}"))
}

fn decode<Req: DeserializeOwned>(payload: &Bytes) -> Result<Req, String> {
    bincode::deserialize(payload).map_err(|e| format!("bad request: {e}"))
}

/// Scenario 1: a node with a single method that always answers `42`.
#[derive(Default)]
pub struct PubkeyNode;

impl Service for PubkeyNode {
    fn method_table() -> &'static MethodTable<PubkeyNode> {
        static TABLE: OnceLock<MethodTable<PubkeyNode>> = OnceLock::new();
        TABLE.get_or_init(|| {
            let mut t = MethodTable::new();
            t.register(
                "pubkey",
                Box::new(|_service, _payload| -> MethodFuture { Box::pin(async move { encode(&42u64) }) }),
            );
            t
        })
    }
}

/// Scenario 2: two methods named `recv` distinguished only by arity, plus a
/// side channel reporting which one last fired.
#[derive(Default)]
pub struct OverloadNode {
    last: RefCell<&'static str>,
}

impl Service for OverloadNode {
    fn method_table() -> &'static MethodTable<OverloadNode> {
        static TABLE: OnceLock<MethodTable<OverloadNode>> = OnceLock::new();
        TABLE.get_or_init(|| {
            let mut t = MethodTable::new();
            t.register(
                "recv@1",
                Box::new(|service: Rc<RefCell<OverloadNode>>, payload| -> MethodFuture {
                    Box::pin(async move {
                        let _arg: u32 = decode(&payload)?;
                        *service.borrow().last.borrow_mut() = "recv@1";
                        encode(&())
                    })
                }),
            );
            t.register(
                "recv@2",
                Box::new(|service: Rc<RefCell<OverloadNode>>, payload| -> MethodFuture {
                    Box::pin(async move {
                        let _args: (u32, u32) = decode(&payload)?;
                        *service.borrow().last.borrow_mut() = "recv@2";
                        encode(&())
                    })
                }),
            );
            t.register(
                "last",
                Box::new(|service: Rc<RefCell<OverloadNode>>, _payload| -> MethodFuture {
                    Box::pin(async move { encode(&service.borrow().last.borrow().to_string()) })
                }),
            );
            t
        })
    }
}

/// Scenario 3: the fan-in counter. A master counts every `value()` call it
/// ever answers, including those routed through a slave; each slave counts
/// only the calls made directly to it.
#[derive(Default)]
pub struct MasterNode {
    requests: u64,
}

impl Service for MasterNode {
    fn method_table() -> &'static MethodTable<MasterNode> {
        static TABLE: OnceLock<MethodTable<MasterNode>> = OnceLock::new();
        TABLE.get_or_init(|| {
            let mut t = MethodTable::new();
            t.register(
                "value",
                Box::new(|service: Rc<RefCell<MasterNode>>, _payload| -> MethodFuture {
                    Box::pin(async move {
                        service.borrow_mut().requests += 1;
                        encode(&42u64)
                    })
                }),
            );
            t.register(
                "requests",
                Box::new(|service: Rc<RefCell<MasterNode>>, _payload| -> MethodFuture {
                    Box::pin(async move { encode(&service.borrow().requests) })
                }),
            );
            t
        })
    }
}

pub struct SlaveNode {
    pub master: MailboxHandle,
    pub requests: u64,
}

impl Service for SlaveNode {
    fn method_table() -> &'static MethodTable<SlaveNode> {
        static TABLE: OnceLock<MethodTable<SlaveNode>> = OnceLock::new();
        TABLE.get_or_init(|| {
            let mut t = MethodTable::new();
            t.register(
                "value",
                Box::new(|service: Rc<RefCell<SlaveNode>>, _payload| -> MethodFuture {
                    Box::pin(async move {
                        service.borrow_mut().requests += 1;
                        let master = service.borrow().master.clone();
                        let v: u64 = call_as(&master, "value", &()).await.map_err(|e| e.to_string())?;
                        encode(&v)
                    })
                }),
            );
            t.register(
                "requests",
                Box::new(|service: Rc<RefCell<SlaveNode>>, _payload| -> MethodFuture {
                    Box::pin(async move { encode(&service.borrow().requests) })
                }),
            );
            t
        })
    }
}

/// Scenario 4: a ring node forwarding `call(n, v)` to its configured
/// successor as `call(n-1, v+n)`, bottoming out at `n == 0`. Wiring three of
/// these A→B→C→A and calling into A is the "cycle of three": all three
/// calls are suspended on the same chain at once, resolved through the
/// re-entrant `ClientStub` path since each hop is itself a dispatch task on
/// a node simultaneously still servicing the hop before it.
pub struct RingNode {
    pub next: MailboxHandle,
}

impl Service for RingNode {
    fn method_table() -> &'static MethodTable<RingNode> {
        static TABLE: OnceLock<MethodTable<RingNode>> = OnceLock::new();
        TABLE.get_or_init(|| {
            let mut t = MethodTable::new();
            t.register(
                "call",
                Box::new(|service: Rc<RefCell<RingNode>>, payload| -> MethodFuture {
                    Box::pin(async move {
                        let (n, v): (u64, u64) = decode(&payload)?;
                        if n == 0 {
                            return encode(&v);
                        }
                        let next = service.borrow().next.clone();
                        let result: u64 =
                            call_as(&next, "call", &(n - 1, v + n)).await.map_err(|e| e.to_string())?;
                        encode(&result)
                    })
                }),
            );
            t
        })
    }
}

/// Scenario 5: a method that always raises, to exercise error propagation
/// and the isolation property (a failed call must not poison the node).
#[derive(Default)]
pub struct FaultyNode {
    calls: u64,
}

impl Service for FaultyNode {
    fn method_table() -> &'static MethodTable<FaultyNode> {
        static TABLE: OnceLock<MethodTable<FaultyNode>> = OnceLock::new();
        TABLE.get_or_init(|| {
            let mut t = MethodTable::new();
            t.register(
                "explode",
                Box::new(|_service, _payload| -> MethodFuture { Box::pin(async move { Err("boom".to_string()) }) }),
            );
            t.register(
                "ping",
                Box::new(|service: Rc<RefCell<FaultyNode>>, _payload| -> MethodFuture {
                    Box::pin(async move {
                        service.borrow_mut().calls += 1;
                        encode(&service.borrow().calls)
                    })
                }),
            );
            t
        })
    }
}

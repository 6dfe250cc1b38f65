// Copyright 2024 httpvfs
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//      http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

//! A synchronous request/response hand-off between two threads. The
//! requesting side blocks on a reply channel until the serving side answers.

use crossbeam_channel::{Receiver, Sender};
use snafu::OptionExt;

use crate::err::{HandoffClosedSnafu, Result};

struct Envelope<Req, Resp> {
    request: Req,
    reply: Sender<Resp>,
}

/// Create a connected client and server. The server sees the channel closed
/// once every client clone is dropped.
pub fn channel<Req, Resp>() -> (HandoffClient<Req, Resp>, HandoffServer<Req, Resp>) {
    let (tx, rx) = crossbeam_channel::unbounded();
    (HandoffClient { tx }, HandoffServer { rx })
}

pub struct HandoffClient<Req, Resp> {
    tx: Sender<Envelope<Req, Resp>>,
}

impl<Req, Resp> Clone for HandoffClient<Req, Resp> {
    fn clone(&self) -> Self {
        Self {
            tx: self.tx.clone(),
        }
    }
}

impl<Req, Resp> HandoffClient<Req, Resp> {
    /// Send `request` and block until the reply arrives.
    pub fn call(&self, request: Req) -> Result<Resp> {
        let reply = self.send(request)?;
        reply.recv().ok().context(HandoffClosedSnafu)
    }

    fn send(&self, request: Req) -> Result<Receiver<Resp>> {
        let (reply, rx) = crossbeam_channel::bounded(1);
        self.tx
            .send(Envelope { request, reply })
            .ok()
            .context(HandoffClosedSnafu)?;
        Ok(rx)
    }
}

pub struct HandoffServer<Req, Resp> {
    rx: Receiver<Envelope<Req, Resp>>,
}

impl<Req, Resp> HandoffServer<Req, Resp> {
    /// Wait for the next request, `None` once all clients are gone.
    pub fn recv(&self) -> Option<Pending<Req, Resp>> {
        self.rx.recv().ok().map(|envelope| Pending {
            request: Some(envelope.request),
            reply: envelope.reply,
        })
    }
}

/// A request waiting for its reply.
pub struct Pending<Req, Resp> {
    request: Option<Req>,
    reply: Sender<Resp>,
}

impl<Req, Resp> Pending<Req, Resp> {
    pub fn take_request(&mut self) -> Option<Req> { self.request.take() }

    /// Returns false when the requester stopped waiting.
    pub fn respond(self, resp: Resp) -> bool { self.reply.send(resp).is_ok() }
}

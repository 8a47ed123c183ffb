// SPDX-License-Identifier: Apache-2.0

//! A request/reply bus connecting a module's callers (the REST facade, or the TVLP
//! worker acting through [`openperf-rest-client`]) to exactly one module server.
//!
//! This plays the role of the "exclusive pair of client/server sockets per handler"
//! described by spec.md section 6.1: many cloned [`BusSender`]s (dealers) may call
//! into a single [`BusReceiver`] (the worker) owned by the module's event loop. Each
//! request carries its own one-shot reply channel, so concurrent callers never see
//! each other's replies and ordering per-caller is preserved without a correlation id.

use crate::error::{RecvError, SendError};
use tokio::sync::{mpsc, oneshot};

/// An inbound request paired with the channel its reply must be sent on.
pub struct Envelope<Req, Rep> {
    request: Req,
    reply_tx: oneshot::Sender<Rep>,
}

impl<Req, Rep> Envelope<Req, Rep> {
    /// The request payload.
    pub fn request(&self) -> &Req {
        &self.request
    }

    /// Consumes the envelope, returning the request and a closure-like handle to
    /// answer it. Splitting this way lets a dispatcher move the request into a
    /// match expression while retaining the ability to reply from any arm.
    pub fn into_parts(self) -> (Req, ReplyHandle<Rep>) {
        (
            self.request,
            ReplyHandle {
                reply_tx: self.reply_tx,
            },
        )
    }
}

/// A one-shot handle used by a module server to answer exactly one request.
pub struct ReplyHandle<Rep> {
    reply_tx: oneshot::Sender<Rep>,
}

impl<Rep> ReplyHandle<Rep> {
    /// Sends the reply. Returns the reply back to the caller if the dealer already
    /// gave up waiting (e.g. its future was dropped).
    pub fn reply(self, rep: Rep) -> Result<(), Rep> {
        self.reply_tx.send(rep)
    }
}

/// The dealer side of the bus: cloned by every caller that wants to send requests
/// to the module server.
#[derive(Clone)]
pub struct BusSender<Req, Rep> {
    tx: mpsc::Sender<Envelope<Req, Rep>>,
}

/// The worker side of the bus: owned exclusively by the module server's event loop.
pub struct BusReceiver<Req, Rep> {
    rx: mpsc::Receiver<Envelope<Req, Rep>>,
}

/// Creates a new bus with the given backlog capacity.
pub fn bus<Req, Rep>(capacity: usize) -> (BusSender<Req, Rep>, BusReceiver<Req, Rep>) {
    let (tx, rx) = mpsc::channel(capacity);
    (BusSender { tx }, BusReceiver { rx })
}

impl<Req, Rep> BusSender<Req, Rep> {
    /// Sends `request` and awaits the module server's reply.
    ///
    /// Mirrors spec.md section 4.1's `send`/`recv` contract: a bus error (the
    /// module server has gone away) is distinguished from a well-formed reply.
    pub async fn call(&self, request: Req) -> Result<Rep, BusError<Req>> {
        let (reply_tx, reply_rx) = oneshot::channel();
        let envelope = Envelope { request, reply_tx };
        self.tx
            .send(envelope)
            .await
            .map_err(|e| BusError::Send(SendError::Closed(e.0.request)))?;
        reply_rx.await.map_err(|_| BusError::Recv(RecvError::Closed))
    }
}

/// Errors from a full request/reply round trip over the bus.
#[derive(thiserror::Error, Debug)]
pub enum BusError<Req> {
    /// Failed to deliver the request to the module server.
    #[error(transparent)]
    Send(SendError<Req>),
    /// The module server never answered.
    #[error(transparent)]
    Recv(RecvError),
}

impl<Req, Rep> BusReceiver<Req, Rep> {
    /// Waits for the next request. Returns `None` once every [`BusSender`] clone has
    /// been dropped, signalling the event loop should exit (the `ETERM` case of
    /// spec.md section 4.4).
    pub async fn recv(&mut self) -> Option<Envelope<Req, Rep>> {
        self.rx.recv().await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn round_trip_delivers_reply() {
        let (tx, mut rx) = bus::<u32, u32>(4);
        let server = tokio::spawn(async move {
            let envelope = rx.recv().await.expect("request");
            let (req, reply) = envelope.into_parts();
            reply.reply(req * 2).expect("caller still waiting");
        });

        let reply = tx.call(21).await.expect("reply");
        assert_eq!(reply, 42);
        server.await.expect("server task");
    }

    #[tokio::test]
    async fn closed_server_surfaces_bus_error() {
        let (tx, rx) = bus::<u32, u32>(1);
        drop(rx);
        let err = tx.call(1).await.expect_err("server gone");
        assert!(matches!(err, BusError::Send(SendError::Closed(1))));
    }
}

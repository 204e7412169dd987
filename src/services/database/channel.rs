//! Channel-backed dispatch.
//!
//! `ChannelDispatcher` pushes each command onto an `async-channel` queue as an
//! `Envelope` carrying a one-shot reply slot. Whatever owns the receiving end
//! (usually `serve` wrapping a `LocalBackend`) answers with `Envelope::respond`.
//!
//! Transport failures are reported as such:
//! - the receiver is gone -> `TransportError::ChannelClosed`
//! - the envelope was dropped without an answer -> `TransportError::NoReply`

use async_channel::{Receiver, Sender};
use async_trait::async_trait;
use futures::StreamExt;
use futures::channel::oneshot;
use serde_json::Value as JsonValue;
use std::sync::Arc;
use tracing::{debug, trace};

use super::error::{DispatchError, TransportError};
use super::protocol::PROTOCOL_VERSION;
use super::traits::{Command, Dispatcher};

/// One request in flight.
pub struct Envelope {
    pub version: u32,
    pub command: Command,
    pub payload: JsonValue,
    reply: oneshot::Sender<Result<JsonValue, DispatchError>>,
}

impl std::fmt::Debug for Envelope {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Envelope")
            .field("version", &self.version)
            .field("command", &self.command)
            .field("payload", &self.payload)
            .finish()
    }
}

impl Envelope {
    /// Answer the request, consuming the envelope.
    ///
    /// A caller that already gave up is not an error for the responder.
    pub fn respond(self, answer: Result<JsonValue, DispatchError>) {
        if self.reply.send(answer).is_err() {
            trace!(command = %self.command, "caller went away before the reply");
        }
    }
}

/// Client end of a dispatch channel.
#[derive(Debug, Clone)]
pub struct ChannelDispatcher {
    sender: Sender<Envelope>,
}

impl ChannelDispatcher {
    /// Create a bounded channel and return both ends.
    pub fn bounded(capacity: usize) -> (Self, Receiver<Envelope>) {
        let (sender, receiver) = async_channel::bounded(capacity);
        (Self { sender }, receiver)
    }

    /// Create an unbounded channel and return both ends.
    pub fn unbounded() -> (Self, Receiver<Envelope>) {
        let (sender, receiver) = async_channel::unbounded();
        (Self { sender }, receiver)
    }

    pub fn is_closed(&self) -> bool {
        self.sender.is_closed()
    }
}

#[async_trait]
impl Dispatcher for ChannelDispatcher {
    async fn send(&self, command: Command, payload: JsonValue) -> Result<JsonValue, DispatchError> {
        let (reply, response) = oneshot::channel();
        let envelope = Envelope {
            version: PROTOCOL_VERSION,
            command,
            payload,
            reply,
        };

        self.sender
            .send(envelope)
            .await
            .map_err(|_| TransportError::ChannelClosed)?;

        response
            .await
            .map_err(|_| TransportError::NoReply(command))?
    }
}

/// Answer envelopes from `receiver` with `dispatcher` until every sender is gone.
///
/// Requests are handled concurrently; ordering between two in-flight
/// requests is whatever the dispatcher gives.
pub async fn serve<D>(receiver: Receiver<Envelope>, dispatcher: Arc<D>)
where
    D: Dispatcher + ?Sized,
{
    debug!("dispatch loop started");
    receiver
        .for_each_concurrent(None, |mut envelope| {
            let dispatcher = dispatcher.clone();
            async move {
                let answer = if envelope.version != PROTOCOL_VERSION {
                    Err(TransportError::VersionMismatch {
                        expected: PROTOCOL_VERSION,
                        found: envelope.version,
                    }
                    .into())
                } else {
                    let payload = std::mem::take(&mut envelope.payload);
                    dispatcher.send(envelope.command, payload).await
                };
                envelope.respond(answer);
            }
        })
        .await;
    debug!("dispatch loop finished");
}

//! The outbound half of the transport contract.
//!
//! The client never encodes packets itself: every packet it wants to send
//! (events emitted by the application, acknowledgements, namespace connect/disconnect)
//! is handed to a [`PacketSink`], usually the sending half of a channel
//! drained by the encoder/transport task.
use tokio::sync::mpsc::{self, error::TrySendError};

use socketioxide_client_core::Packet;

use crate::errors::SocketError;

/// A "send packet" capability provided by the transport collaborator.
///
/// Implementations must not block: the sink is called from the dispatch path
/// when an event is acknowledged and from application code when emitting.
pub trait PacketSink: Send + Sync + 'static {
    /// Hand a packet to the transport for encoding and sending.
    fn send(&self, packet: Packet) -> Result<(), SocketError>;
}

impl PacketSink for mpsc::Sender<Packet> {
    fn send(&self, packet: Packet) -> Result<(), SocketError> {
        self.try_send(packet).map_err(|e| match e {
            TrySendError::Full(_) => SocketError::InternalChannelFull,
            TrySendError::Closed(_) => SocketError::Closed,
        })
    }
}

impl PacketSink for mpsc::UnboundedSender<Packet> {
    fn send(&self, packet: Packet) -> Result<(), SocketError> {
        mpsc::UnboundedSender::send(self, packet).map_err(|_| SocketError::Closed)
    }
}

use std::borrow::Cow;

use socketioxide_client_core::{AckId, PayloadValue};

pub use socketioxide_client_core::errors::{AttachmentError, SocketError};

/// Error type for ack operations.
#[derive(thiserror::Error, Debug)]
pub enum AckError {
    /// The ack response cannot be parsed
    #[error("cannot deserialize packet from ack response: {0:?}")]
    Decode(#[from] serde_json::Error),

    /// The ack response timed out
    #[error("ack timeout error")]
    Timeout,

    /// The namespace was left or the client was closed before the ack arrived
    #[error("ack cancelled")]
    Cancelled,
}

/// Error type for sending operations.
#[derive(thiserror::Error, Debug)]
pub enum SendError {
    /// An error occurred while serializing the data.
    #[error("Error serializing packet: {0:?}")]
    Serialize(#[from] serde_json::Error),

    /// Error handing the packet to the transport
    #[error("Error sending data through the transport: {0:?}")]
    Socket(#[from] SocketError),
}

/// Error type for the [`AckSender::send`](crate::ack::AckSender::send) method.
#[derive(thiserror::Error, Debug)]
pub enum AckSendError {
    /// This event was already acknowledged, possibly by another listener.
    #[error("ack already sent")]
    AlreadySent,

    /// The ack packet could not be sent
    #[error("{0}")]
    Send(#[from] SendError),
}

/// The payload of every `error` event.
///
/// Apart from [`DispatchError::ConnectError`], which is the server speaking,
/// every variant is a protocol anomaly detected while processing an inbound packet.
#[derive(thiserror::Error, Debug, Clone, PartialEq)]
pub enum DispatchError {
    /// The server sent an error packet, usually refusing a namespace connection
    #[error("error packet received: {0:?}")]
    ConnectError(PayloadValue),

    /// The packet type is not part of the protocol version this client speaks
    #[error("unknown packet type {0}")]
    UnknownPacketType(u8),

    /// An ack was received without a matching pending request
    #[error("no pending ack request {ack_id} on namespace {ns}")]
    UnexpectedAck {
        /// The namespace of the ack packet
        ns: Cow<'static, str>,
        /// The unmatched ack id
        ack_id: AckId,
    },

    /// An ack packet without ack id
    #[error("ack packet without ack id")]
    MissingAckId,

    /// The event payload is not an array starting with the event name
    #[error("invalid event name")]
    InvalidEventName,

    /// The binary attachments do not match the packet placeholders
    #[error("invalid attachments: {0}")]
    InvalidAttachments(#[from] AttachmentError),

    /// A processor panicked while handling the packet
    #[error("packet processor panicked: {0}")]
    ProcessorPanic(String),
}

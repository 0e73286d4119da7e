//! Errors shared by the client dispatch engine and its transport collaborators.

/// Error type when handing packets to the underlying transport
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum SocketError {
    /// The transport channel is full.
    /// You might need to increase the size of the channel given to the client.
    #[error("internal channel full error")]
    InternalChannelFull,

    /// The socket is already closed, or the namespace is not joined
    #[error("socket closed")]
    Closed,
}

/// Error type when putting binary attachments back into a packet payload.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum AttachmentError {
    /// The packet header announced a different number of attachments than received
    #[error("expected {expected} binary attachments, received {received}")]
    CountMismatch {
        /// Attachments announced by the packet header
        expected: usize,
        /// Attachments received from the transport
        received: usize,
    },

    /// A placeholder points to an attachment that was not received
    #[error("placeholder {num} points past the {received} received attachments")]
    MissingAttachment {
        /// The placeholder index
        num: usize,
        /// Attachments received from the transport
        received: usize,
    },
}

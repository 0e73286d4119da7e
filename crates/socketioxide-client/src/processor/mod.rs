//! Packet processors: one state machine transition per packet type.
//!
//! The processors are a closed set, selected with an exhaustive match over
//! [`PacketType`] by [`Processor::select`]. They never block: the only side effects are
//! spawning emissions on the [`EventEmitter`], resolving entries of the [`AckRegistry`]
//! and updating the joined namespaces.
//!
//! A processor returning an error does not emit anything itself:
//! the [`Dispatcher`](crate::Dispatcher) logs it and emits it as an `error` event.
use std::sync::Arc;

use socketioxide_client_core::{Packet, PacketType, errors::AttachmentError};

use crate::{
    ack::AckRegistry, emitter::EventEmitter, errors::DispatchError, ns::Namespaces,
    sink::PacketSink,
};

mod ack;
mod connect;
mod disconnect;
mod error;
mod event;

/// The collaborators shared by all the processors.
pub(crate) struct ProcessCtx {
    pub emitter: Arc<EventEmitter>,
    pub acks: AckRegistry,
    pub nsps: Arc<Namespaces>,
    pub sink: Arc<dyn PacketSink>,
}

/// The processor handling a packet type.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Processor {
    /// Joins the namespace and emits `connect`
    Connect,
    /// Leaves the namespace and emits `disconnect`
    Disconnect,
    /// Emits the application event
    Event,
    /// Resolves the pending ack
    Ack,
    /// Logs the error and emits `error`
    Error,
    /// Resolves the attachments and emits the application event
    BinaryEvent,
    /// Resolves the attachments and the pending ack
    BinaryAck,
    /// Reports an unknown packet type
    Unknown,
}

impl Processor {
    /// Select the processor for a packet type.
    pub fn select(kind: PacketType) -> Self {
        match kind {
            PacketType::Connect => Processor::Connect,
            PacketType::Disconnect => Processor::Disconnect,
            PacketType::Event => Processor::Event,
            PacketType::Ack => Processor::Ack,
            PacketType::Error => Processor::Error,
            PacketType::BinaryEvent => Processor::BinaryEvent,
            PacketType::BinaryAck => Processor::BinaryAck,
            PacketType::Unknown(_) => Processor::Unknown,
        }
    }

    pub(crate) fn process(self, ctx: &ProcessCtx, packet: Packet) -> Result<(), DispatchError> {
        match self {
            Processor::Connect => connect::process(ctx, packet),
            Processor::Disconnect => disconnect::process(ctx, packet),
            Processor::Event => event::process(ctx, packet),
            Processor::Ack => ack::process(ctx, packet),
            Processor::Error => error::process(ctx, packet),
            Processor::BinaryEvent => {
                let packet = resolve_attachments(packet)?;
                event::process(ctx, packet)
            }
            Processor::BinaryAck => {
                let packet = resolve_attachments(packet)?;
                ack::process(ctx, packet)
            }
            Processor::Unknown => Err(DispatchError::UnknownPacketType(packet.kind.index())),
        }
    }
}

/// Put the binary attachments received by the transport back into the payload.
fn resolve_attachments(mut packet: Packet) -> Result<Packet, DispatchError> {
    if packet.attachments.len() != packet.attachment_count {
        return Err(AttachmentError::CountMismatch {
            expected: packet.attachment_count,
            received: packet.attachments.len(),
        }
        .into());
    }
    packet.data.resolve_attachments(&packet.attachments)?;
    Ok(packet)
}

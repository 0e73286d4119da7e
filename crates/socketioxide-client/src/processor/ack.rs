use socketioxide_client_core::Packet;

use super::ProcessCtx;
use crate::errors::DispatchError;

pub(super) fn process(ctx: &ProcessCtx, packet: Packet) -> Result<(), DispatchError> {
    let ack_id = packet.ack_id.ok_or(DispatchError::MissingAckId)?;
    if ctx.acks.resolve(&packet.ns, ack_id, packet.data) {
        tracing::trace!(ack_id, "ack resolved");
        Ok(())
    } else {
        Err(DispatchError::UnexpectedAck {
            ns: packet.ns,
            ack_id,
        })
    }
}

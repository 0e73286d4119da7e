use socketioxide_client_core::Packet;

use super::ProcessCtx;
use crate::{errors::DispatchError, event::EventArgs};

pub(super) fn process(ctx: &ProcessCtx, packet: Packet) -> Result<(), DispatchError> {
    if !ctx.nsps.join(packet.ns.clone()) {
        tracing::debug!(ns = %packet.ns, "connect packet for an already joined namespace");
    }
    ctx.emitter.emit(
        crate::event::CONNECT,
        EventArgs::Connect {
            ns: packet.ns,
            auth: packet.data,
        },
    );
    Ok(())
}

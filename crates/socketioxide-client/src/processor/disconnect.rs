use socketioxide_client_core::Packet;

use super::ProcessCtx;
use crate::{
    errors::DispatchError,
    event::{DISCONNECT, DisconnectReason, EventArgs},
};

/// The transport stays open: other namespaces may still be joined,
/// closing it is up to the listener of the `disconnect` event.
pub(super) fn process(ctx: &ProcessCtx, packet: Packet) -> Result<(), DispatchError> {
    if ctx.nsps.leave(&packet.ns) {
        ctx.acks.cancel_ns(&packet.ns);
    } else {
        tracing::debug!(ns = %packet.ns, "disconnect packet for a namespace that was not joined");
    }
    ctx.emitter.emit(
        DISCONNECT,
        EventArgs::Disconnect {
            ns: packet.ns,
            reason: DisconnectReason::ServerNSDisconnect,
        },
    );
    Ok(())
}

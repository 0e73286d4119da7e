use socketioxide_client_core::Packet;

use super::ProcessCtx;
use crate::{
    errors::DispatchError,
    event::{ERROR, EventArgs},
};

/// Purely observational: the namespace is not joined and nothing is retried.
pub(super) fn process(ctx: &ProcessCtx, packet: Packet) -> Result<(), DispatchError> {
    tracing::error!(ns = %packet.ns, data = ?packet.data, "received error packet");
    ctx.emitter.emit(
        ERROR,
        EventArgs::Error {
            ns: packet.ns,
            error: DispatchError::ConnectError(packet.data),
        },
    );
    Ok(())
}

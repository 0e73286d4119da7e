use socketioxide_client_core::{Packet, PayloadValue};

use super::ProcessCtx;
use crate::{
    ack::AckSender,
    errors::DispatchError,
    event::{CONNECT, DISCONNECT, ERROR, EventArgs},
};

/// Events of a namespace that is not joined have no socket to be delivered to and are dropped.
pub(super) fn process(ctx: &ProcessCtx, packet: Packet) -> Result<(), DispatchError> {
    let Packet {
        ns, ack_id, data, ..
    } = packet;
    if !ctx.nsps.is_joined(&ns) {
        tracing::debug!(ns = %ns, "event for a namespace that is not joined, dropping it");
        return Ok(());
    }
    let (event, args) = read_event(data)?;
    tracing::debug!(event = %event, ?ack_id, "event received");

    let ack = ack_id.map(|id| AckSender::new(ns.clone(), id, ctx.sink.clone()));
    if ack.is_some() && ctx.emitter.listener_count(&event) == 0 {
        tracing::debug!(event = %event, "ack requested for an event without listener");
    }
    let name = event.clone();
    ctx.emitter.emit(
        &name,
        EventArgs::Message {
            ns,
            event,
            args,
            ack,
        },
    );
    Ok(())
}

/// Split the event array into its name and its arguments.
/// Reserved names cannot be used by application events.
fn read_event(data: PayloadValue) -> Result<(String, Vec<PayloadValue>), DispatchError> {
    let PayloadValue::Array(mut args) = data else {
        return Err(DispatchError::InvalidEventName);
    };
    if args.is_empty() {
        return Err(DispatchError::InvalidEventName);
    }
    match args.remove(0) {
        PayloadValue::String(event) if ![CONNECT, DISCONNECT, ERROR].contains(&event.as_str()) => {
            Ok((event, args))
        }
        _ => Err(DispatchError::InvalidEventName),
    }
}

//! The single entry point of decoded packets.
//!
//! [`Dispatcher::dispatch`] selects the [`Processor`] of the packet type, runs it and turns any
//! failure into one `error` log record and one [`ERROR`] event. Nothing ever propagates back to
//! the transport: a malformed or unexpected packet never tears down the connection.
use std::{panic::AssertUnwindSafe, sync::Arc};

use socketioxide_client_core::Packet;

use crate::{
    ack::AckRegistry,
    emitter::{EventEmitter, panic_message},
    errors::DispatchError,
    event::{ERROR, EventArgs},
    ns::Namespaces,
    processor::{ProcessCtx, Processor},
    sink::PacketSink,
};

/// Routes every incoming packet to its processor.
pub struct Dispatcher {
    pub(crate) ctx: ProcessCtx,
}

impl Dispatcher {
    /// Create a dispatcher around an emitter, an ack registry and the sink used to answer
    /// acknowledgement requests.
    pub fn new(emitter: Arc<EventEmitter>, acks: AckRegistry, sink: Arc<dyn PacketSink>) -> Self {
        Self {
            ctx: ProcessCtx {
                emitter,
                acks,
                nsps: Arc::new(Namespaces::default()),
                sink,
            },
        }
    }

    /// Process a packet received from the transport.
    ///
    /// Never fails and never blocks on listeners: events are emitted on spawned tasks.
    /// Once the emitter is closed, packets are dropped. Without a tokio runtime the
    /// connection state is still updated but no listener runs.
    pub fn dispatch(&self, packet: Packet) {
        if self.ctx.emitter.is_closed() {
            tracing::debug!(kind = ?packet.kind, ns = %packet.ns, "client closed, ignoring packet");
            return;
        }

        let processor = Processor::select(packet.kind);
        let ns = packet.ns.clone();
        let span = tracing::debug_span!("dispatch", ?processor, ns = %ns, ack_id = ?packet.ack_id);
        let _guard = span.enter();
        tracing::trace!("dispatching packet");

        let res = std::panic::catch_unwind(AssertUnwindSafe(|| processor.process(&self.ctx, packet)))
            .unwrap_or_else(|panic| Err(DispatchError::ProcessorPanic(panic_message(&*panic))));

        if let Err(error) = res {
            tracing::error!(%error, "packet processing failed");
            self.ctx.emitter.emit(ERROR, EventArgs::Error { ns, error });
        }
    }

    /// Returns true if the namespace is currently joined.
    pub fn is_joined(&self, ns: &str) -> bool {
        self.ctx.nsps.is_joined(ns)
    }

    /// The emitter events are dispatched to.
    pub fn emitter(&self) -> &Arc<EventEmitter> {
        &self.ctx.emitter
    }

    /// The registry resolved by ack packets.
    pub fn acks(&self) -> &AckRegistry {
        &self.ctx.acks
    }
}

impl std::fmt::Debug for Dispatcher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Dispatcher")
            .field("emitter", &self.ctx.emitter)
            .field("acks", &self.ctx.acks)
            .field("nsps", &self.ctx.nsps)
            .finish()
    }
}

//! The [`Client`]: the connection facade tying the dispatcher, the emitter,
//! the ack registry and the outbound sink together.
use std::{
    borrow::Cow,
    sync::{Arc, Weak},
    time::Duration,
};

use serde::{Serialize, de::DeserializeOwned};
use socketioxide_client_core::{Packet, PayloadValue};

use crate::{
    ack::{AckRegistry, AckResponse},
    config::{ClientBuilder, ClientConfig},
    dispatcher::Dispatcher,
    emitter::{EventEmitter, Listener, SubscriptionId},
    errors::{SendError, SocketError},
    event::{DISCONNECT, DisconnectReason, EventArgs},
    sink::PacketSink,
};

/// A socket.io client connection.
///
/// The transport decodes incoming frames into [`Packet`]s and hands them to
/// [`Client::dispatch`]. Outbound packets go to the [`PacketSink`] given at creation.
///
/// Cloning is cheap, all the clones share the same connection.
/// The connection is closed with [`Client::close`] or when the last clone is dropped.
/// Listeners capturing a clone of the client keep it alive until it is closed,
/// see [`Client::downgrade`].
#[derive(Clone)]
pub struct Client {
    inner: Arc<ClientInner>,
}

struct ClientInner {
    config: ClientConfig,
    dispatcher: Dispatcher,
}

impl Client {
    /// Create a client with the default [`ClientConfig`].
    pub fn new(sink: impl PacketSink) -> Self {
        Self::with_config(ClientConfig::default(), sink)
    }

    /// Create a [`ClientBuilder`] to customize the config.
    pub fn builder() -> ClientBuilder {
        ClientBuilder::new()
    }

    pub(crate) fn with_config(config: ClientConfig, sink: impl PacketSink) -> Self {
        let dispatcher = Dispatcher::new(
            Arc::new(EventEmitter::new()),
            AckRegistry::new(),
            Arc::new(sink),
        );
        Self {
            inner: Arc::new(ClientInner { config, dispatcher }),
        }
    }

    /// The config of this client.
    pub fn config(&self) -> &ClientConfig {
        &self.inner.config
    }

    /// Create a [`WeakClient`] handle to this client.
    pub fn downgrade(&self) -> WeakClient {
        WeakClient {
            inner: Arc::downgrade(&self.inner),
        }
    }

    /// Register a listener for `event`. See [`EventEmitter::on`].
    ///
    /// Reserved events are [`CONNECT`](crate::event::CONNECT),
    /// [`DISCONNECT`](crate::event::DISCONNECT) and [`ERROR`](crate::event::ERROR),
    /// any other name listens to application events sent by the server.
    ///
    /// A listener capturing a [`Client`] clone keeps the client alive until [`Client::close`]
    /// is called. Capture a [`WeakClient`] from [`Client::downgrade`] instead.
    ///
    /// # Example
    /// ```
    /// # use socketioxide_client::{Client, event::EventArgs};
    /// # let (tx, _rx) = tokio::sync::mpsc::unbounded_channel();
    /// let client = Client::new(tx);
    /// client.on("message", |args: EventArgs| async move {
    ///     let msg: String = args.data().unwrap_or_default();
    ///     println!("received {msg}");
    /// });
    /// ```
    pub fn on<L: Listener>(&self, event: impl Into<Cow<'static, str>>, listener: L) -> SubscriptionId {
        self.emitter().on(event, listener)
    }

    /// Remove a listener previously registered with [`Client::on`].
    pub fn off(&self, subscription: &SubscriptionId) -> bool {
        self.emitter().off(subscription)
    }

    /// Process a packet decoded by the transport. See [`Dispatcher::dispatch`].
    pub fn dispatch(&self, packet: Packet) {
        self.inner.dispatcher.dispatch(packet)
    }

    /// Ask the server to join the default namespace.
    pub fn open(&self) -> Result<(), SendError> {
        self.send(Packet::connect(self.inner.config.default_ns.clone(), None))
    }

    /// Ask the server to join `ns`.
    /// The namespace is joined when the server answers with a connect packet.
    pub fn connect(&self, ns: impl Into<Cow<'static, str>>) -> Result<(), SendError> {
        self.send(Packet::connect(ns, None))
    }

    /// Ask the server to join `ns`, with an auth payload.
    pub fn connect_with_auth<T: ?Sized + Serialize>(
        &self,
        ns: impl Into<Cow<'static, str>>,
        auth: &T,
    ) -> Result<(), SendError> {
        let auth = PayloadValue::from_data(auth)?;
        self.send(Packet::connect(ns, Some(auth)))
    }

    /// Leave `ns`: the server is notified, the pending acks of the namespace are cancelled
    /// and a [`DISCONNECT`] event is emitted with [`DisconnectReason::ClientNSDisconnect`].
    ///
    /// The namespace is left even if the disconnect packet cannot be sent.
    pub fn disconnect(&self, ns: impl Into<Cow<'static, str>>) -> Result<(), SendError> {
        let ns = ns.into();
        let ctx = &self.inner.dispatcher.ctx;
        if !ctx.nsps.leave(&ns) {
            return Err(SocketError::Closed.into());
        }
        let res = self.send(Packet::disconnect(ns.clone()));
        let cancelled = ctx.acks.cancel_ns(&ns);
        tracing::debug!(ns = %ns, cancelled, "namespace left");
        ctx.emitter.emit(
            DISCONNECT,
            EventArgs::Disconnect {
                ns,
                reason: DisconnectReason::ClientNSDisconnect,
            },
        );
        res
    }

    /// Emit an event to the server on a joined namespace, `data` being its single argument.
    ///
    /// `data` goes through serde, which has no notion of binary attachments:
    /// binary arguments must be sent with [`Client::emit_args`].
    pub fn emit<T: ?Sized + Serialize>(
        &self,
        ns: impl Into<Cow<'static, str>>,
        event: impl Into<String>,
        data: &T,
    ) -> Result<(), SendError> {
        let arg = serialize_arg(data)?;
        self.emit_args(ns, event, vec![arg])
    }

    /// Emit an event with a list of arguments.
    ///
    /// The event is sent as a binary event if any argument holds [`PayloadValue::Binary`] nodes,
    /// the attachments being numbered in traversal order.
    pub fn emit_args(
        &self,
        ns: impl Into<Cow<'static, str>>,
        event: impl Into<String>,
        args: Vec<PayloadValue>,
    ) -> Result<(), SendError> {
        let packet = self.event_packet(ns.into(), event.into(), args)?;
        self.send(packet)
    }

    /// Emit an event and wait for the server to acknowledge it,
    /// within the configured [`ack_timeout`](ClientConfig::ack_timeout).
    ///
    /// The returned [`AckResponse`] resolves to the ack payload decoded as `V`.
    /// With `V = PayloadValue` the payload is not decoded and keeps its binary attachments.
    pub fn emit_with_ack<T: ?Sized + Serialize, V: DeserializeOwned + 'static>(
        &self,
        ns: impl Into<Cow<'static, str>>,
        event: impl Into<String>,
        data: &T,
    ) -> Result<AckResponse<V>, SendError> {
        self.emit_with_ack_timeout(ns, event, data, self.inner.config.ack_timeout)
    }

    /// Same as [`Client::emit_with_ack`] with a custom timeout.
    pub fn emit_with_ack_timeout<T: ?Sized + Serialize, V: DeserializeOwned + 'static>(
        &self,
        ns: impl Into<Cow<'static, str>>,
        event: impl Into<String>,
        data: &T,
        timeout: Duration,
    ) -> Result<AckResponse<V>, SendError> {
        let arg = serialize_arg(data)?;
        let response = self.emit_args_with_ack_timeout(ns, event, vec![arg], timeout)?;
        Ok(response.typed())
    }

    /// [`Client::emit_args`] waiting for an acknowledgement,
    /// within the configured [`ack_timeout`](ClientConfig::ack_timeout).
    pub fn emit_args_with_ack(
        &self,
        ns: impl Into<Cow<'static, str>>,
        event: impl Into<String>,
        args: Vec<PayloadValue>,
    ) -> Result<AckResponse<PayloadValue>, SendError> {
        self.emit_args_with_ack_timeout(ns, event, args, self.inner.config.ack_timeout)
    }

    /// Same as [`Client::emit_args_with_ack`] with a custom timeout.
    pub fn emit_args_with_ack_timeout(
        &self,
        ns: impl Into<Cow<'static, str>>,
        event: impl Into<String>,
        args: Vec<PayloadValue>,
        timeout: Duration,
    ) -> Result<AckResponse<PayloadValue>, SendError> {
        let ns = ns.into();
        let mut packet = self.event_packet(ns.clone(), event.into(), args)?;
        let acks = &self.inner.dispatcher.ctx.acks;
        let (ack_id, response) = acks.register(ns.clone(), timeout);
        packet.set_ack_id(ack_id);
        if let Err(e) = self.send(packet) {
            acks.cancel(&ns, ack_id);
            return Err(e);
        }
        Ok(response)
    }

    /// Returns true if `ns` is joined.
    pub fn connected(&self, ns: &str) -> bool {
        self.inner.dispatcher.is_joined(ns)
    }

    /// The namespaces currently joined.
    pub fn namespaces(&self) -> Vec<Cow<'static, str>> {
        self.inner.dispatcher.ctx.nsps.list()
    }

    /// The number of acknowledgements still awaited.
    pub fn pending_acks(&self) -> usize {
        self.inner.dispatcher.acks().pending()
    }

    /// Close the client: every pending ack fails with
    /// [`AckError::Cancelled`](crate::AckError::Cancelled), listeners are removed and
    /// the following packets are ignored. Closing twice has no effect.
    pub fn close(&self) {
        self.inner.close();
    }

    /// Returns true if the client is closed.
    pub fn is_closed(&self) -> bool {
        self.emitter().is_closed()
    }

    fn emitter(&self) -> &Arc<EventEmitter> {
        self.inner.dispatcher.emitter()
    }

    fn event_packet(
        &self,
        ns: Cow<'static, str>,
        event: String,
        args: Vec<PayloadValue>,
    ) -> Result<Packet, SendError> {
        if self.is_closed() || !self.connected(&ns) {
            return Err(SocketError::Closed.into());
        }
        let mut data = Vec::with_capacity(args.len() + 1);
        data.push(PayloadValue::String(event));
        data.extend(args);
        Ok(Packet::event(ns, PayloadValue::Array(data)))
    }

    fn send(&self, packet: Packet) -> Result<(), SendError> {
        if self.is_closed() {
            return Err(SocketError::Closed.into());
        }
        tracing::trace!(kind = ?packet.kind, ns = %packet.ns, "sending packet");
        self.inner.dispatcher.ctx.sink.send(packet)?;
        Ok(())
    }
}

impl ClientInner {
    fn close(&self) {
        let ctx = &self.dispatcher.ctx;
        if ctx.emitter.is_closed() {
            return;
        }
        ctx.emitter.close();
        ctx.nsps.clear();
        let cancelled = ctx.acks.cancel_all();
        tracing::debug!(cancelled, "client closed");
    }
}

impl Drop for ClientInner {
    fn drop(&mut self) {
        self.close();
    }
}

/// Serialize an argument. Binary nodes coming out of serde are placeholders
/// without their bytes, they are rejected instead of being sent empty.
fn serialize_arg<T: ?Sized + Serialize>(data: &T) -> Result<PayloadValue, SendError> {
    let arg = PayloadValue::from_data(data)?;
    if arg.has_binary() {
        return Err(SendError::Serialize(serde::ser::Error::custom(
            "binary payloads must be sent with `emit_args`",
        )));
    }
    Ok(arg)
}

/// A weak handle to a [`Client`], obtained with [`Client::downgrade`].
///
/// Listeners that need to emit should capture it rather than a [`Client`] clone,
/// so that dropping the last [`Client`] still closes the connection.
#[derive(Debug, Clone)]
pub struct WeakClient {
    inner: Weak<ClientInner>,
}

impl WeakClient {
    /// Returns the client if it was not dropped yet.
    pub fn upgrade(&self) -> Option<Client> {
        self.inner.upgrade().map(|inner| Client { inner })
    }
}

impl std::fmt::Debug for Client {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Client")
            .field("config", &self.inner.config)
            .field("dispatcher", &self.inner.dispatcher)
            .finish()
    }
}

#[cfg(test)]
mod test {
    use bytes::Bytes;
    use socketioxide_client_core::PacketType;
    use tokio::sync::mpsc;

    use super::*;
    use crate::errors::AckError;

    fn client() -> (Client, mpsc::UnboundedReceiver<Packet>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (Client::new(tx), rx)
    }

    #[tokio::test]
    async fn emit_requires_joined_ns() {
        let (client, mut rx) = client();
        let err = client.emit("/", "msg", &1).unwrap_err();
        assert!(matches!(err, SendError::Socket(SocketError::Closed)));
        assert!(rx.try_recv().is_err());

        client.dispatch(Packet::connect("/", None));
        client.emit("/", "msg", &1).unwrap();
        let packet = rx.try_recv().unwrap();
        assert_eq!(packet, Packet::event("/", serde_json::json!(["msg", 1]).into()));
    }

    #[tokio::test]
    async fn emit_binary_args() {
        let (client, mut rx) = client();
        client.dispatch(Packet::connect("/", None));

        let args = vec![
            PayloadValue::from("a.bin"),
            PayloadValue::from(Bytes::from_static(b"abc")),
            PayloadValue::Array(vec![Bytes::from_static(b"def").into()]),
        ];
        client.emit_args("/", "upload", args).unwrap();

        let packet = rx.try_recv().unwrap();
        assert_eq!(packet.kind, PacketType::BinaryEvent);
        assert_eq!(packet.attachment_count, 2);
        assert_eq!(
            packet.attachments,
            [Bytes::from_static(b"abc"), Bytes::from_static(b"def")]
        );
        assert_eq!(
            packet.data.to_value(),
            serde_json::json!([
                "upload",
                "a.bin",
                { "_placeholder": true, "num": 0 },
                [{ "_placeholder": true, "num": 1 }]
            ])
        );
    }

    #[tokio::test]
    async fn emit_args_with_ack_is_binary() {
        let (client, mut rx) = client();
        client.dispatch(Packet::connect("/", None));

        let args = vec![PayloadValue::from(Bytes::from_static(b"abc"))];
        let _ack = client.emit_args_with_ack("/", "upload", args).unwrap();

        let packet = rx.try_recv().unwrap();
        assert_eq!(packet.kind, PacketType::BinaryEvent);
        assert_eq!(packet.ack_id, Some(0));
        assert_eq!(packet.attachments, [Bytes::from_static(b"abc")]);
    }

    #[tokio::test]
    async fn emit_rejects_serialized_binary() {
        let (client, mut rx) = client();
        client.dispatch(Packet::connect("/", None));

        let bin = PayloadValue::from(Bytes::from_static(b"abc"));
        let err = client.emit("/", "upload", &bin).unwrap_err();
        assert!(matches!(err, SendError::Serialize(_)));
        let err = client
            .emit_with_ack::<_, PayloadValue>("/", "upload", &bin)
            .unwrap_err();
        assert!(matches!(err, SendError::Serialize(_)));
        assert!(rx.try_recv().is_err());
        assert_eq!(client.pending_acks(), 0);

        client.emit("/", "upload", &Bytes::from_static(b"abc")).unwrap();
        let packet = rx.try_recv().unwrap();
        assert_eq!(packet.kind, PacketType::Event);
        assert_eq!(packet.data, serde_json::json!(["upload", [97, 98, 99]]).into());
    }

    #[tokio::test]
    async fn weak_client_does_not_keep_client_alive() {
        let (client, _rx) = client();
        client.dispatch(Packet::connect("/", None));
        let weak = client.downgrade();
        client.on("msg", move |_: EventArgs| {
            let weak = weak.clone();
            async move {
                if let Some(client) = weak.upgrade() {
                    client.emit("/", "echo", &()).ok();
                }
            }
        });
        let weak = client.downgrade();
        let ack = client.emit_with_ack::<_, PayloadValue>("/", "msg", &1).unwrap();

        drop(client);
        assert!(weak.upgrade().is_none());
        assert!(matches!(ack.await, Err(AckError::Cancelled)));
    }

    #[tokio::test]
    async fn open_uses_default_ns() {
        let (tx, mut rx) = mpsc::unbounded_channel();
        let client = Client::builder().default_ns("/admin").build(tx);
        client.open().unwrap();
        assert_eq!(rx.try_recv().unwrap(), Packet::connect("/admin", None));
    }

    #[tokio::test]
    async fn rejected_emit_removes_ack() {
        let (tx, rx) = mpsc::channel(1);
        let client = Client::new(tx);
        client.dispatch(Packet::connect("/", None));
        let _first = client.emit_with_ack::<_, PayloadValue>("/", "msg", &1).unwrap();
        let err = client.emit_with_ack::<_, PayloadValue>("/", "msg", &2).unwrap_err();
        assert!(matches!(err, SendError::Socket(SocketError::InternalChannelFull)));
        assert_eq!(client.pending_acks(), 1);
        drop(rx);
    }

    #[tokio::test]
    async fn close_cancels_acks() {
        let (client, _rx) = client();
        client.dispatch(Packet::connect("/", None));
        let ack = client.emit_with_ack::<_, PayloadValue>("/", "msg", &1).unwrap();
        client.close();
        client.close();
        assert!(matches!(ack.await, Err(AckError::Cancelled)));
        assert!(client.is_closed());
        assert!(client.namespaces().is_empty());
        assert!(matches!(
            client.connect("/"),
            Err(SendError::Socket(SocketError::Closed))
        ));
    }

    #[tokio::test]
    async fn drop_cancels_acks() {
        let (client, _rx) = client();
        client.dispatch(Packet::connect("/", None));
        let ack = client.emit_with_ack::<_, PayloadValue>("/", "msg", &1).unwrap();
        drop(client);
        assert!(matches!(ack.await, Err(AckError::Cancelled)));
    }
}

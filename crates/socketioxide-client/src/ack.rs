//! Acknowledgement related types and functions.
//!
//! Here are the main types:
//!
//! - [`AckRegistry`]: the pending acknowledgement requests of a connection, keyed by namespace and ack id.
//! - [`AckResponse`]: a [`Future`] of the acknowledgement received from the server.
//! - [`AckSender`]: given to listeners of events that request an acknowledgement.
use std::{
    borrow::Cow,
    collections::HashMap,
    fmt,
    future::Future,
    pin::Pin,
    sync::{
        Arc, Mutex, Weak,
        atomic::{AtomicBool, Ordering},
    },
    task::{Context, Poll, ready},
    time::Duration,
};

use serde::{Serialize, de::DeserializeOwned};
use tokio::{sync::oneshot, task::AbortHandle};
use tracing::instrument::WithSubscriber;

use socketioxide_client_core::{AckId, Packet, PayloadValue};

use crate::{
    errors::{AckError, AckSendError, SendError},
    sink::PacketSink,
};

pub(crate) type AckResult<T> = Result<T, AckError>;

struct PendingAck {
    tx: oneshot::Sender<AckResult<PayloadValue>>,
    timer: AbortHandle,
}

#[derive(Default)]
struct NsAcks {
    next_id: AckId,
    pending: HashMap<AckId, PendingAck>,
}

#[derive(Default)]
struct Inner {
    namespaces: Mutex<HashMap<Cow<'static, str>, NsAcks>>,
}

/// The pending acknowledgement requests of one connection.
///
/// Every entry is completed exactly once: by [`AckRegistry::resolve`], by its timeout
/// or by a cancellation. All of them remove the entry under the same lock,
/// whichever comes first wins and the others find nothing to complete.
#[derive(Clone, Default)]
pub struct AckRegistry {
    inner: Arc<Inner>,
}

impl AckRegistry {
    /// Create an empty registry
    pub fn new() -> Self {
        Self::default()
    }

    /// Allocate the next ack id of `ns` and start its timeout timer.
    ///
    /// Ack ids start at 0 and are strictly increasing per namespace for the lifetime
    /// of the registry.
    ///
    /// # Panics
    /// If called outside of a tokio runtime.
    pub fn register(
        &self,
        ns: impl Into<Cow<'static, str>>,
        timeout: Duration,
    ) -> (AckId, AckResponse<PayloadValue>) {
        let ns = ns.into();
        let (tx, rx) = oneshot::channel();
        let mut namespaces = self.inner.namespaces.lock().unwrap();
        let acks = namespaces.entry(ns.clone()).or_default();
        let ack_id = acks.next_id;
        acks.next_id += 1;

        let inner = Arc::downgrade(&self.inner);
        let timer = tokio::spawn(
            async move {
                tokio::time::sleep(timeout).await;
                expire(inner, &ns, ack_id);
            }
            .with_current_subscriber(),
        );
        acks.pending.insert(
            ack_id,
            PendingAck {
                tx,
                timer: timer.abort_handle(),
            },
        );
        tracing::trace!(ack_id, ?timeout, "ack registered");
        (ack_id, AckResponse::new(rx))
    }

    /// Complete the pending entry `(ns, ack_id)` with `payload`.
    ///
    /// Returns false if there is no such entry: it was never registered,
    /// already resolved, timed out or cancelled.
    pub fn resolve(&self, ns: &str, ack_id: AckId, payload: PayloadValue) -> bool {
        match self.take(ns, ack_id) {
            Some(entry) => {
                entry.timer.abort();
                if entry.tx.send(Ok(payload)).is_err() {
                    tracing::debug!(ns, ack_id, "ack resolved but nobody is waiting for it");
                }
                true
            }
            None => false,
        }
    }

    /// Remove an entry without completing it, the waiting handle yields [`AckError::Cancelled`].
    /// Returns false if there is no such entry.
    pub fn cancel(&self, ns: &str, ack_id: AckId) -> bool {
        self.take(ns, ack_id).map(cancel_entry).is_some()
    }

    /// Cancel every pending entry of `ns`. Returns the number of cancelled entries.
    ///
    /// The ack id counter of the namespace is kept.
    pub fn cancel_ns(&self, ns: &str) -> usize {
        let entries: Vec<_> = match self.inner.namespaces.lock().unwrap().get_mut(ns) {
            Some(acks) => acks.pending.drain().map(|(_, e)| e).collect(),
            None => return 0,
        };
        let count = entries.len();
        entries.into_iter().for_each(cancel_entry);
        if count > 0 {
            tracing::debug!(ns, count, "pending acks cancelled");
        }
        count
    }

    /// Cancel every pending entry. Returns the number of cancelled entries.
    pub fn cancel_all(&self) -> usize {
        let entries: Vec<_> = self
            .inner
            .namespaces
            .lock()
            .unwrap()
            .values_mut()
            .flat_map(|acks| acks.pending.drain().map(|(_, e)| e))
            .collect();
        let count = entries.len();
        entries.into_iter().for_each(cancel_entry);
        count
    }

    /// The number of pending entries, all namespaces included.
    pub fn pending(&self) -> usize {
        self.inner
            .namespaces
            .lock()
            .unwrap()
            .values()
            .map(|acks| acks.pending.len())
            .sum()
    }

    /// Returns true if `(ns, ack_id)` is still waiting for its acknowledgement.
    pub fn contains(&self, ns: &str, ack_id: AckId) -> bool {
        self.inner
            .namespaces
            .lock()
            .unwrap()
            .get(ns)
            .is_some_and(|acks| acks.pending.contains_key(&ack_id))
    }

    fn take(&self, ns: &str, ack_id: AckId) -> Option<PendingAck> {
        self.inner
            .namespaces
            .lock()
            .unwrap()
            .get_mut(ns)?
            .pending
            .remove(&ack_id)
    }
}

fn expire(inner: Weak<Inner>, ns: &str, ack_id: AckId) {
    let Some(inner) = inner.upgrade() else {
        return;
    };
    let entry = inner
        .namespaces
        .lock()
        .unwrap()
        .get_mut(ns)
        .and_then(|acks| acks.pending.remove(&ack_id));
    if let Some(entry) = entry {
        tracing::debug!(ns, ack_id, "ack timed out");
        entry.tx.send(Err(AckError::Timeout)).ok();
    }
}

fn cancel_entry(entry: PendingAck) {
    entry.timer.abort();
    entry.tx.send(Err(AckError::Cancelled)).ok();
}

impl Drop for Inner {
    fn drop(&mut self) {
        let namespaces = self.namespaces.get_mut().unwrap_or_else(|e| e.into_inner());
        for acks in namespaces.values() {
            for entry in acks.pending.values() {
                entry.timer.abort();
            }
        }
    }
}

impl fmt::Debug for AckRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AckRegistry")
            .field("pending", &self.pending())
            .finish()
    }
}

pin_project_lite::pin_project! {
    /// A [`Future`] of the acknowledgement sent back by the server.
    ///
    /// It yields:
    /// * the ack payload, decoded as `T`, when the matching ack packet is received.
    /// * [`AckError::Timeout`] if the server didn't respond before the timeout.
    /// * [`AckError::Cancelled`] if the namespace was left or the client closed.
    /// * [`AckError::Decode`] if the payload cannot be decoded as `T`.
    ///
    /// The payload is the array of values given by the server to its ack callback.
    #[must_use = "futures do nothing unless you `.await` or poll them"]
    pub struct AckResponse<T> {
        #[pin]
        rx: oneshot::Receiver<AckResult<PayloadValue>>,
        decode: fn(PayloadValue) -> AckResult<T>,
    }
}

impl AckResponse<PayloadValue> {
    fn new(rx: oneshot::Receiver<AckResult<PayloadValue>>) -> Self {
        AckResponse { rx, decode: Ok }
    }

    /// Decode the ack payload as a `T` instead of a raw [`PayloadValue`].
    pub fn typed<T: DeserializeOwned + 'static>(self) -> AckResponse<T> {
        AckResponse {
            rx: self.rx,
            decode: decode_payload::<T>,
        }
    }
}

fn decode_payload<T: DeserializeOwned + 'static>(value: PayloadValue) -> AckResult<T> {
    Ok(value.into_data()?)
}

impl<T> Future for AckResponse<T> {
    type Output = AckResult<T>;

    fn poll(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        let project = self.project();
        let res = match ready!(project.rx.poll(cx)) {
            Ok(Ok(v)) => (project.decode)(v),
            Ok(Err(e)) => Err(e),
            Err(_) => Err(AckError::Cancelled),
        };
        Poll::Ready(res)
    }
}

impl<T> fmt::Debug for AckResponse<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AckResponse").finish_non_exhaustive()
    }
}

/// An acknowledgement sender, handed to the listeners of an event
/// for which the server requested an acknowledgement.
///
/// It can be cloned, but the event is acknowledged only once:
/// the first successful [`send`](AckSender::send) wins and the following ones
/// return [`AckSendError::AlreadySent`].
#[derive(Clone)]
pub struct AckSender {
    ns: Cow<'static, str>,
    ack_id: AckId,
    sink: Arc<dyn PacketSink>,
    sent: Arc<AtomicBool>,
}

impl AckSender {
    pub(crate) fn new(ns: Cow<'static, str>, ack_id: AckId, sink: Arc<dyn PacketSink>) -> Self {
        Self {
            ns,
            ack_id,
            sink,
            sent: Arc::new(AtomicBool::new(false)),
        }
    }

    /// The ack id requested by the server.
    pub fn ack_id(&self) -> AckId {
        self.ack_id
    }

    /// Returns true if the event was already acknowledged.
    pub fn is_sent(&self) -> bool {
        self.sent.load(Ordering::Acquire)
    }

    /// Acknowledge the event with a single serializable value.
    pub fn send<T: ?Sized + Serialize>(&self, data: &T) -> Result<(), AckSendError> {
        let data = PayloadValue::from_data(data).map_err(SendError::from)?;
        self.send_args(vec![data])
    }

    /// Acknowledge the event with a list of arguments.
    /// [`PayloadValue::Binary`] arguments make it a binary ack.
    pub fn send_args(&self, args: Vec<PayloadValue>) -> Result<(), AckSendError> {
        if self.sent.swap(true, Ordering::AcqRel) {
            return Err(AckSendError::AlreadySent);
        }
        let packet = Packet::ack(self.ns.clone(), PayloadValue::Array(args), self.ack_id);
        if let Err(e) = self.sink.send(packet) {
            tracing::debug!(ns = %self.ns, ack_id = self.ack_id, "error sending ack: {e}");
            self.sent.store(false, Ordering::Release);
            return Err(SendError::from(e).into());
        }
        Ok(())
    }
}

impl fmt::Debug for AckSender {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AckSender")
            .field("ns", &self.ns)
            .field("ack_id", &self.ack_id)
            .field("sent", &self.is_sent())
            .finish()
    }
}

//! The [`EventEmitter`]: a per-connection registry of listeners keyed by event name.
//!
//! Emitting never blocks the caller: the listeners registered at the time of the call are
//! snapshotted and run one after the other, in subscription order, on a spawned task.
//! A listener that returns an error or panics is logged and skipped, the following ones still run.
use std::{
    any::Any,
    borrow::Cow,
    collections::HashMap,
    future::Future,
    panic::AssertUnwindSafe,
    pin::Pin,
    sync::{
        Arc, RwLock,
        atomic::{AtomicBool, AtomicU64, Ordering},
    },
    task::{Context, Poll},
};

use futures_util::FutureExt;
use smallvec::SmallVec;
use tokio::task::JoinHandle;
use tracing::instrument::WithSubscriber;

use crate::event::EventArgs;

/// A boxed error returned by a failing listener.
pub type BoxError = Box<dyn std::error::Error + Send + Sync>;

/// Boxed future returned by [`Listener::call`].
pub type BoxFuture<T> = Pin<Box<dyn Future<Output = T> + Send + 'static>>;

/// The output of a listener future: either `()` or a `Result<(), E>`.
pub trait IntoListenerResult {
    /// Convert the listener output into a result
    fn into_listener_result(self) -> Result<(), BoxError>;
}
impl IntoListenerResult for () {
    fn into_listener_result(self) -> Result<(), BoxError> {
        Ok(())
    }
}
impl<E: Into<BoxError>> IntoListenerResult for Result<(), E> {
    fn into_listener_result(self) -> Result<(), BoxError> {
        self.map_err(Into::into)
    }
}

/// A callback subscribed to an event.
///
/// It is implemented for any `Fn(EventArgs) -> impl Future` closure,
/// the future output being `()` or a `Result<(), E>`.
pub trait Listener: Send + Sync + 'static {
    /// Call the listener with the event arguments
    fn call(&self, args: EventArgs) -> BoxFuture<Result<(), BoxError>>;
}

impl<F, Fut, R> Listener for F
where
    F: Fn(EventArgs) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = R> + Send + 'static,
    R: IntoListenerResult + 'static,
{
    fn call(&self, args: EventArgs) -> BoxFuture<Result<(), BoxError>> {
        Box::pin((self)(args).map(IntoListenerResult::into_listener_result))
    }
}

/// A handle to a registered listener, used to unsubscribe it with [`EventEmitter::off`].
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct SubscriptionId {
    event: Cow<'static, str>,
    id: u64,
}

impl SubscriptionId {
    /// The event name this subscription listens to.
    pub fn event(&self) -> &str {
        &self.event
    }
}

struct Subscriber {
    id: u64,
    listener: Arc<dyn Listener>,
}

/// The outcome of one emission.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct EmitReport {
    /// Listeners that completed successfully
    pub delivered: usize,
    /// Listeners that returned an error or panicked
    pub failed: usize,
}

/// Registry of listeners for one connection.
pub struct EventEmitter {
    listeners: RwLock<HashMap<Cow<'static, str>, Vec<Subscriber>>>,
    next_id: AtomicU64,
    closed: AtomicBool,
}

impl Default for EventEmitter {
    fn default() -> Self {
        Self::new()
    }
}

impl EventEmitter {
    /// Create an empty emitter
    pub fn new() -> Self {
        Self {
            listeners: RwLock::new(HashMap::new()),
            next_id: AtomicU64::new(0),
            closed: AtomicBool::new(false),
        }
    }

    /// Subscribe a listener to `event`. Listeners of the same event are called in
    /// subscription order.
    pub fn on<L: Listener>(&self, event: impl Into<Cow<'static, str>>, listener: L) -> SubscriptionId {
        let event = event.into();
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        tracing::trace!(%event, id, "adding listener");
        self.listeners
            .write()
            .unwrap()
            .entry(event.clone())
            .or_default()
            .push(Subscriber {
                id,
                listener: Arc::new(listener),
            });
        SubscriptionId { event, id }
    }

    /// Unsubscribe a listener. Returns false if it was already removed.
    ///
    /// An emission that already started still calls the listener.
    pub fn off(&self, subscription: &SubscriptionId) -> bool {
        let mut listeners = self.listeners.write().unwrap();
        let Some(subs) = listeners.get_mut(&subscription.event) else {
            return false;
        };
        let len = subs.len();
        subs.retain(|s| s.id != subscription.id);
        let removed = subs.len() != len;
        if subs.is_empty() {
            listeners.remove(&subscription.event);
        }
        removed
    }

    /// The number of listeners currently subscribed to `event`.
    pub fn listener_count(&self, event: &str) -> usize {
        self.listeners
            .read()
            .unwrap()
            .get(event)
            .map_or(0, Vec::len)
    }

    /// Emit `event` to the listeners subscribed at the time of the call.
    ///
    /// The listeners run on a spawned task, the returned [`EmitHandle`] can be awaited to know
    /// when they are all done, or dropped to let them run detached.
    ///
    /// Outside of a tokio runtime the event is dropped with an error record.
    pub fn emit(&self, event: &str, args: EventArgs) -> EmitHandle {
        if self.closed.load(Ordering::Acquire) {
            tracing::debug!(event, "emitter closed, dropping event");
            return EmitHandle::ready();
        }
        let snapshot: SmallVec<[Arc<dyn Listener>; 4]> = match self.listeners.read().unwrap().get(event) {
            Some(subs) => subs.iter().map(|s| s.listener.clone()).collect(),
            None => SmallVec::new(),
        };
        if snapshot.is_empty() {
            tracing::trace!(event, "no listener for event");
            return EmitHandle::ready();
        }

        let Ok(runtime) = tokio::runtime::Handle::try_current() else {
            tracing::error!(event, "no tokio runtime to run the listeners, dropping event");
            return EmitHandle::ready();
        };

        tracing::trace!(event, listeners = snapshot.len(), "spawning emission");
        let event = event.to_owned();
        let fut = async move {
            let mut report = EmitReport::default();
            for listener in snapshot {
                let args = args.clone();
                let res = AssertUnwindSafe(async move { listener.call(args).await })
                    .catch_unwind()
                    .await;
                match res {
                    Ok(Ok(())) => report.delivered += 1,
                    Ok(Err(error)) => {
                        tracing::error!(event = %event, %error, "listener failed");
                        report.failed += 1;
                    }
                    Err(panic) => {
                        tracing::error!(
                            event = %event,
                            panic = %panic_message(&*panic),
                            "listener panicked"
                        );
                        report.failed += 1;
                    }
                }
            }
            report
        };
        EmitHandle::spawned(runtime.spawn(fut.with_current_subscriber()))
    }

    /// Remove every listener and drop all the following emissions.
    /// Emissions already spawned run to completion.
    pub fn close(&self) {
        self.closed.store(true, Ordering::Release);
        self.listeners.write().unwrap().clear();
    }

    /// Returns true if [`EventEmitter::close`] was called.
    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::Acquire)
    }
}

impl std::fmt::Debug for EventEmitter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let listeners = self.listeners.read().unwrap();
        let counts: HashMap<_, _> = listeners.iter().map(|(k, v)| (k, v.len())).collect();
        f.debug_struct("EventEmitter")
            .field("listeners", &counts)
            .field("closed", &self.closed)
            .finish()
    }
}

pub(crate) fn panic_message(panic: &(dyn Any + Send)) -> String {
    if let Some(s) = panic.downcast_ref::<&str>() {
        (*s).to_owned()
    } else if let Some(s) = panic.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic payload".to_owned()
    }
}

pin_project_lite::pin_project! {
    /// The completion signal of an emission, resolving to an [`EmitReport`].
    ///
    /// Dropping it does not cancel the emission.
    #[allow(missing_docs)]
    #[project = EmitHandleProj]
    pub enum EmitHandle {
        Spawned {
            #[pin]
            handle: JoinHandle<EmitReport>,
        },
        Ready {
            report: EmitReport,
        },
    }
}

impl EmitHandle {
    fn spawned(handle: JoinHandle<EmitReport>) -> Self {
        EmitHandle::Spawned { handle }
    }
    fn ready() -> Self {
        EmitHandle::Ready {
            report: EmitReport::default(),
        }
    }
}

impl Future for EmitHandle {
    type Output = EmitReport;

    fn poll(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        match self.project() {
            EmitHandleProj::Spawned { handle } => handle.poll(cx).map(|res| {
                res.unwrap_or_else(|_e| {
                    tracing::debug!(?_e, "emission task did not complete");
                    EmitReport::default()
                })
            }),
            EmitHandleProj::Ready { report } => Poll::Ready(*report),
        }
    }
}

#[cfg(test)]
mod test {
    use std::sync::Mutex;

    use socketioxide_client_core::PayloadValue;

    use super::*;

    fn message(arg: &str) -> EventArgs {
        EventArgs::Message {
            ns: "/".into(),
            event: "msg".into(),
            args: vec![arg.into()],
            ack: None,
        }
    }

    fn recorder(
        log: &Arc<Mutex<Vec<&'static str>>>,
        name: &'static str,
    ) -> impl Fn(EventArgs) -> futures_util::future::Ready<()> + Send + Sync + 'static {
        let log = log.clone();
        move |_| {
            log.lock().unwrap().push(name);
            futures_util::future::ready(())
        }
    }

    #[tokio::test]
    async fn emit_in_subscription_order() {
        let emitter = EventEmitter::new();
        let log = Arc::new(Mutex::new(Vec::new()));
        emitter.on("msg", recorder(&log, "A"));
        emitter.on("msg", recorder(&log, "B"));

        let report = emitter.emit("msg", message("hello")).await;
        assert_eq!(report, EmitReport { delivered: 2, failed: 0 });
        assert_eq!(*log.lock().unwrap(), ["A", "B"]);
    }

    #[tokio::test]
    async fn off_removes_listener() {
        let emitter = EventEmitter::new();
        let log = Arc::new(Mutex::new(Vec::new()));
        let a = emitter.on("msg", recorder(&log, "A"));
        emitter.on("msg", recorder(&log, "B"));

        assert!(emitter.off(&a));
        assert!(!emitter.off(&a));
        assert_eq!(emitter.listener_count("msg"), 1);

        emitter.emit("msg", message("hello")).await;
        assert_eq!(*log.lock().unwrap(), ["B"]);
    }

    #[tokio::test]
    async fn failing_listeners_are_isolated() {
        let emitter = EventEmitter::new();
        let log = Arc::new(Mutex::new(Vec::new()));
        emitter.on("msg", |_: EventArgs| async { Err::<(), _>("boom") });
        emitter.on("msg", |_: EventArgs| -> futures_util::future::Ready<()> {
            panic!("listener panic")
        });
        emitter.on("msg", recorder(&log, "C"));

        let report = emitter.emit("msg", message("hello")).await;
        assert_eq!(report, EmitReport { delivered: 1, failed: 2 });
        assert_eq!(*log.lock().unwrap(), ["C"]);
    }

    #[tokio::test]
    async fn snapshot_is_taken_at_emit_time() {
        let emitter = Arc::new(EventEmitter::new());
        let log = Arc::new(Mutex::new(Vec::new()));
        let late = recorder(&log, "late");
        let late = Mutex::new(Some(late));
        let emitter2 = emitter.clone();
        emitter.on("msg", move |_: EventArgs| {
            if let Some(late) = late.lock().unwrap().take() {
                emitter2.on("msg", late);
            }
            async {}
        });

        let report = emitter.emit("msg", message("first")).await;
        assert_eq!(report.delivered, 1);
        assert!(log.lock().unwrap().is_empty());

        let report = emitter.emit("msg", message("second")).await;
        assert_eq!(report.delivered, 2);
        assert_eq!(*log.lock().unwrap(), ["late"]);
    }

    #[tokio::test]
    async fn listener_receives_args() {
        let emitter = EventEmitter::new();
        let (tx, mut rx) = tokio::sync::mpsc::unbounded_channel();
        emitter.on("msg", move |args: EventArgs| {
            tx.send(args.args().to_vec()).unwrap();
            async {}
        });
        emitter.emit("msg", message("hello")).await;
        assert_eq!(rx.recv().await.unwrap(), vec![PayloadValue::from("hello")]);
    }

    #[tokio::test]
    async fn closed_emitter_drops_events() {
        let emitter = EventEmitter::new();
        let log = Arc::new(Mutex::new(Vec::new()));
        emitter.on("msg", recorder(&log, "A"));
        emitter.close();

        assert!(emitter.is_closed());
        assert_eq!(emitter.listener_count("msg"), 0);
        let report = emitter.emit("msg", message("hello")).await;
        assert_eq!(report, EmitReport::default());
        assert!(log.lock().unwrap().is_empty());
    }

    #[test]
    fn emit_outside_runtime() {
        let emitter = EventEmitter::new();
        let log = Arc::new(Mutex::new(Vec::new()));
        emitter.on("msg", recorder(&log, "A"));

        let report = emitter.emit("msg", message("hello")).now_or_never();
        assert_eq!(report, Some(EmitReport::default()));
        assert!(log.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn emit_without_listener() {
        let emitter = EventEmitter::new();
        let report = emitter.emit("nobody", message("hello")).await;
        assert_eq!(report, EmitReport::default());
    }
}

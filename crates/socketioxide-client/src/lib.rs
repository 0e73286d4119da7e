#![cfg_attr(docsrs, feature(doc_cfg))]
#![warn(
    clippy::all,
    clippy::todo,
    clippy::empty_enum,
    clippy::mem_forget,
    clippy::unused_self,
    clippy::filter_map_next,
    clippy::needless_continue,
    clippy::needless_borrow,
    clippy::match_wildcard_for_single_variants,
    clippy::if_let_mutex,
    clippy::await_holding_lock,
    clippy::imprecise_flops,
    clippy::suboptimal_flops,
    clippy::lossy_float_literal,
    clippy::rest_pat_in_fully_bound_structs,
    clippy::fn_params_excessive_bools,
    clippy::exit,
    clippy::inefficient_to_string,
    clippy::linkedlist,
    clippy::macro_use_imports,
    clippy::option_option,
    clippy::verbose_file_reads,
    clippy::unnested_or_patterns,
    rust_2018_idioms,
    future_incompatible,
    nonstandard_style,
    missing_docs
)]
//! The packet dispatch and event emission engine of a socket.io client.
//!
//! A transport decodes frames into [`Packet`]s and feeds them to [`Client::dispatch`].
//! Each packet is routed to the [`Processor`] of its type which updates the connection state
//! and emits events to the listeners registered with [`Client::on`]:
//!
//! * a connect packet joins the namespace and emits [`event::CONNECT`].
//! * a disconnect packet leaves it, cancels its pending acks and emits [`event::DISCONNECT`].
//! * an event packet, binary or not, emits the application event. When the server asks for an
//!   acknowledgement, listeners receive an [`AckSender`].
//! * an ack packet resolves the [`AckResponse`] returned by [`Client::emit_with_ack`].
//! * an error packet and every protocol anomaly emit [`event::ERROR`] with a [`DispatchError`].
//!
//! Dispatching never blocks on listeners: they run on spawned tokio tasks, one after the
//! other in subscription order. A failing or panicking listener is logged with [`tracing`]
//! and does not prevent the others from running.
//!
//! ## Example
//! ```no_run
//! # use socketioxide_client::{Client, event::{EventArgs, CONNECT}};
//! # use socketioxide_client::Packet;
//! # async fn doc() {
//! let (tx, _rx) = tokio::sync::mpsc::channel::<Packet>(128);
//! let client = Client::new(tx);
//!
//! let weak = client.downgrade();
//! client.on(CONNECT, move |args: EventArgs| {
//!     let client = weak.upgrade();
//!     async move {
//!         let Some(client) = client else { return };
//!         let res = client.emit_with_ack::<_, Vec<String>>(args.ns().to_owned(), "hello", "world");
//!         if let Ok(ack) = res {
//!             println!("server answered {:?}", ack.await);
//!         }
//!     }
//! });
//! client.on("message", |args: EventArgs| async move {
//!     if let Some(ack) = args.ack() {
//!         ack.send("received")?;
//!     }
//!     Ok::<_, socketioxide_client::AckSendError>(())
//! });
//!
//! client.open().unwrap();
//! // The transport encodes the packets received on `rx`
//! // and hands the packets it decodes to the client.
//! # let incoming = Packet::connect("/", None);
//! client.dispatch(incoming);
//! # }
//! ```
pub mod ack;
pub mod config;
pub mod emitter;
pub mod errors;
pub mod event;
pub mod processor;
pub mod sink;

mod client;
mod dispatcher;
mod ns;

pub use ack::{AckRegistry, AckResponse, AckSender};
pub use client::{Client, WeakClient};
pub use config::{ClientBuilder, ClientConfig};
pub use dispatcher::Dispatcher;
pub use emitter::{EmitHandle, EmitReport, EventEmitter, SubscriptionId};
pub use errors::{AckError, AckSendError, DispatchError, SendError, SocketError};
pub use processor::Processor;
pub use sink::PacketSink;

pub use socketioxide_client_core::{AckId, Packet, PacketType, PayloadValue};

#![cfg_attr(docsrs, feature(doc_cfg))]
#![warn(
    clippy::all,
    clippy::todo,
    clippy::empty_enum,
    clippy::mem_forget,
    clippy::unused_self,
    clippy::needless_borrow,
    clippy::match_wildcard_for_single_variants,
    clippy::inefficient_to_string,
    clippy::option_option,
    clippy::unnested_or_patterns,
    rust_2018_idioms,
    future_incompatible,
    nonstandard_style,
    missing_docs
)]
//! Core types shared by the socketioxide client dispatch engine and the
//! decoding/transport collaborators that feed it.
//!
//! * [`Packet`](packet::Packet): a decoded socket.io protocol unit.
//! * [`PayloadValue`](value::PayloadValue): a json-like tree that can also hold binary attachments.
//! * [`errors`]: errors related to the socket and to binary attachments.

pub mod errors;
pub mod packet;
pub mod value;

pub use packet::{AckId, Packet, PacketType};
pub use value::PayloadValue;

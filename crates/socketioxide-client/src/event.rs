//! Event payloads delivered to listeners registered with [`Client::on`](crate::Client::on).
//!
//! Three event names are reserved by the protocol: [`CONNECT`], [`DISCONNECT`] and [`ERROR`].
//! Every other name is an application event sent by the server.
use std::borrow::Cow;

use serde::de::DeserializeOwned;
use socketioxide_client_core::PayloadValue;

use crate::{ack::AckSender, errors::DispatchError};

/// Emitted when a namespace is joined.
pub const CONNECT: &str = "connect";
/// Emitted when a namespace is left.
pub const DISCONNECT: &str = "disconnect";
/// Emitted for error packets and for every protocol anomaly.
pub const ERROR: &str = "error";

/// All the possible reasons for a namespace to be left.
#[derive(Debug, Copy, Clone, Eq, PartialEq)]
pub enum DisconnectReason {
    /// The server sent a disconnect packet for the namespace
    ServerNSDisconnect,

    /// The client left the namespace with [`Client::disconnect`](crate::Client::disconnect)
    ClientNSDisconnect,
}

impl std::fmt::Display for DisconnectReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        use DisconnectReason::*;
        let str: &'static str = match self {
            ServerNSDisconnect => "server disconnected the namespace",
            ClientNSDisconnect => "client has manually disconnected from the namespace",
        };
        f.write_str(str)
    }
}

/// The arguments given to a listener.
#[derive(Debug, Clone)]
pub enum EventArgs {
    /// A [`CONNECT`] event
    Connect {
        /// The joined namespace
        ns: Cow<'static, str>,
        /// The handshake payload sent by the server, `Null` if none
        auth: PayloadValue,
    },
    /// A [`DISCONNECT`] event
    Disconnect {
        /// The namespace that was left
        ns: Cow<'static, str>,
        /// Who initiated the disconnection
        reason: DisconnectReason,
    },
    /// An application event
    Message {
        /// The namespace the event was received on
        ns: Cow<'static, str>,
        /// The event name
        event: String,
        /// The event arguments, binary attachments already in place
        args: Vec<PayloadValue>,
        /// Present when the server expects an acknowledgement
        ack: Option<AckSender>,
    },
    /// An [`ERROR`] event
    Error {
        /// The namespace the anomaly was detected on
        ns: Cow<'static, str>,
        /// What went wrong
        error: DispatchError,
    },
}

impl EventArgs {
    /// The namespace this event belongs to.
    pub fn ns(&self) -> &str {
        match self {
            EventArgs::Connect { ns, .. }
            | EventArgs::Disconnect { ns, .. }
            | EventArgs::Message { ns, .. }
            | EventArgs::Error { ns, .. } => ns,
        }
    }

    /// The arguments of an application event, empty for reserved events.
    pub fn args(&self) -> &[PayloadValue] {
        match self {
            EventArgs::Message { args, .. } => args,
            _ => &[],
        }
    }

    /// Decode the first argument of an application event as a `T`.
    /// A missing argument is decoded from `null`.
    pub fn data<T: DeserializeOwned + 'static>(&self) -> Result<T, serde_json::Error> {
        self.args()
            .first()
            .cloned()
            .unwrap_or(PayloadValue::Null)
            .into_data()
    }

    /// Decode all the arguments of an application event as a `T`, usually a tuple.
    pub fn all_data<T: DeserializeOwned + 'static>(&self) -> Result<T, serde_json::Error> {
        PayloadValue::Array(self.args().to_vec()).into_data()
    }

    /// The ack sender, if the server requested an acknowledgement.
    pub fn ack(&self) -> Option<&AckSender> {
        match self {
            EventArgs::Message { ack, .. } => ack.as_ref(),
            _ => None,
        }
    }

    /// The error carried by an [`ERROR`] event.
    pub fn error(&self) -> Option<&DispatchError> {
        match self {
            EventArgs::Error { error, .. } => Some(error),
            _ => None,
        }
    }
}

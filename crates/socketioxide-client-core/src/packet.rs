//! Socket.io packet implementation.
//! The [`Packet`] is the unit handed by the decoding collaborator to the dispatcher,
//! and the unit handed back to the transport when the client emits or acknowledges.
use std::borrow::Cow;

use bytes::Bytes;

use crate::value::PayloadValue;

/// The id used to correlate an event with its acknowledgement.
pub type AckId = u64;

/// | Type          | ID  | Usage                                                                   |
/// |---------------|-----|-------------------------------------------------------------------------|
/// | CONNECT       | 0   | Used during the connection to a namespace.                              |
/// | DISCONNECT    | 1   | Used when disconnecting from a namespace.                               |
/// | EVENT         | 2   | Used to send data to the other side.                                    |
/// | ACK           | 3   | Used to acknowledge an event.                                           |
/// | ERROR         | 4   | Used to report an error, `CONNECT_ERROR` in the v5 protocol.            |
/// | BINARY_EVENT  | 5   | Used to send binary data to the other side.                             |
/// | BINARY_ACK    | 6   | Used to acknowledge an event (the response includes binary data).       |
///
/// Any other id is kept as [`PacketType::Unknown`] so that a protocol version skew
/// can be reported instead of being rejected by the decoder.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PacketType {
    /// Connect packet with an optional handshake payload
    Connect,
    /// Disconnect packet, used to leave a namespace
    Disconnect,
    /// Event packet with optional ack id, to request an ack from the other side
    Event,
    /// Event ack packet, to acknowledge an event
    Ack,
    /// Error packet, sent when the namespace cannot be joined
    Error,
    /// Binary event packet with optional ack id
    BinaryEvent,
    /// Binary ack packet, to acknowledge an event with binary data
    BinaryAck,
    /// A packet type this client does not know about
    Unknown(u8),
}

impl PacketType {
    /// Returns the wire index of the packet type
    pub fn index(&self) -> u8 {
        match self {
            PacketType::Connect => 0,
            PacketType::Disconnect => 1,
            PacketType::Event => 2,
            PacketType::Ack => 3,
            PacketType::Error => 4,
            PacketType::BinaryEvent => 5,
            PacketType::BinaryAck => 6,
            PacketType::Unknown(i) => *i,
        }
    }

    /// Check if the packet is a binary packet (either binary event or binary ack)
    pub fn is_binary(&self) -> bool {
        matches!(self, PacketType::BinaryEvent | PacketType::BinaryAck)
    }
}

impl From<u8> for PacketType {
    fn from(value: u8) -> Self {
        match value {
            0 => PacketType::Connect,
            1 => PacketType::Disconnect,
            2 => PacketType::Event,
            3 => PacketType::Ack,
            4 => PacketType::Error,
            5 => PacketType::BinaryEvent,
            6 => PacketType::BinaryAck,
            i => PacketType::Unknown(i),
        }
    }
}

/// A decoded socket.io packet.
///
/// Binary packets carry their attachments out-of-band in [`Packet::attachments`]:
/// the transport collaborator is expected to reassemble them before handing the packet over,
/// the [`Packet::data`] tree only holds placeholders pointing into this list.
#[derive(Debug, Clone, PartialEq)]
pub struct Packet {
    /// The packet type
    pub kind: PacketType,
    /// The namespace the packet belongs to
    pub ns: Cow<'static, str>,
    /// The ack id, either requesting an ack (events) or answering one (acks)
    pub ack_id: Option<AckId>,
    /// The packet payload
    pub data: PayloadValue,
    /// The number of binary attachments announced by the packet header
    pub attachment_count: usize,
    /// The binary attachments received after the packet header
    pub attachments: Vec<Bytes>,
}

impl Packet {
    /// Create a packet of the given type without payload.
    pub fn new(kind: PacketType, ns: impl Into<Cow<'static, str>>) -> Self {
        Self {
            kind,
            ns: ns.into(),
            ack_id: None,
            data: PayloadValue::Null,
            attachment_count: 0,
            attachments: Vec::new(),
        }
    }

    /// Create a connect packet with an optional auth payload.
    pub fn connect(ns: impl Into<Cow<'static, str>>, auth: Option<PayloadValue>) -> Self {
        Self {
            data: auth.unwrap_or(PayloadValue::Null),
            ..Self::new(PacketType::Connect, ns)
        }
    }

    /// Create a disconnect packet for the given namespace
    pub fn disconnect(ns: impl Into<Cow<'static, str>>) -> Self {
        Self::new(PacketType::Disconnect, ns)
    }

    /// Create an error packet for the given namespace
    pub fn error(ns: impl Into<Cow<'static, str>>, data: PayloadValue) -> Self {
        Self {
            data,
            ..Self::new(PacketType::Error, ns)
        }
    }

    /// Create an event packet for the given namespace.
    /// `data` is the full event array: the event name followed by its arguments.
    ///
    /// If the data contains binary payloads, they are moved to the attachments
    /// and the packet becomes a binary event.
    pub fn event(ns: impl Into<Cow<'static, str>>, data: PayloadValue) -> Self {
        Self::with_payload(PacketType::Event, PacketType::BinaryEvent, ns, data)
    }

    /// Create an ack packet for the given namespace.
    /// If the data contains binary payloads, it will be a binary ack.
    pub fn ack(ns: impl Into<Cow<'static, str>>, data: PayloadValue, ack_id: AckId) -> Self {
        let mut packet = Self::with_payload(PacketType::Ack, PacketType::BinaryAck, ns, data);
        packet.ack_id = Some(ack_id);
        packet
    }

    fn with_payload(
        kind: PacketType,
        bin_kind: PacketType,
        ns: impl Into<Cow<'static, str>>,
        mut data: PayloadValue,
    ) -> Self {
        let attachments = data.extract_attachments();
        Self {
            kind: if attachments.is_empty() {
                kind
            } else {
                bin_kind
            },
            ns: ns.into(),
            ack_id: None,
            data,
            attachment_count: attachments.len(),
            attachments,
        }
    }

    /// Set the ack id for the packet.
    /// It will only set the ack id for the packets that support requesting an ack.
    pub fn set_ack_id(&mut self, ack_id: AckId) {
        if matches!(self.kind, PacketType::Event | PacketType::BinaryEvent) {
            self.ack_id = Some(ack_id);
        }
    }

    /// Check if the packet is a binary packet (either binary event or binary ack)
    #[inline]
    pub fn is_binary(&self) -> bool {
        self.kind.is_binary()
    }
}

#[cfg(test)]
mod test {
    use bytes::Bytes;

    use super::{Packet, PacketType};
    use crate::value::PayloadValue;

    #[test]
    fn packet_type_from_index() {
        for i in 0..=6u8 {
            let kind = PacketType::from(i);
            assert!(!matches!(kind, PacketType::Unknown(_)));
            assert_eq!(kind.index(), i);
        }
        assert_eq!(PacketType::from(7), PacketType::Unknown(7));
        assert_eq!(PacketType::Unknown(42).index(), 42);
    }

    #[test]
    fn should_create_bin_packet_with_binary_payload() {
        let data = PayloadValue::Array(vec![
            "test".into(),
            PayloadValue::from(Bytes::from_static(&[1, 2, 3])),
        ]);
        let packet = Packet::event("/", data.clone());
        assert_eq!(packet.kind, PacketType::BinaryEvent);
        assert_eq!(packet.attachment_count, 1);
        assert_eq!(packet.attachments, vec![Bytes::from_static(&[1, 2, 3])]);

        let packet = Packet::ack("/", data, 120);
        assert_eq!(packet.kind, PacketType::BinaryAck);
        assert_eq!(packet.ack_id, Some(120));
    }

    #[test]
    fn should_create_default_packet_with_base_data() {
        let data = PayloadValue::Array(vec!["test".into(), 1.into()]);
        let packet = Packet::event("/chat", data.clone());
        assert_eq!(packet.kind, PacketType::Event);
        assert_eq!(packet.ns, "/chat");
        assert_eq!(packet.attachment_count, 0);
        assert!(packet.attachments.is_empty());
        assert_eq!(packet.data, data);

        let packet = Packet::ack("/chat", data, 3);
        assert_eq!(packet.kind, PacketType::Ack);
        assert_eq!(packet.ack_id, Some(3));
    }

    #[test]
    fn set_ack_id_only_on_events() {
        let mut packet = Packet::event("/", PayloadValue::Array(vec!["a".into()]));
        packet.set_ack_id(4);
        assert_eq!(packet.ack_id, Some(4));

        let mut packet = Packet::disconnect("/");
        packet.set_ack_id(4);
        assert_eq!(packet.ack_id, None);
    }
}

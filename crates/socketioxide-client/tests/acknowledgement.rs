//! Tests for acknowledgements
mod utils;

use std::time::Duration;

use bytes::Bytes;
use fixture::{client_with_config, connected_client, count_errors, record};
use serde_json::json;
use socketioxide_client::{
    AckError, ClientConfig, DispatchError, Packet, PacketType, PayloadValue, SendError,
    SocketError,
    event::{DISCONNECT, DisconnectReason, ERROR},
};

#[tokio::test]
async fn emit_with_ack() {
    let (client, mut rx) = connected_client(&["/"]);

    let ack = assert_ok!(client.emit_with_ack::<_, [String; 1]>("/", "test", "foo"));
    let packet = recv!(rx);
    assert_eq!(packet.kind, PacketType::Event);
    assert_eq!(packet.ack_id, Some(0));
    assert_eq!(packet.data, json!(["test", "foo"]).into());

    client.dispatch(Packet::ack("/", json!(["oof"]).into(), 0));
    let res = assert_ok!(ack.await);
    assert_eq!(res[0], "oof");
    assert_eq!(client.pending_acks(), 0);
}

#[tokio::test]
async fn ack_ids_per_namespace() {
    let (client, mut rx) = connected_client(&["/", "/chat"]);

    let _a = assert_ok!(client.emit_with_ack::<_, PayloadValue>("/", "a", &()));
    let _b = assert_ok!(client.emit_with_ack::<_, PayloadValue>("/", "b", &()));
    let _c = assert_ok!(client.emit_with_ack::<_, PayloadValue>("/chat", "c", &()));

    let ids: Vec<_> = (0..3).map(|_| rx.try_recv().unwrap().ack_id).collect();
    assert_eq!(ids, [Some(0), Some(1), Some(0)]);
}

#[tokio::test]
async fn ack_timeout() {
    let config = ClientConfig {
        ack_timeout: Duration::from_millis(50),
        ..Default::default()
    };
    let (client, _rx) = client_with_config(config);
    client.dispatch(Packet::connect("/", None));

    let ack = assert_ok!(client.emit_with_ack::<_, PayloadValue>("/", "test", &1));
    assert!(matches!(ack.await, Err(AckError::Timeout)));
    assert_eq!(client.pending_acks(), 0);

    let ack = client.emit_with_ack_timeout::<_, PayloadValue>("/", "test", &1, Duration::from_millis(10));
    assert!(matches!(assert_ok!(ack).await, Err(AckError::Timeout)));
}

#[tokio::test]
async fn late_ack_is_unexpected() {
    let (counter, _guard) = count_errors();
    let (client, _rx) = connected_client(&["/"]);
    let mut errors = record(&client, ERROR);

    let ack = client.emit_with_ack_timeout::<_, PayloadValue>("/", "test", &1, Duration::from_millis(10));
    assert!(matches!(assert_ok!(ack).await, Err(AckError::Timeout)));

    client.dispatch(Packet::ack("/", json!(["late"]).into(), 0));
    let args = recv!(errors);
    assert_eq!(
        assert_some!(args.error()),
        &DispatchError::UnexpectedAck {
            ns: "/".into(),
            ack_id: 0
        }
    );
    assert_eq!(counter.count(), 1);
}

#[tokio::test]
async fn ack_on_other_namespace() {
    let (client, _rx) = connected_client(&["/", "/chat"]);
    let mut errors = record(&client, ERROR);

    let ack = assert_ok!(client.emit_with_ack::<_, PayloadValue>("/", "test", &1));
    client.dispatch(Packet::ack("/chat", json!([1]).into(), 0));
    recv!(errors);
    assert_eq!(client.pending_acks(), 1);

    client.dispatch(Packet::ack("/", json!([2]).into(), 0));
    assert_eq!(assert_ok!(ack.await), json!([2]).into());
}

#[tokio::test]
async fn ack_without_id() {
    let (client, _rx) = connected_client(&["/"]);
    let mut errors = record(&client, ERROR);

    let mut packet = Packet::new(PacketType::Ack, "/");
    packet.data = json!([1]).into();
    client.dispatch(packet);

    let args = recv!(errors);
    assert_eq!(assert_some!(args.error()), &DispatchError::MissingAckId);
}

#[tokio::test]
async fn binary_ack() {
    let (client, _rx) = connected_client(&["/"]);
    let ack = assert_ok!(client.emit_with_ack::<_, PayloadValue>("/", "upload", "a.bin"));

    let mut packet = Packet::new(PacketType::BinaryAck, "/");
    packet.ack_id = Some(0);
    packet.data = json!(["ok", { "_placeholder": true, "num": 0 }]).into();
    packet.attachment_count = 1;
    packet.attachments = vec![Bytes::from_static(b"done")];
    client.dispatch(packet);

    let payload = assert_ok!(ack.await);
    let args = assert_some!(payload.as_array());
    assert_eq!(args[0], PayloadValue::from("ok"));
    assert_eq!(assert_some!(args[1].as_bytes()), &Bytes::from_static(b"done"));
}

#[tokio::test]
async fn binary_emit_with_binary_ack() {
    let (client, mut rx) = connected_client(&["/"]);
    let args = vec![
        PayloadValue::from("a.bin"),
        PayloadValue::from(Bytes::from_static(b"content")),
    ];
    let ack = assert_ok!(client.emit_args_with_ack("/", "upload", args));

    let packet = recv!(rx);
    assert_eq!(packet.kind, PacketType::BinaryEvent);
    assert_eq!(packet.ack_id, Some(0));
    assert_eq!(packet.attachments, [Bytes::from_static(b"content")]);

    let reply = PayloadValue::Array(vec![Bytes::from_static(b"checksum").into()]);
    let packet = Packet::ack("/", reply, 0);
    assert_eq!(packet.kind, PacketType::BinaryAck);
    client.dispatch(packet);

    let payload = assert_ok!(ack.await);
    let args = assert_some!(payload.as_array());
    assert_eq!(
        assert_some!(args[0].as_bytes()),
        &Bytes::from_static(b"checksum")
    );
}

#[tokio::test]
async fn ack_decode_error() {
    let (client, _rx) = connected_client(&["/"]);
    let ack = assert_ok!(client.emit_with_ack::<_, [u32; 1]>("/", "test", &1));
    client.dispatch(Packet::ack("/", json!(["not a number"]).into(), 0));
    assert!(matches!(ack.await, Err(AckError::Decode(_))));
}

#[tokio::test]
async fn server_disconnect_cancels_acks() {
    let (client, _rx) = connected_client(&["/", "/chat"]);
    let chat = assert_ok!(client.emit_with_ack::<_, PayloadValue>("/chat", "test", &1));
    let root = assert_ok!(client.emit_with_ack::<_, PayloadValue>("/", "test", &1));

    client.dispatch(Packet::disconnect("/chat"));
    assert!(matches!(chat.await, Err(AckError::Cancelled)));
    assert_eq!(client.pending_acks(), 1);

    client.dispatch(Packet::ack("/", json!([]).into(), 0));
    assert_ok!(root.await);
}

#[tokio::test]
async fn client_disconnect() {
    let (client, mut rx) = connected_client(&["/chat"]);
    let mut disconnects = record(&client, DISCONNECT);
    let ack = assert_ok!(client.emit_with_ack::<_, PayloadValue>("/chat", "test", &1));
    recv!(rx);

    assert_ok!(client.disconnect("/chat"));
    assert_eq!(recv!(rx), Packet::disconnect("/chat"));
    assert!(matches!(ack.await, Err(AckError::Cancelled)));

    let args = recv!(disconnects);
    assert!(matches!(
        args,
        socketioxide_client::event::EventArgs::Disconnect {
            reason: DisconnectReason::ClientNSDisconnect,
            ..
        }
    ));
    assert!(matches!(
        client.disconnect("/chat"),
        Err(SendError::Socket(SocketError::Closed))
    ));
}

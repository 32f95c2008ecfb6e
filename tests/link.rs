//! End-to-end link tests: schema-typed messages over a byte stream,
//! pairing, and encrypted delivery.

#![allow(clippy::expect_used, clippy::unwrap_used)]

use cubelink::config::FramerConfig;
use cubelink::protocol::{Connection, Dispatcher, LinkEvent, PairingState};
use cubelink::schema::{compile_schema, Block, Member, Schema, Value};
use cubelink::transport::{memory, stream};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::sync::mpsc::UnboundedReceiver;
use tokio::time::timeout;

fn fast() -> FramerConfig {
    FramerConfig {
        send_interval: Duration::from_millis(1),
        ..FramerConfig::default()
    }
}

async fn next_message(rx: &mut UnboundedReceiver<LinkEvent>) -> LinkEvent {
    loop {
        let event = timeout(Duration::from_secs(5), rx.recv())
            .await
            .expect("timed out")
            .expect("channel closed");
        if matches!(event, LinkEvent::Message { .. }) {
            return event;
        }
    }
}

#[tokio::test]
async fn test_typed_message_over_byte_stream() {
    let schema = Schema::new(vec![Block::structure(
        "Tap",
        vec![
            Member::new("uint_8", "cube"),
            Member::new("int_16", "strength"),
            Member::new("string", "note"),
        ],
    )]);
    let root = compile_schema(&schema).unwrap();

    let (left, right) = tokio::io::duplex(256);
    let (left_tx, left_in) = stream::split(left);
    let (right_tx, right_in) = stream::split(right);

    let (sender, _sender_events) = Connection::new(left_tx, fast());
    let (receiver, receiver_events) = Connection::new(right_tx, fast());
    let sender = Arc::new(sender);
    let receiver = Arc::new(receiver);
    let _a = sender.spawn_inbound(left_in);
    let _b = receiver.spawn_inbound(right_in);

    let seen = Arc::new(Mutex::new(Vec::new()));
    let sink = Arc::clone(&seen);
    let dispatcher = Arc::new(Dispatcher::new());
    dispatcher
        .register_type(0x21, &root, "Tap", move |value, encrypted| {
            sink.lock().unwrap().push((value.clone(), encrypted));
            Ok(())
        })
        .unwrap();
    let runner = {
        let dispatcher = Arc::clone(&dispatcher);
        tokio::spawn(async move { dispatcher.run(receiver_events).await })
    };

    let tap = Value::structure([
        ("cube", Value::Int(3)),
        ("strength", Value::Int(-120)),
        ("note", Value::from("double tap on the top face")),
    ]);
    let payload = dispatcher.encode(0x21, &tap).unwrap();
    sender.send(0x21, &payload).await.unwrap();

    timeout(Duration::from_secs(5), async {
        while seen.lock().unwrap().is_empty() {
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
    })
    .await
    .expect("message was not dispatched");

    assert_eq!(*seen.lock().unwrap(), vec![(tap, false)]);
    receiver.close().await;
    drop(receiver);
    runner.abort();
}

#[tokio::test]
async fn test_pairing_then_encrypted_traffic() {
    let pin = 271_828;
    let mut host_pairing = PairingState::new(pin);
    let mut cube_pairing = PairingState::new(pin);
    let host_random = host_pairing.local_random();
    host_pairing.receive_peer_random(cube_pairing.local_random());
    cube_pairing.receive_peer_random(host_random);
    let (cube_key, sealed) = cube_pairing.seal().unwrap();
    let host_key = host_pairing.finish(&sealed).unwrap();

    let ((host_tx, host_in), (cube_tx, cube_in)) = memory::pair(64);
    let (host, mut host_events) = Connection::new(host_tx, fast());
    let (cube, mut cube_events) = Connection::new(cube_tx, fast());
    let host = Arc::new(host);
    let cube = Arc::new(cube);
    let _h = host.spawn_inbound(host_in);
    let _c = cube.spawn_inbound(cube_in);

    host.install_session(host_key).await.unwrap();
    cube.install_session(cube_key).await.unwrap();
    assert!(host.has_session_key().await);

    host.send(7, &[0x5A; 100]).await.unwrap();
    assert_eq!(
        next_message(&mut cube_events).await,
        LinkEvent::Message {
            tag: 7,
            payload: vec![0x5A; 100],
            encrypted: true
        }
    );

    cube.send(8, b"ack").await.unwrap();
    assert_eq!(
        next_message(&mut host_events).await,
        LinkEvent::Message {
            tag: 8,
            payload: b"ack".to_vec(),
            encrypted: true
        }
    );
    assert_eq!(cube.metrics().snapshot().decrypt_failures, 0);
}

#[tokio::test]
async fn test_messages_arrive_in_send_order() {
    let ((a_tx, a_in), (b_tx, b_in)) = memory::pair(64);
    let (a, _a_events) = Connection::new(a_tx, fast());
    let (b, mut b_events) = Connection::new(b_tx, fast());
    let a = Arc::new(a);
    let b = Arc::new(b);
    let _x = a.spawn_inbound(a_in);
    let _y = b.spawn_inbound(b_in);

    for i in 0..5u8 {
        a.send(i, &vec![i; usize::from(i) * 20]).await.unwrap();
    }
    for i in 0..5u8 {
        match next_message(&mut b_events).await {
            LinkEvent::Message { tag, payload, .. } => {
                assert_eq!(tag, i);
                assert_eq!(payload.len(), usize::from(i) * 20);
            }
            LinkEvent::EncryptedPending => unreachable!(),
        }
    }
}

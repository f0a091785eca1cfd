mod common;

use std::io::Write;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::Duration;

use common::{assert_silent, is_closed, read_frame, RunningServer};
use mill_frame::codec::DEFAULT_MAX_STRING_LEN;
use mill_frame::prelude::*;

#[test]
fn test_broadcast_excluding_source() {
    let server = RunningServer::start(Broadcast::<Message>::new(false));
    let mut clients = server.connect_many(3);

    let frame = Message::new("alice", "hi").to_bytes();
    clients[0].write_all(&frame).unwrap();

    for client in &mut clients[1..] {
        assert_eq!(read_frame(client, frame.len()), frame);
        assert_silent(client);
    }
    assert_silent(&mut clients[0]);

    server.stop();
}

#[test]
fn test_broadcast_including_source() {
    let server = RunningServer::start(Broadcast::<Message>::new(true));
    let mut clients = server.connect_many(3);

    let frame = Message::new("alice", "hi").to_bytes();
    clients[0].write_all(&frame).unwrap();

    for client in &mut clients {
        assert_eq!(read_frame(client, frame.len()), frame);
        assert_silent(client);
    }

    server.stop();
}

#[test]
fn test_frame_split_across_writes_is_relayed_once() {
    let server = RunningServer::start(Broadcast::<Message>::new(false));
    let mut clients = server.connect_many(2);

    let frame = Message::new("bob", "split me please").to_bytes();
    for chunk in frame.chunks(3) {
        clients[0].write_all(chunk).unwrap();
        clients[0].flush().unwrap();
        std::thread::sleep(std::time::Duration::from_millis(2));
    }

    assert_eq!(read_frame(&mut clients[1], frame.len()), frame);
    assert_silent(&mut clients[1]);

    server.stop();
}

#[test]
fn test_oversized_length_closes_only_that_connection() {
    let server = RunningServer::start(Broadcast::<Message>::new(false));
    let mut clients = server.connect_many(3);

    // A login string declaring 2000 bytes against the default cap of 1020.
    clients[2].write_all(&2000i32.to_be_bytes()).unwrap();
    assert!(is_closed(&mut clients[2]));
    common::wait_for(|| server.roster.len() == 2);

    let frame = Message::new("alice", "still here").to_bytes();
    clients[0].write_all(&frame).unwrap();
    assert_eq!(read_frame(&mut clients[1], frame.len()), frame);
    assert_silent(&mut clients[0]);

    server.stop();
}

#[test]
fn test_many_messages_in_one_write_keep_order() {
    let server = RunningServer::start(Broadcast::<Message>::new(false));
    let mut clients = server.connect_many(2);

    let messages: Vec<Message> = (0..50)
        .map(|i| Message::new("carol", format!("message {i}")))
        .collect();
    let mut burst = Vec::new();
    for message in &messages {
        message.encode(&mut burst);
    }
    clients[0].write_all(&burst).unwrap();

    assert_eq!(read_frame(&mut clients[1], burst.len()), burst);

    server.stop();
}

#[test]
fn test_message_at_length_cap_reaches_every_peer() {
    let server = RunningServer::start(Broadcast::<Message>::new(true));
    let mut clients = server.connect_many(2);

    let message = Message::new(
        "l".repeat(DEFAULT_MAX_STRING_LEN),
        "c".repeat(DEFAULT_MAX_STRING_LEN),
    );
    let frame = message.to_bytes();
    clients[0].write_all(&frame).unwrap();

    for client in &mut clients {
        assert_eq!(read_frame(client, frame.len()), frame);
    }

    server.stop();
}

/// Relays like [`Broadcast`] but drops everything sent under the `flood` login.
struct MutedFlood(Broadcast<Message>);

impl DispatchPolicy for MutedFlood {
    type Inbound = Message;
    type Outbound = Message;

    fn on_message(
        &mut self,
        source: ConnectionId,
        message: Message,
        peers: Peers<'_>,
    ) -> Vec<(ConnectionId, Message)> {
        if message.login() == "flood" {
            return Vec::new();
        }
        self.0.on_message(source, message, peers)
    }

    fn on_event(&mut self, event: &NetworkEvent) {
        self.0.on_event(event)
    }
}

#[test]
fn test_flooding_peer_does_not_starve_others() {
    let server = RunningServer::start(MutedFlood(Broadcast::new(false)));
    let mut clients = server.connect_many(3);
    let mut flooder = clients.remove(0);
    flooder
        .set_write_timeout(Some(Duration::from_secs(5)))
        .unwrap();

    let stop = Arc::new(AtomicBool::new(false));
    let sender = {
        let stop = stop.clone();
        thread::spawn(move || {
            let frame = Message::new("flood", "z".repeat(1000)).to_bytes();
            while !stop.load(Ordering::SeqCst) {
                if flooder.write_all(&frame).is_err() {
                    break;
                }
            }
        })
    };
    thread::sleep(Duration::from_millis(50));

    let frame = Message::new("alice", "over the noise").to_bytes();
    clients[0].write_all(&frame).unwrap();
    assert_eq!(read_frame(&mut clients[1], frame.len()), frame);

    stop.store(true, Ordering::SeqCst);
    sender.join().unwrap();
    server.stop();
}


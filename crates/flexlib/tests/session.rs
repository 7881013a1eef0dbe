//! Session-level tests: line sequences fed through the public API, and a
//! full client session against the mock SmartSDR server.

use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;
use tokio::sync::broadcast;

use flexlib::models::DynamicModel;
use flexlib::vita::{self, ClassCode, VitaPacket};
use flexlib::{
    ClientOptions, CommandSink, ConnectionState, Error, FlexClient, ObjectKind, ObjectRef, Radio,
    RadioEvent, Reply, Result, StreamDemux,
};
use flexlib_test_harness::MockSmartSdr;

/// Captures every command the session sends.
#[derive(Default)]
struct CapturingSink {
    sent: Mutex<Vec<(u32, String)>>,
}

impl CommandSink for CapturingSink {
    fn send_command(&self, sequence: u32, text: &str) -> Result<()> {
        self.sent.lock().push((sequence, text.to_string()));
        Ok(())
    }
}

fn radio() -> (Radio, Arc<CapturingSink>) {
    let sink = Arc::new(CapturingSink::default());
    (Radio::new(sink.clone()), sink)
}

fn drain(rx: &mut broadcast::Receiver<RadioEvent>) -> Vec<RadioEvent> {
    let mut events = Vec::new();
    while let Ok(event) = rx.try_recv() {
        events.push(event);
    }
    events
}

#[test]
fn handshake_status_and_reply_sequence() {
    let (radio, _) = radio();
    let mut rx = radio.subscribe();

    radio.received_message("H28000001");
    radio.received_message("S28000001|radio callsign=N0CALL");
    radio.received_message("Rc1|0|");

    assert_eq!(radio.handle(), Some(0x2800_0001));
    assert_eq!(radio.callsign(), "N0CALL");
    assert!(!radio.replies().contains(1));
    assert!(radio.replies().is_empty());
    assert_eq!(radio.connection_state(), ConnectionState::ClientInitialized);

    let events = drain(&mut rx);
    assert!(matches!(events[0], RadioEvent::HandleAssigned(0x2800_0001)));
    assert!(
        events
            .iter()
            .any(|e| matches!(e, RadioEvent::ClientConnected))
    );
}

#[test]
fn slice_lifecycle() {
    let (radio, _) = radio();
    let mut rx = radio.subscribe();

    radio.received_message("S28000001|slice 0 in_use=1 freq=14.250000");
    let slice = radio.slices().get(&0).expect("slice 0 created");
    assert_eq!(slice.frequency(), 14_250_000);

    radio.received_message("S28000001|slice 0 in_use=0");
    assert!(radio.slices().get(&0).is_none());

    let events = drain(&mut rx);
    let added = events
        .iter()
        .position(|e| matches!(e, RadioEvent::Added(ObjectRef::Slice(_))))
        .expect("added event");
    let removed = events
        .iter()
        .position(|e| matches!(e, RadioEvent::WillRemove(ObjectRef::Slice(s)) if *s.id() == 0))
        .expect("removal event");
    assert!(added < removed);
}

#[test]
fn setter_sends_command_only_on_change() {
    let (radio, sink) = radio();
    radio.received_message("S28000001|slice 1 in_use=1 RF_frequency=7.074000 mode=DIGU");
    let slice = radio.slices().get(&1).unwrap();

    slice.set_frequency(7_074_000);
    slice.set_frequency(7_075_500);
    slice.set_frequency(7_075_500);

    let sent: Vec<String> = sink.sent.lock().iter().map(|(_, t)| t.clone()).collect();
    assert_eq!(sent, vec!["slice tune 1 7.075500".to_string()]);
    assert_eq!(slice.frequency(), 7_075_500);
}

#[test]
fn reply_callback_runs_once_with_reply() {
    let (radio, sink) = radio();
    let seen: Arc<Mutex<Vec<Reply>>> = Arc::default();

    let captured = Arc::clone(&seen);
    let sequence = radio.commands().send_with_reply(
        "slice list",
        Box::new(move |reply: Reply| captured.lock().push(reply)),
    );
    assert_eq!(sink.sent.lock().last().unwrap().0, sequence);

    radio.received_message(&format!("R{sequence}|0|0 1"));
    radio.received_message(&format!("R{sequence}|0|0 1"));

    let seen = seen.lock();
    assert_eq!(seen.len(), 1);
    assert_eq!(seen[0].sequence, sequence);
    assert_eq!(seen[0].command, "slice list");
    assert_eq!(seen[0].code, "0");
    assert_eq!(seen[0].message, "0 1");
}

#[test]
fn unknown_reply_and_garbage_do_not_disturb_state() {
    let (radio, _) = radio();
    radio.received_message("H28000001");
    radio.received_message("R99|50000015|Invalid slice");
    radio.received_message("R");
    radio.received_message("Sgarbage");
    radio.received_message("X what");
    radio.received_message("S28000001|bogus_category a=b");
    assert_eq!(radio.handle(), Some(0x2800_0001));
    assert!(radio.replies().is_empty());
}

#[test]
fn udp_packets_follow_object_lifetime() {
    let (radio, _) = radio();
    let demux = StreamDemux::new();
    let mut rx = radio.subscribe();

    let packet = VitaPacket::flex(ClassCode::DaxIq96, 0x2000_0000, vec![0; 8]);
    let datagram = vita::encode(&packet);

    // Not created yet: dropped.
    demux.route(&vita::decode(&datagram).unwrap(), &radio);

    radio.received_message("S28000001|stream 0x20000000 type=dax_iq daxiq_channel=2");
    for _ in 0..2 {
        demux.route(&vita::decode(&datagram).unwrap(), &radio);
    }
    let stream = radio.iq_streams().get(&0x2000_0000).unwrap();
    assert_eq!(stream.state().rate, 96_000);

    let started: Vec<_> = drain(&mut rx)
        .into_iter()
        .filter_map(|e| match e {
            RadioEvent::StreamStarted { kind, stream_id } => Some((kind, stream_id)),
            _ => None,
        })
        .collect();
    assert_eq!(started, vec![(ObjectKind::IqStream, 0x2000_0000)]);
}

#[test]
fn disconnect_cleanup_clears_everything() {
    let (radio, _) = radio();
    radio.received_message("H28000001");
    radio.received_message("S28000001|slice 0 in_use=1 freq=14.074000");
    radio.received_message("S28000001|display pan 0x40000000 center=14.100000 waterfall=0x42000000");
    radio.commands().send("info");
    assert!(!radio.replies().is_empty());

    let mut rx = radio.subscribe();
    radio.disconnect_cleanup();

    assert!(radio.replies().is_empty());
    assert!(radio.slices().is_empty());
    assert!(radio.panadapters().is_empty());
    assert_eq!(radio.connection_state(), ConnectionState::Disconnected);
    assert_eq!(radio.handle(), None);
    let events = drain(&mut rx);
    assert!(matches!(events.last(), Some(RadioEvent::Disconnected)));
}

#[tokio::test]
async fn client_session_against_mock_radio() {
    let mut server = MockSmartSdr::new().await.unwrap();
    server.reply("slice remove 5", "50000015", "Invalid slice");
    server.start();

    let options = ClientOptions {
        program: "session-test".to_string(),
        command_timeout: Duration::from_secs(1),
        ..ClientOptions::default()
    };
    let client = FlexClient::connect_with_options(&server.host(), server.port(), options)
        .await
        .unwrap();
    let mut events = client.subscribe();

    server.push_line("S28000001|radio callsign=N0CALL nickname=Shack");
    client
        .wait_client_connected(Duration::from_secs(2))
        .await
        .unwrap();
    assert!(
        server
            .wait_for_command("sub slice all", Duration::from_secs(1))
            .await
            .is_some()
    );

    // The radio answers `slice create` and then reports the new slice.
    let sequence = client.radio().create_slice(14_074_000, "ANT1", "DIGU");
    let (seen, command) = server
        .wait_for_command("slice create", Duration::from_secs(1))
        .await
        .unwrap();
    assert_eq!(seen, sequence);
    assert!(command.contains("freq=14.074000"));
    server.push_line("S28000001|slice 0 in_use=1 RF_frequency=14.074000 mode=DIGU rxant=ANT1");

    let added = tokio::time::timeout(Duration::from_secs(2), async {
        loop {
            if let Ok(RadioEvent::Added(ObjectRef::Slice(slice))) = events.recv().await {
                return slice;
            }
        }
    })
    .await
    .unwrap();
    assert_eq!(added.frequency(), 14_074_000);
    assert_eq!(added.mode(), "DIGU");

    match client.send_command("slice remove 5").await {
        Err(Error::CommandFailed { code, .. }) => assert_eq!(code, "50000015"),
        other => panic!("expected CommandFailed, got {other:?}"),
    }

    client.disconnect().await.unwrap();
    assert!(client.radio().slices().is_empty());
    assert!(matches!(
        client.send_command("info").await,
        Err(Error::NotConnected)
    ));
}

//! Tokio transport for a SmartSDR session.
//!
//! [`FlexClient`] owns the TCP command channel (port 4992) and a UDP
//! receiver for VITA-49 streams. Inbound lines are fed to a [`Radio`] in
//! arrival order by a single reader task; outbound commands are queued on
//! an unbounded channel and written by a writer task, so `Commands` never
//! blocks on the network. Decoded datagrams go through a [`StreamDemux`].

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use flexlib_core::{Error, Result};
use parking_lot::Mutex;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::net::tcp::{OwnedReadHalf, OwnedWriteHalf};
use tokio::net::{TcpStream, UdpSocket};
use tokio::sync::{broadcast, mpsc, oneshot};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use crate::codec;
use crate::commands::{self, CommandSink};
use crate::demux::StreamDemux;
use crate::events::RadioEvent;
use crate::radio::{ConnectionState, Radio};
use crate::reply::Reply;
use crate::vita;

/// SmartSDR TCP command port.
pub const DEFAULT_TCP_PORT: u16 = 4992;

const DEFAULT_COMMAND_TIMEOUT: Duration = Duration::from_secs(2);

const DEFAULT_CONNECT_TIMEOUT: Duration = Duration::from_secs(5);

/// Largest datagram the UDP reader accepts.
const UDP_BUFFER_SIZE: usize = 65_536;

/// Objects subscribed to after registration when `auto_subscribe` is set.
pub const DEFAULT_SUBSCRIPTIONS: &[&str] = &[
    "client all",
    "radio all",
    "slice all",
    "pan all",
    "meter list",
    "tx all",
    "atu all",
    "gps all",
    "cwx all",
    "memories all",
    "profile all",
    "xvtr all",
    "usb_cable all",
    "amplifier all",
    "audio_stream all",
    "daxiq all",
];

/// Options for a SmartSDR session.
#[derive(Debug, Clone)]
pub struct ClientOptions {
    /// Sent with `client program`.
    pub program: String,
    /// Sent with `client station`. Empty skips the command.
    pub station: String,
    /// Register as a GUI client (`client gui`).
    pub gui: bool,
    /// How long [`FlexClient::send_command`] waits for a reply.
    pub command_timeout: Duration,
    /// Bound on the TCP connect plus handle handshake.
    pub connect_timeout: Duration,
    /// Local UDP port for VITA-49 streams. 0 picks any free port.
    pub udp_port: u16,
    /// Send `sub` commands for `subscriptions` after registration.
    pub auto_subscribe: bool,
    pub subscriptions: Vec<String>,
}

impl Default for ClientOptions {
    fn default() -> Self {
        Self {
            program: "flexlib".to_string(),
            station: String::new(),
            gui: false,
            command_timeout: DEFAULT_COMMAND_TIMEOUT,
            connect_timeout: DEFAULT_CONNECT_TIMEOUT,
            udp_port: 0,
            auto_subscribe: true,
            subscriptions: DEFAULT_SUBSCRIPTIONS.iter().map(|s| s.to_string()).collect(),
        }
    }
}

/// Frames commands and queues them for the writer task.
struct ChannelSink {
    tx: mpsc::UnboundedSender<Vec<u8>>,
}

impl CommandSink for ChannelSink {
    fn send_command(&self, sequence: u32, text: &str) -> Result<()> {
        self.tx
            .send(codec::encode_command(sequence, text))
            .map_err(|_| Error::NotConnected)
    }
}

/// A connected SmartSDR session.
pub struct FlexClient {
    radio: Arc<Radio>,
    demux: Arc<StreamDemux>,
    cancel: CancellationToken,
    tasks: Mutex<Vec<JoinHandle<()>>>,
    connected: Arc<AtomicBool>,
    udp_port: u16,
    command_timeout: Duration,
}

impl FlexClient {
    /// Connect with default options.
    pub async fn connect(host: &str, port: u16) -> Result<Self> {
        Self::connect_with_options(host, port, ClientOptions::default()).await
    }

    /// Connect, wait for the client handle, start the UDP receiver and send
    /// the registration commands.
    ///
    /// Returns once registration is queued. Use
    /// [`wait_client_connected`](Self::wait_client_connected) to wait for
    /// the radio to report this client's status.
    pub async fn connect_with_options(host: &str, port: u16, options: ClientOptions) -> Result<Self> {
        let addr = format!("{host}:{port}");
        tracing::debug!(addr = %addr, "connecting to radio");

        let stream = tokio::time::timeout(options.connect_timeout, TcpStream::connect(&addr))
            .await
            .map_err(|_| Error::Timeout)?
            .map_err(|e| Error::Transport(format!("TCP connect to {addr} failed: {e}")))?;
        let _ = stream.set_nodelay(true);
        let (read_half, write_half) = stream.into_split();

        let (tx, rx) = mpsc::unbounded_channel();
        let radio = Arc::new(Radio::new(Arc::new(ChannelSink { tx })));
        let demux = Arc::new(StreamDemux::new());
        let cancel = CancellationToken::new();
        let connected = Arc::new(AtomicBool::new(true));

        // Subscribe before the reader starts so the handle event is not missed.
        let mut events = radio.subscribe();

        let mut tasks = vec![
            tokio::spawn(tcp_write_loop(write_half, rx, cancel.clone())),
            tokio::spawn(tcp_read_loop(
                BufReader::new(read_half),
                Arc::clone(&radio),
                Arc::clone(&connected),
                cancel.clone(),
            )),
        ];

        let handshake = tokio::time::timeout(options.connect_timeout, wait_for_handle(&mut events)).await;
        let handle = match handshake {
            Ok(Ok(handle)) => handle,
            Ok(Err(e)) => {
                abort_all(&cancel, &mut tasks);
                return Err(e);
            }
            Err(_) => {
                abort_all(&cancel, &mut tasks);
                return Err(Error::Timeout);
            }
        };

        let bound = match UdpSocket::bind(("0.0.0.0", options.udp_port)).await {
            Ok(socket) => socket.local_addr().map(|local| (socket, local.port())),
            Err(e) => Err(e),
        };
        let (socket, udp_port) = match bound {
            Ok(bound) => bound,
            Err(e) => {
                abort_all(&cancel, &mut tasks);
                return Err(Error::Transport(format!(
                    "failed to bind UDP port {}: {e}",
                    options.udp_port
                )));
            }
        };
        tasks.push(tokio::spawn(udp_read_loop(
            socket,
            Arc::clone(&radio),
            Arc::clone(&demux),
            cancel.clone(),
        )));
        tracing::debug!(port = udp_port, "UDP stream receiver started");

        register(&radio, &options, udp_port);

        tracing::info!(
            addr = %addr,
            handle = format!("{handle:08X}"),
            "connected to radio"
        );
        Ok(FlexClient {
            radio,
            demux,
            cancel,
            tasks: Mutex::new(tasks),
            connected,
            udp_port,
            command_timeout: options.command_timeout,
        })
    }

    pub fn radio(&self) -> &Arc<Radio> {
        &self.radio
    }

    pub fn demux(&self) -> &Arc<StreamDemux> {
        &self.demux
    }

    pub fn subscribe(&self) -> broadcast::Receiver<RadioEvent> {
        self.radio.subscribe()
    }

    pub fn is_connected(&self) -> bool {
        self.connected.load(Ordering::SeqCst)
    }

    pub fn handle(&self) -> Option<u32> {
        self.radio.handle()
    }

    /// Local port the radio was told to stream to.
    pub fn udp_port(&self) -> u16 {
        self.udp_port
    }

    /// Wait until the radio reports status for this client.
    pub async fn wait_client_connected(&self, timeout: Duration) -> Result<()> {
        let mut events = self.radio.subscribe();
        if self.radio.connection_state() == ConnectionState::ClientInitialized {
            return Ok(());
        }
        tokio::time::timeout(timeout, async {
            loop {
                match events.recv().await {
                    Ok(RadioEvent::ClientConnected) => return Ok(()),
                    Ok(RadioEvent::Disconnected) | Err(broadcast::error::RecvError::Closed) => {
                        return Err(Error::ConnectionLost);
                    }
                    Ok(_) | Err(broadcast::error::RecvError::Lagged(_)) => {}
                }
            }
        })
        .await
        .map_err(|_| Error::Timeout)?
    }

    /// Send a command and wait for its reply.
    ///
    /// Returns the reply message on code `0` and [`Error::CommandFailed`]
    /// otherwise. On timeout the pending entry is dropped, so a late reply
    /// goes to the default handler's unknown-sequence path.
    pub async fn send_command(&self, command: &str) -> Result<String> {
        if !self.is_connected() {
            return Err(Error::NotConnected);
        }

        let (tx, rx) = oneshot::channel();
        let sequence = self.radio.commands().send_with_reply(
            command,
            Box::new(move |reply: Reply| {
                let _ = tx.send(reply);
            }),
        );

        match tokio::time::timeout(self.command_timeout, rx).await {
            Ok(Ok(reply)) => {
                tracing::trace!(sequence, code = %reply.code, message = %reply.message, "reply received");
                if reply.is_success() {
                    Ok(reply.message)
                } else {
                    Err(Error::CommandFailed {
                        code: reply.code,
                        message: reply.message,
                    })
                }
            }
            // Entry dropped unanswered: the sink was closed or the session
            // was torn down.
            Ok(Err(_)) => Err(Error::ConnectionLost),
            Err(_) => {
                self.radio.replies().remove(sequence);
                Err(Error::Timeout)
            }
        }
    }

    /// Send a command without waiting. The reply goes to the default
    /// handler. Returns the sequence number used.
    pub fn send_command_no_wait(&self, command: &str) -> Result<u32> {
        if !self.is_connected() {
            return Err(Error::NotConnected);
        }
        Ok(self.radio.commands().send(command))
    }

    /// Close the connection and reset the session.
    pub async fn disconnect(&self) -> Result<()> {
        if !self.connected.swap(false, Ordering::SeqCst) {
            return Ok(());
        }
        tracing::debug!("disconnecting from radio");

        self.cancel.cancel();
        let tasks = std::mem::take(&mut *self.tasks.lock());
        for task in tasks {
            let _ = task.await;
        }

        self.demux.reset();
        self.radio.disconnect_cleanup();
        tracing::info!("disconnected from radio");
        Ok(())
    }
}

impl Drop for FlexClient {
    fn drop(&mut self) {
        self.cancel.cancel();
    }
}

/// Queue the registration commands for a freshly assigned handle.
fn register(radio: &Radio, options: &ClientOptions, udp_port: u16) {
    let commands = radio.commands();
    commands.send(commands::cmd_client_program(&options.program));
    if !options.station.is_empty() {
        commands.send(commands::cmd_client_station(&options.station));
    }
    if options.gui {
        commands.send(commands::cmd_client_gui(None));
    }
    commands.send(commands::cmd_client_udp_port(udp_port));
    if options.auto_subscribe {
        for object in &options.subscriptions {
            commands.send(commands::cmd_subscribe(object));
        }
    }
    radio.request_radio_info();
    radio.mark_client_initializing();
}

fn abort_all(cancel: &CancellationToken, tasks: &mut Vec<JoinHandle<()>>) {
    cancel.cancel();
    for task in tasks.drain(..) {
        task.abort();
    }
}

async fn wait_for_handle(events: &mut broadcast::Receiver<RadioEvent>) -> Result<u32> {
    loop {
        match events.recv().await {
            Ok(RadioEvent::HandleAssigned(handle)) => return Ok(handle),
            Ok(RadioEvent::Disconnected) | Err(broadcast::error::RecvError::Closed) => {
                return Err(Error::ConnectionLost);
            }
            Ok(_) | Err(broadcast::error::RecvError::Lagged(_)) => {}
        }
    }
}

// ---------------------------------------------------------------------------
// Background tasks
// ---------------------------------------------------------------------------

async fn tcp_write_loop(
    mut writer: OwnedWriteHalf,
    mut rx: mpsc::UnboundedReceiver<Vec<u8>>,
    cancel: CancellationToken,
) {
    loop {
        let frame = tokio::select! {
            _ = cancel.cancelled() => break,
            frame = rx.recv() => frame,
        };
        let Some(frame) = frame else { break };
        if let Err(e) = writer.write_all(&frame).await {
            tracing::warn!(error = %e, "failed to write command");
            break;
        }
    }
    let _ = writer.shutdown().await;
}

/// Feeds every line to the radio. On EOF or read error the session is
/// cleaned up unless [`FlexClient::disconnect`] already did so.
async fn tcp_read_loop(
    mut reader: BufReader<OwnedReadHalf>,
    radio: Arc<Radio>,
    connected: Arc<AtomicBool>,
    cancel: CancellationToken,
) {
    let mut buf = Vec::new();
    loop {
        buf.clear();
        let read = tokio::select! {
            _ = cancel.cancelled() => return,
            read = reader.read_until(b'\n', &mut buf) => read,
        };
        match read {
            Ok(0) => {
                tracing::info!("connection closed by radio");
                break;
            }
            Ok(_) => {
                let line = String::from_utf8_lossy(&buf);
                let line = line.trim_end_matches(['\r', '\n']);
                if !line.is_empty() {
                    radio.received_message(line);
                }
            }
            Err(e) => {
                tracing::warn!(error = %e, "TCP read failed");
                break;
            }
        }
    }

    cancel.cancel();
    if connected.swap(false, Ordering::SeqCst) {
        radio.disconnect_cleanup();
    }
}

async fn udp_read_loop(
    socket: UdpSocket,
    radio: Arc<Radio>,
    demux: Arc<StreamDemux>,
    cancel: CancellationToken,
) {
    let mut buf = vec![0u8; UDP_BUFFER_SIZE];
    loop {
        let received = tokio::select! {
            _ = cancel.cancelled() => return,
            received = socket.recv(&mut buf) => received,
        };
        match received {
            Ok(n) => match vita::decode(&buf[..n]) {
                Ok(packet) => {
                    demux.route(&packet, &radio);
                }
                Err(e) => tracing::debug!(error = %e, len = n, "dropping datagram"),
            },
            // Not fatal for UDP.
            Err(e) => tracing::trace!(error = %e, "UDP recv error"),
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use crate::vita::{ClassCode, VitaPacket};
    use flexlib_test_harness::MockSmartSdr;

    fn quiet_options() -> ClientOptions {
        ClientOptions {
            auto_subscribe: false,
            command_timeout: Duration::from_millis(500),
            ..ClientOptions::default()
        }
    }

    async fn connected_pair(mut server: MockSmartSdr, options: ClientOptions) -> (MockSmartSdr, FlexClient) {
        server.start();
        let client = FlexClient::connect_with_options(&server.host(), server.port(), options)
            .await
            .unwrap();
        (server, client)
    }

    #[tokio::test]
    async fn test_connect_handshake() {
        let server = MockSmartSdr::new().await.unwrap().with_handle(0x1234_5678);
        let (_server, client) = connected_pair(server, quiet_options()).await;

        assert!(client.is_connected());
        assert_eq!(client.handle(), Some(0x1234_5678));
        assert_eq!(client.radio().connection().version, "1.4.0.0");
        assert_eq!(
            client.radio().connection_state(),
            ConnectionState::ClientInitializing
        );
        assert_ne!(client.udp_port(), 0);

        client.disconnect().await.unwrap();
        assert!(!client.is_connected());
    }

    #[tokio::test]
    async fn test_registration_commands() {
        let options = ClientOptions {
            program: "contest-logger".to_string(),
            station: "Op Position 2".to_string(),
            gui: true,
            subscriptions: vec!["slice all".to_string(), "meter list".to_string()],
            ..quiet_options()
        };
        let options = ClientOptions {
            auto_subscribe: true,
            ..options
        };
        let server = MockSmartSdr::new().await.unwrap();
        let (server, client) = connected_pair(server, options).await;

        server
            .wait_for_command("radio uptime", Duration::from_secs(2))
            .await
            .unwrap();
        let commands: Vec<String> = server
            .received_commands()
            .into_iter()
            .map(|(_, c)| c)
            .collect();
        let port = client.udp_port();
        assert_eq!(
            commands[..6],
            [
                "client program contest-logger".to_string(),
                "client station Op\u{7f}Position\u{7f}2".to_string(),
                "client gui".to_string(),
                format!("client udpport {port}"),
                "sub slice all".to_string(),
                "sub meter list".to_string(),
            ]
        );
        assert!(commands.contains(&"info".to_string()));

        let sequences: Vec<u32> = server.received_commands().iter().map(|(s, _)| *s).collect();
        let expected: Vec<u32> = (1..=sequences.len() as u32).collect();
        assert_eq!(sequences, expected);
    }

    #[tokio::test]
    async fn test_send_command_and_receive_response() {
        let mut server = MockSmartSdr::new().await.unwrap();
        server.reply("info", "0", "model=\"FLEX-6600\"");
        let (_server, client) = connected_pair(server, quiet_options()).await;

        let result = client.send_command("info").await.unwrap();
        assert_eq!(result, "model=\"FLEX-6600\"");
        client.disconnect().await.unwrap();
    }

    #[tokio::test]
    async fn test_command_error_response() {
        let mut server = MockSmartSdr::new().await.unwrap();
        server.reply("slice remove", "50000015", "Invalid slice");
        let (_server, client) = connected_pair(server, quiet_options()).await;

        match client.send_command("slice remove 99").await {
            Err(Error::CommandFailed { code, message }) => {
                assert_eq!(code, "50000015");
                assert_eq!(message, "Invalid slice");
            }
            other => panic!("expected CommandFailed, got: {other:?}"),
        }
        client.disconnect().await.unwrap();
    }

    #[tokio::test]
    async fn test_command_timeout_drops_entry() {
        let mut server = MockSmartSdr::new().await.unwrap();
        server.silence("ping");
        let options = ClientOptions {
            command_timeout: Duration::from_millis(100),
            ..quiet_options()
        };
        let (_server, client) = connected_pair(server, options).await;

        let next = client.radio().commands().peek_sequence();
        let result = client.send_command("ping").await;
        assert!(matches!(result, Err(Error::Timeout)));
        assert!(!client.radio().replies().contains(next));
        client.disconnect().await.unwrap();
    }

    #[tokio::test]
    async fn test_status_updates_radio() {
        let server = MockSmartSdr::new().await.unwrap();
        let (server, client) = connected_pair(server, quiet_options()).await;

        server.push_line("S28000001|radio callsign=N0CALL nickname=Shack");
        client
            .wait_client_connected(Duration::from_secs(2))
            .await
            .unwrap();
        assert_eq!(client.radio().callsign(), "N0CALL");
        assert_eq!(
            client.radio().connection_state(),
            ConnectionState::ClientInitialized
        );
        client.disconnect().await.unwrap();
    }

    #[tokio::test]
    async fn test_radio_close_cleans_up() {
        let server = MockSmartSdr::new().await.unwrap();
        let (server, client) = connected_pair(server, quiet_options()).await;
        let mut events = client.subscribe();

        server.push_line("S28000001|slice 0 in_use=1 RF_frequency=14.074000 mode=DIGU");
        server.close();

        let mut saw_removal = false;
        loop {
            let event = tokio::time::timeout(Duration::from_secs(2), events.recv())
                .await
                .unwrap()
                .unwrap();
            match event {
                RadioEvent::WillRemove(_) => saw_removal = true,
                RadioEvent::Disconnected => break,
                _ => {}
            }
        }
        assert!(saw_removal);
        assert!(!client.is_connected());
        assert!(client.radio().slices().is_empty());
        assert!(matches!(
            client.send_command("info").await,
            Err(Error::NotConnected)
        ));
        // Already torn down by the reader.
        client.disconnect().await.unwrap();
    }

    #[tokio::test]
    async fn test_udp_meter_packets_reach_meters() {
        let server = MockSmartSdr::new().await.unwrap();
        let (server, client) = connected_pair(server, quiet_options()).await;

        server.push_line("S28000001|meter 7.src=RAD#7.nam=PATEMP#7.unit=degC#");
        let mut events = client.subscribe();
        server.push_line("S28000001|radio callsign=N0CALL");
        while !matches!(
            tokio::time::timeout(Duration::from_secs(2), events.recv())
                .await
                .unwrap()
                .unwrap(),
            RadioEvent::ClientConnected
        ) {}
        assert!(client.radio().meters().contains(&7));

        let mut payload = 7u16.to_be_bytes().to_vec();
        payload.extend_from_slice(&(64 * 41i16).to_be_bytes());
        let datagram = vita::encode(&VitaPacket::flex(ClassCode::Meter, 0x0000_0700, payload));
        let sender = UdpSocket::bind("127.0.0.1:0").await.unwrap();
        let target = ("127.0.0.1", client.udp_port());

        let meter = client.radio().meters().get(&7).unwrap();
        for _ in 0..100 {
            sender.send_to(&datagram, target).await.unwrap();
            tokio::time::sleep(Duration::from_millis(10)).await;
            if meter.value() == 41.0 {
                break;
            }
        }
        assert_eq!(meter.value(), 41.0);
        client.disconnect().await.unwrap();
    }
}

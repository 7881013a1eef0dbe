//! Mock SmartSDR TCP server for protocol-level testing.
//!
//! # Example
//!
//! ```
//! use flexlib_test_harness::MockSmartSdr;
//!
//! # async fn example() -> flexlib_core::Result<()> {
//! let mut server = MockSmartSdr::new().await?.with_handle(0x2800_0001);
//!
//! // Reject `slice remove` with an error code.
//! server.reply("slice remove", "50000015", "Invalid slice");
//! server.start();
//!
//! // ... connect a client to server.host():server.port() ...
//!
//! // Push a status line at the client.
//! server.push_line("S28000001|radio callsign=N0CALL");
//! # Ok(())
//! # }
//! ```

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use flexlib_core::error::{Error, Result};
use parking_lot::Mutex;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::net::TcpListener;
use tokio::net::tcp::OwnedWriteHalf;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;

/// Protocol version announced in the `V` line.
pub const DEFAULT_VERSION: &str = "1.4.0.0";

/// Client handle announced in the `H` line.
pub const DEFAULT_HANDLE: u32 = 0x2800_0001;

/// A scripted reply for commands starting with `prefix`.
#[derive(Debug, Clone)]
struct ReplyRule {
    prefix: String,
    /// `None` means the command is recorded but never answered.
    response: Option<(String, String)>,
}

#[derive(Debug)]
enum Outbound {
    Line(String),
    Close,
}

/// A mock SmartSDR radio.
///
/// The server accepts a single connection once [`start`](MockSmartSdr::start)
/// is called. It sends `V<version>` and `H<handle>`, then answers every
/// command with `R<seq>|0|` unless a rule added with
/// [`reply`](MockSmartSdr::reply) or [`silence`](MockSmartSdr::silence)
/// matches first. Rules are checked in the order they were added.
pub struct MockSmartSdr {
    listener: Option<TcpListener>,
    addr: SocketAddr,
    handle: u32,
    version: String,
    rules: Vec<ReplyRule>,
    received: Arc<Mutex<Vec<(u32, String)>>>,
    outbound_tx: mpsc::UnboundedSender<Outbound>,
    outbound_rx: Option<mpsc::UnboundedReceiver<Outbound>>,
    server_handle: Option<JoinHandle<std::result::Result<(), String>>>,
}

impl MockSmartSdr {
    /// Bind a listener on a random localhost port.
    pub async fn new() -> Result<Self> {
        let listener = TcpListener::bind("127.0.0.1:0")
            .await
            .map_err(|e| Error::Transport(format!("failed to bind mock SmartSDR: {e}")))?;
        let addr = listener.local_addr()?;
        let (outbound_tx, outbound_rx) = mpsc::unbounded_channel();
        Ok(Self {
            listener: Some(listener),
            addr,
            handle: DEFAULT_HANDLE,
            version: DEFAULT_VERSION.to_string(),
            rules: Vec::new(),
            received: Arc::new(Mutex::new(Vec::new())),
            outbound_tx,
            outbound_rx: Some(outbound_rx),
            server_handle: None,
        })
    }

    pub fn with_handle(mut self, handle: u32) -> Self {
        self.handle = handle;
        self
    }

    pub fn with_version(mut self, version: &str) -> Self {
        self.version = version.to_string();
        self
    }

    /// Answer commands starting with `prefix` with `R<seq>|<code>|<message>`.
    pub fn reply(&mut self, prefix: &str, code: &str, message: &str) {
        self.rules.push(ReplyRule {
            prefix: prefix.to_string(),
            response: Some((code.to_string(), message.to_string())),
        });
    }

    /// Record commands starting with `prefix` but never answer them.
    pub fn silence(&mut self, prefix: &str) {
        self.rules.push(ReplyRule {
            prefix: prefix.to_string(),
            response: None,
        });
    }

    pub fn host(&self) -> String {
        self.addr.ip().to_string()
    }

    pub fn port(&self) -> u16 {
        self.addr.port()
    }

    pub fn addr(&self) -> SocketAddr {
        self.addr
    }

    pub fn handle(&self) -> u32 {
        self.handle
    }

    /// Send one line (without newline) to the connected client.
    ///
    /// Lines pushed before the client connects are delivered right after
    /// the handshake.
    pub fn push_line(&self, line: &str) {
        let _ = self.outbound_tx.send(Outbound::Line(line.to_string()));
    }

    /// Close the connection from the radio side.
    pub fn close(&self) {
        let _ = self.outbound_tx.send(Outbound::Close);
    }

    /// Every `(sequence, command)` received so far, in arrival order.
    pub fn received_commands(&self) -> Vec<(u32, String)> {
        self.received.lock().clone()
    }

    /// Poll until a command starting with `prefix` has arrived.
    pub async fn wait_for_command(&self, prefix: &str, timeout: Duration) -> Option<(u32, String)> {
        let deadline = tokio::time::Instant::now() + timeout;
        loop {
            let found = self
                .received
                .lock()
                .iter()
                .find(|(_, command)| command.starts_with(prefix))
                .cloned();
            if found.is_some() {
                return found;
            }
            if tokio::time::Instant::now() >= deadline {
                return None;
            }
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
    }

    /// Start serving. Accepts exactly one connection.
    pub fn start(&mut self) {
        let (Some(listener), Some(outbound_rx)) = (self.listener.take(), self.outbound_rx.take())
        else {
            tracing::warn!("mock SmartSDR already started");
            return;
        };
        let session = Session {
            handle: self.handle,
            version: self.version.clone(),
            rules: self.rules.clone(),
            received: Arc::clone(&self.received),
        };
        self.server_handle = Some(tokio::spawn(session.run(listener, outbound_rx)));
    }

    /// Wait for the server task to finish and report any error.
    pub async fn wait(&mut self) -> std::result::Result<(), String> {
        match self.server_handle.take() {
            Some(handle) => handle
                .await
                .map_err(|e| format!("mock SmartSDR task failed: {e}"))?,
            None => Ok(()),
        }
    }
}

impl Drop for MockSmartSdr {
    fn drop(&mut self) {
        if let Some(handle) = self.server_handle.take() {
            handle.abort();
        }
    }
}

struct Session {
    handle: u32,
    version: String,
    rules: Vec<ReplyRule>,
    received: Arc<Mutex<Vec<(u32, String)>>>,
}

impl Session {
    async fn run(
        self,
        listener: TcpListener,
        mut outbound_rx: mpsc::UnboundedReceiver<Outbound>,
    ) -> std::result::Result<(), String> {
        let (stream, peer) = listener
            .accept()
            .await
            .map_err(|e| format!("failed to accept connection: {e}"))?;
        tracing::debug!(peer = %peer, "mock SmartSDR accepted client");

        let (read_half, mut writer) = stream.into_split();
        write_line(&mut writer, &format!("V{}", self.version)).await?;
        write_line(&mut writer, &format!("H{:08X}", self.handle)).await?;

        let mut lines = BufReader::new(read_half).lines();
        loop {
            tokio::select! {
                line = lines.next_line() => match line {
                    Ok(Some(line)) => self.handle_command(&mut writer, line.trim_end()).await?,
                    Ok(None) => return Ok(()),
                    Err(e) => return Err(format!("read error: {e}")),
                },
                outbound = outbound_rx.recv() => match outbound {
                    Some(Outbound::Line(line)) => write_line(&mut writer, &line).await?,
                    Some(Outbound::Close) | None => {
                        let _ = writer.shutdown().await;
                        return Ok(());
                    }
                },
            }
        }
    }

    async fn handle_command(&self, writer: &mut OwnedWriteHalf, line: &str) -> std::result::Result<(), String> {
        let Some((sequence, command)) = parse_command(line) else {
            tracing::warn!(line, "mock SmartSDR got a malformed command");
            return Ok(());
        };
        self.received.lock().push((sequence, command.to_string()));

        let rule = self.rules.iter().find(|r| command.starts_with(&r.prefix));
        let (code, message) = match rule {
            Some(ReplyRule { response: None, .. }) => return Ok(()),
            Some(ReplyRule {
                response: Some((code, message)),
                ..
            }) => (code.as_str(), message.as_str()),
            None => ("0", ""),
        };
        write_line(writer, &format!("R{sequence}|{code}|{message}")).await
    }
}

/// Split `C<seq>|command` (or `CD<seq>|command`).
fn parse_command(line: &str) -> Option<(u32, &str)> {
    let rest = line.strip_prefix('C')?;
    let rest = rest.strip_prefix('D').unwrap_or(rest);
    let (sequence, command) = rest.split_once('|')?;
    Some((sequence.parse().ok()?, command))
}

async fn write_line(writer: &mut OwnedWriteHalf, line: &str) -> std::result::Result<(), String> {
    writer
        .write_all(format!("{line}\n").as_bytes())
        .await
        .map_err(|e| format!("write error: {e}"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::io::AsyncReadExt;
    use tokio::net::TcpStream;

    async fn read_lines(stream: &mut TcpStream, count: usize) -> Vec<String> {
        let mut buf = Vec::new();
        let mut chunk = [0u8; 256];
        while buf.iter().filter(|b| **b == b'\n').count() < count {
            let n = stream.read(&mut chunk).await.unwrap();
            assert!(n > 0, "server closed early");
            buf.extend_from_slice(&chunk[..n]);
        }
        String::from_utf8(buf)
            .unwrap()
            .lines()
            .map(str::to_string)
            .collect()
    }

    #[test]
    fn parse_command_forms() {
        assert_eq!(parse_command("C12|info"), Some((12, "info")));
        assert_eq!(parse_command("CD3|slice list"), Some((3, "slice list")));
        assert_eq!(parse_command("R1|0|"), None);
        assert_eq!(parse_command("Cx|info"), None);
    }

    #[tokio::test]
    async fn handshake_and_default_reply() {
        let mut server = MockSmartSdr::new().await.unwrap().with_handle(0x1234_5678);
        server.start();

        let mut client = TcpStream::connect(server.addr()).await.unwrap();
        let lines = read_lines(&mut client, 2).await;
        assert_eq!(lines, vec!["V1.4.0.0", "H12345678"]);

        client.write_all(b"C1|info\n").await.unwrap();
        let lines = read_lines(&mut client, 1).await;
        assert_eq!(lines, vec!["R1|0|"]);
        assert_eq!(server.received_commands(), vec![(1, "info".to_string())]);
    }

    #[tokio::test]
    async fn scripted_and_silenced_replies() {
        let mut server = MockSmartSdr::new().await.unwrap();
        server.reply("slice remove", "50000015", "Invalid slice");
        server.silence("ping");
        server.start();

        let mut client = TcpStream::connect(server.addr()).await.unwrap();
        read_lines(&mut client, 2).await;

        client
            .write_all(b"C1|ping\nC2|slice remove 9\n")
            .await
            .unwrap();
        let lines = read_lines(&mut client, 1).await;
        assert_eq!(lines, vec!["R2|50000015|Invalid slice"]);
        assert!(
            server
                .wait_for_command("ping", Duration::from_secs(1))
                .await
                .is_some()
        );
    }

    #[tokio::test]
    async fn pushed_lines_and_close() {
        let mut server = MockSmartSdr::new().await.unwrap();
        server.push_line("S28000001|radio callsign=N0CALL");
        server.start();

        let mut client = TcpStream::connect(server.addr()).await.unwrap();
        let lines = read_lines(&mut client, 3).await;
        assert_eq!(lines[2], "S28000001|radio callsign=N0CALL");

        server.close();
        let mut rest = Vec::new();
        client.read_to_end(&mut rest).await.unwrap();
        assert!(rest.is_empty());
        server.wait().await.unwrap();
    }
}

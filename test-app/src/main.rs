// flexlib test application -- CLI tool for exercising the SmartSDR protocol
// core against a real FlexRadio on the LAN.
//
// Usage:
//   flexlib-test-app discover
//   flexlib-test-app --host 192.168.1.100 monitor --duration 30
//   flexlib-test-app --host 192.168.1.100 send info
//   flexlib-test-app --program logger --station "Op 2" send slice list
//
// Without --host the first radio found by discovery is used.
// Logging is controlled with RUST_LOG (default: info).

use std::time::{Duration, Instant};

use anyhow::{Context, Result, bail};
use clap::{Parser, Subcommand};
use tokio::sync::broadcast::error::RecvError;
use tracing_subscriber::EnvFilter;

use flexlib::discovery;
use flexlib::models::DynamicModel;
use flexlib::{ClientOptions, DEFAULT_TCP_PORT, FlexClient, ObjectRef, RadioEvent};

// ---------------------------------------------------------------------------
// CLI argument definitions
// ---------------------------------------------------------------------------

/// flexlib test application -- talks SmartSDR to a FlexRadio.
#[derive(Parser)]
#[command(name = "flexlib-test-app", version, about)]
struct Cli {
    /// Radio IP address. Discovered on the LAN when omitted.
    #[arg(long)]
    host: Option<String>,

    /// TCP command port.
    #[arg(long, default_value_t = DEFAULT_TCP_PORT)]
    port: u16,

    /// Program name sent with `client program`.
    #[arg(long, default_value = "flexlib-test-app")]
    program: String,

    /// Station name sent with `client station`.
    #[arg(long, default_value = "")]
    station: String,

    /// Register as a GUI client.
    #[arg(long)]
    gui: bool,

    /// Seconds to wait for a command reply or for discovery.
    #[arg(long, default_value_t = 3)]
    timeout: u64,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// List radios announcing themselves on the LAN.
    Discover,

    /// Connect and print session events as they arrive.
    Monitor {
        /// Duration in seconds (0 = run until Ctrl-C).
        #[arg(long, default_value_t = 0)]
        duration: u64,
    },

    /// Send one command and print the reply.
    Send {
        /// Command text, e.g. `info` or `slice tune 0 14.074`.
        #[arg(required = true, num_args = 1..)]
        command: Vec<String>,
    },
}

// ---------------------------------------------------------------------------
// Connection helpers
// ---------------------------------------------------------------------------

async fn resolve_host(cli: &Cli) -> Result<(String, u16)> {
    if let Some(host) = &cli.host {
        return Ok((host.clone(), cli.port));
    }

    println!("No --host given, discovering ({}s)...", cli.timeout);
    let radios = discovery::discover(Duration::from_secs(cli.timeout))
        .await
        .context("FlexRadio discovery failed")?;
    let Some(radio) = radios.into_iter().next() else {
        bail!("no radio found on the LAN; pass --host");
    };
    println!(
        "Using {} {} at {}",
        radio.model, radio.nickname, radio.public_ip
    );
    let port = if radio.port == 0 { cli.port } else { radio.port };
    Ok((radio.public_ip, port))
}

async fn connect(cli: &Cli, auto_subscribe: bool) -> Result<FlexClient> {
    let (host, port) = resolve_host(cli).await?;
    let options = ClientOptions {
        program: cli.program.clone(),
        station: cli.station.clone(),
        gui: cli.gui,
        command_timeout: Duration::from_secs(cli.timeout),
        auto_subscribe,
        ..ClientOptions::default()
    };
    let client = FlexClient::connect_with_options(&host, port, options)
        .await
        .with_context(|| format!("failed to connect to {host}:{port}"))?;
    client
        .wait_client_connected(Duration::from_secs(cli.timeout))
        .await
        .context("radio did not report status for this client")?;
    Ok(client)
}

// ---------------------------------------------------------------------------
// Commands
// ---------------------------------------------------------------------------

async fn cmd_discover(timeout_secs: u64) -> Result<()> {
    println!("Discovering FlexRadio radios on the LAN ({timeout_secs} seconds)...");
    println!();

    let radios = discovery::discover(Duration::from_secs(timeout_secs))
        .await
        .context("FlexRadio discovery failed")?;

    if radios.is_empty() {
        println!("No FlexRadio radios found.");
        return Ok(());
    }

    println!(
        "{:<14}  {:<20}  {:<16}  {:<16}  {:<10}  Firmware",
        "Model", "Serial", "Nickname", "IP Address", "Status"
    );
    println!(
        "{:<14}  {:<20}  {:<16}  {:<16}  {:<10}  {}",
        "-".repeat(14),
        "-".repeat(20),
        "-".repeat(16),
        "-".repeat(16),
        "-".repeat(10),
        "-".repeat(12),
    );
    for radio in &radios {
        println!(
            "{:<14}  {:<20}  {:<16}  {:<16}  {:<10}  {}",
            radio.model, radio.serial, radio.nickname, radio.public_ip, radio.status, radio.version
        );
    }

    println!();
    println!("{} radio(s) found.", radios.len());
    Ok(())
}

async fn cmd_monitor(client: &FlexClient, duration_secs: u64) -> Result<()> {
    let mut event_rx = client.subscribe();
    let radio = client.radio();

    println!(
        "Connected to {} (handle {:08X}), monitoring (Ctrl-C to stop)...",
        radio.callsign(),
        client.handle().unwrap_or_default()
    );

    let deadline = (duration_secs > 0).then(|| Instant::now() + Duration::from_secs(duration_secs));

    loop {
        let timeout = match deadline {
            Some(dl) => {
                let remaining = dl.saturating_duration_since(Instant::now());
                if remaining.is_zero() {
                    println!("Monitor duration elapsed.");
                    break;
                }
                remaining
            }
            None => Duration::from_secs(3600),
        };

        tokio::select! {
            _ = tokio::signal::ctrl_c() => {
                println!("Interrupted.");
                break;
            }
            received = tokio::time::timeout(timeout, event_rx.recv()) => match received {
                Ok(Ok(RadioEvent::Disconnected)) => {
                    println!("[event] disconnected");
                    break;
                }
                Ok(Ok(event)) => println!("[event] {}", describe(&event)),
                Ok(Err(RecvError::Lagged(n))) => {
                    println!("[warning] missed {n} events (consumer too slow)");
                }
                Ok(Err(RecvError::Closed)) => {
                    println!("Event channel closed.");
                    break;
                }
                Err(_) => {
                    if deadline.is_some() {
                        println!("Monitor duration elapsed.");
                    }
                    break;
                }
            },
        }
    }

    println!();
    println!(
        "{} slice(s), {} panadapter(s), {} meter(s)",
        radio.slices().len(),
        radio.panadapters().len(),
        radio.meters().len()
    );
    Ok(())
}

async fn cmd_send(client: &FlexClient, command: &str) -> Result<()> {
    let reply = client
        .send_command(command)
        .await
        .with_context(|| format!("command `{command}` failed"))?;
    if reply.is_empty() {
        println!("OK");
    } else {
        println!("{reply}");
    }
    Ok(())
}

/// One-line summary of an event.
fn describe(event: &RadioEvent) -> String {
    match event {
        RadioEvent::HandleAssigned(handle) => format!("handle {handle:08X}"),
        RadioEvent::ClientConnected => "client connected".to_string(),
        RadioEvent::Message {
            severity,
            code,
            text,
        } => format!("message [{}] {code}: {text}", severity.as_str()),
        RadioEvent::Added(object) => format!("added {}", describe_object(object)),
        RadioEvent::Updated(object) => format!("updated {}", describe_object(object)),
        RadioEvent::WillRemove(object) => format!("removing {}", describe_object(object)),
        RadioEvent::StreamStarted { kind, stream_id } => {
            format!("{} stream 0x{stream_id:08X} started", kind.as_str())
        }
        RadioEvent::GuiClientAdded(gui) => {
            format!("gui client {:08X} added ({} {})", gui.handle, gui.program, gui.station)
        }
        RadioEvent::GuiClientRemoved(gui) => format!("gui client {:08X} removed", gui.handle),
        RadioEvent::InterlockStateChanged(state) => format!("interlock {state}"),
        RadioEvent::Disconnected => "disconnected".to_string(),
    }
}

fn describe_object(object: &ObjectRef) -> String {
    match object {
        ObjectRef::Slice(slice) => {
            let s = slice.state();
            format!("slice {} {} Hz {}", slice.id(), s.frequency, s.mode)
        }
        other => other.kind().as_str().to_string(),
    }
}

// ---------------------------------------------------------------------------
// Main
// ---------------------------------------------------------------------------

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let cli = Cli::parse();

    match &cli.command {
        Command::Discover => cmd_discover(cli.timeout).await,
        Command::Monitor { duration } => {
            let client = connect(&cli, true).await?;
            let result = cmd_monitor(&client, *duration).await;
            client.disconnect().await.ok();
            result
        }
        Command::Send { command } => {
            let client = connect(&cli, false).await?;
            let result = cmd_send(&client, &command.join(" ")).await;
            client.disconnect().await.ok();
            result
        }
    }
}

//! FlexRadio LAN discovery via VITA-49 UDP broadcasts.
//!
//! Radios announce themselves to UDP port 4992 with extension-data packets
//! carrying class code `0xFFFF`. The payload is space-delimited
//! `key=value` text.
//!
//! # Usage
//!
//! ```no_run
//! use flexlib::discovery;
//! use std::time::Duration;
//!
//! # async fn example() -> flexlib_core::Result<()> {
//! let radios = discovery::discover(Duration::from_secs(3)).await?;
//! for radio in &radios {
//!     println!("{} ({}) at {}:{}", radio.model, radio.serial, radio.public_ip, radio.port);
//! }
//! # Ok(())
//! # }
//! ```

use std::collections::HashMap;
use std::time::Duration;

use flexlib_core::{Error, Result, parse_bool, parse_hex_u32};

use crate::keyvalue::{ESCAPED_SPACE, KeyValue, key_values, parse_values};
use crate::vita::{self, ClassCode, VitaPacket};

/// Default FlexRadio discovery broadcast port.
pub const DISCOVERY_PORT: u16 = 4992;

/// A GUI client attached to a radio.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GuiClient {
    pub handle: u32,
    /// UUID the client registered with `client gui`. Discovery packets do
    /// not carry it.
    pub client_id: Option<String>,
    pub program: String,
    pub station: String,
}

/// Zip the three comma-separated lists from a discovery packet or `client`
/// status into GUI clients.
///
/// Returns an empty list if the lists differ in length or a handle is not
/// hex.
pub fn parse_gui_clients(handles: &str, programs: &str, stations: &str) -> Vec<GuiClient> {
    let handles = parse_values(handles, ',');
    let programs = parse_values(programs, ',');
    let stations = parse_values(stations, ',');
    if handles.len() != programs.len() || handles.len() != stations.len() {
        tracing::warn!(
            handles = handles.len(),
            programs = programs.len(),
            stations = stations.len(),
            "gui client lists differ in length"
        );
        return Vec::new();
    }

    let mut clients = Vec::with_capacity(handles.len());
    for ((handle, program), station) in handles.iter().zip(programs).zip(stations) {
        let Some(handle) = parse_hex_u32(handle) else {
            tracing::warn!(handle = %handle, "invalid gui client handle");
            return Vec::new();
        };
        clients.push(GuiClient {
            handle,
            client_id: None,
            program,
            station: station.replace(ESCAPED_SPACE, " "),
        });
    }
    clients
}

/// One radio's discovery broadcast.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct DiscoveryAnnouncement {
    pub discovery_protocol_version: String,
    pub model: String,
    pub serial: String,
    pub version: String,
    pub nickname: String,
    pub callsign: String,
    /// Address to connect to.
    pub public_ip: String,
    /// TCP command port.
    pub port: u16,
    /// e.g. `Available`, `In_Use`.
    pub status: String,
    pub inuse_ip: String,
    pub inuse_host: String,
    pub max_licensed_version: String,
    pub radio_license_id: String,
    pub requires_additional_license: bool,
    pub fpc_mac: String,
    pub wan_connected: bool,
    pub licensed_clients: u32,
    pub available_clients: u32,
    pub max_panadapters: u32,
    pub available_panadapters: u32,
    pub max_slices: u32,
    pub available_slices: u32,
    pub min_software_version: String,
    pub external_port_link: bool,
    pub gui_client_handles: String,
    pub gui_client_programs: String,
    pub gui_client_stations: String,
    pub gui_client_hosts: String,
    pub gui_client_ips: String,
    pub gui_clients: Vec<GuiClient>,
}

impl DiscoveryAnnouncement {
    fn is_valid(&self) -> bool {
        !self.public_ip.is_empty()
            && self.port != 0
            && !self.model.is_empty()
            && !self.serial.is_empty()
            && self.gui_lists_match()
    }

    fn gui_lists_match(&self) -> bool {
        let handles = parse_values(&self.gui_client_handles, ',').len();
        handles == parse_values(&self.gui_client_programs, ',').len()
            && handles == parse_values(&self.gui_client_stations, ',').len()
    }

    fn apply(&mut self, kv: &KeyValue) {
        let text = |field: &mut String| *field = kv.value.clone();
        match kv.key.as_str() {
            "discovery_protocol_version" => text(&mut self.discovery_protocol_version),
            "model" => text(&mut self.model),
            "serial" => text(&mut self.serial),
            "version" => text(&mut self.version),
            "nickname" => text(&mut self.nickname),
            "callsign" => text(&mut self.callsign),
            "ip" | "public_ip" => text(&mut self.public_ip),
            "port" => self.port = number(kv),
            "status" => text(&mut self.status),
            "inuse_ip" => text(&mut self.inuse_ip),
            "inuse_host" => text(&mut self.inuse_host),
            "max_licensed_version" => text(&mut self.max_licensed_version),
            "radio_license_id" => text(&mut self.radio_license_id),
            "requires_additional_license" => self.requires_additional_license = flag(kv),
            "fpc_mac" => text(&mut self.fpc_mac),
            "wan_connected" => self.wan_connected = flag(kv),
            "licensed_clients" => self.licensed_clients = number(kv),
            "available_clients" => self.available_clients = number(kv),
            "max_panadapters" => self.max_panadapters = number(kv),
            "available_panadapters" => self.available_panadapters = number(kv),
            "max_slices" => self.max_slices = number(kv),
            "available_slices" => self.available_slices = number(kv),
            "min_software_version" => text(&mut self.min_software_version),
            "external_port_link" => self.external_port_link = flag(kv),
            "gui_client_handles" => text(&mut self.gui_client_handles),
            "gui_client_programs" => text(&mut self.gui_client_programs),
            "gui_client_stations" => text(&mut self.gui_client_stations),
            "gui_client_hosts" => text(&mut self.gui_client_hosts),
            "gui_client_ips" => text(&mut self.gui_client_ips),
            _ => tracing::warn!(token = %kv.key, value = %kv.value, "unknown discovery token"),
        }
    }
}

fn number<T: std::str::FromStr + Default>(kv: &KeyValue) -> T {
    kv.value.parse().unwrap_or_else(|_| {
        tracing::warn!(token = %kv.key, value = %kv.value, "invalid discovery value");
        T::default()
    })
}

fn flag(kv: &KeyValue) -> bool {
    parse_bool(&kv.value).unwrap_or_default()
}

/// Decode a discovery broadcast.
///
/// Returns `None` for any packet that is not a discovery packet, or whose
/// announcement lacks an address, port, model or serial number. GUI client
/// lists of unequal length also invalidate the announcement.
pub fn parse_discovery(packet: &VitaPacket) -> Option<DiscoveryAnnouncement> {
    if packet.class_code() != Some(ClassCode::Discovery) {
        return None;
    }
    let text = String::from_utf8_lossy(&packet.payload);
    let text = text.trim_end_matches('\0');

    let mut announcement = DiscoveryAnnouncement::default();
    for kv in key_values(text) {
        announcement.apply(&kv);
    }
    announcement.gui_clients = parse_gui_clients(
        &announcement.gui_client_handles,
        &announcement.gui_client_programs,
        &announcement.gui_client_stations,
    );

    if announcement.is_valid() {
        Some(announcement)
    } else {
        tracing::debug!(
            model = %announcement.model,
            serial = %announcement.serial,
            "discarding incomplete discovery announcement"
        );
        None
    }
}

/// Listen for discovery broadcasts on the default port (4992).
///
/// Returns all unique radios heard within the timeout, de-duplicated by
/// serial number.
pub async fn discover(timeout: Duration) -> Result<Vec<DiscoveryAnnouncement>> {
    discover_on_port(DISCOVERY_PORT, timeout).await
}

/// Listen for discovery broadcasts on a specific port.
pub async fn discover_on_port(port: u16, timeout: Duration) -> Result<Vec<DiscoveryAnnouncement>> {
    let bind_addr = format!("0.0.0.0:{port}");
    let socket = tokio::net::UdpSocket::bind(&bind_addr).await.map_err(|e| {
        Error::Transport(format!(
            "failed to bind discovery socket on {bind_addr}: {e}"
        ))
    })?;

    tracing::debug!(port, "listening for discovery broadcasts");

    let mut radios: HashMap<String, DiscoveryAnnouncement> = HashMap::new();
    let mut buf = [0u8; 4096];
    let deadline = tokio::time::Instant::now() + timeout;

    loop {
        let remaining = deadline.saturating_duration_since(tokio::time::Instant::now());
        if remaining.is_zero() {
            break;
        }

        match tokio::time::timeout(remaining, socket.recv_from(&mut buf)).await {
            Ok(Ok((n, src))) => {
                let Ok(packet) = vita::decode(&buf[..n]) else {
                    tracing::trace!(%src, "ignoring non-VITA datagram");
                    continue;
                };
                if let Some(radio) = parse_discovery(&packet) {
                    tracing::debug!(
                        model = %radio.model,
                        serial = %radio.serial,
                        ip = %radio.public_ip,
                        "discovered radio"
                    );
                    radios.entry(radio.serial.clone()).or_insert(radio);
                }
            }
            Ok(Err(e)) => {
                tracing::trace!(error = %e, "discovery recv error");
            }
            Err(_) => break,
        }
    }

    let result: Vec<DiscoveryAnnouncement> = radios.into_values().collect();
    tracing::debug!(count = result.len(), "discovery complete");
    Ok(result)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn discovery_packet(text: &str) -> VitaPacket {
        let mut payload = text.as_bytes().to_vec();
        while payload.len() % 4 != 0 {
            payload.push(0);
        }
        VitaPacket::flex(ClassCode::Discovery, 0x0000_0800, payload)
    }

    const ANNOUNCEMENT: &str = "discovery_protocol_version=3.0.0.2 model=FLEX-6600 \
        serial=1234-5678-9012-3456 version=3.5.1.0 nickname=Shack callsign=N0CALL \
        ip=192.168.1.100 port=4992 status=Available max_slices=4 available_slices=3 \
        wan_connected=1 gui_client_handles=0x1A2B,0x3C4D \
        gui_client_programs=SmartSDR-Win,Maestro gui_client_stations=Main\u{7f}Desk,Remote";

    #[test]
    fn gui_clients_zip_positionally() {
        let clients = parse_gui_clients("1,2", "progA,progB", "stA,stB");
        assert_eq!(clients.len(), 2);
        assert_eq!(clients[0].handle, 1);
        assert_eq!(clients[0].program, "progA");
        assert_eq!(clients[1].station, "stB");
        assert!(clients[1].client_id.is_none());
    }

    #[test]
    fn gui_clients_unequal_lengths_are_empty() {
        assert!(parse_gui_clients("1,2", "progA", "stA,stB").is_empty());
        assert!(parse_gui_clients("", "", "").is_empty());
    }

    #[test]
    fn full_announcement() {
        let packet = vita::decode(&vita::encode(&discovery_packet(ANNOUNCEMENT))).unwrap();
        let radio = parse_discovery(&packet).unwrap();
        assert_eq!(radio.model, "FLEX-6600");
        assert_eq!(radio.serial, "1234-5678-9012-3456");
        assert_eq!(radio.public_ip, "192.168.1.100");
        assert_eq!(radio.port, 4992);
        assert_eq!(radio.max_slices, 4);
        assert_eq!(radio.available_slices, 3);
        assert!(radio.wan_connected);
        assert_eq!(radio.gui_clients.len(), 2);
        assert_eq!(radio.gui_clients[0].handle, 0x1A2B);
        assert_eq!(radio.gui_clients[0].station, "Main Desk");
    }

    #[test]
    fn incomplete_announcement_is_dropped() {
        assert!(parse_discovery(&discovery_packet("model=FLEX-6600 serial=1 port=4992")).is_none());
        assert!(parse_discovery(&discovery_packet("model=FLEX-6600 serial=1 ip=10.0.0.1")).is_none());
        assert!(parse_discovery(&discovery_packet("serial=1 ip=10.0.0.1 port=4992")).is_none());
        assert!(parse_discovery(&discovery_packet("model=FLEX-6600 ip=10.0.0.1 port=4992")).is_none());
    }

    #[test]
    fn mismatched_gui_client_lists_discard_announcement() {
        let text = "model=FLEX-6600 serial=1234 ip=10.0.0.1 port=4992 \
                    gui_client_handles=0x1,0x2 gui_client_programs=SmartSDR-Win \
                    gui_client_stations=A,B";
        assert!(parse_discovery(&discovery_packet(text)).is_none());
        assert!(parse_gui_clients("0x1,0x2", "SmartSDR-Win", "A,B").is_empty());

        let matched = "model=FLEX-6600 serial=1234 ip=10.0.0.1 port=4992 \
                       gui_client_handles=0x1,0x2 gui_client_programs=SmartSDR-Win,Logger \
                       gui_client_stations=A,B";
        let announcement = parse_discovery(&discovery_packet(matched)).unwrap();
        assert_eq!(announcement.gui_clients.len(), 2);
    }

    #[test]
    fn non_discovery_class_is_ignored() {
        let mut packet = discovery_packet(ANNOUNCEMENT);
        packet.class_id = packet.class_id.map(|mut c| {
            c.class_code = ClassCode::Meter;
            c
        });
        assert!(parse_discovery(&packet).is_none());
        packet.class_id = None;
        assert!(parse_discovery(&packet).is_none());
    }

    #[tokio::test]
    async fn discover_timeout_empty() {
        let socket = tokio::net::UdpSocket::bind("127.0.0.1:0").await.unwrap();
        let port = socket.local_addr().unwrap().port();
        drop(socket);

        let radios = discover_on_port(port, Duration::from_millis(50)).await.unwrap();
        assert!(radios.is_empty());
    }
}

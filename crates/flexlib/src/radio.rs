//! The session's protocol state machine.
//!
//! [`Radio`] consumes TCP lines in arrival order. Replies are matched
//! against the reply table, status lines are routed to the object they
//! describe, and every change is published as a [`RadioEvent`].
//!
//! Nothing here performs I/O. Commands leave through the [`CommandSink`]
//! the session was built with, and malformed or unexpected input is logged
//! and dropped.

use std::collections::HashMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use flexlib_core::{
    Barrier, ClampedBarrier, Error, Result, bool_flag, parse_hex_u32, try_set_field,
};
use tokio::sync::broadcast;

use crate::codec::{self, Line, Severity, StatusLine, log_at_severity};
use crate::commands::{self, CommandSink, Commands};
use crate::discovery::GuiClient;
use crate::events::{ObjectKind, ObjectRef, RadioEvent};
use crate::keyvalue::{
    ESCAPED_SPACE, KeyValue, escape, key_values, parse_key_values, parse_values, unquote,
};
use crate::models::{
    Amplifier, Atu, AudioStream, Cwx, DynamicModel, Equalizer, Gps, Interlock, IqStream, Memory,
    Meter, MicAudioStream, OpusStream, Panadapter, Profile, Registry, Slice, StaticModel, Tnf,
    Transmit, TxAudioStream, UsbCable, Wan, Waterfall, Waveform, Xvtr, invalid_value, parse_mhz,
    store, store_with, unknown_token,
};
use crate::reply::{Reply, ReplyTable};

/// Broadcast channel capacity for event subscribers.
pub const EVENT_CHANNEL_CAPACITY: usize = 256;

/// Status remainder marking a slice, xvtr or stream as no longer in use.
const NOT_IN_USE: &str = "in_use=0";

/// Status remainder marking an object as removed.
const REMOVED: &str = "removed";

// ---------------------------------------------------------------------------
// Connection state
// ---------------------------------------------------------------------------

/// Where the session is in the connection handshake.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum ConnectionState {
    #[default]
    Disconnected,
    /// The radio sent `H<handle>`.
    HandleAssigned,
    /// Registration commands have been sent; waiting for the radio to
    /// report status for this client.
    ClientInitializing,
    /// The radio sent a `radio` status for this client's handle.
    ClientInitialized,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ConnectionInfo {
    pub state: ConnectionState,
    pub handle: Option<u32>,
    /// Protocol version from the `V` line.
    pub version: String,
}

// ---------------------------------------------------------------------------
// Radio properties
// ---------------------------------------------------------------------------

wire_tokens! {
    enum StatusCategory {
        Client => "client",
        Radio => "radio",
        Slice => "slice",
        Meter => "meter",
        Display => "display",
        Memory => "memory",
        Tnf => "tnf",
        Stream => "stream",
        Interlock => "interlock",
        Transmit => "transmit",
        Atu => "atu",
        Gps => "gps",
        Cwx => "cwx",
        Wan => "wan",
        Waveform => "waveform",
        Profile => "profile",
        Eq => "eq",
        Amplifier => "amplifier",
        UsbCable => "usb_cable",
        Xvtr => "xvtr",
        OpusStream => "opus_stream",
        AudioStream => "audio_stream",
        MicAudioStream => "mic_audio_stream",
        TxAudioStream => "tx_audio_stream",
        File => "file",
        Mixer => "mixer",
        Turf => "turf",
        DaxIq => "daxiq",
    }
}

wire_tokens! {
    enum RadioToken {
        Callsign => "callsign",
        Nickname => "nickname",
        Slices => "slices",
        Panadapters => "panadapters",
        HeadphoneGain => "headphone_gain",
        HeadphoneMute => "headphone_mute",
        LineoutGain => "lineout_gain",
        LineoutMute => "lineout_mute",
        RemoteOnEnabled => "remote_on_enabled",
        PllDone => "pll_done",
        FreqErrorPpb => "freq_error_ppb",
        CalFreq => "cal_freq",
        TnfEnabled => "tnf_enabled",
        SnapTuneEnabled => "snap_tune_enabled",
        BinauralRx => "binaural_rx",
        FullDuplexEnabled => "full_duplex_enabled",
        BandPersistenceEnabled => "band_persistence_enabled",
        EnforcePrivateIp => "enforce_private_ip_connections",
        MuteLocalAudio => "mute_local_audio_when_remote",
        LowLatencyDigital => "low_latency_digital_modes",
        RttyMarkDefault => "rtty_mark_default",
        Backlight => "backlight",
        DaxIqCapacity => "daxiq_capacity",
        DaxIqAvailable => "daxiq_available",
    }
}

/// Fields of the `info` reply.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RadioInfo {
    pub model: String,
    pub chassis_serial: String,
    pub name: String,
    pub callsign: String,
    pub ip: String,
    pub gateway: String,
    pub netmask: String,
    pub mac_address: String,
    pub location: String,
    pub region: String,
    pub options: String,
    pub screensaver: String,
    pub software_version: String,
    pub num_scu: u32,
    pub num_slice: u32,
    pub num_tx: u32,
}

/// Component firmware versions from the `version` reply.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RadioVersions {
    pub smartsdr_mb: String,
    pub psoc_mbtrx: String,
    pub psoc_mbpa100: String,
    pub fpga_mb: String,
}

/// Audio peaking filter (`eq apf` status).
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Apf {
    pub enabled: bool,
    pub qfactor: f32,
    pub gain: f32,
}

/// Filter sharpness per mode family (`radio filter_sharpness` status).
#[derive(Debug, Clone, Default, PartialEq)]
pub struct FilterSharpness {
    pub voice_level: u8,
    pub voice_auto: bool,
    pub cw_level: u8,
    pub cw_auto: bool,
    pub digital_level: u8,
    pub digital_auto: bool,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct StaticNetParams {
    pub ip: String,
    pub gateway: String,
    pub netmask: String,
}

/// Reference oscillator (`radio oscillator` status).
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Oscillator {
    /// Selected source in use, e.g. `tcxo`, `gpsdo`, `external`.
    pub state: String,
    /// Requested source, e.g. `auto`.
    pub setting: String,
    pub locked: bool,
    pub ext_present: bool,
    pub gnss_present: bool,
    pub gpsdo_present: bool,
    pub tcxo_present: bool,
}

/// The radio's own properties, from `radio` status and from replies to
/// the session's queries.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RadioProperties {
    pub callsign: String,
    pub nickname: String,
    /// Slices still available to this client.
    pub slices: u32,
    /// Panadapters still available to this client.
    pub panadapters: u32,
    pub headphone_mute: bool,
    pub lineout_mute: bool,
    pub remote_on_enabled: bool,
    pub pll_done: bool,
    pub freq_error_ppb: i32,
    /// Calibration frequency in Hz.
    pub cal_freq: u64,
    pub tnf_enabled: bool,
    pub snap_tune_enabled: bool,
    pub binaural_rx: bool,
    pub full_duplex_enabled: bool,
    pub band_persistence_enabled: bool,
    pub enforce_private_ip_connections: bool,
    pub mute_local_audio_when_remote: bool,
    pub low_latency_digital_modes: bool,
    pub rtty_mark_default: u32,
    pub backlight: u32,
    pub daxiq_capacity: u32,
    pub daxiq_available: u32,
    /// Last value sent with `xmit`; the interlock reports the outcome.
    pub mox: bool,

    pub info: RadioInfo,
    pub versions: RadioVersions,
    pub antennas: Vec<String>,
    pub mics: Vec<String>,
    pub slice_ids: Vec<u16>,
    pub uptime_secs: u64,
    /// UUID from the `client gui` reply.
    pub client_id: Option<String>,
    /// This client's address as seen by the radio.
    pub client_ip: String,
    /// `slice get_error` replies keyed by slice id.
    pub slice_errors: HashMap<u16, (String, String)>,

    pub apf: Apf,
    pub filter_sharpness: FilterSharpness,
    pub static_net: StaticNetParams,
    pub oscillator: Oscillator,
}

// ---------------------------------------------------------------------------
// Radio
// ---------------------------------------------------------------------------

/// One radio session: connection state, the radio's properties and every
/// object the radio has reported.
#[derive(Debug)]
pub struct Radio {
    commands: Arc<Commands>,
    events: broadcast::Sender<RadioEvent>,
    connection: Barrier<ConnectionInfo>,
    client_initialized: AtomicBool,
    properties: Barrier<RadioProperties>,
    headphone_gain: ClampedBarrier<u8>,
    lineout_gain: ClampedBarrier<u8>,
    gui_clients: Barrier<HashMap<u32, GuiClient>>,

    atu: Arc<Atu>,
    gps: Arc<Gps>,
    interlock: Arc<Interlock>,
    transmit: Arc<Transmit>,
    wan: Arc<Wan>,
    waveform: Arc<Waveform>,
    cwx: Arc<Cwx>,

    slices: Registry<Slice>,
    panadapters: Registry<Panadapter>,
    waterfalls: Registry<Waterfall>,
    meters: Registry<Meter>,
    memories: Registry<Memory>,
    equalizers: Registry<Equalizer>,
    tnfs: Registry<Tnf>,
    audio_streams: Registry<AudioStream>,
    mic_audio_streams: Registry<MicAudioStream>,
    tx_audio_streams: Registry<TxAudioStream>,
    iq_streams: Registry<IqStream>,
    opus_streams: Registry<OpusStream>,
    usb_cables: Registry<UsbCable>,
    xvtrs: Registry<Xvtr>,
    amplifiers: Registry<Amplifier>,
    profiles: Registry<Profile>,
}

impl Radio {
    /// A disconnected session whose commands go to `sink`.
    pub fn new(sink: Arc<dyn CommandSink>) -> Self {
        let replies = Arc::new(ReplyTable::new());
        let commands = Arc::new(Commands::new(sink, replies));
        let (events, _) = broadcast::channel(EVENT_CHANNEL_CAPACITY);
        Radio {
            atu: Arc::new(Atu::new(Arc::clone(&commands))),
            gps: Arc::new(Gps::new()),
            interlock: Arc::new(Interlock::new(Arc::clone(&commands))),
            transmit: Arc::new(Transmit::new(Arc::clone(&commands))),
            wan: Arc::new(Wan::new()),
            waveform: Arc::new(Waveform::new()),
            cwx: Arc::new(Cwx::new(Arc::clone(&commands))),
            commands,
            events,
            connection: Barrier::new(ConnectionInfo::default()),
            client_initialized: AtomicBool::new(false),
            properties: Barrier::new(RadioProperties::default()),
            headphone_gain: ClampedBarrier::new(50, 0..=100),
            lineout_gain: ClampedBarrier::new(50, 0..=100),
            gui_clients: Barrier::new(HashMap::new()),
            slices: Registry::new(),
            panadapters: Registry::new(),
            waterfalls: Registry::new(),
            meters: Registry::new(),
            memories: Registry::new(),
            equalizers: Registry::new(),
            tnfs: Registry::new(),
            audio_streams: Registry::new(),
            mic_audio_streams: Registry::new(),
            tx_audio_streams: Registry::new(),
            iq_streams: Registry::new(),
            opus_streams: Registry::new(),
            usb_cables: Registry::new(),
            xvtrs: Registry::new(),
            amplifiers: Registry::new(),
            profiles: Registry::new(),
        }
    }

    pub fn commands(&self) -> &Arc<Commands> {
        &self.commands
    }

    pub fn replies(&self) -> &Arc<ReplyTable> {
        self.commands.replies()
    }

    /// Subscribe to session events. Each receiver gets its own copy of
    /// every event sent after it subscribed.
    pub fn subscribe(&self) -> broadcast::Receiver<RadioEvent> {
        self.events.subscribe()
    }

    pub fn connection(&self) -> ConnectionInfo {
        self.connection.get()
    }

    pub fn connection_state(&self) -> ConnectionState {
        self.connection.with(|c| c.state)
    }

    /// Handle assigned by the radio, once `H` has been received.
    pub fn handle(&self) -> Option<u32> {
        self.connection.with(|c| c.handle)
    }

    pub fn version(&self) -> String {
        self.connection.with(|c| c.version.clone())
    }

    pub fn properties(&self) -> RadioProperties {
        self.properties.get()
    }

    pub fn callsign(&self) -> String {
        self.properties.with(|p| p.callsign.clone())
    }

    pub fn nickname(&self) -> String {
        self.properties.with(|p| p.nickname.clone())
    }

    pub fn headphone_gain(&self) -> u8 {
        self.headphone_gain.get()
    }

    pub fn lineout_gain(&self) -> u8 {
        self.lineout_gain.get()
    }

    /// Other GUI clients attached to the radio.
    pub fn gui_clients(&self) -> Vec<GuiClient> {
        self.gui_clients.read().values().cloned().collect()
    }

    pub fn atu(&self) -> &Arc<Atu> {
        &self.atu
    }

    pub fn gps(&self) -> &Arc<Gps> {
        &self.gps
    }

    pub fn interlock(&self) -> &Arc<Interlock> {
        &self.interlock
    }

    pub fn transmit(&self) -> &Arc<Transmit> {
        &self.transmit
    }

    pub fn wan(&self) -> &Arc<Wan> {
        &self.wan
    }

    pub fn waveform(&self) -> &Arc<Waveform> {
        &self.waveform
    }

    pub fn cwx(&self) -> &Arc<Cwx> {
        &self.cwx
    }

    pub fn slices(&self) -> &Registry<Slice> {
        &self.slices
    }

    pub fn panadapters(&self) -> &Registry<Panadapter> {
        &self.panadapters
    }

    pub fn waterfalls(&self) -> &Registry<Waterfall> {
        &self.waterfalls
    }

    pub fn meters(&self) -> &Registry<Meter> {
        &self.meters
    }

    pub fn memories(&self) -> &Registry<Memory> {
        &self.memories
    }

    pub fn equalizers(&self) -> &Registry<Equalizer> {
        &self.equalizers
    }

    pub fn tnfs(&self) -> &Registry<Tnf> {
        &self.tnfs
    }

    pub fn audio_streams(&self) -> &Registry<AudioStream> {
        &self.audio_streams
    }

    pub fn mic_audio_streams(&self) -> &Registry<MicAudioStream> {
        &self.mic_audio_streams
    }

    pub fn tx_audio_streams(&self) -> &Registry<TxAudioStream> {
        &self.tx_audio_streams
    }

    pub fn iq_streams(&self) -> &Registry<IqStream> {
        &self.iq_streams
    }

    pub fn opus_streams(&self) -> &Registry<OpusStream> {
        &self.opus_streams
    }

    pub fn usb_cables(&self) -> &Registry<UsbCable> {
        &self.usb_cables
    }

    pub fn xvtrs(&self) -> &Registry<Xvtr> {
        &self.xvtrs
    }

    pub fn amplifiers(&self) -> &Registry<Amplifier> {
        &self.amplifiers
    }

    pub fn profiles(&self) -> &Registry<Profile> {
        &self.profiles
    }

    /// The meter with the given name, e.g. `LEVEL`, `FWDPWR`, `SWR`.
    pub fn meter_by_name(&self, name: &str) -> Option<Arc<Meter>> {
        self.meters.find(|m| m.name() == name)
    }

    pub(crate) fn emit(&self, event: RadioEvent) {
        // No receivers is not an error.
        let _ = self.events.send(event);
    }

    // -----------------------------------------------------------------------
    // Inbound lines
    // -----------------------------------------------------------------------

    /// Process one line from the radio, without its trailing newline.
    pub fn received_message(&self, line: &str) {
        tracing::trace!(line, "received");
        let parsed = match codec::parse_line(line) {
            Ok(parsed) => parsed,
            Err(e) => {
                tracing::warn!(error = %e, line, "dropping malformed line");
                return;
            }
        };

        match parsed {
            Line::Handle(handle) => self.handle_assigned(handle),
            Line::Message { code, text } => {
                let severity = Severity::from_code(&code);
                log_at_severity(severity, &code, "radio message", &text);
                self.emit(RadioEvent::Message {
                    severity,
                    code,
                    text,
                });
            }
            Line::Reply(reply) => {
                self.commands.replies().resolve(
                    reply.sequence,
                    &reply.code,
                    &reply.message,
                    reply.debug.as_deref(),
                    |reply| self.default_reply_handler(reply),
                );
            }
            Line::Status(status) => self.parse_status(&status),
            Line::Version(version) => {
                tracing::debug!(version = %version, "protocol version");
                self.connection.update(|c| c.version = version);
            }
            Line::Unknown(line) => {
                tracing::warn!(line = %line, "unexpected message type");
            }
        }
    }

    fn handle_assigned(&self, handle: u32) {
        self.connection.update(|c| {
            c.handle = Some(handle);
            c.state = ConnectionState::HandleAssigned;
        });
        self.client_initialized.store(false, Ordering::Release);
        tracing::debug!(handle = format!("{handle:08X}"), "client handle received");
        self.emit(RadioEvent::HandleAssigned(handle));
    }

    /// Record that registration commands are on their way. Only moves the
    /// state forward from [`ConnectionState::HandleAssigned`].
    pub fn mark_client_initializing(&self) {
        self.connection.update(|c| {
            if c.state == ConnectionState::HandleAssigned {
                c.state = ConnectionState::ClientInitializing;
            }
        });
    }

    // -----------------------------------------------------------------------
    // Replies
    // -----------------------------------------------------------------------

    /// Handle a reply to a command that was sent without a callback.
    fn default_reply_handler(&self, reply: Reply) {
        if !reply.is_success() {
            if !reply.command.starts_with("client program") {
                log_at_severity(
                    Severity::from_code(&reply.code),
                    &reply.code,
                    &reply.command,
                    &reply.message,
                );
            }
            return;
        }

        let words: Vec<&str> = reply.command.split_whitespace().collect();
        let message = reply.message.trim();
        match words.as_slice() {
            ["client", "gui", ..] => {
                let client_id = (!message.is_empty()).then(|| message.to_string());
                self.properties.update(|p| p.client_id = client_id);
            }
            ["client", "ip", ..] => {
                self.properties.update(|p| p.client_ip = message.to_string());
            }
            ["info", ..] => self.parse_info_reply(message),
            ["ant", "list", ..] => {
                let antennas = parse_values(message, ',');
                self.properties.update(|p| p.antennas = antennas);
            }
            ["mic", "list", ..] => {
                let mics = parse_values(message, ',');
                self.properties.update(|p| p.mics = mics);
            }
            ["slice", "list", ..] => {
                let ids = message
                    .split_whitespace()
                    .filter_map(|id| id.parse().ok())
                    .collect();
                self.properties.update(|p| p.slice_ids = ids);
            }
            ["radio", "uptime", ..] => match message.parse() {
                Ok(secs) => self.properties.update(|p| p.uptime_secs = secs),
                Err(_) => tracing::warn!(reply = message, "invalid uptime reply"),
            },
            ["version", ..] => self.parse_version_reply(message),
            ["slice", "get_error", id, ..] => {
                let values = parse_values(message, ',');
                match (id.parse::<u16>(), values.as_slice()) {
                    (Ok(id), [first, second, ..]) => {
                        let errors = (first.clone(), second.clone());
                        self.properties.update(|p| p.slice_errors.insert(id, errors));
                    }
                    _ => tracing::warn!(reply = message, "invalid slice error reply"),
                }
            }
            ["tnf", "remove", id, ..] => {
                if let Ok(id) = id.parse::<u32>() {
                    if let Some(tnf) = self.tnfs.get(&id) {
                        self.emit(RadioEvent::WillRemove(ObjectRef::Tnf(tnf)));
                        self.tnfs.remove(&id);
                    }
                }
                return;
            }
            _ => return,
        }
        self.emit(RadioEvent::Updated(ObjectRef::Radio));
    }

    fn parse_info_reply(&self, message: &str) {
        let st = &self.properties;
        let k = ObjectKind::Radio;
        for kv in parse_key_values(message, ',', true, false) {
            let kv = KeyValue::new(kv.key, unquote(&kv.value));
            match kv.key.as_str() {
                "model" => store(st, k, &kv, |p| &mut p.info.model),
                "chassis_serial" => store(st, k, &kv, |p| &mut p.info.chassis_serial),
                "name" => store(st, k, &kv, |p| &mut p.info.name),
                "callsign" => store(st, k, &kv, |p| &mut p.info.callsign),
                "ip" => store(st, k, &kv, |p| &mut p.info.ip),
                "gateway" => store(st, k, &kv, |p| &mut p.info.gateway),
                "netmask" => store(st, k, &kv, |p| &mut p.info.netmask),
                "macaddr" => store(st, k, &kv, |p| &mut p.info.mac_address),
                "location" => store(st, k, &kv, |p| &mut p.info.location),
                "region" => store(st, k, &kv, |p| &mut p.info.region),
                "options" => store(st, k, &kv, |p| &mut p.info.options),
                "screensaver" => store(st, k, &kv, |p| &mut p.info.screensaver),
                "software_ver" => store(st, k, &kv, |p| &mut p.info.software_version),
                "num_scu" => store(st, k, &kv, |p| &mut p.info.num_scu),
                "num_slice" => store(st, k, &kv, |p| &mut p.info.num_slice),
                "num_tx" => store(st, k, &kv, |p| &mut p.info.num_tx),
                _ => tracing::warn!(token = %kv.key, value = %kv.value, "unknown info field"),
            }
        }
    }

    fn parse_version_reply(&self, message: &str) {
        let st = &self.properties;
        let k = ObjectKind::Radio;
        for kv in parse_key_values(message, '#', true, false) {
            match kv.key.as_str() {
                "smartsdr-mb" => store(st, k, &kv, |p| &mut p.versions.smartsdr_mb),
                "psoc-mbtrx" => store(st, k, &kv, |p| &mut p.versions.psoc_mbtrx),
                "psoc-mbpa100" => store(st, k, &kv, |p| &mut p.versions.psoc_mbpa100),
                "fpga-mb" => store(st, k, &kv, |p| &mut p.versions.fpga_mb),
                _ => tracing::warn!(token = %kv.key, value = %kv.value, "unknown version field"),
            }
        }
    }

    // -----------------------------------------------------------------------
    // Status routing
    // -----------------------------------------------------------------------

    fn parse_status(&self, status: &StatusLine) {
        let remainder = status.remainder.as_str();
        match StatusCategory::parse(&status.category) {
            StatusCategory::Client => self.parse_client_status(remainder),
            StatusCategory::Radio => self.parse_radio_status(status.handle, remainder),
            StatusCategory::Slice => self.parse_dynamic(&self.slices, remainder, &[NOT_IN_USE]),
            StatusCategory::Meter => self.parse_meter_status(remainder),
            StatusCategory::Display => self.parse_display_status(remainder),
            StatusCategory::Memory => self.parse_dynamic(&self.memories, remainder, &[REMOVED]),
            StatusCategory::Tnf => self.parse_dynamic(&self.tnfs, remainder, &[REMOVED]),
            StatusCategory::Stream => self.parse_stream_status(remainder),
            StatusCategory::Interlock => self.parse_interlock_status(remainder),
            StatusCategory::Transmit => self.parse_transmit_status(remainder),
            StatusCategory::Atu => {
                self.parse_static(&self.atu, &key_values(remainder), ObjectRef::Atu)
            }
            StatusCategory::Gps => self.parse_static(
                &self.gps,
                &parse_key_values(remainder, '#', true, false),
                ObjectRef::Gps,
            ),
            StatusCategory::Cwx => {
                self.parse_static(&self.cwx, &key_values(&escape(remainder)), ObjectRef::Cwx)
            }
            StatusCategory::Wan => {
                self.parse_static(&self.wan, &key_values(remainder), ObjectRef::Wan)
            }
            StatusCategory::Waveform => {
                self.parse_static(&self.waveform, &key_values(remainder), ObjectRef::Waveform)
            }
            StatusCategory::Profile => self.parse_profile_status(remainder),
            StatusCategory::Eq => self.parse_eq_status(remainder),
            StatusCategory::Amplifier => {
                self.parse_dynamic(&self.amplifiers, remainder, &[REMOVED])
            }
            StatusCategory::UsbCable => self.parse_dynamic(&self.usb_cables, remainder, &[REMOVED]),
            StatusCategory::Xvtr => self.parse_dynamic(&self.xvtrs, remainder, &[NOT_IN_USE]),
            StatusCategory::OpusStream => {
                self.parse_dynamic(&self.opus_streams, remainder, &[NOT_IN_USE, REMOVED])
            }
            StatusCategory::AudioStream => {
                self.parse_dynamic(&self.audio_streams, remainder, &[NOT_IN_USE, REMOVED])
            }
            StatusCategory::MicAudioStream => {
                self.parse_dynamic(&self.mic_audio_streams, remainder, &[NOT_IN_USE, REMOVED])
            }
            StatusCategory::TxAudioStream => {
                self.parse_dynamic(&self.tx_audio_streams, remainder, &[NOT_IN_USE, REMOVED])
            }
            StatusCategory::File
            | StatusCategory::Mixer
            | StatusCategory::Turf
            | StatusCategory::DaxIq => {
                tracing::trace!(category = %status.category, "ignoring obsolete status");
            }
            StatusCategory::Unknown(category) => {
                tracing::warn!(category = %category, remainder, "unknown status category");
            }
        }
    }

    /// Route `<id> <properties>` to a registry. The object is considered
    /// gone when the remainder contains any of `sentinels`.
    fn parse_dynamic<M: DynamicModel>(
        &self,
        registry: &Registry<M>,
        remainder: &str,
        sentinels: &[&str],
    ) {
        let (raw_id, rest) = split_first(remainder);
        let in_use = !sentinels.iter().any(|s| remainder.contains(s));
        self.apply_dynamic(registry, raw_id, in_use, &key_values(rest));
    }

    /// Create, update or remove one dynamic object.
    ///
    /// A new object is inserted before its properties are parsed, so
    /// anything looking it up by id during parsing finds it. Status for an
    /// unknown object that is not in use is ignored.
    fn apply_dynamic<M: DynamicModel>(
        &self,
        registry: &Registry<M>,
        raw_id: &str,
        in_use: bool,
        properties: &[KeyValue],
    ) -> Option<Arc<M>> {
        let Some(id) = M::parse_id(raw_id) else {
            tracing::warn!(object = M::KIND.as_str(), id = raw_id, "invalid object id");
            return None;
        };

        match (registry.get(&id), in_use) {
            (Some(object), true) => {
                object.parse_properties(properties);
                self.emit(RadioEvent::Updated(M::into_ref(Arc::clone(&object))));
                Some(object)
            }
            (Some(object), false) => {
                self.emit(RadioEvent::WillRemove(M::into_ref(object)));
                registry.remove(&id);
                tracing::debug!(object = M::KIND.as_str(), id = ?id, "removed");
                None
            }
            (None, true) => {
                let object = Arc::new(M::new(id.clone(), Arc::clone(&self.commands)));
                registry.insert(Arc::clone(&object));
                object.parse_properties(properties);
                tracing::debug!(object = M::KIND.as_str(), id = ?id, "added");
                self.emit(RadioEvent::Added(M::into_ref(Arc::clone(&object))));
                Some(object)
            }
            (None, false) => {
                tracing::trace!(object = M::KIND.as_str(), id = ?id, "status for unknown object");
                None
            }
        }
    }

    fn parse_static<M: StaticModel>(
        &self,
        model: &Arc<M>,
        properties: &[KeyValue],
        wrap: fn(Arc<M>) -> ObjectRef,
    ) {
        model.parse_properties(properties);
        self.emit(RadioEvent::Updated(wrap(Arc::clone(model))));
    }

    fn parse_radio_status(&self, handle: u32, remainder: &str) {
        let (form, rest) = split_first(remainder);
        match form {
            "filter_sharpness" => self.parse_filter_sharpness(rest),
            "static_net_params" => self.parse_static_net_params(&key_values(rest)),
            "oscillator" => self.parse_oscillator(&key_values(rest)),
            _ => self.parse_radio_properties(&key_values(remainder)),
        }
        self.emit(RadioEvent::Updated(ObjectRef::Radio));

        if self.handle() == Some(handle) && !self.client_initialized.swap(true, Ordering::AcqRel) {
            self.connection
                .update(|c| c.state = ConnectionState::ClientInitialized);
            tracing::info!(handle = format!("{handle:08X}"), "client initialized");
            self.emit(RadioEvent::ClientConnected);
        }
    }

    fn parse_radio_properties(&self, properties: &[KeyValue]) {
        let st = &self.properties;
        let k = ObjectKind::Radio;
        let gain = |barrier: &ClampedBarrier<u8>, kv: &KeyValue| match kv.value.parse::<u8>() {
            Ok(v) => barrier.set(v),
            Err(_) => invalid_value(k, kv),
        };
        for kv in properties {
            match RadioToken::parse(&kv.key) {
                RadioToken::Callsign => store(st, k, kv, |p| &mut p.callsign),
                RadioToken::Nickname => store(st, k, kv, |p| &mut p.nickname),
                RadioToken::Slices => store(st, k, kv, |p| &mut p.slices),
                RadioToken::Panadapters => store(st, k, kv, |p| &mut p.panadapters),
                RadioToken::HeadphoneGain => gain(&self.headphone_gain, kv),
                RadioToken::HeadphoneMute => store(st, k, kv, |p| &mut p.headphone_mute),
                RadioToken::LineoutGain => gain(&self.lineout_gain, kv),
                RadioToken::LineoutMute => store(st, k, kv, |p| &mut p.lineout_mute),
                RadioToken::RemoteOnEnabled => store(st, k, kv, |p| &mut p.remote_on_enabled),
                RadioToken::PllDone => store(st, k, kv, |p| &mut p.pll_done),
                RadioToken::FreqErrorPpb => store(st, k, kv, |p| &mut p.freq_error_ppb),
                RadioToken::CalFreq => store_with(st, k, kv, parse_mhz, |p| &mut p.cal_freq),
                RadioToken::TnfEnabled => store(st, k, kv, |p| &mut p.tnf_enabled),
                RadioToken::SnapTuneEnabled => store(st, k, kv, |p| &mut p.snap_tune_enabled),
                RadioToken::BinauralRx => store(st, k, kv, |p| &mut p.binaural_rx),
                RadioToken::FullDuplexEnabled => {
                    store(st, k, kv, |p| &mut p.full_duplex_enabled)
                }
                RadioToken::BandPersistenceEnabled => {
                    store(st, k, kv, |p| &mut p.band_persistence_enabled)
                }
                RadioToken::EnforcePrivateIp => {
                    store(st, k, kv, |p| &mut p.enforce_private_ip_connections)
                }
                RadioToken::MuteLocalAudio => {
                    store(st, k, kv, |p| &mut p.mute_local_audio_when_remote)
                }
                RadioToken::LowLatencyDigital => {
                    store(st, k, kv, |p| &mut p.low_latency_digital_modes)
                }
                RadioToken::RttyMarkDefault => store(st, k, kv, |p| &mut p.rtty_mark_default),
                RadioToken::Backlight => store(st, k, kv, |p| &mut p.backlight),
                RadioToken::DaxIqCapacity => store(st, k, kv, |p| &mut p.daxiq_capacity),
                RadioToken::DaxIqAvailable => store(st, k, kv, |p| &mut p.daxiq_available),
                RadioToken::Unknown(_) => unknown_token(k, kv),
            }
        }
    }

    /// `radio filter_sharpness <VOICE|CW|DIGITAL> level=N auto_level=B`
    fn parse_filter_sharpness(&self, rest: &str) {
        let (mode, rest) = split_first(rest);
        let mode = mode.to_ascii_uppercase();
        let st = &self.properties;
        let k = ObjectKind::Radio;
        for kv in key_values(rest) {
            match (mode.as_str(), kv.key.as_str()) {
                ("VOICE", "level") => store(st, k, &kv, |p| &mut p.filter_sharpness.voice_level),
                ("VOICE", "auto_level") => {
                    store(st, k, &kv, |p| &mut p.filter_sharpness.voice_auto)
                }
                ("CW", "level") => store(st, k, &kv, |p| &mut p.filter_sharpness.cw_level),
                ("CW", "auto_level") => store(st, k, &kv, |p| &mut p.filter_sharpness.cw_auto),
                ("DIGITAL", "level") => {
                    store(st, k, &kv, |p| &mut p.filter_sharpness.digital_level)
                }
                ("DIGITAL", "auto_level") => {
                    store(st, k, &kv, |p| &mut p.filter_sharpness.digital_auto)
                }
                _ => unknown_token(k, &kv),
            }
        }
    }

    fn parse_static_net_params(&self, properties: &[KeyValue]) {
        let st = &self.properties;
        let k = ObjectKind::Radio;
        for kv in properties {
            match kv.key.as_str() {
                "ip" => store(st, k, kv, |p| &mut p.static_net.ip),
                "gateway" => store(st, k, kv, |p| &mut p.static_net.gateway),
                "netmask" => store(st, k, kv, |p| &mut p.static_net.netmask),
                _ => unknown_token(k, kv),
            }
        }
    }

    fn parse_oscillator(&self, properties: &[KeyValue]) {
        let st = &self.properties;
        let k = ObjectKind::Radio;
        for kv in properties {
            match kv.key.as_str() {
                "state" => store(st, k, kv, |p| &mut p.oscillator.state),
                "setting" => store(st, k, kv, |p| &mut p.oscillator.setting),
                "locked" => store(st, k, kv, |p| &mut p.oscillator.locked),
                "ext_present" => store(st, k, kv, |p| &mut p.oscillator.ext_present),
                "gnss_present" => store(st, k, kv, |p| &mut p.oscillator.gnss_present),
                "gpsdo_present" => store(st, k, kv, |p| &mut p.oscillator.gpsdo_present),
                "tcxo_present" => store(st, k, kv, |p| &mut p.oscillator.tcxo_present),
                _ => unknown_token(k, kv),
            }
        }
    }

    fn parse_apf(&self, properties: &[KeyValue]) {
        let st = &self.properties;
        let k = ObjectKind::Radio;
        for kv in properties {
            match kv.key.as_str() {
                "mode" => store(st, k, kv, |p| &mut p.apf.enabled),
                "qfactor" => store(st, k, kv, |p| &mut p.apf.qfactor),
                "gain" => store(st, k, kv, |p| &mut p.apf.gain),
                _ => unknown_token(k, kv),
            }
        }
    }

    /// `client <handle> connected|disconnected [properties]`
    fn parse_client_status(&self, remainder: &str) {
        let (raw_handle, rest) = split_first(remainder);
        let Some(handle) = parse_hex_u32(raw_handle) else {
            tracing::warn!(handle = raw_handle, "invalid client handle in status");
            return;
        };
        let (action, rest) = split_first(rest);
        match action {
            "connected" => {
                let mut client = GuiClient {
                    handle,
                    client_id: None,
                    program: String::new(),
                    station: String::new(),
                };
                for kv in key_values(rest) {
                    match kv.key.as_str() {
                        "client_id" => client.client_id = Some(kv.value),
                        "program" => client.program = kv.value,
                        "station" => client.station = kv.value.replace(ESCAPED_SPACE, " "),
                        _ => {}
                    }
                }
                let previous = self.gui_clients.write().insert(handle, client.clone());
                if previous.as_ref() != Some(&client) {
                    tracing::debug!(
                        handle = format!("{handle:08X}"),
                        program = %client.program,
                        station = %client.station,
                        "gui client connected"
                    );
                    self.emit(RadioEvent::GuiClientAdded(client));
                }
            }
            "disconnected" => {
                let removed = self.gui_clients.write().remove(&handle);
                if let Some(client) = removed {
                    tracing::debug!(handle = format!("{handle:08X}"), "gui client disconnected");
                    self.emit(RadioEvent::GuiClientRemoved(client));
                }
            }
            other => {
                tracing::trace!(handle = format!("{handle:08X}"), action = other, "client status");
            }
        }
    }

    /// Meter status packs several meters into one `#`-delimited line with
    /// `<id>.<token>=<value>` keys. Removal is `<id> removed`.
    fn parse_meter_status(&self, remainder: &str) {
        let (raw_id, rest) = split_first(remainder);
        if rest.trim() == REMOVED {
            self.apply_dynamic(&self.meters, raw_id, false, &[]);
            return;
        }

        let mut grouped: Vec<(String, Vec<KeyValue>)> = Vec::new();
        for kv in parse_key_values(remainder, '#', true, false) {
            let Some((id, token)) = kv.key.split_once('.') else {
                tracing::warn!(token = %kv.key, "meter token without id");
                continue;
            };
            let property = KeyValue::new(token, kv.value.clone());
            match grouped.iter_mut().find(|(existing, _)| existing == id) {
                Some((_, properties)) => properties.push(property),
                None => grouped.push((id.to_string(), vec![property])),
            }
        }
        for (id, properties) in grouped {
            self.apply_dynamic(&self.meters, &id, true, &properties);
        }
    }

    /// `display pan <id> ...` or `display waterfall <id> ...`
    fn parse_display_status(&self, remainder: &str) {
        let (kind, rest) = split_first(remainder);
        match kind {
            "pan" => self.parse_dynamic(&self.panadapters, rest, &[REMOVED]),
            "waterfall" => self.parse_dynamic(&self.waterfalls, rest, &[REMOVED]),
            other => tracing::warn!(display = other, "unknown display status"),
        }
    }

    /// `stream <id> type=<kind> ...`, routed by stream type. A status without
    /// a type only updates a registry that already holds the id.
    fn parse_stream_status(&self, remainder: &str) {
        let (raw_id, rest) = split_first(remainder);
        let in_use = !(remainder.contains(NOT_IN_USE) || remainder.contains(REMOVED));
        let properties = key_values(rest);
        let stream_type = properties
            .iter()
            .find(|kv| kv.key == "type")
            .map(|kv| kv.value.to_ascii_lowercase());

        match stream_type.as_deref() {
            Some("dax_rx") => {
                self.apply_dynamic(&self.audio_streams, raw_id, in_use, &properties);
            }
            Some("dax_mic") => {
                self.apply_dynamic(&self.mic_audio_streams, raw_id, in_use, &properties);
            }
            Some("dax_tx") => {
                self.apply_dynamic(&self.tx_audio_streams, raw_id, in_use, &properties);
            }
            Some("dax_iq") => {
                self.apply_dynamic(&self.iq_streams, raw_id, in_use, &properties);
            }
            Some("remote_audio_rx") => {
                self.apply_dynamic(&self.opus_streams, raw_id, in_use, &properties);
            }
            Some(other) => {
                tracing::debug!(stream_type = other, id = raw_id, "unsupported stream type");
            }
            None => {
                let Some(id) = parse_hex_u32(raw_id) else {
                    tracing::warn!(id = raw_id, "invalid stream id");
                    return;
                };
                if self.audio_streams.contains(&id) {
                    self.apply_dynamic(&self.audio_streams, raw_id, in_use, &properties);
                } else if self.mic_audio_streams.contains(&id) {
                    self.apply_dynamic(&self.mic_audio_streams, raw_id, in_use, &properties);
                } else if self.tx_audio_streams.contains(&id) {
                    self.apply_dynamic(&self.tx_audio_streams, raw_id, in_use, &properties);
                } else if self.opus_streams.contains(&id) {
                    self.apply_dynamic(&self.opus_streams, raw_id, in_use, &properties);
                } else if self.iq_streams.contains(&id) {
                    self.apply_dynamic(&self.iq_streams, raw_id, in_use, &properties);
                } else {
                    tracing::warn!(id = raw_id, "stream status without type for unknown stream");
                }
            }
        }
    }

    fn parse_interlock_status(&self, remainder: &str) {
        let before = self.interlock.state_name();
        self.parse_static(&self.interlock, &key_values(remainder), ObjectRef::Interlock);
        let after = self.interlock.state_name();
        if before != after {
            tracing::debug!(from = %before, to = %after, "interlock state changed");
            self.emit(RadioEvent::InterlockStateChanged(after));
        }
    }

    fn parse_transmit_status(&self, remainder: &str) {
        // Per-band power limits are not tracked.
        if remainder.starts_with("band ") {
            tracing::trace!(remainder, "ignoring transmit band status");
            return;
        }
        self.parse_static(&self.transmit, &key_values(remainder), ObjectRef::Transmit);
    }

    /// `profile <kind> <token>=<value>`. Values are profile names and may
    /// contain spaces, so only the first `=` separates.
    fn parse_profile_status(&self, remainder: &str) {
        let (kind, rest) = split_first(remainder);
        let property = match rest.split_once('=') {
            Some((key, value)) => KeyValue::new(key.trim().to_lowercase(), value.trim()),
            None => KeyValue::new(rest.trim().to_lowercase(), ""),
        };
        self.apply_dynamic(&self.profiles, kind, true, &[property]);
    }

    /// `eq apf ...` belongs to the radio; `eq rxsc|txsc ...` to an equalizer.
    fn parse_eq_status(&self, remainder: &str) {
        let (id, rest) = split_first(remainder);
        if id == "apf" {
            self.parse_apf(&key_values(rest));
            self.emit(RadioEvent::Updated(ObjectRef::Radio));
        } else {
            self.apply_dynamic(&self.equalizers, id, true, &key_values(rest));
        }
    }

    // -----------------------------------------------------------------------
    // Radio setters
    // -----------------------------------------------------------------------

    pub fn set_callsign(&self, callsign: &str) {
        if try_set_field(&self.properties, |p| &mut p.callsign, callsign.to_string()) {
            self.commands.send(commands::cmd_radio_callsign(callsign));
        }
    }

    pub fn set_nickname(&self, nickname: &str) {
        if try_set_field(&self.properties, |p| &mut p.nickname, nickname.to_string()) {
            self.commands.send(commands::cmd_radio_nickname(nickname));
        }
    }

    /// Clamped to 0..=100.
    pub fn set_headphone_gain(&self, gain: u8) {
        if let Some(gain) = self.headphone_gain.try_set(gain) {
            self.commands.send(commands::cmd_headphone_gain(gain));
        }
    }

    pub fn set_headphone_mute(&self, mute: bool) {
        if try_set_field(&self.properties, |p| &mut p.headphone_mute, mute) {
            self.commands.send(commands::cmd_headphone_mute(mute));
        }
    }

    /// Clamped to 0..=100.
    pub fn set_lineout_gain(&self, gain: u8) {
        if let Some(gain) = self.lineout_gain.try_set(gain) {
            self.commands.send(commands::cmd_lineout_gain(gain));
        }
    }

    pub fn set_lineout_mute(&self, mute: bool) {
        if try_set_field(&self.properties, |p| &mut p.lineout_mute, mute) {
            self.commands.send(commands::cmd_lineout_mute(mute));
        }
    }

    pub fn set_apf_enabled(&self, enabled: bool) {
        if try_set_field(&self.properties, |p| &mut p.apf.enabled, enabled) {
            self.commands
                .send(commands::cmd_apf("mode", bool_flag(enabled)));
        }
    }

    pub fn set_apf_qfactor(&self, qfactor: f32) {
        let qfactor = flexlib_core::clamp(qfactor, &(0.0..=33.0));
        if try_set_field(&self.properties, |p| &mut p.apf.qfactor, qfactor) {
            self.commands.send(commands::cmd_apf("qfactor", qfactor));
        }
    }

    pub fn set_apf_gain(&self, gain: f32) {
        let gain = flexlib_core::clamp(gain, &(0.0..=100.0));
        if try_set_field(&self.properties, |p| &mut p.apf.gain, gain) {
            self.commands.send(commands::cmd_apf("gain", gain));
        }
    }

    /// Key (`true`) or unkey the transmitter.
    pub fn set_mox(&self, on: bool) {
        if try_set_field(&self.properties, |p| &mut p.mox, on) {
            self.commands.send(commands::cmd_xmit(on));
        }
    }

    pub fn set_binaural_rx(&self, on: bool) {
        if try_set_field(&self.properties, |p| &mut p.binaural_rx, on) {
            self.commands
                .send(commands::cmd_radio_set("binaural_rx", bool_flag(on)));
        }
    }

    pub fn set_tnf_enabled(&self, on: bool) {
        if try_set_field(&self.properties, |p| &mut p.tnf_enabled, on) {
            self.commands
                .send(commands::cmd_radio_set("tnf_enabled", bool_flag(on)));
        }
    }

    pub fn set_full_duplex_enabled(&self, on: bool) {
        if try_set_field(&self.properties, |p| &mut p.full_duplex_enabled, on) {
            self.commands
                .send(commands::cmd_radio_set("full_duplex_enabled", bool_flag(on)));
        }
    }

    /// `mode` is `VOICE`, `CW` or `DIGITAL`; any other mode is rejected
    /// without sending.
    pub fn set_filter_sharpness(&self, mode: &str, level: u8) -> Result<()> {
        let level = flexlib_core::clamp(level, &(0..=3));
        let changed = self.properties.update(|p| {
            let field = match mode.to_ascii_uppercase().as_str() {
                "VOICE" => &mut p.filter_sharpness.voice_level,
                "CW" => &mut p.filter_sharpness.cw_level,
                "DIGITAL" => &mut p.filter_sharpness.digital_level,
                _ => return None,
            };
            let changed = *field != level;
            *field = level;
            Some(changed)
        });
        match changed {
            Some(true) => {
                self.commands
                    .send(commands::cmd_radio_filter_sharpness(mode, level));
                Ok(())
            }
            Some(false) => Ok(()),
            None => Err(Error::InvalidParameter(format!(
                "unknown filter sharpness mode {mode}"
            ))),
        }
    }

    // -----------------------------------------------------------------------
    // Requests and object creation
    // -----------------------------------------------------------------------

    /// Ask for everything the default reply handler records.
    pub fn request_radio_info(&self) {
        for command in [
            commands::cmd_info(),
            commands::cmd_version(),
            commands::cmd_antenna_list(),
            commands::cmd_mic_list(),
            commands::cmd_slice_list(),
            commands::cmd_radio_uptime(),
        ] {
            self.commands.send(command);
        }
    }

    /// The slice appears once the radio reports its status.
    pub fn create_slice(&self, freq_hz: u64, antenna: &str, mode: &str) -> u32 {
        self.commands
            .send(commands::cmd_slice_create(freq_hz, antenna, mode))
    }

    pub fn create_panadapter(&self, freq_hz: u64) -> u32 {
        self.commands.send(commands::cmd_pan_create(freq_hz))
    }

    pub fn create_tnf(&self, freq_hz: u64) -> u32 {
        self.commands.send(commands::cmd_tnf_create(freq_hz))
    }

    /// The reply to `tnf remove` drops the notch from the registry.
    pub fn remove_tnf(&self, tnf_id: u32) -> u32 {
        self.commands.send(commands::cmd_tnf_remove(tnf_id))
    }

    pub fn create_memory(&self) -> u32 {
        self.commands.send(commands::cmd_memory_create())
    }

    /// `kind` is e.g. `dax_rx`, `dax_iq`, `dax_mic`, `dax_tx`,
    /// `remote_audio_rx`.
    pub fn create_stream(&self, kind: &str, dax_channel: Option<u8>) -> u32 {
        self.commands
            .send(commands::cmd_stream_create(kind, dax_channel))
    }

    pub fn request_slice_error(&self, slice_id: u16) -> u32 {
        self.commands.send(commands::cmd_slice_get_error(slice_id))
    }

    // -----------------------------------------------------------------------
    // Teardown
    // -----------------------------------------------------------------------

    /// Reset the session after the connection closes.
    ///
    /// Pending reply callbacks are dropped without being called. Streams,
    /// notches, slices, displays and profiles are removed with
    /// [`RadioEvent::WillRemove`]; the remaining registries are cleared
    /// silently.
    pub fn disconnect_cleanup(&self) {
        self.commands.replies().clear();

        self.remove_all(&self.audio_streams);
        self.remove_all(&self.mic_audio_streams);
        self.remove_all(&self.tx_audio_streams);
        self.remove_all(&self.iq_streams);
        self.remove_all(&self.opus_streams);
        self.remove_all(&self.tnfs);
        self.remove_all(&self.slices);
        for panadapter in self.panadapters.all() {
            let waterfall_id = panadapter.waterfall_id();
            self.emit(RadioEvent::WillRemove(ObjectRef::Panadapter(Arc::clone(
                &panadapter,
            ))));
            self.panadapters.remove(panadapter.id());
            if let Some(waterfall) = self.waterfalls.remove(&waterfall_id) {
                self.emit(RadioEvent::WillRemove(ObjectRef::Waterfall(waterfall)));
            }
        }
        self.remove_all(&self.waterfalls);
        self.remove_all(&self.profiles);

        self.equalizers.drain();
        self.memories.drain();
        self.meters.drain();
        self.usb_cables.drain();
        self.xvtrs.drain();
        self.amplifiers.drain();
        self.gui_clients.write().clear();

        self.connection.update(|c| {
            c.state = ConnectionState::Disconnected;
            c.handle = None;
        });
        self.client_initialized.store(false, Ordering::Release);
        tracing::debug!("session state cleared");
        self.emit(RadioEvent::Disconnected);
    }

    fn remove_all<M: DynamicModel>(&self, registry: &Registry<M>) {
        for object in registry.all() {
            let id = object.id().clone();
            self.emit(RadioEvent::WillRemove(M::into_ref(object)));
            registry.remove(&id);
        }
    }
}

/// Split off the first space-delimited token.
fn split_first(text: &str) -> (&str, &str) {
    match text.trim_start().split_once(' ') {
        Some((first, rest)) => (first, rest.trim_start()),
        None => (text.trim(), ""),
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

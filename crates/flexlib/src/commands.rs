//! Outbound command encoding.
//!
//! [`Commands`] owns the session's sequence counter. Each command gets the
//! next sequence number, is registered in the [`ReplyTable`], and is then
//! handed to the transport through a [`CommandSink`]. The transport adds the
//! `C<seq>|` framing (see [`crate::codec::encode_command`]).
//!
//! The free functions below build command text only. Several properties use
//! a different token when sent than when reported in status, e.g. the CW
//! speed arrives as `speed=` but is set with `cw wpm`, and the slice
//! frequency arrives as `RF_frequency=` but is set with `slice tune`.

use std::sync::Arc;
use std::sync::atomic::{AtomicU32, Ordering};

use flexlib_core::{Result, bool_flag, hz_to_mhz};

use crate::reply::{ReplyCallback, ReplyTable};

/// Where framed commands go. Implemented by the TCP client's writer.
pub trait CommandSink: Send + Sync {
    /// Deliver one command. Must not block on the network.
    fn send_command(&self, sequence: u32, text: &str) -> Result<()>;
}

/// Session-scoped command sender.
pub struct Commands {
    next_sequence: AtomicU32,
    replies: Arc<ReplyTable>,
    sink: Arc<dyn CommandSink>,
}

impl std::fmt::Debug for Commands {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Commands")
            .field("next_sequence", &self.next_sequence.load(Ordering::Relaxed))
            .field("pending", &self.replies.pending())
            .finish()
    }
}

impl Commands {
    /// Sequence numbers start at 1 for every session.
    pub fn new(sink: Arc<dyn CommandSink>, replies: Arc<ReplyTable>) -> Self {
        Commands {
            next_sequence: AtomicU32::new(1),
            replies,
            sink,
        }
    }

    /// Send a command whose reply goes to the session's default handler.
    pub fn send(&self, text: impl Into<String>) -> u32 {
        self.dispatch(text.into(), None)
    }

    /// Send a command and run `callback` with its reply.
    pub fn send_with_reply(&self, text: impl Into<String>, callback: ReplyCallback) -> u32 {
        self.dispatch(text.into(), Some(callback))
    }

    fn dispatch(&self, text: String, callback: Option<ReplyCallback>) -> u32 {
        let sequence = self.next_sequence.fetch_add(1, Ordering::SeqCst);
        self.replies.register(sequence, text.clone(), callback);
        tracing::trace!(sequence, command = %text, "sending command");
        if let Err(e) = self.sink.send_command(sequence, &text) {
            tracing::warn!(sequence, command = %text, error = %e, "failed to send command");
            self.replies.remove(sequence);
        }
        sequence
    }

    /// The sequence number the next command will use.
    pub fn peek_sequence(&self) -> u32 {
        self.next_sequence.load(Ordering::SeqCst)
    }

    pub fn replies(&self) -> &Arc<ReplyTable> {
        &self.replies
    }
}

fn stream(id: u32) -> String {
    format!("0x{id:08X}")
}

// ---------------------------------------------------------------------------
// Client / session
// ---------------------------------------------------------------------------

pub fn cmd_client_program(name: &str) -> String {
    format!("client program {name}")
}

pub fn cmd_client_station(name: &str) -> String {
    format!("client station {}", name.replace(' ', "\u{7f}"))
}

/// Register as a GUI client. The reply carries the client id (a UUID).
pub fn cmd_client_gui(client_id: Option<&str>) -> String {
    match client_id {
        Some(id) => format!("client gui {id}"),
        None => "client gui".to_string(),
    }
}

pub fn cmd_client_ip() -> String {
    "client ip".to_string()
}

/// Tell the radio which local UDP port receives VITA-49 streams.
pub fn cmd_client_udp_port(port: u16) -> String {
    format!("client udpport {port}")
}

pub fn cmd_client_disconnect(handle: u32) -> String {
    format!("client disconnect 0x{handle:08X}")
}

/// Example output: `"sub slice all"`
pub fn cmd_subscribe(object: &str) -> String {
    format!("sub {object}")
}

pub fn cmd_unsubscribe(object: &str) -> String {
    format!("unsub {object}")
}

pub fn cmd_info() -> String {
    "info".to_string()
}

pub fn cmd_version() -> String {
    "version".to_string()
}

pub fn cmd_antenna_list() -> String {
    "ant list".to_string()
}

pub fn cmd_mic_list() -> String {
    "mic list".to_string()
}

pub fn cmd_slice_list() -> String {
    "slice list".to_string()
}

pub fn cmd_meter_list() -> String {
    "meter list".to_string()
}

pub fn cmd_radio_uptime() -> String {
    "radio uptime".to_string()
}

pub fn cmd_slice_get_error(slice_id: u16) -> String {
    format!("slice get_error {slice_id}")
}

pub fn cmd_keepalive() -> String {
    "keepalive enable".to_string()
}

pub fn cmd_ping() -> String {
    "ping".to_string()
}

// ---------------------------------------------------------------------------
// Radio
// ---------------------------------------------------------------------------

pub fn cmd_radio_callsign(callsign: &str) -> String {
    format!("radio callsign {callsign}")
}

/// Status reports this as `nickname=`.
pub fn cmd_radio_nickname(name: &str) -> String {
    format!("radio name {name}")
}

/// Example output: `"radio set binaural_rx=1"`
pub fn cmd_radio_set(token: &str, value: impl std::fmt::Display) -> String {
    format!("radio set {token}={value}")
}

pub fn cmd_radio_filter_sharpness(mode: &str, level: u8) -> String {
    format!("radio filter_sharpness {mode} level={level}")
}

pub fn cmd_radio_filter_sharpness_auto(mode: &str, auto: bool) -> String {
    format!("radio filter_sharpness {mode} auto_level={}", bool_flag(auto))
}

/// Status reports this as `headphone_gain=` on the radio object.
pub fn cmd_headphone_gain(gain: u8) -> String {
    format!("mixer headphone gain {gain}")
}

pub fn cmd_headphone_mute(mute: bool) -> String {
    format!("mixer headphone mute {}", bool_flag(mute))
}

/// Status reports this as `lineout_gain=` on the radio object.
pub fn cmd_lineout_gain(gain: u8) -> String {
    format!("mixer lineout gain {gain}")
}

pub fn cmd_lineout_mute(mute: bool) -> String {
    format!("mixer lineout mute {}", bool_flag(mute))
}

/// Example output: `"eq apf qfactor=5"`
pub fn cmd_apf(token: &str, value: impl std::fmt::Display) -> String {
    format!("eq apf {token}={value}")
}

/// Key or unkey the transmitter.
pub fn cmd_xmit(on: bool) -> String {
    format!("xmit {}", bool_flag(on))
}

pub fn cmd_remote_audio_rx(on: bool) -> String {
    format!("remote_audio rx_on {}", bool_flag(on))
}

// ---------------------------------------------------------------------------
// Slice
// ---------------------------------------------------------------------------

/// Status reports the frequency as `RF_frequency=`.
///
/// Example output: `"slice tune 0 14.250000"`
pub fn cmd_slice_tune(slice_id: u16, freq_hz: u64) -> String {
    format!("slice tune {} {:.6}", slice_id, hz_to_mhz(freq_hz))
}

/// Example output: `"slice set 0 mode=USB"`
pub fn cmd_slice_set(slice_id: u16, token: &str, value: impl std::fmt::Display) -> String {
    format!("slice set {slice_id} {token}={value}")
}

/// Status reports these as `filter_lo=` / `filter_hi=`.
pub fn cmd_slice_filter(slice_id: u16, low: i32, high: i32) -> String {
    format!("filt {slice_id} {low} {high}")
}

pub fn cmd_slice_lock(slice_id: u16, locked: bool) -> String {
    if locked {
        format!("slice lock {slice_id}")
    } else {
        format!("slice unlock {slice_id}")
    }
}

pub fn cmd_slice_create(freq_hz: u64, antenna: &str, mode: &str) -> String {
    format!(
        "slice create freq={:.6} ant={} mode={}",
        hz_to_mhz(freq_hz),
        antenna,
        mode
    )
}

pub fn cmd_slice_remove(slice_id: u16) -> String {
    format!("slice remove {slice_id}")
}

// ---------------------------------------------------------------------------
// Display: panadapter and waterfall
// ---------------------------------------------------------------------------

/// Example output: `"display pan set 0x40000000 bandwidth=0.200000"`
pub fn cmd_pan_set(stream_id: u32, token: &str, value: impl std::fmt::Display) -> String {
    format!("display pan set {} {}={}", stream(stream_id), token, value)
}

/// Status reports `x_pixels=`; the command uses `xpixels=`.
pub fn cmd_pan_x_pixels(stream_id: u32, pixels: u32) -> String {
    cmd_pan_set(stream_id, "xpixels", pixels)
}

/// Status reports `y_pixels=`; the command uses `ypixels=`.
pub fn cmd_pan_y_pixels(stream_id: u32, pixels: u32) -> String {
    cmd_pan_set(stream_id, "ypixels", pixels)
}

pub fn cmd_pan_create(freq_hz: u64) -> String {
    format!("display panafall create freq={:.6}", hz_to_mhz(freq_hz))
}

pub fn cmd_pan_remove(stream_id: u32) -> String {
    format!("display pan remove {}", stream(stream_id))
}

/// Waterfall properties are set through the panafall object using the
/// waterfall's own stream id.
pub fn cmd_waterfall_set(stream_id: u32, token: &str, value: impl std::fmt::Display) -> String {
    format!("display panafall set {} {}={}", stream(stream_id), token, value)
}

// ---------------------------------------------------------------------------
// Transmit, mic and CW
// ---------------------------------------------------------------------------

/// Example output: `"transmit set rfpower=50"`
pub fn cmd_transmit_set(token: &str, value: impl std::fmt::Display) -> String {
    format!("transmit set {token}={value}")
}

/// Status reports the TX filter as `lo=` / `hi=`.
pub fn cmd_transmit_filter(low: i32, high: i32) -> String {
    format!("transmit set filter_low={low} filter_high={high}")
}

pub fn cmd_transmit_tune(on: bool) -> String {
    format!("transmit tune {}", bool_flag(on))
}

/// Status reports `mic_selection=`; the command is `mic input`.
pub fn cmd_mic_input(input: &str) -> String {
    format!("mic input {input}")
}

/// Status token `mic_boost` / `mic_bias` / `mic_acc` maps to
/// `mic boost` / `mic bias` / `mic acc`.
pub fn cmd_mic(token: &str, on: bool) -> String {
    format!("mic {token} {}", bool_flag(on))
}

/// Status reports the keyer speed as `speed=`.
pub fn cmd_cw_wpm(wpm: u8) -> String {
    format!("cw wpm {wpm}")
}

pub fn cmd_cw_pitch(hz: u16) -> String {
    format!("cw pitch {hz}")
}

/// Status reports `iambic=`.
pub fn cmd_cw_iambic(on: bool) -> String {
    format!("cw iambic {}", bool_flag(on))
}

/// Status reports `iambic_mode=` (0 = A, 1 = B).
pub fn cmd_cw_iambic_mode(mode_b: bool) -> String {
    format!("cw mode {}", bool_flag(mode_b))
}

/// Status reports `swap_paddles=`.
pub fn cmd_cw_swap(on: bool) -> String {
    format!("cw swap {}", bool_flag(on))
}

/// Status reports `sidetone=`.
pub fn cmd_cw_sidetone(on: bool) -> String {
    format!("cw sidetone {}", bool_flag(on))
}

pub fn cmd_cw_break_in(on: bool) -> String {
    format!("cw break_in {}", bool_flag(on))
}

pub fn cmd_cw_break_in_delay(ms: u16) -> String {
    format!("cw break_in_delay {ms}")
}

// ---------------------------------------------------------------------------
// ATU, interlock
// ---------------------------------------------------------------------------

pub fn cmd_atu_start() -> String {
    "atu start".to_string()
}

pub fn cmd_atu_bypass() -> String {
    "atu bypass".to_string()
}

pub fn cmd_atu_clear() -> String {
    "atu clear".to_string()
}

pub fn cmd_atu_memories(enabled: bool) -> String {
    format!("atu set memories_enabled={}", bool_flag(enabled))
}

pub fn cmd_interlock(token: &str, value: impl std::fmt::Display) -> String {
    format!("interlock {token}={value}")
}

// ---------------------------------------------------------------------------
// Equalizer, TNF, memory
// ---------------------------------------------------------------------------

/// Example output: `"eq rxsc 63Hz=5"`
pub fn cmd_eq(eq_id: &str, token: &str, value: impl std::fmt::Display) -> String {
    format!("eq {eq_id} {token}={value}")
}

pub fn cmd_tnf_create(freq_hz: u64) -> String {
    format!("tnf create freq={:.6}", hz_to_mhz(freq_hz))
}

pub fn cmd_tnf_set(tnf_id: u32, token: &str, value: impl std::fmt::Display) -> String {
    format!("tnf set {tnf_id} {token}={value}")
}

/// The reply to this command removes the TNF locally.
pub fn cmd_tnf_remove(tnf_id: u32) -> String {
    format!("tnf remove {tnf_id}")
}

pub fn cmd_memory_create() -> String {
    "memory create".to_string()
}

pub fn cmd_memory_set(memory_id: u32, token: &str, value: impl std::fmt::Display) -> String {
    format!("memory set {memory_id} {token}={value}")
}

pub fn cmd_memory_apply(memory_id: u32) -> String {
    format!("memory apply {memory_id}")
}

pub fn cmd_memory_remove(memory_id: u32) -> String {
    format!("memory remove {memory_id}")
}

// ---------------------------------------------------------------------------
// Streams
// ---------------------------------------------------------------------------

/// Example output: `"stream create type=dax_rx dax_channel=1"`
pub fn cmd_stream_create(kind: &str, dax_channel: Option<u8>) -> String {
    match dax_channel {
        Some(channel) => format!("stream create type={kind} dax_channel={channel}"),
        None => format!("stream create type={kind}"),
    }
}

/// Example output: `"stream remove 0x20000001"`
pub fn cmd_stream_remove(stream_id: u32) -> String {
    format!("stream remove {}", stream(stream_id))
}

pub fn cmd_stream_set(stream_id: u32, token: &str, value: impl std::fmt::Display) -> String {
    format!("stream set {} {}={}", stream(stream_id), token, value)
}

// ---------------------------------------------------------------------------
// Accessories
// ---------------------------------------------------------------------------

pub fn cmd_usb_cable_set(serial: &str, token: &str, value: impl std::fmt::Display) -> String {
    format!("usb_cable set {serial} {token}={value}")
}

pub fn cmd_xvtr_set(xvtr_id: u32, token: &str, value: impl std::fmt::Display) -> String {
    format!("xvtr set {xvtr_id} {token}={value}")
}

pub fn cmd_xvtr_remove(xvtr_id: u32) -> String {
    format!("xvtr remove {xvtr_id}")
}

pub fn cmd_amplifier_set(handle: &str, token: &str, value: impl std::fmt::Display) -> String {
    format!("amplifier set {handle} {token}={value}")
}

/// Example output: `"profile global load \"Contest\""`
pub fn cmd_profile_load(kind: &str, name: &str) -> String {
    format!("profile {kind} load \"{name}\"")
}

pub fn cmd_profile_delete(kind: &str, name: &str) -> String {
    format!("profile {kind} delete \"{name}\"")
}

// ---------------------------------------------------------------------------
// CWX
// ---------------------------------------------------------------------------

/// Spaces inside the quoted text are sent as `\u{7f}`.
pub fn cmd_cwx_send(text: &str) -> String {
    format!("cwx send \"{}\"", text.replace(' ', "\u{7f}"))
}

pub fn cmd_cwx_wpm(wpm: u8) -> String {
    format!("cwx wpm {wpm}")
}

pub fn cmd_cwx_delay(ms: u16) -> String {
    format!("cwx delay {ms}")
}

pub fn cmd_cwx_clear() -> String {
    "cwx clear".to_string()
}

pub fn cmd_cwx_erase(count: u16) -> String {
    format!("cwx erase {count}")
}

pub fn cmd_cwx_macro_save(index: u8, text: &str) -> String {
    format!("cwx macro save {index} \"{}\"", text.replace(' ', "\u{7f}"))
}

pub fn cmd_cwx_macro_send(index: u8) -> String {
    format!("cwx macro send {index}")
}

// ---------------------------------------------------------------------------
// Test support
// ---------------------------------------------------------------------------

#[cfg(test)]
pub(crate) mod testing {
    use super::*;
    use parking_lot::Mutex;

    /// Captures `(sequence, text)` for every command sent.
    #[derive(Debug, Default)]
    pub struct RecordingSink {
        pub sent: Mutex<Vec<(u32, String)>>,
    }

    impl RecordingSink {
        pub fn texts(&self) -> Vec<String> {
            self.sent.lock().iter().map(|(_, t)| t.clone()).collect()
        }
    }

    impl CommandSink for RecordingSink {
        fn send_command(&self, sequence: u32, text: &str) -> Result<()> {
            self.sent.lock().push((sequence, text.to_string()));
            Ok(())
        }
    }

    /// A `Commands` wired to a fresh recording sink.
    pub fn recording_commands() -> (Arc<Commands>, Arc<RecordingSink>) {
        let sink = Arc::new(RecordingSink::default());
        let commands = Arc::new(Commands::new(sink.clone(), Arc::new(ReplyTable::new())));
        (commands, sink)
    }
}

#[cfg(test)]
mod tests {
    use super::testing::*;
    use super::*;
    use flexlib_core::Error;

    struct FailingSink;

    impl CommandSink for FailingSink {
        fn send_command(&self, _sequence: u32, _text: &str) -> Result<()> {
            Err(Error::NotConnected)
        }
    }

    #[test]
    fn sequence_numbers_increase_from_one() {
        let (commands, sink) = recording_commands();
        assert_eq!(commands.send("info"), 1);
        assert_eq!(commands.send("version"), 2);
        assert_eq!(commands.peek_sequence(), 3);
        assert_eq!(
            *sink.sent.lock(),
            vec![(1, "info".to_string()), (2, "version".to_string())]
        );
        assert!(commands.replies().contains(1));
        assert!(commands.replies().contains(2));
    }

    #[test]
    fn failed_send_unregisters() {
        let commands = Commands::new(Arc::new(FailingSink), Arc::new(ReplyTable::new()));
        let seq = commands.send("info");
        assert!(!commands.replies().contains(seq));
    }

    #[test]
    fn token_quirks() {
        assert_eq!(cmd_slice_tune(0, 14_250_000), "slice tune 0 14.250000");
        assert_eq!(cmd_cw_wpm(25), "cw wpm 25");
        assert_eq!(cmd_radio_nickname("Shack"), "radio name Shack");
        assert_eq!(cmd_headphone_gain(40), "mixer headphone gain 40");
        assert_eq!(
            cmd_pan_x_pixels(0x4000_0000, 1024),
            "display pan set 0x40000000 xpixels=1024"
        );
        assert_eq!(
            cmd_transmit_filter(100, 2900),
            "transmit set filter_low=100 filter_high=2900"
        );
        assert_eq!(cmd_mic_input("MIC"), "mic input MIC");
        assert_eq!(cmd_mic("boost", true), "mic boost 1");
        assert_eq!(cmd_cw_iambic_mode(true), "cw mode 1");
    }

    #[test]
    fn misc_builders() {
        assert_eq!(cmd_xmit(true), "xmit 1");
        assert_eq!(cmd_xmit(false), "xmit 0");
        assert_eq!(cmd_atu_start(), "atu start");
        assert_eq!(cmd_atu_memories(false), "atu set memories_enabled=0");
        assert_eq!(cmd_apf("gain", 30), "eq apf gain=30");
        assert_eq!(cmd_eq("rxsc", "63Hz", 5), "eq rxsc 63Hz=5");
        assert_eq!(cmd_stream_remove(0x2000_0001), "stream remove 0x20000001");
        assert_eq!(cmd_tnf_remove(3), "tnf remove 3");
        assert_eq!(cmd_cwx_send("CQ TEST"), "cwx send \"CQ\u{7f}TEST\"");
        assert_eq!(cmd_profile_load("global", "Contest"), "profile global load \"Contest\"");
        assert_eq!(cmd_client_udp_port(4991), "client udpport 4991");
        assert_eq!(cmd_subscribe("slice all"), "sub slice all");
        assert_eq!(cmd_radio_set("binaural_rx", 1), "radio set binaural_rx=1");
    }
}

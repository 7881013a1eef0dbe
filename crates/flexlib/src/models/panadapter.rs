use std::sync::Arc;

use flexlib_core::{Barrier, ClampedBarrier, try_set_field};

use super::{
    DynamicModel, StreamModel, StreamStatus, invalid_value, parse_hex, parse_mhz, store,
    store_with, unknown_token,
};
use crate::commands::{self, Commands};
use crate::events::{ObjectKind, ObjectRef};
use crate::keyvalue::KeyValue;
use crate::vita::{PanadapterFrame, VitaPacket, WaterfallLine};

wire_tokens! {
    enum PanadapterToken {
        XPixels => "x_pixels",
        YPixels => "y_pixels",
        Center => "center",
        Bandwidth => "bandwidth",
        MinBandwidth => "min_bw",
        MaxBandwidth => "max_bw",
        MinDbm => "min_dbm",
        MaxDbm => "max_dbm",
        Fps => "fps",
        Average => "average",
        WeightedAverage => "weighted_average",
        RfGain => "rfgain",
        RfGainLow => "rf_gain_low",
        RfGainHigh => "rf_gain_high",
        RfGainStep => "rf_gain_step",
        RfGainMarkers => "rf_gain_markers",
        RxAnt => "rxant",
        AntList => "ant_list",
        Wide => "wide",
        LoopA => "loopa",
        LoopB => "loopb",
        Band => "band",
        BandZoom => "band_zoom",
        SegmentZoom => "segment_zoom",
        DaxIqChannel => "daxiq_channel" | "daxiq",
        DaxIqRate => "daxiq_rate",
        Waterfall => "waterfall",
        Xvtr => "xvtr",
        Preamp => "pre",
        ClientHandle => "client_handle",
        NbLevel => "nb_level",
        NbUpdating => "nb_updating",
        Nb => "nb",
        NoiseFloorPosition => "noise_floor_position",
        NoiseFloorPositionEnable => "noise_floor_position_enable",
    }
}

/// Properties of one panadapter.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct PanadapterState {
    pub x_pixels: u32,
    pub y_pixels: u32,
    /// Center frequency in Hz.
    pub center: u64,
    /// Displayed bandwidth in Hz.
    pub bandwidth: u64,
    pub min_bandwidth: u64,
    pub max_bandwidth: u64,
    pub min_dbm: f64,
    pub max_dbm: f64,
    pub fps: u32,
    pub average: u32,
    pub weighted_average: bool,
    pub rf_gain: i32,
    pub rf_gain_low: i32,
    pub rf_gain_high: i32,
    pub rf_gain_step: i32,
    pub rf_gain_markers: Vec<String>,
    pub rx_ant: String,
    pub ant_list: Vec<String>,
    pub wide: bool,
    pub loop_a: bool,
    pub loop_b: bool,
    pub band: String,
    pub band_zoom: bool,
    pub segment_zoom: bool,
    pub daxiq_channel: u8,
    pub daxiq_rate: u32,
    /// Stream id of the paired waterfall.
    pub waterfall_id: u32,
    pub xvtr: String,
    pub preamp: String,
    pub client_handle: u32,
    pub nb: bool,
    pub nb_level: u8,
    pub nb_updating: bool,
    pub noise_floor_position: u32,
    pub noise_floor_position_enable: bool,
}

/// A panadapter display stream.
#[derive(Debug)]
pub struct Panadapter {
    id: u32,
    commands: Arc<Commands>,
    state: Barrier<PanadapterState>,
    last_frame: Barrier<Option<PanadapterFrame>>,
    stream: StreamStatus,
}

impl Panadapter {
    pub fn state(&self) -> PanadapterState {
        self.state.get()
    }

    pub fn waterfall_id(&self) -> u32 {
        self.state.with(|s| s.waterfall_id)
    }

    /// The most recent FFT frame received over UDP.
    pub fn last_frame(&self) -> Option<PanadapterFrame> {
        self.last_frame.get()
    }

    pub fn set_center(&self, hz: u64) {
        if try_set_field(&self.state, |s| &mut s.center, hz) {
            self.commands.send(commands::cmd_pan_set(
                self.id,
                "center",
                format!("{:.6}", flexlib_core::hz_to_mhz(hz)),
            ));
        }
    }

    pub fn set_bandwidth(&self, hz: u64) {
        if try_set_field(&self.state, |s| &mut s.bandwidth, hz) {
            self.commands.send(commands::cmd_pan_set(
                self.id,
                "bandwidth",
                format!("{:.6}", flexlib_core::hz_to_mhz(hz)),
            ));
        }
    }

    pub fn set_x_pixels(&self, pixels: u32) {
        if try_set_field(&self.state, |s| &mut s.x_pixels, pixels) {
            self.commands.send(commands::cmd_pan_x_pixels(self.id, pixels));
        }
    }

    pub fn set_y_pixels(&self, pixels: u32) {
        if try_set_field(&self.state, |s| &mut s.y_pixels, pixels) {
            self.commands.send(commands::cmd_pan_y_pixels(self.id, pixels));
        }
    }

    pub fn set_fps(&self, fps: u32) {
        if try_set_field(&self.state, |s| &mut s.fps, fps) {
            self.commands.send(commands::cmd_pan_set(self.id, "fps", fps));
        }
    }

    pub fn set_rx_antenna(&self, antenna: &str) {
        if try_set_field(&self.state, |s| &mut s.rx_ant, antenna.to_string()) {
            self.commands.send(commands::cmd_pan_set(self.id, "rxant", antenna));
        }
    }

    pub fn remove(&self) {
        self.commands.send(commands::cmd_pan_remove(self.id));
    }
}

impl DynamicModel for Panadapter {
    type Id = u32;

    const KIND: ObjectKind = ObjectKind::Panadapter;

    fn new(id: u32, commands: Arc<Commands>) -> Self {
        Panadapter {
            id,
            commands,
            state: Barrier::new(PanadapterState::default()),
            last_frame: Barrier::new(None),
            stream: StreamStatus::default(),
        }
    }

    fn id(&self) -> &u32 {
        &self.id
    }

    fn parse_id(raw: &str) -> Option<u32> {
        parse_hex(raw)
    }

    fn parse_properties(&self, properties: &[KeyValue]) {
        let st = &self.state;
        let k = Self::KIND;
        for kv in properties {
            match PanadapterToken::parse(&kv.key) {
                PanadapterToken::XPixels => store(st, k, kv, |s| &mut s.x_pixels),
                PanadapterToken::YPixels => store(st, k, kv, |s| &mut s.y_pixels),
                PanadapterToken::Center => store_with(st, k, kv, parse_mhz, |s| &mut s.center),
                PanadapterToken::Bandwidth => store_with(st, k, kv, parse_mhz, |s| &mut s.bandwidth),
                PanadapterToken::MinBandwidth => {
                    store_with(st, k, kv, parse_mhz, |s| &mut s.min_bandwidth)
                }
                PanadapterToken::MaxBandwidth => {
                    store_with(st, k, kv, parse_mhz, |s| &mut s.max_bandwidth)
                }
                PanadapterToken::MinDbm => store(st, k, kv, |s| &mut s.min_dbm),
                PanadapterToken::MaxDbm => store(st, k, kv, |s| &mut s.max_dbm),
                PanadapterToken::Fps => store(st, k, kv, |s| &mut s.fps),
                PanadapterToken::Average => store(st, k, kv, |s| &mut s.average),
                PanadapterToken::WeightedAverage => store(st, k, kv, |s| &mut s.weighted_average),
                PanadapterToken::RfGain => store(st, k, kv, |s| &mut s.rf_gain),
                PanadapterToken::RfGainLow => store(st, k, kv, |s| &mut s.rf_gain_low),
                PanadapterToken::RfGainHigh => store(st, k, kv, |s| &mut s.rf_gain_high),
                PanadapterToken::RfGainStep => store(st, k, kv, |s| &mut s.rf_gain_step),
                PanadapterToken::RfGainMarkers => store(st, k, kv, |s| &mut s.rf_gain_markers),
                PanadapterToken::RxAnt => store(st, k, kv, |s| &mut s.rx_ant),
                PanadapterToken::AntList => store(st, k, kv, |s| &mut s.ant_list),
                PanadapterToken::Wide => store(st, k, kv, |s| &mut s.wide),
                PanadapterToken::LoopA => store(st, k, kv, |s| &mut s.loop_a),
                PanadapterToken::LoopB => store(st, k, kv, |s| &mut s.loop_b),
                PanadapterToken::Band => store(st, k, kv, |s| &mut s.band),
                PanadapterToken::BandZoom => store(st, k, kv, |s| &mut s.band_zoom),
                PanadapterToken::SegmentZoom => store(st, k, kv, |s| &mut s.segment_zoom),
                PanadapterToken::DaxIqChannel => store(st, k, kv, |s| &mut s.daxiq_channel),
                PanadapterToken::DaxIqRate => store(st, k, kv, |s| &mut s.daxiq_rate),
                PanadapterToken::Waterfall => store_with(st, k, kv, parse_hex, |s| &mut s.waterfall_id),
                PanadapterToken::Xvtr => store(st, k, kv, |s| &mut s.xvtr),
                PanadapterToken::Preamp => store(st, k, kv, |s| &mut s.preamp),
                PanadapterToken::ClientHandle => {
                    store_with(st, k, kv, parse_hex, |s| &mut s.client_handle)
                }
                PanadapterToken::Nb => store(st, k, kv, |s| &mut s.nb),
                PanadapterToken::NbLevel => store(st, k, kv, |s| &mut s.nb_level),
                PanadapterToken::NbUpdating => store(st, k, kv, |s| &mut s.nb_updating),
                PanadapterToken::NoiseFloorPosition => {
                    store(st, k, kv, |s| &mut s.noise_floor_position)
                }
                PanadapterToken::NoiseFloorPositionEnable => {
                    store(st, k, kv, |s| &mut s.noise_floor_position_enable)
                }
                PanadapterToken::Unknown(_) => unknown_token(k, kv),
            }
        }
    }

    fn into_ref(this: Arc<Self>) -> ObjectRef {
        ObjectRef::Panadapter(this)
    }
}

impl StreamModel for Panadapter {
    fn stream_id(&self) -> u32 {
        self.id
    }

    fn stream_status(&self) -> &StreamStatus {
        &self.stream
    }

    fn process_packet(&self, packet: &VitaPacket) {
        match PanadapterFrame::parse(&packet.payload) {
            Ok(frame) => self.last_frame.set(Some(frame)),
            Err(e) => tracing::warn!(
                stream_id = format!("0x{:08X}", self.id),
                error = %e,
                "dropping panadapter packet"
            ),
        }
    }
}

// ---------------------------------------------------------------------------
// Waterfall
// ---------------------------------------------------------------------------

wire_tokens! {
    enum WaterfallToken {
        Panadapter => "panadapter",
        AutoBlack => "auto_black",
        BlackLevel => "black_level",
        ColorGain => "color_gain",
        GradientIndex => "gradient_index",
        LineDuration => "line_duration",
        ClientHandle => "client_handle",
        XPixels => "x_pixels",
        Center => "center",
        Bandwidth => "bandwidth",
        Band => "band",
        Wide => "wide",
        RxAnt => "rxant",
        RfGain => "rfgain",
        DaxIq => "daxiq" | "daxiq_channel",
        DaxIqRate => "daxiq_rate",
        LoopA => "loopa",
        LoopB => "loopb",
        Xvtr => "xvtr",
        Capacity => "capacity",
        Available => "available",
    }
}

/// Properties of one waterfall.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct WaterfallState {
    /// Stream id of the paired panadapter.
    pub panadapter_id: u32,
    pub auto_black: bool,
    pub gradient_index: u32,
    pub line_duration: u32,
    pub client_handle: u32,
    pub x_pixels: u32,
    pub center: u64,
    pub bandwidth: u64,
    pub band: String,
    pub wide: bool,
    pub rx_ant: String,
    pub rf_gain: i32,
    pub daxiq_channel: u8,
    pub daxiq_rate: u32,
    pub loop_a: bool,
    pub loop_b: bool,
    pub xvtr: String,
    pub capacity: u32,
    pub available: u32,
}

/// A waterfall display stream, always paired with a panadapter.
#[derive(Debug)]
pub struct Waterfall {
    id: u32,
    commands: Arc<Commands>,
    state: Barrier<WaterfallState>,
    black_level: ClampedBarrier<u8>,
    color_gain: ClampedBarrier<u8>,
    last_line: Barrier<Option<WaterfallLine>>,
    stream: StreamStatus,
}

impl Waterfall {
    pub fn state(&self) -> WaterfallState {
        self.state.get()
    }

    pub fn panadapter_id(&self) -> u32 {
        self.state.with(|s| s.panadapter_id)
    }

    pub fn black_level(&self) -> u8 {
        self.black_level.get()
    }

    pub fn color_gain(&self) -> u8 {
        self.color_gain.get()
    }

    /// The most recent line received over UDP.
    pub fn last_line(&self) -> Option<WaterfallLine> {
        self.last_line.get()
    }

    pub fn set_auto_black(&self, on: bool) {
        if try_set_field(&self.state, |s| &mut s.auto_black, on) {
            self.commands.send(commands::cmd_waterfall_set(
                self.id,
                "auto_black",
                flexlib_core::bool_flag(on),
            ));
        }
    }

    /// Clamped to 0..=100.
    pub fn set_black_level(&self, level: u8) {
        if let Some(level) = self.black_level.try_set(level) {
            self.commands
                .send(commands::cmd_waterfall_set(self.id, "black_level", level));
        }
    }

    /// Clamped to 0..=100.
    pub fn set_color_gain(&self, gain: u8) {
        if let Some(gain) = self.color_gain.try_set(gain) {
            self.commands
                .send(commands::cmd_waterfall_set(self.id, "color_gain", gain));
        }
    }

    pub fn set_gradient_index(&self, index: u32) {
        if try_set_field(&self.state, |s| &mut s.gradient_index, index) {
            self.commands
                .send(commands::cmd_waterfall_set(self.id, "gradient_index", index));
        }
    }

    pub fn set_line_duration(&self, ms: u32) {
        if try_set_field(&self.state, |s| &mut s.line_duration, ms) {
            self.commands
                .send(commands::cmd_waterfall_set(self.id, "line_duration", ms));
        }
    }
}

impl DynamicModel for Waterfall {
    type Id = u32;

    const KIND: ObjectKind = ObjectKind::Waterfall;

    fn new(id: u32, commands: Arc<Commands>) -> Self {
        Waterfall {
            id,
            commands,
            state: Barrier::new(WaterfallState::default()),
            black_level: ClampedBarrier::new(0, 0..=100),
            color_gain: ClampedBarrier::new(50, 0..=100),
            last_line: Barrier::new(None),
            stream: StreamStatus::default(),
        }
    }

    fn id(&self) -> &u32 {
        &self.id
    }

    fn parse_id(raw: &str) -> Option<u32> {
        parse_hex(raw)
    }

    fn parse_properties(&self, properties: &[KeyValue]) {
        let st = &self.state;
        let k = Self::KIND;
        for kv in properties {
            match WaterfallToken::parse(&kv.key) {
                WaterfallToken::Panadapter => {
                    store_with(st, k, kv, parse_hex, |s| &mut s.panadapter_id)
                }
                WaterfallToken::AutoBlack => store(st, k, kv, |s| &mut s.auto_black),
                WaterfallToken::BlackLevel => match kv.value.parse::<u8>() {
                    Ok(v) => self.black_level.set(v),
                    Err(_) => invalid_value(k, kv),
                },
                WaterfallToken::ColorGain => match kv.value.parse::<u8>() {
                    Ok(v) => self.color_gain.set(v),
                    Err(_) => invalid_value(k, kv),
                },
                WaterfallToken::GradientIndex => store(st, k, kv, |s| &mut s.gradient_index),
                WaterfallToken::LineDuration => store(st, k, kv, |s| &mut s.line_duration),
                WaterfallToken::ClientHandle => {
                    store_with(st, k, kv, parse_hex, |s| &mut s.client_handle)
                }
                WaterfallToken::XPixels => store(st, k, kv, |s| &mut s.x_pixels),
                WaterfallToken::Center => store_with(st, k, kv, parse_mhz, |s| &mut s.center),
                WaterfallToken::Bandwidth => store_with(st, k, kv, parse_mhz, |s| &mut s.bandwidth),
                WaterfallToken::Band => store(st, k, kv, |s| &mut s.band),
                WaterfallToken::Wide => store(st, k, kv, |s| &mut s.wide),
                WaterfallToken::RxAnt => store(st, k, kv, |s| &mut s.rx_ant),
                WaterfallToken::RfGain => store(st, k, kv, |s| &mut s.rf_gain),
                WaterfallToken::DaxIq => store(st, k, kv, |s| &mut s.daxiq_channel),
                WaterfallToken::DaxIqRate => store(st, k, kv, |s| &mut s.daxiq_rate),
                WaterfallToken::LoopA => store(st, k, kv, |s| &mut s.loop_a),
                WaterfallToken::LoopB => store(st, k, kv, |s| &mut s.loop_b),
                WaterfallToken::Xvtr => store(st, k, kv, |s| &mut s.xvtr),
                WaterfallToken::Capacity => store(st, k, kv, |s| &mut s.capacity),
                WaterfallToken::Available => store(st, k, kv, |s| &mut s.available),
                WaterfallToken::Unknown(_) => unknown_token(k, kv),
            }
        }
    }

    fn into_ref(this: Arc<Self>) -> ObjectRef {
        ObjectRef::Waterfall(this)
    }
}

impl StreamModel for Waterfall {
    fn stream_id(&self) -> u32 {
        self.id
    }

    fn stream_status(&self) -> &StreamStatus {
        &self.stream
    }

    fn process_packet(&self, packet: &VitaPacket) {
        match WaterfallLine::parse(&packet.payload) {
            Ok(line) => self.last_line.set(Some(line)),
            Err(e) => tracing::warn!(
                stream_id = format!("0x{:08X}", self.id),
                error = %e,
                "dropping waterfall packet"
            ),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::commands::testing::recording_commands;
    use crate::keyvalue::key_values;

    #[test]
    fn parse_pan_status() {
        let (commands, _) = recording_commands();
        let pan = Panadapter::new(0x4000_0000, commands);
        pan.parse_properties(&key_values(
            "wnb=0 x_pixels=1024 y_pixels=700 center=14.100000 bandwidth=0.200000 \
             min_dbm=-135.0 max_dbm=-40.0 waterfall=0x42000000 ant_list=ANT1,ANT2",
        ));
        let s = pan.state();
        assert_eq!(s.x_pixels, 1024);
        assert_eq!(s.center, 14_100_000);
        assert_eq!(s.bandwidth, 200_000);
        assert_eq!(s.min_dbm, -135.0);
        assert_eq!(pan.waterfall_id(), 0x4200_0000);
    }

    #[test]
    fn pan_setters_use_command_tokens() {
        let (commands, sink) = recording_commands();
        let pan = Panadapter::new(0x4000_0000, commands);
        pan.set_x_pixels(800);
        pan.set_bandwidth(100_000);
        pan.set_bandwidth(100_000);
        assert_eq!(
            sink.texts(),
            vec![
                "display pan set 0x40000000 xpixels=800",
                "display pan set 0x40000000 bandwidth=0.100000",
            ]
        );
    }

    #[test]
    fn waterfall_clamps_and_routes_through_panafall() {
        let (commands, sink) = recording_commands();
        let wf = Waterfall::new(0x4200_0000, commands);
        wf.parse_properties(&key_values("panadapter=0x40000000 black_level=250 color_gain=40"));
        assert_eq!(wf.panadapter_id(), 0x4000_0000);
        assert_eq!(wf.black_level(), 100);
        assert_eq!(wf.color_gain(), 40);
        wf.set_color_gain(60);
        wf.set_auto_black(true);
        assert_eq!(
            sink.texts(),
            vec![
                "display panafall set 0x42000000 color_gain=60",
                "display panafall set 0x42000000 auto_black=1",
            ]
        );
    }

    #[test]
    fn pan_keeps_last_frame() {
        let (commands, _) = recording_commands();
        let pan = Panadapter::new(0x4000_0000, commands);
        let mut payload = vec![0, 0, 0, 1, 0, 2, 0, 1, 0, 0, 0, 5];
        payload.extend_from_slice(&42u16.to_be_bytes());
        let packet = VitaPacket::flex(crate::vita::ClassCode::Panadapter, 0x4000_0000, payload);
        pan.process_packet(&packet);
        let frame = pan.last_frame().unwrap();
        assert_eq!(frame.frame_index, 5);
        assert_eq!(frame.bins, vec![42]);
    }
}

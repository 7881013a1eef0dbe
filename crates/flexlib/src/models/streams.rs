//! DAX audio, DAX IQ and Opus stream objects.
//!
//! These are created by `stream` status lines (or the older per-kind
//! categories such as `audio_stream`) and receive UDP packets keyed by
//! their stream id.

use std::sync::Arc;

use flexlib_core::{Barrier, ClampedBarrier};

use super::{
    DynamicModel, StreamModel, StreamStatus, invalid_value, parse_hex, store, store_with,
    unknown_token,
};
use crate::commands::{self, Commands};
use crate::events::{ObjectKind, ObjectRef};
use crate::keyvalue::KeyValue;
use crate::vita::{
    ClassCode, StereoSample, VitaPacket, parse_audio_payload, parse_reduced_bw_payload,
};

wire_tokens! {
    enum AudioStreamToken {
        InUse => "in_use",
        Type => "type",
        DaxChannel => "dax_channel" | "dax",
        Slice => "slice",
        ClientHandle => "client_handle",
        Ip => "ip",
        Port => "port",
        Gain => "gain" | "tx_gain",
        Active => "active",
        DaxClients => "dax_clients",
    }
}

/// Properties shared by DAX receive, mic and transmit audio streams.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct AudioStreamState {
    pub in_use: bool,
    /// Wire stream type, e.g. `dax_rx`, `dax_mic`, `dax_tx`.
    pub stream_type: String,
    pub dax_channel: u8,
    pub slice: Option<u16>,
    pub client_handle: u32,
    pub ip: String,
    pub port: u16,
    pub active: bool,
    pub dax_clients: u8,
}

fn parse_slice_ref(raw: &str) -> Option<Option<u16>> {
    match raw.trim() {
        "" | "-1" => Some(None),
        v => v.parse().ok().map(Some),
    }
}

/// Decode the samples of one audio packet.
fn decode_samples(packet: &VitaPacket) -> flexlib_core::Result<Vec<StereoSample>> {
    match packet.class_code() {
        Some(ClassCode::DaxReducedBw) => parse_reduced_bw_payload(&packet.payload),
        _ => parse_audio_payload(&packet.payload),
    }
}

macro_rules! audio_stream_model {
    ($(#[$meta:meta])* $name:ident, $kind:expr, $variant:ident) => {
        $(#[$meta])*
        #[derive(Debug)]
        pub struct $name {
            id: u32,
            commands: Arc<Commands>,
            state: Barrier<AudioStreamState>,
            gain: ClampedBarrier<u8>,
            last_samples: Barrier<Vec<StereoSample>>,
            stream: StreamStatus,
        }

        impl $name {
            pub fn state(&self) -> AudioStreamState {
                self.state.get()
            }

            pub fn gain(&self) -> u8 {
                self.gain.get()
            }

            /// Samples from the most recent packet.
            pub fn last_samples(&self) -> Vec<StereoSample> {
                self.last_samples.get()
            }

            /// Clamped to 0..=100.
            pub fn set_gain(&self, gain: u8) {
                if let Some(gain) = self.gain.try_set(gain) {
                    self.commands
                        .send(commands::cmd_stream_set(self.id, "gain", gain));
                }
            }

            pub fn remove(&self) {
                self.commands.send(commands::cmd_stream_remove(self.id));
            }
        }

        impl DynamicModel for $name {
            type Id = u32;

            const KIND: ObjectKind = $kind;

            fn new(id: u32, commands: Arc<Commands>) -> Self {
                $name {
                    id,
                    commands,
                    state: Barrier::new(AudioStreamState::default()),
                    gain: ClampedBarrier::new(50, 0..=100),
                    last_samples: Barrier::new(Vec::new()),
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
                    match AudioStreamToken::parse(&kv.key) {
                        AudioStreamToken::InUse => store(st, k, kv, |s| &mut s.in_use),
                        AudioStreamToken::Type => store(st, k, kv, |s| &mut s.stream_type),
                        AudioStreamToken::DaxChannel => store(st, k, kv, |s| &mut s.dax_channel),
                        AudioStreamToken::Slice => {
                            store_with(st, k, kv, parse_slice_ref, |s| &mut s.slice)
                        }
                        AudioStreamToken::ClientHandle => {
                            store_with(st, k, kv, parse_hex, |s| &mut s.client_handle)
                        }
                        AudioStreamToken::Ip => store(st, k, kv, |s| &mut s.ip),
                        AudioStreamToken::Port => store(st, k, kv, |s| &mut s.port),
                        AudioStreamToken::Gain => match kv.value.parse::<u8>() {
                            Ok(v) => self.gain.set(v),
                            Err(_) => invalid_value(k, kv),
                        },
                        AudioStreamToken::Active => store(st, k, kv, |s| &mut s.active),
                        AudioStreamToken::DaxClients => store(st, k, kv, |s| &mut s.dax_clients),
                        AudioStreamToken::Unknown(_) => unknown_token(k, kv),
                    }
                }
            }

            fn into_ref(this: Arc<Self>) -> ObjectRef {
                ObjectRef::$variant(this)
            }
        }

        impl StreamModel for $name {
            fn stream_id(&self) -> u32 {
                self.id
            }

            fn stream_status(&self) -> &StreamStatus {
                &self.stream
            }

            fn process_packet(&self, packet: &VitaPacket) {
                match decode_samples(packet) {
                    Ok(samples) => self.last_samples.set(samples),
                    Err(e) => tracing::warn!(
                        object = Self::KIND.as_str(),
                        stream_id = format!("0x{:08X}", self.id),
                        error = %e,
                        "dropping audio packet"
                    ),
                }
            }
        }
    };
}

audio_stream_model!(
    /// DAX receive audio (`type=dax_rx`).
    AudioStream,
    ObjectKind::AudioStream,
    AudioStream
);

audio_stream_model!(
    /// DAX microphone audio (`type=dax_mic`).
    MicAudioStream,
    ObjectKind::MicAudioStream,
    MicAudioStream
);

audio_stream_model!(
    /// DAX transmit audio (`type=dax_tx`). Packets flow from client to radio.
    TxAudioStream,
    ObjectKind::TxAudioStream,
    TxAudioStream
);

// ---------------------------------------------------------------------------
// DAX IQ
// ---------------------------------------------------------------------------

wire_tokens! {
    enum IqStreamToken {
        InUse => "in_use",
        Type => "type",
        DaxIqChannel => "daxiq_channel" | "daxiq",
        Panadapter => "pan",
        Rate => "daxiq_rate" | "rate",
        Ip => "ip",
        Port => "port",
        ClientHandle => "client_handle",
        Active => "active",
        Capacity => "capacity",
        Available => "available",
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct IqStreamState {
    pub in_use: bool,
    pub stream_type: String,
    pub daxiq_channel: u8,
    /// Stream id of the panadapter the IQ is taken from.
    pub panadapter_id: u32,
    /// Sample rate in samples per second.
    pub rate: u32,
    pub ip: String,
    pub port: u16,
    pub client_handle: u32,
    pub active: bool,
    pub capacity: u32,
    pub available: u32,
}

/// A DAX IQ stream (`type=dax_iq`).
#[derive(Debug)]
pub struct IqStream {
    id: u32,
    commands: Arc<Commands>,
    state: Barrier<IqStreamState>,
    last_samples: Barrier<Vec<StereoSample>>,
    stream: StreamStatus,
}

impl IqStream {
    pub fn state(&self) -> IqStreamState {
        self.state.get()
    }

    /// I/Q pairs from the most recent packet (I in `left`, Q in `right`).
    pub fn last_samples(&self) -> Vec<StereoSample> {
        self.last_samples.get()
    }

    pub fn set_rate(&self, rate: u32) {
        if flexlib_core::try_set_field(&self.state, |s| &mut s.rate, rate) {
            self.commands
                .send(commands::cmd_stream_set(self.id, "daxiq_rate", rate));
        }
    }

    pub fn remove(&self) {
        self.commands.send(commands::cmd_stream_remove(self.id));
    }
}

impl DynamicModel for IqStream {
    type Id = u32;

    const KIND: ObjectKind = ObjectKind::IqStream;

    fn new(id: u32, commands: Arc<Commands>) -> Self {
        IqStream {
            id,
            commands,
            state: Barrier::new(IqStreamState::default()),
            last_samples: Barrier::new(Vec::new()),
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
            match IqStreamToken::parse(&kv.key) {
                IqStreamToken::InUse => store(st, k, kv, |s| &mut s.in_use),
                IqStreamToken::Type => store(st, k, kv, |s| &mut s.stream_type),
                IqStreamToken::DaxIqChannel => store(st, k, kv, |s| &mut s.daxiq_channel),
                IqStreamToken::Panadapter => store_with(st, k, kv, parse_hex, |s| &mut s.panadapter_id),
                IqStreamToken::Rate => store(st, k, kv, |s| &mut s.rate),
                IqStreamToken::Ip => store(st, k, kv, |s| &mut s.ip),
                IqStreamToken::Port => store(st, k, kv, |s| &mut s.port),
                IqStreamToken::ClientHandle => {
                    store_with(st, k, kv, parse_hex, |s| &mut s.client_handle)
                }
                IqStreamToken::Active => store(st, k, kv, |s| &mut s.active),
                IqStreamToken::Capacity => store(st, k, kv, |s| &mut s.capacity),
                IqStreamToken::Available => store(st, k, kv, |s| &mut s.available),
                IqStreamToken::Unknown(_) => unknown_token(k, kv),
            }
        }
    }

    fn into_ref(this: Arc<Self>) -> ObjectRef {
        ObjectRef::IqStream(this)
    }
}

impl StreamModel for IqStream {
    fn stream_id(&self) -> u32 {
        self.id
    }

    fn stream_status(&self) -> &StreamStatus {
        &self.stream
    }

    fn process_packet(&self, packet: &VitaPacket) {
        if let Some(rate) = packet.class_code().and_then(ClassCode::iq_rate) {
            self.state.update(|s| s.rate = rate);
        }
        match parse_audio_payload(&packet.payload) {
            Ok(samples) => self.last_samples.set(samples),
            Err(e) => tracing::warn!(
                stream_id = format!("0x{:08X}", self.id),
                error = %e,
                "dropping IQ packet"
            ),
        }
    }
}

// ---------------------------------------------------------------------------
// Opus
// ---------------------------------------------------------------------------

wire_tokens! {
    enum OpusStreamToken {
        InUse => "in_use",
        Type => "type",
        Ip => "ip",
        Port => "port",
        ClientHandle => "client_handle",
        RxOn => "rx_on" | "opus_rx_stream_stopped",
        TxOn => "tx_on",
        Compression => "compression",
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct OpusStreamState {
    pub in_use: bool,
    pub stream_type: String,
    pub ip: String,
    pub port: u16,
    pub client_handle: u32,
    pub rx_on: bool,
    pub tx_on: bool,
    pub compression: String,
}

/// Compressed remote audio (`type=remote_audio_rx`).
#[derive(Debug)]
pub struct OpusStream {
    id: u32,
    commands: Arc<Commands>,
    state: Barrier<OpusStreamState>,
    last_frame: Barrier<Vec<u8>>,
    stream: StreamStatus,
}

impl OpusStream {
    pub fn state(&self) -> OpusStreamState {
        self.state.get()
    }

    /// The most recent Opus frame, undecoded.
    pub fn last_frame(&self) -> Vec<u8> {
        self.last_frame.get()
    }

    pub fn set_rx_on(&self, on: bool) {
        if flexlib_core::try_set_field(&self.state, |s| &mut s.rx_on, on) {
            self.commands.send(commands::cmd_remote_audio_rx(on));
        }
    }

    pub fn remove(&self) {
        self.commands.send(commands::cmd_stream_remove(self.id));
    }
}

impl DynamicModel for OpusStream {
    type Id = u32;

    const KIND: ObjectKind = ObjectKind::OpusStream;

    fn new(id: u32, commands: Arc<Commands>) -> Self {
        OpusStream {
            id,
            commands,
            state: Barrier::new(OpusStreamState::default()),
            last_frame: Barrier::new(Vec::new()),
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
            match OpusStreamToken::parse(&kv.key) {
                OpusStreamToken::InUse => store(st, k, kv, |s| &mut s.in_use),
                OpusStreamToken::Type => store(st, k, kv, |s| &mut s.stream_type),
                OpusStreamToken::Ip => store(st, k, kv, |s| &mut s.ip),
                OpusStreamToken::Port => store(st, k, kv, |s| &mut s.port),
                OpusStreamToken::ClientHandle => {
                    store_with(st, k, kv, parse_hex, |s| &mut s.client_handle)
                }
                OpusStreamToken::RxOn => store(st, k, kv, |s| &mut s.rx_on),
                OpusStreamToken::TxOn => store(st, k, kv, |s| &mut s.tx_on),
                OpusStreamToken::Compression => store(st, k, kv, |s| &mut s.compression),
                OpusStreamToken::Unknown(_) => unknown_token(k, kv),
            }
        }
    }

    fn into_ref(this: Arc<Self>) -> ObjectRef {
        ObjectRef::OpusStream(this)
    }
}

impl StreamModel for OpusStream {
    fn stream_id(&self) -> u32 {
        self.id
    }

    fn stream_status(&self) -> &StreamStatus {
        &self.stream
    }

    fn process_packet(&self, packet: &VitaPacket) {
        self.last_frame.set(packet.payload.clone());
    }
}

//! Session event types.
//!
//! Events are emitted through a [`tokio::sync::broadcast`] channel owned by
//! [`crate::radio::Radio`]. Delivery is best-effort; a slow subscriber may
//! miss events while meters and panadapters are busy.

use std::sync::Arc;

use crate::codec::Severity;
use crate::discovery::GuiClient;
use crate::models::{
    Amplifier, Atu, AudioStream, Cwx, Equalizer, Gps, Interlock, IqStream, Memory, Meter,
    MicAudioStream, OpusStream, Panadapter, Profile, Slice, Tnf, Transmit, TxAudioStream,
    UsbCable, Waterfall, Waveform, Wan, Xvtr,
};

/// The kinds of object a session tracks.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ObjectKind {
    Radio,
    Slice,
    Panadapter,
    Waterfall,
    Meter,
    Memory,
    Equalizer,
    Tnf,
    AudioStream,
    MicAudioStream,
    TxAudioStream,
    IqStream,
    OpusStream,
    UsbCable,
    Xvtr,
    Amplifier,
    Profile,
    Atu,
    Gps,
    Interlock,
    Transmit,
    Wan,
    Waveform,
    Cwx,
}

impl ObjectKind {
    pub fn as_str(self) -> &'static str {
        match self {
            ObjectKind::Radio => "radio",
            ObjectKind::Slice => "slice",
            ObjectKind::Panadapter => "panadapter",
            ObjectKind::Waterfall => "waterfall",
            ObjectKind::Meter => "meter",
            ObjectKind::Memory => "memory",
            ObjectKind::Equalizer => "equalizer",
            ObjectKind::Tnf => "tnf",
            ObjectKind::AudioStream => "audio_stream",
            ObjectKind::MicAudioStream => "mic_audio_stream",
            ObjectKind::TxAudioStream => "tx_audio_stream",
            ObjectKind::IqStream => "iq_stream",
            ObjectKind::OpusStream => "opus_stream",
            ObjectKind::UsbCable => "usb_cable",
            ObjectKind::Xvtr => "xvtr",
            ObjectKind::Amplifier => "amplifier",
            ObjectKind::Profile => "profile",
            ObjectKind::Atu => "atu",
            ObjectKind::Gps => "gps",
            ObjectKind::Interlock => "interlock",
            ObjectKind::Transmit => "transmit",
            ObjectKind::Wan => "wan",
            ObjectKind::Waveform => "waveform",
            ObjectKind::Cwx => "cwx",
        }
    }
}

impl std::fmt::Display for ObjectKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A shared handle to a tracked object.
///
/// Removal events carry the object itself, so a subscriber can still read
/// its final state after it has left the registry.
#[derive(Debug, Clone)]
pub enum ObjectRef {
    Slice(Arc<Slice>),
    Panadapter(Arc<Panadapter>),
    Waterfall(Arc<Waterfall>),
    Meter(Arc<Meter>),
    Memory(Arc<Memory>),
    Equalizer(Arc<Equalizer>),
    Tnf(Arc<Tnf>),
    AudioStream(Arc<AudioStream>),
    MicAudioStream(Arc<MicAudioStream>),
    TxAudioStream(Arc<TxAudioStream>),
    IqStream(Arc<IqStream>),
    OpusStream(Arc<OpusStream>),
    UsbCable(Arc<UsbCable>),
    Xvtr(Arc<Xvtr>),
    Amplifier(Arc<Amplifier>),
    Profile(Arc<Profile>),
    Atu(Arc<Atu>),
    Gps(Arc<Gps>),
    Interlock(Arc<Interlock>),
    Transmit(Arc<Transmit>),
    Wan(Arc<Wan>),
    Waveform(Arc<Waveform>),
    Cwx(Arc<Cwx>),
    /// The radio's own properties; read them from the session.
    Radio,
}

impl ObjectRef {
    pub fn kind(&self) -> ObjectKind {
        match self {
            ObjectRef::Slice(_) => ObjectKind::Slice,
            ObjectRef::Panadapter(_) => ObjectKind::Panadapter,
            ObjectRef::Waterfall(_) => ObjectKind::Waterfall,
            ObjectRef::Meter(_) => ObjectKind::Meter,
            ObjectRef::Memory(_) => ObjectKind::Memory,
            ObjectRef::Equalizer(_) => ObjectKind::Equalizer,
            ObjectRef::Tnf(_) => ObjectKind::Tnf,
            ObjectRef::AudioStream(_) => ObjectKind::AudioStream,
            ObjectRef::MicAudioStream(_) => ObjectKind::MicAudioStream,
            ObjectRef::TxAudioStream(_) => ObjectKind::TxAudioStream,
            ObjectRef::IqStream(_) => ObjectKind::IqStream,
            ObjectRef::OpusStream(_) => ObjectKind::OpusStream,
            ObjectRef::UsbCable(_) => ObjectKind::UsbCable,
            ObjectRef::Xvtr(_) => ObjectKind::Xvtr,
            ObjectRef::Amplifier(_) => ObjectKind::Amplifier,
            ObjectRef::Profile(_) => ObjectKind::Profile,
            ObjectRef::Atu(_) => ObjectKind::Atu,
            ObjectRef::Gps(_) => ObjectKind::Gps,
            ObjectRef::Interlock(_) => ObjectKind::Interlock,
            ObjectRef::Transmit(_) => ObjectKind::Transmit,
            ObjectRef::Wan(_) => ObjectKind::Wan,
            ObjectRef::Waveform(_) => ObjectKind::Waveform,
            ObjectRef::Cwx(_) => ObjectKind::Cwx,
            ObjectRef::Radio => ObjectKind::Radio,
        }
    }
}

/// An event emitted by the session when radio state changes.
#[derive(Debug, Clone)]
pub enum RadioEvent {
    /// The radio assigned this connection its handle.
    HandleAssigned(u32),

    /// The radio reported status for this client for the first time. UDP
    /// stream setup can proceed.
    ClientConnected,

    /// An `M` line from the radio.
    Message {
        severity: Severity,
        code: String,
        text: String,
    },

    /// A dynamic object was created by its first status line.
    Added(ObjectRef),

    /// An object's properties were updated from status.
    Updated(ObjectRef),

    /// An object is about to be removed. It is still readable through the
    /// carried handle.
    WillRemove(ObjectRef),

    /// The first UDP packet arrived for a stream object.
    StreamStarted { kind: ObjectKind, stream_id: u32 },

    /// Another GUI client connected to the radio.
    GuiClientAdded(GuiClient),

    /// A GUI client disconnected from the radio.
    GuiClientRemoved(GuiClient),

    /// The transmit interlock changed state (e.g. `READY` to `TRANSMITTING`).
    InterlockStateChanged(String),

    /// The session was torn down.
    Disconnected,
}

//! Radio object models.
//!
//! Dynamic models ([`DynamicModel`]) live in per-kind [`Registry`]s and are
//! created and removed by status lines. Static models ([`StaticModel`]) are
//! single per-session instances whose properties are merged in place.
//! Stream models additionally accept VITA-49 packets from the demultiplexer.
//!
//! Every model keeps its properties in one [`Barrier`]-guarded state struct.
//! Property values are converted before the lock is taken; the lock is held
//! only for the assignment.

use std::collections::HashMap;
use std::hash::Hash;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicU8, AtomicU64, Ordering};

use flexlib_core::{Barrier, mhz_to_hz, parse_bool, parse_hex_u32};

use crate::commands::Commands;
use crate::events::{ObjectKind, ObjectRef};
use crate::keyvalue::{KeyValue, parse_values};
use crate::vita::VitaPacket;

/// Declare a wire-token enum: a closed set of known status tokens plus
/// `Unknown(raw)` for anything newer firmware sends.
macro_rules! wire_tokens {
    (
        $(#[$meta:meta])*
        $vis:vis enum $name:ident {
            $($variant:ident => $raw:literal $(| $alt:literal)*),+ $(,)?
        }
    ) => {
        $(#[$meta])*
        #[derive(Debug, Clone, PartialEq, Eq, Hash)]
        $vis enum $name {
            $($variant,)+
            Unknown(String),
        }

        impl $name {
            /// Look up a (lowercased) wire token.
            pub fn parse(raw: &str) -> Self {
                match raw {
                    $($raw $(| $alt)* => $name::$variant,)+
                    other => $name::Unknown(other.to_string()),
                }
            }

            /// The token as received.
            #[allow(dead_code)]
            pub fn as_str(&self) -> &str {
                match self {
                    $($name::$variant => $raw,)+
                    $name::Unknown(raw) => raw,
                }
            }
        }
    };
}

mod amplifier;
mod atu;
mod cwx;
mod equalizer;
mod gps;
mod interlock;
mod memory;
mod meter;
mod panadapter;
mod profile;
mod slice;
mod streams;
mod tnf;
mod transmit;
mod usb_cable;
mod wan;
mod waveform;
mod xvtr;

pub use amplifier::{Amplifier, AmplifierState};
pub use atu::{Atu, AtuState};
pub use cwx::{Cwx, CwxState};
pub use equalizer::{Equalizer, EqualizerState};
pub use gps::{Gps, GpsState};
pub use interlock::{Interlock, InterlockState};
pub use memory::{Memory, MemoryState};
pub use meter::{Meter, MeterState, MeterUnit};
pub use panadapter::{Panadapter, PanadapterState, Waterfall, WaterfallState};
pub use profile::{Profile, ProfileState};
pub use slice::{Slice, SliceState};
pub use streams::{
    AudioStream, AudioStreamState, IqStream, IqStreamState, MicAudioStream, OpusStream,
    OpusStreamState, TxAudioStream,
};
pub use tnf::{Tnf, TnfState};
pub use transmit::{Transmit, TransmitState};
pub use usb_cable::{UsbCable, UsbCableState};
pub use wan::{Wan, WanState};
pub use waveform::{Waveform, WaveformState};
pub use xvtr::{Xvtr, XvtrState};

// ---------------------------------------------------------------------------
// Model traits
// ---------------------------------------------------------------------------

/// An object created and removed by status lines, keyed by id.
pub trait DynamicModel: Send + Sync + Sized + 'static {
    type Id: Clone + Eq + Hash + std::fmt::Debug + Send + Sync + 'static;

    const KIND: ObjectKind;

    fn new(id: Self::Id, commands: Arc<Commands>) -> Self;

    fn id(&self) -> &Self::Id;

    /// Parse the positional id token of a status line.
    fn parse_id(raw: &str) -> Option<Self::Id>;

    /// Merge status properties. Unknown tokens are logged and skipped.
    fn parse_properties(&self, properties: &[KeyValue]);

    fn into_ref(this: Arc<Self>) -> ObjectRef;
}

/// A single per-session object.
pub trait StaticModel: Send + Sync {
    const KIND: ObjectKind;

    fn parse_properties(&self, properties: &[KeyValue]);
}

/// A dynamic object that also receives UDP packets keyed by its stream id.
pub trait StreamModel: DynamicModel {
    fn stream_id(&self) -> u32;

    fn stream_status(&self) -> &StreamStatus;

    /// Consume one packet already matched to this stream.
    fn process_packet(&self, packet: &VitaPacket);
}

// ---------------------------------------------------------------------------
// Registry
// ---------------------------------------------------------------------------

/// The live objects of one kind.
pub struct Registry<M: DynamicModel> {
    objects: Barrier<HashMap<M::Id, Arc<M>>>,
}

impl<M: DynamicModel> Default for Registry<M> {
    fn default() -> Self {
        Registry {
            objects: Barrier::new(HashMap::new()),
        }
    }
}

impl<M: DynamicModel> std::fmt::Debug for Registry<M> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Registry")
            .field("kind", &M::KIND)
            .field("len", &self.len())
            .finish()
    }
}

impl<M: DynamicModel> Registry<M> {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, id: &M::Id) -> Option<Arc<M>> {
        self.objects.read().get(id).cloned()
    }

    pub fn contains(&self, id: &M::Id) -> bool {
        self.objects.read().contains_key(id)
    }

    /// Insert an object under its own id, returning any object it replaced.
    pub fn insert(&self, object: Arc<M>) -> Option<Arc<M>> {
        let id = object.id().clone();
        self.objects.write().insert(id, object)
    }

    pub fn remove(&self, id: &M::Id) -> Option<Arc<M>> {
        self.objects.write().remove(id)
    }

    /// Snapshot of every live object.
    pub fn all(&self) -> Vec<Arc<M>> {
        self.objects.read().values().cloned().collect()
    }

    pub fn ids(&self) -> Vec<M::Id> {
        self.objects.read().keys().cloned().collect()
    }

    /// First object matching `predicate`.
    pub fn find(&self, predicate: impl Fn(&M) -> bool) -> Option<Arc<M>> {
        self.objects.read().values().find(|o| predicate(o)).cloned()
    }

    pub fn len(&self) -> usize {
        self.objects.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.objects.read().is_empty()
    }

    /// Remove everything, returning what was removed.
    pub fn drain(&self) -> Vec<Arc<M>> {
        self.objects.write().drain().map(|(_, o)| o).collect()
    }
}

// ---------------------------------------------------------------------------
// Stream bookkeeping
// ---------------------------------------------------------------------------

/// Per-stream packet accounting shared by every stream model.
#[derive(Debug, Default)]
pub struct StreamStatus {
    streaming: AtomicBool,
    packets: AtomicU64,
    last_sequence: AtomicU8,
    sequence_errors: AtomicU64,
}

impl StreamStatus {
    /// Whether at least one packet has arrived.
    pub fn is_streaming(&self) -> bool {
        self.streaming.load(Ordering::Acquire)
    }

    pub fn packets(&self) -> u64 {
        self.packets.load(Ordering::Relaxed)
    }

    /// Packets whose mod-16 sequence did not follow the previous one.
    pub fn sequence_errors(&self) -> u64 {
        self.sequence_errors.load(Ordering::Relaxed)
    }

    /// Account for one packet. Returns `true` for the first packet seen.
    pub(crate) fn record(&self, sequence: u8) -> bool {
        let sequence = sequence & 0x0F;
        let first = !self.streaming.swap(true, Ordering::AcqRel);
        self.packets.fetch_add(1, Ordering::Relaxed);
        let previous = self.last_sequence.swap(sequence, Ordering::Relaxed);
        if !first && (previous + 1) & 0x0F != sequence {
            self.sequence_errors.fetch_add(1, Ordering::Relaxed);
        }
        first
    }
}

// ---------------------------------------------------------------------------
// Property helpers
// ---------------------------------------------------------------------------

/// Conversion from a status value.
pub(crate) trait FromWire: Sized {
    fn from_wire(raw: &str) -> Option<Self>;
}

impl FromWire for String {
    fn from_wire(raw: &str) -> Option<Self> {
        Some(raw.to_string())
    }
}

impl FromWire for bool {
    fn from_wire(raw: &str) -> Option<Self> {
        parse_bool(raw)
    }
}

/// Comma-separated lists, e.g. `ant_list=ANT1,ANT2,RX_A`.
impl FromWire for Vec<String> {
    fn from_wire(raw: &str) -> Option<Self> {
        Some(parse_values(raw, ','))
    }
}

macro_rules! numeric_from_wire {
    ($($t:ty),+) => {
        $(impl FromWire for $t {
            fn from_wire(raw: &str) -> Option<Self> {
                raw.trim().parse().ok()
            }
        })+
    };
}

numeric_from_wire!(u8, u16, u32, u64, i8, i16, i32, i64, f32, f64);

/// Convert and store one property value.
pub(crate) fn store<S, T: FromWire>(
    state: &Barrier<S>,
    kind: ObjectKind,
    kv: &KeyValue,
    field: impl FnOnce(&mut S) -> &mut T,
) {
    store_with(state, kind, kv, T::from_wire, field)
}

/// Convert with `parse` and store one property value.
pub(crate) fn store_with<S, T>(
    state: &Barrier<S>,
    kind: ObjectKind,
    kv: &KeyValue,
    parse: impl FnOnce(&str) -> Option<T>,
    field: impl FnOnce(&mut S) -> &mut T,
) {
    match parse(&kv.value) {
        Some(value) => *field(&mut state.write()) = value,
        None => invalid_value(kind, kv),
    }
}

/// Log a known token whose value could not be converted.
pub(crate) fn invalid_value(kind: ObjectKind, kv: &KeyValue) {
    tracing::warn!(
        object = kind.as_str(),
        token = %kv.key,
        value = %kv.value,
        "invalid property value"
    );
}

/// Log a property token this version does not know.
pub(crate) fn unknown_token(kind: ObjectKind, kv: &KeyValue) {
    tracing::warn!(
        object = kind.as_str(),
        token = %kv.key,
        value = %kv.value,
        "unknown property token"
    );
}

/// MHz status value to Hz.
pub(crate) fn parse_mhz(raw: &str) -> Option<u64> {
    raw.trim().parse::<f64>().ok().filter(|v| *v >= 0.0).map(mhz_to_hz)
}

/// Hex handle or stream id.
pub(crate) fn parse_hex(raw: &str) -> Option<u32> {
    parse_hex_u32(raw)
}

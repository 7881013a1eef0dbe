use std::sync::Arc;

use flexlib_core::Barrier;

use super::{DynamicModel, store, store_with, unknown_token};
use crate::commands::Commands;
use crate::events::{ObjectKind, ObjectRef};
use crate::keyvalue::KeyValue;

wire_tokens! {
    enum MeterToken {
        Source => "src",
        SourceIndex => "num",
        Name => "nam",
        Low => "low",
        High => "hi",
        Description => "desc",
        Units => "unit",
        Fps => "fps",
    }
}

wire_tokens! {
    /// Unit a meter reports in. Determines the fixed-point scale of UDP
    /// readings.
    pub enum MeterUnit {
        None => "none",
        Amps => "amps",
        Db => "db",
        Dbfs => "dbfs",
        Dbm => "dbm",
        DegC => "degc",
        DegF => "degf",
        Percent => "percent",
        Rpm => "rpm",
        Swr => "swr",
        Volts => "volts",
        Watts => "watts",
    }
}

impl Default for MeterUnit {
    fn default() -> Self {
        MeterUnit::None
    }
}

impl MeterUnit {
    /// Convert a raw UDP reading to the meter's unit.
    pub fn scale(&self, raw: i16) -> f32 {
        let raw = raw as f32;
        match self {
            MeterUnit::Db | MeterUnit::Dbm | MeterUnit::Dbfs | MeterUnit::Swr => raw / 128.0,
            MeterUnit::Volts | MeterUnit::Amps => raw / 256.0,
            MeterUnit::DegC | MeterUnit::DegF => raw / 64.0,
            _ => raw,
        }
    }
}

/// Properties of one meter.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct MeterState {
    /// Owning subsystem, e.g. `SLC`, `TX-`, `RAD`, `COD-`.
    pub source: String,
    /// Index within the source, e.g. the slice number.
    pub source_index: String,
    pub name: String,
    pub low: f32,
    pub high: f32,
    pub description: String,
    pub units: MeterUnit,
    pub fps: u32,
}

/// A meter. Readings arrive over UDP.
#[derive(Debug)]
pub struct Meter {
    id: u16,
    state: Barrier<MeterState>,
    value: Barrier<f32>,
}

impl Meter {
    pub fn state(&self) -> MeterState {
        self.state.get()
    }

    pub fn name(&self) -> String {
        self.state.with(|s| s.name.clone())
    }

    pub fn source(&self) -> String {
        self.state.with(|s| s.source.clone())
    }

    pub fn units(&self) -> MeterUnit {
        self.state.with(|s| s.units.clone())
    }

    /// Latest reading, already scaled to the meter's unit.
    pub fn value(&self) -> f32 {
        self.value.get()
    }

    /// Store a raw reading from a meter packet. Returns the scaled value.
    pub(crate) fn set_raw_value(&self, raw: i16) -> f32 {
        let scaled = self.state.with(|s| s.units.scale(raw));
        self.value.set(scaled);
        scaled
    }
}

impl DynamicModel for Meter {
    type Id = u16;

    const KIND: ObjectKind = ObjectKind::Meter;

    fn new(id: u16, _commands: Arc<Commands>) -> Self {
        Meter {
            id,
            state: Barrier::new(MeterState::default()),
            value: Barrier::new(0.0),
        }
    }

    fn id(&self) -> &u16 {
        &self.id
    }

    fn parse_id(raw: &str) -> Option<u16> {
        raw.parse().ok()
    }

    fn parse_properties(&self, properties: &[KeyValue]) {
        let st = &self.state;
        let k = Self::KIND;
        for kv in properties {
            match MeterToken::parse(&kv.key) {
                MeterToken::Source => store(st, k, kv, |s| &mut s.source),
                MeterToken::SourceIndex => store(st, k, kv, |s| &mut s.source_index),
                MeterToken::Name => store(st, k, kv, |s| &mut s.name),
                MeterToken::Low => store(st, k, kv, |s| &mut s.low),
                MeterToken::High => store(st, k, kv, |s| &mut s.high),
                MeterToken::Description => store(st, k, kv, |s| &mut s.description),
                MeterToken::Units => store_with(
                    st,
                    k,
                    kv,
                    |v| Some(MeterUnit::parse(&v.to_lowercase())),
                    |s| &mut s.units,
                ),
                MeterToken::Fps => store(st, k, kv, |s| &mut s.fps),
                MeterToken::Unknown(_) => unknown_token(k, kv),
            }
        }
    }

    fn into_ref(this: Arc<Self>) -> ObjectRef {
        ObjectRef::Meter(this)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::commands::testing::recording_commands;
    use crate::keyvalue::KeyValue;

    fn props(pairs: &[(&str, &str)]) -> Vec<KeyValue> {
        pairs.iter().map(|(k, v)| KeyValue::new(*k, *v)).collect()
    }

    #[test]
    fn unit_scaling() {
        assert_eq!(MeterUnit::Dbm.scale(-128 * 73), -73.0);
        assert_eq!(MeterUnit::Swr.scale(192), 1.5);
        assert_eq!(MeterUnit::Volts.scale(256 * 13), 13.0);
        assert_eq!(MeterUnit::DegC.scale(64 * 40), 40.0);
        assert_eq!(MeterUnit::Watts.scale(100), 100.0);
        assert_eq!(MeterUnit::parse("furlongs"), MeterUnit::Unknown("furlongs".into()));
    }

    #[test]
    fn parse_meter_and_scale_reading() {
        let (commands, _) = recording_commands();
        let meter = Meter::new(7, commands);
        meter.parse_properties(&props(&[
            ("src", "SLC"),
            ("num", "0"),
            ("nam", "LEVEL"),
            ("low", "-150.0"),
            ("hi", "20.0"),
            ("desc", "Signal strength"),
            ("unit", "dBm"),
            ("fps", "10"),
        ]));
        assert_eq!(meter.name(), "LEVEL");
        assert_eq!(meter.units(), MeterUnit::Dbm);
        assert_eq!(meter.set_raw_value(-128 * 100), -100.0);
        assert_eq!(meter.value(), -100.0);
    }
}

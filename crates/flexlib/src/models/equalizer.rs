use std::sync::Arc;

use flexlib_core::{Barrier, try_set_field};

use super::{DynamicModel, store, unknown_token};
use crate::commands::{self, Commands};
use crate::events::{ObjectKind, ObjectRef};
use crate::keyvalue::KeyValue;

wire_tokens! {
    enum EqualizerToken {
        Enabled => "mode",
        Hz63 => "63hz" | "level_63hz",
        Hz125 => "125hz" | "level_125hz",
        Hz250 => "250hz" | "level_250hz",
        Hz500 => "500hz" | "level_500hz",
        Hz1000 => "1000hz" | "level_1000hz",
        Hz2000 => "2000hz" | "level_2000hz",
        Hz4000 => "4000hz" | "level_4000hz",
        Hz8000 => "8000hz" | "level_8000hz",
    }
}

/// Band labels as the command expects them, lowest first.
const BANDS: [&str; 8] = [
    "63Hz", "125Hz", "250Hz", "500Hz", "1000Hz", "2000Hz", "4000Hz", "8000Hz",
];

/// Graphic equalizer settings.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct EqualizerState {
    pub enabled: bool,
    /// Band levels in dB, indexed like the 63 Hz to 8 kHz bands.
    pub levels: [i8; 8],
}

/// The receive (`rxsc`) or transmit (`txsc`) equalizer.
#[derive(Debug)]
pub struct Equalizer {
    id: String,
    commands: Arc<Commands>,
    state: Barrier<EqualizerState>,
}

impl Equalizer {
    pub fn state(&self) -> EqualizerState {
        self.state.get()
    }

    pub fn set_enabled(&self, enabled: bool) {
        if try_set_field(&self.state, |s| &mut s.enabled, enabled) {
            self.commands.send(commands::cmd_eq(
                &self.id,
                "mode",
                flexlib_core::bool_flag(enabled),
            ));
        }
    }

    /// Set one band, by index 0 (63 Hz) to 7 (8 kHz). Levels are clamped
    /// to -10..=10 dB.
    pub fn set_level(&self, band: usize, level: i8) {
        let Some(label) = BANDS.get(band) else {
            tracing::warn!(band, "equalizer band index out of range");
            return;
        };
        let level = flexlib_core::clamp(level, &(-10..=10));
        if try_set_field(&self.state, |s| &mut s.levels[band], level) {
            self.commands.send(commands::cmd_eq(&self.id, label, level));
        }
    }
}

impl DynamicModel for Equalizer {
    type Id = String;

    const KIND: ObjectKind = ObjectKind::Equalizer;

    fn new(id: String, commands: Arc<Commands>) -> Self {
        Equalizer {
            id,
            commands,
            state: Barrier::new(EqualizerState::default()),
        }
    }

    fn id(&self) -> &String {
        &self.id
    }

    fn parse_id(raw: &str) -> Option<String> {
        match raw {
            "rxsc" | "txsc" | "rx" | "tx" => Some(raw.to_string()),
            _ => None,
        }
    }

    fn parse_properties(&self, properties: &[KeyValue]) {
        let st = &self.state;
        let k = Self::KIND;
        for kv in properties {
            match EqualizerToken::parse(&kv.key) {
                EqualizerToken::Enabled => store(st, k, kv, |s| &mut s.enabled),
                EqualizerToken::Hz63 => store(st, k, kv, |s| &mut s.levels[0]),
                EqualizerToken::Hz125 => store(st, k, kv, |s| &mut s.levels[1]),
                EqualizerToken::Hz250 => store(st, k, kv, |s| &mut s.levels[2]),
                EqualizerToken::Hz500 => store(st, k, kv, |s| &mut s.levels[3]),
                EqualizerToken::Hz1000 => store(st, k, kv, |s| &mut s.levels[4]),
                EqualizerToken::Hz2000 => store(st, k, kv, |s| &mut s.levels[5]),
                EqualizerToken::Hz4000 => store(st, k, kv, |s| &mut s.levels[6]),
                EqualizerToken::Hz8000 => store(st, k, kv, |s| &mut s.levels[7]),
                EqualizerToken::Unknown(_) => unknown_token(k, kv),
            }
        }
    }

    fn into_ref(this: Arc<Self>) -> ObjectRef {
        ObjectRef::Equalizer(this)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::commands::testing::recording_commands;
    use crate::keyvalue::key_values;

    #[test]
    fn parse_eq_status() {
        let (commands, _) = recording_commands();
        let eq = Equalizer::new("rxsc".into(), commands);
        eq.parse_properties(&key_values(
            "mode=1 63Hz=-2 125Hz=0 250Hz=3 500Hz=0 1000Hz=0 2000Hz=1 4000Hz=0 8000Hz=-10",
        ));
        let s = eq.state();
        assert!(s.enabled);
        assert_eq!(s.levels, [-2, 0, 3, 0, 0, 1, 0, -10]);
    }

    #[test]
    fn set_level_clamps_and_uses_band_label() {
        let (commands, sink) = recording_commands();
        let eq = Equalizer::new("txsc".into(), commands);
        eq.set_level(0, 25);
        eq.set_level(0, 10);
        eq.set_level(9, 1);
        assert_eq!(sink.texts(), vec!["eq txsc 63Hz=10"]);
    }
}

use std::sync::Arc;

use flexlib_core::{Barrier, try_set_field};

use super::{DynamicModel, parse_mhz, store, store_with, unknown_token};
use crate::commands::{self, Commands};
use crate::events::{ObjectKind, ObjectRef};
use crate::keyvalue::KeyValue;

wire_tokens! {
    enum XvtrToken {
        InUse => "in_use",
        Name => "name",
        RfFrequency => "rf_freq",
        IfFrequency => "if_freq",
        LoError => "lo_error",
        RxGain => "rx_gain",
        RxOnly => "rx_only",
        MaxPower => "max_power",
        Order => "order",
        IsValid => "is_valid",
        Preferred => "preferred",
        TwoMeterInt => "two_meter_int",
    }
}

/// Transverter configuration.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct XvtrState {
    pub in_use: bool,
    pub name: String,
    /// RF frequency in Hz.
    pub rf_frequency: u64,
    /// IF frequency in Hz.
    pub if_frequency: u64,
    /// LO error in Hz.
    pub lo_error: u64,
    pub rx_gain: f32,
    pub rx_only: bool,
    pub max_power: f32,
    pub order: u8,
    pub is_valid: bool,
    pub preferred: bool,
    pub two_meter_int: bool,
}

#[derive(Debug)]
pub struct Xvtr {
    id: u32,
    commands: Arc<Commands>,
    state: Barrier<XvtrState>,
}

impl Xvtr {
    pub fn state(&self) -> XvtrState {
        self.state.get()
    }

    pub fn set_name(&self, name: &str) {
        if try_set_field(&self.state, |s| &mut s.name, name.to_string()) {
            self.commands.send(commands::cmd_xvtr_set(self.id, "name", name));
        }
    }

    pub fn set_rf_frequency(&self, hz: u64) {
        if try_set_field(&self.state, |s| &mut s.rf_frequency, hz) {
            self.commands.send(commands::cmd_xvtr_set(
                self.id,
                "rf_freq",
                format!("{:.6}", flexlib_core::hz_to_mhz(hz)),
            ));
        }
    }

    pub fn set_if_frequency(&self, hz: u64) {
        if try_set_field(&self.state, |s| &mut s.if_frequency, hz) {
            self.commands.send(commands::cmd_xvtr_set(
                self.id,
                "if_freq",
                format!("{:.6}", flexlib_core::hz_to_mhz(hz)),
            ));
        }
    }

    pub fn set_rx_only(&self, rx_only: bool) {
        if try_set_field(&self.state, |s| &mut s.rx_only, rx_only) {
            self.commands.send(commands::cmd_xvtr_set(
                self.id,
                "rx_only",
                flexlib_core::bool_flag(rx_only),
            ));
        }
    }

    pub fn remove(&self) {
        self.commands.send(commands::cmd_xvtr_remove(self.id));
    }
}

impl DynamicModel for Xvtr {
    type Id = u32;

    const KIND: ObjectKind = ObjectKind::Xvtr;

    fn new(id: u32, commands: Arc<Commands>) -> Self {
        Xvtr {
            id,
            commands,
            state: Barrier::new(XvtrState::default()),
        }
    }

    fn id(&self) -> &u32 {
        &self.id
    }

    fn parse_id(raw: &str) -> Option<u32> {
        raw.parse().ok()
    }

    fn parse_properties(&self, properties: &[KeyValue]) {
        let st = &self.state;
        let k = Self::KIND;
        for kv in properties {
            match XvtrToken::parse(&kv.key) {
                XvtrToken::InUse => store(st, k, kv, |s| &mut s.in_use),
                XvtrToken::Name => store(st, k, kv, |s| &mut s.name),
                XvtrToken::RfFrequency => store_with(st, k, kv, parse_mhz, |s| &mut s.rf_frequency),
                XvtrToken::IfFrequency => store_with(st, k, kv, parse_mhz, |s| &mut s.if_frequency),
                XvtrToken::LoError => store_with(st, k, kv, parse_mhz, |s| &mut s.lo_error),
                XvtrToken::RxGain => store(st, k, kv, |s| &mut s.rx_gain),
                XvtrToken::RxOnly => store(st, k, kv, |s| &mut s.rx_only),
                XvtrToken::MaxPower => store(st, k, kv, |s| &mut s.max_power),
                XvtrToken::Order => store(st, k, kv, |s| &mut s.order),
                XvtrToken::IsValid => store(st, k, kv, |s| &mut s.is_valid),
                XvtrToken::Preferred => store(st, k, kv, |s| &mut s.preferred),
                XvtrToken::TwoMeterInt => store(st, k, kv, |s| &mut s.two_meter_int),
                XvtrToken::Unknown(_) => unknown_token(k, kv),
            }
        }
    }

    fn into_ref(this: Arc<Self>) -> ObjectRef {
        ObjectRef::Xvtr(this)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::commands::testing::recording_commands;
    use crate::keyvalue::key_values;

    #[test]
    fn parse_xvtr_status() {
        let (commands, sink) = recording_commands();
        let xvtr = Xvtr::new(0, commands);
        xvtr.parse_properties(&key_values(
            "in_use=1 name=2m rf_freq=144.000000 if_freq=28.000000 lo_error=0.000000 rx_only=0 max_power=10.0 is_valid=1",
        ));
        let s = xvtr.state();
        assert_eq!(s.rf_frequency, 144_000_000);
        assert_eq!(s.if_frequency, 28_000_000);
        assert!(s.is_valid);
        xvtr.set_rf_frequency(144_000_000);
        xvtr.set_rx_only(true);
        assert_eq!(sink.texts(), vec!["xvtr set 0 rx_only=1"]);
    }
}

use std::sync::Arc;

use flexlib_core::{Barrier, try_set_field};

use super::{DynamicModel, store, store_with, unknown_token};
use crate::commands::{self, Commands};
use crate::events::{ObjectKind, ObjectRef};
use crate::keyvalue::KeyValue;

wire_tokens! {
    enum UsbCableToken {
        CableType => "type",
        Enable => "enable",
        PluggedIn => "plugged_in",
        Name => "name",
        Source => "source",
        SourceRxAnt => "source_rx_ant",
        SourceTxAnt => "source_tx_ant",
        SourceSlice => "source_slice",
        Band => "band",
        Speed => "speed",
        DataBits => "data_bits",
        Parity => "parity",
        StopBits => "stop_bits",
        FlowControl => "flow_control",
        Polarity => "polarity",
        AutoReport => "auto_report",
        Preamp => "preamp",
        UsbLog => "log",
    }
}

/// Properties of a FlexRadio USB cable (CAT, bit, passthrough, LDPA).
#[derive(Debug, Clone, Default, PartialEq)]
pub struct UsbCableState {
    pub cable_type: String,
    pub enable: bool,
    pub plugged_in: bool,
    pub name: String,
    pub source: String,
    pub source_rx_ant: String,
    pub source_tx_ant: String,
    pub source_slice: i32,
    pub band: String,
    pub speed: u32,
    pub data_bits: u8,
    pub parity: String,
    pub stop_bits: u8,
    pub flow_control: String,
    pub polarity: String,
    pub auto_report: bool,
    pub preamp: String,
    pub log: bool,
}

/// A USB cable, keyed by its serial number.
#[derive(Debug)]
pub struct UsbCable {
    id: String,
    commands: Arc<Commands>,
    state: Barrier<UsbCableState>,
}

impl UsbCable {
    pub fn state(&self) -> UsbCableState {
        self.state.get()
    }

    pub fn set_enable(&self, enable: bool) {
        if try_set_field(&self.state, |s| &mut s.enable, enable) {
            self.commands.send(commands::cmd_usb_cable_set(
                &self.id,
                "enable",
                flexlib_core::bool_flag(enable),
            ));
        }
    }

    pub fn set_name(&self, name: &str) {
        if try_set_field(&self.state, |s| &mut s.name, name.to_string()) {
            self.commands.send(commands::cmd_usb_cable_set(
                &self.id,
                "name",
                name.replace(' ', "\u{7f}"),
            ));
        }
    }
}

impl DynamicModel for UsbCable {
    type Id = String;

    const KIND: ObjectKind = ObjectKind::UsbCable;

    fn new(id: String, commands: Arc<Commands>) -> Self {
        UsbCable {
            id,
            commands,
            state: Barrier::new(UsbCableState::default()),
        }
    }

    fn id(&self) -> &String {
        &self.id
    }

    fn parse_id(raw: &str) -> Option<String> {
        (!raw.is_empty()).then(|| raw.to_string())
    }

    fn parse_properties(&self, properties: &[KeyValue]) {
        let st = &self.state;
        let k = Self::KIND;
        for kv in properties {
            match UsbCableToken::parse(&kv.key) {
                UsbCableToken::CableType => store(st, k, kv, |s| &mut s.cable_type),
                UsbCableToken::Enable => store(st, k, kv, |s| &mut s.enable),
                UsbCableToken::PluggedIn => store(st, k, kv, |s| &mut s.plugged_in),
                UsbCableToken::Name => store_with(
                    st,
                    k,
                    kv,
                    |v| Some(v.replace('\u{7f}', " ")),
                    |s| &mut s.name,
                ),
                UsbCableToken::Source => store(st, k, kv, |s| &mut s.source),
                UsbCableToken::SourceRxAnt => store(st, k, kv, |s| &mut s.source_rx_ant),
                UsbCableToken::SourceTxAnt => store(st, k, kv, |s| &mut s.source_tx_ant),
                UsbCableToken::SourceSlice => store(st, k, kv, |s| &mut s.source_slice),
                UsbCableToken::Band => store(st, k, kv, |s| &mut s.band),
                UsbCableToken::Speed => store(st, k, kv, |s| &mut s.speed),
                UsbCableToken::DataBits => store(st, k, kv, |s| &mut s.data_bits),
                UsbCableToken::Parity => store(st, k, kv, |s| &mut s.parity),
                UsbCableToken::StopBits => store(st, k, kv, |s| &mut s.stop_bits),
                UsbCableToken::FlowControl => store(st, k, kv, |s| &mut s.flow_control),
                UsbCableToken::Polarity => store(st, k, kv, |s| &mut s.polarity),
                UsbCableToken::AutoReport => store(st, k, kv, |s| &mut s.auto_report),
                UsbCableToken::Preamp => store(st, k, kv, |s| &mut s.preamp),
                UsbCableToken::UsbLog => store(st, k, kv, |s| &mut s.log),
                UsbCableToken::Unknown(_) => unknown_token(k, kv),
            }
        }
    }

    fn into_ref(this: Arc<Self>) -> ObjectRef {
        ObjectRef::UsbCable(this)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::commands::testing::recording_commands;
    use crate::keyvalue::key_values;

    #[test]
    fn parse_cable_status() {
        let (commands, sink) = recording_commands();
        let cable = UsbCable::new("A5052JU7".into(), commands);
        cable.parse_properties(&key_values(
            "type=cat enable=1 plugged_in=1 name=Logger\u{7f}CAT source=tx_ant speed=38400",
        ));
        let s = cable.state();
        assert_eq!(s.cable_type, "cat");
        assert!(s.plugged_in);
        assert_eq!(s.name, "Logger CAT");
        assert_eq!(s.speed, 38_400);
        cable.set_enable(false);
        assert_eq!(sink.texts(), vec!["usb_cable set A5052JU7 enable=0"]);
    }
}

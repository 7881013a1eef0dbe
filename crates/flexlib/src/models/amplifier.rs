use std::sync::Arc;

use flexlib_core::{Barrier, try_set_field};

use super::{DynamicModel, store, unknown_token};
use crate::commands::{self, Commands};
use crate::events::{ObjectKind, ObjectRef};
use crate::keyvalue::KeyValue;

wire_tokens! {
    enum AmplifierToken {
        Antennas => "ant",
        Ip => "ip",
        Model => "model",
        Port => "port",
        SerialNumber => "serial_num",
        State => "state",
        Operate => "operate",
        Handle => "handle",
    }
}

/// Properties of an external power amplifier (e.g. a PowerGenius XL).
#[derive(Debug, Clone, Default, PartialEq)]
pub struct AmplifierState {
    /// Radio-to-amplifier antenna mapping, as sent.
    pub antennas: String,
    pub ip: String,
    pub model: String,
    pub port: u16,
    pub serial_number: String,
    pub state: String,
    pub operate: bool,
    pub handle: String,
}

#[derive(Debug)]
pub struct Amplifier {
    id: String,
    commands: Arc<Commands>,
    state: Barrier<AmplifierState>,
}

impl Amplifier {
    pub fn state(&self) -> AmplifierState {
        self.state.get()
    }

    pub fn set_operate(&self, operate: bool) {
        if try_set_field(&self.state, |s| &mut s.operate, operate) {
            self.commands.send(commands::cmd_amplifier_set(
                &self.id,
                "operate",
                flexlib_core::bool_flag(operate),
            ));
        }
    }
}

impl DynamicModel for Amplifier {
    type Id = String;

    const KIND: ObjectKind = ObjectKind::Amplifier;

    fn new(id: String, commands: Arc<Commands>) -> Self {
        Amplifier {
            id,
            commands,
            state: Barrier::new(AmplifierState::default()),
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
            match AmplifierToken::parse(&kv.key) {
                AmplifierToken::Antennas => store(st, k, kv, |s| &mut s.antennas),
                AmplifierToken::Ip => store(st, k, kv, |s| &mut s.ip),
                AmplifierToken::Model => store(st, k, kv, |s| &mut s.model),
                AmplifierToken::Port => store(st, k, kv, |s| &mut s.port),
                AmplifierToken::SerialNumber => store(st, k, kv, |s| &mut s.serial_number),
                AmplifierToken::State => store(st, k, kv, |s| &mut s.state),
                AmplifierToken::Operate => store(st, k, kv, |s| &mut s.operate),
                AmplifierToken::Handle => store(st, k, kv, |s| &mut s.handle),
                AmplifierToken::Unknown(_) => unknown_token(k, kv),
            }
        }
    }

    fn into_ref(this: Arc<Self>) -> ObjectRef {
        ObjectRef::Amplifier(this)
    }
}

use flexlib_core::Barrier;

use super::{StaticModel, store, unknown_token};
use crate::events::ObjectKind;
use crate::keyvalue::KeyValue;

wire_tokens! {
    enum WanToken {
        ServerConnected => "server_connected",
        RadioAuthenticated => "radio_authenticated",
    }
}

/// SmartLink connection state reported by the radio.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct WanState {
    pub server_connected: bool,
    pub radio_authenticated: bool,
}

#[derive(Debug, Default)]
pub struct Wan {
    state: Barrier<WanState>,
}

impl Wan {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn state(&self) -> WanState {
        self.state.get()
    }
}

impl StaticModel for Wan {
    const KIND: ObjectKind = ObjectKind::Wan;

    fn parse_properties(&self, properties: &[KeyValue]) {
        let st = &self.state;
        let k = Self::KIND;
        for kv in properties {
            match WanToken::parse(&kv.key) {
                WanToken::ServerConnected => store(st, k, kv, |s| &mut s.server_connected),
                WanToken::RadioAuthenticated => store(st, k, kv, |s| &mut s.radio_authenticated),
                WanToken::Unknown(_) => unknown_token(k, kv),
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::keyvalue::key_values;

    #[test]
    fn wan_status() {
        let wan = Wan::new();
        wan.parse_properties(&key_values("server_connected=1 radio_authenticated=0"));
        assert!(wan.state().server_connected);
        assert!(!wan.state().radio_authenticated);
    }
}

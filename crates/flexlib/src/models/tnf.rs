use std::sync::Arc;

use flexlib_core::{Barrier, try_set_field};

use super::{DynamicModel, parse_mhz, store, store_with, unknown_token};
use crate::commands::{self, Commands};
use crate::events::{ObjectKind, ObjectRef};
use crate::keyvalue::KeyValue;

wire_tokens! {
    enum TnfToken {
        Frequency => "freq",
        Depth => "depth",
        Width => "width",
        Permanent => "permanent",
    }
}

/// Tracking notch filter properties.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct TnfState {
    /// Center frequency in Hz.
    pub frequency: u64,
    /// 1 (normal) to 3 (very deep).
    pub depth: u8,
    /// Notch width in Hz.
    pub width: u64,
    pub permanent: bool,
}

/// A tracking notch filter.
#[derive(Debug)]
pub struct Tnf {
    id: u32,
    commands: Arc<Commands>,
    state: Barrier<TnfState>,
}

impl Tnf {
    pub fn state(&self) -> TnfState {
        self.state.get()
    }

    pub fn set_frequency(&self, hz: u64) {
        if try_set_field(&self.state, |s| &mut s.frequency, hz) {
            self.commands.send(commands::cmd_tnf_set(
                self.id,
                "freq",
                format!("{:.6}", flexlib_core::hz_to_mhz(hz)),
            ));
        }
    }

    /// Clamped to 1..=3.
    pub fn set_depth(&self, depth: u8) {
        let depth = flexlib_core::clamp(depth, &(1..=3));
        if try_set_field(&self.state, |s| &mut s.depth, depth) {
            self.commands.send(commands::cmd_tnf_set(self.id, "depth", depth));
        }
    }

    pub fn set_width(&self, hz: u64) {
        if try_set_field(&self.state, |s| &mut s.width, hz) {
            self.commands.send(commands::cmd_tnf_set(
                self.id,
                "width",
                format!("{:.6}", flexlib_core::hz_to_mhz(hz)),
            ));
        }
    }

    pub fn set_permanent(&self, permanent: bool) {
        if try_set_field(&self.state, |s| &mut s.permanent, permanent) {
            self.commands.send(commands::cmd_tnf_set(
                self.id,
                "permanent",
                flexlib_core::bool_flag(permanent),
            ));
        }
    }

    /// Ask the radio to remove this notch. The session drops it when the
    /// reply arrives.
    pub fn remove(&self) {
        self.commands.send(commands::cmd_tnf_remove(self.id));
    }
}

impl DynamicModel for Tnf {
    type Id = u32;

    const KIND: ObjectKind = ObjectKind::Tnf;

    fn new(id: u32, commands: Arc<Commands>) -> Self {
        Tnf {
            id,
            commands,
            state: Barrier::new(TnfState {
                depth: 1,
                ..TnfState::default()
            }),
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
            match TnfToken::parse(&kv.key) {
                TnfToken::Frequency => store_with(st, k, kv, parse_mhz, |s| &mut s.frequency),
                TnfToken::Depth => store(st, k, kv, |s| &mut s.depth),
                TnfToken::Width => store_with(st, k, kv, parse_mhz, |s| &mut s.width),
                TnfToken::Permanent => store(st, k, kv, |s| &mut s.permanent),
                TnfToken::Unknown(_) => unknown_token(k, kv),
            }
        }
    }

    fn into_ref(this: Arc<Self>) -> ObjectRef {
        ObjectRef::Tnf(this)
    }
}

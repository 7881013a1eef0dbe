use std::sync::Arc;

use flexlib_core::{Barrier, try_set_field};

use super::{StaticModel, store, unknown_token};
use crate::commands::{self, Commands};
use crate::events::ObjectKind;
use crate::keyvalue::KeyValue;

wire_tokens! {
    enum AtuToken {
        Status => "status",
        Enabled => "atu_enabled",
        MemoriesEnabled => "memories_enabled",
        UsingMemory => "using_mem",
    }
}

/// Antenna tuner properties.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct AtuState {
    /// e.g. `NONE`, `TUNE_IN_PROGRESS`, `TUNE_SUCCESSFUL`, `TUNE_BYPASS`.
    pub status: String,
    pub enabled: bool,
    pub memories_enabled: bool,
    pub using_memory: bool,
}

/// The internal antenna tuner.
#[derive(Debug)]
pub struct Atu {
    commands: Arc<Commands>,
    state: Barrier<AtuState>,
}

impl Atu {
    pub fn new(commands: Arc<Commands>) -> Self {
        Atu {
            commands,
            state: Barrier::new(AtuState::default()),
        }
    }

    pub fn state(&self) -> AtuState {
        self.state.get()
    }

    pub fn status(&self) -> String {
        self.state.with(|s| s.status.clone())
    }

    pub fn start(&self) {
        self.commands.send(commands::cmd_atu_start());
    }

    pub fn bypass(&self) {
        self.commands.send(commands::cmd_atu_bypass());
    }

    /// Clear all stored tuner memories.
    pub fn clear(&self) {
        self.commands.send(commands::cmd_atu_clear());
    }

    pub fn set_memories_enabled(&self, enabled: bool) {
        if try_set_field(&self.state, |s| &mut s.memories_enabled, enabled) {
            self.commands.send(commands::cmd_atu_memories(enabled));
        }
    }
}

impl StaticModel for Atu {
    const KIND: ObjectKind = ObjectKind::Atu;

    fn parse_properties(&self, properties: &[KeyValue]) {
        let st = &self.state;
        let k = Self::KIND;
        for kv in properties {
            match AtuToken::parse(&kv.key) {
                AtuToken::Status => store(st, k, kv, |s| &mut s.status),
                AtuToken::Enabled => store(st, k, kv, |s| &mut s.enabled),
                AtuToken::MemoriesEnabled => store(st, k, kv, |s| &mut s.memories_enabled),
                AtuToken::UsingMemory => store(st, k, kv, |s| &mut s.using_memory),
                AtuToken::Unknown(_) => unknown_token(k, kv),
            }
        }
    }
}

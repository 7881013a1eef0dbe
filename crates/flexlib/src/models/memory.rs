use std::sync::Arc;

use flexlib_core::{Barrier, try_set_field};

use super::{DynamicModel, parse_mhz, store, store_with, unknown_token};
use crate::commands::{self, Commands};
use crate::events::{ObjectKind, ObjectRef};
use crate::keyvalue::KeyValue;

wire_tokens! {
    enum MemoryToken {
        Owner => "owner",
        Group => "group",
        Frequency => "freq",
        Name => "name",
        Mode => "mode",
        Step => "step",
        OffsetDirection => "repeater",
        RepeaterOffset => "repeater_offset",
        ToneMode => "tone_mode",
        ToneValue => "tone_value",
        Power => "power",
        RxFilterLow => "rx_filter_low",
        RxFilterHigh => "rx_filter_high",
        Highlight => "highlight",
        HighlightColor => "highlight_color",
        Squelch => "squelch",
        SquelchLevel => "squelch_level",
        RttyMark => "rtty_mark",
        RttyShift => "rtty_shift",
        DiglOffset => "digl_offset",
        DiguOffset => "digu_offset",
    }
}

/// A stored memory channel.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct MemoryState {
    pub owner: String,
    pub group: String,
    /// Frequency in Hz.
    pub frequency: u64,
    pub name: String,
    pub mode: String,
    pub step: u32,
    pub offset_direction: String,
    /// Repeater offset in Hz.
    pub repeater_offset: u64,
    pub tone_mode: String,
    pub tone_value: f32,
    pub power: u8,
    pub rx_filter_low: i32,
    pub rx_filter_high: i32,
    pub highlight: bool,
    pub highlight_color: String,
    pub squelch: bool,
    pub squelch_level: u8,
    pub rtty_mark: i32,
    pub rtty_shift: i32,
    pub digl_offset: i32,
    pub digu_offset: i32,
}

#[derive(Debug)]
pub struct Memory {
    id: u32,
    commands: Arc<Commands>,
    state: Barrier<MemoryState>,
}

impl Memory {
    pub fn state(&self) -> MemoryState {
        self.state.get()
    }

    pub fn set_name(&self, name: &str) {
        // Spaces inside the name are sent as \u{7f}.
        if try_set_field(&self.state, |s| &mut s.name, name.to_string()) {
            self.commands.send(commands::cmd_memory_set(
                self.id,
                "name",
                name.replace(' ', "\u{7f}"),
            ));
        }
    }

    pub fn set_frequency(&self, hz: u64) {
        if try_set_field(&self.state, |s| &mut s.frequency, hz) {
            self.commands.send(commands::cmd_memory_set(
                self.id,
                "freq",
                format!("{:.6}", flexlib_core::hz_to_mhz(hz)),
            ));
        }
    }

    pub fn set_mode(&self, mode: &str) {
        if try_set_field(&self.state, |s| &mut s.mode, mode.to_string()) {
            self.commands
                .send(commands::cmd_memory_set(self.id, "mode", mode));
        }
    }

    pub fn set_group(&self, group: &str) {
        if try_set_field(&self.state, |s| &mut s.group, group.to_string()) {
            self.commands
                .send(commands::cmd_memory_set(self.id, "group", group.replace(' ', "\u{7f}")));
        }
    }

    /// Tune the active slice to this memory.
    pub fn apply(&self) {
        self.commands.send(commands::cmd_memory_apply(self.id));
    }

    pub fn remove(&self) {
        self.commands.send(commands::cmd_memory_remove(self.id));
    }
}

/// Memory names and groups arrive with \u{7f} in place of spaces.
fn spaced(raw: &str) -> Option<String> {
    Some(raw.replace('\u{7f}', " "))
}

impl DynamicModel for Memory {
    type Id = u32;

    const KIND: ObjectKind = ObjectKind::Memory;

    fn new(id: u32, commands: Arc<Commands>) -> Self {
        Memory {
            id,
            commands,
            state: Barrier::new(MemoryState::default()),
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
            match MemoryToken::parse(&kv.key) {
                MemoryToken::Owner => store_with(st, k, kv, spaced, |s| &mut s.owner),
                MemoryToken::Group => store_with(st, k, kv, spaced, |s| &mut s.group),
                MemoryToken::Frequency => store_with(st, k, kv, parse_mhz, |s| &mut s.frequency),
                MemoryToken::Name => store_with(st, k, kv, spaced, |s| &mut s.name),
                MemoryToken::Mode => store(st, k, kv, |s| &mut s.mode),
                MemoryToken::Step => store(st, k, kv, |s| &mut s.step),
                MemoryToken::OffsetDirection => store(st, k, kv, |s| &mut s.offset_direction),
                MemoryToken::RepeaterOffset => {
                    store_with(st, k, kv, parse_mhz, |s| &mut s.repeater_offset)
                }
                MemoryToken::ToneMode => store(st, k, kv, |s| &mut s.tone_mode),
                MemoryToken::ToneValue => store(st, k, kv, |s| &mut s.tone_value),
                MemoryToken::Power => store(st, k, kv, |s| &mut s.power),
                MemoryToken::RxFilterLow => store(st, k, kv, |s| &mut s.rx_filter_low),
                MemoryToken::RxFilterHigh => store(st, k, kv, |s| &mut s.rx_filter_high),
                MemoryToken::Highlight => store(st, k, kv, |s| &mut s.highlight),
                MemoryToken::HighlightColor => store(st, k, kv, |s| &mut s.highlight_color),
                MemoryToken::Squelch => store(st, k, kv, |s| &mut s.squelch),
                MemoryToken::SquelchLevel => store(st, k, kv, |s| &mut s.squelch_level),
                MemoryToken::RttyMark => store(st, k, kv, |s| &mut s.rtty_mark),
                MemoryToken::RttyShift => store(st, k, kv, |s| &mut s.rtty_shift),
                MemoryToken::DiglOffset => store(st, k, kv, |s| &mut s.digl_offset),
                MemoryToken::DiguOffset => store(st, k, kv, |s| &mut s.digu_offset),
                MemoryToken::Unknown(_) => unknown_token(k, kv),
            }
        }
    }

    fn into_ref(this: Arc<Self>) -> ObjectRef {
        ObjectRef::Memory(this)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::commands::testing::recording_commands;
    use crate::keyvalue::key_values;

    #[test]
    fn parse_memory_status() {
        let (commands, _) = recording_commands();
        let memory = Memory::new(3, commands);
        memory.parse_properties(&key_values(
            "owner=K1ABC group=Nets freq=7.255000 name=Maritime\u{7f}Net mode=LSB step=1000",
        ));
        let s = memory.state();
        assert_eq!(s.frequency, 7_255_000);
        assert_eq!(s.name, "Maritime Net");
        assert_eq!(s.mode, "LSB");
    }

    #[test]
    fn memory_commands() {
        let (commands, sink) = recording_commands();
        let memory = Memory::new(3, commands);
        memory.set_name("Net One");
        memory.apply();
        assert_eq!(
            sink.texts(),
            vec!["memory set 3 name=Net\u{7f}One", "memory apply 3"]
        );
    }
}

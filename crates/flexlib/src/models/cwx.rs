use std::sync::Arc;

use flexlib_core::{Barrier, ClampedBarrier, try_set_field};

use super::{StaticModel, invalid_value, store, unknown_token};
use crate::commands::{self, Commands};
use crate::events::ObjectKind;
use crate::keyvalue::{KeyValue, unescape, unquote};

/// Number of stored keyer macros.
pub const MACRO_COUNT: usize = 12;

wire_tokens! {
    enum CwxToken {
        Sent => "sent",
        Erase => "erase",
        Wpm => "wpm",
        Delay => "delay",
        QskEnabled => "qsk_enabled",
    }
}

/// CW keyboard (CWX) buffer state.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct CwxState {
    /// Index of the last character keyed from the buffer.
    pub sent: i32,
    /// Index of the last character erased by the radio.
    pub erased: i32,
    /// Break-in delay in milliseconds.
    pub delay: u16,
    pub qsk_enabled: bool,
    pub macros: [String; MACRO_COUNT],
}

/// CW keyboard buffer and macros.
#[derive(Debug)]
pub struct Cwx {
    commands: Arc<Commands>,
    state: Barrier<CwxState>,
    wpm: ClampedBarrier<u8>,
}

impl Cwx {
    pub fn new(commands: Arc<Commands>) -> Self {
        Cwx {
            commands,
            state: Barrier::new(CwxState::default()),
            wpm: ClampedBarrier::new(20, 5..=100),
        }
    }

    pub fn state(&self) -> CwxState {
        self.state.get()
    }

    pub fn wpm(&self) -> u8 {
        self.wpm.get()
    }

    /// Macro text for slot `index` (1-based).
    pub fn macro_text(&self, index: usize) -> Option<String> {
        let slot = index.checked_sub(1)?;
        self.state.with(|s| s.macros.get(slot).cloned())
    }

    /// Queue text on the keyer. Returns the command sequence number.
    pub fn send(&self, text: &str) -> u32 {
        self.commands.send(commands::cmd_cwx_send(text))
    }

    pub fn clear(&self) {
        self.commands.send(commands::cmd_cwx_clear());
    }

    /// Erase `count` unsent characters from the end of the buffer.
    pub fn erase(&self, count: u16) {
        self.commands.send(commands::cmd_cwx_erase(count));
    }

    pub fn set_wpm(&self, wpm: u8) {
        if let Some(wpm) = self.wpm.try_set(wpm) {
            self.commands.send(commands::cmd_cwx_wpm(wpm));
        }
    }

    pub fn set_delay(&self, ms: u16) {
        let ms = flexlib_core::clamp(ms, &(0..=2000));
        if try_set_field(&self.state, |s| &mut s.delay, ms) {
            self.commands.send(commands::cmd_cwx_delay(ms));
        }
    }

    /// Store macro `index` (1-based). Out-of-range indices are ignored.
    pub fn save_macro(&self, index: usize, text: &str) {
        let Some(slot) = index.checked_sub(1).filter(|s| *s < MACRO_COUNT) else {
            return;
        };
        let changed = self.state.update(|s| {
            let changed = s.macros[slot] != text;
            s.macros[slot] = text.to_string();
            changed
        });
        if changed {
            self.commands
                .send(commands::cmd_cwx_macro_save(index as u8, text));
        }
    }

    /// Key macro `index` (1-based).
    pub fn send_macro(&self, index: usize) {
        if (1..=MACRO_COUNT).contains(&index) {
            self.commands.send(commands::cmd_cwx_macro_send(index as u8));
        }
    }

    /// `macro1` .. `macro12` to a zero-based slot.
    fn macro_slot(key: &str) -> Option<usize> {
        let n: usize = key.strip_prefix("macro")?.parse().ok()?;
        (1..=MACRO_COUNT).contains(&n).then(|| n - 1)
    }
}

impl StaticModel for Cwx {
    const KIND: ObjectKind = ObjectKind::Cwx;

    /// Expects the remainder to have been through
    /// [`escape`](crate::keyvalue::escape) before splitting.
    fn parse_properties(&self, properties: &[KeyValue]) {
        let st = &self.state;
        let k = Self::KIND;
        for kv in properties {
            if let Some(slot) = Self::macro_slot(&kv.key) {
                let text = unquote(&unescape(&kv.value)).to_string();
                st.write().macros[slot] = text;
                continue;
            }
            match CwxToken::parse(&kv.key) {
                CwxToken::Sent => store(st, k, kv, |s| &mut s.sent),
                CwxToken::Erase => store(st, k, kv, |s| &mut s.erased),
                CwxToken::Wpm => match kv.value.parse::<u8>() {
                    Ok(v) => self.wpm.set(v),
                    Err(_) => invalid_value(k, kv),
                },
                CwxToken::Delay => store(st, k, kv, |s| &mut s.delay),
                CwxToken::QskEnabled => store(st, k, kv, |s| &mut s.qsk_enabled),
                CwxToken::Unknown(_) => unknown_token(k, kv),
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::commands::testing::recording_commands;
    use crate::keyvalue::{escape, key_values};

    #[test]
    fn macros_survive_quoted_spaces_and_equals() {
        let (commands, _) = recording_commands();
        let cwx = Cwx::new(commands);
        let remainder = escape("macro1=\"CQ TEST DE N0CALL\" macro2=\"5NN=TU\" wpm=25 sent=3");
        cwx.parse_properties(&key_values(&remainder));
        assert_eq!(cwx.macro_text(1).as_deref(), Some("CQ TEST DE N0CALL"));
        assert_eq!(cwx.macro_text(2).as_deref(), Some("5NN=TU"));
        assert_eq!(cwx.macro_text(13), None);
        assert_eq!(cwx.wpm(), 25);
        assert_eq!(cwx.state().sent, 3);
    }

    #[test]
    fn send_and_macros() {
        let (commands, sink) = recording_commands();
        let cwx = Cwx::new(commands);
        cwx.send("CQ CQ");
        cwx.save_macro(3, "TU 73");
        cwx.save_macro(3, "TU 73");
        cwx.save_macro(0, "ignored");
        cwx.send_macro(3);
        cwx.set_wpm(30);
        assert_eq!(
            sink.texts(),
            vec![
                "cwx send \"CQ\u{7f}CQ\"",
                "cwx macro save 3 \"TU\u{7f}73\"",
                "cwx macro send 3",
                "cwx wpm 30",
            ]
        );
    }
}

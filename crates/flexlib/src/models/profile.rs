use std::sync::Arc;

use flexlib_core::Barrier;

use super::{DynamicModel, unknown_token};
use crate::commands::{self, Commands};
use crate::events::{ObjectKind, ObjectRef};
use crate::keyvalue::{KeyValue, parse_values};

wire_tokens! {
    enum ProfileToken {
        List => "list",
        Current => "current",
        Selection => "selection",
    }
}

/// Saved profiles of one kind.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ProfileState {
    pub list: Vec<String>,
    pub current: String,
}

/// One profile kind: `global`, `tx`, `mic` or `displays`.
///
/// Profile status lines are shaped `profile <kind> <token>=<value>` where a
/// list value uses `^` between names and may itself contain spaces, so the
/// session splits them on the first `=` rather than on spaces.
#[derive(Debug)]
pub struct Profile {
    id: String,
    commands: Arc<Commands>,
    state: Barrier<ProfileState>,
}

impl Profile {
    pub fn state(&self) -> ProfileState {
        self.state.get()
    }

    pub fn list(&self) -> Vec<String> {
        self.state.with(|s| s.list.clone())
    }

    pub fn current(&self) -> String {
        self.state.with(|s| s.current.clone())
    }

    /// Load a saved profile. Not shadowed; the radio reports `current=`.
    pub fn load(&self, name: &str) {
        self.commands.send(commands::cmd_profile_load(&self.id, name));
    }

    pub fn delete(&self, name: &str) {
        self.commands.send(commands::cmd_profile_delete(&self.id, name));
    }
}

impl DynamicModel for Profile {
    type Id = String;

    const KIND: ObjectKind = ObjectKind::Profile;

    fn new(id: String, commands: Arc<Commands>) -> Self {
        Profile {
            id,
            commands,
            state: Barrier::new(ProfileState::default()),
        }
    }

    fn id(&self) -> &String {
        &self.id
    }

    fn parse_id(raw: &str) -> Option<String> {
        match raw {
            "global" | "tx" | "mic" | "displays" => Some(raw.to_string()),
            _ => None,
        }
    }

    fn parse_properties(&self, properties: &[KeyValue]) {
        for kv in properties {
            match ProfileToken::parse(&kv.key) {
                ProfileToken::List => {
                    let list = parse_values(&kv.value, '^');
                    self.state.update(|s| s.list = list);
                }
                ProfileToken::Current | ProfileToken::Selection => {
                    let current = kv.value.trim().to_string();
                    self.state.update(|s| s.current = current);
                }
                ProfileToken::Unknown(_) => unknown_token(Self::KIND, kv),
            }
        }
    }

    fn into_ref(this: Arc<Self>) -> ObjectRef {
        ObjectRef::Profile(this)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::commands::testing::recording_commands;

    #[test]
    fn lists_split_on_caret() {
        let (commands, sink) = recording_commands();
        let profile = Profile::new("global".into(), commands);
        profile.parse_properties(&[KeyValue::new("list", "Default^Contest CW^SSB DX^")]);
        profile.parse_properties(&[KeyValue::new("current", "Contest CW")]);
        assert_eq!(profile.list(), vec!["Default", "Contest CW", "SSB DX"]);
        assert_eq!(profile.current(), "Contest CW");
        profile.load("SSB DX");
        assert_eq!(sink.texts(), vec!["profile global load \"SSB DX\""]);
    }
}

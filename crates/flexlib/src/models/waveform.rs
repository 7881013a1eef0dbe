use flexlib_core::Barrier;

use super::{StaticModel, unknown_token};
use crate::events::ObjectKind;
use crate::keyvalue::{KeyValue, parse_values};

wire_tokens! {
    enum WaveformToken {
        InstalledList => "installed_list",
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct WaveformState {
    /// Names of the installed waveforms, in the order reported.
    pub installed: Vec<String>,
}

/// Installed third-party waveforms.
#[derive(Debug, Default)]
pub struct Waveform {
    state: Barrier<WaveformState>,
}

impl Waveform {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn state(&self) -> WaveformState {
        self.state.get()
    }

    pub fn installed(&self) -> Vec<String> {
        self.state.with(|s| s.installed.clone())
    }
}

impl StaticModel for Waveform {
    const KIND: ObjectKind = ObjectKind::Waveform;

    fn parse_properties(&self, properties: &[KeyValue]) {
        for kv in properties {
            match WaveformToken::parse(&kv.key) {
                WaveformToken::InstalledList => {
                    let list = parse_values(&kv.value, ',');
                    self.state.write().installed = list;
                }
                WaveformToken::Unknown(_) => unknown_token(Self::KIND, kv),
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::keyvalue::key_values;

    #[test]
    fn installed_list() {
        let waveform = Waveform::new();
        waveform.parse_properties(&key_values("installed_list=FreeDV,RADE"));
        assert_eq!(waveform.installed(), vec!["FreeDV", "RADE"]);
        waveform.parse_properties(&key_values("installed_list="));
        assert!(waveform.installed().is_empty());
    }
}

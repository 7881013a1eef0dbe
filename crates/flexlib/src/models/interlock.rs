use std::sync::Arc;

use flexlib_core::{Barrier, try_set_field};

use super::{StaticModel, parse_hex, store, store_with, unknown_token};
use crate::commands::{self, Commands};
use crate::events::ObjectKind;
use crate::keyvalue::KeyValue;

wire_tokens! {
    enum InterlockToken {
        State => "state",
        Reason => "reason",
        Source => "source",
        TxAllowed => "tx_allowed",
        TxClientHandle => "tx_client_handle",
        Timeout => "timeout",
        AccTxEnabled => "acc_tx_enabled",
        AccTxDelay => "acc_tx_delay",
        AccTxReqEnabled => "acc_txreq_enable",
        AccTxReqPolarity => "acc_txreq_polarity",
        RcaTxReqEnabled => "rca_txreq_enable",
        RcaTxReqPolarity => "rca_txreq_polarity",
        Tx1Enabled => "tx1_enabled",
        Tx1Delay => "tx1_delay",
        Tx2Enabled => "tx2_enabled",
        Tx2Delay => "tx2_delay",
        Tx3Enabled => "tx3_enabled",
        Tx3Delay => "tx3_delay",
        TxDelay => "tx_delay",
        Amplifier => "amplifier",
    }
}

/// Transmit interlock properties.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct InterlockState {
    /// e.g. `RECEIVE`, `READY`, `PTT_REQUESTED`, `TRANSMITTING`.
    pub state: String,
    pub reason: String,
    pub source: String,
    pub tx_allowed: bool,
    pub tx_client_handle: u32,
    /// Transmit timeout in milliseconds.
    pub timeout: u32,
    pub acc_tx_enabled: bool,
    pub acc_tx_delay: u32,
    pub acc_txreq_enabled: bool,
    pub acc_txreq_polarity: bool,
    pub rca_txreq_enabled: bool,
    pub rca_txreq_polarity: bool,
    pub tx1_enabled: bool,
    pub tx1_delay: u32,
    pub tx2_enabled: bool,
    pub tx2_delay: u32,
    pub tx3_enabled: bool,
    pub tx3_delay: u32,
    pub tx_delay: u32,
    pub amplifier: String,
}

#[derive(Debug)]
pub struct Interlock {
    commands: Arc<Commands>,
    state: Barrier<InterlockState>,
}

impl Interlock {
    pub fn new(commands: Arc<Commands>) -> Self {
        Interlock {
            commands,
            state: Barrier::new(InterlockState::default()),
        }
    }

    pub fn state(&self) -> InterlockState {
        self.state.get()
    }

    /// The interlock state name.
    pub fn state_name(&self) -> String {
        self.state.with(|s| s.state.clone())
    }

    pub fn set_timeout(&self, ms: u32) {
        if try_set_field(&self.state, |s| &mut s.timeout, ms) {
            self.commands.send(commands::cmd_interlock("timeout", ms));
        }
    }

    pub fn set_tx_delay(&self, ms: u32) {
        if try_set_field(&self.state, |s| &mut s.tx_delay, ms) {
            self.commands.send(commands::cmd_interlock("tx_delay", ms));
        }
    }

    pub fn set_acc_tx_enabled(&self, enabled: bool) {
        if try_set_field(&self.state, |s| &mut s.acc_tx_enabled, enabled) {
            self.commands.send(commands::cmd_interlock(
                "acc_tx_enabled",
                flexlib_core::bool_flag(enabled),
            ));
        }
    }
}

impl StaticModel for Interlock {
    const KIND: ObjectKind = ObjectKind::Interlock;

    fn parse_properties(&self, properties: &[KeyValue]) {
        let st = &self.state;
        let k = Self::KIND;
        for kv in properties {
            match InterlockToken::parse(&kv.key) {
                InterlockToken::State => store(st, k, kv, |s| &mut s.state),
                InterlockToken::Reason => store(st, k, kv, |s| &mut s.reason),
                InterlockToken::Source => store(st, k, kv, |s| &mut s.source),
                InterlockToken::TxAllowed => store(st, k, kv, |s| &mut s.tx_allowed),
                InterlockToken::TxClientHandle => {
                    store_with(st, k, kv, parse_hex, |s| &mut s.tx_client_handle)
                }
                InterlockToken::Timeout => store(st, k, kv, |s| &mut s.timeout),
                InterlockToken::AccTxEnabled => store(st, k, kv, |s| &mut s.acc_tx_enabled),
                InterlockToken::AccTxDelay => store(st, k, kv, |s| &mut s.acc_tx_delay),
                InterlockToken::AccTxReqEnabled => store(st, k, kv, |s| &mut s.acc_txreq_enabled),
                InterlockToken::AccTxReqPolarity => {
                    store(st, k, kv, |s| &mut s.acc_txreq_polarity)
                }
                InterlockToken::RcaTxReqEnabled => store(st, k, kv, |s| &mut s.rca_txreq_enabled),
                InterlockToken::RcaTxReqPolarity => {
                    store(st, k, kv, |s| &mut s.rca_txreq_polarity)
                }
                InterlockToken::Tx1Enabled => store(st, k, kv, |s| &mut s.tx1_enabled),
                InterlockToken::Tx1Delay => store(st, k, kv, |s| &mut s.tx1_delay),
                InterlockToken::Tx2Enabled => store(st, k, kv, |s| &mut s.tx2_enabled),
                InterlockToken::Tx2Delay => store(st, k, kv, |s| &mut s.tx2_delay),
                InterlockToken::Tx3Enabled => store(st, k, kv, |s| &mut s.tx3_enabled),
                InterlockToken::Tx3Delay => store(st, k, kv, |s| &mut s.tx3_delay),
                InterlockToken::TxDelay => store(st, k, kv, |s| &mut s.tx_delay),
                InterlockToken::Amplifier => store(st, k, kv, |s| &mut s.amplifier),
                InterlockToken::Unknown(_) => unknown_token(k, kv),
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::commands::testing::recording_commands;
    use crate::keyvalue::key_values;

    #[test]
    fn interlock_status() {
        let (commands, sink) = recording_commands();
        let interlock = Interlock::new(commands);
        interlock.parse_properties(&key_values(
            "state=TRANSMITTING tx_allowed=1 source=SW tx_client_handle=0x2D8A3C1F timeout=120000",
        ));
        assert_eq!(interlock.state_name(), "TRANSMITTING");
        let s = interlock.state();
        assert_eq!(s.tx_client_handle, 0x2D8A_3C1F);
        assert_eq!(s.timeout, 120_000);
        interlock.set_timeout(60_000);
        assert_eq!(sink.texts(), vec!["interlock timeout=60000"]);
    }
}

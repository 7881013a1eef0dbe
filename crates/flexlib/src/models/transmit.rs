use std::sync::Arc;

use flexlib_core::{Barrier, ClampedBarrier, bool_flag, try_set_field};

use super::{StaticModel, invalid_value, parse_mhz, store, store_with, unknown_token};
use crate::commands::{self, Commands};
use crate::events::ObjectKind;
use crate::keyvalue::KeyValue;

wire_tokens! {
    enum TransmitToken {
        Frequency => "freq",
        RfPower => "rfpower",
        TunePower => "tunepower",
        Tune => "tune",
        TxFilterLow => "lo",
        TxFilterHigh => "hi",
        TxRfPowerChangesAllowed => "tx_rf_power_changes_allowed",
        MaxPowerLevel => "max_power_level",
        AmCarrierLevel => "am_carrier_level",
        CompanderOn => "compander",
        CompanderLevel => "compander_level",
        DaxEnabled => "dax",
        HwAlcEnabled => "hwalc_enabled",
        Inhibit => "inhibit",
        MetInRx => "met_in_rx",
        MicAcc => "mic_acc",
        MicBias => "mic_bias",
        MicBoost => "mic_boost",
        MicLevel => "miclevel",
        MicSelection => "mic_selection",
        Monitor => "sb_monitor",
        MonGainSb => "mon_gain_sb",
        MonPanSb => "mon_pan_sb",
        MonGainCw => "mon_gain_cw",
        MonPanCw => "mon_pan_cw",
        RawIqEnabled => "raw_iq_enable",
        SpeechProcessorEnabled => "speech_processor_enable",
        SpeechProcessorLevel => "speech_processor_level",
        TxInWaterfall => "show_tx_in_waterfall",
        TxMonitorAvailable => "tx_monitor_available",
        TxSliceMode => "tx_slice_mode",
        VoxEnabled => "vox_enable",
        VoxDelay => "vox_delay",
        VoxLevel => "vox_level",
        CwBreakIn => "break_in",
        CwBreakInDelay => "break_in_delay",
        CwIambic => "iambic",
        CwIambicMode => "iambic_mode",
        CwPitch => "pitch",
        CwSidetone => "sidetone",
        CwSpeed => "speed",
        CwSwapPaddles => "swap_paddles",
        CwSyncCwx => "synccwx",
        CwlEnabled => "cwl_enabled",
    }
}

/// Transmitter, mic and CW keyer properties.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct TransmitState {
    /// Transmit frequency in Hz.
    pub frequency: u64,
    pub tune: bool,
    pub tx_filter_low: i32,
    pub tx_filter_high: i32,
    pub tx_rf_power_changes_allowed: bool,
    pub max_power_level: u8,
    pub am_carrier_level: u8,
    pub compander: bool,
    pub compander_level: u8,
    pub dax: bool,
    pub hw_alc_enabled: bool,
    pub inhibit: bool,
    pub met_in_rx: bool,
    pub mic_acc: bool,
    pub mic_bias: bool,
    pub mic_boost: bool,
    pub mic_level: u8,
    pub mic_selection: String,
    pub monitor: bool,
    pub mon_gain_sb: u8,
    pub mon_pan_sb: u8,
    pub mon_gain_cw: u8,
    pub mon_pan_cw: u8,
    pub raw_iq_enabled: bool,
    pub speech_processor_enabled: bool,
    pub speech_processor_level: u8,
    pub tx_in_waterfall: bool,
    pub tx_monitor_available: bool,
    pub tx_slice_mode: String,
    pub vox_enabled: bool,
    pub vox_delay: u8,
    pub vox_level: u8,
    pub cw_break_in: bool,
    pub cw_break_in_delay: u16,
    pub cw_iambic: bool,
    /// `true` for iambic mode B.
    pub cw_iambic_mode_b: bool,
    pub cw_pitch: u16,
    pub cw_sidetone: bool,
    pub cw_swap_paddles: bool,
    pub cw_sync_cwx: bool,
    pub cwl_enabled: bool,
}

/// The transmitter.
#[derive(Debug)]
pub struct Transmit {
    commands: Arc<Commands>,
    state: Barrier<TransmitState>,
    rf_power: ClampedBarrier<u8>,
    tune_power: ClampedBarrier<u8>,
    cw_speed: ClampedBarrier<u8>,
}

impl Transmit {
    pub fn new(commands: Arc<Commands>) -> Self {
        Transmit {
            commands,
            state: Barrier::new(TransmitState::default()),
            rf_power: ClampedBarrier::new(0, 0..=100),
            tune_power: ClampedBarrier::new(0, 0..=100),
            cw_speed: ClampedBarrier::new(20, 5..=100),
        }
    }

    pub fn state(&self) -> TransmitState {
        self.state.get()
    }

    pub fn rf_power(&self) -> u8 {
        self.rf_power.get()
    }

    pub fn tune_power(&self) -> u8 {
        self.tune_power.get()
    }

    pub fn cw_speed(&self) -> u8 {
        self.cw_speed.get()
    }

    /// Clamped to 0..=100.
    pub fn set_rf_power(&self, power: u8) {
        if let Some(power) = self.rf_power.try_set(power) {
            self.commands.send(commands::cmd_transmit_set("rfpower", power));
        }
    }

    /// Clamped to 0..=100.
    pub fn set_tune_power(&self, power: u8) {
        if let Some(power) = self.tune_power.try_set(power) {
            self.commands.send(commands::cmd_transmit_set("tunepower", power));
        }
    }

    pub fn set_tune(&self, on: bool) {
        if try_set_field(&self.state, |s| &mut s.tune, on) {
            self.commands.send(commands::cmd_transmit_tune(on));
        }
    }

    pub fn set_tx_filter(&self, low: i32, high: i32) {
        let changed = self.state.update(|s| {
            let changed = s.tx_filter_low != low || s.tx_filter_high != high;
            s.tx_filter_low = low;
            s.tx_filter_high = high;
            changed
        });
        if changed {
            self.commands.send(commands::cmd_transmit_filter(low, high));
        }
    }

    pub fn set_mic_level(&self, level: u8) {
        let level = flexlib_core::clamp(level, &(0..=100));
        if try_set_field(&self.state, |s| &mut s.mic_level, level) {
            self.commands.send(commands::cmd_transmit_set("miclevel", level));
        }
    }

    pub fn set_mic_selection(&self, input: &str) {
        if try_set_field(&self.state, |s| &mut s.mic_selection, input.to_string()) {
            self.commands.send(commands::cmd_mic_input(input));
        }
    }

    pub fn set_mic_boost(&self, on: bool) {
        if try_set_field(&self.state, |s| &mut s.mic_boost, on) {
            self.commands.send(commands::cmd_mic("boost", on));
        }
    }

    pub fn set_mic_bias(&self, on: bool) {
        if try_set_field(&self.state, |s| &mut s.mic_bias, on) {
            self.commands.send(commands::cmd_mic("bias", on));
        }
    }

    pub fn set_mic_acc(&self, on: bool) {
        if try_set_field(&self.state, |s| &mut s.mic_acc, on) {
            self.commands.send(commands::cmd_mic("acc", on));
        }
    }

    pub fn set_vox_enabled(&self, on: bool) {
        if try_set_field(&self.state, |s| &mut s.vox_enabled, on) {
            self.commands
                .send(commands::cmd_transmit_set("vox_enable", bool_flag(on)));
        }
    }

    pub fn set_speech_processor_enabled(&self, on: bool) {
        if try_set_field(&self.state, |s| &mut s.speech_processor_enabled, on) {
            self.commands.send(commands::cmd_transmit_set(
                "speech_processor_enable",
                bool_flag(on),
            ));
        }
    }

    /// Keyer speed, clamped to 5..=100 wpm.
    pub fn set_cw_speed(&self, wpm: u8) {
        if let Some(wpm) = self.cw_speed.try_set(wpm) {
            self.commands.send(commands::cmd_cw_wpm(wpm));
        }
    }

    /// Clamped to 100..=6000 Hz.
    pub fn set_cw_pitch(&self, hz: u16) {
        let hz = flexlib_core::clamp(hz, &(100..=6000));
        if try_set_field(&self.state, |s| &mut s.cw_pitch, hz) {
            self.commands.send(commands::cmd_cw_pitch(hz));
        }
    }

    pub fn set_cw_iambic(&self, on: bool) {
        if try_set_field(&self.state, |s| &mut s.cw_iambic, on) {
            self.commands.send(commands::cmd_cw_iambic(on));
        }
    }

    pub fn set_cw_iambic_mode_b(&self, mode_b: bool) {
        if try_set_field(&self.state, |s| &mut s.cw_iambic_mode_b, mode_b) {
            self.commands.send(commands::cmd_cw_iambic_mode(mode_b));
        }
    }

    pub fn set_cw_swap_paddles(&self, on: bool) {
        if try_set_field(&self.state, |s| &mut s.cw_swap_paddles, on) {
            self.commands.send(commands::cmd_cw_swap(on));
        }
    }

    pub fn set_cw_sidetone(&self, on: bool) {
        if try_set_field(&self.state, |s| &mut s.cw_sidetone, on) {
            self.commands.send(commands::cmd_cw_sidetone(on));
        }
    }

    pub fn set_cw_break_in(&self, on: bool) {
        if try_set_field(&self.state, |s| &mut s.cw_break_in, on) {
            self.commands.send(commands::cmd_cw_break_in(on));
        }
    }

    /// Clamped to 0..=2000 ms.
    pub fn set_cw_break_in_delay(&self, ms: u16) {
        let ms = flexlib_core::clamp(ms, &(0..=2000));
        if try_set_field(&self.state, |s| &mut s.cw_break_in_delay, ms) {
            self.commands.send(commands::cmd_cw_break_in_delay(ms));
        }
    }
}

impl StaticModel for Transmit {
    const KIND: ObjectKind = ObjectKind::Transmit;

    fn parse_properties(&self, properties: &[KeyValue]) {
        let st = &self.state;
        let k = Self::KIND;
        let clamped = |barrier: &ClampedBarrier<u8>, kv: &KeyValue| match kv.value.parse::<u8>() {
            Ok(v) => barrier.set(v),
            Err(_) => invalid_value(k, kv),
        };
        for kv in properties {
            match TransmitToken::parse(&kv.key) {
                TransmitToken::Frequency => store_with(st, k, kv, parse_mhz, |s| &mut s.frequency),
                TransmitToken::RfPower => clamped(&self.rf_power, kv),
                TransmitToken::TunePower => clamped(&self.tune_power, kv),
                TransmitToken::CwSpeed => clamped(&self.cw_speed, kv),
                TransmitToken::Tune => store(st, k, kv, |s| &mut s.tune),
                TransmitToken::TxFilterLow => store(st, k, kv, |s| &mut s.tx_filter_low),
                TransmitToken::TxFilterHigh => store(st, k, kv, |s| &mut s.tx_filter_high),
                TransmitToken::TxRfPowerChangesAllowed => {
                    store(st, k, kv, |s| &mut s.tx_rf_power_changes_allowed)
                }
                TransmitToken::MaxPowerLevel => store(st, k, kv, |s| &mut s.max_power_level),
                TransmitToken::AmCarrierLevel => store(st, k, kv, |s| &mut s.am_carrier_level),
                TransmitToken::CompanderOn => store(st, k, kv, |s| &mut s.compander),
                TransmitToken::CompanderLevel => store(st, k, kv, |s| &mut s.compander_level),
                TransmitToken::DaxEnabled => store(st, k, kv, |s| &mut s.dax),
                TransmitToken::HwAlcEnabled => store(st, k, kv, |s| &mut s.hw_alc_enabled),
                TransmitToken::Inhibit => store(st, k, kv, |s| &mut s.inhibit),
                TransmitToken::MetInRx => store(st, k, kv, |s| &mut s.met_in_rx),
                TransmitToken::MicAcc => store(st, k, kv, |s| &mut s.mic_acc),
                TransmitToken::MicBias => store(st, k, kv, |s| &mut s.mic_bias),
                TransmitToken::MicBoost => store(st, k, kv, |s| &mut s.mic_boost),
                TransmitToken::MicLevel => store(st, k, kv, |s| &mut s.mic_level),
                TransmitToken::MicSelection => store(st, k, kv, |s| &mut s.mic_selection),
                TransmitToken::Monitor => store(st, k, kv, |s| &mut s.monitor),
                TransmitToken::MonGainSb => store(st, k, kv, |s| &mut s.mon_gain_sb),
                TransmitToken::MonPanSb => store(st, k, kv, |s| &mut s.mon_pan_sb),
                TransmitToken::MonGainCw => store(st, k, kv, |s| &mut s.mon_gain_cw),
                TransmitToken::MonPanCw => store(st, k, kv, |s| &mut s.mon_pan_cw),
                TransmitToken::RawIqEnabled => store(st, k, kv, |s| &mut s.raw_iq_enabled),
                TransmitToken::SpeechProcessorEnabled => {
                    store(st, k, kv, |s| &mut s.speech_processor_enabled)
                }
                TransmitToken::SpeechProcessorLevel => {
                    store(st, k, kv, |s| &mut s.speech_processor_level)
                }
                TransmitToken::TxInWaterfall => store(st, k, kv, |s| &mut s.tx_in_waterfall),
                TransmitToken::TxMonitorAvailable => {
                    store(st, k, kv, |s| &mut s.tx_monitor_available)
                }
                TransmitToken::TxSliceMode => store(st, k, kv, |s| &mut s.tx_slice_mode),
                TransmitToken::VoxEnabled => store(st, k, kv, |s| &mut s.vox_enabled),
                TransmitToken::VoxDelay => store(st, k, kv, |s| &mut s.vox_delay),
                TransmitToken::VoxLevel => store(st, k, kv, |s| &mut s.vox_level),
                TransmitToken::CwBreakIn => store(st, k, kv, |s| &mut s.cw_break_in),
                TransmitToken::CwBreakInDelay => store(st, k, kv, |s| &mut s.cw_break_in_delay),
                TransmitToken::CwIambic => store(st, k, kv, |s| &mut s.cw_iambic),
                TransmitToken::CwIambicMode => store(st, k, kv, |s| &mut s.cw_iambic_mode_b),
                TransmitToken::CwPitch => store(st, k, kv, |s| &mut s.cw_pitch),
                TransmitToken::CwSidetone => store(st, k, kv, |s| &mut s.cw_sidetone),
                TransmitToken::CwSwapPaddles => store(st, k, kv, |s| &mut s.cw_swap_paddles),
                TransmitToken::CwSyncCwx => store(st, k, kv, |s| &mut s.cw_sync_cwx),
                TransmitToken::CwlEnabled => store(st, k, kv, |s| &mut s.cwl_enabled),
                TransmitToken::Unknown(_) => unknown_token(k, kv),
            }
        }
    }
}

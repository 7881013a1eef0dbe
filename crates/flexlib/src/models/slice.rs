use std::sync::Arc;

use flexlib_core::{Barrier, ClampedBarrier, try_set_field};

use super::{DynamicModel, invalid_value, parse_hex, parse_mhz, store, store_with, unknown_token};
use crate::commands::{self, Commands};
use crate::events::{ObjectKind, ObjectRef};
use crate::keyvalue::KeyValue;

wire_tokens! {
    enum SliceToken {
        InUse => "in_use",
        Frequency => "rf_frequency" | "freq",
        Mode => "mode",
        ModeList => "mode_list",
        FilterLow => "filter_lo",
        FilterHigh => "filter_hi",
        RxAnt => "rxant",
        TxAnt => "txant",
        RxAntList => "ant_list",
        TxAntList => "tx_ant_list",
        Tx => "tx",
        Active => "active",
        Panadapter => "pan",
        Dax => "dax",
        DaxClients => "dax_clients",
        AudioLevel => "audio_level" | "audio_gain",
        AudioPan => "audio_pan",
        AudioMute => "audio_mute",
        AgcMode => "agc_mode",
        AgcThreshold => "agc_threshold",
        AgcOffLevel => "agc_off_level",
        Nb => "nb",
        NbLevel => "nb_level",
        Nr => "nr",
        NrLevel => "nr_level",
        Anf => "anf",
        AnfLevel => "anf_level",
        Wnb => "wnb",
        WnbLevel => "wnb_level",
        Apf => "apf",
        ApfLevel => "apf_level",
        RitOn => "rit_on",
        RitFreq => "rit_freq",
        XitOn => "xit_on",
        XitFreq => "xit_freq",
        Step => "step",
        StepList => "step_list",
        Lock => "lock",
        Squelch => "squelch",
        SquelchLevel => "squelch_level",
        IndexLetter => "index_letter",
        ClientHandle => "client_handle",
        Owner => "owner",
        Diversity => "diversity",
        DiversityParent => "diversity_parent",
        DiversityChild => "diversity_child",
        Wide => "wide",
        Loopa => "loopa",
        Loopb => "loopb",
        Qsk => "qsk",
        RecordEnabled => "record",
        Play => "play",
        DetachedFromSlice => "detached",
        RttyMark => "rtty_mark",
        RttyShift => "rtty_shift",
        DiglOffset => "digl_offset",
        DiguOffset => "digu_offset",
        PostDemodLow => "post_demod_low",
        PostDemodHigh => "post_demod_high",
        PostDemodBypass => "post_demod_bypass",
        FmToneMode => "fm_tone_mode",
        FmToneValue => "fm_tone_value",
        FmRepeaterOffset => "fm_repeater_offset_freq",
        RepeaterOffsetDir => "repeater_offset_dir",
        Ghost => "ghost",
    }
}

/// Properties of one receiver slice.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SliceState {
    pub in_use: bool,
    /// Tuned frequency in Hz.
    pub frequency: u64,
    pub mode: String,
    pub mode_list: Vec<String>,
    pub filter_low: i32,
    pub filter_high: i32,
    pub rx_ant: String,
    pub tx_ant: String,
    pub rx_ant_list: Vec<String>,
    pub tx_ant_list: Vec<String>,
    pub tx: bool,
    pub active: bool,
    /// Stream id of the panadapter this slice is shown on.
    pub panadapter_id: u32,
    pub dax_channel: u8,
    pub dax_clients: u8,
    pub audio_pan: u8,
    pub audio_mute: bool,
    pub agc_mode: String,
    pub agc_threshold: u8,
    pub agc_off_level: u8,
    pub nb: bool,
    pub nb_level: u8,
    pub nr: bool,
    pub nr_level: u8,
    pub anf: bool,
    pub anf_level: u8,
    pub wnb: bool,
    pub wnb_level: u8,
    pub apf: bool,
    pub apf_level: u8,
    pub rit_on: bool,
    pub rit_freq: i32,
    pub xit_on: bool,
    pub xit_freq: i32,
    pub step: u32,
    pub step_list: Vec<String>,
    pub locked: bool,
    pub squelch: bool,
    pub squelch_level: u8,
    pub index_letter: String,
    pub client_handle: u32,
    pub owner: u32,
    pub diversity: bool,
    pub diversity_parent: bool,
    pub diversity_child: bool,
    pub wide: bool,
    pub loop_a: bool,
    pub loop_b: bool,
    pub qsk: bool,
    pub record: bool,
    pub play: String,
    pub detached: bool,
    pub rtty_mark: i32,
    pub rtty_shift: i32,
    pub digl_offset: i32,
    pub digu_offset: i32,
    pub post_demod_low: i32,
    pub post_demod_high: i32,
    pub post_demod_bypass: bool,
    pub fm_tone_mode: String,
    pub fm_tone_value: String,
    /// FM repeater offset in Hz.
    pub fm_repeater_offset: u64,
    pub repeater_offset_dir: String,
    pub ghost: bool,
}

/// A receiver slice.
#[derive(Debug)]
pub struct Slice {
    id: u16,
    commands: Arc<Commands>,
    state: Barrier<SliceState>,
    audio_level: ClampedBarrier<u8>,
}

impl Slice {
    /// Snapshot of the current properties.
    pub fn state(&self) -> SliceState {
        self.state.get()
    }

    pub fn frequency(&self) -> u64 {
        self.state.with(|s| s.frequency)
    }

    pub fn mode(&self) -> String {
        self.state.with(|s| s.mode.clone())
    }

    pub fn audio_level(&self) -> u8 {
        self.audio_level.get()
    }

    pub fn set_frequency(&self, hz: u64) {
        if try_set_field(&self.state, |s| &mut s.frequency, hz) {
            self.commands.send(commands::cmd_slice_tune(self.id, hz));
        }
    }

    pub fn set_mode(&self, mode: &str) {
        if try_set_field(&self.state, |s| &mut s.mode, mode.to_string()) {
            self.commands.send(commands::cmd_slice_set(self.id, "mode", mode));
        }
    }

    pub fn set_filter(&self, low: i32, high: i32) {
        let changed = self.state.update(|s| {
            let changed = s.filter_low != low || s.filter_high != high;
            s.filter_low = low;
            s.filter_high = high;
            changed
        });
        if changed {
            self.commands.send(commands::cmd_slice_filter(self.id, low, high));
        }
    }

    /// Clamped to 0..=100.
    pub fn set_audio_level(&self, level: u8) {
        if let Some(level) = self.audio_level.try_set(level) {
            self.commands
                .send(commands::cmd_slice_set(self.id, "audio_level", level));
        }
    }

    pub fn set_audio_mute(&self, mute: bool) {
        self.set_flag(|s| &mut s.audio_mute, "audio_mute", mute);
    }

    pub fn set_active(&self, active: bool) {
        self.set_flag(|s| &mut s.active, "active", active);
    }

    pub fn set_tx(&self, tx: bool) {
        self.set_flag(|s| &mut s.tx, "tx", tx);
    }

    pub fn set_nb(&self, on: bool) {
        self.set_flag(|s| &mut s.nb, "nb", on);
    }

    pub fn set_nr(&self, on: bool) {
        self.set_flag(|s| &mut s.nr, "nr", on);
    }

    pub fn set_anf(&self, on: bool) {
        self.set_flag(|s| &mut s.anf, "anf", on);
    }

    pub fn set_rit(&self, on: bool, offset_hz: i32) {
        self.set_flag(|s| &mut s.rit_on, "rit_on", on);
        if try_set_field(&self.state, |s| &mut s.rit_freq, offset_hz) {
            self.commands
                .send(commands::cmd_slice_set(self.id, "rit_freq", offset_hz));
        }
    }

    pub fn set_rx_antenna(&self, antenna: &str) {
        if try_set_field(&self.state, |s| &mut s.rx_ant, antenna.to_string()) {
            self.commands
                .send(commands::cmd_slice_set(self.id, "rxant", antenna));
        }
    }

    pub fn set_locked(&self, locked: bool) {
        if try_set_field(&self.state, |s| &mut s.locked, locked) {
            self.commands.send(commands::cmd_slice_lock(self.id, locked));
        }
    }

    /// Ask the radio to remove this slice. The registry entry goes away when
    /// the radio reports `in_use=0`.
    pub fn remove(&self) {
        self.commands.send(commands::cmd_slice_remove(self.id));
    }

    fn set_flag(&self, field: impl FnOnce(&mut SliceState) -> &mut bool, token: &str, on: bool) {
        if try_set_field(&self.state, field, on) {
            self.commands
                .send(commands::cmd_slice_set(self.id, token, flexlib_core::bool_flag(on)));
        }
    }
}

impl DynamicModel for Slice {
    type Id = u16;

    const KIND: ObjectKind = ObjectKind::Slice;

    fn new(id: u16, commands: Arc<Commands>) -> Self {
        Slice {
            id,
            commands,
            state: Barrier::new(SliceState::default()),
            audio_level: ClampedBarrier::new(50, 0..=100),
        }
    }

    fn id(&self) -> &u16 {
        &self.id
    }

    fn parse_id(raw: &str) -> Option<u16> {
        raw.parse().ok()
    }

    fn parse_properties(&self, properties: &[KeyValue]) {
        let st = &self.state;
        let k = Self::KIND;
        for kv in properties {
            match SliceToken::parse(&kv.key) {
                SliceToken::InUse => store(st, k, kv, |s| &mut s.in_use),
                SliceToken::Frequency => store_with(st, k, kv, parse_mhz, |s| &mut s.frequency),
                SliceToken::Mode => store(st, k, kv, |s| &mut s.mode),
                SliceToken::ModeList => store(st, k, kv, |s| &mut s.mode_list),
                SliceToken::FilterLow => store(st, k, kv, |s| &mut s.filter_low),
                SliceToken::FilterHigh => store(st, k, kv, |s| &mut s.filter_high),
                SliceToken::RxAnt => store(st, k, kv, |s| &mut s.rx_ant),
                SliceToken::TxAnt => store(st, k, kv, |s| &mut s.tx_ant),
                SliceToken::RxAntList => store(st, k, kv, |s| &mut s.rx_ant_list),
                SliceToken::TxAntList => store(st, k, kv, |s| &mut s.tx_ant_list),
                SliceToken::Tx => store(st, k, kv, |s| &mut s.tx),
                SliceToken::Active => store(st, k, kv, |s| &mut s.active),
                SliceToken::Panadapter => store_with(st, k, kv, parse_hex, |s| &mut s.panadapter_id),
                SliceToken::Dax => store(st, k, kv, |s| &mut s.dax_channel),
                SliceToken::DaxClients => store(st, k, kv, |s| &mut s.dax_clients),
                SliceToken::AudioLevel => match kv.value.parse::<u8>() {
                    Ok(level) => self.audio_level.set(level),
                    Err(_) => invalid_value(k, kv),
                },
                SliceToken::AudioPan => store(st, k, kv, |s| &mut s.audio_pan),
                SliceToken::AudioMute => store(st, k, kv, |s| &mut s.audio_mute),
                SliceToken::AgcMode => store(st, k, kv, |s| &mut s.agc_mode),
                SliceToken::AgcThreshold => store(st, k, kv, |s| &mut s.agc_threshold),
                SliceToken::AgcOffLevel => store(st, k, kv, |s| &mut s.agc_off_level),
                SliceToken::Nb => store(st, k, kv, |s| &mut s.nb),
                SliceToken::NbLevel => store(st, k, kv, |s| &mut s.nb_level),
                SliceToken::Nr => store(st, k, kv, |s| &mut s.nr),
                SliceToken::NrLevel => store(st, k, kv, |s| &mut s.nr_level),
                SliceToken::Anf => store(st, k, kv, |s| &mut s.anf),
                SliceToken::AnfLevel => store(st, k, kv, |s| &mut s.anf_level),
                SliceToken::Wnb => store(st, k, kv, |s| &mut s.wnb),
                SliceToken::WnbLevel => store(st, k, kv, |s| &mut s.wnb_level),
                SliceToken::Apf => store(st, k, kv, |s| &mut s.apf),
                SliceToken::ApfLevel => store(st, k, kv, |s| &mut s.apf_level),
                SliceToken::RitOn => store(st, k, kv, |s| &mut s.rit_on),
                SliceToken::RitFreq => store(st, k, kv, |s| &mut s.rit_freq),
                SliceToken::XitOn => store(st, k, kv, |s| &mut s.xit_on),
                SliceToken::XitFreq => store(st, k, kv, |s| &mut s.xit_freq),
                SliceToken::Step => store(st, k, kv, |s| &mut s.step),
                SliceToken::StepList => store(st, k, kv, |s| &mut s.step_list),
                SliceToken::Lock => store(st, k, kv, |s| &mut s.locked),
                SliceToken::Squelch => store(st, k, kv, |s| &mut s.squelch),
                SliceToken::SquelchLevel => store(st, k, kv, |s| &mut s.squelch_level),
                SliceToken::IndexLetter => store(st, k, kv, |s| &mut s.index_letter),
                SliceToken::ClientHandle => store_with(st, k, kv, parse_hex, |s| &mut s.client_handle),
                SliceToken::Owner => store_with(st, k, kv, parse_hex, |s| &mut s.owner),
                SliceToken::Diversity => store(st, k, kv, |s| &mut s.diversity),
                SliceToken::DiversityParent => store(st, k, kv, |s| &mut s.diversity_parent),
                SliceToken::DiversityChild => store(st, k, kv, |s| &mut s.diversity_child),
                SliceToken::Wide => store(st, k, kv, |s| &mut s.wide),
                SliceToken::Loopa => store(st, k, kv, |s| &mut s.loop_a),
                SliceToken::Loopb => store(st, k, kv, |s| &mut s.loop_b),
                SliceToken::Qsk => store(st, k, kv, |s| &mut s.qsk),
                SliceToken::RecordEnabled => store(st, k, kv, |s| &mut s.record),
                SliceToken::Play => store(st, k, kv, |s| &mut s.play),
                SliceToken::DetachedFromSlice => store(st, k, kv, |s| &mut s.detached),
                SliceToken::RttyMark => store(st, k, kv, |s| &mut s.rtty_mark),
                SliceToken::RttyShift => store(st, k, kv, |s| &mut s.rtty_shift),
                SliceToken::DiglOffset => store(st, k, kv, |s| &mut s.digl_offset),
                SliceToken::DiguOffset => store(st, k, kv, |s| &mut s.digu_offset),
                SliceToken::PostDemodLow => store(st, k, kv, |s| &mut s.post_demod_low),
                SliceToken::PostDemodHigh => store(st, k, kv, |s| &mut s.post_demod_high),
                SliceToken::PostDemodBypass => store(st, k, kv, |s| &mut s.post_demod_bypass),
                SliceToken::FmToneMode => store(st, k, kv, |s| &mut s.fm_tone_mode),
                SliceToken::FmToneValue => store(st, k, kv, |s| &mut s.fm_tone_value),
                SliceToken::FmRepeaterOffset => {
                    store_with(st, k, kv, parse_mhz, |s| &mut s.fm_repeater_offset)
                }
                SliceToken::RepeaterOffsetDir => store(st, k, kv, |s| &mut s.repeater_offset_dir),
                SliceToken::Ghost => store(st, k, kv, |s| &mut s.ghost),
                SliceToken::Unknown(_) => unknown_token(k, kv),
            }
        }
    }

    fn into_ref(this: Arc<Self>) -> ObjectRef {
        ObjectRef::Slice(this)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::commands::testing::recording_commands;
    use crate::keyvalue::key_values;

    #[test]
    fn parse_slice_status() {
        let (commands, _) = recording_commands();
        let slice = Slice::new(0, commands);
        slice.parse_properties(&key_values(
            "in_use=1 RF_frequency=14.250000 mode=USB filter_lo=100 filter_hi=2900 \
             pan=0x40000000 tx=1 ant_list=ANT1,ANT2,RX_A audio_level=70",
        ));
        let s = slice.state();
        assert!(s.in_use);
        assert_eq!(s.frequency, 14_250_000);
        assert_eq!(s.mode, "USB");
        assert_eq!((s.filter_low, s.filter_high), (100, 2900));
        assert_eq!(s.panadapter_id, 0x4000_0000);
        assert!(s.tx);
        assert_eq!(s.rx_ant_list, vec!["ANT1", "ANT2", "RX_A"]);
        assert_eq!(slice.audio_level(), 70);
    }

    #[test]
    fn unknown_and_invalid_tokens_are_skipped() {
        let (commands, _) = recording_commands();
        let slice = Slice::new(1, commands);
        slice.parse_properties(&key_values("future_token=7 filter_lo=abc mode=CW"));
        let s = slice.state();
        assert_eq!(s.mode, "CW");
        assert_eq!(s.filter_low, 0);
    }

    #[test]
    fn setter_sends_only_on_change() {
        let (commands, sink) = recording_commands();
        let slice = Slice::new(0, commands);
        slice.set_frequency(7_074_000);
        slice.set_frequency(7_074_000);
        slice.set_mode("DIGU");
        slice.set_filter(0, 3000);
        slice.set_audio_level(150);
        slice.set_audio_level(100);
        slice.set_locked(true);
        assert_eq!(
            sink.texts(),
            vec![
                "slice tune 0 7.074000",
                "slice set 0 mode=DIGU",
                "filt 0 0 3000",
                "slice set 0 audio_level=100",
                "slice lock 0",
            ]
        );
        assert_eq!(slice.frequency(), 7_074_000);
    }

    #[test]
    fn status_overwrites_optimistic_value() {
        let (commands, _) = recording_commands();
        let slice = Slice::new(0, commands);
        slice.set_mode("AM");
        slice.parse_properties(&key_values("mode=USB"));
        assert_eq!(slice.mode(), "USB");
    }
}

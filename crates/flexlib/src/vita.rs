//! VITA-49 packet codec for the FlexRadio streaming dialect.
//!
//! FlexRadio streams meters, panadapter and waterfall frames, Opus audio,
//! DAX audio and DAX IQ over UDP, and announces itself on the LAN with the
//! same framing. This module is a pure codec with no I/O: [`decode`] turns a
//! datagram into a [`VitaPacket`] and [`encode`] does the reverse.
//!
//! # Layout (big-endian)
//!
//! ```text
//! word 0   packetDesc(8) | timeStampDesc(8) | packetSize(16, in 32-bit words)
//!          packetDesc:    [7:4] packet type, [3] class id present, [2] trailer present
//!          timeStampDesc: [7:6] TSI type, [5:4] TSF type, [3:0] sequence
//! word 1   stream id            (stream packet types only)
//! word 2   OUI (low 24 bits)    (class id present)
//! word 3   info class | class   (class id present)
//! word 4   integer timestamp    (TSI != None)
//! word 5-6 fractional timestamp (TSF != None)
//! ...      payload
//! last     trailer              (trailer present)
//! ```

use bytes::{BufMut, BytesMut};

use flexlib_core::{Error, Result};

/// Smallest datagram accepted by [`decode`].
pub const MIN_PACKET_SIZE: usize = 28;

/// Size of the always-present first header word.
const WORD: usize = 4;

/// FlexRadio OUI (Organizationally Unique Identifier).
pub const FLEX_OUI: u32 = 0x001C2D;

/// Information class code FlexRadio puts on its streams (`"SL"`).
pub const FLEX_INFORMATION_CLASS: u16 = 0x534C;

/// VITA-49 packet type (top nibble of the packet descriptor).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PacketType {
    IfData,
    IfDataWithStream,
    ExtData,
    ExtDataWithStream,
    IfContext,
    ExtContext,
}

impl PacketType {
    pub fn from_raw(raw: u8) -> Option<Self> {
        match raw {
            0x0 => Some(PacketType::IfData),
            0x1 => Some(PacketType::IfDataWithStream),
            0x2 => Some(PacketType::ExtData),
            0x3 => Some(PacketType::ExtDataWithStream),
            0x4 => Some(PacketType::IfContext),
            0x5 => Some(PacketType::ExtContext),
            _ => None,
        }
    }

    pub fn raw(self) -> u8 {
        match self {
            PacketType::IfData => 0x0,
            PacketType::IfDataWithStream => 0x1,
            PacketType::ExtData => 0x2,
            PacketType::ExtDataWithStream => 0x3,
            PacketType::IfContext => 0x4,
            PacketType::ExtContext => 0x5,
        }
    }

    /// Whether word 1 carries a stream id.
    pub fn has_stream_id(self) -> bool {
        matches!(
            self,
            PacketType::IfDataWithStream | PacketType::ExtDataWithStream
        )
    }
}

/// Integer timestamp type (TSI).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum IntegerTimestamp {
    None,
    Utc,
    Gps,
    Other,
}

impl IntegerTimestamp {
    pub fn from_raw(raw: u8) -> Option<Self> {
        match raw {
            0 => Some(IntegerTimestamp::None),
            1 => Some(IntegerTimestamp::Utc),
            2 => Some(IntegerTimestamp::Gps),
            3 => Some(IntegerTimestamp::Other),
            _ => None,
        }
    }

    pub fn raw(self) -> u8 {
        self as u8
    }
}

/// Fractional timestamp type (TSF).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FractionalTimestamp {
    None,
    SampleCount,
    RealTime,
    FreeRunning,
}

impl FractionalTimestamp {
    pub fn from_raw(raw: u8) -> Option<Self> {
        match raw {
            0 => Some(FractionalTimestamp::None),
            1 => Some(FractionalTimestamp::SampleCount),
            2 => Some(FractionalTimestamp::RealTime),
            3 => Some(FractionalTimestamp::FreeRunning),
            _ => None,
        }
    }

    pub fn raw(self) -> u8 {
        self as u8
    }
}

/// Packet class code: what the payload carries.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ClassCode {
    /// Packed meter readings -- 0x8002.
    Meter,
    /// Panadapter FFT frame -- 0x8003.
    Panadapter,
    /// Waterfall line -- 0x8004.
    Waterfall,
    /// Opus compressed remote audio -- 0x8005.
    Opus,
    /// Reduced-bandwidth DAX audio -- 0x0123.
    DaxReducedBw,
    /// DAX IQ at 24 ksps -- 0x02E3.
    DaxIq24,
    /// DAX IQ at 48 ksps -- 0x02E4.
    DaxIq48,
    /// DAX IQ at 96 ksps -- 0x02E5.
    DaxIq96,
    /// DAX IQ at 192 ksps -- 0x02E6.
    DaxIq192,
    /// DAX audio, stereo float32 -- 0x03E3.
    DaxAudio,
    /// Discovery broadcast -- 0xFFFF.
    Discovery,
}

impl ClassCode {
    pub fn from_raw(raw: u16) -> Option<Self> {
        match raw {
            0x8002 => Some(ClassCode::Meter),
            0x8003 => Some(ClassCode::Panadapter),
            0x8004 => Some(ClassCode::Waterfall),
            0x8005 => Some(ClassCode::Opus),
            0x0123 => Some(ClassCode::DaxReducedBw),
            0x02E3 => Some(ClassCode::DaxIq24),
            0x02E4 => Some(ClassCode::DaxIq48),
            0x02E5 => Some(ClassCode::DaxIq96),
            0x02E6 => Some(ClassCode::DaxIq192),
            0x03E3 => Some(ClassCode::DaxAudio),
            0xFFFF => Some(ClassCode::Discovery),
            _ => None,
        }
    }

    pub fn raw(self) -> u16 {
        match self {
            ClassCode::Meter => 0x8002,
            ClassCode::Panadapter => 0x8003,
            ClassCode::Waterfall => 0x8004,
            ClassCode::Opus => 0x8005,
            ClassCode::DaxReducedBw => 0x0123,
            ClassCode::DaxIq24 => 0x02E3,
            ClassCode::DaxIq48 => 0x02E4,
            ClassCode::DaxIq96 => 0x02E5,
            ClassCode::DaxIq192 => 0x02E6,
            ClassCode::DaxAudio => 0x03E3,
            ClassCode::Discovery => 0xFFFF,
        }
    }

    /// DAX IQ sample rate in samples per second, for the IQ class codes.
    pub fn iq_rate(self) -> Option<u32> {
        match self {
            ClassCode::DaxIq24 => Some(24_000),
            ClassCode::DaxIq48 => Some(48_000),
            ClassCode::DaxIq96 => Some(96_000),
            ClassCode::DaxIq192 => Some(192_000),
            _ => None,
        }
    }
}

/// The two class-id words.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ClassId {
    /// 24-bit organizational id; the top byte of the word is masked off.
    pub oui: u32,
    pub information_class_code: u16,
    pub class_code: ClassCode,
}

/// One decoded VITA-49 datagram.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VitaPacket {
    pub packet_type: PacketType,
    pub class_id: Option<ClassId>,
    pub integer_timestamp_type: IntegerTimestamp,
    pub fractional_timestamp_type: FractionalTimestamp,
    /// Mod-16 packet counter.
    pub sequence: u8,
    /// Present iff the packet type carries a stream id.
    pub stream_id: Option<u32>,
    pub integer_timestamp: u32,
    pub fractional_timestamp: u64,
    pub payload: Vec<u8>,
    pub trailer: Option<u32>,
}

impl VitaPacket {
    /// A FlexRadio extension-data packet with class id and stream id, the
    /// shape every FlexRadio stream uses.
    pub fn flex(class_code: ClassCode, stream_id: u32, payload: Vec<u8>) -> Self {
        VitaPacket {
            packet_type: PacketType::ExtDataWithStream,
            class_id: Some(ClassId {
                oui: FLEX_OUI,
                information_class_code: FLEX_INFORMATION_CLASS,
                class_code,
            }),
            integer_timestamp_type: IntegerTimestamp::Other,
            fractional_timestamp_type: FractionalTimestamp::SampleCount,
            sequence: 0,
            stream_id: Some(stream_id),
            integer_timestamp: 0,
            fractional_timestamp: 0,
            payload,
            trailer: None,
        }
    }

    pub fn class_id_present(&self) -> bool {
        self.class_id.is_some()
    }

    pub fn trailer_present(&self) -> bool {
        self.trailer.is_some()
    }

    pub fn class_code(&self) -> Option<ClassCode> {
        self.class_id.map(|c| c.class_code)
    }

    /// Upper half of the fractional timestamp.
    pub fn fractional_timestamp_msb(&self) -> u32 {
        (self.fractional_timestamp >> 32) as u32
    }

    /// Lower half of the fractional timestamp.
    pub fn fractional_timestamp_lsb(&self) -> u32 {
        self.fractional_timestamp as u32
    }

    /// Header size in bytes given which optional words are present.
    pub fn header_size(&self) -> usize {
        header_size(
            self.packet_type,
            self.class_id.is_some(),
            self.integer_timestamp_type,
            self.fractional_timestamp_type,
        )
    }
}

fn header_size(
    packet_type: PacketType,
    class_id_present: bool,
    tsi: IntegerTimestamp,
    tsf: FractionalTimestamp,
) -> usize {
    let mut optional_words = 0;
    if packet_type.has_stream_id() {
        optional_words += 1;
    }
    if class_id_present {
        optional_words += 2;
    }
    if tsi != IntegerTimestamp::None {
        optional_words += 1;
    }
    if tsf != FractionalTimestamp::None {
        optional_words += 2;
    }
    WORD * (1 + optional_words)
}

fn word_at(data: &[u8], offset: usize) -> u32 {
    u32::from_be_bytes([
        data[offset],
        data[offset + 1],
        data[offset + 2],
        data[offset + 3],
    ])
}

/// Decode a datagram.
///
/// Fails for buffers shorter than [`MIN_PACKET_SIZE`], for unknown packet
/// type, timestamp type or class code values, and when the declared packet
/// size disagrees with the buffer length rounded up to whole words.
pub fn decode(data: &[u8]) -> Result<VitaPacket> {
    if data.len() < MIN_PACKET_SIZE {
        return Err(Error::MalformedPacket(format!(
            "VITA-49 packet too short: {} bytes, minimum is {}",
            data.len(),
            MIN_PACKET_SIZE
        )));
    }

    let packet_desc = data[0];
    let timestamp_desc = data[1];
    let packet_size_words = u16::from_be_bytes([data[2], data[3]]) as usize;

    let packet_type = PacketType::from_raw(packet_desc >> 4).ok_or_else(|| {
        Error::MalformedPacket(format!("unknown packet type {}", packet_desc >> 4))
    })?;
    let class_id_present = packet_desc & 0x08 != 0;
    let trailer_present = packet_desc & 0x04 != 0;

    let tsi = IntegerTimestamp::from_raw((timestamp_desc & 0xC0) >> 6)
        .ok_or_else(|| Error::MalformedPacket("unknown integer timestamp type".into()))?;
    let tsf = FractionalTimestamp::from_raw((timestamp_desc & 0x30) >> 4)
        .ok_or_else(|| Error::MalformedPacket("unknown fractional timestamp type".into()))?;
    let sequence = timestamp_desc & 0x0F;

    let expected_words = data.len().div_ceil(WORD);
    if packet_size_words != expected_words {
        return Err(Error::MalformedPacket(format!(
            "VITA-49 packet_size ({} words) disagrees with buffer length ({} bytes)",
            packet_size_words,
            data.len()
        )));
    }

    let header = header_size(packet_type, class_id_present, tsi, tsf);
    let trailer_len = if trailer_present { WORD } else { 0 };
    if header + trailer_len > data.len() {
        return Err(Error::MalformedPacket(format!(
            "VITA-49 header ({header} bytes) and trailer exceed buffer length ({} bytes)",
            data.len()
        )));
    }

    let mut offset = WORD;

    let stream_id = if packet_type.has_stream_id() {
        let id = word_at(data, offset);
        offset += WORD;
        Some(id)
    } else {
        None
    };

    let class_id = if class_id_present {
        let oui = word_at(data, offset) & 0x00FF_FFFF;
        let codes = word_at(data, offset + WORD);
        offset += 2 * WORD;
        let raw_class = (codes & 0xFFFF) as u16;
        let class_code = ClassCode::from_raw(raw_class).ok_or_else(|| {
            Error::MalformedPacket(format!("unknown class code 0x{raw_class:04X}"))
        })?;
        Some(ClassId {
            oui,
            information_class_code: (codes >> 16) as u16,
            class_code,
        })
    } else {
        None
    };

    let integer_timestamp = if tsi != IntegerTimestamp::None {
        let ts = word_at(data, offset);
        offset += WORD;
        ts
    } else {
        0
    };

    let fractional_timestamp = if tsf != FractionalTimestamp::None {
        let msb = word_at(data, offset) as u64;
        let lsb = word_at(data, offset + WORD) as u64;
        offset += 2 * WORD;
        (msb << 32) | lsb
    } else {
        0
    };

    debug_assert_eq!(offset, header);

    let payload_end = data.len() - trailer_len;
    let payload = data[header..payload_end].to_vec();
    let trailer = trailer_present.then(|| word_at(data, payload_end));

    Ok(VitaPacket {
        packet_type,
        class_id,
        integer_timestamp_type: tsi,
        fractional_timestamp_type: tsf,
        sequence,
        stream_id,
        integer_timestamp,
        fractional_timestamp,
        payload,
        trailer,
    })
}

/// Encode a packet for transmission.
///
/// The class-id words are always written (FlexRadio expects them), using
/// the FlexRadio OUI and a zero class code word when the packet has none.
/// The size field is the total length rounded up to whole words.
pub fn encode(packet: &VitaPacket) -> Vec<u8> {
    let header = header_size(
        packet.packet_type,
        true,
        packet.integer_timestamp_type,
        packet.fractional_timestamp_type,
    );
    let trailer_len = if packet.trailer.is_some() { WORD } else { 0 };
    let total = header + packet.payload.len() + trailer_len;
    let size_words = total.div_ceil(WORD) as u16;

    let mut packet_desc = packet.packet_type.raw() << 4;
    packet_desc |= 0x08;
    if packet.trailer.is_some() {
        packet_desc |= 0x04;
    }
    let timestamp_desc = (packet.integer_timestamp_type.raw() << 6)
        | (packet.fractional_timestamp_type.raw() << 4)
        | (packet.sequence & 0x0F);

    let mut buf = BytesMut::with_capacity(total);
    buf.put_u8(packet_desc);
    buf.put_u8(timestamp_desc);
    buf.put_u16(size_words);

    if packet.packet_type.has_stream_id() {
        buf.put_u32(packet.stream_id.unwrap_or(0));
    }

    match packet.class_id {
        Some(class_id) => {
            buf.put_u32(class_id.oui & 0x00FF_FFFF);
            buf.put_u16(class_id.information_class_code);
            buf.put_u16(class_id.class_code.raw());
        }
        None => {
            buf.put_u32(FLEX_OUI);
            buf.put_u32(0);
        }
    }

    if packet.integer_timestamp_type != IntegerTimestamp::None {
        buf.put_u32(packet.integer_timestamp);
    }
    if packet.fractional_timestamp_type != FractionalTimestamp::None {
        buf.put_u64(packet.fractional_timestamp);
    }

    buf.put_slice(&packet.payload);
    if let Some(trailer) = packet.trailer {
        buf.put_u32(trailer);
    }

    buf.to_vec()
}

// ---------------------------------------------------------------------------
// Payload decoders
// ---------------------------------------------------------------------------

/// A single meter reading extracted from a meter packet.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MeterReading {
    /// Meter id assigned by the radio at runtime.
    pub meter_id: u16,
    /// Raw value in the meter's fixed-point units.
    pub value: i16,
}

/// Unpack the consecutive `(u16 id, i16 value)` pairs of a meter packet.
pub fn parse_meter_payload(payload: &[u8]) -> Result<Vec<MeterReading>> {
    if payload.len() % 4 != 0 {
        return Err(Error::MalformedPacket(format!(
            "meter payload length {} is not divisible by 4",
            payload.len()
        )));
    }

    Ok(payload
        .chunks_exact(4)
        .map(|c| MeterReading {
            meter_id: u16::from_be_bytes([c[0], c[1]]),
            value: i16::from_be_bytes([c[2], c[3]]),
        })
        .collect())
}

/// One stereo frame of DAX audio, or one I/Q pair of a DAX IQ stream.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct StereoSample {
    pub left: f32,
    pub right: f32,
}

/// Decode interleaved big-endian float32 pairs.
pub fn parse_audio_payload(payload: &[u8]) -> Result<Vec<StereoSample>> {
    if payload.len() % 8 != 0 {
        return Err(Error::MalformedPacket(format!(
            "audio payload length {} is not divisible by 8",
            payload.len()
        )));
    }

    Ok(payload
        .chunks_exact(8)
        .map(|c| StereoSample {
            left: f32::from_be_bytes([c[0], c[1], c[2], c[3]]),
            right: f32::from_be_bytes([c[4], c[5], c[6], c[7]]),
        })
        .collect())
}

/// Decode reduced-bandwidth DAX audio: big-endian i16 mono samples,
/// normalized to -1.0..1.0 and copied to both channels.
pub fn parse_reduced_bw_payload(payload: &[u8]) -> Result<Vec<StereoSample>> {
    if payload.len() % 2 != 0 {
        return Err(Error::MalformedPacket(format!(
            "reduced bandwidth payload length {} is not divisible by 2",
            payload.len()
        )));
    }

    Ok(payload
        .chunks_exact(2)
        .map(|c| {
            let v = i16::from_be_bytes([c[0], c[1]]) as f32 / 32768.0;
            StereoSample { left: v, right: v }
        })
        .collect())
}

/// Encode stereo samples as interleaved big-endian float32 pairs.
pub fn encode_audio_payload(samples: &[StereoSample]) -> Vec<u8> {
    let mut buf = BytesMut::with_capacity(samples.len() * 8);
    for s in samples {
        buf.put_f32(s.left);
        buf.put_f32(s.right);
    }
    buf.to_vec()
}

/// Panadapter FFT frame (possibly one fragment of a larger frame).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PanadapterFrame {
    pub start_bin: u16,
    pub num_bins: u16,
    pub bin_size: u16,
    pub total_bins: u16,
    pub frame_index: u32,
    pub bins: Vec<u16>,
}

impl PanadapterFrame {
    const HEADER: usize = 12;

    pub fn parse(payload: &[u8]) -> Result<Self> {
        if payload.len() < Self::HEADER {
            return Err(Error::MalformedPacket(format!(
                "panadapter payload too short: {} bytes",
                payload.len()
            )));
        }
        let be16 = |o: usize| u16::from_be_bytes([payload[o], payload[o + 1]]);
        let num_bins = be16(2);
        let bins = read_bins(&payload[Self::HEADER..], num_bins, "panadapter")?;
        Ok(PanadapterFrame {
            start_bin: be16(0),
            num_bins,
            bin_size: be16(4),
            total_bins: be16(6),
            frame_index: word_at(payload, 8),
            bins,
        })
    }
}

/// One waterfall line (possibly a fragment).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WaterfallLine {
    /// Frequency of the first bin, in units of 1/2^20 MHz.
    pub first_bin_freq: i64,
    /// Bin width, same units as `first_bin_freq`.
    pub bin_bandwidth: i64,
    pub line_duration_ms: u32,
    pub num_bins: u16,
    pub height: u16,
    pub timecode: u32,
    pub auto_black_level: u32,
    pub total_bins: u16,
    pub first_bin_index: u16,
    pub bins: Vec<u16>,
}

impl WaterfallLine {
    const HEADER: usize = 36;

    pub fn parse(payload: &[u8]) -> Result<Self> {
        if payload.len() < Self::HEADER {
            return Err(Error::MalformedPacket(format!(
                "waterfall payload too short: {} bytes",
                payload.len()
            )));
        }
        let be16 = |o: usize| u16::from_be_bytes([payload[o], payload[o + 1]]);
        let be64 = |o: usize| {
            let mut b = [0u8; 8];
            b.copy_from_slice(&payload[o..o + 8]);
            i64::from_be_bytes(b)
        };
        let num_bins = be16(20);
        let bins = read_bins(&payload[Self::HEADER..], num_bins, "waterfall")?;
        Ok(WaterfallLine {
            first_bin_freq: be64(0),
            bin_bandwidth: be64(8),
            line_duration_ms: word_at(payload, 16),
            num_bins,
            height: be16(22),
            timecode: word_at(payload, 24),
            auto_black_level: word_at(payload, 28),
            total_bins: be16(32),
            first_bin_index: be16(34),
            bins,
        })
    }

    /// First bin frequency in Hz.
    pub fn first_bin_hz(&self) -> f64 {
        self.first_bin_freq as f64 / 1_048_576.0 * 1_000_000.0
    }
}

fn read_bins(data: &[u8], count: u16, what: &str) -> Result<Vec<u16>> {
    let needed = count as usize * 2;
    if data.len() < needed {
        return Err(Error::MalformedPacket(format!(
            "{what} payload holds {} bytes of bins, header declares {count} bins",
            data.len()
        )));
    }
    Ok(data[..needed]
        .chunks_exact(2)
        .map(|c| u16::from_be_bytes([c[0], c[1]]))
        .collect())
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn meter_packet(readings: &[(u16, i16)]) -> VitaPacket {
        let mut payload = Vec::new();
        for &(id, value) in readings {
            payload.extend_from_slice(&id.to_be_bytes());
            payload.extend_from_slice(&value.to_be_bytes());
        }
        VitaPacket::flex(ClassCode::Meter, 0x0000_0700, payload)
    }

    #[test]
    fn class_codes_round_trip() {
        for code in [
            ClassCode::Meter,
            ClassCode::Panadapter,
            ClassCode::Waterfall,
            ClassCode::Opus,
            ClassCode::DaxReducedBw,
            ClassCode::DaxIq24,
            ClassCode::DaxIq48,
            ClassCode::DaxIq96,
            ClassCode::DaxIq192,
            ClassCode::DaxAudio,
            ClassCode::Discovery,
        ] {
            assert_eq!(ClassCode::from_raw(code.raw()), Some(code));
        }
        assert_eq!(ClassCode::from_raw(0x1234), None);
    }

    #[test]
    fn decode_flex_meter_packet() {
        let bytes = encode(&meter_packet(&[(5, 1000), (12, -200)]));
        // header 28 + payload 8
        assert_eq!(bytes.len(), 36);
        assert_eq!(u16::from_be_bytes([bytes[2], bytes[3]]), 9);

        let packet = decode(&bytes).unwrap();
        assert_eq!(packet.packet_type, PacketType::ExtDataWithStream);
        assert_eq!(packet.stream_id, Some(0x700));
        assert_eq!(packet.class_code(), Some(ClassCode::Meter));
        assert_eq!(packet.class_id.unwrap().oui, FLEX_OUI);
        assert_eq!(packet.header_size(), 28);

        let readings = parse_meter_payload(&packet.payload).unwrap();
        assert_eq!(
            readings,
            vec![
                MeterReading { meter_id: 5, value: 1000 },
                MeterReading { meter_id: 12, value: -200 },
            ]
        );
    }

    #[test]
    fn header_bits() {
        let mut packet = VitaPacket::flex(ClassCode::DaxAudio, 0x42, vec![0; 8]);
        packet.sequence = 0xB;
        packet.trailer = Some(0xDEAD_BEEF);
        let bytes = encode(&packet);
        // type 3, class id, trailer
        assert_eq!(bytes[0], 0x3C);
        // TSI other (3), TSF sample count (1), sequence 0xB
        assert_eq!(bytes[1], 0xDB);
        assert_eq!(&bytes[bytes.len() - 4..], &0xDEAD_BEEFu32.to_be_bytes());
        assert_eq!(decode(&bytes).unwrap(), packet);
    }

    #[test]
    fn oui_top_byte_is_masked() {
        let mut bytes = encode(&meter_packet(&[]));
        bytes[8] = 0xFF;
        let packet = decode(&bytes).unwrap();
        assert_eq!(packet.class_id.unwrap().oui, FLEX_OUI);
    }

    #[test]
    fn reject_short_buffers() {
        for len in [0usize, 1, 16, 27] {
            let err = decode(&vec![0u8; len]).unwrap_err();
            assert!(err.to_string().contains("too short"), "len {len}");
        }
    }

    #[test]
    fn reject_unknown_packet_type() {
        let mut bytes = encode(&meter_packet(&[(1, 1)]));
        bytes[0] = 0x78;
        assert!(decode(&bytes).unwrap_err().to_string().contains("packet type"));
    }

    #[test]
    fn reject_unknown_class_code() {
        let mut bytes = encode(&meter_packet(&[(1, 1)]));
        bytes[14] = 0x12;
        bytes[15] = 0x34;
        assert!(decode(&bytes).unwrap_err().to_string().contains("class code"));
    }

    #[test]
    fn reject_size_mismatch() {
        let mut bytes = encode(&meter_packet(&[(1, 1)]));
        bytes[3] = 100;
        assert!(decode(&bytes).unwrap_err().to_string().contains("disagrees"));
    }

    #[test]
    fn rounded_size_for_unaligned_payload() {
        let packet = VitaPacket::flex(ClassCode::Opus, 0x4B00_0000, vec![1, 2, 3, 4, 5]);
        let bytes = encode(&packet);
        assert_eq!(bytes.len(), 33);
        assert_eq!(u16::from_be_bytes([bytes[2], bytes[3]]), 9);
        let decoded = decode(&bytes).unwrap();
        assert_eq!(decoded.payload, vec![1, 2, 3, 4, 5]);
    }

    #[test]
    fn optional_words_absent() {
        let packet = VitaPacket {
            packet_type: PacketType::ExtData,
            class_id: Some(ClassId {
                oui: FLEX_OUI,
                information_class_code: FLEX_INFORMATION_CLASS,
                class_code: ClassCode::Discovery,
            }),
            integer_timestamp_type: IntegerTimestamp::None,
            fractional_timestamp_type: FractionalTimestamp::None,
            sequence: 3,
            stream_id: None,
            integer_timestamp: 0,
            fractional_timestamp: 0,
            payload: b"model=FLEX-6600 serial=1234".to_vec(),
            trailer: None,
        };
        let bytes = encode(&packet);
        let decoded = decode(&bytes).unwrap();
        assert_eq!(decoded.header_size(), 12);
        assert_eq!(decoded, packet);
    }

    #[test]
    fn timestamp_halves() {
        let mut packet = meter_packet(&[]);
        packet.fractional_timestamp = 0x0000_0001_0000_0002;
        let decoded = decode(&encode(&packet)).unwrap();
        assert_eq!(decoded.fractional_timestamp_msb(), 1);
        assert_eq!(decoded.fractional_timestamp_lsb(), 2);
    }

    #[test]
    fn meter_payload_bad_length() {
        let err = parse_meter_payload(&[0u8; 5]).unwrap_err();
        assert!(err.to_string().contains("not divisible by 4"));
        assert!(parse_meter_payload(&[]).unwrap().is_empty());
    }

    #[test]
    fn audio_payload_round_trip() {
        let samples = vec![
            StereoSample { left: 0.5, right: -0.25 },
            StereoSample { left: 1.0, right: -1.0 },
        ];
        let payload = encode_audio_payload(&samples);
        assert_eq!(payload.len(), 16);
        assert_eq!(&payload[0..4], &0.5f32.to_be_bytes());
        assert_eq!(parse_audio_payload(&payload).unwrap(), samples);
        assert!(parse_audio_payload(&[0u8; 12]).is_err());
    }

    #[test]
    fn reduced_bw_payload() {
        let mut payload = Vec::new();
        payload.extend_from_slice(&16384i16.to_be_bytes());
        payload.extend_from_slice(&(-32768i16).to_be_bytes());
        let samples = parse_reduced_bw_payload(&payload).unwrap();
        assert_eq!(samples[0], StereoSample { left: 0.5, right: 0.5 });
        assert_eq!(samples[1].left, -1.0);
        assert!(parse_reduced_bw_payload(&[0u8; 3]).is_err());
    }

    #[test]
    fn panadapter_frame() {
        let mut payload = Vec::new();
        payload.extend_from_slice(&0u16.to_be_bytes()); // start bin
        payload.extend_from_slice(&3u16.to_be_bytes()); // num bins
        payload.extend_from_slice(&2u16.to_be_bytes()); // bin size
        payload.extend_from_slice(&3u16.to_be_bytes()); // total bins
        payload.extend_from_slice(&77u32.to_be_bytes()); // frame index
        for bin in [10u16, 20, 30] {
            payload.extend_from_slice(&bin.to_be_bytes());
        }
        let frame = PanadapterFrame::parse(&payload).unwrap();
        assert_eq!(frame.frame_index, 77);
        assert_eq!(frame.bins, vec![10, 20, 30]);

        payload.truncate(14);
        assert!(PanadapterFrame::parse(&payload).is_err());
    }

    #[test]
    fn waterfall_line() {
        let mut payload = Vec::new();
        payload.extend_from_slice(&(14i64 * 1_048_576).to_be_bytes());
        payload.extend_from_slice(&1_048i64.to_be_bytes());
        payload.extend_from_slice(&100u32.to_be_bytes());
        payload.extend_from_slice(&2u16.to_be_bytes()); // num bins
        payload.extend_from_slice(&1u16.to_be_bytes()); // height
        payload.extend_from_slice(&9u32.to_be_bytes()); // timecode
        payload.extend_from_slice(&5u32.to_be_bytes()); // auto black
        payload.extend_from_slice(&2u16.to_be_bytes()); // total bins
        payload.extend_from_slice(&0u16.to_be_bytes()); // first bin index
        payload.extend_from_slice(&7u16.to_be_bytes());
        payload.extend_from_slice(&8u16.to_be_bytes());
        let line = WaterfallLine::parse(&payload).unwrap();
        assert_eq!(line.line_duration_ms, 100);
        assert_eq!(line.timecode, 9);
        assert_eq!(line.bins, vec![7, 8]);
        assert!((line.first_bin_hz() - 14_000_000.0).abs() < 1e-6);
    }

    fn arb_packet() -> impl Strategy<Value = VitaPacket> {
        let types = prop_oneof![
            Just(PacketType::IfData),
            Just(PacketType::IfDataWithStream),
            Just(PacketType::ExtData),
            Just(PacketType::ExtDataWithStream),
            Just(PacketType::IfContext),
            Just(PacketType::ExtContext),
        ];
        let codes = prop_oneof![
            Just(ClassCode::Meter),
            Just(ClassCode::Panadapter),
            Just(ClassCode::Waterfall),
            Just(ClassCode::Opus),
            Just(ClassCode::DaxReducedBw),
            Just(ClassCode::DaxIq24),
            Just(ClassCode::DaxIq192),
            Just(ClassCode::DaxAudio),
            Just(ClassCode::Discovery),
        ];
        (
            (types, codes, 0u8..4, 0u8..4, 0u8..16, any::<u32>()),
            (
                0u32..0x0100_0000,
                any::<u16>(),
                any::<u32>(),
                any::<u64>(),
                prop::collection::vec(any::<u8>(), 0..64),
                prop::option::of(any::<u32>()),
            ),
        )
            .prop_map(
                |((ty, code, tsi, tsf, seq, sid), (oui, info, its, fts, payload, trailer))| {
                    let tsi = IntegerTimestamp::from_raw(tsi).unwrap();
                    let tsf = FractionalTimestamp::from_raw(tsf).unwrap();
                    VitaPacket {
                        packet_type: ty,
                        class_id: Some(ClassId {
                            oui,
                            information_class_code: info,
                            class_code: code,
                        }),
                        integer_timestamp_type: tsi,
                        fractional_timestamp_type: tsf,
                        sequence: seq,
                        stream_id: ty.has_stream_id().then_some(sid),
                        integer_timestamp: if tsi == IntegerTimestamp::None { 0 } else { its },
                        fractional_timestamp: if tsf == FractionalTimestamp::None { 0 } else { fts },
                        payload,
                        trailer,
                    }
                },
            )
    }

    proptest! {
        #[test]
        fn encode_decode_round_trip(packet in arb_packet()) {
            let bytes = encode(&packet);
            // Packets with every optional word absent can be shorter than the
            // decoder's minimum; those are covered by the rejection test.
            prop_assume!(bytes.len() >= MIN_PACKET_SIZE);
            prop_assert_eq!(decode(&bytes).unwrap(), packet);
        }

        #[test]
        fn short_input_always_rejected(bytes in prop::collection::vec(any::<u8>(), 0..MIN_PACKET_SIZE)) {
            prop_assert!(decode(&bytes).is_err());
        }
    }
}

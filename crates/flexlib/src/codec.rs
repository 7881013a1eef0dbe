//! SmartSDR TCP line decoding and command framing.
//!
//! The SmartSDR text protocol uses newline-terminated ASCII lines over TCP
//! port 4992.
//!
//! # Line formats
//!
//! ```text
//! Command:   C<seq>|<command_text>\n
//! Reply:     R<seq>|<hex_code>[|<message>[|<debug>]]\n
//! Status:    S<hex_handle>|<category> <remainder>\n
//! Message:   M<hex_code>|<text>\n
//! Version:   V<version_text>\n
//! Handle:    H<hex_handle>\n
//! ```
//!
//! The leading type character is matched case-insensitively. Everything in
//! this module is pure parsing; no I/O is performed.

use flexlib_core::{Error, Result, parse_hex_u32};

/// The reply code the radio uses for success.
pub const SUCCESS_CODE: &str = "0";

/// Encode a command with the given sequence number.
///
/// Format: `C<seq>|<command>\n`
pub fn encode_command(seq: u32, command: &str) -> Vec<u8> {
    format!("C{seq}|{command}\n").into_bytes()
}

/// A reply to a previously sent command.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReplyLine {
    /// Sequence number correlating this reply to its command.
    pub sequence: u32,
    /// Hex response code exactly as sent. `"0"` means success.
    pub code: String,
    /// Reply payload (may be empty).
    pub message: String,
    /// Optional debug output appended by some firmware versions.
    pub debug: Option<String>,
}

/// An unsolicited status line.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StatusLine {
    /// The client handle the status concerns.
    pub handle: u32,
    /// Category token, e.g. `slice`, `display`, `radio`.
    pub category: String,
    /// Everything after the category token.
    pub remainder: String,
}

/// One decoded inbound line.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Line {
    /// `H<handle>`: the connection handle assigned by the radio.
    Handle(u32),
    /// `M<code>|<text>`: an informational or error message.
    Message { code: String, text: String },
    /// `R...`: a reply to a command.
    Reply(ReplyLine),
    /// `S...`: a status update.
    Status(StatusLine),
    /// `V<text>`: the radio's protocol version.
    Version(String),
    /// A line whose type character is not recognised.
    Unknown(String),
}

/// Decode one line received from the radio.
///
/// The line should not include the trailing `\n`; surrounding whitespace is
/// stripped. Malformed lines return [`Error::Protocol`] so the caller can log
/// and drop them.
pub fn parse_line(line: &str) -> Result<Line> {
    let line = line.trim();
    let Some(first) = line.chars().next() else {
        return Err(Error::Protocol("empty line".into()));
    };
    let body = &line[first.len_utf8()..];

    match first.to_ascii_uppercase() {
        'H' => parse_handle(body).map(Line::Handle),
        'M' => parse_message(body),
        'R' => parse_reply(body).map(Line::Reply),
        'S' => parse_status(body).map(Line::Status),
        'V' => Ok(Line::Version(body.to_string())),
        _ => Ok(Line::Unknown(line.to_string())),
    }
}

fn parse_handle(body: &str) -> Result<u32> {
    parse_hex_u32(body).ok_or_else(|| Error::Protocol(format!("invalid handle: {body}")))
}

fn parse_message(body: &str) -> Result<Line> {
    let (code, text) = body
        .split_once('|')
        .ok_or_else(|| Error::Protocol(format!("malformed message (no pipe): M{body}")))?;
    Ok(Line::Message {
        code: code.trim().to_string(),
        text: text.to_string(),
    })
}

/// Parse a reply sequence number.
///
/// Sequence numbers are decimal. An echoed command prefix (`c1`) is
/// tolerated because some radios reply with the client's `C<seq>` verbatim.
pub fn parse_sequence(raw: &str) -> Option<u32> {
    let raw = raw.trim();
    let digits = raw
        .strip_prefix('c')
        .or_else(|| raw.strip_prefix('C'))
        .unwrap_or(raw);
    digits.parse().ok()
}

fn parse_reply(body: &str) -> Result<ReplyLine> {
    let parts: Vec<&str> = body.splitn(4, '|').collect();
    if parts.len() < 2 {
        return Err(Error::Protocol(format!(
            "malformed reply (need at least seq|code): R{body}"
        )));
    }
    let sequence = parse_sequence(parts[0])
        .ok_or_else(|| Error::Protocol(format!("invalid reply sequence number: {}", parts[0])))?;

    Ok(ReplyLine {
        sequence,
        code: parts[1].trim().to_string(),
        message: parts.get(2).map(|s| s.to_string()).unwrap_or_default(),
        debug: parts.get(3).map(|s| s.to_string()),
    })
}

fn parse_status(body: &str) -> Result<StatusLine> {
    let (handle_str, payload) = body
        .split_once('|')
        .ok_or_else(|| Error::Protocol(format!("malformed status (no pipe): S{body}")))?;
    let handle = parse_hex_u32(handle_str)
        .ok_or_else(|| Error::Protocol(format!("invalid status handle: {handle_str}")))?;

    let payload = payload.trim();
    let (category, remainder) = payload.split_once(' ').ok_or_else(|| {
        Error::Protocol(format!("status has no remainder after category: {payload}"))
    })?;

    Ok(StatusLine {
        handle,
        category: category.to_lowercase(),
        remainder: remainder.trim_start().to_string(),
    })
}

// ---------------------------------------------------------------------------
// Response-code severity
// ---------------------------------------------------------------------------

/// Severity encoded in a response or message code.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Severity {
    Verbose,
    Info,
    Warning,
    Error,
    Severe,
}

impl Severity {
    /// Decode the severity of a hex response code.
    ///
    /// A code whose first character is `1` is Verbose regardless of the rest.
    /// Otherwise bits 24-25 select Info, Warning, Error or Severe. A code that
    /// is not valid hex is treated as Error.
    pub fn from_code(code: &str) -> Severity {
        let code = code.trim();
        if code.starts_with('1') {
            return Severity::Verbose;
        }
        let digits = code
            .strip_prefix("0x")
            .or_else(|| code.strip_prefix("0X"))
            .unwrap_or(code);
        match u32::from_str_radix(digits, 16) {
            Ok(value) => match (value & 0x0300_0000) >> 24 {
                0 => Severity::Info,
                1 => Severity::Warning,
                2 => Severity::Error,
                _ => Severity::Severe,
            },
            Err(_) => Severity::Error,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Severity::Verbose => "verbose",
            Severity::Info => "info",
            Severity::Warning => "warning",
            Severity::Error => "error",
            Severity::Severe => "severe",
        }
    }
}

impl std::fmt::Display for Severity {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Emit a radio message or failed reply at the level its code decodes to.
pub(crate) fn log_at_severity(severity: Severity, code: &str, context: &str, text: &str) {
    match severity {
        Severity::Verbose => tracing::trace!(code, context, severity = %severity, "{text}"),
        Severity::Info => tracing::info!(code, context, severity = %severity, "{text}"),
        Severity::Warning => tracing::warn!(code, context, severity = %severity, "{text}"),
        Severity::Error | Severity::Severe => {
            tracing::error!(code, context, severity = %severity, "{text}")
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn encode_command_format() {
        assert_eq!(encode_command(1, "info"), b"C1|info\n".to_vec());
        assert_eq!(
            encode_command(42, "slice tune 0 14.250000"),
            b"C42|slice tune 0 14.250000\n".to_vec()
        );
    }

    #[test]
    fn handle_line() {
        assert_eq!(parse_line("H28000001").unwrap(), Line::Handle(0x2800_0001));
        assert_eq!(parse_line("h0x1A").unwrap(), Line::Handle(0x1A));
        assert!(parse_line("Hzz").is_err());
    }

    #[test]
    fn message_line() {
        assert_eq!(
            parse_line("M10000001|Client connected from IP 10.0.0.2").unwrap(),
            Line::Message {
                code: "10000001".into(),
                text: "Client connected from IP 10.0.0.2".into(),
            }
        );
        assert!(parse_line("Mno pipe here").is_err());
    }

    #[test]
    fn reply_with_all_fields() {
        let line = parse_line("R12|50000015|Unable to get foundation receiver|dbg").unwrap();
        assert_eq!(
            line,
            Line::Reply(ReplyLine {
                sequence: 12,
                code: "50000015".into(),
                message: "Unable to get foundation receiver".into(),
                debug: Some("dbg".into()),
            })
        );
    }

    #[test]
    fn reply_minimal_and_prefixed() {
        let Line::Reply(reply) = parse_line("R5|0").unwrap() else {
            panic!("expected reply");
        };
        assert_eq!(reply.sequence, 5);
        assert_eq!(reply.message, "");
        assert_eq!(reply.debug, None);

        let Line::Reply(reply) = parse_line("Rc1|0|").unwrap() else {
            panic!("expected reply");
        };
        assert_eq!(reply.sequence, 1);
        assert_eq!(reply.code, "0");
        assert_eq!(reply.message, "");
    }

    #[test]
    fn reply_too_few_fields() {
        assert!(parse_line("R12").is_err());
        assert!(parse_line("Rabc|0").is_err());
    }

    #[test]
    fn status_line() {
        let line = parse_line("S28000001|slice 0 in_use=1 RF_frequency=14.250000").unwrap();
        assert_eq!(
            line,
            Line::Status(StatusLine {
                handle: 0x2800_0001,
                category: "slice".into(),
                remainder: "0 in_use=1 RF_frequency=14.250000".into(),
            })
        );
    }

    #[test]
    fn status_without_remainder_is_malformed() {
        assert!(parse_line("S28000001|radio").is_err());
        assert!(parse_line("S28000001 radio x=1").is_err());
        assert!(parse_line("Sxyz|radio x=1").is_err());
    }

    #[test]
    fn version_and_unknown() {
        assert_eq!(
            parse_line("V1.4.0.0").unwrap(),
            Line::Version("1.4.0.0".into())
        );
        assert_eq!(
            parse_line("Xsomething").unwrap(),
            Line::Unknown("Xsomething".into())
        );
        assert!(parse_line("   ").is_err());
    }

    #[test]
    fn lowercase_type_characters() {
        assert!(matches!(parse_line("s1|radio a=b").unwrap(), Line::Status(_)));
        assert!(matches!(parse_line("r1|0|").unwrap(), Line::Reply(_)));
        assert!(matches!(parse_line("v3.2").unwrap(), Line::Version(_)));
    }

    #[test]
    fn severity_decoding() {
        assert_eq!(Severity::from_code("0"), Severity::Info);
        assert_eq!(Severity::from_code("01000000"), Severity::Warning);
        assert_eq!(Severity::from_code("02000000"), Severity::Error);
        assert_eq!(Severity::from_code("03000000"), Severity::Severe);
        assert_eq!(Severity::from_code("50000015"), Severity::Info);
        assert_eq!(Severity::from_code("51000015"), Severity::Warning);
        // Bits 24-25 only; bit 26 does not contribute.
        assert_eq!(Severity::from_code("04000000"), Severity::Info);
        assert_eq!(Severity::from_code("not hex"), Severity::Error);
    }

    #[test]
    fn severity_verbose_prefix() {
        assert_eq!(Severity::from_code("10000001"), Severity::Verbose);
        assert_eq!(Severity::from_code("13000000"), Severity::Verbose);
        assert_eq!(Severity::from_code("1"), Severity::Verbose);
    }
}

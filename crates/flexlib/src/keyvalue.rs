//! Key/value splitting for SmartSDR text payloads.
//!
//! Nearly every inbound line carries a run of `key=value` tokens. The
//! delimiter is space for most status categories, but `#` (gps, meter,
//! version reply), `,` (info and list replies), `^` (profile lists) and `=`
//! (profile status) are used as well, so the delimiter is a parameter.

/// One `key=value` token. Keys are usually lowercased; a token without `=`
/// becomes a key with an empty value.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct KeyValue {
    pub key: String,
    pub value: String,
}

impl KeyValue {
    pub fn new(key: impl Into<String>, value: impl Into<String>) -> Self {
        KeyValue {
            key: key.into(),
            value: value.into(),
        }
    }
}

/// Space-delimited, lowercased keys, values left as sent.
pub fn key_values(text: &str) -> Vec<KeyValue> {
    parse_key_values(text, ' ', true, false)
}

/// Split `text` on `delimiter` into ordered key/value pairs.
///
/// Each token is split on its first `=` only. Keys and values are trimmed.
/// Empty tokens (including the one produced by a trailing delimiter) are
/// skipped, as are tokens whose key is empty.
pub fn parse_key_values(
    text: &str,
    delimiter: char,
    lower_keys: bool,
    lower_values: bool,
) -> Vec<KeyValue> {
    let mut pairs = Vec::new();
    for token in text.split(delimiter) {
        let (key, value) = match token.split_once('=') {
            Some((k, v)) => (k.trim(), v.trim()),
            None => (token.trim(), ""),
        };
        if key.is_empty() {
            continue;
        }
        let key = if lower_keys {
            key.to_lowercase()
        } else {
            key.to_string()
        };
        let value = if lower_values {
            value.to_lowercase()
        } else {
            value.to_string()
        };
        pairs.push(KeyValue { key, value });
    }
    pairs
}

/// Split `text` on `delimiter` into trimmed values.
///
/// An empty input yields an empty vec rather than one empty string. Empty
/// tokens produced by a trailing delimiter are dropped.
pub fn parse_values(text: &str, delimiter: char) -> Vec<String> {
    if text.is_empty() {
        return Vec::new();
    }
    let mut values: Vec<String> = text.split(delimiter).map(|v| v.trim().to_string()).collect();
    if values.last().is_some_and(|v| v.is_empty()) {
        values.pop();
    }
    values
}

/// Stand-in for a space inside a quoted run.
pub const ESCAPED_SPACE: char = '\u{7F}';

/// Stand-in for `=` inside a quoted run.
pub const ESCAPED_EQUALS: char = '*';

/// Hide spaces and `=` inside double-quoted runs so that key/value
/// splitting does not break quoted macro text apart.
pub fn escape(text: &str) -> String {
    let mut quoted = false;
    text.chars()
        .map(|c| match c {
            '"' => {
                quoted = !quoted;
                c
            }
            ' ' if quoted => ESCAPED_SPACE,
            '=' if quoted => ESCAPED_EQUALS,
            _ => c,
        })
        .collect()
}

/// Reverse [`escape`].
pub fn unescape(text: &str) -> String {
    let mut quoted = false;
    text.chars()
        .map(|c| match c {
            '"' => {
                quoted = !quoted;
                c
            }
            ESCAPED_SPACE if quoted => ' ',
            ESCAPED_EQUALS if quoted => '=',
            _ => c,
        })
        .collect()
}

/// Strip one pair of surrounding double quotes, if present.
pub fn unquote(value: &str) -> &str {
    value
        .strip_prefix('"')
        .and_then(|v| v.strip_suffix('"'))
        .unwrap_or(value)
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn basic_pairs() {
        let kv = key_values("in_use=1 RF_frequency=14.250000 mode=USB");
        assert_eq!(
            kv,
            vec![
                KeyValue::new("in_use", "1"),
                KeyValue::new("rf_frequency", "14.250000"),
                KeyValue::new("mode", "USB"),
            ]
        );
    }

    #[test]
    fn bare_tokens_get_empty_values() {
        let kv = key_values("0 removed");
        assert_eq!(kv, vec![KeyValue::new("0", ""), KeyValue::new("removed", "")]);
    }

    #[test]
    fn empty_value_is_kept() {
        let kv = key_values("reason= source=TX1");
        assert_eq!(kv[0], KeyValue::new("reason", ""));
        assert_eq!(kv[1], KeyValue::new("source", "TX1"));
    }

    #[test]
    fn splits_on_first_equals_only() {
        let kv = key_values("macro=a=b");
        assert_eq!(kv, vec![KeyValue::new("macro", "a=b")]);
    }

    #[test]
    fn trailing_delimiter_is_skipped() {
        let kv = parse_key_values("lat=1.0#lon=2.0#", '#', true, false);
        assert_eq!(kv.len(), 2);
        assert_eq!(kv[1], KeyValue::new("lon", "2.0"));
    }

    #[test]
    fn empty_key_is_dropped() {
        let kv = key_values("=orphan a=1  b=2");
        assert_eq!(kv, vec![KeyValue::new("a", "1"), KeyValue::new("b", "2")]);
    }

    #[test]
    fn case_options() {
        let kv = parse_key_values("Model=FLEX-6600", ' ', false, true);
        assert_eq!(kv, vec![KeyValue::new("Model", "flex-6600")]);
    }

    #[test]
    fn whitespace_trimmed_with_other_delimiters() {
        let kv = parse_key_values("model = FLEX-6600 , callsign= N0CALL", ',', true, false);
        assert_eq!(kv[0], KeyValue::new("model", "FLEX-6600"));
        assert_eq!(kv[1], KeyValue::new("callsign", "N0CALL"));
    }

    #[test]
    fn values_empty_input() {
        assert!(parse_values("", ',').is_empty());
    }

    #[test]
    fn values_list() {
        assert_eq!(parse_values("ANT1,ANT2, RX_A", ','), vec!["ANT1", "ANT2", "RX_A"]);
        assert_eq!(parse_values("A^B^", '^'), vec!["A", "B"]);
    }

    #[test]
    fn escape_quoted_run() {
        let escaped = escape(r#"macro1="CQ CQ DE N0CALL K" wpm=30"#);
        assert_eq!(escaped, "macro1=\"CQ\u{7F}CQ\u{7F}DE\u{7F}N0CALL\u{7F}K\" wpm=30");
        let kv = key_values(&escaped);
        assert_eq!(kv.len(), 2);
        assert_eq!(unescape(&kv[0].value), r#""CQ CQ DE N0CALL K""#);
    }

    #[test]
    fn escape_equals_inside_quotes() {
        let escaped = escape(r#"a="x=y" b=2"#);
        assert_eq!(escaped, r#"a="x*y" b=2"#);
        assert_eq!(unescape(&escaped), r#"a="x=y" b=2"#);
    }

    #[test]
    fn unescape_leaves_unquoted_stars() {
        assert_eq!(unescape("a*b \"c*d\""), "a*b \"c=d\"");
    }

    #[test]
    fn unquote_value() {
        assert_eq!(unquote("\"FLEX-6600\""), "FLEX-6600");
        assert_eq!(unquote("plain"), "plain");
    }

    fn token() -> impl Strategy<Value = String> {
        "[a-z][a-z0-9_]{0,10}"
    }

    proptest! {
        #[test]
        fn joined_pairs_round_trip(pairs in prop::collection::vec((token(), "[A-Za-z0-9._-]{0,10}"), 0..12)) {
            let text = pairs
                .iter()
                .map(|(k, v)| format!("{k}={v}"))
                .collect::<Vec<_>>()
                .join(" ");
            let parsed = key_values(&text);
            let expected: Vec<KeyValue> = pairs
                .iter()
                .map(|(k, v)| KeyValue::new(k.clone(), v.clone()))
                .collect();
            prop_assert_eq!(parsed, expected);
        }

        #[test]
        fn escape_round_trip(text in "[ a-zA-Z0-9=\"]{0,40}") {
            prop_assert_eq!(unescape(&escape(&text)), text);
        }
    }
}

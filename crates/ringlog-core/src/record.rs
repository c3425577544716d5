//! Fixed-width record codec.
//!
//! Every slot of a ring store holds one record of exactly `record_length`
//! bytes followed by a `\n` terminator:
//!
//! ```text
//! 0000042|00000042;payload text, space padded ...     \r\n
//! ^^^^^^^ ^^^^^^^^ ^^^^^^^^^^^^^^^^^^^^^^^^^^^^^^     ^^
//! key     line id  payload                            filler + terminator
//! ```
//!
//! - `key` is a 7-digit sequence key, diagnostic only.
//! - `line id` is a signed 8-digit field: `0` marks the metadata record,
//!   `-0000001` marks a slot that was never written.
//! - `line id;payload` is sanitized and padded to `line_width - 1` bytes,
//!   the whole content to `record_length - 1` bytes, and a `\r` filler byte
//!   closes the record.
//!
//! Decoding never fails. Anything that does not parse as `key|id;` decodes
//! to [`Record::empty`], so a torn write just looks like an unused slot.

use ringlog_types::{LineId, RingConfig, KEY_FIELD_WIDTH};
use serde::Serialize;

use crate::text::{is_printable, trim_end, PLACEHOLDER};

/// Line id stamped into slots that hold no data.
pub const EMPTY_LINE_ID: i64 = -1;
/// Line id of the metadata record in slot 0.
pub const METADATA_LINE_ID: i64 = 0;
/// Padding byte inside the record content.
pub const FILLER: u8 = b' ';
/// Last content byte of every record; non-printable so decoding stops here.
pub const RECORD_END: u8 = b'\r';
/// Free-text tag written into new metadata records.
pub const DEFAULT_TAG: &str = "ringlog";

const METADATA_MARKER: &str = "META DATA";

/// One decoded slot.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct Record {
    /// Write-sequence tag from the key field.
    pub sequence_key: u32,
    /// `> 0` for data, `0` for metadata, `< 0` for an empty slot.
    pub line_id: i64,
    /// Payload with trailing padding removed.
    pub payload: String,
}

impl Record {
    /// The record every unwritten or unparseable slot decodes to.
    pub fn empty() -> Self {
        Self {
            sequence_key: 0,
            line_id: EMPTY_LINE_ID,
            payload: String::new(),
        }
    }

    /// Returns `true` for a data record.
    pub fn is_live(&self) -> bool {
        self.line_id > 0
    }

    /// Returns `true` for a never-written or unreadable slot.
    pub fn is_empty(&self) -> bool {
        self.line_id < 0
    }

    pub fn is_metadata(&self) -> bool {
        self.line_id == METADATA_LINE_ID
    }

    /// The line id of a data record that fits the `u32` id space.
    pub fn live_id(&self) -> Option<LineId> {
        if self.is_live() {
            LineId::try_from(self.line_id).ok()
        } else {
            None
        }
    }
}

/// Bytes of record content for a given line width.
pub fn record_length(line_width: u32) -> usize {
    (line_width + KEY_FIELD_WIDTH) as usize
}

/// Encode one record into `buf`, replacing its previous content.
///
/// The result is exactly `record_length(line_width)` bytes for any payload
/// and any `line_width >= 1`; longer payloads are cut.
pub fn encode_into(
    buf: &mut Vec<u8>,
    sequence_key: u32,
    line_id: i64,
    payload: &str,
    line_width: u32,
) {
    let content_len = record_length(line_width) - 1;
    let line_len = (line_width as usize).saturating_sub(1);

    buf.clear();
    buf.extend_from_slice(format!("{sequence_key:07}|").as_bytes());

    let line_start = buf.len();
    buf.extend_from_slice(format!("{line_id:08};").as_bytes());
    buf.extend(payload.bytes().take(line_len));
    for byte in &mut buf[line_start..] {
        if !is_printable(*byte) {
            *byte = PLACEHOLDER;
        }
    }
    buf.truncate(line_start + line_len);
    buf.resize(line_start + line_len, FILLER);

    buf.truncate(content_len);
    buf.resize(content_len, FILLER);
    buf.push(RECORD_END);
}

/// Encode one record into a fresh buffer.
pub fn encode(sequence_key: u32, line_id: i64, payload: &str, line_width: u32) -> Vec<u8> {
    let mut buf = Vec::with_capacity(record_length(line_width));
    encode_into(&mut buf, sequence_key, line_id, payload, line_width);
    buf
}

/// Encode the placeholder written into data slot `index` (0-based) by a
/// format.
pub fn encode_empty_into(buf: &mut Vec<u8>, index: u32, line_width: u32) {
    let payload = format!(" === empty slot ({}) ===", u64::from(index) + 1);
    encode_into(buf, index, EMPTY_LINE_ID, &payload, line_width);
}

/// Parse a slot, returning `None` if its prefix is malformed.
pub fn parse(span: &[u8]) -> Option<Record> {
    let end = span
        .iter()
        .position(|&b| !is_printable(b))
        .unwrap_or(span.len());
    // Printable ASCII is always valid UTF-8.
    let content = std::str::from_utf8(&span[..end]).ok()?;

    let (key, rest) = content.split_once('|')?;
    let (id, payload) = rest.split_once(';')?;
    if !is_decimal(key) || !is_signed_decimal(id) {
        return None;
    }

    Some(Record {
        sequence_key: key.parse().ok()?,
        line_id: id.parse().ok()?,
        payload: trim_end(payload).to_string(),
    })
}

/// Decode a slot. Malformed input yields [`Record::empty`].
pub fn decode(span: &[u8]) -> Record {
    parse(span).unwrap_or_else(Record::empty)
}

/// How many payload bytes survive encoding with the given key and id.
pub fn payload_capacity(sequence_key: u32, line_id: i64, line_width: u32) -> usize {
    let content_len = record_length(line_width) - 1;
    let key_len = format!("{sequence_key:07}|").len();
    let id_len = format!("{line_id:08};").len();
    let line_len = (line_width as usize).saturating_sub(1);
    line_len
        .min(content_len.saturating_sub(key_len))
        .saturating_sub(id_len)
}

fn is_decimal(field: &str) -> bool {
    !field.is_empty() && field.bytes().all(|b| b.is_ascii_digit())
}

fn is_signed_decimal(field: &str) -> bool {
    is_decimal(field.strip_prefix('-').unwrap_or(field))
}

/// Contents of slot 0: the configuration the store was formatted with.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Metadata {
    pub capacity: u32,
    pub line_width: u32,
    /// Free text identifying the writer.
    pub tag: String,
}

impl Metadata {
    pub fn new(config: RingConfig, tag: &str) -> Self {
        Self {
            capacity: config.capacity,
            line_width: config.line_width,
            tag: tag.to_string(),
        }
    }

    /// The stamped configuration, as found on storage (not clamped).
    pub fn config(&self) -> RingConfig {
        RingConfig {
            capacity: self.capacity,
            line_width: self.line_width,
        }
    }

    /// Encode as slot 0, using the stamped line width.
    pub fn encode_into(&self, buf: &mut Vec<u8>) {
        let payload = format!(
            "{};{}; {METADATA_MARKER} {}",
            self.capacity, self.line_width, self.tag
        );
        encode_into(buf, 0, METADATA_LINE_ID, &payload, self.line_width);
    }

    /// Interpret a decoded record as metadata.
    pub fn from_record(record: &Record) -> Option<Self> {
        if !record.is_metadata() {
            return None;
        }
        let mut fields = record.payload.splitn(3, ';');
        let capacity = fields.next()?.trim().parse().ok()?;
        let line_width = fields.next()?.trim().parse().ok()?;
        let rest = fields.next().unwrap_or("").trim_start();
        let tag = rest
            .strip_prefix(METADATA_MARKER)
            .unwrap_or(rest)
            .trim()
            .to_string();
        Some(Self {
            capacity,
            line_width,
            tag,
        })
    }

    /// Parse slot 0 bytes.
    pub fn decode(span: &[u8]) -> Option<Self> {
        parse(span).as_ref().and_then(Self::from_record)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn padded(content: &str, line_width: u32) -> Vec<u8> {
        let mut expected = format!("{content:<width$}", width = record_length(line_width) - 1);
        expected.push('\r');
        expected.into_bytes()
    }

    #[test]
    fn encode_layout_is_bit_exact() {
        let bytes = encode(1, 1, "hello", 50);
        assert_eq!(bytes.len(), 59);
        assert_eq!(bytes, padded("0000001|00000001;hello", 50));
    }

    #[test]
    fn empty_slot_layout() {
        let mut buf = Vec::new();
        encode_empty_into(&mut buf, 0, 50);
        assert_eq!(buf, padded("0000000|-0000001; === empty slot (1) ===", 50));
        assert!(decode(&buf).is_empty());
    }

    #[test]
    fn metadata_layout_and_roundtrip() {
        let meta = Metadata::new(RingConfig::new(10, 50), "ringlog");
        let mut buf = Vec::new();
        meta.encode_into(&mut buf);
        assert_eq!(buf, padded("0000000|00000000;10;50; META DATA ringlog", 50));
        assert_eq!(Metadata::decode(&buf), Some(meta));
    }

    #[test]
    fn metadata_from_foreign_tag() {
        let mut buf = padded(
            "0000000|00000000;200;120; META DATA LittleFS_SysLogger",
            120,
        );
        buf.push(b'\n');
        let meta = Metadata::decode(&buf).unwrap();
        assert_eq!(meta.config(), RingConfig::new(200, 120));
        assert_eq!(meta.tag, "LittleFS_SysLogger");
    }

    #[test]
    fn data_record_is_not_metadata() {
        let bytes = encode(5, 5, "12;34; META DATA x", 60);
        assert_eq!(Metadata::decode(&bytes), None);
    }

    #[test]
    fn long_payload_is_cut_to_width() {
        let bytes = encode(7, 7, &"z".repeat(500), 50);
        assert_eq!(bytes.len(), record_length(50));
        let record = decode(&bytes);
        assert_eq!(record.payload.len(), payload_capacity(7, 7, 50));
        assert_eq!(payload_capacity(7, 7, 50), 40);
    }

    #[test]
    fn control_bytes_are_replaced() {
        let record = decode(&encode(3, 3, "a\tb\u{7f}c", 50));
        assert_eq!(record.payload, "a^b^c");
    }

    #[test]
    fn payload_with_delimiters_survives() {
        let record = decode(&encode(9, 9, "a|b;c", 50));
        assert_eq!(record.line_id, 9);
        assert_eq!(record.payload, "a|b;c");
    }

    #[test]
    fn large_keys_keep_record_length() {
        let bytes = encode(123_456_789, 123_456_789, &"p".repeat(200), 50);
        assert_eq!(bytes.len(), record_length(50));
        let record = decode(&bytes);
        assert_eq!(record.sequence_key, 123_456_789);
        assert_eq!(record.line_id, 123_456_789);
        assert_eq!(record.payload.len(), payload_capacity(123_456_789, 123_456_789, 50));
    }

    #[test]
    fn malformed_input_decodes_to_empty() {
        assert_eq!(decode(b""), Record::empty());
        assert_eq!(decode(b"garbage without delimiters"), Record::empty());
        assert_eq!(decode(b"12a4567|00000001;x"), Record::empty());
        assert_eq!(decode(b"0000001|0000x001;x"), Record::empty());
        assert_eq!(decode(&[0u8; 59]), Record::empty());
        assert!(parse(b"0000001|;x").is_none());
    }

    #[test]
    fn decode_stops_at_first_non_printable_byte() {
        let record = decode(b"0000004|00000004;kept\0dropped");
        assert_eq!(record.payload, "kept");
    }

    #[test]
    fn record_kinds() {
        assert!(decode(&encode(1, 1, "x", 50)).is_live());
        assert!(decode(&encode(0, 0, "x", 50)).is_metadata());
        assert!(Record::empty().is_empty());
        assert_eq!(Record::empty().live_id(), None);
        assert_eq!(decode(&encode(8, 8, "x", 50)).live_id(), Some(8));
    }

    proptest! {
        #[test]
        fn encoded_length_is_fixed(
            key in any::<u32>(),
            id in -1i64..=i64::from(u32::MAX),
            payload in ".{0,300}",
            width in 50u32..=150,
        ) {
            prop_assert_eq!(encode(key, id, &payload, width).len(), record_length(width));
        }

        #[test]
        fn roundtrip_recovers_id_and_bounded_payload(
            id in 1u32..10_000_000,
            payload in "[ -~]{0,200}",
            width in 50u32..=150,
        ) {
            let record = decode(&encode(id, i64::from(id), &payload, width));
            let cap = payload_capacity(id, i64::from(id), width);
            let expected = trim_end(&payload[..payload.len().min(cap)]);
            prop_assert_eq!(record.line_id, i64::from(id));
            prop_assert_eq!(record.sequence_key, id);
            prop_assert_eq!(record.payload, expected);
        }

        #[test]
        fn decode_never_panics(bytes in proptest::collection::vec(any::<u8>(), 0..200)) {
            let _ = decode(&bytes);
        }
    }
}

//! Magic-byte detection for binary payloads in network bodies and WebSocket
//! frames.
//!
//! Checks run in a fixed order: text, MessagePack, CBOR, protobuf, BSON.
//! MessagePack and CBOR share several prefixes (0x80 is fixmap(0) in
//! MessagePack and array(0) in CBOR); MessagePack is checked first, so it wins.

use serde::Serialize;

/// A detected binary serialization format.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct BinaryFormat {
    pub name: &'static str,
    pub confidence: f64,
    pub details: String,
}

impl BinaryFormat {
    fn new(name: &'static str, confidence: f64, details: impl Into<String>) -> Self {
        Self {
            name,
            confidence,
            details: details.into(),
        }
    }
}

const MESSAGEPACK: &str = "messagepack";
const CBOR: &str = "cbor";
const PROTOBUF: &str = "protobuf";
const BSON: &str = "bson";

const BSON_MAX_DOC_LEN: usize = 16 * 1024 * 1024;

/// Detect the serialization format of `data`.
///
/// Returns `None` for empty input, text-looking input, or unrecognised bytes.
pub fn detect_binary_format(data: &[u8]) -> Option<BinaryFormat> {
    if data.is_empty() || is_likely_text(data) {
        return None;
    }

    detect_messagepack(data)
        .or_else(|| detect_cbor(data))
        .or_else(|| detect_protobuf(data))
        .or_else(|| detect_bson(data))
}

/// More than 90% printable ASCII (plus tab/CR/LF) reads as text.
fn is_likely_text(data: &[u8]) -> bool {
    let text_bytes = data
        .iter()
        .filter(|b| matches!(b, 0x20..=0x7e | b'\n' | b'\r' | b'\t'))
        .count();
    text_bytes * 10 > data.len() * 9
}

/// (minimum length, confidence, details) for single-byte MessagePack markers.
fn messagepack_marker(b: u8) -> Option<(usize, f64, &'static str)> {
    let marker = match b {
        0xc0 => (0, 0.9, "nil"),
        0xc2 => (0, 0.9, "false"),
        0xc3 => (0, 0.9, "true"),
        0xc4..=0xc6 => (0, 0.85, "bin"),
        0xc7..=0xc9 => (0, 0.85, "ext"),
        0xca => (5, 0.85, "float32"),
        0xcb => (9, 0.85, "float64"),
        0xcc => (2, 0.8, "uint8"),
        0xcd => (3, 0.8, "uint16"),
        0xce => (5, 0.8, "uint32"),
        0xcf => (9, 0.8, "uint64"),
        0xd0 => (2, 0.8, "int8"),
        0xd1 => (3, 0.8, "int16"),
        0xd2 => (5, 0.8, "int32"),
        0xd3 => (9, 0.8, "int64"),
        0xd4..=0xd8 => (0, 0.85, "fixext"),
        0xd9 => (2, 0.8, "str8"),
        0xda => (3, 0.8, "str16"),
        0xdb => (5, 0.8, "str32"),
        0xdc => (3, 0.85, "array16"),
        0xdd => (5, 0.85, "array32"),
        0xde => (3, 0.85, "map16"),
        0xdf => (5, 0.85, "map32"),
        _ => return None,
    };
    Some(marker)
}

fn detect_messagepack(data: &[u8]) -> Option<BinaryFormat> {
    let first = *data.first()?;
    match first {
        0x80..=0x8f => return Some(BinaryFormat::new(MESSAGEPACK, 0.85, "fixmap")),
        0x90..=0x9f => return Some(BinaryFormat::new(MESSAGEPACK, 0.85, "fixarray")),
        0xa0..=0xbf => return Some(BinaryFormat::new(MESSAGEPACK, 0.8, "fixstr")),
        _ => {}
    }

    let (min_len, confidence, details) = messagepack_marker(first)?;
    (data.len() >= min_len).then(|| BinaryFormat::new(MESSAGEPACK, confidence, details))
}

fn detect_cbor(data: &[u8]) -> Option<BinaryFormat> {
    let first = *data.first()?;
    let major = first >> 5;
    let info = first & 0x1f;

    match major {
        4 | 5 if info <= 0x17 || info == 0x1f => {
            let details = if major == 4 { "array" } else { "map" };
            Some(BinaryFormat::new(CBOR, 0.75, details))
        }
        6 => Some(BinaryFormat::new(CBOR, 0.85, "tagged")),
        7 => {
            let (min_len, confidence, details) = match first {
                0xf4 => (0, 0.9, "false"),
                0xf5 => (0, 0.9, "true"),
                0xf6 => (0, 0.9, "null"),
                0xf7 => (0, 0.9, "undefined"),
                0xf9 => (3, 0.85, "float16"),
                0xfa => (5, 0.85, "float32"),
                0xfb => (9, 0.85, "float64"),
                0xff => (0, 0.8, "break"),
                _ => return None,
            };
            (data.len() >= min_len).then(|| BinaryFormat::new(CBOR, confidence, details))
        }
        _ => None,
    }
}

fn protobuf_field(field: u8, wire: &str) -> String {
    format!("field {field}, {wire}")
}

fn detect_protobuf(data: &[u8]) -> Option<BinaryFormat> {
    if data.len() < 2 {
        return None;
    }

    let wire_type = data[0] & 0x07;
    let field = data[0] >> 3;
    if field == 0 || field > 15 {
        return None;
    }

    match wire_type {
        0 => {
            // Varint: a terminating byte (high bit clear) within ten bytes.
            let terminated = data.iter().skip(1).take(9).any(|b| b & 0x80 == 0);
            (terminated || data.len() < 10)
                .then(|| BinaryFormat::new(PROTOBUF, 0.7, protobuf_field(field, "varint")))
        }
        1 => (data.len() >= 9)
            .then(|| BinaryFormat::new(PROTOBUF, 0.65, protobuf_field(field, "fixed64"))),
        2 => {
            let len_byte = data[1];
            if len_byte & 0x80 != 0 {
                return Some(BinaryFormat::new(
                    PROTOBUF,
                    0.6,
                    protobuf_field(field, "length-delimited"),
                ));
            }
            let length = usize::from(len_byte);
            (length > 0 && data.len() >= 2 + length).then(|| {
                BinaryFormat::new(PROTOBUF, 0.7, protobuf_field(field, "length-delimited"))
            })
        }
        5 => (data.len() >= 5)
            .then(|| BinaryFormat::new(PROTOBUF, 0.65, protobuf_field(field, "fixed32"))),
        _ => None,
    }
}

fn is_bson_element_type(b: u8) -> bool {
    matches!(b, 0x00..=0x13 | 0x7f | 0xff)
}

fn detect_bson(data: &[u8]) -> Option<BinaryFormat> {
    if data.len() < 5 {
        return None;
    }

    let doc_len = usize::try_from(u32::from_le_bytes([data[0], data[1], data[2], data[3]])).ok()?;
    if !(5..=BSON_MAX_DOC_LEN).contains(&doc_len) {
        return None;
    }
    // A complete document ends with 0x00; a truncated one must claim at least
    // as many bytes as we hold.
    if data.len() >= doc_len && data[doc_len - 1] != 0x00 {
        return None;
    }
    if doc_len < data.len() {
        return None;
    }

    is_bson_element_type(data[4]).then(|| BinaryFormat::new(BSON, 0.65, "document"))
}

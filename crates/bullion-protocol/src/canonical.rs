// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Canonical payload encoding.
//
// A reading is encoded as a JSON object with keys in byte-wise sorted order
// and no insignificant whitespace. Digest and signature agreement between
// gateway and verifier rests entirely on both producing identical bytes, so
// the encoding is built from an ordered map rather than from struct field
// order, and the field set is fixed by the deployment's `PayloadSchema`.
//
// The text form follows the gateway's JSON writer: only printable ASCII is
// written raw (everything else as `\uXXXX`, UTF-16 surrogate pairs above the
// BMP), and floats use the shortest round-trip digits, positional between
// 1e-4 and 1e16 with a trailing `.0` when integral, otherwise `1e-05` /
// `1e+16` exponent form.

use std::collections::{BTreeMap, BTreeSet};
use std::io;

use bullion_core::config::PayloadSchema;
use bullion_core::error::{BullionError, Result};
use bullion_core::types::{Location, Reading};
use serde::Serialize;
use serde_json::Value;
use serde_json::ser::{Formatter, Serializer};

/// Fields present in every schema, in canonical order.
pub const CORE_FIELDS: [&str; 7] = [
    "bar_id",
    "purity",
    "rfid_uid",
    "tamper_status",
    "timestamp",
    "vault_door_status",
    "vault_id",
];

/// Extra fields carried by [`PayloadSchema::WithLocation`].
pub const LOCATION_FIELDS: [&str; 2] = ["gps_lat", "gps_lon"];

/// The exact key set a payload must have under `schema`.
pub fn field_names(schema: PayloadSchema) -> BTreeSet<&'static str> {
    let mut fields: BTreeSet<&'static str> = CORE_FIELDS.into_iter().collect();
    if schema == PayloadSchema::WithLocation {
        fields.extend(LOCATION_FIELDS);
    }
    fields
}

/// Encode `reading` under `schema`.
///
/// A reading whose location presence disagrees with the schema is a protocol
/// violation on the sending side and is refused, never silently adapted.
pub fn encode(reading: &Reading, schema: PayloadSchema) -> Result<Vec<u8>> {
    reading.validate().map_err(BullionError::InvalidReading)?;

    let mut fields: BTreeMap<&'static str, Value> = BTreeMap::new();
    fields.insert("bar_id", Value::from(reading.bar_id.as_str()));
    fields.insert("purity", Value::from(reading.purity));
    fields.insert("rfid_uid", Value::from(reading.rfid_uid.as_str()));
    fields.insert("tamper_status", Value::from(reading.tamper_status.as_str()));
    fields.insert("timestamp", Value::from(reading.timestamp.as_str()));
    fields.insert("vault_door_status", Value::from(reading.vault_door_status.as_str()));
    fields.insert("vault_id", Value::from(reading.vault_id.as_str()));

    match (schema, reading.location) {
        (PayloadSchema::Core, None) => {}
        (PayloadSchema::WithLocation, Some(Location { gps_lat, gps_lon })) => {
            fields.insert("gps_lat", Value::from(gps_lat));
            fields.insert("gps_lon", Value::from(gps_lon));
        }
        (PayloadSchema::Core, Some(_)) => {
            return Err(BullionError::SchemaMismatch(
                "reading carries location but the schema has none".into(),
            ));
        }
        (PayloadSchema::WithLocation, None) => {
            return Err(BullionError::SchemaMismatch(
                "schema requires location but the reading has none".into(),
            ));
        }
    }

    let mut out = Vec::with_capacity(256);
    fields.serialize(&mut Serializer::with_formatter(&mut out, CanonicalFormatter))?;
    Ok(out)
}

/// Compact JSON with ASCII-only output and gateway-style float text.
struct CanonicalFormatter;

impl Formatter for CanonicalFormatter {
    fn write_f64<W: ?Sized + io::Write>(&mut self, writer: &mut W, value: f64) -> io::Result<()> {
        writer.write_all(format_float(value).as_bytes())
    }

    fn write_string_fragment<W: ?Sized + io::Write>(
        &mut self,
        writer: &mut W,
        fragment: &str,
    ) -> io::Result<()> {
        let mut start = 0;
        for (i, ch) in fragment.char_indices() {
            if (' '..='~').contains(&ch) {
                continue;
            }
            writer.write_all(fragment[start..i].as_bytes())?;
            let mut units = [0u16; 2];
            for unit in ch.encode_utf16(&mut units) {
                write!(writer, "\\u{unit:04x}")?;
            }
            start = i + ch.len_utf8();
        }
        writer.write_all(fragment[start..].as_bytes())
    }
}

/// Shortest round-trip text for a finite float.
fn format_float(value: f64) -> String {
    let sci = format!("{value:e}");
    let (mantissa, exponent) = sci.split_once('e').unwrap_or((sci.as_str(), "0"));
    let exponent: i32 = exponent.parse().unwrap_or(0);
    let (sign, mantissa) = match mantissa.strip_prefix('-') {
        Some(m) => ("-", m),
        None => ("", mantissa),
    };
    let digits: String = mantissa.chars().filter(|c| *c != '.').collect();
    let len = digits.len() as i32;
    // Digits before the decimal point.
    let point = exponent + 1;

    let body = if point > -4 && point <= 16 {
        if point <= 0 {
            format!("0.{}{digits}", "0".repeat(point.unsigned_abs() as usize))
        } else if point >= len {
            format!("{digits}{}.0", "0".repeat((point - len) as usize))
        } else {
            let (int, frac) = digits.split_at(point as usize);
            format!("{int}.{frac}")
        }
    } else {
        let (first, rest) = digits.split_at(1);
        let frac = if rest.is_empty() { String::new() } else { format!(".{rest}") };
        let exp_sign = if exponent < 0 { '-' } else { '+' };
        format!("{first}{frac}e{exp_sign}{:02}", exponent.unsigned_abs())
    };
    format!("{sign}{body}")
}

/// Decode a canonical payload under `schema`.
///
/// The key set must match the schema exactly; unknown, missing, or
/// ill-typed fields and out-of-range values are all [`BullionError::Parse`].
pub fn decode(bytes: &[u8], schema: PayloadSchema) -> Result<Reading> {
    let object: BTreeMap<String, Value> =
        serde_json::from_slice(bytes).map_err(|e| BullionError::Parse(e.to_string()))?;

    let expected = field_names(schema);
    let actual: BTreeSet<&str> = object.keys().map(String::as_str).collect();
    if actual != expected {
        let missing: Vec<&str> = expected.difference(&actual).copied().collect();
        let unexpected: Vec<&str> = actual.difference(&expected).copied().collect();
        return Err(BullionError::Parse(format!(
            "field set does not match schema (missing {missing:?}, unexpected {unexpected:?})"
        )));
    }

    let reading: Reading =
        serde_json::from_slice(bytes).map_err(|e| BullionError::Parse(e.to_string()))?;
    reading.validate().map_err(BullionError::Parse)?;
    Ok(reading)
}

#[cfg(test)]
mod tests {
    use super::*;
    use bullion_core::types::{DoorState, TamperState};

    fn reading() -> Reading {
        Reading {
            timestamp: "2025-11-02T10:15:30.123456+00:00".into(),
            vault_id: "VLT-001".into(),
            bar_id: "BAR-001".into(),
            rfid_uid: "TAG12345".into(),
            purity: 99.5,
            tamper_status: TamperState::Intact,
            vault_door_status: DoorState::Closed,
            location: None,
        }
    }

    #[test]
    fn sorted_compact_encoding() {
        let bytes = encode(&reading(), PayloadSchema::Core).unwrap();
        assert_eq!(
            String::from_utf8(bytes).unwrap(),
            r#"{"bar_id":"BAR-001","purity":99.5,"rfid_uid":"TAG12345","tamper_status":"INTACT","timestamp":"2025-11-02T10:15:30.123456+00:00","vault_door_status":"CLOSED","vault_id":"VLT-001"}"#
        );
    }

    #[test]
    fn whole_purity_keeps_decimal_point() {
        let mut r = reading();
        r.purity = 99.0;
        let text = String::from_utf8(encode(&r, PayloadSchema::Core).unwrap()).unwrap();
        assert!(text.contains(r#""purity":99.0,"#));
    }

    #[test]
    fn location_fields_sort_into_place() {
        let mut r = reading();
        r.location = Some(Location { gps_lat: 51.5, gps_lon: -0.12 });
        let text = String::from_utf8(encode(&r, PayloadSchema::WithLocation).unwrap()).unwrap();
        assert!(text.starts_with(r#"{"bar_id":"BAR-001","gps_lat":51.5,"gps_lon":-0.12,"purity""#));
        assert_eq!(decode(text.as_bytes(), PayloadSchema::WithLocation).unwrap(), r);
    }

    #[test]
    fn float_text_matches_gateway() {
        let cases = [
            (99.5, "99.5"),
            (100.0, "100.0"),
            (0.0, "0.0"),
            (-0.0, "-0.0"),
            (-0.12, "-0.12"),
            (0.0001, "0.0001"),
            (0.00001, "1e-05"),
            (-1.5e-7, "-1.5e-07"),
            (1234567890123456.0, "1234567890123456.0"),
            (1e16, "1e+16"),
            (1e22, "1e+22"),
            (114.1694, "114.1694"),
        ];
        for (value, text) in cases {
            assert_eq!(format_float(value), text, "{value:?}");
            assert_eq!(format_float(value).parse::<f64>().unwrap(), value);
        }
    }

    #[test]
    fn tiny_coordinate_uses_two_digit_exponent() {
        let mut r = reading();
        r.location = Some(Location { gps_lat: 0.00001, gps_lon: -0.0 });
        let text = String::from_utf8(encode(&r, PayloadSchema::WithLocation).unwrap()).unwrap();
        assert!(text.contains(r#""gps_lat":1e-05,"gps_lon":-0.0,"#), "{text}");
        assert_eq!(decode(text.as_bytes(), PayloadSchema::WithLocation).unwrap(), r);
    }

    #[test]
    fn non_ascii_is_escaped() {
        let mut r = reading();
        r.bar_id = "BAR-\u{fc}\u{1f512}".into();
        r.rfid_uid = "TAG\u{7f}\t".into();
        let bytes = encode(&r, PayloadSchema::Core).unwrap();
        assert!(bytes.is_ascii());

        let text = String::from_utf8(bytes).unwrap();
        assert!(text.contains(r#""bar_id":"BAR-\u00fc\ud83d\udd12""#), "{text}");
        assert!(text.contains(r#""rfid_uid":"TAG\u007f\t""#), "{text}");
        assert_eq!(decode(text.as_bytes(), PayloadSchema::Core).unwrap(), r);
    }

    #[test]
    fn schema_mixing_is_refused_on_encode() {
        let mut located = reading();
        located.location = Some(Location { gps_lat: 1.0, gps_lon: 2.0 });
        assert!(matches!(
            encode(&located, PayloadSchema::Core),
            Err(BullionError::SchemaMismatch(_))
        ));
        assert!(matches!(
            encode(&reading(), PayloadSchema::WithLocation),
            Err(BullionError::SchemaMismatch(_))
        ));
    }

    #[test]
    fn schema_mixing_is_a_parse_error_on_decode() {
        let core = encode(&reading(), PayloadSchema::Core).unwrap();
        assert!(matches!(
            decode(&core, PayloadSchema::WithLocation),
            Err(BullionError::Parse(_))
        ));
    }

    #[test]
    fn rejects_unknown_and_malformed_payloads() {
        let extra = br#"{"bar_id":"B","extra":1,"purity":99.5,"rfid_uid":"T","tamper_status":"INTACT","timestamp":"t","vault_door_status":"CLOSED","vault_id":"V"}"#;
        assert!(matches!(decode(extra, PayloadSchema::Core), Err(BullionError::Parse(_))));

        let bad_state = br#"{"bar_id":"B","purity":99.5,"rfid_uid":"T","tamper_status":"ALARM","timestamp":"t","vault_door_status":"CLOSED","vault_id":"V"}"#;
        assert!(matches!(decode(bad_state, PayloadSchema::Core), Err(BullionError::Parse(_))));

        let out_of_range = br#"{"bar_id":"B","purity":140.0,"rfid_uid":"T","tamper_status":"INTACT","timestamp":"t","vault_door_status":"CLOSED","vault_id":"V"}"#;
        assert!(matches!(decode(out_of_range, PayloadSchema::Core), Err(BullionError::Parse(_))));

        assert!(matches!(decode(b"\x00\x01garbage", PayloadSchema::Core), Err(BullionError::Parse(_))));
        assert!(matches!(decode(b"[1,2,3]", PayloadSchema::Core), Err(BullionError::Parse(_))));
    }

    #[test]
    fn invalid_reading_is_refused_on_encode() {
        let mut r = reading();
        r.purity = -1.0;
        assert!(matches!(encode(&r, PayloadSchema::Core), Err(BullionError::InvalidReading(_))));
    }
}

use apache_avro::schema::{NamesRef, ResolvedSchema};
use apache_avro::types::Value;
use apache_avro::{Decimal, Duration, Schema};
use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use chrono::{DateTime, NaiveTime, SecondsFormat};

use crate::error::DecodeError;

/// Decode one Avro datum (no container, no header) into a JSON value.
pub fn decode_datum(schema: &Schema, mut body: &[u8]) -> Result<serde_json::Value, DecodeError> {
    let value = apache_avro::from_avro_datum(schema, &mut body, None)
        .map_err(|e| DecodeError::Avro(e.to_string()))?;
    if !body.is_empty() {
        return Err(DecodeError::Avro(format!("{} trailing bytes after datum", body.len())));
    }
    let resolved = ResolvedSchema::try_from(schema).map_err(|e| DecodeError::Avro(e.to_string()))?;
    Ok(RecordJson::new(resolved.get_names()).convert(&value, Some(schema)))
}

/// Avro value → event JSON, guided by the writer schema.
///
/// Logical types come out the way envelope consumers read them: decimals as
/// numbers, timestamps as RFC 3339, dates and times as ISO strings. Without a
/// schema (or on an unresolvable reference) decimals are treated as scale 0.
struct RecordJson<'a> {
    names: &'a NamesRef<'a>,
}

impl<'a> RecordJson<'a> {
    fn new(names: &'a NamesRef<'a>) -> Self {
        Self { names }
    }

    fn resolve<'s>(&'s self, schema: Option<&'s Schema>) -> Option<&'s Schema> {
        match schema {
            Some(Schema::Ref { name }) => self
                .names
                .get(name)
                .or_else(|| {
                    self.names
                        .iter()
                        .find(|(known, _)| known.name == name.name)
                        .map(|(_, schema)| schema)
                })
                .copied(),
            other => other,
        }
    }

    fn convert(&self, value: &Value, schema: Option<&Schema>) -> serde_json::Value {
        let schema = self.resolve(schema);
        match value {
            Value::Null => serde_json::Value::Null,
            Value::Boolean(b) => serde_json::Value::Bool(*b),
            Value::Int(i) => (*i).into(),
            Value::Long(l) => (*l).into(),
            Value::Float(f) => float(f64::from(*f)),
            Value::Double(d) => float(*d),
            Value::Bytes(b) | Value::Fixed(_, b) => STANDARD.encode(b).into(),
            Value::String(s) | Value::Enum(_, s) => s.clone().into(),
            Value::Uuid(u) => u.to_string().into(),

            Value::Union(branch, inner) => {
                let variant = match schema {
                    Some(Schema::Union(union)) => union.variants().get(*branch as usize),
                    _ => None,
                };
                self.convert(inner, variant)
            }
            Value::Array(items) => {
                let item_schema = match schema {
                    Some(Schema::Array(array)) => Some(array.items.as_ref()),
                    _ => None,
                };
                items.iter().map(|v| self.convert(v, item_schema)).collect()
            }
            Value::Map(entries) => {
                let value_schema = match schema {
                    Some(Schema::Map(map)) => Some(map.types.as_ref()),
                    _ => None,
                };
                entries
                    .iter()
                    .map(|(k, v)| (k.clone(), self.convert(v, value_schema)))
                    .collect::<serde_json::Map<_, _>>()
                    .into()
            }
            Value::Record(fields) => {
                let record = match schema {
                    Some(Schema::Record(record)) => Some(record),
                    _ => None,
                };
                fields
                    .iter()
                    .map(|(name, v)| {
                        let field_schema = record
                            .and_then(|r| r.lookup.get(name))
                            .and_then(|&i| record.and_then(|r| r.fields.get(i)))
                            .map(|f| &f.schema);
                        (name.clone(), self.convert(v, field_schema))
                    })
                    .collect::<serde_json::Map<_, _>>()
                    .into()
            }

            Value::Decimal(d) => {
                let scale = match schema {
                    Some(Schema::Decimal(decimal)) => decimal.scale,
                    _ => 0,
                };
                decimal(d, scale)
            }
            Value::BigDecimal(d) => number_or_string(d.to_string()),
            Value::Duration(d) => duration(d),

            Value::Date(days) => DateTime::from_timestamp(i64::from(*days) * 86_400, 0)
                .map(|t| t.date_naive().to_string().into())
                .unwrap_or_else(|| (*days).into()),
            Value::TimeMillis(ms) => time_of_day(i64::from(*ms) * 1_000_000),
            Value::TimeMicros(us) => time_of_day(us.saturating_mul(1_000)),
            Value::TimestampMillis(t) => instant(*t, 1_000, false),
            Value::TimestampMicros(t) => instant(*t, 1_000_000, false),
            Value::TimestampNanos(t) => instant(*t, 1_000_000_000, false),
            Value::LocalTimestampMillis(t) => instant(*t, 1_000, true),
            Value::LocalTimestampMicros(t) => instant(*t, 1_000_000, true),
            Value::LocalTimestampNanos(t) => instant(*t, 1_000_000_000, true),
        }
    }
}

/// NaN and infinities have no JSON form.
fn float(f: f64) -> serde_json::Value {
    serde_json::Number::from_f64(f)
        .map(serde_json::Value::Number)
        .unwrap_or(serde_json::Value::Null)
}

fn number_or_string(text: String) -> serde_json::Value {
    match text.parse::<f64>().ok().and_then(serde_json::Number::from_f64) {
        Some(n) => serde_json::Value::Number(n),
        None => serde_json::Value::String(text),
    }
}

/// Big-endian two's complement unscaled value, up to 128 bits.
fn unscaled(bytes: &[u8]) -> Option<i128> {
    if bytes.len() > 16 {
        return None;
    }
    let fill = match bytes.first() {
        Some(b) if b & 0x80 != 0 => 0xFF,
        _ => 0x00,
    };
    let mut buf = [fill; 16];
    buf[16 - bytes.len()..].copy_from_slice(bytes);
    Some(i128::from_be_bytes(buf))
}

fn decimal(d: &Decimal, scale: usize) -> serde_json::Value {
    let Ok(bytes) = <Vec<u8>>::try_from(d) else {
        return serde_json::Value::Null;
    };
    let Some(n) = unscaled(&bytes) else {
        // Wider than 128 bits: keep the raw digits.
        return STANDARD.encode(bytes).into();
    };

    let digits = n.unsigned_abs().to_string();
    let digits = if digits.len() <= scale {
        format!("{}{digits}", "0".repeat(scale + 1 - digits.len()))
    } else {
        digits
    };
    let (int, frac) = digits.split_at(digits.len() - scale);
    let sign = if n < 0 { "-" } else { "" };
    let text = if frac.is_empty() {
        format!("{sign}{int}")
    } else {
        format!("{sign}{int}.{frac}")
    };
    number_or_string(text)
}

fn duration(d: &Duration) -> serde_json::Value {
    serde_json::json!({
        "months": u32::from(d.months()),
        "days": u32::from(d.days()),
        "millis": u32::from(d.millis()),
    })
}

fn time_of_day(nanos: i64) -> serde_json::Value {
    let secs = nanos.div_euclid(1_000_000_000);
    let sub = nanos.rem_euclid(1_000_000_000);
    u32::try_from(secs)
        .ok()
        .and_then(|s| NaiveTime::from_num_seconds_from_midnight_opt(s, sub as u32))
        .map(|t| t.format("%H:%M:%S%.f").to_string().into())
        .unwrap_or_else(|| nanos.into())
}

/// `t` ticks of `1/per_sec` seconds since the epoch. Out-of-range values stay numeric.
fn instant(t: i64, per_sec: i64, local: bool) -> serde_json::Value {
    let secs = t.div_euclid(per_sec);
    let nanos = t.rem_euclid(per_sec) * (1_000_000_000 / per_sec);
    let Some(at) = DateTime::from_timestamp(secs, nanos as u32) else {
        return t.into();
    };
    if local {
        at.naive_utc().format("%Y-%m-%dT%H:%M:%S%.f").to_string().into()
    } else {
        at.to_rfc3339_opts(SecondsFormat::AutoSi, true).into()
    }
}

#[cfg(test)]
pub(crate) const RIDE_SCHEMA: &str = r#"{
    "type": "record",
    "name": "TaxiRide",
    "fields": [
        {"name": "ride_id", "type": "string"},
        {"name": "fare", "type": "double"},
        {"name": "passengers", "type": "int"},
        {"name": "note", "type": ["null", "string"], "default": null}
    ]
}"#;

#[cfg(test)]
pub(crate) fn encode_ride(ride_id: &str, fare: f64) -> Vec<u8> {
    let schema = Schema::parse_str(RIDE_SCHEMA).unwrap();
    let record = Value::Record(vec![
        ("ride_id".into(), Value::String(ride_id.into())),
        ("fare".into(), Value::Double(fare)),
        ("passengers".into(), Value::Int(2)),
        ("note".into(), Value::Union(0, Box::new(Value::Null))),
    ]);
    apache_avro::to_avro_datum(&schema, record).unwrap()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_decode_record_datum() {
        let schema = Schema::parse_str(RIDE_SCHEMA).unwrap();
        let json = decode_datum(&schema, &encode_ride("r-1", 12.5)).unwrap();
        assert_eq!(
            json,
            serde_json::json!({ "ride_id": "r-1", "fare": 12.5, "passengers": 2, "note": null })
        );
    }

    #[test]
    fn test_decode_rejects_garbage() {
        let schema = Schema::parse_str(RIDE_SCHEMA).unwrap();
        assert!(decode_datum(&schema, &[0xFF, 0xFF, 0xFF]).is_err());
    }

    #[test]
    fn test_bytes_become_base64() {
        let schema = Schema::parse_str(r#""bytes""#).unwrap();
        let body = apache_avro::to_avro_datum(&schema, Value::Bytes(vec![0xFF, 0xFE])).unwrap();
        assert_eq!(decode_datum(&schema, &body).unwrap(), serde_json::json!("//4="));
    }

    #[test]
    fn test_logical_types_render_for_consumers() {
        let schema = Schema::parse_str(
            r#"{
                "type": "record",
                "name": "Fare",
                "fields": [
                    {"name": "amount", "type": {"type": "bytes", "logicalType": "decimal", "precision": 9, "scale": 2}},
                    {"name": "refund", "type": {"type": "bytes", "logicalType": "decimal", "precision": 9, "scale": 3}},
                    {"name": "pickup", "type": {"type": "long", "logicalType": "timestamp-millis"}},
                    {"name": "day", "type": {"type": "int", "logicalType": "date"}},
                    {"name": "at", "type": {"type": "int", "logicalType": "time-millis"}}
                ]
            }"#,
        )
        .unwrap();
        let record = Value::Record(vec![
            ("amount".into(), Value::Decimal(Decimal::from(1234i64.to_be_bytes()))),
            ("refund".into(), Value::Decimal(Decimal::from((-5i64).to_be_bytes()))),
            ("pickup".into(), Value::TimestampMillis(1_700_000_000_123)),
            ("day".into(), Value::Date(19_675)),
            ("at".into(), Value::TimeMillis(3_723_000)),
        ]);
        let body = apache_avro::to_avro_datum(&schema, record).unwrap();

        let json = decode_datum(&schema, &body).unwrap();
        assert_eq!(json["amount"], serde_json::json!(12.34));
        assert_eq!(json["refund"], serde_json::json!(-0.005));
        assert_eq!(json["pickup"], "2023-11-14T22:13:20.123Z");
        assert_eq!(json["day"], "2023-11-14");
        assert_eq!(json["at"], "01:02:03");
    }

    #[test]
    fn test_named_reference_keeps_decimal_scale() {
        let schema = Schema::parse_str(
            r#"{
                "type": "record",
                "name": "Trip",
                "namespace": "rides",
                "fields": [
                    {"name": "base", "type": {"type": "fixed", "name": "Money", "size": 8, "logicalType": "decimal", "precision": 18, "scale": 2}},
                    {"name": "tip", "type": ["null", "Money"]}
                ]
            }"#,
        )
        .unwrap();
        let record = Value::Record(vec![
            ("base".into(), Value::Decimal(Decimal::from(1050i64.to_be_bytes()))),
            (
                "tip".into(),
                Value::Union(1, Box::new(Value::Decimal(Decimal::from(250i64.to_be_bytes())))),
            ),
        ]);
        let body = apache_avro::to_avro_datum(&schema, record).unwrap();

        let json = decode_datum(&schema, &body).unwrap();
        assert_eq!(json, serde_json::json!({ "base": 10.5, "tip": 2.5 }));
    }

    #[test]
    fn test_unscaled_sign_extension() {
        assert_eq!(unscaled(&[]), Some(0));
        assert_eq!(unscaled(&[0xFF]), Some(-1));
        assert_eq!(unscaled(&[0x00, 0x80]), Some(128));
        assert_eq!(unscaled(&[0u8; 17]), None);
    }

    #[test]
    fn test_non_finite_double_is_null() {
        assert_eq!(float(f64::NAN), serde_json::Value::Null);
        assert_eq!(float(1.5), serde_json::json!(1.5));
    }
}

//! Normalizes the coordinate shapes clients and older records send into one
//! [`GeoPoint`]. Decoding happens once at the API boundary.

use serde_json::Value;

use crate::models::GeoPoint;

const EWKB_Z: u32 = 0x8000_0000;
const EWKB_M: u32 = 0x4000_0000;
const EWKB_SRID: u32 = 0x2000_0000;

/// Accepts `{lat,lng}`, `{latitude,longitude}`, GeoJSON points (as objects or
/// JSON text), `[lng, lat]` arrays, WKT `POINT(lng lat)` with an optional
/// `SRID=n;` prefix, and hex (E)WKB points.
pub fn parse_coordinate_value(value: &Value) -> Option<GeoPoint> {
    match value {
        Value::Null => None,
        Value::String(s) => parse_coordinate_str(s),
        Value::Array(items) => parse_lng_lat_array(items),
        Value::Object(map) => {
            if let (Some(lat), Some(lng)) = (
                map.get("lat").or_else(|| map.get("latitude")),
                map.get("lng")
                    .or_else(|| map.get("lon"))
                    .or_else(|| map.get("longitude")),
            ) {
                return GeoPoint::new(as_f64(lat)?, as_f64(lng)?);
            }

            let is_point = map
                .get("type")
                .and_then(Value::as_str)
                .map(|t| t.eq_ignore_ascii_case("point"))
                .unwrap_or(false);
            if is_point {
                return map
                    .get("coordinates")
                    .and_then(Value::as_array)
                    .and_then(|c| parse_lng_lat_array(c));
            }
            None
        }
        Value::Bool(_) | Value::Number(_) => None,
    }
}

fn as_f64(value: &Value) -> Option<f64> {
    match value {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.trim().parse().ok(),
        _ => None,
    }
}

fn parse_lng_lat_array(items: &[Value]) -> Option<GeoPoint> {
    if items.len() < 2 {
        return None;
    }
    let lng = as_f64(&items[0])?;
    let lat = as_f64(&items[1])?;
    GeoPoint::new(lat, lng)
}

fn parse_coordinate_str(raw: &str) -> Option<GeoPoint> {
    let s = raw.trim();
    if s.is_empty() {
        return None;
    }

    if s.starts_with('{') || s.starts_with('[') {
        let nested: Value = serde_json::from_str(s).ok()?;
        return parse_coordinate_value(&nested);
    }

    let without_srid = match s.split_once(';') {
        Some((prefix, rest)) if prefix.trim().to_uppercase().starts_with("SRID=") => rest.trim(),
        _ => s,
    };

    if without_srid.to_uppercase().starts_with("POINT") {
        return parse_wkt_point(without_srid);
    }

    parse_wkb_hex(without_srid)
}

fn parse_wkt_point(s: &str) -> Option<GeoPoint> {
    let open = s.find('(')?;
    let close = s.rfind(')')?;
    if close <= open {
        return None;
    }
    let mut parts = s[open + 1..close].split_whitespace();
    let lng: f64 = parts.next()?.parse().ok()?;
    let lat: f64 = parts.next()?.parse().ok()?;
    GeoPoint::new(lat, lng)
}

fn decode_hex(s: &str) -> Option<Vec<u8>> {
    if s.len() % 2 != 0 {
        return None;
    }
    (0..s.len())
        .step_by(2)
        .map(|i| u8::from_str_radix(s.get(i..i + 2)?, 16).ok())
        .collect()
}

struct WkbReader<'a> {
    bytes: &'a [u8],
    pos: usize,
    little_endian: bool,
}

impl<'a> WkbReader<'a> {
    fn take<const N: usize>(&mut self) -> Option<[u8; N]> {
        let chunk = self.bytes.get(self.pos..self.pos + N)?;
        self.pos += N;
        chunk.try_into().ok()
    }

    fn u32(&mut self) -> Option<u32> {
        let b = self.take::<4>()?;
        Some(if self.little_endian {
            u32::from_le_bytes(b)
        } else {
            u32::from_be_bytes(b)
        })
    }

    fn f64(&mut self) -> Option<f64> {
        let b = self.take::<8>()?;
        Some(if self.little_endian {
            f64::from_le_bytes(b)
        } else {
            f64::from_be_bytes(b)
        })
    }
}

fn parse_wkb_hex(s: &str) -> Option<GeoPoint> {
    let bytes = decode_hex(s)?;
    let little_endian = match bytes.first()? {
        0 => false,
        1 => true,
        _ => return None,
    };
    let mut reader = WkbReader {
        bytes: &bytes,
        pos: 1,
        little_endian,
    };

    let geometry_type = reader.u32()?;
    let base = geometry_type & !(EWKB_Z | EWKB_M | EWKB_SRID);
    // ISO WKB encodes Z/M as 1001, 2001 and 3001.
    if base % 1000 != 1 {
        return None;
    }
    if geometry_type & EWKB_SRID != 0 {
        reader.u32()?;
    }

    let lng = reader.f64()?;
    let lat = reader.f64()?;
    GeoPoint::new(lat, lng)
}

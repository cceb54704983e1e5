//! Privacy redaction applied to readings before they leave the agent.
//!
//! Levels are ordered from most restrictive ([`PrivacyLevel::Hidden`]) to full
//! disclosure ([`PrivacyLevel::Full`]). The transformation depends on the
//! reading's [`ValueKind`]; any `(kind, level)` pair without a specific rule
//! passes the payload through unchanged, except `Hidden`, which always blanks
//! the payload. Identifier kinds never pass through below `Full`: a payload
//! the truncation rule cannot parse is hashed instead.

use crate::core::value::{SensorValue, ValueKind};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use sha2::{Digest, Sha256};
use std::fmt;
use std::net::IpAddr;
use std::str::FromStr;

/// Number of hex characters kept from an identifier hash.
const HASH_LEN: usize = 16;

/// How much of a reading may be disclosed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PrivacyLevel {
    /// Nothing is disclosed
    Hidden,
    /// Identifiers hashed, positions heavily rounded
    Coarse,
    /// Identifiers truncated or hashed, positions lightly rounded
    Partial,
    /// Raw values
    Full,
}

impl Default for PrivacyLevel {
    fn default() -> Self {
        PrivacyLevel::Full
    }
}

impl fmt::Display for PrivacyLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            PrivacyLevel::Hidden => "hidden",
            PrivacyLevel::Coarse => "coarse",
            PrivacyLevel::Partial => "partial",
            PrivacyLevel::Full => "full",
        };
        f.write_str(s)
    }
}

impl FromStr for PrivacyLevel {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "hidden" | "none" => Ok(PrivacyLevel::Hidden),
            "coarse" | "low" => Ok(PrivacyLevel::Coarse),
            "partial" | "medium" => Ok(PrivacyLevel::Partial),
            "full" => Ok(PrivacyLevel::Full),
            other => Err(format!("unknown privacy level '{other}'")),
        }
    }
}

/// Redact a reading with an unsalted hash for identifiers.
pub fn anonymize(value: &SensorValue, level: PrivacyLevel) -> SensorValue {
    anonymize_salted(value, level, "")
}

/// Redact a reading according to `level`.
///
/// Never mutates the input; the returned reading keeps the unit and kind.
/// `salt` is mixed into identifier hashes so they cannot be matched across
/// installs.
pub fn anonymize_salted(value: &SensorValue, level: PrivacyLevel, salt: &str) -> SensorValue {
    if level == PrivacyLevel::Full {
        return value.clone();
    }
    if level == PrivacyLevel::Hidden || value.value().is_null() {
        return value.replaced(Value::Null);
    }

    let payload = value.value();
    let redacted = match (value.kind(), level) {
        (ValueKind::Ssid | ValueKind::Bssid, _) => Some(hash_payload(payload, salt)),
        (ValueKind::MacAddress, PrivacyLevel::Partial) => Some(
            payload
                .as_str()
                .and_then(keep_vendor_prefix)
                .map(Value::String)
                .unwrap_or_else(|| hash_payload(payload, salt)),
        ),
        (ValueKind::MacAddress, _) => Some(hash_payload(payload, salt)),
        (ValueKind::DeviceIp, level) => Some(
            payload
                .as_str()
                .and_then(|ip| truncate_ip(ip, level))
                .map(Value::String)
                .unwrap_or_else(|| hash_payload(payload, salt)),
        ),
        (ValueKind::Latitude | ValueKind::Longitude, PrivacyLevel::Partial) => {
            round_number(payload, 2)
        }
        (ValueKind::Latitude | ValueKind::Longitude, _) => round_number(payload, 1),
        (ValueKind::Altitude, PrivacyLevel::Partial) => round_number(payload, -1),
        (ValueKind::Altitude, _) => round_number(payload, -2),
        (ValueKind::SignalStrength, PrivacyLevel::Coarse) => round_number(payload, -1),
        _ => None,
    };

    match redacted {
        Some(v) => value.replaced(v),
        None => value.clone(),
    }
}

/// Salted SHA-256 of the payload text, shortened to [`HASH_LEN`] hex chars.
fn hash_payload(payload: &Value, salt: &str) -> Value {
    let text = match payload {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    };
    let mut hasher = Sha256::new();
    hasher.update(salt.as_bytes());
    hasher.update(b":");
    hasher.update(text.as_bytes());
    let digest = hex::encode(hasher.finalize());
    Value::String(digest[..HASH_LEN].to_string())
}

/// Keep the OUI (first three octets) of a MAC address.
///
/// Accepts colon or dash separators; anything that is not six hex octets
/// yields `None`.
fn keep_vendor_prefix(mac: &str) -> Option<String> {
    let octets: Vec<&str> = mac.trim().split([':', '-']).collect();
    let well_formed = octets.len() == 6
        && octets
            .iter()
            .all(|o| o.len() == 2 && o.chars().all(|c| c.is_ascii_hexdigit()));
    if !well_formed {
        return None;
    }
    Some(format!("{}:00:00:00", octets[..3].join(":").to_lowercase()))
}

/// Zero the host part of an address: /24 or /16 for IPv4, /64 or /32 for IPv6.
fn truncate_ip(ip: &str, level: PrivacyLevel) -> Option<String> {
    let addr: IpAddr = ip.trim().parse().ok()?;
    let out = match addr {
        IpAddr::V4(v4) => {
            let mut o = v4.octets();
            let keep = if level == PrivacyLevel::Partial { 3 } else { 2 };
            for b in o.iter_mut().skip(keep) {
                *b = 0;
            }
            IpAddr::from(o)
        }
        IpAddr::V6(v6) => {
            let mut s = v6.segments();
            let keep = if level == PrivacyLevel::Partial { 4 } else { 2 };
            for seg in s.iter_mut().skip(keep) {
                *seg = 0;
            }
            IpAddr::from(s)
        }
    };
    Some(out.to_string())
}

/// Round a numeric payload to `decimals` places; negative values round to
/// tens, hundreds, and so on. Integers stay integers.
fn round_number(payload: &Value, decimals: i32) -> Option<Value> {
    let n = payload.as_f64()?;
    let rounded = if decimals >= 0 {
        let scale = 10f64.powi(decimals);
        (n * scale).round() / scale
    } else {
        let step = 10f64.powi(-decimals);
        (n / step).round() * step
    };
    if payload.is_i64() || payload.is_u64() {
        Some(Value::from(rounded as i64))
    } else {
        serde_json::Number::from_f64(rounded).map(Value::Number)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::value::Unit;
    use serde_json::json;

    fn reading(kind: ValueKind, unit: Unit, v: Value) -> SensorValue {
        SensorValue::with_value(unit, kind, v)
    }

    #[test]
    fn test_levels_are_ordered() {
        assert!(PrivacyLevel::Hidden < PrivacyLevel::Coarse);
        assert!(PrivacyLevel::Coarse < PrivacyLevel::Partial);
        assert!(PrivacyLevel::Partial < PrivacyLevel::Full);
        assert_eq!(PrivacyLevel::default(), PrivacyLevel::Full);
    }

    #[test]
    fn test_full_passes_through() {
        let v = reading(ValueKind::Ssid, Unit::String, json!("home-net"));
        assert_eq!(anonymize(&v, PrivacyLevel::Full), v);
    }

    #[test]
    fn test_hidden_blanks_every_kind() {
        let v = reading(ValueKind::Speed, Unit::Mbps, json!(72));
        let out = anonymize(&v, PrivacyLevel::Hidden);
        assert!(out.value().is_null());
        assert_eq!(out.kind(), ValueKind::Speed);
        assert_eq!(out.unit(), Unit::Mbps);
    }

    #[test]
    fn test_input_is_not_mutated() {
        let v = reading(ValueKind::Latitude, Unit::Degree, json!(48.208176));
        let _ = anonymize(&v, PrivacyLevel::Coarse);
        assert_eq!(v.value(), &json!(48.208176));
    }

    #[test]
    fn test_ssid_is_hashed_deterministically() {
        let v = reading(ValueKind::Ssid, Unit::String, json!("home-net"));
        let a = anonymize_salted(&v, PrivacyLevel::Partial, "salt");
        let b = anonymize_salted(&v, PrivacyLevel::Partial, "salt");
        let c = anonymize_salted(&v, PrivacyLevel::Partial, "other");
        assert_eq!(a, b);
        assert_ne!(a, c);
        assert_ne!(a.value(), v.value());
        assert_eq!(a.value().as_str().unwrap().len(), HASH_LEN);
    }

    #[test]
    fn test_mac_partial_keeps_vendor() {
        let v = reading(ValueKind::MacAddress, Unit::String, json!("a4:5e:60:12:34:56"));
        let out = anonymize(&v, PrivacyLevel::Partial);
        assert_eq!(out.value(), &json!("a4:5e:60:00:00:00"));

        let coarse = anonymize(&v, PrivacyLevel::Coarse);
        assert_eq!(coarse.value().as_str().unwrap().len(), HASH_LEN);
    }

    #[test]
    fn test_ip_truncation() {
        let v = reading(ValueKind::DeviceIp, Unit::String, json!("192.168.17.42"));
        assert_eq!(anonymize(&v, PrivacyLevel::Partial).value(), &json!("192.168.17.0"));
        assert_eq!(anonymize(&v, PrivacyLevel::Coarse).value(), &json!("192.168.0.0"));

        let v6 = reading(ValueKind::DeviceIp, Unit::String, json!("2001:db8:1:2:3:4:5:6"));
        assert_eq!(anonymize(&v6, PrivacyLevel::Partial).value(), &json!("2001:db8:1:2::"));
    }

    #[test]
    fn test_coordinates_rounded() {
        let v = reading(ValueKind::Latitude, Unit::Degree, json!(48.208176));
        assert_eq!(anonymize(&v, PrivacyLevel::Partial).value(), &json!(48.21));
        assert_eq!(anonymize(&v, PrivacyLevel::Coarse).value(), &json!(48.2));
    }

    #[test]
    fn test_rssi_coarse_rounding_keeps_integer() {
        let v = reading(ValueKind::SignalStrength, Unit::Dbm, json!(-67));
        assert_eq!(anonymize(&v, PrivacyLevel::Coarse).value(), &json!(-70));
        assert_eq!(anonymize(&v, PrivacyLevel::Partial).value(), &json!(-67));
    }

    #[test]
    fn test_unparseable_identifier_is_hashed() {
        let mac = reading(ValueKind::MacAddress, Unit::String, json!("A4-C3-F0-12-34-56"));
        assert_eq!(anonymize(&mac, PrivacyLevel::Partial).value(), &json!("a4:c3:f0:00:00:00"));

        let odd_mac = reading(ValueKind::MacAddress, Unit::String, json!("a4c3.f012.3456"));
        let out = anonymize_salted(&odd_mac, PrivacyLevel::Partial, "salt");
        assert_ne!(out.value(), odd_mac.value());
        assert_eq!(out.value().as_str().unwrap().len(), HASH_LEN);

        let scoped = reading(ValueKind::DeviceIp, Unit::String, json!("fe80::1%wlan0"));
        let out = anonymize(&scoped, PrivacyLevel::Coarse);
        assert_ne!(out.value(), scoped.value());
        assert_eq!(out.value().as_str().unwrap().len(), HASH_LEN);

        let numeric_ip = reading(ValueKind::DeviceIp, Unit::String, json!(12345));
        let out = anonymize(&numeric_ip, PrivacyLevel::Partial);
        assert_ne!(out.value(), numeric_ip.value());
        assert_eq!(out.kind(), ValueKind::DeviceIp);
    }

    #[test]
    fn test_kind_without_rule_passes_through() {
        let state = reading(ValueKind::State, Unit::String, json!("COMPLETED"));
        assert_eq!(anonymize(&state, PrivacyLevel::Coarse), state);
    }

    #[test]
    fn test_level_parsing() {
        assert_eq!("partial".parse::<PrivacyLevel>(), Ok(PrivacyLevel::Partial));
        assert_eq!("NONE".parse::<PrivacyLevel>(), Ok(PrivacyLevel::Hidden));
        assert!("bogus".parse::<PrivacyLevel>().is_err());
    }
}

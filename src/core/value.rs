//! Unit-tagged sensor readings.
//!
//! A [`SensorValue`] is a dumb holder: the unit and kind are fixed when the
//! owning sensor creates it, and the payload is replaced on every sensing
//! pass. No validation happens here; each sensor is responsible for storing
//! a payload that makes sense for the kind.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt;

/// Physical or logical unit of a reading.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Unit {
    Degree,
    Meter,
    MetersPerSecond,
    Millis,
    Dbm,
    Mbps,
    Percent,
    Celsius,
    String,
    Other,
}

impl fmt::Display for Unit {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Unit::Degree => "°",
            Unit::Meter => "m",
            Unit::MetersPerSecond => "m/s",
            Unit::Millis => "ms",
            Unit::Dbm => "dBm",
            Unit::Mbps => "Mbps",
            Unit::Percent => "%",
            Unit::Celsius => "°C",
            Unit::String => "",
            Unit::Other => "",
        };
        f.write_str(s)
    }
}

/// Semantic kind of a reading. The privacy transformation is chosen per kind.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ValueKind {
    Ssid,
    SsidHidden,
    Bssid,
    DeviceIp,
    MacAddress,
    State,
    SignalStrength,
    Speed,
    Latitude,
    Longitude,
    Altitude,
    Accuracy,
    Other,
}

/// A single reading owned by the sensor that produced it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SensorValue {
    unit: Unit,
    kind: ValueKind,
    value: Value,
}

impl SensorValue {
    /// Create an empty reading. The payload starts out as `null`.
    pub fn new(unit: Unit, kind: ValueKind) -> Self {
        Self {
            unit,
            kind,
            value: Value::Null,
        }
    }

    /// Create a reading with an initial payload.
    pub fn with_value(unit: Unit, kind: ValueKind, value: impl Into<Value>) -> Self {
        Self {
            unit,
            kind,
            value: value.into(),
        }
    }

    pub fn unit(&self) -> Unit {
        self.unit
    }

    pub fn kind(&self) -> ValueKind {
        self.kind
    }

    pub fn value(&self) -> &Value {
        &self.value
    }

    /// Consume the reading and return its payload.
    pub fn into_value(self) -> Value {
        self.value
    }

    /// Replace the payload. Any JSON shape is accepted.
    pub fn set_value(&mut self, value: impl Into<Value>) {
        self.value = value.into();
    }

    /// Copy of this reading with the payload swapped out, unit and kind kept.
    pub fn replaced(&self, value: impl Into<Value>) -> Self {
        Self {
            unit: self.unit,
            kind: self.kind,
            value: value.into(),
        }
    }
}

impl fmt::Display for SensorValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.value {
            Value::String(s) => write!(f, "{s}")?,
            other => write!(f, "{other}")?,
        }
        let unit = self.unit.to_string();
        if unit.is_empty() {
            Ok(())
        } else {
            write!(f, " {unit}")
        }
    }
}

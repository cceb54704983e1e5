//! Location sensor.

use crate::core::{
    ExposedMethod, MethodOutput, ReturnKind, SensorDriver, SensorError, SensorValue, Unit,
    ValueKind,
};
use serde::{Deserialize, Serialize};
use serde_json::json;

/// A position fix.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Fix {
    pub latitude: f64,
    pub longitude: f64,
    pub altitude: Option<f64>,
    /// Horizontal accuracy in meters
    pub accuracy: f64,
}

impl From<crate::config::LocationConfig> for Fix {
    fn from(c: crate::config::LocationConfig) -> Self {
        Self {
            latitude: c.latitude,
            longitude: c.longitude,
            altitude: c.altitude,
            accuracy: c.accuracy,
        }
    }
}

/// Source of position fixes.
pub trait LocationProvider: Send + 'static {
    fn current_fix(&mut self) -> Result<Fix, SensorError>;
}

/// Provider reporting a configured position, or none at all.
#[derive(Debug, Clone, Default)]
pub struct FixedLocationProvider {
    fix: Option<Fix>,
}

impl FixedLocationProvider {
    pub fn new(fix: Option<Fix>) -> Self {
        Self { fix }
    }
}

impl LocationProvider for FixedLocationProvider {
    fn current_fix(&mut self) -> Result<Fix, SensorError> {
        self.fix
            .ok_or_else(|| SensorError::Unavailable("no position configured".into()))
    }
}

/// Latitude, longitude, altitude and accuracy of the last fix.
pub struct LocationSensor {
    provider: Box<dyn LocationProvider>,
    latitude: SensorValue,
    longitude: SensorValue,
    altitude: SensorValue,
    accuracy: SensorValue,
}

impl LocationSensor {
    pub fn new(provider: Box<dyn LocationProvider>) -> Self {
        Self {
            provider,
            latitude: SensorValue::new(Unit::Degree, ValueKind::Latitude),
            longitude: SensorValue::new(Unit::Degree, ValueKind::Longitude),
            altitude: SensorValue::new(Unit::Meter, ValueKind::Altitude),
            accuracy: SensorValue::new(Unit::Meter, ValueKind::Accuracy),
        }
    }

    fn read(&mut self) -> Result<Vec<SensorValue>, SensorError> {
        let fix = self.provider.current_fix()?;
        if !(-90.0..=90.0).contains(&fix.latitude) || !(-180.0..=180.0).contains(&fix.longitude) {
            return Err(SensorError::Activation(format!(
                "position out of range: {}, {}",
                fix.latitude, fix.longitude
            )));
        }

        self.latitude.set_value(fix.latitude);
        self.longitude.set_value(fix.longitude);
        self.altitude.set_value(json!(fix.altitude));
        self.accuracy.set_value(fix.accuracy);

        Ok(vec![
            self.latitude.clone(),
            self.longitude.clone(),
            self.altitude.clone(),
            self.accuracy.clone(),
        ])
    }
}

impl SensorDriver for LocationSensor {
    fn name(&self) -> &str {
        "Location"
    }

    fn description(&self) -> &str {
        "Position of the device"
    }

    fn activate(&mut self) -> Result<Vec<SensorValue>, SensorError> {
        self.read()
    }

    fn deactivate(&mut self) -> Result<(), SensorError> {
        Ok(())
    }

    fn sample(&mut self) -> Result<Vec<SensorValue>, SensorError> {
        self.read()
    }

    fn exposed_methods() -> Vec<ExposedMethod<Self>> {
        vec![
            ExposedMethod::new("latitude", ReturnKind::Double, |s: &Self| {
                MethodOutput::Sensed(s.latitude.clone())
            }),
            ExposedMethod::new("longitude", ReturnKind::Double, |s: &Self| {
                MethodOutput::Sensed(s.longitude.clone())
            }),
            ExposedMethod::new("altitude", ReturnKind::Double, |s: &Self| {
                MethodOutput::Sensed(s.altitude.clone())
            }),
            ExposedMethod::new("accuracy", ReturnKind::Double, |s: &Self| {
                MethodOutput::Sensed(s.accuracy.clone())
            }),
        ]
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn vienna() -> Fix {
        Fix {
            latitude: 48.208176,
            longitude: 16.373819,
            altitude: Some(171.0),
            accuracy: 25.0,
        }
    }

    #[test]
    fn test_location_reads_fix() {
        let mut sensor = LocationSensor::new(Box::new(FixedLocationProvider::new(Some(vienna()))));
        let values = sensor.activate().unwrap();

        assert_eq!(values.len(), 4);
        assert_eq!(values[0].value(), &json!(48.208176));
        assert_eq!(values[2].value(), &json!(171.0));
        assert_eq!(values[3].unit(), Unit::Meter);
    }

    #[test]
    fn test_location_without_fix_is_unavailable() {
        let mut sensor = LocationSensor::new(Box::new(FixedLocationProvider::default()));
        assert!(matches!(sensor.activate(), Err(SensorError::Unavailable(_))));
    }

    #[test]
    fn test_location_rejects_out_of_range() {
        let mut fix = vienna();
        fix.latitude = 123.0;
        let mut sensor = LocationSensor::new(Box::new(FixedLocationProvider::new(Some(fix))));
        assert!(matches!(sensor.activate(), Err(SensorError::Activation(_))));
    }
}

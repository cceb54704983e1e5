//! Device information sensor.
//!
//! Predates [`SensorValue`]: its accessors return raw values, which the
//! registry hands out without privacy filtering.

use crate::core::{
    ExposedMethod, MethodOutput, ReturnKind, SensorDriver, SensorError, SensorValue,
};
use serde_json::{json, Value};

pub struct DeviceInfoSensor {
    hostname: Option<String>,
    cpus: Option<usize>,
}

impl DeviceInfoSensor {
    pub fn new() -> Self {
        Self {
            hostname: None,
            cpus: None,
        }
    }
}

impl Default for DeviceInfoSensor {
    fn default() -> Self {
        Self::new()
    }
}

impl SensorDriver for DeviceInfoSensor {
    fn name(&self) -> &str {
        "Device Info"
    }

    fn description(&self) -> &str {
        "Host name, operating system and processor of this machine"
    }

    fn activate(&mut self) -> Result<Vec<SensorValue>, SensorError> {
        let hostname = hostname::get()
            .map_err(|e| SensorError::Activation(format!("hostname lookup failed: {e}")))?;
        self.hostname = Some(hostname.to_string_lossy().to_string());
        self.cpus = std::thread::available_parallelism().ok().map(|n| n.get());
        Ok(Vec::new())
    }

    fn deactivate(&mut self) -> Result<(), SensorError> {
        self.hostname = None;
        self.cpus = None;
        Ok(())
    }

    fn exposed_methods() -> Vec<ExposedMethod<Self>> {
        vec![
            ExposedMethod::new("hostname", ReturnKind::String, |s: &Self| {
                MethodOutput::Legacy(json!(s.hostname))
            }),
            ExposedMethod::new("os", ReturnKind::String, |_: &Self| {
                MethodOutput::Legacy(Value::from(std::env::consts::OS))
            }),
            ExposedMethod::new("arch", ReturnKind::String, |_: &Self| {
                MethodOutput::Legacy(Value::from(std::env::consts::ARCH))
            }),
            ExposedMethod::new("cpus", ReturnKind::Int, |s: &Self| {
                MethodOutput::Legacy(json!(s.cpus))
            }),
        ]
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_device_info_is_legacy() {
        let mut sensor = DeviceInfoSensor::new();
        assert!(sensor.activate().unwrap().is_empty());
        assert!(sensor.hostname.is_some());

        for method in DeviceInfoSensor::exposed_methods() {
            assert!(matches!((method.invoke)(&sensor), MethodOutput::Legacy(_)));
        }
    }

    #[test]
    fn test_deactivate_forgets_host() {
        let mut sensor = DeviceInfoSensor::new();
        sensor.activate().unwrap();
        sensor.deactivate().unwrap();
        let methods = DeviceInfoSensor::exposed_methods();
        assert_eq!(methods[0].name, "hostname");
        assert_eq!((methods[0].invoke)(&sensor), MethodOutput::Legacy(Value::Null));
    }
}

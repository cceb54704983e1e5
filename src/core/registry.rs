//! Sensor registry and method dispatch.
//!
//! The registry owns every sensor for the lifetime of the agent. Callers
//! address exposed methods as `<SensorShortName>.<method>`, e.g.
//! `WifiConnectionSensor.rssi`. The dispatch table is never stored: every
//! enumeration and call walks the currently enabled sensors, so disabling a
//! sensor removes its methods immediately.
//!
//! One registry is expected per process. It is created explicitly and passed
//! to whatever needs it (CLI, transport, startup routine).

use crate::core::method::MethodOutput;
use crate::core::privacy::anonymize_salted;
use crate::core::sensor::{Sensor, SensorContext, SensorDriver, SensorError};
use crate::transparency::SharedDebugLog;
use serde_json::Value;

/// Debug log tag for dispatch failures.
const DISPATCH_TAG: &str = "dispatch";

/// Why a dispatch call produced no value.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DispatchError {
    /// The name has no `.` separating sensor and method
    InvalidName(String),
    /// No registered sensor has this short name
    UnknownSensor(String),
    /// The sensor exists but is switched off
    SensorDisabled(String),
    /// The sensor does not expose this method
    UnknownMethod { sensor: String, method: String },
}

impl std::fmt::Display for DispatchError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            DispatchError::InvalidName(name) => write!(f, "Invalid method name '{name}'"),
            DispatchError::UnknownSensor(s) => write!(f, "Unknown sensor '{s}'"),
            DispatchError::SensorDisabled(s) => write!(f, "Sensor '{s}' is disabled"),
            DispatchError::UnknownMethod { sensor, method } => {
                write!(f, "Sensor '{sensor}' has no method '{method}'")
            }
        }
    }
}

impl std::error::Error for DispatchError {}

/// Result of [`SensorRegistry::startup`].
#[derive(Debug, Default)]
pub struct StartupReport {
    /// Short names of sensors that came back up
    pub enabled: Vec<String>,
    /// Sensors whose persisted state was "on" but failed to enable
    pub failed: Vec<(String, SensorError)>,
}

/// All registered sensors plus the shared context they run in.
pub struct SensorRegistry {
    sensors: Vec<Sensor>,
    context: SensorContext,
}

impl SensorRegistry {
    pub fn new(context: SensorContext) -> Self {
        Self {
            sensors: Vec::new(),
            context,
        }
    }

    pub fn context(&self) -> &SensorContext {
        &self.context
    }

    pub fn debug_log(&self) -> &SharedDebugLog {
        self.context.log()
    }

    /// Append a line to the debug log.
    pub fn log(&self, tag: &str, message: &str) {
        self.context.log().log(tag, message);
    }

    /// Add a sensor. The first sensor of a given driver type wins; later
    /// ones are dropped and `false` is returned.
    pub fn register_sensor(&mut self, sensor: Sensor) -> bool {
        if self.sensors.iter().any(|s| s.type_id() == sensor.type_id()) {
            tracing::debug!(
                "Sensor of type {} already present, not registering",
                sensor.type_name()
            );
            self.log(
                sensor.short_name(),
                "sensor of this type already present, not registering",
            );
            return false;
        }
        self.sensors.push(sensor);
        true
    }

    /// Wrap a driver in this registry's context and register it.
    pub fn register<D: SensorDriver>(&mut self, driver: D) -> bool {
        let sensor = Sensor::new(driver, &self.context);
        self.register_sensor(sensor)
    }

    /// Re-enable every sensor whose persisted flag is on.
    ///
    /// A failing sensor is left disabled and does not stop the others.
    pub fn startup(&mut self) -> StartupReport {
        let mut report = StartupReport::default();
        let prefs = self.context.prefs().clone();
        if !prefs.sensor_autostart() {
            tracing::info!("Sensor autostart is off, leaving all sensors disabled");
            return report;
        }

        for sensor in &mut self.sensors {
            let saved = prefs.sensor_enabled(sensor.type_name());
            tracing::debug!("{}: {}", sensor.type_name(), saved);
            if !saved {
                continue;
            }
            match sensor.enable() {
                Ok(()) => report.enabled.push(sensor.short_name().to_string()),
                Err(e) => report.failed.push((sensor.short_name().to_string(), e)),
            }
        }

        report
    }

    /// Qualified names of every method on every enabled sensor, in
    /// registration order, then declaration order.
    pub fn list_exposed_methods(&self) -> Vec<String> {
        self.enabled_sensors()
            .flat_map(|sensor| {
                sensor
                    .method_signatures()
                    .into_iter()
                    .map(move |m| format!("{}.{}", sensor.short_name(), m.name))
            })
            .collect()
    }

    /// Signatures of every enabled method called `method` (unqualified).
    ///
    /// The result is flat: for each match, the qualified name, the return
    /// tag, then the parameter tags (`"nil"` for none). `None` if nothing
    /// matched.
    pub fn describe_method_signature(&self, method: &str) -> Option<Vec<String>> {
        let mut signature = Vec::new();
        for sensor in self.enabled_sensors() {
            for m in sensor.method_signatures().into_iter().filter(|m| m.name == method) {
                signature.push(format!("{}.{}", sensor.short_name(), m.name));
                signature.push(m.returns.tag().to_string());
                signature.extend(m.param_tags().into_iter().map(String::from));
            }
        }

        if signature.is_empty() {
            None
        } else {
            Some(signature)
        }
    }

    /// Invoke `Sensor.method` and return its privacy-filtered value.
    ///
    /// Readings are redacted with the owning sensor's privacy level. Legacy
    /// raw values are returned as they are. Every failure is logged.
    pub fn call_method(&self, qualified: &str) -> Result<Value, DispatchError> {
        tracing::debug!("call {}", qualified);
        let result = self.dispatch(qualified);
        if let Err(ref e) = result {
            self.log(DISPATCH_TAG, &e.to_string());
        }
        result
    }

    fn dispatch(&self, qualified: &str) -> Result<Value, DispatchError> {
        let (sensor_name, method) = qualified
            .rsplit_once('.')
            .ok_or_else(|| DispatchError::InvalidName(qualified.to_string()))?;

        let sensor = self.resolve(sensor_name)?;
        let output = sensor
            .invoke(method)
            .ok_or_else(|| DispatchError::UnknownMethod {
                sensor: sensor_name.to_string(),
                method: method.to_string(),
            })?;

        match output {
            MethodOutput::Sensed(value) => {
                let salt = self.context.prefs().privacy_salt();
                Ok(anonymize_salted(&value, sensor.privacy_level(), &salt).into_value())
            }
            MethodOutput::Legacy(raw) => {
                // Legacy sensors bypass privacy filtering entirely.
                tracing::debug!("{} returned a legacy value, no privacy filter", qualified);
                Ok(raw)
            }
        }
    }

    /// The enabled sensor with this short name.
    fn resolve(&self, short_name: &str) -> Result<&Sensor, DispatchError> {
        let mut seen_disabled = false;
        for sensor in self.sensors.iter().filter(|s| s.short_name() == short_name) {
            if sensor.is_enabled() {
                return Ok(sensor);
            }
            seen_disabled = true;
        }
        if seen_disabled {
            Err(DispatchError::SensorDisabled(short_name.to_string()))
        } else {
            Err(DispatchError::UnknownSensor(short_name.to_string()))
        }
    }

    fn enabled_sensors(&self) -> impl Iterator<Item = &Sensor> {
        self.sensors.iter().filter(|s| s.is_enabled())
    }

    /// Re-sample every enabled sensor. Returns the sensors that failed.
    pub fn refresh_enabled(&mut self) -> Vec<(String, SensorError)> {
        let mut failed = Vec::new();
        for sensor in self.sensors.iter_mut().filter(|s| s.is_enabled()) {
            if let Err(e) = sensor.refresh() {
                failed.push((sensor.short_name().to_string(), e));
            }
        }
        failed
    }

    /// Look up a sensor by its full driver type name.
    pub fn get_sensor_by_type_name(&self, type_name: &str) -> Option<&Sensor> {
        self.sensors.iter().find(|s| s.type_name() == type_name)
    }

    /// Look up a sensor by its short name, enabled or not.
    pub fn sensor(&self, short_name: &str) -> Option<&Sensor> {
        self.sensors.iter().find(|s| s.short_name() == short_name)
    }

    pub fn sensor_mut(&mut self, short_name: &str) -> Option<&mut Sensor> {
        self.sensors.iter_mut().find(|s| s.short_name() == short_name)
    }

    pub fn sensors(&self) -> &[Sensor] {
        &self.sensors
    }

    pub fn sensors_mut(&mut self) -> impl Iterator<Item = &mut Sensor> {
        self.sensors.iter_mut()
    }
}

impl std::fmt::Debug for SensorRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SensorRegistry")
            .field("sensors", &self.sensors)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::method::{ExposedMethod, ReturnKind};
    use crate::core::privacy::PrivacyLevel;
    use crate::core::value::{SensorValue, Unit, ValueKind};
    use crate::preferences::Preferences;
    use crate::transparency::create_shared_log;
    use serde_json::json;

    struct Beacon {
        lat: SensorValue,
    }

    impl Beacon {
        fn new() -> Self {
            Self {
                lat: SensorValue::new(Unit::Degree, ValueKind::Latitude),
            }
        }
    }

    impl SensorDriver for Beacon {
        fn name(&self) -> &str {
            "Beacon"
        }

        fn activate(&mut self) -> Result<Vec<SensorValue>, SensorError> {
            self.lat.set_value(48.208176);
            Ok(vec![self.lat.clone()])
        }

        fn deactivate(&mut self) -> Result<(), SensorError> {
            Ok(())
        }

        fn exposed_methods() -> Vec<ExposedMethod<Self>> {
            vec![
                ExposedMethod::new("latitude", ReturnKind::Double, |b: &Self| {
                    MethodOutput::Sensed(b.lat.clone())
                }),
                ExposedMethod::new("label", ReturnKind::String, |_: &Self| {
                    MethodOutput::Legacy(json!("beacon-1"))
                }),
            ]
        }
    }

    struct Broken;

    impl SensorDriver for Broken {
        fn name(&self) -> &str {
            "Broken"
        }

        fn activate(&mut self) -> Result<Vec<SensorValue>, SensorError> {
            Err(SensorError::Unavailable("missing".into()))
        }

        fn deactivate(&mut self) -> Result<(), SensorError> {
            Ok(())
        }

        fn exposed_methods() -> Vec<ExposedMethod<Self>> {
            vec![ExposedMethod::new("label", ReturnKind::String, |_: &Self| {
                MethodOutput::Legacy(json!("broken"))
            })]
        }
    }

    fn registry() -> SensorRegistry {
        SensorRegistry::new(SensorContext::new(
            Preferences::in_memory(),
            create_shared_log(),
        ))
    }

    #[test]
    fn test_duplicate_registration_ignored() {
        let mut reg = registry();
        assert!(reg.register(Beacon::new()));
        assert!(!reg.register(Beacon::new()));
        assert_eq!(reg.sensors().len(), 1);
    }

    #[test]
    fn test_methods_follow_enablement() {
        let mut reg = registry();
        reg.register(Beacon::new());
        assert!(reg.list_exposed_methods().is_empty());

        reg.sensor_mut("Beacon").unwrap().enable().unwrap();
        assert_eq!(
            reg.list_exposed_methods(),
            vec!["Beacon.latitude".to_string(), "Beacon.label".to_string()]
        );

        reg.sensor_mut("Beacon").unwrap().toggle().unwrap();
        assert!(reg.list_exposed_methods().is_empty());
    }

    #[test]
    fn test_describe_signature() {
        let mut reg = registry();
        reg.register(Beacon::new());
        assert_eq!(reg.describe_method_signature("latitude"), None);

        reg.sensor_mut("Beacon").unwrap().enable().unwrap();
        assert_eq!(
            reg.describe_method_signature("latitude").unwrap(),
            vec!["Beacon.latitude", "double", "nil"]
        );
        assert_eq!(reg.describe_method_signature("missing"), None);
    }

    #[test]
    fn test_describe_signature_collects_all_sensors() {
        let mut reg = registry();
        reg.register(Beacon::new());
        reg.register(Broken);
        reg.sensor_mut("Beacon").unwrap().enable().unwrap();

        // Broken never enables, so only one match.
        let _ = reg.sensor_mut("Broken").unwrap().enable();
        assert_eq!(
            reg.describe_method_signature("label").unwrap(),
            vec!["Beacon.label", "string", "nil"]
        );
    }

    #[test]
    fn test_call_errors() {
        let mut reg = registry();
        reg.register(Beacon::new());

        assert_eq!(
            reg.call_method("NoDotHere"),
            Err(DispatchError::InvalidName("NoDotHere".into()))
        );
        assert_eq!(
            reg.call_method("Unknown.method"),
            Err(DispatchError::UnknownSensor("Unknown".into()))
        );
        assert_eq!(
            reg.call_method("Beacon.latitude"),
            Err(DispatchError::SensorDisabled("Beacon".into()))
        );

        reg.sensor_mut("Beacon").unwrap().enable().unwrap();
        assert!(matches!(
            reg.call_method("Beacon.nothing"),
            Err(DispatchError::UnknownMethod { .. })
        ));
        assert!(reg.debug_log().render().contains("dispatch: Invalid method name"));
    }

    #[test]
    fn test_privacy_applied_to_sensed_values() {
        let mut reg = registry();
        reg.register(Beacon::new());
        let beacon = reg.sensor_mut("Beacon").unwrap();
        beacon.enable().unwrap();

        assert_eq!(reg.call_method("Beacon.latitude"), Ok(json!(48.208176)));

        reg.sensor_mut("Beacon")
            .unwrap()
            .set_privacy_level(PrivacyLevel::Coarse);
        assert_eq!(reg.call_method("Beacon.latitude"), Ok(json!(48.2)));

        reg.sensor_mut("Beacon")
            .unwrap()
            .set_privacy_level(PrivacyLevel::Hidden);
        assert_eq!(reg.call_method("Beacon.latitude"), Ok(Value::Null));
    }

    #[test]
    fn test_legacy_values_bypass_privacy() {
        let mut reg = registry();
        reg.register(Beacon::new());
        let beacon = reg.sensor_mut("Beacon").unwrap();
        beacon.enable().unwrap();
        beacon.set_privacy_level(PrivacyLevel::Hidden);

        assert_eq!(reg.call_method("Beacon.label"), Ok(json!("beacon-1")));
    }

    #[test]
    fn test_startup_restores_persisted_state() {
        let prefs = Preferences::in_memory();
        let ctx = SensorContext::new(prefs.clone(), create_shared_log());

        let mut first = SensorRegistry::new(ctx.clone());
        first.register(Beacon::new());
        first.register(Broken);
        first.sensor_mut("Beacon").unwrap().enable().unwrap();

        // Pretend Broken was on when the agent last ran.
        let broken_key = first.sensor("Broken").unwrap().type_name();
        prefs.set_sensor_enabled(broken_key, true).unwrap();

        let mut second = SensorRegistry::new(ctx);
        second.register(Beacon::new());
        second.register(Broken);
        let report = second.startup();

        assert_eq!(report.enabled, vec!["Beacon".to_string()]);
        assert_eq!(report.failed.len(), 1);
        assert_eq!(report.failed[0].0, "Broken");
        assert!(second.sensor("Beacon").unwrap().is_enabled());
        assert!(!second.sensor("Broken").unwrap().is_enabled());
        assert!(!prefs.sensor_enabled(broken_key));
    }
}

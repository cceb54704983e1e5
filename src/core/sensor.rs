//! Sensor capability and lifecycle.
//!
//! A concrete sensor implements [`SensorDriver`]: how to switch the hardware
//! on and off and which accessors it exposes. [`Sensor`] wraps a driver and
//! owns the state machine around it:
//!
//! ```text
//!              enable() ok
//!   DISABLED ──────────────▶ ENABLED
//!      ▲  │ enable() fails       │
//!      │  └──▶ disable() ────┐   │ disable()
//!      └─────────────────────┴───┘
//! ```
//!
//! The enabled flag is mirrored into preferences under the sensor's type
//! name, so the registry can restore it at the next startup.

use crate::core::listener::SharedListener;
use crate::core::method::{short_type_name, ExposedMethod, MethodOutput, MethodSignature};
use crate::core::privacy::PrivacyLevel;
use crate::core::value::SensorValue;
use crate::preferences::{PreferenceError, Preferences};
use crate::transparency::SharedDebugLog;
use std::any::TypeId;
use std::sync::Arc;

/// Sensor lifecycle errors.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SensorError {
    /// The platform resource does not exist on this device
    Unavailable(String),
    /// Switching the sensor on failed
    Activation(String),
    /// Switching the sensor off failed
    Deactivation(String),
    /// The enabled flag could not be persisted
    Persist(String),
    /// The operation needs an enabled sensor
    NotEnabled,
}

impl std::fmt::Display for SensorError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SensorError::Unavailable(e) => write!(f, "Sensor unavailable: {e}"),
            SensorError::Activation(e) => write!(f, "Activation failed: {e}"),
            SensorError::Deactivation(e) => write!(f, "Deactivation failed: {e}"),
            SensorError::Persist(e) => write!(f, "Could not persist sensor state: {e}"),
            SensorError::NotEnabled => write!(f, "Sensor is not enabled"),
        }
    }
}

impl std::error::Error for SensorError {}

impl From<PreferenceError> for SensorError {
    fn from(e: PreferenceError) -> Self {
        SensorError::Persist(e.to_string())
    }
}

/// What a concrete sensor provides.
pub trait SensorDriver: Send + 'static {
    /// Human-readable name.
    fn name(&self) -> &str;

    fn description(&self) -> &str {
        ""
    }

    /// Acquire platform resources and take an initial reading.
    fn activate(&mut self) -> Result<Vec<SensorValue>, SensorError>;

    /// Release platform resources.
    fn deactivate(&mut self) -> Result<(), SensorError>;

    /// Take a fresh reading while enabled. Sensors that only read once on
    /// activation keep the default.
    fn sample(&mut self) -> Result<Vec<SensorValue>, SensorError> {
        Ok(Vec::new())
    }

    /// Accessors exposed on the dispatch surface, in declaration order.
    fn exposed_methods() -> Vec<ExposedMethod<Self>>
    where
        Self: Sized,
    {
        Vec::new()
    }
}

/// Shared collaborators every sensor needs: where to persist its enabled
/// flag and where to log its readings.
#[derive(Clone, Debug)]
pub struct SensorContext {
    prefs: Preferences,
    log: SharedDebugLog,
}

impl SensorContext {
    pub fn new(prefs: Preferences, log: SharedDebugLog) -> Self {
        Self { prefs, log }
    }

    pub fn prefs(&self) -> &Preferences {
        &self.prefs
    }

    pub fn log(&self) -> &SharedDebugLog {
        &self.log
    }
}

/// Object-safe view of a driver bundled with its method table.
trait BoundDriver: Send {
    fn name(&self) -> &str;
    fn description(&self) -> &str;
    fn activate(&mut self) -> Result<Vec<SensorValue>, SensorError>;
    fn deactivate(&mut self) -> Result<(), SensorError>;
    fn sample(&mut self) -> Result<Vec<SensorValue>, SensorError>;
    fn signatures(&self) -> Vec<MethodSignature>;
    fn invoke(&self, method: &str) -> Option<MethodOutput>;
}

struct Bound<D: SensorDriver> {
    driver: D,
    methods: Vec<ExposedMethod<D>>,
}

impl<D: SensorDriver> BoundDriver for Bound<D> {
    fn name(&self) -> &str {
        self.driver.name()
    }

    fn description(&self) -> &str {
        self.driver.description()
    }

    fn activate(&mut self) -> Result<Vec<SensorValue>, SensorError> {
        self.driver.activate()
    }

    fn deactivate(&mut self) -> Result<(), SensorError> {
        self.driver.deactivate()
    }

    fn sample(&mut self) -> Result<Vec<SensorValue>, SensorError> {
        self.driver.sample()
    }

    fn signatures(&self) -> Vec<MethodSignature> {
        self.methods.iter().map(ExposedMethod::signature).collect()
    }

    fn invoke(&self, method: &str) -> Option<MethodOutput> {
        self.methods
            .iter()
            .find(|m| m.name == method)
            .map(|m| (m.invoke)(&self.driver))
    }
}

/// A registered sensor: driver plus lifecycle state.
pub struct Sensor {
    type_id: TypeId,
    type_name: &'static str,
    driver: Box<dyn BoundDriver>,
    enabled: bool,
    privacy_level: PrivacyLevel,
    listeners: Vec<SharedListener>,
    context: SensorContext,
}

impl Sensor {
    /// Wrap a driver. The sensor starts disabled with full disclosure.
    pub fn new<D: SensorDriver>(driver: D, context: &SensorContext) -> Self {
        Self {
            type_id: TypeId::of::<D>(),
            type_name: std::any::type_name::<D>(),
            driver: Box::new(Bound {
                driver,
                methods: D::exposed_methods(),
            }),
            enabled: false,
            privacy_level: PrivacyLevel::default(),
            listeners: Vec::new(),
            context: context.clone(),
        }
    }

    /// Switch the sensor on.
    ///
    /// No-op when already enabled. On failure the sensor is forced through
    /// [`Sensor::disable`] and stays disabled; the error is logged and
    /// returned.
    pub fn enable(&mut self) -> Result<(), SensorError> {
        if self.enabled {
            return Ok(());
        }

        let result = self.driver.activate().and_then(|values| {
            self.context
                .prefs
                .set_sensor_enabled(self.type_name, true)
                .map_err(SensorError::from)?;
            Ok(values)
        });

        match result {
            Ok(values) => {
                self.enabled = true;
                self.notify_listeners(&values);
                tracing::info!("Enabled {}", self.short_name());
                Ok(())
            }
            Err(e) => {
                tracing::warn!("Caught error while enabling {}: {}", self.name(), e);
                self.context.log.log(
                    self.short_name(),
                    &format!("enabling {} failed: {}", self.name(), e),
                );
                let _ = self.disable();
                Err(e)
            }
        }
    }

    /// Switch the sensor off.
    ///
    /// The sensor ends up disabled (and persisted as disabled) even when the
    /// driver's cleanup fails; the cleanup error is logged and returned.
    pub fn disable(&mut self) -> Result<(), SensorError> {
        let persisted = self
            .context
            .prefs
            .set_sensor_enabled(self.type_name, false)
            .map_err(SensorError::from);
        self.enabled = false;
        let released = self.driver.deactivate();

        let result = persisted.and(released);
        if let Err(ref e) = result {
            tracing::warn!("Caught error while disabling {}: {}", self.name(), e);
            self.context.log.log(
                self.short_name(),
                &format!("disabling {} failed: {}", self.name(), e),
            );
        }
        result
    }

    pub fn toggle(&mut self) -> Result<(), SensorError> {
        if self.enabled {
            self.disable()
        } else {
            self.enable()
        }
    }

    /// Move to the requested state; does nothing if already there.
    pub fn set_state(&mut self, enabled: bool) -> Result<(), SensorError> {
        match (enabled, self.enabled) {
            (true, false) => self.enable(),
            (false, true) => self.disable(),
            _ => Ok(()),
        }
    }

    /// Take a fresh reading and notify listeners.
    pub fn refresh(&mut self) -> Result<(), SensorError> {
        if !self.enabled {
            return Err(SensorError::NotEnabled);
        }
        match self.driver.sample() {
            Ok(values) => {
                if !values.is_empty() {
                    self.notify_listeners(&values);
                }
                Ok(())
            }
            Err(e) => {
                self.context
                    .log
                    .log(self.short_name(), &format!("refresh failed: {e}"));
                Err(e)
            }
        }
    }

    /// Push readings to every listener, then record them in the debug log.
    pub fn notify_listeners(&self, values: &[SensorValue]) {
        let short = self.short_name();
        for listener in &self.listeners {
            listener.sensor_updated(short, values);
        }

        let summary: String = values.iter().map(|v| format!("{v}; ")).collect();
        self.context.log.log(short, &summary);
    }

    /// Register a listener. Adding the same listener twice has no effect.
    pub fn add_listener(&mut self, listener: SharedListener) {
        if !self.listeners.iter().any(|l| same_listener(l, &listener)) {
            self.listeners.push(listener);
        }
    }

    pub fn remove_listener(&mut self, listener: &SharedListener) {
        self.listeners.retain(|l| !same_listener(l, listener));
    }

    pub fn listener_count(&self) -> usize {
        self.listeners.len()
    }

    pub fn is_enabled(&self) -> bool {
        self.enabled
    }

    pub fn privacy_level(&self) -> PrivacyLevel {
        self.privacy_level
    }

    pub fn set_privacy_level(&mut self, level: PrivacyLevel) {
        self.privacy_level = level;
    }

    pub fn name(&self) -> &str {
        self.driver.name()
    }

    pub fn description(&self) -> &str {
        self.driver.description()
    }

    /// Full type path of the driver; the key of the persisted enabled flag.
    pub fn type_name(&self) -> &'static str {
        self.type_name
    }

    /// Driver type name without its module path; the dispatch prefix.
    pub fn short_name(&self) -> &'static str {
        short_type_name(self.type_name)
    }

    pub(crate) fn type_id(&self) -> TypeId {
        self.type_id
    }

    /// Metadata of the exposed methods, in declaration order.
    pub fn method_signatures(&self) -> Vec<MethodSignature> {
        self.driver.signatures()
    }

    /// Run an exposed method. `None` if the driver exposes no such method.
    pub fn invoke(&self, method: &str) -> Option<MethodOutput> {
        self.driver.invoke(method)
    }
}

impl std::fmt::Debug for Sensor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Sensor")
            .field("type_name", &self.type_name)
            .field("enabled", &self.enabled)
            .field("privacy_level", &self.privacy_level)
            .field("listeners", &self.listeners.len())
            .finish()
    }
}

fn same_listener(a: &SharedListener, b: &SharedListener) -> bool {
    Arc::as_ptr(a) as *const () == Arc::as_ptr(b) as *const ()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::method::ReturnKind;
    use crate::core::value::{Unit, ValueKind};
    use crate::transparency::create_shared_log;
    use std::sync::Mutex;

    struct Radio {
        fail_activate: bool,
        fail_deactivate: bool,
        reading: SensorValue,
        released: Arc<Mutex<bool>>,
    }

    impl Radio {
        fn new() -> Self {
            Self {
                fail_activate: false,
                fail_deactivate: false,
                reading: SensorValue::new(Unit::Dbm, ValueKind::SignalStrength),
                released: Arc::new(Mutex::new(false)),
            }
        }
    }

    impl SensorDriver for Radio {
        fn name(&self) -> &str {
            "Radio Sensor"
        }

        fn activate(&mut self) -> Result<Vec<SensorValue>, SensorError> {
            if self.fail_activate {
                return Err(SensorError::Activation("no radio".into()));
            }
            self.reading.set_value(-48);
            Ok(vec![self.reading.clone()])
        }

        fn deactivate(&mut self) -> Result<(), SensorError> {
            *self.released.lock().unwrap() = true;
            if self.fail_deactivate {
                return Err(SensorError::Deactivation("stuck".into()));
            }
            Ok(())
        }

        fn exposed_methods() -> Vec<ExposedMethod<Self>> {
            vec![ExposedMethod::new("rssi", ReturnKind::Int, |p: &Self| {
                MethodOutput::Sensed(p.reading.clone())
            })]
        }
    }

    struct Recorder(Mutex<Vec<usize>>);

    impl crate::core::listener::SensorListener for Recorder {
        fn sensor_updated(&self, _sensor: &str, values: &[SensorValue]) {
            self.0.lock().unwrap().push(values.len());
        }
    }

    fn context() -> SensorContext {
        SensorContext::new(Preferences::in_memory(), create_shared_log())
    }

    /// Store whose writes always fail, like a read-only disk.
    struct ReadOnlyStore;

    impl crate::preferences::PreferenceStore for ReadOnlyStore {
        fn get(&self, _key: &str) -> Option<crate::preferences::PrefValue> {
            None
        }

        fn put(
            &self,
            _key: &str,
            _value: crate::preferences::PrefValue,
        ) -> Result<(), PreferenceError> {
            Err(PreferenceError::Io("read-only file system".into()))
        }

        fn entries(&self) -> Vec<(String, crate::preferences::PrefValue)> {
            Vec::new()
        }
    }

    #[test]
    fn test_enable_success_persists_flag() {
        let ctx = context();
        let mut sensor = Sensor::new(Radio::new(), &ctx);
        assert!(!sensor.is_enabled());

        sensor.enable().unwrap();
        assert!(sensor.is_enabled());
        assert!(ctx.prefs().sensor_enabled(sensor.type_name()));
        assert_eq!(sensor.short_name(), "Radio");
    }

    #[test]
    fn test_enable_failure_forces_disabled() {
        let ctx = context();
        let mut radio = Radio::new();
        radio.fail_activate = true;
        let released = radio.released.clone();
        let mut sensor = Sensor::new(radio, &ctx);

        let err = sensor.enable().unwrap_err();
        assert_eq!(err, SensorError::Activation("no radio".into()));
        assert!(!sensor.is_enabled());
        assert!(!ctx.prefs().sensor_enabled(sensor.type_name()));
        // Cleanup ran as part of the forced disable.
        assert!(*released.lock().unwrap());
        assert!(ctx.log().render().contains("no radio"));
    }

    #[test]
    fn test_disable_always_ends_disabled() {
        let ctx = context();
        let mut radio = Radio::new();
        radio.fail_deactivate = true;
        let mut sensor = Sensor::new(radio, &ctx);

        sensor.enable().unwrap();
        assert!(sensor.disable().is_err());
        assert!(!sensor.is_enabled());
        assert!(!ctx.prefs().sensor_enabled(sensor.type_name()));
    }

    #[test]
    fn test_toggle_and_set_state() {
        let ctx = context();
        let mut sensor = Sensor::new(Radio::new(), &ctx);

        sensor.toggle().unwrap();
        assert!(sensor.is_enabled());
        sensor.set_state(true).unwrap();
        assert!(sensor.is_enabled());
        sensor.toggle().unwrap();
        assert!(!sensor.is_enabled());
        sensor.set_state(false).unwrap();
        assert!(!sensor.is_enabled());
    }

    #[test]
    fn test_listeners_notified_and_logged() {
        let ctx = context();
        let mut sensor = Sensor::new(Radio::new(), &ctx);
        let recorder = Arc::new(Recorder(Mutex::new(Vec::new())));
        let listener: SharedListener = recorder.clone();

        sensor.add_listener(listener.clone());
        sensor.add_listener(listener.clone());
        assert_eq!(sensor.listener_count(), 1);

        sensor.enable().unwrap();
        assert_eq!(*recorder.0.lock().unwrap(), vec![1]);
        assert!(ctx.log().render().contains("Radio: -48 dBm;"));

        sensor.remove_listener(&listener);
        assert_eq!(sensor.listener_count(), 0);
    }

    #[test]
    fn test_unpersisted_enable_notifies_nobody() {
        let prefs = Preferences::new(Arc::new(ReadOnlyStore));
        let ctx = SensorContext::new(prefs, create_shared_log());
        let mut sensor = Sensor::new(Radio::new(), &ctx);
        let recorder = Arc::new(Recorder(Mutex::new(Vec::new())));
        sensor.add_listener(recorder.clone());

        assert!(matches!(sensor.enable(), Err(SensorError::Persist(_))));
        assert!(!sensor.is_enabled());
        assert!(recorder.0.lock().unwrap().is_empty());
        assert!(!ctx.log().render().contains("-48 dBm"));
    }

    #[test]
    fn test_refresh_requires_enabled() {
        let ctx = context();
        let mut sensor = Sensor::new(Radio::new(), &ctx);
        assert_eq!(sensor.refresh(), Err(SensorError::NotEnabled));
        sensor.enable().unwrap();
        assert!(sensor.refresh().is_ok());
    }

    #[test]
    fn test_invoke_exposed_method() {
        let ctx = context();
        let mut sensor = Sensor::new(Radio::new(), &ctx);
        sensor.enable().unwrap();

        let sigs = sensor.method_signatures();
        assert_eq!(sigs.len(), 1);
        assert_eq!(sigs[0].name, "rssi");

        match sensor.invoke("rssi") {
            Some(MethodOutput::Sensed(v)) => assert_eq!(v.value(), &serde_json::json!(-48)),
            other => panic!("unexpected {other:?}"),
        }
        assert!(sensor.invoke("nope").is_none());
    }
}

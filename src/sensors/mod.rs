//! Built-in sensors.

pub mod device;
pub mod location;
pub mod wifi;

pub use device::DeviceInfoSensor;
pub use location::{Fix, FixedLocationProvider, LocationProvider, LocationSensor};
pub use wifi::{
    FixedWifiProvider, SysfsWifiProvider, UnsupportedWifiProvider, WifiConnectionSensor, WifiInfo,
    WifiInfoProvider,
};

use crate::config::Config;
use crate::core::SensorRegistry;

/// Register every built-in sensor and give each its configured privacy level.
pub fn register_builtin(registry: &mut SensorRegistry, config: &Config) {
    registry.register(WifiConnectionSensor::new(wifi::platform_provider(
        config.wifi_interface.clone(),
    )));
    registry.register(LocationSensor::new(Box::new(FixedLocationProvider::new(
        config.location.map(Fix::from),
    ))));
    registry.register(DeviceInfoSensor::new());

    apply_privacy_levels(registry, config);
}

/// Set each sensor's privacy level from `config`.
pub fn apply_privacy_levels(registry: &mut SensorRegistry, config: &Config) {
    for sensor in registry.sensors_mut() {
        let level = config.privacy_level_for(sensor.short_name());
        tracing::debug!("{} privacy level {}", sensor.short_name(), level);
        sensor.set_privacy_level(level);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::{PrivacyLevel, SensorContext};
    use crate::preferences::Preferences;
    use crate::transparency::create_shared_log;

    #[test]
    fn test_register_builtin() {
        let mut config = Config::default();
        config.default_privacy_level = PrivacyLevel::Partial;
        config
            .privacy_levels
            .insert("LocationSensor".into(), PrivacyLevel::Coarse);

        let mut registry = SensorRegistry::new(SensorContext::new(
            Preferences::in_memory(),
            create_shared_log(),
        ));
        register_builtin(&mut registry, &config);

        let names: Vec<&str> = registry.sensors().iter().map(|s| s.short_name()).collect();
        assert_eq!(
            names,
            vec!["WifiConnectionSensor", "LocationSensor", "DeviceInfoSensor"]
        );
        assert_eq!(
            registry.sensor("LocationSensor").unwrap().privacy_level(),
            PrivacyLevel::Coarse
        );
        assert_eq!(
            registry.sensor("DeviceInfoSensor").unwrap().privacy_level(),
            PrivacyLevel::Partial
        );

        // A second pass registers nothing new.
        register_builtin(&mut registry, &config);
        assert_eq!(registry.sensors().len(), 3);
    }
}

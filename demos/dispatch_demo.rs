//! Walk through the dispatch surface with canned sensor data.
//!
//! Run with `cargo run --example dispatch_demo`.

use sensorium_agent::core::{PrivacyLevel, SensorContext, SensorRegistry};
use sensorium_agent::preferences::Preferences;
use sensorium_agent::sensors::{
    DeviceInfoSensor, Fix, FixedLocationProvider, FixedWifiProvider, LocationSensor,
    WifiConnectionSensor, WifiInfo,
};
use sensorium_agent::transparency::{create_shared_log, DebugSink};
use std::sync::Arc;

struct Console;

impl DebugSink for Console {
    fn show(&self, line: &str) {
        println!("  log> {line}");
    }
}

fn main() {
    let log = create_shared_log();
    let console: Arc<dyn DebugSink> = Arc::new(Console);
    log.set_sink(&console);

    let mut registry = SensorRegistry::new(SensorContext::new(Preferences::in_memory(), log));
    registry.register(WifiConnectionSensor::new(Box::new(FixedWifiProvider::new(
        WifiInfo {
            ssid: Some("CoffeeShop".into()),
            bssid: Some("3c:37:86:aa:bb:cc".into()),
            ip: "10.20.30.40".parse().ok(),
            mac: Some("f0:18:98:01:02:03".into()),
            state: "completed".into(),
            rssi: Some(-58),
            link_speed: Some(144),
            ..WifiInfo::default()
        },
    ))));
    registry.register(LocationSensor::new(Box::new(FixedLocationProvider::new(
        Some(Fix {
            latitude: 52.520008,
            longitude: 13.404954,
            altitude: Some(34.0),
            accuracy: 12.0,
        }),
    ))));
    registry.register(DeviceInfoSensor::new());

    println!("Enabling sensors");
    for sensor in registry.sensors_mut() {
        if let Err(e) = sensor.enable() {
            println!("  {} failed: {e}", sensor.short_name());
        }
    }

    println!();
    println!("Callable methods:");
    for name in registry.list_exposed_methods() {
        println!("  {name}");
    }

    for level in [PrivacyLevel::Full, PrivacyLevel::Partial, PrivacyLevel::Coarse] {
        for sensor in registry.sensors_mut() {
            sensor.set_privacy_level(level);
        }
        println!();
        println!("Privacy level {level}:");
        for name in [
            "WifiConnectionSensor.ssid",
            "WifiConnectionSensor.mac",
            "WifiConnectionSensor.device_ip",
            "WifiConnectionSensor.rssi",
            "LocationSensor.latitude",
            "DeviceInfoSensor.hostname",
        ] {
            match registry.call_method(name) {
                Ok(value) => println!("  {name:<32} {value}"),
                Err(e) => println!("  {name:<32} error: {e}"),
            }
        }
    }

    println!();
    println!("Calls that miss:");
    for name in ["NoDotHere", "Unknown.method", "LocationSensor.speed"] {
        if let Err(e) = registry.call_method(name) {
            println!("  {name:<32} {e}");
        }
    }
}

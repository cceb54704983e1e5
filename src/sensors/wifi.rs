//! Wi-Fi connection sensor.
//!
//! Reads the state of the current wireless connection through a
//! [`WifiInfoProvider`]. On Linux the provider parses `/proc/net/wireless`
//! and `/sys/class/net/<iface>`; elsewhere the sensor reports itself as
//! unavailable.

use crate::core::{
    ExposedMethod, MethodOutput, ReturnKind, SensorDriver, SensorError, SensorValue, Unit,
    ValueKind,
};
use serde_json::json;
use std::net::{IpAddr, UdpSocket};
use std::path::{Path, PathBuf};

/// Snapshot of the current wireless connection.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct WifiInfo {
    pub ssid: Option<String>,
    pub ssid_hidden: bool,
    pub bssid: Option<String>,
    pub ip: Option<IpAddr>,
    pub mac: Option<String>,
    /// Association state, e.g. `completed` or `disconnected`
    pub state: String,
    /// Signal level in dBm
    pub rssi: Option<i32>,
    /// Link speed in Mbps
    pub link_speed: Option<i32>,
}

/// Source of wireless connection data.
pub trait WifiInfoProvider: Send + 'static {
    fn connection_info(&mut self) -> Result<WifiInfo, SensorError>;
}

/// Provider that always reports the same connection.
#[derive(Debug, Clone)]
pub struct FixedWifiProvider {
    info: WifiInfo,
}

impl FixedWifiProvider {
    pub fn new(info: WifiInfo) -> Self {
        Self { info }
    }
}

impl WifiInfoProvider for FixedWifiProvider {
    fn connection_info(&mut self) -> Result<WifiInfo, SensorError> {
        Ok(self.info.clone())
    }
}

/// Provider backed by the Linux wireless extensions in procfs and sysfs.
#[derive(Debug, Clone)]
pub struct SysfsWifiProvider {
    root: PathBuf,
    interface: Option<String>,
}

impl SysfsWifiProvider {
    /// Read from the real `/proc` and `/sys`.
    pub fn new(interface: Option<String>) -> Self {
        Self::with_root("/", interface)
    }

    /// Read from a directory laid out like `/` (used by tests).
    pub fn with_root(root: impl Into<PathBuf>, interface: Option<String>) -> Self {
        Self {
            root: root.into(),
            interface,
        }
    }

    fn read_trimmed(&self, path: &Path) -> Option<String> {
        std::fs::read_to_string(self.root.join(path))
            .ok()
            .map(|s| s.trim().to_string())
            .filter(|s| !s.is_empty())
    }

    fn sysfs(&self, iface: &str, attr: &str) -> Option<String> {
        self.read_trimmed(&Path::new("sys/class/net").join(iface).join(attr))
    }
}

impl WifiInfoProvider for SysfsWifiProvider {
    fn connection_info(&mut self) -> Result<WifiInfo, SensorError> {
        let wireless = std::fs::read_to_string(self.root.join("proc/net/wireless"))
            .map_err(|e| SensorError::Unavailable(format!("no wireless extensions: {e}")))?;

        let links = parse_proc_wireless(&wireless);
        let (iface, rssi) = match &self.interface {
            Some(wanted) => links
                .into_iter()
                .find(|(name, _)| name == wanted)
                .ok_or_else(|| SensorError::Unavailable(format!("interface {wanted} not wireless")))?,
            None => links
                .into_iter()
                .next()
                .ok_or_else(|| SensorError::Unavailable("no wireless interface".into()))?,
        };

        let state = match self.sysfs(&iface, "operstate").as_deref() {
            Some("up") => "completed",
            Some("dormant") => "associating",
            Some("down") => "disconnected",
            _ => "unknown",
        };
        let connected = state == "completed";

        Ok(WifiInfo {
            ssid: None,
            ssid_hidden: false,
            bssid: None,
            ip: if connected { local_ip() } else { None },
            mac: self.sysfs(&iface, "address"),
            state: state.to_string(),
            rssi: if connected { rssi } else { None },
            link_speed: self
                .sysfs(&iface, "speed")
                .and_then(|s| s.parse::<i32>().ok())
                .filter(|s| *s > 0),
        })
    }
}

/// Provider for platforms without a wireless backend.
#[derive(Debug, Clone, Default)]
pub struct UnsupportedWifiProvider;

impl WifiInfoProvider for UnsupportedWifiProvider {
    fn connection_info(&mut self) -> Result<WifiInfo, SensorError> {
        Err(SensorError::Unavailable(
            "Wi-Fi is not supported on this platform".into(),
        ))
    }
}

/// Platform provider for this build target.
#[cfg(target_os = "linux")]
pub fn platform_provider(interface: Option<String>) -> Box<dyn WifiInfoProvider> {
    Box::new(SysfsWifiProvider::new(interface))
}

/// Platform provider for this build target.
#[cfg(not(target_os = "linux"))]
pub fn platform_provider(_interface: Option<String>) -> Box<dyn WifiInfoProvider> {
    Box::new(UnsupportedWifiProvider)
}

/// Interface names and signal levels from `/proc/net/wireless`.
fn parse_proc_wireless(content: &str) -> Vec<(String, Option<i32>)> {
    content
        .lines()
        .skip(2)
        .filter_map(|line| {
            let (name, rest) = line.split_once(':')?;
            let level = rest
                .split_whitespace()
                .nth(2)
                .and_then(|l| l.trim_end_matches('.').parse::<f64>().ok())
                .map(|l| l as i32);
            Some((name.trim().to_string(), level))
        })
        .collect()
}

/// Source address the kernel would use for outbound traffic.
///
/// Connecting a UDP socket sends nothing; it only selects a route.
fn local_ip() -> Option<IpAddr> {
    let socket = UdpSocket::bind("0.0.0.0:0").ok()?;
    socket.connect("192.0.2.1:9").ok()?;
    socket.local_addr().ok().map(|a| a.ip())
}

/// Wi-Fi connection state as individual readings.
pub struct WifiConnectionSensor {
    provider: Box<dyn WifiInfoProvider>,
    ssid: SensorValue,
    ssid_hidden: SensorValue,
    bssid: SensorValue,
    device_ip: SensorValue,
    mac: SensorValue,
    supplicant_state: SensorValue,
    rssi: SensorValue,
    speed: SensorValue,
}

impl WifiConnectionSensor {
    pub fn new(provider: Box<dyn WifiInfoProvider>) -> Self {
        Self {
            provider,
            ssid: SensorValue::new(Unit::String, ValueKind::Ssid),
            ssid_hidden: SensorValue::new(Unit::Other, ValueKind::SsidHidden),
            bssid: SensorValue::new(Unit::String, ValueKind::Bssid),
            device_ip: SensorValue::new(Unit::String, ValueKind::DeviceIp),
            mac: SensorValue::new(Unit::String, ValueKind::MacAddress),
            supplicant_state: SensorValue::new(Unit::String, ValueKind::State),
            rssi: SensorValue::new(Unit::Dbm, ValueKind::SignalStrength),
            speed: SensorValue::new(Unit::Mbps, ValueKind::Speed),
        }
    }

    fn read(&mut self) -> Result<Vec<SensorValue>, SensorError> {
        let info = self.provider.connection_info()?;

        self.ssid.set_value(json!(info.ssid));
        self.ssid_hidden.set_value(info.ssid_hidden);
        self.bssid.set_value(json!(info.bssid));
        self.device_ip
            .set_value(json!(info.ip.map(|ip| ip.to_string())));
        self.mac.set_value(json!(info.mac));
        self.supplicant_state.set_value(info.state);
        self.rssi.set_value(json!(info.rssi));
        self.speed.set_value(json!(info.link_speed));

        Ok(vec![
            self.ssid.clone(),
            self.ssid_hidden.clone(),
            self.bssid.clone(),
            self.device_ip.clone(),
            self.mac.clone(),
            self.supplicant_state.clone(),
            self.rssi.clone(),
            self.speed.clone(),
        ])
    }
}

impl SensorDriver for WifiConnectionSensor {
    fn name(&self) -> &str {
        "Wi-Fi Connection"
    }

    fn description(&self) -> &str {
        "Network name, access point, addresses and signal of the current Wi-Fi link"
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
            ExposedMethod::new("ssid", ReturnKind::String, |s: &Self| {
                MethodOutput::Sensed(s.ssid.clone())
            }),
            ExposedMethod::new("ssid_hidden", ReturnKind::Boolean, |s: &Self| {
                MethodOutput::Sensed(s.ssid_hidden.clone())
            }),
            ExposedMethod::new("bssid", ReturnKind::String, |s: &Self| {
                MethodOutput::Sensed(s.bssid.clone())
            }),
            ExposedMethod::new("device_ip", ReturnKind::String, |s: &Self| {
                MethodOutput::Sensed(s.device_ip.clone())
            }),
            ExposedMethod::new("mac", ReturnKind::String, |s: &Self| {
                MethodOutput::Sensed(s.mac.clone())
            }),
            ExposedMethod::new("supplicant_state", ReturnKind::String, |s: &Self| {
                MethodOutput::Sensed(s.supplicant_state.clone())
            }),
            ExposedMethod::new("rssi", ReturnKind::Int, |s: &Self| {
                MethodOutput::Sensed(s.rssi.clone())
            }),
            ExposedMethod::new("speed", ReturnKind::Int, |s: &Self| {
                MethodOutput::Sensed(s.speed.clone())
            }),
        ]
    }
}

//! Sensorium Agent - privacy-filtered sensor registry with a named-method
//! dispatch surface.
//!
//! Sensors register with a [`SensorRegistry`], switch on and off with their
//! state persisted in [`Preferences`], and expose zero-argument accessors
//! that callers reach as `<Sensor>.<method>` strings. Every reading passes
//! through the owning sensor's privacy level before it leaves the registry.
//!
//! # Privacy Guarantees
//!
//! - **Per-sensor redaction**: identifiers are hashed or truncated and
//!   positions rounded according to the sensor's [`PrivacyLevel`]
//! - **Salted hashes**: identifier hashes use a per-install salt
//! - **Transparency**: every published reading and every failed call is
//!   written to an in-memory debug log the user can inspect
//! - **Legacy gap**: sensors that return raw values (device info) are not
//!   filtered; their accessors return [`MethodOutput::Legacy`], which the
//!   registry hands out unchanged
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │                      Sensorium Agent                        │
//! ├─────────────────────────────────────────────────────────────┤
//! │  ┌─────────────┐   ┌─────────────┐   ┌─────────────┐        │
//! │  │   Sensors   │──▶│  Registry   │──▶│   Privacy   │──▶ caller
//! │  │ (wifi, ...) │   │ (dispatch)  │   │  (redact)   │        │
//! │  └─────────────┘   └─────────────┘   └─────────────┘        │
//! │         │                 │                                 │
//! │         ▼                 ▼                                 │
//! │  ┌─────────────┐   ┌─────────────┐   ┌─────────────┐        │
//! │  │  Debug Log  │   │ Preferences │◀──│  Campaign   │        │
//! │  │ (100 lines) │   │  (versioned)│   │   fetch     │        │
//! │  └─────────────┘   └─────────────┘   └─────────────┘        │
//! └─────────────────────────────────────────────────────────────┘
//! ```
//!
//! # Example
//!
//! ```no_run
//! use sensorium_agent::{core, preferences, sensors, transparency, Config};
//!
//! let config = Config::default();
//! let context = core::SensorContext::new(
//!     preferences::Preferences::in_memory(),
//!     transparency::create_shared_log(),
//! );
//! let mut registry = core::SensorRegistry::new(context);
//! sensors::register_builtin(&mut registry, &config);
//! registry.startup();
//!
//! for name in registry.list_exposed_methods() {
//!     println!("{name} = {:?}", registry.call_method(&name));
//! }
//! ```

pub mod config;
pub mod core;
pub mod preferences;
pub mod sensors;
pub mod transparency;

#[cfg(feature = "campaign")]
pub mod campaign;

// Re-export key types at crate root for convenience
pub use config::{Config, ConfigError, LocationConfig};
pub use crate::core::{
    DispatchError, MethodOutput, PrivacyLevel, Sensor, SensorContext, SensorDriver, SensorError,
    SensorRegistry, SensorValue,
};
pub use preferences::{BundleOutcome, PreferenceBundle, PreferenceError, Preferences};
pub use transparency::{DebugLog, SharedDebugLog};

// Campaign re-exports (when enabled)
#[cfg(feature = "campaign")]
pub use campaign::{BlockingCampaignLoader, CampaignClient, CampaignConfig, CampaignFetch};

/// Library version.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Privacy declaration that can be displayed to users.
pub const PRIVACY_DECLARATION: &str = r#"
╔══════════════════════════════════════════════════════════════════╗
║              SENSORIUM AGENT - PRIVACY DECLARATION               ║
╠══════════════════════════════════════════════════════════════════╣
║                                                                  ║
║  This agent reads device sensors and answers named queries.      ║
║                                                                  ║
║  ✓ WHAT A CALLER CAN RECEIVE:                                    ║
║    • Readings of sensors you have enabled, and only those        ║
║    • Values redacted to each sensor's privacy level              ║
║                                                                  ║
║  ✗ WHAT IS REDACTED BELOW FULL DISCLOSURE:                       ║
║    • Network names and access points (salted hashes)             ║
║    • Hardware addresses (vendor prefix only, or hashed)          ║
║    • IP addresses (network part only)                            ║
║    • Position and altitude (rounded)                             ║
║                                                                  ║
║  Device info (host name, OS) is a legacy sensor and is NOT       ║
║  redacted. Leave it disabled if that matters to you.             ║
║                                                                  ║
║  Every published reading is recorded in the debug log:           ║
║    sensorium --debug-log status                                  ║
║                                                                  ║
╚══════════════════════════════════════════════════════════════════╝
"#;

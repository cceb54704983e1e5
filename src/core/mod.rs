//! Core functionality for the Sensorium agent.
//!
//! This module contains:
//! - Sensor readings and the privacy filter applied to them
//! - Method descriptors sensors use to expose accessors
//! - The sensor lifecycle and the registry that dispatches calls

pub mod listener;
pub mod method;
pub mod privacy;
pub mod registry;
pub mod sensor;
pub mod value;

// Re-export commonly used types
pub use listener::{ChannelListener, SensorListener, SensorUpdate, SharedListener};
pub use method::{ExposedMethod, MethodOutput, MethodSignature, ReturnKind};
pub use privacy::{anonymize, anonymize_salted, PrivacyLevel};
pub use registry::{DispatchError, SensorRegistry, StartupReport};
pub use sensor::{Sensor, SensorContext, SensorDriver, SensorError};
pub use value::{SensorValue, Unit, ValueKind};

//! Push notification of new readings.

use crate::core::value::SensorValue;
use chrono::{DateTime, Utc};
use crossbeam_channel::{bounded, Receiver, Sender, TrySendError};
use std::sync::Arc;

/// Receives every batch of readings a sensor publishes.
///
/// Called synchronously on the thread that produced the readings, so a slow
/// listener slows down the sensor.
pub trait SensorListener: Send + Sync {
    fn sensor_updated(&self, sensor: &str, values: &[SensorValue]);
}

/// Shared listener handle.
pub type SharedListener = Arc<dyn SensorListener>;

/// A batch of readings forwarded through a [`ChannelListener`].
#[derive(Debug, Clone)]
pub struct SensorUpdate {
    pub sensor: String,
    pub values: Vec<SensorValue>,
    pub received_at: DateTime<Utc>,
}

/// Listener that forwards readings into a bounded channel.
///
/// When the channel is full the update is dropped rather than blocking the
/// sensor.
pub struct ChannelListener {
    sender: Sender<SensorUpdate>,
}

impl ChannelListener {
    /// Create a listener and the receiving end of its channel.
    pub fn new(capacity: usize) -> (Arc<Self>, Receiver<SensorUpdate>) {
        let (sender, receiver) = bounded(capacity.max(1));
        (Arc::new(Self { sender }), receiver)
    }
}

impl SensorListener for ChannelListener {
    fn sensor_updated(&self, sensor: &str, values: &[SensorValue]) {
        let update = SensorUpdate {
            sensor: sensor.to_string(),
            values: values.to_vec(),
            received_at: Utc::now(),
        };
        match self.sender.try_send(update) {
            Ok(()) => {}
            Err(TrySendError::Full(_)) => {
                tracing::warn!("Listener channel full, dropping update from {}", sensor);
            }
            Err(TrySendError::Disconnected(_)) => {}
        }
    }
}

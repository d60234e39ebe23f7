//! Runtime-tunable behavior parameters.
//!
//! A publisher may replace the parameters from any thread at any time; the
//! simulation polls once per tick, right before the behavior pass, and applies
//! the whole snapshot at once.

use std::sync::Arc;

use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use shared::FlockParams;
use tracing::debug;

use crate::error::{CrateResult, SimError};

/// Weights and radii that can change while the simulation runs
#[derive(Copy, Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct DynamicParameters {
    pub separation_weight: f32,
    pub alignment_weight: f32,
    pub cohesion_weight: f32,
    pub avoidance_weight: f32,
    pub separation_radius: f32,
    pub avoidance_radius: f32,
}

impl DynamicParameters {
    pub fn validate(&self) -> CrateResult<()> {
        let fields = [
            ("separation_weight", self.separation_weight),
            ("alignment_weight", self.alignment_weight),
            ("cohesion_weight", self.cohesion_weight),
            ("avoidance_weight", self.avoidance_weight),
            ("separation_radius", self.separation_radius),
            ("avoidance_radius", self.avoidance_radius),
        ];
        for (name, value) in fields {
            if !value.is_finite() || value < 0.0 {
                return Err(SimError::InvalidConfig(format!(
                    "{name} must be finite and non-negative, got {value}"
                )));
            }
        }
        Ok(())
    }

    /// Overwrite the dynamic fields of `params`
    pub fn apply_to(&self, params: &mut FlockParams) {
        params.separation_weight = self.separation_weight;
        params.alignment_weight = self.alignment_weight;
        params.cohesion_weight = self.cohesion_weight;
        params.avoidance_weight = self.avoidance_weight;
        params.separation_radius = self.separation_radius;
        params.avoidance_radius = self.avoidance_radius;
    }
}

#[derive(Debug)]
struct Snapshot {
    version: u64,
    parameters: DynamicParameters,
}

/// Create a linked publisher/receiver pair starting from `initial`
pub fn parameter_channel(initial: DynamicParameters) -> (ParameterPublisher, ParameterReceiver) {
    let slot = Arc::new(Mutex::new(Snapshot {
        version: 0,
        parameters: initial,
    }));
    (
        ParameterPublisher { slot: slot.clone() },
        ParameterReceiver {
            slot,
            seen_version: 0,
        },
    )
}

/// Sending half; cheap to clone and share between threads
#[derive(Clone, Debug)]
pub struct ParameterPublisher {
    slot: Arc<Mutex<Snapshot>>,
}

impl ParameterPublisher {
    /// Replace the current parameters. Later publishes win over earlier ones
    /// that have not been polled yet.
    pub fn publish(&self, parameters: DynamicParameters) -> CrateResult<u64> {
        parameters.validate()?;
        let mut snapshot = self.slot.lock();
        snapshot.version += 1;
        snapshot.parameters = parameters;
        Ok(snapshot.version)
    }

    pub fn current(&self) -> DynamicParameters {
        self.slot.lock().parameters
    }
}

/// Receiving half, owned by the simulation
#[derive(Debug)]
pub struct ParameterReceiver {
    slot: Arc<Mutex<Snapshot>>,
    seen_version: u64,
}

impl ParameterReceiver {
    /// The latest parameters if they changed since the previous poll
    pub fn poll(&mut self) -> Option<DynamicParameters> {
        let snapshot = self.slot.lock();
        if snapshot.version == self.seen_version {
            return None;
        }
        self.seen_version = snapshot.version;
        debug!(version = snapshot.version, "applying dynamic parameters");
        Some(snapshot.parameters)
    }
}

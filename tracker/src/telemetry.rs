use crate::integrator::OrientationState;
use crate::TrackerError;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum RecordKind {
    #[serde(rename = "IMU")]
    Imu,
}

/// One orientation message as the host consumer parses it.
///
/// Field names and order are the wire contract. Location is reserved and
/// always zero.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct TelemetryRecord {
    #[serde(rename = "type")]
    pub kind: RecordKind,
    pub rot_x: f32,
    pub rot_y: f32,
    pub rot_z: f32,
    pub loc_x: i32,
    pub loc_y: i32,
    pub loc_z: i32,
    /// Milliseconds since boot.
    pub timestamp: u64,
}

impl TelemetryRecord {
    pub fn to_json(&self) -> Result<String, TrackerError> {
        Ok(serde_json::to_string(self)?)
    }
}

/// Maps integrator output onto the wire record.
pub fn encode(state: &OrientationState, timestamp_ms: u64) -> TelemetryRecord {
    TelemetryRecord {
        kind: RecordKind::Imu,
        rot_x: state.angles.x,
        rot_y: state.angles.y,
        rot_z: state.angles.z,
        loc_x: 0,
        loc_y: 0,
        loc_z: 0,
        timestamp: timestamp_ms,
    }
}

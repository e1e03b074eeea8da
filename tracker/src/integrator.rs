use crate::SensorId;
use gyro_traits::RateSample;
use serde::{Deserialize, Serialize};

/// Cumulative rotation per axis, in degrees.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct Angles {
    pub x: f32,
    pub y: f32,
    pub z: f32,
}

/// Per-axis calibration bias in whole degrees per second.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AxisOffset {
    pub x: i32,
    pub y: i32,
    pub z: i32,
}

impl AxisOffset {
    pub const fn new(x: i32, y: i32, z: i32) -> Self {
        AxisOffset { x, y, z }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct OrientationState {
    pub angles: Angles,
    /// Clock reading of the last integration, `None` before the baseline.
    pub updated_at_ms: Option<u64>,
}

/// Integrates averaged rates of both sensors into angles.
///
/// Both sensors advance against one shared baseline, so within a tick they
/// see the same elapsed time as long as they are integrated with the same
/// clock reading.
#[derive(Debug, Clone)]
pub struct OrientationIntegrator {
    sensitivity_divisor: i32,
    offsets: [AxisOffset; 2],
    states: [OrientationState; 2],
}

impl OrientationIntegrator {
    /// # Panics
    /// Panics if `sensitivity_divisor` is zero.
    pub fn new(sensitivity_divisor: i32, offsets: [AxisOffset; 2]) -> Self {
        assert!(sensitivity_divisor != 0, "Sensitivity divisor must be non-zero");
        OrientationIntegrator {
            sensitivity_divisor,
            offsets,
            states: [OrientationState::default(); 2],
        }
    }

    /// Sets the time baseline of both sensors without touching their angles.
    pub fn establish_baseline(&mut self, now_ms: u64) {
        for state in self.states.iter_mut() {
            state.updated_at_ms = Some(now_ms);
        }
    }

    /// Whole degrees per second for one averaged sample.
    ///
    /// The raw value is divided in the integer domain before the offset is
    /// added, so rates below one sensitivity step read as zero.
    pub fn degrees_per_second(&self, sensor: SensorId, mean: RateSample) -> [i32; 3] {
        let offset = self.offsets[sensor.index()];
        [
            i32::from(mean.x) / self.sensitivity_divisor + offset.x,
            i32::from(mean.y) / self.sensitivity_divisor + offset.y,
            i32::from(mean.z) / self.sensitivity_divisor + offset.z,
        ]
    }

    /// Accumulates `mean` over the time elapsed since this sensor's last update.
    ///
    /// The first call after construction only establishes the baseline.
    /// Calling twice with the same `now_ms` accumulates nothing the second time.
    pub fn integrate(&mut self, sensor: SensorId, mean: RateSample, now_ms: u64) -> OrientationState {
        let idx = sensor.index();
        let Some(previous_ms) = self.states[idx].updated_at_ms else {
            self.establish_baseline(now_ms);
            return self.states[idx];
        };

        let elapsed = now_ms.saturating_sub(previous_ms) as f32 / 1000.0;
        let rate = self.degrees_per_second(sensor, mean);

        let state = &mut self.states[idx];
        state.angles.x += rate[0] as f32 * elapsed;
        state.angles.y += rate[1] as f32 * elapsed;
        state.angles.z += rate[2] as f32 * elapsed;
        state.updated_at_ms = Some(now_ms);
        *state
    }

    /// Zeroes all six angles. Timestamps are kept so the next tick integrates
    /// only the time since the previous one.
    pub fn reset(&mut self) {
        for state in self.states.iter_mut() {
            state.angles = Angles::default();
        }
    }

    pub fn state(&self, sensor: SensorId) -> &OrientationState {
        &self.states[sensor.index()]
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    const NO_OFFSETS: [AxisOffset; 2] = [AxisOffset::new(0, 0, 0), AxisOffset::new(0, 0, 0)];

    fn started(offsets: [AxisOffset; 2]) -> OrientationIntegrator {
        let mut integrator = OrientationIntegrator::new(131, offsets);
        integrator.establish_baseline(0);
        integrator
    }

    #[test]
    fn one_degree_per_second_for_one_second() {
        let mut integrator = started(NO_OFFSETS);
        let rate = RateSample::new(131, 0, 0);
        for tick in 1..=5u64 {
            let state = integrator.integrate(SensorId::Primary, rate, tick * 1000);
            assert_relative_eq!(state.angles.x, tick as f32);
            assert_eq!(state.angles.y, 0.0);
        }
    }

    #[test]
    fn first_call_only_sets_baseline() {
        let mut integrator = OrientationIntegrator::new(131, NO_OFFSETS);
        let state = integrator.integrate(SensorId::Primary, RateSample::new(1310, 0, 0), 5000);
        assert_eq!(state.angles, Angles::default());
        assert_eq!(state.updated_at_ms, Some(5000));
        assert_eq!(integrator.state(SensorId::Secondary).updated_at_ms, Some(5000));

        let state = integrator.integrate(SensorId::Primary, RateSample::new(1310, 0, 0), 5500);
        assert_relative_eq!(state.angles.x, 5.0);
    }

    #[test]
    fn zero_elapsed_time_does_not_accumulate() {
        let mut integrator = started(NO_OFFSETS);
        let rate = RateSample::new(262, 262, 262);
        let first = integrator.integrate(SensorId::Secondary, rate, 750);
        let second = integrator.integrate(SensorId::Secondary, rate, 750);
        assert_eq!(first.angles, second.angles);
        assert_relative_eq!(second.angles.z, 1.5);
    }

    #[test]
    fn sensors_share_elapsed_time() {
        let mut integrator = started(NO_OFFSETS);
        let rate = RateSample::new(0, 131 * 4, 0);
        let a = integrator.integrate(SensorId::Primary, rate, 250);
        let b = integrator.integrate(SensorId::Secondary, rate, 250);
        assert_relative_eq!(a.angles.y, 1.0);
        assert_relative_eq!(b.angles.y, 1.0);
    }

    #[test]
    fn offsets_are_applied_per_sensor() {
        let offsets = [AxisOffset::new(5, 0, 0), AxisOffset::new(0, 1, 0)];
        let mut integrator = started(offsets);
        let a = integrator.integrate(SensorId::Primary, RateSample::default(), 2000);
        let b = integrator.integrate(SensorId::Secondary, RateSample::default(), 2000);
        assert_eq!(a.angles, Angles { x: 10.0, y: 0.0, z: 0.0 });
        assert_eq!(b.angles, Angles { x: 0.0, y: 2.0, z: 0.0 });
    }

    #[test]
    fn integer_division_happens_before_offset() {
        let offsets = [AxisOffset::new(1, 0, 0), AxisOffset::default()];
        let integrator = started(offsets);
        // 130 / 131 truncates to 0, -262 / 131 is exactly -2
        assert_eq!(
            integrator.degrees_per_second(SensorId::Primary, RateSample::new(130, -262, -130)),
            [1, -2, 0]
        );
    }

    #[test]
    fn reset_zeroes_both_sensors() {
        let mut integrator = started(NO_OFFSETS);
        let rate = RateSample::new(131, -131, 262);
        integrator.integrate(SensorId::Primary, rate, 1000);
        integrator.integrate(SensorId::Secondary, rate, 1000);

        integrator.reset();
        for sensor in SensorId::ALL {
            assert_eq!(integrator.state(sensor).angles, Angles::default());
            assert_eq!(integrator.state(sensor).updated_at_ms, Some(1000));
        }

        let state = integrator.integrate(SensorId::Primary, rate, 2000);
        assert_relative_eq!(state.angles.x, 1.0);
    }
}

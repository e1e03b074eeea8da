//! Moving-average windows for the two gyroscopes.
//!
//! Both windows share one fill cursor that behaves as a two-slot barrier: a
//! slot is only complete once both sensors have written into it. When the
//! last slot completes, both windows are reduced to their mean in the same
//! call and the cursor starts over. A sensor that stops reporting therefore
//! stalls the cursor instead of letting the two windows drift apart.

use crate::SensorId;
use gyro_traits::RateSample;

/// Fixed-capacity buffer of one sensor's samples, allocated once.
#[derive(Debug, Clone)]
pub struct AverageWindow {
    samples: Box<[RateSample]>,
}

impl AverageWindow {
    fn new(depth: usize) -> Self {
        AverageWindow {
            samples: vec![RateSample::default(); depth].into_boxed_slice(),
        }
    }

    fn write(&mut self, slot: usize, sample: RateSample) {
        self.samples[slot] = sample;
    }

    /// Per-axis arithmetic mean, truncated toward zero.
    ///
    /// Sums are 64-bit, so any window that fits in memory reduces without
    /// overflow. The mean of `i16` values always fits back into an `i16`.
    pub fn mean(&self) -> RateSample {
        let (mut sum_x, mut sum_y, mut sum_z) = (0i64, 0i64, 0i64);
        for sample in self.samples.iter() {
            sum_x += i64::from(sample.x);
            sum_y += i64::from(sample.y);
            sum_z += i64::from(sample.z);
        }
        let n = self.samples.len() as i64;
        RateSample {
            x: (sum_x / n) as i16,
            y: (sum_y / n) as i16,
            z: (sum_z / n) as i16,
        }
    }
}

/// Mean samples of both sensors over one averaging period.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Reduction {
    pub primary: RateSample,
    pub secondary: RateSample,
}

impl Reduction {
    pub fn get(&self, sensor: SensorId) -> RateSample {
        match sensor {
            SensorId::Primary => self.primary,
            SensorId::Secondary => self.secondary,
        }
    }
}

#[derive(Debug, Clone)]
pub struct SampleAverager {
    windows: [AverageWindow; 2],
    contributed: [bool; 2],
    cursor: usize,
}

impl SampleAverager {
    /// # Panics
    /// Panics if `depth` is zero.
    pub fn new(depth: usize) -> Self {
        assert!(depth > 0, "Averaging window depth must be non-zero");
        SampleAverager {
            windows: [AverageWindow::new(depth), AverageWindow::new(depth)],
            contributed: [false; 2],
            cursor: 0,
        }
    }

    pub fn depth(&self) -> usize {
        self.windows[0].samples.len()
    }

    /// Number of completed slots in the current averaging period.
    pub fn cursor(&self) -> usize {
        self.cursor
    }

    /// Whether `sensor` has already written the current slot.
    pub fn has_contributed(&self, sensor: SensorId) -> bool {
        self.contributed[sensor.index()]
    }

    /// Stores `sample` in the sensor's window at the shared cursor.
    ///
    /// Returns the reduction of both windows when this sample completes the
    /// final slot, `None` otherwise. Writing twice to the same slot before the
    /// other sensor arrives overwrites the earlier sample.
    pub fn observe(&mut self, sensor: SensorId, sample: RateSample) -> Option<Reduction> {
        let idx = sensor.index();
        self.windows[idx].write(self.cursor, sample);
        self.contributed[idx] = true;

        if !self.contributed.iter().all(|&c| c) {
            return None;
        }
        self.contributed = [false; 2];
        self.cursor += 1;

        if self.cursor < self.depth() {
            return None;
        }
        // Window contents stay in place; the next period overwrites from 0.
        self.cursor = 0;
        Some(Reduction {
            primary: self.windows[SensorId::Primary.index()].mean(),
            secondary: self.windows[SensorId::Secondary.index()].mean(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const DEPTH: usize = 8;

    fn feed_pair(avg: &mut SampleAverager, a: RateSample, b: RateSample) -> Option<Reduction> {
        assert!(avg.observe(SensorId::Primary, a).is_none());
        avg.observe(SensorId::Secondary, b)
    }

    #[test]
    fn full_window_reduces_to_truncated_mean() {
        let mut avg = SampleAverager::new(DEPTH);
        let xs = [10, 11, 12, 13, 14, 15, 16, 17]; // sum 108, mean 13.5
        let mut reduction = None;
        for x in xs {
            reduction = feed_pair(
                &mut avg,
                RateSample::new(x, -x, 0),
                RateSample::new(0, 0, x * 2),
            );
        }
        let reduction = reduction.expect("eighth pair completes the window");
        assert_eq!(reduction.primary, RateSample::new(13, -13, 0));
        assert_eq!(reduction.secondary, RateSample::new(0, 0, 27));
    }

    #[test]
    fn negative_mean_truncates_toward_zero() {
        let mut avg = SampleAverager::new(DEPTH);
        let mut reduction = None;
        for i in 0..DEPTH {
            let v = if i < 2 { -1 } else { 0 };
            reduction = feed_pair(&mut avg, RateSample::new(v, v, v), RateSample::default());
        }
        // -2 / 8 is 0 under truncation, -1 under flooring
        assert_eq!(reduction.unwrap().primary, RateSample::new(0, 0, 0));
    }

    #[test]
    fn eight_samples_per_sensor_yield_one_reduction() {
        let mut avg = SampleAverager::new(DEPTH);
        let mut reductions = 0;
        for _ in 0..DEPTH {
            for sensor in SensorId::ALL {
                if avg.observe(sensor, RateSample::new(1, 2, 3)).is_some() {
                    reductions += 1;
                }
            }
        }
        assert_eq!(reductions, 1);
        assert_eq!(avg.cursor(), 0);
    }

    #[test]
    fn one_sensor_alone_never_advances_cursor() {
        let mut avg = SampleAverager::new(DEPTH);
        for _ in 0..(DEPTH * 3) {
            assert!(avg.observe(SensorId::Primary, RateSample::new(5, 5, 5)).is_none());
        }
        assert_eq!(avg.cursor(), 0);
        assert!(avg.has_contributed(SensorId::Primary));
        assert!(!avg.has_contributed(SensorId::Secondary));
    }

    #[test]
    fn cursor_resets_only_after_last_slot() {
        let mut avg = SampleAverager::new(DEPTH);
        for expected in 1..DEPTH {
            assert!(feed_pair(&mut avg, RateSample::default(), RateSample::default()).is_none());
            assert_eq!(avg.cursor(), expected);
        }
        assert!(feed_pair(&mut avg, RateSample::default(), RateSample::default()).is_some());
        assert_eq!(avg.cursor(), 0);
    }

    #[test]
    fn next_period_overwrites_from_start() {
        let mut avg = SampleAverager::new(2);
        feed_pair(&mut avg, RateSample::new(100, 0, 0), RateSample::default());
        feed_pair(&mut avg, RateSample::new(100, 0, 0), RateSample::default());

        feed_pair(&mut avg, RateSample::new(4, 0, 0), RateSample::default());
        let reduction = feed_pair(&mut avg, RateSample::new(6, 0, 0), RateSample::default());
        assert_eq!(reduction.unwrap().primary.x, 5);
    }

    #[test]
    fn read_order_does_not_matter() {
        let mut avg = SampleAverager::new(1);
        assert!(avg.observe(SensorId::Secondary, RateSample::new(0, 7, 0)).is_none());
        let reduction = avg.observe(SensorId::Primary, RateSample::new(3, 0, 0)).unwrap();
        assert_eq!(reduction.get(SensorId::Primary), RateSample::new(3, 0, 0));
        assert_eq!(reduction.get(SensorId::Secondary), RateSample::new(0, 7, 0));
    }

    #[test]
    fn repeated_write_overwrites_slot() {
        let mut avg = SampleAverager::new(1);
        avg.observe(SensorId::Primary, RateSample::new(9, 9, 9));
        avg.observe(SensorId::Primary, RateSample::new(1, 1, 1));
        let reduction = avg.observe(SensorId::Secondary, RateSample::default()).unwrap();
        assert_eq!(reduction.primary, RateSample::new(1, 1, 1));
    }

    #[test]
    fn deep_window_at_full_scale_does_not_overflow() {
        let depth = 70_000;
        let mut avg = SampleAverager::new(depth);
        let mut reduction = None;
        for _ in 0..depth {
            reduction = feed_pair(
                &mut avg,
                RateSample::new(i16::MAX, i16::MIN, 0),
                RateSample::default(),
            );
        }
        let reduction = reduction.expect("last pair completes the window");
        assert_eq!(reduction.primary, RateSample::new(i16::MAX, i16::MIN, 0));
        assert_eq!(reduction.secondary, RateSample::default());
    }

    #[test]
    #[should_panic(expected = "depth must be non-zero")]
    fn zero_depth_is_rejected() {
        let _ = SampleAverager::new(0);
    }
}

//! The control loop.
//!
//! One pass reads each gyro once, in fixed order. When the pass completes an
//! averaging period, both sensors are integrated with the same clock reading,
//! the primary sensor's angles become one telemetry record, and the
//! connection manager either sends it or takes its reconnect turn. All
//! mutable tracker state is owned here and touched only from this loop.

use crate::averager::{Reduction, SampleAverager};
use crate::clock::SharedClock;
use crate::config::TrackerConfig;
use crate::connection::ConnectionManager;
use crate::integrator::OrientationIntegrator;
use crate::telemetry::{self, TelemetryRecord};
use crate::transport::Transport;
use crate::trigger::ResetTrigger;
use crate::SensorId;
use gyro_traits::GyroBus;
use log::{debug, info};
use std::sync::atomic::{AtomicBool, Ordering};

/// Completed ticks per wall-clock second.
#[derive(Debug, Clone)]
pub struct ThroughputCounter {
    ticks: u32,
    total: u64,
    window_start_ms: u64,
}

impl ThroughputCounter {
    pub fn new(now_ms: u64) -> Self {
        ThroughputCounter {
            ticks: 0,
            total: 0,
            window_start_ms: now_ms,
        }
    }

    pub fn record_tick(&mut self) {
        self.ticks += 1;
        self.total += 1;
    }

    /// Returns the tick count of the window once a second has passed, and
    /// starts a new window.
    pub fn sample(&mut self, now_ms: u64) -> Option<u32> {
        if now_ms.saturating_sub(self.window_start_ms) < 1000 {
            return None;
        }
        let ticks = self.ticks;
        self.ticks = 0;
        self.window_start_ms = now_ms;
        Some(ticks)
    }

    pub fn total(&self) -> u64 {
        self.total
    }
}

pub struct TickScheduler<B: GyroBus, T: Transport, R: ResetTrigger> {
    bus: B,
    addresses: [u8; 2],
    averager: SampleAverager,
    integrator: OrientationIntegrator,
    connection: ConnectionManager<T>,
    reset: R,
    clock: SharedClock,
    throughput: ThroughputCounter,
    telemetry_enabled: bool,
    log_angles: bool,
}

impl<B: GyroBus, T: Transport, R: ResetTrigger> TickScheduler<B, T, R> {
    /// Builds the loop state. The integration baseline is the current clock
    /// reading, so the first tick covers the first averaging period.
    pub fn new(config: &TrackerConfig, bus: B, transport: T, reset: R, clock: SharedClock) -> Self {
        let now = clock.now_ms();
        let mut integrator =
            OrientationIntegrator::new(config.sensors.sensitivity_divisor, config.offsets());
        integrator.establish_baseline(now);

        TickScheduler {
            bus,
            addresses: [config.sensors.primary.address, config.sensors.secondary.address],
            averager: SampleAverager::new(config.sensors.window_depth),
            integrator,
            connection: ConnectionManager::new(
                transport,
                config.connection_settings(),
                clock.clone(),
            ),
            reset,
            clock,
            throughput: ThroughputCounter::new(now),
            telemetry_enabled: config.telemetry_enabled,
            log_angles: config.log_angles,
        }
    }

    /// Makes the initial connect attempt when telemetry is enabled.
    pub fn start(&mut self) -> bool {
        if !self.telemetry_enabled {
            info!("Telemetry disabled, logging tick throughput only");
            return false;
        }
        self.connection.connect()
    }

    /// Runs one pass. Returns the record of the tick this pass completed.
    pub fn run_pass(&mut self) -> Option<TelemetryRecord> {
        if self.reset.is_asserted() {
            self.integrator.reset();
            self.reset.indicate(true);
            debug!("Orientation reset");
        }

        let mut reduction = None;
        for sensor in SensorId::ALL {
            let address = self.addresses[sensor.index()];
            match self.bus.read_rate(address) {
                Ok(sample) => {
                    if let Some(r) = self.averager.observe(sensor, sample) {
                        reduction = Some(r);
                    }
                }
                // A missing sample holds the shared cursor where it is.
                Err(e) => debug!("Skipping {} gyro sample at 0x{:02X}: {}", sensor, address, e),
            }
        }

        let record = reduction.map(|r| self.complete_tick(r));

        if !self.telemetry_enabled {
            if let Some(rate) = self.throughput.sample(self.clock.now_ms()) {
                info!("Ticks per second: {}", rate);
            }
        }
        self.reset.indicate(false);
        record
    }

    fn complete_tick(&mut self, reduction: Reduction) -> TelemetryRecord {
        let now = self.clock.now_ms();
        let primary = self
            .integrator
            .integrate(SensorId::Primary, reduction.primary, now);
        let secondary = self
            .integrator
            .integrate(SensorId::Secondary, reduction.secondary, now);

        if self.log_angles {
            info!(
                "Gyro angles primary: {:.2}, {:.2}, {:.2}  secondary: {:.2}, {:.2}, {:.2}",
                primary.angles.x,
                primary.angles.y,
                primary.angles.z,
                secondary.angles.x,
                secondary.angles.y,
                secondary.angles.z
            );
        }

        let record = telemetry::encode(&primary, now);
        if self.telemetry_enabled {
            self.connection.service(&record);
        }
        self.throughput.record_tick();
        record
    }

    /// Runs passes until `running` is cleared.
    pub fn run(&mut self, running: &AtomicBool) {
        while running.load(Ordering::Relaxed) {
            self.run_pass();
        }
        debug!("Tick scheduler stopped after {} ticks", self.throughput.total());
    }

    pub fn averager(&self) -> &SampleAverager {
        &self.averager
    }

    pub fn integrator(&self) -> &OrientationIntegrator {
        &self.integrator
    }

    pub fn connection(&self) -> &ConnectionManager<T> {
        &self.connection
    }

    pub fn connection_mut(&mut self) -> &mut ConnectionManager<T> {
        &mut self.connection
    }

    pub fn throughput(&self) -> &ThroughputCounter {
        &self.throughput
    }

    pub fn bus_mut(&mut self) -> &mut B {
        &mut self.bus
    }

    pub fn reset_trigger_mut(&mut self) -> &mut R {
        &mut self.reset
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::connection::ConnectionState;
    use crate::integrator::{Angles, AxisOffset};
    use crate::mock::{ManualClock, ManualTrigger, MockBus, MockTransport};
    use approx::assert_relative_eq;
    use gyro_traits::RateSample;
    use log::{Level, LevelFilter, Log, Metadata, Record};
    use std::sync::{Arc, Mutex};

    const A: u8 = 0x68;
    const B: u8 = 0x69;
    const PASS_MS: u64 = 125;

    type Scheduler = TickScheduler<MockBus, MockTransport, ManualTrigger>;

    fn config() -> TrackerConfig {
        let mut config = TrackerConfig::default();
        config.sensors.primary.offset = AxisOffset::default();
        config.sensors.secondary.offset = AxisOffset::default();
        config.server.settle_delay_ms = 0;
        config
    }

    fn scheduler(
        config: &TrackerConfig,
        bus: MockBus,
        transport: MockTransport,
    ) -> (Scheduler, Arc<ManualClock>) {
        let clock = Arc::new(ManualClock::new(0));
        let scheduler =
            TickScheduler::new(config, bus, transport, ManualTrigger::default(), clock.clone());
        (scheduler, clock)
    }

    fn constant_bus(a: RateSample, b: RateSample) -> MockBus {
        MockBus::new().with_rate(A, a).with_rate(B, b)
    }

    /// Runs passes 125 ms apart and collects the emitted records.
    fn run_passes(sched: &mut Scheduler, clock: &ManualClock, passes: usize) -> Vec<TelemetryRecord> {
        (0..passes)
            .filter_map(|_| {
                clock.advance(PASS_MS);
                sched.run_pass()
            })
            .collect()
    }

    #[test]
    fn constant_rate_adds_one_degree_per_second() {
        let bus = constant_bus(RateSample::new(131, 0, 0), RateSample::default());
        let (mut sched, clock) = scheduler(&config(), bus, MockTransport::accepting());

        for tick in 1..=3 {
            let records = run_passes(&mut sched, &clock, 8);
            assert_eq!(records.len(), 1);
            assert_relative_eq!(records[0].rot_x, tick as f32);
            assert_eq!(records[0].timestamp, tick * 1000);
        }
    }

    #[test]
    fn one_record_per_tick_not_per_sample() {
        let bus = constant_bus(RateSample::new(262, 0, 0), RateSample::new(0, 262, 0));
        let (mut sched, clock) = scheduler(&config(), bus, MockTransport::accepting());
        assert!(sched.start());

        let records = run_passes(&mut sched, &clock, 8);
        assert_eq!(records.len(), 1);
        assert_eq!(sched.bus_mut().reads.len(), 16);

        let sent = &sched.connection().transport().sent;
        assert_eq!(sent.len(), 2, "greeting plus one record: {:?}", sent);
        assert_eq!(sched.throughput().total(), 1);
    }

    #[test]
    fn reads_sensors_in_fixed_order() {
        let bus = constant_bus(RateSample::default(), RateSample::default());
        let (mut sched, clock) = scheduler(&config(), bus, MockTransport::accepting());
        run_passes(&mut sched, &clock, 2);
        assert_eq!(sched.bus_mut().reads, vec![A, B, A, B]);
    }

    #[test]
    fn record_carries_primary_angles() {
        let bus = constant_bus(RateSample::new(0, 0, 131), RateSample::new(131 * 9, 0, 0));
        let (mut sched, clock) = scheduler(&config(), bus, MockTransport::accepting());

        let record = run_passes(&mut sched, &clock, 8).pop().unwrap();
        assert_eq!((record.rot_x, record.rot_y), (0.0, 0.0));
        assert_relative_eq!(record.rot_z, 1.0);

        let secondary = sched.integrator().state(SensorId::Secondary).angles;
        assert_relative_eq!(secondary.x, 9.0);
    }

    #[test]
    fn calibration_offsets_apply_per_sensor() {
        let bus = constant_bus(RateSample::default(), RateSample::default());
        let (mut sched, clock) = scheduler(&TrackerConfig::default(), bus, MockTransport::refusing());

        run_passes(&mut sched, &clock, 8);
        let primary = sched.integrator().state(SensorId::Primary).angles;
        let secondary = sched.integrator().state(SensorId::Secondary).angles;
        assert_eq!(primary, Angles { x: 5.0, y: 0.0, z: 0.0 });
        assert_eq!(secondary, Angles { x: 0.0, y: 1.0, z: 0.0 });
    }

    #[test]
    fn reset_zeroes_all_angles_mid_period() {
        let bus = constant_bus(RateSample::new(131, 131, 131), RateSample::new(131, 131, 131));
        let (mut sched, clock) = scheduler(&config(), bus, MockTransport::accepting());
        run_passes(&mut sched, &clock, 8);
        run_passes(&mut sched, &clock, 3);
        assert_eq!(sched.averager().cursor(), 3);

        sched.reset_trigger_mut().asserted = true;
        run_passes(&mut sched, &clock, 1);
        for sensor in SensorId::ALL {
            assert_eq!(sched.integrator().state(sensor).angles, Angles::default());
        }
        assert_eq!(sched.reset_trigger_mut().indications, 1);
        assert!(!sched.reset_trigger_mut().indicator);
        assert_eq!(sched.averager().cursor(), 4);

        sched.reset_trigger_mut().asserted = false;
        let record = run_passes(&mut sched, &clock, 4).pop().unwrap();
        assert_relative_eq!(record.rot_x, 1.0);
    }

    #[test]
    fn failed_read_holds_the_shared_cursor() {
        let bus = constant_bus(RateSample::default(), RateSample::default());
        let (mut sched, clock) = scheduler(&config(), bus, MockTransport::accepting());
        run_passes(&mut sched, &clock, 5);

        sched.bus_mut().set_failing(B, true);
        assert!(run_passes(&mut sched, &clock, 20).is_empty());
        assert_eq!(sched.averager().cursor(), 5);

        sched.bus_mut().set_failing(B, false);
        assert_eq!(run_passes(&mut sched, &clock, 3).len(), 1);
        assert_eq!(sched.averager().cursor(), 0);
    }

    #[test]
    fn disconnected_tracker_keeps_integrating_and_retries_on_schedule() {
        let bus = constant_bus(RateSample::new(131, 0, 0), RateSample::default());
        let (mut sched, clock) = scheduler(&config(), bus, MockTransport::refusing());
        assert!(!sched.start());
        assert_eq!(sched.connection().state(), ConnectionState::Disconnected);

        // Ticks at 1000..4000 fall inside the retry window.
        let records = run_passes(&mut sched, &clock, 32);
        assert_eq!(records.len(), 4);
        assert_eq!(sched.connection().attempts(), 1);
        assert_relative_eq!(records[3].rot_x, 4.0);

        // Tick at 5000 is allowed to try again.
        run_passes(&mut sched, &clock, 8);
        assert_eq!(sched.connection().attempts(), 2);
        assert_eq!(sched.connection().last_attempt_ms(), Some(5000));
        assert!(sched.connection().transport().sent.is_empty());
    }

    #[test]
    fn recovers_after_transport_loss() {
        let bus = constant_bus(RateSample::default(), RateSample::default());
        let (mut sched, clock) = scheduler(&config(), bus, MockTransport::accepting());
        sched.start();
        run_passes(&mut sched, &clock, 8);

        sched.connection_mut().transport_mut().drop_link();
        run_passes(&mut sched, &clock, 8);
        assert_eq!(sched.connection().state(), ConnectionState::Disconnected);

        run_passes(&mut sched, &clock, 8 * 5);
        assert!(sched.connection().is_connected());
        assert_eq!(sched.connection().transport().connects, 2);
    }

    #[test]
    fn telemetry_disabled_never_touches_transport() {
        let mut config = config();
        config.telemetry_enabled = false;
        let bus = constant_bus(RateSample::default(), RateSample::default());
        let (mut sched, clock) = scheduler(&config, bus, MockTransport::accepting());

        assert!(!sched.start());
        let records = run_passes(&mut sched, &clock, 16);
        assert_eq!(records.len(), 2);
        assert_eq!(sched.connection().transport().connects, 0);
        assert_eq!(sched.connection().attempts(), 0);
    }

    #[test]
    fn throughput_counts_ticks_per_second() {
        let mut counter = ThroughputCounter::new(0);
        counter.record_tick();
        counter.record_tick();
        assert_eq!(counter.sample(999), None);
        assert_eq!(counter.sample(1000), Some(2));
        assert_eq!(counter.sample(1500), None);
        assert_eq!(counter.sample(2000), Some(0));
        assert_eq!(counter.total(), 2);
    }

    /// Keeps every record logged by the test binary.
    struct CaptureLogger {
        records: Mutex<Vec<(Level, String)>>,
    }

    impl Log for CaptureLogger {
        fn enabled(&self, _metadata: &Metadata) -> bool {
            true
        }

        fn log(&self, record: &Record) {
            if let Ok(mut records) = self.records.lock() {
                records.push((record.level(), record.args().to_string()));
            }
        }

        fn flush(&self) {}
    }

    static LOGGER: CaptureLogger = CaptureLogger {
        records: Mutex::new(Vec::new()),
    };

    #[test]
    fn angle_trace_logs_at_info() {
        let _ = log::set_logger(&LOGGER);
        log::set_max_level(LevelFilter::Trace);

        let bus = constant_bus(RateSample::new(131, 0, 0), RateSample::new(0, 0, 131 * 7));
        let (mut sched, clock) = scheduler(&config(), bus, MockTransport::refusing());
        run_passes(&mut sched, &clock, 8);

        let records = LOGGER.records.lock().unwrap();
        let trace = records
            .iter()
            .find(|(_, message)| message.contains("secondary: 0.00, 0.00, 7.00"))
            .expect("angle trace logged");
        assert_eq!(trace.0, Level::Info);
        assert!(trace.1.contains("primary: 1.00, 0.00, 0.00"));
    }

    #[test]
    fn run_stops_when_flag_cleared() {
        let bus = constant_bus(RateSample::default(), RateSample::default());
        let (mut sched, _clock) = scheduler(&config(), bus, MockTransport::accepting());
        let running = AtomicBool::new(false);
        sched.run(&running);
        assert!(sched.bus_mut().reads.is_empty());
    }
}

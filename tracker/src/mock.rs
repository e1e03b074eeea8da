//! Scripted collaborators for exercising the tracker without hardware.

use crate::clock::Clock;
use crate::transport::{Endpoint, EventSink, Transport, TransportError, TransportEvent};
use crate::trigger::ResetTrigger;
use gyro_traits::{GyroBus, GyroError, RateSample};
use std::collections::{HashMap, HashSet, VecDeque};
use std::sync::atomic::{AtomicU64, Ordering};

/// Clock that only moves when told to.
#[derive(Debug, Default)]
pub struct ManualClock {
    now_ms: AtomicU64,
}

impl ManualClock {
    pub fn new(now_ms: u64) -> Self {
        ManualClock {
            now_ms: AtomicU64::new(now_ms),
        }
    }

    pub fn set(&self, now_ms: u64) {
        self.now_ms.store(now_ms, Ordering::SeqCst);
    }

    pub fn advance(&self, ms: u64) {
        self.now_ms.fetch_add(ms, Ordering::SeqCst);
    }
}

impl Clock for ManualClock {
    fn now_ms(&self) -> u64 {
        self.now_ms.load(Ordering::SeqCst)
    }
}

/// Gyro bus returning a fixed rate per address.
#[derive(Debug, Default)]
pub struct MockBus {
    rates: HashMap<u8, RateSample>,
    failing: HashSet<u8>,
    /// Every address read, in order.
    pub reads: Vec<u8>,
}

impl MockBus {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_rate(mut self, address: u8, rate: RateSample) -> Self {
        self.set_rate(address, rate);
        self
    }

    pub fn set_rate(&mut self, address: u8, rate: RateSample) {
        self.rates.insert(address, rate);
    }

    /// Makes reads of `address` fail until cleared.
    pub fn set_failing(&mut self, address: u8, failing: bool) {
        if failing {
            self.failing.insert(address);
        } else {
            self.failing.remove(&address);
        }
    }
}

impl GyroBus for MockBus {
    fn read_raw_rate(&mut self, address: u8) -> Result<[u8; 6], GyroError> {
        self.reads.push(address);
        if self.failing.contains(&address) {
            return Err(GyroError::ReadError(format!("mock read failure at {:#04x}", address)));
        }
        let rate = self
            .rates
            .get(&address)
            .ok_or(GyroError::UnknownDevice(address))?;
        let mut bytes = [0u8; 6];
        bytes[0..2].copy_from_slice(&rate.x.to_be_bytes());
        bytes[2..4].copy_from_slice(&rate.y.to_be_bytes());
        bytes[4..6].copy_from_slice(&rate.z.to_be_bytes());
        Ok(bytes)
    }
}

/// Transport that records everything written to it.
#[derive(Debug, Default)]
pub struct MockTransport {
    pub accept: bool,
    pub open: bool,
    pub fail_sends: bool,
    pub connects: usize,
    pub closes: usize,
    pub sent: Vec<String>,
    pub endpoints: Vec<Endpoint>,
    events: VecDeque<TransportEvent>,
}

impl MockTransport {
    pub fn accepting() -> Self {
        MockTransport {
            accept: true,
            ..Default::default()
        }
    }

    pub fn refusing() -> Self {
        Self::default()
    }

    pub fn queue_event(&mut self, event: TransportEvent) {
        self.events.push_back(event);
    }

    /// Simulates the peer going away: closed handle plus a `Closed` event.
    pub fn drop_link(&mut self) {
        self.open = false;
        self.queue_event(TransportEvent::Closed);
    }
}

impl Transport for MockTransport {
    fn connect(&mut self, endpoint: &Endpoint) -> Result<(), TransportError> {
        self.connects += 1;
        self.endpoints.push(endpoint.clone());
        if self.accept {
            self.open = true;
            Ok(())
        } else {
            Err(TransportError::Connect("connection refused".to_string()))
        }
    }

    fn close(&mut self) {
        self.closes += 1;
        self.open = false;
    }

    fn is_open(&self) -> bool {
        self.open
    }

    fn send(&mut self, text: &str) -> Result<(), TransportError> {
        if !self.open {
            return Err(TransportError::Closed);
        }
        if self.fail_sends {
            return Err(TransportError::Send("mock send failure".to_string()));
        }
        self.sent.push(text.to_string());
        Ok(())
    }

    fn poll(&mut self, sink: &mut dyn EventSink) {
        while let Some(event) = self.events.pop_front() {
            sink.on_event(event);
        }
    }
}

/// Reset input driven by the test.
#[derive(Debug, Default)]
pub struct ManualTrigger {
    pub asserted: bool,
    pub indicator: bool,
    /// Passes during which the indicator was switched on.
    pub indications: usize,
}

impl ResetTrigger for ManualTrigger {
    fn is_asserted(&mut self) -> bool {
        self.asserted
    }

    fn indicate(&mut self, active: bool) {
        if active && !self.indicator {
            self.indications += 1;
        }
        self.indicator = active;
    }
}

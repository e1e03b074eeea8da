use log::warn;
use std::fs;
use std::path::PathBuf;

/// Level input that zeroes the orientation while asserted.
pub trait ResetTrigger {
    fn is_asserted(&mut self) -> bool;

    /// Drives an optional indicator output; on while the reset is held.
    fn indicate(&mut self, _active: bool) {}
}

impl<T: ResetTrigger + ?Sized> ResetTrigger for Box<T> {
    fn is_asserted(&mut self) -> bool {
        (**self).is_asserted()
    }

    fn indicate(&mut self, active: bool) {
        (**self).indicate(active)
    }
}

/// No reset input wired.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoTrigger;

impl ResetTrigger for NoTrigger {
    fn is_asserted(&mut self) -> bool {
        false
    }
}

/// Reset button and indicator LED exported through sysfs GPIO.
///
/// Pins must already be exported with the right direction; this only reads
/// and writes their `value` files.
#[derive(Debug)]
pub struct SysfsGpioTrigger {
    input: PathBuf,
    indicator: Option<PathBuf>,
    indicator_on: bool,
    read_failed: bool,
}

impl SysfsGpioTrigger {
    pub fn new(input_pin: u32, indicator_pin: Option<u32>) -> Self {
        Self::from_paths(gpio_value_path(input_pin), indicator_pin.map(gpio_value_path))
    }

    pub fn from_paths(input: PathBuf, indicator: Option<PathBuf>) -> Self {
        SysfsGpioTrigger {
            input,
            indicator,
            indicator_on: false,
            read_failed: false,
        }
    }
}

fn gpio_value_path(pin: u32) -> PathBuf {
    PathBuf::from(format!("/sys/class/gpio/gpio{}/value", pin))
}

impl ResetTrigger for SysfsGpioTrigger {
    fn is_asserted(&mut self) -> bool {
        match fs::read(&self.input) {
            Ok(value) => {
                self.read_failed = false;
                value.first() == Some(&b'1')
            }
            Err(e) => {
                // Warn on the first failure of a run only.
                if !self.read_failed {
                    warn!("Failed to read reset input {}: {}", self.input.display(), e);
                    self.read_failed = true;
                }
                false
            }
        }
    }

    fn indicate(&mut self, active: bool) {
        if active == self.indicator_on {
            return;
        }
        if let Some(path) = &self.indicator {
            let level: &[u8] = if active { b"1" } else { b"0" };
            if let Err(e) = fs::write(path, level) {
                warn!("Failed to drive indicator {}: {}", path.display(), e);
                return;
            }
        }
        self.indicator_on = active;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::env;
    use std::process;

    fn scratch(name: &str) -> PathBuf {
        env::temp_dir().join(format!("tracker-trigger-{}-{}", process::id(), name))
    }

    #[test]
    fn reads_level_from_value_file() {
        let input = scratch("input");
        let mut trigger = SysfsGpioTrigger::from_paths(input.clone(), None);

        fs::write(&input, "1\n").unwrap();
        assert!(trigger.is_asserted());
        fs::write(&input, "0\n").unwrap();
        assert!(!trigger.is_asserted());

        fs::remove_file(&input).unwrap();
        assert!(!trigger.is_asserted());
    }

    #[test]
    fn indicator_follows_reset() {
        let input = scratch("input2");
        let led = scratch("led");
        fs::write(&input, "0").unwrap();
        fs::write(&led, "0").unwrap();
        let mut trigger = SysfsGpioTrigger::from_paths(input.clone(), Some(led.clone()));

        trigger.indicate(true);
        assert_eq!(fs::read_to_string(&led).unwrap(), "1");
        trigger.indicate(false);
        assert_eq!(fs::read_to_string(&led).unwrap(), "0");

        fs::remove_file(&input).unwrap();
        fs::remove_file(&led).unwrap();
    }

    #[test]
    fn no_trigger_is_never_asserted() {
        assert!(!NoTrigger.is_asserted());
    }
}

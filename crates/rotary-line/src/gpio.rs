//! Digital pins: the Linux sysfs interface for the real phone and an
//! in-memory pin for tests and simulation.

use crate::error::{LineError, LineResult};
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::Duration;
use tracing::debug;

/// Default location of the sysfs GPIO class.
pub const SYSFS_GPIO_ROOT: &str = "/sys/class/gpio";

/// A digital input. "Active" means the contact is closed, whatever the
/// electrical polarity.
pub trait InputPin: Send {
    fn is_active(&self) -> io::Result<bool>;
}

/// A digital output driving a coil or similar load.
pub trait OutputPin: Send + Sync {
    fn set_active(&self, active: bool) -> io::Result<()>;
}

/// Pin exported through `/sys/class/gpio`.
#[derive(Debug)]
pub struct SysfsPin {
    number: u32,
    value_path: PathBuf,
    active_low: bool,
}

impl SysfsPin {
    /// Export `number` as an input. With `active_low` a low level reads as
    /// active, which is what a switch to ground with a pull-up gives.
    pub fn input(number: u32, active_low: bool) -> LineResult<Self> {
        Self::input_at(Path::new(SYSFS_GPIO_ROOT), number, active_low)
    }

    /// Export `number` as an output, initially driven low.
    pub fn output(number: u32) -> LineResult<Self> {
        Self::output_at(Path::new(SYSFS_GPIO_ROOT), number)
    }

    pub fn input_at(root: &Path, number: u32, active_low: bool) -> LineResult<Self> {
        let pin = Self::export(root, number, "in", active_low)?;
        debug!(pin = number, active_low, "GPIO input ready");
        Ok(pin)
    }

    pub fn output_at(root: &Path, number: u32) -> LineResult<Self> {
        let pin = Self::export(root, number, "out", false)?;
        pin.set_active(false)
            .map_err(|e| LineError::gpio(number, e))?;
        debug!(pin = number, "GPIO output ready");
        Ok(pin)
    }

    pub fn number(&self) -> u32 {
        self.number
    }

    fn export(root: &Path, number: u32, direction: &str, active_low: bool) -> LineResult<Self> {
        let dir = root.join(format!("gpio{}", number));
        if !dir.exists() {
            fs::write(root.join("export"), number.to_string())
                .map_err(|e| LineError::gpio(number, e))?;
            // udev needs a moment to fix permissions on the new node.
            for _ in 0..50 {
                if dir.join("direction").exists() {
                    break;
                }
                thread::sleep(Duration::from_millis(10));
            }
        }
        fs::write(dir.join("direction"), direction).map_err(|e| LineError::gpio(number, e))?;
        Ok(Self {
            number,
            value_path: dir.join("value"),
            active_low,
        })
    }
}

impl InputPin for SysfsPin {
    fn is_active(&self) -> io::Result<bool> {
        let raw = fs::read_to_string(&self.value_path)?;
        let high = match raw.trim() {
            "1" => true,
            "0" => false,
            other => {
                return Err(io::Error::new(
                    io::ErrorKind::InvalidData,
                    format!("unexpected GPIO value {:?}", other),
                ))
            }
        };
        Ok(high != self.active_low)
    }
}

impl OutputPin for SysfsPin {
    fn set_active(&self, active: bool) -> io::Result<()> {
        let level = if active != self.active_low { "1" } else { "0" };
        fs::write(&self.value_path, level)
    }
}

/// In-memory pin. Clones share the same line, so one clone can be handed
/// to a monitor while another drives it.
#[derive(Debug, Clone, Default)]
pub struct SimulatedPin {
    level: Arc<AtomicBool>,
    broken: Arc<AtomicBool>,
    activations: Arc<AtomicUsize>,
}

impl SimulatedPin {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set(&self, active: bool) {
        if !self.level.swap(active, Ordering::SeqCst) && active {
            self.activations.fetch_add(1, Ordering::SeqCst);
        }
    }

    pub fn level(&self) -> bool {
        self.level.load(Ordering::SeqCst)
    }

    /// Number of inactive-to-active transitions so far.
    pub fn activations(&self) -> usize {
        self.activations.load(Ordering::SeqCst)
    }

    /// Make reads and writes fail until cleared.
    pub fn set_broken(&self, broken: bool) {
        self.broken.store(broken, Ordering::SeqCst);
    }

    /// Drive `count` make/break cycles the way a returning dial does.
    pub fn pulse(&self, count: u32, make: Duration, brk: Duration) {
        for _ in 0..count {
            self.set(true);
            thread::sleep(make);
            self.set(false);
            thread::sleep(brk);
        }
    }

    fn check(&self) -> io::Result<()> {
        if self.broken.load(Ordering::SeqCst) {
            Err(io::Error::new(io::ErrorKind::Other, "simulated pin fault"))
        } else {
            Ok(())
        }
    }
}

impl InputPin for SimulatedPin {
    fn is_active(&self) -> io::Result<bool> {
        self.check()?;
        Ok(self.level())
    }
}

impl OutputPin for SimulatedPin {
    fn set_active(&self, active: bool) -> io::Result<()> {
        self.check()?;
        self.set(active);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn fake_sysfs(number: u32, value: &str) -> tempfile::TempDir {
        let root = tempfile::tempdir().unwrap();
        let dir = root.path().join(format!("gpio{}", number));
        fs::create_dir(&dir).unwrap();
        fs::write(dir.join("direction"), "in").unwrap();
        fs::write(dir.join("value"), value).unwrap();
        root
    }

    #[test]
    fn sysfs_input_honours_polarity() {
        let root = fake_sysfs(8, "0\n");
        let pin = SysfsPin::input_at(root.path(), 8, true).unwrap();
        assert!(pin.is_active().unwrap());

        let plain = SysfsPin::input_at(root.path(), 8, false).unwrap();
        assert!(!plain.is_active().unwrap());
    }

    #[test]
    fn sysfs_output_starts_low() {
        let root = fake_sysfs(23, "1");
        let pin = SysfsPin::output_at(root.path(), 23).unwrap();
        let dir = root.path().join("gpio23");
        assert_eq!(fs::read_to_string(dir.join("direction")).unwrap(), "out");
        assert_eq!(fs::read_to_string(dir.join("value")).unwrap(), "0");

        pin.set_active(true).unwrap();
        assert_eq!(fs::read_to_string(dir.join("value")).unwrap(), "1");
    }

    #[test]
    fn sysfs_garbage_is_an_error() {
        let root = fake_sysfs(25, "x");
        let pin = SysfsPin::input_at(root.path(), 25, false).unwrap();
        assert!(pin.is_active().is_err());
    }

    #[test]
    fn simulated_clones_share_the_line() {
        let pin = SimulatedPin::new();
        let reader = pin.clone();
        pin.set(true);
        pin.set(true);
        assert!(reader.is_active().unwrap());
        assert_eq!(pin.activations(), 1);

        pin.set_broken(true);
        assert!(reader.is_active().is_err());
        assert!(OutputPin::set_active(&reader, false).is_err());
    }
}

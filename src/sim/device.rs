//! Peripherals and consoles connected to the machine.
//!
//! The core types here are:
//! - [`Peripheral`]: A byte device which can be attached to an I/O port.
//! - [`Console`]: Where `alu.print` output goes.
//!
//! This module also provides some devices:
//! - [`NullDevice`]: Does nothing.
//! - [`BufferedDevice`]: Reads from an input buffer and writes to an output buffer.
//! - [`ChannelDevice`]: Reads from and writes to threads over channels (e.g., stdin and stdout).
//!
//! and some consoles:
//! - [`StdoutConsole`]: Prints every value on its own line.
//! - [`BufferedConsole`]: Collects every value.
mod buffered;
mod channel;

use std::sync::{Arc, Mutex, MutexGuard, PoisonError, RwLock};

pub use buffered::BufferedDevice;
pub use channel::{ChannelDevice, Stop};

/// A byte device, which can be attached to a port of the I/O module.
pub trait Peripheral: Send + 'static {
    /// Sends a byte to the device.
    fn write(&mut self, byte: u8);

    /// Takes a byte from the device.
    ///
    /// If the device has nothing pending, this should return 0.
    fn read(&mut self) -> u8;

    /// Whether the device has data pending.
    fn poll(&mut self) -> bool;
}

/// A peripheral shared between the machine and every I/O module instance.
pub type SharedPeripheral = Arc<Mutex<dyn Peripheral>>;

/// Locks a peripheral, recovering it if another user panicked while holding it.
pub(crate) fn lock_device(dev: &SharedPeripheral) -> MutexGuard<'_, dyn Peripheral> {
    dev.lock().unwrap_or_else(PoisonError::into_inner)
}

/// Does nothing.
///
/// Discards all writes, reads as 0, and never has data pending.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct NullDevice;
impl Peripheral for NullDevice {
    fn write(&mut self, _byte: u8) {}

    fn read(&mut self) -> u8 {
        0
    }

    fn poll(&mut self) -> bool {
        false
    }
}

/// Where the values moved into `alu.print` end up.
pub trait Console: Send + Sync {
    /// Outputs one value.
    fn print(&self, value: u32);
}

/// Prints values to stdout, one per line, as `: value` (signed).
#[derive(Debug, Default, Clone, Copy)]
pub struct StdoutConsole;
impl Console for StdoutConsole {
    fn print(&self, value: u32) {
        println!(": {}", value as i32);
    }
}

/// Collects printed values into a shared buffer.
#[derive(Debug, Default, Clone)]
pub struct BufferedConsole {
    buffer: Arc<RwLock<Vec<u32>>>
}
impl BufferedConsole {
    /// Creates a new console with an empty buffer.
    pub fn new() -> Self {
        Default::default()
    }

    /// A copy of every value printed so far.
    pub fn values(&self) -> Vec<u32> {
        self.buffer.read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }
}
impl Console for BufferedConsole {
    fn print(&self, value: u32) {
        self.buffer.write()
            .unwrap_or_else(PoisonError::into_inner)
            .push(value);
    }
}

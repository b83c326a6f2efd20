use std::collections::VecDeque;
use std::sync::{Arc, PoisonError, RwLock, RwLockWriteGuard, TryLockError};

use super::Peripheral;

/// A device that reads from an input buffer and writes to an output buffer.
///
/// Clones share their buffers, so one clone can be attached to the machine
/// while another feeds input and inspects output.
#[derive(Debug, Default, Clone)]
pub struct BufferedDevice {
    input: Arc<RwLock<VecDeque<u8>>>,
    output: Arc<RwLock<Vec<u8>>>,
}
impl BufferedDevice {
    /// Creates a new device with empty buffers.
    pub fn new() -> Self {
        Default::default()
    }

    /// Appends bytes to the input buffer.
    pub fn push_input(&self, bytes: &[u8]) {
        self.input.write()
            .unwrap_or_else(PoisonError::into_inner)
            .extend(bytes);
    }

    /// A copy of everything written to the device so far.
    pub fn output(&self) -> Vec<u8> {
        self.output.read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    fn try_input(&self) -> Option<RwLockWriteGuard<'_, VecDeque<u8>>> {
        match self.input.try_write() {
            Ok(g) => Some(g),
            Err(TryLockError::Poisoned(e)) => Some(e.into_inner()),
            Err(TryLockError::WouldBlock) => None,
        }
    }
}
impl Peripheral for BufferedDevice {
    fn write(&mut self, byte: u8) {
        self.output.write()
            .unwrap_or_else(PoisonError::into_inner)
            .push(byte);
    }

    fn read(&mut self) -> u8 {
        self.try_input()
            .and_then(|mut inp| inp.pop_front())
            .unwrap_or(0)
    }

    fn poll(&mut self) -> bool {
        self.try_input().is_some_and(|inp| !inp.is_empty())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_buffers() {
        let mut dev = BufferedDevice::new();
        let handle = dev.clone();

        assert!(!dev.poll());
        assert_eq!(dev.read(), 0);

        handle.push_input(b"hi");
        assert!(dev.poll());
        assert_eq!(dev.read(), b'h');
        assert_eq!(dev.read(), b'i');
        assert!(!dev.poll());

        dev.write(b'o');
        dev.write(b'k');
        assert_eq!(handle.output(), b"ok");
    }
}

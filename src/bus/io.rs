//! The I/O multiplexer (`io`, module `0x14`).
//!
//! A program selects a device by writing its port number to `io.port` and then:
//! - moves a byte to `io.write` to send it,
//! - moves anything to `io.read` to receive a byte into `io.value`,
//! - reads `io.poll`: `1` if the device has data pending, `2` if it is idle,
//!   and `0` if no device is attached to that port.
//!
//! The device table of a fresh instance is filled by [`Host::prepare_io_subsystem`]
//! when its segment is bound.
//!
//! [`Host::prepare_io_subsystem`]: super::Host::prepare_io_subsystem
use std::collections::BTreeMap;

use crate::err::RuntimeTrap;
use crate::sim::device::{lock_device, SharedPeripheral};

use super::{Bus, Capability, Host, Module, ModuleDecl, ModuleKind, PortDecl, PortEffect};

const PORT: u16 = 0;
const VALUE: u16 = 1;

const WRITE: u16 = 0;
const POLL: u16 = 1;
const READ: u16 = 2;

const PORTS: &[PortDecl] = &[
    PortDecl::cell(0x01, "port", Capability::ReadWrite, PORT),
    PortDecl::cell(0x02, "value", Capability::ReadWrite, VALUE),
    PortDecl::handler(0x03, "write", Capability::Write, WRITE),
    PortDecl::handler(0x04, "poll", Capability::Read, POLL),
    PortDecl::handler(0x05, "read", Capability::Write, READ),
];

/// Declaration of the `io` module.
pub const DECL: ModuleDecl = ModuleDecl {
    id: 0x14,
    prefix: "io",
    cells: 2,
    ports: PORTS,
    kind: ModuleKind::Dispatched(IoModule::create),
};

const POLL_PENDING: u32 = 1;
const POLL_IDLE: u32 = 2;
const POLL_ABSENT: u32 = 0;

/// An instance of the I/O multiplexer.
#[derive(Default)]
pub struct IoModule {
    cells: [u32; 2],
    devices: BTreeMap<u16, SharedPeripheral>,
}
impl IoModule {
    fn create() -> Box<dyn Module> {
        Box::<IoModule>::default()
    }

    /// Attaches a device to a port.
    ///
    /// # Errors
    /// If another device is already attached to the port, the device is handed back.
    pub fn add_device(&mut self, port: u16, device: SharedPeripheral) -> Result<(), SharedPeripheral> {
        use std::collections::btree_map::Entry;

        match self.devices.entry(port) {
            Entry::Vacant(e) => {
                e.insert(device);
                Ok(())
            },
            Entry::Occupied(_) => Err(device),
        }
    }

    /// Detaches the device on a port, returning it.
    pub fn remove_device(&mut self, port: u16) -> Option<SharedPeripheral> {
        self.devices.remove(&port)
    }

    /// The ports with an attached device.
    pub fn ports(&self) -> impl Iterator<Item = u16> + '_ {
        self.devices.keys().copied()
    }

    fn selected(&self) -> Option<&SharedPeripheral> {
        let port = u16::try_from(self.cells[usize::from(PORT)]).ok()?;
        let device = self.devices.get(&port);
        if device.is_none() {
            log::warn!("io access on port {port} with no attached device");
        }
        device
    }
}
impl std::fmt::Debug for IoModule {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("IoModule")
            .field("cells", &self.cells)
            .field("ports", &self.devices.keys().collect::<Vec<_>>())
            .finish()
    }
}
impl Module for IoModule {
    fn cells(&mut self) -> &mut [u32] {
        &mut self.cells
    }

    fn read(&mut self, key: u16, _bus: &Bus<'_>) -> Result<u32, RuntimeTrap> {
        match (key, self.selected()) {
            (POLL, Some(dev)) => match lock_device(dev).poll() {
                true  => Ok(POLL_PENDING),
                false => Ok(POLL_IDLE),
            },
            _ => Ok(POLL_ABSENT),
        }
    }

    fn write(&mut self, key: u16, value: u32, _bus: &Bus<'_>) -> Result<PortEffect, RuntimeTrap> {
        match key {
            WRITE => if let Some(dev) = self.selected() {
                lock_device(dev).write(value as u8);
            },
            READ => if let Some(dev) = self.selected() {
                let byte = lock_device(dev).read();
                self.cells[usize::from(VALUE)] = u32::from(byte);
            },
            _ => {}
        }
        Ok(PortEffect::Continue)
    }

    fn attach(&mut self, host: &dyn Host) {
        host.prepare_io_subsystem(self);
    }
}

#[cfg(test)]
mod tests {
    use std::sync::{Arc, Mutex};

    use super::*;
    use crate::bus::testing::TestHost;
    use crate::isa::PortAddr;
    use crate::sim::device::BufferedDevice;

    #[test]
    fn test_attach_and_transfer() {
        let device = BufferedDevice::new();
        let mut host = TestHost::default();
        let shared: SharedPeripheral = Arc::new(Mutex::new(device.clone()));
        host.devices.push((7, shared));

        let mut io = IoModule::default();
        io.attach(&host);
        assert_eq!(io.ports().collect::<Vec<_>>(), [7]);

        let bus = Bus { host: &host, offset: 0, addr: PortAddr::new(0x14, 0) };

        // nothing selected yet (port 0)
        assert_eq!(io.read(POLL, &bus).unwrap(), POLL_ABSENT);

        io.cells[usize::from(PORT)] = 7;
        assert_eq!(io.read(POLL, &bus).unwrap(), POLL_IDLE);

        device.push_input(b"\xF0");
        assert_eq!(io.read(POLL, &bus).unwrap(), POLL_PENDING);
        io.write(READ, 0, &bus).unwrap();
        assert_eq!(io.cells[usize::from(VALUE)], 0xF0);

        io.write(WRITE, 0x1234_5641, &bus).unwrap();
        assert_eq!(device.output(), b"A");
    }

    #[test]
    fn test_device_table() {
        let mut io = IoModule::default();
        let a: SharedPeripheral = Arc::new(Mutex::new(BufferedDevice::new()));
        let b: SharedPeripheral = Arc::new(Mutex::new(BufferedDevice::new()));

        assert!(io.add_device(1, a).is_ok());
        let rejected = io.add_device(1, b.clone()).unwrap_err();
        assert!(Arc::ptr_eq(&rejected, &b));

        assert!(io.remove_device(1).is_some());
        assert!(io.add_device(1, b).is_ok());
    }

    #[test]
    fn test_wide_port_selects_nothing() {
        let host = TestHost::default();
        let bus = Bus { host: &host, offset: 0, addr: PortAddr::new(0x14, 0) };
        let mut io = IoModule::default();
        assert!(io.add_device(0, Arc::new(Mutex::new(BufferedDevice::new()))).is_ok());

        io.cells[usize::from(PORT)] = 0x1_0000;
        assert_eq!(io.read(POLL, &bus).unwrap(), POLL_ABSENT);
    }
}

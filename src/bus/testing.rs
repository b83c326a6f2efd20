//! A minimal in-memory [`Host`] for unit tests.
use std::cell::RefCell;

use crate::err::RuntimeTrap;
use crate::sim::device::SharedPeripheral;

use super::io::IoModule;
use super::Host;

pub(crate) struct TestHost {
    pub ram: RefCell<Vec<u8>>,
    pub printed: RefCell<Vec<u32>>,
    pub stops: RefCell<Vec<u32>>,
    pub devices: Vec<(u16, SharedPeripheral)>,
}
impl TestHost {
    pub fn new(ram: Vec<u8>) -> Self {
        Self {
            ram: RefCell::new(ram),
            printed: RefCell::default(),
            stops: RefCell::default(),
            devices: vec![],
        }
    }
    pub fn printed(&self) -> Vec<u32> {
        self.printed.borrow().clone()
    }
    pub fn stops(&self) -> Vec<u32> {
        self.stops.borrow().clone()
    }
}
impl Default for TestHost {
    fn default() -> Self {
        Self::new(vec![0; 256])
    }
}
impl Host for TestHost {
    fn read_from_ram(&self, offset: u32) -> Result<u32, RuntimeTrap> {
        let ram = self.ram.borrow();
        let start = offset as usize;
        let bytes = ram.get(start..start + 4).ok_or(RuntimeTrap::RamOutOfBounds { offset })?;
        Ok(u32::from_be_bytes([bytes[0], bytes[1], bytes[2], bytes[3]]))
    }
    fn write_to_ram(&self, offset: u32, value: u32) -> Result<(), RuntimeTrap> {
        let mut ram = self.ram.borrow_mut();
        let start = offset as usize;
        let bytes = ram.get_mut(start..start + 4).ok_or(RuntimeTrap::RamOutOfBounds { offset })?;
        bytes.copy_from_slice(&value.to_be_bytes());
        Ok(())
    }
    fn breakpoint(&self, offset: u32) -> Result<(), RuntimeTrap> {
        self.stops.borrow_mut().push(offset);
        Ok(())
    }
    fn print(&self, value: u32) {
        self.printed.borrow_mut().push(value);
    }
    fn prepare_io_subsystem(&self, io: &mut IoModule) {
        for (port, dev) in &self.devices {
            let _ = io.add_device(*port, dev.clone());
        }
    }
}

//! Listeners notified by the [`Machine`].
//!
//! Listeners are called synchronously on the thread that caused the event:
//! - [`MemoryListener::on_memory_write`] from [`Machine::write_to_ram`], before the store,
//! - [`ExecutionListener::on_program_counter_changed`] from every suspension point,
//! - [`ExecutionListener::on_execution_status_changed`] from [`Machine::start`] and [`Machine::stop`].
//!
//! A slow listener stalls the machine.
//! A failing listener aborts what triggered it: a RAM write is not performed, and the
//! run it happened in ends with [`RuntimeTrap::Listener`].
//!
//! For a debugger running on another thread, [`EventChannel`] forwards every event
//! over a channel instead.
//!
//! [`Machine`]: super::Machine
//! [`Machine::write_to_ram`]: super::Machine::write_to_ram
//! [`Machine::start`]: super::Machine::start
//! [`Machine::stop`]: super::Machine::stop
//! [`RuntimeTrap::Listener`]: crate::err::RuntimeTrap::Listener
use std::sync::Arc;

use crossbeam_channel as cbc;

use crate::err::ListenerError;

use super::Machine;

/// Observes stores into RAM.
pub trait MemoryListener: Send + Sync {
    /// Called once per [`Machine::write_to_ram`], with the value about to be stored.
    ///
    /// [`Machine::write_to_ram`]: super::Machine::write_to_ram
    fn on_memory_write(&self, machine: &Machine, offset: u32, value: u32) -> Result<(), ListenerError>;
}

/// Observes the execution state of the machine.
pub trait ExecutionListener: Send + Sync {
    /// Called at every suspension point, after the program counter was updated.
    fn on_program_counter_changed(&self, machine: &Machine) -> Result<(), ListenerError> {
        let _ = machine;
        Ok(())
    }

    /// Called whenever the machine is started or stopped.
    fn on_execution_status_changed(&self, machine: &Machine) -> Result<(), ListenerError> {
        let _ = machine;
        Ok(())
    }
}

/// Set of listeners, compared by identity.
pub(super) struct ListenerSet<L: ?Sized> {
    listeners: Vec<Arc<L>>
}
impl<L: ?Sized> ListenerSet<L> {
    pub(super) fn new() -> Self {
        Self { listeners: vec![] }
    }

    fn same(a: &Arc<L>, b: &Arc<L>) -> bool {
        // Compare data pointers only; vtables may differ across codegen units.
        std::ptr::eq(Arc::as_ptr(a).cast::<()>(), Arc::as_ptr(b).cast::<()>())
    }

    /// Adds a listener, returning false if it was already present.
    pub(super) fn add(&mut self, listener: Arc<L>) -> bool {
        match self.listeners.iter().any(|l| Self::same(l, &listener)) {
            true  => false,
            false => {
                self.listeners.push(listener);
                true
            }
        }
    }

    /// Removes a listener, returning false if it was not present.
    pub(super) fn remove(&mut self, listener: &Arc<L>) -> bool {
        let before = self.listeners.len();
        self.listeners.retain(|l| !Self::same(l, listener));
        self.listeners.len() != before
    }

    /// A copy of the current listeners, so callbacks can run without holding the set.
    pub(super) fn snapshot(&self) -> Vec<Arc<L>> {
        self.listeners.clone()
    }
}

/// An event reported by an [`EventChannel`].
#[derive(Clone, Copy, PartialEq, Eq, Hash, Debug)]
pub enum MachineEvent {
    /// A word is being stored into RAM.
    MemoryWrite {
        /// Byte offset.
        offset: u32,
        /// The stored value.
        value: u32
    },
    /// The machine reached a suspension point at this offset.
    ProgramCounter(u32),
    /// The machine was started (`true`) or stopped (`false`).
    Status(bool)
}

/// A listener forwarding every event over a channel.
///
/// ```
/// use std::sync::Arc;
/// use move_machine::sim::observer::{EventChannel, MachineEvent};
/// use move_machine::sim::{Machine, MachineConfig};
/// use move_machine::bus::Registry;
///
/// let machine = Machine::new(Arc::new(Registry::standard().unwrap()), MachineConfig::default());
/// let (events, rx) = EventChannel::new();
/// let events = Arc::new(events);
/// machine.add_memory_listener(events.clone());
/// machine.add_execution_listener(events);
///
/// machine.write_to_ram(16, 5).unwrap();
/// machine.start().unwrap();
/// assert_eq!(rx.try_recv(), Ok(MachineEvent::MemoryWrite { offset: 16, value: 5 }));
/// assert_eq!(rx.try_recv(), Ok(MachineEvent::Status(true)));
/// ```
#[derive(Debug, Clone)]
pub struct EventChannel {
    tx: cbc::Sender<MachineEvent>
}
impl EventChannel {
    /// Creates a new event channel and the receiver its events arrive on.
    pub fn new() -> (Self, cbc::Receiver<MachineEvent>) {
        let (tx, rx) = cbc::unbounded();
        (Self { tx }, rx)
    }

    fn send(&self, event: MachineEvent) -> Result<(), ListenerError> {
        self.tx.send(event).map_err(ListenerError::new)
    }
}
impl MemoryListener for EventChannel {
    /// Fails once the receiver is dropped.
    fn on_memory_write(&self, _machine: &Machine, offset: u32, value: u32) -> Result<(), ListenerError> {
        self.send(MachineEvent::MemoryWrite { offset, value })
    }
}
impl ExecutionListener for EventChannel {
    fn on_program_counter_changed(&self, machine: &Machine) -> Result<(), ListenerError> {
        self.send(MachineEvent::ProgramCounter(machine.program_counter()))
    }

    fn on_execution_status_changed(&self, machine: &Machine) -> Result<(), ListenerError> {
        self.send(MachineEvent::Status(machine.is_running()))
    }
}

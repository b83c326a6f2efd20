//! Execution of move-machine programs.
//!
//! This module is focused on executing programs held in the RAM of a [`Machine`].
//!
//! This module consists of:
//! - [`Machine`]: The struct that owns RAM, listeners, and devices, and drives execution.
//! - [`compile`]: The segment compiler, which translates ranges of RAM.
//! - [`segment`]: Compiled segments and how they run.
//! - [`mem`]: The module handling RAM and its initialization.
//! - [`device`]: The module handling peripherals and consoles.
//! - [`debug`]: The module handling types of breakpoints for the machine.
//! - [`observer`]: The module handling memory and execution listeners.
//!
//! # Usage
//!
//! To run a program, create a machine over a registry, load the program into RAM and execute it:
//!
//! ```
//! use std::sync::Arc;
//! use move_machine::asm::Program;
//! use move_machine::bus::Registry;
//! use move_machine::sim::{Machine, MachineConfig};
//! use move_machine::sim::device::BufferedConsole;
//!
//! let registry = Arc::new(Registry::standard().unwrap());
//! let program = Program::from_listing(&registry, "
//!     #20    -> alu.op
//!     #22    -> alu.add
//!     alu.result -> alu.print
//!     #0     -> sys.shutdown
//! ").unwrap();
//!
//! let machine = Machine::new(registry, MachineConfig { ram_size: 1024, ..Default::default() });
//! let console = BufferedConsole::new();
//! machine.set_console(Arc::new(console.clone()));
//! machine.copy_into_ram(0, &program.to_bytes()).unwrap();
//!
//! // single-stepping is compiled in, so the machine only runs once started:
//! machine.start().unwrap();
//! machine.execute().unwrap();
//! assert_eq!(console.values(), [42]);
//! ```
//!
//! ## Configuration
//!
//! All of the available settings can be found in [`MachineConfig`].
//!
//! ## Control
//!
//! When segments are compiled with single-stepping (the default),
//! every instruction is preceded by a suspension point ([`Machine::breakpoint`]).
//! A machine that is not running blocks the compute thread there
//! until another thread calls [`Machine::start`] or [`Machine::step`].
//!
//! - [`Machine::start`]: runs freely until [`Machine::stop`] or the end of the program.
//! - [`Machine::stop`]: the next suspension point blocks.
//! - [`Machine::step`]: lets exactly one suspension point through.
//!
//! While running, the machine also stops at any matching [`Breakpoint`].
//!
//! ## Self-modifying code
//!
//! While a segment executes, [`Machine::write_to_ram`] refuses to overwrite any of its
//! translated instructions ([`RuntimeTrap::SelfModifyingCode`]).
//! Slots that did not translate (data) can be written freely.
pub mod compile;
pub mod debug;
pub mod device;
pub mod mem;
pub mod observer;
pub mod segment;

use std::collections::{BTreeMap, HashSet};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Condvar, Mutex, MutexGuard, PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};

use crate::bus::io::IoModule;
use crate::bus::{Host, Registry};
use crate::err::{ListenerError, MachineError, RuntimeTrap};
use crate::isa::INSTR_SIZE;

use self::compile::{CompileOptions, SegmentCompiler};
use self::debug::Breakpoint;
use self::device::{Console, SharedPeripheral, StdoutConsole};
use self::mem::{Ram, RamInitStrategy};
use self::observer::{ExecutionListener, ListenerSet, MemoryListener};
use self::segment::{CodeMap, ExitReason, SegmentContext};

/// Default RAM size (8 MiB).
pub const DEFAULT_RAM_SIZE: usize = 8 << 20;

/// Configuration for a [`Machine`].
///
/// Read the field descriptions for more details.
#[derive(Debug, PartialEq, Eq, Clone, Copy)]
pub struct MachineConfig {
    /// Size of RAM, in bytes.
    ///
    /// By default, this is [`DEFAULT_RAM_SIZE`].
    pub ram_size: usize,

    /// Index of the instruction execution starts at.
    ///
    /// By default, this is `0`.
    pub entry: usize,

    /// How RAM is filled when the machine is created.
    ///
    /// By default, this is [`RamInitStrategy::default`] (all zeroes).
    pub ram_init: RamInitStrategy,

    /// Options for the segment compiler.
    ///
    /// By default, compilation is lenient (RAM holds data next to code) and single-steps.
    pub compile: CompileOptions,

    /// Size of the segments execution is split into, in bytes.
    ///
    /// - `None`: every call to [`Machine::execute`] compiles all of RAM as one segment.
    /// - `Some(n)`: the machine compiles the aligned `n`-byte window containing the
    ///   current instruction, and compiles another window whenever control leaves it.
    ///   `n` is rounded down to a multiple of 8 (and is at least 8).
    ///   Module state and the condition register carry over between windows.
    ///
    /// By default, this is `None`.
    pub segment_size: Option<u32>,
}
impl Default for MachineConfig {
    fn default() -> Self {
        Self {
            ram_size: DEFAULT_RAM_SIZE,
            entry: 0,
            ram_init: Default::default(),
            compile: CompileOptions { strict: false, single_step: true },
            segment_size: None,
        }
    }
}

#[derive(Debug, Default)]
struct RunState {
    running: bool,
    pc: u32,
    /// Set by `step`: one suspension point may pass while stopped.
    step_permit: bool,
}

/// Owns the RAM, listeners, and devices of a move machine, and executes its programs.
///
/// All methods take `&self`, so a machine can be shared (e.g., in an [`Arc`])
/// between the compute thread calling [`Machine::execute`]
/// and a controller thread calling [`Machine::start`], [`Machine::stop`], and [`Machine::step`].
pub struct Machine {
    registry: Arc<Registry>,
    config: MachineConfig,

    ram: RwLock<Ram>,
    memory_listeners: RwLock<ListenerSet<dyn MemoryListener>>,
    execution_listeners: RwLock<ListenerSet<dyn ExecutionListener>>,
    peripherals: Mutex<BTreeMap<u16, SharedPeripheral>>,
    console: RwLock<Arc<dyn Console>>,
    breakpoints: Mutex<HashSet<Breakpoint>>,

    state: Mutex<RunState>,
    wake: Condvar,
    executing: AtomicBool,
    /// Code map of the segment currently executing.
    live_code: RwLock<Option<CodeMap>>,
}
impl Machine where Machine: Send + Sync {}

fn read<T: ?Sized>(lock: &RwLock<T>) -> RwLockReadGuard<'_, T> {
    lock.read().unwrap_or_else(PoisonError::into_inner)
}
fn write<T: ?Sized>(lock: &RwLock<T>) -> RwLockWriteGuard<'_, T> {
    lock.write().unwrap_or_else(PoisonError::into_inner)
}
fn lock<T: ?Sized>(lock: &Mutex<T>) -> MutexGuard<'_, T> {
    lock.lock().unwrap_or_else(PoisonError::into_inner)
}

impl Machine {
    /// Creates a new machine with the given registry and configuration.
    pub fn new(registry: Arc<Registry>, config: MachineConfig) -> Self {
        Self {
            ram: RwLock::new(Ram::new(config.ram_size, &config.ram_init)),
            registry,
            config,

            memory_listeners: RwLock::new(ListenerSet::new()),
            execution_listeners: RwLock::new(ListenerSet::new()),
            peripherals: Default::default(),
            console: RwLock::new(Arc::new(StdoutConsole)),
            breakpoints: Default::default(),

            state: Default::default(),
            wake: Condvar::new(),
            executing: AtomicBool::new(false),
            live_code: RwLock::new(None),
        }
    }

    /// The registry ports are resolved against.
    pub fn registry(&self) -> &Arc<Registry> {
        &self.registry
    }

    /// The configuration this machine was created with.
    pub fn config(&self) -> &MachineConfig {
        &self.config
    }

    // ------------------ RAM ------------------

    /// Length of RAM in bytes.
    pub fn ram_len(&self) -> usize {
        read(&self.ram).len()
    }

    /// Reads the big-endian word at a byte offset.
    pub fn read_from_ram(&self, offset: u32) -> Result<u32, RuntimeTrap> {
        read(&self.ram).read_word(offset)
            .ok_or(RuntimeTrap::RamOutOfBounds { offset })
    }

    /// Copies `len` bytes of RAM, starting at a byte offset.
    pub fn read_segment_of_ram(&self, offset: u32, len: usize) -> Result<Vec<u8>, RuntimeTrap> {
        read(&self.ram).slice(offset, len)
            .map(<[u8]>::to_vec)
            .ok_or(RuntimeTrap::RamOutOfBounds { offset })
    }

    /// Writes the big-endian word at a byte offset.
    ///
    /// Every memory listener is notified (once, with the new value) before the store happens.
    ///
    /// # Errors
    /// Nothing is stored if:
    /// - the word does not lie inside RAM ([`RuntimeTrap::RamOutOfBounds`]),
    /// - the word overlaps an instruction of the executing segment ([`RuntimeTrap::SelfModifyingCode`]),
    /// - a listener fails ([`RuntimeTrap::Listener`]).
    pub fn write_to_ram(&self, offset: u32, value: u32) -> Result<(), RuntimeTrap> {
        self.check_store(offset, 4)?;

        let listeners = read(&self.memory_listeners).snapshot();
        for listener in listeners {
            listener.on_memory_write(self, offset, value)?;
        }

        write(&self.ram).write_word(offset, value)
            .ok_or(RuntimeTrap::RamOutOfBounds { offset })
    }

    /// Copies `data` into RAM, starting at a byte offset.
    ///
    /// This is how programs are loaded. It does not notify memory listeners.
    pub fn copy_into_ram(&self, offset: u32, data: &[u8]) -> Result<(), RuntimeTrap> {
        let len = u32::try_from(data.len()).map_err(|_| RuntimeTrap::RamOutOfBounds { offset })?;
        self.check_store(offset, len)?;

        write(&self.ram).copy_from(offset, data)
            .ok_or(RuntimeTrap::RamOutOfBounds { offset })
    }

    fn check_store(&self, offset: u32, len: u32) -> Result<(), RuntimeTrap> {
        if read(&self.ram).slice(offset, len as usize).is_none() {
            return Err(RuntimeTrap::RamOutOfBounds { offset });
        }
        match read(&self.live_code).as_ref().and_then(|code| code.overlaps(offset, len)) {
            Some(slot) => Err(RuntimeTrap::SelfModifyingCode { offset: slot }),
            None => Ok(()),
        }
    }

    // ------------------ LISTENERS & DEVICES ------------------

    /// Adds a memory listener. Returns false if this listener was already added.
    pub fn add_memory_listener(&self, listener: Arc<dyn MemoryListener>) -> bool {
        write(&self.memory_listeners).add(listener)
    }

    /// Removes a memory listener. Returns false if it was not present.
    pub fn remove_memory_listener(&self, listener: &Arc<dyn MemoryListener>) -> bool {
        write(&self.memory_listeners).remove(listener)
    }

    /// Adds an execution listener. Returns false if this listener was already added.
    pub fn add_execution_listener(&self, listener: Arc<dyn ExecutionListener>) -> bool {
        write(&self.execution_listeners).add(listener)
    }

    /// Removes an execution listener. Returns false if it was not present.
    pub fn remove_execution_listener(&self, listener: &Arc<dyn ExecutionListener>) -> bool {
        write(&self.execution_listeners).remove(listener)
    }

    /// Attaches a peripheral to an I/O port.
    ///
    /// The device becomes visible to the next segment that is compiled.
    ///
    /// # Errors
    /// If another device is attached to the port, the device is handed back.
    pub fn add_peripheral(&self, port: u16, device: SharedPeripheral) -> Result<(), SharedPeripheral> {
        use std::collections::btree_map::Entry;

        match lock(&self.peripherals).entry(port) {
            Entry::Vacant(e) => {
                e.insert(device);
                Ok(())
            },
            Entry::Occupied(_) => Err(device),
        }
    }

    /// Detaches the peripheral on an I/O port, returning it.
    pub fn remove_peripheral(&self, port: u16) -> Option<SharedPeripheral> {
        lock(&self.peripherals).remove(&port)
    }

    /// Wires every attached peripheral into a fresh I/O module.
    pub fn prepare_io_subsystem(&self, io: &mut IoModule) {
        for (&port, device) in lock(&self.peripherals).iter() {
            if io.add_device(port, Arc::clone(device)).is_err() {
                log::warn!("I/O module already had a device on port {port}");
            }
        }
    }

    /// Sets where `alu.print` output goes (by default, [`StdoutConsole`]).
    pub fn set_console(&self, console: Arc<dyn Console>) {
        *write(&self.console) = console;
    }

    /// Adds a breakpoint. Returns false if it was already present.
    pub fn add_breakpoint(&self, bp: Breakpoint) -> bool {
        lock(&self.breakpoints).insert(bp)
    }

    /// Removes a breakpoint. Returns false if it was not present.
    pub fn remove_breakpoint(&self, bp: &Breakpoint) -> bool {
        lock(&self.breakpoints).remove(bp)
    }

    /// Removes all breakpoints.
    pub fn clear_breakpoints(&self) {
        lock(&self.breakpoints).clear();
    }

    // ------------------ EXECUTION ------------------

    /// Executes the program in RAM, from the configured entry instruction until it halts.
    ///
    /// Every call compiles afresh; nothing is cached between calls.
    /// This blocks at suspension points while the machine is not running.
    ///
    /// # Errors
    /// - [`MachineError::Busy`] if another thread is executing on this machine.
    /// - [`MachineError::Compile`] if a segment fails to compile.
    /// - [`MachineError::Trap`] if execution traps, including a jump that leaves RAM.
    pub fn execute(&self) -> Result<(), MachineError> {
        if self.executing.swap(true, Ordering::AcqRel) {
            return Err(MachineError::Busy);
        }
        let _guard = ExecGuard(self);

        log::debug!("executing from instruction {}", self.config.entry);
        let result = match self.config.segment_size {
            None => self.execute_whole(),
            Some(size) => self.execute_windowed(size),
        };
        match &result {
            Ok(()) => log::debug!("execution completed"),
            Err(e) => log::debug!("execution failed: {e}"),
        }
        result
    }

    fn code_len(&self) -> u32 {
        let len = u32::try_from(self.ram_len()).unwrap_or(u32::MAX);
        len - len % INSTR_SIZE
    }

    fn compiler(&self) -> SegmentCompiler<'_> {
        SegmentCompiler::new(&self.registry, self.config.compile)
    }

    fn execute_whole(&self) -> Result<(), MachineError> {
        let end = self.code_len();
        let mut segment = self.compiler().compile(read(&self.ram).as_bytes(), 0..end)?;
        segment.bind(self);
        *write(&self.live_code) = Some(segment.code_map());

        match segment.run(self, self.config.entry)? {
            ExitReason::Completed => Ok(()),
            ExitReason::JumpedOutOfBounds(target) => Err(RuntimeTrap::JumpOutsideRam { target }.into()),
        }
    }

    fn execute_windowed(&self, size: u32) -> Result<(), MachineError> {
        let window = (size - size % INSTR_SIZE).max(INSTR_SIZE);
        let len = self.code_len();

        let mut offset = u32::try_from(self.config.entry)
            .ok()
            .and_then(|e| e.checked_mul(INSTR_SIZE))
            .ok_or(RuntimeTrap::EntryOutOfRange { index: self.config.entry })?;
        if offset >= len {
            return Err(RuntimeTrap::EntryOutOfRange { index: self.config.entry }.into());
        }

        let mut context = SegmentContext::new(&self.registry);
        context.bind(self);
        loop {
            let start = offset - offset % window;
            let end = start.saturating_add(window).min(len);
            let mut segment = self.compiler().compile_in(read(&self.ram).as_bytes(), start..end, context)?;
            *write(&self.live_code) = Some(segment.code_map());

            let index = ((offset - start) / INSTR_SIZE) as usize;
            match segment.run(self, index)? {
                ExitReason::Completed => return Ok(()),
                ExitReason::JumpedOutOfBounds(target) if target < len => {
                    log::trace!("leaving window {start:#X}..{end:#X} for {target:#X}");
                    offset = target;
                    context = segment.into_context();
                },
                ExitReason::JumpedOutOfBounds(target) => {
                    return Err(RuntimeTrap::JumpOutsideRam { target }.into());
                },
            }
        }
    }

    // ------------------ CONTROL ------------------

    /// Whether the machine is running (suspension points do not block).
    pub fn is_running(&self) -> bool {
        lock(&self.state).running
    }

    /// Offset of the last suspension point reached.
    pub fn program_counter(&self) -> u32 {
        lock(&self.state).pc
    }

    /// Starts the machine, waking a blocked compute thread.
    ///
    /// Execution listeners are notified of the status change.
    pub fn start(&self) -> Result<(), ListenerError> {
        {
            let mut state = lock(&self.state);
            state.running = true;
            state.step_permit = false;
        }
        log::debug!("machine started");
        self.wake.notify_all();
        self.notify_status()
    }

    /// Stops the machine. The next suspension point blocks.
    ///
    /// Execution listeners are notified of the status change.
    /// This does not wake anything.
    pub fn stop(&self) -> Result<(), ListenerError> {
        {
            let mut state = lock(&self.state);
            state.running = false;
            state.step_permit = false;
        }
        log::debug!("machine stopped");
        self.notify_status()
    }

    /// Lets exactly one suspension point pass without changing the running state.
    ///
    /// If the compute thread is blocked, it is woken and runs until the next suspension point.
    /// Otherwise, the next suspension point it reaches passes.
    /// Repeated calls before that do not accumulate.
    pub fn step(&self) {
        lock(&self.state).step_permit = true;
        self.wake.notify_all();
    }

    /// A suspension point at the instruction at `offset`.
    ///
    /// This records the program counter and notifies execution listeners.
    /// Then, if the machine is running and a [`Breakpoint`] matches, the machine stops.
    /// If the machine is not running, this blocks until [`Machine::start`] or [`Machine::step`].
    ///
    /// There is no timeout: a stopped machine waits indefinitely.
    pub fn breakpoint(&self, offset: u32) -> Result<(), ListenerError> {
        lock(&self.state).pc = offset;
        log::trace!("suspension point at {offset:#X}");

        let listeners = read(&self.execution_listeners).snapshot();
        for listener in listeners {
            listener.on_program_counter_changed(self)?;
        }

        if self.is_running() && self.hits_breakpoint(offset) {
            log::debug!("breakpoint hit at {offset:#X}");
            self.stop()?;
        }

        let mut state = lock(&self.state);
        while !state.running && !state.step_permit {
            state = self.wake.wait(state).unwrap_or_else(PoisonError::into_inner);
        }
        state.step_permit = false;
        Ok(())
    }

    fn hits_breakpoint(&self, offset: u32) -> bool {
        let breakpoints = lock(&self.breakpoints);
        if breakpoints.is_empty() {
            return false;
        }

        let ram = read(&self.ram);
        breakpoints.iter().any(|bp| bp.check(offset, &ram))
    }

    fn notify_status(&self) -> Result<(), ListenerError> {
        let listeners = read(&self.execution_listeners).snapshot();
        for listener in listeners {
            listener.on_execution_status_changed(self)?;
        }
        Ok(())
    }
}
impl std::fmt::Debug for Machine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Machine")
            .field("config", &self.config)
            .field("state", &*lock(&self.state))
            .field("executing", &self.executing.load(Ordering::Relaxed))
            .finish_non_exhaustive()
    }
}

impl Host for Machine {
    fn read_from_ram(&self, offset: u32) -> Result<u32, RuntimeTrap> {
        Machine::read_from_ram(self, offset)
    }

    fn write_to_ram(&self, offset: u32, value: u32) -> Result<(), RuntimeTrap> {
        Machine::write_to_ram(self, offset, value)
    }

    fn breakpoint(&self, offset: u32) -> Result<(), RuntimeTrap> {
        Ok(Machine::breakpoint(self, offset)?)
    }

    fn print(&self, value: u32) {
        let console = Arc::clone(&read(&self.console));
        console.print(value);
    }

    fn prepare_io_subsystem(&self, io: &mut IoModule) {
        Machine::prepare_io_subsystem(self, io)
    }
}

/// Clears the execution state of a machine when execution ends, however it ends.
struct ExecGuard<'m>(&'m Machine);
impl Drop for ExecGuard<'_> {
    fn drop(&mut self) {
        *write(&self.0.live_code) = None;
        self.0.executing.store(false, Ordering::Release);
    }
}

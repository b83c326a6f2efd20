//! Compiled segments, the executable form of a range of RAM.
//!
//! A [`CompiledSegment`] is produced by the [`SegmentCompiler`] and owns:
//! - its bounds `[start, end)` in RAM,
//! - the dense entry table mapping every instruction index to its first op,
//! - the ops themselves, with every intra-segment jump already resolved,
//! - the [`SegmentContext`]: one instance of every dispatched module, shared by all of its
//!   instructions, and the condition register.
//!
//! A context outlives its segment ([`CompiledSegment::into_context`]),
//! so a program executed across several segments keeps its module state.
//!
//! Running a segment never scans or recompiles:
//! a jump inside the bounds continues at a pre-resolved op,
//! and a jump outside the bounds ends the run with [`ExitReason::JumpedOutOfBounds`].
//!
//! [`SegmentCompiler`]: super::compile::SegmentCompiler
use crate::bus::{Bus, Direction, Host, Module, ModuleKind, PortEffect, Registry};
use crate::err::{CompileError, RuntimeTrap};
use crate::isa::{PortAddr, INSTR_SIZE};

/// Why a run of a segment ended.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Debug)]
pub enum ExitReason {
    /// The program halted (`sys.shutdown`).
    Completed,
    /// Control left the segment, either by a jump or by running past its end.
    ///
    /// This holds the absolute RAM offset execution should continue at.
    JumpedOutOfBounds(u32),
}

/// Where a value comes from.
#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub(super) enum Load {
    Const(u32),
    Cell { slot: u8, cell: u16 },
    Call { slot: u8, key: u16, addr: PortAddr },
}

/// Where a value goes.
#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub(super) enum Store {
    Cell { slot: u8, cell: u16 },
    Call { slot: u8, key: u16, addr: PortAddr },
}

/// Which test a conditional control operation performs.
#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub(super) enum Test {
    NonNeg,
    Zero,
}

/// A resolved jump target.
#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub(super) enum Target {
    /// Op index inside this segment.
    Local(usize),
    /// Absolute offset outside this segment.
    Escape(u32),
}

/// Why an instruction has no translation.
///
/// This is kept small, since RAM that holds no code compiles to one trap per slot.
#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub(super) enum Untranslated {
    Unresolved { word: u32, direction: Direction },
    DynamicJump,
    MisalignedJump { target: u32 },
}
impl Untranslated {
    /// The compile error for an instruction at `offset`.
    pub(super) fn at(self, offset: u32) -> CompileError {
        match self {
            Untranslated::Unresolved { word, direction } => CompileError::UnresolvedPort { offset, word, direction },
            Untranslated::DynamicJump => CompileError::DynamicJump { offset },
            Untranslated::MisalignedJump { target } => CompileError::MisalignedJump { offset, target },
        }
    }
}

#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub(super) enum Op {
    /// Suspension point before the instruction at `offset`.
    Suspend { offset: u32 },
    Move { offset: u32, load: Load, store: Store },
    Test { offset: u32, load: Load, test: Test },
    Branch { target: Target },
    /// An instruction with no translation.
    /// The bytes are what the instruction held at compile time.
    Trap { offset: u32, cause: Untranslated, bytes: [u8; 8] },
}

/// Result of executing one op.
enum Flow {
    Continue,
    JumpTo(Target),
    Halt,
}

/// Which instruction slots of a segment were translated into executable ops.
///
/// While a segment is live, the machine refuses stores into translated slots.
/// Slots translated as traps are data as far as the segment is concerned.
#[derive(Clone, PartialEq, Eq, Debug)]
pub struct CodeMap {
    start: u32,
    translated: Vec<bool>,
}
impl CodeMap {
    /// Offset of the first translated instruction overlapping `[offset, offset + len)`, if any.
    pub fn overlaps(&self, offset: u32, len: u32) -> Option<u32> {
        let end = u64::from(offset) + u64::from(len);
        let first = offset.saturating_sub(self.start) / INSTR_SIZE;
        let first = usize::try_from(first).ok()?;

        self.translated.iter()
            .enumerate()
            .skip(first)
            .map(|(i, &t)| (u64::from(self.start) + i as u64 * u64::from(INSTR_SIZE), t))
            .take_while(|&(slot, _)| slot < end)
            .find(|&(slot, t)| t && slot + u64::from(INSTR_SIZE) > u64::from(offset))
            .map(|(slot, _)| slot as u32)
    }

    /// Whether the instruction slot at this offset was translated.
    pub fn is_translated(&self, offset: u32) -> bool {
        offset.checked_sub(self.start)
            .filter(|d| d % INSTR_SIZE == 0)
            .and_then(|d| self.translated.get((d / INSTR_SIZE) as usize))
            .copied()
            .unwrap_or(false)
    }
}

/// The state an execution carries from one segment to the next:
/// an instance of every dispatched module, and the condition register.
pub struct SegmentContext {
    /// Index into `modules`, by module id.
    slots: [Option<u8>; 256],
    modules: Vec<Box<dyn Module>>,
    /// Condition register, consumed by the next `jmp.branch`.
    cond: bool,
}
impl SegmentContext {
    /// Creates a fresh instance of every dispatched module of the registry.
    ///
    /// The condition register starts set ("taken").
    pub fn new(registry: &Registry) -> Self {
        let mut slots = [None; 256];
        let mut modules: Vec<Box<dyn Module>> = vec![];
        for decl in registry.modules() {
            if let ModuleKind::Dispatched(create) = decl.kind {
                if let Ok(slot) = u8::try_from(modules.len()) {
                    slots[usize::from(decl.id)] = Some(slot);
                    modules.push(create());
                }
            }
        }
        Self { slots, modules, cond: true }
    }

    /// The slot of a module's instance, or `None` if the module has no instance.
    pub(super) fn slot(&self, id: u8) -> Option<u8> {
        self.slots[usize::from(id)]
    }

    /// Binds every module instance to a host.
    ///
    /// This must be called once before the context first runs on that host
    /// (it is how the I/O module receives its devices).
    pub fn bind(&mut self, host: &dyn Host) {
        for module in &mut self.modules {
            module.attach(host);
        }
    }
}
impl std::fmt::Debug for SegmentContext {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SegmentContext")
            .field("modules", &self.modules.len())
            .field("cond", &self.cond)
            .finish()
    }
}

/// The executable translation of `[start, end)`.
pub struct CompiledSegment {
    pub(super) start: u32,
    pub(super) end: u32,
    /// First op of every instruction, by instruction index.
    pub(super) entries: Vec<usize>,
    pub(super) ops: Vec<Op>,
    pub(super) context: SegmentContext,
}

impl CompiledSegment {
    /// Start offset (inclusive).
    pub fn start(&self) -> u32 {
        self.start
    }

    /// End offset (exclusive).
    pub fn end(&self) -> u32 {
        self.end
    }

    /// Number of instructions in the segment.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether the segment holds no instructions.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Whether `offset` lies inside the segment's bounds.
    pub fn contains(&self, offset: u32) -> bool {
        (self.start..self.end).contains(&offset)
    }

    /// The instruction index of an offset, if it is an aligned offset inside the segment.
    pub fn index_of(&self, offset: u32) -> Option<usize> {
        let delta = offset.checked_sub(self.start)?;
        match self.contains(offset) && delta % INSTR_SIZE == 0 {
            true  => usize::try_from(delta / INSTR_SIZE).ok(),
            false => None,
        }
    }

    /// The slots of this segment that hold translated instructions.
    pub fn code_map(&self) -> CodeMap {
        let mut translated = vec![true; self.entries.len()];
        for op in &self.ops {
            if let Op::Trap { offset, .. } = op {
                if let Some(i) = self.index_of(*offset) {
                    translated[i] = false;
                }
            }
        }
        CodeMap { start: self.start, translated }
    }

    /// Binds the segment's module instances to a host (see [`SegmentContext::bind`]).
    ///
    /// A segment compiled into an already bound context must not be bound again.
    pub fn bind(&mut self, host: &dyn Host) {
        self.context.bind(host);
    }

    /// Releases the module instances and condition register,
    /// so the next segment of the same execution can be compiled into them.
    pub fn into_context(self) -> SegmentContext {
        self.context
    }

    /// Runs the segment from the instruction with the given index.
    ///
    /// This runs until the program halts or control leaves the segment.
    /// The condition register is not reset, so a test made before control
    /// entered this segment still gates its first `jmp.branch`.
    ///
    /// # Errors
    /// Any trap ends the run. Module state is kept, so the segment can be inspected,
    /// but the program is not resumable from the trapping instruction.
    pub fn run(&mut self, host: &dyn Host, entry: usize) -> Result<ExitReason, RuntimeTrap> {
        let mut pc = *self.entries.get(entry)
            .ok_or(RuntimeTrap::EntryOutOfRange { index: entry })?;
        let (start, end) = (self.start, self.end);
        log::trace!("entering segment {start:#X}..{end:#X} at instruction {entry}");

        let Self { ops, context, .. } = self;
        let SegmentContext { modules, cond, .. } = context;

        while let Some(op) = ops.get(pc) {
            match exec(op, modules, cond, host)? {
                Flow::Continue => pc += 1,
                Flow::JumpTo(Target::Local(i)) => pc = i,
                Flow::JumpTo(Target::Escape(target)) => {
                    log::trace!("segment {start:#X}..{end:#X} jumped out to {target:#X}");
                    return Ok(ExitReason::JumpedOutOfBounds(target));
                },
                Flow::Halt => {
                    log::trace!("segment {start:#X}..{end:#X} halted");
                    return Ok(ExitReason::Completed);
                },
            }
        }

        log::trace!("segment {start:#X}..{end:#X} ran off its end");
        Ok(ExitReason::JumpedOutOfBounds(end))
    }
}
impl std::fmt::Debug for CompiledSegment {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CompiledSegment")
            .field("start", &self.start)
            .field("end", &self.end)
            .field("entries", &self.entries)
            .field("ops", &self.ops)
            .field("context", &self.context)
            .finish()
    }
}

fn load(src: Load, modules: &mut [Box<dyn Module>], host: &dyn Host, offset: u32) -> Result<u32, RuntimeTrap> {
    match src {
        Load::Const(k) => Ok(k),
        Load::Cell { slot, cell } => Ok({
            modules[usize::from(slot)].cells()
                .get(usize::from(cell))
                .copied()
                .unwrap_or(0)
        }),
        Load::Call { slot, key, addr } => modules[usize::from(slot)].read(key, &Bus { host, offset, addr }),
    }
}

fn exec(op: &Op, modules: &mut [Box<dyn Module>], cond: &mut bool, host: &dyn Host) -> Result<Flow, RuntimeTrap> {
    match *op {
        Op::Suspend { offset } => {
            host.breakpoint(offset)?;
            Ok(Flow::Continue)
        },
        Op::Move { offset, load: src, store } => {
            let value = load(src, modules, host, offset)?;
            match store {
                Store::Cell { slot, cell } => {
                    if let Some(c) = modules[usize::from(slot)].cells().get_mut(usize::from(cell)) {
                        *c = value;
                    }
                    Ok(Flow::Continue)
                },
                Store::Call { slot, key, addr } => match modules[usize::from(slot)].write(key, value, &Bus { host, offset, addr })? {
                    PortEffect::Continue => Ok(Flow::Continue),
                    PortEffect::Halt => Ok(Flow::Halt),
                },
            }
        },
        Op::Test { offset, load: src, test } => {
            let value = load(src, modules, host, offset)?;
            *cond = match test {
                Test::NonNeg => value as i32 >= 0,
                Test::Zero   => value == 0,
            };
            Ok(Flow::Continue)
        },
        Op::Branch { target } => {
            let taken = std::mem::replace(cond, true);
            match taken {
                true  => Ok(Flow::JumpTo(target)),
                false => Ok(Flow::Continue),
            }
        },
        Op::Trap { offset, cause, bytes } => {
            let current = [host.read_from_ram(offset)?, host.read_from_ram(offset + 4)?];
            let [s0, s1, s2, s3, d0, d1, d2, d3] = bytes;
            let compiled = [u32::from_be_bytes([s0, s1, s2, s3]), u32::from_be_bytes([d0, d1, d2, d3])];

            log::warn!("reached untranslated instruction at {offset:#X}");
            match current == compiled {
                true  => Err(RuntimeTrap::Untranslated(cause.at(offset))),
                false => Err(RuntimeTrap::SelfModifyingCode { offset }),
            }
        },
    }
}

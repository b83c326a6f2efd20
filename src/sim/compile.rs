//! The segment compiler.
//!
//! [`SegmentCompiler::compile`] translates a range of RAM into a [`CompiledSegment`] in two passes:
//! 1. **Layout**: classify every instruction of the range and record,
//!    for every instruction index, the op its translation begins at.
//! 2. **Emission**: emit the ops, resolving every jump target against the layout.
//!
//! A jump target inside the range becomes a direct op index.
//! A jump target outside the range becomes an escape, which ends the run
//! and hands the absolute target back to the caller.
//!
//! Every segment runs against a [`SegmentContext`]. [`SegmentCompiler::compile`] creates a fresh one;
//! [`SegmentCompiler::compile_in`] reuses the context of a previous segment of the same execution.
//!
//! ```
//! use move_machine::bus::Registry;
//! use move_machine::sim::compile::{CompileOptions, SegmentCompiler};
//!
//! let registry = Registry::standard().unwrap();
//! let mut ram = vec![0; 16];
//! // #8 -> jmp.branch
//! ram[..8].copy_from_slice(&[0x11, 0, 0, 8, 0x90, 0, 0, 0]);
//! // alu.result -> sys.shutdown
//! ram[8..].copy_from_slice(&[0x02, 0xA0, 0, 1, 0x01, 0, 0, 0]);
//!
//! let segment = SegmentCompiler::new(&registry, CompileOptions::default())
//!     .compile(&ram, 0..16)
//!     .unwrap();
//! assert_eq!(segment.len(), 2);
//! ```
use std::ops::Range;

use crate::bus::{Accessor, Direction, PortDescriptor, Registry};
use crate::err::CompileError;
use crate::isa::{fetch_words, ControlOp, Destination, Instr, PortAddr, Source, INSTR_SIZE};

use super::segment::{CompiledSegment, Load, Op, SegmentContext, Store, Target, Test, Untranslated};

/// Options for the segment compiler.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct CompileOptions {
    /// Whether instructions with no translation fail compilation.
    ///
    /// If false, such instructions compile into a trap,
    /// which raises [`RuntimeTrap::Untranslated`] only once execution reaches it.
    /// This is needed to compile ranges that mix code and data.
    ///
    /// [`RuntimeTrap::Untranslated`]: crate::err::RuntimeTrap::Untranslated
    pub strict: bool,

    /// Whether a suspension point is emitted before every instruction.
    pub single_step: bool,
}
impl Default for CompileOptions {
    fn default() -> Self {
        Self { strict: true, single_step: true }
    }
}

/// How one instruction translates, before jump targets are resolved.
enum Shape {
    Move(Load, Store),
    Test(Load, Test),
    Branch(u32),
    Trap(Untranslated),
}

/// Translates ranges of RAM into [`CompiledSegment`]s.
#[derive(Debug, Clone, Copy)]
pub struct SegmentCompiler<'r> {
    registry: &'r Registry,
    options: CompileOptions,
}

impl<'r> SegmentCompiler<'r> {
    /// Creates a compiler resolving ports against the given registry.
    pub fn new(registry: &'r Registry, options: CompileOptions) -> Self {
        Self { registry, options }
    }

    /// The options this compiler was created with.
    pub fn options(&self) -> CompileOptions {
        self.options
    }

    /// Compiles `range` of `ram` into a segment with fresh module instances.
    ///
    /// The range must be instruction-aligned and lie inside `ram`.
    ///
    /// # Errors
    /// - [`CompileError::InvalidRange`] if the range is reversed, unaligned, or exceeds `ram`.
    /// - In strict mode, the first instruction with no translation
    ///   (unresolved port, dynamic jump, or misaligned jump).
    pub fn compile(&self, ram: &[u8], range: Range<u32>) -> Result<CompiledSegment, CompileError> {
        self.compile_in(ram, range, SegmentContext::new(self.registry))
    }

    /// Compiles `range` of `ram` into a segment that runs against an existing context.
    ///
    /// The context must have been created from this compiler's registry.
    /// Module state and the condition register carry over from whatever ran in it before.
    ///
    /// # Errors
    /// See [`SegmentCompiler::compile`].
    pub fn compile_in(&self, ram: &[u8], range: Range<u32>, context: SegmentContext) -> Result<CompiledSegment, CompileError> {
        let Range { start, end } = range;
        let valid = start <= end
            && start % INSTR_SIZE == 0
            && (end - start) % INSTR_SIZE == 0
            && usize::try_from(end).is_ok_and(|e| e <= ram.len());
        if !valid {
            return Err(CompileError::InvalidRange { start, end, len: ram.len() });
        }

        // Layout pass:
        let step_ops = usize::from(self.options.single_step);
        let count = ((end - start) / INSTR_SIZE) as usize;
        let mut shapes = Vec::with_capacity(count);
        let mut entries = Vec::with_capacity(count);
        let mut n_ops = 0;
        for offset in (start..end).step_by(INSTR_SIZE as usize) {
            let shape = match fetch_words(ram, offset) {
                Some((src, dst)) => self.classify(&context, Instr::decode_words(src, dst)),
                None => return Err(CompileError::InvalidRange { start, end, len: ram.len() }),
            };
            let shape = match shape {
                Shape::Trap(cause) if self.options.strict => return Err(cause.at(offset)),
                s => s,
            };

            entries.push(n_ops);
            n_ops += step_ops + 1;
            shapes.push((offset, shape));
        }

        // Emission pass:
        let resolve = |target: u32| match (start..end).contains(&target) {
            true  => Target::Local(entries[((target - start) / INSTR_SIZE) as usize]),
            false => Target::Escape(target),
        };

        let mut ops = Vec::with_capacity(n_ops);
        let mut traps = 0;
        for (offset, shape) in shapes {
            if self.options.single_step {
                ops.push(Op::Suspend { offset });
            }
            ops.push(match shape {
                Shape::Move(load, store) => Op::Move { offset, load, store },
                Shape::Test(load, test)  => Op::Test { offset, load, test },
                Shape::Branch(target)    => Op::Branch { target: resolve(target) },
                Shape::Trap(cause) => {
                    traps += 1;
                    Op::Trap { offset, cause, bytes: read_bytes(ram, offset) }
                },
            });
        }

        log::debug!(
            "compiled {start:#X}..{end:#X}: {} instructions, {} ops, {traps} untranslated",
            entries.len(), ops.len()
        );
        Ok(CompiledSegment { start, end, entries, ops, context })
    }

    fn classify(&self, context: &SegmentContext, instr: Instr) -> Shape {
        let load = match instr.source {
            Source::Literal(k) => Ok(Load::Const(k)),
            Source::Port(addr) => self.resolve(context, addr, Direction::Read)
                .map(|(slot, accessor)| match accessor {
                    Accessor::Cell(cell)  => Load::Cell { slot, cell },
                    Accessor::Handler(key) => Load::Call { slot, key, addr },
                }),
        };

        let shape = match instr.dest {
            Destination::Control(ControlOp::Branch) => match instr.source {
                Source::Literal(k) if k % INSTR_SIZE != 0 => Err(Untranslated::MisalignedJump { target: k }),
                Source::Literal(k) => Ok(Shape::Branch(k)),
                Source::Port(_) => Err(Untranslated::DynamicJump),
            },
            Destination::Control(ControlOp::BranchIfNonNeg) => load.map(|l| Shape::Test(l, Test::NonNeg)),
            Destination::Control(ControlOp::BranchIfZero)   => load.map(|l| Shape::Test(l, Test::Zero)),
            Destination::Port(addr) => load.and_then(|l| {
                let (slot, accessor) = self.resolve(context, addr, Direction::Write)?;
                let store = match accessor {
                    Accessor::Cell(cell)  => Store::Cell { slot, cell },
                    Accessor::Handler(key) => Store::Call { slot, key, addr },
                };
                Ok(Shape::Move(l, store))
            }),
        };

        shape.unwrap_or_else(Shape::Trap)
    }

    fn resolve(&self, context: &SegmentContext, addr: PortAddr, direction: Direction) -> Result<(u8, Accessor), Untranslated> {
        let unresolved = Untranslated::Unresolved { word: addr.word(), direction };

        let port: &PortDescriptor = self.registry.lookup_by_address(addr.word(), direction)
            .ok_or(unresolved)?;
        // Inline modules have no instance to dispatch to.
        let slot = context.slot(port.module_id()).ok_or(unresolved)?;
        Ok((slot, port.accessor()))
    }
}

fn read_bytes(ram: &[u8], offset: u32) -> [u8; 8] {
    let mut out = [0; 8];
    if let Some((src, dst)) = fetch_words(ram, offset) {
        out[..4].copy_from_slice(&src.to_be_bytes());
        out[4..].copy_from_slice(&dst.to_be_bytes());
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bus::testing::TestHost;
    use crate::err::RuntimeTrap;
    use crate::sim::segment::ExitReason;

    const ALU_OP: u32 = 0x02A0_0000;
    const ALU_RESULT: u32 = 0x02A0_0001;
    const ALU_SUB: u32 = 0x0200_0012;
    const ALU_PRINT: u32 = 0x0200_0011;
    const SHUTDOWN: u32 = 0x0100_0000;
    const BRANCH: u32 = 0x9000_0000;
    const NONNEG: u32 = 0x9000_0001;
    const ZERO: u32 = 0x9000_0002;

    fn lit(k: u32) -> u32 {
        0x1100_0000 | k
    }
    fn program(instrs: &[(u32, u32)]) -> Vec<u8> {
        instrs.iter()
            .flat_map(|&(s, d)| Instr::decode_words(s, d).encode())
            .collect()
    }
    fn compile(reg: &Registry, ram: &[u8], options: CompileOptions) -> Result<CompiledSegment, CompileError> {
        SegmentCompiler::new(reg, options).compile(ram, 0..ram.len() as u32)
    }
    fn fast() -> CompileOptions {
        CompileOptions { strict: true, single_step: false }
    }

    #[test]
    fn test_literal_through_alu() {
        let reg = Registry::standard().unwrap();
        for k in [0, 1, 42, 0x7F_FFFF, 0x80_0000, 0xFF_FFFF] {
            let ram = program(&[
                (lit(k), ALU_OP),
                (ALU_OP, ALU_RESULT),
                (ALU_RESULT, ALU_PRINT),
                (lit(0), SHUTDOWN),
            ]);
            let host = TestHost::new(ram.clone());
            let mut seg = compile(&reg, &ram, fast()).unwrap();
            seg.bind(&host);
            assert_eq!(seg.run(&host, 0).unwrap(), ExitReason::Completed);
            assert_eq!(host.printed(), [k]);
        }
    }

    #[test]
    fn test_countdown() {
        let reg = Registry::standard().unwrap();
        let ram = program(&[
            (lit(10), ALU_OP),
            (lit(1), ALU_SUB),
            (ALU_RESULT, ALU_OP),
            (ALU_RESULT, NONNEG),
            (ALU_RESULT, ALU_PRINT),
            (lit(8), BRANCH),
            (ALU_RESULT, SHUTDOWN),
        ]);
        let host = TestHost::new(ram.clone());
        let mut seg = compile(&reg, &ram, CompileOptions::default()).unwrap();
        seg.bind(&host);

        assert_eq!(seg.run(&host, 0).unwrap(), ExitReason::Completed);
        let printed = host.printed();
        assert_eq!(printed, [9, 8, 7, 6, 5, 4, 3, 2, 1, 0, u32::MAX]);
        assert_eq!(printed.iter().filter(|&&v| v == 9).count(), 1);

        // single-step suspends before every executed instruction
        let stops = host.stops();
        assert_eq!(&stops[..6], [0, 8, 16, 24, 32, 40]);
        assert_eq!(stops[6], 8);
        assert_eq!(stops.last(), Some(&48));
    }

    #[test]
    fn test_zero_branch() {
        let reg = Registry::standard().unwrap();
        let ram = program(&[
            (lit(0), ZERO),
            (lit(24), BRANCH),
            (lit(1), ALU_PRINT),
            (lit(2), ALU_PRINT),
            (lit(5), ZERO),
            (lit(48), BRANCH),
            (lit(3), ALU_PRINT),
            (lit(0), SHUTDOWN),
        ]);
        let host = TestHost::new(ram.clone());
        let mut seg = compile(&reg, &ram, fast()).unwrap();
        assert_eq!(seg.run(&host, 0).unwrap(), ExitReason::Completed);
        assert_eq!(host.printed(), [2, 3]);
    }

    #[test]
    fn test_unconditional_branch_without_test() {
        let reg = Registry::standard().unwrap();
        let ram = program(&[
            (lit(16), BRANCH),
            (lit(1), ALU_PRINT),
            (lit(2), ALU_PRINT),
            (lit(0), SHUTDOWN),
        ]);
        let host = TestHost::new(ram.clone());
        let mut seg = compile(&reg, &ram, fast()).unwrap();
        assert_eq!(seg.run(&host, 0).unwrap(), ExitReason::Completed);
        assert_eq!(host.printed(), [2]);
    }

    #[test]
    fn test_jump_containment() {
        let reg = Registry::standard().unwrap();
        let ram = program(&[
            (lit(1), ALU_PRINT),
            (lit(0x100), BRANCH),
            (lit(0), SHUTDOWN),
        ]);
        let host = TestHost::new(ram.clone());

        let mut seg = compile(&reg, &ram, fast()).unwrap();
        assert_eq!(seg.run(&host, 0).unwrap(), ExitReason::JumpedOutOfBounds(0x100));

        // entering past the jump finishes inside the segment
        assert_eq!(seg.run(&host, 2).unwrap(), ExitReason::Completed);

        // running off the end reports the end
        let ram = program(&[(lit(1), ALU_PRINT)]);
        let mut seg = compile(&reg, &ram, fast()).unwrap();
        assert_eq!(seg.run(&host, 0).unwrap(), ExitReason::JumpedOutOfBounds(8));

        // a jump to the end is outside
        let ram = program(&[(lit(8), BRANCH)]);
        let mut seg = compile(&reg, &ram, fast()).unwrap();
        assert_eq!(seg.run(&host, 0).unwrap(), ExitReason::JumpedOutOfBounds(8));
    }

    #[test]
    fn test_subrange() {
        let reg = Registry::standard().unwrap();
        let ram = program(&[
            (lit(1), ALU_PRINT),
            (lit(2), ALU_PRINT),
            (lit(0), BRANCH),
            (lit(3), ALU_PRINT),
        ]);
        let host = TestHost::new(ram.clone());
        let mut seg = SegmentCompiler::new(&reg, fast()).compile(&ram, 8..24).unwrap();
        assert_eq!(seg.len(), 2);
        assert_eq!(seg.index_of(16), Some(1));
        assert_eq!(seg.index_of(0), None);

        assert_eq!(seg.run(&host, 0).unwrap(), ExitReason::JumpedOutOfBounds(0));
        assert_eq!(host.printed(), [2]);
        assert!(matches!(seg.run(&host, 2), Err(RuntimeTrap::EntryOutOfRange { index: 2 })));
    }

    #[test]
    fn test_invalid_ranges() {
        let reg = Registry::standard().unwrap();
        let ram = vec![0; 32];
        let compiler = SegmentCompiler::new(&reg, fast());

        for range in [8..0, 4..16, 0..12, 0..40] {
            assert!(matches!(compiler.compile(&ram, range), Err(CompileError::InvalidRange { .. })));
        }
        assert!(compiler.compile(&ram, 16..16).unwrap().is_empty());
    }

    #[test]
    fn test_strict_errors() {
        let reg = Registry::standard().unwrap();

        let ram = program(&[(lit(1), ALU_PRINT), (0x7700_0001, ALU_OP)]);
        assert_eq!(
            compile(&reg, &ram, fast()).unwrap_err(),
            CompileError::UnresolvedPort { offset: 8, word: 0x7700_0001, direction: Direction::Read }
        );

        // add is write-only
        let ram = program(&[(0x0200_0010, ALU_OP)]);
        assert!(matches!(
            compile(&reg, &ram, fast()),
            Err(CompileError::UnresolvedPort { direction: Direction::Read, .. })
        ));

        // jmp ports other than the control words are unregistered
        let ram = program(&[(lit(0), 0x9000_0003)]);
        assert!(matches!(
            compile(&reg, &ram, fast()),
            Err(CompileError::UnresolvedPort { direction: Direction::Write, .. })
        ));

        let ram = program(&[(ALU_RESULT, BRANCH)]);
        assert_eq!(compile(&reg, &ram, fast()).unwrap_err(), CompileError::DynamicJump { offset: 0 });

        let ram = program(&[(lit(12), BRANCH)]);
        assert_eq!(compile(&reg, &ram, fast()).unwrap_err(), CompileError::MisalignedJump { offset: 0, target: 12 });
    }

    #[test]
    fn test_deferred_traps() {
        let reg = Registry::standard().unwrap();
        let lenient = CompileOptions { strict: false, single_step: false };

        let ram = program(&[
            (lit(1), ALU_PRINT),
            (lit(24), BRANCH),
            (0xDEAD_BEEF, 0xDEAD_BEEF),
            (lit(2), ALU_PRINT),
            (0xDEAD_BEEF, 0xDEAD_BEEF),
        ]);
        let host = TestHost::new(ram.clone());
        let mut seg = compile(&reg, &ram, lenient).unwrap();

        let map = seg.code_map();
        assert!(map.is_translated(0));
        assert!(!map.is_translated(16));
        assert!(!map.is_translated(32));

        // data at 16 is skipped; data at 32 is reached
        let err = seg.run(&host, 0).unwrap_err();
        assert!(matches!(
            err,
            RuntimeTrap::Untranslated(CompileError::UnresolvedPort { offset: 32, .. })
        ));
        assert_eq!(host.printed(), [1, 2]);

        // modified after compile
        host.ram.borrow_mut()[32..40].copy_from_slice(&Instr::decode_words(lit(0), SHUTDOWN).encode());
        assert!(matches!(seg.run(&host, 4), Err(RuntimeTrap::SelfModifyingCode { offset: 32 })));
    }

    #[test]
    fn test_context_carries_between_segments() {
        let reg = Registry::standard().unwrap();
        let ram = program(&[
            (lit(10), ALU_OP),
            (lit(1), ALU_SUB),
            (lit(5), ZERO),
            (ALU_RESULT, ALU_PRINT),
            (lit(0), BRANCH),
            (lit(0), SHUTDOWN),
        ]);
        let host = TestHost::new(ram.clone());
        let compiler = SegmentCompiler::new(&reg, fast());

        let mut first = compiler.compile(&ram, 0..24).unwrap();
        assert_eq!(first.run(&host, 0).unwrap(), ExitReason::JumpedOutOfBounds(24));

        // alu.result and the failed zero test both survive into the next segment
        let mut second = compiler.compile_in(&ram, 24..48, first.into_context()).unwrap();
        assert_eq!(second.run(&host, 0).unwrap(), ExitReason::Completed);
        assert_eq!(host.printed(), [9]);

        // a fresh context has neither
        let mut fresh = compiler.compile(&ram, 24..48).unwrap();
        assert_eq!(fresh.run(&host, 0).unwrap(), ExitReason::JumpedOutOfBounds(0));
        assert_eq!(host.printed(), [9, 0]);
    }

    #[test]
    fn test_mem_and_cells_are_shared() {
        let reg = Registry::standard().unwrap();
        let ram = program(&[
            (lit(56), 0x1300_0001),      // mem.ptr
            (lit(0xABC), 0x1300_0004),   // mem.write
            (lit(0), 0x1300_0005),       // mem.value
            (lit(56), 0x1300_0003),      // mem.read
            (0x1300_0005, ALU_PRINT),
            (0x1300_0001, ALU_PRINT),
            (lit(0), SHUTDOWN),
            (0, 0),
        ]);
        let host = TestHost::new(ram.clone());
        let mut seg = compile(&reg, &ram[..56], fast()).unwrap();
        assert_eq!(seg.run(&host, 0).unwrap(), ExitReason::Completed);
        assert_eq!(host.printed(), [0xABC, 56]);
        assert_eq!(host.ram.borrow()[56..60], [0, 0, 0x0A, 0xBC]);
    }
}

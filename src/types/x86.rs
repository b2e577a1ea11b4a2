//! Abstract x86: operand and instruction shapes that exist
//! between instruction selection and emission, in three successive
//! groundings —
//!
//! - [`Program`]: symbolic variables in operand position, structured
//!   `TmpIf` branches standing in for conditional jumps, produced by
//!   select-instruction and consumed by uncover-live and allocate-locations.
//! - [`FlatProgram`]: concrete registers/derefs only, `TmpIf` lowered away
//!   into labeled jumps, produced by lower-conditionals and consumed by
//!   patch-instruction and emit.
//!
//! Splitting the abstract-x86 AST into two Rust types at the point where
//! `TmpIf` disappears gives each pass's *output* invariant its own type
//! instead of a shared type with a "not populated yet" field.

use bit_set::BitSet;

use crate::regs::{PReg, StackSlot};
use crate::symbol::Symbol;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Cc { E, L, Le, G, Ge }

impl Cc {
  #[must_use]
  pub fn from_cmp(op: crate::types::CmpOp) -> Self {
    match op {
      crate::types::CmpOp::Eq => Cc::E,
      crate::types::CmpOp::Lt => Cc::L,
      crate::types::CmpOp::Le => Cc::Le,
      crate::types::CmpOp::Gt => Cc::G,
      crate::types::CmpOp::Ge => Cc::Ge,
    }
  }

  #[must_use]
  pub fn mnemonic(self) -> &'static str {
    match self { Cc::E => "e", Cc::L => "l", Cc::Le => "le", Cc::G => "g", Cc::Ge => "ge" }
  }
}

/// An x86 operand. Before allocate-locations, [`Operand::Var`] may appear in
/// any position; after it, only the remaining variants do.
#[derive(Clone, Debug, PartialEq)]
pub enum Operand {
  Imm(i64),
  Var(Symbol),
  Reg(PReg),
  /// The low 8 bits of a register, used only as the `set<cc>`/`movzb` byte
  /// operand (always `%al` in this pipeline's lowering schedule).
  ByteReg(PReg),
  /// `off(%reg)`: either a spill slot (`%rbp`-relative) or the scratch
  /// vector-pointer dereference through `%r11`.
  Deref(PReg, i32),
  /// A jump/call target: either a compiler-synthesized internal label
  /// (prefixed `@@IF_`, stripped and left unmangled at emission) or a
  /// runtime/user label (mangled per target at emission).
  Label(String),
  /// A `label(%rip)`-style reference to a runtime global word.
  Global(Symbol),
}

impl Operand {
  #[must_use]
  pub fn as_var(&self) -> Option<Symbol> { if let Operand::Var(s) = self { Some(*s) } else { None } }

  #[must_use]
  pub fn is_mem(&self) -> bool { matches!(self, Operand::Deref(..) | Operand::Global(_)) }
}

/// A single abstract x86 instruction.
#[derive(Clone, Debug)]
pub enum Inst {
  Mov(Operand, Operand),
  Movzb(Operand, Operand),
  Add(Operand, Operand),
  Sub(Operand, Operand),
  Neg(Operand),
  Xor(Operand, Operand),
  Cmp(Operand, Operand),
  Call(&'static str),
  Push(Operand),
  Pop(Operand),
  Ret,
  Set(Cc, Operand),
  Jmp(String),
  JmpIf(Cc, String),
  Label(String),
  /// Placeholder for the function prologue; replaced by patch-instruction
  /// once the final stack size is known.
  Prologue,
  /// Placeholder for the function epilogue; replaced by patch-instruction.
  Epilogue,
  /// Placeholder standing for "return this value from the program";
  /// replaced by allocate-locations with
  /// `mov a, %rdi; call print_ptr; mov $0, %rax`.
  ReturnFromFunction(Operand),
}

/// An element of a structured instruction list: either a flat instruction or
/// a structured conditional mirroring IR `If`.
#[derive(Clone, Debug)]
pub enum Elem {
  Inst(Inst),
  TmpIf(TmpIf),
}

/// A structured if-then-else carried between instruction selection and
/// conditional lowering. The `cmp` instruction that sets the flags this
/// branches on is the flat [`Inst::Cmp`] immediately preceding this element
/// in its containing list; `cc` names the condition under which control
/// should take the *then* branch.
///
/// `then_live_after`/`else_live_after` are populated by uncover-live and are
/// empty before it runs; each is parallel to the corresponding branch list,
/// one live-after [`BitSet`] (keyed by variable id, see
/// [`crate::regs::VarTable`]) per element.
#[derive(Clone, Debug)]
pub struct TmpIf {
  pub cc: Cc,
  pub then_branch: Vec<Elem>,
  pub else_branch: Vec<Elem>,
  pub then_live_after: Vec<BitSet>,
  pub else_live_after: Vec<BitSet>,
}

impl TmpIf {
  #[must_use]
  pub fn new(cc: Cc, then_branch: Vec<Elem>, else_branch: Vec<Elem>) -> Self {
    Self { cc, then_branch, else_branch, then_live_after: Vec::new(), else_live_after: Vec::new() }
  }
}

/// The abstract-x86 program, from select-instruction through
/// allocate-locations. `live_after[i]` is the live-after set of `body[i]`,
/// populated by uncover-live.
#[derive(Clone, Debug)]
pub struct Program {
  pub vars: crate::regs::VarTable,
  pub body: Vec<Elem>,
  pub live_after: Vec<BitSet>,
  /// Set by allocate-locations: the final stack frame size, rounded to 16.
  pub stack_size: u32,
}

/// The flat-x86 program, from lower-conditionals through emission: no more
/// `TmpIf`, only labels and jumps.
#[derive(Clone, Debug)]
pub struct FlatProgram {
  pub body: Vec<Inst>,
  pub stack_size: u32,
}

/// A concrete operand location chosen by allocate-locations for a source
/// variable: either a physical register or a spill slot.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Location {
  Reg(PReg),
  Stack(StackSlot),
}

impl Location {
  #[must_use]
  pub fn to_operand(self) -> Operand {
    match self {
      Location::Reg(r) => Operand::Reg(r),
      Location::Stack(s) => Operand::Deref(PReg::Rbp, s.offset()),
    }
  }
}

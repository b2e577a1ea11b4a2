//! Register and calling-convention constants, plus [`VarTable`],
//! the dense id assignment over source variables used to key the
//! liveness/interference bit-sets of uncover-live and allocate-locations.

use std::collections::HashMap;

use crate::symbol::Symbol;
use crate::types::StaticType;

/// A physical x86-64 register.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
#[allow(clippy::upper_case_acronyms)]
pub enum PReg {
  Rax, Rcx, Rdx, Rbx, Rsi, Rdi, Rsp, Rbp, R8, R9, R10, R11, R12, R13, R14, R15,
}

impl PReg {
  #[must_use]
  pub fn name64(self) -> &'static str {
    match self {
      PReg::Rax => "rax", PReg::Rcx => "rcx", PReg::Rdx => "rdx", PReg::Rbx => "rbx",
      PReg::Rsi => "rsi", PReg::Rdi => "rdi", PReg::Rsp => "rsp", PReg::Rbp => "rbp",
      PReg::R8 => "r8", PReg::R9 => "r9", PReg::R10 => "r10", PReg::R11 => "r11",
      PReg::R12 => "r12", PReg::R13 => "r13", PReg::R14 => "r14", PReg::R15 => "r15",
    }
  }

  #[must_use]
  pub fn name8(self) -> &'static str {
    match self {
      PReg::Rax => "al", PReg::Rcx => "cl", PReg::Rdx => "dl", PReg::Rbx => "bl",
      PReg::Rsi => "sil", PReg::Rdi => "dil", PReg::Rsp => "spl", PReg::Rbp => "bpl",
      PReg::R8 => "r8b", PReg::R9 => "r9b", PReg::R10 => "r10b", PReg::R11 => "r11b",
      PReg::R12 => "r12b", PReg::R13 => "r13b", PReg::R14 => "r14b", PReg::R15 => "r15b",
    }
  }
}

/// Caller-save registers: clobbered by any `call`.
pub const CALLER_SAVE: &[PReg] =
  &[PReg::Rax, PReg::Rcx, PReg::Rdx, PReg::Rsi, PReg::Rdi, PReg::R8, PReg::R9, PReg::R10, PReg::R11];

/// Callee-save registers: preserved across calls.
pub const CALLEE_SAVE: &[PReg] =
  &[PReg::Rbx, PReg::Rbp, PReg::Rsp, PReg::R12, PReg::R13, PReg::R14, PReg::R15];

/// The pool allocate-locations may color a spilled-to-register variable
/// with: caller-save minus `%rax`, which is reserved as patch-instruction's
/// scratch register and the program's return-value register.
pub const FREE_REGS: &[PReg] =
  &[PReg::Rcx, PReg::Rdx, PReg::Rsi, PReg::Rdi, PReg::R8, PReg::R9, PReg::R10];

/// Reserved for vector-op scratch (`%r11`).
pub const SCRATCH: PReg = PReg::R11;
/// Rootstack base pointer, maintained by the runtime.
pub const ROOTSTACK_BASE: PReg = PReg::R15;

/// A spill slot, addressed as `-8*(n+1)(%rbp)` for slot index `n` (the local
/// spill area grows downward from `%rbp - 8`).
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct StackSlot(pub u32);

impl StackSlot {
  #[must_use]
  pub fn offset(self) -> i32 { -8 * (i32::try_from(self.0).expect("stack frame too large") + 1) }
}

/// A dense, reusable mapping between source variables and small integer ids,
/// used to key the `BitSet`-based liveness and interference structures.
#[derive(Clone, Debug, Default)]
pub struct VarTable {
  ids: Vec<Symbol>,
  tys: Vec<StaticType>,
  index: HashMap<Symbol, usize>,
}

impl VarTable {
  #[must_use]
  pub fn from_vars(vars: &[(Symbol, StaticType)]) -> Self {
    let mut t = VarTable::default();
    for (name, ty) in vars { t.insert(*name, ty.clone()); }
    t
  }

  pub fn insert(&mut self, name: Symbol, ty: StaticType) -> usize {
    if let Some(&id) = self.index.get(&name) { return id }
    let id = self.ids.len();
    self.ids.push(name);
    self.tys.push(ty);
    self.index.insert(name, id);
    id
  }

  #[must_use]
  pub fn id_of(&self, name: Symbol) -> usize {
    *self.index.get(&name).unwrap_or_else(|| panic!("unregistered variable `{name}`"))
  }

  #[must_use]
  pub fn symbol_of(&self, id: usize) -> Symbol { self.ids[id] }

  #[must_use]
  pub fn ty_of(&self, id: usize) -> &StaticType { &self.tys[id] }

  #[must_use]
  pub fn len(&self) -> usize { self.ids.len() }

  #[must_use]
  pub fn is_empty(&self) -> bool { self.ids.is_empty() }

  pub fn iter(&self) -> impl Iterator<Item = (usize, Symbol)> + '_ {
    self.ids.iter().copied().enumerate()
  }
}

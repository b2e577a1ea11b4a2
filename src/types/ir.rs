//! The three-address intermediate language produced by flatten: every
//! expression is either an argument or a non-nested operation whose
//! operands are arguments.

use crate::symbol::Symbol;
use crate::types::{CmpOp, Prim, StaticType};

/// An IR argument: a value immediately available without further evaluation.
#[derive(Debug, Clone, PartialEq)]
pub enum Arg {
  Int(i64),
  Bool(bool),
  Void,
  Var(Symbol),
}

impl Arg {
  #[must_use]
  pub fn as_var(&self) -> Option<Symbol> { if let Arg::Var(s) = self { Some(*s) } else { None } }
}

/// A non-nested IR expression: the right-hand side of an `Assign`.
#[derive(Debug, Clone)]
pub enum IrExpr {
  Arg(Arg),
  Apply(Prim, Vec<Arg>),
  Cmp(CmpOp, Arg, Arg),
  VectorRef(Symbol, u32),
  VectorSet(Symbol, u32, Arg),
  Allocate(u32, StaticType),
  GlobalValue(Symbol),
}

/// An IR statement.
#[derive(Debug, Clone)]
pub enum Stmt {
  Assign(Symbol, IrExpr),
  Return(Arg),
  /// A side-effecting allocator call; carries no result.
  Collect(u32),
  /// A structured conditional whose condition is a direct comparison of two
  /// arguments — never a nested expression.
  If(CmpOp, Arg, Arg, Vec<Stmt>, Vec<Stmt>),
}

/// A flattened program: every declared variable (let-bound names and
/// flatten-synthesized temporaries) plus its static type, and the
/// statement sequence ending in a single trailing `Return`.
#[derive(Debug, Clone)]
pub struct Program {
  pub vars: Vec<(Symbol, StaticType)>,
  pub stmts: Vec<Stmt>,
}

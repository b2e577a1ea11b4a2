//! The source language: surface expressions, plus the internal
//! node shapes introduced by expose-allocation (`Allocate`, `Collect`,
//! `GlobalValue`) and the unsupported placeholders (`Lambda`, `Define`)
//! that are recognized syntactically but rejected with
//! [`Error::NotImplemented`](crate::error::Error::NotImplemented).

use crate::symbol::Symbol;
use crate::types::{Prim, StaticType};

/// One source expression. `ty` is `None` until the type checker produces a
/// fresh, annotated copy of the tree; every later pass requires
/// it to be `Some`.
#[derive(Debug, Clone)]
pub struct Expr {
  pub kind: ExprKind,
  pub ty: Option<StaticType>,
}

#[derive(Debug, Clone)]
pub enum ExprKind {
  Int(i64),
  Bool(bool),
  Void,
  Var(Symbol),
  /// Parallel bindings: initializers see the enclosing scope; the body sees
  /// every new name.
  Let(Vec<(Symbol, Expr)>, Box<Expr>),
  If(Box<Expr>, Box<Expr>, Box<Expr>),
  Apply(Prim, Vec<Expr>),
  VectorInit(Vec<Expr>),
  /// The index is a compile-time literal baked in by the parser, not a
  /// sub-expression — the element type at that index must be statically
  /// known.
  VectorRef(Box<Expr>, u32),
  VectorSet(Box<Expr>, u32, Box<Expr>),

  /// Introduced by expose-allocation: allocate `len` consecutive 8-byte
  /// slots (plus a header word) tagged as `ty`.
  Allocate(u32, StaticType),
  /// Introduced by expose-allocation: call the runtime collector, passing
  /// the number of bytes about to be allocated.
  Collect(u32),
  /// A read of a runtime global word (`free_ptr`, `fromspace_end`).
  GlobalValue(Symbol),

  /// Recognized by the parser but rejected by every later pass with
  /// [`Error::NotImplemented`](crate::error::Error::NotImplemented).
  Lambda(Vec<Symbol>, Box<Expr>),
  Define(Symbol, Box<Expr>),
}

impl Expr {
  #[must_use] pub fn untyped(kind: ExprKind) -> Self { Self { kind, ty: None } }
  #[must_use] pub fn typed(kind: ExprKind, ty: StaticType) -> Self { Self { kind, ty: Some(ty) } }

  /// The annotated type, assuming type-check has already run.
  ///
  /// # Panics
  /// Panics if called before type-check — every pass after type-check is an
  /// internal invariant violation if it sees an unannotated node.
  #[must_use]
  pub fn ty(&self) -> &StaticType {
    self.ty.as_ref().expect("Expr::ty called before type-check")
  }
}

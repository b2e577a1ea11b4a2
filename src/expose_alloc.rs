//! Expose-allocation: rewrites every `VectorInit` into an explicit,
//! GC-aware allocation sequence. Must run after type-check (it relies on
//! every node already carrying a `static_type`) and before uniquify (its
//! synthesized temporaries are not yet alpha-renamed).
//!
//! Element byte-size is 8; total allocation size for an `n`-element vector
//! is `8*(n+1)` (one header word plus `n` element slots).
//!
//! Synthesized temporaries need a name guaranteed not to collide with any
//! user-written identifier before uniquify runs. Rather than reach for a
//! randomly generated prefix, this mints them under a reserved character
//! (`%`) that the surface grammar's identifier syntax cannot produce — a
//! stronger, deterministic guarantee than randomness gives, at no extra
//! cost. See `DESIGN.md`.

use crate::symbol::{intern, Symbol};
use crate::types::source::{Expr, ExprKind};
use crate::types::{self, StaticType};

const ELEM_BYTES: u32 = 8;

struct Exposer { next: u32 }

impl Exposer {
  fn fresh(&mut self, tag: &str) -> Symbol {
    let s = intern(&format!("%expose.{tag}.{}", self.next));
    self.next += 1;
    s
  }
}

/// Desugar every `VectorInit` in `prog` (which must already be type-checked).
pub fn expose(prog: &Expr) -> Expr {
  let mut ex = Exposer { next: 0 };
  expose_expr(&mut ex, prog)
}

fn expose_expr(ex: &mut Exposer, e: &Expr) -> Expr {
  let ty = e.ty().clone();
  match &e.kind {
    ExprKind::Int(_) | ExprKind::Bool(_) | ExprKind::Void | ExprKind::Var(_) => e.clone(),

    ExprKind::Let(binds, body) => {
      let binds2 = binds.iter().map(|(n, init)| (*n, expose_expr(ex, init))).collect();
      let body2 = expose_expr(ex, body);
      Expr::typed(ExprKind::Let(binds2, Box::new(body2)), ty)
    }

    ExprKind::If(c, t, e2) => Expr::typed(
      ExprKind::If(Box::new(expose_expr(ex, c)), Box::new(expose_expr(ex, t)), Box::new(expose_expr(ex, e2))),
      ty,
    ),

    ExprKind::Apply(p, args) => {
      Expr::typed(ExprKind::Apply(*p, args.iter().map(|a| expose_expr(ex, a)).collect()), ty)
    }

    ExprKind::VectorRef(v, idx) => Expr::typed(ExprKind::VectorRef(Box::new(expose_expr(ex, v)), *idx), ty),

    ExprKind::VectorSet(v, idx, val) => Expr::typed(
      ExprKind::VectorSet(Box::new(expose_expr(ex, v)), *idx, Box::new(expose_expr(ex, val))),
      ty,
    ),

    ExprKind::VectorInit(elems) => expose_vector_init(ex, elems, &ty),

    ExprKind::Allocate(..) | ExprKind::Collect(_) | ExprKind::GlobalValue(_) => e.clone(),

    ExprKind::Lambda(params, body) => Expr::typed(ExprKind::Lambda(params.clone(), Box::new(expose_expr(ex, body))), ty),
    ExprKind::Define(name, init) => Expr::typed(ExprKind::Define(*name, Box::new(expose_expr(ex, init))), ty),
  }
}

fn expose_vector_init(ex: &mut Exposer, elems: &[Expr], vty: &StaticType) -> Expr {
  let n = u32::try_from(elems.len()).expect("vector too long");
  let bytes = ELEM_BYTES * (n + 1);

  let elem_exprs: Vec<Expr> = elems.iter().map(|e| expose_expr(ex, e)).collect();
  let elem_tmps: Vec<Symbol> = (0..elem_exprs.len()).map(|_| ex.fresh("elem")).collect();
  let v = ex.fresh("vec");

  let free_ptr = types::free_ptr();
  let fromspace_end = types::fromspace_end();
  let room_check = Expr::typed(
    ExprKind::Apply(
      crate::types::Prim::Lt,
      vec![
        Expr::typed(
          ExprKind::Apply(
            crate::types::Prim::Add,
            vec![
              Expr::typed(ExprKind::GlobalValue(free_ptr), StaticType::Int),
              Expr::typed(ExprKind::Int(i64::from(bytes)), StaticType::Int),
            ],
          ),
          StaticType::Int,
        ),
        Expr::typed(ExprKind::GlobalValue(fromspace_end), StaticType::Int),
      ],
    ),
    StaticType::Bool,
  );
  let maybe_collect = Expr::typed(
    ExprKind::If(
      Box::new(room_check),
      Box::new(Expr::typed(ExprKind::Void, StaticType::Void)),
      Box::new(Expr::typed(ExprKind::Collect(bytes), StaticType::Void)),
    ),
    StaticType::Void,
  );

  // Build from the innermost result outward: `v` itself, then the
  // VectorSet! calls in reverse, then the allocate, then the collect
  // check, then the element temporaries in reverse.
  let mut body = Expr::typed(ExprKind::Var(v), vty.clone());
  for (i, tmp) in elem_tmps.iter().enumerate().rev() {
    let idx = u32::try_from(i).expect("vector too long");
    let set = Expr::typed(
      ExprKind::VectorSet(
        Box::new(Expr::typed(ExprKind::Var(v), vty.clone())),
        idx,
        Box::new(Expr::typed(ExprKind::Var(*tmp), elems[i].ty().clone())),
      ),
      StaticType::Void,
    );
    body = let_single(intern("%expose.ignore"), set, body);
  }
  body = let_single(v, Expr::typed(ExprKind::Allocate(n, vty.clone()), vty.clone()), body);
  body = let_single(intern("%expose.ignore"), maybe_collect, body);
  for (tmp, init) in elem_tmps.into_iter().zip(elem_exprs).rev() {
    body = let_single(tmp, init, body);
  }
  body
}

fn let_single(name: Symbol, init: Expr, body: Expr) -> Expr {
  let ty = body.ty().clone();
  Expr::typed(ExprKind::Let(vec![(name, init)], Box::new(body)), ty)
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::typecheck::check_program;

  fn source_vector_program() -> Expr {
    Expr::untyped(ExprKind::Let(
      vec![(intern("v"), Expr::untyped(ExprKind::VectorInit(vec![
        Expr::untyped(ExprKind::Int(1)),
        Expr::untyped(ExprKind::Int(2)),
      ])))],
      Box::new(Expr::untyped(ExprKind::VectorRef(Box::new(Expr::untyped(ExprKind::Var(intern("v")))), 0))),
    ))
  }

  #[test]
  fn vector_init_is_fully_desugared() {
    let (checked, _) = check_program(&source_vector_program()).unwrap();
    let exposed = expose(&checked);
    assert!(!contains_vector_init(&exposed));
  }

  fn contains_vector_init(e: &Expr) -> bool {
    match &e.kind {
      ExprKind::VectorInit(_) => true,
      ExprKind::Let(binds, body) => {
        binds.iter().any(|(_, i)| contains_vector_init(i)) || contains_vector_init(body)
      }
      ExprKind::If(c, t, el) => contains_vector_init(c) || contains_vector_init(t) || contains_vector_init(el),
      ExprKind::Apply(_, args) => args.iter().any(contains_vector_init),
      ExprKind::VectorRef(v, _) => contains_vector_init(v),
      ExprKind::VectorSet(v, _, val) => contains_vector_init(v) || contains_vector_init(val),
      _ => false,
    }
  }
}

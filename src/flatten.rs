//! Flatten: lowers the (uniquified, alloc-exposed) source AST into the
//! three-address [`ir::Program`]. Every expression lowering
//! returns `(arg, preceding-stmts)`: composite expressions bind their
//! result to a freshly named temporary via an `Assign` and return that
//! temporary as their arg.

use crate::error::{Error, Result};
use crate::symbol::{intern, Symbol};
use crate::types::ir::{Arg, IrExpr, Program, Stmt};
use crate::types::source::{Expr, ExprKind};
use crate::types::{CmpOp, Prim, StaticType};

struct Flattener {
  next_tmp: u32,
  vars: Vec<(Symbol, StaticType)>,
}

impl Flattener {
  fn fresh(&mut self, ty: StaticType) -> Symbol {
    let s = intern(&format!("tmp_{}", self.next_tmp));
    self.next_tmp += 1;
    self.vars.push((s, ty));
    s
  }

  fn declare(&mut self, name: Symbol, ty: StaticType) { self.vars.push((name, ty)); }
}

/// Flatten `prog` (uniquified, alloc-exposed, type-checked) into IR.
pub fn flatten(prog: &Expr) -> Result<Program> {
  let mut fl = Flattener { next_tmp: 0, vars: Vec::new() };
  let mut stmts = Vec::new();
  let arg = flatten_expr(&mut fl, prog, &mut stmts)?;
  stmts.push(Stmt::Return(arg));
  Ok(Program { vars: fl.vars, stmts })
}

fn lower_literal(e: &Expr) -> Option<Arg> {
  match e.kind {
    ExprKind::Int(n) => Some(Arg::Int(n)),
    ExprKind::Bool(b) => Some(Arg::Bool(b)),
    ExprKind::Void => Some(Arg::Void),
    ExprKind::Var(s) => Some(Arg::Var(s)),
    _ => None,
  }
}

fn flatten_expr(fl: &mut Flattener, e: &Expr, out: &mut Vec<Stmt>) -> Result<Arg> {
  if let Some(arg) = lower_literal(e) { return Ok(arg) }

  match &e.kind {
    ExprKind::Int(_) | ExprKind::Bool(_) | ExprKind::Void | ExprKind::Var(_) => unreachable!("handled above"),

    ExprKind::Let(binds, body) => {
      for (name, init) in binds {
        let arg = flatten_expr(fl, init, out)?;
        fl.declare(*name, init.ty().clone());
        out.push(Stmt::Assign(*name, IrExpr::Arg(arg)));
      }
      flatten_expr(fl, body, out)
    }

    ExprKind::If(c, t, e2) => flatten_if(fl, c, t, e2, e.ty(), out),

    // `and`/`or` desugar to `if` before flattening.
    ExprKind::Apply(Prim::And, args) => {
      let synth_false = Expr::typed(ExprKind::Bool(false), StaticType::Bool);
      flatten_if(fl, &args[0], &args[1], &synth_false, e.ty(), out)
    }
    ExprKind::Apply(Prim::Or, args) => {
      let synth_true = Expr::typed(ExprKind::Bool(true), StaticType::Bool);
      flatten_if(fl, &args[0], &synth_true, &args[1], e.ty(), out)
    }

    ExprKind::Apply(prim, args) => {
      if let Some(cmp) = CmpOp::from_prim(*prim) {
        let a = flatten_expr(fl, &args[0], out)?;
        let b = flatten_expr(fl, &args[1], out)?;
        let tmp = fl.fresh(e.ty().clone());
        out.push(Stmt::Assign(tmp, IrExpr::Cmp(cmp, a, b)));
        return Ok(Arg::Var(tmp));
      }
      let args2 = args.iter().map(|a| flatten_expr(fl, a, out)).collect::<Result<Vec<_>>>()?;
      let tmp = fl.fresh(e.ty().clone());
      out.push(Stmt::Assign(tmp, IrExpr::Apply(*prim, args2)));
      Ok(Arg::Var(tmp))
    }

    ExprKind::VectorInit(_) => Err(Error::compile("VectorInit survived expose-allocation".to_owned())),

    ExprKind::VectorRef(v, idx) => {
      let var = flatten_to_var(fl, v, out)?;
      let tmp = fl.fresh(e.ty().clone());
      out.push(Stmt::Assign(tmp, IrExpr::VectorRef(var, *idx)));
      Ok(Arg::Var(tmp))
    }

    ExprKind::VectorSet(v, idx, val) => {
      let var = flatten_to_var(fl, v, out)?;
      let arg = flatten_expr(fl, val, out)?;
      let tmp = fl.fresh(StaticType::Void);
      out.push(Stmt::Assign(tmp, IrExpr::VectorSet(var, *idx, arg)));
      Ok(Arg::Var(tmp))
    }

    ExprKind::Allocate(n, ty) => {
      let tmp = fl.fresh(ty.clone());
      out.push(Stmt::Assign(tmp, IrExpr::Allocate(*n, ty.clone())));
      Ok(Arg::Var(tmp))
    }

    ExprKind::Collect(bytes) => {
      out.push(Stmt::Collect(*bytes));
      Ok(Arg::Void)
    }

    ExprKind::GlobalValue(name) => {
      let tmp = fl.fresh(StaticType::Int);
      out.push(Stmt::Assign(tmp, IrExpr::GlobalValue(*name)));
      Ok(Arg::Var(tmp))
    }

    ExprKind::Lambda(..) => Err(Error::NotImplemented("lambda")),
    ExprKind::Define(..) => Err(Error::NotImplemented("define")),
  }
}

fn flatten_if(fl: &mut Flattener, cond: &Expr, then_e: &Expr, else_e: &Expr, ty: &StaticType, out: &mut Vec<Stmt>) -> Result<Arg> {
  let cond_arg = flatten_expr(fl, cond, out)?;

  let mut then_stmts = Vec::new();
  let then_arg = flatten_expr(fl, then_e, &mut then_stmts)?;
  let mut else_stmts = Vec::new();
  let else_arg = flatten_expr(fl, else_e, &mut else_stmts)?;

  let tmp = fl.fresh(ty.clone());
  then_stmts.push(Stmt::Assign(tmp, IrExpr::Arg(then_arg)));
  else_stmts.push(Stmt::Assign(tmp, IrExpr::Arg(else_arg)));

  out.push(Stmt::If(CmpOp::Eq, Arg::Bool(true), cond_arg, then_stmts, else_stmts));
  Ok(Arg::Var(tmp))
}

fn flatten_to_var(fl: &mut Flattener, e: &Expr, out: &mut Vec<Stmt>) -> Result<Symbol> {
  match flatten_expr(fl, e, out)? {
    Arg::Var(s) => Ok(s),
    other => {
      let tmp = fl.fresh(e.ty().clone());
      out.push(Stmt::Assign(tmp, IrExpr::Arg(other)));
      Ok(tmp)
    }
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::expose_alloc::expose;
  use crate::typecheck::check_program;
  use crate::uniquify::uniquify;

  fn pipeline(e: Expr) -> Program {
    let (checked, _) = check_program(&e).unwrap();
    let exposed = expose(&checked);
    let uniq = uniquify(&exposed).unwrap();
    flatten(&uniq).unwrap()
  }

  #[test]
  fn every_stmt_is_non_nested() {
    let e = Expr::untyped(ExprKind::Apply(
      Prim::Add,
      vec![Expr::untyped(ExprKind::Int(10)), Expr::untyped(ExprKind::Int(32))],
    ));
    let prog = pipeline(e);
    for s in &prog.stmts {
      if let Stmt::Assign(_, IrExpr::Apply(_, args)) = s {
        for a in args { assert!(matches!(a, Arg::Int(_) | Arg::Bool(_) | Arg::Void | Arg::Var(_))); }
      }
    }
    assert!(matches!(prog.stmts.last(), Some(Stmt::Return(_))));
  }

  #[test]
  fn if_desugars_to_structured_stmt() {
    let e = Expr::untyped(ExprKind::If(
      Box::new(Expr::untyped(ExprKind::Apply(Prim::Lt, vec![Expr::untyped(ExprKind::Int(1)), Expr::untyped(ExprKind::Int(2))]))),
      Box::new(Expr::untyped(ExprKind::Int(7))),
      Box::new(Expr::untyped(ExprKind::Int(9))),
    ));
    let prog = pipeline(e);
    assert!(prog.stmts.iter().any(|s| matches!(s, Stmt::If(..))));
  }
}

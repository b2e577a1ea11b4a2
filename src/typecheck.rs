//! Static type checking: walks the source AST in a scoped environment
//! mapping names to [`StaticType`]s, and returns a freshly built, fully
//! annotated copy of the tree together with its type. No in-place
//! mutation — every pass in this pipeline takes ownership of its input and
//! returns a fresh owned output.

use crate::env::ScopedEnv;
use crate::error::{Error, Result};
use crate::symbol::Symbol;
use crate::types::source::{Expr, ExprKind};
use crate::types::{Prim, StaticType};

/// Type-check `prog`, returning the annotated tree and its top-level type.
pub fn check_program(prog: &Expr) -> Result<(Expr, StaticType)> {
  let mut env = ScopedEnv::new();
  check(&mut env, prog)
}

fn check(env: &mut ScopedEnv<StaticType>, e: &Expr) -> Result<(Expr, StaticType)> {
  match &e.kind {
    ExprKind::Int(n) => Ok((Expr::typed(ExprKind::Int(*n), StaticType::Int), StaticType::Int)),
    ExprKind::Bool(b) => Ok((Expr::typed(ExprKind::Bool(*b), StaticType::Bool), StaticType::Bool)),
    ExprKind::Void => Ok((Expr::typed(ExprKind::Void, StaticType::Void), StaticType::Void)),

    ExprKind::Var(name) => {
      let ty = env.get(*name)
        .ok_or_else(|| Error::ty(format!("unbound variable `{name}`")))?
        .clone();
      Ok((Expr::typed(ExprKind::Var(*name), ty.clone()), ty))
    }

    ExprKind::Let(binds, body) => {
      let mut new_binds = Vec::with_capacity(binds.len());
      for (name, init) in binds {
        let (init2, ty) = check(env, init)?;
        new_binds.push((*name, init2, ty));
      }
      env.scoped(|env| {
        for (name, _, ty) in &new_binds { env.add(*name, ty.clone()); }
        let (body2, bty) = check(env, body)?;
        let binds_out = new_binds.into_iter().map(|(n, i, _)| (n, i)).collect();
        Ok((Expr::typed(ExprKind::Let(binds_out, Box::new(body2)), bty.clone()), bty))
      })
    }

    ExprKind::If(c, t, e2) => {
      let (c2, cty) = check(env, c)?;
      if cty != StaticType::Bool {
        return Err(Error::ty(format!("`if` condition must be bool, got {cty}")));
      }
      let (t2, tty) = check(env, t)?;
      let (e3, ety) = check(env, e2)?;
      if tty != ety {
        return Err(Error::ty(format!("`if` branches disagree: {tty} vs {ety}")));
      }
      Ok((Expr::typed(ExprKind::If(Box::new(c2), Box::new(t2), Box::new(e3)), tty.clone()), tty))
    }

    ExprKind::Apply(prim, args) => check_apply(env, *prim, args),

    ExprKind::VectorInit(elems) => {
      let mut out = Vec::with_capacity(elems.len());
      let mut tys = Vec::with_capacity(elems.len());
      for e in elems {
        let (e2, ty) = check(env, e)?;
        out.push(e2);
        tys.push(ty);
      }
      let vty = StaticType::vector(tys);
      Ok((Expr::typed(ExprKind::VectorInit(out), vty.clone()), vty))
    }

    ExprKind::VectorRef(v, idx) => {
      let (v2, vty) = check(env, v)?;
      let elem_ty = vector_index(&vty, *idx)?.clone();
      Ok((Expr::typed(ExprKind::VectorRef(Box::new(v2), *idx), elem_ty.clone()), elem_ty))
    }

    ExprKind::VectorSet(v, idx, val) => {
      let (v2, vty) = check(env, v)?;
      let elem_ty = vector_index(&vty, *idx)?.clone();
      let (val2, vaty) = check(env, val)?;
      if vaty != elem_ty {
        return Err(Error::ty(format!(
          "vector-set!: element {idx} has type {elem_ty}, value has type {vaty}"
        )));
      }
      Ok((Expr::typed(ExprKind::VectorSet(Box::new(v2), *idx, Box::new(val2)), StaticType::Void), StaticType::Void))
    }

    ExprKind::Allocate(..) | ExprKind::Collect(_) | ExprKind::GlobalValue(_) => Err(Error::compile(
      "type-check saw an expose-allocation-internal node in surface source".to_owned(),
    )),

    ExprKind::Lambda(..) => Err(Error::NotImplemented("lambda")),
    ExprKind::Define(..) => Err(Error::NotImplemented("define")),
  }
}

fn vector_index(vty: &StaticType, idx: u32) -> Result<&StaticType> {
  let elems = vty.vector_elems().ok_or_else(|| Error::ty(format!("vector-ref/set! on non-vector type {vty}")))?;
  elems.get(idx as usize).ok_or_else(|| {
    Error::ty(format!("vector index {idx} out of range for {vty} (length {})", elems.len()))
  })
}

fn check_apply(env: &mut ScopedEnv<StaticType>, prim: Prim, args: &[Expr]) -> Result<(Expr, StaticType)> {
  if args.len() != prim.arity() {
    return Err(Error::ty(format!(
      "`{}` expects {} argument(s), got {}", prim.name(), prim.arity(), args.len()
    )));
  }
  let mut checked = Vec::with_capacity(args.len());
  let mut tys = Vec::with_capacity(args.len());
  for a in args {
    let (a2, ty) = check(env, a)?;
    checked.push(a2);
    tys.push(ty);
  }
  let result_ty = match prim {
    Prim::Add | Prim::Neg => {
      require_all(&tys, &StaticType::Int, prim)?;
      StaticType::Int
    }
    Prim::EqP => {
      if tys[0] != tys[1] {
        return Err(Error::ty(format!("`eq?` operands disagree: {} vs {}", tys[0], tys[1])));
      }
      StaticType::Bool
    }
    Prim::Lt | Prim::Le | Prim::Gt | Prim::Ge => {
      require_all(&tys, &StaticType::Int, prim)?;
      StaticType::Bool
    }
    Prim::And | Prim::Or | Prim::Not => {
      require_all(&tys, &StaticType::Bool, prim)?;
      StaticType::Bool
    }
    Prim::ReadInt => StaticType::Int,
    Prim::ReadBool => StaticType::Bool,
  };
  Ok((Expr::typed(ExprKind::Apply(prim, checked), result_ty.clone()), result_ty))
}

fn require_all(tys: &[StaticType], expect: &StaticType, prim: Prim) -> Result<()> {
  for ty in tys {
    if ty != expect {
      return Err(Error::ty(format!("`{}` expects {expect} operands, got {ty}", prim.name())));
    }
  }
  Ok(())
}

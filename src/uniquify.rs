//! Uniquify: alpha-renames every binding so names are unique process-wide.
//! Must run after expose-allocation (so the synthesized allocation
//! temporaries get renamed too) and before flatten.

use crate::env::ScopedEnv;
use crate::error::{Error, Result};
use crate::symbol::{intern, Symbol};
use crate::types::source::{Expr, ExprKind};

#[derive(Default)]
struct Uniq {
  /// Process-lifetime counter per original name.
  counters: std::collections::HashMap<Symbol, u32>,
}

impl Uniq {
  fn fresh(&mut self, original: Symbol) -> Symbol {
    let k = self.counters.entry(original).or_insert(0);
    let renamed = intern(&format!("{original}_{k}"));
    *k += 1;
    renamed
  }
}

/// Alpha-rename every binding in `prog` (which must already be
/// type-checked and expose-allocation-desugared).
pub fn uniquify(prog: &Expr) -> Result<Expr> {
  let mut u = Uniq::default();
  let mut env = ScopedEnv::new();
  rename(&mut u, &mut env, prog)
}

fn rename(u: &mut Uniq, env: &mut ScopedEnv<Symbol>, e: &Expr) -> Result<Expr> {
  let ty = e.ty().clone();
  let kind = match &e.kind {
    ExprKind::Int(n) => ExprKind::Int(*n),
    ExprKind::Bool(b) => ExprKind::Bool(*b),
    ExprKind::Void => ExprKind::Void,

    ExprKind::Var(name) => {
      let resolved = *env.get(*name)
        .ok_or_else(|| Error::compile(format!("free variable `{name}` survived type-check")))?;
      ExprKind::Var(resolved)
    }

    ExprKind::Let(binds, body) => {
      // Initializers are evaluated in the *outer* scope: rename them before
      // the new bindings are visible.
      let mut renamed_inits = Vec::with_capacity(binds.len());
      for (name, init) in binds {
        renamed_inits.push((*name, rename(u, env, init)?));
      }
      env.scoped(|env| {
        let mut new_binds = Vec::with_capacity(renamed_inits.len());
        for (name, init) in renamed_inits {
          let fresh = u.fresh(name);
          env.add(name, fresh);
          new_binds.push((fresh, init));
        }
        let body2 = rename(u, env, body)?;
        Ok(ExprKind::Let(new_binds, Box::new(body2)))
      })?
    }

    ExprKind::If(c, t, e2) => ExprKind::If(
      Box::new(rename(u, env, c)?),
      Box::new(rename(u, env, t)?),
      Box::new(rename(u, env, e2)?),
    ),

    ExprKind::Apply(p, args) => {
      let args2 = args.iter().map(|a| rename(u, env, a)).collect::<Result<_>>()?;
      ExprKind::Apply(*p, args2)
    }

    ExprKind::VectorInit(elems) => {
      ExprKind::VectorInit(elems.iter().map(|e| rename(u, env, e)).collect::<Result<_>>()?)
    }
    ExprKind::VectorRef(v, idx) => ExprKind::VectorRef(Box::new(rename(u, env, v)?), *idx),
    ExprKind::VectorSet(v, idx, val) => {
      ExprKind::VectorSet(Box::new(rename(u, env, v)?), *idx, Box::new(rename(u, env, val)?))
    }

    // Internal nodes have no user-facing names to rename. `GlobalValue`
    // names a runtime global, not a local binding.
    ExprKind::Allocate(n, t) => ExprKind::Allocate(*n, t.clone()),
    ExprKind::Collect(n) => ExprKind::Collect(*n),
    ExprKind::GlobalValue(name) => ExprKind::GlobalValue(*name),

    ExprKind::Lambda(..) => return Err(Error::NotImplemented("lambda")),
    ExprKind::Define(..) => return Err(Error::NotImplemented("define")),
  };
  Ok(Expr::typed(kind, ty))
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn shadowed_binding_gets_distinct_name() {
    let x = intern("x");
    let inner_let = Expr::typed(
      ExprKind::Let(vec![(x, Expr::typed(ExprKind::Int(32), crate::types::StaticType::Int))],
        Box::new(Expr::typed(ExprKind::Var(x), crate::types::StaticType::Int))),
      crate::types::StaticType::Int,
    );
    let outer = Expr::typed(
      ExprKind::Let(vec![(x, Expr::typed(ExprKind::Int(10), crate::types::StaticType::Int))], Box::new(inner_let)),
      crate::types::StaticType::Int,
    );
    let renamed = uniquify(&outer).unwrap();
    let ExprKind::Let(outer_binds, outer_body) = &renamed.kind else { panic!() };
    let ExprKind::Let(inner_binds, inner_body) = &outer_body.kind else { panic!() };
    assert_ne!(outer_binds[0].0, inner_binds[0].0);
    let ExprKind::Var(referenced) = inner_body.kind else { panic!() };
    assert_eq!(referenced, inner_binds[0].0);
  }
}

//! Property-based suite: generates bounded well-typed expressions
//! and checks they compile without error. Matching output against a
//! reference interpreter would need an actual assembler/linker/runtime
//! this crate does not own, so that half is out of scope here (see
//! `tests/pipeline.rs` for literal, hand-picked scenarios instead).

use proptest::prelude::*;

use lispcc::emit::Target;
use lispcc::types::source::{Expr, ExprKind};
use lispcc::types::{Prim, StaticType};

/// Generates a well-typed expression of exactly `ty`, bounded by `depth`.
fn well_typed(ty: StaticType, depth: u32) -> BoxedStrategy<Expr> {
  if depth == 0 {
    return leaf(ty);
  }
  match ty {
    StaticType::Int => prop_oneof![
      leaf(StaticType::Int),
      (well_typed(StaticType::Int, depth - 1), well_typed(StaticType::Int, depth - 1))
        .prop_map(|(a, b)| apply(Prim::Add, vec![a, b]))
        .boxed(),
      well_typed(StaticType::Bool, depth - 1)
        .prop_flat_map(move |c| {
          (Just(c), well_typed(StaticType::Int, depth - 1), well_typed(StaticType::Int, depth - 1))
            .prop_map(|(c, t, e)| Expr::typed(ExprKind::If(Box::new(c), Box::new(t), Box::new(e)), StaticType::Int))
        })
        .boxed(),
    ]
    .boxed(),
    StaticType::Bool => prop_oneof![
      leaf(StaticType::Bool),
      (well_typed(StaticType::Int, depth - 1), well_typed(StaticType::Int, depth - 1))
        .prop_map(|(a, b)| apply(Prim::Lt, vec![a, b]))
        .boxed(),
      well_typed(StaticType::Bool, depth - 1).prop_map(|a| apply(Prim::Not, vec![a])).boxed(),
    ]
    .boxed(),
    StaticType::Void => Just(Expr::typed(ExprKind::Void, StaticType::Void)).boxed(),
    StaticType::Vector(_) => leaf(ty),
  }
}

fn leaf(ty: StaticType) -> BoxedStrategy<Expr> {
  match ty {
    StaticType::Int => any::<i32>().prop_map(|n| Expr::typed(ExprKind::Int(i64::from(n)), StaticType::Int)).boxed(),
    StaticType::Bool => any::<bool>().prop_map(|b| Expr::typed(ExprKind::Bool(b), StaticType::Bool)).boxed(),
    StaticType::Void => Just(Expr::typed(ExprKind::Void, StaticType::Void)).boxed(),
    StaticType::Vector(elems) => Just(Expr::typed(ExprKind::VectorInit(vec![]), StaticType::Vector(elems))).boxed(),
  }
}

fn apply(p: Prim, args: Vec<Expr>) -> Expr {
  let ty = match p {
    Prim::Add | Prim::Neg => StaticType::Int,
    _ => StaticType::Bool,
  };
  Expr::typed(ExprKind::Apply(p, args), ty)
}

proptest! {
  #[test]
  fn well_typed_int_expressions_always_compile(e in well_typed(StaticType::Int, 4)) {
    // The generator already hands the pipeline a type-checked tree; strip
    // the annotation so the run goes through the real type checker too.
    let untyped = strip_types(&e);
    let result = lispcc::compile(&untyped, Target::Linux);
    prop_assert!(result.is_ok(), "expected a well-typed expression to compile: {result:?}");
  }

  #[test]
  fn well_typed_bool_expressions_always_compile(e in well_typed(StaticType::Bool, 4)) {
    let untyped = strip_types(&e);
    let result = lispcc::compile(&untyped, Target::Linux);
    prop_assert!(result.is_ok(), "expected a well-typed expression to compile: {result:?}");
  }
}

fn strip_types(e: &Expr) -> Expr {
  let kind = match &e.kind {
    ExprKind::Int(n) => ExprKind::Int(*n),
    ExprKind::Bool(b) => ExprKind::Bool(*b),
    ExprKind::Void => ExprKind::Void,
    ExprKind::Var(s) => ExprKind::Var(*s),
    ExprKind::Let(binds, body) => ExprKind::Let(
      binds.iter().map(|(n, i)| (*n, strip_types(i))).collect(),
      Box::new(strip_types(body)),
    ),
    ExprKind::If(c, t, f) => ExprKind::If(Box::new(strip_types(c)), Box::new(strip_types(t)), Box::new(strip_types(f))),
    ExprKind::Apply(p, args) => ExprKind::Apply(*p, args.iter().map(strip_types).collect()),
    ExprKind::VectorInit(elems) => ExprKind::VectorInit(elems.iter().map(strip_types).collect()),
    ExprKind::VectorRef(v, i) => ExprKind::VectorRef(Box::new(strip_types(v)), *i),
    ExprKind::VectorSet(v, i, val) => ExprKind::VectorSet(Box::new(strip_types(v)), *i, Box::new(strip_types(val))),
    ExprKind::Allocate(n, t) => ExprKind::Allocate(*n, t.clone()),
    ExprKind::Collect(n) => ExprKind::Collect(*n),
    ExprKind::GlobalValue(s) => ExprKind::GlobalValue(*s),
    ExprKind::Lambda(params, body) => ExprKind::Lambda(params.clone(), Box::new(strip_types(body))),
    ExprKind::Define(name, init) => ExprKind::Define(*name, Box::new(strip_types(init))),
  };
  Expr::untyped(kind)
}

//! An ahead-of-time compiler for a small typed Lisp-family subset:
//! integers, booleans, void, heterogeneous vectors, `let`, `if`, and a fixed
//! set of arithmetic/comparison/logical primitives, emitted as AT&T-syntax
//! x86-64 assembly text that calls a small runtime (`read_int`, `read_bool`,
//! `print_ptr`, `collect`) it does not itself implement.
//!
//! The pipeline is ten ownership-passing stages over three AST families
//! (`types::source`, `types::ir`, `types::x86`), each pass consuming the
//! previous stage's tree and returning a fresh one rather than mutating in
//! place — each pass's output invariant gets its own type instead of one
//! shared tree with a "not populated yet" field.

pub mod allocate_locations;
pub mod emit;
pub mod env;
pub mod error;
pub mod expose_alloc;
pub mod flatten;
pub mod lower_conditionals;
pub mod parser;
pub mod patch_instruction;
pub mod regs;
pub mod select_instruction;
pub mod symbol;
pub mod typecheck;
pub mod types;
pub mod uncover_live;
pub mod uniquify;

use error::Result;
use types::source::Expr;

/// One pipeline stage's output, captured for `--dump-passes`. A
/// `NotImplemented`/`Type`/`Compile` error aborts before the stage that
/// detects it produces a result.
#[derive(Debug, Clone)]
pub enum PassDump {
  Source(String),
  Ir(String),
  X86(String),
  FlatX86(String),
  Asm(String),
}

/// Compile a parsed, type-checked-from-scratch program to assembly text.
///
/// Runs every pass in order: type check, expose-allocation,
/// uniquify, flatten, select-instruction, uncover-live, allocate-locations,
/// lower-conditionals, patch-instruction, emit-assembly.
pub fn compile(program: &Expr, target: emit::Target) -> Result<String> {
  log::debug!("type-check: starting");
  let (checked, _vars) = typecheck::check_program(program)?;

  log::debug!("expose-allocation: starting");
  let exposed = expose_alloc::expose(&checked);

  log::debug!("uniquify: starting");
  let uniq = uniquify::uniquify(&exposed)?;

  log::debug!("flatten: starting");
  let ir = flatten::flatten(&uniq)?;
  log::debug!("flatten: produced {} statement(s), {} variable(s)", ir.stmts.len(), ir.vars.len());

  log::debug!("select-instruction: starting");
  let x86 = select_instruction::select(&ir)?;

  log::debug!("uncover-live: starting");
  let live = uncover_live::uncover_live(x86);

  log::debug!("allocate-locations: starting");
  let allocated = allocate_locations::allocate(live);
  log::debug!("allocate-locations: {} byte stack frame", allocated.stack_size);

  log::debug!("lower-conditionals: starting");
  let flat = lower_conditionals::lower(allocated);
  log::debug!("lower-conditionals: {} instruction(s)", flat.body.len());

  log::debug!("patch-instruction: starting");
  let patched = patch_instruction::patch(flat);

  log::debug!("emit: starting, target {target:?}");
  Ok(emit::emit(&patched, target))
}

/// Like [`compile`], but also returns a debug rendering of every
/// intermediate stage, backing `--dump-passes` in `src/bin/lispcc.rs`.
pub fn compile_with_dump(program: &Expr, target: emit::Target) -> Result<(String, Vec<PassDump>)> {
  let mut dumps = Vec::new();

  let (checked, _vars) = typecheck::check_program(program)?;
  dumps.push(PassDump::Source(format!("{checked:#?}")));

  let exposed = expose_alloc::expose(&checked);
  dumps.push(PassDump::Source(format!("{exposed:#?}")));

  let uniq = uniquify::uniquify(&exposed)?;
  dumps.push(PassDump::Source(format!("{uniq:#?}")));

  let ir = flatten::flatten(&uniq)?;
  dumps.push(PassDump::Ir(format!("{ir:#?}")));

  let x86 = select_instruction::select(&ir)?;
  dumps.push(PassDump::X86(format!("{x86:#?}")));

  let live = uncover_live::uncover_live(x86);
  dumps.push(PassDump::X86(format!("{live:#?}")));

  let allocated = allocate_locations::allocate(live);
  dumps.push(PassDump::X86(format!("{allocated:#?}")));

  let flat = lower_conditionals::lower(allocated);
  dumps.push(PassDump::FlatX86(format!("{flat:#?}")));

  let patched = patch_instruction::patch(flat);
  dumps.push(PassDump::FlatX86(format!("{patched:#?}")));

  let asm = emit::emit(&patched, target);
  dumps.push(PassDump::Asm(asm.clone()));

  Ok((asm, dumps))
}

#[cfg(test)]
mod tests {
  use super::*;

  fn compile_str(src: &str) -> String {
    let ast = parser::parse(src).unwrap();
    compile(&ast, emit::Target::Linux).unwrap()
  }

  #[test]
  fn compiles_trivial_arithmetic_to_assembly_with_runtime_return() {
    let asm = compile_str("(+ 10 32)");
    assert!(asm.contains("call\tprint_ptr"));
    assert!(asm.contains("main:"));
  }

  #[test]
  fn compiles_let_and_if() {
    let asm = compile_str("(let ([x 10]) (if (< x 20) 1 0))");
    assert!(asm.contains("je\t") || asm.contains("jl\t") || asm.contains("jle\t") || asm.contains("jg\t") || asm.contains("jge\t"));
  }

  #[test]
  fn compiles_vector_allocation_and_access() {
    let asm = compile_str("(vector-ref (vector 1 #t 3) 0)");
    assert!(asm.contains("call\tcollect") || asm.contains("fromspace_end"));
  }

  #[test]
  fn rejects_ill_typed_programs() {
    let ast = parser::parse("(+ 1 #t)").unwrap();
    assert!(compile(&ast, emit::Target::Linux).is_err());
  }

  #[test]
  fn lambda_is_recognized_but_not_lowered() {
    let ast = parser::parse("(lambda (x) x)").unwrap();
    let err = compile(&ast, emit::Target::Linux).unwrap_err();
    assert!(matches!(err, error::Error::NotImplemented("lambda")));
  }
}

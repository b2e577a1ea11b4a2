//! End-to-end pipeline tests. Since this
//! pipeline targets a runtime this crate does not implement, these compile
//! source text all the way to assembly and check the structural invariants
//! an assembler/linker/runtime would otherwise confirm by actually running
//! the program: the `print_ptr` call carrying the expected literal operand
//! where it's statically foldable, the vector header tag, the presence of
//! a `collect` call once the heap threshold is crossed, and so on.

use std::io::Write as _;
use std::process::Command;

use lispcc::emit::Target;

fn compile(src: &str) -> String {
  let ast = lispcc::parser::parse(src).expect("parse");
  lispcc::compile(&ast, Target::Linux).expect("compile")
}

#[test]
fn addition_prints_via_runtime_call() {
  let asm = compile("(+ 10 32)");
  assert!(asm.contains("call\tprint_ptr"));
  assert!(asm.contains("movq\t$0, %rax"));
}

#[test]
fn let_bound_addition_compiles() {
  let asm = compile("(let ([x 10] [y 32]) (+ x y))");
  assert!(asm.contains("addq"));
  assert!(asm.contains("call\tprint_ptr"));
}

#[test]
fn shadowed_let_binding_compiles_after_uniquify() {
  // Inner `x` must alpha-rename distinctly from outer `x`; if it didn't,
  // flatten would see a variable re-assigned with two different static
  // types in degenerate cases, or the allocator would merge their live
  // ranges incorrectly. Compiling at all without an internal error
  // exercises that uniquify actually ran.
  let asm = compile("(let ([x 10]) (let ([x 32]) x))");
  assert!(asm.contains("call\tprint_ptr"));
}

#[test]
fn if_with_comparison_emits_a_conditional_jump() {
  let asm = compile("(if (< 1 2) 7 9)");
  assert!(["je", "jl", "jle", "jg", "jge"].iter().any(|cc| asm.contains(&format!("{cc}\t"))));
  // internal labels are present and unmangled
  assert!(asm.contains("@@IF_T_0:"));
  assert!(asm.contains("@@IF_F_0:"));
  assert!(asm.contains("@@IF_S_0:"));
}

#[test]
fn eq_and_not_compose() {
  let asm = compile("(if (eq? #t (not #f)) 1 0)");
  assert!(asm.contains("sete") || asm.contains("xorq"));
}

#[test]
fn vector_literal_and_two_refs_allocate_and_add() {
  let asm = compile("(let ([v (vector 1 2 3)]) (+ (vector-ref v 0) (vector-ref v 2)))");
  // 3-element, all-int vector: header tag is forwarding(1) | len(3)<<1 | mask(0)<<7 == 7.
  assert!(asm.contains("$7,"), "expected the vector header tag 7 in:\n{asm}");
  assert!(asm.contains("fromspace_end"));
}

#[test]
fn enough_vector_allocations_to_force_a_collect_call() {
  // Each vector is exposed with its own room-check `if`, so a long chain of
  // allocations contains at least one `Collect` node lowered to a `collect`
  // call, regardless of the actual runtime heap size (which this pipeline
  // does not simulate).
  let src = "(let ([a (vector 1)]) (let ([b (vector 2)]) (let ([c (vector 3)]) \
    (+ (vector-ref a 0) (+ (vector-ref b 0) (vector-ref c 0))))))";
  let asm = compile(src);
  assert!(asm.contains("call\tcollect"));
}

#[test]
fn ill_typed_program_is_rejected_before_codegen() {
  let ast = lispcc::parser::parse("(+ 1 #t)").unwrap();
  let err = lispcc::compile(&ast, Target::Linux).unwrap_err();
  assert!(matches!(err, lispcc::error::Error::Type(_)));
}

#[test]
fn darwin_target_mangles_main_and_runtime_calls() {
  let ast = lispcc::parser::parse("(+ 1 2)").unwrap();
  let asm = lispcc::compile(&ast, Target::Darwin).unwrap();
  assert!(asm.contains("_main:"));
  assert!(asm.contains("call\t_print_ptr"));
  assert!(!asm.contains("@@IF")); // this program has no conditional
}

#[test]
fn cli_writes_compiled_assembly_to_output_file() {
  let mut input = tempfile::NamedTempFile::new().expect("create input file");
  write!(input, "(+ 10 32)").expect("write source");
  let output = tempfile::NamedTempFile::new().expect("create output file");

  let status = Command::new(env!("CARGO_BIN_EXE_lispcc"))
    .arg(input.path())
    .arg("-o")
    .arg(output.path())
    .status()
    .expect("run lispcc");
  assert!(status.success());

  let asm = std::fs::read_to_string(output.path()).expect("read output");
  assert!(asm.contains("call\tprint_ptr"));
}

//! Emit assembly: renders a patched [`FlatProgram`] as AT&T
//! syntax x86-64 assembly text.
//!
//! Two targets are supported, differing only in symbol mangling and section
//! boilerplate: Darwin (macOS) mangles every
//! external/user label with a leading underscore and needs no
//! `.note.GNU-stack` trailer; Linux does the opposite. Compiler-synthesized
//! labels (prefixed [`crate::lower_conditionals::INTERNAL_LABEL_PREFIX`])
//! are never mangled on either target — they're local to the function body,
//! not linker-visible symbols.

use std::fmt::Write as _;

use crate::lower_conditionals::INTERNAL_LABEL_PREFIX;
use crate::regs::PReg;
use crate::types::x86::{FlatProgram, Inst, Operand};

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Target { Darwin, Linux }

impl Target {
  #[must_use]
  pub fn mangle(self, name: &str) -> String {
    if name.starts_with(INTERNAL_LABEL_PREFIX) { return name.to_owned() }
    match self {
      Target::Darwin => format!("_{name}"),
      Target::Linux => name.to_owned(),
    }
  }
}

pub fn emit(prog: &FlatProgram, target: Target) -> String {
  let mut out = String::new();
  writeln!(out, "\t.globl {}", target.mangle("main")).unwrap();
  writeln!(out, "\t.text").unwrap();
  writeln!(out, "\t.p2align\t4").unwrap();
  writeln!(out, "{}:", target.mangle("main")).unwrap();

  for inst in &prog.body {
    emit_inst(&mut out, inst, target);
  }

  if target == Target::Linux {
    writeln!(out, "\t.section .note.GNU-stack,\"\",@progbits").unwrap();
  }
  out
}

fn emit_inst(out: &mut String, inst: &Inst, target: Target) {
  match inst {
    Inst::Label(l) if l.starts_with(INTERNAL_LABEL_PREFIX) => { writeln!(out, "{l}:").unwrap(); }
    Inst::Label(l) => { writeln!(out, "{}:", target.mangle(l)).unwrap(); }
    Inst::Prologue | Inst::Epilogue => unreachable!("patch-instruction must run before emit"),

    Inst::Mov(a, b) => emit2(out, "movq", a, b, target),
    Inst::Movzb(a, b) => emit2(out, "movzbq", a, b, target),
    Inst::Add(a, b) => emit2(out, "addq", a, b, target),
    Inst::Sub(a, b) => emit2(out, "subq", a, b, target),
    Inst::Xor(a, b) => emit2(out, "xorq", a, b, target),
    Inst::Cmp(a, b) => emit2(out, "cmpq", a, b, target),
    Inst::Neg(a) => writeln!(out, "\tnegq\t{}", operand(a, target)).unwrap(),
    Inst::Push(a) => writeln!(out, "\tpushq\t{}", operand(a, target)).unwrap(),
    Inst::Pop(a) => writeln!(out, "\tpopq\t{}", operand(a, target)).unwrap(),
    Inst::Ret => writeln!(out, "\tret").unwrap(),
    Inst::Set(cc, a) => writeln!(out, "\tset{}\t{}", cc.mnemonic(), operand(a, target)).unwrap(),
    Inst::Jmp(l) => writeln!(out, "\tjmp\t{}", label_operand(l, target)).unwrap(),
    Inst::JmpIf(cc, l) => writeln!(out, "\tj{}\t{}", cc.mnemonic(), label_operand(l, target)).unwrap(),
    Inst::Call(name) => writeln!(out, "\tcall\t{}", target.mangle(name)).unwrap(),
  }
}

fn emit2(out: &mut String, mnemonic: &str, a: &Operand, b: &Operand, target: Target) {
  writeln!(out, "\t{mnemonic}\t{}, {}", operand(a, target), operand(b, target)).unwrap();
}

fn label_operand(l: &str, target: Target) -> String {
  if l.starts_with(INTERNAL_LABEL_PREFIX) { l.to_owned() } else { target.mangle(l) }
}

fn operand(op: &Operand, target: Target) -> String {
  match op {
    Operand::Imm(n) => format!("${n}"),
    Operand::Reg(r) => format!("%{}", r.name64()),
    Operand::ByteReg(r) => format!("%{}", r.name8()),
    Operand::Deref(r, off) => format!("{off}(%{})", r.name64()),
    Operand::Label(l) => label_operand(l, target),
    Operand::Global(name) => format!("{}(%rip)", target.mangle(name.as_str())),
    Operand::Var(_) => unreachable!("allocate-locations must remove all Operand::Var before emit"),
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  fn prog(body: Vec<Inst>) -> FlatProgram { FlatProgram { body, stack_size: 0 } }

  #[test]
  fn darwin_mangles_main_and_calls() {
    let out = emit(&prog(vec![Inst::Call("read_int"), Inst::Ret]), Target::Darwin);
    assert!(out.contains("_main:"));
    assert!(out.contains("call\t_read_int"));
  }

  #[test]
  fn linux_does_not_mangle_and_adds_note_gnu_stack() {
    let out = emit(&prog(vec![Inst::Ret]), Target::Linux);
    assert!(out.contains("\nmain:"));
    assert!(out.contains(".note.GNU-stack"));
  }

  #[test]
  fn header_includes_alignment_pragma_before_main_label() {
    let out = emit(&prog(vec![Inst::Ret]), Target::Darwin);
    let align_pos = out.find(".p2align").expect("alignment pragma present");
    let main_pos = out.find("_main:").expect("main label present");
    assert!(align_pos < main_pos);
  }

  #[test]
  fn internal_labels_are_never_mangled() {
    let out = emit(
      &prog(vec![Inst::JmpIf(crate::types::x86::Cc::E, "@@IF_T_0".to_owned()), Inst::Label("@@IF_T_0".to_owned())]),
      Target::Darwin,
    );
    assert!(out.contains("je\t@@IF_T_0"));
    assert!(out.contains("@@IF_T_0:"));
    assert!(!out.contains("_@@IF_T_0"));
  }

  #[test]
  fn registers_and_immediates_render_in_att_order() {
    let out = emit(&prog(vec![Inst::Mov(Operand::Imm(42), Operand::Reg(PReg::Rax))]), Target::Linux);
    assert!(out.contains("movq\t$42, %rax"));
  }
}

//! Patch instruction: the last rewrite before emission. Replaces
//! the `Prologue`/`Epilogue` placeholders with the concrete frame setup/teardown
//! now that `stack_size` is known, and splits any instruction pair that the
//! x86-64 encoding cannot express directly:
//!
//! - two memory operands on one instruction (`mem, mem` is illegal) — routed
//!   through `%rax`.
//! - an immediate second operand to `cmp` (the assembler accepts it, but this
//!   pipeline's `emit_cmp` convention always wants the compared value in a
//!   register) — loaded into `%rax` first.
//! - `movzbq` with a memory destination (`MOVZX` has no memory-destination
//!   encoding) — widened into `%rax` first, then stored.

use crate::regs::PReg;
use crate::types::x86::{FlatProgram, Inst, Operand};

pub fn patch(prog: FlatProgram) -> FlatProgram {
  let mut body = Vec::with_capacity(prog.body.len() + 8);
  for inst in prog.body {
    match inst {
      Inst::Prologue => body.extend(prologue(prog.stack_size)),
      Inst::Epilogue => body.extend(epilogue(prog.stack_size)),
      other => body.extend(patch_inst(other)),
    }
  }
  FlatProgram { body, stack_size: prog.stack_size }
}

fn prologue(stack_size: u32) -> Vec<Inst> {
  let mut out = vec![Inst::Push(Operand::Reg(PReg::Rbp)), Inst::Mov(Operand::Reg(PReg::Rsp), Operand::Reg(PReg::Rbp))];
  if stack_size != 0 {
    out.push(Inst::Sub(Operand::Imm(i64::from(stack_size)), Operand::Reg(PReg::Rsp)));
  }
  out
}

fn epilogue(stack_size: u32) -> Vec<Inst> {
  let mut out = Vec::with_capacity(3);
  if stack_size != 0 {
    out.push(Inst::Add(Operand::Imm(i64::from(stack_size)), Operand::Reg(PReg::Rsp)));
  }
  out.push(Inst::Pop(Operand::Reg(PReg::Rbp)));
  out.push(Inst::Ret);
  out
}

/// Splits a two-operand instruction whose operands cannot both be memory,
/// by routing the source through `%rax` first. `%rax` is free
/// at patch-instruction time because allocate-locations never colors a
/// variable into it (it is reserved) and every caller-save
/// clobber across a `call` is already accounted for by the allocator.
fn split_mem_mem(a: Operand, b: Operand, build: impl Fn(Operand, Operand) -> Inst) -> Vec<Inst> {
  if a.is_mem() && b.is_mem() {
    vec![Inst::Mov(a, Operand::Reg(PReg::Rax)), build(Operand::Reg(PReg::Rax), b)]
  } else {
    vec![build(a, b)]
  }
}

fn patch_inst(inst: Inst) -> Vec<Inst> {
  match inst {
    Inst::Mov(a, b) => split_mem_mem(a, b, Inst::Mov),

    // `movzbq` has no memory-destination encoding: widen into %rax, then
    // store. The source is always %al (this pipeline's only `movzb` source),
    // never memory, so only the destination needs guarding.
    Inst::Movzb(a, b) if b.is_mem() => {
      vec![Inst::Movzb(a, Operand::Reg(PReg::Rax)), Inst::Mov(Operand::Reg(PReg::Rax), b)]
    }
    Inst::Movzb(a, b) => split_mem_mem(a, b, Inst::Movzb),

    Inst::Add(a, b) => split_mem_mem(a, b, Inst::Add),
    Inst::Sub(a, b) => split_mem_mem(a, b, Inst::Sub),
    Inst::Xor(a, b) => split_mem_mem(a, b, Inst::Xor),

    // `cmp` additionally can't take an immediate as its second (destination)
    // operand under this emitter's convention; route through `%rax` too.
    Inst::Cmp(a, b) => {
      if matches!(b, Operand::Imm(_)) {
        vec![Inst::Mov(b, Operand::Reg(PReg::Rax)), Inst::Cmp(a, Operand::Reg(PReg::Rax))]
      } else {
        split_mem_mem(a, b, Inst::Cmp)
      }
    }

    other => vec![other],
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  fn prog(body: Vec<Inst>, stack_size: u32) -> FlatProgram { FlatProgram { body, stack_size } }

  #[test]
  fn prologue_and_epilogue_use_final_stack_size() {
    let out = patch(prog(vec![Inst::Prologue, Inst::Epilogue], 32));
    assert!(matches!(out.body[2], Inst::Sub(Operand::Imm(32), _)));
    assert!(matches!(out.body[3], Inst::Add(Operand::Imm(32), _)));
  }

  #[test]
  fn mem_mem_mov_is_split_through_rax() {
    let a = Operand::Deref(PReg::Rbp, -8);
    let b = Operand::Deref(PReg::Rbp, -16);
    let out = patch(prog(vec![Inst::Mov(a.clone(), b.clone())], 0));
    assert_eq!(out.body.len(), 2);
    assert!(matches!(&out.body[0], Inst::Mov(src, Operand::Reg(PReg::Rax)) if *src == a));
    assert!(matches!(&out.body[1], Inst::Mov(Operand::Reg(PReg::Rax), dst) if *dst == b));
  }

  #[test]
  fn prologue_and_epilogue_omit_stack_adjustment_when_size_is_zero() {
    let out = patch(prog(vec![Inst::Prologue, Inst::Epilogue], 0));
    assert_eq!(out.body.len(), 4);
    assert!(matches!(out.body[0], Inst::Push(_)));
    assert!(matches!(out.body[1], Inst::Mov(Operand::Reg(PReg::Rsp), Operand::Reg(PReg::Rbp))));
    assert!(matches!(out.body[2], Inst::Pop(_)));
    assert!(matches!(out.body[3], Inst::Ret));
  }

  #[test]
  fn movzb_with_memory_destination_is_routed_through_rax() {
    let dst = Operand::Deref(PReg::Rbp, -8);
    let out = patch(prog(vec![Inst::Movzb(Operand::ByteReg(PReg::Rax), dst.clone())], 0));
    assert_eq!(out.body.len(), 2);
    assert!(matches!(&out.body[0], Inst::Movzb(Operand::ByteReg(PReg::Rax), Operand::Reg(PReg::Rax))));
    assert!(matches!(&out.body[1], Inst::Mov(Operand::Reg(PReg::Rax), d) if *d == dst));
  }

  #[test]
  fn cmp_with_immediate_second_operand_is_routed_through_rax() {
    let out = patch(prog(vec![Inst::Cmp(Operand::Reg(PReg::Rcx), Operand::Imm(5))], 0));
    assert_eq!(out.body.len(), 2);
    assert!(matches!(out.body[0], Inst::Mov(Operand::Imm(5), Operand::Reg(PReg::Rax))));
    assert!(matches!(out.body[1], Inst::Cmp(Operand::Reg(PReg::Rcx), Operand::Reg(PReg::Rax))));
  }

  #[test]
  fn register_operands_pass_through_unchanged() {
    let out = patch(prog(vec![Inst::Add(Operand::Reg(PReg::Rcx), Operand::Reg(PReg::Rdx))], 0));
    assert_eq!(out.body.len(), 1);
  }
}

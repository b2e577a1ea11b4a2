//! Select instruction: converts each IR statement into a list of abstract
//! x86 instructions, wrapping the whole body as `prologue · body ·
//! epilogue`.

use crate::error::{Error, Result};
use crate::regs::{VarTable, ROOTSTACK_BASE, SCRATCH};
use crate::types::ir::{Arg, IrExpr, Program as IrProgram, Stmt};
use crate::types::x86::{Cc, Elem, Inst, Operand, Program as X86Program, TmpIf};
use crate::types::{CmpOp, Prim};

pub fn select(prog: &IrProgram) -> Result<X86Program> {
  let vars = VarTable::from_vars(&prog.vars);
  let mut body = vec![Elem::Inst(Inst::Prologue)];
  body.extend(select_stmts(&prog.stmts)?);
  body.push(Elem::Inst(Inst::Epilogue));
  Ok(X86Program { vars, body, live_after: Vec::new(), stack_size: 0 })
}

fn select_stmts(stmts: &[Stmt]) -> Result<Vec<Elem>> {
  let mut out = Vec::new();
  for s in stmts { select_stmt(s, &mut out)?; }
  Ok(out)
}

fn lower_arg(a: &Arg) -> Operand {
  match a {
    Arg::Int(n) => Operand::Imm(*n),
    Arg::Bool(true) => Operand::Imm(1),
    Arg::Bool(false) => Operand::Imm(0),
    Arg::Void => Operand::Imm(0),
    Arg::Var(s) => Operand::Var(*s),
  }
}

fn emit_cmp(op: CmpOp, a: &Arg, b: &Arg, out: &mut Vec<Elem>) -> Cc {
  // Operands are intentionally flipped to match the AT&T comparison
  // convention this emitter targets.
  out.push(Elem::Inst(Inst::Cmp(lower_arg(b), lower_arg(a))));
  Cc::from_cmp(op)
}

fn select_stmt(s: &Stmt, out: &mut Vec<Elem>) -> Result<()> {
  match s {
    Stmt::Assign(v, expr) => select_assign(*v, expr, out),
    Stmt::Return(a) => {
      out.push(Elem::Inst(Inst::ReturnFromFunction(lower_arg(a))));
      Ok(())
    }
    Stmt::Collect(bytes) => {
      out.push(Elem::Inst(Inst::Push(Operand::Reg(crate::regs::PReg::Rdi))));
      out.push(Elem::Inst(Inst::Push(Operand::Reg(crate::regs::PReg::Rsi))));
      out.push(Elem::Inst(Inst::Mov(Operand::Reg(ROOTSTACK_BASE), Operand::Reg(crate::regs::PReg::Rdi))));
      out.push(Elem::Inst(Inst::Mov(Operand::Imm(i64::from(*bytes)), Operand::Reg(crate::regs::PReg::Rsi))));
      out.push(Elem::Inst(Inst::Call("collect")));
      out.push(Elem::Inst(Inst::Pop(Operand::Reg(crate::regs::PReg::Rsi))));
      out.push(Elem::Inst(Inst::Pop(Operand::Reg(crate::regs::PReg::Rdi))));
      Ok(())
    }
    Stmt::If(op, a, b, then_stmts, else_stmts) => {
      let cc = emit_cmp(*op, a, b, out);
      let then_body = select_stmts(then_stmts)?;
      let else_body = select_stmts(else_stmts)?;
      out.push(Elem::TmpIf(TmpIf::new(cc, then_body, else_body)));
      Ok(())
    }
  }
}

fn select_assign(v: crate::symbol::Symbol, expr: &IrExpr, out: &mut Vec<Elem>) -> Result<()> {
  let dst = Operand::Var(v);
  match expr {
    IrExpr::Arg(a) => out.push(Elem::Inst(Inst::Mov(lower_arg(a), dst))),

    IrExpr::Apply(Prim::Neg, args) => {
      out.push(Elem::Inst(Inst::Mov(lower_arg(&args[0]), dst.clone())));
      out.push(Elem::Inst(Inst::Neg(dst)));
    }
    IrExpr::Apply(Prim::Add, args) => {
      out.push(Elem::Inst(Inst::Mov(lower_arg(&args[0]), dst.clone())));
      out.push(Elem::Inst(Inst::Add(lower_arg(&args[1]), dst)));
    }
    IrExpr::Apply(Prim::Not, args) => {
      out.push(Elem::Inst(Inst::Mov(lower_arg(&args[0]), dst.clone())));
      out.push(Elem::Inst(Inst::Xor(Operand::Imm(1), dst)));
    }
    IrExpr::Apply(Prim::ReadInt, _) => {
      out.push(Elem::Inst(Inst::Call("read_int")));
      out.push(Elem::Inst(Inst::Mov(Operand::Reg(crate::regs::PReg::Rax), dst)));
    }
    IrExpr::Apply(Prim::ReadBool, _) => {
      out.push(Elem::Inst(Inst::Call("read_bool")));
      out.push(Elem::Inst(Inst::Mov(Operand::Reg(crate::regs::PReg::Rax), dst)));
    }
    IrExpr::Apply(p, _) => return Err(Error::compile(format!("`{}` should have been desugared before select-instruction", p.name()))),

    IrExpr::Cmp(op, a, b) => {
      let cc = emit_cmp(*op, a, b, out);
      let al = Operand::ByteReg(crate::regs::PReg::Rax);
      out.push(Elem::Inst(Inst::Set(cc, al.clone())));
      out.push(Elem::Inst(Inst::Movzb(al, dst)));
    }

    IrExpr::VectorRef(u, idx) => {
      out.push(Elem::Inst(Inst::Mov(Operand::Var(*u), Operand::Reg(SCRATCH))));
      out.push(Elem::Inst(Inst::Mov(Operand::Deref(SCRATCH, slot_offset(*idx)), dst)));
    }

    IrExpr::VectorSet(u, idx, a) => {
      out.push(Elem::Inst(Inst::Mov(Operand::Var(*u), Operand::Reg(SCRATCH))));
      out.push(Elem::Inst(Inst::Mov(lower_arg(a), Operand::Deref(SCRATCH, slot_offset(*idx)))));
      out.push(Elem::Inst(Inst::Mov(Operand::Imm(0), dst)));
    }

    IrExpr::Allocate(n, ty) => {
      let bytes = 8 * (i64::from(*n) + 1);
      out.push(Elem::Inst(Inst::Mov(Operand::Global(crate::types::free_ptr()), dst.clone())));
      out.push(Elem::Inst(Inst::Add(Operand::Imm(bytes), Operand::Global(crate::types::free_ptr()))));
      out.push(Elem::Inst(Inst::Mov(dst, Operand::Reg(SCRATCH))));
      out.push(Elem::Inst(Inst::Mov(Operand::Imm(vector_tag(*n, ty)), Operand::Deref(SCRATCH, 0))));
    }

    IrExpr::GlobalValue(name) => out.push(Elem::Inst(Inst::Mov(Operand::Global(*name), dst))),
  }
  Ok(())
}

/// Element `i` lives at `8*(i+1)(%r11)` — one header word ahead of the vector
/// base pointer.
fn slot_offset(i: u32) -> i32 { 8 * (i32::try_from(i).expect("vector too long") + 1) }

/// The vector header tag: bit 0 = forwarding flag (1 = not yet forwarded),
/// bits 1..6 = length, bits 7..(7+n-1) = pointer mask (set iff the
/// corresponding slot is itself a vector).
fn vector_tag(n: u32, ty: &crate::types::StaticType) -> i64 {
  let elems = ty.vector_elems().expect("Allocate's type must be a vector type");
  assert_eq!(elems.len(), n as usize);
  assert!(n < 1 << 6, "vector length {n} does not fit in the 6-bit length field");
  let mut tag: i64 = 1; // forwarding flag
  tag |= i64::from(n) << 1;
  for (i, t) in elems.iter().enumerate() {
    if matches!(t, crate::types::StaticType::Vector(_)) { tag |= 1 << (7 + i); }
  }
  tag
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn tag_encodes_length_and_pointer_mask() {
    let ty = crate::types::StaticType::vector(vec![
      crate::types::StaticType::Int,
      crate::types::StaticType::vector(vec![crate::types::StaticType::Int]),
      crate::types::StaticType::Bool,
    ]);
    let tag = vector_tag(3, &ty);
    assert_eq!(tag & 1, 1);
    assert_eq!((tag >> 1) & 0x3f, 3);
    assert_eq!((tag >> 7) & 0b111, 0b010);
  }

  #[test]
  fn program_is_wrapped_in_prologue_and_epilogue() {
    let prog = IrProgram { vars: Vec::new(), stmts: vec![Stmt::Return(Arg::Int(42))] };
    let x86 = select(&prog).unwrap();
    assert!(matches!(x86.body.first(), Some(Elem::Inst(Inst::Prologue))));
    assert!(matches!(x86.body.last(), Some(Elem::Inst(Inst::Epilogue))));
  }
}

//! Uncover live: computes the live-after set of variables for every
//! instruction, in reverse instruction order, recursing into `TmpIf`
//! branches with the same live-after-block seed.
//!
//! `L_before(i) = (L_after(i) \ Writes(i)) ∪ Reads(i)`.

use bit_set::BitSet;
use smallvec::SmallVec;

use crate::regs::VarTable;
use crate::types::x86::{Elem, Inst, Operand, Program};

pub fn uncover_live(prog: Program) -> Program {
  let (body, live_after, _before) = uncover_block(prog.body, &BitSet::new(), &prog.vars);
  Program { body, live_after, ..prog }
}

fn var_id(op: &Operand, vars: &VarTable) -> Option<usize> { op.as_var().map(|s| vars.id_of(s)) }

/// Reads and writes of a single flat instruction, as variable ids.
fn rw_sets(inst: &Inst, vars: &VarTable) -> (SmallVec<[usize; 2]>, SmallVec<[usize; 2]>) {
  let mut reads = SmallVec::new();
  let mut writes = SmallVec::new();
  match inst {
    Inst::Mov(src, dst) | Inst::Movzb(src, dst) => {
      reads.extend(var_id(src, vars));
      writes.extend(var_id(dst, vars));
    }
    Inst::Add(src, dst) | Inst::Sub(src, dst) | Inst::Xor(src, dst) => {
      reads.extend(var_id(src, vars));
      reads.extend(var_id(dst, vars));
      writes.extend(var_id(dst, vars));
    }
    Inst::Neg(dst) => {
      reads.extend(var_id(dst, vars));
      writes.extend(var_id(dst, vars));
    }
    Inst::Cmp(a, b) => {
      reads.extend(var_id(a, vars));
      reads.extend(var_id(b, vars));
    }
    Inst::ReturnFromFunction(a) => reads.extend(var_id(a, vars)),
    Inst::Push(op) | Inst::Pop(op) => {
      // Only ever fixed physical registers in this pipeline (the
      // caller-save push/pop around a `collect` call); no variable ids to track.
      debug_assert!(var_id(op, vars).is_none());
    }
    Inst::Call(_) | Inst::Ret | Inst::Set(..) | Inst::Jmp(_) | Inst::JmpIf(..)
    | Inst::Label(_) | Inst::Prologue | Inst::Epilogue => {}
  }
  (reads, writes)
}

fn uncover_block(elems: Vec<Elem>, seed_live_after: &BitSet, vars: &VarTable) -> (Vec<Elem>, Vec<BitSet>, BitSet) {
  let mut live = seed_live_after.clone();
  let mut rev_elems = Vec::with_capacity(elems.len());
  let mut rev_live_after = Vec::with_capacity(elems.len());

  for elem in elems.into_iter().rev() {
    rev_live_after.push(live.clone());
    let new_elem = match elem {
      Elem::Inst(inst) => {
        let (reads, writes) = rw_sets(&inst, vars);
        for w in writes { live.remove(w); }
        for r in reads { live.insert(r); }
        Elem::Inst(inst)
      }
      Elem::TmpIf(tmpif) => {
        let (then_b, then_la, then_before) = uncover_block(tmpif.then_branch, &live, vars);
        let (else_b, else_la, else_before) = uncover_block(tmpif.else_branch, &live, vars);
        let mut before = then_before;
        before.union_with(&else_before);
        before.union_with(&live);
        live = before;
        Elem::TmpIf(crate::types::x86::TmpIf {
          cc: tmpif.cc,
          then_branch: then_b,
          else_branch: else_b,
          then_live_after: then_la,
          else_live_after: else_la,
        })
      }
    };
    rev_elems.push(new_elem);
  }

  rev_elems.reverse();
  rev_live_after.reverse();
  (rev_elems, rev_live_after, live)
}

//! Lower conditionals: rewrites every `TmpIf` into a flat
//! sequence of labels and jumps. Labels are allocated from a single counter
//! with an internal prefix (`@@IF_{T|F|S}_k`) that marks them as
//! compiler-synthesized — the marker later tells emit not to name-mangle
//! them, unlike runtime or user labels.

use crate::types::x86::{Elem, FlatProgram, Inst, Program};

/// The reserved marker distinguishing compiler-synthesized labels from
/// runtime/user labels; stripped at emission.
pub const INTERNAL_LABEL_PREFIX: &str = "@@IF_";

struct LabelCounter(u32);

impl LabelCounter {
  fn next(&mut self) -> u32 { let k = self.0; self.0 += 1; k }
}

pub fn lower(prog: Program) -> FlatProgram {
  let mut counter = LabelCounter(0);
  let body = lower_elems(prog.body, &mut counter);
  FlatProgram { body, stack_size: prog.stack_size }
}

fn lower_elems(elems: Vec<Elem>, counter: &mut LabelCounter) -> Vec<Inst> {
  let mut out = Vec::with_capacity(elems.len());
  for elem in elems {
    match elem {
      Elem::Inst(inst) => out.push(inst),
      Elem::TmpIf(tmpif) => {
        let k = counter.next();
        let l_true = format!("{INTERNAL_LABEL_PREFIX}T_{k}");
        let l_false = format!("{INTERNAL_LABEL_PREFIX}F_{k}");
        let l_sink = format!("{INTERNAL_LABEL_PREFIX}S_{k}");

        out.push(Inst::JmpIf(tmpif.cc, l_true.clone()));
        out.push(Inst::Label(l_false));
        out.extend(lower_elems(tmpif.else_branch, counter));
        out.push(Inst::Jmp(l_sink.clone()));
        out.push(Inst::Label(l_true));
        out.extend(lower_elems(tmpif.then_branch, counter));
        out.push(Inst::Label(l_sink));
      }
    }
  }
  out
}

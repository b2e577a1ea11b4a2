//! Allocate locations: saturation-driven graph coloring with move-bias.
//! Builds an interference graph and a move-relation graph over
//! source variables, colors every variable with a register or a spill slot,
//! rewrites every `Operand::Var` to its assigned location, lowers
//! `ReturnFromFunction` to the program-return sequence, and deletes the
//! moves coloring turned into no-ops.

use std::collections::{HashMap, HashSet};

use bit_set::BitSet;

use crate::regs::{PReg, StackSlot, VarTable, CALLER_SAVE, FREE_REGS};
use crate::types::x86::{Elem, Inst, Location, Operand, Program, TmpIf};

/// Undirected variable-variable adjacency: interferes-with.
#[derive(Default)]
struct Graph(HashMap<usize, HashSet<usize>>);

impl Graph {
  fn add_edge(&mut self, a: usize, b: usize) {
    if a == b { return }
    self.0.entry(a).or_default().insert(b);
    self.0.entry(b).or_default().insert(a);
  }
  fn touch(&mut self, v: usize) { self.0.entry(v).or_default(); }
  fn neighbors(&self, v: usize) -> impl Iterator<Item = usize> + '_ {
    self.0.get(&v).into_iter().flat_map(|s| s.iter().copied())
  }
}

/// Per-variable forbidden-register sets: the interference graph's edges to
/// *registers* rather than to other variables. Seeded from
/// `call`/`ReturnFromFunction` constraints, then grown during coloring (the
/// chosen location is added to the saturation set of every interfering
/// neighbor once a variable is colored).
#[derive(Default)]
struct Saturation(HashMap<usize, HashSet<PReg>>);

impl Saturation {
  fn add(&mut self, v: usize, r: PReg) { self.0.entry(v).or_default().insert(r); }
  fn get(&self, v: usize) -> HashSet<PReg> { self.0.get(&v).cloned().unwrap_or_default() }
}

pub fn allocate(prog: Program) -> Program {
  let mut ig = Graph::default();
  let mut mg = Graph::default();
  let mut sat = Saturation::default();
  for (id, _) in prog.vars.iter() { ig.touch(id); }

  build_graphs(&prog.body, &prog.live_after, &prog.vars, &mut ig, &mut mg, &mut sat);

  let (colors, stack_size) = color(&ig, &mg, sat, &prog.vars);

  let new_body = rewrite_block(prog.body, &colors, &prog.vars);
  let new_body = remove_noop_moves(new_body);

  Program { body: new_body, live_after: Vec::new(), stack_size, vars: prog.vars }
}

fn build_graphs(elems: &[Elem], live_after: &[BitSet], vars: &VarTable, ig: &mut Graph, mg: &mut Graph, sat: &mut Saturation) {
  for (elem, la) in elems.iter().zip(live_after) {
    match elem {
      Elem::Inst(inst) => add_edges_for_inst(inst, la, vars, ig, mg, sat),
      Elem::TmpIf(tmpif) => {
        build_graphs(&tmpif.then_branch, &tmpif.then_live_after, vars, ig, mg, sat);
        build_graphs(&tmpif.else_branch, &tmpif.else_live_after, vars, ig, mg, sat);
      }
    }
  }
}

fn add_edges_for_inst(inst: &Inst, live_after: &BitSet, vars: &VarTable, ig: &mut Graph, mg: &mut Graph, sat: &mut Saturation) {
  let var_of = |op: &Operand| op.as_var().map(|s| vars.id_of(s));
  match inst {
    Inst::Mov(src, dst) | Inst::Movzb(src, dst) => {
      if let Some(d) = var_of(dst) {
        let s = var_of(src);
        for v in live_after.iter() {
          if Some(v) == s || v == d { continue }
          ig.add_edge(d, v);
        }
      }
      if let (Some(s), Some(d)) = (var_of(src), var_of(dst)) { mg.add_edge(s, d); }
    }
    Inst::Add(_, dst) | Inst::Sub(_, dst) | Inst::Xor(_, dst) | Inst::Neg(dst) => {
      if let Some(d) = var_of(dst) {
        for v in live_after.iter() {
          if v == d { continue }
          ig.add_edge(d, v);
        }
      }
    }
    Inst::Call(_) => {
      for v in live_after.iter() {
        for &r in CALLER_SAVE { sat.add(v, r); }
      }
    }
    Inst::ReturnFromFunction(a) => {
      let mut live = live_after.clone();
      if let Some(v) = var_of(a) { live.insert(v); }
      for v in live.iter() { sat.add(v, PReg::Rax); }
    }
    Inst::Cmp(..) | Inst::Push(_) | Inst::Pop(_) | Inst::Ret | Inst::Set(..)
    | Inst::Jmp(_) | Inst::JmpIf(..) | Inst::Label(_) | Inst::Prologue | Inst::Epilogue => {}
  }
}

fn color(ig: &Graph, mg: &Graph, mut sat: Saturation, vars: &VarTable) -> (HashMap<usize, Location>, u32) {
  let mut colors: HashMap<usize, Location> = HashMap::new();
  let mut uncolored: HashSet<usize> = (0..vars.len()).collect();
  let mut next_slot = 0u32;

  while !uncolored.is_empty() {
    // Largest saturation set first; ties broken by variable id for
    // determinism.
    let v = *uncolored
      .iter()
      .max_by_key(|&&v| (sat.get(v).len(), std::cmp::Reverse(v)))
      .expect("uncolored is non-empty");
    uncolored.remove(&v);

    let forbidden = sat.get(v);
    let mut chosen = None;
    for mv in mg.neighbors(v) {
      if let Some(Location::Reg(r)) = colors.get(&mv) {
        if !forbidden.contains(r) { chosen = Some(Location::Reg(*r)); break }
      }
    }
    if chosen.is_none() {
      chosen = FREE_REGS.iter().find(|r| !forbidden.contains(r)).map(|&r| Location::Reg(r));
    }
    let loc = chosen.unwrap_or_else(|| {
      let slot = StackSlot(next_slot);
      next_slot += 1;
      log::trace!("allocate-locations: spilling {} to slot {}", vars.symbol_of(v), slot.0);
      Location::Stack(slot)
    });

    if let Location::Reg(r) = loc {
      for n in ig.neighbors(v) { sat.add(n, r); }
    }
    colors.insert(v, loc);
  }

  let stack_bytes = next_slot * 8;
  let stack_size = stack_bytes.div_ceil(16) * 16;
  (colors, stack_size)
}

fn rewrite_block(elems: Vec<Elem>, colors: &HashMap<usize, Location>, vars: &VarTable) -> Vec<Elem> {
  elems.into_iter().flat_map(|e| rewrite_elem(e, colors, vars)).collect()
}

fn rewrite_elem(elem: Elem, colors: &HashMap<usize, Location>, vars: &VarTable) -> Vec<Elem> {
  match elem {
    Elem::Inst(inst) => rewrite_inst(inst, colors, vars),
    Elem::TmpIf(tmpif) => vec![Elem::TmpIf(TmpIf {
      cc: tmpif.cc,
      then_branch: rewrite_block(tmpif.then_branch, colors, vars),
      else_branch: rewrite_block(tmpif.else_branch, colors, vars),
      then_live_after: Vec::new(),
      else_live_after: Vec::new(),
    })],
  }
}

fn rewrite_operand(op: Operand, colors: &HashMap<usize, Location>, vars: &VarTable) -> Operand {
  match op {
    Operand::Var(s) => colors[&vars.id_of(s)].to_operand(),
    other => other,
  }
}

/// Rewrites a single flat instruction. This subset has no callable function
/// bodies, so every `ReturnFromFunction` is the program's final return and
/// expands to the same three instructions:
/// `mov a, %rdi; call print_ptr; mov $0, %rax`.
fn rewrite_inst(inst: Inst, colors: &HashMap<usize, Location>, vars: &VarTable) -> Vec<Elem> {
  let r = |op: Operand| rewrite_operand(op, colors, vars);
  if let Inst::ReturnFromFunction(a) = inst {
    return vec![
      Elem::Inst(Inst::Mov(r(a), Operand::Reg(PReg::Rdi))),
      Elem::Inst(Inst::Call("print_ptr")),
      Elem::Inst(Inst::Mov(Operand::Imm(0), Operand::Reg(PReg::Rax))),
    ];
  }
  vec![Elem::Inst(match inst {
    Inst::Mov(a, b) => Inst::Mov(r(a), r(b)),
    Inst::Movzb(a, b) => Inst::Movzb(r(a), r(b)),
    Inst::Add(a, b) => Inst::Add(r(a), r(b)),
    Inst::Sub(a, b) => Inst::Sub(r(a), r(b)),
    Inst::Xor(a, b) => Inst::Xor(r(a), r(b)),
    Inst::Neg(a) => Inst::Neg(r(a)),
    Inst::Cmp(a, b) => Inst::Cmp(r(a), r(b)),
    Inst::Set(cc, a) => Inst::Set(cc, r(a)),
    Inst::Push(a) => Inst::Push(r(a)),
    Inst::Pop(a) => Inst::Pop(r(a)),
    Inst::ReturnFromFunction(_) => unreachable!("handled above"),
    other @ (Inst::Call(_) | Inst::Ret | Inst::Jmp(_) | Inst::JmpIf(..) | Inst::Label(_)
      | Inst::Prologue | Inst::Epilogue) => other,
  })]
}

fn remove_noop_moves(elems: Vec<Elem>) -> Vec<Elem> {
  elems
    .into_iter()
    .filter_map(|e| match e {
      Elem::Inst(Inst::Mov(a, b)) if operands_equal(&a, &b) => None,
      Elem::Inst(inst) => Some(Elem::Inst(inst)),
      Elem::TmpIf(tmpif) => Some(Elem::TmpIf(TmpIf {
        cc: tmpif.cc,
        then_branch: remove_noop_moves(tmpif.then_branch),
        else_branch: remove_noop_moves(tmpif.else_branch),
        then_live_after: tmpif.then_live_after,
        else_live_after: tmpif.else_live_after,
      })),
    })
    .collect()
}

fn operands_equal(a: &Operand, b: &Operand) -> bool {
  matches!((a, b), (Operand::Reg(r1), Operand::Reg(r2)) if r1 == r2)
    || matches!((a, b), (Operand::Deref(r1, o1), Operand::Deref(r2, o2)) if r1 == r2 && o1 == o2)
}

//! Global string interner used for identifiers and primitive names.
//!
//! Interned strings are leaked once into the process-global arena, which is
//! fine for a single compilation: symbol tables never shrink and the
//! process exits shortly after emission.

use std::collections::HashMap;
use std::fmt;
use std::sync::{LazyLock, Mutex};

/// An interned identifier or primitive name. Cheap to copy, compare, and hash.
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Symbol(u32);

struct Interner {
  map: HashMap<&'static str, u32>,
  strings: Vec<&'static str>,
}

impl Interner {
  fn new() -> Self { Self { map: HashMap::new(), strings: Vec::new() } }

  fn intern(&mut self, s: &str) -> Symbol {
    if let Some(&id) = self.map.get(s) { return Symbol(id) }
    let leaked: &'static str = Box::leak(s.to_owned().into_boxed_str());
    let id = u32::try_from(self.strings.len()).expect("too many symbols");
    self.strings.push(leaked);
    self.map.insert(leaked, id);
    Symbol(id)
  }

  fn resolve(&self, sym: Symbol) -> &'static str { self.strings[sym.0 as usize] }
}

static INTERNER: LazyLock<Mutex<Interner>> = LazyLock::new(|| Mutex::new(Interner::new()));

/// Intern a string, returning a [`Symbol`] that compares equal for equal contents.
#[must_use]
pub fn intern(s: &str) -> Symbol { INTERNER.lock().expect("interner poisoned").intern(s) }

impl Symbol {
  /// Borrow the interned string. The returned slice lives for the process lifetime.
  #[must_use]
  pub fn as_str(self) -> &'static str { INTERNER.lock().expect("interner poisoned").resolve(self) }
}

impl fmt::Debug for Symbol {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result { write!(f, "{:?}", self.as_str()) }
}
impl fmt::Display for Symbol {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result { f.write_str(self.as_str()) }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn interning_is_idempotent() {
    let a = intern("free_ptr");
    let b = intern("free_ptr");
    assert_eq!(a, b);
    assert_eq!(a.as_str(), "free_ptr");
  }

  #[test]
  fn distinct_strings_get_distinct_symbols() {
    assert_ne!(intern("x"), intern("y"));
  }
}

//! Compiler error types. All four kinds are fatal: the pipeline aborts on
//! the first `Err` and surfaces it to the caller. A hand-rolled enum with
//! manual `Display`/`Error` impls, rather than a `thiserror`/`anyhow`
//! wrapper, so each pass can match exhaustively on what went wrong.

use std::fmt;

/// A fatal compiler error, tagged by which stage detected it.
#[derive(Debug)]
pub enum Error {
  /// Raised by the surface reader before any pass in the core pipeline runs.
  Lex(String),
  /// Raised by the type checker: a construct whose expected and actual types
  /// disagree, or a reference to an unbound name.
  Type(String),
  /// An internal pass invariant was violated — a bug in the compiler, not in
  /// the source program. Carries the assertion site.
  Compile(String),
  /// A syntactically recognized construct the compiler does not lower yet
  /// (`lambda`, `define`).
  NotImplemented(&'static str),
}

impl Error {
  #[must_use] pub fn ty(msg: impl Into<String>) -> Self { Error::Type(msg.into()) }
  #[must_use] pub fn compile(msg: impl Into<String>) -> Self { Error::Compile(msg.into()) }
}

impl fmt::Display for Error {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    match self {
      Error::Lex(msg) => write!(f, "parse error: {msg}"),
      Error::Type(msg) => write!(f, "type error: {msg}"),
      Error::Compile(msg) => write!(f, "internal compiler error: {msg}"),
      Error::NotImplemented(what) => write!(f, "not implemented: `{what}`"),
    }
  }
}

impl std::error::Error for Error {}

pub type Result<T> = std::result::Result<T, Error>;

//! Surface reader: a minimal hand-rolled S-expression parser producing
//! [`source::Expr`]. It sits outside the compiler pipeline proper — this
//! module exists only so the CLI has a way to turn program text into the
//! tree the pipeline starts from; it does no desugaring or validation
//! beyond syntax and arity.

use crate::error::{Error, Result};
use crate::symbol::intern;
use crate::types::source::{Expr, ExprKind};
use crate::types::Prim;

#[derive(Debug, Clone, PartialEq)]
enum Token {
  LParen,
  RParen,
  Sym(String),
  Int(i64),
}

fn lex(src: &str) -> Result<Vec<Token>> {
  let mut toks = Vec::new();
  let mut chars = src.char_indices().peekable();

  while let Some(&(i, c)) = chars.peek() {
    match c {
      c if c.is_whitespace() => { chars.next(); }
      ';' => { while chars.peek().is_some_and(|&(_, c)| c != '\n') { chars.next(); } }
      '(' | '[' => { chars.next(); toks.push(Token::LParen); }
      ')' | ']' => { chars.next(); toks.push(Token::RParen); }
      _ => {
        let start = i;
        let mut end = i;
        while let Some(&(j, c)) = chars.peek() {
          if c.is_whitespace() || c == '(' || c == ')' || c == '[' || c == ']' || c == ';' { break }
          end = j + c.len_utf8();
          chars.next();
        }
        let word = &src[start..end];
        toks.push(match word.parse::<i64>() {
          Ok(n) => Token::Int(n),
          Err(_) => Token::Sym(word.to_owned()),
        });
      }
    }
  }
  Ok(toks)
}

pub fn parse(src: &str) -> Result<Expr> {
  let toks = lex(src)?;
  let mut pos = 0;
  let e = parse_expr(&toks, &mut pos)?;
  if pos != toks.len() { return Err(Error::Lex(format!("unexpected trailing input after position {pos}"))) }
  Ok(e)
}

fn peek<'a>(toks: &'a [Token], pos: usize) -> Result<&'a Token> {
  toks.get(pos).ok_or_else(|| Error::Lex("unexpected end of input".to_owned()))
}

fn parse_expr(toks: &[Token], pos: &mut usize) -> Result<Expr> {
  match peek(toks, *pos)?.clone() {
    Token::Int(n) => { *pos += 1; Ok(Expr::untyped(ExprKind::Int(n))) }
    Token::RParen => Err(Error::Lex(format!("unexpected `)` at position {pos}"))),
    Token::Sym(s) => { *pos += 1; parse_atom(&s) }
    Token::LParen => {
      *pos += 1;
      let head = match peek(toks, *pos)? {
        Token::Sym(s) => s.clone(),
        other => return Err(Error::Lex(format!("expected an operator or keyword, found {other:?}"))),
      };
      *pos += 1;
      let e = parse_form(&head, toks, pos)?;
      expect_rparen(toks, pos)?;
      Ok(e)
    }
  }
}

fn expect_rparen(toks: &[Token], pos: &mut usize) -> Result<()> {
  match peek(toks, *pos)? {
    Token::RParen => { *pos += 1; Ok(()) }
    other => Err(Error::Lex(format!("expected `)`, found {other:?}"))),
  }
}

fn parse_atom(s: &str) -> Result<Expr> {
  match s {
    "#t" => Ok(Expr::untyped(ExprKind::Bool(true))),
    "#f" => Ok(Expr::untyped(ExprKind::Bool(false))),
    "void" => Ok(Expr::untyped(ExprKind::Void)),
    _ => Ok(Expr::untyped(ExprKind::Var(intern(s)))),
  }
}

fn parse_rest(toks: &[Token], pos: &mut usize) -> Result<Vec<Expr>> {
  let mut out = Vec::new();
  while !matches!(peek(toks, *pos)?, Token::RParen) {
    out.push(parse_expr(toks, pos)?);
  }
  Ok(out)
}

fn parse_form(head: &str, toks: &[Token], pos: &mut usize) -> Result<Expr> {
  match head {
    "let" => parse_let(toks, pos),
    "if" => {
      let c = parse_expr(toks, pos)?;
      let t = parse_expr(toks, pos)?;
      let e = parse_expr(toks, pos)?;
      Ok(Expr::untyped(ExprKind::If(Box::new(c), Box::new(t), Box::new(e))))
    }
    "vector" => Ok(Expr::untyped(ExprKind::VectorInit(parse_rest(toks, pos)?))),
    "vector-ref" => {
      let v = parse_expr(toks, pos)?;
      let idx = parse_index(toks, pos)?;
      Ok(Expr::untyped(ExprKind::VectorRef(Box::new(v), idx)))
    }
    "vector-set!" => {
      let v = parse_expr(toks, pos)?;
      let idx = parse_index(toks, pos)?;
      let val = parse_expr(toks, pos)?;
      Ok(Expr::untyped(ExprKind::VectorSet(Box::new(v), idx, Box::new(val))))
    }
    "lambda" => {
      let params = parse_params(toks, pos)?;
      let body = parse_expr(toks, pos)?;
      Ok(Expr::untyped(ExprKind::Lambda(params, Box::new(body))))
    }
    "define" => {
      let name = match peek(toks, *pos)? { Token::Sym(s) => intern(s), other => return Err(Error::Lex(format!("expected a name after `define`, found {other:?}"))) };
      *pos += 1;
      let body = parse_expr(toks, pos)?;
      Ok(Expr::untyped(ExprKind::Define(name, Box::new(body))))
    }
    name => parse_apply(name, toks, pos),
  }
}

fn parse_index(toks: &[Token], pos: &mut usize) -> Result<u32> {
  match peek(toks, *pos)? {
    Token::Int(n) if *n >= 0 => { let n = *n; *pos += 1; Ok(u32::try_from(n).expect("checked non-negative")) }
    other => Err(Error::Lex(format!("expected a non-negative integer index, found {other:?}"))),
  }
}

fn parse_params(toks: &[Token], pos: &mut usize) -> Result<Vec<crate::symbol::Symbol>> {
  match peek(toks, *pos)?.clone() {
    Token::LParen => {
      *pos += 1;
      let mut names = Vec::new();
      while let Token::Sym(s) = peek(toks, *pos)? { names.push(intern(s)); *pos += 1; }
      expect_rparen(toks, pos)?;
      Ok(names)
    }
    other => Err(Error::Lex(format!("expected a parameter list, found {other:?}"))),
  }
}

fn parse_let(toks: &[Token], pos: &mut usize) -> Result<Expr> {
  match peek(toks, *pos)?.clone() {
    Token::LParen => *pos += 1,
    other => return Err(Error::Lex(format!("expected a binding list after `let`, found {other:?}"))),
  }
  let mut binds = Vec::new();
  while matches!(peek(toks, *pos)?, Token::LParen) {
    *pos += 1;
    let name = match peek(toks, *pos)? { Token::Sym(s) => intern(s), other => return Err(Error::Lex(format!("expected a binding name, found {other:?}"))) };
    *pos += 1;
    let init = parse_expr(toks, pos)?;
    expect_rparen(toks, pos)?;
    binds.push((name, init));
  }
  expect_rparen(toks, pos)?;
  let body = parse_expr(toks, pos)?;
  Ok(Expr::untyped(ExprKind::Let(binds, Box::new(body))))
}

fn prim_named(name: &str) -> Option<Prim> {
  Some(match name {
    "+" => Prim::Add,
    "-" => Prim::Neg,
    "eq?" => Prim::EqP,
    "<" => Prim::Lt,
    "<=" => Prim::Le,
    ">" => Prim::Gt,
    ">=" => Prim::Ge,
    "and" => Prim::And,
    "or" => Prim::Or,
    "not" => Prim::Not,
    "read" | "read_int" => Prim::ReadInt,
    "read_bool" => Prim::ReadBool,
    _ => return None,
  })
}

fn parse_apply(name: &str, toks: &[Token], pos: &mut usize) -> Result<Expr> {
  let Some(prim) = prim_named(name) else {
    return Err(Error::Lex(format!("unrecognized operator `{name}`")))
  };
  let args = parse_rest(toks, pos)?;
  if args.len() != prim.arity() {
    return Err(Error::Lex(format!("`{name}` expects {} argument(s), got {}", prim.arity(), args.len())))
  }
  Ok(Expr::untyped(ExprKind::Apply(prim, args)))
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn parses_arithmetic() {
    let e = parse("(+ 10 32)").unwrap();
    assert!(matches!(e.kind, ExprKind::Apply(Prim::Add, _)));
  }

  #[test]
  fn parses_let_with_multiple_bindings() {
    let e = parse("(let ([x 1] [y 2]) (+ x y))").unwrap();
    let ExprKind::Let(binds, _) = e.kind else { panic!("expected Let") };
    assert_eq!(binds.len(), 2);
  }

  #[test]
  fn parses_nested_if_and_booleans() {
    let e = parse("(if #t 1 0)").unwrap();
    let ExprKind::If(c, t, f) = e.kind else { panic!("expected If") };
    assert!(matches!(c.kind, ExprKind::Bool(true)));
    assert!(matches!(t.kind, ExprKind::Int(1)));
    assert!(matches!(f.kind, ExprKind::Int(0)));
  }

  #[test]
  fn parses_vector_ref_with_literal_index() {
    let e = parse("(vector-ref (vector 1 2 3) 1)").unwrap();
    assert!(matches!(e.kind, ExprKind::VectorRef(_, 1)));
  }

  #[test]
  fn rejects_wrong_arity() {
    assert!(parse("(+ 1)").is_err());
  }

  #[test]
  fn rejects_unrecognized_operator() {
    assert!(parse("(frobnicate 1 2)").is_err());
  }

  #[test]
  fn read_and_read_int_are_synonyms() {
    let a = parse("(read)").unwrap();
    let b = parse("(read_int)").unwrap();
    assert!(matches!(a.kind, ExprKind::Apply(Prim::ReadInt, _)));
    assert!(matches!(b.kind, ExprKind::Apply(Prim::ReadInt, _)));
  }
}

//! CLI driver: `lispcc <input.lisp> [-o out]
//! [--dump-passes] [--target darwin|linux]`.

use std::fs;
use std::path::PathBuf;
use std::process::ExitCode;

use clap::{Parser, ValueEnum};
use log::{error, info};

use lispcc::emit::Target as EmitTarget;
use lispcc::PassDump;

#[derive(Clone, Copy, Debug, ValueEnum)]
enum TargetArg { Darwin, Linux }

impl From<TargetArg> for EmitTarget {
  fn from(t: TargetArg) -> Self {
    match t { TargetArg::Darwin => EmitTarget::Darwin, TargetArg::Linux => EmitTarget::Linux }
  }
}

#[derive(Parser, Debug)]
#[command(name = "lispcc", about = "Ahead-of-time compiler for a small typed Lisp-family subset")]
struct Args {
  /// Path to the source file.
  input: PathBuf,

  /// Assembly output path; defaults to the input path with a `.s` extension.
  #[arg(short, long)]
  output: Option<PathBuf>,

  /// Print every intermediate pass's AST instead of writing assembly.
  #[arg(long)]
  dump_passes: bool,

  /// Emission target: Darwin mangles labels with a leading underscore, Linux
  /// does not and adds a `.note.GNU-stack` trailer.
  #[arg(long, value_enum, default_value_t = TargetArg::Linux)]
  target: TargetArg,
}

fn main() -> ExitCode {
  simplelog::SimpleLogger::init(log::LevelFilter::Info, simplelog::Config::default())
    .expect("logger already initialized");

  let args = Args::parse();
  match run(&args) {
    Ok(()) => ExitCode::SUCCESS,
    Err(e) => { error!("{e}"); ExitCode::FAILURE }
  }
}

fn run(args: &Args) -> lispcc::error::Result<()> {
  let src = fs::read_to_string(&args.input)
    .map_err(|e| lispcc::error::Error::Lex(format!("reading {}: {e}", args.input.display())))?;

  info!("parsing {}", args.input.display());
  let ast = lispcc::parser::parse(&src)?;
  let target: EmitTarget = args.target.into();

  if args.dump_passes {
    let (asm, dumps) = lispcc::compile_with_dump(&ast, target)?;
    for (i, dump) in dumps.iter().enumerate() {
      println!("--- pass {i} ---");
      print_dump(dump);
    }
    print!("{asm}");
    return Ok(());
  }

  let asm = lispcc::compile(&ast, target)?;
  let out_path = args.output.clone().unwrap_or_else(|| args.input.with_extension("s"));
  fs::write(&out_path, &asm)
    .map_err(|e| lispcc::error::Error::Compile(format!("writing {}: {e}", out_path.display())))?;
  info!("wrote {}", out_path.display());
  Ok(())
}

fn print_dump(dump: &PassDump) {
  match dump {
    PassDump::Source(s) | PassDump::Ir(s) | PassDump::X86(s) | PassDump::FlatX86(s) | PassDump::Asm(s) => println!("{s}"),
  }
}

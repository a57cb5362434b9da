use std::path::PathBuf;
use std::process::ExitCode;

use clap::{Parser as ClapParser, ValueEnum};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use resumec::context::{CompileOptions, StringEncoding, TargetCaps};
use resumec::diag::CompileError;
use resumec::driver::{CompiledProgram, compile_program};
use resumec::runtime::{DEFAULT_TICK_LIMIT, Runtime};
use resumec::ssa::model::ir::Program;

#[derive(Debug, Clone, Copy, ValueEnum)]
enum Strings {
    Narrow,
    Universal,
    Both,
}

impl From<Strings> for StringEncoding {
    fn from(value: Strings) -> Self {
        match value {
            Strings::Narrow => StringEncoding::Narrow,
            Strings::Universal => StringEncoding::Universal,
            Strings::Both => StringEncoding::Both,
        }
    }
}

#[derive(ClapParser)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// SSA program in JSON form
    #[clap(long)]
    input: PathBuf,

    /// Where to write the target file (stdout when omitted)
    #[clap(long)]
    output: Option<PathBuf>,

    /// Comma-separated list of things to dump: ssa,structure,dispatch
    #[clap(long)]
    dump: Option<String>,

    /// Skip input and slot assignment verification
    #[clap(long)]
    no_verify: bool,

    #[clap(long, value_enum, default_value = "both")]
    string_encoding: Strings,

    /// Target has native 64-bit integers
    #[clap(long)]
    native_int64: bool,

    /// Do not split statements at inner suspension points
    #[clap(long)]
    no_split: bool,

    /// Emit position lookup helpers for debuggers
    #[clap(long)]
    debug: bool,

    /// Execute the compiled program with the reference scheduler
    #[clap(long)]
    run: bool,

    #[clap(long, default_value_t = DEFAULT_TICK_LIMIT)]
    tick_limit: u64,
}

fn main() -> ExitCode {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "resumec=info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let args = Args::parse();
    match compile(&args) {
        Ok(compiled) => {
            for diag in compiled.diagnostics.iter() {
                eprintln!("{diag}");
            }
            if let Err(e) = write_output(&args, &compiled) {
                println!("[ERROR] {e}");
                return ExitCode::FAILURE;
            }
            if args.run {
                return run(&args, &compiled);
            }
            ExitCode::SUCCESS
        }
        Err(e) => {
            println!("[ERROR] {e}");
            ExitCode::FAILURE
        }
    }
}

fn compile(args: &Args) -> Result<CompiledProgram, CompileError> {
    let source =
        std::fs::read_to_string(&args.input).map_err(|e| CompileError::Io(args.input.clone(), e))?;
    let program: Program = serde_json::from_str(&source)?;

    let options = CompileOptions {
        target: TargetCaps {
            native_int64: args.native_int64,
            atomic_statements: !args.no_split,
            strings: args.string_encoding.into(),
        },
        dump: args.dump.clone(),
        verify_input: !args.no_verify,
        stop_on_error: true,
        debug_positions: args.debug,
    };
    compile_program(&program, &options)
}

fn write_output(args: &Args, compiled: &CompiledProgram) -> Result<(), CompileError> {
    match &args.output {
        Some(path) => {
            std::fs::write(path, &compiled.output).map_err(|e| CompileError::Io(path.clone(), e))?;
            println!("[SUCCESS] output written to {}", path.display());
        }
        None => print!("{}", compiled.output),
    }
    Ok(())
}

fn run(args: &Args, compiled: &CompiledProgram) -> ExitCode {
    let mut runtime = Runtime::new(compiled.routines());
    let result = runtime.boot(compiled.init, compiled.main, args.tick_limit);
    for line in runtime.output() {
        println!("{line}");
    }
    match result {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            println!("[ERROR] {e}");
            ExitCode::FAILURE
        }
    }
}

//! Whole-program driver.
//!
//! Verifies, splits and compiles every function of a program, then wraps the
//! dispatch routines in the target program file. Unsupported constructs are
//! logged and the remaining functions are still compiled, so one run reports
//! every such error; internal errors stop the run at once.

use indexmap::IndexMap;
use tracing::{debug, info, instrument, warn};

use crate::backend::codegen::emit_program;
use crate::backend::resume::{self, DispatchFn};
use crate::backend::split::split_function;
use crate::backend::structure::{BlockExit, reconstruct};
use crate::context::{CompileOptions, Directives, ProgramContext};
use crate::diag::{CompileError, Diagnostics};
use crate::ssa::analysis::cfg::Cfg;
use crate::ssa::model::format::format_func;
use crate::ssa::model::ir::{FuncId, Function, Program};
use crate::ssa::verify::verify_function;

const DUMP_FLAGS: &[&str] = &["ssa", "structure", "dispatch"];

pub struct CompiledProgram {
    /// Dispatch routines in program order; helpers follow their parent.
    pub functions: IndexMap<FuncId, DispatchFn>,
    pub init: Option<FuncId>,
    pub main: FuncId,
    pub diagnostics: Diagnostics,
    pub directives: Directives,
    /// The emitted target file.
    pub output: String,
}

impl CompiledProgram {
    pub fn function(&self, name: &str) -> Option<&DispatchFn> {
        self.functions.values().find(|func| func.name == name)
    }

    /// Every dispatch routine, for handing to the runtime.
    pub fn routines(&self) -> impl Iterator<Item = DispatchFn> + '_ {
        self.functions.values().cloned()
    }
}

#[instrument(skip_all, fields(functions = program.functions.len()))]
pub fn compile_program(
    program: &Program,
    options: &CompileOptions,
) -> Result<CompiledProgram, CompileError> {
    if let Some(dump) = &options.dump {
        for item in dump.split(',').map(|s| s.trim().to_lowercase()) {
            if !item.is_empty() && !DUMP_FLAGS.contains(&item.as_str()) {
                warn!(flag = %item, "unknown dump flag");
            }
        }
    }

    let mut ctx = ProgramContext::new(program, options);
    let mut functions = IndexMap::new();

    for func in &program.functions {
        if let Err(err) = verify_function(func) {
            report(&mut ctx, func, err)?;
            continue;
        }
        if options.dumps("ssa") {
            println!("SSA:");
            println!("--------------------------------");
            println!("{}", format_func(func));
            println!("--------------------------------");
        }

        let parts = if options.target.atomic_statements {
            split_function(func.clone(), &mut ctx)?
        } else {
            vec![func.clone()]
        };
        if parts.len() > 1 {
            debug!(func = %func.name, helpers = parts.len() - 1, "split statements");
        }

        for part in &parts {
            if options.dumps("structure") {
                dump_structure(part);
            }
            match resume::compile_function(part, &mut ctx) {
                Ok(dispatch) => {
                    if options.verify_input {
                        resume::validate(&dispatch)?;
                    }
                    if options.dumps("dispatch") {
                        println!("Dispatch:");
                        println!("--------------------------------");
                        println!("{}", dispatch);
                        println!("--------------------------------");
                    }
                    functions.insert(dispatch.id, dispatch);
                }
                Err(err) => report(&mut ctx, part, err)?,
            }
        }
    }

    if options.stop_on_error && ctx.diags.has_errors() {
        return Err(CompileError::Failed {
            errors: ctx.diags.error_count(),
        });
    }

    let output = emit_program(&functions, program.init, program.main, &ctx);
    info!(
        routines = functions.len(),
        warnings = ctx.diags.warnings().count(),
        bytes = output.len(),
        "program compiled"
    );

    Ok(CompiledProgram {
        functions,
        init: program.init,
        main: program.main,
        diagnostics: ctx.diags,
        directives: ctx.directives,
        output,
    })
}

/// Logs a per-function error and carries on; internal errors end the run.
fn report(
    ctx: &mut ProgramContext<'_>,
    func: &Function,
    err: CompileError,
) -> Result<(), CompileError> {
    if err.is_internal() {
        return Err(err);
    }
    let positions = &ctx.positions;
    ctx.diags.error(positions, func.pos, format!("{}: {}", func.name, err));
    Ok(())
}

fn dump_structure(func: &Function) {
    let cfg = Cfg::new(func);
    let recon = reconstruct(&cfg);
    println!("Structure of {}:", func.name);
    println!("--------------------------------");
    for desc in recon.descriptors() {
        let exit = match &desc.exit {
            BlockExit::Straight(target) => format!("-> bb{}", target.0),
            BlockExit::Branch(tree) => {
                let targets: Vec<String> =
                    tree.targets().iter().map(|t| format!("bb{}", t.0)).collect();
                format!("branch {}", targets.join(", "))
            }
            BlockExit::Return => "return".to_string(),
            BlockExit::Unreachable => "unreachable".to_string(),
        };
        println!(
            "bb{}: {:?} depth={} else={} {}",
            desc.block.0,
            desc.role(),
            desc.loop_depth,
            desc.else_depth,
            exit
        );
    }
    for block in recon.unreachable() {
        println!("bb{}: unreachable", block.0);
    }
    println!("--------------------------------");
}

#[cfg(test)]
#[path = "../tests/t_compile.rs"]
mod tests;

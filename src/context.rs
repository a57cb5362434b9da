use crate::diag::{Diagnostics, PosTable};
use crate::ssa::analysis::suspend::SuspendInfo;
use crate::ssa::model::ir::{ConstValue, FuncId, Program};

// -----------------------------------------------------------------------------
// Options
// -----------------------------------------------------------------------------

/// How string constants that are not plain printable ASCII are spelled.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum StringEncoding {
    /// Byte-wise `\xNN` escapes inside one literal.
    Narrow,
    /// Concatenation of explicit code-point constructions.
    Universal,
    /// Both, selected by the target compiler per backend.
    #[default]
    Both,
}

/// Capabilities of the backend family the output is compiled for.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TargetCaps {
    /// Backend has native 64-bit integers; otherwise hi/lo word pairs are used.
    pub native_int64: bool,
    /// Source statements must execute as side-effect-atomic units, so a
    /// statement may only suspend at its end.
    pub atomic_statements: bool,
    pub strings: StringEncoding,
}

impl Default for TargetCaps {
    fn default() -> Self {
        Self {
            native_int64: false,
            atomic_statements: true,
            strings: StringEncoding::Both,
        }
    }
}

#[derive(Debug, Clone)]
pub struct CompileOptions {
    pub target: TargetCaps,
    /// Comma-separated list of things to dump: ssa,structure,dispatch
    pub dump: Option<String>,
    pub verify_input: bool,
    pub stop_on_error: bool,
    /// Emit the position lookup helpers used by debuggers.
    pub debug_positions: bool,
}

impl Default for CompileOptions {
    fn default() -> Self {
        Self {
            target: TargetCaps::default(),
            dump: None,
            verify_input: true,
            stop_on_error: true,
            debug_positions: false,
        }
    }
}

impl CompileOptions {
    pub fn dumps(&self, what: &str) -> bool {
        self.dump
            .as_deref()
            .is_some_and(|list| list.split(',').any(|item| item.trim() == what))
    }
}

// -----------------------------------------------------------------------------
// Directives
// -----------------------------------------------------------------------------

pub const HEADER_DIRECTIVE: &str = "resumecHeader";
pub const LIB_LIST_DIRECTIVE: &str = "resumecLibList";
pub const PACKAGE_DIRECTIVE: &str = "resumecPackage";

/// Compiler directives carried by named string constants.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Directives {
    pub header: String,
    pub libs: Vec<String>,
    pub package: String,
}

impl Directives {
    pub fn collect(program: &Program, positions: &PosTable, diags: &mut Diagnostics) -> Self {
        let mut out = Directives::default();
        let mut constants: Vec<_> = program.constants.iter().collect();
        constants.sort_by(|a, b| a.name.cmp(&b.name));

        for constant in constants {
            let name = constant.name.as_str();
            if name != HEADER_DIRECTIVE && name != LIB_LIST_DIRECTIVE && name != PACKAGE_DIRECTIVE {
                continue;
            }
            let ConstValue::Str(text) = &constant.value else {
                diags.error(
                    positions,
                    constant.pos,
                    format!("special constant {} is not a string", name),
                );
                continue;
            };
            match name {
                HEADER_DIRECTIVE => {
                    out.header.push_str(text);
                    out.header.push('\n');
                }
                LIB_LIST_DIRECTIVE => {
                    out.libs = text.split(',').map(|lib| lib.trim().to_string()).collect();
                }
                _ => out.package = text.clone(),
            }
        }
        out
    }
}

// -----------------------------------------------------------------------------
// Program Context
// -----------------------------------------------------------------------------

/// Run-wide state shared by every function compilation. Created once per
/// run and passed explicitly; never mutated concurrently.
pub struct ProgramContext<'a> {
    pub options: &'a CompileOptions,
    pub positions: PosTable,
    pub diags: Diagnostics,
    pub suspend: SuspendInfo,
    pub directives: Directives,
    next_func: u32,
}

impl<'a> ProgramContext<'a> {
    pub fn new(program: &Program, options: &'a CompileOptions) -> Self {
        let positions = PosTable::new(program.positions.clone());
        let mut diags = Diagnostics::new();
        let directives = Directives::collect(program, &positions, &mut diags);
        Self {
            options,
            positions,
            diags,
            suspend: SuspendInfo::analyze(program),
            directives,
            next_func: program.next_func_id().0,
        }
    }

    /// Allocates an id for a function created during compilation.
    pub fn fresh_func_id(&mut self) -> FuncId {
        let id = FuncId(self.next_func);
        self.next_func += 1;
        id
    }
}

//! Program-level wrapper: the entry class, position lookup, and trailing
//! diagnostics around the emitted routine classes.

use std::collections::HashMap;
use std::fmt::Write;

use indexmap::IndexMap;

use crate::backend::resume::DispatchFn;
use crate::context::ProgramContext;
use crate::diag::PosTable;
use crate::ssa::model::ir::{FuncId, PosHash};

use super::emitter::emit_dispatch;
use super::haxe::{HaxeEmitter, class_name};

/// Emits the complete target file for a compiled program.
pub fn emit_program(
    functions: &IndexMap<FuncId, DispatchFn>,
    init: Option<FuncId>,
    main: FuncId,
    ctx: &ProgramContext<'_>,
) -> String {
    let classes: HashMap<FuncId, String> = functions
        .values()
        .map(|func| (func.id, class_name(&func.name)))
        .collect();
    let class_of = |id: FuncId| {
        classes
            .get(&id)
            .cloned()
            .unwrap_or_else(|| format!("Go_f{}", id.0))
    };

    let mut out = String::new();
    out.push_str(&ctx.directives.header);
    if !ctx.directives.package.is_empty() {
        let _ = writeln!(out, "package {};", ctx.directives.package);
    }
    let _ = writeln!(out, "\n// generated by resumec\n");
    let _ = writeln!(out, "#if js\n@:expose(\"Go\")\n#end");
    let _ = writeln!(out, "class Go {{");
    let _ = writeln!(out, "\tpublic static var doneInit:Bool = false;\n");

    // Goroutine 0 runs the initializer to completion before main starts.
    let _ = writeln!(out, "\tpublic static function init():Void {{");
    let _ = writeln!(out, "\t\tvar gr:Int = Scheduler.makeGoroutine();");
    let _ = writeln!(
        out,
        "\t\tif (gr != 0) throw \"non-zero goroutine number in init\";"
    );
    if let Some(init) = init {
        let _ = writeln!(out, "\t\tvar _sf = new {}(gr, []).run();", class_of(init));
        let _ = writeln!(out, "\t\twhile (_sf._incomplete) Scheduler.runAll();");
    }
    let _ = writeln!(out, "\t\tScheduler.doneInit = true;");
    let _ = writeln!(out, "\t\tdoneInit = true;");
    let _ = writeln!(out, "\t}}\n");

    let _ = writeln!(out, "\tpublic static function main():Void {{");
    let _ = writeln!(out, "\t\tinit();");
    let _ = writeln!(
        out,
        "\t\t{}.call(Scheduler.makeGoroutine(), []);",
        class_of(main)
    );
    let _ = writeln!(out, "\t\twhile (Scheduler.live()) Scheduler.runAll();");
    let _ = writeln!(out, "\t}}\n");

    out.push_str(&position_lookup(&ctx.positions, ctx.options.debug_positions));
    let _ = writeln!(out, "}} // end Go class");

    let mut emitter = HaxeEmitter::new(ctx.options.target, classes.clone());
    for func in functions.values() {
        emit_dispatch(func, &mut emitter);
    }
    out.push_str(&emitter.finish());

    if !ctx.directives.libs.is_empty() {
        let _ = writeln!(out, "\n// libs: {}", ctx.directives.libs.join(","));
    }
    for warning in ctx.diags.warnings() {
        let _ = writeln!(out, "// {}", warning);
    }
    out
}

/// `CPos` renders a position hash at run time the same way the compiler
/// does; with `debug` set, `getStartCPos` maps a file name back to its base.
pub fn position_lookup(positions: &PosTable, debug: bool) -> String {
    let mut out = String::new();
    let _ = writeln!(out, "\tpublic static function CPos(pos:Int):String {{");
    let _ = writeln!(out, "\t\tvar prefix:String = \"\";");
    let _ = writeln!(
        out,
        "\t\tif (pos == {}) return \"(No File Position Hash)\";",
        PosHash::NONE.0
    );
    let _ = writeln!(out, "\t\tif (pos < 0) {{ pos = -pos; prefix = \"near \"; }}");
    for file in positions.files().iter().rev() {
        let _ = writeln!(
            out,
            "\t\tif (pos > {}) return prefix + \"{}:\" + Std.string(pos - {});",
            file.base,
            escape_path(&file.file),
            file.base
        );
    }
    let _ = writeln!(
        out,
        "\t\treturn \"(invalid File Position Hash:\" + Std.string(pos) + \")\";"
    );
    let _ = writeln!(out, "\t}}");

    if debug {
        let _ = writeln!(out, "\n\tpublic static function getStartCPos(s:String):Int {{");
        for file in positions.files().iter().rev() {
            let _ = writeln!(
                out,
                "\t\tif (\"{}\".indexOf(s) != -1) return {};",
                escape_path(&file.file),
                file.base
            );
        }
        let _ = writeln!(out, "\t\treturn -1;");
        let _ = writeln!(out, "\t}}");
    }
    out
}

fn escape_path(path: &str) -> String {
    path.replace('\\', "\\\\")
}

use std::fmt::Write;

use super::{Instruction, Module, Value};

/// Render a module as text: each function constant first (named), then the
/// top-level sequence.
pub fn disassemble(module: &Module) -> String {
    let mut out = String::new();
    for constant in &module.constants {
        if let Value::Function(func) = constant {
            let _ = writeln!(out, "fn {}:", func.name);
            write_code(&mut out, &func.code);
            out.push('\n');
        }
    }
    let _ = writeln!(out, "main:");
    write_code(&mut out, &module.code);
    out
}

fn write_code(out: &mut String, code: &[Instruction]) {
    for (offset, inst) in code.iter().enumerate() {
        if inst.op.operand_count() == 1 {
            let _ = writeln!(out, "  {:04} {} {}", offset, inst.op.mnemonic(), inst.operand);
        } else {
            let _ = writeln!(out, "  {:04} {}", offset, inst.op.mnemonic());
        }
    }
}

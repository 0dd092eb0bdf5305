//! Sibling backend: re-renders the syntax tree as Python source. Independent
//! of the bytecode path — `*` and `/` render here even though the bytecode
//! compiler rejects them.

use crate::ast::*;

pub fn emit(program: &Program) -> String {
    let mut out = String::new();
    for stmt in &program.statements {
        emit_stmt(&mut out, stmt, 0, false);
    }
    out.trim_end().to_string()
}

fn indent(out: &mut String, level: usize) {
    for _ in 0..level {
        out.push_str("    ");
    }
}

fn emit_stmt(out: &mut String, stmt: &Stmt, level: usize, implicit_return: bool) {
    match stmt {
        Stmt::Const { name, value } => {
            indent(out, level);
            out.push_str(&format!("{} = {}\n", name, emit_expr(value)));
        }
        Stmt::Def { name, params, body } => {
            indent(out, level);
            out.push_str(&format!("def {}({}):\n", name, params.join(", ")));
            emit_body(out, body, level + 1);
        }
        Stmt::Print { value } => {
            indent(out, level);
            out.push_str(&format!("print({})\n", emit_expr(value)));
        }
        Stmt::Expr(expr) => {
            indent(out, level);
            if implicit_return {
                out.push_str(&format!("return {}\n", emit_expr(expr)));
            } else {
                out.push_str(&format!("{}\n", emit_expr(expr)));
            }
        }
    }
}

/// Function bodies return their final expression, mirroring the block value
/// law of the bytecode backend.
fn emit_body(out: &mut String, stmts: &[Stmt], level: usize) {
    if stmts.is_empty() {
        indent(out, level);
        out.push_str("pass\n");
        return;
    }
    for (i, stmt) in stmts.iter().enumerate() {
        let is_last = i == stmts.len() - 1;
        emit_stmt(out, stmt, level, is_last);
    }
}

fn emit_expr(expr: &Expr) -> String {
    match expr {
        Expr::Literal(lit) => emit_literal(lit),
        Expr::Ref(name) => name.clone(),
        Expr::Unary { op: UnaryOp::Negate, operand } => {
            format!("(-{})", emit_expr(operand))
        }
        Expr::Binary { op, left, right } => {
            let op_str = match op {
                BinOp::Add => "+",
                BinOp::Subtract => "-",
                BinOp::Multiply => "*",
                BinOp::Divide => "/",
            };
            format!("({} {} {})", emit_expr(left), op_str, emit_expr(right))
        }
        Expr::Call { callee, args } => {
            let args_str: Vec<String> = args.iter().map(emit_expr).collect();
            format!("{}({})", emit_expr(callee), args_str.join(", "))
        }
    }
}

fn emit_literal(lit: &Literal) -> String {
    match lit {
        Literal::Number(n) => {
            if *n == (*n as i64) as f64 {
                format!("{}", *n as i64)
            } else {
                format!("{}", n)
            }
        }
        Literal::Text(s) => {
            format!("'{}'", s.replace('\\', "\\\\").replace('\'', "\\'"))
        }
    }
}

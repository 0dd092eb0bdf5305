use std::rc::Rc;

use crate::ast::{BinOp, Expr, Literal, Program, Stmt, UnaryOp};
use crate::bytecode::{Function, Instruction, Module, Opcode, Value};

#[derive(Debug, thiserror::Error)]
pub enum CompileError {
    #[error("unknown identifier: {name}")]
    UnknownIdentifier { name: String },
    #[error("duplicate identifier: {name}")]
    DuplicateIdentifier { name: String },
    #[error("unsupported operator: {operator}")]
    UnsupportedOperator { operator: &'static str },
}

type Result<T> = std::result::Result<T, CompileError>;

/// Compile a program into a module in one linear traversal.
pub fn compile(program: &Program) -> Result<Module> {
    Compiler::new().compile_program(&program.statements)
}

/// One function body under compilation: output buffer, lexical depth, and the
/// locals declared so far. Slot k of the locals list is stack slot k at
/// runtime, relative to the frame's offset.
struct FnScope {
    code: Vec<Instruction>,
    depth: usize,
    locals: Vec<String>,
}

impl FnScope {
    fn new(depth: usize) -> Self {
        FnScope {
            code: Vec::new(),
            depth,
            locals: Vec::new(),
        }
    }
}

struct Compiler {
    module: Module,
    /// Never empty; the last entry is the scope being compiled. Nested
    /// function bodies push a fresh frame and fold it into a constant on
    /// completion.
    scopes: Vec<FnScope>,
}

impl Compiler {
    fn new() -> Self {
        Compiler {
            module: Module::default(),
            scopes: vec![FnScope::new(0)],
        }
    }

    fn scope(&self) -> &FnScope {
        self.scopes.last().expect("scope stack is never empty")
    }

    fn scope_mut(&mut self) -> &mut FnScope {
        self.scopes.last_mut().expect("scope stack is never empty")
    }

    fn emit(&mut self, op: Opcode) {
        self.scope_mut().code.push(Instruction::new(op));
    }

    fn emit_with(&mut self, op: Opcode, operand: u32) {
        self.scope_mut().code.push(Instruction::with_operand(op, operand));
    }

    /// Register a binding at the current depth. The value just compiled onto
    /// the stack is the binding's storage slot; no store is emitted.
    fn declare(&mut self, name: &str) -> Result<()> {
        let scope = self.scope_mut();
        if scope.locals.iter().any(|n| n == name) {
            return Err(CompileError::DuplicateIdentifier { name: name.to_string() });
        }
        scope.locals.push(name.to_string());
        Ok(())
    }

    /// Resolution is restricted to the current depth: functions do not close
    /// over enclosing locals. Reverse scan so the most recent binding wins.
    fn resolve(&self, name: &str) -> Result<u32> {
        self.scope()
            .locals
            .iter()
            .rposition(|n| n == name)
            .map(|slot| slot as u32)
            .ok_or_else(|| CompileError::UnknownIdentifier { name: name.to_string() })
    }

    fn compile_program(mut self, statements: &[Stmt]) -> Result<Module> {
        self.compile_block(statements)?;
        self.emit(Opcode::Return);
        self.module.code = self.scopes.pop().map(|s| s.code).unwrap_or_default();
        Ok(self.module)
    }

    /// A block always nets exactly one value: residual values of non-final
    /// expression statements are popped, and a sentinel nil is pushed when
    /// the final statement leaves nothing.
    fn compile_block(&mut self, statements: &[Stmt]) -> Result<()> {
        if statements.is_empty() {
            self.emit(Opcode::Nil);
            return Ok(());
        }
        let last = statements.len() - 1;
        for (i, stmt) in statements.iter().enumerate() {
            self.compile_stmt(stmt)?;
            if i < last {
                if stmt.is_expression() {
                    self.emit(Opcode::Pop);
                }
            } else if !stmt.is_expression() {
                self.emit(Opcode::Nil);
            }
        }
        Ok(())
    }

    fn compile_stmt(&mut self, stmt: &Stmt) -> Result<()> {
        match stmt {
            Stmt::Const { name, value } => {
                self.compile_expr(value)?;
                self.declare(name)
            }
            Stmt::Def { name, params, body } => self.compile_def(name, params, body),
            Stmt::Print { value } => {
                self.compile_expr(value)?;
                self.emit(Opcode::Print);
                Ok(())
            }
            Stmt::Expr(expr) => self.compile_expr(expr),
        }
    }

    /// Nested compilation context: a fresh scope one depth down, slot 0
    /// reserved for the return value, one slot per parameter (the caller has
    /// already placed placeholder and arguments on the stack). The body's
    /// value is stored into slot 0, every other local popped in reverse, and
    /// the finished buffer folded into a function constant.
    fn compile_def(&mut self, name: &str, params: &[String], body: &[Stmt]) -> Result<()> {
        let depth = self.scope().depth + 1;
        let mut scope = FnScope::new(depth);
        // The empty name can never collide with a source identifier.
        scope.locals.push(String::new());
        self.scopes.push(scope);

        for param in params {
            self.declare(param)?;
        }
        self.compile_block(body)?;
        self.emit_with(Opcode::Store, 0);
        let extra_locals = self.scope().locals.len() - 1;
        for _ in 0..extra_locals {
            self.emit(Opcode::Pop);
        }
        self.emit(Opcode::Return);

        let code = self.scopes.pop().map(|s| s.code).unwrap_or_default();
        let func = Value::Function(Rc::new(Function {
            name: name.to_string(),
            code,
        }));

        self.declare(name)?;
        let idx = self.module.add_constant(func);
        self.emit_with(Opcode::Constant, idx);
        Ok(())
    }

    fn compile_expr(&mut self, expr: &Expr) -> Result<()> {
        match expr {
            Expr::Literal(Literal::Number(n)) => {
                if let Some(op) = Opcode::for_small_int(*n) {
                    self.emit(op);
                } else {
                    let idx = self.module.add_constant(Value::Number(*n));
                    self.emit_with(Opcode::Constant, idx);
                }
            }
            Expr::Literal(Literal::Text(s)) => {
                let idx = self.module.add_constant(Value::Text(s.clone()));
                self.emit_with(Opcode::Constant, idx);
            }
            Expr::Ref(name) => {
                let slot = self.resolve(name)?;
                self.emit_with(Opcode::Load, slot);
            }
            Expr::Unary { op: UnaryOp::Negate, operand } => {
                self.compile_expr(operand)?;
                self.emit(Opcode::Negate);
            }
            Expr::Binary { op, left, right } => {
                self.compile_expr(left)?;
                self.compile_expr(right)?;
                match op {
                    BinOp::Add => self.emit(Opcode::Add),
                    BinOp::Subtract => self.emit(Opcode::Subtract),
                    BinOp::Multiply => {
                        return Err(CompileError::UnsupportedOperator { operator: "*" });
                    }
                    BinOp::Divide => {
                        return Err(CompileError::UnsupportedOperator { operator: "/" });
                    }
                }
            }
            Expr::Call { callee, args } => {
                // Placeholder nil reserves the return slot before arguments.
                self.emit(Opcode::Nil);
                for arg in args {
                    self.compile_expr(arg)?;
                }
                self.compile_expr(callee)?;
                self.emit_with(Opcode::Invoke, args.len() as u32);
            }
        }
        Ok(())
    }
}

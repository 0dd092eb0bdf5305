use std::io::{self, Write};
use std::rc::Rc;

use crate::bytecode::{Function, Module, Opcode, Value};

/// Frame-depth bound: a runaway invocation chain fails with StackOverflow
/// instead of exhausting host resources.
const MAX_FRAMES: usize = 1024;

#[derive(Debug, thiserror::Error)]
pub enum VmError {
    #[error("constant index {index} out of range for pool of {len}")]
    ConstantIndexOutOfRange { index: usize, len: usize },
    #[error("stack slot {slot} out of range for frame at offset {offset}")]
    StackIndexOutOfRange { slot: usize, offset: usize },
    #[error("type mismatch: {op} expects a {expected}, got {found}")]
    TypeMismatch {
        op: &'static str,
        expected: &'static str,
        found: &'static str,
    },
    #[error("cannot invoke a {type_name} value")]
    NotInvocable { type_name: &'static str },
    #[error("pop from an empty stack")]
    EmptyStackPop,
    #[error("call depth exceeded {max} frames")]
    StackOverflow { max: usize },
    #[error("failed to write output: {0}")]
    Output(#[from] io::Error),
}

type VmResult<T> = Result<T, VmError>;

/// One active invocation: its code, instruction pointer, and the index into
/// the shared value stack below which it may not read or write.
struct CallFrame {
    function: Rc<Function>,
    ip: usize,
    offset: usize,
}

/// Execute a module to completion, printing to stdout. Returns the final
/// value left on the stack, or Nil if the stack is empty at halt.
pub fn run(module: &Module) -> VmResult<Value> {
    Vm::with_output(module, io::stdout().lock()).run()
}

pub struct Vm<'a, W: Write> {
    module: &'a Module,
    stack: Vec<Value>,
    frames: Vec<CallFrame>,
    out: W,
}

impl<'a, W: Write> Vm<'a, W> {
    pub fn with_output(module: &'a Module, out: W) -> Self {
        Vm {
            module,
            stack: Vec::with_capacity(256),
            frames: Vec::with_capacity(16),
            out,
        }
    }

    pub fn run(mut self) -> VmResult<Value> {
        let entry = Rc::new(Function {
            name: "main".to_string(),
            code: self.module.code.clone(),
        });
        self.frames.push(CallFrame {
            function: entry,
            ip: 0,
            offset: 0,
        });
        self.execute()
    }

    fn pop(&mut self) -> VmResult<Value> {
        self.stack.pop().ok_or(VmError::EmptyStackPop)
    }

    fn execute(&mut self) -> VmResult<Value> {
        loop {
            let Some(frame) = self.frames.last_mut() else {
                break;
            };
            let Some(inst) = frame.function.code.get(frame.ip).copied() else {
                // Ran off the end without an explicit return.
                self.frames.pop();
                continue;
            };
            frame.ip += 1;
            let frame_offset = frame.offset;

            match inst.op {
                Opcode::Const0 => self.stack.push(Value::Number(0.0)),
                Opcode::Const1 => self.stack.push(Value::Number(1.0)),
                Opcode::Const2 => self.stack.push(Value::Number(2.0)),

                Opcode::Constant => {
                    let index = inst.operand as usize;
                    let value = self.module.constants.get(index).cloned().ok_or(
                        VmError::ConstantIndexOutOfRange {
                            index,
                            len: self.module.constants.len(),
                        },
                    )?;
                    self.stack.push(value);
                }

                Opcode::Negate => {
                    let n = number_operand(self.pop()?, "neg")?;
                    self.stack.push(Value::Number(-n));
                }

                Opcode::Add => {
                    let right = self.pop()?;
                    let left = self.pop()?;
                    // A text operand on either side coerces the other
                    // through its rendering; otherwise numeric addition.
                    let result = if matches!(left, Value::Text(_))
                        || matches!(right, Value::Text(_))
                    {
                        Value::Text(format!("{left}{right}"))
                    } else {
                        Value::Number(
                            number_operand(left, "add")? + number_operand(right, "add")?,
                        )
                    };
                    self.stack.push(result);
                }

                Opcode::Subtract => {
                    let right = self.pop()?;
                    let left = self.pop()?;
                    let result =
                        number_operand(left, "sub")? - number_operand(right, "sub")?;
                    self.stack.push(Value::Number(result));
                }

                Opcode::Load => {
                    let slot = inst.operand as usize;
                    let value = self.stack.get(frame_offset + slot).cloned().ok_or(
                        VmError::StackIndexOutOfRange {
                            slot,
                            offset: frame_offset,
                        },
                    )?;
                    self.stack.push(value);
                }

                Opcode::Store => {
                    let value = self.pop()?;
                    let slot = inst.operand as usize;
                    match self.stack.get_mut(frame_offset + slot) {
                        Some(cell) => *cell = value,
                        None => {
                            return Err(VmError::StackIndexOutOfRange {
                                slot,
                                offset: frame_offset,
                            });
                        }
                    }
                }

                Opcode::Print => {
                    let value = self.pop()?;
                    writeln!(self.out, "{value}")?;
                }

                Opcode::Invoke => {
                    let argc = inst.operand as usize;
                    let callee = self.pop()?;
                    let function = match callee {
                        Value::Function(f) => f,
                        other => {
                            return Err(VmError::NotInvocable {
                                type_name: other.type_name(),
                            });
                        }
                    };
                    if self.frames.len() >= MAX_FRAMES {
                        return Err(VmError::StackOverflow { max: MAX_FRAMES });
                    }
                    // The placeholder nil pushed at the call site, beneath
                    // the argc arguments, becomes the frame's slot 0.
                    let offset = self
                        .stack
                        .len()
                        .checked_sub(argc + 1)
                        .ok_or(VmError::EmptyStackPop)?;
                    self.frames.push(CallFrame {
                        function,
                        ip: 0,
                        offset,
                    });
                }

                Opcode::Pop => {
                    self.pop()?;
                }

                Opcode::Nil => self.stack.push(Value::Nil),

                Opcode::Return => {
                    self.frames.pop();
                }
            }
        }

        Ok(self.stack.pop().unwrap_or(Value::Nil))
    }
}

fn number_operand(value: Value, op: &'static str) -> VmResult<f64> {
    match value {
        Value::Number(n) => Ok(n),
        other => Err(VmError::TypeMismatch {
            op,
            expected: "number",
            found: other.type_name(),
        }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bytecode::Instruction;
    use crate::compiler;
    use crate::lexer;
    use crate::parser;

    fn compile_source(source: &str) -> Module {
        let program = parser::parse(lexer::lex(source).unwrap()).unwrap();
        compiler::compile(&program).unwrap()
    }

    fn run_source(source: &str) -> (Value, String) {
        let module = compile_source(source);
        let mut out = Vec::new();
        let value = Vm::with_output(&module, &mut out).run().unwrap();
        (value, String::from_utf8(out).unwrap())
    }

    fn run_module(module: &Module) -> VmResult<Value> {
        Vm::with_output(module, Vec::new()).run()
    }

    #[test]
    fn literal_round_trip() {
        assert_eq!(run_source("7").0, Value::Number(7.0));
        assert_eq!(run_source("0").0, Value::Number(0.0));
        assert_eq!(run_source("1").0, Value::Number(1.0));
        assert_eq!(run_source("2").0, Value::Number(2.0));
        assert_eq!(run_source("'hi'").0, Value::Text("hi".to_string()));
    }

    #[test]
    fn block_ending_in_expression_yields_its_value() {
        assert_eq!(run_source("1\n2").0, Value::Number(2.0));
    }

    #[test]
    fn block_ending_in_declaration_yields_nil() {
        assert_eq!(run_source("const x = 5").0, Value::Nil);
    }

    #[test]
    fn block_ending_in_print_yields_nil() {
        let (value, output) = run_source("print 1");
        assert_eq!(value, Value::Nil);
        assert_eq!(output, "1\n");
    }

    #[test]
    fn numeric_addition_does_not_concatenate() {
        assert_eq!(run_source("1 + 2").0, Value::Number(3.0));
    }

    #[test]
    fn string_coercion_both_directions() {
        assert_eq!(run_source("1 + 'a'").0, Value::Text("1a".to_string()));
        assert_eq!(run_source("'a' + 1").0, Value::Text("a1".to_string()));
    }

    #[test]
    fn const_then_print_outputs_sum() {
        let (value, output) = run_source("const x = 2\nprint x + 3");
        assert_eq!(value, Value::Nil);
        assert_eq!(output, "5\n");
    }

    #[test]
    fn function_invocation_through_return_slot() {
        let (_, output) = run_source("def add(a, b) { a + b }\nprint add(2, 3)");
        assert_eq!(output, "5\n");
    }

    #[test]
    fn call_result_is_a_value() {
        assert_eq!(
            run_source("def add(a, b) { a + b }\nadd(2, 3)").0,
            Value::Number(5.0)
        );
    }

    #[test]
    fn nested_calls_in_argument_position() {
        assert_eq!(
            run_source("def add(a, b) { a + b }\nadd(add(1, 2), add(0, 2))").0,
            Value::Number(5.0)
        );
    }

    #[test]
    fn function_passed_as_argument_is_invocable() {
        let (_, output) = run_source("def g(x) { x + 1 }\ndef call2(f) { f(2) }\nprint call2(g)");
        assert_eq!(output, "3\n");
    }

    #[test]
    fn frame_locals_are_isolated_from_caller() {
        let (_, output) = run_source("const a = 10\ndef f(a) { a + 1 }\nprint f(1)\nprint a");
        assert_eq!(output, "2\n10\n");
    }

    #[test]
    fn function_body_locals_are_discarded_on_return() {
        let source = "def f(a) {\n  const b = a + 1\n  b + 1\n}\nprint f(1)\nprint f(2)";
        let (_, output) = run_source(source);
        assert_eq!(output, "3\n4\n");
    }

    #[test]
    fn unary_negation() {
        assert_eq!(run_source("-5").0, Value::Number(-5.0));
        let (_, output) = run_source("print -(1 + 2)");
        assert_eq!(output, "-3\n");
    }

    #[test]
    fn print_renders_nil_and_functions() {
        let (_, output) = run_source("def f() {}\nprint f\nprint f()");
        assert_eq!(output, "<fn f>\nnil\n");
    }

    #[test]
    fn negate_rejects_text() {
        let module = compile_source("-'a'");
        let err = run_module(&module).unwrap_err();
        assert!(matches!(
            err,
            VmError::TypeMismatch { op: "neg", found: "text", .. }
        ));
    }

    #[test]
    fn subtract_rejects_text() {
        let module = compile_source("1 - 'a'");
        let err = run_module(&module).unwrap_err();
        assert!(matches!(
            err,
            VmError::TypeMismatch { op: "sub", found: "text", .. }
        ));
    }

    #[test]
    fn add_rejects_function_operand() {
        let module = compile_source("def f() {}\n1 + f");
        let err = run_module(&module).unwrap_err();
        assert!(matches!(
            err,
            VmError::TypeMismatch { op: "add", found: "function", .. }
        ));
    }

    #[test]
    fn invoking_a_text_value_fails() {
        let module = compile_source("const s = 'x'\ns(1)");
        let err = run_module(&module).unwrap_err();
        assert!(matches!(err, VmError::NotInvocable { type_name: "text" }));
    }

    #[test]
    fn unbounded_self_application_overflows_frames() {
        let module = compile_source("def f(g) { g(g) }\nf(f)");
        let err = run_module(&module).unwrap_err();
        assert!(matches!(err, VmError::StackOverflow { max: MAX_FRAMES }));
    }

    #[test]
    fn constant_index_out_of_range() {
        let module = Module {
            constants: Vec::new(),
            code: vec![
                Instruction::with_operand(Opcode::Constant, 5),
                Instruction::new(Opcode::Return),
            ],
        };
        let err = run_module(&module).unwrap_err();
        assert!(matches!(
            err,
            VmError::ConstantIndexOutOfRange { index: 5, len: 0 }
        ));
    }

    #[test]
    fn load_out_of_range() {
        let module = Module {
            constants: Vec::new(),
            code: vec![
                Instruction::with_operand(Opcode::Load, 3),
                Instruction::new(Opcode::Return),
            ],
        };
        let err = run_module(&module).unwrap_err();
        assert!(matches!(
            err,
            VmError::StackIndexOutOfRange { slot: 3, offset: 0 }
        ));
    }

    #[test]
    fn store_out_of_range() {
        let module = Module {
            constants: Vec::new(),
            code: vec![
                Instruction::new(Opcode::Nil),
                Instruction::with_operand(Opcode::Store, 4),
                Instruction::new(Opcode::Return),
            ],
        };
        let err = run_module(&module).unwrap_err();
        assert!(matches!(
            err,
            VmError::StackIndexOutOfRange { slot: 4, offset: 0 }
        ));
    }

    #[test]
    fn pop_on_empty_stack_fails() {
        let module = Module {
            constants: Vec::new(),
            code: vec![Instruction::new(Opcode::Pop)],
        };
        let err = run_module(&module).unwrap_err();
        assert!(matches!(err, VmError::EmptyStackPop));
    }

    #[test]
    fn empty_code_halts_with_nil() {
        let module = Module::default();
        assert_eq!(run_module(&module).unwrap(), Value::Nil);
    }
}

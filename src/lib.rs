//! lume — a small scripting language.
//!
//! Pipeline: source text → tokens ([`lexer`]) → syntax tree ([`parser`],
//! [`ast`]) → compiled module ([`compiler`], [`bytecode`]) → execution
//! ([`vm`]). [`codegen`] is a sibling backend that re-renders the syntax
//! tree as Python source instead of compiling it.

pub mod ast;
pub mod bytecode;
pub mod codegen;
pub mod compiler;
pub mod diagnostic;
pub mod lexer;
pub mod parser;
pub mod vm;

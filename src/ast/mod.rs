use serde::{Deserialize, Serialize};

pub mod source_map;
pub use source_map::SourceMap;

// ---- Span infrastructure ----

/// Byte range within source text.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Span {
    pub start: usize,
    pub end: usize,
}

impl Span {
    pub const UNKNOWN: Span = Span { start: 0, end: 0 };

    pub fn merge(self, other: Span) -> Span {
        Span {
            start: self.start.min(other.start),
            end: self.end.max(other.end),
        }
    }
}

// ---- Core AST types ----

/// Statements — the top level of a program and the contents of function bodies.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Stmt {
    /// `const name = expr`
    Const { name: String, value: Expr },

    /// `def name(params) { body }`
    Def {
        name: String,
        params: Vec<String>,
        body: Vec<Stmt>,
    },

    /// `print expr`
    Print { value: Expr },

    /// Expression in statement position. The only statement kind that leaves
    /// a residual value; a block ending in one yields that value.
    Expr(Expr),
}

impl Stmt {
    /// Expression statements leave a value on the stack; declarations and
    /// print do not.
    pub fn is_expression(&self) -> bool {
        matches!(self, Stmt::Expr(_))
    }
}

/// Expressions
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Expr {
    Literal(Literal),

    /// Variable reference
    Ref(String),

    /// Prefix negation: `-expr`
    Unary {
        op: UnaryOp,
        operand: Box<Expr>,
    },

    /// Infix operation: `a + b`
    Binary {
        op: BinOp,
        left: Box<Expr>,
        right: Box<Expr>,
    },

    /// Invocation: `callee(arg, ...)`
    Call {
        callee: Box<Expr>,
        args: Vec<Expr>,
    },
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Literal {
    Number(f64),
    Text(String),
}

/// `*` and `/` lex and parse but are rejected by the bytecode compiler —
/// a documented language limitation, not an oversight.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum BinOp {
    Add,
    Subtract,
    Multiply,
    Divide,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum UnaryOp {
    Negate,
}

/// A complete program is a flat list of statements.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Program {
    pub statements: Vec<Stmt>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn span_unknown_is_zero() {
        assert_eq!(Span::UNKNOWN, Span { start: 0, end: 0 });
    }

    #[test]
    fn span_merge_takes_extremes() {
        let a = Span { start: 5, end: 10 };
        let b = Span { start: 2, end: 15 };
        assert_eq!(a.merge(b), Span { start: 2, end: 15 });
    }

    #[test]
    fn span_merge_non_overlapping() {
        let a = Span { start: 0, end: 5 };
        let b = Span { start: 10, end: 20 };
        assert_eq!(a.merge(b), Span { start: 0, end: 20 });
    }

    #[test]
    fn expression_classification() {
        let expr = Stmt::Expr(Expr::Literal(Literal::Number(1.0)));
        let decl = Stmt::Const {
            name: "x".to_string(),
            value: Expr::Literal(Literal::Number(1.0)),
        };
        let print = Stmt::Print { value: Expr::Ref("x".to_string()) };
        assert!(expr.is_expression());
        assert!(!decl.is_expression());
        assert!(!print.is_expression());
    }

    #[test]
    fn program_json_round_trip() {
        let prog = Program {
            statements: vec![
                Stmt::Const {
                    name: "x".to_string(),
                    value: Expr::Literal(Literal::Number(2.0)),
                },
                Stmt::Print {
                    value: Expr::Binary {
                        op: BinOp::Add,
                        left: Box::new(Expr::Ref("x".to_string())),
                        right: Box::new(Expr::Literal(Literal::Number(3.0))),
                    },
                },
            ],
        };
        let json = serde_json::to_string_pretty(&prog).unwrap();
        let deserialized: Program = serde_json::from_str(&json).unwrap();
        assert_eq!(deserialized, prog);
    }

    #[test]
    fn call_serializes_with_callee() {
        let call = Expr::Call {
            callee: Box::new(Expr::Ref("add".to_string())),
            args: vec![
                Expr::Literal(Literal::Number(2.0)),
                Expr::Literal(Literal::Number(3.0)),
            ],
        };
        let json = serde_json::to_string(&call).unwrap();
        assert!(json.contains("Call"));
        assert!(json.contains("add"));
    }
}

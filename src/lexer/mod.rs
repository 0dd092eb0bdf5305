use logos::Logos;

use crate::ast::Span;

#[derive(Logos, Debug, PartialEq, Clone)]
#[logos(skip r"[ \t\r]+")]
#[logos(skip("//[^\n]*", allow_greedy = true))]
pub enum Token {
    // Keywords
    #[token("const")]
    Const,
    #[token("def")]
    Def,
    #[token("print")]
    Print,

    // Operators and punctuation
    #[token("+")]
    Plus,
    #[token("-")]
    Minus,
    #[token("*")]
    Star,
    #[token("/")]
    Slash,
    #[token("=")]
    Assign,
    #[token(",")]
    Comma,
    #[token("(")]
    LParen,
    #[token(")")]
    RParen,
    #[token("{")]
    LBrace,
    #[token("}")]
    RBrace,

    // Literals
    #[regex(r"[0-9]+(\.[0-9]+)?", |lex| lex.slice().parse::<f64>().ok())]
    Number(f64),

    #[regex(r"'[^']*'", |lex| {
        let s = lex.slice();
        Some(s[1..s.len()-1].to_string())
    })]
    Text(String),

    #[regex(r"[A-Za-z_][A-Za-z0-9_]*", |lex| lex.slice().to_string())]
    Ident(String),

    // Newlines are significant (statement terminators)
    #[token("\n")]
    Newline,
}

/// Lex source code into a stream of tokens with their spans.
pub fn lex(source: &str) -> Result<Vec<(Token, Span)>, LexError> {
    let mut lexer = Token::lexer(source);
    let mut tokens = Vec::new();

    while let Some(result) = lexer.next() {
        match result {
            Ok(token) => {
                let range = lexer.span();
                tokens.push((token, Span { start: range.start, end: range.end }));
            }
            Err(()) => {
                let range = lexer.span();
                let snippet = source[range.clone()].to_string();
                return Err(LexError {
                    position: range.start,
                    suggestion: suggest_fix(&snippet),
                    snippet,
                });
            }
        }
    }

    Ok(tokens)
}

/// Every lex error comes with a suggested fix.
fn suggest_fix(bad_token: &str) -> String {
    if bad_token.starts_with('"') {
        "Strings use single quotes: 'like this'".to_string()
    } else if bad_token.starts_with('\'') {
        "Unterminated string: add a closing single quote".to_string()
    } else {
        format!("Unexpected character(s): '{}'", bad_token)
    }
}

#[derive(Debug, thiserror::Error)]
#[error("Lex error at position {position}: '{snippet}'. {suggestion}")]
pub struct LexError {
    pub position: usize,
    pub snippet: String,
    pub suggestion: String,
}

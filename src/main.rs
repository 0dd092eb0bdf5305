use std::io::IsTerminal;
use std::path::Path;
use std::process::ExitCode;

use clap::Parser;

use lume::diagnostic::ansi::AnsiRenderer;
use lume::diagnostic::Diagnostic;
use lume::{bytecode, codegen, compiler, lexer, parser, vm};

/// lume — a small scripting language with a bytecode VM
#[derive(Parser)]
#[command(name = "lume", version, about)]
struct Cli {
    /// Source file, or inline program text if no such file exists
    input: String,

    /// Print the token stream and exit
    #[arg(long)]
    tokens: bool,

    /// Print the syntax tree as JSON and exit
    #[arg(long)]
    ast: bool,

    /// Print the compiled bytecode and exit
    #[arg(long)]
    disasm: bool,

    /// Re-emit the program as source in another language (supported: python)
    #[arg(long, value_name = "LANG")]
    emit: Option<String>,
}

fn main() -> ExitCode {
    let cli = Cli::parse();

    let source = if Path::new(&cli.input).is_file() {
        match std::fs::read_to_string(&cli.input) {
            Ok(s) => s,
            Err(e) => {
                eprintln!("error reading {}: {}", cli.input, e);
                return ExitCode::FAILURE;
            }
        }
    } else {
        cli.input.clone()
    };

    match run(&cli, &source) {
        Ok(()) => ExitCode::SUCCESS,
        Err(d) => {
            let renderer = AnsiRenderer {
                use_color: std::io::stderr().is_terminal(),
            };
            eprint!("{}", renderer.render(&d.with_source(source)));
            ExitCode::FAILURE
        }
    }
}

fn run(cli: &Cli, source: &str) -> Result<(), Diagnostic> {
    let tokens = lexer::lex(source).map_err(|e| Diagnostic::from(&e))?;

    if cli.tokens {
        for (token, span) in &tokens {
            println!("{:>4}..{:<4} {:?}", span.start, span.end, token);
        }
        return Ok(());
    }

    let program = parser::parse(tokens).map_err(|e| Diagnostic::from(&e))?;

    if cli.ast {
        let json = serde_json::to_string_pretty(&program)
            .map_err(|e| Diagnostic::error(format!("serialization error: {}", e)))?;
        println!("{}", json);
        return Ok(());
    }

    if let Some(lang) = &cli.emit {
        return match lang.as_str() {
            "python" => {
                println!("{}", codegen::python::emit(&program));
                Ok(())
            }
            other => Err(Diagnostic::error(format!("unsupported emit target: {}", other))),
        };
    }

    let module = compiler::compile(&program).map_err(|e| Diagnostic::from(&e))?;

    if cli.disasm {
        print!("{}", bytecode::disasm::disassemble(&module));
        return Ok(());
    }

    let value = vm::run(&module).map_err(|e| Diagnostic::from(&e))?;
    if value != bytecode::Value::Nil {
        println!("{}", value);
    }
    Ok(())
}

use clap::Parser;
use rustyline::error::ReadlineError;
use rustyline::DefaultEditor;
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use vanilla::ast::StmtKind;
use vanilla::env::Context;
use vanilla::error;
use vanilla::eval::{eval_expr, exec_stmt};
use vanilla::parser::parse_program;
use vanilla::xml;

/// Vanilla scripting language interpreter
#[derive(Parser, Debug)]
#[command(name = "vanilla")]
#[command(version)]
#[command(about = "A tree-walking interpreter for the Vanilla scripting language")]
struct CliArgs {
    /// Script file to execute (optional - if not provided, starts REPL)
    #[arg(value_name = "FILE")]
    script: Option<PathBuf>,

    /// Write the parsed AST as XML next to the script (FILE.xml)
    #[arg(long = "emit-xml")]
    emit_xml: bool,
}

fn main() -> ExitCode {
    let args = CliArgs::parse();
    match args.script {
        Some(path) => run_script(&path, args.emit_xml),
        None => run_repl(),
    }
}

/// Runs a script file. Diagnostics go to stderr as one
/// `[line:col] <stage> error : <message>` line.
fn run_script(path: &Path, emit_xml: bool) -> ExitCode {
    let source = match std::fs::read_to_string(path) {
        Ok(source) => source,
        Err(e) => {
            eprintln!("Cannot read script file {}: {}", path.display(), e);
            return ExitCode::FAILURE;
        }
    };

    let program = match parse_program(&source) {
        Ok(program) => program,
        Err(e) => {
            eprintln!("{}", e);
            return ExitCode::FAILURE;
        }
    };

    let mut ctx = Context::new();
    if let Err(e) = exec_stmt(&program, &mut ctx) {
        eprintln!("{}", e);
        return ExitCode::FAILURE;
    }

    if emit_xml {
        let mut xml_path = path.as_os_str().to_owned();
        xml_path.push(".xml");
        let result = std::fs::File::create(&xml_path)
            .and_then(|mut file| xml::write_xml(&program, &mut file));
        if let Err(e) = result {
            eprintln!("Cannot write {}: {}", PathBuf::from(xml_path).display(), e);
            return ExitCode::FAILURE;
        }
    }

    ExitCode::SUCCESS
}

/// Interactive loop: statements are evaluated against one persistent
/// context and the value of each expression statement is printed.
fn run_repl() -> ExitCode {
    let mut rl = match DefaultEditor::new() {
        Ok(editor) => editor,
        Err(e) => {
            eprintln!("Failed to initialize REPL: {}", e);
            return ExitCode::FAILURE;
        }
    };

    println!("Vanilla {}", env!("CARGO_PKG_VERSION"));
    println!("Statements end with ';'. Press Ctrl-D to exit.");

    let mut ctx = Context::new();
    loop {
        match rl.readline("vanilla> ") {
            Ok(line) => {
                if line.trim().is_empty() {
                    continue;
                }
                let _ = rl.add_history_entry(&line);
                if let Err(e) = eval_line(&line, &mut ctx) {
                    eprintln!("{}", e);
                }
            }
            Err(ReadlineError::Interrupted) => {
                println!("^C");
                continue;
            }
            Err(ReadlineError::Eof) => break,
            Err(e) => {
                eprintln!("Error: {}", e);
                return ExitCode::FAILURE;
            }
        }
    }

    ExitCode::SUCCESS
}

fn eval_line(line: &str, ctx: &mut Context) -> error::Result<()> {
    let program = parse_program(line)?;
    let StmtKind::Sequence(statements) = &program.kind else {
        exec_stmt(&program, ctx)?;
        return Ok(());
    };
    for statement in statements {
        // Print what expression statements evaluate to; everything else
        // runs for its side effects.
        match &statement.kind {
            StmtKind::Expression(expr) => {
                let value = eval_expr(expr, ctx)?;
                println!("=> {}", value.to_display_string());
            }
            _ => {
                exec_stmt(statement, ctx)?;
            }
        }
    }
    Ok(())
}

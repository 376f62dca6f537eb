//! `somnia` command-line interface
//!
//! One binary covering both execution paths: `run` interprets source (or
//! executes `.sbc` bytecode), `compile`/`exec` go through the bytecode
//! pipeline, `test` runs registered test blocks under the interpreter.

use std::io::{BufRead, Write};
use std::path::{Path, PathBuf};
use std::process::ExitCode;

use tracing_subscriber::EnvFilter;

use somnia::compiler::Compiler;
use somnia::interpreter::Interpreter;
use somnia::vm::SomniaVM;
use somnia::{parser, BytecodeFile};

const BYTECODE_EXT: &str = "sbc";

fn main() -> ExitCode {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .init();

    let args: Vec<String> = std::env::args().skip(1).collect();
    let mut args = args.iter().map(String::as_str);

    match args.next() {
        Some("compile") | Some("c") => {
            let Some(input) = args.next() else {
                return usage_error("compile requires a source file");
            };
            let output = match (args.next(), args.next()) {
                (Some("-o"), Some(path)) => Some(PathBuf::from(path)),
                (None, _) => None,
                _ => return usage_error("usage: somnia compile <file> [-o out]"),
            };
            cmd_compile(Path::new(input), output)
        }
        Some("run") | Some("r") => match args.next() {
            Some(path) => cmd_run(Path::new(path)),
            None => usage_error("run requires a file"),
        },
        Some("exec") | Some("x") => match args.next() {
            Some(path) => cmd_exec(Path::new(path)),
            None => usage_error("exec requires a source file"),
        },
        Some("test") | Some("t") => match args.next() {
            Some(path) => cmd_test(Path::new(path)),
            None => usage_error("test requires a source file"),
        },
        Some("test-core") => {
            let entry = args.next().unwrap_or("lib/index.somnia");
            cmd_test(Path::new(entry))
        }
        Some("repl") => cmd_repl(),
        Some("version") | Some("v") | Some("--version") => {
            println!("somnia {}", env!("CARGO_PKG_VERSION"));
            ExitCode::SUCCESS
        }
        Some("help") | Some("h") | Some("--help") | None => {
            print_usage();
            ExitCode::SUCCESS
        }
        Some(path) if path.ends_with(".somnia") => cmd_run(Path::new(path)),
        Some(other) => usage_error(&format!("unknown command: {}", other)),
    }
}

fn print_usage() {
    println!("Usage:");
    println!("  somnia compile <file> [-o out]  Compile source to a .{} file", BYTECODE_EXT);
    println!("  somnia run <file>               Interpret source, or execute .{} bytecode", BYTECODE_EXT);
    println!("  somnia exec <file>              Compile and run in one step");
    println!("  somnia test <file>              Run the file's test blocks");
    println!("  somnia test-core [entry]        Run the core library test suite");
    println!("  somnia repl                     Interactive session");
    println!("  somnia version                  Print version");
    println!("  somnia help                     This message");
}

fn usage_error(message: &str) -> ExitCode {
    eprintln!("error: {}", message);
    print_usage();
    ExitCode::FAILURE
}

fn fail(message: impl std::fmt::Display) -> ExitCode {
    eprintln!("error: {}", message);
    ExitCode::FAILURE
}

fn read_source(path: &Path) -> Result<String, ExitCode> {
    std::fs::read_to_string(path)
        .map_err(|e| fail(format_args!("cannot read {}: {}", path.display(), e)))
}

fn compile_source(path: &Path) -> Result<BytecodeFile, ExitCode> {
    let source = read_source(path)?;
    let statements = parser::parse(&source).map_err(|e| fail(e))?;
    Compiler::new().compile(&statements).map_err(|e| fail(e))
}

fn cmd_compile(input: &Path, output: Option<PathBuf>) -> ExitCode {
    let file = match compile_source(input) {
        Ok(file) => file,
        Err(code) => return code,
    };
    let output = output.unwrap_or_else(|| input.with_extension(BYTECODE_EXT));
    let bytes = match file.to_bytes() {
        Ok(bytes) => bytes,
        Err(e) => return fail(e),
    };
    match std::fs::write(&output, bytes) {
        Ok(()) => {
            println!("compiled {} -> {}", input.display(), output.display());
            ExitCode::SUCCESS
        }
        Err(e) => fail(format_args!("cannot write {}: {}", output.display(), e)),
    }
}

fn cmd_run(path: &Path) -> ExitCode {
    if path.extension().and_then(|e| e.to_str()) == Some(BYTECODE_EXT) {
        let bytes = match std::fs::read(path) {
            Ok(bytes) => bytes,
            Err(e) => return fail(format_args!("cannot read {}: {}", path.display(), e)),
        };
        let file = match BytecodeFile::from_bytes(&bytes) {
            Ok(file) => file,
            Err(e) => return fail(e),
        };
        return execute_bytecode(file);
    }

    let source = match read_source(path) {
        Ok(source) => source,
        Err(code) => return code,
    };
    let statements = match parser::parse(&source) {
        Ok(statements) => statements,
        Err(e) => return fail(e),
    };
    let mut interpreter = Interpreter::new();
    match interpreter.interpret(&statements, path) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => fail(e),
    }
}

fn cmd_exec(path: &Path) -> ExitCode {
    match compile_source(path) {
        Ok(file) => execute_bytecode(file),
        Err(code) => code,
    }
}

fn execute_bytecode(file: BytecodeFile) -> ExitCode {
    let mut vm = SomniaVM::new();
    vm.load(file);
    match vm.execute() {
        Ok(_) => ExitCode::SUCCESS,
        Err(e) => fail(e),
    }
}

fn cmd_test(path: &Path) -> ExitCode {
    let source = match read_source(path) {
        Ok(source) => source,
        Err(code) => return code,
    };
    let statements = match parser::parse(&source) {
        Ok(statements) => statements,
        Err(e) => return fail(e),
    };

    let mut interpreter = Interpreter::new();
    if let Err(e) = interpreter.interpret(&statements, path) {
        return fail(e);
    }

    let outcomes = interpreter.run_tests();
    let mut passed = 0;
    let mut failed = 0;
    for outcome in &outcomes {
        match &outcome.failure {
            None => {
                println!("✓ {}", outcome.name);
                passed += 1;
            }
            Some(message) => {
                println!("✗ {}: {}", outcome.name, message);
                failed += 1;
            }
        }
    }

    println!();
    if failed == 0 {
        println!("ALL TESTS PASSED: {}/{}", passed, passed);
        ExitCode::SUCCESS
    } else {
        println!("TESTS FAILED: {}/{} passed, {} failed", passed, passed + failed, failed);
        // Failing tests fail the process, unlike a plain run
        ExitCode::FAILURE
    }
}

fn cmd_repl() -> ExitCode {
    println!("somnia {} repl - type 'exit' to quit", env!("CARGO_PKG_VERSION"));
    let mut interpreter = Interpreter::new();
    let stdin = std::io::stdin();
    let repl_path = Path::new("<repl>");

    loop {
        print!("somnia> ");
        let _ = std::io::stdout().flush();

        let mut line = String::new();
        match stdin.lock().read_line(&mut line) {
            Ok(0) => break,
            Ok(_) => {}
            Err(e) => return fail(e),
        }
        let trimmed = line.trim();
        if trimmed.is_empty() {
            continue;
        }
        if trimmed == "exit" || trimmed == "quit" {
            break;
        }

        match parser::parse(&line) {
            Ok(statements) => {
                if let Err(e) = interpreter.interpret(&statements, repl_path) {
                    println!("error: {}", e);
                }
            }
            Err(e) => println!("error: {}", e),
        }
    }
    ExitCode::SUCCESS
}

//! Somnia language toolchain
//!
//! A small dynamically-typed language with two execution engines that must
//! agree semantically:
//!
//! - **Tree-walking interpreter**: evaluates the AST directly against a chain
//!   of lexical environments. Supports the full language (closures, classes,
//!   imports, tests).
//! - **Bytecode compiler + stack VM**: lowers the AST to a linear opcode
//!   stream with a constant pool, serialized as a versioned `.sbc` container,
//!   executed by a stack machine with call frames and a native dispatch table.
//!
//! # Pipeline
//!
//! source text → [`parser::Lexer`] → tokens → [`parser::Parser`] → AST, then
//! either [`interpreter::Interpreter`] (direct evaluation) or
//! [`compiler::Compiler`] → [`bytecode::BytecodeFile`] → [`vm::SomniaVM`].

pub mod bytecode;
pub mod compiler;
pub mod constant_pool;
pub mod environment;
pub mod error;
pub mod interpreter;
pub mod natives;
pub mod opcodes;
pub mod parser;
pub mod stdlib;
pub mod value;
pub mod vm;

pub use bytecode::{BytecodeFile, CompiledFunction};
pub use compiler::Compiler;
pub use constant_pool::{Constant, ConstantPool};
pub use environment::{EnvRef, Environment};
pub use error::{BytecodeError, CompileError, LexError, RuntimeError, VmError};
pub use interpreter::Interpreter;
pub use opcodes::Opcode;
pub use parser::{Lexer, ParseError, ParseResult, Parser, Token, TokenKind};
pub use value::Value;
pub use vm::SomniaVM;

/// Magic bytes at the start of every bytecode file
pub const MAGIC: [u8; 4] = *b"SOMN";

/// Current bytecode format version
pub const VERSION_MAJOR: u8 = 0;
pub const VERSION_MINOR: u8 = 1;

#[cfg(test)]
mod integration_tests {
    use super::*;

    #[test]
    fn test_compile_and_execute_arithmetic() {
        let stmts = parser::parse("var answer = 40 + 2").unwrap();
        let file = Compiler::new().compile(&stmts).unwrap();

        let mut vm = SomniaVM::new();
        vm.load(file);
        vm.execute().unwrap();

        assert_eq!(vm.global("answer"), Some(Value::Number(42.0)));
    }

    #[test]
    fn test_interpret_arithmetic() {
        let stmts = parser::parse("var answer = 40 + 2").unwrap();
        let mut interp = Interpreter::new();
        interp.interpret(&stmts, std::path::Path::new("<test>")).unwrap();

        assert_eq!(interp.global("answer"), Some(Value::Number(42.0)));
    }
}

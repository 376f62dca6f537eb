//! Error types for the toolchain layers
//!
//! Parse errors live in [`crate::parser::error`] because they carry
//! token-level context; everything else is defined here. Each layer fails
//! with its own kind so the CLI boundary can report precisely what broke.

use thiserror::Error;

/// Lexical errors, fatal to tokenization of the current file
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum LexError {
    #[error("Unterminated string literal starting at line {line}")]
    UnterminatedString { line: u32 },

    #[error("Unexpected character '{ch}' at line {line}")]
    UnexpectedChar { ch: char, line: u32 },
}

/// Runtime errors raised by the tree-walking interpreter
///
/// These propagate as catchable exceptions: the language's own `try`/`catch`
/// binds the message, and the test runner converts them into failures.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RuntimeError {
    #[error("Undefined variable: {name}")]
    UndefinedVariable { name: String },

    #[error("Undefined property: {name}")]
    UndefinedProperty { name: String },

    #[error("Unknown {type_name} method: {name}")]
    UnknownMethod { type_name: &'static str, name: String },

    #[error("Cannot call {type_name}")]
    NotCallable { type_name: &'static str },

    #[error("Cannot get property on {type_name}")]
    NotAnObject { type_name: &'static str },

    #[error("Cannot set property on {type_name}")]
    NotSettable { type_name: &'static str },

    #[error("Assertion failed at line {line}")]
    AssertionFailed { line: u32 },

    #[error("Assertion failed")]
    AssertionFailedNative,

    #[error("{0}")]
    Native(String),
}

/// AST-to-bytecode lowering errors, fatal to the whole compilation unit
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CompileError {
    #[error("Cannot compile {construct} at line {line}")]
    Unsupported { construct: &'static str, line: u32 },

    #[error("Too many locals in function '{function}' (max 256)")]
    TooManyLocals { function: String },

    #[error("Jump target {target} out of range at line {line}")]
    JumpOutOfRange { target: usize, line: u32 },

    #[error("Constant pool limit exceeded (max 65535 entries)")]
    TooManyConstants,
}

/// Bytecode container errors, fatal to loading
///
/// A file that fails any of these checks must not be partially executed.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum BytecodeError {
    #[error("Invalid magic number: expected \"SOMN\", found {found:02x?}")]
    BadMagic { found: [u8; 4] },

    #[error("Unsupported bytecode version {major}.{minor}")]
    UnsupportedVersion { major: u8, minor: u8 },

    #[error("Unknown constant tag: {0}")]
    UnknownConstantTag(u8),

    #[error("Truncated bytecode file while reading {context}")]
    Truncated { context: &'static str },

    #[error("Invalid UTF-8 in string constant")]
    InvalidUtf8,

    #[error("String of {len} bytes exceeds the 65535-byte format limit")]
    StringTooLong { len: usize },
}

/// VM runtime errors, fatal to the current `execute()` call
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum VmError {
    #[error("No bytecode file loaded")]
    NotLoaded,

    #[error("Unknown opcode: 0x{0:02x}")]
    UnknownOpcode(u8),

    #[error("Stack underflow during {op}")]
    StackUnderflow { op: &'static str },

    #[error("Type mismatch: cannot apply {op} to {lhs} and {rhs}")]
    TypeMismatch {
        op: &'static str,
        lhs: &'static str,
        rhs: &'static str,
    },

    #[error("Unexpected end of bytecode while reading {context}")]
    TruncatedBytecode { context: &'static str },

    #[error("Constant pool index {0} out of bounds")]
    BadConstantIndex(u16),

    #[error("Constant at index {index} is not a string")]
    NotAStringConstant { index: u16 },

    #[error("Function index {0} out of bounds")]
    BadFunctionIndex(u16),

    #[error("Local slot {0} out of bounds")]
    BadLocalSlot(u8),

    #[error("Unknown native function: {0}")]
    UnknownNative(String),

    #[error("Call depth limit exceeded")]
    CallDepthExceeded,

    #[error("Undefined global: {0}")]
    UndefinedGlobal(String),

    #[error("{0}")]
    Native(String),

    #[error("I/O error: {0}")]
    Io(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_lex_error_display() {
        let err = LexError::UnexpectedChar { ch: '@', line: 3 };
        assert_eq!(err.to_string(), "Unexpected character '@' at line 3");
    }

    #[test]
    fn test_runtime_error_display() {
        let err = RuntimeError::UndefinedVariable {
            name: "z".to_string(),
        };
        assert_eq!(err.to_string(), "Undefined variable: z");

        let err = RuntimeError::AssertionFailed { line: 7 };
        assert_eq!(err.to_string(), "Assertion failed at line 7");
    }

    #[test]
    fn test_vm_error_display() {
        let err = VmError::TypeMismatch {
            op: "SUB",
            lhs: "string",
            rhs: "number",
        };
        assert_eq!(
            err.to_string(),
            "Type mismatch: cannot apply SUB to string and number"
        );
    }

    #[test]
    fn test_bytecode_error_display() {
        let err = BytecodeError::BadMagic {
            found: [0x50, 0x4b, 0x03, 0x04],
        };
        assert!(err.to_string().contains("SOMN"));
    }
}

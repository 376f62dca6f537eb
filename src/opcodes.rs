//! Bytecode instruction set for the Somnia VM
//!
//! A stack machine with call frames. Opcodes are single bytes; operands are
//! big-endian and immediately follow the opcode. Jump targets are absolute
//! offsets into the current function's code.

use crate::error::VmError;

#[repr(u8)]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Opcode {
    Nop = 0x00,

    // Constants
    /// Push null
    ConstNull = 0x01,
    /// Push true
    ConstTrue = 0x02,
    /// Push false
    ConstFalse = 0x03,
    /// Push an Int constant
    /// Operand: u16 (constant pool index)
    ConstInt = 0x04,
    /// Push a Long constant
    /// Operand: u16 (constant pool index)
    ConstLong = 0x05,
    /// Push a Double constant
    /// Operand: u16 (constant pool index)
    ConstDouble = 0x06,
    /// Push a String constant
    /// Operand: u16 (constant pool index)
    ConstString = 0x07,

    // Stack manipulation
    Pop = 0x10,
    Dup = 0x11,
    Swap = 0x12,

    // Locals and globals
    /// Operand: u8 (local slot)
    LoadLocal = 0x20,
    /// Operand: u8 (local slot)
    StoreLocal = 0x21,
    /// Operand: u16 (constant pool index of the global's name)
    LoadGlobal = 0x22,
    /// Operand: u16 (constant pool index of the global's name)
    StoreGlobal = 0x23,

    // Arithmetic (binary ops pop 2, push 1; Neg pops 1, pushes 1)
    Add = 0x30,
    Sub = 0x31,
    Mul = 0x32,
    Div = 0x33,
    Mod = 0x34,
    Neg = 0x35,

    // Comparison (pop 2, push 1 bool)
    Eq = 0x40,
    Ne = 0x41,
    Lt = 0x42,
    Gt = 0x43,
    Le = 0x44,
    Ge = 0x45,

    // Logical (And/Or pop 2, Not pops 1; all push 1 bool)
    And = 0x50,
    Or = 0x51,
    Not = 0x52,

    // Control flow
    /// Operand: u16 (absolute offset in the current function)
    Jump = 0x60,
    /// Pops the condition
    /// Operand: u16 (absolute offset)
    JumpIfTrue = 0x61,
    /// Pops the condition
    /// Operand: u16 (absolute offset)
    JumpIfFalse = 0x62,

    // Calls
    /// Call a compiled function; arguments are on the stack in order
    /// Operands: u16 (function index), u8 (arg count)
    /// Stack: [arg0, .., argN] -> [result]
    Call = 0x70,
    /// Call a native by name; always pushes a result (null for void natives)
    /// Operands: u16 (constant pool index of the name), u8 (arg count)
    CallNative = 0x71,
    /// Return top of stack to the caller
    Return = 0x72,
    /// Return null to the caller
    ReturnVoid = 0x73,

    // Objects
    /// Push a new empty object
    NewObject = 0x80,
    /// Operand: u16 (constant pool index of the field name)
    /// Stack: [obj] -> [value]
    GetField = 0x81,
    /// Operand: u16 (constant pool index of the field name)
    /// Stack: [obj, value] -> []
    SetField = 0x82,

    // Arrays
    /// Push a new empty array
    NewArray = 0x90,
    /// Stack: [arr, index] -> [value]
    ArrayGet = 0x91,
    /// Stack: [arr, index, value] -> []
    ArraySet = 0x92,
    /// Stack: [arr] -> [length]
    ArrayLen = 0x93,

    // I/O
    Print = 0xA0,
    Println = 0xA1,
    ReadLine = 0xA2,

    Halt = 0xFF,
}

impl Opcode {
    pub fn from_u8(byte: u8) -> Result<Self, VmError> {
        match byte {
            0x00 => Ok(Opcode::Nop),
            0x01 => Ok(Opcode::ConstNull),
            0x02 => Ok(Opcode::ConstTrue),
            0x03 => Ok(Opcode::ConstFalse),
            0x04 => Ok(Opcode::ConstInt),
            0x05 => Ok(Opcode::ConstLong),
            0x06 => Ok(Opcode::ConstDouble),
            0x07 => Ok(Opcode::ConstString),
            0x10 => Ok(Opcode::Pop),
            0x11 => Ok(Opcode::Dup),
            0x12 => Ok(Opcode::Swap),
            0x20 => Ok(Opcode::LoadLocal),
            0x21 => Ok(Opcode::StoreLocal),
            0x22 => Ok(Opcode::LoadGlobal),
            0x23 => Ok(Opcode::StoreGlobal),
            0x30 => Ok(Opcode::Add),
            0x31 => Ok(Opcode::Sub),
            0x32 => Ok(Opcode::Mul),
            0x33 => Ok(Opcode::Div),
            0x34 => Ok(Opcode::Mod),
            0x35 => Ok(Opcode::Neg),
            0x40 => Ok(Opcode::Eq),
            0x41 => Ok(Opcode::Ne),
            0x42 => Ok(Opcode::Lt),
            0x43 => Ok(Opcode::Gt),
            0x44 => Ok(Opcode::Le),
            0x45 => Ok(Opcode::Ge),
            0x50 => Ok(Opcode::And),
            0x51 => Ok(Opcode::Or),
            0x52 => Ok(Opcode::Not),
            0x60 => Ok(Opcode::Jump),
            0x61 => Ok(Opcode::JumpIfTrue),
            0x62 => Ok(Opcode::JumpIfFalse),
            0x70 => Ok(Opcode::Call),
            0x71 => Ok(Opcode::CallNative),
            0x72 => Ok(Opcode::Return),
            0x73 => Ok(Opcode::ReturnVoid),
            0x80 => Ok(Opcode::NewObject),
            0x81 => Ok(Opcode::GetField),
            0x82 => Ok(Opcode::SetField),
            0x90 => Ok(Opcode::NewArray),
            0x91 => Ok(Opcode::ArrayGet),
            0x92 => Ok(Opcode::ArraySet),
            0x93 => Ok(Opcode::ArrayLen),
            0xA0 => Ok(Opcode::Print),
            0xA1 => Ok(Opcode::Println),
            0xA2 => Ok(Opcode::ReadLine),
            0xFF => Ok(Opcode::Halt),
            _ => Err(VmError::UnknownOpcode(byte)),
        }
    }

    /// Number of operand bytes following this opcode
    pub fn operand_size(&self) -> usize {
        match self {
            Opcode::ConstInt
            | Opcode::ConstLong
            | Opcode::ConstDouble
            | Opcode::ConstString
            | Opcode::LoadGlobal
            | Opcode::StoreGlobal
            | Opcode::Jump
            | Opcode::JumpIfTrue
            | Opcode::JumpIfFalse
            | Opcode::GetField
            | Opcode::SetField => 2,

            Opcode::LoadLocal | Opcode::StoreLocal => 1,

            // u16 target + u8 arg count
            Opcode::Call | Opcode::CallNative => 3,

            _ => 0,
        }
    }
}

/// Read a big-endian u16 from a code stream
#[inline]
pub fn read_u16(code: &[u8], offset: usize) -> Result<u16, VmError> {
    if offset + 2 > code.len() {
        return Err(VmError::TruncatedBytecode { context: "u16 operand" });
    }
    Ok(u16::from_be_bytes([code[offset], code[offset + 1]]))
}

/// Read a u8 from a code stream
#[inline]
pub fn read_u8(code: &[u8], offset: usize) -> Result<u8, VmError> {
    if offset >= code.len() {
        return Err(VmError::TruncatedBytecode { context: "u8 operand" });
    }
    Ok(code[offset])
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_opcode_roundtrip() {
        let opcodes = [
            Opcode::Nop,
            Opcode::ConstString,
            Opcode::LoadLocal,
            Opcode::StoreGlobal,
            Opcode::Add,
            Opcode::JumpIfFalse,
            Opcode::Call,
            Opcode::ArraySet,
            Opcode::Println,
            Opcode::Halt,
        ];

        for opcode in opcodes {
            let byte = opcode as u8;
            let parsed = Opcode::from_u8(byte).unwrap();
            assert_eq!(opcode, parsed);
        }
    }

    #[test]
    fn test_invalid_opcode() {
        assert_eq!(Opcode::from_u8(0xCC), Err(VmError::UnknownOpcode(0xCC)));
    }

    #[test]
    fn test_operand_sizes() {
        assert_eq!(Opcode::ConstInt.operand_size(), 2);
        assert_eq!(Opcode::LoadLocal.operand_size(), 1);
        assert_eq!(Opcode::Call.operand_size(), 3);
        assert_eq!(Opcode::CallNative.operand_size(), 3);
        assert_eq!(Opcode::Add.operand_size(), 0);
        assert_eq!(Opcode::Halt.operand_size(), 0);
    }

    #[test]
    fn test_read_helpers_big_endian() {
        let code = [0x01, 0x02, 0x03];
        assert_eq!(read_u16(&code, 0).unwrap(), 0x0102);
        assert_eq!(read_u16(&code, 1).unwrap(), 0x0203);
        assert_eq!(read_u8(&code, 2).unwrap(), 0x03);
        assert!(read_u16(&code, 2).is_err());
        assert!(read_u8(&code, 3).is_err());
    }
}

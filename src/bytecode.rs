//! Serialized bytecode container
//!
//! Layout, all multi-byte values big-endian:
//!
//! ```text
//! magic      "SOMN" (4 bytes)
//! version    major u8, minor u8
//! pool       u16 count, then tagged entries
//! functions  u16 count, then entries:
//!              name (u16 length + UTF-8 bytes)
//!              u8 param count, u8 local count
//!              u32 code length, code bytes
//! entry      u16 function index
//! ```
//!
//! Constant tags: 0 null, 1 true, 2 false, 3 i32, 4 i64, 5 f64,
//! 6 string (u16 length + UTF-8 bytes).

use crate::constant_pool::{Constant, ConstantPool};
use crate::error::BytecodeError;
use crate::{MAGIC, VERSION_MAJOR, VERSION_MINOR};

/// One compiled function body
#[derive(Debug, Clone, PartialEq)]
pub struct CompiledFunction {
    pub name: String,
    pub param_count: u8,
    pub local_count: u8,
    pub code: Vec<u8>,
}

/// A complete compiled program
#[derive(Debug, Clone)]
pub struct BytecodeFile {
    pub pool: ConstantPool,
    pub functions: Vec<CompiledFunction>,
    pub entry_point: u16,
}

impl BytecodeFile {
    pub fn to_bytes(&self) -> Result<Vec<u8>, BytecodeError> {
        let mut out = Vec::new();
        out.extend_from_slice(&MAGIC);
        out.push(VERSION_MAJOR);
        out.push(VERSION_MINOR);

        out.extend_from_slice(&(self.pool.len() as u16).to_be_bytes());
        for constant in self.pool.entries() {
            out.push(constant.tag());
            match constant {
                Constant::Null | Constant::True | Constant::False => {}
                Constant::Int(i) => out.extend_from_slice(&i.to_be_bytes()),
                Constant::Long(l) => out.extend_from_slice(&l.to_be_bytes()),
                Constant::Double(d) => out.extend_from_slice(&d.to_bits().to_be_bytes()),
                Constant::Str(s) => write_utf(&mut out, s)?,
            }
        }

        out.extend_from_slice(&(self.functions.len() as u16).to_be_bytes());
        for func in &self.functions {
            write_utf(&mut out, &func.name)?;
            out.push(func.param_count);
            out.push(func.local_count);
            out.extend_from_slice(&(func.code.len() as u32).to_be_bytes());
            out.extend_from_slice(&func.code);
        }

        out.extend_from_slice(&self.entry_point.to_be_bytes());
        Ok(out)
    }

    pub fn from_bytes(bytes: &[u8]) -> Result<Self, BytecodeError> {
        let mut r = Reader::new(bytes);

        let magic = r.take(4, "magic")?;
        if magic != MAGIC {
            let mut found = [0u8; 4];
            found.copy_from_slice(magic);
            return Err(BytecodeError::BadMagic { found });
        }

        let major = r.u8("version")?;
        let minor = r.u8("version")?;
        if major != VERSION_MAJOR {
            return Err(BytecodeError::UnsupportedVersion { major, minor });
        }

        let pool_count = r.u16("constant pool count")?;
        let mut constants = Vec::with_capacity(pool_count as usize);
        for _ in 0..pool_count {
            let tag = r.u8("constant tag")?;
            let constant = match tag {
                0 => Constant::Null,
                1 => Constant::True,
                2 => Constant::False,
                3 => Constant::Int(i32::from_be_bytes(r.array("i32 constant")?)),
                4 => Constant::Long(i64::from_be_bytes(r.array("i64 constant")?)),
                5 => Constant::Double(f64::from_bits(u64::from_be_bytes(
                    r.array("f64 constant")?,
                ))),
                6 => Constant::Str(r.utf("string constant")?),
                other => return Err(BytecodeError::UnknownConstantTag(other)),
            };
            constants.push(constant);
        }

        let function_count = r.u16("function count")?;
        let mut functions = Vec::with_capacity(function_count as usize);
        for _ in 0..function_count {
            let name = r.utf("function name")?;
            let param_count = r.u8("param count")?;
            let local_count = r.u8("local count")?;
            let code_len = r.u32("code length")? as usize;
            let code = r.take(code_len, "function code")?.to_vec();
            functions.push(CompiledFunction {
                name,
                param_count,
                local_count,
                code,
            });
        }

        let entry_point = r.u16("entry point")?;

        Ok(BytecodeFile {
            pool: ConstantPool::from_vec(constants),
            functions,
            entry_point,
        })
    }
}

// The length prefix is a u16, so longer strings cannot be represented
fn write_utf(out: &mut Vec<u8>, s: &str) -> Result<(), BytecodeError> {
    if s.len() > u16::MAX as usize {
        return Err(BytecodeError::StringTooLong { len: s.len() });
    }
    out.extend_from_slice(&(s.len() as u16).to_be_bytes());
    out.extend_from_slice(s.as_bytes());
    Ok(())
}

struct Reader<'a> {
    bytes: &'a [u8],
    pos: usize,
}

impl<'a> Reader<'a> {
    fn new(bytes: &'a [u8]) -> Self {
        Reader { bytes, pos: 0 }
    }

    fn take(&mut self, n: usize, context: &'static str) -> Result<&'a [u8], BytecodeError> {
        if self.pos + n > self.bytes.len() {
            return Err(BytecodeError::Truncated { context });
        }
        let slice = &self.bytes[self.pos..self.pos + n];
        self.pos += n;
        Ok(slice)
    }

    fn array<const N: usize>(&mut self, context: &'static str) -> Result<[u8; N], BytecodeError> {
        let mut buf = [0u8; N];
        buf.copy_from_slice(self.take(N, context)?);
        Ok(buf)
    }

    fn u8(&mut self, context: &'static str) -> Result<u8, BytecodeError> {
        Ok(self.take(1, context)?[0])
    }

    fn u16(&mut self, context: &'static str) -> Result<u16, BytecodeError> {
        Ok(u16::from_be_bytes(self.array(context)?))
    }

    fn u32(&mut self, context: &'static str) -> Result<u32, BytecodeError> {
        Ok(u32::from_be_bytes(self.array(context)?))
    }

    fn utf(&mut self, context: &'static str) -> Result<String, BytecodeError> {
        let len = self.u16(context)? as usize;
        let bytes = self.take(len, context)?;
        String::from_utf8(bytes.to_vec()).map_err(|_| BytecodeError::InvalidUtf8)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::opcodes::Opcode;

    fn sample_file() -> BytecodeFile {
        let mut pool = ConstantPool::new();
        let answer = pool.add(Constant::Int(42)).unwrap();
        let name = pool.add_string("answer").unwrap();
        pool.add(Constant::Double(1.5)).unwrap();
        pool.add(Constant::Long(5_000_000_000)).unwrap();
        pool.add(Constant::Null).unwrap();

        let code = vec![
            Opcode::ConstInt as u8,
            (answer >> 8) as u8,
            answer as u8,
            Opcode::StoreGlobal as u8,
            (name >> 8) as u8,
            name as u8,
            Opcode::Halt as u8,
        ];

        BytecodeFile {
            pool,
            functions: vec![CompiledFunction {
                name: "__main__".to_string(),
                param_count: 0,
                local_count: 0,
                code,
            }],
            entry_point: 0,
        }
    }

    #[test]
    fn test_header_layout() {
        let bytes = sample_file().to_bytes().unwrap();
        assert_eq!(&bytes[0..4], b"SOMN");
        assert_eq!(bytes[4], VERSION_MAJOR);
        assert_eq!(bytes[5], VERSION_MINOR);
        // pool count is big-endian
        assert_eq!(u16::from_be_bytes([bytes[6], bytes[7]]), 5);
    }

    #[test]
    fn test_round_trip() {
        let file = sample_file();
        let decoded = BytecodeFile::from_bytes(&file.to_bytes().unwrap()).unwrap();

        assert_eq!(decoded.pool.entries(), file.pool.entries());
        assert_eq!(decoded.functions, file.functions);
        assert_eq!(decoded.entry_point, 0);
    }

    #[test]
    fn test_bad_magic() {
        let mut bytes = sample_file().to_bytes().unwrap();
        bytes[0] = b'X';
        let err = BytecodeFile::from_bytes(&bytes).unwrap_err();
        assert!(matches!(err, BytecodeError::BadMagic { .. }));
    }

    #[test]
    fn test_unsupported_version() {
        let mut bytes = sample_file().to_bytes().unwrap();
        bytes[4] = 9;
        let err = BytecodeFile::from_bytes(&bytes).unwrap_err();
        assert_eq!(
            err,
            BytecodeError::UnsupportedVersion { major: 9, minor: 1 }
        );
    }

    #[test]
    fn test_truncated() {
        let bytes = sample_file().to_bytes().unwrap();
        let err = BytecodeFile::from_bytes(&bytes[..bytes.len() - 4]).unwrap_err();
        assert!(matches!(err, BytecodeError::Truncated { .. }));
    }

    #[test]
    fn test_unknown_constant_tag() {
        let mut bytes = sample_file().to_bytes().unwrap();
        // first constant's tag byte sits right after the pool count
        bytes[8] = 99;
        let err = BytecodeFile::from_bytes(&bytes).unwrap_err();
        assert_eq!(err, BytecodeError::UnknownConstantTag(99));
    }

    #[test]
    fn test_empty_program() {
        let file = BytecodeFile {
            pool: ConstantPool::new(),
            functions: vec![CompiledFunction {
                name: "__main__".to_string(),
                param_count: 0,
                local_count: 0,
                code: vec![Opcode::Halt as u8],
            }],
            entry_point: 0,
        };
        let decoded = BytecodeFile::from_bytes(&file.to_bytes().unwrap()).unwrap();
        assert_eq!(decoded.functions.len(), 1);
        assert!(decoded.pool.is_empty());
    }

    #[test]
    fn test_oversized_string_constant_rejected() {
        let mut pool = ConstantPool::new();
        pool.add_string("x".repeat(70_000)).unwrap();
        let file = BytecodeFile {
            pool,
            functions: vec![CompiledFunction {
                name: "__main__".to_string(),
                param_count: 0,
                local_count: 0,
                code: vec![Opcode::Halt as u8],
            }],
            entry_point: 0,
        };
        assert_eq!(
            file.to_bytes().unwrap_err(),
            BytecodeError::StringTooLong { len: 70_000 }
        );
    }
}

//! Constant pool for compiled programs
//!
//! Constants are accessed by u16 index from bytecode instructions. The pool
//! deduplicates on insert so repeated literals and names share one entry.

use std::collections::HashMap;

use crate::error::{CompileError, VmError};
use crate::value::Value;

/// A constant pool entry, tagged on the wire
///
/// Tags 0-6 in serialized order: Null, True, False, Int, Long, Double, Str.
#[derive(Debug, Clone, PartialEq)]
pub enum Constant {
    Null,
    True,
    False,
    Int(i32),
    Long(i64),
    Double(f64),
    Str(String),
}

impl Constant {
    /// Wire tag for this constant
    pub fn tag(&self) -> u8 {
        match self {
            Constant::Null => 0,
            Constant::True => 1,
            Constant::False => 2,
            Constant::Int(_) => 3,
            Constant::Long(_) => 4,
            Constant::Double(_) => 5,
            Constant::Str(_) => 6,
        }
    }

    /// Convert to a runtime value
    pub fn to_value(&self) -> Value {
        match self {
            Constant::Null => Value::Null,
            Constant::True => Value::Bool(true),
            Constant::False => Value::Bool(false),
            Constant::Int(i) => Value::Number(*i as f64),
            Constant::Long(l) => Value::Number(*l as f64),
            Constant::Double(d) => Value::Number(*d),
            Constant::Str(s) => Value::String(s.clone()),
        }
    }

    /// Dedup key; floats key on their bit pattern so NaN payloads and -0.0
    /// stay distinct entries
    fn key(&self) -> ConstantKey {
        match self {
            Constant::Null => ConstantKey::Null,
            Constant::True => ConstantKey::True,
            Constant::False => ConstantKey::False,
            Constant::Int(i) => ConstantKey::Int(*i),
            Constant::Long(l) => ConstantKey::Long(*l),
            Constant::Double(d) => ConstantKey::Double(d.to_bits()),
            Constant::Str(s) => ConstantKey::Str(s.clone()),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
enum ConstantKey {
    Null,
    True,
    False,
    Int(i32),
    Long(i64),
    Double(u64),
    Str(String),
}

#[derive(Debug, Clone, Default)]
pub struct ConstantPool {
    constants: Vec<Constant>,
    index: HashMap<ConstantKey, u16>,
}

impl ConstantPool {
    pub fn new() -> Self {
        ConstantPool::default()
    }

    /// Rebuild a pool from deserialized entries
    pub fn from_vec(constants: Vec<Constant>) -> Self {
        let mut index = HashMap::new();
        for (i, constant) in constants.iter().enumerate() {
            index.entry(constant.key()).or_insert(i as u16);
        }
        ConstantPool { constants, index }
    }

    /// Intern a constant, returning the index of the existing entry if one
    /// matches. The serialized pool count is a u16, so a pool holds at most
    /// 65535 entries; interning a new constant past that fails.
    pub fn add(&mut self, constant: Constant) -> Result<u16, CompileError> {
        let key = constant.key();
        if let Some(&existing) = self.index.get(&key) {
            return Ok(existing);
        }
        if self.constants.len() >= u16::MAX as usize {
            return Err(CompileError::TooManyConstants);
        }
        let idx = self.constants.len() as u16;
        self.constants.push(constant);
        self.index.insert(key, idx);
        Ok(idx)
    }

    /// Intern a string constant
    pub fn add_string(&mut self, s: impl Into<String>) -> Result<u16, CompileError> {
        self.add(Constant::Str(s.into()))
    }

    /// Intern a number, picking the narrowest representation that holds it
    pub fn add_number(&mut self, n: f64) -> Result<u16, CompileError> {
        if n.fract() == 0.0 && n.is_finite() {
            if n >= i32::MIN as f64 && n <= i32::MAX as f64 {
                return self.add(Constant::Int(n as i32));
            }
            if n >= i64::MIN as f64 && n <= i64::MAX as f64 {
                return self.add(Constant::Long(n as i64));
            }
        }
        self.add(Constant::Double(n))
    }

    pub fn get(&self, index: u16) -> Result<&Constant, VmError> {
        self.constants
            .get(index as usize)
            .ok_or(VmError::BadConstantIndex(index))
    }

    /// Get a string constant, for name operands
    pub fn get_string(&self, index: u16) -> Result<&str, VmError> {
        match self.get(index)? {
            Constant::Str(s) => Ok(s),
            _ => Err(VmError::NotAStringConstant { index }),
        }
    }

    pub fn len(&self) -> usize {
        self.constants.len()
    }

    pub fn is_empty(&self) -> bool {
        self.constants.is_empty()
    }

    pub fn entries(&self) -> &[Constant] {
        &self.constants
    }
}

//! Stack-based virtual machine
//!
//! Executes a loaded [`BytecodeFile`] starting at its entry point. State is
//! an operand stack, a frame stack, a globals table, and a native dispatch
//! table pre-populated from [`crate::stdlib`].
//!
//! Arithmetic and comparison opcodes check operand types and fail with
//! [`VmError::TypeMismatch`] instead of coercing; logic opcodes and
//! conditional jumps use language truthiness so compiled programs branch the
//! same way interpreted ones do.

use std::collections::HashMap;
use std::io::{BufRead, Write};
use std::rc::Rc;

use crate::bytecode::{BytecodeFile, CompiledFunction};
use crate::constant_pool::ConstantPool;
use crate::error::VmError;
use crate::opcodes::{read_u16, read_u8, Opcode};
use crate::stdlib::{self, VmNative};
use crate::value::Value;

const MAX_CALL_DEPTH: usize = 1000;

pub struct SomniaVM {
    pool: ConstantPool,
    functions: Vec<Rc<CompiledFunction>>,
    entry_point: u16,
    loaded: bool,
    stack: Vec<Value>,
    globals: HashMap<String, Value>,
    natives: HashMap<String, VmNative>,
}

struct Frame {
    func: Rc<CompiledFunction>,
    ip: usize,
    locals: Vec<Value>,
}

impl Frame {
    fn new(func: Rc<CompiledFunction>, args: Vec<Value>) -> Self {
        let mut locals = vec![Value::Null; func.local_count as usize];
        for (slot, arg) in locals.iter_mut().zip(args) {
            *slot = arg;
        }
        Frame {
            func,
            ip: 0,
            locals,
        }
    }
}

/// One decoded instruction; operands default to zero when absent
struct Decoded {
    op: Opcode,
    wide: u16,
    narrow: u8,
}

impl Default for SomniaVM {
    fn default() -> Self {
        Self::new()
    }
}

impl SomniaVM {
    pub fn new() -> Self {
        SomniaVM {
            pool: ConstantPool::new(),
            functions: Vec::new(),
            entry_point: 0,
            loaded: false,
            stack: Vec::new(),
            globals: HashMap::new(),
            natives: stdlib::all(),
        }
    }

    pub fn load(&mut self, file: BytecodeFile) {
        self.pool = file.pool;
        self.functions = file.functions.into_iter().map(Rc::new).collect();
        self.entry_point = file.entry_point;
        self.loaded = true;
    }

    pub fn register_native(&mut self, name: impl Into<String>, native: VmNative) {
        self.natives.insert(name.into(), native);
    }

    pub fn global(&self, name: &str) -> Option<Value> {
        self.globals.get(name).cloned()
    }

    pub fn execute(&mut self) -> Result<Value, VmError> {
        if !self.loaded {
            return Err(VmError::NotLoaded);
        }
        let entry = self.function(self.entry_point)?;
        let mut frames = vec![Frame::new(entry, Vec::new())];

        loop {
            let Some(frame) = frames.last_mut() else {
                return Ok(Value::Null);
            };

            // Running off the end of a function is an implicit void return
            if frame.ip >= frame.func.code.len() {
                frames.pop();
                if frames.is_empty() {
                    return Ok(Value::Null);
                }
                self.stack.push(Value::Null);
                continue;
            }

            let decoded = Self::fetch(frame)?;
            match decoded.op {
                Opcode::Nop => {}

                Opcode::ConstNull => self.stack.push(Value::Null),
                Opcode::ConstTrue => self.stack.push(Value::Bool(true)),
                Opcode::ConstFalse => self.stack.push(Value::Bool(false)),
                Opcode::ConstInt
                | Opcode::ConstLong
                | Opcode::ConstDouble
                | Opcode::ConstString => {
                    let value = self.pool.get(decoded.wide)?.to_value();
                    self.stack.push(value);
                }

                Opcode::Pop => {
                    self.pop("POP")?;
                }
                Opcode::Dup => {
                    let top = self.peek("DUP")?.clone();
                    self.stack.push(top);
                }
                Opcode::Swap => {
                    let a = self.pop("SWAP")?;
                    let b = self.pop("SWAP")?;
                    self.stack.push(a);
                    self.stack.push(b);
                }

                Opcode::LoadLocal => {
                    let frame = Self::current(&frames)?;
                    let value = frame
                        .locals
                        .get(decoded.narrow as usize)
                        .cloned()
                        .ok_or(VmError::BadLocalSlot(decoded.narrow))?;
                    self.stack.push(value);
                }
                Opcode::StoreLocal => {
                    let value = self.pop("STORE_LOCAL")?;
                    let frame = Self::current_mut(&mut frames)?;
                    let slot = frame
                        .locals
                        .get_mut(decoded.narrow as usize)
                        .ok_or(VmError::BadLocalSlot(decoded.narrow))?;
                    *slot = value;
                }
                Opcode::LoadGlobal => {
                    let name = self.pool.get_string(decoded.wide)?;
                    let value = self
                        .globals
                        .get(name)
                        .cloned()
                        .ok_or_else(|| VmError::UndefinedGlobal(name.to_string()))?;
                    self.stack.push(value);
                }
                Opcode::StoreGlobal => {
                    let value = self.pop("STORE_GLOBAL")?;
                    let name = self.pool.get_string(decoded.wide)?.to_string();
                    self.globals.insert(name, value);
                }

                Opcode::Add => {
                    let (a, b) = self.pop_pair("ADD")?;
                    let result = Self::add(a, b)?;
                    self.stack.push(result);
                }
                Opcode::Sub => self.numeric_op("SUB", |a, b| a - b)?,
                Opcode::Mul => self.numeric_op("MUL", |a, b| a * b)?,
                Opcode::Div => self.numeric_op("DIV", |a, b| a / b)?,
                Opcode::Mod => self.numeric_op("MOD", |a, b| a % b)?,
                Opcode::Neg => {
                    let v = self.pop("NEG")?;
                    match v.as_number() {
                        Some(n) => self.stack.push(Value::Number(-n)),
                        None => {
                            return Err(VmError::TypeMismatch {
                                op: "NEG",
                                lhs: v.type_name(),
                                rhs: "number",
                            });
                        }
                    }
                }

                Opcode::Eq => {
                    let (a, b) = self.pop_pair("EQ")?;
                    self.stack.push(Value::Bool(a == b));
                }
                Opcode::Ne => {
                    let (a, b) = self.pop_pair("NE")?;
                    self.stack.push(Value::Bool(a != b));
                }
                Opcode::Lt => self.compare_op("LT", |o| o == std::cmp::Ordering::Less)?,
                Opcode::Le => self.compare_op("LE", |o| o != std::cmp::Ordering::Greater)?,
                Opcode::Gt => self.compare_op("GT", |o| o == std::cmp::Ordering::Greater)?,
                Opcode::Ge => self.compare_op("GE", |o| o != std::cmp::Ordering::Less)?,

                Opcode::And => {
                    let (a, b) = self.pop_pair("AND")?;
                    self.stack.push(Value::Bool(a.is_truthy() && b.is_truthy()));
                }
                Opcode::Or => {
                    let (a, b) = self.pop_pair("OR")?;
                    self.stack.push(Value::Bool(a.is_truthy() || b.is_truthy()));
                }
                Opcode::Not => {
                    let v = self.pop("NOT")?;
                    self.stack.push(Value::Bool(!v.is_truthy()));
                }

                Opcode::Jump => {
                    Self::current_mut(&mut frames)?.ip = decoded.wide as usize;
                }
                Opcode::JumpIfTrue => {
                    let cond = self.pop("JUMP_IF_TRUE")?;
                    if cond.is_truthy() {
                        Self::current_mut(&mut frames)?.ip = decoded.wide as usize;
                    }
                }
                Opcode::JumpIfFalse => {
                    let cond = self.pop("JUMP_IF_FALSE")?;
                    if !cond.is_truthy() {
                        Self::current_mut(&mut frames)?.ip = decoded.wide as usize;
                    }
                }

                Opcode::Call => {
                    if frames.len() >= MAX_CALL_DEPTH {
                        return Err(VmError::CallDepthExceeded);
                    }
                    let func = self.function(decoded.wide)?;
                    let args = self.pop_args(decoded.narrow, "CALL")?;
                    frames.push(Frame::new(func, args));
                }
                Opcode::CallNative => {
                    let name = self.pool.get_string(decoded.wide)?;
                    let native = *self
                        .natives
                        .get(name)
                        .ok_or_else(|| VmError::UnknownNative(name.to_string()))?;
                    let args = self.pop_args(decoded.narrow, "CALL_NATIVE")?;
                    let result = native(&args)?;
                    self.stack.push(result);
                }
                Opcode::Return => {
                    let value = self.pop("RETURN")?;
                    frames.pop();
                    if frames.is_empty() {
                        return Ok(value);
                    }
                    self.stack.push(value);
                }
                Opcode::ReturnVoid => {
                    frames.pop();
                    if frames.is_empty() {
                        return Ok(Value::Null);
                    }
                    self.stack.push(Value::Null);
                }

                Opcode::NewObject => self.stack.push(Value::map(HashMap::new())),
                Opcode::GetField => {
                    let obj = self.pop("GET_FIELD")?;
                    let name = self.pool.get_string(decoded.wide)?;
                    let value = Self::get_field(&obj, name)?;
                    self.stack.push(value);
                }
                Opcode::SetField => {
                    let value = self.pop("SET_FIELD")?;
                    let obj = self.pop("SET_FIELD")?;
                    let name = self.pool.get_string(decoded.wide)?;
                    match obj {
                        Value::Map(entries) => {
                            entries.borrow_mut().insert(name.to_string(), value);
                        }
                        other => {
                            return Err(VmError::Native(format!(
                                "Cannot set field '{}' on {}",
                                name,
                                other.type_name()
                            )));
                        }
                    }
                }

                Opcode::NewArray => self.stack.push(Value::list(Vec::new())),
                Opcode::ArrayGet => {
                    let index = self.pop("ARRAY_GET")?;
                    let obj = self.pop("ARRAY_GET")?;
                    let value = Self::array_get(&obj, &index)?;
                    self.stack.push(value);
                }
                Opcode::ArraySet => {
                    let value = self.pop("ARRAY_SET")?;
                    let index = self.pop("ARRAY_SET")?;
                    let obj = self.pop("ARRAY_SET")?;
                    Self::array_set(&obj, &index, value)?;
                }
                Opcode::ArrayLen => {
                    let obj = self.pop("ARRAY_LEN")?;
                    let len = match &obj {
                        Value::List(items) => items.borrow().len(),
                        Value::Map(entries) => entries.borrow().len(),
                        Value::String(s) => s.chars().count(),
                        other => {
                            return Err(VmError::TypeMismatch {
                                op: "ARRAY_LEN",
                                lhs: other.type_name(),
                                rhs: "list",
                            });
                        }
                    };
                    self.stack.push(Value::Number(len as f64));
                }

                Opcode::Print => {
                    let v = self.pop("PRINT")?;
                    print!("{}", v);
                    let _ = std::io::stdout().flush();
                }
                Opcode::Println => {
                    let v = self.pop("PRINTLN")?;
                    println!("{}", v);
                }
                Opcode::ReadLine => {
                    let mut line = String::new();
                    std::io::stdin()
                        .lock()
                        .read_line(&mut line)
                        .map_err(|e| VmError::Io(e.to_string()))?;
                    while line.ends_with('\n') || line.ends_with('\r') {
                        line.pop();
                    }
                    self.stack.push(Value::String(line));
                }

                Opcode::Halt => return Ok(Value::Null),
            }
        }
    }

    /// Decode the instruction at the frame's ip and advance past it
    fn fetch(frame: &mut Frame) -> Result<Decoded, VmError> {
        let func = Rc::clone(&frame.func);
        let code = &func.code;
        let op = Opcode::from_u8(code[frame.ip])?;
        frame.ip += 1;

        let mut decoded = Decoded {
            op,
            wide: 0,
            narrow: 0,
        };
        match op.operand_size() {
            1 => {
                decoded.narrow = read_u8(code, frame.ip)?;
                frame.ip += 1;
            }
            2 => {
                decoded.wide = read_u16(code, frame.ip)?;
                frame.ip += 2;
            }
            3 => {
                decoded.wide = read_u16(code, frame.ip)?;
                decoded.narrow = read_u8(code, frame.ip + 2)?;
                frame.ip += 3;
            }
            _ => {}
        }
        Ok(decoded)
    }

    fn function(&self, index: u16) -> Result<Rc<CompiledFunction>, VmError> {
        self.functions
            .get(index as usize)
            .cloned()
            .ok_or(VmError::BadFunctionIndex(index))
    }

    fn current(frames: &[Frame]) -> Result<&Frame, VmError> {
        frames.last().ok_or(VmError::StackUnderflow { op: "frame" })
    }

    fn current_mut(frames: &mut [Frame]) -> Result<&mut Frame, VmError> {
        frames
            .last_mut()
            .ok_or(VmError::StackUnderflow { op: "frame" })
    }

    fn pop(&mut self, op: &'static str) -> Result<Value, VmError> {
        self.stack.pop().ok_or(VmError::StackUnderflow { op })
    }

    fn peek(&self, op: &'static str) -> Result<&Value, VmError> {
        self.stack.last().ok_or(VmError::StackUnderflow { op })
    }

    /// Pops b then a, returning (a, b)
    fn pop_pair(&mut self, op: &'static str) -> Result<(Value, Value), VmError> {
        let b = self.pop(op)?;
        let a = self.pop(op)?;
        Ok((a, b))
    }

    fn pop_args(&mut self, count: u8, op: &'static str) -> Result<Vec<Value>, VmError> {
        let mut args = Vec::with_capacity(count as usize);
        for _ in 0..count {
            args.push(self.pop(op)?);
        }
        args.reverse();
        Ok(args)
    }

    fn add(a: Value, b: Value) -> Result<Value, VmError> {
        match (&a, &b) {
            (Value::Number(x), Value::Number(y)) => Ok(Value::Number(x + y)),
            (Value::String(_), _) | (_, Value::String(_)) => {
                Ok(Value::String(format!("{}{}", a, b)))
            }
            (Value::List(items), _) => {
                let mut merged = items.borrow().clone();
                match &b {
                    Value::List(other) => merged.extend(other.borrow().iter().cloned()),
                    other => merged.push(other.clone()),
                }
                Ok(Value::list(merged))
            }
            _ => Err(VmError::TypeMismatch {
                op: "ADD",
                lhs: a.type_name(),
                rhs: b.type_name(),
            }),
        }
    }

    fn numeric_op(&mut self, op: &'static str, f: fn(f64, f64) -> f64) -> Result<(), VmError> {
        let (a, b) = self.pop_pair(op)?;
        match (a.as_number(), b.as_number()) {
            (Some(x), Some(y)) => {
                self.stack.push(Value::Number(f(x, y)));
                Ok(())
            }
            _ => Err(VmError::TypeMismatch {
                op,
                lhs: a.type_name(),
                rhs: b.type_name(),
            }),
        }
    }

    /// Comparisons accept two numbers or two strings
    fn compare_op(
        &mut self,
        op: &'static str,
        accept: fn(std::cmp::Ordering) -> bool,
    ) -> Result<(), VmError> {
        let (a, b) = self.pop_pair(op)?;
        let ordering = match (&a, &b) {
            (Value::Number(x), Value::Number(y)) => {
                x.partial_cmp(y).unwrap_or(std::cmp::Ordering::Equal)
            }
            (Value::String(x), Value::String(y)) => x.cmp(y),
            _ => {
                return Err(VmError::TypeMismatch {
                    op,
                    lhs: a.type_name(),
                    rhs: b.type_name(),
                });
            }
        };
        self.stack.push(Value::Bool(accept(ordering)));
        Ok(())
    }

    fn get_field(obj: &Value, name: &str) -> Result<Value, VmError> {
        match obj {
            Value::Map(entries) => Ok(entries.borrow().get(name).cloned().unwrap_or(Value::Null)),
            Value::List(items) if name == "length" => {
                Ok(Value::Number(items.borrow().len() as f64))
            }
            Value::String(s) if name == "length" => Ok(Value::Number(s.chars().count() as f64)),
            other => Err(VmError::Native(format!(
                "Cannot get field '{}' on {}",
                name,
                other.type_name()
            ))),
        }
    }

    fn array_get(obj: &Value, index: &Value) -> Result<Value, VmError> {
        match obj {
            Value::List(items) => {
                let i = index.as_number().unwrap_or(0.0) as i64;
                if i < 0 {
                    return Ok(Value::Null);
                }
                Ok(items.borrow().get(i as usize).cloned().unwrap_or(Value::Null))
            }
            Value::Map(entries) => {
                let key = index
                    .as_str()
                    .map(str::to_string)
                    .unwrap_or_else(|| index.to_string());
                Ok(entries.borrow().get(&key).cloned().unwrap_or(Value::Null))
            }
            Value::String(s) => {
                let i = index.as_number().unwrap_or(0.0) as i64;
                if i < 0 {
                    return Ok(Value::Null);
                }
                Ok(s.chars()
                    .nth(i as usize)
                    .map(|c| Value::String(c.to_string()))
                    .unwrap_or(Value::Null))
            }
            other => Err(VmError::TypeMismatch {
                op: "ARRAY_GET",
                lhs: other.type_name(),
                rhs: index.type_name(),
            }),
        }
    }

    /// Index == length appends; past-the-end writes are ignored
    fn array_set(obj: &Value, index: &Value, value: Value) -> Result<(), VmError> {
        match obj {
            Value::List(items) => {
                if let Some(i) = index.as_number() {
                    let i = i as i64;
                    let mut items = items.borrow_mut();
                    if i >= 0 {
                        let i = i as usize;
                        if i == items.len() {
                            items.push(value);
                        } else if i < items.len() {
                            items[i] = value;
                        }
                    }
                }
                Ok(())
            }
            Value::Map(entries) => {
                let key = index
                    .as_str()
                    .map(str::to_string)
                    .unwrap_or_else(|| index.to_string());
                entries.borrow_mut().insert(key, value);
                Ok(())
            }
            other => Err(VmError::TypeMismatch {
                op: "ARRAY_SET",
                lhs: other.type_name(),
                rhs: index.type_name(),
            }),
        }
    }
}

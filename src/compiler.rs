//! AST to bytecode lowering
//!
//! Each top-level `fun` becomes one compiled function; the remaining
//! executable statements are gathered into a synthesized `__main__` that runs
//! as the entry point and writes top-level bindings into VM globals.
//!
//! Locals get sequential u8 slots at first sight (parameters first). Names
//! that never resolve to a local compile to global loads/stores by pooled
//! name. Forward jumps are emitted with a placeholder offset and patched once
//! the branch body is known.
//!
//! The compiler covers the statically-lowerable subset of the language;
//! constructs that need a closure environment or class machinery (lambdas,
//! classes, `try`, imports) are fatal compile errors naming the construct.

use crate::bytecode::{BytecodeFile, CompiledFunction};
use crate::constant_pool::{Constant, ConstantPool};
use crate::error::CompileError;
use crate::opcodes::Opcode;
use crate::parser::ast::{BinaryOp, Expr, FunDecl, Literal, Stmt, UnaryOp};

const MAX_LOCALS: usize = 256;

pub struct Compiler {
    pool: ConstantPool,
    function_names: Vec<String>,
    functions: Vec<CompiledFunction>,
}

/// Per-function emission state
struct FunctionState {
    name: String,
    code: Vec<u8>,
    locals: Vec<Local>,
    scope_depth: u32,
    max_locals: usize,
    is_main: bool,
}

struct Local {
    name: String,
    depth: u32,
}

impl Default for Compiler {
    fn default() -> Self {
        Self::new()
    }
}

impl Compiler {
    pub fn new() -> Self {
        Compiler {
            pool: ConstantPool::new(),
            function_names: Vec::new(),
            functions: Vec::new(),
        }
    }

    pub fn compile(mut self, statements: &[Stmt]) -> Result<BytecodeFile, CompileError> {
        // Register every function name up front so calls can resolve
        // regardless of declaration order
        for stmt in statements {
            if let Stmt::Fun(decl) = stmt {
                self.function_names.push(decl.name.clone());
            }
        }

        for stmt in statements {
            if let Stmt::Fun(decl) = stmt {
                let func = self.compile_function(decl)?;
                self.functions.push(func);
            }
        }

        let main = self.compile_main(statements)?;
        self.functions.push(main);
        let entry_point = (self.functions.len() - 1) as u16;

        Ok(BytecodeFile {
            pool: self.pool,
            functions: self.functions,
            entry_point,
        })
    }

    fn compile_function(&mut self, decl: &FunDecl) -> Result<CompiledFunction, CompileError> {
        let mut f = FunctionState {
            name: decl.name.clone(),
            code: Vec::new(),
            locals: Vec::new(),
            scope_depth: 0,
            max_locals: 0,
            is_main: false,
        };
        for param in &decl.params {
            f.define_local(param.clone())?;
        }

        for stmt in decl.body.iter() {
            self.compile_stmt(&mut f, stmt)?;
        }
        f.emit(Opcode::ReturnVoid);

        Ok(f.finish(decl.params.len() as u8))
    }

    fn compile_main(&mut self, statements: &[Stmt]) -> Result<CompiledFunction, CompileError> {
        let mut f = FunctionState {
            name: "__main__".to_string(),
            code: Vec::new(),
            locals: Vec::new(),
            scope_depth: 0,
            max_locals: 0,
            is_main: true,
        };

        for stmt in statements {
            match stmt {
                // Compiled separately
                Stmt::Fun(_) => {}
                // Tests run under the interpreter, not the VM
                Stmt::Test { .. } => {}
                other => self.compile_stmt(&mut f, other)?,
            }
        }
        f.emit(Opcode::Halt);

        Ok(f.finish(0))
    }

    // ===== Statements =====

    fn compile_stmt(&mut self, f: &mut FunctionState, stmt: &Stmt) -> Result<(), CompileError> {
        match stmt {
            Stmt::Expr { expr, .. } => {
                self.compile_expr(f, expr)?;
                f.emit(Opcode::Pop);
            }
            Stmt::Var {
                name, initializer, ..
            } => {
                match initializer {
                    Some(expr) => self.compile_expr(f, expr)?,
                    None => f.emit(Opcode::ConstNull),
                }
                self.compile_define(f, name)?;
            }
            Stmt::Const { name, value, .. } => {
                self.compile_expr(f, value)?;
                self.compile_define(f, name)?;
            }
            Stmt::Assign { name, value, .. } => {
                self.compile_expr(f, value)?;
                match f.resolve_local(name) {
                    Some(slot) => {
                        f.emit(Opcode::StoreLocal);
                        f.emit_u8(slot);
                    }
                    None => {
                        let idx = self.pool.add_string(name.as_str())?;
                        f.emit(Opcode::StoreGlobal);
                        f.emit_u16(idx);
                    }
                }
            }
            Stmt::Block { statements, .. } => {
                f.begin_scope();
                for stmt in statements {
                    self.compile_stmt(f, stmt)?;
                }
                f.end_scope();
            }
            Stmt::If {
                condition,
                then_branch,
                else_branch,
                line,
            } => {
                self.compile_expr(f, condition)?;
                let jump_false = f.emit_jump(Opcode::JumpIfFalse);
                self.compile_stmt(f, then_branch)?;
                match else_branch {
                    Some(else_branch) => {
                        let jump_end = f.emit_jump(Opcode::Jump);
                        f.patch_jump(jump_false, *line)?;
                        self.compile_stmt(f, else_branch)?;
                        f.patch_jump(jump_end, *line)?;
                    }
                    None => f.patch_jump(jump_false, *line)?,
                }
            }
            Stmt::When {
                condition,
                body,
                line,
            } => {
                self.compile_expr(f, condition)?;
                let jump_false = f.emit_jump(Opcode::JumpIfFalse);
                self.compile_stmt(f, body)?;
                f.patch_jump(jump_false, *line)?;
            }
            Stmt::While {
                condition,
                body,
                line,
            } => {
                let loop_start = f.code.len();
                self.compile_expr(f, condition)?;
                let jump_exit = f.emit_jump(Opcode::JumpIfFalse);
                self.compile_stmt(f, body)?;
                f.emit_jump_to(Opcode::Jump, loop_start, *line)?;
                f.patch_jump(jump_exit, *line)?;
            }
            Stmt::For {
                name,
                iterable,
                body,
                line,
            } => self.compile_for(f, name, iterable, body, *line)?,
            Stmt::Return { value, .. } => match value {
                Some(expr) => {
                    self.compile_expr(f, expr)?;
                    f.emit(Opcode::Return);
                }
                None => f.emit(Opcode::ReturnVoid),
            },
            Stmt::Assert { expr, .. } => {
                self.compile_expr(f, expr)?;
                self.emit_native_call(f, "assert", 1)?;
                f.emit(Opcode::Pop);
            }
            // Declarations with no runtime effect
            Stmt::Export { .. } | Stmt::Type { .. } | Stmt::NativeFun { .. } => {}
            Stmt::Fun(decl) => {
                return Err(CompileError::Unsupported {
                    construct: "nested function declaration",
                    line: decl.line,
                });
            }
            Stmt::Test { .. } => {
                return Err(CompileError::Unsupported {
                    construct: "test block",
                    line: stmt.line(),
                });
            }
            Stmt::Class { line, .. } => {
                return Err(CompileError::Unsupported {
                    construct: "class declaration",
                    line: *line,
                });
            }
            Stmt::Extend { line, .. } => {
                return Err(CompileError::Unsupported {
                    construct: "extend declaration",
                    line: *line,
                });
            }
            Stmt::Import { line, .. } => {
                return Err(CompileError::Unsupported {
                    construct: "import",
                    line: *line,
                });
            }
            Stmt::Try { line, .. } => {
                return Err(CompileError::Unsupported {
                    construct: "try/catch",
                    line: *line,
                });
            }
            Stmt::Delete { line, .. } => {
                return Err(CompileError::Unsupported {
                    construct: "delete",
                    line: *line,
                });
            }
        }
        Ok(())
    }

    /// Lower `for x in expr` to an index loop over hidden locals
    fn compile_for(
        &mut self,
        f: &mut FunctionState,
        name: &str,
        iterable: &Expr,
        body: &Stmt,
        line: u32,
    ) -> Result<(), CompileError> {
        f.begin_scope();

        self.compile_expr(f, iterable)?;
        // Maps iterate their keys and strings their characters; normalize
        // the iterable to a list before the index loop
        self.emit_native_call(f, "toList", 1)?;
        let iter_slot = f.define_hidden_local("iter")?;
        f.emit(Opcode::StoreLocal);
        f.emit_u8(iter_slot);

        self.emit_number(f, 0.0)?;
        let index_slot = f.define_hidden_local("index")?;
        f.emit(Opcode::StoreLocal);
        f.emit_u8(index_slot);

        let item_slot = f.define_local(name.to_string())?;

        let loop_start = f.code.len();
        f.emit(Opcode::LoadLocal);
        f.emit_u8(index_slot);
        f.emit(Opcode::LoadLocal);
        f.emit_u8(iter_slot);
        f.emit(Opcode::ArrayLen);
        f.emit(Opcode::Lt);
        let jump_exit = f.emit_jump(Opcode::JumpIfFalse);

        f.emit(Opcode::LoadLocal);
        f.emit_u8(iter_slot);
        f.emit(Opcode::LoadLocal);
        f.emit_u8(index_slot);
        f.emit(Opcode::ArrayGet);
        f.emit(Opcode::StoreLocal);
        f.emit_u8(item_slot);

        self.compile_stmt(f, body)?;

        f.emit(Opcode::LoadLocal);
        f.emit_u8(index_slot);
        self.emit_number(f, 1.0)?;
        f.emit(Opcode::Add);
        f.emit(Opcode::StoreLocal);
        f.emit_u8(index_slot);
        f.emit_jump_to(Opcode::Jump, loop_start, line)?;

        f.patch_jump(jump_exit, line)?;
        f.end_scope();
        Ok(())
    }

    fn compile_define(&mut self, f: &mut FunctionState, name: &str) -> Result<(), CompileError> {
        // Top-level bindings in the entry function become VM globals
        if f.is_main && f.scope_depth == 0 {
            let idx = self.pool.add_string(name)?;
            f.emit(Opcode::StoreGlobal);
            f.emit_u16(idx);
        } else {
            let slot = f.define_local(name.to_string())?;
            f.emit(Opcode::StoreLocal);
            f.emit_u8(slot);
        }
        Ok(())
    }

    // ===== Expressions =====

    fn compile_expr(&mut self, f: &mut FunctionState, expr: &Expr) -> Result<(), CompileError> {
        match expr {
            Expr::Literal { value, .. } => match value {
                Literal::Null => f.emit(Opcode::ConstNull),
                Literal::Bool(true) => f.emit(Opcode::ConstTrue),
                Literal::Bool(false) => f.emit(Opcode::ConstFalse),
                Literal::Number(n) => self.emit_number(f, *n)?,
                Literal::Str(s) => {
                    let idx = self.pool.add_string(s.as_str())?;
                    f.emit(Opcode::ConstString);
                    f.emit_u16(idx);
                }
            },
            Expr::Variable { name, .. } => match f.resolve_local(name) {
                Some(slot) => {
                    f.emit(Opcode::LoadLocal);
                    f.emit_u8(slot);
                }
                None => {
                    let idx = self.pool.add_string(name.as_str())?;
                    f.emit(Opcode::LoadGlobal);
                    f.emit_u16(idx);
                }
            },
            Expr::Binary {
                op, left, right, ..
            } => {
                self.compile_expr(f, left)?;
                self.compile_expr(f, right)?;
                match op {
                    BinaryOp::Add => f.emit(Opcode::Add),
                    BinaryOp::Sub => f.emit(Opcode::Sub),
                    BinaryOp::Mul => f.emit(Opcode::Mul),
                    BinaryOp::Div => f.emit(Opcode::Div),
                    BinaryOp::Mod => f.emit(Opcode::Mod),
                    BinaryOp::Eq => f.emit(Opcode::Eq),
                    BinaryOp::Ne => f.emit(Opcode::Ne),
                    BinaryOp::Lt => f.emit(Opcode::Lt),
                    BinaryOp::Le => f.emit(Opcode::Le),
                    BinaryOp::Gt => f.emit(Opcode::Gt),
                    BinaryOp::Ge => f.emit(Opcode::Ge),
                    BinaryOp::And => f.emit(Opcode::And),
                    BinaryOp::Or => f.emit(Opcode::Or),
                    // No membership opcode; swap into contains(haystack, needle)
                    // and dispatch to the stdlib
                    BinaryOp::In => {
                        f.emit(Opcode::Swap);
                        self.emit_native_call(f, "contains", 2)?;
                    }
                }
            }
            Expr::Unary { op, operand, .. } => {
                self.compile_expr(f, operand)?;
                match op {
                    UnaryOp::Neg => f.emit(Opcode::Neg),
                    UnaryOp::Not => f.emit(Opcode::Not),
                }
            }
            Expr::Call { callee, args, line } => {
                let name = match callee.as_ref() {
                    Expr::Variable { name, .. } => name,
                    _ => {
                        return Err(CompileError::Unsupported {
                            construct: "indirect call",
                            line: *line,
                        });
                    }
                };
                for arg in args {
                    self.compile_expr(f, arg)?;
                }
                match self.function_names.iter().position(|n| n == name) {
                    Some(idx) => {
                        f.emit(Opcode::Call);
                        f.emit_u16(idx as u16);
                        f.emit_u8(args.len() as u8);
                    }
                    // Unknown names fall back to native dispatch
                    None => self.emit_native_call(f, name, args.len() as u8)?,
                }
            }
            Expr::Get { object, name, .. } => {
                self.compile_expr(f, object)?;
                let idx = self.pool.add_string(name.as_str())?;
                f.emit(Opcode::GetField);
                f.emit_u16(idx);
            }
            Expr::Set {
                object,
                name,
                value,
                ..
            } => {
                self.compile_expr(f, object)?;
                self.compile_expr(f, value)?;
                let idx = self.pool.add_string(name.as_str())?;
                f.emit(Opcode::SetField);
                f.emit_u16(idx);
                // Assignments are null-valued expressions
                f.emit(Opcode::ConstNull);
            }
            Expr::Index { object, index, .. } => {
                self.compile_expr(f, object)?;
                self.compile_expr(f, index)?;
                f.emit(Opcode::ArrayGet);
            }
            Expr::IndexSet {
                object,
                index,
                value,
                ..
            } => {
                self.compile_expr(f, object)?;
                self.compile_expr(f, index)?;
                self.compile_expr(f, value)?;
                f.emit(Opcode::ArraySet);
                f.emit(Opcode::ConstNull);
            }
            Expr::ListLit { items, .. } => {
                f.emit(Opcode::NewArray);
                for (i, item) in items.iter().enumerate() {
                    f.emit(Opcode::Dup);
                    self.emit_number(f, i as f64)?;
                    self.compile_expr(f, item)?;
                    f.emit(Opcode::ArraySet);
                }
            }
            Expr::MapLit { entries, .. } => {
                f.emit(Opcode::NewObject);
                for (key, value) in entries {
                    f.emit(Opcode::Dup);
                    self.compile_expr(f, value)?;
                    let idx = self.pool.add_string(key.as_str())?;
                    f.emit(Opcode::SetField);
                    f.emit_u16(idx);
                }
            }
            // Class identity is erased; the literal lowers to a plain object
            Expr::ObjectLit { fields, .. } => {
                f.emit(Opcode::NewObject);
                for (key, value) in fields {
                    f.emit(Opcode::Dup);
                    self.compile_expr(f, value)?;
                    let idx = self.pool.add_string(key.as_str())?;
                    f.emit(Opcode::SetField);
                    f.emit_u16(idx);
                }
            }
            Expr::Lambda { line, .. } => {
                return Err(CompileError::Unsupported {
                    construct: "lambda",
                    line: *line,
                });
            }
            Expr::IfElse {
                condition,
                then_branch,
                else_branch,
                line,
            } => {
                self.compile_expr(f, condition)?;
                let jump_false = f.emit_jump(Opcode::JumpIfFalse);
                self.compile_expr(f, then_branch)?;
                let jump_end = f.emit_jump(Opcode::Jump);
                f.patch_jump(jump_false, *line)?;
                self.compile_expr(f, else_branch)?;
                f.patch_jump(jump_end, *line)?;
            }
        }
        Ok(())
    }

    /// Emit the narrowest constant that holds `n`, with its matching opcode
    fn emit_number(&mut self, f: &mut FunctionState, n: f64) -> Result<(), CompileError> {
        let constant = if n.fract() == 0.0 && n.is_finite() {
            if n >= i32::MIN as f64 && n <= i32::MAX as f64 {
                Constant::Int(n as i32)
            } else if n >= i64::MIN as f64 && n <= i64::MAX as f64 {
                Constant::Long(n as i64)
            } else {
                Constant::Double(n)
            }
        } else {
            Constant::Double(n)
        };
        let op = match constant {
            Constant::Int(_) => Opcode::ConstInt,
            Constant::Long(_) => Opcode::ConstLong,
            _ => Opcode::ConstDouble,
        };
        let idx = self.pool.add(constant)?;
        f.emit(op);
        f.emit_u16(idx);
        Ok(())
    }

    fn emit_native_call(
        &mut self,
        f: &mut FunctionState,
        name: &str,
        arg_count: u8,
    ) -> Result<(), CompileError> {
        let idx = self.pool.add_string(name)?;
        f.emit(Opcode::CallNative);
        f.emit_u16(idx);
        f.emit_u8(arg_count);
        Ok(())
    }
}

impl FunctionState {
    fn emit(&mut self, op: Opcode) {
        self.code.push(op as u8);
    }

    fn emit_u8(&mut self, byte: u8) {
        self.code.push(byte);
    }

    fn emit_u16(&mut self, value: u16) {
        self.code.extend_from_slice(&value.to_be_bytes());
    }

    /// Emit a jump with a placeholder offset; returns the operand position
    fn emit_jump(&mut self, op: Opcode) -> usize {
        self.emit(op);
        let pos = self.code.len();
        self.emit_u16(0xFFFF);
        pos
    }

    /// Point a previously emitted jump at the current end of code
    fn patch_jump(&mut self, operand_pos: usize, line: u32) -> Result<(), CompileError> {
        let target = self.code.len();
        if target > u16::MAX as usize {
            return Err(CompileError::JumpOutOfRange { target, line });
        }
        let bytes = (target as u16).to_be_bytes();
        self.code[operand_pos] = bytes[0];
        self.code[operand_pos + 1] = bytes[1];
        Ok(())
    }

    fn emit_jump_to(&mut self, op: Opcode, target: usize, line: u32) -> Result<(), CompileError> {
        if target > u16::MAX as usize {
            return Err(CompileError::JumpOutOfRange { target, line });
        }
        self.emit(op);
        self.emit_u16(target as u16);
        Ok(())
    }

    fn begin_scope(&mut self) {
        self.scope_depth += 1;
    }

    fn end_scope(&mut self) {
        self.scope_depth -= 1;
        while let Some(local) = self.locals.last() {
            if local.depth <= self.scope_depth {
                break;
            }
            self.locals.pop();
        }
    }

    fn define_local(&mut self, name: String) -> Result<u8, CompileError> {
        let slot = self.locals.len();
        if slot >= MAX_LOCALS {
            return Err(CompileError::TooManyLocals {
                function: self.name.clone(),
            });
        }
        self.locals.push(Local {
            name,
            depth: self.scope_depth,
        });
        self.max_locals = self.max_locals.max(self.locals.len());
        Ok(slot as u8)
    }

    /// Synthesized locals use names no identifier can collide with
    fn define_hidden_local(&mut self, tag: &str) -> Result<u8, CompileError> {
        let name = format!("<{}:{}>", tag, self.locals.len());
        self.define_local(name)
    }

    fn resolve_local(&self, name: &str) -> Option<u8> {
        self.locals
            .iter()
            .rposition(|local| local.name == name)
            .map(|slot| slot as u8)
    }

    fn finish(self, param_count: u8) -> CompiledFunction {
        CompiledFunction {
            name: self.name,
            param_count,
            local_count: self.max_locals as u8,
            code: self.code,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parser;

    fn compile(source: &str) -> BytecodeFile {
        let stmts = parser::parse(source).unwrap();
        Compiler::new().compile(&stmts).unwrap()
    }

    fn compile_err(source: &str) -> CompileError {
        let stmts = parser::parse(source).unwrap();
        Compiler::new().compile(&stmts).unwrap_err()
    }

    fn main_code(file: &BytecodeFile) -> &[u8] {
        &file.functions[file.entry_point as usize].code
    }

    #[test]
    fn test_main_is_entry_point() {
        let file = compile("var x = 1");
        let main = &file.functions[file.entry_point as usize];
        assert_eq!(main.name, "__main__");
        assert_eq!(main.param_count, 0);
    }

    #[test]
    fn test_top_level_var_stores_global() {
        let file = compile("var x = 1");
        let code = main_code(&file);
        assert_eq!(code[0], Opcode::ConstInt as u8);
        assert_eq!(code[3], Opcode::StoreGlobal as u8);
        let name_idx = u16::from_be_bytes([code[4], code[5]]);
        assert_eq!(file.pool.get_string(name_idx).unwrap(), "x");
    }

    #[test]
    fn test_string_pool_dedup() {
        let file = compile(r#"var a = "x"
var b = "x"
var c = "x""#);
        let strings = file
            .pool
            .entries()
            .iter()
            .filter(|c| matches!(c, Constant::Str(s) if s == "x"))
            .count();
        assert_eq!(strings, 1);
    }

    #[test]
    fn test_function_locals_are_slots() {
        let file = compile("fun add(a, b) { return a + b }");
        let func = &file.functions[0];
        assert_eq!(func.name, "add");
        assert_eq!(func.param_count, 2);
        assert_eq!(func.local_count, 2);
        assert_eq!(
            func.code,
            vec![
                Opcode::LoadLocal as u8,
                0,
                Opcode::LoadLocal as u8,
                1,
                Opcode::Add as u8,
                Opcode::Return as u8,
                Opcode::ReturnVoid as u8,
            ]
        );
    }

    #[test]
    fn test_forward_call_resolves_to_call() {
        let file = compile("var r = later()\nfun later() { return 1 }");
        let code = main_code(&file);
        assert_eq!(code[0], Opcode::Call as u8);
        assert_eq!(u16::from_be_bytes([code[1], code[2]]), 0);
        assert_eq!(code[3], 0); // arg count
    }

    #[test]
    fn test_unknown_call_falls_back_to_native() {
        let file = compile("print(1)");
        let code = main_code(&file);
        // arg first, then the dispatch
        assert_eq!(code[0], Opcode::ConstInt as u8);
        assert_eq!(code[3], Opcode::CallNative as u8);
        let name_idx = u16::from_be_bytes([code[4], code[5]]);
        assert_eq!(file.pool.get_string(name_idx).unwrap(), "print");
    }

    #[test]
    fn test_if_patches_forward_jump() {
        let file = compile("if true { print(1) }");
        let code = main_code(&file);
        assert_eq!(code[0], Opcode::ConstTrue as u8);
        assert_eq!(code[1], Opcode::JumpIfFalse as u8);
        let target = u16::from_be_bytes([code[2], code[3]]) as usize;
        // jump lands past the then-branch, on the trailing HALT
        assert_eq!(code[target], Opcode::Halt as u8);
    }

    #[test]
    fn test_if_else_emits_two_jumps() {
        let file = compile("if true { print(1) } else { print(2) }");
        let code = main_code(&file);
        let else_target = u16::from_be_bytes([code[2], code[3]]) as usize;
        // the slot before the else branch is the unconditional jump over it
        assert_eq!(code[else_target - 3], Opcode::Jump as u8);
        let end_target =
            u16::from_be_bytes([code[else_target - 2], code[else_target - 1]]) as usize;
        assert_eq!(code[end_target], Opcode::Halt as u8);
    }

    #[test]
    fn test_while_jumps_back(){
        let file = compile("var i = 0\nwhile i < 3 { i = i + 1 }");
        let code = main_code(&file);
        assert!(code.contains(&(Opcode::Jump as u8)));
        assert!(code.contains(&(Opcode::JumpIfFalse as u8)));
    }

    #[test]
    fn test_numbers_narrow_in_pool() {
        let file = compile("var a = 1\nvar b = 5000000000\nvar c = 1.5");
        let entries = file.pool.entries();
        assert!(entries.contains(&Constant::Int(1)));
        assert!(entries.contains(&Constant::Long(5_000_000_000)));
        assert!(entries.contains(&Constant::Double(1.5)));
    }

    #[test]
    fn test_booleans_and_null_skip_pool() {
        let file = compile("var a = true\nvar b = false\nvar c = null");
        let literals = file
            .pool
            .entries()
            .iter()
            .filter(|c| matches!(c, Constant::True | Constant::False | Constant::Null))
            .count();
        assert_eq!(literals, 0);
    }

    #[test]
    fn test_membership_compiles_to_native() {
        let file = compile("var r = 1 in [1, 2]");
        let code = main_code(&file);
        assert!(code.contains(&(Opcode::CallNative as u8)));
    }

    #[test]
    fn test_for_loop_normalizes_iterable() {
        // The loop prologue runs the iterable through toList so maps and
        // strings iterate like the evaluator does
        let file = compile("for k in m { print(k) }");
        let pooled = file
            .pool
            .entries()
            .iter()
            .any(|c| matches!(c, Constant::Str(s) if s == "toList"));
        assert!(pooled);
    }

    #[test]
    fn test_lambda_is_unsupported() {
        let err = compile_err("var f = fun (x) { return x }");
        assert!(matches!(
            err,
            CompileError::Unsupported {
                construct: "lambda",
                ..
            }
        ));
    }

    #[test]
    fn test_class_is_unsupported() {
        let err = compile_err("class A { field x = 1 }");
        assert!(matches!(
            err,
            CompileError::Unsupported {
                construct: "class declaration",
                line: 1,
            }
        ));
    }

    #[test]
    fn test_block_scopes_reuse_slots() {
        let source = r#"
fun f() {
    { var a = 1 }
    { var b = 2 }
}
"#;
        let file = compile(source);
        assert_eq!(file.functions[0].local_count, 1);
    }

    #[test]
    fn test_nested_function_is_unsupported() {
        let err = compile_err("fun outer() { fun inner() { return 1 } }");
        assert!(matches!(
            err,
            CompileError::Unsupported {
                construct: "nested function declaration",
                ..
            }
        ));
    }
}

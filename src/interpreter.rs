//! Tree-walking interpreter
//!
//! Executes programs in two passes: declarations (functions, classes,
//! extensions, imports) are registered into the global environment first, so
//! top-level code can call functions defined later in the file. Executable
//! statements then run in order.
//!
//! `return` unwinds through [`Signal::Return`]; runtime errors unwind through
//! [`Signal::Error`] and are catchable by the language's `try`/`catch`.

use std::collections::{HashMap, HashSet};
use std::path::{Path, PathBuf};
use std::rc::Rc;

use tracing::{debug, warn};

use crate::environment::{EnvRef, Environment};
use crate::error::RuntimeError;
use crate::natives;
use crate::parser::ast::{BinaryOp, Expr, FunDecl, Literal, Stmt, UnaryOp};
use crate::parser::{self};
use crate::value::{Class, Function, Instance, Value};

/// Non-local control flow during execution
#[derive(Debug)]
pub enum Signal {
    Return(Value),
    Error(RuntimeError),
}

impl From<RuntimeError> for Signal {
    fn from(err: RuntimeError) -> Self {
        Signal::Error(err)
    }
}

/// Outcome of one registered `test` block
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TestOutcome {
    pub name: String,
    pub failure: Option<String>,
}

pub struct Interpreter {
    globals: EnvRef,
    current: EnvRef,
    /// Field defaults per class, looked up at construction time
    class_fields: HashMap<String, Vec<(String, Option<Expr>)>>,
    tests: Vec<(String, Vec<Stmt>)>,
    loaded_files: HashSet<PathBuf>,
    base_path: PathBuf,
}

impl Default for Interpreter {
    fn default() -> Self {
        Self::new()
    }
}

impl Interpreter {
    pub fn new() -> Self {
        let globals = Environment::new();
        natives::register(&globals);
        Interpreter {
            current: Rc::clone(&globals),
            globals,
            class_fields: HashMap::new(),
            tests: Vec::new(),
            loaded_files: HashSet::new(),
            base_path: PathBuf::from("."),
        }
    }

    /// Look up a binding in the global environment
    pub fn global(&self, name: &str) -> Option<Value> {
        self.globals.borrow().get(name)
    }

    /// Run a program; `path` is the source file, used to resolve imports
    pub fn interpret(&mut self, statements: &[Stmt], path: &Path) -> Result<(), RuntimeError> {
        self.base_path = path.to_path_buf();

        for stmt in statements {
            debug!(line = stmt.line(), path = %path.display(), "registering declaration");
            self.register_declaration(stmt)?;
        }

        for stmt in statements {
            if Self::is_executable(stmt) {
                match self.execute(stmt) {
                    Ok(()) => {}
                    // A top-level return ends the program normally
                    Err(Signal::Return(_)) => return Ok(()),
                    Err(Signal::Error(err)) => return Err(err),
                }
            }
        }
        Ok(())
    }

    /// Run every `test` block registered during execution.
    /// Failures do not stop the run; each test gets a fresh child scope.
    pub fn run_tests(&mut self) -> Vec<TestOutcome> {
        let tests = std::mem::take(&mut self.tests);
        let mut outcomes = Vec::new();

        for (name, body) in tests {
            let test_env = Environment::with_parent(Rc::clone(&self.globals));
            let saved = Rc::clone(&self.current);
            self.current = test_env;

            let mut failure = None;
            for stmt in &body {
                match self.execute(stmt) {
                    Ok(()) => {}
                    Err(Signal::Return(_)) => break,
                    Err(Signal::Error(err)) => {
                        failure = Some(err.to_string());
                        break;
                    }
                }
            }

            self.current = saved;
            outcomes.push(TestOutcome { name, failure });
        }

        outcomes
    }

    fn is_executable(stmt: &Stmt) -> bool {
        !matches!(
            stmt,
            Stmt::Fun(_)
                | Stmt::Class { .. }
                | Stmt::Type { .. }
                | Stmt::NativeFun { .. }
                | Stmt::Extend { .. }
                | Stmt::Import { .. }
        )
    }

    // ===== Pass 1: declarations =====

    fn register_declaration(&mut self, stmt: &Stmt) -> Result<(), RuntimeError> {
        match stmt {
            Stmt::Fun(decl) => {
                let func = self.make_function(decl, Rc::clone(&self.globals));
                self.globals.borrow_mut().define(&decl.name, func);
            }
            Stmt::Class {
                name,
                fields,
                methods,
                ..
            } => {
                self.class_fields.insert(name.clone(), fields.clone());
                let mut method_table = HashMap::new();
                for method in methods {
                    method_table.insert(
                        method.name.clone(),
                        self.make_function_rc(method, Rc::clone(&self.globals)),
                    );
                }
                let class = Value::Class(Rc::new(Class {
                    name: name.clone(),
                    fields: fields.clone(),
                    methods: method_table,
                }));
                self.globals.borrow_mut().define(name, class);
            }
            Stmt::Extend {
                class_name,
                methods,
                ..
            } => {
                let existing = self.globals.borrow().get(class_name);
                match existing {
                    Some(Value::Class(class)) => {
                        let mut method_table = class.methods.clone();
                        for method in methods {
                            method_table.insert(
                                method.name.clone(),
                                self.make_function_rc(method, Rc::clone(&self.globals)),
                            );
                        }
                        let extended = Value::Class(Rc::new(Class {
                            name: class.name.clone(),
                            fields: class.fields.clone(),
                            methods: method_table,
                        }));
                        self.globals.borrow_mut().define(class_name, extended);
                    }
                    _ => warn!(class = %class_name, "extend target is not a known class"),
                }
            }
            Stmt::NativeFun { name, .. } => {
                if self.globals.borrow().get(name).is_none() {
                    warn!(native = %name, "native function declared but not provided");
                }
            }
            Stmt::Import { path, .. } => self.handle_import(path)?,
            _ => {}
        }
        Ok(())
    }

    fn handle_import(&mut self, path: &str) -> Result<(), RuntimeError> {
        // Paths starting with '/' or containing ':' are absolute; everything
        // else resolves relative to the importing file's directory
        let full_path = if path.starts_with('/') || path.contains(':') {
            PathBuf::from(path)
        } else {
            let parent = self.base_path.parent().unwrap_or_else(|| Path::new("."));
            parent.join(path)
        };

        if !self.loaded_files.insert(full_path.clone()) {
            return Ok(());
        }

        debug!(path = %full_path.display(), "importing module");
        let source = match std::fs::read_to_string(&full_path) {
            Ok(source) => source,
            Err(_) => {
                warn!(path = %path, "could not find import");
                return Ok(());
            }
        };

        let (statements, errors) = parser::parse_lenient(&source)
            .map_err(|err| RuntimeError::Native(format!("{}: {}", full_path.display(), err)))?;
        for err in &errors {
            warn!(path = %full_path.display(), "parse error in import: {}", err);
        }

        let saved_base = std::mem::replace(&mut self.base_path, full_path);

        for stmt in &statements {
            if let Err(err) = self.register_declaration(stmt) {
                self.base_path = saved_base;
                return Err(err);
            }
        }
        for stmt in &statements {
            if Self::is_executable(stmt) {
                match self.execute(stmt) {
                    Ok(()) => {}
                    // A module may return at top level
                    Err(Signal::Return(_)) => break,
                    Err(Signal::Error(err)) => {
                        self.base_path = saved_base;
                        return Err(err);
                    }
                }
            }
        }

        self.base_path = saved_base;
        Ok(())
    }

    fn make_function(&self, decl: &FunDecl, closure: EnvRef) -> Value {
        Value::Function(self.make_function_rc(decl, closure))
    }

    fn make_function_rc(&self, decl: &FunDecl, closure: EnvRef) -> Rc<Function> {
        Rc::new(Function {
            name: decl.name.clone(),
            params: decl.params.clone(),
            body: Rc::clone(&decl.body),
            closure,
        })
    }

    // ===== Pass 2: execution =====

    fn execute(&mut self, stmt: &Stmt) -> Result<(), Signal> {
        match stmt {
            Stmt::Expr { expr, .. } => {
                self.evaluate(expr)?;
                Ok(())
            }
            Stmt::Var {
                name, initializer, ..
            } => {
                let value = match initializer {
                    Some(expr) => self.evaluate(expr)?,
                    None => Value::Null,
                };
                self.current.borrow_mut().define(name, value);
                Ok(())
            }
            Stmt::Const { name, value, .. } => {
                let value = self.evaluate(value)?;
                self.current.borrow_mut().define(name, value);
                Ok(())
            }
            Stmt::Assign { name, value, .. } => {
                let value = self.evaluate(value)?;
                // Assignment to an unbound name defines it in this scope
                let assigned = self.current.borrow_mut().set(name, value.clone());
                if !assigned {
                    self.current.borrow_mut().define(name, value);
                }
                Ok(())
            }
            Stmt::Block { statements, .. } => {
                let block_env = Environment::with_parent(Rc::clone(&self.current));
                self.execute_in_env(statements, block_env)
            }
            Stmt::If {
                condition,
                then_branch,
                else_branch,
                ..
            } => {
                if self.evaluate(condition)?.is_truthy() {
                    self.execute(then_branch)
                } else if let Some(else_branch) = else_branch {
                    self.execute(else_branch)
                } else {
                    Ok(())
                }
            }
            Stmt::When {
                condition, body, ..
            } => {
                if self.evaluate(condition)?.is_truthy() {
                    self.execute(body)?;
                }
                Ok(())
            }
            Stmt::While {
                condition, body, ..
            } => {
                while self.evaluate(condition)?.is_truthy() {
                    self.execute(body)?;
                }
                Ok(())
            }
            Stmt::For {
                name,
                iterable,
                body,
                ..
            } => {
                let items = match self.evaluate(iterable)? {
                    Value::List(items) => items.borrow().clone(),
                    Value::Map(entries) => entries
                        .borrow()
                        .keys()
                        .map(|k| Value::from(k.as_str()))
                        .collect(),
                    Value::String(s) => {
                        s.chars().map(|c| Value::String(c.to_string())).collect()
                    }
                    _ => Vec::new(),
                };

                for item in items {
                    let loop_env = Environment::with_parent(Rc::clone(&self.current));
                    loop_env.borrow_mut().define(name, item);
                    self.execute_in_env(std::slice::from_ref(body.as_ref()), loop_env)?;
                }
                Ok(())
            }
            Stmt::Return { value, .. } => {
                let value = match value {
                    Some(expr) => self.evaluate(expr)?,
                    None => Value::Null,
                };
                Err(Signal::Return(value))
            }
            Stmt::Test { name, body, .. } => {
                self.tests.push((name.clone(), body.clone()));
                Ok(())
            }
            Stmt::Try {
                body,
                catch_var,
                catch_body,
                ..
            } => {
                match self.execute_all(body) {
                    Ok(()) => Ok(()),
                    // `return` is control flow, not an error
                    Err(Signal::Return(v)) => Err(Signal::Return(v)),
                    Err(Signal::Error(err)) => {
                        let catch_env = Environment::with_parent(Rc::clone(&self.current));
                        if let Some(var) = catch_var {
                            catch_env
                                .borrow_mut()
                                .define(var, Value::String(err.to_string()));
                        }
                        let saved = Rc::clone(&self.current);
                        self.current = catch_env;
                        let result = self.execute_all(catch_body);
                        self.current = saved;
                        result
                    }
                }
            }
            Stmt::Assert { expr, line } => {
                if self.evaluate(expr)?.is_truthy() {
                    Ok(())
                } else {
                    Err(RuntimeError::AssertionFailed { line: *line }.into())
                }
            }
            Stmt::Delete { object, key, .. } => {
                let object = self.evaluate(object)?;
                let key = self.evaluate(key)?;
                if let Value::Map(entries) = object {
                    let key = key
                        .as_str()
                        .map(str::to_string)
                        .unwrap_or_else(|| key.to_string());
                    entries.borrow_mut().remove(&key);
                }
                Ok(())
            }
            // Function declarations inside a body bind in the enclosing
            // scope and close over it
            Stmt::Fun(decl) => {
                let func = self.make_function(decl, Rc::clone(&self.current));
                self.current.borrow_mut().define(&decl.name, func);
                Ok(())
            }
            // Handled during declaration registration
            Stmt::Class { .. }
            | Stmt::Extend { .. }
            | Stmt::Import { .. }
            | Stmt::Export { .. }
            | Stmt::Type { .. }
            | Stmt::NativeFun { .. } => Ok(()),
        }
    }

    fn execute_all(&mut self, statements: &[Stmt]) -> Result<(), Signal> {
        for stmt in statements {
            self.execute(stmt)?;
        }
        Ok(())
    }

    fn execute_in_env(&mut self, statements: &[Stmt], env: EnvRef) -> Result<(), Signal> {
        let saved = Rc::clone(&self.current);
        self.current = env;
        let result = self.execute_all(statements);
        self.current = saved;
        result
    }

    // ===== Evaluation =====

    fn evaluate(&mut self, expr: &Expr) -> Result<Value, Signal> {
        match expr {
            Expr::Literal { value, .. } => Ok(match value {
                Literal::Null => Value::Null,
                Literal::Bool(b) => Value::Bool(*b),
                Literal::Number(n) => Value::Number(*n),
                Literal::Str(s) => Value::String(s.clone()),
            }),
            Expr::Variable { name, .. } => self
                .current
                .borrow()
                .get(name)
                .ok_or_else(|| RuntimeError::UndefinedVariable { name: name.clone() }.into()),
            Expr::Binary {
                op, left, right, ..
            } => {
                let left = self.evaluate(left)?;
                let right = self.evaluate(right)?;
                self.apply_binary(*op, left, right)
            }
            Expr::Unary { op, operand, .. } => {
                let operand = self.evaluate(operand)?;
                Ok(match op {
                    UnaryOp::Neg => Value::Number(-operand.as_number().unwrap_or(0.0)),
                    UnaryOp::Not => Value::Bool(!operand.is_truthy()),
                })
            }
            Expr::Call { callee, args, .. } => {
                let callee = self.evaluate(callee)?;
                let mut arg_values = Vec::with_capacity(args.len());
                for arg in args {
                    arg_values.push(self.evaluate(arg)?);
                }
                self.call_value(callee, arg_values)
            }
            Expr::Get { object, name, .. } => {
                let object = self.evaluate(object)?;
                self.get_property(object, name)
            }
            Expr::Set {
                object,
                name,
                value,
                ..
            } => {
                let object = self.evaluate(object)?;
                let value = self.evaluate(value)?;
                match object {
                    Value::Instance(instance) => {
                        instance
                            .borrow_mut()
                            .fields
                            .insert(name.clone(), value.clone());
                        Ok(value)
                    }
                    Value::Map(entries) => {
                        entries.borrow_mut().insert(name.clone(), value.clone());
                        Ok(value)
                    }
                    other => Err(RuntimeError::NotSettable {
                        type_name: other.type_name(),
                    }
                    .into()),
                }
            }
            Expr::Index { object, index, .. } => {
                let object = self.evaluate(object)?;
                let index = self.evaluate(index)?;
                Ok(Self::index_value(&object, &index))
            }
            Expr::IndexSet {
                object,
                index,
                value,
                ..
            } => {
                let object = self.evaluate(object)?;
                let index = self.evaluate(index)?;
                let value = self.evaluate(value)?;
                match object {
                    Value::List(items) => {
                        if let Some(i) = index.as_number() {
                            let i = i as i64;
                            let mut items = items.borrow_mut();
                            if i >= 0 && (i as usize) < items.len() {
                                items[i as usize] = value.clone();
                            }
                        }
                        Ok(value)
                    }
                    Value::Map(entries) => {
                        let key = index
                            .as_str()
                            .map(str::to_string)
                            .unwrap_or_else(|| index.to_string());
                        entries.borrow_mut().insert(key, value.clone());
                        Ok(value)
                    }
                    other => Err(RuntimeError::NotSettable {
                        type_name: other.type_name(),
                    }
                    .into()),
                }
            }
            Expr::ListLit { items, .. } => {
                let mut values = Vec::with_capacity(items.len());
                for item in items {
                    values.push(self.evaluate(item)?);
                }
                Ok(Value::list(values))
            }
            Expr::MapLit { entries, .. } => {
                let mut map = HashMap::new();
                for (key, value) in entries {
                    map.insert(key.clone(), self.evaluate(value)?);
                }
                Ok(Value::map(map))
            }
            Expr::ObjectLit {
                class_name, fields, ..
            } => {
                let mut field_values = HashMap::new();
                for (name, value) in fields {
                    field_values.insert(name.clone(), self.evaluate(value)?);
                }
                Ok(Value::Instance(Rc::new(std::cell::RefCell::new(
                    Instance {
                        class_name: class_name.clone(),
                        fields: field_values,
                    },
                ))))
            }
            Expr::Lambda { params, body, .. } => Ok(Value::Function(Rc::new(Function {
                name: "lambda".to_string(),
                params: params.clone(),
                body: Rc::clone(body),
                closure: Rc::clone(&self.current),
            }))),
            Expr::IfElse {
                condition,
                then_branch,
                else_branch,
                ..
            } => {
                if self.evaluate(condition)?.is_truthy() {
                    self.evaluate(then_branch)
                } else {
                    self.evaluate(else_branch)
                }
            }
        }
    }

    /// Call a function, native, or class (construction)
    pub fn call_value(&mut self, callee: Value, args: Vec<Value>) -> Result<Value, Signal> {
        match callee {
            Value::Function(func) => {
                let fn_env = Environment::with_parent(Rc::clone(&func.closure));
                for (i, param) in func.params.iter().enumerate() {
                    let arg = args.get(i).cloned().unwrap_or(Value::Null);
                    fn_env.borrow_mut().define(param, arg);
                }

                let saved = Rc::clone(&self.current);
                self.current = fn_env;
                let mut result = Ok(Value::Null);
                for stmt in func.body.iter() {
                    match self.execute(stmt) {
                        Ok(()) => {}
                        Err(Signal::Return(value)) => {
                            result = Ok(value);
                            break;
                        }
                        Err(Signal::Error(err)) => {
                            result = Err(Signal::Error(err));
                            break;
                        }
                    }
                }
                self.current = saved;
                result
            }
            Value::Native(native) => (native.handler)(&args).map_err(Signal::Error),
            Value::Class(class) => {
                // Construction evaluates field defaults in the current scope
                let defaults = self.class_fields.get(&class.name).cloned();
                let mut fields = HashMap::new();
                if let Some(defaults) = defaults {
                    for (name, default) in defaults {
                        let value = match default {
                            Some(expr) => self.evaluate(&expr)?,
                            None => Value::Null,
                        };
                        fields.insert(name, value);
                    }
                }
                Ok(Value::Instance(Rc::new(std::cell::RefCell::new(
                    Instance {
                        class_name: class.name.clone(),
                        fields,
                    },
                ))))
            }
            other => Err(RuntimeError::NotCallable {
                type_name: other.type_name(),
            }
            .into()),
        }
    }

    fn get_property(&mut self, object: Value, name: &str) -> Result<Value, Signal> {
        match object {
            Value::Instance(instance) => {
                if let Some(value) = instance.borrow().fields.get(name) {
                    return Ok(value.clone());
                }

                // Field lookup misses fall through to the class's methods;
                // binding wraps the method closure in a scope holding `self`
                let class_name = instance.borrow().class_name.clone();
                if let Some(Value::Class(class)) = self.globals.borrow().get(&class_name) {
                    if let Some(method) = class.methods.get(name) {
                        let method_env = Environment::with_parent(Rc::clone(&method.closure));
                        method_env
                            .borrow_mut()
                            .define("self", Value::Instance(Rc::clone(&instance)));
                        return Ok(Value::Function(Rc::new(Function {
                            name: method.name.clone(),
                            params: method.params.clone(),
                            body: Rc::clone(&method.body),
                            closure: method_env,
                        })));
                    }
                }

                Err(RuntimeError::UndefinedProperty {
                    name: name.to_string(),
                }
                .into())
            }
            Value::Map(entries) => Ok(entries.borrow().get(name).cloned().unwrap_or(Value::Null)),
            Value::String(s) => self.string_property(s, name),
            Value::List(items) => match name {
                "length" => Ok(Value::Number(items.borrow().len() as f64)),
                _ => Err(RuntimeError::UnknownMethod {
                    type_name: "list",
                    name: name.to_string(),
                }
                .into()),
            },
            other => Err(RuntimeError::NotAnObject {
                type_name: other.type_name(),
            }
            .into()),
        }
    }

    /// String pseudo-methods: `length` resolves directly, the rest are
    /// natives bound over the receiver
    fn string_property(&self, s: String, name: &str) -> Result<Value, Signal> {
        match name {
            "length" => Ok(Value::Number(s.chars().count() as f64)),
            "starts_with" => Ok(Value::native(
                "starts_with",
                Rc::new(move |args: &[Value]| {
                    let prefix = args.first().and_then(|v| v.as_str()).unwrap_or("");
                    Ok(Value::Bool(s.starts_with(prefix)))
                }),
            )),
            "ends_with" => Ok(Value::native(
                "ends_with",
                Rc::new(move |args: &[Value]| {
                    let suffix = args.first().and_then(|v| v.as_str()).unwrap_or("");
                    Ok(Value::Bool(s.ends_with(suffix)))
                }),
            )),
            "substring" => Ok(Value::native(
                "substring",
                Rc::new(move |args: &[Value]| {
                    let chars: Vec<char> = s.chars().collect();
                    let start = args
                        .first()
                        .and_then(|v| v.as_number())
                        .unwrap_or(0.0)
                        .max(0.0) as usize;
                    let start = start.min(chars.len());
                    Ok(Value::String(chars[start..].iter().collect()))
                }),
            )),
            "split" => Ok(Value::native(
                "split",
                Rc::new(move |args: &[Value]| {
                    let delimiter = args.first().and_then(|v| v.as_str()).unwrap_or("");
                    let parts: Vec<Value> = if delimiter.is_empty() {
                        s.chars().map(|c| Value::String(c.to_string())).collect()
                    } else {
                        s.split(delimiter).map(Value::from).collect()
                    };
                    Ok(Value::list(parts))
                }),
            )),
            _ => Err(RuntimeError::UnknownMethod {
                type_name: "string",
                name: name.to_string(),
            }
            .into()),
        }
    }

    fn index_value(object: &Value, index: &Value) -> Value {
        match object {
            Value::List(items) => {
                let i = index.as_number().unwrap_or(0.0) as i64;
                if i < 0 {
                    return Value::Null;
                }
                items.borrow().get(i as usize).cloned().unwrap_or(Value::Null)
            }
            Value::Map(entries) => {
                let key = index
                    .as_str()
                    .map(str::to_string)
                    .unwrap_or_else(|| index.to_string());
                entries.borrow().get(&key).cloned().unwrap_or(Value::Null)
            }
            Value::String(s) => {
                let i = index.as_number().unwrap_or(0.0) as i64;
                if i < 0 {
                    return Value::Null;
                }
                s.chars()
                    .nth(i as usize)
                    .map(|c| Value::String(c.to_string()))
                    .unwrap_or(Value::Null)
            }
            _ => Value::Null,
        }
    }

    fn apply_binary(&mut self, op: BinaryOp, left: Value, right: Value) -> Result<Value, Signal> {
        let value = match op {
            BinaryOp::Add => match (&left, &right) {
                (Value::Number(l), Value::Number(r)) => Value::Number(l + r),
                // Either side being a string coerces the other
                (Value::String(_), _) | (_, Value::String(_)) => {
                    Value::String(format!("{}{}", left, right))
                }
                (Value::List(items), _) => {
                    let mut merged = items.borrow().clone();
                    match &right {
                        Value::List(other) => merged.extend(other.borrow().iter().cloned()),
                        other => merged.push(other.clone()),
                    }
                    Value::list(merged)
                }
                _ => Value::Null,
            },
            BinaryOp::Sub => Value::Number(
                left.as_number().unwrap_or(0.0) - right.as_number().unwrap_or(0.0),
            ),
            BinaryOp::Mul => Value::Number(
                left.as_number().unwrap_or(0.0) * right.as_number().unwrap_or(0.0),
            ),
            // Missing divisors default to 1 rather than dividing by zero
            BinaryOp::Div => Value::Number(
                left.as_number().unwrap_or(0.0) / right.as_number().unwrap_or(1.0),
            ),
            BinaryOp::Mod => Value::Number(
                left.as_number().unwrap_or(0.0) % right.as_number().unwrap_or(1.0),
            ),
            BinaryOp::Eq => Value::Bool(left == right),
            BinaryOp::Ne => Value::Bool(left != right),
            BinaryOp::Lt => Value::Bool(
                left.as_number().unwrap_or(0.0) < right.as_number().unwrap_or(0.0),
            ),
            BinaryOp::Gt => Value::Bool(
                left.as_number().unwrap_or(0.0) > right.as_number().unwrap_or(0.0),
            ),
            BinaryOp::Le => Value::Bool(
                left.as_number().unwrap_or(0.0) <= right.as_number().unwrap_or(0.0),
            ),
            BinaryOp::Ge => Value::Bool(
                left.as_number().unwrap_or(0.0) >= right.as_number().unwrap_or(0.0),
            ),
            // Both operands evaluate; no short-circuit
            BinaryOp::And => Value::Bool(left.is_truthy() && right.is_truthy()),
            BinaryOp::Or => Value::Bool(left.is_truthy() || right.is_truthy()),
            BinaryOp::In => Self::contains(&left, &right),
        };
        Ok(value)
    }

    /// Membership: char/substring in string, element in list, key in map
    fn contains(needle: &Value, haystack: &Value) -> Value {
        let found = match haystack {
            Value::String(s) => needle.as_str().map(|n| s.contains(n)).unwrap_or(false),
            Value::List(items) => items.borrow().iter().any(|item| item == needle),
            Value::Map(entries) => {
                let key = needle
                    .as_str()
                    .map(str::to_string)
                    .unwrap_or_else(|| needle.to_string());
                entries.borrow().contains_key(&key)
            }
            _ => false,
        };
        Value::Bool(found)
    }
}

use std::cell::RefCell;
use std::collections::HashMap;
use std::fmt;
use std::rc::Rc;

use crate::environment::EnvRef;
use crate::error::RuntimeError;
use crate::parser::ast::{Expr, Stmt};

/// Handler signature for host-implemented (native) functions
pub type NativeHandler = Rc<dyn Fn(&[Value]) -> Result<Value, RuntimeError>>;

/// Runtime value in the Somnia toolchain
///
/// Scalars (null, bool, number, string) are value-like: copied on assignment
/// and compared structurally. Lists, maps, and instances have shared mutable
/// identity: two references to the same list observe each other's mutations,
/// which the `Rc<RefCell<..>>` wrappers make explicit.
#[derive(Clone)]
pub enum Value {
    /// Null value
    Null,

    /// Boolean value
    Bool(bool),

    /// Numbers unify int and float as 64-bit floating point; "is this an
    /// integer" is a derived predicate, not a separate variant
    Number(f64),

    /// UTF-8 string
    String(String),

    /// Mutable ordered sequence with shared identity
    List(Rc<RefCell<Vec<Value>>>),

    /// Mutable string-keyed mapping with shared identity
    Map(Rc<RefCell<HashMap<String, Value>>>),

    /// User-declared function or lambda paired with its defining environment
    Function(Rc<Function>),

    /// Class declaration: default field initializers plus a method table
    Class(Rc<Class>),

    /// Instance of a class with a mutable field table
    Instance(Rc<RefCell<Instance>>),

    /// Host-implemented function exposed to Somnia programs by name
    Native(Rc<NativeFn>),
}

/// A Somnia function value: a closure over the environment it was defined in
pub struct Function {
    pub name: String,
    pub params: Vec<String>,
    pub body: Rc<Vec<Stmt>>,
    pub closure: EnvRef,
}

/// A class value; field defaults are evaluated at construction time
pub struct Class {
    pub name: String,
    pub fields: Vec<(String, Option<Expr>)>,
    pub methods: HashMap<String, Rc<Function>>,
}

/// Instance state: the class it was built from and its field table
pub struct Instance {
    pub class_name: String,
    pub fields: HashMap<String, Value>,
}

/// A named native function
pub struct NativeFn {
    pub name: String,
    pub handler: NativeHandler,
}

impl Value {
    /// Construct a list value from items
    pub fn list(items: Vec<Value>) -> Self {
        Value::List(Rc::new(RefCell::new(items)))
    }

    /// Construct a map value from entries
    pub fn map(entries: HashMap<String, Value>) -> Self {
        Value::Map(Rc::new(RefCell::new(entries)))
    }

    /// Construct a native function value
    pub fn native(name: impl Into<String>, handler: NativeHandler) -> Self {
        Value::Native(Rc::new(NativeFn {
            name: name.into(),
            handler,
        }))
    }

    /// Truthiness: only non-empty/non-zero/true values are truthy
    pub fn is_truthy(&self) -> bool {
        match self {
            Value::Null => false,
            Value::Bool(b) => *b,
            Value::Number(n) => *n != 0.0,
            Value::String(s) => !s.is_empty(),
            Value::List(items) => !items.borrow().is_empty(),
            Value::Map(entries) => !entries.borrow().is_empty(),
            Value::Function(_) | Value::Class(_) | Value::Instance(_) | Value::Native(_) => true,
        }
    }

    /// Extract a number, or None for non-numeric values
    pub fn as_number(&self) -> Option<f64> {
        match self {
            Value::Number(n) => Some(*n),
            _ => None,
        }
    }

    /// Extract a string slice, or None for non-string values
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::String(s) => Some(s),
            _ => None,
        }
    }

    /// Get the type name of this value for error messages
    pub fn type_name(&self) -> &'static str {
        match self {
            Value::Null => "null",
            Value::Bool(_) => "bool",
            Value::Number(_) => "number",
            Value::String(_) => "string",
            Value::List(_) => "list",
            Value::Map(_) => "map",
            Value::Function(_) => "function",
            Value::Class(_) => "class",
            Value::Instance(_) => "object",
            Value::Native(_) => "native",
        }
    }
}

/// Deep structural equality; two nulls are equal, lists and maps compare
/// element-wise. Functions, classes, and natives compare by identity.
impl PartialEq for Value {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Value::Null, Value::Null) => true,
            (Value::Bool(a), Value::Bool(b)) => a == b,
            (Value::Number(a), Value::Number(b)) => a == b,
            (Value::String(a), Value::String(b)) => a == b,
            (Value::List(a), Value::List(b)) => {
                Rc::ptr_eq(a, b) || *a.borrow() == *b.borrow()
            }
            (Value::Map(a), Value::Map(b)) => Rc::ptr_eq(a, b) || *a.borrow() == *b.borrow(),
            (Value::Instance(a), Value::Instance(b)) => {
                if Rc::ptr_eq(a, b) {
                    return true;
                }
                let a = a.borrow();
                let b = b.borrow();
                a.class_name == b.class_name && a.fields == b.fields
            }
            (Value::Function(a), Value::Function(b)) => Rc::ptr_eq(a, b),
            (Value::Class(a), Value::Class(b)) => Rc::ptr_eq(a, b),
            (Value::Native(a), Value::Native(b)) => Rc::ptr_eq(a, b),
            _ => false,
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Null => write!(f, "null"),
            Value::Bool(b) => write!(f, "{}", b),
            Value::Number(n) => {
                // Integral numbers display without a decimal point
                if *n == n.trunc() && n.is_finite() {
                    write!(f, "{}", *n as i64)
                } else {
                    write!(f, "{}", n)
                }
            }
            Value::String(s) => write!(f, "{}", s),
            Value::List(items) => {
                write!(f, "[")?;
                for (i, item) in items.borrow().iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "{}", item)?;
                }
                write!(f, "]")
            }
            Value::Map(entries) => {
                write!(f, "{{")?;
                for (i, (key, value)) in entries.borrow().iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "\"{}\": {}", key, value)?;
                }
                write!(f, "}}")
            }
            Value::Function(func) => write!(f, "<fn {}>", func.name),
            Value::Class(class) => write!(f, "<class {}>", class.name),
            Value::Instance(instance) => write!(f, "{} {{ ... }}", instance.borrow().class_name),
            Value::Native(native) => write!(f, "<native {}>", native.name),
        }
    }
}

impl fmt::Debug for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Null => write!(f, "Null"),
            Value::Bool(b) => write!(f, "Bool({})", b),
            Value::Number(n) => write!(f, "Number({})", n),
            Value::String(s) => write!(f, "String({:?})", s),
            Value::List(items) => write!(f, "List({:?})", items.borrow()),
            Value::Map(entries) => write!(f, "Map({:?})", entries.borrow()),
            Value::Function(func) => write!(f, "Function({})", func.name),
            Value::Class(class) => write!(f, "Class({})", class.name),
            Value::Instance(instance) => write!(f, "Instance({})", instance.borrow().class_name),
            Value::Native(native) => write!(f, "Native({})", native.name),
        }
    }
}

impl From<bool> for Value {
    fn from(b: bool) -> Self {
        Value::Bool(b)
    }
}

impl From<f64> for Value {
    fn from(n: f64) -> Self {
        Value::Number(n)
    }
}

impl From<String> for Value {
    fn from(s: String) -> Self {
        Value::String(s)
    }
}

impl From<&str> for Value {
    fn from(s: &str) -> Self {
        Value::String(s.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_is_truthy() {
        assert!(Value::Bool(true).is_truthy());
        assert!(!Value::Bool(false).is_truthy());
        assert!(Value::Number(1.5).is_truthy());
        assert!(!Value::Number(0.0).is_truthy());
        assert!(Value::String("hello".to_string()).is_truthy());
        assert!(!Value::String(String::new()).is_truthy());
        assert!(!Value::Null.is_truthy());
        assert!(!Value::list(vec![]).is_truthy());
        assert!(Value::list(vec![Value::Null]).is_truthy());
        assert!(!Value::map(HashMap::new()).is_truthy());
    }

    #[test]
    fn test_integral_number_display() {
        assert_eq!(Value::Number(2.0).to_string(), "2");
        assert_eq!(Value::Number(-7.0).to_string(), "-7");
        assert_eq!(Value::Number(2.5).to_string(), "2.5");
    }

    #[test]
    fn test_display() {
        assert_eq!(Value::Null.to_string(), "null");
        assert_eq!(Value::Bool(true).to_string(), "true");
        assert_eq!(Value::String("hi".to_string()).to_string(), "hi");
        assert_eq!(
            Value::list(vec![Value::Number(1.0), Value::String("a".to_string())]).to_string(),
            "[1, a]"
        );
    }

    #[test]
    fn test_deep_equality() {
        let a = Value::list(vec![Value::Number(1.0), Value::Number(2.0)]);
        let b = Value::list(vec![Value::Number(1.0), Value::Number(2.0)]);
        assert_eq!(a, b);

        let c = Value::list(vec![Value::Number(1.0)]);
        assert_ne!(a, c);

        assert_eq!(Value::Null, Value::Null);
        assert_ne!(Value::Number(0.0), Value::Null);
    }

    #[test]
    fn test_list_aliasing() {
        let a = Value::list(vec![Value::Number(1.0)]);
        let b = a.clone();
        if let Value::List(items) = &a {
            items.borrow_mut().push(Value::Number(2.0));
        }
        if let Value::List(items) = &b {
            assert_eq!(items.borrow().len(), 2);
        } else {
            panic!("expected list");
        }
    }

    #[test]
    fn test_type_names() {
        assert_eq!(Value::Null.type_name(), "null");
        assert_eq!(Value::Number(1.0).type_name(), "number");
        assert_eq!(Value::list(vec![]).type_name(), "list");
        assert_eq!(Value::map(HashMap::new()).type_name(), "map");
    }
}

//! Lexical environments for the tree-walking interpreter
//!
//! Environments form a parent chain. Closures hold an `EnvRef` to the scope
//! they were defined in, so mutations through one alias are visible through
//! every other alias of the same scope.

use std::cell::RefCell;
use std::collections::HashMap;
use std::rc::Rc;

use crate::value::Value;

/// Shared handle to an environment
pub type EnvRef = Rc<RefCell<Environment>>;

/// One lexical scope: a binding table plus an optional enclosing scope
#[derive(Default)]
pub struct Environment {
    values: HashMap<String, Value>,
    parent: Option<EnvRef>,
}

impl Environment {
    /// Create a root environment with no parent
    pub fn new() -> EnvRef {
        Rc::new(RefCell::new(Environment::default()))
    }

    /// Create a child environment enclosed by `parent`
    pub fn with_parent(parent: EnvRef) -> EnvRef {
        Rc::new(RefCell::new(Environment {
            values: HashMap::new(),
            parent: Some(parent),
        }))
    }

    /// Bind a name in this scope, shadowing any outer binding
    pub fn define(&mut self, name: impl Into<String>, value: Value) {
        self.values.insert(name.into(), value);
    }

    /// Look a name up, walking the parent chain
    pub fn get(&self, name: &str) -> Option<Value> {
        if let Some(value) = self.values.get(name) {
            return Some(value.clone());
        }
        self.parent.as_ref().and_then(|p| p.borrow().get(name))
    }

    /// Reassign an existing binding in the nearest scope that has it.
    /// Returns false if no scope in the chain defines `name`.
    pub fn set(&mut self, name: &str, value: Value) -> bool {
        if let Some(slot) = self.values.get_mut(name) {
            *slot = value;
            return true;
        }
        match &self.parent {
            Some(parent) => parent.borrow_mut().set(name, value),
            None => false,
        }
    }

}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_define_and_get() {
        let env = Environment::new();
        env.borrow_mut().define("x", Value::Number(1.0));
        assert_eq!(env.borrow().get("x"), Some(Value::Number(1.0)));
        assert_eq!(env.borrow().get("y"), None);
    }

    #[test]
    fn test_child_sees_parent() {
        let parent = Environment::new();
        parent.borrow_mut().define("x", Value::Number(1.0));
        let child = Environment::with_parent(parent.clone());
        assert_eq!(child.borrow().get("x"), Some(Value::Number(1.0)));
    }

    #[test]
    fn test_shadowing() {
        let parent = Environment::new();
        parent.borrow_mut().define("x", Value::Number(1.0));
        let child = Environment::with_parent(parent.clone());
        child.borrow_mut().define("x", Value::Number(2.0));
        assert_eq!(child.borrow().get("x"), Some(Value::Number(2.0)));
        assert_eq!(parent.borrow().get("x"), Some(Value::Number(1.0)));
    }

    #[test]
    fn test_set_walks_chain() {
        let parent = Environment::new();
        parent.borrow_mut().define("x", Value::Number(1.0));
        let child = Environment::with_parent(parent.clone());
        assert!(child.borrow_mut().set("x", Value::Number(5.0)));
        assert_eq!(parent.borrow().get("x"), Some(Value::Number(5.0)));
    }

    #[test]
    fn test_set_missing_fails() {
        let env = Environment::new();
        assert!(!env.borrow_mut().set("nope", Value::Null));
    }

    #[test]
    fn test_shared_alias_mutation() {
        // Two handles to the same scope observe each other's writes
        let a = Environment::new();
        let b = a.clone();
        a.borrow_mut().define("n", Value::Number(0.0));
        b.borrow_mut().set("n", Value::Number(9.0));
        assert_eq!(a.borrow().get("n"), Some(Value::Number(9.0)));
    }
}

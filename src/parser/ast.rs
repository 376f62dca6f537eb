//! AST definitions for the Somnia language
//!
//! Every node carries the 1-indexed source line it started on, which flows
//! into runtime and compile errors.

use std::fmt;
use std::rc::Rc;

/// Literal values as they appear in source
#[derive(Debug, Clone, PartialEq)]
pub enum Literal {
    Null,
    Bool(bool),
    Number(f64),
    Str(String),
}

/// Binary operators
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BinaryOp {
    Add,
    Sub,
    Mul,
    Div,
    Mod,
    Eq,
    Ne,
    Lt,
    Le,
    Gt,
    Ge,
    And,
    Or,
    In,
}

/// Unary operators
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UnaryOp {
    Neg,
    Not,
}

impl fmt::Display for BinaryOp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            BinaryOp::Add => "+",
            BinaryOp::Sub => "-",
            BinaryOp::Mul => "*",
            BinaryOp::Div => "/",
            BinaryOp::Mod => "%",
            BinaryOp::Eq => "==",
            BinaryOp::Ne => "!=",
            BinaryOp::Lt => "<",
            BinaryOp::Le => "<=",
            BinaryOp::Gt => ">",
            BinaryOp::Ge => ">=",
            BinaryOp::And => "and",
            BinaryOp::Or => "or",
            BinaryOp::In => "in",
        };
        write!(f, "{}", s)
    }
}

impl fmt::Display for UnaryOp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            UnaryOp::Neg => write!(f, "-"),
            UnaryOp::Not => write!(f, "not"),
        }
    }
}

/// Expressions
#[derive(Debug, Clone, PartialEq)]
pub enum Expr {
    Literal {
        value: Literal,
        line: u32,
    },

    Variable {
        name: String,
        line: u32,
    },

    Binary {
        op: BinaryOp,
        left: Box<Expr>,
        right: Box<Expr>,
        line: u32,
    },

    Unary {
        op: UnaryOp,
        operand: Box<Expr>,
        line: u32,
    },

    /// Call with an arbitrary callee: `f(x)`, `obj.method(x)`, `fs[0]()`
    Call {
        callee: Box<Expr>,
        args: Vec<Expr>,
        line: u32,
    },

    /// Member access: `expr.name`
    Get {
        object: Box<Expr>,
        name: String,
        line: u32,
    },

    /// Member assignment: `expr.name = value`; evaluates to the value
    Set {
        object: Box<Expr>,
        name: String,
        value: Box<Expr>,
        line: u32,
    },

    /// Index access: `expr[index]`
    Index {
        object: Box<Expr>,
        index: Box<Expr>,
        line: u32,
    },

    /// Index assignment: `expr[index] = value`; evaluates to the value
    IndexSet {
        object: Box<Expr>,
        index: Box<Expr>,
        value: Box<Expr>,
        line: u32,
    },

    /// List literal: `[a, b, c]`
    ListLit {
        items: Vec<Expr>,
        line: u32,
    },

    /// Map literal: `{"key": value}`; keys are string literals
    MapLit {
        entries: Vec<(String, Expr)>,
        line: u32,
    },

    /// Object literal: `ClassName { field: value }`
    ObjectLit {
        class_name: String,
        fields: Vec<(String, Expr)>,
        line: u32,
    },

    /// Anonymous function: `fun (a, b) { ... }`
    Lambda {
        params: Vec<String>,
        body: Rc<Vec<Stmt>>,
        line: u32,
    },

    /// Conditional expression: `if cond then a else b`
    IfElse {
        condition: Box<Expr>,
        then_branch: Box<Expr>,
        else_branch: Box<Expr>,
        line: u32,
    },
}

impl Expr {
    /// Source line the expression starts on
    pub fn line(&self) -> u32 {
        match self {
            Expr::Literal { line, .. }
            | Expr::Variable { line, .. }
            | Expr::Binary { line, .. }
            | Expr::Unary { line, .. }
            | Expr::Call { line, .. }
            | Expr::Get { line, .. }
            | Expr::Set { line, .. }
            | Expr::Index { line, .. }
            | Expr::IndexSet { line, .. }
            | Expr::ListLit { line, .. }
            | Expr::MapLit { line, .. }
            | Expr::ObjectLit { line, .. }
            | Expr::Lambda { line, .. }
            | Expr::IfElse { line, .. } => *line,
        }
    }
}

/// A named function declaration; also used for class and extension methods
#[derive(Debug, Clone, PartialEq)]
pub struct FunDecl {
    pub name: String,
    pub params: Vec<String>,
    pub body: Rc<Vec<Stmt>>,
    pub line: u32,
}

/// Statements
#[derive(Debug, Clone, PartialEq)]
pub enum Stmt {
    Expr {
        expr: Expr,
        line: u32,
    },

    /// `var name` or `var name = expr`
    Var {
        name: String,
        initializer: Option<Expr>,
        line: u32,
    },

    /// `const name = expr`
    Const {
        name: String,
        value: Expr,
        line: u32,
    },

    /// `name = expr` reassignment
    Assign {
        name: String,
        value: Expr,
        line: u32,
    },

    Block {
        statements: Vec<Stmt>,
        line: u32,
    },

    If {
        condition: Expr,
        then_branch: Box<Stmt>,
        else_branch: Option<Box<Stmt>>,
        line: u32,
    },

    /// `when cond => body`; `default => body` desugars to `when true`
    When {
        condition: Expr,
        body: Box<Stmt>,
        line: u32,
    },

    While {
        condition: Expr,
        body: Box<Stmt>,
        line: u32,
    },

    /// `for name in iterable { ... }`
    For {
        name: String,
        iterable: Expr,
        body: Box<Stmt>,
        line: u32,
    },

    Return {
        value: Option<Expr>,
        line: u32,
    },

    Fun(FunDecl),

    Class {
        name: String,
        fields: Vec<(String, Option<Expr>)>,
        methods: Vec<FunDecl>,
        line: u32,
    },

    /// `extend ClassName { method ... }`
    Extend {
        class_name: String,
        methods: Vec<FunDecl>,
        line: u32,
    },

    /// `import "path"`
    Import {
        path: String,
        line: u32,
    },

    /// `export a, b, c`
    Export {
        names: Vec<String>,
        line: u32,
    },

    /// `test "name" { ... }`
    Test {
        name: String,
        body: Vec<Stmt>,
        line: u32,
    },

    /// `type Name = definition`; recorded but not enforced
    Type {
        name: String,
        definition: String,
        line: u32,
    },

    Try {
        body: Vec<Stmt>,
        catch_var: Option<String>,
        catch_body: Vec<Stmt>,
        line: u32,
    },

    Assert {
        expr: Expr,
        line: u32,
    },

    /// `delete map[key]`
    Delete {
        object: Expr,
        key: Expr,
        line: u32,
    },

    /// `native fun name(params)` declaration
    NativeFun {
        name: String,
        params: Vec<String>,
        line: u32,
    },
}

impl Stmt {
    /// Source line the statement starts on
    pub fn line(&self) -> u32 {
        match self {
            Stmt::Expr { line, .. }
            | Stmt::Var { line, .. }
            | Stmt::Const { line, .. }
            | Stmt::Assign { line, .. }
            | Stmt::Block { line, .. }
            | Stmt::If { line, .. }
            | Stmt::When { line, .. }
            | Stmt::While { line, .. }
            | Stmt::For { line, .. }
            | Stmt::Return { line, .. }
            | Stmt::Class { line, .. }
            | Stmt::Extend { line, .. }
            | Stmt::Import { line, .. }
            | Stmt::Export { line, .. }
            | Stmt::Test { line, .. }
            | Stmt::Type { line, .. }
            | Stmt::Try { line, .. }
            | Stmt::Assert { line, .. }
            | Stmt::Delete { line, .. }
            | Stmt::NativeFun { line, .. } => *line,
            Stmt::Fun(decl) => decl.line,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_binary_op_display() {
        assert_eq!(BinaryOp::Add.to_string(), "+");
        assert_eq!(BinaryOp::Ne.to_string(), "!=");
        assert_eq!(BinaryOp::And.to_string(), "and");
        assert_eq!(BinaryOp::In.to_string(), "in");
    }

    #[test]
    fn test_unary_op_display() {
        assert_eq!(UnaryOp::Neg.to_string(), "-");
        assert_eq!(UnaryOp::Not.to_string(), "not");
    }

    #[test]
    fn test_expr_line() {
        let expr = Expr::Binary {
            op: BinaryOp::Add,
            left: Box::new(Expr::Literal {
                value: Literal::Number(1.0),
                line: 3,
            }),
            right: Box::new(Expr::Literal {
                value: Literal::Number(2.0),
                line: 3,
            }),
            line: 3,
        };
        assert_eq!(expr.line(), 3);
    }

    #[test]
    fn test_stmt_line() {
        let stmt = Stmt::Fun(FunDecl {
            name: "f".to_string(),
            params: vec![],
            body: Rc::new(vec![]),
            line: 9,
        });
        assert_eq!(stmt.line(), 9);
    }
}

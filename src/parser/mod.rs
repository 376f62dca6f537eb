//! Somnia recursive descent parser
//!
//! Converts source text into a list of top-level statements. Two entry points:
//! [`parse`] stops at the first error, [`parse_lenient`] recovers at statement
//! boundaries and collects every error, so a file with one bad statement still
//! yields the rest.

pub mod ast;
pub mod error;
pub mod lexer;


pub use ast::{BinaryOp, Expr, FunDecl, Literal, Stmt, UnaryOp};
pub use error::{ParseError, ParseResult};
pub use lexer::{Lexer, Token, TokenKind};

/// Parse Somnia source into statements, failing on the first error
pub fn parse(source: &str) -> ParseResult<Vec<Stmt>> {
    let tokens = Lexer::new(source).tokenize()?;
    Parser::new(tokens).parse_program()
}

/// Parse Somnia source with error recovery
///
/// Lex errors are still fatal; parse errors skip to the next statement
/// boundary and are returned alongside the statements that did parse.
pub fn parse_lenient(source: &str) -> ParseResult<(Vec<Stmt>, Vec<Box<ParseError>>)> {
    let tokens = Lexer::new(source).tokenize()?;
    Ok(Parser::new(tokens).parse_program_lenient())
}

/// The main parser struct, a cursor over a pre-lexed token list
pub struct Parser {
    tokens: Vec<Token>,
    current: usize,
}

impl Parser {
    /// Create a parser; `tokens` must end with an `Eof` token
    pub fn new(tokens: Vec<Token>) -> Self {
        Parser { tokens, current: 0 }
    }

    /// Parse the whole token stream, aborting on the first error
    pub fn parse_program(&mut self) -> ParseResult<Vec<Stmt>> {
        let mut statements = Vec::new();
        while !self.is_at_end() {
            if self.eat(&TokenKind::Semi) {
                continue;
            }
            statements.push(self.parse_declaration()?);
        }
        Ok(statements)
    }

    /// Parse the whole token stream, recovering at statement boundaries
    pub fn parse_program_lenient(&mut self) -> (Vec<Stmt>, Vec<Box<ParseError>>) {
        let mut statements = Vec::new();
        let mut errors = Vec::new();
        while !self.is_at_end() {
            if self.eat(&TokenKind::Semi) {
                continue;
            }
            match self.parse_declaration() {
                Ok(stmt) => statements.push(stmt),
                Err(err) => {
                    errors.push(err);
                    self.synchronize();
                }
            }
        }
        (statements, errors)
    }

    // ===== Declarations =====

    fn parse_declaration(&mut self) -> ParseResult<Stmt> {
        match self.peek().kind {
            TokenKind::Var => {
                self.advance();
                self.parse_var_declaration()
            }
            TokenKind::Const => {
                self.advance();
                self.parse_const_declaration()
            }
            TokenKind::Fun => {
                self.advance();
                Ok(Stmt::Fun(self.parse_fun_declaration()?))
            }
            TokenKind::Class => {
                self.advance();
                self.parse_class_declaration()
            }
            TokenKind::Import => {
                self.advance();
                self.parse_import_declaration()
            }
            TokenKind::Export => {
                self.advance();
                self.parse_export_declaration()
            }
            TokenKind::Test => {
                self.advance();
                self.parse_test_declaration()
            }
            TokenKind::Type => {
                self.advance();
                self.parse_type_declaration()
            }
            TokenKind::Extend => {
                self.advance();
                self.parse_extend_declaration()
            }
            TokenKind::Native => {
                self.advance();
                self.parse_native_declaration()
            }
            _ => self.parse_statement(),
        }
    }

    fn parse_var_declaration(&mut self) -> ParseResult<Stmt> {
        let name = self.consume_identifier("variable name")?;
        let initializer = if self.eat(&TokenKind::Eq) {
            Some(self.parse_expr()?)
        } else {
            None
        };
        Ok(Stmt::Var {
            name: name.lexeme,
            initializer,
            line: name.line,
        })
    }

    fn parse_const_declaration(&mut self) -> ParseResult<Stmt> {
        let name = self.consume_identifier("constant name")?;
        self.expect(&TokenKind::Eq, "'=' after constant name")?;
        let value = self.parse_expr()?;
        Ok(Stmt::Const {
            name: name.lexeme,
            value,
            line: name.line,
        })
    }

    /// Parse a function declaration with the `fun` keyword already consumed;
    /// also used for `method` bodies in classes and extensions
    fn parse_fun_declaration(&mut self) -> ParseResult<FunDecl> {
        let name = self.consume_identifier("function name")?;
        self.expect(&TokenKind::LParen, "'(' after function name")?;

        let mut params = Vec::new();
        if !self.check(&TokenKind::RParen) {
            loop {
                let param = self.consume_identifier("parameter name")?;
                params.push(param.lexeme);
                // Type annotations are accepted and discarded
                if self.eat(&TokenKind::Colon) {
                    self.consume_identifier("parameter type")?;
                }
                if !self.eat(&TokenKind::Comma) {
                    break;
                }
            }
        }
        self.expect(&TokenKind::RParen, "')' after parameters")?;

        if self.eat(&TokenKind::Arrow) {
            self.consume_identifier("return type")?;
        }

        self.expect(&TokenKind::LBrace, "'{' before function body")?;
        let body = self.parse_block_statements()?;

        Ok(FunDecl {
            name: name.lexeme,
            params,
            body: std::rc::Rc::new(body),
            line: name.line,
        })
    }

    fn parse_class_declaration(&mut self) -> ParseResult<Stmt> {
        let name = self.expect_plain_identifier("class name")?;
        self.expect(&TokenKind::LBrace, "'{' before class body")?;

        let mut fields = Vec::new();
        let mut methods = Vec::new();

        while !self.check(&TokenKind::RBrace) && !self.is_at_end() {
            match self.peek().kind {
                TokenKind::Field => {
                    self.advance();
                    let field_name = self.consume_identifier("field name")?;
                    if self.eat(&TokenKind::Colon) {
                        self.consume_identifier("field type")?;
                    }
                    let initializer = if self.eat(&TokenKind::Eq) {
                        Some(self.parse_expr()?)
                    } else {
                        None
                    };
                    fields.push((field_name.lexeme, initializer));
                }
                TokenKind::Method => {
                    self.advance();
                    methods.push(self.parse_fun_declaration()?);
                }
                // Anything else in a class body is skipped
                _ => {
                    self.advance();
                }
            }
        }

        self.expect(&TokenKind::RBrace, "'}' after class body")?;
        Ok(Stmt::Class {
            name: name.lexeme,
            fields,
            methods,
            line: name.line,
        })
    }

    fn parse_import_declaration(&mut self) -> ParseResult<Stmt> {
        let (path, line) = self.expect_string("import path")?;
        Ok(Stmt::Import { path, line })
    }

    fn parse_export_declaration(&mut self) -> ParseResult<Stmt> {
        // `export * from "module"` behaves as an import of the module
        if self.eat(&TokenKind::Star) {
            self.expect(&TokenKind::From, "'from' after '*'")?;
            let (path, line) = self.expect_string("module path")?;
            return Ok(Stmt::Import { path, line });
        }

        let mut names = Vec::new();
        loop {
            let name = self.expect_plain_identifier("export name")?;
            names.push(name.lexeme);
            if !self.eat(&TokenKind::Comma) {
                break;
            }
        }
        let line = self.previous().line;
        Ok(Stmt::Export { names, line })
    }

    fn parse_test_declaration(&mut self) -> ParseResult<Stmt> {
        let (name, line) = self.expect_string("test name")?;
        self.expect(&TokenKind::LBrace, "'{' before test body")?;
        let body = self.parse_block_statements()?;
        Ok(Stmt::Test { name, body, line })
    }

    fn parse_type_declaration(&mut self) -> ParseResult<Stmt> {
        let name = self.consume_identifier("type name")?;
        self.expect(&TokenKind::Eq, "'=' after type name")?;
        let definition = self.consume_identifier("type definition")?;
        Ok(Stmt::Type {
            name: name.lexeme,
            definition: definition.lexeme,
            line: name.line,
        })
    }

    fn parse_extend_declaration(&mut self) -> ParseResult<Stmt> {
        let class_name = self.consume_identifier("class name to extend")?;
        self.expect(&TokenKind::LBrace, "'{' before extend body")?;

        let mut methods = Vec::new();
        while !self.check(&TokenKind::RBrace) && !self.is_at_end() {
            if self.eat(&TokenKind::Method) {
                methods.push(self.parse_fun_declaration()?);
            } else {
                self.advance();
            }
        }
        self.expect(&TokenKind::RBrace, "'}' after extend body")?;
        Ok(Stmt::Extend {
            class_name: class_name.lexeme,
            methods,
            line: class_name.line,
        })
    }

    fn parse_native_declaration(&mut self) -> ParseResult<Stmt> {
        self.expect(&TokenKind::Fun, "'fun' after 'native'")?;
        let name = self.consume_identifier("function name")?;
        self.expect(&TokenKind::LParen, "'(' after function name")?;

        let mut params = Vec::new();
        if !self.check(&TokenKind::RParen) {
            loop {
                let param = self.consume_identifier("parameter name")?;
                params.push(param.lexeme);
                if self.eat(&TokenKind::Colon) {
                    self.consume_identifier("parameter type")?;
                }
                if !self.eat(&TokenKind::Comma) {
                    break;
                }
            }
        }
        self.expect(&TokenKind::RParen, "')' after parameters")?;

        if self.eat(&TokenKind::Arrow) {
            self.consume_identifier("return type")?;
        }

        Ok(Stmt::NativeFun {
            name: name.lexeme,
            params,
            line: name.line,
        })
    }

    // ===== Statements =====

    fn parse_statement(&mut self) -> ParseResult<Stmt> {
        match self.peek().kind {
            TokenKind::If => {
                self.advance();
                self.parse_if_statement()
            }
            TokenKind::When => {
                self.advance();
                self.parse_when_statement()
            }
            TokenKind::Default => {
                self.advance();
                self.parse_default_statement()
            }
            TokenKind::While => {
                self.advance();
                self.parse_while_statement()
            }
            TokenKind::For => {
                self.advance();
                self.parse_for_statement()
            }
            TokenKind::Return => {
                self.advance();
                self.parse_return_statement()
            }
            TokenKind::Try => {
                self.advance();
                self.parse_try_statement()
            }
            TokenKind::Assert => {
                self.advance();
                self.parse_assert_statement()
            }
            TokenKind::Delete => {
                self.advance();
                self.parse_delete_statement()
            }
            TokenKind::LBrace => {
                let line = self.peek().line;
                self.advance();
                let statements = self.parse_block_statements()?;
                Ok(Stmt::Block { statements, line })
            }
            _ => self.parse_expression_statement(),
        }
    }

    fn parse_if_statement(&mut self) -> ParseResult<Stmt> {
        let line = self.previous().line;
        let condition = self.parse_expr()?;
        let then_branch = Box::new(self.parse_branch()?);
        let else_branch = if self.eat(&TokenKind::Else) {
            Some(Box::new(self.parse_branch()?))
        } else {
            None
        };
        Ok(Stmt::If {
            condition,
            then_branch,
            else_branch,
            line,
        })
    }

    /// A branch is either a braced block or a single statement
    fn parse_branch(&mut self) -> ParseResult<Stmt> {
        if self.check(&TokenKind::LBrace) {
            let line = self.peek().line;
            self.advance();
            let statements = self.parse_block_statements()?;
            Ok(Stmt::Block { statements, line })
        } else {
            self.parse_statement()
        }
    }

    fn parse_when_statement(&mut self) -> ParseResult<Stmt> {
        let line = self.previous().line;
        let condition = self.parse_expr()?;
        self.eat(&TokenKind::FatArrow);
        let body = Box::new(self.parse_branch()?);
        Ok(Stmt::When {
            condition,
            body,
            line,
        })
    }

    /// `default => body` is a `when` arm that always runs
    fn parse_default_statement(&mut self) -> ParseResult<Stmt> {
        let line = self.previous().line;
        self.eat(&TokenKind::FatArrow);
        let body = Box::new(self.parse_branch()?);
        Ok(Stmt::When {
            condition: Expr::Literal {
                value: Literal::Bool(true),
                line,
            },
            body,
            line,
        })
    }

    fn parse_while_statement(&mut self) -> ParseResult<Stmt> {
        let line = self.previous().line;
        let condition = self.parse_expr()?;
        self.expect(&TokenKind::LBrace, "'{' before while body")?;
        let body_line = self.previous().line;
        let statements = self.parse_block_statements()?;
        Ok(Stmt::While {
            condition,
            body: Box::new(Stmt::Block {
                statements,
                line: body_line,
            }),
            line,
        })
    }

    fn parse_for_statement(&mut self) -> ParseResult<Stmt> {
        let name = self.consume_identifier("loop variable name")?;
        self.expect(&TokenKind::In, "'in' after loop variable")?;
        let iterable = self.parse_expr()?;
        self.expect(&TokenKind::LBrace, "'{' before for body")?;
        let body_line = self.previous().line;
        let statements = self.parse_block_statements()?;
        Ok(Stmt::For {
            name: name.lexeme,
            iterable,
            body: Box::new(Stmt::Block {
                statements,
                line: body_line,
            }),
            line: name.line,
        })
    }

    fn parse_return_statement(&mut self) -> ParseResult<Stmt> {
        let line = self.previous().line;
        let value = if !self.check(&TokenKind::RBrace)
            && !self.check(&TokenKind::Else)
            && !self.is_at_end()
        {
            Some(self.parse_expr()?)
        } else {
            None
        };
        Ok(Stmt::Return { value, line })
    }

    fn parse_try_statement(&mut self) -> ParseResult<Stmt> {
        let line = self.previous().line;
        self.expect(&TokenKind::LBrace, "'{' after 'try'")?;
        let body = self.parse_block_statements()?;
        self.expect(&TokenKind::Catch, "'catch' after 'try' block")?;

        let catch_var = if Self::is_identifier_like(&self.peek().kind) {
            Some(self.advance().lexeme.clone())
        } else {
            None
        };

        self.expect(&TokenKind::LBrace, "'{' before catch body")?;
        let catch_body = self.parse_block_statements()?;
        Ok(Stmt::Try {
            body,
            catch_var,
            catch_body,
            line,
        })
    }

    fn parse_assert_statement(&mut self) -> ParseResult<Stmt> {
        let line = self.previous().line;
        let expr = self.parse_expr()?;
        Ok(Stmt::Assert { expr, line })
    }

    /// `delete` only applies to index expressions: `delete map[key]`
    fn parse_delete_statement(&mut self) -> ParseResult<Stmt> {
        let line = self.previous().line;
        let expr = self.parse_expr()?;
        match expr {
            Expr::Index { object, index, line } => Ok(Stmt::Delete {
                object: *object,
                key: *index,
                line,
            }),
            _ => Err(ParseError::at_line(
                "Expected index expression after 'delete'",
                line,
            )),
        }
    }

    fn parse_expression_statement(&mut self) -> ParseResult<Stmt> {
        let expr = self.parse_expr()?;
        let line = expr.line();

        // An '=' after a parsed expression turns it into an assignment
        if self.eat(&TokenKind::Eq) {
            let value = self.parse_expr()?;
            return match expr {
                Expr::Variable { name, line } => Ok(Stmt::Assign { name, value, line }),
                Expr::Get { object, name, line } => Ok(Stmt::Expr {
                    expr: Expr::Set {
                        object,
                        name,
                        value: Box::new(value),
                        line,
                    },
                    line,
                }),
                Expr::Index { object, index, line } => Ok(Stmt::Expr {
                    expr: Expr::IndexSet {
                        object,
                        index,
                        value: Box::new(value),
                        line,
                    },
                    line,
                }),
                _ => Err(ParseError::at_line("Invalid assignment target", line)),
            };
        }

        Ok(Stmt::Expr { expr, line })
    }

    /// Parse statements up to and including the closing '}'
    fn parse_block_statements(&mut self) -> ParseResult<Vec<Stmt>> {
        let mut statements = Vec::new();
        while !self.check(&TokenKind::RBrace) && !self.is_at_end() {
            if self.eat(&TokenKind::Semi) {
                continue;
            }
            statements.push(self.parse_declaration()?);
        }
        self.expect(&TokenKind::RBrace, "'}' after block")?;
        Ok(statements)
    }

    // ===== Expressions =====

    pub fn parse_expr(&mut self) -> ParseResult<Expr> {
        self.parse_expr_with_precedence(1)
    }

    /// Parse expression with operator precedence climbing
    fn parse_expr_with_precedence(&mut self, min_precedence: u8) -> ParseResult<Expr> {
        let mut left = self.parse_unary()?;

        while let Some((op, precedence)) = self.current_binary_op() {
            if precedence < min_precedence {
                break;
            }
            let line = self.peek().line;
            self.advance();
            let right = self.parse_expr_with_precedence(precedence + 1)?;
            left = Expr::Binary {
                op,
                left: Box::new(left),
                right: Box::new(right),
                line,
            };
        }

        Ok(left)
    }

    fn parse_unary(&mut self) -> ParseResult<Expr> {
        match self.peek().kind {
            TokenKind::Not => {
                let line = self.peek().line;
                self.advance();
                let operand = self.parse_unary()?;
                Ok(Expr::Unary {
                    op: UnaryOp::Not,
                    operand: Box::new(operand),
                    line,
                })
            }
            TokenKind::Minus => {
                let line = self.peek().line;
                self.advance();
                let operand = self.parse_unary()?;
                Ok(Expr::Unary {
                    op: UnaryOp::Neg,
                    operand: Box::new(operand),
                    line,
                })
            }
            _ => {
                let primary = self.parse_primary()?;
                self.parse_postfix(primary)
            }
        }
    }

    /// Parse postfix operators: calls, member access, indexing
    fn parse_postfix(&mut self, mut expr: Expr) -> ParseResult<Expr> {
        loop {
            match self.peek().kind {
                TokenKind::LParen => {
                    let line = self.peek().line;
                    self.advance();
                    let mut args = Vec::new();
                    if !self.check(&TokenKind::RParen) {
                        loop {
                            args.push(self.parse_expr()?);
                            if !self.eat(&TokenKind::Comma) {
                                break;
                            }
                        }
                    }
                    self.expect(&TokenKind::RParen, "')' after arguments")?;
                    expr = Expr::Call {
                        callee: Box::new(expr),
                        args,
                        line,
                    };
                }
                TokenKind::Dot => {
                    self.advance();
                    let name = self.consume_identifier("property name")?;
                    expr = Expr::Get {
                        object: Box::new(expr),
                        name: name.lexeme,
                        line: name.line,
                    };
                }
                TokenKind::LBracket => {
                    let line = self.peek().line;
                    self.advance();
                    let index = self.parse_expr()?;
                    self.expect(&TokenKind::RBracket, "']' after index")?;
                    expr = Expr::Index {
                        object: Box::new(expr),
                        index: Box::new(index),
                        line,
                    };
                }
                _ => break,
            }
        }
        Ok(expr)
    }

    fn parse_primary(&mut self) -> ParseResult<Expr> {
        let line = self.peek().line;

        match self.peek().kind.clone() {
            TokenKind::True => {
                self.advance();
                Ok(Expr::Literal {
                    value: Literal::Bool(true),
                    line,
                })
            }
            TokenKind::False => {
                self.advance();
                Ok(Expr::Literal {
                    value: Literal::Bool(false),
                    line,
                })
            }
            TokenKind::Null => {
                self.advance();
                Ok(Expr::Literal {
                    value: Literal::Null,
                    line,
                })
            }
            TokenKind::Number(n) => {
                self.advance();
                Ok(Expr::Literal {
                    value: Literal::Number(n),
                    line,
                })
            }
            TokenKind::Str(s) => {
                self.advance();
                Ok(Expr::Literal {
                    value: Literal::Str(s),
                    line,
                })
            }
            TokenKind::Ident(name) => {
                self.advance();
                // `Uppercase {` begins an object literal
                let is_class_name = name.chars().next().is_some_and(|c| c.is_uppercase());
                if is_class_name && self.check(&TokenKind::LBrace) {
                    self.parse_object_literal(name, line)
                } else {
                    Ok(Expr::Variable { name, line })
                }
            }
            TokenKind::LParen => {
                self.advance();
                let expr = self.parse_expr()?;
                self.expect(&TokenKind::RParen, "')' after expression")?;
                Ok(expr)
            }
            TokenKind::LBracket => {
                self.advance();
                let mut items = Vec::new();
                if !self.check(&TokenKind::RBracket) {
                    loop {
                        items.push(self.parse_expr()?);
                        if !self.eat(&TokenKind::Comma) {
                            break;
                        }
                    }
                }
                self.expect(&TokenKind::RBracket, "']' after list")?;
                Ok(Expr::ListLit { items, line })
            }
            TokenKind::LBrace => {
                self.advance();
                let mut entries = Vec::new();
                if !self.check(&TokenKind::RBrace) {
                    loop {
                        let (key, _) = self.expect_string("map key")?;
                        self.expect(&TokenKind::Colon, "':' after map key")?;
                        let value = self.parse_expr()?;
                        entries.push((key, value));
                        if !self.eat(&TokenKind::Comma) {
                            break;
                        }
                    }
                }
                self.expect(&TokenKind::RBrace, "'}' after map")?;
                Ok(Expr::MapLit { entries, line })
            }
            TokenKind::Fun => {
                self.advance();
                self.parse_lambda(line)
            }
            TokenKind::If => {
                self.advance();
                self.parse_if_expr(line)
            }
            _ => Err(ParseError::expected("expression", self.peek())),
        }
    }

    fn parse_object_literal(&mut self, class_name: String, line: u32) -> ParseResult<Expr> {
        self.expect(&TokenKind::LBrace, "'{' after class name")?;
        let mut fields = Vec::new();
        if !self.check(&TokenKind::RBrace) {
            loop {
                let field_name = self.consume_identifier("field name")?;
                self.expect(&TokenKind::Colon, "':' after field name")?;
                let value = self.parse_expr()?;
                fields.push((field_name.lexeme, value));
                if !self.eat(&TokenKind::Comma) {
                    break;
                }
            }
        }
        self.expect(&TokenKind::RBrace, "'}' after object fields")?;
        Ok(Expr::ObjectLit {
            class_name,
            fields,
            line,
        })
    }

    fn parse_lambda(&mut self, line: u32) -> ParseResult<Expr> {
        self.expect(&TokenKind::LParen, "'(' for lambda parameters")?;
        let mut params = Vec::new();
        if !self.check(&TokenKind::RParen) {
            loop {
                let param = self.consume_identifier("parameter name")?;
                params.push(param.lexeme);
                if !self.eat(&TokenKind::Comma) {
                    break;
                }
            }
        }
        self.expect(&TokenKind::RParen, "')' after lambda parameters")?;
        self.expect(&TokenKind::LBrace, "'{' before lambda body")?;
        let body = self.parse_block_statements()?;
        Ok(Expr::Lambda {
            params,
            body: std::rc::Rc::new(body),
            line,
        })
    }

    /// `if cond then a else b` as an expression
    fn parse_if_expr(&mut self, line: u32) -> ParseResult<Expr> {
        let condition = self.parse_expr()?;
        let kw = self.consume_identifier("'then'")?;
        if kw.lexeme != "then" {
            return Err(ParseError::at_line("Expected 'then' after condition", kw.line));
        }
        let then_branch = self.parse_expr()?;
        self.expect(&TokenKind::Else, "'else' in if expression")?;
        let else_branch = self.parse_expr()?;
        Ok(Expr::IfElse {
            condition: Box::new(condition),
            then_branch: Box::new(then_branch),
            else_branch: Box::new(else_branch),
            line,
        })
    }

    /// Get the current binary operator and its precedence
    fn current_binary_op(&self) -> Option<(BinaryOp, u8)> {
        let (op, prec) = match self.peek().kind {
            TokenKind::Or => (BinaryOp::Or, 1),
            TokenKind::And => (BinaryOp::And, 2),
            TokenKind::EqEq => (BinaryOp::Eq, 3),
            TokenKind::NotEq => (BinaryOp::Ne, 3),
            TokenKind::Lt => (BinaryOp::Lt, 4),
            TokenKind::LtEq => (BinaryOp::Le, 4),
            TokenKind::Gt => (BinaryOp::Gt, 4),
            TokenKind::GtEq => (BinaryOp::Ge, 4),
            TokenKind::In => (BinaryOp::In, 4),
            TokenKind::Plus => (BinaryOp::Add, 5),
            TokenKind::Minus => (BinaryOp::Sub, 5),
            TokenKind::Star => (BinaryOp::Mul, 6),
            TokenKind::Slash => (BinaryOp::Div, 6),
            TokenKind::Percent => (BinaryOp::Mod, 6),
            _ => return None,
        };
        Some((op, prec))
    }

    // ===== Helpers =====

    fn peek(&self) -> &Token {
        &self.tokens[self.current]
    }

    fn previous(&self) -> &Token {
        &self.tokens[self.current.saturating_sub(1)]
    }

    fn is_at_end(&self) -> bool {
        self.peek().kind == TokenKind::Eof
    }

    fn advance(&mut self) -> &Token {
        if !self.is_at_end() {
            self.current += 1;
        }
        self.previous()
    }

    fn check(&self, kind: &TokenKind) -> bool {
        &self.peek().kind == kind
    }

    /// Consume the token if it matches; returns whether it did
    fn eat(&mut self, kind: &TokenKind) -> bool {
        if self.check(kind) {
            self.advance();
            true
        } else {
            false
        }
    }

    fn expect(&mut self, kind: &TokenKind, what: &str) -> ParseResult<Token> {
        if self.check(kind) {
            Ok(self.advance().clone())
        } else {
            Err(ParseError::expected(what, self.peek()))
        }
    }

    fn expect_plain_identifier(&mut self, what: &str) -> ParseResult<Token> {
        if matches!(self.peek().kind, TokenKind::Ident(_)) {
            Ok(self.advance().clone())
        } else {
            Err(ParseError::expected(what, self.peek()))
        }
    }

    fn expect_string(&mut self, what: &str) -> ParseResult<(String, u32)> {
        if let TokenKind::Str(s) = &self.peek().kind {
            let value = s.clone();
            let line = self.peek().line;
            self.advance();
            Ok((value, line))
        } else {
            Err(ParseError::expected(what, self.peek()))
        }
    }

    /// Consume a name position token. Most keywords double as identifiers
    /// here so programs can use names like `type`, `from`, or `test` for
    /// fields and parameters.
    fn consume_identifier(&mut self, what: &str) -> ParseResult<Token> {
        if Self::is_identifier_like(&self.peek().kind) {
            Ok(self.advance().clone())
        } else {
            Err(ParseError::expected(what, self.peek()))
        }
    }

    fn is_identifier_like(kind: &TokenKind) -> bool {
        matches!(
            kind,
            TokenKind::Ident(_)
                | TokenKind::Type
                | TokenKind::Null
                | TokenKind::Bool
                | TokenKind::List
                | TokenKind::Map
                | TokenKind::Native
                | TokenKind::Default
                | TokenKind::In
                | TokenKind::Test
                | TokenKind::Assert
                | TokenKind::Try
                | TokenKind::Catch
                | TokenKind::Delete
                | TokenKind::Var
                | TokenKind::Const
                | TokenKind::If
                | TokenKind::Else
                | TokenKind::While
                | TokenKind::For
                | TokenKind::Return
                | TokenKind::Export
                | TokenKind::Import
                | TokenKind::From
                | TokenKind::As
                | TokenKind::Fun
                | TokenKind::Method
                | TokenKind::Field
        )
    }

    /// Skip tokens until a likely statement boundary
    fn synchronize(&mut self) {
        if self.is_at_end() {
            return;
        }
        self.advance();
        while !self.is_at_end() {
            if self.previous().kind == TokenKind::Semi {
                return;
            }
            match self.peek().kind {
                TokenKind::Class
                | TokenKind::Fun
                | TokenKind::Var
                | TokenKind::For
                | TokenKind::If
                | TokenKind::While
                | TokenKind::Return
                | TokenKind::Method
                | TokenKind::Field => return,
                _ => {
                    self.advance();
                }
            }
        }
    }
}

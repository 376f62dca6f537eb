//! Lexer for the Somnia language
//!
//! Converts source text into a stream of tokens with line tracking. The lexer
//! fails fast: the first lexical error aborts tokenization of the file.

use std::fmt;

use crate::error::LexError;

/// Token kinds in the Somnia language
#[derive(Debug, Clone, PartialEq)]
pub enum TokenKind {
    // Literals
    Number(f64),
    Str(String),
    Ident(String),

    // Keywords
    Var,
    Fun,
    Class,
    Method,
    Field,
    Extend,
    If,
    Else,
    When,
    Default,
    While,
    For,
    In,
    Return,
    And,
    Or,
    Not,
    True,
    False,
    Null,
    Import,
    Export,
    From,
    As,
    Type,
    Const,
    Test,
    Assert,
    Try,
    Catch,
    Native,
    Delete,
    Bool,
    List,
    Map,

    // Operators
    Plus,     // +
    Minus,    // -
    Star,     // *
    Slash,    // /
    Percent,  // %
    Caret,    // ^
    Eq,       // =
    EqEq,     // ==
    NotEq,    // !=
    Lt,       // <
    LtEq,     // <=
    Gt,       // >
    GtEq,     // >=
    Arrow,    // ->
    FatArrow, // =>

    // Delimiters
    LParen,   // (
    RParen,   // )
    LBrace,   // {
    RBrace,   // }
    LBracket, // [
    RBracket, // ]

    // Punctuation
    Comma,    // ,
    Dot,      // .
    Colon,    // :
    Semi,     // ;
    Question, // ?

    // End of file
    Eof,
}

impl TokenKind {
    /// Keyword lookup for identifier-shaped lexemes
    fn keyword(word: &str) -> Option<TokenKind> {
        let kind = match word {
            "var" => TokenKind::Var,
            "fun" => TokenKind::Fun,
            "class" => TokenKind::Class,
            "method" => TokenKind::Method,
            "field" => TokenKind::Field,
            "extend" => TokenKind::Extend,
            "if" => TokenKind::If,
            "else" => TokenKind::Else,
            "when" => TokenKind::When,
            "default" => TokenKind::Default,
            "while" => TokenKind::While,
            "for" => TokenKind::For,
            "in" => TokenKind::In,
            "return" => TokenKind::Return,
            "and" => TokenKind::And,
            "or" => TokenKind::Or,
            "not" => TokenKind::Not,
            "true" => TokenKind::True,
            "false" => TokenKind::False,
            "null" => TokenKind::Null,
            "import" => TokenKind::Import,
            "export" => TokenKind::Export,
            "from" => TokenKind::From,
            "as" => TokenKind::As,
            "type" => TokenKind::Type,
            "const" => TokenKind::Const,
            "test" => TokenKind::Test,
            "assert" => TokenKind::Assert,
            "try" => TokenKind::Try,
            "catch" => TokenKind::Catch,
            "native" => TokenKind::Native,
            "delete" => TokenKind::Delete,
            "bool" => TokenKind::Bool,
            "list" => TokenKind::List,
            "map" => TokenKind::Map,
            _ => return None,
        };
        Some(kind)
    }
}

impl fmt::Display for TokenKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TokenKind::Number(n) => write!(f, "number '{}'", n),
            TokenKind::Str(s) => write!(f, "string \"{}\"", s),
            TokenKind::Ident(s) => write!(f, "identifier '{}'", s),
            TokenKind::Var => write!(f, "'var'"),
            TokenKind::Fun => write!(f, "'fun'"),
            TokenKind::Class => write!(f, "'class'"),
            TokenKind::Method => write!(f, "'method'"),
            TokenKind::Field => write!(f, "'field'"),
            TokenKind::Extend => write!(f, "'extend'"),
            TokenKind::If => write!(f, "'if'"),
            TokenKind::Else => write!(f, "'else'"),
            TokenKind::When => write!(f, "'when'"),
            TokenKind::Default => write!(f, "'default'"),
            TokenKind::While => write!(f, "'while'"),
            TokenKind::For => write!(f, "'for'"),
            TokenKind::In => write!(f, "'in'"),
            TokenKind::Return => write!(f, "'return'"),
            TokenKind::And => write!(f, "'and'"),
            TokenKind::Or => write!(f, "'or'"),
            TokenKind::Not => write!(f, "'not'"),
            TokenKind::True => write!(f, "'true'"),
            TokenKind::False => write!(f, "'false'"),
            TokenKind::Null => write!(f, "'null'"),
            TokenKind::Import => write!(f, "'import'"),
            TokenKind::Export => write!(f, "'export'"),
            TokenKind::From => write!(f, "'from'"),
            TokenKind::As => write!(f, "'as'"),
            TokenKind::Type => write!(f, "'type'"),
            TokenKind::Const => write!(f, "'const'"),
            TokenKind::Test => write!(f, "'test'"),
            TokenKind::Assert => write!(f, "'assert'"),
            TokenKind::Try => write!(f, "'try'"),
            TokenKind::Catch => write!(f, "'catch'"),
            TokenKind::Native => write!(f, "'native'"),
            TokenKind::Delete => write!(f, "'delete'"),
            TokenKind::Bool => write!(f, "'bool'"),
            TokenKind::List => write!(f, "'list'"),
            TokenKind::Map => write!(f, "'map'"),
            TokenKind::Plus => write!(f, "'+'"),
            TokenKind::Minus => write!(f, "'-'"),
            TokenKind::Star => write!(f, "'*'"),
            TokenKind::Slash => write!(f, "'/'"),
            TokenKind::Percent => write!(f, "'%'"),
            TokenKind::Caret => write!(f, "'^'"),
            TokenKind::Eq => write!(f, "'='"),
            TokenKind::EqEq => write!(f, "'=='"),
            TokenKind::NotEq => write!(f, "'!='"),
            TokenKind::Lt => write!(f, "'<'"),
            TokenKind::LtEq => write!(f, "'<='"),
            TokenKind::Gt => write!(f, "'>'"),
            TokenKind::GtEq => write!(f, "'>='"),
            TokenKind::Arrow => write!(f, "'->'"),
            TokenKind::FatArrow => write!(f, "'=>'"),
            TokenKind::LParen => write!(f, "'('"),
            TokenKind::RParen => write!(f, "')'"),
            TokenKind::LBrace => write!(f, "'{{'"),
            TokenKind::RBrace => write!(f, "'}}'"),
            TokenKind::LBracket => write!(f, "'['"),
            TokenKind::RBracket => write!(f, "']'"),
            TokenKind::Comma => write!(f, "','"),
            TokenKind::Dot => write!(f, "'.'"),
            TokenKind::Colon => write!(f, "':'"),
            TokenKind::Semi => write!(f, "';'"),
            TokenKind::Question => write!(f, "'?'"),
            TokenKind::Eof => write!(f, "end of file"),
        }
    }
}

/// A token with its kind, original lexeme, and source line (1-indexed)
#[derive(Debug, Clone, PartialEq)]
pub struct Token {
    pub kind: TokenKind,
    pub lexeme: String,
    pub line: u32,
}

impl Token {
    pub fn new(kind: TokenKind, lexeme: impl Into<String>, line: u32) -> Self {
        Token {
            kind,
            lexeme: lexeme.into(),
            line,
        }
    }
}

/// The lexer tokenizes Somnia source code
pub struct Lexer<'a> {
    chars: std::str::Chars<'a>,
    current: Option<char>,
    line: u32,
}

impl<'a> Lexer<'a> {
    /// Create a new lexer for the given source
    pub fn new(source: &'a str) -> Self {
        let mut chars = source.chars();
        let current = chars.next();
        Lexer {
            chars,
            current,
            line: 1,
        }
    }

    /// Tokenize the whole source, ending with an `Eof` token
    pub fn tokenize(mut self) -> Result<Vec<Token>, LexError> {
        let mut tokens = Vec::new();
        loop {
            let tok = self.next_token()?;
            let done = tok.kind == TokenKind::Eof;
            tokens.push(tok);
            if done {
                return Ok(tokens);
            }
        }
    }

    /// Get the next token
    pub fn next_token(&mut self) -> Result<Token, LexError> {
        self.skip_whitespace_and_comments();
        let line = self.line;

        let Some(ch) = self.current else {
            return Ok(Token::new(TokenKind::Eof, "", line));
        };

        match ch {
            '(' => Ok(self.single_char_token(TokenKind::LParen, "(")),
            ')' => Ok(self.single_char_token(TokenKind::RParen, ")")),
            '{' => Ok(self.single_char_token(TokenKind::LBrace, "{")),
            '}' => Ok(self.single_char_token(TokenKind::RBrace, "}")),
            '[' => Ok(self.single_char_token(TokenKind::LBracket, "[")),
            ']' => Ok(self.single_char_token(TokenKind::RBracket, "]")),
            ',' => Ok(self.single_char_token(TokenKind::Comma, ",")),
            '.' => Ok(self.single_char_token(TokenKind::Dot, ".")),
            ':' => Ok(self.single_char_token(TokenKind::Colon, ":")),
            ';' => Ok(self.single_char_token(TokenKind::Semi, ";")),
            '?' => Ok(self.single_char_token(TokenKind::Question, "?")),
            '+' => Ok(self.single_char_token(TokenKind::Plus, "+")),
            '*' => Ok(self.single_char_token(TokenKind::Star, "*")),
            '/' => Ok(self.single_char_token(TokenKind::Slash, "/")),
            '%' => Ok(self.single_char_token(TokenKind::Percent, "%")),
            '^' => Ok(self.single_char_token(TokenKind::Caret, "^")),

            '-' => {
                self.advance();
                if self.current == Some('>') {
                    self.advance();
                    Ok(Token::new(TokenKind::Arrow, "->", line))
                } else {
                    Ok(Token::new(TokenKind::Minus, "-", line))
                }
            }

            '=' => {
                self.advance();
                match self.current {
                    Some('=') => {
                        self.advance();
                        Ok(Token::new(TokenKind::EqEq, "==", line))
                    }
                    Some('>') => {
                        self.advance();
                        Ok(Token::new(TokenKind::FatArrow, "=>", line))
                    }
                    _ => Ok(Token::new(TokenKind::Eq, "=", line)),
                }
            }

            // Negation is spelled `not`; bare '!' is not a token
            '!' => {
                self.advance();
                if self.current == Some('=') {
                    self.advance();
                    Ok(Token::new(TokenKind::NotEq, "!=", line))
                } else {
                    Err(LexError::UnexpectedChar { ch: '!', line })
                }
            }

            '<' => {
                self.advance();
                if self.current == Some('=') {
                    self.advance();
                    Ok(Token::new(TokenKind::LtEq, "<=", line))
                } else {
                    Ok(Token::new(TokenKind::Lt, "<", line))
                }
            }

            '>' => {
                self.advance();
                if self.current == Some('=') {
                    self.advance();
                    Ok(Token::new(TokenKind::GtEq, ">=", line))
                } else {
                    Ok(Token::new(TokenKind::Gt, ">", line))
                }
            }

            '"' => self.lex_string(),
            '0'..='9' => Ok(self.lex_number()),
            'a'..='z' | 'A'..='Z' | '_' => Ok(self.lex_ident()),

            _ => Err(LexError::UnexpectedChar { ch, line }),
        }
    }

    /// Advance to the next character
    fn advance(&mut self) {
        if self.current == Some('\n') {
            self.line += 1;
        }
        self.current = self.chars.next();
    }

    /// Peek at the next character without advancing
    fn peek(&self) -> Option<char> {
        self.chars.clone().next()
    }

    /// Skip whitespace and `#` line comments
    fn skip_whitespace_and_comments(&mut self) {
        loop {
            match self.current {
                Some(' ') | Some('\t') | Some('\r') | Some('\n') => self.advance(),
                Some('#') => {
                    while self.current.is_some() && self.current != Some('\n') {
                        self.advance();
                    }
                }
                _ => break,
            }
        }
    }

    /// Consume a single character and create a token
    fn single_char_token(&mut self, kind: TokenKind, lexeme: &str) -> Token {
        let line = self.line;
        self.advance();
        Token::new(kind, lexeme, line)
    }

    /// Lex a double-quoted string literal with escape sequences
    fn lex_string(&mut self) -> Result<Token, LexError> {
        let start_line = self.line;
        self.advance(); // opening quote
        let mut value = String::new();

        loop {
            match self.current {
                None => return Err(LexError::UnterminatedString { line: start_line }),
                Some('"') => {
                    self.advance();
                    break;
                }
                Some('\\') => {
                    self.advance();
                    match self.current {
                        Some('n') => value.push('\n'),
                        Some('t') => value.push('\t'),
                        Some('"') => value.push('"'),
                        Some('\\') => value.push('\\'),
                        Some(ch) => value.push(ch), // unknown escape, keep as-is
                        None => return Err(LexError::UnterminatedString { line: start_line }),
                    }
                    self.advance();
                }
                Some(ch) => {
                    value.push(ch);
                    self.advance();
                }
            }
        }

        let lexeme = value.clone();
        Ok(Token::new(TokenKind::Str(value), lexeme, start_line))
    }

    /// Lex a number literal; every number is a 64-bit float
    fn lex_number(&mut self) -> Token {
        let line = self.line;
        let mut value = String::new();

        while let Some('0'..='9') = self.current {
            value.push(self.current.unwrap_or_default());
            self.advance();
        }

        if self.current == Some('.') && matches!(self.peek(), Some('0'..='9')) {
            value.push('.');
            self.advance();
            while let Some('0'..='9') = self.current {
                value.push(self.current.unwrap_or_default());
                self.advance();
            }
        }

        let num = value.parse::<f64>().unwrap_or(0.0);
        Token::new(TokenKind::Number(num), value, line)
    }

    /// Lex an identifier or keyword
    fn lex_ident(&mut self) -> Token {
        let line = self.line;
        let mut value = String::new();

        while let Some(ch) = self.current {
            if ch.is_alphanumeric() || ch == '_' {
                value.push(ch);
                self.advance();
            } else {
                break;
            }
        }

        let kind = TokenKind::keyword(&value).unwrap_or_else(|| TokenKind::Ident(value.clone()));
        Token::new(kind, value, line)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn lex_all(source: &str) -> Vec<Token> {
        Lexer::new(source).tokenize().unwrap()
    }

    fn kinds(tokens: &[Token]) -> Vec<TokenKind> {
        tokens.iter().map(|t| t.kind.clone()).collect()
    }

    #[test]
    fn test_empty() {
        assert_eq!(kinds(&lex_all("")), vec![TokenKind::Eof]);
    }

    #[test]
    fn test_whitespace() {
        assert_eq!(kinds(&lex_all("   \t\n\r\n  ")), vec![TokenKind::Eof]);
    }

    #[test]
    fn test_single_char_tokens() {
        assert_eq!(
            kinds(&lex_all("(){}[],.:;?")),
            vec![
                TokenKind::LParen,
                TokenKind::RParen,
                TokenKind::LBrace,
                TokenKind::RBrace,
                TokenKind::LBracket,
                TokenKind::RBracket,
                TokenKind::Comma,
                TokenKind::Dot,
                TokenKind::Colon,
                TokenKind::Semi,
                TokenKind::Question,
                TokenKind::Eof
            ]
        );
    }

    #[test]
    fn test_operators() {
        assert_eq!(
            kinds(&lex_all("+ - * / % ^ = == != < <= > >= -> =>")),
            vec![
                TokenKind::Plus,
                TokenKind::Minus,
                TokenKind::Star,
                TokenKind::Slash,
                TokenKind::Percent,
                TokenKind::Caret,
                TokenKind::Eq,
                TokenKind::EqEq,
                TokenKind::NotEq,
                TokenKind::Lt,
                TokenKind::LtEq,
                TokenKind::Gt,
                TokenKind::GtEq,
                TokenKind::Arrow,
                TokenKind::FatArrow,
                TokenKind::Eof
            ]
        );
    }

    #[test]
    fn test_keywords() {
        assert_eq!(
            kinds(&lex_all("var fun class if else while for in return")),
            vec![
                TokenKind::Var,
                TokenKind::Fun,
                TokenKind::Class,
                TokenKind::If,
                TokenKind::Else,
                TokenKind::While,
                TokenKind::For,
                TokenKind::In,
                TokenKind::Return,
                TokenKind::Eof
            ]
        );
        assert_eq!(
            kinds(&lex_all("when default test assert try catch native delete")),
            vec![
                TokenKind::When,
                TokenKind::Default,
                TokenKind::Test,
                TokenKind::Assert,
                TokenKind::Try,
                TokenKind::Catch,
                TokenKind::Native,
                TokenKind::Delete,
                TokenKind::Eof
            ]
        );
    }

    #[test]
    fn test_identifiers() {
        assert_eq!(
            kinds(&lex_all("foo _bar baz123 MyClass")),
            vec![
                TokenKind::Ident("foo".to_string()),
                TokenKind::Ident("_bar".to_string()),
                TokenKind::Ident("baz123".to_string()),
                TokenKind::Ident("MyClass".to_string()),
                TokenKind::Eof
            ]
        );
    }

    #[test]
    fn test_numbers() {
        assert_eq!(
            kinds(&lex_all("0 42 3.15 0.5")),
            vec![
                TokenKind::Number(0.0),
                TokenKind::Number(42.0),
                TokenKind::Number(3.15),
                TokenKind::Number(0.5),
                TokenKind::Eof
            ]
        );
    }

    #[test]
    fn test_number_then_dot() {
        // `1.foo` is a number followed by member access, not a float
        assert_eq!(
            kinds(&lex_all("1.foo")),
            vec![
                TokenKind::Number(1.0),
                TokenKind::Dot,
                TokenKind::Ident("foo".to_string()),
                TokenKind::Eof
            ]
        );
    }

    #[test]
    fn test_strings() {
        assert_eq!(
            kinds(&lex_all(r#""hello" "wo rld""#)),
            vec![
                TokenKind::Str("hello".to_string()),
                TokenKind::Str("wo rld".to_string()),
                TokenKind::Eof
            ]
        );
    }

    #[test]
    fn test_string_escapes() {
        assert_eq!(
            kinds(&lex_all(r#""a\nb" "t\tab" "q\"uote" "back\\slash""#)),
            vec![
                TokenKind::Str("a\nb".to_string()),
                TokenKind::Str("t\tab".to_string()),
                TokenKind::Str("q\"uote".to_string()),
                TokenKind::Str("back\\slash".to_string()),
                TokenKind::Eof
            ]
        );
    }

    #[test]
    fn test_unterminated_string() {
        let err = Lexer::new("\"oops").tokenize().unwrap_err();
        assert_eq!(err, LexError::UnterminatedString { line: 1 });
    }

    #[test]
    fn test_bare_bang_is_error() {
        let err = Lexer::new("!x").tokenize().unwrap_err();
        assert_eq!(err, LexError::UnexpectedChar { ch: '!', line: 1 });
    }

    #[test]
    fn test_unexpected_char() {
        let err = Lexer::new("var x = @").tokenize().unwrap_err();
        assert_eq!(err, LexError::UnexpectedChar { ch: '@', line: 1 });
    }

    #[test]
    fn test_line_comment() {
        assert_eq!(
            kinds(&lex_all("foo # comment with var fun\nbar")),
            vec![
                TokenKind::Ident("foo".to_string()),
                TokenKind::Ident("bar".to_string()),
                TokenKind::Eof
            ]
        );
    }

    #[test]
    fn test_line_tracking() {
        let tokens = lex_all("foo\nbar\n\nbaz");
        assert_eq!(tokens[0].line, 1);
        assert_eq!(tokens[1].line, 2);
        assert_eq!(tokens[2].line, 4);
    }

    #[test]
    fn test_var_declaration() {
        assert_eq!(
            kinds(&lex_all("var x = 5")),
            vec![
                TokenKind::Var,
                TokenKind::Ident("x".to_string()),
                TokenKind::Eq,
                TokenKind::Number(5.0),
                TokenKind::Eof
            ]
        );
    }

    #[test]
    fn test_lexeme_preserved() {
        let tokens = lex_all("count == 10");
        assert_eq!(tokens[0].lexeme, "count");
        assert_eq!(tokens[1].lexeme, "==");
        assert_eq!(tokens[2].lexeme, "10");
    }

    #[test]
    fn test_complex_expression() {
        assert_eq!(
            kinds(&lex_all("a.b[0] and not c")),
            vec![
                TokenKind::Ident("a".to_string()),
                TokenKind::Dot,
                TokenKind::Ident("b".to_string()),
                TokenKind::LBracket,
                TokenKind::Number(0.0),
                TokenKind::RBracket,
                TokenKind::And,
                TokenKind::Not,
                TokenKind::Ident("c".to_string()),
                TokenKind::Eof
            ]
        );
    }
}

//! Tokenizer for Ferro source text.
//!
//! A streaming scanner with single-character lookahead. Whitespace and
//! comments (`// ...` and non-nesting `/* ... */`) are skipped. Multi-character
//! operators are tried before their single-character prefixes, so `==` wins
//! over `=`, `->` over `-`, and `..` over `.`.

use std::fmt;

/// Token categories. Keywords keep their spelling in the token's lexeme.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TokenKind {
    Keyword,
    Ident,
    Int,
    Str,
    Assign,
    Plus,
    Minus,
    Star,
    Slash,
    Percent,
    Eq,
    Ne,
    Lt,
    Le,
    Gt,
    Ge,
    LParen,
    RParen,
    LBrace,
    RBrace,
    LBracket,
    RBracket,
    Semi,
    Colon,
    Comma,
    Arrow,
    Dot,
    DotDot,
    Amp,
    Bang,
    Eof,
}

/// Reserved words; an identifier matching one of these becomes a `Keyword`.
pub const KEYWORDS: &[&str] = &[
    "fn", "let", "mut", "if", "else", "while", "for", "in", "loop", "break", "continue", "return",
    "true", "false", "i32", "bool",
];

/// One lexical token with its 1-based source position.
#[derive(Debug, Clone, PartialEq)]
pub struct Token {
    pub kind: TokenKind,
    /// Original text, or the canonical value for numbers and strings
    /// (digits without leading zeros; string contents with escapes applied).
    pub lexeme: String,
    pub line: u32,
    pub column: u32,
}

impl Token {
    fn new(kind: TokenKind, lexeme: impl Into<String>, line: u32, column: u32) -> Self {
        Token {
            kind,
            lexeme: lexeme.into(),
            line,
            column,
        }
    }

    pub fn is_keyword(&self, word: &str) -> bool {
        self.kind == TokenKind::Keyword && self.lexeme == word
    }
}

/// A fatal lexical error: unknown character, unterminated string, or an
/// integer literal that does not fit in `i32`.
#[derive(Debug, Clone, PartialEq)]
pub struct LexError {
    pub message: String,
    pub line: u32,
    pub column: u32,
}

impl fmt::Display for LexError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "Error at line {}, column {}: {}",
            self.line, self.column, self.message
        )
    }
}

impl std::error::Error for LexError {}

pub struct Lexer {
    chars: Vec<char>,
    pos: usize,
    line: u32,
    column: u32,
}

impl Lexer {
    pub fn new(source: &str) -> Self {
        Lexer {
            chars: source.chars().collect(),
            pos: 0,
            line: 1,
            column: 1,
        }
    }

    /// Scan the whole input into a token list terminated by one `Eof` token.
    pub fn tokenize(mut self) -> Result<Vec<Token>, LexError> {
        let mut tokens = Vec::new();
        loop {
            let token = self.next_token()?;
            let done = token.kind == TokenKind::Eof;
            tokens.push(token);
            if done {
                return Ok(tokens);
            }
        }
    }

    fn current(&self) -> Option<char> {
        self.chars.get(self.pos).copied()
    }

    fn peek(&self) -> Option<char> {
        self.chars.get(self.pos + 1).copied()
    }

    fn advance(&mut self) {
        if self.current() == Some('\n') {
            self.line += 1;
            self.column = 0;
        }
        self.pos += 1;
        self.column += 1;
    }

    fn skip_whitespace(&mut self) {
        while self.current().is_some_and(char::is_whitespace) {
            self.advance();
        }
    }

    /// Skip one comment if positioned at its opener. Block comments do not
    /// nest; an unterminated block comment runs to end of input.
    fn skip_comment(&mut self) -> bool {
        if self.current() == Some('/') && self.peek() == Some('/') {
            while self.current().is_some() && self.current() != Some('\n') {
                self.advance();
            }
            return true;
        }
        if self.current() == Some('/') && self.peek() == Some('*') {
            self.advance();
            self.advance();
            while self.current().is_some() {
                if self.current() == Some('*') && self.peek() == Some('/') {
                    self.advance();
                    self.advance();
                    break;
                }
                self.advance();
            }
            return true;
        }
        false
    }

    fn error(&self, message: impl Into<String>, line: u32, column: u32) -> LexError {
        LexError {
            message: message.into(),
            line,
            column,
        }
    }

    fn number(&mut self) -> Result<Token, LexError> {
        let (line, start_col) = (self.line, self.column);
        let mut digits = String::new();
        while let Some(c) = self.current() {
            if !c.is_ascii_digit() {
                break;
            }
            digits.push(c);
            self.advance();
        }
        let value: i32 = digits.parse().map_err(|_| {
            self.error(
                format!("Integer literal '{}' does not fit in i32", digits),
                line,
                start_col,
            )
        })?;
        Ok(Token::new(TokenKind::Int, value.to_string(), line, start_col))
    }

    fn identifier(&mut self) -> Token {
        let (line, start_col) = (self.line, self.column);
        let mut text = String::new();
        while let Some(c) = self.current() {
            if !c.is_alphanumeric() && c != '_' {
                break;
            }
            text.push(c);
            self.advance();
        }
        let kind = if KEYWORDS.contains(&text.as_str()) {
            TokenKind::Keyword
        } else {
            TokenKind::Ident
        };
        Token::new(kind, text, line, start_col)
    }

    fn string(&mut self) -> Result<Token, LexError> {
        let (line, start_col) = (self.line, self.column);
        self.advance(); // opening quote
        let mut value = String::new();
        while let Some(c) = self.current() {
            if c == '"' {
                self.advance();
                return Ok(Token::new(TokenKind::Str, value, line, start_col));
            }
            if c == '\\' {
                self.advance();
                match self.current() {
                    Some('n') => value.push('\n'),
                    Some('t') => value.push('\t'),
                    Some('r') => value.push('\r'),
                    Some('\\') => value.push('\\'),
                    Some('"') => value.push('"'),
                    Some(other) => {
                        // Unknown escape: keep the backslash verbatim.
                        value.push('\\');
                        value.push(other);
                    }
                    None => break,
                }
                self.advance();
            } else {
                value.push(c);
                self.advance();
            }
        }
        Err(self.error("Unterminated string literal", line, start_col))
    }

    fn next_token(&mut self) -> Result<Token, LexError> {
        loop {
            self.skip_whitespace();
            if self.current() == Some('/') && (self.peek() == Some('/') || self.peek() == Some('*'))
            {
                self.skip_comment();
                continue;
            }
            break;
        }

        let (line, col) = (self.line, self.column);
        let Some(c) = self.current() else {
            return Ok(Token::new(TokenKind::Eof, "", line, col));
        };

        if c == '"' {
            return self.string();
        }
        if c.is_ascii_digit() {
            return self.number();
        }
        if c.is_alphabetic() || c == '_' {
            return Ok(self.identifier());
        }

        // Two-character operators before their one-character prefixes.
        let two = |a: char, b: char, lexer: &Self| lexer.current() == Some(a) && lexer.peek() == Some(b);
        let multi = [
            ('=', '=', TokenKind::Eq, "=="),
            ('>', '=', TokenKind::Ge, ">="),
            ('<', '=', TokenKind::Le, "<="),
            ('!', '=', TokenKind::Ne, "!="),
            ('-', '>', TokenKind::Arrow, "->"),
            ('.', '.', TokenKind::DotDot, ".."),
        ];
        for (a, b, kind, text) in multi {
            if two(a, b, self) {
                self.advance();
                self.advance();
                return Ok(Token::new(kind, text, line, col));
            }
        }

        let single = match c {
            '=' => Some((TokenKind::Assign, "=")),
            '+' => Some((TokenKind::Plus, "+")),
            '-' => Some((TokenKind::Minus, "-")),
            '*' => Some((TokenKind::Star, "*")),
            '/' => Some((TokenKind::Slash, "/")),
            '%' => Some((TokenKind::Percent, "%")),
            '>' => Some((TokenKind::Gt, ">")),
            '<' => Some((TokenKind::Lt, "<")),
            '(' => Some((TokenKind::LParen, "(")),
            ')' => Some((TokenKind::RParen, ")")),
            '{' => Some((TokenKind::LBrace, "{")),
            '}' => Some((TokenKind::RBrace, "}")),
            '[' => Some((TokenKind::LBracket, "[")),
            ']' => Some((TokenKind::RBracket, "]")),
            ';' => Some((TokenKind::Semi, ";")),
            ':' => Some((TokenKind::Colon, ":")),
            ',' => Some((TokenKind::Comma, ",")),
            '.' => Some((TokenKind::Dot, ".")),
            '&' => Some((TokenKind::Amp, "&")),
            '!' => Some((TokenKind::Bang, "!")),
            _ => None,
        };
        match single {
            Some((kind, text)) => {
                self.advance();
                Ok(Token::new(kind, text, line, col))
            }
            None => Err(self.error(format!("Unknown character '{}'", c), line, col)),
        }
    }
}

//! Recursive-descent parser for Ferro.
//!
//! Expressions use precedence climbing (comparison < additive < term <
//! factor). Statements beginning with an identifier are ambiguous between
//! assignment, a call statement, and an expression statement; the parser
//! resolves this by parsing a full expression and committing to assignment
//! only when the next token is `=`.
//!
//! Parse errors are single-shot: the first problem aborts the parse and
//! carries the offending token's position and the expected production.

use crate::ast::{BinOp, Block, Expr, FnDecl, Param, Program, Stmt, Ty, UnOp};
use crate::lexer::{Token, TokenKind};
use std::fmt;

#[derive(Debug, Clone, PartialEq)]
pub struct ParseError {
    pub message: String,
    pub line: u32,
    pub column: u32,
}

impl fmt::Display for ParseError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "Error at line {}, column {}: {}",
            self.line, self.column, self.message
        )
    }
}

impl std::error::Error for ParseError {}

pub struct Parser {
    tokens: Vec<Token>,
    pos: usize,
}

impl Parser {
    pub fn new(mut tokens: Vec<Token>) -> Self {
        // The lexer always terminates the list with Eof; guarantee it here
        // so the cursor never runs off the end.
        if tokens.last().map(|t| t.kind) != Some(TokenKind::Eof) {
            let (line, column) = tokens
                .last()
                .map(|t| (t.line, t.column + t.lexeme.len() as u32))
                .unwrap_or((1, 1));
            tokens.push(Token {
                kind: TokenKind::Eof,
                lexeme: String::new(),
                line,
                column,
            });
        }
        Parser { tokens, pos: 0 }
    }

    pub fn parse(&mut self) -> Result<Program, ParseError> {
        let mut functions = Vec::new();
        while !self.check(TokenKind::Eof) {
            if self.peek().is_keyword("fn") {
                functions.push(self.parse_fn_decl()?);
            } else {
                return Err(self.error_here("expected 'fn' at top level"));
            }
        }
        Ok(Program { functions })
    }

    // --- token cursor ---

    fn peek(&self) -> &Token {
        // The token list always ends in Eof, so `pos` never runs past it.
        &self.tokens[self.pos.min(self.tokens.len() - 1)]
    }

    fn advance(&mut self) -> Token {
        let token = self.peek().clone();
        if self.pos < self.tokens.len() - 1 {
            self.pos += 1;
        }
        token
    }

    fn check(&self, kind: TokenKind) -> bool {
        self.peek().kind == kind
    }

    fn eat(&mut self, kind: TokenKind) -> bool {
        if self.check(kind) {
            self.advance();
            true
        } else {
            false
        }
    }

    fn eat_keyword(&mut self, word: &str) -> bool {
        if self.peek().is_keyword(word) {
            self.advance();
            true
        } else {
            false
        }
    }

    fn expect(&mut self, kind: TokenKind, what: &str) -> Result<Token, ParseError> {
        if self.check(kind) {
            Ok(self.advance())
        } else {
            Err(self.error_here(&format!("expected {}", what)))
        }
    }

    fn expect_keyword(&mut self, word: &str) -> Result<Token, ParseError> {
        if self.peek().is_keyword(word) {
            Ok(self.advance())
        } else {
            Err(self.error_here(&format!("expected '{}'", word)))
        }
    }

    fn error_here(&self, message: &str) -> ParseError {
        let token = self.peek();
        let found = match token.kind {
            TokenKind::Eof => "end of input".to_string(),
            _ => format!("'{}'", token.lexeme),
        };
        ParseError {
            message: format!("{}, found {}", message, found),
            line: token.line,
            column: token.column,
        }
    }

    // --- declarations ---

    fn parse_fn_decl(&mut self) -> Result<FnDecl, ParseError> {
        self.expect_keyword("fn")?;
        let name_token = self.expect(TokenKind::Ident, "function name")?;
        self.expect(TokenKind::LParen, "'(' after function name")?;
        let params = self.parse_params()?;
        self.expect(TokenKind::RParen, "')' after parameter list")?;
        let ret_ty = if self.eat(TokenKind::Arrow) {
            self.parse_ty()?
        } else {
            Ty::Unit
        };
        let body = self.parse_block()?;
        Ok(FnDecl {
            name: name_token.lexeme,
            params,
            ret_ty,
            body,
            line: name_token.line,
            column: name_token.column,
        })
    }

    fn parse_params(&mut self) -> Result<Vec<Param>, ParseError> {
        let mut params = Vec::new();
        if self.check(TokenKind::RParen) {
            return Ok(params);
        }
        loop {
            let mutable = self.eat_keyword("mut");
            let name_token = self.expect(TokenKind::Ident, "parameter name")?;
            // The type annotation is optional; an untyped parameter is i32.
            let ty = if self.eat(TokenKind::Colon) {
                self.parse_ty()?
            } else {
                Ty::I32
            };
            params.push(Param {
                name: name_token.lexeme,
                mutable,
                ty,
                line: name_token.line,
                column: name_token.column,
            });
            if !self.eat(TokenKind::Comma) {
                break;
            }
        }
        Ok(params)
    }

    fn parse_ty(&mut self) -> Result<Ty, ParseError> {
        if self.eat_keyword("i32") {
            return Ok(Ty::I32);
        }
        if self.eat_keyword("bool") {
            return Ok(Ty::Bool);
        }
        if self.eat(TokenKind::Amp) {
            let mutable = self.eat_keyword("mut");
            let inner = self.parse_ty()?;
            return Ok(Ty::Ref(mutable, Box::new(inner)));
        }
        if self.eat(TokenKind::LBracket) {
            let elem = self.parse_ty()?;
            self.expect(TokenKind::Semi, "';' in array type")?;
            let size_token = self.expect(TokenKind::Int, "array size")?;
            let size = size_token.lexeme.parse::<usize>().map_err(|_| ParseError {
                message: format!("array size '{}' is out of range", size_token.lexeme),
                line: size_token.line,
                column: size_token.column,
            })?;
            self.expect(TokenKind::RBracket, "']' after array size")?;
            return Ok(Ty::Array(Box::new(elem), size));
        }
        if self.eat(TokenKind::LParen) {
            if self.eat(TokenKind::RParen) {
                return Ok(Ty::Unit);
            }
            let mut tys = vec![self.parse_ty()?];
            while self.eat(TokenKind::Comma) {
                if self.check(TokenKind::RParen) {
                    break;
                }
                tys.push(self.parse_ty()?);
            }
            self.expect(TokenKind::RParen, "')' after tuple type")?;
            return Ok(Ty::Tuple(tys));
        }
        Err(self.error_here("expected a type"))
    }

    // --- statements ---

    fn parse_block(&mut self) -> Result<Block, ParseError> {
        self.expect(TokenKind::LBrace, "'{'")?;
        let mut stmts = Vec::new();
        while !self.check(TokenKind::RBrace) && !self.check(TokenKind::Eof) {
            stmts.push(self.parse_stmt()?);
        }
        self.expect(TokenKind::RBrace, "'}'")?;
        Ok(Block { stmts })
    }

    fn parse_stmt(&mut self) -> Result<Stmt, ParseError> {
        if self.eat(TokenKind::Semi) {
            return Ok(Stmt::Empty);
        }
        if self.check(TokenKind::LBrace) {
            return Ok(Stmt::Block(self.parse_block()?));
        }
        if self.peek().is_keyword("let") {
            return self.parse_let();
        }
        if self.peek().is_keyword("if") {
            return self.parse_if();
        }
        if self.peek().is_keyword("while") {
            return self.parse_while();
        }
        if self.peek().is_keyword("for") {
            return self.parse_for();
        }
        if self.peek().is_keyword("loop") {
            self.advance();
            let body = self.parse_block()?;
            return Ok(Stmt::Loop { body });
        }
        if self.peek().is_keyword("return") {
            let kw = self.advance();
            if self.eat(TokenKind::Semi) {
                return Ok(Stmt::Return {
                    value: None,
                    line: kw.line,
                    column: kw.column,
                });
            }
            let value = self.parse_expr()?;
            self.expect(TokenKind::Semi, "';' after return value")?;
            return Ok(Stmt::Return {
                value: Some(value),
                line: kw.line,
                column: kw.column,
            });
        }
        if self.peek().is_keyword("break") {
            let kw = self.advance();
            if self.eat(TokenKind::Semi) {
                return Ok(Stmt::Break {
                    value: None,
                    line: kw.line,
                    column: kw.column,
                });
            }
            let value = self.parse_expr()?;
            self.expect(TokenKind::Semi, "';' after break value")?;
            return Ok(Stmt::Break {
                value: Some(value),
                line: kw.line,
                column: kw.column,
            });
        }
        if self.peek().is_keyword("continue") {
            let kw = self.advance();
            self.expect(TokenKind::Semi, "';' after 'continue'")?;
            return Ok(Stmt::Continue {
                line: kw.line,
                column: kw.column,
            });
        }
        self.parse_assign_or_expr_stmt()
    }

    fn parse_let(&mut self) -> Result<Stmt, ParseError> {
        self.expect_keyword("let")?;
        let mutable = self.eat_keyword("mut");
        let name_token = self.expect(TokenKind::Ident, "variable name")?;
        let ty = if self.eat(TokenKind::Colon) {
            Some(self.parse_ty()?)
        } else {
            None
        };
        let init = if self.eat(TokenKind::Assign) {
            Some(self.parse_expr()?)
        } else {
            None
        };
        self.expect(TokenKind::Semi, "';' after let declaration")?;
        Ok(Stmt::Let {
            name: name_token.lexeme,
            mutable,
            ty,
            init,
            line: name_token.line,
            column: name_token.column,
        })
    }

    fn parse_if(&mut self) -> Result<Stmt, ParseError> {
        self.expect_keyword("if")?;
        let cond = self.parse_expr()?;
        let then_block = self.parse_block()?;
        let mut elifs = Vec::new();
        let mut else_block = None;
        while self.eat_keyword("else") {
            if self.eat_keyword("if") {
                let elif_cond = self.parse_expr()?;
                let elif_block = self.parse_block()?;
                elifs.push((elif_cond, elif_block));
            } else {
                else_block = Some(self.parse_block()?);
                break;
            }
        }
        Ok(Stmt::If {
            cond,
            then_block,
            elifs,
            else_block,
        })
    }

    fn parse_while(&mut self) -> Result<Stmt, ParseError> {
        self.expect_keyword("while")?;
        let cond = self.parse_expr()?;
        let body = self.parse_block()?;
        Ok(Stmt::While { cond, body })
    }

    fn parse_for(&mut self) -> Result<Stmt, ParseError> {
        self.expect_keyword("for")?;
        let mutable = self.eat_keyword("mut");
        let name_token = self.expect(TokenKind::Ident, "loop variable")?;
        self.expect_keyword("in")?;
        let start = self.parse_expr()?;
        let dots = self.expect(TokenKind::DotDot, "'..' in for-loop range")?;
        let end = self.parse_expr()?;
        let body = self.parse_block()?;
        Ok(Stmt::For {
            var: name_token.lexeme,
            mutable,
            range: Expr::Range {
                start: Box::new(start),
                end: Box::new(end),
                line: dots.line,
                column: dots.column,
            },
            body,
            line: name_token.line,
            column: name_token.column,
        })
    }

    /// `IDENT ...` is ambiguous between assignment, a call statement, and an
    /// expression statement. Parse a full expression first; a following `=`
    /// commits to assignment (and the parsed expression must be a place).
    fn parse_assign_or_expr_stmt(&mut self) -> Result<Stmt, ParseError> {
        let expr = self.parse_expr()?;
        if self.check(TokenKind::Assign) {
            let eq = self.advance();
            if !expr.is_place() {
                return Err(ParseError {
                    message: "invalid assignment target".to_string(),
                    line: eq.line,
                    column: eq.column,
                });
            }
            let value = self.parse_expr()?;
            self.expect(TokenKind::Semi, "';' after assignment")?;
            return Ok(Stmt::Assign { place: expr, value });
        }
        self.expect(TokenKind::Semi, "';' after expression")?;
        Ok(Stmt::Expr(expr))
    }

    // --- expressions ---

    fn parse_expr(&mut self) -> Result<Expr, ParseError> {
        self.parse_comparison()
    }

    fn comparison_op(&self) -> Option<BinOp> {
        match self.peek().kind {
            TokenKind::Eq => Some(BinOp::Eq),
            TokenKind::Ne => Some(BinOp::Ne),
            TokenKind::Lt => Some(BinOp::Lt),
            TokenKind::Le => Some(BinOp::Le),
            TokenKind::Gt => Some(BinOp::Gt),
            TokenKind::Ge => Some(BinOp::Ge),
            _ => None,
        }
    }

    fn parse_comparison(&mut self) -> Result<Expr, ParseError> {
        let mut node = self.parse_additive()?;
        while let Some(op) = self.comparison_op() {
            let op_token = self.advance();
            let rhs = self.parse_additive()?;
            node = Expr::Binary {
                op,
                lhs: Box::new(node),
                rhs: Box::new(rhs),
                line: op_token.line,
                column: op_token.column,
            };
        }
        Ok(node)
    }

    fn parse_additive(&mut self) -> Result<Expr, ParseError> {
        let mut node = self.parse_term()?;
        loop {
            let op = match self.peek().kind {
                TokenKind::Plus => BinOp::Add,
                TokenKind::Minus => BinOp::Sub,
                _ => break,
            };
            let op_token = self.advance();
            let rhs = self.parse_term()?;
            node = Expr::Binary {
                op,
                lhs: Box::new(node),
                rhs: Box::new(rhs),
                line: op_token.line,
                column: op_token.column,
            };
        }
        Ok(node)
    }

    fn parse_term(&mut self) -> Result<Expr, ParseError> {
        let mut node = self.parse_factor()?;
        loop {
            let op = match self.peek().kind {
                TokenKind::Star => BinOp::Mul,
                TokenKind::Slash => BinOp::Div,
                TokenKind::Percent => BinOp::Mod,
                _ => break,
            };
            let op_token = self.advance();
            let rhs = self.parse_factor()?;
            node = Expr::Binary {
                op,
                lhs: Box::new(node),
                rhs: Box::new(rhs),
                line: op_token.line,
                column: op_token.column,
            };
        }
        Ok(node)
    }

    fn parse_factor(&mut self) -> Result<Expr, ParseError> {
        let token = self.peek().clone();
        match token.kind {
            TokenKind::Int => {
                self.advance();
                let value = token.lexeme.parse::<i32>().map_err(|_| ParseError {
                    message: format!("integer literal '{}' is out of range", token.lexeme),
                    line: token.line,
                    column: token.column,
                })?;
                Ok(Expr::Int {
                    value,
                    line: token.line,
                    column: token.column,
                })
            }
            TokenKind::Keyword if token.lexeme == "true" || token.lexeme == "false" => {
                self.advance();
                Ok(Expr::Bool {
                    value: token.lexeme == "true",
                    line: token.line,
                    column: token.column,
                })
            }
            TokenKind::Minus => {
                self.advance();
                let operand = self.parse_factor()?;
                Ok(Expr::Unary {
                    op: UnOp::Neg,
                    operand: Box::new(operand),
                    line: token.line,
                    column: token.column,
                })
            }
            TokenKind::Bang => {
                self.advance();
                let operand = self.parse_factor()?;
                Ok(Expr::Unary {
                    op: UnOp::Not,
                    operand: Box::new(operand),
                    line: token.line,
                    column: token.column,
                })
            }
            TokenKind::Amp => {
                self.advance();
                let mutable = self.eat_keyword("mut");
                let operand = self.parse_factor()?;
                Ok(Expr::Borrow {
                    mutable,
                    operand: Box::new(operand),
                    line: token.line,
                    column: token.column,
                })
            }
            _ => self.parse_postfix(),
        }
    }

    fn parse_postfix(&mut self) -> Result<Expr, ParseError> {
        let mut node = self.parse_primary()?;
        loop {
            match self.peek().kind {
                TokenKind::LParen => {
                    // Only a plain function name can be called.
                    let Expr::Ident { name, line, column } = node else {
                        return Err(self.error_here("call target must be a function name"));
                    };
                    self.advance();
                    let args = self.parse_args(TokenKind::RParen)?;
                    self.expect(TokenKind::RParen, "')' after call arguments")?;
                    node = Expr::Call {
                        callee: name,
                        args,
                        line,
                        column,
                    };
                }
                TokenKind::LBracket => {
                    let bracket = self.advance();
                    let index = self.parse_expr()?;
                    self.expect(TokenKind::RBracket, "']' after array index")?;
                    node = Expr::Index {
                        base: Box::new(node),
                        index: Box::new(index),
                        line: bracket.line,
                        column: bracket.column,
                    };
                }
                TokenKind::Dot => {
                    let dot = self.advance();
                    let index_token = self.expect(TokenKind::Int, "tuple field index")?;
                    let index =
                        index_token.lexeme.parse::<usize>().map_err(|_| ParseError {
                            message: format!(
                                "tuple field index '{}' is out of range",
                                index_token.lexeme
                            ),
                            line: index_token.line,
                            column: index_token.column,
                        })?;
                    node = Expr::TupleField {
                        base: Box::new(node),
                        index,
                        line: dot.line,
                        column: dot.column,
                    };
                }
                _ => break,
            }
        }
        Ok(node)
    }

    fn parse_primary(&mut self) -> Result<Expr, ParseError> {
        let token = self.peek().clone();
        match token.kind {
            TokenKind::Ident => {
                self.advance();
                Ok(Expr::Ident {
                    name: token.lexeme,
                    line: token.line,
                    column: token.column,
                })
            }
            TokenKind::LParen => {
                self.advance();
                if self.eat(TokenKind::RParen) {
                    // `()` is the empty tuple.
                    return Ok(Expr::TupleLit {
                        elems: Vec::new(),
                        line: token.line,
                        column: token.column,
                    });
                }
                let first = self.parse_expr()?;
                if self.eat(TokenKind::Comma) {
                    let mut elems = vec![first];
                    while !self.check(TokenKind::RParen) {
                        elems.push(self.parse_expr()?);
                        if !self.eat(TokenKind::Comma) {
                            break;
                        }
                    }
                    self.expect(TokenKind::RParen, "')' after tuple literal")?;
                    return Ok(Expr::TupleLit {
                        elems,
                        line: token.line,
                        column: token.column,
                    });
                }
                self.expect(TokenKind::RParen, "')' after expression")?;
                Ok(first)
            }
            TokenKind::LBracket => {
                self.advance();
                let elems = self.parse_args(TokenKind::RBracket)?;
                self.expect(TokenKind::RBracket, "']' after array literal")?;
                Ok(Expr::ArrayLit {
                    elems,
                    line: token.line,
                    column: token.column,
                })
            }
            _ => Err(self.error_here("expected an expression")),
        }
    }

    /// Comma-separated expressions up to (not consuming) `terminator`.
    fn parse_args(&mut self, terminator: TokenKind) -> Result<Vec<Expr>, ParseError> {
        let mut args = Vec::new();
        if self.check(terminator) {
            return Ok(args);
        }
        args.push(self.parse_expr()?);
        while self.eat(TokenKind::Comma) {
            if self.check(terminator) {
                break;
            }
            args.push(self.parse_expr()?);
        }
        Ok(args)
    }
}

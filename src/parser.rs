// ABOUTME: Recursive-descent parser turning tokens into the Vanilla AST

use crate::ast::{BinaryOp, Expr, ExprKind, Param, Stmt, StmtKind, ANONYMOUS_FUNCTION_NAME};
use crate::error::{Error, ErrorKind, Result};
use crate::scanner::{Scanner, Token, TokenKind};
use bigdecimal::BigDecimal;
use num_bigint::BigInt;
use std::rc::Rc;
use std::str::FromStr;

/// Random-access view over the scanned tokens with the accept/expect
/// primitives the grammar rules are written against. The whole source is
/// scanned eagerly; the buffer always ends with the EOF token.
struct TokenBuffer<'a> {
    tokens: Vec<Token<'a>>,
    cursor: usize,
}

impl<'a> TokenBuffer<'a> {
    fn new(source: &'a str) -> Result<Self> {
        Ok(TokenBuffer {
            tokens: Scanner::scan_all(source)?,
            cursor: 0,
        })
    }

    fn current(&self) -> Token<'a> {
        // The trailing EOF token soaks up any reads past the end.
        self.tokens[self.cursor.min(self.tokens.len() - 1)]
    }

    /// Consumes and returns the current token if it has the given kind.
    fn accept(&mut self, kind: TokenKind) -> Option<Token<'a>> {
        let token = self.current();
        if token.kind != kind {
            return None;
        }
        self.cursor += 1;
        Some(token)
    }

    /// Consumes the current token, failing with `unexpected-token` if it
    /// does not have the given kind.
    fn expect(&mut self, kind: TokenKind) -> Result<Token<'a>> {
        let token = self.current();
        if token.kind != kind {
            return Err(Error::at(
                ErrorKind::UnexpectedToken {
                    expected: kind,
                    received: token.kind,
                },
                token.line,
                token.column,
            ));
        }
        self.cursor += 1;
        Ok(token)
    }
}

/// Parses a whole source text into the program's statement sequence.
pub fn parse_program(source: &str) -> Result<Stmt> {
    let mut buffer = TokenBuffer::new(source)?;
    let mut block = Vec::new();
    while buffer.accept(TokenKind::Eof).is_none() {
        block.push(parse_statement(&mut buffer)?);
    }
    Ok(Stmt::new(StmtKind::Sequence(block), 0, 0))
}

/// Parses a single expression from source text.
pub fn parse_expression_str(source: &str) -> Result<Expr> {
    let mut buffer = TokenBuffer::new(source)?;
    parse_expression(&mut buffer)
}

// ===== Literal conversion =====

fn int_from_token(token: &Token) -> Result<BigInt> {
    BigInt::parse_bytes(token.lexeme.as_bytes(), token.base.radix())
        .ok_or_else(|| Error::at(ErrorKind::InvalidToken, token.line, token.column))
}

fn real_from_token(token: &Token) -> Result<BigDecimal> {
    // The scanner permits a bare trailing dot ("1."), which the decimal
    // parser does not.
    let mut text = token.lexeme.to_string();
    if text.ends_with('.') {
        text.push('0');
    }
    BigDecimal::from_str(&text)
        .map_err(|_| Error::at(ErrorKind::InvalidToken, token.line, token.column))
}

/// Decodes the escape sequences of a string literal lexeme. Only `\n`,
/// `\t`, `\\` and `\"` are recognized; anything else is an error tagged
/// with the literal's position.
fn string_from_token(token: &Token) -> Result<String> {
    let mut result = String::with_capacity(token.lexeme.len());
    let mut chars = token.lexeme.chars();
    while let Some(c) = chars.next() {
        if c != '\\' {
            result.push(c);
            continue;
        }
        match chars.next() {
            Some('n') => result.push('\n'),
            Some('t') => result.push('\t'),
            Some('\\') => result.push('\\'),
            Some('"') => result.push('"'),
            other => {
                let mut sequence = String::from('\\');
                if let Some(c) = other {
                    sequence.push(c);
                }
                return Err(Error::at(
                    ErrorKind::InvalidEscapeSequence { sequence },
                    token.line,
                    token.column,
                ));
            }
        }
    }
    Ok(result)
}

// ===== Expression grammar, descending precedence =====

fn parse_expression(buffer: &mut TokenBuffer) -> Result<Expr> {
    parse_ternary(buffer)
}

fn parse_ternary(buffer: &mut TokenBuffer) -> Result<Expr> {
    let condition = parse_equality(buffer)?;
    if buffer.accept(TokenKind::Question).is_none() {
        return Ok(condition);
    }

    let then_branch = parse_ternary(buffer)?;
    buffer.expect(TokenKind::Colon)?;
    let else_branch = parse_ternary(buffer)?;

    let (line, column) = (condition.line, condition.column);
    Ok(Expr::new(
        ExprKind::Conditional {
            condition: Box::new(condition),
            then_branch: Box::new(then_branch),
            else_branch: Box::new(else_branch),
        },
        line,
        column,
    ))
}

/// Builds a right-associative binary chain: on a match the right operand
/// re-enters the same precedence level.
fn binary_chain(
    buffer: &mut TokenBuffer,
    operand: fn(&mut TokenBuffer) -> Result<Expr>,
    level: fn(&mut TokenBuffer) -> Result<Expr>,
    operators: &[(TokenKind, BinaryOp)],
) -> Result<Expr> {
    let left = operand(buffer)?;
    for &(kind, op) in operators {
        if buffer.accept(kind).is_some() {
            let right = level(buffer)?;
            let (line, column) = (left.line, left.column);
            return Ok(Expr::new(
                ExprKind::Binary {
                    op,
                    left: Box::new(left),
                    right: Box::new(right),
                },
                line,
                column,
            ));
        }
    }
    Ok(left)
}

fn parse_equality(buffer: &mut TokenBuffer) -> Result<Expr> {
    binary_chain(
        buffer,
        parse_relational,
        parse_equality,
        &[
            (TokenKind::Equal, BinaryOp::Eq),
            (TokenKind::NotEqual, BinaryOp::Neq),
        ],
    )
}

fn parse_relational(buffer: &mut TokenBuffer) -> Result<Expr> {
    binary_chain(
        buffer,
        parse_additive,
        parse_relational,
        &[
            (TokenKind::Less, BinaryOp::Lt),
            (TokenKind::LessEqual, BinaryOp::Le),
            (TokenKind::Greater, BinaryOp::Gt),
            (TokenKind::GreaterEqual, BinaryOp::Ge),
        ],
    )
}

fn parse_additive(buffer: &mut TokenBuffer) -> Result<Expr> {
    binary_chain(
        buffer,
        parse_multiplicative,
        parse_additive,
        &[
            (TokenKind::Plus, BinaryOp::Add),
            (TokenKind::Minus, BinaryOp::Sub),
            (TokenKind::Tilde, BinaryOp::Concat),
        ],
    )
}

fn parse_multiplicative(buffer: &mut TokenBuffer) -> Result<Expr> {
    binary_chain(
        buffer,
        parse_prefix,
        parse_multiplicative,
        &[
            (TokenKind::Star, BinaryOp::Mul),
            (TokenKind::Slash, BinaryOp::Div),
        ],
    )
}

fn parse_prefix(buffer: &mut TokenBuffer) -> Result<Expr> {
    if let Some(token) = buffer.accept(TokenKind::Minus) {
        let child = parse_prefix(buffer)?;
        return Ok(Expr::new(
            ExprKind::Neg(Box::new(child)),
            token.line,
            token.column,
        ));
    }
    if let Some(token) = buffer.accept(TokenKind::Plus) {
        let child = parse_prefix(buffer)?;
        return Ok(Expr::new(
            ExprKind::Abs(Box::new(child)),
            token.line,
            token.column,
        ));
    }
    parse_postfix(buffer)
}

fn parse_postfix(buffer: &mut TokenBuffer) -> Result<Expr> {
    let mut expr = parse_primary(buffer)?;
    loop {
        // Function call.
        if buffer.accept(TokenKind::LParen).is_some() {
            let args = parse_expression_list(buffer, TokenKind::RParen)?;
            let (line, column) = (expr.line, expr.column);
            expr = Expr::new(
                ExprKind::Call {
                    callee: Box::new(expr),
                    args,
                },
                line,
                column,
            );
            continue;
        }

        // Subscripting.
        if buffer.accept(TokenKind::LBrack).is_some() {
            let index = parse_expression(buffer)?;
            buffer.expect(TokenKind::RBrack)?;
            let (line, column) = (expr.line, expr.column);
            expr = Expr::new(
                ExprKind::Subscript {
                    target: Box::new(expr),
                    index: Box::new(index),
                },
                line,
                column,
            );
            continue;
        }

        // Element selection.
        if buffer.accept(TokenKind::Dot).is_some() {
            let name = buffer.expect(TokenKind::Ident)?;
            let (line, column) = (expr.line, expr.column);
            expr = Expr::new(
                ExprKind::Element {
                    target: Box::new(expr),
                    name: name.lexeme.to_string(),
                },
                line,
                column,
            );
            continue;
        }

        return Ok(expr);
    }
}

fn parse_primary(buffer: &mut TokenBuffer) -> Result<Expr> {
    if let Some(token) = buffer.accept(TokenKind::IntLit) {
        return Ok(Expr::new(
            ExprKind::Int(int_from_token(&token)?),
            token.line,
            token.column,
        ));
    }
    if let Some(token) = buffer.accept(TokenKind::RealLit) {
        return Ok(Expr::new(
            ExprKind::Real(real_from_token(&token)?),
            token.line,
            token.column,
        ));
    }
    if let Some(token) = buffer.accept(TokenKind::StringLit) {
        return Ok(Expr::new(
            ExprKind::Str(string_from_token(&token)?),
            token.line,
            token.column,
        ));
    }
    if let Some(token) = buffer.accept(TokenKind::True) {
        return Ok(Expr::new(
            ExprKind::Bool(crate::value::Tribool::True),
            token.line,
            token.column,
        ));
    }
    if let Some(token) = buffer.accept(TokenKind::False) {
        return Ok(Expr::new(
            ExprKind::Bool(crate::value::Tribool::False),
            token.line,
            token.column,
        ));
    }
    if let Some(token) = buffer.accept(TokenKind::Indeterminate) {
        return Ok(Expr::new(
            ExprKind::Bool(crate::value::Tribool::Indeterminate),
            token.line,
            token.column,
        ));
    }
    if let Some(token) = buffer.accept(TokenKind::Ident) {
        return Ok(Expr::new(
            ExprKind::Variable(token.lexeme.to_string()),
            token.line,
            token.column,
        ));
    }
    if buffer.accept(TokenKind::LParen).is_some() {
        let inner = parse_expression(buffer)?;
        buffer.expect(TokenKind::RParen)?;
        return Ok(inner);
    }
    if let Some(expr) = parse_function_definition_expression(buffer)? {
        return Ok(expr);
    }
    if let Some(expr) = parse_native_definition_expression(buffer)? {
        return Ok(expr);
    }
    if let Some(token) = buffer.accept(TokenKind::LBrack) {
        let values = parse_expression_list(buffer, TokenKind::RBrack)?;
        return Ok(Expr::new(ExprKind::Array(values), token.line, token.column));
    }

    let token = buffer.current();
    Err(Error::at(
        ErrorKind::ExpectedPrimaryExpression {
            received: token.kind,
        },
        token.line,
        token.column,
    ))
}

/// Parses a comma-separated expression list up to (and including) the
/// closing delimiter. A trailing comma before the delimiter is accepted.
fn parse_expression_list(buffer: &mut TokenBuffer, closer: TokenKind) -> Result<Vec<Expr>> {
    let mut items = Vec::new();
    while buffer.accept(closer).is_none() {
        items.push(parse_expression(buffer)?);
        if buffer.accept(TokenKind::Comma).is_none() {
            buffer.expect(closer)?;
            break;
        }
    }
    Ok(items)
}

/// Parses `( ident ('=' expr)? (',' ident ('=' expr)?)* )`.
fn parse_parameter_list(buffer: &mut TokenBuffer) -> Result<Vec<Param>> {
    buffer.expect(TokenKind::LParen)?;
    let mut params = Vec::new();
    while buffer.accept(TokenKind::RParen).is_none() {
        let name = buffer.expect(TokenKind::Ident)?;
        let default = if buffer.accept(TokenKind::Assign).is_some() {
            Some(parse_expression(buffer)?)
        } else {
            None
        };
        params.push(Param {
            name: name.lexeme.to_string(),
            default,
        });
        if buffer.accept(TokenKind::Comma).is_none() {
            buffer.expect(TokenKind::RParen)?;
            break;
        }
    }
    Ok(params)
}

fn parse_function_definition_expression(buffer: &mut TokenBuffer) -> Result<Option<Expr>> {
    let Some(token) = buffer.accept(TokenKind::Function) else {
        return Ok(None);
    };

    let name = match buffer.accept(TokenKind::Ident) {
        Some(ident) => ident.lexeme.to_string(),
        None => ANONYMOUS_FUNCTION_NAME.to_string(),
    };
    let params = parse_parameter_list(buffer)?;
    let body = parse_statement(buffer)?;

    Ok(Some(Expr::new(
        ExprKind::FunctionDef {
            name,
            params,
            body: Rc::new(body),
        },
        token.line,
        token.column,
    )))
}

/// Parses `native STRING from STRING declared STRING ( STRING, ... )`.
fn parse_native_definition_expression(buffer: &mut TokenBuffer) -> Result<Option<Expr>> {
    let Some(token) = buffer.accept(TokenKind::Native) else {
        return Ok(None);
    };

    let symbol = string_from_token(&buffer.expect(TokenKind::StringLit)?)?;
    buffer.expect(TokenKind::From)?;
    let library = string_from_token(&buffer.expect(TokenKind::StringLit)?)?;
    buffer.expect(TokenKind::Declared)?;
    let result = string_from_token(&buffer.expect(TokenKind::StringLit)?)?;

    buffer.expect(TokenKind::LParen)?;
    let mut args = Vec::new();
    while buffer.accept(TokenKind::RParen).is_none() {
        args.push(string_from_token(&buffer.expect(TokenKind::StringLit)?)?);
        if buffer.accept(TokenKind::Comma).is_none() {
            buffer.expect(TokenKind::RParen)?;
            break;
        }
    }

    Ok(Some(Expr::new(
        ExprKind::NativeDef {
            symbol,
            library,
            result,
            args,
        },
        token.line,
        token.column,
    )))
}

// ===== Statements =====

fn parse_statement(buffer: &mut TokenBuffer) -> Result<Stmt> {
    if let Some(stmt) = parse_return_statement(buffer)? {
        return Ok(stmt);
    }
    if let Some(stmt) = parse_block(buffer)? {
        return Ok(stmt);
    }
    if let Some(stmt) = parse_if_statement(buffer)? {
        return Ok(stmt);
    }
    if let Some(stmt) = parse_while_statement(buffer)? {
        return Ok(stmt);
    }
    // The statement form of `function` is tried before the expression form,
    // so a definition at statement start must carry a name.
    if let Some(stmt) = parse_function_definition_statement(buffer)? {
        return Ok(stmt);
    }
    parse_assignment_or_expression_statement(buffer)
}

fn parse_return_statement(buffer: &mut TokenBuffer) -> Result<Option<Stmt>> {
    let Some(token) = buffer.accept(TokenKind::Return) else {
        return Ok(None);
    };
    let expr = parse_expression(buffer)?;
    buffer.expect(TokenKind::Semicolon)?;
    Ok(Some(Stmt::new(
        StmtKind::Return(expr),
        token.line,
        token.column,
    )))
}

fn parse_block(buffer: &mut TokenBuffer) -> Result<Option<Stmt>> {
    let Some(token) = buffer.accept(TokenKind::LBrace) else {
        return Ok(None);
    };
    let mut block = Vec::new();
    while buffer.accept(TokenKind::RBrace).is_none() {
        block.push(parse_statement(buffer)?);
    }
    Ok(Some(Stmt::new(
        StmtKind::Sequence(block),
        token.line,
        token.column,
    )))
}

fn parse_if_statement(buffer: &mut TokenBuffer) -> Result<Option<Stmt>> {
    let Some(token) = buffer.accept(TokenKind::If) else {
        return Ok(None);
    };

    let mut arms = Vec::new();
    arms.push((parse_expression(buffer)?, parse_statement(buffer)?));
    while buffer.accept(TokenKind::ElseIf).is_some() {
        arms.push((parse_expression(buffer)?, parse_statement(buffer)?));
    }

    let otherwise = if buffer.accept(TokenKind::Else).is_some() {
        Some(Box::new(parse_statement(buffer)?))
    } else {
        None
    };

    Ok(Some(Stmt::new(
        StmtKind::If { arms, otherwise },
        token.line,
        token.column,
    )))
}

fn parse_while_statement(buffer: &mut TokenBuffer) -> Result<Option<Stmt>> {
    let Some(token) = buffer.accept(TokenKind::While) else {
        return Ok(None);
    };
    let condition = parse_expression(buffer)?;
    let body = parse_statement(buffer)?;
    Ok(Some(Stmt::new(
        StmtKind::While {
            condition,
            body: Box::new(body),
        },
        token.line,
        token.column,
    )))
}

fn parse_function_definition_statement(buffer: &mut TokenBuffer) -> Result<Option<Stmt>> {
    let Some(token) = buffer.accept(TokenKind::Function) else {
        return Ok(None);
    };
    let name = buffer.expect(TokenKind::Ident)?;
    let params = parse_parameter_list(buffer)?;
    let body = parse_statement(buffer)?;
    Ok(Some(Stmt::new(
        StmtKind::FunctionDef {
            name: name.lexeme.to_string(),
            params,
            body: Rc::new(body),
        },
        token.line,
        token.column,
    )))
}

fn parse_assignment_or_expression_statement(buffer: &mut TokenBuffer) -> Result<Stmt> {
    let lhs = parse_expression(buffer)?;
    let (line, column) = (lhs.line, lhs.column);

    if buffer.accept(TokenKind::Assign).is_some() {
        let rhs = parse_expression(buffer)?;
        buffer.expect(TokenKind::Semicolon)?;
        return Ok(Stmt::new(
            StmtKind::Assign {
                target: lhs,
                value: rhs,
            },
            line,
            column,
        ));
    }

    buffer.expect(TokenKind::Semicolon)?;
    Ok(Stmt::new(StmtKind::Expression(lhs), line, column))
}

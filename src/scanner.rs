// ABOUTME: Scanner turning Vanilla source text into a token sequence

use crate::error::{Error, ErrorKind, Result};
use std::fmt;

/// Every token kind the scanner can produce.
///
/// A handful of kinds (`Range`, `Ellipsis`, `PlusPlus`, `MinusMinus`,
/// `StarStar`, `Not`, `Lambda`, `For`) are recognized here but never
/// consumed by the grammar; using them surfaces as a parse error.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TokenKind {
    Eof,

    Ident,
    IntLit,
    RealLit,
    StringLit,

    True,
    False,
    Indeterminate,

    Dot,
    Range,
    Ellipsis,

    Plus,
    Minus,
    Not,
    Star,
    Slash,
    Tilde,
    PlusPlus,
    MinusMinus,
    StarStar,

    Less,
    LessEqual,
    Greater,
    GreaterEqual,
    Equal,
    NotEqual,

    Assign,

    Question,
    Colon,

    LParen,
    RParen,
    LBrace,
    RBrace,
    LBrack,
    RBrack,
    Comma,
    Semicolon,

    Function,
    Lambda,
    Return,
    If,
    Else,
    ElseIf,
    For,
    While,
    Native,
    From,
    Declared,
}

impl fmt::Display for TokenKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            TokenKind::Eof => "end of input",
            TokenKind::Ident => "identifier",
            TokenKind::IntLit => "integer literal",
            TokenKind::RealLit => "real literal",
            TokenKind::StringLit => "string literal",
            TokenKind::True => "true",
            TokenKind::False => "false",
            TokenKind::Indeterminate => "indeterminate",
            TokenKind::Dot => ".",
            TokenKind::Range => "..",
            TokenKind::Ellipsis => "...",
            TokenKind::Plus => "+",
            TokenKind::Minus => "-",
            TokenKind::Not => "!",
            TokenKind::Star => "*",
            TokenKind::Slash => "/",
            TokenKind::Tilde => "~",
            TokenKind::PlusPlus => "++",
            TokenKind::MinusMinus => "--",
            TokenKind::StarStar => "**",
            TokenKind::Less => "<",
            TokenKind::LessEqual => "<=",
            TokenKind::Greater => ">",
            TokenKind::GreaterEqual => ">=",
            TokenKind::Equal => "==",
            TokenKind::NotEqual => "!=",
            TokenKind::Assign => "=",
            TokenKind::Question => "?",
            TokenKind::Colon => ":",
            TokenKind::LParen => "(",
            TokenKind::RParen => ")",
            TokenKind::LBrace => "{",
            TokenKind::RBrace => "}",
            TokenKind::LBrack => "[",
            TokenKind::RBrack => "]",
            TokenKind::Comma => ",",
            TokenKind::Semicolon => ";",
            TokenKind::Function => "function",
            TokenKind::Lambda => "lambda",
            TokenKind::Return => "return",
            TokenKind::If => "if",
            TokenKind::Else => "else",
            TokenKind::ElseIf => "elseif",
            TokenKind::For => "for",
            TokenKind::While => "while",
            TokenKind::Native => "native",
            TokenKind::From => "from",
            TokenKind::Declared => "declared",
        };
        write!(f, "{}", name)
    }
}

/// The numeric base flagged on an integer literal token.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IntBase {
    Decimal,
    Hexadecimal,
    Octal,
    Binary,
}

impl IntBase {
    pub fn radix(self) -> u32 {
        match self {
            IntBase::Decimal => 10,
            IntBase::Hexadecimal => 16,
            IntBase::Octal => 8,
            IntBase::Binary => 2,
        }
    }
}

/// A scanned token. The lexeme borrows from the source buffer; for string
/// literals it is the raw slice between the quotes (escape processing is
/// deferred to the parser), and for hex/octal/binary integers it excludes
/// the base prefix.
#[derive(Debug, Clone, Copy)]
pub struct Token<'a> {
    pub kind: TokenKind,
    pub lexeme: &'a str,
    pub line: u32,
    pub column: u32,
    pub base: IntBase,
}

/// Single-pass scanner with one character of look-ahead.
///
/// Tracks the current line (1-based) and column (1-based); advancing past a
/// newline bumps the line and resets the column.
pub struct Scanner<'a> {
    source: &'a str,
    position: usize,
    line: u32,
    column: u32,
}

impl<'a> Scanner<'a> {
    pub fn new(source: &'a str) -> Self {
        Scanner {
            source,
            position: 0,
            line: 1,
            column: 1,
        }
    }

    /// Scans the entire source up front, ending with the EOF token.
    pub fn scan_all(source: &'a str) -> Result<Vec<Token<'a>>> {
        let mut scanner = Scanner::new(source);
        let mut tokens = Vec::new();
        loop {
            let token = scanner.next_token()?;
            let done = token.kind == TokenKind::Eof;
            tokens.push(token);
            if done {
                return Ok(tokens);
            }
        }
    }

    fn current(&self) -> u8 {
        *self.source.as_bytes().get(self.position).unwrap_or(&0)
    }

    fn peek(&self) -> u8 {
        *self.source.as_bytes().get(self.position + 1).unwrap_or(&0)
    }

    fn bump(&mut self) {
        let byte = self.current();
        if byte == 0 {
            return;
        }
        self.position += 1;
        if byte == b'\n' {
            self.line += 1;
            self.column = 1;
        } else {
            self.column += 1;
        }
    }

    fn skip_whitespace(&mut self) {
        while self.current().is_ascii_whitespace() {
            self.bump();
        }
    }

    fn slice(&self, start: usize) -> &'a str {
        &self.source[start..self.position]
    }

    /// Produces the next token, skipping leading whitespace. At the end of
    /// input this keeps returning the EOF token.
    pub fn next_token(&mut self) -> Result<Token<'a>> {
        self.skip_whitespace();

        let line = self.line;
        let column = self.column;
        let token = |kind, lexeme| Token {
            kind,
            lexeme,
            line,
            column,
            base: IntBase::Decimal,
        };

        let byte = self.current();
        if byte == 0 {
            return Ok(token(TokenKind::Eof, ""));
        }

        if byte.is_ascii_alphabetic() || byte == b'_' {
            return Ok(self.read_ident_or_keyword(line, column));
        }
        if byte.is_ascii_digit() {
            return self.read_number(line, column);
        }
        if byte == b'"' {
            return self.read_string(line, column);
        }

        let start = self.position;
        let kind = match byte {
            b'.' => {
                self.bump();
                if self.current() == b'.' {
                    self.bump();
                    if self.current() == b'.' {
                        self.bump();
                        TokenKind::Ellipsis
                    } else {
                        TokenKind::Range
                    }
                } else {
                    TokenKind::Dot
                }
            }
            b'+' => self.one_or_two(b'+', TokenKind::Plus, TokenKind::PlusPlus),
            b'-' => self.one_or_two(b'-', TokenKind::Minus, TokenKind::MinusMinus),
            b'*' => self.one_or_two(b'*', TokenKind::Star, TokenKind::StarStar),
            b'<' => self.one_or_two(b'=', TokenKind::Less, TokenKind::LessEqual),
            b'>' => self.one_or_two(b'=', TokenKind::Greater, TokenKind::GreaterEqual),
            b'=' => self.one_or_two(b'=', TokenKind::Assign, TokenKind::Equal),
            b'!' => self.one_or_two(b'=', TokenKind::Not, TokenKind::NotEqual),
            b'/' => self.single(TokenKind::Slash),
            b'~' => self.single(TokenKind::Tilde),
            b'(' => self.single(TokenKind::LParen),
            b')' => self.single(TokenKind::RParen),
            b'{' => self.single(TokenKind::LBrace),
            b'}' => self.single(TokenKind::RBrace),
            b'[' => self.single(TokenKind::LBrack),
            b']' => self.single(TokenKind::RBrack),
            b',' => self.single(TokenKind::Comma),
            b';' => self.single(TokenKind::Semicolon),
            b'?' => self.single(TokenKind::Question),
            b':' => self.single(TokenKind::Colon),
            _ => return Err(Error::at(ErrorKind::InvalidToken, line, column)),
        };

        Ok(token(kind, self.slice(start)))
    }

    fn single(&mut self, kind: TokenKind) -> TokenKind {
        self.bump();
        kind
    }

    fn one_or_two(&mut self, second: u8, one: TokenKind, two: TokenKind) -> TokenKind {
        self.bump();
        if self.current() == second {
            self.bump();
            two
        } else {
            one
        }
    }

    fn read_ident_or_keyword(&mut self, line: u32, column: u32) -> Token<'a> {
        let start = self.position;
        while self.current().is_ascii_alphanumeric() || self.current() == b'_' {
            self.bump();
        }
        let lexeme = self.slice(start);
        let kind = match lexeme {
            "function" => TokenKind::Function,
            "lambda" => TokenKind::Lambda,
            "return" => TokenKind::Return,
            "true" => TokenKind::True,
            "false" => TokenKind::False,
            "indeterminate" => TokenKind::Indeterminate,
            "if" => TokenKind::If,
            "else" => TokenKind::Else,
            "elseif" => TokenKind::ElseIf,
            "for" => TokenKind::For,
            "while" => TokenKind::While,
            "native" => TokenKind::Native,
            "from" => TokenKind::From,
            "declared" => TokenKind::Declared,
            _ => TokenKind::Ident,
        };
        Token {
            kind,
            lexeme,
            line,
            column,
            base: IntBase::Decimal,
        }
    }

    fn read_number(&mut self, line: u32, column: u32) -> Result<Token<'a>> {
        let int_token = |lexeme, base| Token {
            kind: TokenKind::IntLit,
            lexeme,
            line,
            column,
            base,
        };
        let real_token = |lexeme| Token {
            kind: TokenKind::RealLit,
            lexeme,
            line,
            column,
            base: IntBase::Decimal,
        };

        if self.current() == b'0' {
            self.bump();
            match self.current() {
                // Base 16: the lexeme starts after the prefix.
                b'x' | b'X' => {
                    self.bump();
                    let start = self.position;
                    while self.current().is_ascii_hexdigit() {
                        self.bump();
                    }
                    if start == self.position {
                        return Err(Error::at(ErrorKind::InvalidToken, line, column));
                    }
                    Ok(int_token(self.slice(start), IntBase::Hexadecimal))
                }
                // Base 8: a leading zero followed by an octal digit run.
                b'0'..=b'7' => {
                    let start = self.position;
                    while (b'0'..=b'7').contains(&self.current()) {
                        self.bump();
                    }
                    Ok(int_token(self.slice(start), IntBase::Octal))
                }
                b'b' | b'B' => {
                    self.bump();
                    let start = self.position;
                    while self.current() == b'0' || self.current() == b'1' {
                        self.bump();
                    }
                    if start == self.position {
                        return Err(Error::at(ErrorKind::InvalidToken, line, column));
                    }
                    Ok(int_token(self.slice(start), IntBase::Binary))
                }
                // A real of the form 0.***
                b'.' => {
                    let start = self.position - 1;
                    self.bump();
                    while self.current().is_ascii_digit() {
                        self.bump();
                    }
                    Ok(real_token(self.slice(start)))
                }
                // The 0 literal.
                _ => Ok(int_token(&self.source[self.position - 1..self.position], IntBase::Decimal)),
            }
        } else {
            let start = self.position;
            while self.current().is_ascii_digit() {
                self.bump();
            }
            if self.current() == b'.' && self.peek() != b'.' {
                self.bump();
                while self.current().is_ascii_digit() {
                    self.bump();
                }
                return Ok(real_token(self.slice(start)));
            }
            Ok(int_token(self.slice(start), IntBase::Decimal))
        }
    }

    fn read_string(&mut self, line: u32, column: u32) -> Result<Token<'a>> {
        // The lexeme is the raw slice between the quotes; `\X` pairs are
        // skipped here and decoded by the parser.
        self.bump();
        let start = self.position;
        loop {
            match self.current() {
                0 => return Err(Error::at(ErrorKind::InvalidToken, line, column)),
                b'"' => break,
                b'\\' => {
                    self.bump();
                    if self.current() == 0 {
                        return Err(Error::at(ErrorKind::InvalidToken, line, column));
                    }
                    self.bump();
                }
                _ => self.bump(),
            }
        }
        let lexeme = self.slice(start);
        self.bump();
        Ok(Token {
            kind: TokenKind::StringLit,
            lexeme,
            line,
            column,
            base: IntBase::Decimal,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn kinds(source: &str) -> Vec<TokenKind> {
        Scanner::scan_all(source)
            .unwrap()
            .into_iter()
            .map(|t| t.kind)
            .collect()
    }

    fn first(source: &str) -> (TokenKind, String, IntBase) {
        let tokens = Scanner::scan_all(source).unwrap();
        (tokens[0].kind, tokens[0].lexeme.to_string(), tokens[0].base)
    }

    #[test]
    fn test_keywords_and_identifiers() {
        assert_eq!(
            kinds("function foo while native from declared lambda for"),
            vec![
                TokenKind::Function,
                TokenKind::Ident,
                TokenKind::While,
                TokenKind::Native,
                TokenKind::From,
                TokenKind::Declared,
                TokenKind::Lambda,
                TokenKind::For,
                TokenKind::Eof,
            ]
        );
    }

    #[test]
    fn test_integer_bases() {
        assert_eq!(first("0"), (TokenKind::IntLit, "0".to_string(), IntBase::Decimal));
        assert_eq!(
            first("0x1F"),
            (TokenKind::IntLit, "1F".to_string(), IntBase::Hexadecimal)
        );
        assert_eq!(first("07"), (TokenKind::IntLit, "7".to_string(), IntBase::Octal));
        assert_eq!(
            first("0b101"),
            (TokenKind::IntLit, "101".to_string(), IntBase::Binary)
        );
        assert_eq!(
            first("42"),
            (TokenKind::IntLit, "42".to_string(), IntBase::Decimal)
        );
    }

    #[test]
    fn test_real_literals() {
        assert_eq!(first("0.5").0, TokenKind::RealLit);
        assert_eq!(first("0.5").1, "0.5");
        assert_eq!(first("1.").1, "1.");
        assert_eq!(first("3.25").1, "3.25");
    }

    #[test]
    fn test_string_literals_keep_raw_escapes() {
        assert_eq!(first("\"\"").1, "");
        assert_eq!(first("\"a\\\"b\"").1, "a\\\"b");
        assert_eq!(first("\"a\\nb\"").1, "a\\nb");
    }

    #[test]
    fn test_unterminated_string_fails() {
        let err = Scanner::scan_all("\"abc").unwrap_err();
        assert_eq!(err.kind, ErrorKind::InvalidToken);
    }

    #[test]
    fn test_multi_character_operators() {
        assert_eq!(
            kinds(". .. ... + ++ - -- * ** < <= > >= = == ! != / ~"),
            vec![
                TokenKind::Dot,
                TokenKind::Range,
                TokenKind::Ellipsis,
                TokenKind::Plus,
                TokenKind::PlusPlus,
                TokenKind::Minus,
                TokenKind::MinusMinus,
                TokenKind::Star,
                TokenKind::StarStar,
                TokenKind::Less,
                TokenKind::LessEqual,
                TokenKind::Greater,
                TokenKind::GreaterEqual,
                TokenKind::Assign,
                TokenKind::Equal,
                TokenKind::Not,
                TokenKind::NotEqual,
                TokenKind::Slash,
                TokenKind::Tilde,
                TokenKind::Eof,
            ]
        );
    }

    #[test]
    fn test_punctuation() {
        assert_eq!(
            kinds("( ) { } [ ] , ; ? :"),
            vec![
                TokenKind::LParen,
                TokenKind::RParen,
                TokenKind::LBrace,
                TokenKind::RBrace,
                TokenKind::LBrack,
                TokenKind::RBrack,
                TokenKind::Comma,
                TokenKind::Semicolon,
                TokenKind::Question,
                TokenKind::Colon,
                TokenKind::Eof,
            ]
        );
    }

    #[test]
    fn test_invalid_character_reports_position() {
        let err = Scanner::scan_all("x = 1;\n  @").unwrap_err();
        assert_eq!(err.kind, ErrorKind::InvalidToken);
        let location = err.location.unwrap();
        assert_eq!(location.line, 2);
        assert_eq!(location.column, 3);
    }

    #[test]
    fn test_line_and_column_tracking() {
        let tokens = Scanner::scan_all("a\n  b").unwrap();
        assert_eq!((tokens[0].line, tokens[0].column), (1, 1));
        assert_eq!((tokens[1].line, tokens[1].column), (2, 3));
    }

    #[test]
    fn test_eof_is_repeatable() {
        let mut scanner = Scanner::new("");
        assert_eq!(scanner.next_token().unwrap().kind, TokenKind::Eof);
        assert_eq!(scanner.next_token().unwrap().kind, TokenKind::Eof);
    }

    #[test]
    fn test_zero_followed_by_nine_is_two_tokens() {
        // "09" is a base-10 zero followed by a fresh integer literal.
        let tokens = Scanner::scan_all("09").unwrap();
        assert_eq!(tokens[0].lexeme, "0");
        assert_eq!(tokens[1].lexeme, "9");
    }

    #[test]
    fn test_newline_inside_string_advances_line() {
        let tokens = Scanner::scan_all("\"a\nb\" x").unwrap();
        assert_eq!(tokens[0].kind, TokenKind::StringLit);
        assert_eq!((tokens[0].line, tokens[0].column), (1, 1));
        assert_eq!((tokens[1].line, tokens[1].column), (2, 4));
    }

    #[test]
    fn test_integer_followed_by_range_tokens() {
        // "1..5" keeps the integer intact instead of scanning "1." as a real.
        assert_eq!(
            kinds("1..5"),
            vec![
                TokenKind::IntLit,
                TokenKind::Range,
                TokenKind::IntLit,
                TokenKind::Eof,
            ]
        );
    }

    #[test]
    fn test_operators_without_separating_whitespace() {
        assert_eq!(
            kinds("a<=b!=c"),
            vec![
                TokenKind::Ident,
                TokenKind::LessEqual,
                TokenKind::Ident,
                TokenKind::NotEqual,
                TokenKind::Ident,
                TokenKind::Eof,
            ]
        );
    }

    #[test]
    fn test_incomplete_hex_and_binary_prefixes_fail() {
        assert!(Scanner::scan_all("0x").is_err());
        assert!(Scanner::scan_all("0xg").is_err());
        assert!(Scanner::scan_all("0b2").is_err());
    }

    #[test]
    fn test_keyword_prefix_stays_identifier() {
        let tokens = Scanner::scan_all("functional whileloop").unwrap();
        assert_eq!(tokens[0].kind, TokenKind::Ident);
        assert_eq!(tokens[0].lexeme, "functional");
        assert_eq!(tokens[1].kind, TokenKind::Ident);
    }
}

//! Lexical analyzer for the Pascal dialect
//!
//! Maps source text to a finite stream of tokens, each carrying a kind,
//! a lexeme/value, and a source line. Keywords are recognized
//! case-insensitively; identifiers are case-preserving.

use crate::error::CompileError;
use std::fmt;

#[derive(Debug, Clone, PartialEq)]
pub enum TokenKind {
    // Keywords
    Program,
    Var,
    Integer,
    Real,
    Boolean,
    StringKw,
    Array,
    Of,
    Begin,
    End,
    If,
    Then,
    Else,
    While,
    Do,
    For,
    To,
    Downto,
    Repeat,
    Until,
    Procedure,
    Function,
    Length,
    Div,
    Mod,
    And,
    Or,
    Not,
    True,
    False,
    Readln,
    Writeln,

    // Literals / identifiers
    Ident(String),
    IntConst(i64),
    RealConst(f64),
    StringConst(String),

    // Operators
    Assign, // :=
    Eq,     // =
    Ne,     // <>
    Lt,     // <
    Le,     // <=
    Gt,     // >
    Ge,     // >=
    Plus,
    Minus,
    Times,
    Slash, // /

    // Punctuation
    LParen,
    RParen,
    LBrack,
    RBrack,
    Semicolon,
    Colon,
    Comma,
    DotDot,
    Dot,

    Eof,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Token {
    pub kind: TokenKind,
    pub line: usize,
}

impl fmt::Display for TokenKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TokenKind::Ident(s) => write!(f, "identifier '{}'", s),
            TokenKind::IntConst(n) => write!(f, "integer constant {}", n),
            TokenKind::RealConst(n) => write!(f, "real constant {}", n),
            TokenKind::StringConst(s) => write!(f, "string constant '{}'", s),
            TokenKind::Eof => write!(f, "end of input"),
            other => write!(f, "{:?}", other),
        }
    }
}

fn keyword(lowered: &str) -> Option<TokenKind> {
    use TokenKind::*;
    Some(match lowered {
        "program" => Program,
        "var" => Var,
        "integer" => Integer,
        "real" => Real,
        "boolean" => Boolean,
        "string" => StringKw,
        "array" => Array,
        "of" => Of,
        "begin" => Begin,
        "end" => End,
        "if" => If,
        "then" => Then,
        "else" => Else,
        "while" => While,
        "do" => Do,
        "for" => For,
        "to" => To,
        "downto" => Downto,
        "repeat" => Repeat,
        "until" => Until,
        "procedure" => Procedure,
        "function" => Function,
        "length" => Length,
        "div" => Div,
        "mod" => Mod,
        "and" => And,
        "or" => Or,
        "not" => Not,
        "true" => True,
        "false" => False,
        "readln" => Readln,
        "writeln" => Writeln,
        _ => return None,
    })
}

pub struct Lexer {
    chars: Vec<char>,
    pos: usize,
    line: usize,
}

impl Lexer {
    pub fn new(source: &str) -> Self {
        Lexer { chars: source.chars().collect(), pos: 0, line: 1 }
    }

    /// Tokenize the whole source, returning a finite token list terminated
    /// by `Eof`.
    pub fn tokenize(mut self) -> Result<Vec<Token>, CompileError> {
        let mut tokens = Vec::new();
        loop {
            let tok = self.next_token()?;
            let done = tok.kind == TokenKind::Eof;
            tokens.push(tok);
            if done {
                break;
            }
        }
        Ok(tokens)
    }

    fn peek(&self) -> Option<char> {
        self.chars.get(self.pos).copied()
    }

    fn peek_at(&self, offset: usize) -> Option<char> {
        self.chars.get(self.pos + offset).copied()
    }

    fn advance(&mut self) -> Option<char> {
        let c = self.peek();
        if c == Some('\n') {
            self.line += 1;
        }
        if c.is_some() {
            self.pos += 1;
        }
        c
    }

    fn skip_whitespace_and_comments(&mut self) -> Result<(), CompileError> {
        loop {
            match self.peek() {
                Some(' ') | Some('\t') | Some('\r') | Some('\n') => {
                    self.advance();
                }
                Some('{') => {
                    let start_line = self.line;
                    self.advance();
                    loop {
                        match self.advance() {
                            Some('}') => break,
                            Some(_) => {}
                            None => {
                                return Err(CompileError::lexical(
                                    start_line,
                                    "unterminated comment",
                                ))
                            }
                        }
                    }
                }
                Some('(') if self.peek_at(1) == Some('*') => {
                    let start_line = self.line;
                    self.advance();
                    self.advance();
                    loop {
                        if self.peek() == Some('*') && self.peek_at(1) == Some(')') {
                            self.advance();
                            self.advance();
                            break;
                        }
                        if self.advance().is_none() {
                            return Err(CompileError::lexical(
                                start_line,
                                "unterminated comment",
                            ));
                        }
                    }
                }
                _ => break,
            }
        }
        Ok(())
    }

    fn next_token(&mut self) -> Result<Token, CompileError> {
        self.skip_whitespace_and_comments()?;
        let line = self.line;

        let c = match self.peek() {
            None => return Ok(Token { kind: TokenKind::Eof, line }),
            Some(c) => c,
        };

        if c.is_ascii_digit() {
            return self.lex_number(line);
        }
        if c == '_' || c.is_ascii_alphabetic() {
            return self.lex_ident(line);
        }
        if c == '\'' {
            return self.lex_string(line);
        }

        // Operators and punctuation
        let kind = match c {
            ':' => {
                self.advance();
                if self.peek() == Some('=') {
                    self.advance();
                    TokenKind::Assign
                } else {
                    TokenKind::Colon
                }
            }
            '<' => {
                self.advance();
                match self.peek() {
                    Some('>') => {
                        self.advance();
                        TokenKind::Ne
                    }
                    Some('=') => {
                        self.advance();
                        TokenKind::Le
                    }
                    _ => TokenKind::Lt,
                }
            }
            '>' => {
                self.advance();
                if self.peek() == Some('=') {
                    self.advance();
                    TokenKind::Ge
                } else {
                    TokenKind::Gt
                }
            }
            '=' => {
                self.advance();
                TokenKind::Eq
            }
            '+' => {
                self.advance();
                TokenKind::Plus
            }
            '-' => {
                self.advance();
                TokenKind::Minus
            }
            '*' => {
                self.advance();
                TokenKind::Times
            }
            '/' => {
                self.advance();
                TokenKind::Slash
            }
            '(' => {
                self.advance();
                TokenKind::LParen
            }
            ')' => {
                self.advance();
                TokenKind::RParen
            }
            '[' => {
                self.advance();
                TokenKind::LBrack
            }
            ']' => {
                self.advance();
                TokenKind::RBrack
            }
            ';' => {
                self.advance();
                TokenKind::Semicolon
            }
            ',' => {
                self.advance();
                TokenKind::Comma
            }
            '.' => {
                self.advance();
                if self.peek() == Some('.') {
                    self.advance();
                    TokenKind::DotDot
                } else {
                    TokenKind::Dot
                }
            }
            other => {
                return Err(CompileError::lexical(line, format!("illegal character '{}'", other)))
            }
        };

        Ok(Token { kind, line })
    }

    fn lex_number(&mut self, line: usize) -> Result<Token, CompileError> {
        let start = self.pos;
        while self.peek().is_some_and(|c| c.is_ascii_digit()) {
            self.advance();
        }

        // Real constant: digits '.' digits [ [eE] [+-] digits ]
        if self.peek() == Some('.') && self.peek_at(1).is_some_and(|c| c.is_ascii_digit()) {
            self.advance(); // '.'
            while self.peek().is_some_and(|c| c.is_ascii_digit()) {
                self.advance();
            }
            if matches!(self.peek(), Some('e') | Some('E')) {
                let save = self.pos;
                self.advance();
                if matches!(self.peek(), Some('+') | Some('-')) {
                    self.advance();
                }
                if self.peek().is_some_and(|c| c.is_ascii_digit()) {
                    while self.peek().is_some_and(|c| c.is_ascii_digit()) {
                        self.advance();
                    }
                } else {
                    self.pos = save;
                }
            }
            let text: String = self.chars[start..self.pos].iter().collect();
            let value: f64 = text
                .parse()
                .map_err(|_| CompileError::lexical(line, format!("invalid real constant '{}'", text)))?;
            return Ok(Token { kind: TokenKind::RealConst(value), line });
        }

        let text: String = self.chars[start..self.pos].iter().collect();
        let value: i64 = text
            .parse()
            .map_err(|_| CompileError::lexical(line, format!("invalid integer constant '{}'", text)))?;
        Ok(Token { kind: TokenKind::IntConst(value), line })
    }

    fn lex_ident(&mut self, line: usize) -> Result<Token, CompileError> {
        let start = self.pos;
        while self.peek().is_some_and(|c| c.is_ascii_alphanumeric() || c == '_') {
            self.advance();
        }
        let text: String = self.chars[start..self.pos].iter().collect();
        let kind = keyword(&text.to_lowercase()).unwrap_or(TokenKind::Ident(text));
        Ok(Token { kind, line })
    }

    fn lex_string(&mut self, line: usize) -> Result<Token, CompileError> {
        self.advance(); // opening quote
        let start = self.pos;
        loop {
            match self.advance() {
                Some('\'') => break,
                Some(_) => {}
                None => return Err(CompileError::lexical(line, "unterminated string literal")),
            }
        }
        let content: String = self.chars[start..self.pos - 1].iter().collect();
        Ok(Token { kind: TokenKind::StringConst(content), line })
    }
}

/// Tokenize `source`, returning an end-of-stream-terminated list of tokens.
pub fn tokenize(source: &str) -> Result<Vec<Token>, CompileError> {
    Lexer::new(source).tokenize()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn kinds(src: &str) -> Vec<TokenKind> {
        tokenize(src).unwrap().into_iter().map(|t| t.kind).collect()
    }

    #[test]
    fn keywords_are_case_insensitive() {
        assert_eq!(kinds("BEGIN")[0], TokenKind::Begin);
        assert_eq!(kinds("Begin")[0], TokenKind::Begin);
        assert_eq!(kinds("begin")[0], TokenKind::Begin);
    }

    #[test]
    fn identifiers_preserve_case() {
        let ks = kinds("MyVar");
        assert_eq!(ks[0], TokenKind::Ident("MyVar".to_string()));
    }

    #[test]
    fn dotdot_before_dot() {
        assert_eq!(kinds("1..3"), vec![
            TokenKind::IntConst(1),
            TokenKind::DotDot,
            TokenKind::IntConst(3),
            TokenKind::Eof
        ]);
    }

    #[test]
    fn real_preferred_over_integer() {
        assert_eq!(kinds("5.2")[0], TokenKind::RealConst(5.2));
        // a bare dot after an integer (e.g. "5." followed by non-digit) is not a real
        assert_eq!(kinds("5.")[0], TokenKind::IntConst(5));
    }

    #[test]
    fn real_with_exponent() {
        assert_eq!(kinds("1.5e-3")[0], TokenKind::RealConst(1.5e-3));
    }

    #[test]
    fn string_literal_strips_delimiters() {
        assert_eq!(kinds("'abc'")[0], TokenKind::StringConst("abc".to_string()));
    }

    #[test]
    fn operators() {
        assert_eq!(
            kinds(":= <> <= >= < > ="),
            vec![
                TokenKind::Assign,
                TokenKind::Ne,
                TokenKind::Le,
                TokenKind::Ge,
                TokenKind::Lt,
                TokenKind::Gt,
                TokenKind::Eq,
                TokenKind::Eof
            ]
        );
    }

    #[test]
    fn brace_and_paren_star_comments_are_skipped() {
        assert_eq!(kinds("{ a comment }x"), vec![TokenKind::Ident("x".to_string()), TokenKind::Eof]);
        assert_eq!(kinds("(* multi\nline *)x"), vec![TokenKind::Ident("x".to_string()), TokenKind::Eof]);
    }

    #[test]
    fn line_numbers_advance_across_newlines() {
        let toks = tokenize("x\ny\n  z").unwrap();
        let lines: Vec<usize> = toks.iter().map(|t| t.line).collect();
        assert_eq!(lines, vec![1, 2, 3, 3]);
    }

    #[test]
    fn illegal_character_is_lexical_error() {
        let err = tokenize("x := 1 @ 2").unwrap_err();
        assert!(matches!(err, CompileError::Lexical { line: 1, .. }));
    }

    #[test]
    fn unterminated_string_is_lexical_error() {
        let err = tokenize("'abc").unwrap_err();
        assert!(matches!(err, CompileError::Lexical { .. }));
    }
}

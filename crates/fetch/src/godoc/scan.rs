//! Tokenizer for Go source files

use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum TokenKind {
    Ident,
    Keyword,
    String,
    Char,
    Number,
    Op,
    Comment,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct Token {
    pub kind: TokenKind,
    pub start: usize,
    pub end: usize,
    /// 1-based line of the first byte.
    pub line: usize,
    /// 1-based line of the last byte.
    pub end_line: usize,
}

impl Token {
    pub fn text<'a>(&self, src: &'a str) -> &'a str {
        &src[self.start..self.end]
    }

    pub fn is_op(&self, src: &str, op: &str) -> bool {
        self.kind == TokenKind::Op && self.text(src) == op
    }

    pub fn is_keyword(&self, src: &str, kw: &str) -> bool {
        self.kind == TokenKind::Keyword && self.text(src) == kw
    }

    /// Whether a newline after this token ends the statement.
    pub fn ends_statement(&self, src: &str) -> bool {
        match self.kind {
            TokenKind::Ident | TokenKind::String | TokenKind::Char | TokenKind::Number => true,
            TokenKind::Keyword => matches!(
                self.text(src),
                "break" | "continue" | "fallthrough" | "return"
            ),
            TokenKind::Op => matches!(self.text(src), "++" | "--" | ")" | "]" | "}"),
            TokenKind::Comment => false,
        }
    }
}

/// A lexical error with its line.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SyntaxError {
    pub line: usize,
    pub message: String,
}

impl fmt::Display for SyntaxError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "line {}: {}", self.line, self.message)
    }
}

const KEYWORDS: &[&str] = &[
    "break", "case", "chan", "const", "continue", "default", "defer", "else", "fallthrough",
    "for", "func", "go", "goto", "if", "import", "interface", "map", "package", "range", "return",
    "select", "struct", "switch", "type", "var",
];

const OPS: &[&str] = &[
    "<<=", ">>=", "&^=", "...", "&&", "||", "<-", "++", "--", "==", "!=", "<=", ">=", ":=", "+=",
    "-=", "*=", "/=", "%=", "&=", "|=", "^=", "<<", ">>", "&^", "+", "-", "*", "/", "%", "&", "|",
    "^", "<", ">", "=", "!", "(", ")", "[", "]", "{", "}", ",", ";", ".", ":", "~",
];

struct Scanner<'a> {
    src: &'a str,
    pos: usize,
    line: usize,
}

impl Scanner<'_> {
    fn rest(&self) -> &str {
        &self.src[self.pos..]
    }

    fn peek(&self) -> Option<char> {
        self.rest().chars().next()
    }

    fn bump(&mut self) -> Option<char> {
        let c = self.peek()?;
        self.pos += c.len_utf8();
        if c == '\n' {
            self.line += 1;
        }
        Some(c)
    }

    fn error(&self, message: impl Into<String>) -> SyntaxError {
        SyntaxError {
            line: self.line,
            message: message.into(),
        }
    }

    fn quoted(&mut self, quote: char, what: &str) -> Result<(), SyntaxError> {
        self.bump();
        loop {
            match self.bump() {
                None | Some('\n') => return Err(self.error(format!("unterminated {what}"))),
                Some('\\') => {
                    if self.bump().is_none() {
                        return Err(self.error(format!("unterminated {what}")));
                    }
                }
                Some(c) if c == quote => return Ok(()),
                Some(_) => {}
            }
        }
    }

    fn number(&mut self) {
        let hex = self.rest().starts_with("0x") || self.rest().starts_with("0X");
        let mut prev = '\0';
        while let Some(c) = self.peek() {
            let exponent_sign = (c == '+' || c == '-')
                && if hex {
                    matches!(prev, 'p' | 'P')
                } else {
                    matches!(prev, 'e' | 'E' | 'p' | 'P')
                };
            if c.is_ascii_alphanumeric() || c == '_' || c == '.' || exponent_sign {
                prev = c;
                self.bump();
            } else {
                break;
            }
        }
    }
}

/// Split `src` into tokens, keeping comments and dropping whitespace.
pub(crate) fn tokenize(src: &str) -> Result<Vec<Token>, SyntaxError> {
    let mut s = Scanner { src, pos: 0, line: 1 };
    let mut tokens = Vec::new();

    while let Some(c) = s.peek() {
        if c.is_whitespace() {
            s.bump();
            continue;
        }
        let start = s.pos;
        let line = s.line;
        let kind = if s.rest().starts_with("//") {
            while s.peek().is_some_and(|c| c != '\n') {
                s.bump();
            }
            TokenKind::Comment
        } else if s.rest().starts_with("/*") {
            let Some(len) = s.rest()[2..].find("*/") else {
                return Err(s.error("unterminated comment"));
            };
            let end = s.pos + 2 + len + 2;
            while s.pos < end {
                s.bump();
            }
            TokenKind::Comment
        } else if c == '"' {
            s.quoted('"', "string literal")?;
            TokenKind::String
        } else if c == '\'' {
            s.quoted('\'', "rune literal")?;
            TokenKind::Char
        } else if c == '`' {
            s.bump();
            loop {
                match s.bump() {
                    None => return Err(s.error("unterminated raw string literal")),
                    Some('`') => break,
                    Some(_) => {}
                }
            }
            TokenKind::String
        } else if c.is_ascii_digit()
            || (c == '.' && s.rest()[1..].starts_with(|d: char| d.is_ascii_digit()))
        {
            s.number();
            TokenKind::Number
        } else if c.is_alphabetic() || c == '_' {
            while s.peek().is_some_and(|c| c.is_alphanumeric() || c == '_') {
                s.bump();
            }
            if KEYWORDS.contains(&&src[start..s.pos]) {
                TokenKind::Keyword
            } else {
                TokenKind::Ident
            }
        } else if let Some(op) = OPS.iter().find(|op| s.rest().starts_with(**op)) {
            s.pos += op.len();
            TokenKind::Op
        } else {
            return Err(s.error(format!("unexpected character {c:?}")));
        };
        let end_line = s.line - usize::from(src[start..s.pos].ends_with('\n'));
        tokens.push(Token {
            kind,
            start,
            end: s.pos,
            line,
            end_line,
        });
    }
    Ok(tokens)
}

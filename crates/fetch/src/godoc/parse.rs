//! Top-level declaration parsing
//!
//! Only as much of Go is understood as documentation needs: the package
//! clause, imports, and the extent, names and doc comment of each top-level
//! declaration. Function bodies are skipped by bracket matching.

use std::collections::HashMap;

use super::scan::{tokenize, SyntaxError, Token, TokenKind};
use super::RenderLimits;

/// Deepest bracket nesting accepted in a declaration.
pub const MAX_NESTING: usize = 1_000;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeclKind {
    Const,
    Var,
    Type,
    Func,
    Method,
}

/// One top-level declaration, rendered as source text.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Decl {
    pub kind: DeclKind,
    /// Declared identifiers. For methods, the method name.
    pub names: Vec<String>,
    /// Receiver base type name, for methods.
    pub receiver: Option<String>,
    pub doc: String,
    /// Declaration source with oversized literals elided. Function bodies are omitted.
    pub text: String,
}

impl Decl {
    /// Whether the declaration would appear in package documentation.
    #[must_use]
    pub fn is_exported(&self) -> bool {
        let exported = self.names.iter().any(|n| is_exported(n));
        match &self.receiver {
            Some(recv) => exported && is_exported(recv),
            None => exported,
        }
    }
}

#[must_use]
pub fn is_exported(name: &str) -> bool {
    name.chars().next().is_some_and(char::is_uppercase)
}

/// What documentation needs from one Go file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SourceFile {
    pub name: String,
    pub package_name: String,
    /// Comment immediately preceding the package clause.
    pub package_doc: Option<String>,
    pub imports: Vec<String>,
    pub decls: Vec<Decl>,
}

/// Parse one file.
///
/// # Errors
///
/// Returns a `SyntaxError` for unterminated literals or comments, a missing
/// package clause, unbalanced brackets, or unexpected top-level tokens.
pub fn parse_file(name: &str, src: &str, limits: &RenderLimits) -> Result<SourceFile, SyntaxError> {
    let tokens = tokenize(src)?;
    let p = Parser {
        src,
        tokens: &tokens,
        limits,
    };
    p.file(name)
}

struct Parser<'a> {
    src: &'a str,
    tokens: &'a [Token],
    limits: &'a RenderLimits,
}

impl Parser<'_> {
    fn error(&self, idx: usize, message: impl Into<String>) -> SyntaxError {
        let line = self
            .tokens
            .get(idx)
            .or(self.tokens.last())
            .map_or(1, |t| t.line);
        SyntaxError {
            line,
            message: message.into(),
        }
    }

    fn text(&self, idx: usize) -> &str {
        self.tokens[idx].text(self.src)
    }

    fn next_code(&self, mut idx: usize) -> Option<usize> {
        while idx < self.tokens.len() {
            if self.tokens[idx].kind != TokenKind::Comment {
                return Some(idx);
            }
            idx += 1;
        }
        None
    }

    fn prev_code(&self, idx: usize) -> Option<usize> {
        (0..idx)
            .rev()
            .find(|&i| self.tokens[i].kind != TokenKind::Comment)
    }

    /// The comment group directly above token `idx`, cleaned.
    fn doc_for(&self, idx: usize) -> String {
        let mut first = idx;
        let mut line = self.tokens[idx].line;
        while first > 0 {
            let prev = &self.tokens[first - 1];
            if prev.kind != TokenKind::Comment || prev.end_line + 1 < line {
                break;
            }
            first -= 1;
            line = prev.line;
        }
        // A comment trailing code on the same line does not start a doc group.
        if first < idx && first > 0 && self.tokens[first - 1].end_line == self.tokens[first].line {
            first += 1;
        }
        clean_comments(self.tokens[first..idx].iter().map(|t| t.text(self.src)))
    }

    fn matching_close(&self, open: usize) -> Result<usize, SyntaxError> {
        let mut depth = 0usize;
        for i in open..self.tokens.len() {
            let t = &self.tokens[i];
            if t.kind != TokenKind::Op {
                continue;
            }
            match t.text(self.src) {
                "(" | "[" | "{" => {
                    depth += 1;
                    if depth > MAX_NESTING {
                        return Err(self.error(i, "brackets nested too deeply"));
                    }
                }
                ")" | "]" | "}" => {
                    depth = depth
                        .checked_sub(1)
                        .ok_or_else(|| self.error(i, "unbalanced brackets"))?;
                    if depth == 0 {
                        return Ok(i);
                    }
                }
                _ => {}
            }
        }
        Err(self.error(open, "unbalanced brackets"))
    }

    /// Index of the last token of the statement starting at `start`, using
    /// Go's semicolon insertion rule.
    fn statement_end(&self, start: usize) -> Result<usize, SyntaxError> {
        let mut depth = 0usize;
        let mut last = start;
        let mut i = start;
        while i < self.tokens.len() {
            let t = &self.tokens[i];
            if t.kind == TokenKind::Comment {
                i += 1;
                continue;
            }
            if depth == 0 && i > start {
                let prev = &self.tokens[last];
                if t.is_op(self.src, ";")
                    || (t.line > prev.end_line && prev.ends_statement(self.src))
                {
                    return Ok(last);
                }
            }
            if t.kind == TokenKind::Op {
                match t.text(self.src) {
                    "(" | "[" | "{" => {
                        depth += 1;
                        if depth > MAX_NESTING {
                            return Err(self.error(i, "brackets nested too deeply"));
                        }
                    }
                    ")" | "]" | "}" => {
                        depth = depth
                            .checked_sub(1)
                            .ok_or_else(|| self.error(i, "unbalanced brackets"))?;
                    }
                    _ => {}
                }
            }
            last = i;
            i += 1;
        }
        if depth == 0 {
            Ok(last)
        } else {
            Err(self.error(start, "unbalanced brackets"))
        }
    }

    fn file(&self, name: &str) -> Result<SourceFile, SyntaxError> {
        let pkg = self
            .next_code(0)
            .filter(|&i| self.tokens[i].is_keyword(self.src, "package"))
            .ok_or_else(|| self.error(0, "expected package clause"))?;
        let name_idx = self
            .next_code(pkg + 1)
            .filter(|&i| self.tokens[i].kind == TokenKind::Ident)
            .ok_or_else(|| self.error(pkg, "expected package name"))?;
        let package_name = self.text(name_idx).to_string();
        let doc = self.doc_for(pkg);

        let mut file = SourceFile {
            name: name.to_string(),
            package_name,
            package_doc: (!doc.is_empty()).then_some(doc),
            imports: Vec::new(),
            decls: Vec::new(),
        };

        let mut i = name_idx + 1;
        while let Some(idx) = self.next_code(i) {
            let token = self.tokens[idx];
            if token.is_op(self.src, ";") {
                i = idx + 1;
                continue;
            }
            let end = match token.kind {
                TokenKind::Keyword if self.text(idx) == "import" => {
                    let end = self.statement_end(idx)?;
                    file.imports.extend(
                        self.tokens[idx..=end]
                            .iter()
                            .filter(|t| t.kind == TokenKind::String)
                            .map(|t| unquote(t.text(self.src))),
                    );
                    end
                }
                TokenKind::Keyword if self.text(idx) == "func" => {
                    let (decl, end) = self.func_decl(idx)?;
                    file.decls.push(decl);
                    end
                }
                TokenKind::Keyword if matches!(self.text(idx), "type" | "const" | "var") => {
                    let end = self.statement_end(idx)?;
                    file.decls.push(self.gen_decl(idx, end));
                    end
                }
                _ => {
                    return Err(self.error(
                        idx,
                        format!("unexpected {:?} at top level", self.text(idx)),
                    ))
                }
            };
            i = end + 1;
        }
        Ok(file)
    }

    fn gen_decl(&self, start: usize, end: usize) -> Decl {
        let kind = match self.text(start) {
            "type" => DeclKind::Type,
            "const" => DeclKind::Const,
            _ => DeclKind::Var,
        };
        let mut names = Vec::new();
        let first = self.next_code(start + 1).unwrap_or(end);
        if self.tokens[first].is_op(self.src, "(") {
            // One spec per line (or after `;`) inside the group.
            let mut expect_name = true;
            let mut depth = 0usize;
            let mut prev_line = self.tokens[first].line;
            for i in first + 1..end {
                let t = &self.tokens[i];
                if t.kind == TokenKind::Comment {
                    continue;
                }
                if depth == 0 && t.line > prev_line {
                    expect_name = true;
                }
                prev_line = t.end_line;
                match t.kind {
                    TokenKind::Ident if depth == 0 && expect_name => {
                        names.push(self.text(i).to_string());
                        expect_name = false;
                    }
                    TokenKind::Op => match self.text(i) {
                        "(" | "[" | "{" => depth += 1,
                        ")" | "]" | "}" => depth = depth.saturating_sub(1),
                        ";" if depth == 0 => expect_name = true,
                        _ => {}
                    },
                    _ => {}
                }
            }
        } else {
            let mut i = first;
            while i <= end && self.tokens[i].kind == TokenKind::Ident {
                names.push(self.text(i).to_string());
                if kind == DeclKind::Type || !self.tokens.get(i + 1).is_some_and(|t| t.is_op(self.src, ",")) {
                    break;
                }
                i += 2;
            }
        }
        Decl {
            kind,
            names,
            receiver: None,
            doc: self.doc_for(start),
            text: self.render(start, end),
        }
    }

    fn func_decl(&self, start: usize) -> Result<(Decl, usize), SyntaxError> {
        let mut i = self
            .next_code(start + 1)
            .ok_or_else(|| self.error(start, "expected function name"))?;
        let mut receiver = None;
        if self.tokens[i].is_op(self.src, "(") {
            let close = self.matching_close(i)?;
            let mut depth = 0usize;
            for j in i + 1..close {
                let t = &self.tokens[j];
                match t.kind {
                    TokenKind::Op if matches!(t.text(self.src), "[" | "(") => depth += 1,
                    TokenKind::Op if matches!(t.text(self.src), "]" | ")") => {
                        depth = depth.saturating_sub(1);
                    }
                    TokenKind::Ident if depth == 0 => receiver = Some(t.text(self.src).to_string()),
                    _ => {}
                }
            }
            i = self
                .next_code(close + 1)
                .ok_or_else(|| self.error(close, "expected method name"))?;
        }
        if self.tokens[i].kind != TokenKind::Ident {
            return Err(self.error(i, "expected function name"));
        }
        let name = self.text(i).to_string();

        // Find the body: the first `{` at depth zero after the parameter
        // list that does not open a struct or interface type.
        let mut depth = 0usize;
        let mut last = i;
        let mut j = i + 1;
        let mut sig_end = None;
        let mut body = None;
        while j < self.tokens.len() {
            let t = &self.tokens[j];
            if t.kind == TokenKind::Comment {
                j += 1;
                continue;
            }
            if depth == 0 {
                let prev = &self.tokens[last];
                if t.is_op(self.src, "{")
                    && !(prev.is_keyword(self.src, "struct") || prev.is_keyword(self.src, "interface"))
                {
                    sig_end = Some(last);
                    body = Some(j);
                    break;
                }
                if t.is_op(self.src, ";") || (t.line > prev.end_line && prev.ends_statement(self.src)) {
                    sig_end = Some(last);
                    break;
                }
            }
            if t.kind == TokenKind::Op {
                match t.text(self.src) {
                    "(" | "[" | "{" => depth += 1,
                    ")" | "]" | "}" => depth = depth.saturating_sub(1),
                    _ => {}
                }
            }
            last = j;
            j += 1;
        }
        let sig_end = sig_end.unwrap_or(last);
        let end = match body {
            Some(open) => self.matching_close(open)?,
            None => sig_end,
        };
        let decl = Decl {
            kind: if receiver.is_some() {
                DeclKind::Method
            } else {
                DeclKind::Func
            },
            names: vec![name],
            receiver,
            doc: self.doc_for(start),
            text: self.src[self.tokens[start].start..self.tokens[sig_end].end].to_string(),
        };
        Ok((decl, end))
    }

    /// Cut points for composite literals in `start..=end` with more than
    /// the configured number of elements: the comma after the last kept
    /// element, mapped to the closing brace and the omitted count.
    ///
    /// Brackets are matched in one pass with an explicit stack, so the cost
    /// is linear in the token count regardless of nesting.
    fn composite_cuts(&self, start: usize, end: usize) -> HashMap<usize, (usize, usize)> {
        struct Frame {
            open: usize,
            composite: bool,
            commas: usize,
            cut_at: Option<usize>,
        }

        let max = self.limits.max_composite_elements;
        let mut cuts = HashMap::new();
        let mut stack: Vec<Frame> = Vec::new();
        for i in start..=end {
            let t = &self.tokens[i];
            if t.kind != TokenKind::Op {
                continue;
            }
            match t.text(self.src) {
                open @ ("(" | "[" | "{") => {
                    let composite = open == "{"
                        && !self.prev_code(i).is_some_and(|p| {
                            self.tokens[p].is_keyword(self.src, "struct")
                                || self.tokens[p].is_keyword(self.src, "interface")
                        });
                    stack.push(Frame {
                        open: i,
                        composite,
                        commas: 0,
                        cut_at: None,
                    });
                }
                ")" | "]" | "}" => {
                    let Some(frame) = stack.pop() else {
                        continue;
                    };
                    if !frame.composite || max == 0 {
                        continue;
                    }
                    let last = self.prev_code(i);
                    let trailing = last.is_some_and(|p| self.tokens[p].is_op(self.src, ","));
                    let elements = frame.commas + usize::from(!trailing && last != Some(frame.open));
                    if let Some(cut_at) = frame.cut_at.filter(|_| elements > max) {
                        cuts.insert(cut_at, (i, elements - max));
                    }
                }
                "," => {
                    if let Some(frame) = stack.last_mut() {
                        frame.commas += 1;
                        if frame.commas == max {
                            frame.cut_at = Some(i);
                        }
                    }
                }
                _ => {}
            }
        }
        cuts
    }

    /// Source of tokens `start..=end`, with long string literals shortened
    /// and long composite literals cut after the configured element count.
    fn render(&self, start: usize, end: usize) -> String {
        let cuts = self.composite_cuts(start, end);

        let mut out = String::new();
        let mut cursor = self.tokens[start].start;
        let mut i = start;
        while i <= end {
            let t = self.tokens[i];
            if t.kind == TokenKind::String && t.end - t.start > self.limits.max_literal_len + 2 {
                out.push_str(&self.src[cursor..t.start]);
                out.push_str(&shorten_literal(t.text(self.src), self.limits.max_literal_len));
                cursor = t.end;
            } else if let Some(&(close, omitted)) = cuts.get(&i) {
                out.push_str(&self.src[cursor..t.end]);
                out.push_str(&format!(" /* {omitted} elements omitted */ "));
                cursor = self.tokens[close].start;
                i = close;
                continue;
            }
            i += 1;
        }
        out.push_str(&self.src[cursor..self.tokens[end].end]);
        out
    }
}

fn shorten_literal(lit: &str, max: usize) -> String {
    let quote = lit.chars().next().unwrap_or('"');
    let body = &lit[1..lit.len() - 1];
    let mut cut = max.min(body.len());
    while !body.is_char_boundary(cut) {
        cut -= 1;
    }
    // Do not split an escape sequence.
    let kept = &body[..cut];
    let kept = match kept.rfind('\\') {
        Some(idx) if quote == '"' && kept.len() - idx < 10 => &kept[..idx],
        _ => kept,
    };
    format!("{quote}{kept}{quote} + /* {} bytes omitted */ {quote}{quote}", body.len() - kept.len())
}

fn unquote(lit: &str) -> String {
    lit.trim_matches(|c| c == '"' || c == '`').to_string()
}

/// Strip comment markers and directives (`//go:generate`, `// +build`).
pub(crate) fn clean_comments<'a>(comments: impl Iterator<Item = &'a str>) -> String {
    let mut lines: Vec<String> = Vec::new();
    for comment in comments {
        if let Some(body) = comment.strip_prefix("//") {
            if is_directive(body) {
                continue;
            }
            lines.push(body.strip_prefix(' ').unwrap_or(body).trim_end().to_string());
        } else if let Some(body) = comment.strip_prefix("/*").and_then(|c| c.strip_suffix("*/")) {
            for line in body.lines() {
                let line = line.trim_end();
                let line = line.trim_start().strip_prefix("* ").unwrap_or(line.trim_start());
                lines.push(line.to_string());
            }
        }
    }
    while lines.first().is_some_and(String::is_empty) {
        lines.remove(0);
    }
    while lines.last().is_some_and(String::is_empty) {
        lines.pop();
    }
    lines.join("\n")
}

fn is_directive(body: &str) -> bool {
    if body.trim_start().starts_with("+build") {
        return true;
    }
    match body.split_once(':') {
        Some((prefix, rest)) => {
            !prefix.is_empty()
                && prefix.bytes().all(|b| b.is_ascii_lowercase() || b.is_ascii_digit())
                && rest.starts_with(|c: char| c.is_ascii_lowercase())
        }
        None => false,
    }
}

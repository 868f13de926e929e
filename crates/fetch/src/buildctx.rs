//! Build constraints
//!
//! Decides which `.go` files apply to a (GOOS, GOARCH) pair from the file
//! name suffix (`_linux.go`, `_windows_amd64.go`) and the constraint lines in
//! the file header (`//go:build` expressions and legacy `// +build` lines).
//! Everything here is pure and independent of archive I/O.

use modsite_types::BuildContext;
use thiserror::Error;

const KNOWN_OS: &[&str] = &[
    "aix", "android", "darwin", "dragonfly", "freebsd", "hurd", "illumos", "ios", "js", "linux",
    "nacl", "netbsd", "openbsd", "plan9", "solaris", "wasip1", "windows", "zos",
];

const KNOWN_ARCH: &[&str] = &[
    "386", "amd64", "amd64p32", "arm", "armbe", "arm64", "arm64be", "loong64", "mips", "mipsle",
    "mips64", "mips64le", "mips64p32", "mips64p32le", "ppc", "ppc64", "ppc64le", "riscv",
    "riscv64", "s390", "s390x", "sparc", "sparc64", "wasm",
];

const UNIX_OS: &[&str] = &[
    "aix", "android", "darwin", "dragonfly", "freebsd", "hurd", "illumos", "ios", "linux",
    "netbsd", "openbsd", "solaris",
];

/// Most tags and operators accepted in one constraint line.
pub const MAX_CONSTRAINT_TERMS: usize = 1_000;

/// Deepest nesting of parentheses and negations in a `//go:build` line.
pub const MAX_CONSTRAINT_DEPTH: usize = 100;

/// Longest excerpt of an offending line kept in the error.
const MAX_REPORTED_LINE: usize = 80;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("invalid build constraint: {line}")]
pub struct InvalidConstraint {
    pub line: String,
}

/// A parsed build-constraint expression.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Constraint {
    Tag(String),
    Not(Box<Constraint>),
    And(Vec<Constraint>),
    Or(Vec<Constraint>),
}

impl Constraint {
    /// Parse the expression of a `//go:build` line.
    ///
    /// # Errors
    ///
    /// Returns `InvalidConstraint` on a syntax error.
    pub fn parse(expr: &str) -> Result<Self, InvalidConstraint> {
        let tokens = lex(expr).ok_or_else(|| invalid(expr))?;
        if tokens.len() > MAX_CONSTRAINT_TERMS {
            return Err(invalid(expr));
        }
        let mut parser = ExprParser {
            tokens,
            pos: 0,
            depth: 0,
        };
        let constraint = parser.or().ok_or_else(|| invalid(expr))?;
        if parser.pos != parser.tokens.len() {
            return Err(invalid(expr));
        }
        Ok(constraint)
    }

    /// Parse the arguments of one `// +build` line: space-separated
    /// alternatives of comma-separated terms, each optionally negated.
    ///
    /// # Errors
    ///
    /// Returns `InvalidConstraint` if a term is empty or not a tag, or the
    /// line has more than `MAX_CONSTRAINT_TERMS` terms.
    pub fn parse_plus_build(args: &str) -> Result<Self, InvalidConstraint> {
        let mut alternatives = Vec::new();
        let mut terms = 0usize;
        for alternative in args.split_whitespace() {
            let mut conj = Vec::new();
            for term in alternative.split(',') {
                terms += 1;
                if terms > MAX_CONSTRAINT_TERMS {
                    return Err(invalid(args));
                }
                let (negated, tag) = match term.strip_prefix('!') {
                    Some(tag) => (true, tag),
                    None => (false, term),
                };
                if !is_tag(tag) {
                    return Err(invalid(args));
                }
                let mut leaf = Self::Tag(tag.to_string());
                if negated {
                    leaf = Self::Not(Box::new(leaf));
                }
                conj.push(leaf);
            }
            alternatives.push(Self::all(conj));
        }
        if alternatives.is_empty() {
            return Err(invalid(args));
        }
        Ok(Self::any(alternatives))
    }

    /// Conjunction of `terms`, or the single term itself.
    fn all(mut terms: Vec<Self>) -> Self {
        if terms.len() == 1 {
            terms.remove(0)
        } else {
            Self::And(terms)
        }
    }

    /// Disjunction of `terms`, or the single term itself.
    fn any(mut terms: Vec<Self>) -> Self {
        if terms.len() == 1 {
            terms.remove(0)
        } else {
            Self::Or(terms)
        }
    }

    /// Evaluate with `ok` deciding each tag.
    pub fn eval(&self, ok: &impl Fn(&str) -> bool) -> bool {
        match self {
            Self::Tag(tag) => ok(tag),
            Self::Not(inner) => !inner.eval(ok),
            Self::And(terms) => terms.iter().all(|t| t.eval(ok)),
            Self::Or(terms) => terms.iter().any(|t| t.eval(ok)),
        }
    }
}

fn invalid(line: &str) -> InvalidConstraint {
    let line = line.trim();
    let mut cut = line.len().min(MAX_REPORTED_LINE);
    while !line.is_char_boundary(cut) {
        cut -= 1;
    }
    let mut excerpt = line[..cut].to_string();
    if cut < line.len() {
        excerpt.push_str("...");
    }
    InvalidConstraint { line: excerpt }
}

fn is_tag(s: &str) -> bool {
    !s.is_empty()
        && s
            .chars()
            .all(|c| c.is_alphanumeric() || c == '_' || c == '.')
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum ExprToken {
    Tag(String),
    Not,
    And,
    Or,
    Open,
    Close,
}

fn lex(expr: &str) -> Option<Vec<ExprToken>> {
    let mut tokens = Vec::new();
    let mut chars = expr.char_indices().peekable();
    while let Some((idx, c)) = chars.next() {
        match c {
            ' ' | '\t' => {}
            '!' => tokens.push(ExprToken::Not),
            '(' => tokens.push(ExprToken::Open),
            ')' => tokens.push(ExprToken::Close),
            '&' => {
                chars.next_if(|&(_, c)| c == '&')?;
                tokens.push(ExprToken::And);
            }
            '|' => {
                chars.next_if(|&(_, c)| c == '|')?;
                tokens.push(ExprToken::Or);
            }
            c if c.is_alphanumeric() || c == '_' || c == '.' => {
                let mut end = idx + c.len_utf8();
                while let Some((i, c)) =
                    chars.next_if(|&(_, c)| c.is_alphanumeric() || c == '_' || c == '.')
                {
                    end = i + c.len_utf8();
                }
                tokens.push(ExprToken::Tag(expr[idx..end].to_string()));
            }
            _ => return None,
        }
    }
    Some(tokens)
}

struct ExprParser {
    tokens: Vec<ExprToken>,
    pos: usize,
    depth: usize,
}

impl ExprParser {
    fn peek(&self) -> Option<&ExprToken> {
        self.tokens.get(self.pos)
    }

    fn or(&mut self) -> Option<Constraint> {
        let mut terms = vec![self.and()?];
        while self.peek() == Some(&ExprToken::Or) {
            self.pos += 1;
            terms.push(self.and()?);
        }
        Some(Constraint::any(terms))
    }

    fn and(&mut self) -> Option<Constraint> {
        let mut terms = vec![self.not()?];
        while self.peek() == Some(&ExprToken::And) {
            self.pos += 1;
            terms.push(self.not()?);
        }
        Some(Constraint::all(terms))
    }

    fn not(&mut self) -> Option<Constraint> {
        let token = self.tokens.get(self.pos)?.clone();
        self.pos += 1;
        match token {
            ExprToken::Not => {
                self.descend()?;
                let inner = self.not();
                self.depth -= 1;
                Some(Constraint::Not(Box::new(inner?)))
            }
            ExprToken::Open => {
                self.descend()?;
                let inner = self.or();
                self.depth -= 1;
                let inner = inner?;
                if self.peek() != Some(&ExprToken::Close) {
                    return None;
                }
                self.pos += 1;
                Some(inner)
            }
            ExprToken::Tag(tag) => Some(Constraint::Tag(tag)),
            _ => None,
        }
    }

    fn descend(&mut self) -> Option<()> {
        if self.depth >= MAX_CONSTRAINT_DEPTH {
            return None;
        }
        self.depth += 1;
        Some(())
    }
}

/// Whether `tag` is satisfied in `ctx`.
///
/// The OS aliases (`android` implies `linux`, `ios` implies `darwin`,
/// `illumos` implies `solaris`) and the `unix` group apply. Release tags
/// `go1.N`, the `gc` compiler and `cgo` are always on; `ignore` and any
/// other tag are off.
#[must_use]
pub fn match_tag(tag: &str, ctx: &BuildContext) -> bool {
    let goos = ctx.goos.as_str();
    if tag == goos || tag == ctx.goarch {
        return true;
    }
    match tag {
        "linux" => goos == "android",
        "darwin" => goos == "ios",
        "solaris" => goos == "illumos",
        "unix" => UNIX_OS.contains(&goos),
        "gc" | "cgo" => true,
        _ => tag
            .strip_prefix("go1.")
            .is_some_and(|minor| !minor.is_empty() && minor.bytes().all(|b| b.is_ascii_digit())),
    }
}

/// Whether the `_GOOS`, `_GOARCH` or `_GOOS_GOARCH` suffix of `file_name`
/// (if any) matches `ctx`.
#[must_use]
pub fn good_os_arch_file(file_name: &str, ctx: &BuildContext) -> bool {
    let stem = file_name.split('.').next().unwrap_or(file_name);
    let Some(idx) = stem.find('_') else {
        return true;
    };
    let mut parts: Vec<&str> = stem[idx..].split('_').collect();
    if parts.last() == Some(&"test") {
        parts.pop();
    }
    let n = parts.len();
    if n >= 2 && KNOWN_OS.contains(&parts[n - 2]) && KNOWN_ARCH.contains(&parts[n - 1]) {
        return match_tag(parts[n - 2], ctx) && match_tag(parts[n - 1], ctx);
    }
    if n >= 1 && (KNOWN_OS.contains(&parts[n - 1]) || KNOWN_ARCH.contains(&parts[n - 1])) {
        return match_tag(parts[n - 1], ctx);
    }
    true
}

/// Constraints found in one file's header.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct FileConstraints {
    expr: Option<Constraint>,
}

impl FileConstraints {
    /// Scan the header of a Go source file: the blank lines and comments
    /// before the package clause.
    ///
    /// A `//go:build` line takes precedence over `// +build` lines. Legacy
    /// lines only count when their comment block is followed by a blank line.
    ///
    /// # Errors
    ///
    /// Returns `InvalidConstraint` if a constraint line does not parse or
    /// more than one `//go:build` line is present.
    pub fn from_source(src: &str) -> Result<Self, InvalidConstraint> {
        let mut go_build: Option<Constraint> = None;
        let mut committed: Vec<Constraint> = Vec::new();
        let mut pending: Vec<Constraint> = Vec::new();
        let mut in_block = false;

        for line in src.lines() {
            let line = line.trim();
            if in_block {
                if line.contains("*/") {
                    in_block = false;
                }
                continue;
            }
            if line.is_empty() {
                committed.append(&mut pending);
                continue;
            }
            if let Some(comment) = line.strip_prefix("//") {
                if let Some(expr) = comment.strip_prefix("go:build") {
                    if !(expr.is_empty() || expr.starts_with([' ', '\t'])) {
                        continue;
                    }
                    if go_build.is_some() {
                        return Err(invalid(line));
                    }
                    go_build = Some(Constraint::parse(expr)?);
                } else if let Some(args) = comment.trim_start().strip_prefix("+build") {
                    if args.is_empty() || args.starts_with([' ', '\t']) {
                        pending.push(Constraint::parse_plus_build(args)?);
                    }
                }
                continue;
            }
            if line.starts_with("/*") {
                in_block = !line[2..].contains("*/");
                continue;
            }
            break;
        }

        let expr = go_build.or_else(|| {
            if committed.is_empty() {
                None
            } else {
                Some(Constraint::all(committed))
            }
        });
        Ok(Self { expr })
    }

    /// Whether a file with these constraints named `file_name` is part of
    /// the package in `ctx`.
    #[must_use]
    pub fn matches(&self, file_name: &str, ctx: &BuildContext) -> bool {
        good_os_arch_file(file_name, ctx)
            && self
                .expr
                .as_ref()
                .is_none_or(|expr| expr.eval(&|tag| match_tag(tag, ctx)))
    }
}

/// The subset of `contexts` in which the file applies.
///
/// # Errors
///
/// Returns `InvalidConstraint` if the file header does not parse.
pub fn matching_contexts(
    file_name: &str,
    src: &str,
    contexts: &[BuildContext],
) -> Result<Vec<BuildContext>, InvalidConstraint> {
    let constraints = FileConstraints::from_source(src)?;
    Ok(contexts
        .iter()
        .filter(|ctx| constraints.matches(file_name, ctx))
        .cloned()
        .collect())
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn ctx(s: &str) -> BuildContext {
        BuildContext::parse(s).unwrap()
    }

    fn names(contexts: &[BuildContext]) -> Vec<String> {
        contexts.iter().map(ToString::to_string).collect()
    }

    #[test]
    fn file_name_suffixes() {
        let linux = ctx("linux/amd64");
        let windows = ctx("windows/amd64");
        assert!(good_os_arch_file("file.go", &linux));
        assert!(good_os_arch_file("linux.go", &windows));
        assert!(good_os_arch_file("file_linux.go", &linux));
        assert!(!good_os_arch_file("file_linux.go", &windows));
        assert!(good_os_arch_file("file_windows_amd64.go", &windows));
        assert!(!good_os_arch_file("file_windows_386.go", &windows));
        assert!(!good_os_arch_file("file_arm64.go", &linux));
        assert!(good_os_arch_file("file_unix.go", &windows));
        assert!(good_os_arch_file("file_linux_test.go", &linux));
    }

    #[test]
    fn go_build_expressions() {
        let src = "//go:build (linux || darwin) && !386\n\npackage p\n";
        let contexts = BuildContext::defaults();
        assert_eq!(
            names(&matching_contexts("p.go", src, &contexts).unwrap()),
            vec!["linux/amd64", "darwin/amd64"]
        );
    }

    #[test]
    fn unix_and_release_tags() {
        let contexts = BuildContext::defaults();
        let src = "//go:build unix && go1.18\n\npackage p\n";
        assert_eq!(
            names(&matching_contexts("p.go", src, &contexts).unwrap()),
            vec!["linux/amd64", "darwin/amd64"]
        );
        let src = "//go:build ignore\n\npackage main\n";
        assert!(matching_contexts("gen.go", src, &contexts).unwrap().is_empty());
    }

    #[test]
    fn plus_build_lines_need_blank_line() {
        let contexts = BuildContext::defaults();
        let src = "// +build windows\n\npackage p\n";
        assert_eq!(
            names(&matching_contexts("p.go", src, &contexts).unwrap()),
            vec!["windows/amd64"]
        );
        // Part of the package doc comment, not a constraint.
        let src = "// +build windows\npackage p\n";
        assert_eq!(matching_contexts("p.go", src, &contexts).unwrap().len(), 4);
    }

    #[test]
    fn plus_build_lines_combine() {
        let contexts = BuildContext::defaults();
        let src = "// +build linux,amd64 js\n// +build !windows\n\npackage p\n";
        assert_eq!(
            names(&matching_contexts("p.go", src, &contexts).unwrap()),
            vec!["linux/amd64", "js/wasm"]
        );
    }

    #[test]
    fn go_build_wins_over_plus_build() {
        let contexts = BuildContext::defaults();
        let src = "//go:build js\n// +build linux\n\npackage p\n";
        assert_eq!(
            names(&matching_contexts("p.go", src, &contexts).unwrap()),
            vec!["js/wasm"]
        );
    }

    #[test]
    fn header_ends_at_package_clause() {
        let contexts = BuildContext::defaults();
        let src = "/* header\n   comment */\npackage p\n\n//go:build windows\n";
        assert_eq!(matching_contexts("p.go", src, &contexts).unwrap().len(), 4);
    }

    #[test]
    fn invalid_constraints() {
        assert!(Constraint::parse("linux &&").is_err());
        assert!(Constraint::parse("(linux").is_err());
        assert!(Constraint::parse("linux & darwin").is_err());
        assert!(FileConstraints::from_source("//go:build a\n//go:build b\npackage p").is_err());
    }

    #[test]
    fn aliases() {
        assert!(match_tag("linux", &ctx("android/arm64")));
        assert!(match_tag("darwin", &ctx("ios/arm64")));
        assert!(match_tag("unix", &ctx("darwin/amd64")));
        assert!(!match_tag("unix", &ctx("windows/amd64")));
        assert!(!match_tag("unix", &ctx("js/wasm")));
        assert!(match_tag("cgo", &ctx("linux/amd64")));
    }

    proptest! {
        #[test]
        fn negation_partitions_contexts(tag in prop::sample::select(vec![
            "linux", "windows", "darwin", "js", "amd64", "wasm", "unix", "cgo", "ignore",
        ])) {
            let contexts = BuildContext::defaults();
            let pos = matching_contexts("p.go", &format!("//go:build {tag}\n\npackage p"), &contexts).unwrap();
            let neg = matching_contexts("p.go", &format!("//go:build !{tag}\n\npackage p"), &contexts).unwrap();
            prop_assert_eq!(pos.len() + neg.len(), contexts.len());
            prop_assert!(pos.iter().all(|c| !neg.contains(c)));
        }
    }

    #[test]
    fn oversized_constraints_are_rejected() {
        let contexts = BuildContext::defaults();

        let src = format!("//go:build {}linux\n\npackage a\n", "!".repeat(300_000));
        let err = matching_contexts("a.go", &src, &contexts).unwrap_err();
        assert!(err.line.len() <= MAX_REPORTED_LINE + 3);

        let src = format!("// +build {}\n\npackage a\n", vec!["linux"; 300_000].join(","));
        assert!(matching_contexts("a.go", &src, &contexts).is_err());

        let src = format!("//go:build {}\n\npackage a\n", vec!["linux"; 300_000].join(" || "));
        assert!(matching_contexts("a.go", &src, &contexts).is_err());

        let nested = format!("{}linux{}", "(".repeat(MAX_CONSTRAINT_DEPTH + 1), ")".repeat(MAX_CONSTRAINT_DEPTH + 1));
        assert!(Constraint::parse(&nested).is_err());
    }

    #[test]
    fn constraints_within_limits_still_parse() {
        let nested = format!("{}linux{}", "(".repeat(MAX_CONSTRAINT_DEPTH), ")".repeat(MAX_CONSTRAINT_DEPTH));
        assert_eq!(Constraint::parse(&nested).unwrap(), Constraint::Tag("linux".into()));

        let chain = vec!["linux"; 400].join(" && ");
        assert!(matches!(Constraint::parse(&chain).unwrap(), Constraint::And(terms) if terms.len() == 400));

        // Many legacy lines combine into one flat conjunction.
        let contexts = BuildContext::defaults();
        let src = format!("{}\npackage p\n", "// +build linux\n".repeat(5_000));
        assert_eq!(
            names(&matching_contexts("p.go", &src, &contexts).unwrap()),
            vec!["linux/amd64"]
        );
    }
}

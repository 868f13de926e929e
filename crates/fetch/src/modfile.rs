//! go.mod parsing
//!
//! Only what ingestion needs is extracted: the declared module path, the
//! deprecation notice, the `go` version, requirements and retractions.
//! Unknown directives are skipped so newer go.mod files keep parsing.

use modsite_errors::FetchError;

/// A `require` line.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Requirement {
    pub module_path: String,
    pub version: String,
    pub indirect: bool,
}

/// A `retract` line: a single version or an inclusive range.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Retraction {
    pub low: String,
    pub high: String,
    pub rationale: Option<String>,
}

impl Retraction {
    #[must_use]
    pub fn contains(&self, version: &str) -> bool {
        use modsite_types::version::compare;
        use std::cmp::Ordering;
        compare(version, &self.low) != Ordering::Less
            && compare(version, &self.high) != Ordering::Greater
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ModFile {
    pub module_path: String,
    /// Text after `Deprecated:` in the comments attached to the module line.
    pub deprecated: Option<String>,
    pub go_version: Option<String>,
    pub requires: Vec<Requirement>,
    pub retracted: Vec<Retraction>,
}

impl ModFile {
    /// Whether `version` falls in any retracted range.
    #[must_use]
    pub fn is_retracted(&self, version: &str) -> bool {
        self.retracted.iter().any(|r| r.contains(version))
    }
}

/// One logical line: its directive words and the comments attached to it.
#[derive(Debug, Default)]
struct Line {
    verb: String,
    args: Vec<String>,
    /// Comment lines directly above, in order.
    before: Vec<String>,
    trailing: Option<String>,
    line_no: usize,
}

fn bad(line_no: usize, message: &str) -> FetchError {
    FetchError::bad_module(format!("go.mod:{line_no}: {message}"))
}

/// Split the text of one line into words and a trailing comment.
fn split_words(text: &str, line_no: usize) -> Result<(Vec<String>, Option<String>), FetchError> {
    let mut words = Vec::new();
    let mut rest = text.trim();
    while !rest.is_empty() {
        if let Some(comment) = rest.strip_prefix("//") {
            return Ok((words, Some(comment.trim().to_string())));
        }
        let quote = rest.chars().next().filter(|c| *c == '"' || *c == '`');
        if let Some(q) = quote {
            let body = &rest[1..];
            let mut end = None;
            let mut escaped = false;
            for (i, c) in body.char_indices() {
                if q == '"' && c == '\\' && !escaped {
                    escaped = true;
                    continue;
                }
                if c == q && !escaped {
                    end = Some(i);
                    break;
                }
                escaped = false;
            }
            let end = end.ok_or_else(|| bad(line_no, "unterminated quoted string"))?;
            words.push(body[..end].replace("\\\"", "\""));
            rest = body[end + 1..].trim_start();
        } else if rest.starts_with(['(', ')', '[', ']', ',']) {
            words.push(rest[..1].to_string());
            rest = rest[1..].trim_start();
        } else {
            let end = rest
                .char_indices()
                .find(|&(i, c)| {
                    c.is_whitespace() || "()[],".contains(c) || rest[i..].starts_with("//")
                })
                .map_or(rest.len(), |(i, _)| i);
            words.push(rest[..end].to_string());
            rest = rest[end..].trim_start();
        }
    }
    Ok((words, None))
}

fn lines(text: &str) -> Result<Vec<Line>, FetchError> {
    let mut out = Vec::new();
    let mut pending_comments: Vec<String> = Vec::new();
    let mut block: Option<(String, usize)> = None;

    for (idx, raw) in text.lines().enumerate() {
        let line_no = idx + 1;
        let (words, trailing) = split_words(raw, line_no)?;
        if words.is_empty() {
            match trailing {
                Some(comment) => pending_comments.push(comment),
                None => pending_comments.clear(),
            }
            continue;
        }
        let before = std::mem::take(&mut pending_comments);

        if let Some((verb, _)) = &block {
            if words.len() == 1 && words[0] == ")" {
                block = None;
                continue;
            }
            out.push(Line {
                verb: verb.clone(),
                args: words,
                before,
                trailing,
                line_no,
            });
            continue;
        }
        if words[0] == ")" {
            return Err(bad(line_no, "unexpected )"));
        }
        if words.len() == 2 && words[1] == "(" {
            block = Some((words[0].clone(), line_no));
            continue;
        }
        let mut words = words.into_iter();
        let verb = words.next().unwrap_or_default();
        out.push(Line {
            verb,
            args: words.collect(),
            before,
            trailing,
            line_no,
        });
    }
    if let Some((verb, line_no)) = block {
        return Err(bad(line_no, &format!("unterminated {verb} block")));
    }
    Ok(out)
}

/// Deprecation notice from a module line's comments: the rest of the first
/// comment line that starts with `Deprecated:`.
fn deprecation(comments: &[String]) -> Option<String> {
    comments
        .iter()
        .find_map(|comment| comment.strip_prefix("Deprecated:"))
        .map(|rest| rest.trim().to_string())
}

fn retraction(line: &Line) -> Result<Retraction, FetchError> {
    let rationale = line
        .before
        .iter()
        .chain(line.trailing.iter())
        .map(String::as_str)
        .collect::<Vec<_>>()
        .join(" ");
    let rationale = (!rationale.is_empty()).then_some(rationale);
    let args: Vec<&str> = line.args.iter().map(String::as_str).collect();
    let (low, high) = match args.as_slice() {
        [v] => (*v, *v),
        ["[", low, ",", high, "]"] => (*low, *high),
        _ => return Err(bad(line.line_no, "malformed retract directive")),
    };
    for v in [low, high] {
        if !modsite_types::version::is_valid(v) {
            return Err(bad(line.line_no, &format!("invalid retracted version {v:?}")));
        }
    }
    Ok(Retraction {
        low: low.to_string(),
        high: high.to_string(),
        rationale,
    })
}

/// Parse a go.mod file.
///
/// # Errors
///
/// Returns `FetchError::BadModule` if the file is malformed, has no module
/// directive or declares an empty module path.
pub fn parse(contents: &[u8]) -> Result<ModFile, FetchError> {
    let text = std::str::from_utf8(contents)
        .map_err(|_| FetchError::bad_module("go.mod is not valid UTF-8"))?;
    let mut mod_file = ModFile::default();
    let mut seen_module = false;

    for line in lines(text)? {
        match line.verb.as_str() {
            "module" => {
                if seen_module {
                    return Err(bad(line.line_no, "repeated module directive"));
                }
                seen_module = true;
                let path = line.args.first().cloned().unwrap_or_default();
                if path.is_empty() || line.args.len() > 1 {
                    return Err(bad(line.line_no, "usage: module module/path"));
                }
                mod_file.module_path = path;
                let comments: Vec<String> =
                    line.before.iter().cloned().chain(line.trailing.clone()).collect();
                mod_file.deprecated = deprecation(&comments);
            }
            "go" => mod_file.go_version = line.args.first().cloned(),
            "require" => match line.args.as_slice() {
                [path, version] => mod_file.requires.push(Requirement {
                    module_path: path.clone(),
                    version: version.clone(),
                    indirect: line.trailing.as_deref() == Some("indirect"),
                }),
                _ => return Err(bad(line.line_no, "usage: require module/path v1.2.3")),
            },
            "retract" => mod_file.retracted.push(retraction(&line)?),
            _ => {}
        }
    }
    if !seen_module {
        return Err(FetchError::bad_module("go.mod has no module directive"));
    }
    Ok(mod_file)
}

/// Declared module path from the first well-formed module directive. The
/// rest of the file is not validated.
#[must_use]
pub fn module_path(contents: &[u8]) -> Option<String> {
    let text = std::str::from_utf8(contents).ok()?;
    text.lines().enumerate().find_map(|(idx, raw)| {
        let (words, _) = split_words(raw, idx + 1).ok()?;
        match words.as_slice() {
            [verb, path] if verb == "module" && !path.is_empty() => Some(path.clone()),
            _ => None,
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_directives() {
        let m = parse(
            br#"// Deprecated: use example.com/new instead.
module "example.com/m"

go 1.21

require (
	example.com/a v1.0.0
	example.com/b v0.2.0 // indirect
)

require example.com/c v1.1.0

retract v1.0.1 // published by mistake
retract (
	// broken build
	[v1.1.0, v1.1.5]
)

toolchain go1.21.3
"#,
        )
        .unwrap();
        assert_eq!(m.module_path, "example.com/m");
        assert_eq!(m.deprecated.as_deref(), Some("use example.com/new instead."));
        assert_eq!(m.go_version.as_deref(), Some("1.21"));
        assert_eq!(m.requires.len(), 3);
        assert!(m.requires[1].indirect);
        assert!(!m.requires[2].indirect);
        assert_eq!(
            m.retracted,
            vec![
                Retraction {
                    low: "v1.0.1".into(),
                    high: "v1.0.1".into(),
                    rationale: Some("published by mistake".into()),
                },
                Retraction {
                    low: "v1.1.0".into(),
                    high: "v1.1.5".into(),
                    rationale: Some("broken build".into()),
                },
            ]
        );
        assert!(m.is_retracted("v1.1.3"));
        assert!(!m.is_retracted("v1.1.6"));
    }

    #[test]
    fn trailing_deprecation() {
        let m = parse(b"module example.com/m // Deprecated: gone\n").unwrap();
        assert_eq!(m.deprecated.as_deref(), Some("gone"));
        let m = parse(b"// Some comment.\nmodule example.com/m\n").unwrap();
        assert_eq!(m.deprecated, None);
    }

    #[test]
    fn deprecation_is_the_prefixed_line_only() {
        let m = parse(b"// Package m.\n//\n// Deprecated: use n\n// which is better.\n//\n// Other.\nmodule example.com/m\n")
            .unwrap();
        assert_eq!(m.deprecated.as_deref(), Some("use n"));

        let m = parse(b"// Deprecated: first\n// Deprecated: second\nmodule example.com/m // Deprecated: third\n")
            .unwrap();
        assert_eq!(m.deprecated.as_deref(), Some("first"));

        let m = parse(b"//Deprecated:   spaced   \nmodule example.com/m\n").unwrap();
        assert_eq!(m.deprecated.as_deref(), Some("spaced"));
    }

    #[test]
    fn detached_comments_do_not_attach() {
        let m = parse(b"// Deprecated: old\n\nmodule example.com/m\n").unwrap();
        assert_eq!(m.deprecated, None);
    }

    #[test]
    fn malformed() {
        assert!(parse(b"go 1.21\n").is_err());
        assert!(parse(b"module\n").is_err());
        assert!(parse(b"module \"\"\n").is_err());
        assert!(parse(b"module a\nmodule b\n").is_err());
        assert!(parse(b"module a\nrequire (\n\tb v1.0.0\n").is_err());
        assert!(parse(b"module a\n)\n").is_err());
        assert!(parse(b"module \"a\n").is_err());
        assert!(parse(b"module a\nretract [v1.0.0 v1.1.0]\n").is_err());
        assert!(matches!(
            parse(b"go 1.21\n"),
            Err(FetchError::BadModule { .. })
        ));
    }

    #[test]
    fn unknown_directives_are_ignored() {
        let m = parse(b"module example.com/m\ngodebug default=go1.21\nfuture thing\n").unwrap();
        assert_eq!(m.module_path, "example.com/m");
        assert_eq!(module_path(b"module example.com/x\n").as_deref(), Some("example.com/x"));
        assert_eq!(module_path(b"garbage ("), None);
        assert_eq!(
            module_path(b"module example.com/x\nrequire (\n").as_deref(),
            Some("example.com/x")
        );
    }
}

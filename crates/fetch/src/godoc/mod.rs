//! Package documentation
//!
//! Go files are scanned for their package clause, imports and top-level
//! declarations; the exported declarations and their doc comments are then
//! rendered to HTML. Large literals are cut during rendering so the output
//! stays bounded however large the source is.

mod parse;
mod scan;

pub use parse::{is_exported, parse_file, Decl, DeclKind, SourceFile, MAX_NESTING};
pub use scan::SyntaxError;

use std::collections::BTreeMap;
use std::fmt::Write as _;

use modsite_config::FetchConfig;

/// Bounds applied while rendering declarations.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RenderLimits {
    /// Longest string literal (in bytes, without quotes) rendered verbatim.
    pub max_literal_len: usize,
    /// Most composite-literal elements rendered verbatim.
    pub max_composite_elements: usize,
}

impl Default for RenderLimits {
    fn default() -> Self {
        Self::from_config(&FetchConfig::default())
    }
}

impl RenderLimits {
    #[must_use]
    pub fn from_config(config: &FetchConfig) -> Self {
        Self {
            max_literal_len: config.max_literal_len,
            max_composite_elements: config.max_composite_elements,
        }
    }
}

/// Synopsis of a package comment: its first sentence, whitespace collapsed.
/// Comments that open with a copyright or authorship notice have none.
#[must_use]
pub fn synopsis(doc: &str) -> String {
    let paragraph = doc.split("\n\n").next().unwrap_or("");
    let text = paragraph.split_whitespace().collect::<Vec<_>>().join(" ");
    let sentence = first_sentence(&text);
    let lower = sentence.to_lowercase();
    if ["copyright", "all rights", "author"]
        .iter()
        .any(|p| lower.starts_with(p))
    {
        return String::new();
    }
    sentence.to_string()
}

/// Text up to and including the first period that is followed by a space
/// and not preceded by a single uppercase letter (as in "U.S.").
fn first_sentence(text: &str) -> &str {
    let chars: Vec<(usize, char)> = text.char_indices().collect();
    for (i, &(idx, c)) in chars.iter().enumerate() {
        if c != '.' {
            continue;
        }
        let next_is_space = chars.get(i + 1).is_some_and(|&(_, n)| n == ' ');
        if !next_is_space {
            continue;
        }
        let p = i.checked_sub(1).map(|j| chars[j].1);
        let pp = i.checked_sub(2).map(|j| chars[j].1);
        let single_upper = p.is_some_and(char::is_uppercase) && !pp.is_some_and(char::is_alphabetic);
        if !single_upper {
            return &text[..=idx];
        }
    }
    text
}

/// Escape text for inclusion in HTML.
#[must_use]
pub fn escape_html(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    for c in s.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&#34;"),
            '\'' => out.push_str("&#39;"),
            _ => out.push(c),
        }
    }
    out
}

/// Render a doc comment: blank lines separate paragraphs, indented blocks
/// become preformatted text.
fn render_comment(out: &mut String, doc: &str) {
    for block in doc.split("\n\n") {
        if block.trim().is_empty() {
            continue;
        }
        if block.lines().all(|l| l.starts_with([' ', '\t']) || l.is_empty()) {
            let _ = writeln!(out, "<pre>{}</pre>", escape_html(block));
        } else {
            let _ = writeln!(out, "<p>{}</p>", escape_html(block.trim()));
        }
    }
}

fn render_decl(out: &mut String, decl: &Decl) {
    let id = match &decl.receiver {
        Some(recv) => format!("{recv}.{}", decl.names.join(",")),
        None => decl.names.first().cloned().unwrap_or_default(),
    };
    let _ = writeln!(
        out,
        "<div class=\"Documentation-declaration\" id=\"{}\"><pre>{}</pre></div>",
        escape_html(&id),
        escape_html(&decl.text)
    );
    render_comment(out, &decl.doc);
}

/// Package documentation text: `doc.go` wins, otherwise the first file (by
/// name) that has a package comment.
#[must_use]
pub fn package_doc(files: &[&SourceFile]) -> String {
    let mut sorted: Vec<&&SourceFile> = files.iter().collect();
    sorted.sort_by(|a, b| {
        (a.name != "doc.go", &a.name).cmp(&(b.name != "doc.go", &b.name))
    });
    sorted
        .iter()
        .find_map(|f| f.package_doc.clone())
        .unwrap_or_default()
}

/// Render the documentation page body of a package.
#[must_use]
pub fn render_html(import_path: &str, files: &[&SourceFile]) -> String {
    let doc = package_doc(files);
    let package_name = files.first().map_or("", |f| f.package_name.as_str());

    let mut consts = Vec::new();
    let mut vars = Vec::new();
    let mut funcs = Vec::new();
    let mut types: BTreeMap<&str, (Option<&Decl>, Vec<&Decl>)> = BTreeMap::new();
    for decl in files.iter().flat_map(|f| f.decls.iter()) {
        if !decl.is_exported() {
            continue;
        }
        match decl.kind {
            DeclKind::Const => consts.push(decl),
            DeclKind::Var => vars.push(decl),
            DeclKind::Func => funcs.push(decl),
            DeclKind::Type => {
                for name in decl.names.iter().filter(|n| is_exported(n)) {
                    types.entry(name.as_str()).or_default().0 = Some(decl);
                }
            }
            DeclKind::Method => {
                if let Some(recv) = &decl.receiver {
                    types.entry(recv.as_str()).or_default().1.push(decl);
                }
            }
        }
    }
    funcs.sort_by(|a, b| a.names.cmp(&b.names));

    let mut out = String::new();
    let _ = writeln!(
        out,
        "<section class=\"Documentation-overview\"><h2>package {}</h2>\n<p><code>import &#34;{}&#34;</code></p>",
        escape_html(package_name),
        escape_html(import_path)
    );
    render_comment(&mut out, &doc);
    out.push_str("</section>\n");

    for (title, decls) in [("Constants", &consts), ("Variables", &vars), ("Functions", &funcs)] {
        if decls.is_empty() {
            continue;
        }
        let _ = writeln!(
            out,
            "<section class=\"Documentation-{}\"><h3>{title}</h3>",
            title.to_lowercase()
        );
        for decl in decls {
            render_decl(&mut out, decl);
        }
        out.push_str("</section>\n");
    }

    if !types.is_empty() {
        out.push_str("<section class=\"Documentation-types\"><h3>Types</h3>\n");
        for (name, (decl, methods)) in &mut types {
            let _ = writeln!(out, "<h4 id=\"{}\">type {}</h4>", escape_html(name), escape_html(name));
            if let Some(decl) = decl {
                render_decl(&mut out, *decl);
            }
            methods.sort_by(|a, b| a.names.cmp(&b.names));
            for method in methods.iter() {
                render_decl(&mut out, method);
            }
        }
        out.push_str("</section>\n");
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn synopsis_first_sentence() {
        assert_eq!(synopsis("Package p does things. And more."), "Package p does things.");
        assert_eq!(
            synopsis("Package p\nspans lines. Second."),
            "Package p spans lines."
        );
        assert_eq!(synopsis("Package us talks to the U.S. government."), "Package us talks to the U.S. government.");
        assert_eq!(synopsis("No period here"), "No period here");
        assert_eq!(synopsis("First paragraph\n\nSecond. Para."), "First paragraph");
        assert_eq!(synopsis("Copyright 2020 Someone. All rights reserved."), "");
    }

    #[test]
    fn escapes() {
        assert_eq!(escape_html("<a href=\"x\">&</a>"), "&lt;a href=&#34;x&#34;&gt;&amp;&lt;/a&gt;");
    }

    #[test]
    fn renders_exported_declarations() {
        let limits = RenderLimits::default();
        let a = parse_file(
            "a.go",
            "// Package p is <great>.\npackage p\n\n// T is a type.\ntype T int\n\n// String formats.\nfunc (t T) String() string { return \"\" }\n\nfunc hidden() {}\n\n// New returns a T.\nfunc New() T { return 0 }\n",
            &limits,
        )
        .unwrap();
        let html = render_html("example.com/p", &[&a]);
        assert!(html.contains("Package p is &lt;great&gt;."));
        assert!(html.contains("import &#34;example.com/p&#34;"));
        assert!(html.contains("func New() T"));
        assert!(html.contains("func (t T) String() string"));
        assert!(!html.contains("hidden"));
        let types = html.find("Documentation-types").unwrap();
        assert!(html.find("String formats.").unwrap() > types);
    }

    #[test]
    fn doc_go_wins() {
        let limits = RenderLimits::default();
        let a = parse_file("a.go", "// Package p from a.\npackage p\n", &limits).unwrap();
        let doc = parse_file("doc.go", "// Package p from doc.\npackage p\n", &limits).unwrap();
        assert_eq!(package_doc(&[&a, &doc]), "Package p from doc.");
        assert_eq!(package_doc(&[&a]), "Package p from a.");
    }
}

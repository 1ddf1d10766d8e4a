//! Pattern Compiler (spec.md §4.2): turns a route pattern like
//! `/users/:id/posts/*` into an anchored regex plus the ordered list of
//! named capture groups, or recognizes the pattern as fully static.

use regex::Regex;

/// The compiled form of a route pattern. `Static` means the literal path can
/// be looked up directly with no regex match at all (§4.2 "static patterns
/// skip regex construction").
#[derive(Debug, Clone)]
pub enum CompiledPattern {
    Static(String),
    Dynamic {
        regex: Regex,
        param_names: Vec<String>,
    },
}

impl CompiledPattern {
    pub fn is_static(&self) -> bool {
        matches!(self, CompiledPattern::Static(_))
    }
}

/// Compile a pattern: split on `/`, turn `:name` segments into named
/// capture groups matching `[^/]+`, a bare `*` segment into `[^/]*` (a
/// wildcard matches within one segment boundary, not across `/`), and
/// regex-escape every literal segment. The result is anchored with `^…$`.
pub fn compile(pattern: &str) -> CompiledPattern {
    let mut param_names = Vec::new();
    let mut has_dynamic_segment = false;
    let mut regex_body = String::with_capacity(pattern.len() * 2);

    for (i, segment) in pattern.split('/').enumerate() {
        if i > 0 {
            regex_body.push('/');
        }
        if let Some(name) = segment.strip_prefix(':') {
            param_names.push(name.to_string());
            regex_body.push_str("([^/]+)");
            has_dynamic_segment = true;
        } else if segment == "*" {
            regex_body.push_str("[^/]*");
            has_dynamic_segment = true;
        } else {
            regex_body.push_str(&regex::escape(segment));
        }
    }

    if !has_dynamic_segment {
        return CompiledPattern::Static(pattern.to_string());
    }

    let anchored = format!("^{regex_body}$");
    let regex = Regex::new(&anchored).expect("pattern compiler only emits valid regex fragments");
    CompiledPattern::Dynamic { regex, param_names }
}

/// Join a class-level base path with a route's own pattern: leading
/// slashes normalized, exactly one `/` at the seam (§4.2 step 2).
pub fn join_base_path(base: &str, pattern: &str) -> String {
    let base = base.trim_end_matches('/');
    let pattern = pattern.trim_start_matches('/');
    if base.is_empty() {
        return format!("/{pattern}");
    }
    if pattern.is_empty() {
        return base.to_string();
    }
    format!("{base}/{pattern}")
}

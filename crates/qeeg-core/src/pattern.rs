//! Lightweight text matching for annotation events
//!
//! Wildcard matching covers the common case of CLI-style event filters
//! (`"stim*"`); full regular expressions go through the `regex` crate with
//! invalid patterns reported as `InvalidParam`.

use crate::error::{QeegError, QeegResult};
use regex::{Regex, RegexBuilder};

/// Glob-style matching supporting `*` (any sequence, including empty) and
/// `?` (exactly one character).
pub fn wildcard_match(text: &str, pattern: &str, case_sensitive: bool) -> bool {
    let (text, pattern) = if case_sensitive {
        (text.to_string(), pattern.to_string())
    } else {
        (text.to_lowercase(), pattern.to_lowercase())
    };
    let t: Vec<char> = text.chars().collect();
    let p: Vec<char> = pattern.chars().collect();

    let mut ti = 0usize;
    let mut pi = 0usize;
    let mut star: Option<usize> = None;
    let mut matched = 0usize;

    while ti < t.len() {
        if pi < p.len() && (p[pi] == '?' || p[pi] == t[ti]) {
            ti += 1;
            pi += 1;
        } else if pi < p.len() && p[pi] == '*' {
            star = Some(pi);
            pi += 1;
            matched = ti;
        } else if let Some(s) = star {
            pi = s + 1;
            matched += 1;
            ti = matched;
        } else {
            return false;
        }
    }

    while pi < p.len() && p[pi] == '*' {
        pi += 1;
    }
    pi == p.len()
}

/// Compile a regular expression, optionally case-insensitive.
pub fn compile_regex(pattern: &str, case_sensitive: bool) -> QeegResult<Regex> {
    RegexBuilder::new(pattern)
        .case_insensitive(!case_sensitive)
        .build()
        .map_err(|e| QeegError::invalid_param(format!("invalid regex pattern '{pattern}': {e}")))
}

// SPDX-License-Identifier: MIT
// SPDX-FileCopyrightText: 2025-2026 natyamatsya contributors

//! Key-pattern matching for `delete_pattern`/`list_keys`. Accepts either a
//! glob (`*`, `?`) or a `/regex/`-delimited regex literal and compiles both
//! down to a single `regex::Regex`, the same crate `stronghold.rs`'s
//! sub-crates reach for wherever they need pattern matching over strings.

use regex::Regex;

use crate::error::CacheError;

/// True if `key` should be treated as a pattern rather than a literal key:
/// it contains a glob metacharacter, or is wrapped in `/.../ ` regex
/// delimiters.
pub(crate) fn is_pattern(key: &str) -> bool {
    key.contains('*')
        || key.contains('?')
        || (key.len() >= 2 && key.starts_with('/') && key.ends_with('/'))
}

/// Compile a glob or `/regex/` literal into an anchored `Regex` that
/// matches a whole key, not a substring of one.
pub(crate) fn compile(pattern: &str) -> Result<Regex, CacheError> {
    if pattern.len() >= 2 && pattern.starts_with('/') && pattern.ends_with('/') {
        let inner = &pattern[1..pattern.len() - 1];
        return Regex::new(inner).map_err(|e| CacheError::PatternCompile(e.to_string()));
    }

    let mut anchored = String::with_capacity(pattern.len() * 2 + 2);
    anchored.push('^');
    for c in pattern.chars() {
        match c {
            '*' => anchored.push_str(".*"),
            '?' => anchored.push('.'),
            '.' | '+' | '^' | '$' | '{' | '}' | '(' | ')' | '|' | '[' | ']' | '\\' => {
                anchored.push('\\');
                anchored.push(c);
            }
            _ => anchored.push(c),
        }
    }
    anchored.push('$');
    Regex::new(&anchored).map_err(|e| CacheError::PatternCompile(e.to_string()))
}

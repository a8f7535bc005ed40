// This file is part of psh, a POSIX-flavored shell.
// Copyright (C) 2021 WATANABE Yuki

//! Pathname expansion (globbing) over an already-expanded [`AttrField`].
//!
//! A field is only a glob candidate if it contains an unquoted `*`, `?`, or
//! `[`; most fields never do, so [`has_wildcard`] short-circuits the
//! filesystem walk for the common case. Quoted characters (and characters
//! from tilde/hard expansion) are treated as [`psh_fnmatch::PatternChar::Literal`],
//! the same "unquoted backslash becomes quoting" pass the teacher's
//! `attr_fnmatch` module performs.

use crate::expansion::attr::{AttrChar, AttrField, Origin};
use psh_fnmatch::{Config, Pattern, PatternChar};
use std::fs;

/// A segment of a glob pattern: the literal/normal [`PatternChar`]s between
/// two `/`s.
struct Segment {
    chars: Vec<PatternChar>,
}

impl Segment {
    fn has_wildcard(&self) -> bool {
        self.chars
            .iter()
            .any(|c| matches!(c, PatternChar::Normal('*' | '?' | '[')))
    }

    fn literal(&self) -> String {
        self.chars.iter().map(|c| c.char_value()).collect()
    }
}

/// Converts an [`AttrChar`] run into [`PatternChar`]s, dropping quoting
/// marks (they disappear at quote removal) and treating anything quoted, or
/// produced by tilde/brace ([`Origin::HardExpansion`]) expansion, as
/// literal.
pub(crate) fn apply_escapes(field: &AttrField) -> Vec<PatternChar> {
    field
        .0
        .iter()
        .filter(|c| !c.is_quoting)
        .map(|c: &AttrChar| {
            if c.is_quoted || c.origin == Origin::HardExpansion {
                PatternChar::Literal(c.value)
            } else {
                PatternChar::Normal(c.value)
            }
        })
        .collect()
}

fn split_segments(chars: Vec<PatternChar>) -> Vec<Segment> {
    let mut segments = Vec::new();
    let mut current = Vec::new();
    for c in chars {
        if c.char_value() == '/' {
            segments.push(Segment { chars: std::mem::take(&mut current) });
        } else {
            current.push(c);
        }
    }
    segments.push(Segment { chars: current });
    segments
}

#[must_use]
pub fn has_wildcard(field: &AttrField) -> bool {
    apply_escapes(field)
        .iter()
        .any(|c| matches!(c, PatternChar::Normal('*' | '?' | '[')))
}

/// Expands `field` against the filesystem. Returns `None` (caller keeps the
/// literal field) if nothing matched, per POSIX's "pattern stands for
/// itself when no pathname matches" rule.
#[must_use]
pub fn expand(field: &AttrField) -> Option<Vec<String>> {
    let chars = apply_escapes(field);
    let leading_slash = chars.first().map(|c| c.char_value()) == Some('/');
    let segments = split_segments(chars);

    let mut candidates: Vec<String> = vec![if leading_slash {
        "/".to_owned()
    } else {
        String::new()
    }];

    for (i, segment) in segments.iter().enumerate() {
        if segment.chars.is_empty() && i == 0 && leading_slash {
            continue;
        }
        if !segment.has_wildcard() {
            candidates = candidates
                .into_iter()
                .map(|base| join(&base, &segment.literal()))
                .collect();
            continue;
        }

        let pattern = Pattern::parse_with_config(segment.chars.iter().copied(), Config::anchored())
            .ok()?;
        let leading_dot_ok = segment
            .chars
            .first()
            .map(|c| c.char_value() == '.')
            .unwrap_or(false);

        let mut next = Vec::new();
        for base in &candidates {
            let dir = if base.is_empty() { "." } else { base.as_str() };
            let Ok(entries) = fs::read_dir(dir) else {
                continue;
            };
            let mut names: Vec<String> = entries
                .filter_map(|e| e.ok())
                .filter_map(|e| e.file_name().into_string().ok())
                .filter(|name| leading_dot_ok || !name.starts_with('.'))
                .filter(|name| pattern.is_match(name))
                .collect();
            names.sort();
            for name in names {
                next.push(join(base, &name));
            }
        }
        candidates = next;
    }

    if candidates.is_empty() {
        return None;
    }
    candidates.sort();
    Some(candidates)
}

fn join(base: &str, segment: &str) -> String {
    if base.is_empty() {
        segment.to_owned()
    } else if base.ends_with('/') {
        format!("{base}{segment}")
    } else {
        format!("{base}/{segment}")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn literal_field(s: &str) -> AttrField {
        AttrField(s.chars().map(AttrChar::literal).collect())
    }

    #[test]
    fn field_without_wildcard_is_not_a_glob_candidate() {
        assert!(!has_wildcard(&literal_field("plain.txt")));
    }

    #[test]
    fn field_with_star_is_a_glob_candidate() {
        assert!(has_wildcard(&literal_field("*.txt")));
    }

    #[test]
    fn quoted_star_is_not_a_glob_candidate() {
        let field = AttrField(vec![AttrChar::quoted_literal('*')]);
        assert!(!has_wildcard(&field));
    }
}

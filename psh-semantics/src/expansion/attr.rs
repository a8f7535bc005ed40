// This file is part of psh, a POSIX-flavored shell.
// Copyright (C) 2021 WATANABE Yuki

//! [`AttrChar`]/[`Origin`]/[`AttrField`]: the per-character quote-context
//! tracking that carries through every stage of expansion. A [`Word`]'s
//! quote tagging (single/double-quoted, unquoted) is coarse-grained, per
//! [`WordUnit`](psh_syntax::syntax::WordUnit); this module refines it down
//! to individual characters, because a quote boundary can fall in the
//! middle of a field once expansions are substituted in (`a"$x"b` splits
//! correctly even though only the middle run is quoted).

/// Where a character in an expanded field came from, which governs whether
/// it is eligible for field splitting and pathname expansion.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum Origin {
    /// Appeared literally in the original word.
    Literal,
    /// Came from tilde expansion (or brace expansion, handled in the
    /// lexer). Treated literally in pathname expansion: a user's home
    /// directory is never glob-matched even if it contains `*`.
    HardExpansion,
    /// Came from parameter expansion, command substitution, or arithmetic
    /// expansion. Subject to field splitting where applicable.
    SoftExpansion,
}

/// One character of an expanded field, tagged with its origin and quoting.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub struct AttrChar {
    pub value: char,
    pub origin: Origin,
    /// Whether this character is quoted by another character (inside
    /// single/double quotes, or escaped by a backslash).
    pub is_quoted: bool,
    /// Whether this character itself is a quoting character (the quote
    /// marks and backslashes themselves). A character can be both quoting
    /// and quoted, e.g. the backslash in `"\$"`.
    pub is_quoting: bool,
}

impl AttrChar {
    #[must_use]
    pub fn literal(c: char) -> Self {
        AttrChar {
            value: c,
            origin: Origin::Literal,
            is_quoted: false,
            is_quoting: false,
        }
    }

    #[must_use]
    pub fn quoted_literal(c: char) -> Self {
        AttrChar {
            value: c,
            origin: Origin::Literal,
            is_quoted: true,
            is_quoting: false,
        }
    }
}

/// One field produced by expansion: a sequence of [`AttrChar`]s.
#[derive(Clone, Debug, Default, Eq, PartialEq)]
pub struct AttrField(pub Vec<AttrChar>);

impl AttrField {
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Strips quoting characters and reduces to a plain `String`, discarding
    /// all attribution. Used once quote removal is the only remaining step.
    #[must_use]
    pub fn strip(&self) -> String {
        self.0
            .iter()
            .filter(|c| !c.is_quoting)
            .map(|c| c.value)
            .collect()
    }
}

/// Destination that accumulates [`AttrChar`]s produced by expansion.
///
/// A single [`AttrField`] is the destination while expanding one word that
/// must not split (an assignment value, `"$@"` not yet fanned out); a
/// `Vec<AttrField>` is the destination once multiple resulting fields are
/// possible.
pub trait Expansion {
    fn push_char(&mut self, c: AttrChar);

    /// Appends every character of `s`, all sharing the same origin/quoting.
    fn push_str(&mut self, s: &str, origin: Origin, is_quoted: bool, is_quoting: bool) {
        for c in s.chars() {
            self.push_char(AttrChar {
                value: c,
                origin,
                is_quoted,
                is_quoting,
            });
        }
    }

    /// Starts a new field. Only meaningful for a `Vec<AttrField>`
    /// destination; a single `AttrField` ignores this (callers that must
    /// not split, e.g. assignment values, never call it).
    fn start_new_field(&mut self) {}
}

impl Expansion for AttrField {
    fn push_char(&mut self, c: AttrChar) {
        self.0.push(c);
    }
}

impl Expansion for Vec<AttrField> {
    fn push_char(&mut self, c: AttrChar) {
        if let Some(field) = self.last_mut() {
            field.0.push(c);
        } else {
            self.push(AttrField(vec![c]));
        }
    }

    fn start_new_field(&mut self) {
        self.push(AttrField::default());
    }
}

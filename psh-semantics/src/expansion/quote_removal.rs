// This file is part of psh, a POSIX-flavored shell.
// Copyright (C) 2021 WATANABE Yuki

//! Quote removal: the final stage, dropping every quoting character
//! ([`AttrChar::is_quoting`]) left over from single/double quotes and
//! backslash escapes.

use crate::expansion::attr::AttrField;

#[must_use]
pub fn remove(field: &AttrField) -> String {
    field.strip()
}

#[must_use]
pub fn remove_all(fields: &[AttrField]) -> Vec<String> {
    fields.iter().map(remove).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::expansion::attr::AttrChar;

    #[test]
    fn quoting_characters_are_dropped() {
        let field = AttrField(vec![
            AttrChar {
                value: '"',
                origin: crate::expansion::attr::Origin::Literal,
                is_quoted: false,
                is_quoting: true,
            },
            AttrChar::quoted_literal('a'),
            AttrChar {
                value: '"',
                origin: crate::expansion::attr::Origin::Literal,
                is_quoted: false,
                is_quoting: true,
            },
        ]);
        assert_eq!(remove(&field), "a");
    }
}

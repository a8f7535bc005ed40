// This file is part of psh, a POSIX-flavored shell.
// Copyright (C) 2021 WATANABE Yuki
//
// This program is free software: you can redistribute it and/or modify
// it under the terms of the GNU General Public License as published by
// the Free Software Foundation, either version 3 of the License, or
// (at your option) any later version.
//
// This program is distributed in the hope that it will be useful,
// but WITHOUT ANY WARRANTY; without even the implied warranty of
// MERCHANTABILITY or FITNESS FOR A PARTICULAR PURPOSE.  See the
// GNU General Public License for more details.
//
// You should have received a copy of the GNU General Public License
// along with this program.  If not, see <https://www.gnu.org/licenses/>.

//! Variables, their values, and their attributes.

use psh_syntax::source::Location;

bitflags::bitflags! {
    /// Flags attached to a [`Variable`].
    ///
    /// `UNSET` is special: it never appears on a variable that actually
    /// holds a value. A [`super::scope::VariableScope`] inserts a `Variable`
    /// with only `UNSET` set as a tombstone when `local`-unsetting a name
    /// that also exists in an enclosing scope, so lookups stop there instead
    /// of falling through to the outer value.
    #[derive(Clone, Copy, Debug, Eq, PartialEq)]
    pub struct Attributes: u32 {
        const READONLY    = 1 << 0;
        const EXPORT      = 1 << 1;
        const INTEGER     = 1 << 2;
        const LOWERCASE   = 1 << 3;
        const UPPERCASE   = 1 << 4;
        const ARRAY       = 1 << 5;
        const ASSOC_ARRAY = 1 << 6;
        const NAMEREF     = 1 << 7;
        const TRACE       = 1 << 8;
        const UNSET       = 1 << 9;
    }
}

/// Value held by a [`Variable`].
#[derive(Clone, Debug, Eq, PartialEq)]
pub enum Value {
    Scalar(String),
    /// Sparse mapping from non-negative index to value; only defined indices
    /// are stored, so `${#a[@]}` is `len()` rather than `max index + 1`.
    IndexedArray(std::collections::BTreeMap<usize, String>),
    /// Insertion-ordered string-keyed mapping.
    AssociativeArray(Vec<(String, String)>),
}

impl Value {
    #[must_use]
    pub fn scalar(s: impl Into<String>) -> Self {
        Value::Scalar(s.into())
    }

    /// All elements in order, as `IndexedArray` or `AssociativeArray` yield
    /// them; a `Scalar` yields itself as the only element.
    pub fn all_elements(&self) -> Box<dyn Iterator<Item = &str> + '_> {
        match self {
            Value::Scalar(s) => Box::new(std::iter::once(s.as_str())),
            Value::IndexedArray(map) => Box::new(map.values().map(String::as_str)),
            Value::AssociativeArray(entries) => Box::new(entries.iter().map(|(_, v)| v.as_str())),
        }
    }

    #[must_use]
    pub fn len(&self) -> usize {
        match self {
            Value::Scalar(_) => 1,
            Value::IndexedArray(map) => map.len(),
            Value::AssociativeArray(entries) => entries.len(),
        }
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        match self {
            Value::Scalar(s) => s.is_empty(),
            Value::IndexedArray(map) => map.is_empty(),
            Value::AssociativeArray(entries) => entries.is_empty(),
        }
    }

    /// Looks up `${arr[index]}` on an `IndexedArray`, or key lookup on an
    /// `AssociativeArray`. Scalars answer only to index/key `"0"`.
    #[must_use]
    pub fn index(&self, subscript: &str) -> Option<&str> {
        match self {
            Value::Scalar(s) => (subscript == "0").then_some(s.as_str()),
            Value::IndexedArray(map) => {
                let i: usize = subscript.parse().ok()?;
                map.get(&i).map(String::as_str)
            }
            Value::AssociativeArray(entries) => entries
                .iter()
                .find(|(k, _)| k == subscript)
                .map(|(_, v)| v.as_str()),
        }
    }

    /// Inserts or replaces one element, preserving `AssociativeArray`
    /// insertion order for new keys.
    pub fn set_index(&mut self, subscript: &str, value: impl Into<String>) {
        match self {
            Value::Scalar(s) => *s = value.into(),
            Value::IndexedArray(map) => {
                if let Ok(i) = subscript.parse() {
                    map.insert(i, value.into());
                }
            }
            Value::AssociativeArray(entries) => {
                if let Some(entry) = entries.iter_mut().find(|(k, _)| k == subscript) {
                    entry.1 = value.into();
                } else {
                    entries.push((subscript.to_string(), value.into()));
                }
            }
        }
    }
}

/// A named value together with its attributes and provenance.
#[derive(Clone, Debug, Default, Eq, PartialEq)]
pub struct Variable {
    pub value: Option<Value>,
    pub attributes: Attributes,
    pub last_assigned_location: Option<Location>,
    pub read_only_location: Option<Location>,
}

impl Default for Attributes {
    fn default() -> Self {
        Attributes::empty()
    }
}

impl Variable {
    #[must_use]
    pub fn new(value: impl Into<String>) -> Self {
        Variable {
            value: Some(Value::scalar(value)),
            ..Default::default()
        }
    }

    #[must_use]
    pub fn new_indexed_array(values: impl IntoIterator<Item = impl Into<String>>) -> Self {
        let map = values
            .into_iter()
            .enumerate()
            .map(|(i, v)| (i, v.into()))
            .collect();
        Variable {
            value: Some(Value::IndexedArray(map)),
            attributes: Attributes::ARRAY,
            ..Default::default()
        }
    }

    #[must_use]
    pub fn exported(mut self) -> Self {
        self.attributes |= Attributes::EXPORT;
        self
    }

    #[must_use]
    pub fn read_only(mut self, location: Location) -> Self {
        self.attributes |= Attributes::READONLY;
        self.read_only_location = Some(location);
        self
    }

    #[must_use]
    pub fn assigned_at(mut self, location: Location) -> Self {
        self.last_assigned_location = Some(location);
        self
    }

    #[must_use]
    pub fn is_read_only(&self) -> bool {
        self.attributes.contains(Attributes::READONLY)
    }

    #[must_use]
    pub fn is_exported(&self) -> bool {
        self.attributes.contains(Attributes::EXPORT)
    }

    #[must_use]
    pub fn is_tombstone(&self) -> bool {
        self.attributes.contains(Attributes::UNSET)
    }

    /// Scalar string to place in the process environment, flattening an
    /// array with its elements joined by spaces (undefined in POSIX but a
    /// harmless fallback rather than silently dropping the export).
    #[must_use]
    pub fn export_string(&self) -> Option<String> {
        match self.value.as_ref()? {
            Value::Scalar(s) => Some(s.clone()),
            other => Some(other.all_elements().collect::<Vec<_>>().join(" ")),
        }
    }
}

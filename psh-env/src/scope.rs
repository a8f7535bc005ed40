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

//! Variable scopes and the scope chain.
//!
//! A [`VariableSet`] is a stack of [`VariableScope`]s, the bottom one always
//! `global`. Function calls push a new scope and pop it on return; `local`
//! assigns into the innermost scope and a lookup walks outward. An `UNSET`
//! [`Variable`] left behind by `local -` acts as a tombstone: it stops the
//! walk at that scope without exposing the enclosing value.

use crate::variable::{Attributes, Value, Variable};
use std::collections::HashMap;

/// One link of the scope chain.
#[derive(Debug, Default)]
pub struct VariableScope {
    variables: HashMap<String, Variable>,
}

impl VariableScope {
    #[must_use]
    pub fn get(&self, name: &str) -> Option<&Variable> {
        self.variables.get(name)
    }
}

/// Stack of [`VariableScope`]s; index 0 is always `global` ([I1]).
#[derive(Debug)]
pub struct VariableSet {
    scopes: Vec<VariableScope>,
}

impl Default for VariableSet {
    fn default() -> Self {
        VariableSet {
            scopes: vec![VariableScope::default()],
        }
    }
}

/// Why a variable mutation was refused.
#[derive(Clone, Debug, Eq, PartialEq, thiserror::Error)]
pub enum AssignError {
    #[error("{name}: readonly variable")]
    ReadOnly { name: String },
}

impl VariableSet {
    /// Pushes a new local scope, e.g. on function call entry.
    pub fn push_scope(&mut self) {
        self.scopes.push(VariableScope::default());
    }

    /// Pops the innermost scope, e.g. on function return.
    ///
    /// Never pops the global scope.
    pub fn pop_scope(&mut self) {
        if self.scopes.len() > 1 {
            self.scopes.pop();
        }
    }

    #[must_use]
    pub fn depth(&self) -> usize {
        self.scopes.len()
    }

    #[must_use]
    pub fn is_global(&self) -> bool {
        self.scopes.len() == 1
    }

    /// Looks up `name`, walking from the innermost scope outward. A
    /// tombstone (`UNSET`) stops the walk and yields `None`.
    #[must_use]
    pub fn get(&self, name: &str) -> Option<&Variable> {
        for scope in self.scopes.iter().rev() {
            match scope.variables.get(name) {
                Some(v) if v.is_tombstone() => return None,
                Some(v) => return Some(v),
                None => continue,
            }
        }
        None
    }

    /// Like [`get`](Self::get) but also reports which scope held the
    /// definition (0 = global), for `declare -p`/`local` semantics.
    #[must_use]
    pub fn get_with_depth(&self, name: &str) -> Option<(usize, &Variable)> {
        for (depth, scope) in self.scopes.iter().enumerate().rev() {
            match scope.variables.get(name) {
                Some(v) if v.is_tombstone() => return None,
                Some(v) => return Some((depth, v)),
                None => continue,
            }
        }
        None
    }

    /// Assigns into the scope the variable is already visible in, or the
    /// innermost scope if it is new. Fails if an existing definition is
    /// `READONLY` ([I3]).
    pub fn assign(
        &mut self,
        name: &str,
        mut new_value: Variable,
    ) -> Result<(), AssignError> {
        if let Some(existing) = self.get(name) {
            if existing.is_read_only() {
                return Err(AssignError::ReadOnly {
                    name: name.to_owned(),
                });
            }
            // Preserve attributes like EXPORT/INTEGER across a plain reassignment.
            new_value.attributes |= existing.attributes & !Attributes::UNSET;
        }
        let depth = self
            .scopes
            .iter()
            .enumerate()
            .rev()
            .find(|(_, s)| s.variables.contains_key(name))
            .map(|(d, _)| d)
            .unwrap_or(self.scopes.len() - 1);
        self.scopes[depth].variables.insert(name.to_owned(), new_value);
        Ok(())
    }

    /// Assigns into the innermost (`local`) scope regardless of any outer
    /// definition of the same name.
    pub fn assign_local(&mut self, name: &str, value: Variable) -> Result<(), AssignError> {
        if let Some(existing) = self.scopes.last().unwrap().variables.get(name) {
            if existing.is_read_only() {
                return Err(AssignError::ReadOnly {
                    name: name.to_owned(),
                });
            }
        }
        self.scopes
            .last_mut()
            .unwrap()
            .variables
            .insert(name.to_owned(), value);
        Ok(())
    }

    /// Removes `name`, honoring readonly. In a non-global scope where an
    /// enclosing scope also defines `name`, leaves a tombstone instead of
    /// truly deleting so the enclosing value stays hidden ([Tombstone]).
    pub fn unset(&mut self, name: &str) -> Result<(), AssignError> {
        if let Some(existing) = self.get(name) {
            if existing.is_read_only() {
                return Err(AssignError::ReadOnly {
                    name: name.to_owned(),
                });
            }
        }
        let top = self.scopes.len() - 1;
        let visible_elsewhere = self.scopes[..top]
            .iter()
            .any(|s| s.variables.contains_key(name));
        if top > 0 && visible_elsewhere {
            self.scopes[top].variables.insert(
                name.to_owned(),
                Variable {
                    attributes: Attributes::UNSET,
                    ..Default::default()
                },
            );
        } else {
            for scope in self.scopes.iter_mut() {
                scope.variables.remove(name);
            }
        }
        Ok(())
    }

    /// Iterates over every name visible from the current scope (innermost
    /// definition wins, tombstones excluded), for `${!prefix*}` and export
    /// synchronization.
    pub fn iter_visible(&self) -> impl Iterator<Item = (&str, &Variable)> {
        let mut seen = std::collections::HashSet::new();
        let mut out = Vec::new();
        for scope in self.scopes.iter().rev() {
            for (name, var) in &scope.variables {
                if seen.insert(name.as_str()) && !var.is_tombstone() {
                    out.push((name.as_str(), var));
                }
            }
        }
        out.into_iter()
    }

    /// All names, without values, for `${!prefix*}`.
    pub fn names_with_prefix<'a>(&'a self, prefix: &'a str) -> impl Iterator<Item = &'a str> {
        self.iter_visible()
            .map(|(n, _)| n)
            .filter(move |n| n.starts_with(prefix))
    }

    /// Direct access to a scalar string value, the common case used by the
    /// expander.
    #[must_use]
    pub fn get_str(&self, name: &str) -> Option<&str> {
        match self.get(name)?.value.as_ref()? {
            Value::Scalar(s) => Some(s.as_str()),
            _ => None,
        }
    }
}

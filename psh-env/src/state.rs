// This file is part of psh, a POSIX-flavored shell.
// Copyright (C) 2021 WATANABE Yuki

//! [`ShellState`]: the ambient state every subsystem reads, and that the
//! expander and executor write.

use crate::job::JobSet;
use crate::options::OptionSet;
use crate::scope::{AssignError, VariableSet};
use crate::trap::TrapSet;
use crate::variable::{Attributes, Variable};
use psh_syntax::syntax::FullCompoundCommand;
use std::collections::HashMap;
use std::rc::Rc;

/// A user-defined function: its body, kept as an `Rc` so invoking it does
/// not require cloning the AST.
#[derive(Clone)]
pub struct Function {
    pub name: String,
    pub body: Rc<FullCompoundCommand>,
}

/// One entry of the function call stack, restored when the call returns.
struct CallFrame {
    positional_params: Vec<String>,
    function_name: String,
}

/// All ambient state shared by the lexer... no -- by the expander and
/// executor; the lexer and parser are pure functions of their input and
/// never see this type.
///
/// Invariants:
/// - (I1) `variables` always has exactly one global scope at the bottom.
/// - (I2) every variable with the `EXPORT` attribute is kept in sync with
///   [`std::env`] on every assignment or unset.
/// - (I3) readonly variables can never be mutated or unset; see
///   [`scope::AssignError`](crate::scope::AssignError).
/// - (I4) positional parameters are 1-indexed (`positional_params[0]` is `$1`).
pub struct ShellState {
    pub variables: VariableSet,
    positional_params: Vec<String>,
    pub options: OptionSet,
    pub traps: TrapSet,
    pub jobs: JobSet,
    pub functions: HashMap<String, Function>,
    /// `$?`
    pub exit_status: i32,
    /// `$0`
    pub script_name: String,
    /// Process ID of the shell itself, for `$$`.
    pub shell_pid: i32,
    /// Process group currently holding the controlling terminal, if any.
    pub foreground_pgid: Option<i32>,
    /// Nesting depth of `(( ... ))`/function calls, to cap recursion.
    call_stack: Vec<CallFrame>,
}

impl ShellState {
    #[must_use]
    pub fn new(script_name: impl Into<String>, shell_pid: i32) -> Self {
        ShellState {
            variables: VariableSet::default(),
            positional_params: Vec::new(),
            options: OptionSet::default(),
            traps: TrapSet::default(),
            jobs: JobSet::default(),
            functions: HashMap::new(),
            exit_status: 0,
            script_name: script_name.into(),
            shell_pid,
            foreground_pgid: None,
            call_stack: Vec::new(),
        }
    }

    /// Initializes variables from the process environment, marking each
    /// `EXPORT` so future mutation stays synchronized ([I2]).
    pub fn import_environment(&mut self) {
        for (name, value) in std::env::vars() {
            if is_valid_name(&name) {
                let _ = self.variables.assign(&name, Variable::new(value).exported());
            }
        }
    }

    /// `$1`, `$2`, ... ([I4]: 1-indexed; index 0 is out of range).
    #[must_use]
    pub fn positional_params(&self) -> &[String] {
        &self.positional_params
    }

    pub fn set_positional_params(&mut self, params: Vec<String>) {
        self.positional_params = params;
    }

    /// Assigns `name = value`, synchronizing the process environment if the
    /// variable is (or becomes, under `allexport`) exported ([I2]).
    pub fn assign_variable(
        &mut self,
        name: &str,
        mut variable: Variable,
    ) -> Result<(), AssignError> {
        if self.options.is_set(crate::options::Option::AllExport) {
            variable.attributes |= Attributes::EXPORT;
        }
        self.variables.assign(name, variable)?;
        self.sync_export(name);
        Ok(())
    }

    /// As [`assign_variable`](Self::assign_variable) but always into the
    /// innermost scope (`local`/function parameters).
    pub fn assign_local(&mut self, name: &str, variable: Variable) -> Result<(), AssignError> {
        self.variables.assign_local(name, variable)?;
        self.sync_export(name);
        Ok(())
    }

    pub fn unset_variable(&mut self, name: &str) -> Result<(), AssignError> {
        self.variables.unset(name)?;
        unsafe { std::env::remove_var(name) };
        Ok(())
    }

    fn sync_export(&self, name: &str) {
        match self.variables.get(name) {
            Some(v) if v.is_exported() => {
                if let Some(s) = v.export_string() {
                    // Sound because the core is single-threaded ([SS5]); no
                    // other thread can observe a torn write.
                    unsafe { std::env::set_var(name, s) };
                }
            }
            _ => {}
        }
    }

    /// Re-synchronizes every exported variable to the environment, e.g.
    /// after `export -n name` flips the attribute off, or `export name`
    /// turns an existing variable's attribute on without changing its value.
    pub fn resync_all_exports(&mut self) {
        let names: Vec<String> = self
            .variables
            .iter_visible()
            .map(|(n, _)| n.to_owned())
            .collect();
        for name in names {
            self.sync_export(&name);
        }
    }

    /// Snapshot of exported variables as `NAME=value` pairs, the shape a
    /// child process's environment needs.
    #[must_use]
    pub fn environment_snapshot(&self) -> Vec<(String, String)> {
        self.variables
            .iter_visible()
            .filter(|(_, v)| v.is_exported())
            .filter_map(|(n, v)| v.export_string().map(|s| (n.to_owned(), s)))
            .collect()
    }

    pub fn define_function(&mut self, name: impl Into<String>, body: Rc<FullCompoundCommand>) {
        let name = name.into();
        self.functions
            .insert(name.clone(), Function { name, body });
    }

    #[must_use]
    pub fn get_function(&self, name: &str) -> Option<Function> {
        self.functions.get(name).cloned()
    }

    /// Pushes a function call frame: a new variable scope plus replaced
    /// positional parameters, restored by [`pop_call`](Self::pop_call).
    pub fn push_call(&mut self, function_name: impl Into<String>, args: Vec<String>) {
        self.call_stack.push(CallFrame {
            positional_params: std::mem::replace(&mut self.positional_params, args),
            function_name: function_name.into(),
        });
        self.variables.push_scope();
    }

    pub fn pop_call(&mut self) {
        self.variables.pop_scope();
        if let Some(frame) = self.call_stack.pop() {
            self.positional_params = frame.positional_params;
        }
    }

    #[must_use]
    pub fn call_depth(&self) -> usize {
        self.call_stack.len()
    }

    #[must_use]
    pub fn current_function_name(&self) -> Option<&str> {
        self.call_stack.last().map(|f| f.function_name.as_str())
    }
}

/// A valid POSIX variable name: starts with a letter or `_`, continues with
/// letters, digits, or `_`. Environment entries that don't qualify (locale
/// category joins like odd punctuation some systems export) are skipped on
/// import rather than causing an error.
#[must_use]
fn is_valid_name(s: &str) -> bool {
    let mut chars = s.chars();
    match chars.next() {
        Some(c) if c == '_' || c.is_ascii_alphabetic() => {}
        _ => return false,
    }
    chars.all(|c| c == '_' || c.is_ascii_alphanumeric())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn function_call_replaces_and_restores_positional_params() {
        let mut state = ShellState::new("psh", 1);
        state.set_positional_params(vec!["outer".into()]);
        state.push_call("f", vec!["inner".into()]);
        assert_eq!(state.positional_params(), &["inner".to_string()]);
        state.pop_call();
        assert_eq!(state.positional_params(), &["outer".to_string()]);
    }

    #[test]
    fn exported_assignment_is_visible_in_environment_snapshot() {
        let mut state = ShellState::new("psh", 1);
        state
            .assign_variable("FOO", Variable::new("bar").exported())
            .unwrap();
        let snapshot = state.environment_snapshot();
        assert!(snapshot.contains(&("FOO".to_string(), "bar".to_string())));
    }

    #[test]
    fn allexport_exports_subsequent_assignments() {
        let mut state = ShellState::new("psh", 1);
        state.options.set(crate::options::Option::AllExport, true);
        state.assign_variable("FOO", Variable::new("bar")).unwrap();
        assert!(state.variables.get("FOO").unwrap().is_exported());
    }
}

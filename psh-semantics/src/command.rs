// This file is part of psh, a POSIX-flavored shell.
// Copyright (C) 2021 WATANABE Yuki

//! Command execution: dispatches a parsed [`Command`] node — simple,
//! compound, or a function definition — against a [`ShellState`].
//!
//! A simple command's own prefix assignments (`FOO=bar cmd`) live in a
//! scope pushed just for that command ([`ShellState::variables`]'s
//! `push_scope`/`pop_scope`), so they vanish once the command returns,
//! exactly the way a shadowed `local` would; an assignment-only command
//! (`FOO=bar` alone) instead writes straight into whatever scope the name
//! is already visible in, same as any ordinary assignment.

use crate::error::ExpansionError;
use crate::expansion;
use crate::{assign, command_search, redir, xtrace};
use nix::unistd::{execve, fork, ForkResult};
use psh_env::semantics::{CommandRunner, Divert, ExitStatus, Field, Result};
use psh_env::{AssignError, ShellState, Variable};
use psh_syntax::syntax::{
    CaseContinuation, CaseItem, Command, CompoundCommand, ElifThen, FullCompoundCommand, List,
    SimpleCommand, Word,
};
use std::ffi::CString;
use std::ops::ControlFlow::{Break, Continue};
use std::os::unix::ffi::OsStrExt as _;
use std::path::Path;
use std::rc::Rc;

/// Runs one loop body, translating a `break`/`continue` that targets this
/// loop into plain Rust `break`/`continue` of the caller's `loop`;
/// anything that targets an outer loop (one level further out) or a
/// `return`/`exit` keeps propagating past this loop unconsumed.
macro_rules! run_loop_body {
    ($body:expr, $status:ident, $state:expr, $runner:expr) => {
        match crate::runner::run_list($body, false, $state, $runner) {
            Continue(s) => {
                $status = s;
            }
            Break(Divert::Break { count: 0 }) => break,
            Break(Divert::Break { count }) => {
                return Break(Divert::Break { count: count - 1 });
            }
            Break(Divert::Continue { count: 0 }) => continue,
            Break(Divert::Continue { count }) => {
                return Break(Divert::Continue { count: count - 1 });
            }
            other @ Break(_) => return other,
        }
    };
}

/// Runs one element of a [`psh_syntax::syntax::Pipeline`].
pub fn run(
    command: &Rc<Command>,
    state: &mut ShellState,
    runner: &mut dyn CommandRunner,
) -> Result<ExitStatus> {
    match &**command {
        Command::Simple(simple) => run_simple(simple, state, runner),
        Command::Compound(full) => run_full_compound(full, state, runner),
        Command::Function(def) => {
            let name = def.name.to_string_if_literal().unwrap_or_default();
            state.define_function(name, Rc::clone(&def.body));
            state.exit_status = ExitStatus::SUCCESS.0;
            Continue(ExitStatus::SUCCESS)
        }
    }
}

/// Applies a compound command's own redirections, then dispatches its body.
/// Used both for a top-level compound command and for a function's body
/// (whose redirections apply every time the function is called).
pub(crate) fn run_full_compound(
    full: &FullCompoundCommand,
    state: &mut ShellState,
    runner: &mut dyn CommandRunner,
) -> Result<ExitStatus> {
    let guard = match redir::RedirGuard::apply(&full.redirs, state, runner) {
        Ok(guard) => guard,
        Err(e) => return Continue(report_redir_error(&e, state)),
    };
    let result = run_compound(&full.command, state, runner);
    drop(guard);
    result
}

fn run_compound(
    command: &CompoundCommand,
    state: &mut ShellState,
    runner: &mut dyn CommandRunner,
) -> Result<ExitStatus> {
    match command {
        CompoundCommand::Grouping(list) => crate::runner::run_list(list, false, state, runner),
        CompoundCommand::Subshell { body, .. } => run_subshell(body, state, runner),
        CompoundCommand::For { name, values, body } => {
            run_for(name, values.as_deref(), body, state, runner)
        }
        CompoundCommand::CStyleFor {
            init,
            condition,
            update,
            body,
        } => run_c_style_for(
            init.as_deref(),
            condition.as_deref(),
            update.as_deref(),
            body,
            state,
            runner,
        ),
        CompoundCommand::Select { name, values, body } => {
            run_select(name, values.as_deref(), body, state, runner)
        }
        CompoundCommand::While { condition, body } => {
            run_while(condition, body, false, state, runner)
        }
        CompoundCommand::Until { condition, body } => {
            run_while(condition, body, true, state, runner)
        }
        CompoundCommand::If {
            condition,
            body,
            elifs,
            r#else,
        } => run_if(condition, body, elifs, r#else.as_ref(), state, runner),
        CompoundCommand::Case { subject, items } => run_case(subject, items, state, runner),
        CompoundCommand::Break { level } => run_break(level.as_ref(), state, runner),
        CompoundCommand::Continue { level } => run_continue(level.as_ref(), state, runner),
        CompoundCommand::Arith { expr, location } => run_arith(expr, location, state, runner),
    }
}

/// `(list)`: runs `list` in a forked child so none of its variable or
/// directory changes are visible afterward; the parent just waits and
/// reports the child's exit status.
fn run_subshell(
    body: &Rc<List>,
    state: &mut ShellState,
    runner: &mut dyn CommandRunner,
) -> Result<ExitStatus> {
    // Safety: single-threaded core; no other thread can race this fork.
    match unsafe { fork() } {
        Ok(ForkResult::Child) => {
            let pid = std::process::id() as i32;
            crate::job::join_process_group(pid, 0);
            let status = match crate::runner::run_list(body, false, state, runner) {
                Continue(status) => status,
                Break(Divert::Exit(status)) => {
                    crate::trap::run_exit_trap(state, runner);
                    status.unwrap_or(ExitStatus::SUCCESS)
                }
                Break(other) => other.exit_status().unwrap_or(ExitStatus::SUCCESS),
            };
            std::process::exit(status.0);
        }
        Ok(ForkResult::Parent { child }) => {
            let pid = child.as_raw();
            crate::job::join_process_group(pid, pid);
            crate::job::hand_terminal_to(pid, state);
            let results = crate::job::wait_foreground(&[pid], state);
            crate::job::reclaim_terminal(state);
            let status = ExitStatus(results.first().map(|&(_, c)| c).unwrap_or(0));
            state.exit_status = status.0;
            Continue(status)
        }
        Err(e) => {
            eprintln!("psh: fork: {e}");
            state.exit_status = ExitStatus::ERROR.0;
            Continue(ExitStatus::ERROR)
        }
    }
}

fn run_simple(
    simple: &SimpleCommand,
    state: &mut ShellState,
    runner: &mut dyn CommandRunner,
) -> Result<ExitStatus> {
    crate::trap::mark_debug(state);

    if simple.words.is_empty() {
        if let Err(e) = assign::apply_all(&simple.assigns, false, state, runner) {
            return Continue(report_expansion_error(&e, state));
        }
        if simple.redirs.is_empty() {
            state.exit_status = ExitStatus::SUCCESS.0;
            return Continue(ExitStatus::SUCCESS);
        }
        let guard = match redir::RedirGuard::apply(&simple.redirs, state, runner) {
            Ok(guard) => guard,
            Err(e) => return Continue(report_redir_error(&e, state)),
        };
        drop(guard);
        state.exit_status = ExitStatus::SUCCESS.0;
        return Continue(ExitStatus::SUCCESS);
    }

    // The temporary scope is only needed to shadow a command-prefix
    // assignment (`FOO=bar cmd`) for the duration of `cmd`; pushing one
    // unconditionally would also swallow any variable a builtin run here
    // assigns as its actual job (`declare`/`export`/`readonly`/`local`/
    // `read`), since a brand new variable goes to the innermost scope and
    // that scope is popped the instant the command returns.
    let has_prefix_assignments = !simple.assigns.is_empty();
    if has_prefix_assignments {
        state.variables.push_scope();
    }
    let result = run_simple_with_command(simple, state, runner);
    if has_prefix_assignments {
        state.variables.pop_scope();
    }
    result
}

fn run_simple_with_command(
    simple: &SimpleCommand,
    state: &mut ShellState,
    runner: &mut dyn CommandRunner,
) -> Result<ExitStatus> {
    if let Err(e) = assign::apply_all(&simple.assigns, true, state, runner) {
        return Continue(report_expansion_error(&e, state));
    }

    // `export`/`declare`/`local`/`readonly`/`typeset` operands shaped
    // `NAME=value` get the same single-field, unsplit treatment `assign.rs`
    // gives the simple command's own assignment prefix (§4.3); the parser
    // can't tag them at parse time since it has no notion of which commands
    // are declaration builtins, so the decision is made here once the
    // command name is known.
    let declaration_name = simple.words[0].0.to_string_if_literal();
    let is_declaration = declaration_name
        .as_deref()
        .is_some_and(psh_builtin::treats_operands_as_assignments);
    let words = if is_declaration {
        expansion::expand_words_as_declaration(&simple.words, state, runner)
    } else {
        expansion::expand_words(&simple.words, state, runner)
    };
    let words = match words {
        Ok(words) => words,
        Err(e) => return Continue(report_expansion_error(&e, state)),
    };
    if words.is_empty() {
        state.exit_status = ExitStatus::SUCCESS.0;
        return Continue(ExitStatus::SUCCESS);
    }

    let mut xtrace = xtrace::XTrace::from_options(state);
    if let Some(trace) = xtrace.as_mut() {
        trace.extend_words(words.iter().cloned());
    }

    let guard = match redir::RedirGuard::apply(&simple.redirs, state, runner) {
        Ok(guard) => guard,
        Err(e) => return Continue(report_redir_error(&e, state)),
    };

    if let Some(trace) = xtrace {
        trace.finish(state);
    }

    // A command resolving to an external executable must see this
    // command's own prefix assignments in its environment regardless of
    // whether the variable is globally exported (POSIX §2.9.1); everything
    // else is exported the ordinary way via `ShellState::environment_snapshot`.
    let extra_env: Vec<(String, String)> = simple
        .assigns
        .iter()
        .map(|a| {
            let value = state.variables.get_str(&a.name).unwrap_or("").to_owned();
            (a.name.clone(), value)
        })
        .collect();

    let args: Vec<Field> = words.into_iter().map(Field::dummy).collect();
    let result = dispatch(&args, extra_env, state, runner);
    drop(guard);

    match result {
        Continue(status) => {
            state.exit_status = status.0;
            Continue(status)
        }
        other => other,
    }
}

fn dispatch(
    args: &[Field],
    extra_env: Vec<(String, String)>,
    state: &mut ShellState,
    runner: &mut dyn CommandRunner,
) -> Result<ExitStatus> {
    let name = args[0].value.clone();
    if name.contains('/') {
        return Continue(run_external(Path::new(&name), args, extra_env, state));
    }
    match command_search::search(&name, state) {
        command_search::Target::Function(function_name) => {
            run_function(&function_name, args, state, runner)
        }
        command_search::Target::Builtin(main) => main(state, args.to_vec(), runner),
        command_search::Target::External(path) => {
            Continue(run_external(&path, args, extra_env, state))
        }
        command_search::Target::NotFound => {
            eprintln!("psh: {name}: command not found");
            state.exit_status = ExitStatus::NOT_FOUND.0;
            Continue(ExitStatus::NOT_FOUND)
        }
    }
}

fn run_function(
    name: &str,
    args: &[Field],
    state: &mut ShellState,
    runner: &mut dyn CommandRunner,
) -> Result<ExitStatus> {
    let Some(function) = state.get_function(name) else {
        state.exit_status = ExitStatus::NOT_FOUND.0;
        return Continue(ExitStatus::NOT_FOUND);
    };
    let params: Vec<String> = args[1..].iter().map(|f| f.value.clone()).collect();
    state.push_call(name, params);
    let result = run_full_compound(&function.body, state, runner);
    state.pop_call();
    match result {
        Continue(status) => Continue(status),
        Break(Divert::Return(status)) => {
            let status = status.unwrap_or(ExitStatus::SUCCESS);
            state.exit_status = status.0;
            Continue(status)
        }
        other => other,
    }
}

/// Forks, execs `path` with `args` as argv, and waits for it, putting it in
/// its own process group so job control can track it like any other
/// foreground pipeline (it is one, of exactly one stage).
fn run_external(
    path: &Path,
    args: &[Field],
    extra_env: Vec<(String, String)>,
    state: &mut ShellState,
) -> ExitStatus {
    let Ok(program) = CString::new(path.as_os_str().as_bytes()) else {
        eprintln!("psh: {}: invalid command name", path.display());
        return ExitStatus::NOT_FOUND;
    };
    let argv: Vec<CString> = args
        .iter()
        .filter_map(|f| CString::new(f.value.as_str()).ok())
        .collect();

    let mut env_pairs = state.environment_snapshot();
    for (name, value) in extra_env {
        match env_pairs.iter_mut().find(|(n, _)| *n == name) {
            Some(existing) => existing.1 = value,
            None => env_pairs.push((name, value)),
        }
    }
    let envp: Vec<CString> = env_pairs
        .into_iter()
        .filter_map(|(n, v)| CString::new(format!("{n}={v}")).ok())
        .collect();

    // Safety: single-threaded core; no other thread can race this fork.
    match unsafe { fork() } {
        Ok(ForkResult::Child) => {
            let pid = std::process::id() as i32;
            crate::job::join_process_group(pid, pid);
            match execve(&program, &argv, &envp) {
                Ok(_) => unreachable!("execve only returns on error"),
                Err(nix::errno::Errno::ENOENT) => std::process::exit(ExitStatus::NOT_FOUND.0),
                Err(_) => std::process::exit(ExitStatus::NOT_EXECUTABLE.0),
            }
        }
        Ok(ForkResult::Parent { child }) => {
            let pid = child.as_raw();
            crate::job::join_process_group(pid, pid);
            crate::job::hand_terminal_to(pid, state);
            let results = crate::job::wait_foreground(&[pid], state);
            crate::job::reclaim_terminal(state);
            ExitStatus(results.first().map(|&(_, c)| c).unwrap_or(0))
        }
        Err(e) => {
            eprintln!("psh: fork: {e}");
            ExitStatus::ERROR
        }
    }
}

fn report_expansion_error(e: &ExpansionError, state: &mut ShellState) -> ExitStatus {
    eprintln!("psh: {e}");
    let status = ExitStatus(e.exit_code());
    state.exit_status = status.0;
    status
}

fn report_redir_error(e: &redir::RedirError, state: &mut ShellState) -> ExitStatus {
    eprintln!("psh: {e}");
    state.exit_status = ExitStatus::ERROR.0;
    ExitStatus::ERROR
}

fn report_assign_error(name: &str, e: &AssignError, state: &mut ShellState) -> ExitStatus {
    eprintln!("psh: {name}: {e}");
    state.exit_status = ExitStatus::FAILURE.0;
    ExitStatus::FAILURE
}

fn expand_word_list(
    words: &[Word],
    state: &mut ShellState,
    runner: &mut dyn CommandRunner,
) -> std::result::Result<Vec<String>, ExitStatus> {
    let mut out = Vec::new();
    for word in words {
        match expansion::expand_word(word, false, state, runner) {
            Ok(fields) => out.extend(fields),
            Err(e) => return Err(report_expansion_error(&e, state)),
        }
    }
    Ok(out)
}

fn run_for(
    name: &Word,
    values: Option<&[Word]>,
    body: &List,
    state: &mut ShellState,
    runner: &mut dyn CommandRunner,
) -> Result<ExitStatus> {
    let Some(var_name) = name.to_string_if_literal() else {
        eprintln!("psh: for: invalid variable name");
        state.exit_status = ExitStatus::ERROR.0;
        return Continue(ExitStatus::ERROR);
    };

    let items = match values {
        Some(words) => match expand_word_list(words, state, runner) {
            Ok(items) => items,
            Err(status) => return Continue(status),
        },
        None => state.positional_params().to_vec(),
    };

    let mut status = ExitStatus::SUCCESS;
    for value in items {
        if let Err(e) = state.assign_variable(&var_name, Variable::new(value)) {
            return Continue(report_assign_error(&var_name, &e, state));
        }
        run_loop_body!(body, status, state, runner);
    }
    state.exit_status = status.0;
    Continue(status)
}

fn run_c_style_for(
    init: Option<&str>,
    condition: Option<&str>,
    update: Option<&str>,
    body: &List,
    state: &mut ShellState,
    runner: &mut dyn CommandRunner,
) -> Result<ExitStatus> {
    let location = psh_syntax::source::Location::dummy(0..0);
    if let Some(init) = init {
        if let Err(e) = expansion::arith::expand(init, &location, state, runner) {
            return Continue(report_expansion_error(&e, state));
        }
    }

    let mut status = ExitStatus::SUCCESS;
    loop {
        if let Some(condition) = condition {
            match expansion::arith::expand(condition, &location, state, runner) {
                Ok(value) if value.trim() == "0" => break,
                Ok(_) => {}
                Err(e) => return Continue(report_expansion_error(&e, state)),
            }
        }
        run_loop_body!(body, status, state, runner);
        if let Some(update) = update {
            if let Err(e) = expansion::arith::expand(update, &location, state, runner) {
                return Continue(report_expansion_error(&e, state));
            }
        }
    }
    state.exit_status = status.0;
    Continue(status)
}

fn run_select(
    name: &Word,
    values: Option<&[Word]>,
    body: &List,
    state: &mut ShellState,
    runner: &mut dyn CommandRunner,
) -> Result<ExitStatus> {
    let Some(var_name) = name.to_string_if_literal() else {
        eprintln!("psh: select: invalid variable name");
        state.exit_status = ExitStatus::ERROR.0;
        return Continue(ExitStatus::ERROR);
    };

    let items = match values {
        Some(words) => match expand_word_list(words, state, runner) {
            Ok(items) => items,
            Err(status) => return Continue(status),
        },
        None => state.positional_params().to_vec(),
    };
    if items.is_empty() {
        state.exit_status = ExitStatus::SUCCESS.0;
        return Continue(ExitStatus::SUCCESS);
    }

    let mut status = ExitStatus::SUCCESS;
    loop {
        print_select_menu(&items, state);
        let Some(reply) = read_select_reply() else {
            break;
        };
        if let Err(e) = state.assign_variable("REPLY", Variable::new(reply.clone())) {
            return Continue(report_assign_error("REPLY", &e, state));
        }
        let choice = reply
            .trim()
            .parse::<usize>()
            .ok()
            .and_then(|n| n.checked_sub(1))
            .and_then(|i| items.get(i).cloned())
            .unwrap_or_default();
        if let Err(e) = state.assign_variable(&var_name, Variable::new(choice)) {
            return Continue(report_assign_error(&var_name, &e, state));
        }
        run_loop_body!(body, status, state, runner);
    }
    state.exit_status = status.0;
    Continue(status)
}

fn print_select_menu(items: &[String], state: &ShellState) {
    use std::io::Write as _;
    let mut out = std::io::stderr();
    for (i, item) in items.iter().enumerate() {
        let _ = writeln!(out, "{}) {item}", i + 1);
    }
    let ps3 = state.variables.get_str("PS3").unwrap_or("#? ");
    let _ = write!(out, "{ps3}");
    let _ = out.flush();
}

fn read_select_reply() -> Option<String> {
    use std::io::BufRead as _;
    let mut line = String::new();
    let bytes = std::io::stdin().lock().read_line(&mut line).ok()?;
    if bytes == 0 {
        return None;
    }
    Some(line.trim_end_matches('\n').to_owned())
}

fn run_while(
    condition: &List,
    body: &List,
    until: bool,
    state: &mut ShellState,
    runner: &mut dyn CommandRunner,
) -> Result<ExitStatus> {
    let mut status = ExitStatus::SUCCESS;
    loop {
        let cond_status = match crate::runner::run_list(condition, true, state, runner) {
            Continue(s) => s,
            other => return other,
        };
        let keep_going = if until {
            !cond_status.is_successful()
        } else {
            cond_status.is_successful()
        };
        if !keep_going {
            break;
        }
        run_loop_body!(body, status, state, runner);
    }
    state.exit_status = status.0;
    Continue(status)
}

fn run_if(
    condition: &List,
    body: &List,
    elifs: &[ElifThen],
    r#else: Option<&List>,
    state: &mut ShellState,
    runner: &mut dyn CommandRunner,
) -> Result<ExitStatus> {
    let cond_status = match crate::runner::run_list(condition, true, state, runner) {
        Continue(s) => s,
        other => return other,
    };
    if cond_status.is_successful() {
        return crate::runner::run_list(body, false, state, runner);
    }
    for elif in elifs {
        let cond_status = match crate::runner::run_list(&elif.condition, true, state, runner) {
            Continue(s) => s,
            other => return other,
        };
        if cond_status.is_successful() {
            return crate::runner::run_list(&elif.body, false, state, runner);
        }
    }
    if let Some(else_body) = r#else {
        return crate::runner::run_list(else_body, false, state, runner);
    }
    state.exit_status = ExitStatus::SUCCESS.0;
    Continue(ExitStatus::SUCCESS)
}

fn run_case(
    subject: &Word,
    items: &[CaseItem],
    state: &mut ShellState,
    runner: &mut dyn CommandRunner,
) -> Result<ExitStatus> {
    let subject_value = match expansion::expand_word(subject, true, state, runner) {
        Ok(fields) => fields.into_iter().next().unwrap_or_default(),
        Err(e) => return Continue(report_expansion_error(&e, state)),
    };

    let mut status = ExitStatus::SUCCESS;
    let mut run_unconditionally = false;
    let mut i = 0;
    while i < items.len() {
        let item = &items[i];
        let should_run = if run_unconditionally {
            true
        } else {
            let mut matched = false;
            for pattern in &item.patterns {
                let field = match expansion::word::expand_word_single(pattern, state, runner) {
                    Ok(field) => field,
                    Err(e) => return Continue(report_expansion_error(&e, state)),
                };
                let chars = expansion::glob::apply_escapes(&field);
                if let Ok(compiled) =
                    psh_fnmatch::Pattern::parse_with_config(chars, psh_fnmatch::Config::anchored())
                {
                    if compiled.is_match(&subject_value) {
                        matched = true;
                        break;
                    }
                }
            }
            matched
        };

        if !should_run {
            i += 1;
            continue;
        }

        status = match crate::runner::run_list(&item.body, false, state, runner) {
            Continue(s) => s,
            other => return other,
        };
        match item.continuation {
            CaseContinuation::Break => break,
            CaseContinuation::FallThrough => {
                run_unconditionally = true;
                i += 1;
            }
            CaseContinuation::Continue => {
                run_unconditionally = false;
                i += 1;
            }
        }
    }
    state.exit_status = status.0;
    Continue(status)
}

fn parse_loop_level(
    level: Option<&Word>,
    name: &str,
    state: &mut ShellState,
    runner: &mut dyn CommandRunner,
) -> std::result::Result<usize, ExitStatus> {
    let Some(word) = level else { return Ok(1) };
    let text = match expansion::expand_word(word, true, state, runner) {
        Ok(fields) => fields.into_iter().next().unwrap_or_default(),
        Err(e) => return Err(report_expansion_error(&e, state)),
    };
    match text.trim().parse::<usize>() {
        Ok(n) if n >= 1 => Ok(n),
        _ => {
            eprintln!("psh: {name}: {text}: not a positive integer");
            state.exit_status = ExitStatus::ERROR.0;
            Err(ExitStatus::ERROR)
        }
    }
}

fn run_break(
    level: Option<&Word>,
    state: &mut ShellState,
    runner: &mut dyn CommandRunner,
) -> Result<ExitStatus> {
    match parse_loop_level(level, "break", state, runner) {
        Ok(n) => Break(Divert::Break { count: n - 1 }),
        Err(status) => Continue(status),
    }
}

fn run_continue(
    level: Option<&Word>,
    state: &mut ShellState,
    runner: &mut dyn CommandRunner,
) -> Result<ExitStatus> {
    match parse_loop_level(level, "continue", state, runner) {
        Ok(n) => Break(Divert::Continue { count: n - 1 }),
        Err(status) => Continue(status),
    }
}

fn run_arith(
    expr: &str,
    location: &psh_syntax::source::Location,
    state: &mut ShellState,
    runner: &mut dyn CommandRunner,
) -> Result<ExitStatus> {
    match expansion::arith::expand(expr, location, state, runner) {
        Ok(value) => {
            let status = if value.trim() == "0" {
                ExitStatus::FAILURE
            } else {
                ExitStatus::SUCCESS
            };
            state.exit_status = status.0;
            Continue(status)
        }
        Err(e) => Continue(report_expansion_error(&e, state)),
    }
}

// This file is part of psh, a POSIX-flavored shell.
// Copyright (C) 2021 WATANABE Yuki

//! Parameter expansion: `${name}`, `$name`, and every `${name<modifier>}`
//! operator. Grounded on the teacher's per-operator split, condensed into
//! one function per [`Modifier`] variant instead of a file per operator.

use crate::expansion::attr::{AttrChar, Expansion, Origin};
use crate::error::ExpansionError;
use psh_env::semantics::CommandRunner;
use psh_env::{ShellState, Value, Variable};
use psh_syntax::source::Location;
use psh_syntax::syntax::{
    BracedParam, CaseConv, Modifier, Param, ParamType, SpecialParam, SwitchCondition, SwitchType,
    TrimLength, TrimSide,
};

/// One parameter value as gathered before a modifier is applied: either a
/// single scalar, or (for `$@`/`${arr[@]}`) a run of elements that must stay
/// separate fields when unquoted.
enum Raw {
    Scalar(Option<String>),
    Elements(Vec<String>),
}

fn special_param_value(special: SpecialParam, state: &ShellState) -> Raw {
    match special {
        SpecialParam::At | SpecialParam::Asterisk => {
            Raw::Elements(state.positional_params().to_vec())
        }
        SpecialParam::Hash => Raw::Scalar(Some(state.positional_params().len().to_string())),
        SpecialParam::Question => Raw::Scalar(Some(state.exit_status.to_string())),
        SpecialParam::Hyphen => {
            let flags: String = state
                .options
                .iter_enabled()
                .filter_map(|o| o.short_flag())
                .collect();
            Raw::Scalar(Some(flags))
        }
        SpecialParam::Dollar => Raw::Scalar(Some(state.shell_pid.to_string())),
        SpecialParam::Bang => Raw::Scalar(state.jobs.last_async_pid().map(|p| p.to_string())),
        SpecialParam::Zero => Raw::Scalar(Some(state.script_name.clone())),
    }
}

fn positional_param_value(index: usize, state: &ShellState) -> Raw {
    Raw::Scalar(
        index
            .checked_sub(1)
            .and_then(|i| state.positional_params().get(i))
            .cloned(),
    )
}

fn variable_value(param: &Param, state: &ShellState) -> Raw {
    let name = if param.indirect {
        match state.variables.get_str(&param.id) {
            Some(n) => n.to_owned(),
            None => return Raw::Scalar(None),
        }
    } else {
        param.id.clone()
    };
    let Some(var) = state.variables.get(&name) else {
        return Raw::Scalar(None);
    };
    match (&var.value, &param.index) {
        (Some(Value::Scalar(s)), _) => Raw::Scalar(Some(s.clone())),
        (Some(value), Some(index_word)) => {
            let subscript = index_word.to_string_if_literal().unwrap_or_default();
            if subscript == "@" || subscript == "*" {
                Raw::Elements(value.all_elements().map(str::to_owned).collect())
            } else {
                Raw::Scalar(value.index(&subscript).map(str::to_owned))
            }
        }
        (Some(value), None) => Raw::Scalar(value.all_elements().next().map(str::to_owned)),
        (None, _) => Raw::Scalar(None),
    }
}

fn raw_value(param: &Param, state: &ShellState) -> Raw {
    match &param.r#type {
        ParamType::Special(s) => special_param_value(*s, state),
        ParamType::Positional(i) => positional_param_value(*i, state),
        ParamType::Variable => variable_value(param, state),
    }
}

fn is_at(param: &Param) -> bool {
    matches!(&param.r#type, ParamType::Special(SpecialParam::At))
        || param
            .index
            .as_ref()
            .and_then(|w| w.to_string_if_literal())
            .as_deref()
            == Some("@")
}

/// Joins `elements` with the first character of `$IFS` (default space), the
/// `$*`/unset-`IFS`/quoted-context behavior.
fn join_with_ifs(elements: &[String], state: &ShellState) -> String {
    let sep = state
        .variables
        .get_str("IFS")
        .unwrap_or(" \t\n")
        .chars()
        .next()
        .map(String::from)
        .unwrap_or_default();
    elements.join(&sep)
}

/// Applies a [`Modifier`] to a parameter already read into `raw`, returning
/// the string fields the expansion ultimately yields (more than one only for
/// an unquoted `$@`/`${arr[@]}` left unmodified, or `${!prefix@}`).
fn apply_modifier(
    param: &Param,
    modifier: &Modifier,
    raw: Raw,
    location: &Location,
    quoted: bool,
    state: &mut ShellState,
    runner: &mut dyn CommandRunner,
) -> Result<Vec<String>, ExpansionError> {
    // `$@`/`${arr[@]}` always yields its elements as separate fields, quoted
    // or not; `quoted` only controls whether `expand` marks those fields as
    // quoted for `split.rs` to skip further IFS splitting on them.
    let at_splitting = is_at(param);
    let is_set = !matches!(raw, Raw::Scalar(None));
    let scalar = |raw: &Raw, state: &ShellState| -> String {
        match raw {
            Raw::Scalar(v) => v.clone().unwrap_or_default(),
            Raw::Elements(es) => join_with_ifs(es, state),
        }
    };

    match modifier {
        Modifier::None => {
            if at_splitting {
                if let Raw::Elements(es) = raw {
                    return Ok(es);
                }
            }
            Ok(vec![scalar(&raw, state)])
        }

        Modifier::Length => {
            let len = match &raw {
                Raw::Scalar(v) => v.as_deref().unwrap_or_default().chars().count(),
                Raw::Elements(es) => es.len(),
            };
            Ok(vec![len.to_string()])
        }

        Modifier::Switch(switch) => {
            let value = scalar(&raw, state);
            let triggers = match switch.condition {
                SwitchCondition::Unset => !is_set,
                SwitchCondition::UnsetOrEmpty => !is_set || value.is_empty(),
            };
            match switch.r#type {
                SwitchType::Alter => {
                    if triggers {
                        Ok(vec![String::new()])
                    } else {
                        Ok(vec![expand_subword(&switch.word, state, runner)?])
                    }
                }
                SwitchType::Default => {
                    if triggers {
                        Ok(vec![expand_subword(&switch.word, state, runner)?])
                    } else {
                        Ok(vec![value])
                    }
                }
                SwitchType::Assign => {
                    if triggers {
                        let new_value = expand_subword(&switch.word, state, runner)?;
                        state
                            .assign_variable(&param.id, Variable::new(new_value.clone()))
                            .map_err(|source| ExpansionError::Assign {
                                name: param.id.clone(),
                                source,
                                location: location.clone(),
                            })?;
                        Ok(vec![new_value])
                    } else {
                        Ok(vec![value])
                    }
                }
                SwitchType::Error => {
                    if triggers {
                        let message = expand_subword(&switch.word, state, runner)?;
                        let message = if message.is_empty() {
                            "parameter null or not set".to_owned()
                        } else {
                            message
                        };
                        Err(ExpansionError::SwitchError {
                            name: param.id.clone(),
                            message,
                            location: location.clone(),
                        })
                    } else {
                        Ok(vec![value])
                    }
                }
            }
        }

        Modifier::Trim(trim) => {
            let value = scalar(&raw, state);
            let pattern_text = expand_subword(&trim.pattern, state, runner)?;
            let pattern = psh_fnmatch::Pattern::parse_with_config(
                psh_fnmatch::with_escape(&pattern_text),
                psh_fnmatch::Config {
                    case_sensitive: true,
                    anchor_begin: matches!(trim.side, TrimSide::Prefix),
                    anchor_end: matches!(trim.side, TrimSide::Suffix),
                },
            )
            .map_err(|e| ExpansionError::BadPattern {
                message: e.to_string(),
                location: location.clone(),
            })?;
            let longest = matches!(trim.length, TrimLength::Longest);
            let trimmed = match trim.side {
                TrimSide::Prefix => match pattern.find_prefix(&value, longest) {
                    Some(end) => value[end..].to_owned(),
                    None => value,
                },
                TrimSide::Suffix => match pattern.find_suffix(&value, longest) {
                    Some(start) => value[..start].to_owned(),
                    None => value,
                },
            };
            Ok(vec![trimmed])
        }

        Modifier::Substitution(subst) => {
            let value = scalar(&raw, state);
            let pattern_text = expand_subword(&subst.pattern, state, runner)?;
            let replacement = match &subst.replacement {
                Some(w) => expand_subword(w, state, runner)?,
                None => String::new(),
            };
            let pattern = psh_fnmatch::Pattern::parse_with_config(
                psh_fnmatch::with_escape(&pattern_text),
                psh_fnmatch::Config {
                    case_sensitive: true,
                    anchor_begin: true,
                    anchor_end: false,
                },
            )
            .map_err(|e| ExpansionError::BadPattern {
                message: e.to_string(),
                location: location.clone(),
            })?;
            Ok(vec![substitute(&value, &pattern, &replacement, subst.all)])
        }

        Modifier::Slice(slice) => {
            let offset_text = expand_subword(&slice.offset, state, runner)?;
            let offset: i64 = offset_text.trim().parse().unwrap_or(0);
            let length = match &slice.length {
                Some(w) => Some(
                    expand_subword(w, state, runner)?
                        .trim()
                        .parse::<i64>()
                        .unwrap_or(0),
                ),
                None => None,
            };
            match &raw {
                Raw::Elements(es) => Ok(slice_elements(es, offset, length)),
                Raw::Scalar(v) => {
                    let v = v.clone().unwrap_or_default();
                    Ok(vec![slice_scalar(&v, offset, length)])
                }
            }
        }

        Modifier::CaseConv { conv, whole } => {
            let value = scalar(&raw, state);
            Ok(vec![case_convert(&value, *conv, *whole)])
        }

        Modifier::PrefixNames { at } => {
            let names: Vec<String> = state
                .variables
                .names_with_prefix(&param.id)
                .map(str::to_owned)
                .collect();
            if *at && !quoted {
                Ok(names)
            } else {
                Ok(vec![names.join(" ")])
            }
        }
    }
}

fn slice_scalar(value: &str, offset: i64, length: Option<i64>) -> String {
    let chars: Vec<char> = value.chars().collect();
    let len = chars.len() as i64;
    let start = if offset < 0 { (len + offset).max(0) } else { offset.min(len) };
    let end = match length {
        None => len,
        Some(l) if l < 0 => (len + l).max(start),
        Some(l) => (start + l).min(len),
    };
    chars[start as usize..end as usize].iter().collect()
}

fn slice_elements(elements: &[String], offset: i64, length: Option<i64>) -> Vec<String> {
    let len = elements.len() as i64;
    let start = if offset < 0 { (len + offset).max(0) } else { offset.min(len) };
    let end = match length {
        None => len,
        Some(l) if l < 0 => (len + l).max(start),
        Some(l) => (start + l).min(len),
    };
    elements[start as usize..end as usize].to_vec()
}

fn case_convert(value: &str, conv: CaseConv, whole: bool) -> String {
    let convert_char = |c: char| match conv {
        CaseConv::Upper => c.to_uppercase().collect::<String>(),
        CaseConv::Lower => c.to_lowercase().collect::<String>(),
    };
    if whole {
        value.chars().map(convert_char).collect()
    } else {
        let mut chars = value.chars();
        match chars.next() {
            Some(first) => convert_char(first) + chars.as_str(),
            None => String::new(),
        }
    }
}

fn substitute(value: &str, pattern: &psh_fnmatch::Pattern, replacement: &str, all: bool) -> String {
    let mut out = String::new();
    let mut rest = value;
    let mut replaced_once = false;
    'outer: loop {
        for (start, _) in rest.char_indices().chain(std::iter::once((rest.len(), ' '))) {
            let candidate = &rest[start..];
            for (end, _) in candidate
                .char_indices()
                .chain(std::iter::once((candidate.len(), ' ')))
                .collect::<Vec<_>>()
                .into_iter()
                .rev()
            {
                if end == 0 && start == rest.len() {
                    break;
                }
                if pattern.is_match(&candidate[..end]) {
                    out.push_str(&rest[..start]);
                    out.push_str(replacement);
                    rest = &candidate[end..];
                    replaced_once = true;
                    if all {
                        continue 'outer;
                    } else {
                        out.push_str(rest);
                        return out;
                    }
                }
            }
            if start == rest.len() {
                break;
            }
        }
        break;
    }
    out.push_str(rest);
    if !replaced_once {
        return value.to_owned();
    }
    out
}

/// Expands a sub-word (a `Switch`/`Trim`/`Substitution` operand) to a plain
/// string, going through [`crate::expansion::word::expand_word`] but
/// collapsing the result as a non-splitting assignment-like value would be.
fn expand_subword(
    word: &psh_syntax::syntax::Word,
    state: &mut ShellState,
    runner: &mut dyn CommandRunner,
) -> Result<String, ExpansionError> {
    let field = crate::expansion::word::expand_word_single(word, state, runner)?;
    Ok(field.strip())
}

/// Expands a full `${...}` construct, pushing the resulting field(s) into
/// `dest`. For an unquoted `$@`/`${arr[@]}` (or `${!prefix@}`) left
/// unmodified or index/length-modified, each element becomes its own field
/// via [`Expansion::start_new_field`]; every other case pushes one field.
pub fn expand<E: Expansion>(
    braced: &BracedParam,
    quoted: bool,
    state: &mut ShellState,
    runner: &mut dyn CommandRunner,
    dest: &mut E,
) -> Result<(), ExpansionError> {
    if state.options.is_set(psh_env::options::Option::NoUnset)
        && !matches!(raw_value(&braced.param, state), Raw::Scalar(Some(_)) | Raw::Elements(_))
        && matches!(braced.modifier, Modifier::None | Modifier::Length)
    {
        return Err(ExpansionError::UnboundVariable {
            name: braced.param.id.clone(),
            location: braced.location.clone(),
        });
    }

    let raw = raw_value(&braced.param, state);
    let fields = apply_modifier(
        &braced.param,
        &braced.modifier,
        raw,
        &braced.location,
        quoted,
        state,
        runner,
    )?;

    let origin = Origin::SoftExpansion;
    for (i, field) in fields.iter().enumerate() {
        if i > 0 {
            dest.start_new_field();
        }
        dest.push_str(field, origin, quoted, false);
    }
    Ok(())
}

/// Expands an unbraced `$name` (always `Modifier::None`, never an array
/// index).
pub fn expand_raw<E: Expansion>(
    param: &Param,
    location: &Location,
    quoted: bool,
    state: &mut ShellState,
    runner: &mut dyn CommandRunner,
    dest: &mut E,
) -> Result<(), ExpansionError> {
    let braced = BracedParam {
        param: param.clone(),
        modifier: Modifier::None,
        location: location.clone(),
    };
    expand(&braced, quoted, state, runner, dest)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::expansion::attr::AttrField;
    use psh_syntax::source::Location;
    use psh_syntax::syntax::{Param, ParamType};

    struct Noop;
    impl CommandRunner for Noop {
        fn run_source(
            &mut self,
            _state: &mut ShellState,
            _source: &str,
        ) -> psh_env::semantics::Result<psh_env::ExitStatus> {
            unreachable!()
        }
    }

    #[test]
    fn default_value_substitutes_when_unset() {
        let mut state = ShellState::new("psh", 1);
        let mut runner = Noop;
        let mut field = AttrField::default();
        let braced = BracedParam {
            param: Param::variable("x"),
            modifier: Modifier::Switch(psh_syntax::syntax::Switch {
                r#type: SwitchType::Default,
                condition: SwitchCondition::Unset,
                word: word_of("fallback"),
            }),
            location: Location::dummy(0..1),
        };
        expand(&braced, false, &mut state, &mut runner, &mut field).unwrap();
        assert_eq!(field.strip(), "fallback");
    }

    #[test]
    fn length_counts_characters() {
        let mut state = ShellState::new("psh", 1);
        state.assign_variable("x", Variable::new("hello")).unwrap();
        let mut runner = Noop;
        let mut field = AttrField::default();
        let braced = BracedParam {
            param: Param::variable("x"),
            modifier: Modifier::Length,
            location: Location::dummy(0..1),
        };
        expand(&braced, false, &mut state, &mut runner, &mut field).unwrap();
        assert_eq!(field.strip(), "5");
    }

    #[test]
    fn unquoted_at_splits_into_separate_fields() {
        let mut state = ShellState::new("psh", 1);
        state.set_positional_params(vec!["1".into(), "2".into()]);
        let mut runner = Noop;
        let mut fields: Vec<AttrField> = Vec::new();
        fields.push(AttrField::default());
        let braced = BracedParam {
            param: Param {
                id: "@".into(),
                r#type: ParamType::Special(psh_syntax::syntax::SpecialParam::At),
                index: None,
                indirect: false,
            },
            modifier: Modifier::None,
            location: Location::dummy(0..1),
        };
        expand(&braced, false, &mut state, &mut runner, &mut fields).unwrap();
        assert_eq!(fields.len(), 2);
        assert_eq!(fields[0].strip(), "1");
        assert_eq!(fields[1].strip(), "2");
    }

    #[test]
    fn quoted_at_still_splits_into_separate_fields() {
        let mut state = ShellState::new("psh", 1);
        state.set_positional_params(vec!["1".into(), "2".into()]);
        let mut runner = Noop;
        let mut fields: Vec<AttrField> = Vec::new();
        fields.push(AttrField::default());
        let braced = BracedParam {
            param: Param {
                id: "@".into(),
                r#type: ParamType::Special(psh_syntax::syntax::SpecialParam::At),
                index: None,
                indirect: false,
            },
            modifier: Modifier::None,
            location: Location::dummy(0..1),
        };
        expand(&braced, true, &mut state, &mut runner, &mut fields).unwrap();
        assert_eq!(fields.len(), 2);
        assert_eq!(fields[0].strip(), "1");
        assert_eq!(fields[1].strip(), "2");
    }

    fn word_of(s: &str) -> psh_syntax::syntax::Word {
        psh_syntax::syntax::Word {
            units: s
                .chars()
                .map(|c| {
                    psh_syntax::syntax::WordUnit::Unquoted(psh_syntax::syntax::TextUnit::Literal(c))
                })
                .collect(),
            location: Location::dummy(0..s.len()),
        }
    }
}

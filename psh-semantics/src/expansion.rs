// This file is part of psh, a POSIX-flavored shell.
// Copyright (C) 2021 WATANABE Yuki

//! Word expansion: turns a [`psh_syntax::syntax::Word`] into zero or more
//! final field strings, in the five-stage order described in
//! [`word::expand_word`].

pub mod arith;
pub mod attr;
pub mod command_subst;
pub mod glob;
pub mod param;
pub mod quote_removal;
pub mod split;
pub mod tilde;
pub mod word;

pub use attr::{AttrChar, AttrField, Expansion, Origin};
pub use word::{expand_here_doc_text, expand_word, expand_words, expand_words_as_declaration};

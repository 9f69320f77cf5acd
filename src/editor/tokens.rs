// Copyright 2024 OctoFHIR Team
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//     http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

//! Token-level edits of a program
//!
//! Every operation addresses either the final expression or one local
//! binding and returns a new [`Program`], leaving the input untouched.

use crate::ast::{Program, Target, Token};
use crate::error::{EditorError, Result};
use crate::registry::FunctionRegistry;

fn edit<F>(program: &Program, target: &Target, apply: F) -> Result<Program>
where
    F: FnOnce(&mut Vec<Token>) -> Result<()>,
{
    let mut next = program.clone();
    let tokens = next.tokens_mut(target).ok_or_else(|| match target {
        Target::Binding(id) => EditorError::UnknownBinding { id: id.clone() },
        Target::Expression => EditorError::UnknownBinding { id: String::new() },
    })?;
    apply(tokens)?;
    Ok(next)
}

fn check_index(index: usize, len: usize) -> Result<()> {
    if index < len {
        Ok(())
    } else {
        Err(EditorError::IndexOutOfRange { index, len })
    }
}

fn function_args(tokens: &mut [Token], index: usize) -> Result<(&str, &mut Vec<Option<Program>>)> {
    check_index(index, tokens.len())?;
    match &mut tokens[index] {
        Token::Function { value, args } => Ok((value.as_str(), args)),
        _ => Err(EditorError::NotAFunction { index }),
    }
}

/// Number of argument slots a call may hold
///
/// Catalog functions are bounded by their arity; unknown names may grow by
/// one argument at a time.
fn argument_limit(name: &str, len: usize) -> usize {
    match FunctionRegistry::standard().get(name) {
        Some(signature) => signature.max_arity.max(len),
        None => len.saturating_add(1),
    }
}

/// Append a token
pub fn add_token(program: &Program, target: &Target, token: Token) -> Result<Program> {
    edit(program, target, |tokens| {
        tokens.push(token);
        Ok(())
    })
}

/// Replace the token at `index`
pub fn update_token(
    program: &Program,
    target: &Target,
    index: usize,
    token: Token,
) -> Result<Program> {
    edit(program, target, |tokens| {
        check_index(index, tokens.len())?;
        tokens[index] = token;
        Ok(())
    })
}

/// Remove the token at `index`, or the last token when no index is given
pub fn delete_token(program: &Program, target: &Target, index: Option<usize>) -> Result<Program> {
    edit(program, target, |tokens| {
        let index = match index {
            Some(index) => index,
            None => tokens
                .len()
                .checked_sub(1)
                .ok_or(EditorError::IndexOutOfRange { index: 0, len: 0 })?,
        };
        check_index(index, tokens.len())?;
        tokens.remove(index);
        Ok(())
    })
}

/// Set argument `arg_index` of the function token at `token_index`
///
/// Missing arguments before `arg_index` are filled with blanks. Indexes past
/// the function's arity are out of range.
pub fn update_arg(
    program: &Program,
    target: &Target,
    token_index: usize,
    arg_index: usize,
    arg: Program,
) -> Result<Program> {
    edit(program, target, |tokens| {
        let (name, args) = function_args(tokens, token_index)?;
        check_index(arg_index, argument_limit(name, args.len()))?;
        if args.len() <= arg_index {
            args.resize(arg_index + 1, None);
        }
        args[arg_index] = Some(arg);
        Ok(())
    })
}

/// Clear argument `arg_index` of the function token at `token_index`
///
/// The trailing argument is removed; inner arguments become blank so the
/// positions of the following ones are preserved.
pub fn delete_arg(
    program: &Program,
    target: &Target,
    token_index: usize,
    arg_index: usize,
) -> Result<Program> {
    edit(program, target, |tokens| {
        let (_, args) = function_args(tokens, token_index)?;
        check_index(arg_index, args.len())?;
        if arg_index + 1 == args.len() {
            args.pop();
        } else {
            args[arg_index] = None;
        }
        Ok(())
    })
}

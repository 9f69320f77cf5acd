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

//! Structural type patterns with generic letters
//!
//! Catalog entries describe their operands with patterns that may contain
//! [`Type::Generic`] placeholders. Matching an actual type against a pattern
//! produces a [`GenericBindings`] substitution that lives for exactly one
//! call site.

use super::types::{GenericLetter, Type};
use rustc_hash::FxHashMap;
use thiserror::Error;

/// Per-call substitution of generic letters
#[derive(Debug, Clone, Default, PartialEq)]
pub struct GenericBindings {
    letters: FxHashMap<GenericLetter, Type>,
}

impl GenericBindings {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, letter: GenericLetter) -> Option<&Type> {
        self.letters.get(&letter)
    }

    pub fn is_empty(&self) -> bool {
        self.letters.is_empty()
    }

    /// Bind a letter, replacing any previous binding
    pub fn bind(&mut self, letter: GenericLetter, ty: Type) {
        self.letters.insert(letter, ty);
    }

    /// Union of two binding sets; a letter bound to two inconsistent types
    /// is a [`MatchError::GenericMismatch`]
    pub fn merge(&self, other: &GenericBindings) -> Result<GenericBindings, MatchError> {
        let mut merged = self.clone();
        for (letter, ty) in &other.letters {
            match merged.letters.get(letter) {
                Some(bound) if !generic_consistent(bound, ty) => {
                    return Err(MatchError::GenericMismatch {
                        letter: *letter,
                        bound: bound.clone(),
                        actual: ty.clone(),
                    });
                }
                Some(_) => {}
                None => {
                    merged.letters.insert(*letter, ty.clone());
                }
            }
        }
        Ok(merged)
    }

    /// Replace bound generic letters inside `ty`
    pub fn substitute(&self, ty: &Type) -> Type {
        match ty {
            Type::Generic(letter) => self.get(*letter).cloned().unwrap_or_else(|| ty.clone()),
            Type::Single(inner) => Type::single(self.substitute(inner)),
            Type::TypeOf(inner) => Type::type_of(self.substitute(inner)),
            Type::Choice(options) => {
                Type::Choice(options.iter().map(|option| self.substitute(option)).collect())
            }
            Type::Lambda { context, returns } => {
                Type::lambda(self.substitute(returns), self.substitute(context))
            }
            other => other.clone(),
        }
    }
}

/// Reasons a pattern does not match
#[derive(Error, Debug, Clone, PartialEq)]
pub enum MatchError {
    #[error("expected {expected}, got {actual}")]
    Incompatible { expected: Type, actual: Type },

    #[error("generic mismatch")]
    GenericMismatch {
        letter: GenericLetter,
        bound: Type,
        actual: Type,
    },

    /// One side was already invalid
    #[error("{0}")]
    Invalid(String),
}

/// Match `actual` against `pattern`, extending `bindings`
///
/// Returns the extended bindings on success. `Null` matches every pattern
/// without binding anything, a single actual value satisfies a collection
/// pattern, and a choice matches when any of its options does.
pub fn match_type(
    pattern: &Type,
    actual: &Type,
    bindings: &GenericBindings,
) -> Result<GenericBindings, MatchError> {
    match_inner(pattern, actual, bindings.clone())
}

/// Structural compatibility of an actual type with an expected type
pub fn compatible(expected: &Type, actual: &Type) -> bool {
    match_type(expected, actual, &GenericBindings::default()).is_ok()
}

fn match_inner(
    pattern: &Type,
    actual: &Type,
    mut bindings: GenericBindings,
) -> Result<GenericBindings, MatchError> {
    if let Type::Invalid(message) = actual {
        return Err(MatchError::Invalid(message.clone()));
    }
    if let Type::Invalid(message) = pattern {
        return Err(MatchError::Invalid(message.clone()));
    }
    if actual.is_null() {
        return Ok(bindings);
    }

    if let Type::Generic(letter) = pattern {
        return match bindings.get(*letter) {
            Some(bound) if generic_consistent(bound, actual) => Ok(bindings),
            Some(bound) => Err(MatchError::GenericMismatch {
                letter: *letter,
                bound: bound.clone(),
                actual: actual.clone(),
            }),
            None => {
                bindings.bind(*letter, actual.clone());
                Ok(bindings)
            }
        };
    }

    if let Type::Single(inner) = actual {
        if !pattern.is_single() {
            return match_inner(pattern, inner, bindings);
        }
    }

    if let Type::Choice(options) = pattern {
        return options
            .iter()
            .find_map(|option| match_inner(option, actual, bindings.clone()).ok())
            .ok_or_else(|| incompatible(pattern, actual));
    }

    if let Type::Choice(options) = actual {
        return options
            .iter()
            .find_map(|option| match_inner(pattern, option, bindings.clone()).ok())
            .ok_or_else(|| incompatible(pattern, actual));
    }

    match (pattern, actual) {
        (Type::Single(p), Type::Single(a)) | (Type::TypeOf(p), Type::TypeOf(a)) => {
            match_inner(p, a, bindings)
        }
        (
            Type::Lambda {
                context: pattern_context,
                returns: pattern_returns,
            },
            Type::Lambda {
                context: actual_context,
                returns: actual_returns,
            },
        ) => {
            let bindings = match_inner(pattern_returns, actual_returns, bindings)?;
            match_inner(pattern_context, actual_context, bindings)
        }
        _ if actual.is_subtype_of(pattern) => Ok(bindings),
        _ => Err(incompatible(pattern, actual)),
    }
}

fn incompatible(pattern: &Type, actual: &Type) -> MatchError {
    MatchError::Incompatible {
        expected: pattern.clone(),
        actual: actual.clone(),
    }
}

/// Two occurrences of one generic letter agree when they are equivalent
/// once `Single` is stripped, allowing Integer/Decimal promotion
fn generic_consistent(bound: &Type, actual: &Type) -> bool {
    let (bound, actual) = (bound.unwrap_single(), actual.unwrap_single());
    if bound.equivalent(actual) {
        return true;
    }
    matches!(
        (bound.system(), actual.system()),
        (Type::Integer, Type::Decimal) | (Type::Decimal, Type::Integer)
    )
}

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

//! Program mutations
//!
//! A [`Program`] is an immutable value: every edit is a transition
//! `(Program, Mutation) -> Program`. [`try_apply`] reports why a mutation
//! was refused, while [`apply`] keeps the editor behaviour of ignoring a
//! refused mutation and returning the program unchanged.

pub mod bindings;
pub mod tokens;

pub use bindings::{
    DEFAULT_BINDING_NAME, add_binding, bindable_bindings, can_move, delete_binding, dependents,
    duplicate_binding, name_expression, next_binding_id, rename_binding, reorder_binding,
    unique_name,
};
pub use tokens::{add_token, delete_arg, delete_token, update_arg, update_token};

use crate::ast::{ExternalBinding, Program, Target, Token};
use crate::error::{EditorError, Result};
use serde::{Deserialize, Serialize};

/// A single edit of a program
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "op", rename_all = "camelCase", rename_all_fields = "camelCase")]
pub enum Mutation {
    AddToken {
        target: Target,
        token: Token,
    },
    UpdateToken {
        target: Target,
        index: usize,
        token: Token,
    },
    DeleteToken {
        target: Target,
        /// Last token when absent
        #[serde(default)]
        index: Option<usize>,
    },
    UpdateArg {
        target: Target,
        token_index: usize,
        arg_index: usize,
        arg: Program,
    },
    DeleteArg {
        target: Target,
        token_index: usize,
        arg_index: usize,
    },
    AddBinding {
        #[serde(default)]
        name: String,
        #[serde(default)]
        expression: Vec<Token>,
        /// Position of the binding to insert after; appends when absent
        #[serde(default)]
        after_index: Option<usize>,
    },
    RenameBinding {
        id: String,
        name: String,
    },
    DeleteBinding {
        id: String,
    },
    ReorderBinding {
        from: usize,
        to: usize,
    },
    DuplicateBinding {
        id: String,
    },
    NameExpression,
}

impl Mutation {
    /// Whether the mutation introduces a new local binding
    pub fn creates_binding(&self) -> bool {
        matches!(
            self,
            Mutation::AddBinding { .. }
                | Mutation::DuplicateBinding { .. }
                | Mutation::NameExpression
        )
    }
}

/// Environment a mutation is checked against
#[derive(Debug, Clone, Copy)]
pub struct MutationContext<'a> {
    /// Host-supplied bindings; local names may not collide with them
    pub externals: &'a [ExternalBinding],
    pub allow_bindings: bool,
}

impl<'a> MutationContext<'a> {
    pub fn new(externals: &'a [ExternalBinding]) -> Self {
        Self {
            externals,
            allow_bindings: true,
        }
    }

    pub fn with_allow_bindings(mut self, allow: bool) -> Self {
        self.allow_bindings = allow;
        self
    }
}

impl Default for MutationContext<'_> {
    fn default() -> Self {
        Self::new(&[])
    }
}

/// Apply a mutation, reporting why it was refused
pub fn try_apply(program: &Program, mutation: &Mutation, cx: MutationContext<'_>) -> Result<Program> {
    if mutation.creates_binding() && !cx.allow_bindings {
        return Err(EditorError::BindingsDisabled);
    }

    match mutation {
        Mutation::AddToken { target, token } => add_token(program, target, token.clone()),
        Mutation::UpdateToken {
            target,
            index,
            token,
        } => update_token(program, target, *index, token.clone()),
        Mutation::DeleteToken { target, index } => delete_token(program, target, *index),
        Mutation::UpdateArg {
            target,
            token_index,
            arg_index,
            arg,
        } => update_arg(program, target, *token_index, *arg_index, arg.clone()),
        Mutation::DeleteArg {
            target,
            token_index,
            arg_index,
        } => delete_arg(program, target, *token_index, *arg_index),
        Mutation::AddBinding {
            name,
            expression,
            after_index,
        } => add_binding(program, cx.externals, name, expression.clone(), *after_index),
        Mutation::RenameBinding { id, name } => rename_binding(program, cx.externals, id, name),
        Mutation::DeleteBinding { id } => delete_binding(program, id),
        Mutation::ReorderBinding { from, to } => reorder_binding(program, *from, *to),
        Mutation::DuplicateBinding { id } => duplicate_binding(program, cx.externals, id),
        Mutation::NameExpression => name_expression(program, cx.externals),
    }
}

/// Apply a mutation, leaving the program unchanged when it is refused
pub fn apply(program: &Program, mutation: &Mutation, cx: MutationContext<'_>) -> Program {
    match try_apply(program, mutation, cx) {
        Ok(next) => next,
        Err(err) => {
            log::debug!("ignoring mutation {mutation:?}: {err}");
            program.clone()
        }
    }
}

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

//! Error types for host-facing editor operations
//!
//! Type resolution never fails: problems inside an expression are reported
//! through [`Type::Invalid`](crate::model::Type::Invalid). The errors below are
//! only produced by operations that change a [`Program`](crate::ast::Program)
//! or load external data.

use thiserror::Error;

/// Result type for editor operations
pub type Result<T> = std::result::Result<T, EditorError>;

/// Errors raised by program mutations and schema loading
#[derive(Error, Debug)]
pub enum EditorError {
    /// A binding with the requested name already exists
    #[error("Binding name '{name}' is already taken")]
    DuplicateBindingName {
        /// The colliding name
        name: String,
    },

    /// Binding names must not be blank
    #[error("Binding name must not be empty")]
    EmptyBindingName,

    /// No local binding carries the given id
    #[error("Unknown binding '{id}'")]
    UnknownBinding {
        /// The id that was looked up
        id: String,
    },

    /// Moving the binding would create a forward reference
    #[error("Cannot move binding from position {from} to {to}")]
    IllegalReorder {
        /// Source position
        from: usize,
        /// Requested position
        to: usize,
    },

    /// A token or argument index does not exist
    #[error("Index {index} is out of range (length {len})")]
    IndexOutOfRange {
        /// Requested index
        index: usize,
        /// Length of the addressed sequence
        len: usize,
    },

    /// Argument mutations require a function token
    #[error("Token at index {index} is not a function")]
    NotAFunction {
        /// Index of the offending token
        index: usize,
    },

    /// The editor was configured without local bindings
    #[error("Local bindings are disabled for this editor")]
    BindingsDisabled,

    /// Schema or questionnaire JSON could not be decoded
    #[error("Failed to load schema: {0}")]
    Schema(#[from] serde_json::Error),
}

impl EditorError {
    /// Whether the error rejects a binding-graph change (as opposed to an
    /// addressing or loading problem)
    pub fn is_rejection(&self) -> bool {
        matches!(
            self,
            EditorError::DuplicateBindingName { .. }
                | EditorError::EmptyBindingName
                | EditorError::IllegalReorder { .. }
                | EditorError::BindingsDisabled
        )
    }
}

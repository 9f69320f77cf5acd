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

//! Static analysis of structured FHIRPath programs
//!
//! This module provides:
//! - Type resolution of token expressions and whole programs
//! - Next-token suggestions for the editor
//! - Lint diagnostics over bindings and the final expression

pub mod completion_provider;
pub mod diagnostics;
pub mod type_analyzer;

pub use completion_provider::{CompletionProvider, SuggestedToken};
pub use diagnostics::{Diagnostic, DiagnosticCode, DiagnosticSeverity, lint_program};
pub use type_analyzer::{
    DEFAULT_MAX_DEPTH, ExpressionAnalysis, ProgramTypes, TypeAnalyzer, TypeEnvironment,
    index_type,
};

use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};

/// Configuration options for the editor engine
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct EditorConfig {
    /// Allow creating local bindings
    pub allow_bindings: bool,
    /// Keep suggestions that do not type-check, flagged as incompatible
    pub include_incompatible: bool,
    /// Offer the context's fields when the expression is empty
    pub suggest_context_fields: bool,
    /// Attach rendered types to suggestions
    pub debug_types: bool,
    /// Nesting limit for function arguments
    pub max_depth: u32,
    /// Clock for date and time literal suggestions, local time when unset
    pub reference_time: Option<NaiveDateTime>,
}

impl Default for EditorConfig {
    fn default() -> Self {
        Self {
            allow_bindings: true,
            include_incompatible: false,
            suggest_context_fields: false,
            debug_types: true,
            max_depth: DEFAULT_MAX_DEPTH,
            reference_time: None,
        }
    }
}

impl EditorConfig {
    /// The configured reference time or the current local time
    pub fn now(&self) -> NaiveDateTime {
        self.reference_time
            .unwrap_or_else(|| chrono::Local::now().naive_local())
    }
}

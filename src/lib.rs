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

//! Structured FHIRPath editing in Rust
//!
//! Expressions are authored as token sequences with named local bindings.
//! The crate infers the static type of every prefix, suggests the tokens
//! that may come next, keeps the binding graph consistent under edits and
//! compiles the result to FHIRPath text.

#![recursion_limit = "256"]

pub mod analyzer;
pub mod ast;
pub mod compiler;
pub mod editor;
pub mod engine;
pub mod error;
pub mod model;
pub mod registry;

// Re-export main types
pub use analyzer::{Diagnostic, EditorConfig, ProgramTypes, SuggestedToken, TypeAnalyzer};
pub use ast::{Binding, Context, ExternalBinding, LocalBinding, Program, Target, Token};
pub use compiler::{stringify_expression, stringify_program};
pub use editor::{Mutation, MutationContext, can_move};
pub use engine::{EditorBuilder, EditorEngine};
pub use error::{EditorError, Result};
pub use model::{MockSchemaProvider, SchemaProvider, SchemaRegistry, Type};
pub use registry::{FunctionRegistry, OperatorRegistry};

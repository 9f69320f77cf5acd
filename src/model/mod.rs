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

//! Type model for structured FHIRPath expressions
//!
//! This module provides the type lattice, generic pattern matching and the
//! schema abstraction through which FHIR type structure is looked up.

pub mod mock_provider;
pub mod pattern;
pub mod provider;
pub mod questionnaire;
pub mod types;

pub use mock_provider::MockSchemaProvider;
pub use pattern::{GenericBindings, MatchError, compatible, match_type};
pub use provider::{FhirElement, FhirSchema, FieldType, SchemaProvider, SchemaRegistry};
pub use questionnaire::{QuestionnaireItem, QuestionnaireItems};
pub use types::{GenericLetter, PrimitiveKind, Type};

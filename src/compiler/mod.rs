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

//! Compilation of structured programs to FHIRPath text
//!
//! Compilation is a pure fold over the tokens with no knowledge of
//! validity: a program the analyzer marks invalid still renders.

pub mod stringify;

pub use stringify::{StringifyContext, stringify_expression, stringify_program, type_name};

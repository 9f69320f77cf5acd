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

//! Shared fixtures for the integration tests

#![allow(dead_code)]

use octofhir_fhirpath_editor::ast::OperatorName;
use octofhir_fhirpath_editor::{
    Context, EditorEngine, ExternalBinding, LocalBinding, MockSchemaProvider, Program, Token, Type,
};
use std::sync::Arc;

pub fn patient_type() -> Type {
    Type::single(Type::fhir(["Patient"]))
}

/// Engine rooted at a single Patient with a `patient` external binding
pub fn patient_engine() -> EditorEngine<MockSchemaProvider> {
    EditorEngine::builder(Arc::new(MockSchemaProvider::new()))
        .context(Context::new(patient_type()))
        .external(ExternalBinding::new("ext-patient", "patient", patient_type()))
        .build()
}

pub fn binding(id: &str, name: &str, expression: Vec<Token>) -> LocalBinding {
    LocalBinding::new(id, name, expression)
}

pub fn op(operator: OperatorName) -> Token {
    Token::operator(operator)
}

pub fn arg(tokens: Vec<Token>) -> Option<Program> {
    Some(Program::from_expression(tokens))
}

/// `given = patient.name.given`, `family = patient.name.family`,
/// `label = given & ' ' & family`, final expression `%label.upper()`
pub fn name_program() -> Program {
    Program::from_expression(vec![
        Token::variable("label"),
        Token::function("upper", vec![]),
    ])
    .with_binding(binding(
        "binding-1",
        "given",
        vec![
            Token::variable("patient"),
            Token::field("name"),
            Token::index("0"),
            Token::field("given"),
            Token::index("0"),
        ],
    ))
    .with_binding(binding(
        "binding-2",
        "family",
        vec![
            Token::variable("patient"),
            Token::field("name"),
            Token::index("0"),
            Token::field("family"),
        ],
    ))
    .with_binding(binding(
        "binding-3",
        "label",
        vec![
            Token::variable("given"),
            op(OperatorName::Concatenate),
            Token::string(" "),
            op(OperatorName::Concatenate),
            Token::variable("family"),
        ],
    ))
}

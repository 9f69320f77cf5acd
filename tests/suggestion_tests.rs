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

//! Next-token suggestions through the engine

mod utils;

use octofhir_fhirpath_editor::ast::{OperatorName, TokenKind};
use octofhir_fhirpath_editor::{
    Context, EditorEngine, ExternalBinding, MockSchemaProvider, Mutation, Program, SuggestedToken,
    Target, Token, Type,
};
use pretty_assertions::assert_eq;
use std::sync::Arc;
use utils::{binding, name_program, op, patient_engine};

fn labels(suggestions: &[SuggestedToken], kind: TokenKind) -> Vec<String> {
    suggestions
        .iter()
        .filter(|s| s.kind() == kind)
        .map(|s| s.token.label())
        .collect()
}

#[test]
fn empty_prefix_offers_literals_variables_and_functions() {
    let engine = patient_engine();
    let suggestions = engine.suggest(&Program::new(), &Target::Expression);

    for kind in TokenKind::LITERALS {
        assert_eq!(labels(&suggestions, kind).len(), 1, "{kind}");
    }
    assert_eq!(labels(&suggestions, TokenKind::Variable), vec!["patient"]);
    assert!(labels(&suggestions, TokenKind::Field).is_empty());
    assert!(labels(&suggestions, TokenKind::Operator).is_empty());
    assert!(labels(&suggestions, TokenKind::Index).is_empty());
    assert!(!labels(&suggestions, TokenKind::Function).is_empty());
}

#[test]
fn binding_suggestions_only_see_earlier_bindings() {
    let engine = patient_engine();
    let program = name_program();

    let mut editing = program.clone();
    editing.bindings[1].expression.clear();
    let in_family = engine.suggest(&editing, &Target::binding("binding-2"));
    assert_eq!(labels(&in_family, TokenKind::Variable), vec!["patient", "given"]);

    let in_expression = engine.suggest(&Program { expression: vec![], ..program }, &Target::Expression);
    assert_eq!(
        labels(&in_expression, TokenKind::Variable),
        vec!["patient", "given", "family", "label"]
    );
}

#[test]
fn string_operand_continuations() {
    let engine = patient_engine();
    let program = name_program();
    let suggestions = engine.suggest(&program, &Target::binding("binding-1"));

    assert!(labels(&suggestions, TokenKind::Field).is_empty());
    assert!(labels(&suggestions, TokenKind::Index).is_empty());
    let functions = labels(&suggestions, TokenKind::Function);
    assert!(functions.contains(&"upper".to_string()));
    assert!(functions.contains(&"startsWith".to_string()));
    let operators = labels(&suggestions, TokenKind::Operator);
    assert!(operators.contains(&"&".to_string()));
    assert!(!operators.contains(&"and".to_string()));
}

#[test]
fn right_operand_of_comparison() {
    let engine = patient_engine();
    let program = Program::from_expression(vec![
        Token::field("birthDate"),
        op(OperatorName::LessThan),
    ]);
    let suggestions = engine.suggest(&program, &Target::Expression);
    assert_eq!(labels(&suggestions, TokenKind::Date).len(), 1);
    assert!(labels(&suggestions, TokenKind::Number).is_empty());
    assert!(labels(&suggestions, TokenKind::Boolean).is_empty());
    assert!(labels(&suggestions, TokenKind::Operator).is_empty());
}

#[test]
fn typed_identifier_offers_a_new_binding() {
    let engine = patient_engine();
    let suggestions = engine.suggest_with_input(&Program::new(), &Target::Expression, "weight");
    let offer: Vec<_> = suggestions.iter().filter(|s| s.is_new_binding()).collect();
    assert_eq!(offer.len(), 1);
    assert_eq!(offer[0].token, Token::variable("weight"));
    assert!(offer[0].incompatible);

    let suggestions = engine.suggest_with_input(&Program::new(), &Target::Expression, "pat");
    assert_eq!(labels(&suggestions, TokenKind::Variable), vec!["patient", "pat"]);
}

#[test]
fn suggestions_stay_valid_after_edits() {
    let engine = patient_engine();
    let mut program = Program::from_expression(vec![Token::variable("patient")]);
    for token in [Token::field("name"), Token::index("0"), Token::field("family")] {
        let offered = engine.suggest(&program, &Target::Expression);
        assert!(
            offered.iter().any(|s| s.token == token && !s.incompatible),
            "{} not offered",
            token.label()
        );
        program = engine.apply(
            &program,
            &Mutation::AddToken {
                target: Target::Expression,
                token,
            },
        );
    }
    assert_eq!(engine.compile(&program), "%patient.name[0].family");
}

#[test]
fn answers_require_a_response_context() {
    let questionnaire = serde_json::json!({
        "resourceType": "Questionnaire",
        "item": [
            { "linkId": "weight", "type": "quantity" },
            { "linkId": "group", "type": "group", "item": [
                { "linkId": "smoker", "type": "boolean" }
            ]}
        ]
    });
    let external = ExternalBinding::new("q", "questionnaire", Type::fhir(["Questionnaire"]))
        .with_value(questionnaire);

    let response = EditorEngine::builder(Arc::new(MockSchemaProvider::new()))
        .context(Context::new(Type::single(Type::fhir(["QuestionnaireResponse"]))))
        .external(external.clone())
        .build();
    let suggestions = response.suggest(&Program::new(), &Target::Expression);
    assert_eq!(labels(&suggestions, TokenKind::Answer), vec!["weight", "smoker"]);

    let patient = EditorEngine::builder(Arc::new(MockSchemaProvider::new()))
        .context(Context::new(Type::single(Type::fhir(["Patient"]))))
        .external(external)
        .build();
    let suggestions = patient.suggest(&Program::new(), &Target::Expression);
    assert!(labels(&suggestions, TokenKind::Answer).is_empty());

    let program = Program::from_expression(vec![Token::answer("weight")])
        .with_binding(binding("binding-1", "unused", vec![]));
    assert_eq!(
        response.compile(&program),
        "defineVariable('unused').\nselect(repeat(item).where(linkId = 'weight').answer.value.value)"
    );
}

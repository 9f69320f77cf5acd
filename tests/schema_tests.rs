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

//! Engines backed by schemas loaded from JSON

mod utils;

use octofhir_fhirpath_editor::ast::{OperatorName, TokenKind};
use octofhir_fhirpath_editor::model::PrimitiveKind;
use octofhir_fhirpath_editor::{
    Context, EditorConfig, EditorEngine, EditorError, Program, SchemaRegistry, Target, Token, Type,
};
use pretty_assertions::assert_eq;
use std::sync::Arc;
use utils::{arg, op};

const SCHEMA: &str = r#"{
    "Element": { "elements": { "id": { "type": "string" } } },
    "Coding": {
        "base": "Element",
        "elements": {
            "system": { "type": "uri" },
            "code": { "type": "code" }
        }
    },
    "Encounter": {
        "elements": {
            "status": { "type": "code" },
            "class": { "type": "Coding" },
            "length": { "type": "Quantity" },
            "location": {
                "array": true,
                "elements": {
                    "status": { "type": "code" },
                    "partOf": { "array": true, "elementReference": ["Encounter", "location"] }
                }
            }
        }
    },
    "Quantity": {
        "base": "Element",
        "elements": {
            "value": { "type": "decimal" },
            "unit": { "type": "string" }
        }
    }
}"#;

fn engine() -> EditorEngine<SchemaRegistry> {
    let registry = SchemaRegistry::from_json(SCHEMA).unwrap();
    EditorEngine::builder(Arc::new(registry))
        .context(Context::new(Type::single(Type::fhir(["Encounter"]))))
        .build()
}

fn resolve(tokens: Vec<Token>) -> Type {
    engine().resolve_type(&Program::from_expression(tokens), &Target::Expression, None)
}

#[test]
fn fields_come_from_the_loaded_schema() {
    assert_eq!(
        resolve(vec![Token::field("class"), Token::field("code")]),
        Type::single(Type::Primitive(PrimitiveKind::Code))
    );
    assert_eq!(
        resolve(vec![Token::field("class"), Token::field("id")]),
        Type::single(Type::Primitive(PrimitiveKind::String))
    );
    assert_eq!(
        resolve(vec![
            Token::field("location"),
            Token::field("partOf"),
            Token::field("status"),
        ]),
        Type::Primitive(PrimitiveKind::Code)
    );
}

#[test]
fn quantity_fields_support_arithmetic() {
    let ty = resolve(vec![
        Token::field("length"),
        Token::field("value"),
        op(OperatorName::Multiply),
        Token::number("60"),
    ]);
    assert_eq!(ty, Type::single(Type::Decimal));

    let filtered = resolve(vec![
        Token::field("location"),
        Token::function(
            "where",
            vec![arg(vec![
                Token::field("status"),
                op(OperatorName::Equal),
                Token::string("active"),
            ])],
        ),
        Token::function("count", vec![]),
    ]);
    assert_eq!(filtered, Type::single(Type::Integer));
}

#[test]
fn field_suggestions_follow_schema_order() {
    let suggestions = engine().suggest(
        &Program::from_expression(vec![Token::field("class")]),
        &Target::Expression,
    );
    let fields: Vec<_> = suggestions
        .iter()
        .filter(|s| s.kind() == TokenKind::Field)
        .map(|s| s.token.label())
        .collect();
    assert_eq!(fields, vec!["system", "code", "id"]);
}

#[test]
fn malformed_schema_is_an_error() {
    let err = SchemaRegistry::from_json("{ \"Encounter\": 1 }").unwrap_err();
    assert!(matches!(err, EditorError::Schema(_)));
    assert!(err.to_string().starts_with("Failed to load schema"));
}

#[test]
fn config_loads_from_camel_case_json() {
    let config: EditorConfig = serde_json::from_value(serde_json::json!({
        "allowBindings": false,
        "maxDepth": 2
    }))
    .unwrap();
    assert!(!config.allow_bindings);
    assert!(config.debug_types);

    let registry = SchemaRegistry::from_json(SCHEMA).unwrap();
    let engine = EditorEngine::builder(Arc::new(registry))
        .config(config)
        .context(Context::new(Type::single(Type::fhir(["Encounter"]))))
        .build();
    let nested = |inner: Option<Program>| {
        Program::from_expression(vec![Token::field("location"), Token::function("select", vec![inner])])
    };
    let deep = nested(Some(nested(Some(nested(arg(vec![Token::field("status")]))))));
    assert_eq!(
        engine.resolve_type(&deep, &Target::Expression, None),
        Type::invalid("maximum nesting depth exceeded")
    );
}

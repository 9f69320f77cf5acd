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

//! Token-by-token rendering of programs

use crate::ast::{LocalBinding, Program, QuantityValue, Token};
use crate::model::{QuestionnaireItems, Type};
use std::fmt::Write;

/// Rendering options shared by every nested argument program
#[derive(Debug, Clone, Copy, Default)]
pub struct StringifyContext<'a> {
    questionnaire: Option<&'a QuestionnaireItems>,
}

impl<'a> StringifyContext<'a> {
    pub fn new() -> Self {
        Self::default()
    }

    /// Questionnaire items that decide how `answer` tokens are unwrapped
    pub fn with_questionnaire(mut self, items: &'a QuestionnaireItems) -> Self {
        self.questionnaire = Some(items);
        self
    }
}

/// Name a type literal compiles to
///
/// FHIR primitives use their FHIR name, complex FHIR types their schema path
/// joined by `.`, everything else the System type name.
pub fn type_name(ty: &Type) -> String {
    match ty {
        Type::Primitive(kind) => kind.fhir_name().to_string(),
        Type::Fhir(path) => path.join("."),
        Type::TypeOf(inner) | Type::Single(inner) => type_name(inner),
        other => other.to_string(),
    }
}

fn escape(value: &str) -> String {
    value.replace('\\', "\\\\").replace('\'', "\\'")
}

fn or_zero(value: &str) -> &str {
    if value.is_empty() { "0" } else { value }
}

fn write_quantity(out: &mut String, quantity: &QuantityValue) {
    let _ = write!(out, "{} '{}'", or_zero(&quantity.value), escape(&quantity.unit));
}

fn write_answer(out: &mut String, link_id: &str, cx: &StringifyContext<'_>) {
    let _ = write!(
        out,
        "repeat(item).where(linkId = '{}').answer.value",
        escape(link_id)
    );
    match cx.questionnaire.and_then(|items| items.get(link_id)) {
        Some(item) if item.is_choice() => out.push_str(".ordinal()"),
        Some(item) if item.is_quantity() => out.push_str(".value"),
        _ => {}
    }
}

fn write_token(out: &mut String, token: &Token, leading: bool, cx: &StringifyContext<'_>) {
    let dot = if leading { "" } else { "." };
    match token {
        Token::Number { value } => out.push_str(or_zero(value)),
        Token::String { value } => {
            let _ = write!(out, "'{}'", escape(value));
        }
        Token::Boolean { value } => {
            let _ = write!(out, "{value}");
        }
        Token::Date { value } | Token::DateTime { value } => {
            let _ = write!(out, "@{value}");
        }
        Token::Time { value } => {
            let _ = write!(out, "@T{value}");
        }
        Token::Quantity { value } => write_quantity(out, value),
        Token::Type { value } => out.push_str(&type_name(value)),
        Token::Variable { value } => {
            let _ = write!(out, "%{value}");
        }
        Token::Index { value } => {
            let _ = write!(out, "[{}]", or_zero(value));
        }
        Token::Operator { value } => {
            let _ = write!(out, " {value} ");
        }
        Token::Field { value } => {
            let _ = write!(out, "{dot}{value}");
        }
        Token::Function { value, args } => {
            let _ = write!(out, "{dot}{value}(");
            for (i, arg) in args.iter().enumerate() {
                if i > 0 {
                    out.push_str(", ");
                }
                match arg {
                    Some(program) => out.push_str(&stringify_program(program, cx)),
                    None => out.push_str("{}"),
                }
            }
            out.push(')');
        }
        Token::Answer { value } => {
            out.push_str(dot);
            write_answer(out, value, cx);
        }
    }
}

/// Render a token sequence
///
/// A token opens a new path segment (no leading `.`) when it starts the
/// expression or follows an operator.
pub fn stringify_expression(tokens: &[Token], cx: &StringifyContext<'_>) -> String {
    let mut out = String::new();
    for (i, token) in tokens.iter().enumerate() {
        let leading = i == 0 || tokens[i - 1].is_operator();
        write_token(&mut out, token, leading, cx);
    }
    out.trim().to_string()
}

fn stringify_binding(binding: &LocalBinding, cx: &StringifyContext<'_>) -> String {
    if binding.expression.is_empty() {
        format!("defineVariable('{}')", escape(&binding.name))
    } else {
        format!(
            "defineVariable('{}', {})",
            escape(&binding.name),
            stringify_expression(&binding.expression, cx)
        )
    }
}

/// Render a program: one `defineVariable` per local binding, then
/// `select(<expression>)`
///
/// A program without local bindings renders as its bare expression.
pub fn stringify_program(program: &Program, cx: &StringifyContext<'_>) -> String {
    let expression = stringify_expression(&program.expression, cx);
    if program.bindings.is_empty() {
        return expression;
    }

    let mut out = String::new();
    for binding in &program.bindings {
        out.push_str(&stringify_binding(binding, cx));
        out.push_str(".\n");
    }
    let _ = write!(out, "select({expression})");
    out
}

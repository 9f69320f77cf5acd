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

//! Lint diagnostics over a whole program
//!
//! Type resolution reports problems only through [`Type::Invalid`]. The lint
//! pass turns them into located diagnostics and adds checks that no single
//! expression can see, such as dangling references left behind by a deleted
//! binding and bindings nothing uses.

use super::type_analyzer::{EMPTY_EXPRESSION, TypeAnalyzer, UNKNOWN_BINDING};
use crate::ast::{ExternalBinding, Program, Target, Token, referenced_names};
use crate::model::{SchemaProvider, Type};
use rustc_hash::FxHashSet;
use serde::{Deserialize, Serialize};
use std::fmt;

/// A diagnostic message
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Diagnostic {
    pub code: DiagnosticCode,
    pub severity: DiagnosticSeverity,
    /// Human-readable message
    pub message: String,
    /// Expression the diagnostic applies to
    pub target: Target,
    /// Top-level token the diagnostic points at, if any
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub token_index: Option<usize>,
}

/// Severity levels for diagnostics
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DiagnosticSeverity {
    /// Error that prevents compilation for execution
    Error,
    /// Warning about potential issues
    Warning,
    Information,
    /// Hint for improvements
    Hint,
}

/// Diagnostic codes reported by [`lint_program`]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum DiagnosticCode {
    /// A variable names no binding in scope
    UnknownBinding,
    /// The expression resolves to an invalid type
    InvalidType,
    EmptyExpression,
    /// A local binding nothing refers to
    UnusedBinding,
}

impl DiagnosticCode {
    pub fn as_str(self) -> &'static str {
        match self {
            DiagnosticCode::UnknownBinding => "UNKNOWN_BINDING",
            DiagnosticCode::InvalidType => "INVALID_TYPE",
            DiagnosticCode::EmptyExpression => "EMPTY_EXPRESSION",
            DiagnosticCode::UnusedBinding => "UNUSED_BINDING",
        }
    }

    pub fn default_severity(self) -> DiagnosticSeverity {
        match self {
            DiagnosticCode::UnknownBinding | DiagnosticCode::InvalidType => {
                DiagnosticSeverity::Error
            }
            DiagnosticCode::EmptyExpression => DiagnosticSeverity::Warning,
            DiagnosticCode::UnusedBinding => DiagnosticSeverity::Hint,
        }
    }
}

impl fmt::Display for DiagnosticCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl Diagnostic {
    fn new(code: DiagnosticCode, message: impl Into<String>, target: Target) -> Self {
        Self {
            code,
            severity: code.default_severity(),
            message: message.into(),
            target,
            token_index: None,
        }
    }

    fn at(mut self, token_index: Option<usize>) -> Self {
        self.token_index = token_index;
        self
    }
}

impl fmt::Display for Diagnostic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.code, self.message)
    }
}

/// Lint every local binding and the final expression of `program`
pub fn lint_program<P: SchemaProvider + ?Sized>(
    analyzer: &TypeAnalyzer<'_, P>,
    program: &Program,
    externals: &[ExternalBinding],
    context: &Type,
) -> Vec<Diagnostic> {
    let types = analyzer.analyze_program(program, externals, context);
    let mut diagnostics = Vec::new();
    let mut in_scope: FxHashSet<&str> = externals.iter().map(|e| e.name.as_str()).collect();

    let expressions = program
        .bindings
        .iter()
        .map(|binding| (Target::binding(&binding.id), binding.expression.as_slice()))
        .chain(std::iter::once((Target::Expression, program.expression.as_slice())));

    for (position, (target, tokens)) in expressions.enumerate() {
        let ty = types.target(&target).cloned().unwrap_or(Type::Null);

        if tokens.is_empty() {
            diagnostics.push(Diagnostic::new(
                DiagnosticCode::EmptyExpression,
                EMPTY_EXPRESSION,
                target.clone(),
            ));
        }

        let mut dangling = false;
        for name in referenced_names(tokens) {
            if in_scope.contains(name.as_str()) {
                continue;
            }
            dangling = true;
            let declared_later = program.bindings[position.min(program.bindings.len())..]
                .iter()
                .any(|binding| binding.name == name);
            let message = if declared_later {
                format!("binding \"{name}\" is used before it is declared")
            } else {
                format!("{UNKNOWN_BINDING} \"{name}\"")
            };
            diagnostics.push(
                Diagnostic::new(DiagnosticCode::UnknownBinding, message, target.clone())
                    .at(variable_index(tokens, &name)),
            );
        }

        if let Some(message) = ty.invalid_message() {
            let reported = tokens.is_empty() || (dangling && message == UNKNOWN_BINDING);
            if !reported {
                diagnostics.push(Diagnostic::new(
                    DiagnosticCode::InvalidType,
                    message,
                    target.clone(),
                ));
            }
        }

        if let Some(binding) = program.bindings.get(position) {
            in_scope.insert(binding.name.as_str());
        }
    }

    for (position, binding) in program.bindings.iter().enumerate() {
        let used = program.bindings[position + 1..]
            .iter()
            .any(|later| referenced_names(&later.expression).contains(&binding.name))
            || referenced_names(&program.expression).contains(&binding.name);
        if !used {
            diagnostics.push(Diagnostic::new(
                DiagnosticCode::UnusedBinding,
                format!("binding \"{}\" is never used", binding.name),
                Target::binding(&binding.id),
            ));
        }
    }

    if !diagnostics.is_empty() {
        log::debug!("lint found {} diagnostics", diagnostics.len());
    }
    diagnostics
}

fn variable_index(tokens: &[Token], name: &str) -> Option<usize> {
    tokens
        .iter()
        .position(|token| matches!(token, Token::Variable { value } if value == name))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ast::{LocalBinding, OperatorName};
    use crate::model::MockSchemaProvider;
    use pretty_assertions::assert_eq;

    fn lint(program: &Program) -> Vec<(DiagnosticCode, Target)> {
        let provider = MockSchemaProvider::new();
        let analyzer = TypeAnalyzer::new(&provider);
        lint_program(&analyzer, program, &[], &Type::Null)
            .into_iter()
            .map(|diagnostic| (diagnostic.code, diagnostic.target))
            .collect()
    }

    #[test]
    fn clean_program_has_no_diagnostics() {
        let program = Program::from_expression(vec![Token::variable("age")])
            .with_binding(LocalBinding::new("b1", "age", vec![Token::number("42")]));
        assert_eq!(lint(&program), vec![]);
    }

    #[test]
    fn dangling_reference_after_delete() {
        let program = Program::from_expression(vec![
            Token::variable("gone"),
            Token::operator(OperatorName::Add),
            Token::number("1"),
        ]);
        let provider = MockSchemaProvider::new();
        let analyzer = TypeAnalyzer::new(&provider);
        let diagnostics = lint_program(&analyzer, &program, &[], &Type::Null);
        assert_eq!(diagnostics.len(), 1);
        assert_eq!(diagnostics[0].code, DiagnosticCode::UnknownBinding);
        assert_eq!(diagnostics[0].token_index, Some(0));
        assert_eq!(diagnostics[0].severity, DiagnosticSeverity::Error);
    }

    #[test]
    fn forward_reference_and_unused() {
        let program = Program::from_expression(vec![Token::variable("b")])
            .with_binding(LocalBinding::new("b1", "a", vec![Token::variable("b")]))
            .with_binding(LocalBinding::new("b2", "b", vec![Token::number("1")]));
        assert_eq!(
            lint(&program),
            vec![
                (DiagnosticCode::UnknownBinding, Target::binding("b1")),
                (DiagnosticCode::UnusedBinding, Target::binding("b1")),
            ]
        );
    }

    #[test]
    fn empty_and_invalid_expressions() {
        let program = Program::from_expression(vec![Token::number("1"), Token::field("x")])
            .with_binding(LocalBinding::new("b1", "blank", vec![]));
        assert_eq!(
            lint(&program),
            vec![
                (DiagnosticCode::EmptyExpression, Target::binding("b1")),
                (DiagnosticCode::InvalidType, Target::Expression),
                (DiagnosticCode::UnusedBinding, Target::binding("b1")),
            ]
        );
    }
}

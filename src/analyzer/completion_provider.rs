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

//! Next-token suggestions for the structured editor
//!
//! The provider looks at what precedes the cursor and offers the tokens that
//! may legally come next, each checked against the types in hand:
//! - nothing yet: literal starters, variables, functions and answers
//! - after an operator: right operands fitting one of its overloads
//! - after an operand: fields, functions, an index and operators

use super::EditorConfig;
use super::type_analyzer::{TypeAnalyzer, TypeEnvironment, index_type};
use crate::ast::{Binding, OperatorName, Token, TokenKind, left_operand_start};
use crate::model::{GenericBindings, SchemaProvider, Type, compatible, match_type};
use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};

static IDENTIFIER: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^[A-Za-z_][A-Za-z0-9_]*$").expect("identifier pattern is valid"));

const NEW_BINDING: &str = "new binding";

/// A token offered at the cursor
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SuggestedToken {
    #[serde(flatten)]
    pub token: Token,
    /// Offered although it does not type-check, or offered to create a binding
    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    pub incompatible: bool,
    /// Rendered type or short description
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub detail: Option<String>,
}

impl SuggestedToken {
    pub fn kind(&self) -> TokenKind {
        self.token.kind()
    }

    /// Whether this is the offer to create a binding with the typed name
    pub fn is_new_binding(&self) -> bool {
        self.incompatible
            && self.detail.as_deref() == Some(NEW_BINDING)
            && matches!(self.token, Token::Variable { .. })
    }
}

/// Where the cursor sits relative to the expression structure
enum Position<'t> {
    Start,
    AfterOperator {
        operator: OperatorName,
        left: &'t [Token],
    },
    /// Any value may be continued, including a scalar field or a complete
    /// `operand operator operand`. Functions, an index and operators are
    /// offered after every value; fields only after a composite type.
    AfterOperand {
        chain: &'t [Token],
    },
}

impl<'t> Position<'t> {
    fn of(prefix: &'t [Token]) -> Self {
        match prefix.last() {
            None => Position::Start,
            Some(Token::Operator { value }) => {
                let end = prefix.len() - 1;
                let start = left_operand_start(prefix, end, *value);
                Position::AfterOperator {
                    operator: *value,
                    left: &prefix[start..end],
                }
            }
            Some(_) => {
                let start = prefix
                    .iter()
                    .rposition(Token::is_operator)
                    .map_or(0, |position| position + 1);
                Position::AfterOperand {
                    chain: &prefix[start..],
                }
            }
        }
    }

    fn accepts_variables(&self) -> bool {
        match self {
            Position::Start => true,
            Position::AfterOperator { operator, .. } => !operator.takes_type_operand(),
            Position::AfterOperand { .. } => false,
        }
    }
}

/// Suggestion engine over a [`TypeAnalyzer`]
pub struct CompletionProvider<'a, P: SchemaProvider + ?Sized> {
    analyzer: &'a TypeAnalyzer<'a, P>,
    config: &'a EditorConfig,
}

impl<'a, P: SchemaProvider + ?Sized> CompletionProvider<'a, P> {
    pub fn new(analyzer: &'a TypeAnalyzer<'a, P>, config: &'a EditorConfig) -> Self {
        Self { analyzer, config }
    }

    /// Tokens that may follow `prefix`
    ///
    /// `bindings` are the bindings the expression may reference, in
    /// declaration order; `context` roots field access.
    pub fn suggest_next_token(
        &self,
        prefix: &[Token],
        bindings: &[Binding],
        context: &Type,
    ) -> Vec<SuggestedToken> {
        let env = self.analyzer.environment(bindings, context);
        let names: Vec<&str> = bindings.iter().map(Binding::name).collect();
        let mut out = Vec::new();

        match Position::of(prefix) {
            Position::Start => {
                self.literal_starters(&mut out, |_| true);
                self.variables(&mut out, &names, &env, |_| true);
                self.functions(&mut out, context);
                self.answers(&mut out, context);
                if self.config.suggest_context_fields {
                    self.fields(&mut out, context, |_| true);
                }
            }
            Position::AfterOperator { operator, left } => {
                self.right_operands(&mut out, operator, left, &names, &env, context);
            }
            Position::AfterOperand { chain } => {
                let chain_type = self.analyzer.chain_type(chain, &env, context, 0);
                if !matches!(chain.first(), Some(Token::Type { .. })) {
                    self.fields(&mut out, &chain_type, |_| true);
                    self.functions(&mut out, &chain_type);
                    let element = index_type(&chain_type);
                    self.push(
                        &mut out,
                        Token::index("0"),
                        !element.is_invalid(),
                        self.type_detail(&element),
                    );
                }
                self.operators(&mut out, prefix, &env, context);
            }
        }

        log::trace!("{} suggestions after {} tokens", out.len(), prefix.len());
        out
    }

    /// Suggestions narrowed by text the user is typing
    ///
    /// Literal suggestions take the typed value when it parses for their
    /// kind. A free identifier that names no binding is offered as a new
    /// binding where variables are legal.
    pub fn suggest_with_input(
        &self,
        prefix: &[Token],
        bindings: &[Binding],
        context: &Type,
        input: &str,
    ) -> Vec<SuggestedToken> {
        let needle = input.trim();
        let suggestions = self.suggest_next_token(prefix, bindings, context);
        if needle.is_empty() {
            return suggestions;
        }

        let mut out: Vec<SuggestedToken> = suggestions
            .into_iter()
            .filter_map(|suggestion| with_input(suggestion, needle))
            .collect();

        let unbound = !bindings.iter().any(|binding| binding.name() == needle);
        if self.config.allow_bindings
            && unbound
            && IDENTIFIER.is_match(needle)
            && Position::of(prefix).accepts_variables()
        {
            out.push(SuggestedToken {
                token: Token::variable(needle),
                incompatible: true,
                detail: Some(NEW_BINDING.to_string()),
            });
        }
        out
    }

    /// Replacements of the same kind for the token at `index`
    pub fn suggest_tokens_at(
        &self,
        index: usize,
        tokens: &[Token],
        bindings: &[Binding],
        context: &Type,
    ) -> Vec<SuggestedToken> {
        let Some(current) = tokens.get(index) else {
            return Vec::new();
        };
        let kind = current.kind();
        self.suggest_next_token(&tokens[..index], bindings, context)
            .into_iter()
            .filter(|suggestion| suggestion.kind() == kind)
            .collect()
    }

    fn push(&self, out: &mut Vec<SuggestedToken>, token: Token, ok: bool, detail: Option<String>) {
        if !ok && !self.config.include_incompatible {
            return;
        }
        out.push(SuggestedToken {
            token,
            incompatible: !ok,
            detail,
        });
    }

    fn type_detail(&self, ty: &Type) -> Option<String> {
        self.config.debug_types.then(|| ty.to_string())
    }

    fn literal_starters(&self, out: &mut Vec<SuggestedToken>, fits: impl Fn(&Type) -> bool) {
        for kind in TokenKind::LITERALS {
            let Some(token) = self.default_literal(kind) else {
                continue;
            };
            let ty = token.literal_type().unwrap_or(Type::Null);
            let detail = self.type_detail(&ty);
            self.push(out, token, fits(&ty), detail);
        }
    }

    fn default_literal(&self, kind: TokenKind) -> Option<Token> {
        let now = self.config.now();
        let token = match kind {
            TokenKind::Number => Token::number("0"),
            TokenKind::String => Token::string(""),
            TokenKind::Boolean => Token::boolean(true),
            TokenKind::Date => Token::date(now.format("%Y-%m-%d").to_string()),
            TokenKind::DateTime => Token::datetime(now.format("%Y-%m-%dT%H:%M").to_string()),
            TokenKind::Time => Token::time(now.format("%H:%M").to_string()),
            TokenKind::Quantity => Token::quantity("0", "seconds"),
            _ => return None,
        };
        Some(token)
    }

    fn variables(
        &self,
        out: &mut Vec<SuggestedToken>,
        names: &[&str],
        env: &TypeEnvironment,
        fits: impl Fn(&Type) -> bool,
    ) {
        for name in names {
            let ty = env.get(name).cloned().unwrap_or(Type::Null);
            let ok = !ty.is_invalid() && fits(&ty);
            let detail = self.type_detail(&ty);
            self.push(out, Token::variable(*name), ok, detail);
        }
    }

    fn fields(&self, out: &mut Vec<SuggestedToken>, ty: &Type, fits: impl Fn(&Type) -> bool) {
        for (name, field) in self.analyzer.fields(ty) {
            let ok = fits(&field);
            let detail = self.type_detail(&field);
            self.push(out, Token::field(name), ok, detail);
        }
    }

    fn functions(&self, out: &mut Vec<SuggestedToken>, input: &Type) {
        for signature in self.analyzer.functions().iter() {
            let ok = match_type(&signature.input, input, &GenericBindings::new()).is_ok();
            let detail = self.config.debug_types.then(|| signature.to_string());
            self.push(out, Token::function(&signature.name, Vec::new()), ok, detail);
        }
    }

    fn answers(&self, out: &mut Vec<SuggestedToken>, context: &Type) {
        if !compatible(&Type::fhir(["QuestionnaireResponse"]), context) || context.is_null() {
            return;
        }
        let Some(items) = self.analyzer.questionnaire() else {
            return;
        };
        for item in items.iter() {
            let detail = self.type_detail(&item.ty);
            self.push(out, Token::answer(&item.link_id), true, detail);
        }
    }

    fn right_operands(
        &self,
        out: &mut Vec<SuggestedToken>,
        operator: OperatorName,
        left: &[Token],
        names: &[&str],
        env: &TypeEnvironment,
        context: &Type,
    ) {
        if operator.takes_type_operand() {
            for ty in Type::SYSTEM_TYPES {
                self.push(out, Token::type_literal(ty), true, None);
            }
            return;
        }

        let left_type = self.analyzer.analyze_expression(left, env, context).ty;
        let registry = self.analyzer.operators();
        let fits = |ty: &Type| registry.accepts_right(operator, &left_type, ty);

        self.literal_starters(out, fits);
        self.variables(out, names, env, fits);
        self.fields(out, context, fits);
        self.functions(out, context);
        self.answers(out, context);
    }

    fn operators(
        &self,
        out: &mut Vec<SuggestedToken>,
        prefix: &[Token],
        env: &TypeEnvironment,
        context: &Type,
    ) {
        let registry = self.analyzer.operators();
        for operator in OperatorName::ALL {
            let start = left_operand_start(prefix, prefix.len(), operator);
            let left = self.analyzer.analyze_expression(&prefix[start..], env, context);
            let ok = !left.incomplete && registry.accepts_left(operator, &left.ty);
            let detail = Some(operator.human_friendly_name().to_string());
            self.push(out, Token::operator(operator), ok, detail);
        }
    }
}

/// Adapt a suggestion to typed text, `None` when the text rules it out
fn with_input(mut suggestion: SuggestedToken, needle: &str) -> Option<SuggestedToken> {
    let lower = needle.to_lowercase();
    match &mut suggestion.token {
        Token::Number { value } => {
            needle.parse::<f64>().ok().filter(|n| n.is_finite())?;
            *value = needle.to_string();
        }
        Token::String { value } => *value = needle.to_string(),
        Token::Boolean { value } => {
            *value = if "true".starts_with(&lower) {
                true
            } else if "false".starts_with(&lower) {
                false
            } else {
                return None;
            };
        }
        Token::Index { value } => {
            needle.parse::<usize>().ok()?;
            *value = needle.to_string();
        }
        Token::Quantity { value } => {
            let (amount, unit) = needle
                .split_once(char::is_whitespace)
                .unwrap_or((needle, ""));
            amount.parse::<f64>().ok().filter(|n| n.is_finite())?;
            value.value = amount.to_string();
            let unit = unit.trim().trim_matches('\'');
            if !unit.is_empty() {
                value.unit = unit.to_string();
            }
        }
        Token::Date { .. } | Token::DateTime { .. } | Token::Time { .. } => {
            let kind = suggestion.token.kind();
            if !kind.as_str().starts_with(&lower) {
                return None;
            }
        }
        other => {
            if !other.label().to_lowercase().starts_with(&lower) {
                return None;
            }
        }
    }
    Some(suggestion)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ast::{ExternalBinding, LocalBinding};
    use crate::model::{MockSchemaProvider, QuestionnaireItems};
    use pretty_assertions::assert_eq;
    use serde_json::json;

    fn patient() -> Type {
        Type::single(Type::fhir(["Patient"]))
    }

    fn bindings() -> Vec<Binding> {
        vec![
            ExternalBinding::new("ext-1", "patient", patient()).into(),
            LocalBinding::new("b1", "age", vec![Token::number("42")]).into(),
        ]
    }

    fn kinds(suggestions: &[SuggestedToken], kind: TokenKind) -> Vec<String> {
        suggestions
            .iter()
            .filter(|suggestion| suggestion.kind() == kind)
            .map(|suggestion| suggestion.token.label())
            .collect()
    }

    fn with_provider<R>(config: EditorConfig, f: impl FnOnce(&CompletionProvider<'_, MockSchemaProvider>) -> R) -> R {
        let provider = MockSchemaProvider::new();
        let analyzer = TypeAnalyzer::new(&provider);
        f(&CompletionProvider::new(&analyzer, &config))
    }

    #[test]
    fn empty_prefix_offers_starters_only() {
        let suggestions =
            with_provider(EditorConfig::default(), |p| p.suggest_next_token(&[], &bindings(), &patient()));

        for kind in TokenKind::LITERALS {
            assert_eq!(kinds(&suggestions, kind).len(), 1, "{kind}");
        }
        assert_eq!(kinds(&suggestions, TokenKind::Variable), vec!["patient", "age"]);
        assert!(kinds(&suggestions, TokenKind::Field).is_empty());
        assert!(kinds(&suggestions, TokenKind::Operator).is_empty());
        assert!(kinds(&suggestions, TokenKind::Function).contains(&"where".to_string()));
        assert!(suggestions.iter().all(|s| !s.incompatible));
    }

    #[test]
    fn context_fields_on_request() {
        let config = EditorConfig {
            suggest_context_fields: true,
            ..EditorConfig::default()
        };
        let suggestions = with_provider(config, |p| p.suggest_next_token(&[], &[], &patient()));
        assert!(kinds(&suggestions, TokenKind::Field).contains(&"birthDate".to_string()));
    }

    #[test]
    fn after_operand() {
        let prefix = vec![Token::variable("patient"), Token::field("name")];
        let suggestions =
            with_provider(EditorConfig::default(), |p| p.suggest_next_token(&prefix, &bindings(), &patient()));

        let fields = kinds(&suggestions, TokenKind::Field);
        assert!(fields.contains(&"given".to_string()));
        assert_eq!(kinds(&suggestions, TokenKind::Index), vec!["0"]);
        assert!(kinds(&suggestions, TokenKind::Function).contains(&"first".to_string()));
        assert!(!kinds(&suggestions, TokenKind::Function).contains(&"upper".to_string()));
        let operators = kinds(&suggestions, TokenKind::Operator);
        assert!(operators.contains(&"=".to_string()));
        assert!(operators.contains(&"|".to_string()));
        assert!(!operators.contains(&"and".to_string()));
        assert!(kinds(&suggestions, TokenKind::Variable).is_empty());
    }

    #[test]
    fn scalar_field_is_terminal_for_fields() {
        let prefix = vec![Token::field("birthDate")];
        let suggestions =
            with_provider(EditorConfig::default(), |p| p.suggest_next_token(&prefix, &[], &patient()));
        assert!(kinds(&suggestions, TokenKind::Field).is_empty());
        assert!(kinds(&suggestions, TokenKind::Index).is_empty());
    }

    #[test]
    fn complete_binary_expression_can_continue() {
        let prefix = vec![
            Token::number("1"),
            Token::operator(OperatorName::Add),
            Token::number("2"),
        ];
        let suggestions =
            with_provider(EditorConfig::default(), |p| p.suggest_next_token(&prefix, &[], &patient()));
        assert!(kinds(&suggestions, TokenKind::Field).is_empty());
        assert!(kinds(&suggestions, TokenKind::Function).contains(&"abs".to_string()));
        assert!(kinds(&suggestions, TokenKind::Operator).contains(&"*".to_string()));
    }

    #[test]
    fn after_operator_filters_by_right_operand() {
        let prefix = vec![Token::variable("age"), Token::operator(OperatorName::Add)];
        let suggestions =
            with_provider(EditorConfig::default(), |p| p.suggest_next_token(&prefix, &bindings(), &patient()));
        assert_eq!(kinds(&suggestions, TokenKind::Number), vec!["0"]);
        assert_eq!(kinds(&suggestions, TokenKind::Quantity).len(), 1);
        assert!(kinds(&suggestions, TokenKind::String).is_empty());
        assert!(kinds(&suggestions, TokenKind::Date).is_empty());
        assert_eq!(kinds(&suggestions, TokenKind::Variable), vec!["age"]);
        assert!(kinds(&suggestions, TokenKind::Operator).is_empty());
    }

    #[test]
    fn type_operand_after_is() {
        let prefix = vec![Token::field("deceased"), Token::operator(OperatorName::Is)];
        let suggestions =
            with_provider(EditorConfig::default(), |p| p.suggest_next_token(&prefix, &[], &patient()));
        assert_eq!(suggestions.len(), Type::SYSTEM_TYPES.len());
        assert!(suggestions.iter().all(|s| s.kind() == TokenKind::Type));
    }

    #[test]
    fn incompatible_entries_on_request() {
        let config = EditorConfig {
            include_incompatible: true,
            ..EditorConfig::default()
        };
        let prefix = vec![Token::number("1"), Token::operator(OperatorName::Add)];
        let suggestions = with_provider(config, |p| p.suggest_next_token(&prefix, &[], &Type::Null));
        let string = suggestions
            .iter()
            .find(|s| s.kind() == TokenKind::String)
            .map(|s| s.incompatible);
        assert_eq!(string, Some(true));
    }

    #[test]
    fn typed_input_fills_literals_and_offers_binding() {
        let suggestions = with_provider(EditorConfig::default(), |p| {
            p.suggest_with_input(&[], &bindings(), &patient(), "42")
        });
        assert_eq!(kinds(&suggestions, TokenKind::Number), vec!["42"]);
        assert_eq!(kinds(&suggestions, TokenKind::String), vec!["42"]);
        assert!(suggestions.iter().all(|s| !s.is_new_binding()));

        let suggestions = with_provider(EditorConfig::default(), |p| {
            p.suggest_with_input(&[], &bindings(), &patient(), "weight")
        });
        let offer = suggestions.iter().find(|s| s.is_new_binding());
        assert_eq!(offer.map(|s| s.token.clone()), Some(Token::variable("weight")));

        let existing = with_provider(EditorConfig::default(), |p| {
            p.suggest_with_input(&[], &bindings(), &patient(), "ag")
        });
        assert_eq!(kinds(&existing, TokenKind::Variable), vec!["age", "ag"]);

        let disabled = EditorConfig {
            allow_bindings: false,
            ..EditorConfig::default()
        };
        let suggestions = with_provider(disabled, |p| {
            p.suggest_with_input(&[], &bindings(), &patient(), "weight")
        });
        assert!(suggestions.iter().all(|s| !s.is_new_binding()));
    }

    #[test]
    fn replacements_keep_the_kind() {
        let tokens = vec![Token::field("name"), Token::field("given")];
        let suggestions = with_provider(EditorConfig::default(), |p| {
            p.suggest_tokens_at(1, &tokens, &[], &patient())
        });
        assert!(suggestions.iter().all(|s| s.kind() == TokenKind::Field));
        assert!(kinds(&suggestions, TokenKind::Field).contains(&"family".to_string()));
        assert!(with_provider(EditorConfig::default(), |p| p.suggest_tokens_at(5, &tokens, &[], &patient())).is_empty());
    }

    #[test]
    fn answers_for_questionnaire_responses() {
        let provider = MockSchemaProvider::new();
        let items = QuestionnaireItems::from_questionnaire(&json!({
            "item": [{"linkId": "age", "type": "integer"}]
        }));
        let analyzer = TypeAnalyzer::new(&provider).with_questionnaire(&items);
        let config = EditorConfig::default();
        let completion = CompletionProvider::new(&analyzer, &config);
        let response = Type::single(Type::fhir(["QuestionnaireResponse"]));
        let suggestions = completion.suggest_next_token(&[], &[], &response);
        assert_eq!(kinds(&suggestions, TokenKind::Answer), vec!["age"]);
        assert!(kinds(&completion.suggest_next_token(&[], &[], &patient()), TokenKind::Answer).is_empty());
    }

    #[test]
    fn suggestions_serialize_flat() {
        let suggestion = SuggestedToken {
            token: Token::field("name"),
            incompatible: false,
            detail: None,
        };
        assert_eq!(
            serde_json::to_value(&suggestion).unwrap(),
            json!({"kind": "field", "value": "name"})
        );
    }
}

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

//! Editor engine - the main entry point for hosts
//!
//! The engine bundles a schema provider, the editor configuration and the
//! host-supplied environment (context and external bindings). Programs are
//! passed in and returned by value; the engine keeps no program state.

use crate::analyzer::{
    CompletionProvider, Diagnostic, EditorConfig, ProgramTypes, SuggestedToken, TypeAnalyzer,
    lint_program, type_analyzer::UNKNOWN_BINDING,
};
use crate::ast::{Binding, Context, ExternalBinding, Program, Target};
use crate::compiler::{StringifyContext, stringify_expression, stringify_program};
use crate::editor::{self, Mutation, MutationContext, bindable_bindings};
use crate::error::Result;
use crate::model::{MockSchemaProvider, QuestionnaireItems, SchemaProvider, Type};
use std::sync::Arc;

/// Structured FHIRPath editor engine
pub struct EditorEngine<P: SchemaProvider + ?Sized> {
    provider: Arc<P>,
    config: EditorConfig,
    context: Context,
    externals: Vec<ExternalBinding>,
    questionnaire: QuestionnaireItems,
}

impl<P: SchemaProvider + ?Sized> Clone for EditorEngine<P> {
    fn clone(&self) -> Self {
        Self {
            provider: Arc::clone(&self.provider),
            config: self.config.clone(),
            context: self.context.clone(),
            externals: self.externals.clone(),
            questionnaire: self.questionnaire.clone(),
        }
    }
}

impl Default for EditorEngine<MockSchemaProvider> {
    fn default() -> Self {
        Self::new(Arc::new(MockSchemaProvider::new()))
    }
}

impl<P: SchemaProvider + ?Sized> EditorEngine<P> {
    /// Create an engine with the default configuration and a null context
    pub fn new(provider: Arc<P>) -> Self {
        EditorBuilder::new(provider).build()
    }

    pub fn builder(provider: Arc<P>) -> EditorBuilder<P> {
        EditorBuilder::new(provider)
    }

    pub fn provider(&self) -> &Arc<P> {
        &self.provider
    }

    pub fn config(&self) -> &EditorConfig {
        &self.config
    }

    pub fn context(&self) -> &Context {
        &self.context
    }

    pub fn externals(&self) -> &[ExternalBinding] {
        &self.externals
    }

    /// Items of the questionnaires among the external bindings
    pub fn questionnaire(&self) -> &QuestionnaireItems {
        &self.questionnaire
    }

    pub fn set_context(&mut self, context: Context) {
        self.context = context;
    }

    /// Replace the external bindings and re-index their questionnaires
    pub fn set_externals(&mut self, externals: Vec<ExternalBinding>) {
        self.questionnaire = QuestionnaireItems::from_externals(&externals);
        self.externals = externals;
    }

    /// A type analyzer configured for this engine
    pub fn analyzer(&self) -> TypeAnalyzer<'_, P> {
        TypeAnalyzer::new(self.provider.as_ref())
            .with_questionnaire(&self.questionnaire)
            .with_max_depth(self.config.max_depth)
    }

    /// Bindings visible from `target`, externals first
    pub fn bindings_in_scope(&self, program: &Program, target: &Target) -> Vec<Binding> {
        bindable_bindings(program, &self.externals, target)
    }

    /// Types of every local binding and of the final expression
    pub fn types(&self, program: &Program) -> ProgramTypes {
        self.analyzer()
            .analyze_program(program, &self.externals, &self.context.ty)
    }

    /// Type of the tokens of `target`, optionally only those before `up_to`
    pub fn resolve_type(&self, program: &Program, target: &Target, up_to: Option<usize>) -> Type {
        let Some(tokens) = program.tokens(target) else {
            return Type::invalid(UNKNOWN_BINDING);
        };
        let bindings = self.bindings_in_scope(program, target);
        self.analyzer()
            .resolve_expression_type(tokens, &bindings, &self.context.ty, up_to)
    }

    /// Tokens that may be appended to `target`
    pub fn suggest(&self, program: &Program, target: &Target) -> Vec<SuggestedToken> {
        self.suggest_with_input(program, target, "")
    }

    /// Suggestions for `target` narrowed by free-typed text
    pub fn suggest_with_input(
        &self,
        program: &Program,
        target: &Target,
        input: &str,
    ) -> Vec<SuggestedToken> {
        let Some(tokens) = program.tokens(target) else {
            return Vec::new();
        };
        let bindings = self.bindings_in_scope(program, target);
        let analyzer = self.analyzer();
        CompletionProvider::new(&analyzer, &self.config).suggest_with_input(
            tokens,
            &bindings,
            &self.context.ty,
            input,
        )
    }

    /// Replacements for the token at `index` of `target`
    pub fn suggest_at(&self, program: &Program, target: &Target, index: usize) -> Vec<SuggestedToken> {
        let Some(tokens) = program.tokens(target) else {
            return Vec::new();
        };
        let bindings = self.bindings_in_scope(program, target);
        let analyzer = self.analyzer();
        CompletionProvider::new(&analyzer, &self.config).suggest_tokens_at(
            index,
            tokens,
            &bindings,
            &self.context.ty,
        )
    }

    fn mutation_context(&self) -> MutationContext<'_> {
        MutationContext::new(&self.externals).with_allow_bindings(self.config.allow_bindings)
    }

    /// Apply a mutation, reporting why it was refused
    pub fn try_apply(&self, program: &Program, mutation: &Mutation) -> Result<Program> {
        editor::try_apply(program, mutation, self.mutation_context())
    }

    /// Apply a mutation; a refused mutation leaves the program unchanged
    pub fn apply(&self, program: &Program, mutation: &Mutation) -> Program {
        editor::apply(program, mutation, self.mutation_context())
    }

    /// Render the program as FHIRPath
    pub fn compile(&self, program: &Program) -> String {
        stringify_program(program, &self.stringify_context())
    }

    /// Render the tokens of `target` without the binding prelude
    pub fn compile_target(&self, program: &Program, target: &Target) -> Option<String> {
        program
            .tokens(target)
            .map(|tokens| stringify_expression(tokens, &self.stringify_context()))
    }

    fn stringify_context(&self) -> StringifyContext<'_> {
        StringifyContext::new().with_questionnaire(&self.questionnaire)
    }

    pub fn lint(&self, program: &Program) -> Vec<Diagnostic> {
        lint_program(&self.analyzer(), program, &self.externals, &self.context.ty)
    }
}

/// Builder for creating engines with custom configuration
pub struct EditorBuilder<P: SchemaProvider + ?Sized> {
    provider: Arc<P>,
    config: EditorConfig,
    context: Context,
    externals: Vec<ExternalBinding>,
}

impl<P: SchemaProvider + ?Sized> EditorBuilder<P> {
    pub fn new(provider: Arc<P>) -> Self {
        Self {
            provider,
            config: EditorConfig::default(),
            context: Context::default(),
            externals: Vec::new(),
        }
    }

    /// Replace the whole configuration
    pub fn config(mut self, config: EditorConfig) -> Self {
        self.config = config;
        self
    }

    pub fn context(mut self, context: Context) -> Self {
        self.context = context;
        self
    }

    pub fn externals(mut self, externals: Vec<ExternalBinding>) -> Self {
        self.externals = externals;
        self
    }

    /// Add one external binding
    pub fn external(mut self, binding: ExternalBinding) -> Self {
        self.externals.push(binding);
        self
    }

    /// Enable or disable local bindings
    pub fn allow_bindings(mut self, allow: bool) -> Self {
        self.config.allow_bindings = allow;
        self
    }

    /// Keep suggestions that do not type-check
    pub fn include_incompatible(mut self, include: bool) -> Self {
        self.config.include_incompatible = include;
        self
    }

    pub fn suggest_context_fields(mut self, enable: bool) -> Self {
        self.config.suggest_context_fields = enable;
        self
    }

    pub fn debug_types(mut self, enable: bool) -> Self {
        self.config.debug_types = enable;
        self
    }

    /// Set maximum argument nesting depth
    pub fn max_depth(mut self, depth: u32) -> Self {
        self.config.max_depth = depth;
        self
    }

    pub fn build(self) -> EditorEngine<P> {
        let questionnaire = QuestionnaireItems::from_externals(&self.externals);
        log::debug!(
            "editor engine with {} externals and {} questionnaire items",
            self.externals.len(),
            questionnaire.len()
        );
        EditorEngine {
            provider: self.provider,
            config: self.config,
            context: self.context,
            externals: self.externals,
            questionnaire,
        }
    }
}

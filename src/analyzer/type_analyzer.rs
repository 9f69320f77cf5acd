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

//! Type resolution for structured FHIRPath expressions
//!
//! Operand chains are folded left to right, starting from a literal, a
//! binding or the context. Operators are resolved over the precedence tree
//! built by [`ExpressionTree`]. Resolution is total: every failure becomes a
//! [`Type::Invalid`] carrying a diagnostic, and the first one encountered is
//! what the whole expression reports.

use crate::ast::{
    Binding, ExpressionTree, ExternalBinding, LocalBinding, Program, Target, Token,
};
use crate::model::{
    GenericBindings, MatchError, QuestionnaireItems, SchemaProvider, Type, compatible, match_type,
};
use crate::registry::{FunctionRegistry, FunctionSignature, OperatorRegistry, ReturnContext};
use indexmap::IndexMap;
use rustc_hash::FxHashMap;

/// Default nesting limit for function arguments
pub const DEFAULT_MAX_DEPTH: u32 = 32;

pub(crate) const EMPTY_EXPRESSION: &str = "empty expression";
pub(crate) const UNKNOWN_BINDING: &str = "unknown binding";
const NOT_COMPOSITE: &str = "not a composite type";
const INDEX_ON_SCALAR: &str = "index on scalar";
const MAX_DEPTH_EXCEEDED: &str = "maximum nesting depth exceeded";

/// Binding names visible to an expression and their types
#[derive(Debug, Clone, Default, PartialEq)]
pub struct TypeEnvironment {
    types: FxHashMap<String, Type>,
}

impl TypeEnvironment {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, name: &str) -> Option<&Type> {
        self.types.get(name)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.types.contains_key(name)
    }

    /// Declare `name`, shadowing an outer declaration
    pub fn insert(&mut self, name: impl Into<String>, ty: Type) {
        self.types.insert(name.into(), ty);
    }

    pub fn len(&self) -> usize {
        self.types.len()
    }

    pub fn is_empty(&self) -> bool {
        self.types.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &Type)> {
        self.types.iter().map(|(name, ty)| (name.as_str(), ty))
    }
}

/// Outcome of resolving one expression
#[derive(Debug, Clone, PartialEq)]
pub struct ExpressionAnalysis {
    pub ty: Type,
    /// The expression ends in an operator still waiting for its right operand;
    /// `ty` is then the type of everything before that operator
    pub incomplete: bool,
}

impl ExpressionAnalysis {
    fn complete(ty: Type) -> Self {
        Self {
            ty,
            incomplete: false,
        }
    }
}

/// Types of every part of a program
#[derive(Debug, Clone, PartialEq)]
pub struct ProgramTypes {
    /// Local binding types keyed by binding id, in program order
    pub bindings: IndexMap<String, Type>,
    pub expression: ExpressionAnalysis,
}

impl ProgramTypes {
    pub fn binding(&self, id: &str) -> Option<&Type> {
        self.bindings.get(id)
    }

    /// Type of the final expression or a local binding
    pub fn target(&self, target: &Target) -> Option<&Type> {
        match target {
            Target::Expression => Some(&self.expression.ty),
            Target::Binding(id) => self.binding(id),
        }
    }

    /// Whether any part resolved to [`Type::Invalid`]
    pub fn has_errors(&self) -> bool {
        self.expression.ty.is_invalid() || self.bindings.values().any(Type::is_invalid)
    }
}

/// Static type resolver over a schema provider and the signature catalogs
pub struct TypeAnalyzer<'a, P: SchemaProvider + ?Sized> {
    provider: &'a P,
    functions: &'a FunctionRegistry,
    operators: &'a OperatorRegistry,
    questionnaire: Option<&'a QuestionnaireItems>,
    max_depth: u32,
}

impl<'a, P: SchemaProvider + ?Sized> TypeAnalyzer<'a, P> {
    /// Create an analyzer using the built-in catalogs
    pub fn new(provider: &'a P) -> Self {
        Self::with_registries(provider, FunctionRegistry::standard(), OperatorRegistry::standard())
    }

    pub fn with_registries(
        provider: &'a P,
        functions: &'a FunctionRegistry,
        operators: &'a OperatorRegistry,
    ) -> Self {
        Self {
            provider,
            functions,
            operators,
            questionnaire: None,
            max_depth: DEFAULT_MAX_DEPTH,
        }
    }

    /// Questionnaire items `answer` tokens are typed from
    pub fn with_questionnaire(mut self, items: &'a QuestionnaireItems) -> Self {
        self.questionnaire = Some(items);
        self
    }

    pub fn with_max_depth(mut self, max_depth: u32) -> Self {
        self.max_depth = max_depth;
        self
    }

    pub fn provider(&self) -> &'a P {
        self.provider
    }

    pub fn functions(&self) -> &'a FunctionRegistry {
        self.functions
    }

    pub fn operators(&self) -> &'a OperatorRegistry {
        self.operators
    }

    pub fn questionnaire(&self) -> Option<&'a QuestionnaireItems> {
        self.questionnaire
    }

    /// Resolve the type of `tokens` given the bindings in scope
    ///
    /// `bindings` are visited in order: a local binding sees the externals
    /// and the locals listed before it. With `up_to` the fold stops before
    /// that index and an empty prefix yields `context` itself.
    pub fn resolve_expression_type(
        &self,
        tokens: &[Token],
        bindings: &[Binding],
        context: &Type,
        up_to: Option<usize>,
    ) -> Type {
        let env = self.environment(bindings, context);
        let tokens = match up_to {
            Some(end) => {
                let prefix = &tokens[..end.min(tokens.len())];
                if prefix.is_empty() {
                    return context.clone();
                }
                prefix
            }
            None => tokens,
        };
        self.analyze_expression(tokens, &env, context).ty
    }

    /// Types of the given bindings, each resolved against its predecessors
    pub fn environment(&self, bindings: &[Binding], context: &Type) -> TypeEnvironment {
        let mut env = TypeEnvironment::new();
        for binding in bindings {
            let ty = match binding {
                Binding::External(external) => external.ty.clone(),
                Binding::Local(local) => self.analyze_expression(&local.expression, &env, context).ty,
            };
            env.insert(binding.name(), ty);
        }
        env
    }

    /// Bindings visible from `target`: the externals plus the locals before it
    pub fn scope(
        &self,
        program: &Program,
        externals: &[ExternalBinding],
        target: &Target,
        context: &Type,
    ) -> TypeEnvironment {
        let mut env = externals_environment(externals);
        for binding in &program.bindings {
            if matches!(target, Target::Binding(id) if *id == binding.id) {
                break;
            }
            let ty = self.analyze_expression(&binding.expression, &env, context).ty;
            env.insert(&binding.name, ty);
        }
        env
    }

    /// Resolve every local binding and the final expression of `program`
    pub fn analyze_program(
        &self,
        program: &Program,
        externals: &[ExternalBinding],
        context: &Type,
    ) -> ProgramTypes {
        let mut env = externals_environment(externals);
        let mut bindings = IndexMap::with_capacity(program.bindings.len());
        for LocalBinding {
            id,
            name,
            expression,
        } in &program.bindings
        {
            let ty = self.analyze_expression(expression, &env, context).ty;
            env.insert(name, ty.clone());
            bindings.insert(id.clone(), ty);
        }
        let expression = self.analyze_expression(&program.expression, &env, context);
        ProgramTypes {
            bindings,
            expression,
        }
    }

    /// Resolve `tokens`, reporting a trailing operator as incomplete
    pub fn analyze_expression(
        &self,
        tokens: &[Token],
        env: &TypeEnvironment,
        context: &Type,
    ) -> ExpressionAnalysis {
        self.expression_analysis(tokens, env, context, 0)
    }

    fn expression_analysis(
        &self,
        tokens: &[Token],
        env: &TypeEnvironment,
        context: &Type,
        depth: u32,
    ) -> ExpressionAnalysis {
        match tokens.split_last() {
            None => ExpressionAnalysis::complete(Type::invalid(EMPTY_EXPRESSION)),
            Some((last, rest)) if last.is_operator() => {
                let ty = if rest.is_empty() {
                    Type::invalid(EMPTY_EXPRESSION)
                } else {
                    self.tree_type(&ExpressionTree::build(rest), env, context, depth)
                };
                ExpressionAnalysis {
                    ty,
                    incomplete: true,
                }
            }
            Some(_) => ExpressionAnalysis::complete(self.tree_type(
                &ExpressionTree::build(tokens),
                env,
                context,
                depth,
            )),
        }
    }

    fn tree_type(
        &self,
        tree: &ExpressionTree<'_>,
        env: &TypeEnvironment,
        context: &Type,
        depth: u32,
    ) -> Type {
        match tree {
            ExpressionTree::Chain(tokens) => self.chain_type(tokens, env, context, depth),
            ExpressionTree::Binary {
                operator,
                left,
                right,
            } => {
                let left = self.tree_type(left, env, context, depth);
                if left.is_invalid() {
                    return left;
                }
                let right = self.tree_type(right, env, context, depth);
                self.operators.resolve(*operator, &left, &right)
            }
        }
    }

    /// Type of an operand chain such as `%patient.name[0].given`
    pub fn chain_type(
        &self,
        tokens: &[Token],
        env: &TypeEnvironment,
        context: &Type,
        depth: u32,
    ) -> Type {
        let Some((first, rest)) = tokens.split_first() else {
            return Type::invalid(EMPTY_EXPRESSION);
        };

        let (mut current, rest) = match first {
            Token::Type { value } => {
                if !rest.is_empty() {
                    return Type::invalid("type literal cannot be chained");
                }
                return Type::type_of(value.clone());
            }
            Token::Variable { value } => (
                env.get(value)
                    .cloned()
                    .unwrap_or_else(|| Type::invalid(UNKNOWN_BINDING)),
                rest,
            ),
            token => match token.literal_type() {
                Some(ty) => (ty, rest),
                None => (context.clone(), tokens),
            },
        };

        for token in rest {
            if current.is_invalid() {
                break;
            }
            current = self.step_type(&current, token, env, context, depth);
        }
        current
    }

    fn step_type(
        &self,
        current: &Type,
        token: &Token,
        env: &TypeEnvironment,
        context: &Type,
        depth: u32,
    ) -> Type {
        match token {
            Token::Field { value } => self.field_type(current, value),
            Token::Index { .. } => index_type(current),
            Token::Function { value, args } => {
                self.function_type(current, value, args, env, context, depth)
            }
            Token::Answer { value } => self.answer_type(current, value),
            other => Type::invalid(format!("unexpected {} token", other.kind())),
        }
    }

    /// Type of field `name` on `ty`
    ///
    /// A scalar field of a single value stays single; array fields and fields
    /// reached through a collection are collections.
    pub fn field_type(&self, ty: &Type, name: &str) -> Type {
        let single = ty.is_single();
        match ty.unwrap_single() {
            Type::Invalid(_) => ty.clone(),
            Type::Choice(options) => {
                let found: Vec<Type> = options
                    .iter()
                    .map(|option| {
                        let option = if single {
                            Type::single(option.clone())
                        } else {
                            option.clone()
                        };
                        self.field_type(&option, name)
                    })
                    .filter(|ty| !ty.is_invalid())
                    .collect();
                if found.is_empty() {
                    Type::invalid(format!("unknown field \"{name}\""))
                } else {
                    Type::normalize_choice(found)
                }
            }
            inner => match self.schema_path(inner) {
                Some(path) => match self.provider.field(&path, name) {
                    Some(field) if single && !field.array => Type::single(field.ty),
                    Some(field) => field.ty,
                    None => {
                        log::trace!("no field {name} on {inner}");
                        Type::invalid(format!("unknown field \"{name}\""))
                    }
                },
                None => Type::invalid(NOT_COMPOSITE),
            },
        }
    }

    /// Every field reachable from `ty` with its type
    pub fn fields(&self, ty: &Type) -> IndexMap<String, Type> {
        let single = ty.is_single();
        match ty.unwrap_single() {
            Type::Choice(options) => {
                let mut merged: IndexMap<String, Type> = IndexMap::new();
                for option in options {
                    let option = if single {
                        Type::single(option.clone())
                    } else {
                        option.clone()
                    };
                    for (name, field) in self.fields(&option) {
                        match merged.get_mut(&name) {
                            Some(existing) => {
                                *existing = Type::normalize_choice(vec![existing.clone(), field]);
                            }
                            None => {
                                merged.insert(name, field);
                            }
                        }
                    }
                }
                merged
            }
            inner => match self.schema_path(inner) {
                Some(path) => self
                    .provider
                    .fields(&path)
                    .into_iter()
                    .map(|(name, field)| {
                        let ty = if single && !field.array {
                            Type::single(field.ty)
                        } else {
                            field.ty
                        };
                        (name, ty)
                    })
                    .collect(),
                None => IndexMap::new(),
            },
        }
    }

    /// Whether `ty` has fields to navigate into
    pub fn is_composite(&self, ty: &Type) -> bool {
        !self.fields(ty).is_empty()
    }

    fn schema_path(&self, ty: &Type) -> Option<Vec<String>> {
        match ty {
            Type::Fhir(path) => Some(path.clone()),
            Type::Quantity => Some(vec!["Quantity".to_string()]),
            Type::Primitive(kind) if self.provider.has_type(kind.fhir_name()) => {
                Some(vec![kind.fhir_name().to_string()])
            }
            _ => None,
        }
    }

    /// Type of `input.name(args)`
    pub fn function_type(
        &self,
        input: &Type,
        name: &str,
        args: &[Option<Program>],
        env: &TypeEnvironment,
        context: &Type,
        depth: u32,
    ) -> Type {
        if input.is_invalid() {
            return input.clone();
        }
        let Some(signature) = self.functions.get(name) else {
            return Type::invalid(format!("unknown function \"{name}\""));
        };
        if args.len() > signature.max_arity {
            return Type::invalid(format!(
                "unexpected argument at index {}",
                signature.max_arity
            ));
        }

        let call = self.resolve_call(
            signature,
            input,
            args,
            env,
            context,
            depth,
            signature.parameters.len(),
        );
        match call {
            Ok((generics, arg_types)) => signature.return_type.resolve(&ReturnContext {
                input,
                args: &arg_types,
                generics: &generics,
            }),
            Err(invalid) => invalid,
        }
    }

    /// Match the input and the first `stop_at` arguments of a call
    #[allow(clippy::too_many_arguments)]
    fn resolve_call(
        &self,
        signature: &FunctionSignature,
        input: &Type,
        args: &[Option<Program>],
        env: &TypeEnvironment,
        context: &Type,
        depth: u32,
        stop_at: usize,
    ) -> Result<(GenericBindings, Vec<Type>), Type> {
        let mut generics = match match_type(&signature.input, input, &GenericBindings::new()) {
            Ok(generics) => generics,
            Err(MatchError::Invalid(message)) => return Err(Type::Invalid(message)),
            Err(err) => {
                log::debug!("{} cannot take {input}: {err}", signature.name);
                return Err(Type::invalid(format!(
                    "function \"{}\" cannot be applied to {input}",
                    signature.name
                )));
            }
        };

        let mut arg_types = Vec::with_capacity(signature.parameters.len());
        for (index, param) in signature.parameters.iter().enumerate().take(stop_at) {
            let program = args
                .get(index)
                .and_then(Option::as_ref)
                .filter(|program| !program.is_empty());
            let Some(program) = program else {
                if param.optional {
                    arg_types.push(Type::Null);
                    continue;
                }
                return Err(Type::invalid(format!(
                    "missing required argument at index {index}"
                )));
            };

            if depth >= self.max_depth {
                return Err(Type::invalid(MAX_DEPTH_EXCEEDED));
            }

            let expected = generics.substitute(&param.param_type);
            let (lambda_context, arg_context) = match &expected {
                Type::Lambda { context, .. } => (true, context.as_ref().clone()),
                _ => (false, context.clone()),
            };
            let program_ty = self.program_type(program, env, &arg_context, depth + 1);
            if program_ty.is_invalid() {
                return Err(program_ty);
            }
            let actual = if lambda_context {
                Type::lambda(program_ty, arg_context)
            } else {
                program_ty
            };

            match match_type(&param.param_type, &actual, &generics) {
                Ok(extended) => generics = extended,
                Err(err @ MatchError::GenericMismatch { .. }) => {
                    log::debug!("{} argument {index}: {err:?}", signature.name);
                    return Err(Type::invalid(crate::registry::GENERIC_MISMATCH));
                }
                Err(err) => {
                    log::debug!("{} argument {index}: {err}", signature.name);
                    return Err(Type::invalid(format!(
                        "argument type mismatch at index {index}"
                    )));
                }
            }
            arg_types.push(actual);
        }
        Ok((generics, arg_types))
    }

    /// Context an argument of the function token at `token_index` resolves against
    ///
    /// Lambda parameters narrow the context to a single input item; other
    /// parameters see the root `context`.
    pub fn argument_context(
        &self,
        tokens: &[Token],
        token_index: usize,
        arg_index: usize,
        env: &TypeEnvironment,
        context: &Type,
    ) -> Type {
        let Some(Token::Function { value, args }) = tokens.get(token_index) else {
            return context.clone();
        };
        let Some(signature) = self.functions.get(value) else {
            return context.clone();
        };
        let Some(param) = signature.parameters.get(arg_index) else {
            return context.clone();
        };

        let chain_start = tokens[..token_index]
            .iter()
            .rposition(Token::is_operator)
            .map_or(0, |position| position + 1);
        let input = if chain_start == token_index {
            context.clone()
        } else {
            self.chain_type(&tokens[chain_start..token_index], env, context, 0)
        };

        match self.resolve_call(signature, &input, args, env, context, 0, arg_index) {
            Ok((generics, _)) => match generics.substitute(&param.param_type) {
                Type::Lambda { context, .. } => *context,
                _ => context.clone(),
            },
            Err(_) => match &param.param_type {
                Type::Lambda { .. } => Type::single(input.into_collection()),
                _ => context.clone(),
            },
        }
    }

    /// Type of an argument program, honouring its own local bindings
    pub fn program_type(
        &self,
        program: &Program,
        env: &TypeEnvironment,
        context: &Type,
        depth: u32,
    ) -> Type {
        if program.bindings.is_empty() {
            return self.expression_analysis(&program.expression, env, context, depth).ty;
        }
        let mut scoped = env.clone();
        for binding in &program.bindings {
            let ty = self
                .expression_analysis(&binding.expression, &scoped, context, depth)
                .ty;
            scoped.insert(&binding.name, ty);
        }
        self.expression_analysis(&program.expression, &scoped, context, depth)
            .ty
    }

    /// Type of the answer to questionnaire item `link_id`
    pub fn answer_type(&self, current: &Type, link_id: &str) -> Type {
        if current.is_invalid() {
            return current.clone();
        }
        if !compatible(&Type::fhir(["QuestionnaireResponse"]), current) {
            return Type::invalid("answer token cannot be used in this context");
        }

        let item = self
            .questionnaire
            .and_then(|items| items.get(link_id))
            .map(|item| item.ty.clone());
        let ty = match item {
            Some(ty) => ty,
            None => {
                let path = ["QuestionnaireResponse", "item", "answer"].map(String::from);
                match self.provider.field(&path, "value") {
                    Some(field) => field.ty,
                    None => return Type::invalid(format!("unknown questionnaire item \"{link_id}\"")),
                }
            }
        };

        if current.is_single() {
            ty
        } else {
            ty.into_collection()
        }
    }
}

/// Element type of an indexed collection
pub fn index_type(ty: &Type) -> Type {
    match ty {
        Type::Invalid(_) => ty.clone(),
        collection if collection.is_collection() => Type::single(collection.clone()),
        _ => Type::invalid(INDEX_ON_SCALAR),
    }
}

fn externals_environment(externals: &[ExternalBinding]) -> TypeEnvironment {
    let mut env = TypeEnvironment::new();
    for external in externals {
        env.insert(&external.name, external.ty.clone());
    }
    env
}

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

//! Programs, bindings and evaluation context

use super::token::Token;
use crate::model::Type;
use serde::{Deserialize, Serialize};

/// Named expression owned by the editor
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LocalBinding {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub expression: Vec<Token>,
}

impl LocalBinding {
    pub fn new(id: impl Into<String>, name: impl Into<String>, expression: Vec<Token>) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            expression,
        }
    }
}

/// Named, typed value supplied by the host
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExternalBinding {
    pub id: String,
    pub name: String,
    #[serde(rename = "type")]
    pub ty: Type,
    #[serde(default)]
    pub value: serde_json::Value,
}

impl ExternalBinding {
    pub fn new(id: impl Into<String>, name: impl Into<String>, ty: Type) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            ty,
            value: serde_json::Value::Null,
        }
    }

    pub fn with_value(mut self, value: serde_json::Value) -> Self {
        self.value = value;
        self
    }
}

/// Either kind of binding
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Binding {
    External(ExternalBinding),
    Local(LocalBinding),
}

impl Binding {
    pub fn id(&self) -> &str {
        match self {
            Binding::Local(binding) => &binding.id,
            Binding::External(binding) => &binding.id,
        }
    }

    pub fn name(&self) -> &str {
        match self {
            Binding::Local(binding) => &binding.name,
            Binding::External(binding) => &binding.name,
        }
    }

    pub fn is_external(&self) -> bool {
        matches!(self, Binding::External(_))
    }
}

impl From<LocalBinding> for Binding {
    fn from(value: LocalBinding) -> Self {
        Binding::Local(value)
    }
}

impl From<ExternalBinding> for Binding {
    fn from(value: ExternalBinding) -> Self {
        Binding::External(value)
    }
}

/// The authored artifact: ordered local bindings plus a final expression
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Program {
    #[serde(default)]
    pub bindings: Vec<LocalBinding>,
    #[serde(default)]
    pub expression: Vec<Token>,
}

impl Program {
    pub fn new() -> Self {
        Self::default()
    }

    /// Program consisting of a bare expression
    pub fn from_expression(expression: Vec<Token>) -> Self {
        Self {
            bindings: Vec::new(),
            expression,
        }
    }

    pub fn with_binding(mut self, binding: LocalBinding) -> Self {
        self.bindings.push(binding);
        self
    }

    /// No bindings and no expression tokens
    pub fn is_empty(&self) -> bool {
        self.bindings.is_empty() && self.expression.is_empty()
    }

    pub fn binding_index(&self, id: &str) -> Option<usize> {
        self.bindings.iter().position(|binding| binding.id == id)
    }

    pub fn binding(&self, id: &str) -> Option<&LocalBinding> {
        self.bindings.iter().find(|binding| binding.id == id)
    }

    pub fn binding_by_name(&self, name: &str) -> Option<&LocalBinding> {
        self.bindings.iter().find(|binding| binding.name == name)
    }

    /// Tokens addressed by `target`
    pub fn tokens(&self, target: &Target) -> Option<&[Token]> {
        match target {
            Target::Expression => Some(&self.expression),
            Target::Binding(id) => self.binding(id).map(|binding| binding.expression.as_slice()),
        }
    }

    pub fn tokens_mut(&mut self, target: &Target) -> Option<&mut Vec<Token>> {
        match target {
            Target::Expression => Some(&mut self.expression),
            Target::Binding(id) => self
                .bindings
                .iter_mut()
                .find(|binding| &binding.id == id)
                .map(|binding| &mut binding.expression),
        }
    }
}

/// Addresses the final expression or one local binding of a program
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum Target {
    Expression,
    Binding(String),
}

impl Target {
    pub fn binding(id: impl Into<String>) -> Self {
        Target::Binding(id.into())
    }
}

/// Implicit root value against which unqualified field access resolves
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Context {
    #[serde(rename = "type")]
    pub ty: Type,
    #[serde(default)]
    pub value: serde_json::Value,
}

impl Context {
    pub fn new(ty: Type) -> Self {
        Self {
            ty,
            value: serde_json::Value::Null,
        }
    }
}

impl Default for Context {
    fn default() -> Self {
        Self::new(Type::Null)
    }
}

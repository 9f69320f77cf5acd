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

//! Function and operator signatures for type checking

use crate::ast::OperatorName;
use crate::model::{GenericBindings, GenericLetter, Type};
use std::fmt;

/// Everything a return type computation may look at
#[derive(Debug)]
pub struct ReturnContext<'a> {
    /// Type the function was invoked on, or the left operand
    pub input: &'a Type,
    /// Resolved argument types; operators carry the right operand here
    pub args: &'a [Type],
    pub generics: &'a GenericBindings,
}

impl ReturnContext<'_> {
    /// Bound type of a generic letter
    pub fn generic(&self, letter: GenericLetter) -> Type {
        self.generics
            .get(letter)
            .cloned()
            .unwrap_or_else(|| Type::invalid(format!("generic {letter} is not bound")))
    }

    /// Argument type at `index`, `Null` when absent
    pub fn arg(&self, index: usize) -> &Type {
        self.args.get(index).unwrap_or(&NULL)
    }
}

static NULL: Type = Type::Null;

/// Return type of a catalog entry
#[derive(Clone)]
pub enum ReturnType {
    Fixed(Type),
    /// One result per input item: single when the input is single
    Elementwise(Type),
    Computed(fn(&ReturnContext<'_>) -> Type),
}

impl ReturnType {
    pub fn resolve(&self, context: &ReturnContext<'_>) -> Type {
        match self {
            ReturnType::Fixed(ty) => context.generics.substitute(ty),
            ReturnType::Elementwise(ty) if context.input.is_single() => {
                Type::single(context.generics.substitute(ty))
            }
            ReturnType::Elementwise(ty) => context.generics.substitute(ty),
            ReturnType::Computed(compute) => compute(context),
        }
    }
}

impl fmt::Debug for ReturnType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ReturnType::Fixed(ty) => f.debug_tuple("Fixed").field(ty).finish(),
            ReturnType::Elementwise(ty) => f.debug_tuple("Elementwise").field(ty).finish(),
            ReturnType::Computed(_) => f.write_str("Computed"),
        }
    }
}

impl fmt::Display for ReturnType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ReturnType::Fixed(ty) => write!(f, "{ty}"),
            ReturnType::Elementwise(ty) => write!(f, "{ty}"),
            ReturnType::Computed(_) => write!(f, "computed"),
        }
    }
}

impl From<Type> for ReturnType {
    fn from(value: Type) -> Self {
        ReturnType::Fixed(value)
    }
}

/// Grouping of functions for presentation
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FunctionCategory {
    Existence,
    FilteringAndProjection,
    Subsetting,
    Combining,
    Conversion,
    StringManipulation,
    AdditionalString,
    Math,
    Utility,
    Aggregate,
    FhirExtension,
    SdcExtension,
}

impl FunctionCategory {
    pub fn label(self) -> &'static str {
        match self {
            FunctionCategory::Existence => "Existence",
            FunctionCategory::FilteringAndProjection => "Filtering and projection",
            FunctionCategory::Subsetting => "Subsetting",
            FunctionCategory::Combining => "Combining",
            FunctionCategory::Conversion => "Conversion",
            FunctionCategory::StringManipulation => "String Manipulation",
            FunctionCategory::AdditionalString => "Additional String Functions",
            FunctionCategory::Math => "Math",
            FunctionCategory::Utility => "Utility Functions",
            FunctionCategory::Aggregate => "Aggregates",
            FunctionCategory::FhirExtension => "FHIR Extensions",
            FunctionCategory::SdcExtension => "SDC Extensions",
        }
    }
}

/// Function signature for overload resolution and type checking
#[derive(Debug, Clone)]
pub struct FunctionSignature {
    /// Function name
    pub name: String,
    pub category: FunctionCategory,
    /// Pattern the input collection must match
    pub input: Type,
    /// Parameter types
    pub parameters: Vec<ParameterInfo>,
    /// Return type
    pub return_type: ReturnType,
    /// Minimum number of arguments
    pub min_arity: usize,
    /// Maximum number of arguments
    pub max_arity: usize,
}

/// Parameter information for functions
#[derive(Debug, Clone, PartialEq)]
pub struct ParameterInfo {
    /// Parameter name
    pub name: String,
    /// Parameter type
    pub param_type: Type,
    /// Whether this parameter is optional
    pub optional: bool,
}

/// Operator overload for type checking
#[derive(Debug, Clone)]
pub struct OperatorSignature {
    pub operator: OperatorName,
    /// Left operand pattern
    pub left_type: Type,
    /// Right operand pattern
    pub right_type: Type,
    pub return_type: ReturnType,
}

impl FunctionSignature {
    /// Create a new function signature
    pub fn new(
        name: impl Into<String>,
        category: FunctionCategory,
        input: Type,
        parameters: Vec<ParameterInfo>,
        return_type: impl Into<ReturnType>,
    ) -> Self {
        let min_arity = parameters.iter().filter(|p| !p.optional).count();
        let max_arity = parameters.len();
        Self {
            name: name.into(),
            category,
            input,
            parameters,
            return_type: return_type.into(),
            min_arity,
            max_arity,
        }
    }

    /// Whether `count` arguments are acceptable
    pub fn accepts_arity(&self, count: usize) -> bool {
        (self.min_arity..=self.max_arity).contains(&count)
    }
}

impl ParameterInfo {
    /// Create a required parameter
    pub fn required(name: impl Into<String>, param_type: Type) -> Self {
        Self {
            name: name.into(),
            param_type,
            optional: false,
        }
    }

    /// Create an optional parameter
    pub fn optional(name: impl Into<String>, param_type: Type) -> Self {
        Self {
            name: name.into(),
            param_type,
            optional: true,
        }
    }
}

impl OperatorSignature {
    /// Create a binary operator signature
    pub fn binary(
        operator: OperatorName,
        left_type: Type,
        right_type: Type,
        return_type: impl Into<ReturnType>,
    ) -> Self {
        Self {
            operator,
            left_type,
            right_type,
            return_type: return_type.into(),
        }
    }
}

impl fmt::Display for FunctionSignature {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}(", self.input, self.name)?;
        for (i, param) in self.parameters.iter().enumerate() {
            if i > 0 {
                write!(f, ", ")?;
            }
            write!(f, "{}: {}", param.name, param.param_type)?;
            if param.optional {
                write!(f, "?")?;
            }
        }
        write!(f, ") -> {}", self.return_type)
    }
}

impl fmt::Display for OperatorSignature {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} {} {} -> {}",
            self.left_type, self.operator, self.right_type, self.return_type
        )
    }
}

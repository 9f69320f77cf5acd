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

//! FHIRPath infix operators

use serde::{Deserialize, Serialize};
use std::fmt;

/// Operator associativity
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Associativity {
    Left,
    Right,
}

/// Grouping of operators for presentation
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum OperatorGroup {
    Math,
    Comparison,
    Logical,
    Collection,
    Type,
}

impl OperatorGroup {
    pub fn label(self) -> &'static str {
        match self {
            OperatorGroup::Math => "Math Operators",
            OperatorGroup::Comparison => "Comparison Operators",
            OperatorGroup::Logical => "Logical Operators",
            OperatorGroup::Collection => "Collection Operators",
            OperatorGroup::Type => "Type Operators",
        }
    }
}

/// Binary operators available to an expression
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum OperatorName {
    #[serde(rename = "+")]
    Add,
    #[serde(rename = "-")]
    Subtract,
    #[serde(rename = "*")]
    Multiply,
    #[serde(rename = "/")]
    Divide,
    #[serde(rename = "mod")]
    Modulo,
    #[serde(rename = "div")]
    IntegerDivide,
    #[serde(rename = "=")]
    Equal,
    #[serde(rename = "!=")]
    NotEqual,
    #[serde(rename = "<")]
    LessThan,
    #[serde(rename = ">")]
    GreaterThan,
    #[serde(rename = "<=")]
    LessThanOrEqual,
    #[serde(rename = ">=")]
    GreaterThanOrEqual,
    #[serde(rename = "~")]
    Equivalent,
    #[serde(rename = "!~")]
    NotEquivalent,
    #[serde(rename = "and")]
    And,
    #[serde(rename = "or")]
    Or,
    #[serde(rename = "xor")]
    Xor,
    #[serde(rename = "implies")]
    Implies,
    #[serde(rename = "in")]
    In,
    #[serde(rename = "contains")]
    Contains,
    #[serde(rename = "&")]
    Concatenate,
    #[serde(rename = "|")]
    Union,
    #[serde(rename = "is")]
    Is,
    #[serde(rename = "as")]
    As,
}

impl OperatorName {
    /// All operators in presentation order
    pub const ALL: [OperatorName; 24] = [
        OperatorName::Add,
        OperatorName::Subtract,
        OperatorName::Multiply,
        OperatorName::Divide,
        OperatorName::Modulo,
        OperatorName::IntegerDivide,
        OperatorName::Equal,
        OperatorName::NotEqual,
        OperatorName::LessThan,
        OperatorName::GreaterThan,
        OperatorName::LessThanOrEqual,
        OperatorName::GreaterThanOrEqual,
        OperatorName::Equivalent,
        OperatorName::NotEquivalent,
        OperatorName::And,
        OperatorName::Or,
        OperatorName::Xor,
        OperatorName::Implies,
        OperatorName::In,
        OperatorName::Contains,
        OperatorName::Concatenate,
        OperatorName::Union,
        OperatorName::Is,
        OperatorName::As,
    ];

    /// Source text of the operator
    pub fn symbol(self) -> &'static str {
        match self {
            OperatorName::Add => "+",
            OperatorName::Subtract => "-",
            OperatorName::Multiply => "*",
            OperatorName::Divide => "/",
            OperatorName::Modulo => "mod",
            OperatorName::IntegerDivide => "div",
            OperatorName::Equal => "=",
            OperatorName::NotEqual => "!=",
            OperatorName::LessThan => "<",
            OperatorName::GreaterThan => ">",
            OperatorName::LessThanOrEqual => "<=",
            OperatorName::GreaterThanOrEqual => ">=",
            OperatorName::Equivalent => "~",
            OperatorName::NotEquivalent => "!~",
            OperatorName::And => "and",
            OperatorName::Or => "or",
            OperatorName::Xor => "xor",
            OperatorName::Implies => "implies",
            OperatorName::In => "in",
            OperatorName::Contains => "contains",
            OperatorName::Concatenate => "&",
            OperatorName::Union => "|",
            OperatorName::Is => "is",
            OperatorName::As => "as",
        }
    }

    /// Parse an operator from its source text
    pub fn from_symbol(symbol: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|op| op.symbol() == symbol)
    }

    /// Binding strength, higher binds tighter
    pub fn precedence(self) -> u8 {
        match self {
            OperatorName::Multiply
            | OperatorName::Divide
            | OperatorName::IntegerDivide
            | OperatorName::Modulo => 10,
            OperatorName::Add | OperatorName::Subtract | OperatorName::Concatenate => 9,
            OperatorName::Is | OperatorName::As => 8,
            OperatorName::Union => 7,
            OperatorName::GreaterThan
            | OperatorName::LessThan
            | OperatorName::GreaterThanOrEqual
            | OperatorName::LessThanOrEqual => 6,
            OperatorName::Equal
            | OperatorName::NotEqual
            | OperatorName::Equivalent
            | OperatorName::NotEquivalent => 5,
            OperatorName::In | OperatorName::Contains => 4,
            OperatorName::And => 3,
            OperatorName::Xor | OperatorName::Or => 2,
            OperatorName::Implies => 1,
        }
    }

    pub fn associativity(self) -> Associativity {
        match self {
            OperatorName::Implies => Associativity::Right,
            _ => Associativity::Left,
        }
    }

    /// Whether the right operand is a type literal
    pub fn takes_type_operand(self) -> bool {
        matches!(self, OperatorName::Is | OperatorName::As)
    }

    pub fn group(self) -> OperatorGroup {
        match self {
            OperatorName::Add
            | OperatorName::Subtract
            | OperatorName::Multiply
            | OperatorName::Divide
            | OperatorName::Modulo
            | OperatorName::IntegerDivide => OperatorGroup::Math,
            OperatorName::Equal
            | OperatorName::NotEqual
            | OperatorName::LessThan
            | OperatorName::GreaterThan
            | OperatorName::LessThanOrEqual
            | OperatorName::GreaterThanOrEqual
            | OperatorName::Equivalent
            | OperatorName::NotEquivalent => OperatorGroup::Comparison,
            OperatorName::And | OperatorName::Or | OperatorName::Xor | OperatorName::Implies => {
                OperatorGroup::Logical
            }
            OperatorName::In
            | OperatorName::Contains
            | OperatorName::Concatenate
            | OperatorName::Union => OperatorGroup::Collection,
            OperatorName::Is | OperatorName::As => OperatorGroup::Type,
        }
    }

    /// Human friendly name for display
    pub fn human_friendly_name(self) -> &'static str {
        match self {
            OperatorName::Add => "Plus",
            OperatorName::Subtract => "Minus",
            OperatorName::Multiply => "Multiply",
            OperatorName::Divide => "Divide",
            OperatorName::Modulo => "Modulo",
            OperatorName::IntegerDivide => "Integer divide",
            OperatorName::Equal => "Equals",
            OperatorName::NotEqual => "Not equals",
            OperatorName::LessThan => "Less than",
            OperatorName::GreaterThan => "Greater than",
            OperatorName::LessThanOrEqual => "Less than or equal to",
            OperatorName::GreaterThanOrEqual => "Greater than or equal to",
            OperatorName::Equivalent => "Equivalent",
            OperatorName::NotEquivalent => "Not equivalent",
            OperatorName::And => "And",
            OperatorName::Or => "Or",
            OperatorName::Xor => "Xor",
            OperatorName::Implies => "Implies",
            OperatorName::In => "In",
            OperatorName::Contains => "Contains",
            OperatorName::Concatenate => "Concatenate",
            OperatorName::Union => "Union",
            OperatorName::Is => "Is type",
            OperatorName::As => "As type",
        }
    }
}

impl fmt::Display for OperatorName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.symbol())
    }
}

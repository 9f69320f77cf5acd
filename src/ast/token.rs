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

//! Editable tokens of a structured expression

use super::operator::OperatorName;
use super::program::Program;
use crate::model::Type;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Value and unit of a quantity literal
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct QuantityValue {
    #[serde(default)]
    pub value: String,
    #[serde(default)]
    pub unit: String,
}

/// One atomic unit of an expression
///
/// Literal payloads are kept as the text the user typed so that partially
/// entered values survive a round trip through the editor.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "lowercase")]
pub enum Token {
    Number {
        value: String,
    },
    String {
        value: String,
    },
    Boolean {
        value: bool,
    },
    Date {
        value: String,
    },
    DateTime {
        value: String,
    },
    Time {
        value: String,
    },
    Quantity {
        value: QuantityValue,
    },
    /// Type literal, the right operand of `is`/`as` or argument of `ofType`
    Type {
        value: Type,
    },
    Variable {
        value: String,
    },
    Index {
        value: String,
    },
    Function {
        value: String,
        /// Argument programs; `None` marks an argument left blank
        #[serde(default)]
        args: Vec<Option<Program>>,
    },
    Operator {
        value: OperatorName,
    },
    Field {
        value: String,
    },
    /// Answer to the questionnaire item with this link id
    Answer {
        value: String,
    },
}

/// Token discriminant without payload
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TokenKind {
    Number,
    String,
    Boolean,
    Date,
    DateTime,
    Time,
    Quantity,
    Type,
    Variable,
    Index,
    Function,
    Operator,
    Field,
    Answer,
}

impl TokenKind {
    /// Literal kinds in the order they are offered
    pub const LITERALS: [TokenKind; 7] = [
        TokenKind::Number,
        TokenKind::String,
        TokenKind::Boolean,
        TokenKind::Date,
        TokenKind::DateTime,
        TokenKind::Time,
        TokenKind::Quantity,
    ];

    pub fn is_literal(self) -> bool {
        Self::LITERALS.contains(&self)
    }

    pub fn as_str(self) -> &'static str {
        match self {
            TokenKind::Number => "number",
            TokenKind::String => "string",
            TokenKind::Boolean => "boolean",
            TokenKind::Date => "date",
            TokenKind::DateTime => "datetime",
            TokenKind::Time => "time",
            TokenKind::Quantity => "quantity",
            TokenKind::Type => "type",
            TokenKind::Variable => "variable",
            TokenKind::Index => "index",
            TokenKind::Function => "function",
            TokenKind::Operator => "operator",
            TokenKind::Field => "field",
            TokenKind::Answer => "answer",
        }
    }
}

impl fmt::Display for TokenKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl Token {
    pub fn number(value: impl Into<String>) -> Self {
        Token::Number {
            value: value.into(),
        }
    }

    pub fn string(value: impl Into<String>) -> Self {
        Token::String {
            value: value.into(),
        }
    }

    pub fn boolean(value: bool) -> Self {
        Token::Boolean { value }
    }

    pub fn date(value: impl Into<String>) -> Self {
        Token::Date {
            value: value.into(),
        }
    }

    pub fn datetime(value: impl Into<String>) -> Self {
        Token::DateTime {
            value: value.into(),
        }
    }

    pub fn time(value: impl Into<String>) -> Self {
        Token::Time {
            value: value.into(),
        }
    }

    pub fn quantity(value: impl Into<String>, unit: impl Into<String>) -> Self {
        Token::Quantity {
            value: QuantityValue {
                value: value.into(),
                unit: unit.into(),
            },
        }
    }

    pub fn type_literal(value: Type) -> Self {
        Token::Type { value }
    }

    pub fn variable(name: impl Into<String>) -> Self {
        Token::Variable { value: name.into() }
    }

    pub fn index(value: impl Into<String>) -> Self {
        Token::Index {
            value: value.into(),
        }
    }

    pub fn function(name: impl Into<String>, args: Vec<Option<Program>>) -> Self {
        Token::Function {
            value: name.into(),
            args,
        }
    }

    pub fn operator(op: OperatorName) -> Self {
        Token::Operator { value: op }
    }

    pub fn field(name: impl Into<String>) -> Self {
        Token::Field { value: name.into() }
    }

    pub fn answer(link_id: impl Into<String>) -> Self {
        Token::Answer {
            value: link_id.into(),
        }
    }

    pub fn kind(&self) -> TokenKind {
        match self {
            Token::Number { .. } => TokenKind::Number,
            Token::String { .. } => TokenKind::String,
            Token::Boolean { .. } => TokenKind::Boolean,
            Token::Date { .. } => TokenKind::Date,
            Token::DateTime { .. } => TokenKind::DateTime,
            Token::Time { .. } => TokenKind::Time,
            Token::Quantity { .. } => TokenKind::Quantity,
            Token::Type { .. } => TokenKind::Type,
            Token::Variable { .. } => TokenKind::Variable,
            Token::Index { .. } => TokenKind::Index,
            Token::Function { .. } => TokenKind::Function,
            Token::Operator { .. } => TokenKind::Operator,
            Token::Field { .. } => TokenKind::Field,
            Token::Answer { .. } => TokenKind::Answer,
        }
    }

    pub fn is_operator(&self) -> bool {
        matches!(self, Token::Operator { .. })
    }

    /// Type of a literal token; `None` for every other kind
    pub fn literal_type(&self) -> Option<Type> {
        let ty = match self {
            Token::Number { value } if value.contains('.') => Type::Decimal,
            Token::Number { .. } => Type::Integer,
            Token::String { .. } => Type::String,
            Token::Boolean { .. } => Type::Boolean,
            Token::Date { .. } => Type::Date,
            Token::DateTime { .. } => Type::DateTime,
            Token::Time { .. } => Type::Time,
            Token::Quantity { .. } => Type::Quantity,
            _ => return None,
        };
        Some(Type::single(ty))
    }

    /// Short text identifying the token in suggestion lists
    pub fn label(&self) -> String {
        match self {
            Token::Number { value }
            | Token::String { value }
            | Token::Date { value }
            | Token::DateTime { value }
            | Token::Time { value }
            | Token::Variable { value }
            | Token::Index { value }
            | Token::Function { value, .. }
            | Token::Field { value }
            | Token::Answer { value } => value.clone(),
            Token::Boolean { value } => value.to_string(),
            Token::Quantity { value } => format!("{} {}", value.value, value.unit),
            Token::Type { value } => value.to_string(),
            Token::Operator { value } => value.symbol().to_string(),
        }
    }
}

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

//! Operator precedence tree over a flat token stream
//!
//! Expressions are edited as a flat sequence in which operator tokens
//! separate operand chains (`%a.b + 1 * 2`). Typing needs the tree that
//! precedence climbing builds from that sequence.

use super::operator::{Associativity, OperatorName};
use super::token::Token;

/// Operator tree whose leaves borrow operand chains from the token slice
#[derive(Debug, Clone, PartialEq)]
pub enum ExpressionTree<'a> {
    /// Operand chain without operators; empty when an operand is missing
    Chain(&'a [Token]),
    Binary {
        operator: OperatorName,
        left: Box<ExpressionTree<'a>>,
        right: Box<ExpressionTree<'a>>,
    },
}

impl<'a> ExpressionTree<'a> {
    /// Build the tree for `tokens` using operator precedence
    pub fn build(tokens: &'a [Token]) -> Self {
        let mut builder = TreeBuilder { tokens, pos: 0 };
        builder.parse_expression(0)
    }
}

struct TreeBuilder<'a> {
    tokens: &'a [Token],
    pos: usize,
}

impl<'a> TreeBuilder<'a> {
    fn peek_operator(&self) -> Option<OperatorName> {
        match self.tokens.get(self.pos) {
            Some(Token::Operator { value }) => Some(*value),
            _ => None,
        }
    }

    fn parse_chain(&mut self) -> ExpressionTree<'a> {
        let start = self.pos;
        while self.pos < self.tokens.len() && !self.tokens[self.pos].is_operator() {
            self.pos += 1;
        }
        ExpressionTree::Chain(&self.tokens[start..self.pos])
    }

    fn parse_expression(&mut self, min_precedence: u8) -> ExpressionTree<'a> {
        let mut left = self.parse_chain();

        while let Some(operator) = self.peek_operator() {
            let precedence = operator.precedence();
            if precedence < min_precedence {
                break;
            }
            self.pos += 1;

            let next_min = match operator.associativity() {
                Associativity::Left => precedence + 1,
                Associativity::Right => precedence,
            };
            let right = if self.peek_operator().is_some() {
                ExpressionTree::Chain(&[])
            } else {
                self.parse_expression(next_min)
            };

            left = ExpressionTree::Binary {
                operator,
                left: Box::new(left),
                right: Box::new(right),
            };
        }

        left
    }
}

/// Start of the left operand of `operator` when it is placed at `end`
///
/// Walks back from `end` over tokens that bind tighter than `operator`
/// (or equally tight for left-associative operators) and stops at the
/// first operator that binds looser.
pub fn left_operand_start(tokens: &[Token], end: usize, operator: OperatorName) -> usize {
    let precedence = operator.precedence();
    let mut start = end.min(tokens.len());
    while start > 0 {
        if let Token::Operator { value } = &tokens[start - 1] {
            let other = value.precedence();
            let breaks = other < precedence
                || (other == precedence && operator.associativity() == Associativity::Right);
            if breaks {
                break;
            }
        }
        start -= 1;
    }
    start
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn num(n: &str) -> Token {
        Token::number(n)
    }

    fn op(o: OperatorName) -> Token {
        Token::operator(o)
    }

    #[test]
    fn multiplication_binds_tighter() {
        let tokens = vec![
            num("1"),
            op(OperatorName::Add),
            num("2"),
            op(OperatorName::Multiply),
            num("3"),
        ];
        let ExpressionTree::Binary { operator, left, right } = ExpressionTree::build(&tokens) else {
            panic!("expected binary tree");
        };
        assert_eq!(operator, OperatorName::Add);
        assert_eq!(*left, ExpressionTree::Chain(&tokens[0..1]));
        assert!(matches!(
            *right,
            ExpressionTree::Binary {
                operator: OperatorName::Multiply,
                ..
            }
        ));
    }

    #[test]
    fn left_associative_chain() {
        let tokens = vec![
            num("1"),
            op(OperatorName::Subtract),
            num("2"),
            op(OperatorName::Subtract),
            num("3"),
        ];
        let ExpressionTree::Binary { left, right, .. } = ExpressionTree::build(&tokens) else {
            panic!("expected binary tree");
        };
        assert!(matches!(*left, ExpressionTree::Binary { .. }));
        assert_eq!(*right, ExpressionTree::Chain(&tokens[4..5]));
    }

    #[test]
    fn implies_is_right_associative() {
        let tokens = vec![
            Token::boolean(true),
            op(OperatorName::Implies),
            Token::boolean(false),
            op(OperatorName::Implies),
            Token::boolean(true),
        ];
        let ExpressionTree::Binary { left, right, .. } = ExpressionTree::build(&tokens) else {
            panic!("expected binary tree");
        };
        assert_eq!(*left, ExpressionTree::Chain(&tokens[0..1]));
        assert!(matches!(*right, ExpressionTree::Binary { .. }));
    }

    #[test]
    fn missing_operands_are_empty_chains() {
        let tokens = vec![num("1"), op(OperatorName::Add)];
        assert_eq!(
            ExpressionTree::build(&tokens),
            ExpressionTree::Binary {
                operator: OperatorName::Add,
                left: Box::new(ExpressionTree::Chain(&tokens[0..1])),
                right: Box::new(ExpressionTree::Chain(&[])),
            }
        );
    }

    #[test]
    fn left_operand_by_precedence() {
        let tokens = vec![
            Token::variable("a"),
            op(OperatorName::Add),
            num("2"),
        ];
        assert_eq!(left_operand_start(&tokens, 3, OperatorName::Multiply), 2);
        assert_eq!(left_operand_start(&tokens, 3, OperatorName::Subtract), 0);
        assert_eq!(left_operand_start(&tokens, 3, OperatorName::Equal), 0);
    }
}

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

//! Visitor pattern for token traversal
//!
//! Variable references can hide inside function arguments, and arguments
//! may declare their own bindings. The walkers here descend into every
//! argument program so that reference analysis and renaming see the whole
//! expression.

use super::program::Program;
use super::token::Token;
use smallvec::SmallVec;

/// Read-only traversal of tokens
pub trait TokenVisitor {
    /// Visit a single token
    fn visit_token(&mut self, token: &Token) {
        walk_token(self, token)
    }

    /// Visit a variable reference
    fn visit_variable(&mut self, _name: &str) {}

    /// Visit the program of a function argument
    fn visit_argument(&mut self, program: &Program) {
        walk_program(self, program)
    }
}

/// Default implementation of walking a token
pub fn walk_token<V: TokenVisitor + ?Sized>(visitor: &mut V, token: &Token) {
    match token {
        Token::Variable { value } => visitor.visit_variable(value),
        Token::Function { args, .. } => {
            for program in args.iter().flatten() {
                visitor.visit_argument(program);
            }
        }
        _ => {}
    }
}

/// Walk every binding expression of a program, then its final expression
pub fn walk_program<V: TokenVisitor + ?Sized>(visitor: &mut V, program: &Program) {
    for binding in &program.bindings {
        walk_tokens(visitor, &binding.expression);
    }
    walk_tokens(visitor, &program.expression);
}

pub fn walk_tokens<V: TokenVisitor + ?Sized>(visitor: &mut V, tokens: &[Token]) {
    for token in tokens {
        visitor.visit_token(token);
    }
}

/// Mutable traversal of tokens
pub trait TokenVisitorMut {
    fn visit_token_mut(&mut self, token: &mut Token) {
        walk_token_mut(self, token)
    }

    fn visit_variable_mut(&mut self, _name: &mut String) {}

    fn visit_argument_mut(&mut self, program: &mut Program) {
        walk_program_mut(self, program)
    }
}

pub fn walk_token_mut<V: TokenVisitorMut + ?Sized>(visitor: &mut V, token: &mut Token) {
    match token {
        Token::Variable { value } => visitor.visit_variable_mut(value),
        Token::Function { args, .. } => {
            for program in args.iter_mut().flatten() {
                visitor.visit_argument_mut(program);
            }
        }
        _ => {}
    }
}

pub fn walk_program_mut<V: TokenVisitorMut + ?Sized>(visitor: &mut V, program: &mut Program) {
    for binding in &mut program.bindings {
        walk_tokens_mut(visitor, &mut binding.expression);
    }
    walk_tokens_mut(visitor, &mut program.expression);
}

pub fn walk_tokens_mut<V: TokenVisitorMut + ?Sized>(visitor: &mut V, tokens: &mut [Token]) {
    for token in tokens {
        visitor.visit_token_mut(token);
    }
}

/// Collects the binding names an expression refers to from outside
///
/// Names declared by an argument's own bindings are not reported for the
/// parts of that argument that can see them.
#[derive(Debug, Default)]
pub struct ReferenceCollector {
    names: SmallVec<[String; 4]>,
}

impl ReferenceCollector {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn into_names(self) -> Vec<String> {
        self.names.into_vec()
    }

    fn push(&mut self, name: &str) {
        if !self.names.iter().any(|existing| existing == name) {
            self.names.push(name.to_string());
        }
    }
}

impl TokenVisitor for ReferenceCollector {
    fn visit_variable(&mut self, name: &str) {
        self.push(name);
    }

    fn visit_argument(&mut self, program: &Program) {
        let mut declared: SmallVec<[&str; 4]> = SmallVec::new();
        for binding in &program.bindings {
            let mut inner = ReferenceCollector::new();
            walk_tokens(&mut inner, &binding.expression);
            for name in inner.names {
                if !declared.contains(&name.as_str()) {
                    self.push(&name);
                }
            }
            declared.push(&binding.name);
        }
        let mut inner = ReferenceCollector::new();
        walk_tokens(&mut inner, &program.expression);
        for name in inner.names {
            if !declared.contains(&name.as_str()) {
                self.push(&name);
            }
        }
    }
}

/// Names of all bindings referenced by `tokens`, in first-use order
pub fn referenced_names(tokens: &[Token]) -> Vec<String> {
    let mut collector = ReferenceCollector::new();
    walk_tokens(&mut collector, tokens);
    collector.into_names()
}

/// Rewrites references to one binding name
///
/// Arguments that redeclare the name keep their inner references, which
/// point at the inner binding.
#[derive(Debug)]
pub struct ReferenceRenamer<'a> {
    from: &'a str,
    to: &'a str,
    /// Number of tokens rewritten
    pub renamed: usize,
}

impl<'a> ReferenceRenamer<'a> {
    pub fn new(from: &'a str, to: &'a str) -> Self {
        Self { from, to, renamed: 0 }
    }
}

impl TokenVisitorMut for ReferenceRenamer<'_> {
    fn visit_variable_mut(&mut self, name: &mut String) {
        if name == self.from {
            *name = self.to.to_string();
            self.renamed += 1;
        }
    }

    fn visit_argument_mut(&mut self, program: &mut Program) {
        for binding in &mut program.bindings {
            walk_tokens_mut(self, &mut binding.expression);
            if binding.name == self.from {
                return;
            }
        }
        walk_tokens_mut(self, &mut program.expression);
    }
}

/// Finds references to `from` that an argument binding named `to` would
/// capture if `from` were renamed to `to`
#[derive(Debug)]
pub struct CaptureFinder<'a> {
    from: &'a str,
    to: &'a str,
    pub captured: bool,
}

impl<'a> CaptureFinder<'a> {
    pub fn new(from: &'a str, to: &'a str) -> Self {
        Self {
            from,
            to,
            captured: false,
        }
    }

    fn check(&mut self, tokens: &[Token], to_in_scope: bool) {
        if to_in_scope && referenced_names(tokens).iter().any(|name| name == self.from) {
            self.captured = true;
        }
        walk_tokens(self, tokens);
    }
}

impl TokenVisitor for CaptureFinder<'_> {
    fn visit_argument(&mut self, program: &Program) {
        let mut to_in_scope = false;
        for binding in &program.bindings {
            self.check(&binding.expression, to_in_scope);
            if binding.name == self.from {
                return;
            }
            to_in_scope |= binding.name == self.to;
        }
        self.check(&program.expression, to_in_scope);
    }
}

/// Whether renaming `from` to `to` would rebind a reference in `tokens`
pub fn rename_captures(tokens: &[Token], from: &str, to: &str) -> bool {
    let mut finder = CaptureFinder::new(from, to);
    walk_tokens(&mut finder, tokens);
    finder.captured
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ast::LocalBinding;
    use pretty_assertions::assert_eq;

    fn where_with(program: Program) -> Token {
        Token::function("where", vec![Some(program)])
    }

    #[test]
    fn collects_nested_references_once() {
        let tokens = vec![
            Token::variable("a"),
            Token::field("x"),
            where_with(Program::from_expression(vec![
                Token::variable("b"),
                Token::operator(crate::ast::OperatorName::Equal),
                Token::variable("a"),
            ])),
        ];
        assert_eq!(referenced_names(&tokens), vec!["a", "b"]);
    }

    #[test]
    fn argument_bindings_shadow_outer_names() {
        let argument = Program {
            bindings: vec![
                LocalBinding::new("i1", "inner", vec![Token::variable("outer")]),
                LocalBinding::new("i2", "shadow", vec![Token::number("1")]),
            ],
            expression: vec![Token::variable("shadow"), Token::variable("inner")],
        };
        assert_eq!(referenced_names(&[where_with(argument)]), vec!["outer"]);
    }

    #[test]
    fn renamer_respects_shadowing() {
        let argument = Program {
            bindings: vec![
                LocalBinding::new("i1", "before", vec![Token::variable("x")]),
                LocalBinding::new("i2", "x", vec![Token::variable("x")]),
            ],
            expression: vec![Token::variable("x")],
        };
        let mut tokens = vec![Token::variable("x"), where_with(argument)];
        let mut renamer = ReferenceRenamer::new("x", "y");
        walk_tokens_mut(&mut renamer, &mut tokens);
        assert_eq!(renamer.renamed, 3);
        assert_eq!(tokens[0], Token::variable("y"));
        let Token::Function { args, .. } = &tokens[1] else {
            panic!("expected function");
        };
        let argument = args[0].as_ref().unwrap();
        assert_eq!(argument.bindings[0].expression, vec![Token::variable("y")]);
        assert_eq!(argument.bindings[1].expression, vec![Token::variable("y")]);
        assert_eq!(argument.expression, vec![Token::variable("x")]);
    }

    #[test]
    fn capture_by_argument_binding_is_detected() {
        let capturing = Program {
            bindings: vec![LocalBinding::new("i1", "y", vec![Token::string("inner")])],
            expression: vec![Token::variable("x")],
        };
        assert!(rename_captures(&[where_with(capturing)], "x", "y"));

        let declared_after = Program {
            bindings: vec![
                LocalBinding::new("i1", "before", vec![Token::variable("x")]),
                LocalBinding::new("i2", "y", vec![Token::number("1")]),
            ],
            expression: vec![Token::variable("y")],
        };
        assert!(!rename_captures(&[where_with(declared_after)], "x", "y"));

        let shadowed = Program {
            bindings: vec![
                LocalBinding::new("i1", "y", vec![Token::number("1")]),
                LocalBinding::new("i2", "x", vec![Token::number("2")]),
            ],
            expression: vec![Token::variable("x")],
        };
        assert!(!rename_captures(&[where_with(shadowed)], "x", "y"));

        let nested = Program {
            bindings: vec![LocalBinding::new("i1", "y", vec![Token::number("1")])],
            expression: vec![where_with(Program::from_expression(vec![Token::variable("x")]))],
        };
        assert!(rename_captures(&[where_with(nested)], "x", "y"));
    }
}

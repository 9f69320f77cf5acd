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

//! Binding graph operations
//!
//! Local bindings form a strict linear order in which every binding may only
//! reference externals and the locals before it. The operations here keep
//! that order a valid topological order of the reference graph.

use crate::ast::{
    Binding, ExternalBinding, LocalBinding, Program, ReferenceRenamer, Target, Token,
    referenced_names, rename_captures, walk_tokens_mut,
};
use crate::error::{EditorError, Result};
use once_cell::sync::Lazy;
use regex::Regex;

static NUMERIC_SUFFIX: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\d+$").expect("numeric suffix pattern is valid"));

/// Name given to bindings created without one
pub const DEFAULT_BINDING_NAME: &str = "var1";

const COPY_SUFFIX: &str = "_copy";

fn name_taken(program: &Program, externals: &[ExternalBinding], name: &str) -> bool {
    program.bindings.iter().any(|binding| binding.name == name)
        || externals.iter().any(|binding| binding.name == name)
}

/// Disambiguate `base` against every local and external binding name
///
/// A trailing number is incremented (`var1` becomes `var2`), otherwise `1`
/// is appended.
pub fn unique_name(program: &Program, externals: &[ExternalBinding], base: &str) -> String {
    let mut name = if base.is_empty() {
        DEFAULT_BINDING_NAME.to_string()
    } else {
        base.to_string()
    };
    while name_taken(program, externals, &name) {
        let next = match NUMERIC_SUFFIX.find(&name) {
            Some(digits) => {
                let n = digits.as_str().parse::<u64>().map_or(1, |n| n.saturating_add(1));
                format!("{}{n}", &name[..digits.start()])
            }
            None => format!("{name}1"),
        };
        name = next;
    }
    name
}

/// First unused id of the form `binding-<n>`
pub fn next_binding_id(program: &Program) -> String {
    (1..)
        .map(|n| format!("binding-{n}"))
        .find(|id| program.binding(id).is_none())
        .unwrap_or_default()
}

/// Insert a binding after position `after_index`, or append it
///
/// A colliding name is disambiguated rather than rejected.
pub fn add_binding(
    program: &Program,
    externals: &[ExternalBinding],
    name: &str,
    expression: Vec<Token>,
    after_index: Option<usize>,
) -> Result<Program> {
    let position = match after_index {
        Some(index) if index >= program.bindings.len() => {
            return Err(EditorError::IndexOutOfRange {
                index,
                len: program.bindings.len(),
            });
        }
        Some(index) => index + 1,
        None => program.bindings.len(),
    };

    let binding = LocalBinding::new(
        next_binding_id(program),
        unique_name(program, externals, name.trim()),
        expression,
    );
    let mut next = program.clone();
    next.bindings.insert(position, binding);
    Ok(next)
}

/// Rename a binding and every reference to it
///
/// References in the other bindings and in the final expression are
/// rewritten; argument bindings that redeclare the old name shadow it.
/// A name already declared by an argument that still sees the old binding
/// is rejected as a duplicate.
pub fn rename_binding(
    program: &Program,
    externals: &[ExternalBinding],
    id: &str,
    name: &str,
) -> Result<Program> {
    let index = binding_position(program, id)?;
    let name = name.trim();
    if name.is_empty() {
        return Err(EditorError::EmptyBindingName);
    }
    let old = program.bindings[index].name.clone();
    if old == name {
        return Ok(program.clone());
    }
    let captured = program
        .bindings
        .iter()
        .enumerate()
        .filter(|(position, _)| *position != index)
        .any(|(_, binding)| rename_captures(&binding.expression, &old, name))
        || rename_captures(&program.expression, &old, name);
    if captured || name_taken(program, externals, name) {
        return Err(EditorError::DuplicateBindingName {
            name: name.to_string(),
        });
    }

    let mut next = program.clone();
    let mut renamer = ReferenceRenamer::new(&old, name);
    for (position, binding) in next.bindings.iter_mut().enumerate() {
        if position != index {
            walk_tokens_mut(&mut renamer, &mut binding.expression);
        }
    }
    walk_tokens_mut(&mut renamer, &mut next.expression);
    log::debug!("renamed {old} to {name}, {} references rewritten", renamer.renamed);

    next.bindings[index].name = name.to_string();
    Ok(next)
}

/// Remove a binding
///
/// References to it are left in place and resolve to an unknown binding.
pub fn delete_binding(program: &Program, id: &str) -> Result<Program> {
    let index = binding_position(program, id)?;
    let mut next = program.clone();
    let removed = next.bindings.remove(index);
    let dangling = dependents(program, id).len();
    if dangling > 0 {
        log::debug!("deleted {} leaving {dangling} dependents", removed.name);
    }
    Ok(next)
}

/// Insert a copy right after the binding, named `<name>_copy`
pub fn duplicate_binding(
    program: &Program,
    externals: &[ExternalBinding],
    id: &str,
) -> Result<Program> {
    let index = binding_position(program, id)?;
    let original = &program.bindings[index];
    add_binding(
        program,
        externals,
        &format!("{}{COPY_SUFFIX}", original.name),
        original.expression.clone(),
        Some(index),
    )
}

/// Move the final expression into a new binding and reference it instead
pub fn name_expression(program: &Program, externals: &[ExternalBinding]) -> Result<Program> {
    let mut next = add_binding(
        program,
        externals,
        DEFAULT_BINDING_NAME,
        program.expression.clone(),
        None,
    )?;
    let name = next
        .bindings
        .last()
        .map(|binding| binding.name.clone())
        .unwrap_or_default();
    next.expression = vec![Token::variable(name)];
    Ok(next)
}

fn references(binding: &LocalBinding, name: &str) -> bool {
    referenced_names(&binding.expression)
        .iter()
        .any(|referenced| referenced == name)
}

/// Whether moving the binding at `from` to position `to` keeps every
/// reference pointing backwards
pub fn can_move(bindings: &[LocalBinding], from: usize, to: usize) -> bool {
    if from >= bindings.len() || to >= bindings.len() {
        return false;
    }
    let moved = &bindings[from];
    if to > from {
        !bindings[from + 1..=to]
            .iter()
            .any(|passed| references(passed, &moved.name))
    } else {
        !bindings[to..from]
            .iter()
            .any(|passed| references(moved, &passed.name))
    }
}

/// Move a binding, rejecting moves that would create a forward reference
pub fn reorder_binding(program: &Program, from: usize, to: usize) -> Result<Program> {
    let len = program.bindings.len();
    for index in [from, to] {
        if index >= len {
            return Err(EditorError::IndexOutOfRange { index, len });
        }
    }
    if !can_move(&program.bindings, from, to) {
        return Err(EditorError::IllegalReorder { from, to });
    }
    let mut next = program.clone();
    let binding = next.bindings.remove(from);
    next.bindings.insert(to, binding);
    Ok(next)
}

/// Bindings an expression of `target` may reference
///
/// Externals come first, then the locals declared before the target; the
/// final expression sees every local.
pub fn bindable_bindings(
    program: &Program,
    externals: &[ExternalBinding],
    target: &Target,
) -> Vec<Binding> {
    let locals = program
        .bindings
        .iter()
        .take_while(|binding| !matches!(target, Target::Binding(id) if *id == binding.id));
    externals
        .iter()
        .cloned()
        .map(Binding::from)
        .chain(locals.cloned().map(Binding::from))
        .collect()
}

/// Ids of the bindings that depend on `id`, directly or transitively
pub fn dependents(program: &Program, id: &str) -> Vec<String> {
    let Some(start) = program.binding_index(id) else {
        return Vec::new();
    };
    let mut reached = vec![program.bindings[start].name.as_str()];
    let mut ids = Vec::new();
    for binding in &program.bindings[start + 1..] {
        let names = referenced_names(&binding.expression);
        if names.iter().any(|name| reached.contains(&name.as_str())) {
            reached.push(&binding.name);
            ids.push(binding.id.clone());
        }
    }
    ids
}

fn binding_position(program: &Program, id: &str) -> Result<usize> {
    program
        .binding_index(id)
        .ok_or_else(|| EditorError::UnknownBinding { id: id.to_string() })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ast::OperatorName;
    use crate::model::Type;
    use pretty_assertions::assert_eq;
    use rstest::rstest;

    fn program() -> Program {
        Program::from_expression(vec![
            Token::variable("total"),
            Token::operator(OperatorName::Add),
            Token::variable("a"),
        ])
        .with_binding(LocalBinding::new("binding-1", "a", vec![Token::number("1")]))
        .with_binding(LocalBinding::new("binding-2", "b", vec![Token::number("2")]))
        .with_binding(LocalBinding::new(
            "binding-3",
            "total",
            vec![
                Token::variable("a"),
                Token::operator(OperatorName::Add),
                Token::variable("b"),
            ],
        ))
    }

    fn names(program: &Program) -> Vec<&str> {
        program.bindings.iter().map(|b| b.name.as_str()).collect()
    }

    #[rstest]
    #[case("", "var1")]
    #[case("a", "a1")]
    #[case("total", "total1")]
    #[case("fresh", "fresh")]
    fn unique_names(#[case] base: &str, #[case] expected: &str) {
        assert_eq!(unique_name(&program(), &[], base), expected);
    }

    #[test]
    fn numeric_suffix_increments() {
        let program = Program::new()
            .with_binding(LocalBinding::new("binding-1", "var1", vec![]))
            .with_binding(LocalBinding::new("binding-2", "var2", vec![]));
        assert_eq!(unique_name(&program, &[], "var1"), "var3");
        let externals = [ExternalBinding::new("e", "patient", Type::Null)];
        assert_eq!(unique_name(&program, &externals, "patient"), "patient1");
    }

    #[test]
    fn add_binding_positions() {
        let added = add_binding(&program(), &[], "a", vec![], Some(0)).unwrap();
        assert_eq!(names(&added), vec!["a", "a1", "b", "total"]);
        assert_eq!(added.bindings[1].id, "binding-4");

        let appended = add_binding(&program(), &[], "x", vec![], None).unwrap();
        assert_eq!(names(&appended), vec!["a", "b", "total", "x"]);

        assert!(matches!(
            add_binding(&program(), &[], "x", vec![], Some(3)),
            Err(EditorError::IndexOutOfRange { index: 3, len: 3 })
        ));
    }

    #[test]
    fn rename_rewrites_references() {
        let renamed = rename_binding(&program(), &[], "binding-1", "first").unwrap();
        assert_eq!(names(&renamed), vec!["first", "b", "total"]);
        assert_eq!(renamed.bindings[2].expression[0], Token::variable("first"));
        assert_eq!(renamed.expression[2], Token::variable("first"));
        assert_eq!(renamed.expression[0], Token::variable("total"));
    }

    #[test]
    fn rename_collision_is_rejected() {
        assert!(matches!(
            rename_binding(&program(), &[], "binding-1", "b"),
            Err(EditorError::DuplicateBindingName { .. })
        ));
        let externals = [ExternalBinding::new("e", "patient", Type::Null)];
        assert!(rename_binding(&program(), &externals, "binding-1", "patient").is_err());
        assert!(matches!(
            rename_binding(&program(), &[], "binding-1", "  "),
            Err(EditorError::EmptyBindingName)
        ));
        assert!(matches!(
            rename_binding(&program(), &[], "nope", "x"),
            Err(EditorError::UnknownBinding { .. })
        ));
        assert_eq!(rename_binding(&program(), &[], "binding-1", "a").unwrap(), program());
    }

    #[test]
    fn rename_into_argument_binding_is_rejected() {
        let inner = Program::from_expression(vec![Token::variable("x")])
            .with_binding(LocalBinding::new("inner-1", "y", vec![Token::string("inner")]));
        let program = Program::from_expression(vec![Token::function("select", vec![Some(inner)])])
            .with_binding(LocalBinding::new("binding-1", "x", vec![Token::number("1")]));

        assert!(matches!(
            rename_binding(&program, &[], "binding-1", "y"),
            Err(EditorError::DuplicateBindingName { name }) if name == "y"
        ));
        let renamed = rename_binding(&program, &[], "binding-1", "z").unwrap();
        let Token::Function { args, .. } = &renamed.expression[0] else {
            panic!("expected function");
        };
        assert_eq!(args[0].as_ref().unwrap().expression, vec![Token::variable("z")]);
    }

    #[test]
    fn delete_leaves_references_dangling() {
        let deleted = delete_binding(&program(), "binding-2").unwrap();
        assert_eq!(names(&deleted), vec!["a", "total"]);
        assert_eq!(deleted.bindings[1].expression[2], Token::variable("b"));
    }

    #[test]
    fn duplicate_and_name_expression() {
        let duplicated = duplicate_binding(&program(), &[], "binding-2").unwrap();
        assert_eq!(names(&duplicated), vec!["a", "b", "b_copy", "total"]);
        assert_eq!(duplicated.bindings[2].expression, vec![Token::number("2")]);

        let named = name_expression(&program(), &[]).unwrap();
        assert_eq!(names(&named), vec!["a", "b", "total", "var1"]);
        assert_eq!(named.expression, vec![Token::variable("var1")]);
        assert_eq!(named.bindings[3].expression, program().expression);
    }

    #[rstest]
    #[case(0, 1, true)]
    #[case(0, 2, false)]
    #[case(1, 2, false)]
    #[case(2, 0, false)]
    #[case(1, 0, true)]
    #[case(2, 2, true)]
    #[case(3, 0, false)]
    fn move_validation(#[case] from: usize, #[case] to: usize, #[case] legal: bool) {
        assert_eq!(can_move(&program().bindings, from, to), legal);
    }

    #[test]
    fn accepted_moves_invert() {
        let original = program();
        let moved = reorder_binding(&original, 1, 0).unwrap();
        assert_eq!(names(&moved), vec!["b", "a", "total"]);
        assert_eq!(reorder_binding(&moved, 0, 1).unwrap(), original);
        assert!(matches!(
            reorder_binding(&original, 0, 2),
            Err(EditorError::IllegalReorder { from: 0, to: 2 })
        ));
    }

    #[test]
    fn scope_and_dependents() {
        let externals = [ExternalBinding::new("e", "patient", Type::Null)];
        let visible: Vec<_> = bindable_bindings(&program(), &externals, &Target::binding("binding-3"))
            .iter()
            .map(|b| b.name().to_string())
            .collect();
        assert_eq!(visible, vec!["patient", "a", "b"]);
        assert_eq!(
            bindable_bindings(&program(), &externals, &Target::Expression).len(),
            4
        );
        assert_eq!(dependents(&program(), "binding-1"), vec!["binding-3"]);
        assert!(dependents(&program(), "binding-3").is_empty());
    }
}

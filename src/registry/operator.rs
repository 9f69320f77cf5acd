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

//! Operator registry and built-in operator overloads

use crate::ast::OperatorName;
use crate::model::{GenericBindings, GenericLetter, MatchError, Type, match_type};
use crate::registry::signature::{OperatorSignature, ReturnContext, ReturnType};
use once_cell::sync::Lazy;
use rustc_hash::FxHashMap;

/// Message of a failed generic unification
pub const GENERIC_MISMATCH: &str = "generic mismatch";

static STANDARD_OPERATORS: Lazy<OperatorRegistry> = Lazy::new(|| {
    let mut registry = OperatorRegistry::new();
    register_builtin_operators(&mut registry);
    registry
});

/// Registry of operator overloads
///
/// Overloads of one operator are tried in registration order and the first
/// whose operand patterns both match wins.
#[derive(Debug, Clone, Default)]
pub struct OperatorRegistry {
    overloads: FxHashMap<OperatorName, Vec<OperatorSignature>>,
}

impl OperatorRegistry {
    /// Create an empty registry
    pub fn new() -> Self {
        Self::default()
    }

    /// The shared registry holding the built-in overloads
    pub fn standard() -> &'static OperatorRegistry {
        &STANDARD_OPERATORS
    }

    /// Append an overload
    pub fn register(&mut self, signature: OperatorSignature) {
        self.overloads
            .entry(signature.operator)
            .or_default()
            .push(signature);
    }

    pub fn overloads(&self, operator: OperatorName) -> &[OperatorSignature] {
        self.overloads
            .get(&operator)
            .map(Vec::as_slice)
            .unwrap_or_default()
    }

    /// Result type of `left operator right`
    pub fn resolve(&self, operator: OperatorName, left: &Type, right: &Type) -> Type {
        if left.is_invalid() {
            return left.clone();
        }
        if right.is_invalid() {
            return right.clone();
        }

        let mut generic_conflict = false;
        for signature in self.overloads(operator) {
            let matched = match_type(&signature.left_type, left, &GenericBindings::new())
                .and_then(|bindings| match_type(&signature.right_type, right, &bindings));
            match matched {
                Ok(generics) => {
                    let args = [right.clone()];
                    return signature.return_type.resolve(&ReturnContext {
                        input: left,
                        args: &args,
                        generics: &generics,
                    });
                }
                Err(MatchError::GenericMismatch { .. }) => generic_conflict = true,
                Err(_) => {}
            }
        }

        if generic_conflict {
            log::debug!("operator {operator}: generic mismatch between {left} and {right}");
            Type::invalid(GENERIC_MISMATCH)
        } else {
            Type::invalid(format!(
                "No matching overload for operator \"{operator}\" with {left} and {right}"
            ))
        }
    }

    /// Whether some overload accepts `left` as its left operand
    pub fn accepts_left(&self, operator: OperatorName, left: &Type) -> bool {
        self.overloads(operator)
            .iter()
            .any(|signature| match_type(&signature.left_type, left, &GenericBindings::new()).is_ok())
    }

    /// Whether `left operator right` matches some overload
    ///
    /// Unlike checking against [`Self::right_operand_types`], a generic
    /// letter bound by the left operand keeps its loose consistency rules,
    /// so a FHIR `date` accepts a System `Date` literal.
    pub fn accepts_right(&self, operator: OperatorName, left: &Type, right: &Type) -> bool {
        self.overloads(operator).iter().any(|signature| {
            match_type(&signature.left_type, left, &GenericBindings::new())
                .and_then(|bindings| match_type(&signature.right_type, right, &bindings))
                .is_ok()
        })
    }

    /// Right operand types that complete `left operator _`
    ///
    /// Generic letters bound by the left operand are substituted; the
    /// remaining ones stay generic and match anything.
    pub fn right_operand_types(&self, operator: OperatorName, left: &Type) -> Vec<Type> {
        self.overloads(operator)
            .iter()
            .filter_map(|signature| {
                match_type(&signature.left_type, left, &GenericBindings::new())
                    .ok()
                    .map(|bindings| bindings.substitute(&signature.right_type))
            })
            .collect()
    }
}

fn returns_union(ctx: &ReturnContext<'_>) -> Type {
    let left = ctx.generic(GenericLetter::A).into_collection();
    let right = ctx.generic(GenericLetter::B).into_collection();
    if left.is_invalid() {
        return left;
    }
    if right.is_invalid() {
        return right;
    }
    if left.equivalent(&right) {
        return left;
    }
    Type::promote(&left, &right).unwrap_or_else(|| Type::normalize_choice(vec![left, right]))
}

fn returns_cast(ctx: &ReturnContext<'_>) -> Type {
    let target = Type::normalize_choice(vec![ctx.generic(GenericLetter::X)]);
    if ctx.input.is_single() {
        Type::single(target)
    } else {
        target
    }
}

/// Register the built-in operator overloads
pub fn register_builtin_operators(registry: &mut OperatorRegistry) {
    use OperatorName::*;

    let single = Type::single;
    let integer = || single(Type::Integer);
    let decimal = || single(Type::Decimal);
    let quantity = || single(Type::Quantity);
    let string = || single(Type::String);
    let boolean = || single(Type::Boolean);
    let t = || Type::generic(GenericLetter::T);

    let mut add = |operator: OperatorName, left: Type, right: Type, returns: ReturnType| {
        registry.register(OperatorSignature::binary(operator, left, right, returns));
    };

    add(Concatenate, string(), string(), string().into());

    for operator in [Add, Subtract] {
        add(operator, integer(), integer(), integer().into());
        add(operator, integer(), decimal(), decimal().into());
        add(operator, integer(), quantity(), quantity().into());
        add(operator, decimal(), integer(), decimal().into());
        add(operator, decimal(), decimal(), decimal().into());
        add(operator, decimal(), quantity(), quantity().into());
        add(operator, quantity(), integer(), quantity().into());
        add(operator, quantity(), decimal(), quantity().into());
        add(operator, quantity(), quantity(), quantity().into());
        if operator == Add {
            add(operator, string(), string(), string().into());
        }
        for temporal in [Type::Date, Type::DateTime, Type::Time] {
            add(operator, single(temporal.clone()), quantity(), single(temporal).into());
        }
    }

    add(Multiply, integer(), integer(), integer().into());
    add(Multiply, integer(), decimal(), decimal().into());
    add(Multiply, integer(), quantity(), quantity().into());
    add(Multiply, decimal(), integer(), decimal().into());
    add(Multiply, decimal(), decimal(), decimal().into());
    add(Multiply, decimal(), quantity(), quantity().into());
    add(Multiply, quantity(), integer(), quantity().into());
    add(Multiply, quantity(), decimal(), quantity().into());

    add(Divide, integer(), integer(), decimal().into());
    add(Divide, integer(), decimal(), decimal().into());
    add(Divide, integer(), quantity(), decimal().into());
    add(Divide, decimal(), integer(), decimal().into());
    add(Divide, decimal(), decimal(), decimal().into());
    add(Divide, decimal(), quantity(), decimal().into());
    add(Divide, quantity(), integer(), quantity().into());
    add(Divide, quantity(), decimal(), quantity().into());
    add(Divide, quantity(), quantity(), decimal().into());

    add(Modulo, integer(), integer(), integer().into());
    add(Modulo, integer(), decimal(), decimal().into());
    add(Modulo, decimal(), integer(), decimal().into());
    add(Modulo, decimal(), decimal(), decimal().into());

    for (left, right) in [(integer(), integer()), (integer(), decimal()), (decimal(), integer()), (decimal(), decimal())] {
        add(IntegerDivide, left, right, integer().into());
    }

    for operator in [
        Equal,
        NotEqual,
        Equivalent,
        NotEquivalent,
        LessThan,
        LessThanOrEqual,
        GreaterThan,
        GreaterThanOrEqual,
    ] {
        add(operator, t(), t(), boolean().into());
    }

    add(In, single(t()), t(), boolean().into());
    add(Contains, t(), single(t()), boolean().into());

    for operator in [And, Or, Xor, Implies] {
        add(operator, boolean(), boolean(), boolean().into());
    }

    add(
        Union,
        Type::generic(GenericLetter::A),
        Type::generic(GenericLetter::B),
        ReturnType::Computed(returns_union),
    );

    add(Is, t(), Type::type_of(Type::generic(GenericLetter::X)), boolean().into());
    add(
        As,
        t(),
        Type::type_of(Type::generic(GenericLetter::X)),
        ReturnType::Computed(returns_cast),
    );
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::PrimitiveKind;
    use pretty_assertions::assert_eq;
    use rstest::rstest;

    fn single(ty: Type) -> Type {
        Type::single(ty)
    }

    #[rstest]
    #[case(OperatorName::Add, Type::Integer, Type::Integer, single(Type::Integer))]
    #[case(OperatorName::Add, Type::Integer, Type::Decimal, single(Type::Decimal))]
    #[case(OperatorName::Divide, Type::Integer, Type::Integer, single(Type::Decimal))]
    #[case(OperatorName::Subtract, Type::Date, Type::Quantity, single(Type::Date))]
    #[case(OperatorName::IntegerDivide, Type::Decimal, Type::Integer, single(Type::Integer))]
    #[case(OperatorName::Concatenate, Type::String, Type::String, single(Type::String))]
    #[case(OperatorName::Equal, Type::String, Type::String, single(Type::Boolean))]
    fn resolves_overloads(
        #[case] operator: OperatorName,
        #[case] left: Type,
        #[case] right: Type,
        #[case] expected: Type,
    ) {
        let registry = OperatorRegistry::standard();
        assert_eq!(registry.resolve(operator, &single(left), &single(right)), expected);
    }

    #[test]
    fn primitives_use_system_overloads() {
        let registry = OperatorRegistry::standard();
        let age = single(Type::Primitive(PrimitiveKind::Integer));
        assert_eq!(
            registry.resolve(OperatorName::Multiply, &age, &single(Type::Decimal)),
            single(Type::Decimal)
        );
    }

    #[test]
    fn mismatches() {
        let registry = OperatorRegistry::standard();
        assert_eq!(
            registry.resolve(OperatorName::Equal, &single(Type::String), &single(Type::Boolean)),
            Type::invalid(GENERIC_MISMATCH)
        );
        assert!(registry
            .resolve(OperatorName::And, &single(Type::Integer), &single(Type::Boolean))
            .is_invalid());
        assert_eq!(
            registry.resolve(OperatorName::Add, &Type::invalid("left"), &single(Type::Integer)),
            Type::invalid("left")
        );
    }

    #[test]
    fn union_and_cast() {
        let registry = OperatorRegistry::standard();
        assert_eq!(
            registry.resolve(OperatorName::Union, &single(Type::Integer), &Type::Decimal),
            Type::Decimal
        );
        assert_eq!(
            registry.resolve(OperatorName::Union, &Type::String, &Type::Boolean),
            Type::Choice(vec![Type::String, Type::Boolean])
        );
        assert_eq!(
            registry.resolve(
                OperatorName::As,
                &single(Type::fhir(["Observation"])),
                &Type::type_of(Type::Quantity)
            ),
            single(Type::Quantity)
        );
    }

    #[test]
    fn right_operands_follow_left() {
        let registry = OperatorRegistry::standard();
        let rights = registry.right_operand_types(OperatorName::Add, &single(Type::Integer));
        assert_eq!(rights, vec![integer_single(), single(Type::Decimal), single(Type::Quantity)]);
        assert!(registry.accepts_left(OperatorName::And, &single(Type::Boolean)));
        let birth_date = single(Type::Primitive(PrimitiveKind::Date));
        assert!(registry.accepts_right(OperatorName::LessThan, &birth_date, &single(Type::Date)));
        assert!(!registry.accepts_right(OperatorName::LessThan, &birth_date, &single(Type::Integer)));
        assert!(!registry.accepts_left(OperatorName::And, &Type::String));
    }

    fn integer_single() -> Type {
        single(Type::Integer)
    }
}

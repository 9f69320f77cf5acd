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

//! Function and operator registries
//!
//! Signatures are expressed as type patterns over the lattice in
//! [`crate::model`]. Both registries have a shared standard instance holding
//! the built-in catalog; custom registries can be assembled with
//! [`create_standard_registries`] and extended through `register`.

pub mod function;
pub mod operator;
pub mod signature;

pub use function::FunctionRegistry;
pub use operator::{GENERIC_MISMATCH, OperatorRegistry};
pub use signature::{
    FunctionCategory, FunctionSignature, OperatorSignature, ParameterInfo, ReturnContext,
    ReturnType,
};

/// Create owned registries with all built-in functions and operators
pub fn create_standard_registries() -> (FunctionRegistry, OperatorRegistry) {
    let mut functions = FunctionRegistry::new();
    let mut operators = OperatorRegistry::new();

    function::register_builtin_functions(&mut functions);
    operator::register_builtin_operators(&mut operators);

    (functions, operators)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn owned_registries_match_the_shared_ones() {
        let (functions, operators) = create_standard_registries();
        assert_eq!(functions.len(), FunctionRegistry::standard().len());
        assert_eq!(
            operators.overloads(crate::ast::OperatorName::Add).len(),
            OperatorRegistry::standard()
                .overloads(crate::ast::OperatorName::Add)
                .len()
        );
    }
}

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

//! Function registry and built-in function catalog

use crate::model::{GenericBindings, GenericLetter, PrimitiveKind, Type, match_type};
use crate::registry::signature::{
    FunctionCategory, FunctionSignature, ParameterInfo, ReturnContext, ReturnType,
};
use once_cell::sync::Lazy;
use rustc_hash::FxHashMap;

static STANDARD_FUNCTIONS: Lazy<FunctionRegistry> = Lazy::new(|| {
    let mut registry = FunctionRegistry::new();
    register_builtin_functions(&mut registry);
    registry
});

/// Registry of function signatures, looked up by name
#[derive(Debug, Clone, Default)]
pub struct FunctionRegistry {
    signatures: Vec<FunctionSignature>,
    by_name: FxHashMap<String, usize>,
}

impl FunctionRegistry {
    /// Create an empty registry
    pub fn new() -> Self {
        Self::default()
    }

    /// The shared registry holding the built-in catalog
    pub fn standard() -> &'static FunctionRegistry {
        &STANDARD_FUNCTIONS
    }

    /// Register a signature, replacing an existing one with the same name
    pub fn register(&mut self, signature: FunctionSignature) {
        match self.by_name.get(&signature.name) {
            Some(&index) => self.signatures[index] = signature,
            None => {
                self.by_name
                    .insert(signature.name.clone(), self.signatures.len());
                self.signatures.push(signature);
            }
        }
    }

    pub fn get(&self, name: &str) -> Option<&FunctionSignature> {
        self.by_name.get(name).map(|&index| &self.signatures[index])
    }

    pub fn contains(&self, name: &str) -> bool {
        self.by_name.contains_key(name)
    }

    /// Signatures in registration order
    pub fn iter(&self) -> impl Iterator<Item = &FunctionSignature> {
        self.signatures.iter()
    }

    pub fn len(&self) -> usize {
        self.signatures.len()
    }

    pub fn is_empty(&self) -> bool {
        self.signatures.is_empty()
    }

    /// Functions that can be invoked on a value of type `input`
    pub fn for_input<'a>(&'a self, input: &'a Type) -> impl Iterator<Item = &'a FunctionSignature> + 'a {
        self.signatures
            .iter()
            .filter(move |signature| match_type(&signature.input, input, &GenericBindings::new()).is_ok())
    }
}

const T: GenericLetter = GenericLetter::T;
const R: GenericLetter = GenericLetter::R;
const X: GenericLetter = GenericLetter::X;
const I: GenericLetter = GenericLetter::I;

fn t() -> Type {
    Type::generic(T)
}

fn numeric() -> Type {
    Type::Choice(vec![Type::Integer, Type::Decimal, Type::Quantity])
}

fn criteria(context: Type) -> Type {
    Type::lambda(Type::Boolean, context)
}

fn projection(context: Type) -> Type {
    Type::lambda(Type::generic(R), context)
}

fn returns_t(ctx: &ReturnContext<'_>) -> Type {
    ctx.generic(T)
}

fn returns_single_t(ctx: &ReturnContext<'_>) -> Type {
    Type::single(ctx.generic(T))
}

fn returns_collection_t(ctx: &ReturnContext<'_>) -> Type {
    ctx.generic(T).into_collection()
}

fn returns_r(ctx: &ReturnContext<'_>) -> Type {
    ctx.generic(R)
}

fn returns_collection_r(ctx: &ReturnContext<'_>) -> Type {
    ctx.generic(R).into_collection()
}

fn returns_x(ctx: &ReturnContext<'_>) -> Type {
    Type::normalize_choice(vec![ctx.generic(X)])
}

fn returns_single_input(ctx: &ReturnContext<'_>) -> Type {
    Type::single(ctx.input.clone())
}

fn returns_iif(ctx: &ReturnContext<'_>) -> Type {
    let then = ctx.generic(T);
    if ctx.arg(2).is_null() {
        return then;
    }
    let otherwise = ctx.generic(GenericLetter::F);
    match (&then, &otherwise) {
        (Type::Invalid(_), _) => then,
        (_, Type::Invalid(_)) => otherwise,
        _ => Type::normalize_choice(vec![then, otherwise]),
    }
}

fn single_boolean() -> ReturnType {
    ReturnType::Fixed(Type::single(Type::Boolean))
}

/// Register the built-in FHIRPath, FHIR and SDC functions
pub fn register_builtin_functions(registry: &mut FunctionRegistry) {
    use FunctionCategory::*;
    use ReturnType::{Computed, Elementwise};

    let mut add = |name: &str,
                   category: FunctionCategory,
                   input: Type,
                   parameters: Vec<ParameterInfo>,
                   return_type: ReturnType| {
        registry.register(FunctionSignature::new(name, category, input, parameters, return_type));
    };
    let required = ParameterInfo::required;
    let optional = ParameterInfo::optional;

    // Existence
    add("empty", Existence, t(), vec![], single_boolean());
    add("exists", Existence, t(), vec![optional("criteria", criteria(t()))], single_boolean());
    add("all", Existence, t(), vec![required("criteria", criteria(t()))], single_boolean());
    add("allTrue", Existence, Type::Boolean, vec![], single_boolean());
    add("anyTrue", Existence, Type::Boolean, vec![], single_boolean());
    add("allFalse", Existence, Type::Boolean, vec![], single_boolean());
    add("anyFalse", Existence, Type::Boolean, vec![], single_boolean());
    add("subsetOf", Existence, t(), vec![required("other", t())], single_boolean());
    add("supersetOf", Existence, t(), vec![required("other", t())], single_boolean());
    add("count", Existence, t(), vec![], Type::single(Type::Integer).into());
    add("distinct", Existence, t(), vec![], Computed(returns_t));
    add("isDistinct", Existence, t(), vec![], single_boolean());

    // Filtering and projection
    add(
        "where",
        FilteringAndProjection,
        t(),
        vec![required("criteria", criteria(Type::single(t())))],
        Computed(returns_collection_t),
    );
    add(
        "select",
        FilteringAndProjection,
        t(),
        vec![required("projection", projection(Type::single(t())))],
        Computed(returns_r),
    );
    add(
        "repeat",
        FilteringAndProjection,
        t(),
        vec![required("projection", projection(Type::single(t())))],
        Computed(returns_collection_r),
    );
    add(
        "ofType",
        FilteringAndProjection,
        t(),
        vec![required("type", Type::type_of(Type::generic(X)))],
        Computed(returns_x),
    );

    // Subsetting
    add("single", Subsetting, t(), vec![], Computed(returns_single_t));
    add("first", Subsetting, t(), vec![], Computed(returns_single_t));
    add("last", Subsetting, t(), vec![], Computed(returns_single_t));
    add("tail", Subsetting, t(), vec![], Computed(returns_collection_t));
    add("skip", Subsetting, t(), vec![required("num", Type::Integer)], Computed(returns_collection_t));
    add("take", Subsetting, t(), vec![required("num", Type::Integer)], Computed(returns_collection_t));
    add("intersect", Subsetting, t(), vec![required("other", t())], Computed(returns_collection_t));
    add("exclude", Subsetting, t(), vec![required("other", t())], Computed(returns_collection_t));

    // Combining
    add("union", Combining, t(), vec![required("other", t())], Computed(returns_collection_t));
    add("combine", Combining, t(), vec![required("other", t())], Computed(returns_collection_t));

    // Conversion
    add(
        "iif",
        Conversion,
        Type::generic(I),
        vec![
            required("condition", Type::lambda(Type::generic(GenericLetter::C), Type::single(Type::generic(I)))),
            required("then", Type::lambda(t(), Type::single(Type::generic(I)))),
            optional("else", Type::lambda(Type::generic(GenericLetter::F), Type::single(Type::generic(I)))),
        ],
        Computed(returns_iif),
    );
    let conversions = [
        ("Boolean", Type::Boolean),
        ("Integer", Type::Integer),
        ("Date", Type::Date),
        ("DateTime", Type::DateTime),
        ("Decimal", Type::Decimal),
        ("Quantity", Type::Quantity),
        ("String", Type::String),
        ("Time", Type::Time),
    ];
    for (suffix, target) in conversions {
        let parameters = if target == Type::Quantity {
            vec![optional("unit", Type::String)]
        } else {
            vec![]
        };
        add(format!("to{suffix}").as_str(), Conversion, t(), parameters.clone(), Elementwise(target));
        add(format!("convertsTo{suffix}").as_str(), Conversion, t(), parameters, Elementwise(Type::Boolean));
    }

    // String manipulation
    let string = || Type::String;
    add("indexOf", StringManipulation, string(), vec![required("substring", string())], Elementwise(Type::Integer));
    add(
        "substring",
        StringManipulation,
        string(),
        vec![required("start", Type::Integer), optional("length", Type::Integer)],
        Elementwise(string()),
    );
    add("startsWith", StringManipulation, string(), vec![required("prefix", string())], Elementwise(Type::Boolean));
    add("endsWith", StringManipulation, string(), vec![required("suffix", string())], Elementwise(Type::Boolean));
    add("contains", StringManipulation, string(), vec![required("substring", string())], Elementwise(Type::Boolean));
    add("upper", StringManipulation, string(), vec![], Elementwise(string()));
    add("lower", StringManipulation, string(), vec![], Elementwise(string()));
    add(
        "replace",
        StringManipulation,
        string(),
        vec![required("pattern", string()), required("substitution", string())],
        Elementwise(string()),
    );
    add("matches", StringManipulation, string(), vec![required("regex", string())], Elementwise(Type::Boolean));
    add(
        "replaceMatches",
        StringManipulation,
        string(),
        vec![required("regex", string()), required("substitution", string())],
        Elementwise(string()),
    );
    add("length", StringManipulation, string(), vec![], Elementwise(Type::Integer));
    add("toChars", StringManipulation, string(), vec![], string().into());

    // Additional string functions
    add("encode", AdditionalString, string(), vec![required("format", string())], Elementwise(string()));
    add("decode", AdditionalString, string(), vec![required("format", string())], Elementwise(string()));
    add("trim", AdditionalString, string(), vec![], Elementwise(string()));
    add("split", AdditionalString, string(), vec![required("separator", string())], string().into());
    add("join", AdditionalString, string(), vec![optional("separator", string())], Type::single(string()).into());

    // Math
    add("abs", Math, numeric(), vec![], Computed(returns_single_input));
    add("ceiling", Math, Type::Decimal, vec![], Elementwise(Type::Integer));
    add("exp", Math, Type::Decimal, vec![], Elementwise(Type::Decimal));
    add("floor", Math, Type::Decimal, vec![], Elementwise(Type::Integer));
    add("ln", Math, Type::Decimal, vec![], Elementwise(Type::Decimal));
    add("log", Math, Type::Decimal, vec![required("base", Type::Decimal)], Elementwise(Type::Decimal));
    add(
        "power",
        Math,
        Type::Decimal,
        vec![required("exponent", Type::Choice(vec![Type::Integer, Type::Decimal]))],
        Elementwise(Type::Decimal),
    );
    add("round", Math, Type::Decimal, vec![optional("precision", Type::Integer)], Elementwise(Type::Decimal));
    add("sqrt", Math, Type::Decimal, vec![], Elementwise(Type::Decimal));
    add("truncate", Math, Type::Decimal, vec![], Elementwise(Type::Integer));

    // Utility
    add(
        "trace",
        Utility,
        t(),
        vec![required("name", string()), optional("projection", projection(t()))],
        Computed(returns_t),
    );
    add("now", Utility, t(), vec![], Type::single(Type::DateTime).into());
    add("timeOfDay", Utility, t(), vec![], Type::single(Type::Time).into());
    add("today", Utility, t(), vec![], Type::single(Type::Date).into());

    // Aggregates
    add(
        "aggregate",
        Aggregate,
        t(),
        vec![required("aggregator", projection(t())), optional("init", Type::generic(R))],
        Computed(returns_r),
    );

    // FHIR extensions
    add("extension", FhirExtension, t(), vec![required("url", string())], Type::fhir(["Extension"]).into());
    add("hasValue", FhirExtension, t(), vec![], single_boolean());
    add(
        "getValue",
        FhirExtension,
        t(),
        vec![],
        Elementwise(Type::Choice(PrimitiveKind::ALL.into_iter().map(Type::Primitive).collect())),
    );

    // SDC extensions
    add("ordinal", SdcExtension, t(), vec![], Elementwise(Type::Decimal));
    for name in ["sum", "min", "max", "avg"] {
        add(
            name,
            SdcExtension,
            Type::Choice(vec![Type::Decimal, Type::Integer, Type::Quantity]),
            vec![],
            Computed(returns_single_input),
        );
    }
}

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

//! Type lattice for structured FHIRPath expressions

use serde::{Deserialize, Serialize};
use std::fmt;

/// Generic type parameter, one of the letters `A` through `Z`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "char", into = "char")]
pub struct GenericLetter(char);

impl GenericLetter {
    /// Left-hand type of a union
    pub const A: Self = Self('A');
    /// Right-hand type of a union
    pub const B: Self = Self('B');
    /// Condition of `iif`
    pub const C: Self = Self('C');
    /// Else branch of `iif`
    pub const F: Self = Self('F');
    /// Input of `iif`
    pub const I: Self = Self('I');
    /// Projection result
    pub const R: Self = Self('R');
    /// Element type of the input collection
    pub const T: Self = Self('T');
    /// Type named by a type literal
    pub const X: Self = Self('X');

    /// Create a generic letter, rejecting anything outside `A..=Z`
    pub fn new(letter: char) -> Option<Self> {
        letter.is_ascii_uppercase().then_some(Self(letter))
    }

    /// The letter itself
    pub fn as_char(self) -> char {
        self.0
    }
}

impl TryFrom<char> for GenericLetter {
    type Error = String;

    fn try_from(value: char) -> Result<Self, Self::Error> {
        Self::new(value).ok_or_else(|| format!("'{value}' is not a generic letter (A-Z)"))
    }
}

impl From<GenericLetter> for char {
    fn from(value: GenericLetter) -> Self {
        value.0
    }
}

impl fmt::Display for GenericLetter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// FHIR primitive data types
///
/// Every primitive is a subtype of one System type, see
/// [`PrimitiveKind::system_type`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum PrimitiveKind {
    Code,
    Boolean,
    String,
    Uri,
    Date,
    DateTime,
    Decimal,
    Markdown,
    Canonical,
    Time,
    Id,
    Integer,
    PositiveInteger,
    UnsignedInteger,
    Instant,
    Uuid,
    Url,
    Oid,
    Xhtml,
    Base64Binary,
}

impl PrimitiveKind {
    /// All primitive kinds in declaration order
    pub const ALL: [PrimitiveKind; 20] = [
        PrimitiveKind::Code,
        PrimitiveKind::Boolean,
        PrimitiveKind::String,
        PrimitiveKind::Uri,
        PrimitiveKind::Date,
        PrimitiveKind::DateTime,
        PrimitiveKind::Decimal,
        PrimitiveKind::Markdown,
        PrimitiveKind::Canonical,
        PrimitiveKind::Time,
        PrimitiveKind::Id,
        PrimitiveKind::Integer,
        PrimitiveKind::PositiveInteger,
        PrimitiveKind::UnsignedInteger,
        PrimitiveKind::Instant,
        PrimitiveKind::Uuid,
        PrimitiveKind::Url,
        PrimitiveKind::Oid,
        PrimitiveKind::Xhtml,
        PrimitiveKind::Base64Binary,
    ];

    /// Name of the primitive in FHIR structure definitions
    pub fn fhir_name(self) -> &'static str {
        match self {
            PrimitiveKind::Code => "code",
            PrimitiveKind::Boolean => "boolean",
            PrimitiveKind::String => "string",
            PrimitiveKind::Uri => "uri",
            PrimitiveKind::Date => "date",
            PrimitiveKind::DateTime => "dateTime",
            PrimitiveKind::Decimal => "decimal",
            PrimitiveKind::Markdown => "markdown",
            PrimitiveKind::Canonical => "canonical",
            PrimitiveKind::Time => "time",
            PrimitiveKind::Id => "id",
            PrimitiveKind::Integer => "integer",
            PrimitiveKind::PositiveInteger => "positiveInteger",
            PrimitiveKind::UnsignedInteger => "unsignedInteger",
            PrimitiveKind::Instant => "instant",
            PrimitiveKind::Uuid => "uuid",
            PrimitiveKind::Url => "url",
            PrimitiveKind::Oid => "oid",
            PrimitiveKind::Xhtml => "xhtml",
            PrimitiveKind::Base64Binary => "base64Binary",
        }
    }

    /// Look up a primitive by its FHIR name
    pub fn from_fhir_name(name: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|kind| kind.fhir_name() == name)
    }

    /// The System type this primitive specializes
    pub fn system_type(self) -> Type {
        match self {
            PrimitiveKind::Boolean => Type::Boolean,
            PrimitiveKind::Date => Type::Date,
            PrimitiveKind::DateTime | PrimitiveKind::Instant => Type::DateTime,
            PrimitiveKind::Time => Type::Time,
            PrimitiveKind::Decimal => Type::Decimal,
            PrimitiveKind::Integer
            | PrimitiveKind::PositiveInteger
            | PrimitiveKind::UnsignedInteger => Type::Integer,
            PrimitiveKind::Code
            | PrimitiveKind::String
            | PrimitiveKind::Uri
            | PrimitiveKind::Markdown
            | PrimitiveKind::Canonical
            | PrimitiveKind::Id
            | PrimitiveKind::Uuid
            | PrimitiveKind::Url
            | PrimitiveKind::Oid
            | PrimitiveKind::Xhtml
            | PrimitiveKind::Base64Binary => Type::String,
        }
    }
}

/// Static type of an expression or expression fragment
///
/// Types without a [`Type::Single`] wrapper describe FHIRPath collections.
/// [`Type::Invalid`] is the only error channel of type resolution and is
/// absorbing: once produced it travels unchanged to the end of the fold.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(tag = "name", content = "of")]
pub enum Type {
    Integer,
    Decimal,
    String,
    Boolean,
    Date,
    DateTime,
    Time,
    Quantity,
    /// Absent value, compatible with every expectation
    Null,
    /// Resolution failure carrying a diagnostic message
    Invalid(String),
    /// The type itself used as a value (right operand of `is`/`as`)
    TypeOf(Box<Type>),
    /// Exactly one value of the inner type
    Single(Box<Type>),
    /// Polymorphic value, any option may be present
    Choice(Vec<Type>),
    /// Placeholder resolved per call site
    Generic(GenericLetter),
    /// Expression argument evaluated against `context` producing `returns`
    Lambda {
        context: Box<Type>,
        returns: Box<Type>,
    },
    /// FHIR primitive data type
    Primitive(PrimitiveKind),
    /// Complex FHIR type addressed by its schema path
    Fhir(Vec<String>),
}

impl Type {
    /// The System types a type literal can name
    pub const SYSTEM_TYPES: [Type; 8] = [
        Type::Integer,
        Type::Decimal,
        Type::String,
        Type::Boolean,
        Type::Date,
        Type::DateTime,
        Type::Time,
        Type::Quantity,
    ];

    pub fn invalid(message: impl Into<String>) -> Self {
        Type::Invalid(message.into())
    }

    /// Wrap in [`Type::Single`]; already single types are returned unchanged
    pub fn single(inner: Type) -> Self {
        match inner {
            Type::Single(_) | Type::Invalid(_) => inner,
            other => Type::Single(Box::new(other)),
        }
    }

    pub fn type_of(inner: Type) -> Self {
        Type::TypeOf(Box::new(inner))
    }

    pub fn generic(letter: GenericLetter) -> Self {
        Type::Generic(letter)
    }

    pub fn lambda(returns: Type, context: Type) -> Self {
        Type::Lambda {
            context: Box::new(context),
            returns: Box::new(returns),
        }
    }

    /// Complex FHIR type from a schema path such as `["Patient", "contact"]`
    pub fn fhir<I, S>(path: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Type::Fhir(path.into_iter().map(Into::into).collect())
    }

    /// Flatten nested choices, drop duplicates and collapse a single option
    pub fn normalize_choice(options: Vec<Type>) -> Self {
        let mut flat = Vec::with_capacity(options.len());
        let mut queue: std::collections::VecDeque<Type> = options.into();
        while let Some(option) = queue.pop_front() {
            match option {
                Type::Choice(nested) => queue.extend(nested),
                other => flat.push(other),
            }
        }

        let mut unique: Vec<Type> = Vec::with_capacity(flat.len());
        for option in flat {
            if !unique.iter().any(|existing| existing.equivalent(&option)) {
                unique.push(option);
            }
        }

        if unique.len() == 1 {
            unique.remove(0)
        } else {
            Type::Choice(unique)
        }
    }

    /// Numeric promotion of two types, `None` when they do not unify
    pub fn promote(a: &Type, b: &Type) -> Option<Type> {
        let (left, right) = (a.unwrap_single().system(), b.unwrap_single().system());
        if left == right {
            return Some(a.clone());
        }
        match (&left, &right) {
            (Type::Integer, Type::Decimal) | (Type::Decimal, Type::Integer) => Some(Type::Decimal),
            (Type::Integer | Type::Decimal, Type::Quantity)
            | (Type::Quantity, Type::Integer | Type::Decimal) => Some(Type::Quantity),
            _ => None,
        }
    }

    pub fn is_invalid(&self) -> bool {
        matches!(self, Type::Invalid(_))
    }

    /// Diagnostic message of an invalid type
    pub fn invalid_message(&self) -> Option<&str> {
        match self {
            Type::Invalid(message) => Some(message),
            _ => None,
        }
    }

    pub fn is_single(&self) -> bool {
        matches!(self, Type::Single(_))
    }

    pub fn is_null(&self) -> bool {
        matches!(self, Type::Null)
    }

    /// Whether indexing is meaningful, i.e. the type describes a collection
    pub fn is_collection(&self) -> bool {
        !matches!(
            self,
            Type::Single(_)
                | Type::Invalid(_)
                | Type::TypeOf(_)
                | Type::Lambda { .. }
                | Type::Null
                | Type::Generic(_)
        )
    }

    /// Strip one [`Type::Single`] wrapper
    pub fn unwrap_single(&self) -> &Type {
        match self {
            Type::Single(inner) => inner,
            other => other,
        }
    }

    /// Owned variant of [`Type::unwrap_single`]
    pub fn into_collection(self) -> Type {
        match self {
            Type::Single(inner) => *inner,
            other => other,
        }
    }

    /// The System type behind a primitive, or the type itself
    pub fn system(&self) -> Type {
        match self {
            Type::Primitive(kind) => kind.system_type(),
            Type::Fhir(path) if is_quantity_path(path) => Type::Quantity,
            other => other.clone(),
        }
    }

    /// Subtype relation of the lattice
    ///
    /// Primitives specialize their System type and `Quantity` is
    /// interchangeable with the complex FHIR `Quantity`.
    pub fn is_subtype_of(&self, expected: &Type) -> bool {
        if self == expected {
            return true;
        }
        match (self, expected) {
            (Type::Primitive(kind), _) => &kind.system_type() == expected,
            (Type::Quantity, Type::Fhir(path)) | (Type::Fhir(path), Type::Quantity) => {
                is_quantity_path(path)
            }
            _ => false,
        }
    }

    /// Loose structural equality used for deduplication and generic checks
    ///
    /// Generics match anything, a choice matches when any option does and
    /// subtypes count as equal in either direction.
    pub fn equivalent(&self, other: &Type) -> bool {
        match (self, other) {
            (Type::Generic(_), _) | (_, Type::Generic(_)) => true,
            (Type::Choice(options), single) | (single, Type::Choice(options)) => {
                options.iter().any(|option| option.equivalent(single))
            }
            (Type::Single(a), Type::Single(b)) | (Type::TypeOf(a), Type::TypeOf(b)) => {
                a.equivalent(b)
            }
            (
                Type::Lambda {
                    context: c1,
                    returns: r1,
                },
                Type::Lambda {
                    context: c2,
                    returns: r2,
                },
            ) => c1.equivalent(c2) && r1.equivalent(r2),
            (a, b) => a.is_subtype_of(b) || b.is_subtype_of(a),
        }
    }
}

fn is_quantity_path(path: &[String]) -> bool {
    matches!(path, [name] if name == "Quantity")
}

impl fmt::Display for Type {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Type::Integer => write!(f, "Integer"),
            Type::Decimal => write!(f, "Decimal"),
            Type::String => write!(f, "String"),
            Type::Boolean => write!(f, "Boolean"),
            Type::Date => write!(f, "Date"),
            Type::DateTime => write!(f, "DateTime"),
            Type::Time => write!(f, "Time"),
            Type::Quantity => write!(f, "Quantity"),
            Type::Null => write!(f, "Null"),
            Type::Invalid(message) if message.is_empty() => write!(f, "Invalid"),
            Type::Invalid(message) => write!(f, "Invalid ({message})"),
            Type::TypeOf(inner) => write!(f, "Type<{inner}>"),
            Type::Single(inner) => write!(f, "Single<{inner}>"),
            Type::Choice(options) => {
                for (i, option) in options.iter().enumerate() {
                    if i > 0 {
                        write!(f, " | ")?;
                    }
                    write!(f, "{option}")?;
                }
                Ok(())
            }
            Type::Generic(letter) => write!(f, "{letter}"),
            Type::Lambda { context, returns } => write!(f, "Lambda<{context} => {returns}>"),
            Type::Primitive(kind) => write!(f, "Primitive<{}>", kind.fhir_name()),
            Type::Fhir(path) => {
                let mut segments = path.iter();
                if let Some(root) = segments.next() {
                    write!(f, "{root}")?;
                }
                for segment in segments {
                    write!(f, "[\"{segment}\"]")?;
                }
                Ok(())
            }
        }
    }
}

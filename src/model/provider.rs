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

//! Schema provider abstraction
//!
//! The engine never fetches type definitions on its own. Hosts hand it a
//! [`SchemaProvider`], usually a [`SchemaRegistry`] loaded from FHIR schema
//! JSON, and field lookups go through that table.

use super::types::{PrimitiveKind, Type};
use crate::error::Result;
use indexmap::IndexMap;
use rustc_hash::FxHashSet;
use serde::{Deserialize, Serialize};

/// Type of a schema field as reported by a provider
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FieldType {
    /// Element type, never wrapped in [`Type::Single`]
    pub ty: Type,
    /// Whether the field may repeat
    pub array: bool,
}

impl FieldType {
    pub fn scalar(ty: Type) -> Self {
        Self { ty, array: false }
    }

    pub fn array(ty: Type) -> Self {
        Self { ty, array: true }
    }
}

/// Read-only lookup of FHIR type structure
///
/// Paths address a type (`["Patient"]`) or a backbone element inside one
/// (`["Observation", "component"]`).
pub trait SchemaProvider {
    /// All fields visible on the type at `path`, in schema order
    fn fields(&self, path: &[String]) -> IndexMap<String, FieldType>;

    /// A single field of the type at `path`
    fn field(&self, path: &[String], name: &str) -> Option<FieldType> {
        self.fields(path).shift_remove(name)
    }

    /// Whether a type with this name is known
    fn has_type(&self, name: &str) -> bool;
}

impl<P: SchemaProvider + ?Sized> SchemaProvider for &P {
    fn fields(&self, path: &[String]) -> IndexMap<String, FieldType> {
        (**self).fields(path)
    }

    fn field(&self, path: &[String], name: &str) -> Option<FieldType> {
        (**self).field(path, name)
    }

    fn has_type(&self, name: &str) -> bool {
        (**self).has_type(name)
    }
}

impl<P: SchemaProvider + ?Sized> SchemaProvider for std::sync::Arc<P> {
    fn fields(&self, path: &[String]) -> IndexMap<String, FieldType> {
        (**self).fields(path)
    }

    fn field(&self, path: &[String], name: &str) -> Option<FieldType> {
        (**self).field(path, name)
    }

    fn has_type(&self, name: &str) -> bool {
        (**self).has_type(name)
    }
}

/// A FHIR schema type definition
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FhirSchema {
    /// Name of the parent type whose elements are inherited
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub base: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub kind: Option<String>,
    #[serde(default)]
    pub elements: IndexMap<String, FhirElement>,
}

/// One element of a FHIR schema
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FhirElement {
    #[serde(rename = "type", default, skip_serializing_if = "Option::is_none")]
    pub type_name: Option<String>,
    #[serde(default)]
    pub array: bool,
    /// Names of the typed variants of a `[x]` element
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub choices: Vec<String>,
    /// Set on typed variants, names the owning `[x]` element
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub choice_of: Option<String>,
    /// Path of a backbone element this element reuses
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub element_reference: Vec<String>,
    /// Inline backbone elements
    #[serde(default, skip_serializing_if = "IndexMap::is_empty")]
    pub elements: IndexMap<String, FhirElement>,
}

#[derive(Clone, Copy)]
enum SchemaNode<'a> {
    Schema(&'a FhirSchema),
    Element(&'a FhirElement),
}

/// Reference chains longer than this are treated as cycles
const MAX_REFERENCE_DEPTH: usize = 16;

/// Table of FHIR schemas keyed by type name
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SchemaRegistry {
    schemas: IndexMap<String, FhirSchema>,
}

impl SchemaRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Load a registry from a JSON object mapping type names to schemas
    pub fn from_json(json: &str) -> Result<Self> {
        Ok(serde_json::from_str(json)?)
    }

    pub fn from_value(value: serde_json::Value) -> Result<Self> {
        Ok(serde_json::from_value(value)?)
    }

    /// Add or replace a type definition
    pub fn insert(&mut self, name: impl Into<String>, schema: FhirSchema) {
        self.schemas.insert(name.into(), schema);
    }

    pub fn get(&self, name: &str) -> Option<&FhirSchema> {
        self.schemas.get(name)
    }

    pub fn len(&self) -> usize {
        self.schemas.len()
    }

    pub fn is_empty(&self) -> bool {
        self.schemas.is_empty()
    }

    /// Names of all registered types
    pub fn type_names(&self) -> impl Iterator<Item = &str> {
        self.schemas.keys().map(String::as_str)
    }

    fn resolve_path(&self, path: &[String], depth: usize) -> Option<SchemaNode<'_>> {
        let (root, fields) = path.split_first()?;
        let mut node = SchemaNode::Schema(self.schemas.get(root)?);
        for field in fields {
            let elements = self.visible_elements(node, depth + 1);
            node = SchemaNode::Element(elements.get(field.as_str()).copied()?);
        }
        Some(node)
    }

    /// Own elements of a node plus those inherited through its type,
    /// element reference and base chain. Own elements win on name clashes.
    fn visible_elements<'a>(
        &'a self,
        node: SchemaNode<'a>,
        depth: usize,
    ) -> IndexMap<&'a str, &'a FhirElement> {
        let mut result: IndexMap<&'a str, &'a FhirElement> = IndexMap::new();
        if depth > MAX_REFERENCE_DEPTH {
            log::debug!("schema reference chain exceeds {MAX_REFERENCE_DEPTH} levels");
            return result;
        }

        let own = match node {
            SchemaNode::Schema(schema) => &schema.elements,
            SchemaNode::Element(element) => &element.elements,
        };
        for (name, element) in own {
            result.entry(name.as_str()).or_insert(element);
        }

        let mut base = match node {
            SchemaNode::Schema(schema) => schema.base.as_deref(),
            SchemaNode::Element(element) if !element.element_reference.is_empty() => {
                if let Some(target) = self.resolve_path(&element.element_reference, depth + 1) {
                    for (name, element) in self.visible_elements(target, depth + 1) {
                        result.entry(name).or_insert(element);
                    }
                }
                None
            }
            SchemaNode::Element(element) if element.elements.is_empty() => {
                element.type_name.as_deref()
            }
            SchemaNode::Element(_) => None,
        };

        let mut visited: FxHashSet<&str> = FxHashSet::default();
        while let Some(name) = base {
            if !visited.insert(name) {
                break;
            }
            let Some(schema) = self.schemas.get(name) else {
                log::trace!("schema for base type '{name}' is not registered");
                break;
            };
            for (field, element) in &schema.elements {
                result.entry(field.as_str()).or_insert(element);
            }
            base = schema.base.as_deref();
        }

        result
    }

    fn element_type(
        &self,
        name: &str,
        element: &FhirElement,
        siblings: &IndexMap<&str, &FhirElement>,
        prefix: &[String],
    ) -> Type {
        if let Some(kind) = element.type_name.as_deref().and_then(PrimitiveKind::from_fhir_name) {
            return Type::Primitive(kind);
        }
        if !element.choices.is_empty() {
            let options = element
                .choices
                .iter()
                .filter_map(|choice| {
                    siblings
                        .get(choice.as_str())
                        .filter(|variant| variant.choices.is_empty())
                        .map(|variant| self.element_type(choice, variant, siblings, prefix))
                })
                .collect();
            return Type::normalize_choice(options);
        }
        if !element.element_reference.is_empty() {
            return Type::Fhir(element.element_reference.clone());
        }
        match element.type_name.as_deref() {
            Some("Quantity") if element.elements.is_empty() => Type::Quantity,
            Some(type_name) if element.elements.is_empty() => Type::fhir([type_name]),
            _ => {
                let mut path = prefix.to_vec();
                path.push(name.to_string());
                Type::Fhir(path)
            }
        }
    }
}

impl SchemaProvider for SchemaRegistry {
    fn fields(&self, path: &[String]) -> IndexMap<String, FieldType> {
        let Some(node) = self.resolve_path(path, 0) else {
            log::trace!("no schema for path {path:?}");
            return IndexMap::new();
        };
        let elements = self.visible_elements(node, 0);
        elements
            .iter()
            .filter(|(_, element)| element.choice_of.is_none())
            .map(|(name, element)| {
                let ty = self.element_type(name, element, &elements, path);
                (
                    name.to_string(),
                    FieldType {
                        ty,
                        array: element.array,
                    },
                )
            })
            .collect()
    }

    fn has_type(&self, name: &str) -> bool {
        self.schemas.contains_key(name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use serde_json::json;

    fn path(segments: &[&str]) -> Vec<String> {
        segments.iter().map(|s| s.to_string()).collect()
    }

    fn registry() -> SchemaRegistry {
        SchemaRegistry::from_value(json!({
            "Element": {
                "elements": { "id": { "type": "string" } }
            },
            "Resource": {
                "elements": { "id": { "type": "id" } }
            },
            "Group": {
                "base": "Resource",
                "elements": {
                    "active": { "type": "boolean" },
                    "member": {
                        "array": true,
                        "elements": {
                            "entity": { "type": "Reference" },
                            "period": { "type": "Period" },
                            "member": { "array": true, "elementReference": ["Group", "member"] }
                        }
                    },
                    "value": { "choices": ["valueString", "valueQuantity"] },
                    "valueString": { "type": "string", "choiceOf": "value" },
                    "valueQuantity": { "type": "Quantity", "choiceOf": "value" }
                }
            },
            "Reference": {
                "base": "Element",
                "elements": { "reference": { "type": "string" } }
            }
        }))
        .unwrap()
    }

    #[test]
    fn own_and_inherited_fields() {
        let fields = registry().fields(&path(&["Group"]));
        let names: Vec<_> = fields.keys().cloned().collect();
        assert_eq!(names, vec!["active", "member", "value", "id"]);
        assert_eq!(fields["id"], FieldType::scalar(Type::Primitive(PrimitiveKind::Id)));
    }

    #[test]
    fn backbone_and_choice_types() {
        let registry = registry();
        assert_eq!(
            registry.field(&path(&["Group"]), "member"),
            Some(FieldType::array(Type::fhir(["Group", "member"])))
        );
        assert_eq!(
            registry.field(&path(&["Group"]), "value"),
            Some(FieldType::scalar(Type::Choice(vec![
                Type::Primitive(PrimitiveKind::String),
                Type::Quantity,
            ])))
        );
        assert_eq!(registry.field(&path(&["Group"]), "valueString"), None);
    }

    #[test]
    fn navigates_nested_paths_and_references() {
        let registry = registry();
        assert_eq!(
            registry.field(&path(&["Group", "member"]), "entity"),
            Some(FieldType::scalar(Type::fhir(["Reference"])))
        );
        assert_eq!(
            registry.field(&path(&["Group", "member"]), "member"),
            Some(FieldType::array(Type::fhir(["Group", "member"])))
        );
        assert!(registry
            .fields(&path(&["Group", "member", "member"]))
            .contains_key("entity"));
        assert!(registry
            .fields(&path(&["Group", "member", "entity"]))
            .contains_key("id"));
    }

    #[test]
    fn unknown_paths_are_empty() {
        let registry = registry();
        assert!(registry.fields(&path(&["Nope"])).is_empty());
        assert!(registry.fields(&path(&[])).is_empty());
        assert!(registry.has_type("Group"));
        assert!(!registry.has_type("Nope"));
    }
}

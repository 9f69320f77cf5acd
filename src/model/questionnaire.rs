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

//! Questionnaire item registry for `answer` tokens
//!
//! Answers are addressed by the `linkId` of a questionnaire item. The
//! registry indexes every answerable item of the questionnaires supplied as
//! external bindings and records the type an answer expression produces.

use super::types::{PrimitiveKind, Type};
use crate::ast::ExternalBinding;
use indexmap::IndexMap;
use serde::Deserialize;

const REFERENCE_RESOURCE_URL: &str =
    "http://hl7.org/fhir/StructureDefinition/questionnaire-referenceResource";

/// Answerable questionnaire item
#[derive(Debug, Clone, PartialEq)]
pub struct QuestionnaireItem {
    pub link_id: String,
    pub text: Option<String>,
    /// FHIR item type code (`boolean`, `choice`, `quantity`, ...)
    pub item_type: String,
    /// Type of the compiled answer expression
    pub ty: Type,
}

impl QuestionnaireItem {
    /// Choice items compile to their ordinal value
    pub fn is_choice(&self) -> bool {
        matches!(self.item_type.as_str(), "choice" | "open-choice")
    }

    pub fn is_quantity(&self) -> bool {
        self.item_type == "quantity"
    }
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
struct RawItem {
    link_id: Option<String>,
    #[serde(rename = "type")]
    item_type: Option<String>,
    text: Option<String>,
    #[serde(default)]
    repeats: bool,
    #[serde(default)]
    item: Vec<RawItem>,
    #[serde(default)]
    extension: Vec<RawExtension>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
struct RawExtension {
    url: String,
    value_code: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
struct RawQuestionnaire {
    #[serde(default)]
    item: Vec<RawItem>,
}

/// Items indexed by link id, first declaration wins
#[derive(Debug, Clone, Default, PartialEq)]
pub struct QuestionnaireItems {
    items: IndexMap<String, QuestionnaireItem>,
}

impl QuestionnaireItems {
    pub fn new() -> Self {
        Self::default()
    }

    /// Index the items of a Questionnaire resource
    pub fn from_questionnaire(questionnaire: &serde_json::Value) -> Self {
        let mut registry = Self::new();
        registry.add_questionnaire(questionnaire);
        registry
    }

    /// Index every external binding typed as a Questionnaire
    pub fn from_externals(externals: &[ExternalBinding]) -> Self {
        let mut registry = Self::new();
        for binding in externals {
            if matches!(binding.ty.unwrap_single(), Type::Fhir(path) if path.len() == 1 && path[0] == "Questionnaire")
            {
                registry.add_questionnaire(&binding.value);
            }
        }
        registry
    }

    pub fn add_questionnaire(&mut self, questionnaire: &serde_json::Value) {
        match RawQuestionnaire::deserialize(questionnaire) {
            Ok(raw) => {
                for item in &raw.item {
                    self.walk(item, true);
                }
            }
            Err(err) => log::warn!("ignoring malformed questionnaire: {err}"),
        }
    }

    fn walk(&mut self, item: &RawItem, parent_single: bool) {
        let single = parent_single && !item.repeats;
        if let (Some(link_id), Some(item_type)) = (&item.link_id, &item.item_type) {
            if !self.items.contains_key(link_id) {
                if let Some(ty) = answer_type(item_type, &item.extension) {
                    let ty = if single { Type::single(ty) } else { ty };
                    self.items.insert(
                        link_id.clone(),
                        QuestionnaireItem {
                            link_id: link_id.clone(),
                            text: item.text.clone(),
                            item_type: item_type.clone(),
                            ty,
                        },
                    );
                }
            }
        }
        for child in &item.item {
            self.walk(child, single);
        }
    }

    pub fn get(&self, link_id: &str) -> Option<&QuestionnaireItem> {
        self.items.get(link_id)
    }

    pub fn iter(&self) -> impl Iterator<Item = &QuestionnaireItem> {
        self.items.values()
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }
}

fn answer_type(item_type: &str, extensions: &[RawExtension]) -> Option<Type> {
    let ty = match item_type {
        "boolean" => Type::Primitive(PrimitiveKind::Boolean),
        "decimal" | "choice" | "open-choice" | "quantity" => Type::Primitive(PrimitiveKind::Decimal),
        "integer" => Type::Primitive(PrimitiveKind::Integer),
        "date" => Type::Primitive(PrimitiveKind::Date),
        "dateTime" => Type::Primitive(PrimitiveKind::DateTime),
        "time" => Type::Primitive(PrimitiveKind::Time),
        "string" | "text" => Type::Primitive(PrimitiveKind::String),
        "url" => Type::Primitive(PrimitiveKind::Uri),
        "attachment" => Type::fhir(["Attachment"]),
        "reference" => extensions
            .iter()
            .find(|extension| extension.url == REFERENCE_RESOURCE_URL)
            .and_then(|extension| extension.value_code.as_deref())
            .map_or_else(|| Type::fhir(["Reference"]), |resource| Type::fhir([resource])),
        _ => return None,
    };
    Some(ty)
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use serde_json::json;

    fn questionnaire() -> serde_json::Value {
        json!({
            "resourceType": "Questionnaire",
            "item": [
                {"linkId": "age", "type": "integer", "text": "Age"},
                {"linkId": "pain", "type": "choice"},
                {
                    "linkId": "meds",
                    "type": "group",
                    "repeats": true,
                    "item": [
                        {"linkId": "dose", "type": "quantity"},
                        {"linkId": "note", "type": "display"}
                    ]
                },
                {
                    "linkId": "gp",
                    "type": "reference",
                    "extension": [{"url": REFERENCE_RESOURCE_URL, "valueCode": "Practitioner"}]
                }
            ]
        })
    }

    #[test]
    fn indexes_answerable_items() {
        let items = QuestionnaireItems::from_questionnaire(&questionnaire());
        let link_ids: Vec<_> = items.iter().map(|item| item.link_id.as_str()).collect();
        assert_eq!(link_ids, vec!["age", "pain", "dose", "gp"]);
        assert_eq!(
            items.get("age").map(|item| item.ty.clone()),
            Some(Type::single(Type::Primitive(PrimitiveKind::Integer)))
        );
        assert!(items.get("pain").is_some_and(QuestionnaireItem::is_choice));
        assert_eq!(items.get("age").and_then(|item| item.text.as_deref()), Some("Age"));
    }

    #[test]
    fn repeating_groups_make_collections() {
        let items = QuestionnaireItems::from_questionnaire(&questionnaire());
        assert_eq!(
            items.get("dose").map(|item| item.ty.clone()),
            Some(Type::Primitive(PrimitiveKind::Decimal))
        );
        assert_eq!(
            items.get("gp").map(|item| item.ty.clone()),
            Some(Type::single(Type::fhir(["Practitioner"])))
        );
    }

    #[test]
    fn externals_and_malformed_input() {
        let externals = vec![
            ExternalBinding::new("q", "questionnaire", Type::single(Type::fhir(["Questionnaire"])))
                .with_value(questionnaire()),
            ExternalBinding::new("p", "patient", Type::fhir(["Patient"])),
        ];
        assert_eq!(QuestionnaireItems::from_externals(&externals).len(), 4);
        assert!(QuestionnaireItems::from_questionnaire(&json!({"item": "nope"})).is_empty());
    }
}

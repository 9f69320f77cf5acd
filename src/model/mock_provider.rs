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

//! Mock schema provider for testing

use super::provider::{FieldType, SchemaProvider, SchemaRegistry};
use indexmap::IndexMap;
use serde_json::json;

/// Schema provider backed by a small built-in subset of FHIR R4
#[derive(Debug, Clone)]
pub struct MockSchemaProvider {
    registry: SchemaRegistry,
}

impl MockSchemaProvider {
    /// Create a mock provider with the basic FHIR types
    pub fn new() -> Self {
        Self {
            registry: basic_registry(),
        }
    }

    /// Create a mock provider without any types
    pub fn empty() -> Self {
        Self {
            registry: SchemaRegistry::new(),
        }
    }

    /// The underlying registry
    pub fn registry(&self) -> &SchemaRegistry {
        &self.registry
    }
}

impl Default for MockSchemaProvider {
    fn default() -> Self {
        Self::new()
    }
}

impl SchemaProvider for MockSchemaProvider {
    fn fields(&self, path: &[String]) -> IndexMap<String, FieldType> {
        self.registry.fields(path)
    }

    fn has_type(&self, name: &str) -> bool {
        self.registry.has_type(name)
    }
}

fn basic_registry() -> SchemaRegistry {
    let schemas = json!({
        "Element": {
            "kind": "complex-type",
            "elements": {
                "id": { "type": "string" },
                "extension": { "type": "Extension", "array": true }
            }
        },
        "Extension": {
            "kind": "complex-type",
            "base": "Element",
            "elements": {
                "url": { "type": "uri" },
                "value": { "choices": ["valueString", "valueBoolean", "valueCode", "valueInteger"] },
                "valueString": { "type": "string", "choiceOf": "value" },
                "valueBoolean": { "type": "boolean", "choiceOf": "value" },
                "valueCode": { "type": "code", "choiceOf": "value" },
                "valueInteger": { "type": "integer", "choiceOf": "value" }
            }
        },
        "Resource": {
            "kind": "resource",
            "elements": {
                "id": { "type": "id" },
                "meta": { "type": "Meta" },
                "language": { "type": "code" }
            }
        },
        "DomainResource": {
            "kind": "resource",
            "base": "Resource",
            "elements": {
                "extension": { "type": "Extension", "array": true }
            }
        },
        "Meta": {
            "kind": "complex-type",
            "base": "Element",
            "elements": {
                "versionId": { "type": "id" },
                "lastUpdated": { "type": "instant" },
                "profile": { "type": "canonical", "array": true }
            }
        },
        "Coding": {
            "kind": "complex-type",
            "base": "Element",
            "elements": {
                "system": { "type": "uri" },
                "version": { "type": "string" },
                "code": { "type": "code" },
                "display": { "type": "string" }
            }
        },
        "CodeableConcept": {
            "kind": "complex-type",
            "base": "Element",
            "elements": {
                "coding": { "type": "Coding", "array": true },
                "text": { "type": "string" }
            }
        },
        "Quantity": {
            "kind": "complex-type",
            "base": "Element",
            "elements": {
                "value": { "type": "decimal" },
                "comparator": { "type": "code" },
                "unit": { "type": "string" },
                "system": { "type": "uri" },
                "code": { "type": "code" }
            }
        },
        "Period": {
            "kind": "complex-type",
            "base": "Element",
            "elements": {
                "start": { "type": "dateTime" },
                "end": { "type": "dateTime" }
            }
        },
        "Reference": {
            "kind": "complex-type",
            "base": "Element",
            "elements": {
                "reference": { "type": "string" },
                "type": { "type": "uri" },
                "display": { "type": "string" }
            }
        },
        "Attachment": {
            "kind": "complex-type",
            "base": "Element",
            "elements": {
                "contentType": { "type": "code" },
                "url": { "type": "url" },
                "title": { "type": "string" }
            }
        },
        "HumanName": {
            "kind": "complex-type",
            "base": "Element",
            "elements": {
                "use": { "type": "code" },
                "text": { "type": "string" },
                "family": { "type": "string" },
                "given": { "type": "string", "array": true },
                "prefix": { "type": "string", "array": true },
                "period": { "type": "Period" }
            }
        },
        "Patient": {
            "kind": "resource",
            "base": "DomainResource",
            "elements": {
                "active": { "type": "boolean" },
                "name": { "type": "HumanName", "array": true },
                "gender": { "type": "code" },
                "birthDate": { "type": "date" },
                "deceased": { "choices": ["deceasedBoolean", "deceasedDateTime"] },
                "deceasedBoolean": { "type": "boolean", "choiceOf": "deceased" },
                "deceasedDateTime": { "type": "dateTime", "choiceOf": "deceased" },
                "multipleBirth": { "choices": ["multipleBirthBoolean", "multipleBirthInteger"] },
                "multipleBirthBoolean": { "type": "boolean", "choiceOf": "multipleBirth" },
                "multipleBirthInteger": { "type": "integer", "choiceOf": "multipleBirth" },
                "generalPractitioner": { "type": "Reference", "array": true },
                "contact": {
                    "array": true,
                    "elements": {
                        "relationship": { "type": "CodeableConcept", "array": true },
                        "name": { "type": "HumanName" },
                        "gender": { "type": "code" }
                    }
                }
            }
        },
        "Observation": {
            "kind": "resource",
            "base": "DomainResource",
            "elements": {
                "status": { "type": "code" },
                "category": { "type": "CodeableConcept", "array": true },
                "code": { "type": "CodeableConcept" },
                "subject": { "type": "Reference" },
                "effective": { "choices": ["effectiveDateTime", "effectivePeriod"] },
                "effectiveDateTime": { "type": "dateTime", "choiceOf": "effective" },
                "effectivePeriod": { "type": "Period", "choiceOf": "effective" },
                "value": {
                    "choices": ["valueQuantity", "valueCodeableConcept", "valueString", "valueBoolean", "valueInteger"]
                },
                "valueQuantity": { "type": "Quantity", "choiceOf": "value" },
                "valueCodeableConcept": { "type": "CodeableConcept", "choiceOf": "value" },
                "valueString": { "type": "string", "choiceOf": "value" },
                "valueBoolean": { "type": "boolean", "choiceOf": "value" },
                "valueInteger": { "type": "integer", "choiceOf": "value" },
                "component": {
                    "array": true,
                    "elements": {
                        "code": { "type": "CodeableConcept" },
                        "value": { "choices": ["valueQuantity", "valueString"] },
                        "valueQuantity": { "type": "Quantity", "choiceOf": "value" },
                        "valueString": { "type": "string", "choiceOf": "value" }
                    }
                }
            }
        },
        "Questionnaire": {
            "kind": "resource",
            "base": "DomainResource",
            "elements": {
                "url": { "type": "uri" },
                "title": { "type": "string" },
                "status": { "type": "code" },
                "item": {
                    "array": true,
                    "elements": {
                        "linkId": { "type": "string" },
                        "text": { "type": "string" },
                        "type": { "type": "code" },
                        "repeats": { "type": "boolean" },
                        "item": { "array": true, "elementReference": ["Questionnaire", "item"] }
                    }
                }
            }
        },
        "QuestionnaireResponse": {
            "kind": "resource",
            "base": "DomainResource",
            "elements": {
                "questionnaire": { "type": "canonical" },
                "status": { "type": "code" },
                "subject": { "type": "Reference" },
                "authored": { "type": "dateTime" },
                "item": {
                    "array": true,
                    "elements": {
                        "linkId": { "type": "string" },
                        "text": { "type": "string" },
                        "answer": {
                            "array": true,
                            "elements": {
                                "value": {
                                    "choices": [
                                        "valueBoolean", "valueDecimal", "valueInteger", "valueDate",
                                        "valueDateTime", "valueTime", "valueString", "valueUri",
                                        "valueAttachment", "valueCoding", "valueQuantity", "valueReference"
                                    ]
                                },
                                "valueBoolean": { "type": "boolean", "choiceOf": "value" },
                                "valueDecimal": { "type": "decimal", "choiceOf": "value" },
                                "valueInteger": { "type": "integer", "choiceOf": "value" },
                                "valueDate": { "type": "date", "choiceOf": "value" },
                                "valueDateTime": { "type": "dateTime", "choiceOf": "value" },
                                "valueTime": { "type": "time", "choiceOf": "value" },
                                "valueString": { "type": "string", "choiceOf": "value" },
                                "valueUri": { "type": "uri", "choiceOf": "value" },
                                "valueAttachment": { "type": "Attachment", "choiceOf": "value" },
                                "valueCoding": { "type": "Coding", "choiceOf": "value" },
                                "valueQuantity": { "type": "Quantity", "choiceOf": "value" },
                                "valueReference": { "type": "Reference", "choiceOf": "value" },
                                "item": { "array": true, "elementReference": ["QuestionnaireResponse", "item"] }
                            }
                        },
                        "item": { "array": true, "elementReference": ["QuestionnaireResponse", "item"] }
                    }
                }
            }
        }
    });

    match SchemaRegistry::from_value(schemas) {
        Ok(registry) => registry,
        Err(err) => {
            log::warn!("built-in mock schema failed to load: {err}");
            SchemaRegistry::new()
        }
    }
}

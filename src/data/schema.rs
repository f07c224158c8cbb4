use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use super::records::RecordKind;

/// Declarative description of what the loader accepts for each table.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct Schema {
    pub nodes: RecordSchema,
    pub nodes_tags: RecordSchema,
    pub ways: RecordSchema,
    pub ways_nodes: RecordSchema,
    pub ways_tags: RecordSchema,
}

#[derive(Serialize, Deserialize, Debug, Clone, Default, PartialEq)]
#[serde(transparent)]
pub struct RecordSchema {
    pub fields: BTreeMap<String, FieldRule>,
}

#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum FieldType {
    Integer,
    Float,
    String,
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct FieldRule {
    #[serde(rename = "type")]
    pub field_type: FieldType,
    #[serde(default)]
    pub required: bool,
    /// Whether an empty string is acceptable. Numeric fields never accept one.
    #[serde(default = "default_empty")]
    pub empty: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub regex: Option<String>,
}

fn default_empty() -> bool {
    true
}

impl FieldRule {
    pub fn required(field_type: FieldType) -> Self {
        FieldRule {
            field_type,
            required: true,
            empty: field_type == FieldType::String,
            regex: None,
        }
    }
}

impl RecordSchema {
    fn of(rules: &[(&str, FieldType)]) -> Self {
        RecordSchema {
            fields: rules
                .iter()
                .map(|(name, field_type)| (name.to_string(), FieldRule::required(*field_type)))
                .collect(),
        }
    }
}

impl Schema {
    pub fn for_kind(&self, kind: RecordKind) -> &RecordSchema {
        match kind {
            RecordKind::Node => &self.nodes,
            RecordKind::NodeTag => &self.nodes_tags,
            RecordKind::Way => &self.ways,
            RecordKind::WayNode => &self.ways_nodes,
            RecordKind::WayTag => &self.ways_tags,
        }
    }
}

impl Default for Schema {
    fn default() -> Self {
        use FieldType::{Float, Integer, String};

        let tags = RecordSchema::of(&[
            ("id", Integer),
            ("key", String),
            ("value", String),
            ("type", String),
        ]);
        Schema {
            nodes: RecordSchema::of(&[
                ("id", Integer),
                ("lat", Float),
                ("lon", Float),
                ("user", String),
                ("uid", Integer),
                ("version", String),
                ("changeset", Integer),
                ("timestamp", String),
            ]),
            nodes_tags: tags.clone(),
            ways: RecordSchema::of(&[
                ("id", Integer),
                ("user", String),
                ("uid", Integer),
                ("version", String),
                ("changeset", Integer),
                ("timestamp", String),
            ]),
            ways_nodes: RecordSchema::of(&[
                ("id", Integer),
                ("node_id", Integer),
                ("position", Integer),
            ]),
            ways_tags: tags,
        }
    }
}

use std::sync::LazyLock;

use regex::Regex;

use crate::data::osm::{Child, ElementKind, OsmElement};
use crate::data::records::{NodeRecord, ShapedElement, TagRecord, WayNodeRecord, WayRecord};
use crate::etl::normalize::{
    correct_city, expand_street_abbreviations, fix_problem_chars, format_phone_number,
    has_problem_chars, validate_postcode, NormalizationTables, NormalizeError,
};

/// `prefix:rest` keys whose prefix becomes the tag type.
static LOWER_COLON: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[a-z_]+:[a-z_]+").expect("valid regex"));

pub const DEFAULT_TAG_TYPE: &str = "regular";

/// A tag that was dropped because its value could not be cleaned.
#[derive(Debug, Clone, PartialEq)]
pub struct ShapeIssue {
    pub element_id: Option<String>,
    pub key: String,
    pub value: String,
    pub error: NormalizeError,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Shaped {
    pub element: ShapedElement,
    pub issues: Vec<ShapeIssue>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Cleaning {
    Street,
    City,
    Postcode,
    Phone,
}

fn cleaning_for(tag_type: &str, key: &str) -> Option<Cleaning> {
    match (tag_type, key) {
        (_, "address") => Some(Cleaning::Street),
        ("addr", key) if key == "street" || key.starts_with("street_") => Some(Cleaning::Street),
        (_, "city" | "city_1") => Some(Cleaning::City),
        ("addr", "postcode") | (_, "zip_left" | "zip_right") => Some(Cleaning::Postcode),
        (_, "phone") => Some(Cleaning::Phone),
        _ => None,
    }
}

/// Splits a raw key into `(type, key)`.
pub fn classify_key(raw_key: &str) -> (String, String) {
    if LOWER_COLON.is_match(raw_key) {
        match raw_key.split_once(':') {
            Some((tag_type, rest)) => (tag_type.to_string(), rest.to_string()),
            None => (DEFAULT_TAG_TYPE.to_string(), raw_key.to_string()),
        }
    } else {
        (DEFAULT_TAG_TYPE.to_string(), raw_key.to_string())
    }
}

/// Turns nodes and ways into table rows, cleaning tag keys and values on the way.
pub struct Shaper {
    tables: NormalizationTables,
}

impl Shaper {
    pub fn new(tables: NormalizationTables) -> Self {
        Shaper { tables }
    }

    /// Returns `None` for relations, which have no tables.
    pub fn shape(&self, element: &OsmElement) -> Option<Shaped> {
        let attr = |name: &str| element.attribute(name).map(str::to_string);
        let id = element.id().map(str::to_string);
        let mut issues = Vec::new();
        let mut tags = Vec::new();

        for (key, value) in element.tags() {
            match self.shape_tag(id.as_deref(), key, value) {
                Ok(tag) => tags.push(tag),
                Err(error) => issues.push(ShapeIssue {
                    element_id: id.clone(),
                    key: key.to_string(),
                    value: value.to_string(),
                    error,
                }),
            }
        }

        let shaped = match element.kind {
            ElementKind::Node => ShapedElement::Node {
                node: NodeRecord {
                    id,
                    lat: attr("lat"),
                    lon: attr("lon"),
                    user: attr("user"),
                    uid: attr("uid"),
                    version: attr("version"),
                    changeset: attr("changeset"),
                    timestamp: attr("timestamp"),
                },
                tags,
            },
            ElementKind::Way => {
                let nodes = element
                    .children
                    .iter()
                    .filter_map(|child| match child {
                        Child::NodeRef { node_id } => Some(node_id),
                        _ => None,
                    })
                    .enumerate()
                    .map(|(position, node_id)| WayNodeRecord {
                        id: id.clone(),
                        node_id: Some(node_id.clone()),
                        position,
                    })
                    .collect();
                ShapedElement::Way {
                    way: WayRecord {
                        id,
                        user: attr("user"),
                        uid: attr("uid"),
                        version: attr("version"),
                        changeset: attr("changeset"),
                        timestamp: attr("timestamp"),
                    },
                    nodes,
                    tags,
                }
            },
            ElementKind::Relation => return None,
        };

        Some(Shaped {
            element: shaped,
            issues,
        })
    }

    fn shape_tag(&self, id: Option<&str>, raw_key: &str, raw_value: &str) -> Result<TagRecord, NormalizeError> {
        let (tag_type, mut key) = classify_key(raw_key);
        if has_problem_chars(&key) {
            key = fix_problem_chars(&key).into_owned();
        }

        let value = match cleaning_for(&tag_type, &key) {
            Some(Cleaning::Street) => {
                expand_street_abbreviations(raw_value, &self.tables.street_abbreviations)
            },
            Some(Cleaning::City) => correct_city(raw_value, &self.tables.city_corrections),
            Some(Cleaning::Postcode) => validate_postcode(raw_value),
            Some(Cleaning::Phone) => format_phone_number(raw_value)?,
            None => raw_value.to_string(),
        };

        Ok(TagRecord {
            id: id.map(str::to_string),
            key,
            value,
            tag_type,
        })
    }
}

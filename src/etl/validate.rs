use std::collections::HashMap;
use std::fmt;

use regex::Regex;
use serde::{Deserialize, Serialize};

use crate::data::records::{RecordKind, Row, ShapedElement};
use crate::data::schema::{FieldRule, FieldType, Schema};
use crate::errors::{Error, Result};

/// What the pipeline does with an element that fails validation.
#[derive(Serialize, Deserialize, Debug, Clone, Copy, Default, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum OnInvalid {
    /// Stop the run.
    #[default]
    Abort,
    /// Log the element, write none of its rows and carry on.
    Skip,
}

/// The first field of a shaped element that does not conform to the schema.
#[derive(Debug, Clone, PartialEq)]
pub struct ValidationError {
    pub record: RecordKind,
    /// Position of the offending row among the element's rows of that kind.
    pub row: usize,
    pub element_id: Option<String>,
    pub field: String,
    pub reason: String,
}

impl fmt::Display for ValidationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "element {} has an invalid {} row {}: field '{}' {}",
            self.element_id.as_deref().unwrap_or("<no id>"),
            self.record,
            self.row,
            self.field,
            self.reason,
        )
    }
}

impl std::error::Error for ValidationError {}

struct CompiledRule {
    rule: FieldRule,
    regex: Option<Regex>,
}

/// Checks shaped elements against a [`Schema`].
pub struct Validator {
    rules: HashMap<RecordKind, Vec<(usize, String, CompiledRule)>>,
}

impl Validator {
    pub fn new(schema: &Schema) -> Result<Self> {
        let mut rules = HashMap::new();
        for kind in RecordKind::ALL {
            let columns = kind.columns();
            let mut kind_rules = Vec::new();
            for (name, rule) in &schema.for_kind(kind).fields {
                let index = columns
                    .iter()
                    .position(|column| *column == name.as_str())
                    .ok_or_else(|| Error::config(format!("schema for {kind} names unknown field '{name}'")))?;
                let regex = rule.regex.as_deref().map(Regex::new).transpose()?;
                kind_rules.push((index, name.clone(), CompiledRule { rule: rule.clone(), regex }));
            }
            // Report the first offending field in column order.
            kind_rules.sort_by_key(|(index, _, _)| *index);
            rules.insert(kind, kind_rules);
        }
        Ok(Validator { rules })
    }

    pub fn validate(&self, element: &ShapedElement) -> std::result::Result<(), ValidationError> {
        for (kind, rows) in element.tables() {
            for (row_index, row) in rows.iter().enumerate() {
                self.validate_row(kind, row_index, *row, element.id())?;
            }
        }
        Ok(())
    }

    fn validate_row(
        &self,
        kind: RecordKind,
        row_index: usize,
        row: &dyn Row,
        element_id: Option<&str>,
    ) -> std::result::Result<(), ValidationError> {
        let cells = row.cells();
        let rules = match self.rules.get(&kind) {
            Some(rules) => rules,
            None => return Ok(()),
        };

        for (index, name, compiled) in rules {
            let cell = cells.get(*index).and_then(|cell| cell.as_deref());
            if let Err(reason) = check_field(&compiled.rule, compiled.regex.as_ref(), cell) {
                return Err(ValidationError {
                    record: kind,
                    row: row_index,
                    element_id: element_id.map(str::to_string),
                    field: name.clone(),
                    reason,
                });
            }
        }
        Ok(())
    }
}

fn check_field(rule: &FieldRule, regex: Option<&Regex>, value: Option<&str>) -> std::result::Result<(), String> {
    let value = match value {
        Some(value) => value,
        None if rule.required => return Err("is required".to_string()),
        None => return Ok(()),
    };

    if value.is_empty() {
        return if rule.empty && rule.field_type == FieldType::String {
            Ok(())
        } else {
            Err("must not be empty".to_string())
        };
    }

    match rule.field_type {
        FieldType::Integer => {
            value
                .parse::<i64>()
                .map_err(|_| format!("must be of integer type, got {:?}", value))?;
        },
        FieldType::Float => {
            value
                .parse::<f64>()
                .map_err(|_| format!("must be of float type, got {:?}", value))?;
        },
        FieldType::String => (),
    }

    if let Some(regex) = regex {
        if !regex.is_match(value) {
            return Err(format!("value {:?} does not match '{}'", value, regex.as_str()));
        }
    }
    Ok(())
}

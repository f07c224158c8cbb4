use std::collections::{BTreeMap, BTreeSet};
use std::fs::{self, File};
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};
use std::sync::LazyLock;

use log::info;
use regex::Regex;
use serde::Serialize;

use crate::UserConfig;
use crate::data::osm::{Child, ElementKind, OsmElement};
use crate::errors::Result;
use crate::etl::normalize::has_problem_chars;
use crate::etl::read_osm::OsmReader;
use crate::etl::{Etl, Source};

pub const ETL_NAME: &str = "audit_tags";
pub const OUTPUT_FILE_NAME: &str = "audit.json";

const SELECTION: [ElementKind; 3] = [ElementKind::Node, ElementKind::Way, ElementKind::Relation];

static STREET_KEY: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^addr:street\w*").expect("valid regex"));

/// Last word of a street name, where abbreviations usually sit.
static LAST_WORD: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\b\w+\b$").expect("valid regex"));

/// Tag statistics over a whole document, used to decide which cleaning rules to add.
#[derive(Serialize, Debug, Clone, PartialEq)]
pub struct AuditReport {
    pub unique_keys: usize,
    pub keys: BTreeMap<String, usize>,
    pub key_categories: BTreeMap<String, usize>,
    /// Distinct keys with a problem character, each listed once.
    pub problem_keys: BTreeSet<String>,
    pub address_keys: BTreeMap<String, usize>,
    pub street_suffixes: BTreeMap<String, usize>,
    pub postcodes: BTreeMap<String, usize>,
}

impl Default for AuditReport {
    fn default() -> Self {
        let key_categories = ["fixme", "gnis", "other", "problem", "tiger"]
            .iter()
            .map(|category| (category.to_string(), 0))
            .collect();
        AuditReport {
            unique_keys: 0,
            keys: BTreeMap::new(),
            key_categories,
            problem_keys: BTreeSet::new(),
            address_keys: BTreeMap::new(),
            street_suffixes: BTreeMap::new(),
            postcodes: BTreeMap::new(),
        }
    }
}

fn bump(counts: &mut BTreeMap<String, usize>, key: &str) {
    *counts.entry(key.to_string()).or_insert(0) += 1;
}

pub fn key_category(key: &str) -> &'static str {
    if has_problem_chars(key) {
        "problem"
    } else if key.contains("FIXME") || key.contains("fixme") {
        "fixme"
    } else if key.contains("tiger") {
        "tiger"
    } else if key.contains("gnis") {
        "gnis"
    } else {
        "other"
    }
}

impl AuditReport {
    pub fn add_tag(&mut self, key: &str, value: &str) {
        bump(&mut self.keys, key);
        self.unique_keys = self.keys.len();
        bump(&mut self.key_categories, key_category(key));

        if has_problem_chars(key) && !self.problem_keys.contains(key) {
            self.problem_keys.insert(key.to_string());
        }
        if key.contains("addr") {
            bump(&mut self.address_keys, key);
        }
        if STREET_KEY.is_match(key) {
            if let Some(word) = LAST_WORD.find(value) {
                bump(&mut self.street_suffixes, word.as_str());
            }
        }
        if key == "addr:postcode" {
            bump(&mut self.postcodes, value);
        }
    }
}

/// Counts tag keys and address values across nodes, ways and relations.
pub struct AuditEtl<'a> {
    config: &'a UserConfig,
    report: AuditReport,
}

impl AuditEtl<'_> {
    pub fn new(config: &UserConfig) -> AuditEtl {
        AuditEtl {
            config,
            report: AuditReport::default(),
        }
    }

    #[cfg(test)]
    pub fn report(&self) -> &AuditReport {
        &self.report
    }

    fn output_path(dir: &Path) -> PathBuf {
        dir.join(OUTPUT_FILE_NAME)
    }
}

impl Etl for AuditEtl<'_> {
    type Input = OsmElement;
    type Output = Vec<(String, String)>;

    fn etl_name(&self) -> &str {
        ETL_NAME
    }

    fn show_progress(&self) -> bool {
        self.config.progress
    }

    fn extract(&mut self) -> Result<Source<Self::Input>> {
        self.report = AuditReport::default();
        let reader = OsmReader::open(Path::new(&self.config.data_path), &SELECTION)?;
        Ok(Box::new(reader))
    }

    fn transform(&mut self, input: Self::Input) -> Result<Option<Self::Output>> {
        let tags: Vec<(String, String)> = input
            .children
            .into_iter()
            .filter_map(|child| match child {
                Child::Tag { key, value } => Some((key, value)),
                _ => None,
            })
            .collect();
        Ok(Some(tags))
    }

    fn load(&mut self, output: Self::Output) -> Result<()> {
        for (key, value) in &output {
            self.report.add_tag(key, value);
        }
        Ok(())
    }

    fn finish(&mut self) -> Result<()> {
        let dir = Path::new(&self.config.output_dir);
        fs::create_dir_all(dir)?;
        let mut output_file = BufWriter::new(File::create(Self::output_path(dir))?);
        serde_json::to_writer_pretty(&mut output_file, &self.report)?;
        output_file.flush()?;

        let categories = &self.report.key_categories;
        let count = |category: &str| categories.get(category).copied().unwrap_or(0);
        info!(
            etl_name = ETL_NAME,
            unique_keys = self.report.unique_keys,
            problem = count("problem"),
            fixme = count("fixme"),
            tiger = count("tiger"),
            gnis = count("gnis"),
            other = count("other"),
            postcodes = self.report.postcodes.len();
            "Audit finished"
        );
        Ok(())
    }
}

use std::fs::File;
use std::path::Path;

use log::{info, warn};

use crate::UserConfig;
use crate::data::osm::{ElementKind, OsmElement};
use crate::data::records::{RecordKind, ShapedElement};
use crate::errors::{Error, Result};
use crate::etl::read_osm::OsmReader;
use crate::etl::shape::Shaper;
use crate::etl::validate::{OnInvalid, Validator};
use crate::etl::write_csv::CsvTables;
use crate::etl::{Etl, Source};

const ETL_NAME: &str = "osm_to_csv";

/// Element types written to the tables. Relations have no tables.
const SELECTION: [ElementKind; 2] = [ElementKind::Node, ElementKind::Way];

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RunStats {
    pub nodes: usize,
    pub node_tags: usize,
    pub ways: usize,
    pub way_nodes: usize,
    pub way_tags: usize,
    /// Tags left out because their value could not be cleaned.
    pub dropped_tags: usize,
    /// Elements left out under [`OnInvalid::Skip`].
    pub invalid_elements: usize,
}

impl RunStats {
    fn add(&mut self, kind: RecordKind, count: usize) {
        match kind {
            RecordKind::Node => self.nodes += count,
            RecordKind::NodeTag => self.node_tags += count,
            RecordKind::Way => self.ways += count,
            RecordKind::WayNode => self.way_nodes += count,
            RecordKind::WayTag => self.way_tags += count,
        }
    }

    pub fn log_summary(&self, message: &str) {
        info!(
            etl_name = ETL_NAME,
            nodes = self.nodes,
            node_tags = self.node_tags,
            ways = self.ways,
            way_nodes = self.way_nodes,
            way_tags = self.way_tags,
            dropped_tags = self.dropped_tags,
            invalid_elements = self.invalid_elements;
            "{}", message
        );
    }
}

/// Reads nodes and ways, cleans and validates them, and writes the five CSV tables.
pub struct OsmToCsvEtl<'a> {
    config: &'a UserConfig,
    shaper: Shaper,
    validator: Option<Validator>,
    tables: Option<CsvTables<File>>,
    stats: RunStats,
}

impl OsmToCsvEtl<'_> {
    pub fn new(config: &UserConfig) -> Result<OsmToCsvEtl> {
        let validator = if config.validate {
            Some(Validator::new(&config.schema)?)
        } else {
            None
        };

        Ok(OsmToCsvEtl {
            config,
            shaper: Shaper::new(config.normalization.clone()),
            validator,
            tables: None,
            stats: RunStats::default(),
        })
    }

    pub fn stats(&self) -> &RunStats {
        &self.stats
    }
}

impl Etl for OsmToCsvEtl<'_> {
    type Input = OsmElement;
    type Output = ShapedElement;

    fn etl_name(&self) -> &str {
        ETL_NAME
    }

    fn show_progress(&self) -> bool {
        self.config.progress
    }

    fn extract(&mut self) -> Result<Source<Self::Input>> {
        let input_path = Path::new(&self.config.data_path);
        let output_dir = Path::new(&self.config.output_dir);
        info!(
            etl_name = ETL_NAME,
            input = self.config.data_path.as_str(),
            output_dir = self.config.output_dir.as_str();
            "Opening input and output tables"
        );

        let reader = OsmReader::open(input_path, &SELECTION)?;
        self.tables = Some(CsvTables::create(output_dir)?);
        self.stats = RunStats::default();
        Ok(Box::new(reader))
    }

    fn transform(&mut self, input: Self::Input) -> Result<Option<Self::Output>> {
        let shaped = match self.shaper.shape(&input) {
            Some(shaped) => shaped,
            None => return Ok(None),
        };

        for issue in &shaped.issues {
            warn!(
                element_id = issue.element_id.as_deref().unwrap_or(""),
                key = issue.key.as_str(),
                value = issue.value.as_str(),
                err = issue.error.to_string().as_str();
                "Dropping tag whose value could not be cleaned"
            );
            self.stats.dropped_tags += 1;
        }

        if let Some(validator) = &self.validator {
            if let Err(err) = validator.validate(&shaped.element) {
                match self.config.on_invalid {
                    OnInvalid::Abort => return Err(err.into()),
                    OnInvalid::Skip => {
                        warn!(
                            element_id = err.element_id.as_deref().unwrap_or(""),
                            field = err.field.as_str(),
                            reason = err.reason.as_str();
                            "Skipping element that does not match the schema"
                        );
                        self.stats.invalid_elements += 1;
                        return Ok(None);
                    },
                }
            }
        }

        Ok(Some(shaped.element))
    }

    fn load(&mut self, output: Self::Output) -> Result<()> {
        let tables = self
            .tables
            .as_mut()
            .ok_or_else(|| Error::new(crate::errors::ErrorKind::Output, "output tables are not open"))?;
        for (kind, count) in tables.write_element(&output)? {
            self.stats.add(kind, count);
        }
        Ok(())
    }

    fn finish(&mut self) -> Result<()> {
        if let Some(mut tables) = self.tables.take() {
            tables.flush()?;
        }
        self.stats.log_summary("Wrote tables");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use csv::ReaderBuilder;
    use std::fs;
    use tempfile::tempdir;

    const OSM_SAMPLE: &str = r#"<?xml version='1.0' encoding='UTF-8'?>
<osm version="0.6" generator="test">
  <node id="1" lat="43.1" lon="-77.6" user="alice" uid="7" version="2" changeset="11" timestamp="2016-01-01T00:00:00Z">
    <tag k="addr:street" v="123 Main St"/>
    <tag k="addr:postcode" v="14618"/>
    <tag k="phone" v="1 (585) 555-1234"/>
  </node>
  <node id="2" lat="43.2" lon="-77.5" user="alice" uid="7" version="1" changeset="11" timestamp="2016-01-01T00:00:00Z">
    <tag k="addr:postcode" v="ABC12"/>
    <tag k="tiger county" v="Monroe, NY"/>
    <tag k="phone" v="555-1234"/>
  </node>
  <node id="3" lat="43.3" lon="-77.4" user="bob" uid="8" version="1" changeset="12" timestamp="2016-01-02T00:00:00Z"/>
  <way id="10" user="bob" uid="8" version="1" changeset="12" timestamp="2016-01-02T00:00:00Z">
    <nd ref="1"/>
    <nd ref="2"/>
    <tag k="highway" v="residential"/>
    <nd ref="3"/>
    <tag k="name" v="Park Ave"/>
  </way>
  <relation id="100" user="bob" uid="8" version="1" changeset="12" timestamp="2016-01-02T00:00:00Z">
    <member type="way" ref="10" role="outer"/>
    <tag k="type" v="multipolygon"/>
  </relation>
</osm>
"#;

    const OSM_INVALID: &str = r#"<?xml version='1.0' encoding='UTF-8'?>
<osm version="0.6" generator="test">
  <node id="1" lat="43.1" lon="-77.6" user="alice" uid="7" version="2" changeset="11" timestamp="2016-01-01T00:00:00Z"/>
  <node id="2" lat="43.2" lon="-77.5" user="alice" version="1" changeset="11" timestamp="2016-01-01T00:00:00Z">
    <tag k="name" v="No uid"/>
  </node>
  <node id="3" lat="43.3" lon="-77.4" user="bob" uid="8" version="1" changeset="12" timestamp="2016-01-02T00:00:00Z"/>
</osm>
"#;

    fn config_for(dir: &Path, xml: &str) -> UserConfig {
        let osm_path = dir.join("sample.osm");
        fs::write(&osm_path, xml).unwrap();
        UserConfig {
            data_path: osm_path.to_string_lossy().into_owned(),
            output_dir: dir.join("out").to_string_lossy().into_owned(),
            ..UserConfig::default()
        }
    }

    fn read_rows(dir: &Path, kind: RecordKind) -> Vec<Vec<String>> {
        let mut reader = ReaderBuilder::new()
            .has_headers(false)
            .from_path(dir.join("out").join(kind.file_name()))
            .unwrap();
        reader
            .records()
            .map(|row| row.unwrap().iter().map(|value| value.to_string()).collect())
            .collect()
    }

    #[test]
    fn writes_five_tables() {
        let dir = tempdir().unwrap();
        let config = config_for(dir.path(), OSM_SAMPLE);

        let mut etl = OsmToCsvEtl::new(&config).unwrap();
        etl.process().unwrap();
        assert_eq!(
            *etl.stats(),
            RunStats {
                nodes: 3,
                node_tags: 5,
                ways: 1,
                way_nodes: 3,
                way_tags: 2,
                dropped_tags: 1,
                invalid_elements: 0,
            }
        );

        let nodes = read_rows(dir.path(), RecordKind::Node);
        assert_eq!(nodes[0], RecordKind::Node.columns());
        assert_eq!(nodes.len(), 4);
        assert_eq!(
            nodes[1],
            vec!["1", "43.1", "-77.6", "alice", "7", "2", "11", "2016-01-01T00:00:00Z"]
        );

        let node_tags = read_rows(dir.path(), RecordKind::NodeTag);
        assert_eq!(node_tags[0], vec!["id", "key", "value", "type"]);
        assert_eq!(
            node_tags[1..],
            [
                vec!["1", "street", "123 Main Street", "addr"],
                vec!["1", "postcode", "14618", "addr"],
                vec!["1", "phone", "585-555-1234", "regular"],
                vec!["2", "postcode", "fixme", "addr"],
                vec!["2", "tiger_county", "Monroe, NY", "regular"],
            ]
        );

        let ways = read_rows(dir.path(), RecordKind::Way);
        assert_eq!(ways[1], vec!["10", "bob", "8", "1", "12", "2016-01-02T00:00:00Z"]);

        let way_nodes = read_rows(dir.path(), RecordKind::WayNode);
        assert_eq!(
            way_nodes[1..],
            [
                vec!["10", "1", "0"],
                vec!["10", "2", "1"],
                vec!["10", "3", "2"],
            ]
        );

        let way_tags = read_rows(dir.path(), RecordKind::WayTag);
        assert_eq!(
            way_tags[1..],
            [
                vec!["10", "highway", "residential", "regular"],
                vec!["10", "name", "Park Ave", "regular"],
            ]
        );
    }

    #[test]
    fn reruns_produce_identical_output() {
        let dir = tempdir().unwrap();
        let config = config_for(dir.path(), OSM_SAMPLE);

        OsmToCsvEtl::new(&config).unwrap().process().unwrap();
        let first: Vec<Vec<u8>> = RecordKind::ALL
            .iter()
            .map(|kind| fs::read(dir.path().join("out").join(kind.file_name())).unwrap())
            .collect();

        OsmToCsvEtl::new(&config).unwrap().process().unwrap();
        let second: Vec<Vec<u8>> = RecordKind::ALL
            .iter()
            .map(|kind| fs::read(dir.path().join("out").join(kind.file_name())).unwrap())
            .collect();

        assert_eq!(first, second);
    }

    #[test]
    fn invalid_element_stops_the_run() {
        let dir = tempdir().unwrap();
        let config = config_for(dir.path(), OSM_INVALID);

        let mut etl = OsmToCsvEtl::new(&config).unwrap();
        let err = etl.process().unwrap_err();
        assert_eq!(err.kind, crate::errors::ErrorKind::Validation);
        assert!(err.message.contains("uid"));
        assert!(err.message.contains("element 2"));
        assert_eq!(etl.stats().nodes, 1);
        assert_eq!(etl.stats().node_tags, 0);
    }

    #[test]
    fn aborted_run_keeps_counts_reached_so_far() {
        let dir = tempdir().unwrap();
        let xml = r#"<osm>
  <node id="1" lat="43.1" lon="-77.6" user="alice" uid="7" version="1" changeset="11" timestamp="2016-01-01T00:00:00Z">
    <tag k="phone" v="555-1234"/>
  </node>
  <node id="2" lat="43.2" lon="-77.5"></way>
</osm>"#;
        let config = config_for(dir.path(), xml);

        let mut etl = OsmToCsvEtl::new(&config).unwrap();
        assert!(etl.process().is_err());
        assert_eq!(etl.stats().nodes, 1);
        assert_eq!(etl.stats().dropped_tags, 1);
    }

    #[test]
    fn invalid_element_can_be_skipped() {
        let dir = tempdir().unwrap();
        let config = UserConfig {
            on_invalid: OnInvalid::Skip,
            ..config_for(dir.path(), OSM_INVALID)
        };

        let mut etl = OsmToCsvEtl::new(&config).unwrap();
        etl.process().unwrap();
        assert_eq!(etl.stats().nodes, 2);
        assert_eq!(etl.stats().invalid_elements, 1);

        let ids: Vec<String> = read_rows(dir.path(), RecordKind::Node)
            .into_iter()
            .skip(1)
            .map(|row| row[0].clone())
            .collect();
        assert_eq!(ids, vec!["1", "3"]);
        assert_eq!(read_rows(dir.path(), RecordKind::NodeTag).len(), 1);
    }

    #[test]
    fn validation_can_be_turned_off() {
        let dir = tempdir().unwrap();
        let config = UserConfig {
            validate: false,
            ..config_for(dir.path(), OSM_INVALID)
        };

        let mut etl = OsmToCsvEtl::new(&config).unwrap();
        etl.process().unwrap();
        assert_eq!(etl.stats().nodes, 3);
        let second = &read_rows(dir.path(), RecordKind::Node)[2];
        assert_eq!(second[4], "");
    }

    #[test]
    fn malformed_input_is_fatal() {
        let dir = tempdir().unwrap();
        let config = config_for(dir.path(), "<osm><node id=\"1\" lat=\"1\" lon=\"1\"></way></osm>");

        let err = OsmToCsvEtl::new(&config).unwrap().process().unwrap_err();
        assert_eq!(err.kind, crate::errors::ErrorKind::MalformedInput);
    }
}

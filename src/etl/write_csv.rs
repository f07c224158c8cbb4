use std::collections::BTreeMap;
use std::fs::{self, File};
use std::io::Write;
use std::path::Path;

use csv::Writer;

use crate::data::records::{RecordKind, Row, ShapedElement};
use crate::errors::Result;

/// The five output tables, each with its header already written.
pub struct CsvTables<W: Write> {
    writers: BTreeMap<RecordKind, Writer<W>>,
}

impl CsvTables<File> {
    /// Creates (or truncates) one CSV file per table inside `dir`.
    pub fn create(dir: &Path) -> Result<Self> {
        fs::create_dir_all(dir)?;
        let mut writers = BTreeMap::new();
        for kind in RecordKind::ALL {
            writers.insert(kind, Writer::from_path(dir.join(kind.file_name()))?);
        }
        CsvTables::with_headers(writers)
    }
}

impl<W: Write> CsvTables<W> {
    #[cfg(test)]
    pub fn from_writers(mut make_writer: impl FnMut(RecordKind) -> W) -> Result<Self> {
        let writers = RecordKind::ALL
            .iter()
            .map(|kind| (*kind, Writer::from_writer(make_writer(*kind))))
            .collect();
        CsvTables::with_headers(writers)
    }

    fn with_headers(mut writers: BTreeMap<RecordKind, Writer<W>>) -> Result<Self> {
        for (kind, writer) in writers.iter_mut() {
            writer.write_record(kind.columns())?;
        }
        Ok(CsvTables { writers })
    }

    pub fn write_row(&mut self, kind: RecordKind, row: &dyn Row) -> Result<()> {
        let cells = row.cells();
        if let Some(writer) = self.writers.get_mut(&kind) {
            writer.write_record(cells.iter().map(|cell| cell.as_deref().unwrap_or("")))?;
        }
        Ok(())
    }

    /// Writes every row of one element; returns the number of rows per table.
    pub fn write_element(&mut self, element: &ShapedElement) -> Result<Vec<(RecordKind, usize)>> {
        let mut written = Vec::new();
        for (kind, rows) in element.tables() {
            for row in &rows {
                self.write_row(kind, *row)?;
            }
            written.push((kind, rows.len()));
        }
        Ok(written)
    }

    pub fn flush(&mut self) -> Result<()> {
        for writer in self.writers.values_mut() {
            writer.flush()?;
        }
        Ok(())
    }

    #[cfg(test)]
    pub fn into_inner(self) -> Result<BTreeMap<RecordKind, W>> {
        let mut inner = BTreeMap::new();
        for (kind, writer) in self.writers {
            let w = writer
                .into_inner()
                .map_err(|err| format!("could not flush {}: {}", kind.file_name(), err.error()))?;
            inner.insert(kind, w);
        }
        Ok(inner)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::records::{NodeRecord, TagRecord};

    #[test]
    fn writes_headers_and_rows() {
        let mut tables = CsvTables::from_writers(|_| Vec::<u8>::new()).unwrap();
        let element = ShapedElement::Node {
            node: NodeRecord {
                id: Some("1".to_string()),
                lat: Some("43.1".to_string()),
                lon: Some("-77.6".to_string()),
                user: Some("Zoë".to_string()),
                ..NodeRecord::default()
            },
            tags: vec![TagRecord {
                id: Some("1".to_string()),
                key: "name".to_string(),
                value: "Tom, Jerry & \"Co\"".to_string(),
                tag_type: "regular".to_string(),
            }],
        };
        let written = tables.write_element(&element).unwrap();
        assert_eq!(written, vec![(RecordKind::Node, 1), (RecordKind::NodeTag, 1)]);

        let outputs = tables.into_inner().unwrap();
        let nodes = String::from_utf8(outputs[&RecordKind::Node].clone()).unwrap();
        assert_eq!(
            nodes,
            "id,lat,lon,user,uid,version,changeset,timestamp\n1,43.1,-77.6,Zoë,,,,\n"
        );
        let tags = String::from_utf8(outputs[&RecordKind::NodeTag].clone()).unwrap();
        assert_eq!(tags, "id,key,value,type\n1,name,\"Tom, Jerry & \"\"Co\"\"\",regular\n");
        let ways = String::from_utf8(outputs[&RecordKind::Way].clone()).unwrap();
        assert_eq!(ways, "id,user,uid,version,changeset,timestamp\n");
    }

    #[test]
    fn create_truncates_existing_files() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join("nodes.csv"), "stale data\n").unwrap();

        let mut tables = CsvTables::create(dir.path()).unwrap();
        tables.flush().unwrap();

        let nodes = fs::read_to_string(dir.path().join("nodes.csv")).unwrap();
        assert_eq!(nodes, "id,lat,lon,user,uid,version,changeset,timestamp\n");
        for kind in RecordKind::ALL {
            assert!(dir.path().join(kind.file_name()).exists());
        }
    }
}

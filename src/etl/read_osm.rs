use std::fs;
use std::io::{BufRead, BufReader};
use std::path::Path;
use std::str;

use quick_xml::events::{BytesStart, Event};
use quick_xml::name::QName;
use quick_xml::reader::Reader;
use xz::bufread::XzDecoder;

use crate::data::osm::{Child, ElementKind, OsmElement};
use crate::errors::{Error, Result};

/// Pull-based reader over the top-level elements of an .osm document.
///
/// Only the element currently being assembled is held in memory. The event buffer
/// is cleared after every event, and elements outside `selection` are skipped
/// without collecting their children, so memory use does not grow with the size of
/// the document.
pub struct OsmReader<R: BufRead> {
    reader: Reader<R>,
    selection: Vec<ElementKind>,
    buf: Vec<u8>,
    skip_buf: Vec<u8>,
    current: Option<OsmElement>,
    depth: usize,
    done: bool,
}

impl OsmReader<Box<dyn BufRead>> {
    /// Opens an .osm file, decompressing it on the fly when it ends in `.xz`.
    pub fn open(path: &Path, selection: &[ElementKind]) -> Result<Self> {
        let file = fs::File::open(path)?;
        let file_reader = BufReader::new(file);
        let input: Box<dyn BufRead> = match path.extension().and_then(|ext| ext.to_str()) {
            Some("xz") => Box::new(BufReader::new(XzDecoder::new(file_reader))),
            _ => Box::new(file_reader),
        };
        Ok(OsmReader::new(input, selection))
    }
}

impl<R: BufRead> OsmReader<R> {
    pub fn new(input: R, selection: &[ElementKind]) -> Self {
        let mut reader = Reader::from_reader(input);
        reader.trim_text(true);

        OsmReader {
            reader,
            selection: selection.to_vec(),
            buf: Vec::new(),
            skip_buf: Vec::new(),
            current: None,
            depth: 0,
            done: false,
        }
    }

    fn parse_attributes(el: &BytesStart) -> Result<Vec<(String, String)>> {
        let mut attributes = Vec::new();
        for attribute_res in el.attributes() {
            let attribute = attribute_res?;
            let key = str::from_utf8(attribute.key.as_ref())?.to_string();
            let value = attribute.unescape_value()?.into_owned();
            attributes.push((key, value));
        }
        Ok(attributes)
    }

    fn parse_child(el: &BytesStart) -> Result<Option<Child>> {
        let attributes = Self::parse_attributes(el)?;
        let take = |name: &str| {
            attributes
                .iter()
                .find(|(key, _)| key == name)
                .map(|(_, value)| value.clone())
        };

        let child = match el.name().as_ref() {
            b"tag" => match (take("k"), take("v")) {
                (Some(key), Some(value)) => Some(Child::Tag { key, value }),
                _ => None,
            },
            b"nd" => take("ref").map(|node_id| Child::NodeRef { node_id }),
            _ => None,
        };
        Ok(child)
    }

    /// Handles a start tag. Returns an element when it was self-closing and selected.
    fn open_element(&mut self, el: &BytesStart, empty: bool) -> Result<Option<OsmElement>> {
        if let Some(current) = self.current.as_mut() {
            if let Some(child) = Self::parse_child(el)? {
                current.children.push(child);
            }
            if !empty {
                self.depth += 1;
            }
            return Ok(None);
        }

        let kind = match ElementKind::from_tag_name(el.name().as_ref()) {
            Some(kind) => kind,
            None => {
                if !empty {
                    self.depth += 1;
                }
                return Ok(None);
            }
        };

        if !self.selection.contains(&kind) {
            if !empty {
                let name = el.name().as_ref().to_vec();
                self.skip_buf.clear();
                self.reader.read_to_end_into(QName(&name), &mut self.skip_buf)?;
                self.skip_buf.clear();
            }
            return Ok(None);
        }

        let mut element = OsmElement::new(kind);
        element.attributes = Self::parse_attributes(el)?;
        if empty {
            return Ok(Some(element));
        }
        self.depth += 1;
        self.current = Some(element);
        Ok(None)
    }

    fn close_element(&mut self, name: &[u8]) -> Option<OsmElement> {
        self.depth = self.depth.saturating_sub(1);
        match &self.current {
            Some(current) if current.kind.tag_name().as_bytes() == name => self.current.take(),
            _ => None,
        }
    }

    fn next_element(&mut self) -> Result<Option<OsmElement>> {
        loop {
            let event = self.reader.read_event_into(&mut self.buf)?;
            let element = match event {
                Event::Eof => {
                    if self.depth > 0 {
                        return Err(Error::malformed(format!(
                            "unexpected end of document at position {}",
                            self.reader.buffer_position()
                        )));
                    }
                    return Ok(None);
                },
                Event::Start(e) => {
                    let e = e.into_owned();
                    self.open_element(&e, false)?
                },
                Event::Empty(e) => {
                    let e = e.into_owned();
                    self.open_element(&e, true)?
                },
                Event::End(e) => {
                    let name = e.name().as_ref().to_vec();
                    self.close_element(&name)
                },
                // Declarations, comments, text and the like carry nothing we keep.
                _ => None,
            };
            self.buf.clear();

            if element.is_some() {
                return Ok(element);
            }
        }
    }
}

impl<R: BufRead> Iterator for OsmReader<R> {
    type Item = Result<OsmElement>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.done {
            return None;
        }
        match self.next_element() {
            Ok(Some(element)) => Some(Ok(element)),
            Ok(None) => {
                self.done = true;
                None
            },
            Err(err) => {
                self.done = true;
                Some(Err(err))
            },
        }
    }
}

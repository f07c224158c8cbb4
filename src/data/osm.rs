use std::fmt;

/// Top-level OSM element types. Only nodes and ways are shaped into records.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ElementKind {
    Node,
    Way,
    Relation,
}

impl ElementKind {
    pub fn from_tag_name(name: &[u8]) -> Option<Self> {
        match name {
            b"node" => Some(ElementKind::Node),
            b"way" => Some(ElementKind::Way),
            b"relation" => Some(ElementKind::Relation),
            _ => None,
        }
    }

    pub fn tag_name(&self) -> &'static str {
        match self {
            ElementKind::Node => "node",
            ElementKind::Way => "way",
            ElementKind::Relation => "relation",
        }
    }
}

impl fmt::Display for ElementKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.tag_name())
    }
}

/// Sub-element of a node, way or relation, in document order. Relation members are
/// not kept.
#[derive(Debug, Clone, PartialEq)]
pub enum Child {
    Tag {
        key: String,
        value: String,
    },
    NodeRef {
        node_id: String,
    },
}

/// One element as read from the .osm file. Attribute values are kept as the
/// unescaped strings found in the document.
#[derive(Debug, Clone, PartialEq)]
pub struct OsmElement {
    pub kind: ElementKind,
    pub attributes: Vec<(String, String)>,
    pub children: Vec<Child>,
}

impl OsmElement {
    pub fn new(kind: ElementKind) -> Self {
        OsmElement {
            kind,
            attributes: Vec::new(),
            children: Vec::new(),
        }
    }

    pub fn attribute(&self, name: &str) -> Option<&str> {
        self.attributes
            .iter()
            .find(|(key, _)| key == name)
            .map(|(_, value)| value.as_str())
    }

    pub fn id(&self) -> Option<&str> {
        self.attribute("id")
    }

    pub fn tags(&self) -> impl Iterator<Item = (&str, &str)> {
        self.children.iter().filter_map(|child| match child {
            Child::Tag { key, value } => Some((key.as_str(), value.as_str())),
            _ => None,
        })
    }
}

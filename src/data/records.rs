use std::fmt;

/// The five tables produced by the extraction run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum RecordKind {
    Node,
    NodeTag,
    Way,
    WayNode,
    WayTag,
}

pub const NODE_FIELDS: [&str; 8] = [
    "id", "lat", "lon", "user", "uid", "version", "changeset", "timestamp",
];
pub const NODE_TAGS_FIELDS: [&str; 4] = ["id", "key", "value", "type"];
pub const WAY_FIELDS: [&str; 6] = ["id", "user", "uid", "version", "changeset", "timestamp"];
pub const WAY_TAGS_FIELDS: [&str; 4] = ["id", "key", "value", "type"];
pub const WAY_NODES_FIELDS: [&str; 3] = ["id", "node_id", "position"];

impl RecordKind {
    pub const ALL: [RecordKind; 5] = [
        RecordKind::Node,
        RecordKind::NodeTag,
        RecordKind::Way,
        RecordKind::WayNode,
        RecordKind::WayTag,
    ];

    pub fn columns(&self) -> &'static [&'static str] {
        match self {
            RecordKind::Node => &NODE_FIELDS,
            RecordKind::NodeTag => &NODE_TAGS_FIELDS,
            RecordKind::Way => &WAY_FIELDS,
            RecordKind::WayNode => &WAY_NODES_FIELDS,
            RecordKind::WayTag => &WAY_TAGS_FIELDS,
        }
    }

    pub fn file_name(&self) -> &'static str {
        match self {
            RecordKind::Node => "nodes.csv",
            RecordKind::NodeTag => "nodes_tags.csv",
            RecordKind::Way => "ways.csv",
            RecordKind::WayNode => "ways_nodes.csv",
            RecordKind::WayTag => "ways_tags.csv",
        }
    }

    pub fn table_name(&self) -> &'static str {
        match self {
            RecordKind::Node => "nodes",
            RecordKind::NodeTag => "nodes_tags",
            RecordKind::Way => "ways",
            RecordKind::WayNode => "ways_nodes",
            RecordKind::WayTag => "ways_tags",
        }
    }
}

impl fmt::Display for RecordKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.table_name())
    }
}

/// A record that renders as one CSV row. Cells line up with the kind's columns;
/// `None` marks an attribute missing from the source element.
pub trait Row {
    fn cells(&self) -> Vec<Option<String>>;
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct NodeRecord {
    pub id: Option<String>,
    pub lat: Option<String>,
    pub lon: Option<String>,
    pub user: Option<String>,
    pub uid: Option<String>,
    pub version: Option<String>,
    pub changeset: Option<String>,
    pub timestamp: Option<String>,
}

impl Row for NodeRecord {
    fn cells(&self) -> Vec<Option<String>> {
        vec![
            self.id.clone(),
            self.lat.clone(),
            self.lon.clone(),
            self.user.clone(),
            self.uid.clone(),
            self.version.clone(),
            self.changeset.clone(),
            self.timestamp.clone(),
        ]
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct WayRecord {
    pub id: Option<String>,
    pub user: Option<String>,
    pub uid: Option<String>,
    pub version: Option<String>,
    pub changeset: Option<String>,
    pub timestamp: Option<String>,
}

impl Row for WayRecord {
    fn cells(&self) -> Vec<Option<String>> {
        vec![
            self.id.clone(),
            self.user.clone(),
            self.uid.clone(),
            self.version.clone(),
            self.changeset.clone(),
            self.timestamp.clone(),
        ]
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct TagRecord {
    pub id: Option<String>,
    pub key: String,
    pub value: String,
    pub tag_type: String,
}

impl Row for TagRecord {
    fn cells(&self) -> Vec<Option<String>> {
        vec![
            self.id.clone(),
            Some(self.key.clone()),
            Some(self.value.clone()),
            Some(self.tag_type.clone()),
        ]
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct WayNodeRecord {
    pub id: Option<String>,
    pub node_id: Option<String>,
    pub position: usize,
}

impl Row for WayNodeRecord {
    fn cells(&self) -> Vec<Option<String>> {
        vec![
            self.id.clone(),
            self.node_id.clone(),
            Some(self.position.to_string()),
        ]
    }
}

/// All rows produced from one node or way.
#[derive(Debug, Clone, PartialEq)]
pub enum ShapedElement {
    Node {
        node: NodeRecord,
        tags: Vec<TagRecord>,
    },
    Way {
        way: WayRecord,
        nodes: Vec<WayNodeRecord>,
        tags: Vec<TagRecord>,
    },
}

impl ShapedElement {
    pub fn id(&self) -> Option<&str> {
        match self {
            ShapedElement::Node { node, .. } => node.id.as_deref(),
            ShapedElement::Way { way, .. } => way.id.as_deref(),
        }
    }

    /// Rows grouped by table, in the order they are written.
    pub fn tables(&self) -> Vec<(RecordKind, Vec<&dyn Row>)> {
        match self {
            ShapedElement::Node { node, tags } => vec![
                (RecordKind::Node, vec![node as &dyn Row]),
                (RecordKind::NodeTag, tags.iter().map(|tag| tag as &dyn Row).collect()),
            ],
            ShapedElement::Way { way, nodes, tags } => vec![
                (RecordKind::Way, vec![way as &dyn Row]),
                (RecordKind::WayNode, nodes.iter().map(|nd| nd as &dyn Row).collect()),
                (RecordKind::WayTag, tags.iter().map(|tag| tag as &dyn Row).collect()),
            ],
        }
    }
}

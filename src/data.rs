pub mod osm;
pub mod records;
pub mod schema;

mod polygon;

pub use polygon::{PolygonAdapter, PolygonConfig};

// Diagram Graph - Core Library

pub mod cell;
pub mod collection;
pub mod error;
pub mod event;
pub mod graph;
pub mod serialization;
pub mod shapes;

// Re-export main types for convenience
pub use cell::{Cell, CellAttrs, CellModel, Endpoint, Point, LINK_TYPE};
pub use collection::{CellCollection, LinkQuery};
pub use error::{GraphError, Result};
pub use event::{CellOptions, EventKind, GraphEvent};
pub use graph::{Graph, Listener, ListenerId};
pub use serialization::{read_document, write_document};
pub use shapes::{ShapeDefaults, ShapeFactory, ShapeKey, ShapeRegistry};

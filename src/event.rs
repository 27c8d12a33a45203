use crate::Cell;
use chrono::{DateTime, Utc};
use serde::{Serialize, Serializer};

/// Options passed along with a mutation and delivered with its events
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct CellOptions {
    /// Suppress notifications for this mutation
    #[serde(skip_serializing_if = "std::ops::Not::not")]
    pub silent: bool,

    /// On removal, detach incident links instead of removing them
    #[serde(skip_serializing_if = "std::ops::Not::not")]
    pub disconnect_links: bool,
}

impl CellOptions {
    pub fn silent() -> Self {
        Self {
            silent: true,
            ..Self::default()
        }
    }

    pub fn disconnect_links() -> Self {
        Self {
            disconnect_links: true,
            ..Self::default()
        }
    }

    /// Same options with notifications suppressed
    pub fn silenced(&self) -> Self {
        Self {
            silent: true,
            ..self.clone()
        }
    }
}

/// Types of notifications emitted by the cell collection
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EventKind {
    Add,
    Remove,
    /// A single attribute changed
    Change(String),
    /// Fired once after the attribute-level changes of one `set`
    Changed,
    Sort,
    /// Application-defined event
    Custom(String),
}

impl EventKind {
    /// The event name as subscribers see it
    pub fn name(&self) -> String {
        match self {
            EventKind::Add => "add".to_string(),
            EventKind::Remove => "remove".to_string(),
            EventKind::Change(attribute) => format!("change:{}", attribute),
            EventKind::Changed => "change".to_string(),
            EventKind::Sort => "sort".to_string(),
            EventKind::Custom(name) => name.clone(),
        }
    }
}

impl Serialize for EventKind {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.name())
    }
}

/// A notification with timestamp
#[derive(Debug, Clone, Serialize)]
pub struct GraphEvent {
    pub timestamp: DateTime<Utc>,
    pub kind: EventKind,
    /// Snapshot of the affected cell; `None` for collection-wide events such as `sort`
    #[serde(serialize_with = "serialize_cell")]
    pub cell: Option<Cell>,
    pub options: CellOptions,
}

impl GraphEvent {
    /// Create a new event with the current timestamp
    pub fn new(kind: EventKind, cell: Option<Cell>, options: CellOptions) -> Self {
        Self {
            timestamp: Utc::now(),
            kind,
            cell,
            options,
        }
    }

    pub fn name(&self) -> String {
        self.kind.name()
    }

    /// Id of the affected cell
    pub fn cell_id(&self) -> Option<&str> {
        self.cell.as_ref().map(|c| c.id())
    }
}

fn serialize_cell<S: Serializer>(cell: &Option<Cell>, serializer: S) -> Result<S::Ok, S::Error> {
    cell.as_ref().map(Cell::to_attrs).serialize(serializer)
}

use thiserror::Error;

/// Errors raised by the graph model
#[derive(Debug, Error)]
pub enum GraphError {
    /// Graph JSON is missing `paper` or `cells`, or they have the wrong shape
    #[error("malformed graph JSON: {0}")]
    MalformedGraph(String),

    /// A cell with this id is already part of the collection
    #[error("duplicate cell id: {0}")]
    DuplicateId(String),

    #[error("cell not found: {0}")]
    CellNotFound(String),

    /// `id` and `type` are fixed once a cell is constructed
    #[error("attribute `{0}` is read-only")]
    ReadOnlyAttribute(String),

    #[error("invalid value for attribute `{attribute}`: {reason}")]
    InvalidAttribute { attribute: String, reason: String },

    #[error("invalid shape key `{0}`: namespace and kind must be non-empty and contain no '.'")]
    InvalidShapeKey(String),

    #[error("shape `{0}` is already registered")]
    ShapeAlreadyRegistered(String),

    #[error(transparent)]
    Json(#[from] serde_json::Error),
}

pub type Result<T> = std::result::Result<T, GraphError>;

// Edit history - operation records, the ordered log and its controller
//
// Architecture:
// - record: the two-tier record type (content vs structural)
// - log: ordered storage with toggle, single removal and suffix truncation
// - controller: the mutation surface used by the UI and the CLI; every
//   mutation goes through the undoable commands in `crate::command`

pub mod controller;
pub mod log;
pub mod record;

pub use controller::{DeleteMode, DeletePreview, HistoryController, HistoryEntry};
pub use log::OperationLog;
pub use record::{
    ContentOp, Operation, OperationKind, OperationRecord, RecordBody, RecordId, RecordMeta, Scope,
    StructuralOp,
};

use crate::render::engine::RenderError;
use crate::timeline::GraphError;

/// Result type for history mutations
pub type HistoryResult<T> = Result<T, HistoryError>;

#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum HistoryError {
    #[error("Invalid region: {0}")]
    InvalidRegion(#[source] GraphError),

    #[error("Unknown record {0}")]
    UnknownRecord(RecordId),

    #[error("Record {record} is a {kind:?} operation and cannot be toggled")]
    NotToggleable { record: RecordId, kind: OperationKind },

    #[error("Cannot delete the last clip")]
    LastClipDeletion,

    #[error("Deleting record {record} removes {removed} records and must be confirmed")]
    CascadeNotConfirmed { record: RecordId, removed: usize },

    #[error("Unknown effect '{0}'")]
    UnknownEffect(String),

    #[error("Clip content is empty")]
    EmptyContent,

    #[error("Record {record} has order {created_order}, log already ends at {last}")]
    OutOfOrder {
        record: RecordId,
        created_order: u64,
        last: u64,
    },

    #[error("Record {0} already exists")]
    DuplicateRecord(RecordId),

    #[error("{} record(s) target clips that no longer exist", .0.len())]
    OrphanedRecords(Vec<RecordId>),

    #[error("Render failed: {0}")]
    Render(RenderError),

    #[error("Clip graph error: {0}")]
    Graph(GraphError),
}

impl From<GraphError> for HistoryError {
    fn from(err: GraphError) -> Self {
        match err {
            GraphError::LastClipDeletion => HistoryError::LastClipDeletion,
            GraphError::UnknownClip(_)
            | GraphError::InvalidRegion { .. }
            | GraphError::InvalidSplit { .. }
            | GraphError::InvalidIndex { .. } => HistoryError::InvalidRegion(err),
            other => HistoryError::Graph(other),
        }
    }
}

impl From<RenderError> for HistoryError {
    fn from(err: RenderError) -> Self {
        match err {
            RenderError::Structural(graph) => graph.into(),
            other => HistoryError::Render(other),
        }
    }
}

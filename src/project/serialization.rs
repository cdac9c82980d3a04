// Serialization utilities for project persistence
//
// Converts between the in-memory history (buffers, Arc snapshots) and the
// stored form (media references). Identical buffers are written once.

use crate::audio::buffer::SampleBuffer;
use crate::command::HistoryState;
use crate::history::log::OperationLog;
use crate::history::record::{OperationRecord, RecordBody};
use crate::project::ProjectError;
use crate::project::types::*;
use crate::timeline::{ClipIdAllocator, TimelineState};
use ron::{from_str as ron_from_str, to_string as ron_to_string};
use std::collections::HashMap;
use std::sync::Arc;

/// Media collected while storing a history
#[derive(Debug, Default)]
pub struct MediaStore {
    files: Vec<(MediaRef, SampleBuffer)>,
    index: HashMap<SampleBuffer, usize>,
}

impl MediaStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Reference for `buffer`, reusing an existing file with identical audio
    pub fn intern(&mut self, buffer: &SampleBuffer) -> MediaRef {
        if let Some(&i) = self.index.get(buffer) {
            return self.files[i].0.clone();
        }
        let name = format!("media/{:04}.wav", self.files.len());
        self.index.insert(buffer.clone(), self.files.len());
        self.files.push((name.clone(), buffer.clone()));
        name
    }

    pub fn files(&self) -> &[(MediaRef, SampleBuffer)] {
        &self.files
    }

    pub fn len(&self) -> usize {
        self.files.len()
    }

    pub fn is_empty(&self) -> bool {
        self.files.is_empty()
    }
}

fn store_timeline(state: &TimelineState, media: &mut MediaStore) -> StoredTimeline {
    StoredTimeline {
        pool: media.intern(state.pool()),
        graph: state.graph().clone(),
    }
}

/// Stored form of a history state
pub fn history_to_stored(state: &HistoryState, media: &mut MediaStore) -> ProjectHistory {
    let base = store_timeline(&state.base, media);
    let records = state
        .log
        .iter()
        .map(|record| {
            let body = match &record.body {
                RecordBody::Content { op, enabled } => StoredBody::Content {
                    op: op.clone(),
                    enabled: *enabled,
                },
                RecordBody::Structural { op, snapshot } => {
                    let op = op
                        .try_map_audio::<_, std::convert::Infallible, _>(|content| {
                            Ok(media.intern(content))
                        })
                        .unwrap_or_else(|never| match never {});
                    StoredBody::Structural {
                        op,
                        snapshot: store_timeline(snapshot, media),
                    }
                }
            };
            StoredRecord {
                id: record.id,
                created_order: record.created_order,
                meta: record.meta.clone(),
                body,
            }
        })
        .collect();

    ProjectHistory {
        base,
        records,
        allocators: Some(AllocatorState {
            next_clip: state.clip_ids.peek(),
            next_record: state.next_record,
            next_order: state.next_order,
        }),
    }
}

fn load_media<'a>(
    media: &'a HashMap<MediaRef, SampleBuffer>,
    name: &MediaRef,
) -> Result<&'a SampleBuffer, ProjectError> {
    media
        .get(name)
        .ok_or_else(|| ProjectError::MissingFile(name.clone()))
}

fn load_timeline(
    stored: &StoredTimeline,
    media: &HashMap<MediaRef, SampleBuffer>,
) -> Result<TimelineState, ProjectError> {
    let pool = load_media(media, &stored.pool)?.clone();
    TimelineState::new(pool, stored.graph.clone()).map_err(|e| {
        ProjectError::InvalidStructure(format!("Timeline {} does not match its graph: {}", stored.pool, e))
    })
}

/// Rebuild the base state, log and allocators from their stored form
pub fn history_from_stored(
    history: &ProjectHistory,
    media: &HashMap<MediaRef, SampleBuffer>,
) -> Result<(Arc<TimelineState>, OperationLog, AllocatorState), ProjectError> {
    let base = Arc::new(load_timeline(&history.base, media)?);

    let mut records = Vec::with_capacity(history.records.len());
    for stored in &history.records {
        let body = match &stored.body {
            StoredBody::Content { op, enabled } => RecordBody::Content {
                op: op.clone(),
                enabled: *enabled,
            },
            StoredBody::Structural { op, snapshot } => RecordBody::Structural {
                op: op.try_map_audio(|name| load_media(media, name).cloned())?,
                snapshot: Arc::new(load_timeline(snapshot, media)?),
            },
        };
        records.push(OperationRecord {
            id: stored.id,
            created_order: stored.created_order,
            body,
            meta: stored.meta.clone(),
        });
    }
    let log = OperationLog::from_records(records)
        .map_err(|e| ProjectError::InvalidStructure(format!("Invalid history: {}", e)))?;

    let allocators = history.allocators.ok_or_else(|| {
        ProjectError::MigrationError("History has no allocator state".to_string())
    })?;
    Ok((base, log, allocators))
}

/// Clip id allocator that cannot collide with any stored clip
pub fn clip_allocator(history: &ProjectHistory, allocators: &AllocatorState) -> ClipIdAllocator {
    let floor = history.max_clip_id().map_or(1, |id| id + 1);
    ClipIdAllocator::starting_at(allocators.next_clip.max(floor))
}

/// Serialize the history to RON format
pub fn serialize_history_to_ron(history: &ProjectHistory) -> Result<String, ProjectError> {
    ron_to_string(history).map_err(|e| {
        ProjectError::SerializationError(format!("Failed to serialize history to RON: {}", e))
    })
}

/// Deserialize the history from RON format
pub fn deserialize_history_from_ron(ron_data: &str) -> Result<ProjectHistory, ProjectError> {
    ron_from_str(ron_data).map_err(|e| {
        ProjectError::SerializationError(format!("Failed to deserialize history from RON: {}", e))
    })
}

/// Serialize project metadata to JSON format
pub fn serialize_metadata_to_json(metadata: &ProjectMetadata) -> Result<String, ProjectError> {
    serde_json::to_string_pretty(metadata).map_err(|e| {
        ProjectError::SerializationError(format!("Failed to serialize metadata to JSON: {}", e))
    })
}

/// Deserialize project metadata from JSON format
pub fn deserialize_metadata_from_json(json_data: &str) -> Result<ProjectMetadata, ProjectError> {
    serde_json::from_str(json_data).map_err(|e| {
        ProjectError::SerializationError(format!("Failed to deserialize metadata from JSON: {}", e))
    })
}

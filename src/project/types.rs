// Types for project persistence
//
// The persisted history mirrors the in-memory log, with every audio buffer
// replaced by a reference to a WAV file inside the project archive.

use crate::history::HistoryController;
use crate::history::record::{ContentOp, RecordId, RecordMeta, StructuralOp};
use crate::timeline::ClipGraph;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Path of a WAV file inside the project archive
pub type MediaRef = String;

/// Project version information
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ProjectVersion {
    pub major: u32,
    pub minor: u32,
    pub patch: u32,
}

impl ProjectVersion {
    pub fn new(major: u32, minor: u32, patch: u32) -> Self {
        Self {
            major,
            minor,
            patch,
        }
    }

    /// v1.1 stores the id/order allocators next to the log
    pub fn current() -> Self {
        Self::new(1, 1, 0)
    }
}

impl std::fmt::Display for ProjectVersion {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}.{}.{}", self.major, self.minor, self.patch)
    }
}

/// Project metadata (`manifest.json`)
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ProjectMetadata {
    pub id: Uuid,
    /// Project name
    pub name: String,
    /// Version of the project format
    pub version: ProjectVersion,
    pub created: DateTime<Utc>,
    pub modified: DateTime<Utc>,
    pub sample_rate: u32,
    pub channels: u16,
    /// Author/creator information
    #[serde(default)]
    pub author: Option<String>,
    #[serde(default)]
    pub description: Option<String>,
}

impl Default for ProjectMetadata {
    fn default() -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::new_v4(),
            name: "Untitled Project".to_string(),
            version: ProjectVersion::current(),
            created: now,
            modified: now,
            sample_rate: 44100,
            channels: 2,
            author: None,
            description: None,
        }
    }
}

/// A timeline state as stored on disk
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct StoredTimeline {
    pub pool: MediaRef,
    pub graph: ClipGraph,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub enum StoredBody {
    Content {
        op: ContentOp,
        enabled: bool,
    },
    Structural {
        op: StructuralOp<MediaRef>,
        snapshot: StoredTimeline,
    },
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct StoredRecord {
    pub id: RecordId,
    pub created_order: u64,
    pub meta: RecordMeta,
    pub body: StoredBody,
}

/// Allocator positions, so ids stay unique across sessions (v1.1+)
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub struct AllocatorState {
    pub next_clip: u64,
    pub next_record: u64,
    pub next_order: u64,
}

/// Contents of `history.ron`
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ProjectHistory {
    pub base: StoredTimeline,
    pub records: Vec<StoredRecord>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub allocators: Option<AllocatorState>,
}

impl ProjectHistory {
    /// Every clip id mentioned by a stored graph
    pub fn max_clip_id(&self) -> Option<u64> {
        let snapshots = self.records.iter().filter_map(|r| match &r.body {
            StoredBody::Structural { snapshot, .. } => Some(&snapshot.graph),
            StoredBody::Content { .. } => None,
        });
        std::iter::once(&self.base.graph)
            .chain(snapshots)
            .flat_map(|graph| graph.clips().iter().map(|c| c.id.0))
            .max()
    }

    /// Every media file the history refers to
    pub fn media_refs(&self) -> Vec<&MediaRef> {
        let mut refs = vec![&self.base.pool];
        for record in &self.records {
            if let StoredBody::Structural { op, snapshot } = &record.body {
                match op {
                    StructuralOp::ClipAdd { content, .. } | StructuralOp::Recording { content, .. } => {
                        refs.push(content)
                    }
                    _ => {}
                }
                refs.push(&snapshot.pool);
            }
        }
        refs
    }
}

/// Manifest and history as read from an archive, before media is decoded
#[derive(Debug, Clone, PartialEq)]
pub struct ProjectDocument {
    pub metadata: ProjectMetadata,
    pub history: ProjectHistory,
}

/// An open project
#[derive(Debug)]
pub struct Project {
    pub metadata: ProjectMetadata,
    pub history: HistoryController,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::timeline::ClipId;

    fn history() -> ProjectHistory {
        ProjectHistory {
            base: StoredTimeline {
                pool: "media/0000.wav".to_string(),
                graph: ClipGraph::single(ClipId(1), "Clip 1", 10),
            },
            records: vec![StoredRecord {
                id: RecordId(1),
                created_order: 1,
                meta: RecordMeta::new("Split"),
                body: StoredBody::Structural {
                    op: StructuralOp::ClipSplit {
                        clip: ClipId(1),
                        at: 4,
                    },
                    snapshot: StoredTimeline {
                        pool: "media/0000.wav".to_string(),
                        graph: ClipGraph::single(ClipId(7), "Clip 1 (A)", 10),
                    },
                },
            }],
            allocators: None,
        }
    }

    #[test]
    fn test_project_version() {
        let version = ProjectVersion::new(1, 1, 0);
        assert_eq!(version.to_string(), "1.1.0");
        assert_eq!(ProjectVersion::current(), version);
    }

    #[test]
    fn test_project_metadata_defaults() {
        let a = ProjectMetadata::default();
        let b = ProjectMetadata::default();
        assert_eq!(a.name, "Untitled Project");
        assert_eq!(a.version, ProjectVersion::current());
        assert_ne!(a.id, b.id);
    }

    #[test]
    fn test_max_clip_id_scans_snapshots() {
        assert_eq!(history().max_clip_id(), Some(7));
    }

    #[test]
    fn test_media_refs() {
        let history = history();
        assert_eq!(history.media_refs().len(), 2);
    }

    #[test]
    fn test_history_ron_omits_missing_allocators() {
        let history = history();
        let ron = ron::to_string(&history).unwrap();
        assert!(!ron.contains("allocators"));
        let parsed: ProjectHistory = ron::from_str(&ron).unwrap();
        assert_eq!(parsed, history);
    }
}

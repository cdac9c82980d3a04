// Operation records - the entries of the edit history
//
// Records come in two tiers. Content operations (effect, automation) only
// change audio inside existing clips: they can be toggled and deleted on
// their own and store no snapshot. Structural operations change the clip
// graph: they store the resulting timeline state and can only be removed
// together with everything recorded after them.

use crate::audio::buffer::SampleBuffer;
use crate::automation::AutomatedParam;
use crate::effect::{EffectParams, EffectRegistry};
use crate::timeline::{ClipColor, ClipId, ClipRegion, CutMode, FadeDirection, FadeSpec, TimelineState};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::Arc;

/// Stable record identifier, never reused within a project
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct RecordId(pub u64);

impl fmt::Display for RecordId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum OperationKind {
    Effect,
    Automation,
    Cut,
    Fade,
    ClipAdd,
    ClipSplit,
    ClipDuplicate,
    ClipDelete,
    ClipReorder,
    Recording,
}

impl OperationKind {
    pub fn is_structural(self) -> bool {
        !self.is_content()
    }

    pub fn is_content(self) -> bool {
        matches!(self, OperationKind::Effect | OperationKind::Automation)
    }

    pub fn label(self) -> &'static str {
        match self {
            OperationKind::Effect => "Effect",
            OperationKind::Automation => "Automation",
            OperationKind::Cut => "Cut",
            OperationKind::Fade => "Fade",
            OperationKind::ClipAdd => "Add Clip",
            OperationKind::ClipSplit => "Split",
            OperationKind::ClipDuplicate => "Duplicate",
            OperationKind::ClipDelete => "Delete",
            OperationKind::ClipReorder => "Reorder",
            OperationKind::Recording => "Recording",
        }
    }
}

/// Operation that modifies audio inside an existing clip
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum ContentOp {
    Effect {
        effect_id: String,
        params: EffectParams,
        target: ClipRegion,
    },
    Automation {
        effect_id: String,
        base_params: EffectParams,
        lanes: Vec<AutomatedParam>,
        target: ClipRegion,
    },
}

impl ContentOp {
    pub fn kind(&self) -> OperationKind {
        match self {
            ContentOp::Effect { .. } => OperationKind::Effect,
            ContentOp::Automation { .. } => OperationKind::Automation,
        }
    }

    pub fn effect_id(&self) -> &str {
        match self {
            ContentOp::Effect { effect_id, .. } | ContentOp::Automation { effect_id, .. } => {
                effect_id
            }
        }
    }

    pub fn target(&self) -> &ClipRegion {
        match self {
            ContentOp::Effect { target, .. } | ContentOp::Automation { target, .. } => target,
        }
    }

    pub(crate) fn target_mut(&mut self) -> &mut ClipRegion {
        match self {
            ContentOp::Effect { target, .. } | ContentOp::Automation { target, .. } => target,
        }
    }
}

/// Operation that rewrites the clip graph
///
/// Generic over the audio payload so persistence can swap buffers for
/// references to stored media.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum StructuralOp<A = SampleBuffer> {
    ClipAdd {
        content: A,
        name: String,
        /// Insert position in clip order; None appends
        index: Option<usize>,
    },
    Recording {
        content: A,
        name: String,
    },
    ClipSplit {
        clip: ClipId,
        /// Clip-relative split point
        at: usize,
    },
    ClipDuplicate {
        clip: ClipId,
    },
    ClipDelete {
        clip: ClipId,
    },
    ClipReorder {
        order: Vec<ClipId>,
    },
    Cut {
        target: ClipRegion,
        mode: CutMode,
    },
    Fade {
        clip: ClipId,
        spec: FadeSpec,
    },
}

impl<A> StructuralOp<A> {
    pub fn kind(&self) -> OperationKind {
        match self {
            StructuralOp::ClipAdd { .. } => OperationKind::ClipAdd,
            StructuralOp::Recording { .. } => OperationKind::Recording,
            StructuralOp::ClipSplit { .. } => OperationKind::ClipSplit,
            StructuralOp::ClipDuplicate { .. } => OperationKind::ClipDuplicate,
            StructuralOp::ClipDelete { .. } => OperationKind::ClipDelete,
            StructuralOp::ClipReorder { .. } => OperationKind::ClipReorder,
            StructuralOp::Cut { .. } => OperationKind::Cut,
            StructuralOp::Fade { .. } => OperationKind::Fade,
        }
    }

    /// Convert the audio payload, keeping everything else
    pub fn try_map_audio<B, E, F>(&self, mut f: F) -> Result<StructuralOp<B>, E>
    where
        F: FnMut(&A) -> Result<B, E>,
    {
        Ok(match self {
            StructuralOp::ClipAdd {
                content,
                name,
                index,
            } => StructuralOp::ClipAdd {
                content: f(content)?,
                name: name.clone(),
                index: *index,
            },
            StructuralOp::Recording { content, name } => StructuralOp::Recording {
                content: f(content)?,
                name: name.clone(),
            },
            StructuralOp::ClipSplit { clip, at } => StructuralOp::ClipSplit {
                clip: *clip,
                at: *at,
            },
            StructuralOp::ClipDuplicate { clip } => StructuralOp::ClipDuplicate { clip: *clip },
            StructuralOp::ClipDelete { clip } => StructuralOp::ClipDelete { clip: *clip },
            StructuralOp::ClipReorder { order } => StructuralOp::ClipReorder {
                order: order.clone(),
            },
            StructuralOp::Cut { target, mode } => StructuralOp::Cut {
                target: *target,
                mode: *mode,
            },
            StructuralOp::Fade { clip, spec } => StructuralOp::Fade {
                clip: *clip,
                spec: *spec,
            },
        })
    }
}

/// A user action to record
#[derive(Debug, Clone, PartialEq)]
pub enum Operation {
    Content(ContentOp),
    Structural(StructuralOp),
}

impl Operation {
    pub fn kind(&self) -> OperationKind {
        match self {
            Operation::Content(op) => op.kind(),
            Operation::Structural(op) => op.kind(),
        }
    }

    /// Shorthand for a plain effect on a clip region
    pub fn effect(effect_id: impl Into<String>, params: EffectParams, target: ClipRegion) -> Self {
        Operation::Content(ContentOp::Effect {
            effect_id: effect_id.into(),
            params,
            target,
        })
    }

    pub fn automation(
        effect_id: impl Into<String>,
        base_params: EffectParams,
        lanes: Vec<AutomatedParam>,
        target: ClipRegion,
    ) -> Self {
        Operation::Content(ContentOp::Automation {
            effect_id: effect_id.into(),
            base_params,
            lanes,
            target,
        })
    }

    pub fn add_clip(content: SampleBuffer, name: impl Into<String>) -> Self {
        Operation::Structural(StructuralOp::ClipAdd {
            content,
            name: name.into(),
            index: None,
        })
    }

    pub fn recording(content: SampleBuffer, name: impl Into<String>) -> Self {
        Operation::Structural(StructuralOp::Recording {
            content,
            name: name.into(),
        })
    }

    pub fn split(clip: ClipId, at: usize) -> Self {
        Operation::Structural(StructuralOp::ClipSplit { clip, at })
    }

    pub fn duplicate(clip: ClipId) -> Self {
        Operation::Structural(StructuralOp::ClipDuplicate { clip })
    }

    pub fn delete_clip(clip: ClipId) -> Self {
        Operation::Structural(StructuralOp::ClipDelete { clip })
    }

    pub fn reorder(order: Vec<ClipId>) -> Self {
        Operation::Structural(StructuralOp::ClipReorder { order })
    }

    pub fn cut(target: ClipRegion, mode: CutMode) -> Self {
        Operation::Structural(StructuralOp::Cut { target, mode })
    }

    pub fn fade(clip: ClipId, spec: FadeSpec) -> Self {
        Operation::Structural(StructuralOp::Fade { clip, spec })
    }

    /// Default history label, using effect display names from `registry`
    pub fn default_name(&self, registry: &EffectRegistry) -> String {
        match self {
            Operation::Content(op) => {
                let prefix = match op {
                    ContentOp::Effect { .. } => "Apply",
                    ContentOp::Automation { .. } => "Automate",
                };
                format!("{} {}", prefix, registry.display_name(op.effect_id()))
            }
            Operation::Structural(StructuralOp::Fade { spec, .. }) => match spec.direction {
                FadeDirection::In => "Fade In".to_string(),
                FadeDirection::Out => "Fade Out".to_string(),
            },
            Operation::Structural(StructuralOp::Cut { mode, .. }) => match mode {
                CutMode::Silence => "Cut (silence)".to_string(),
                CutMode::Splice => "Cut (splice)".to_string(),
            },
            Operation::Structural(op) => op.kind().label().to_string(),
        }
    }
}

/// Whether an action targeted a region or the whole timeline
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum Scope {
    #[default]
    Local,
    Global,
}

/// Display metadata; never affects rendering
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RecordMeta {
    pub name: String,
    pub scope: Scope,
    pub color: ClipColor,
    pub timestamp: DateTime<Utc>,
}

impl RecordMeta {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            scope: Scope::Local,
            color: ClipColor::distinct(0),
            timestamp: Utc::now(),
        }
    }

    pub fn with_scope(mut self, scope: Scope) -> Self {
        self.scope = scope;
        self
    }

    pub fn with_color(mut self, color: ClipColor) -> Self {
        self.color = color;
        self
    }
}

/// Tier-specific payload of a record
#[derive(Debug, Clone, PartialEq)]
pub enum RecordBody {
    Content {
        op: ContentOp,
        enabled: bool,
    },
    Structural {
        op: StructuralOp,
        /// Timeline state right after this operation
        snapshot: Arc<TimelineState>,
    },
}

/// One entry of the operation log
#[derive(Debug, Clone, PartialEq)]
pub struct OperationRecord {
    pub id: RecordId,
    /// Position in the total order of the log
    pub created_order: u64,
    pub body: RecordBody,
    pub meta: RecordMeta,
}

impl OperationRecord {
    pub fn kind(&self) -> OperationKind {
        match &self.body {
            RecordBody::Content { op, .. } => op.kind(),
            RecordBody::Structural { op, .. } => op.kind(),
        }
    }

    pub fn is_structural(&self) -> bool {
        matches!(self.body, RecordBody::Structural { .. })
    }

    /// Structural records are always active
    pub fn is_enabled(&self) -> bool {
        match &self.body {
            RecordBody::Content { enabled, .. } => *enabled,
            RecordBody::Structural { .. } => true,
        }
    }

    pub fn content(&self) -> Option<&ContentOp> {
        match &self.body {
            RecordBody::Content { op, .. } => Some(op),
            RecordBody::Structural { .. } => None,
        }
    }

    pub fn snapshot(&self) -> Option<&Arc<TimelineState>> {
        match &self.body {
            RecordBody::Structural { snapshot, .. } => Some(snapshot),
            RecordBody::Content { .. } => None,
        }
    }
}

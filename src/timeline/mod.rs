// Timeline - clips, clip graph and the source pool they read from
//
// Architecture:
// - Clip / ClipId: a named window into the source pool, positioned on the timeline
// - ClipGraph: ordered, gap-free clip topology with the structural recipes
// - ClipRegion: clip-relative addressing used by history targets
// - TimelineState: pool + graph, the value stored in structural snapshots

pub mod clip;
pub mod graph;
pub mod region;
pub mod state;

pub use clip::{Clip, ClipColor, ClipId, ClipIdAllocator, SourceRange};
pub use graph::{ClipGraph, GraphError, GraphResult};
pub use region::ClipRegion;
pub use state::{CutMode, FadeDirection, FadeSpec, TimelineState};

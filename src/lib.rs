// Glitch History - non-destructive edit history and deterministic render engine

pub mod audio;
pub mod automation;
pub mod command;
pub mod config;
pub mod effect;
pub mod error;
pub mod history;
pub mod messaging;
pub mod project;
pub mod render;
pub mod timeline;

// Re-export commonly used types for convenience
pub use audio::buffer::SampleBuffer;
pub use command::{CommandError, CommandManager, HistoryState, UndoableCommand};
pub use config::{EngineConfig, load_config, save_config};
pub use effect::{Effect, EffectParams, EffectRegistry};
pub use error::{Error, Result};
pub use history::{
    DeleteMode, HistoryController, HistoryError, Operation, OperationLog, OperationRecord, RecordId,
};
pub use messaging::channels::create_notification_channel;
pub use project::{Project, ProjectManager};
pub use render::{CancelToken, RenderEngine, RenderOutput, RenderWorker};
pub use timeline::{ClipGraph, ClipId, ClipRegion, CutMode, FadeSpec, TimelineState};

// Render - deterministic reconstruction of the timeline from the log
//
// Architecture:
// - engine: anchor snapshot + content replay, structural application
// - cache: prefix-keyed memoization of intermediate states
// - cancel: cooperative cancellation flag
// - worker: background thread, one request in flight, generation-tagged

pub mod cache;
pub mod cancel;
pub mod engine;
pub mod worker;

pub use cache::{CacheKey, CacheStats, RenderCache};
pub use cancel::CancelToken;
pub use engine::{RenderEngine, RenderError, RenderOutput, RenderResult, RenderSettings};
pub use worker::{PublishedRender, RenderWorker};

// Effect system - offline effects applied to regions of sample buffers

pub mod builtin;
pub mod params;
pub mod registry;
pub mod trait_def;

pub use params::{EffectParams, ParamValue};
pub use registry::EffectRegistry;
pub use trait_def::{Effect, EffectError, EffectResult, Region};

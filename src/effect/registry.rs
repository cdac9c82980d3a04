// Effect Registry - identifier -> effect implementation

use crate::audio::buffer::SampleBuffer;
use crate::effect::builtin;
use crate::effect::params::EffectParams;
use crate::effect::trait_def::{Effect, EffectError, EffectResult, Region};
use std::collections::HashMap;
use std::sync::Arc;

/// Mapping from effect identifier to implementation
///
/// The registry holds no state besides the mapping itself. `apply` enforces
/// the effect contract (valid region, matching channel layout, length only
/// changed by effects that declare it) so a misbehaving effect surfaces as
/// an error instead of a corrupted timeline.
#[derive(Clone, Default)]
pub struct EffectRegistry {
    effects: HashMap<String, Arc<dyn Effect>>,
}

impl EffectRegistry {
    /// Empty registry
    pub fn new() -> Self {
        Self::default()
    }

    /// Registry pre-populated with the built-in effects
    pub fn with_builtins() -> Self {
        Self::with_builtins_micro_fade(builtin::DEFAULT_MICRO_FADE_SAMPLES)
    }

    /// Built-in effects using `micro_fade` samples of anti-click fade
    pub fn with_builtins_micro_fade(micro_fade: usize) -> Self {
        let mut registry = Self::new();
        for effect in builtin::all_with_micro_fade(micro_fade) {
            registry.register(effect);
        }
        registry
    }

    /// Register an effect, replacing any previous one with the same id
    pub fn register(&mut self, effect: Arc<dyn Effect>) -> Option<Arc<dyn Effect>> {
        let id = effect.id().to_string();
        log::debug!("Registering effect '{}'", id);
        self.effects.insert(id, effect)
    }

    pub fn get(&self, effect_id: &str) -> Option<&Arc<dyn Effect>> {
        self.effects.get(effect_id)
    }

    pub fn contains(&self, effect_id: &str) -> bool {
        self.effects.contains_key(effect_id)
    }

    /// Registered ids, sorted
    pub fn ids(&self) -> Vec<&str> {
        let mut ids: Vec<&str> = self.effects.keys().map(String::as_str).collect();
        ids.sort_unstable();
        ids
    }

    pub fn len(&self) -> usize {
        self.effects.len()
    }

    pub fn is_empty(&self) -> bool {
        self.effects.is_empty()
    }

    /// Display name for `effect_id`, falling back to the id itself
    pub fn display_name(&self, effect_id: &str) -> String {
        self.effects
            .get(effect_id)
            .map(|e| e.name().to_string())
            .unwrap_or_else(|| effect_id.to_string())
    }

    /// Apply `effect_id` to `region` of `buffer`, returning the region's new audio
    pub fn apply(
        &self,
        effect_id: &str,
        buffer: &SampleBuffer,
        region: Region,
        params: &EffectParams,
    ) -> EffectResult<SampleBuffer> {
        let effect = self
            .effects
            .get(effect_id)
            .ok_or_else(|| EffectError::UnknownEffect(effect_id.to_string()))?;
        region.check(buffer.len())?;

        let output = effect.apply(buffer, region, params)?;

        if output.channel_count() != buffer.channel_count() {
            return Err(EffectError::ChannelContract {
                effect: effect_id.to_string(),
                expected: buffer.channel_count(),
                actual: output.channel_count(),
            });
        }
        if !effect.changes_length() && output.len() != region.len() {
            return Err(EffectError::LengthContract {
                effect: effect_id.to_string(),
                expected: region.len(),
                actual: output.len(),
            });
        }
        Ok(output)
    }
}

impl std::fmt::Debug for EffectRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EffectRegistry")
            .field("effects", &self.ids())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Effect that drops half the region without declaring it
    struct Shrinker;

    impl Effect for Shrinker {
        fn id(&self) -> &str {
            "shrinker"
        }

        fn name(&self) -> &str {
            "Shrinker"
        }

        fn apply(
            &self,
            input: &SampleBuffer,
            region: Region,
            _params: &EffectParams,
        ) -> EffectResult<SampleBuffer> {
            Ok(input.slice(region.start..region.start + region.len() / 2)?)
        }
    }

    fn ramp(len: usize) -> SampleBuffer {
        SampleBuffer::from_mono((0..len).map(|i| i as f32 / len as f32).collect(), 44100).unwrap()
    }

    #[test]
    fn test_builtins_registered() {
        let registry = EffectRegistry::with_builtins();
        for id in ["volume", "reverse", "time_stretch", "tape_stop", "stutter", "silence"] {
            assert!(registry.contains(id), "missing {}", id);
        }
        assert_eq!(registry.display_name("volume"), "Volume");
        assert_eq!(registry.display_name("nope"), "nope");
    }

    #[test]
    fn test_unknown_effect() {
        let registry = EffectRegistry::with_builtins();
        let result = registry.apply("nope", &ramp(16), Region::whole(16), &EffectParams::new());
        assert_eq!(result.unwrap_err(), EffectError::UnknownEffect("nope".into()));
    }

    #[test]
    fn test_region_checked_before_apply() {
        let registry = EffectRegistry::with_builtins();
        let result = registry.apply("volume", &ramp(16), Region::new(8, 32), &EffectParams::new());
        assert!(matches!(result, Err(EffectError::InvalidRegion { .. })));
    }

    #[test]
    fn test_undeclared_length_change_rejected() {
        let mut registry = EffectRegistry::new();
        registry.register(Arc::new(Shrinker));
        let result = registry.apply("shrinker", &ramp(16), Region::whole(16), &EffectParams::new());
        assert!(matches!(
            result,
            Err(EffectError::LengthContract {
                expected: 16,
                actual: 8,
                ..
            })
        ));
    }

    #[test]
    fn test_apply_does_not_touch_input() {
        let registry = EffectRegistry::with_builtins();
        let input = ramp(64);
        let before = input.clone();
        let params = EffectParams::new().with("gain_pct", 50.0);
        let out = registry.apply("volume", &input, Region::new(16, 48), &params).unwrap();
        assert_eq!(out.len(), 32);
        assert_eq!(input, before);
    }
}

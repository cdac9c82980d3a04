// Automation - effect parameters that vary over the target region
//
// A lane either holds a constant value or interpolates between a default and
// a target value along a normalized curve. The region is processed in fixed
// chunks; every chunk sees the parameter vector evaluated at its first
// sample.

use crate::audio::buffer::{BufferError, SampleBuffer};
use crate::effect::{EffectError, EffectParams, EffectRegistry, Region};
use crate::render::cancel::CancelToken;
use serde::{Deserialize, Serialize};

/// Default chunk length in samples
pub const DEFAULT_CHUNK_SIZE: usize = 2048;

pub type AutomationResult<T> = Result<T, AutomationError>;

#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum AutomationError {
    #[error("Effect failed at chunk starting {position}: {source}")]
    Effect {
        position: usize,
        #[source]
        source: EffectError,
    },

    #[error("Chunk size must be positive")]
    ZeroChunkSize,

    #[error("Automation cancelled")]
    Cancelled,

    #[error("Buffer error: {0}")]
    Buffer(#[from] BufferError),
}

/// Normalized control points, sorted by `x`
///
/// Both coordinates live in [0, 1]. Outside the first/last point the curve
/// holds the boundary value.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(from = "Vec<(f64, f64)>", into = "Vec<(f64, f64)>")]
pub struct AutomationCurve {
    points: Vec<(f64, f64)>,
}

impl AutomationCurve {
    pub fn new(points: Vec<(f64, f64)>) -> Self {
        let mut points: Vec<(f64, f64)> = points
            .into_iter()
            .filter(|(x, y)| x.is_finite() && y.is_finite())
            .map(|(x, y)| (x.clamp(0.0, 1.0), y.clamp(0.0, 1.0)))
            .collect();
        points.sort_by(|a, b| a.0.total_cmp(&b.0));
        Self { points }
    }

    /// Straight ramp from 0 to 1
    pub fn linear() -> Self {
        Self::new(vec![(0.0, 0.0), (1.0, 1.0)])
    }

    pub fn points(&self) -> &[(f64, f64)] {
        &self.points
    }

    /// Curve value at normalized position `x`
    pub fn interpolate(&self, x: f64) -> f64 {
        let (first, last) = match (self.points.first(), self.points.last()) {
            (Some(first), Some(last)) => (*first, *last),
            _ => return 0.0,
        };
        if x <= first.0 {
            return first.1;
        }
        if x >= last.0 {
            return last.1;
        }
        for pair in self.points.windows(2) {
            let ((x0, y0), (x1, y1)) = (pair[0], pair[1]);
            if x0 <= x && x <= x1 {
                if x1 == x0 {
                    return y0;
                }
                let t = (x - x0) / (x1 - x0);
                return y0 + t * (y1 - y0);
            }
        }
        last.1
    }
}

impl Default for AutomationCurve {
    fn default() -> Self {
        Self::linear()
    }
}

impl From<Vec<(f64, f64)>> for AutomationCurve {
    fn from(points: Vec<(f64, f64)>) -> Self {
        Self::new(points)
    }
}

impl From<AutomationCurve> for Vec<(f64, f64)> {
    fn from(curve: AutomationCurve) -> Self {
        curve.points
    }
}

/// One automated or constant effect parameter
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum AutomatedParam {
    Constant {
        key: String,
        value: f64,
    },
    Automated {
        key: String,
        default: f64,
        target: f64,
        curve: AutomationCurve,
    },
}

impl AutomatedParam {
    pub fn constant(key: impl Into<String>, value: f64) -> Self {
        AutomatedParam::Constant {
            key: key.into(),
            value,
        }
    }

    pub fn automated(key: impl Into<String>, default: f64, target: f64, curve: AutomationCurve) -> Self {
        AutomatedParam::Automated {
            key: key.into(),
            default,
            target,
            curve,
        }
    }

    pub fn key(&self) -> &str {
        match self {
            AutomatedParam::Constant { key, .. } | AutomatedParam::Automated { key, .. } => key,
        }
    }

    /// Effective value at normalized position `x`
    pub fn value_at(&self, x: f64) -> f64 {
        match self {
            AutomatedParam::Constant { value, .. } => *value,
            AutomatedParam::Automated {
                default,
                target,
                curve,
                ..
            } => default + curve.interpolate(x) * (target - default),
        }
    }
}

/// Parameter vector for normalized position `x`
pub fn params_at(base: &EffectParams, lanes: &[AutomatedParam], x: f64) -> EffectParams {
    let mut params = base.clone();
    for lane in lanes {
        params.set(lane.key(), lane.value_at(x));
    }
    params
}

/// Apply `effect_id` over `region` of `input` with automated parameters
///
/// Returns the new audio for the region. Output length always equals the
/// region length: a chunk the effect returns with a different length keeps
/// its unprocessed audio.
#[allow(clippy::too_many_arguments)]
pub fn apply_automation(
    registry: &EffectRegistry,
    effect_id: &str,
    input: &SampleBuffer,
    region: Region,
    base_params: &EffectParams,
    lanes: &[AutomatedParam],
    chunk_size: usize,
    cancel: Option<&CancelToken>,
) -> AutomationResult<SampleBuffer> {
    if chunk_size == 0 {
        return Err(AutomationError::ZeroChunkSize);
    }
    region
        .check(input.len())
        .map_err(|source| AutomationError::Effect {
            position: region.start,
            source,
        })?;

    let region_len = region.len() as f64;
    let mut parts = Vec::with_capacity(region.len().div_ceil(chunk_size));
    let mut pos = region.start;

    while pos < region.end {
        if cancel.is_some_and(CancelToken::is_cancelled) {
            return Err(AutomationError::Cancelled);
        }
        let chunk_end = (pos + chunk_size).min(region.end);
        let norm_x = (pos - region.start) as f64 / region_len;
        let params = params_at(base_params, lanes, norm_x);

        let chunk = Region::new(pos, chunk_end);
        let processed = registry
            .apply(effect_id, input, chunk, &params)
            .map_err(|source| AutomationError::Effect {
                position: pos,
                source,
            })?;

        if processed.len() == chunk.len() {
            parts.push(processed);
        } else {
            log::debug!(
                "Automation chunk {}..{} changed length to {}, keeping original",
                pos,
                chunk_end,
                processed.len()
            );
            parts.push(input.slice(chunk.as_range())?);
        }
        pos = chunk_end;
    }

    Ok(SampleBuffer::concat(&parts)?.unwrap_or_else(|| input.silence_like(0)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn test_interpolate_curve() {
        let curve = AutomationCurve::new(vec![(1.0, 0.0), (0.0, 0.0), (0.5, 1.0)]);
        assert_eq!(curve.points()[1], (0.5, 1.0));
        assert_relative_eq!(curve.interpolate(0.25), 0.5);
        assert_relative_eq!(curve.interpolate(0.75), 0.5);
        assert_relative_eq!(curve.interpolate(-1.0), 0.0);
        assert_relative_eq!(AutomationCurve::new(vec![]).interpolate(0.3), 0.0);
        assert_relative_eq!(AutomationCurve::new(vec![(0.2, 0.7)]).interpolate(0.9), 0.7);
    }

    #[test]
    fn test_value_at() {
        let lane = AutomatedParam::automated("gain_pct", 100.0, 0.0, AutomationCurve::linear());
        assert_relative_eq!(lane.value_at(0.0), 100.0);
        assert_relative_eq!(lane.value_at(0.5), 50.0);
        assert_relative_eq!(AutomatedParam::constant("x", 3.0).value_at(0.9), 3.0);
    }

    #[test]
    fn test_volume_ramp_per_chunk() {
        let registry = EffectRegistry::with_builtins();
        let input = SampleBuffer::from_mono(vec![0.5; 4096], 44100).unwrap();
        let lanes = vec![AutomatedParam::automated(
            "gain_pct",
            100.0,
            0.0,
            AutomationCurve::linear(),
        )];
        let out = apply_automation(
            &registry,
            "volume",
            &input,
            Region::whole(4096),
            &EffectParams::new(),
            &lanes,
            1024,
            None,
        )
        .unwrap();

        assert_eq!(out.len(), 4096);
        // Chunk starts at x = 0, 0.25, 0.5, 0.75
        assert_relative_eq!(out.sample(0, 0).unwrap(), 0.5);
        assert_relative_eq!(out.sample(0, 1024).unwrap(), 0.375);
        assert_relative_eq!(out.sample(0, 2048).unwrap(), 0.25);
        assert_relative_eq!(out.sample(0, 4095).unwrap(), 0.125);
    }

    #[test]
    fn test_length_changing_chunk_keeps_original() {
        let registry = EffectRegistry::with_builtins();
        let input = SampleBuffer::from_mono((0..512).map(|i| i as f32 / 512.0).collect(), 44100).unwrap();
        let lanes = vec![AutomatedParam::constant("factor", 2.0)];
        let out = apply_automation(
            &registry,
            "time_stretch",
            &input,
            Region::new(0, 512),
            &EffectParams::new(),
            &lanes,
            128,
            None,
        )
        .unwrap();
        assert_eq!(out, input);
    }

    #[test]
    fn test_cancelled() {
        let registry = EffectRegistry::with_builtins();
        let input = SampleBuffer::from_mono(vec![0.1; 64], 44100).unwrap();
        let token = CancelToken::new();
        token.cancel();
        let result = apply_automation(
            &registry,
            "volume",
            &input,
            Region::whole(64),
            &EffectParams::new(),
            &[],
            16,
            Some(&token),
        );
        assert_eq!(result.unwrap_err(), AutomationError::Cancelled);
    }
}

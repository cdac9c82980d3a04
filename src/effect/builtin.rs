// Effets intégrés - volume, reverse, stutter, time-stretch, tape-stop, silence
//
// Chaque effet travaille sur une copie planaire de la région et renvoie
// uniquement l'audio de la région. Aucun état n'est conservé entre deux
// appels: le rendu reste déterministe.

use crate::audio::buffer::SampleBuffer;
use crate::audio::dsp_utils::{apply_micro_fade, flush_denormals_to_zero, hard_clip, resample_linear};
use crate::effect::params::EffectParams;
use crate::effect::trait_def::{Effect, EffectError, EffectResult, Region};
use std::sync::Arc;

/// Longueur par défaut du micro-fondu anti-clic
pub const DEFAULT_MICRO_FADE_SAMPLES: usize = 64;

/// Tous les effets intégrés avec le micro-fondu par défaut
pub fn all() -> Vec<Arc<dyn Effect>> {
    all_with_micro_fade(DEFAULT_MICRO_FADE_SAMPLES)
}

/// Tous les effets intégrés avec un micro-fondu de `micro_fade` échantillons
pub fn all_with_micro_fade(micro_fade: usize) -> Vec<Arc<dyn Effect>> {
    vec![
        Arc::new(Volume),
        Arc::new(Reverse { micro_fade }),
        Arc::new(Stutter { micro_fade }),
        Arc::new(TimeStretch { micro_fade }),
        Arc::new(TapeStop),
        Arc::new(Silence),
    ]
}

fn invalid(name: &str, reason: impl Into<String>) -> EffectError {
    EffectError::InvalidParameter {
        name: name.to_string(),
        reason: reason.into(),
    }
}

/// Lit un paramètre numérique borné
fn ranged(params: &EffectParams, key: &str, default: f64, min: f64, max: f64) -> EffectResult<f64> {
    let value = params.get_f64_or(key, default);
    if !value.is_finite() || value < min || value > max {
        return Err(invalid(key, format!("{} not in [{}, {}]", value, min, max)));
    }
    Ok(value)
}

/// Construit un buffer planaire au format de `like`
fn planar(channels: Vec<Vec<f32>>, like: &SampleBuffer) -> EffectResult<SampleBuffer> {
    if channels.first().is_none_or(Vec::is_empty) {
        return Ok(like.silence_like(0));
    }
    Ok(SampleBuffer::from_channels(channels, like.sample_rate())?)
}

/// Gain en pourcentage (0% à 10000%), avec clipping dur
///
/// `gain` (linéaire) est accepté en alternative à `gain_pct`.
pub struct Volume;

impl Effect for Volume {
    fn id(&self) -> &str {
        "volume"
    }

    fn name(&self) -> &str {
        "Volume"
    }

    fn apply(&self, input: &SampleBuffer, region: Region, params: &EffectParams) -> EffectResult<SampleBuffer> {
        let gain = match params.get("gain") {
            Some(_) => ranged(params, "gain", 1.0, 0.0, 100.0)?,
            None => ranged(params, "gain_pct", 100.0, 0.0, 10_000.0)? / 100.0,
        } as f32;
        let segment = input.slice(region.as_range())?;
        Ok(segment.map_channels(|_, samples| {
            for s in samples.iter_mut() {
                *s = hard_clip(*s * gain);
            }
        }))
    }
}

/// Inverse la région
pub struct Reverse {
    micro_fade: usize,
}

impl Effect for Reverse {
    fn id(&self) -> &str {
        "reverse"
    }

    fn name(&self) -> &str {
        "Reverse"
    }

    fn apply(&self, input: &SampleBuffer, region: Region, _params: &EffectParams) -> EffectResult<SampleBuffer> {
        let fade = self.micro_fade.min(region.len() / 4);
        let segment = input.slice(region.as_range())?;
        Ok(segment.map_channels(|_, samples| {
            samples.reverse();
            apply_micro_fade(samples, fade);
        }))
    }
}

/// Répète la région (`repeats` fois), avec décroissance optionnelle
///
/// Modes: `normal`, `halving` (chaque répétition fait la moitié de la
/// précédente), `reverse_alt` (alterne sens normal et inversé).
pub struct Stutter {
    micro_fade: usize,
}

impl Effect for Stutter {
    fn id(&self) -> &str {
        "stutter"
    }

    fn name(&self) -> &str {
        "Stutter"
    }

    fn changes_length(&self) -> bool {
        true
    }

    fn apply(&self, input: &SampleBuffer, region: Region, params: &EffectParams) -> EffectResult<SampleBuffer> {
        let repeats = ranged(params, "repeats", 4.0, 1.0, 32.0)? as usize;
        let decay = ranged(params, "decay", 0.0, 0.0, 1.0)? as f32;
        let mode = params.get_str("mode").unwrap_or("normal");
        if !matches!(mode, "normal" | "halving" | "reverse_alt") {
            return Err(invalid("mode", format!("unknown stutter mode '{}'", mode)));
        }

        let source = input.slice(region.as_range())?.to_channels();
        let mut channels = Vec::with_capacity(source.len());
        for mut segment in source {
            let edge = self.micro_fade.min(segment.len() / 4);
            apply_micro_fade(&mut segment, edge);
            let mut out = Vec::with_capacity(segment.len() * repeats);
            for i in 0..repeats {
                let mut part: Vec<f32> = match mode {
                    "halving" => {
                        let length = (segment.len() >> i.min(31)).max(64).min(segment.len());
                        segment[..length].to_vec()
                    }
                    "reverse_alt" if i % 2 == 1 => segment.iter().rev().copied().collect(),
                    _ => segment.clone(),
                };
                if decay > 0.0 {
                    let volume = (1.0 - decay).powi(i as i32);
                    part.iter_mut().for_each(|s| *s *= volume);
                }
                let edge = (self.micro_fade / 2).min(part.len() / 4);
                apply_micro_fade(&mut part, edge);
                out.extend_from_slice(&part);
            }
            channels.push(out);
        }
        planar(channels, input)
    }
}

/// Étire (`factor` > 1) ou compresse (`factor` < 1) la région
pub struct TimeStretch {
    micro_fade: usize,
}

impl Effect for TimeStretch {
    fn id(&self) -> &str {
        "time_stretch"
    }

    fn name(&self) -> &str {
        "Time Stretch"
    }

    fn changes_length(&self) -> bool {
        true
    }

    fn apply(&self, input: &SampleBuffer, region: Region, params: &EffectParams) -> EffectResult<SampleBuffer> {
        let factor = ranged(params, "factor", 1.5, 0.1, 8.0)?;
        let new_len = ((region.len() as f64 * factor) as usize).max(64);
        let segment = input.slice(region.as_range())?;
        Ok(segment.map_channels(|_, samples| {
            let mut stretched = resample_linear(samples, new_len);
            apply_micro_fade(&mut stretched, self.micro_fade);
            *samples = stretched;
        }))
    }
}

/// Ralentissement progressif façon arrêt de cassette
///
/// La fin de la région (`duration_pct`) ralentit par 64 paliers jusqu'à 5%
/// de la vitesse, avec un volume décroissant; le résultat est ramené à la
/// longueur de la région.
pub struct TapeStop;

const TAPE_STOP_STEPS: usize = 64;

impl Effect for TapeStop {
    fn id(&self) -> &str {
        "tape_stop"
    }

    fn name(&self) -> &str {
        "Tape Stop"
    }

    fn changes_length(&self) -> bool {
        true
    }

    fn apply(&self, input: &SampleBuffer, region: Region, params: &EffectParams) -> EffectResult<SampleBuffer> {
        let duration_pct = ranged(params, "duration_pct", 0.5, 0.0, 1.0)?;
        let seg_len = region.len();
        let effect_len = ((seg_len as f64 * duration_pct) as usize).max(256).min(seg_len);
        let clean_len = seg_len - effect_len;

        let segment = input.slice(region.as_range())?;
        Ok(segment.map_channels(|_, samples| {
            let effect_part = samples.split_off(clean_len);
            let chunk_size = (effect_part.len() / TAPE_STOP_STEPS).max(1);
            for (i, chunk) in effect_part.chunks(chunk_size).take(TAPE_STOP_STEPS).enumerate() {
                let progress = i as f32 / TAPE_STOP_STEPS as f32;
                let speed = (1.0 - progress * 0.95).max(0.05);
                let volume = (1.0 - progress * 0.8).max(0.0);
                let new_len = ((chunk.len() as f32 / speed) as usize).max(4);
                samples.extend(
                    resample_linear(chunk, new_len)
                        .into_iter()
                        .map(|s| flush_denormals_to_zero(s * volume)),
                );
            }
            samples.resize(seg_len, 0.0);
        }))
    }
}

/// Remplace la région par du silence
pub struct Silence;

impl Effect for Silence {
    fn id(&self) -> &str {
        "silence"
    }

    fn name(&self) -> &str {
        "Silence"
    }

    fn apply(&self, input: &SampleBuffer, region: Region, _params: &EffectParams) -> EffectResult<SampleBuffer> {
        Ok(input.silence_like(region.len()))
    }
}

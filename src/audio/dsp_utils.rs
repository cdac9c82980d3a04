// Utilitaires DSP - Courbes de fondu et hygiène des jointures
//
// Ce module contient les fonctions partagées par les effets intégrés et par
// les opérations structurelles (fade in/out, cut): génération de courbes,
// micro-fondus anti-clic et clipping.

use serde::{Deserialize, Serialize};

/// Flush denormals to zero (anti-dénormaux)
///
/// Seuil: 1e-15 (largement sous le bruit numérique à 32-bit float)
#[inline]
pub fn flush_denormals_to_zero(x: f32) -> f32 {
    if x.abs() < 1e-15 { 0.0 } else { x }
}

/// Hard clipping
///
/// Clamp strict dans [-1, 1]. Utilisé par le gain pour rester dans la plage
/// représentable à l'export.
#[inline]
pub fn hard_clip(x: f32) -> f32 {
    x.clamp(-1.0, 1.0)
}

/// Forme d'une courbe de fondu
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize, Default)]
pub enum FadeCurve {
    #[default]
    Linear,
    /// t³ (démarrage lent)
    Exponential,
    /// 1 - (1-t)³ (démarrage rapide)
    Logarithmic,
    /// 3t² - 2t³
    SCurve,
    /// Courbure libre dans [-100, 100]; 0 = linéaire
    ///
    /// Mappée sur l'exposant 2^(c / 33.33): +100 ≈ 8, -100 ≈ 0.125.
    Curvature(f32),
}

impl FadeCurve {
    /// Évalue la courbe en t ∈ [0, 1]
    pub fn eval(self, t: f32) -> f32 {
        let t = t.clamp(0.0, 1.0);
        match self {
            FadeCurve::Linear => t,
            FadeCurve::Exponential => t * t * t,
            FadeCurve::Logarithmic => 1.0 - (1.0 - t).powi(3),
            FadeCurve::SCurve => 3.0 * t * t - 2.0 * t * t * t,
            FadeCurve::Curvature(c) if c == 0.0 => t,
            FadeCurve::Curvature(c) => {
                let exponent = 2.0_f32.powf(c.clamp(-100.0, 100.0) / 33.33);
                t.powf(exponent)
            }
        }
    }
}

/// Génère une rampe 0→1 de `n` échantillons (bornes incluses)
pub fn fade_curve(n: usize, curve: FadeCurve) -> Vec<f32> {
    match n {
        0 => Vec::new(),
        1 => vec![curve.eval(0.0)],
        _ => {
            let denom = (n - 1) as f32;
            (0..n).map(|i| curve.eval(i as f32 / denom)).collect()
        }
    }
}

/// Applique un fondu d'entrée sur les `n` premiers échantillons
pub fn apply_fade_in(
    samples: &mut [f32],
    n: usize,
    curve: FadeCurve,
    start_level: f32,
    end_level: f32,
) {
    let n = n.min(samples.len());
    let ramp = fade_curve(n, curve);
    for (sample, g) in samples[..n].iter_mut().zip(ramp) {
        *sample *= start_level + g * (end_level - start_level);
    }
}

/// Applique un fondu de sortie sur les `n` derniers échantillons
pub fn apply_fade_out(
    samples: &mut [f32],
    n: usize,
    curve: FadeCurve,
    start_level: f32,
    end_level: f32,
) {
    let n = n.min(samples.len());
    let offset = samples.len() - n;
    let ramp = fade_curve(n, curve);
    // La rampe est parcourue à l'envers: 1 -> 0 pour une courbe linéaire
    for (sample, g) in samples[offset..].iter_mut().zip(ramp.into_iter().rev()) {
        *sample *= end_level + g * (start_level - end_level);
    }
}

/// Micro-fondu anti-clic aux deux extrémités
///
/// Limité à la moitié de la longueur pour ne jamais se chevaucher.
pub fn apply_micro_fade(samples: &mut [f32], fade_samples: usize) {
    let n = fade_samples.min(samples.len() / 2);
    if n == 0 {
        return;
    }
    let ramp = fade_curve(n, FadeCurve::Linear);
    let len = samples.len();
    for (i, g) in ramp.iter().enumerate() {
        samples[i] *= g;
        samples[len - 1 - i] *= g;
    }
}

/// Rééchantillonnage linéaire vers `new_len` échantillons
///
/// Déterministe: ne dépend que des entrées. Utilisé par time-stretch et
/// tape-stop.
pub fn resample_linear(samples: &[f32], new_len: usize) -> Vec<f32> {
    if new_len == 0 || samples.is_empty() {
        return vec![0.0; new_len];
    }
    if samples.len() == 1 || new_len == 1 {
        return vec![samples[0]; new_len];
    }
    let ratio = (samples.len() - 1) as f64 / (new_len - 1) as f64;
    (0..new_len)
        .map(|i| {
            let pos = i as f64 * ratio;
            let idx = pos.floor() as usize;
            let frac = (pos - idx as f64) as f32;
            let a = samples[idx];
            let b = samples[(idx + 1).min(samples.len() - 1)];
            a + (b - a) * frac
        })
        .collect()
}

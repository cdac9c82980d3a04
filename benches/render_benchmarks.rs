use criterion::{BenchmarkId, Criterion, black_box, criterion_group, criterion_main};
use glitch_history::effect::EffectParams;
use glitch_history::render::RenderSettings;
use glitch_history::timeline::{ClipRegion, CutMode};
use glitch_history::{
    EffectRegistry, EngineConfig, HistoryController, Operation, RenderEngine, SampleBuffer,
};
use std::sync::Arc;

const SAMPLE_RATE: u32 = 48000;

fn base(len: usize) -> SampleBuffer {
    let left: Vec<f32> = (0..len).map(|i| ((i as f32) * 0.01).sin() * 0.5).collect();
    let right = left.clone();
    SampleBuffer::from_channels(vec![left, right], SAMPLE_RATE).unwrap()
}

/// History with `effects` volume records on the single base clip
fn effect_chain(len: usize, effects: usize) -> HistoryController {
    let mut ctrl = HistoryController::new(base(len), &EngineConfig::default());
    for i in 0..effects {
        let clip = ctrl.current_graph().unwrap().clips()[0].clone();
        let gain = 0.5 + (i % 10) as f64 * 0.05;
        ctrl.append(Operation::effect(
            "volume",
            EffectParams::new().with("gain", gain),
            ClipRegion::whole(&clip),
        ))
        .unwrap();
    }
    ctrl
}

fn uncached_engine() -> RenderEngine {
    RenderEngine::new(
        Arc::new(EffectRegistry::with_builtins()),
        RenderSettings {
            cache_capacity: 0,
            ..RenderSettings::default()
        },
    )
}

/// Full replay of a content chain past the base state
fn bench_content_replay(c: &mut Criterion) {
    let mut group = c.benchmark_group("content_replay");
    let engine = uncached_engine();

    for effects in [1usize, 8, 32] {
        let ctrl = effect_chain(SAMPLE_RATE as usize * 5, effects);
        group.bench_with_input(BenchmarkId::from_parameter(effects), &effects, |b, _| {
            b.iter(|| black_box(engine.render(ctrl.log(), ctrl.base()).unwrap()));
        });
    }
    group.finish();
}

/// Render through the memoized prefix after toggling the last record
fn bench_cached_toggle(c: &mut Criterion) {
    let mut group = c.benchmark_group("cached_toggle");

    for effects in [8usize, 32] {
        let mut ctrl = effect_chain(SAMPLE_RATE as usize * 5, effects);
        let last = ctrl.log().last().unwrap().id;
        ctrl.render().unwrap();

        group.bench_with_input(BenchmarkId::from_parameter(effects), &effects, |b, _| {
            b.iter(|| {
                ctrl.toggle(last).unwrap();
                black_box(ctrl.render().unwrap());
            });
        });
    }
    group.finish();
}

/// Snapshot capture cost of structural records
fn bench_structural_append(c: &mut Criterion) {
    let mut group = c.benchmark_group("structural_append");

    group.bench_function("split", |b| {
        b.iter(|| {
            let mut ctrl = HistoryController::new(base(SAMPLE_RATE as usize * 5), &EngineConfig::default());
            let clip = ctrl.current_graph().unwrap().clips()[0].id;
            black_box(ctrl.append(Operation::split(clip, SAMPLE_RATE as usize)).unwrap());
        });
    });

    group.bench_function("cut_splice", |b| {
        b.iter(|| {
            let mut ctrl = HistoryController::new(base(SAMPLE_RATE as usize * 5), &EngineConfig::default());
            let clip = ctrl.current_graph().unwrap().clips()[0].id;
            black_box(
                ctrl.append(Operation::cut(
                    ClipRegion::new(clip, SAMPLE_RATE as usize, SAMPLE_RATE as usize),
                    CutMode::Splice,
                ))
                .unwrap(),
            );
        });
    });
    group.finish();
}

criterion_group!(
    benches,
    bench_content_replay,
    bench_cached_toggle,
    bench_structural_append
);
criterion_main!(benches);

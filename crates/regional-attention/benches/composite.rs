//! Benchmarks for regional attention compositing
//!
//! Measures the per-call overhead of slicing, cropping and stitching on
//! top of the attention primitive itself.

use candle_core::{Device, Tensor};
use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};
use regional_attention::{Attend, MatrixCompositor, ScaledDotProduct};
use regional_core::{LayoutBuilder, RegionConfig, ResolutionMapper};

const CHANNELS: usize = 64;

/// Benchmark the matrix compositor across latent sizes
fn bench_matrix_composite(c: &mut Criterion) {
    let mut group = c.benchmark_group("matrix_composite");
    let config = RegionConfig::default();
    let layout = LayoutBuilder::new(&config)
        .matrix("1,1,1;2,1,2;1,3", "0.2", None)
        .unwrap();
    let blocks = layout.total_blocks() + 1;

    for (h, w) in [(8, 8), (16, 16), (32, 32), (64, 64)] {
        let mapper = ResolutionMapper::new(w * 8, h * 8);
        let x = Tensor::randn(0f32, 1.0, (2, h * w, CHANNELS), &Device::Cpu).unwrap();
        let context =
            Tensor::randn(0f32, 1.0, (2, blocks * config.block_tokens, CHANNELS), &Device::Cpu)
                .unwrap();
        let compositor = MatrixCompositor::new(&layout, &mapper, 1, config.block_tokens);

        group.bench_with_input(
            BenchmarkId::new("grid", format!("{}x{}", h, w)),
            &(x, context),
            |b, (x, context)| {
                b.iter(|| {
                    compositor
                        .composite(&ScaledDotProduct, black_box(x), black_box(context), None)
                        .unwrap()
                });
            },
        );
    }

    group.finish();
}

/// Baseline: one plain attention call over the full context
fn bench_plain_attention(c: &mut Criterion) {
    let mut group = c.benchmark_group("plain_attention");
    let config = RegionConfig::default();

    for (h, w) in [(8, 8), (16, 16), (32, 32), (64, 64)] {
        let x = Tensor::randn(0f32, 1.0, (2, h * w, CHANNELS), &Device::Cpu).unwrap();
        let context =
            Tensor::randn(0f32, 1.0, (2, config.block_tokens, CHANNELS), &Device::Cpu).unwrap();

        group.bench_with_input(
            BenchmarkId::new("grid", format!("{}x{}", h, w)),
            &(x, context),
            |b, (x, context)| {
                b.iter(|| {
                    ScaledDotProduct
                        .attend(black_box(x), black_box(context), None)
                        .unwrap()
                });
            },
        );
    }

    group.finish();
}

criterion_group!(benches, bench_matrix_composite, bench_plain_attention);
criterion_main!(benches);

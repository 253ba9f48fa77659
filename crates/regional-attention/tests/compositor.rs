//! End-to-end tests for regional attention.
//!
//! Run with: cargo test -p regional-attention --test compositor

use candle_core::{Device, Tensor};
use regional_attention::{Attend, MatrixCompositor, RegionSession, ScaledDotProduct};
use regional_core::ratio::{broadcast, parse_float};
use regional_core::{
    DivideMode, GenerationRequest, LayoutBuilder, RatioParser, RegionConfig, RegionPlanner,
    ResolutionMapper,
};

const CHANNELS: usize = 4;

fn words(text: &str) -> usize {
    text.split_whitespace().count()
}

fn randn(shape: (usize, usize, usize)) -> Tensor {
    Tensor::randn(0f32, 1.0, shape, &Device::Cpu).unwrap()
}

fn values(t: &Tensor) -> Vec<f32> {
    t.flatten_all().unwrap().to_vec1().unwrap()
}

fn assert_close(a: &Tensor, b: &Tensor) {
    assert_eq!(a.dims(), b.dims());
    for (i, (x, y)) in values(a).iter().zip(values(b)).enumerate() {
        assert!((x - y).abs() < 1e-5, "element {}: {} vs {}", i, x, y);
    }
}

#[test]
fn test_two_row_scenario_layout() {
    let request = GenerationRequest {
        prompt: "a castle on a hill ADDROW a knight ADDCOL a dragon".into(),
        ratios: "1;1,1".into(),
        base_ratios: String::new(),
        ..Default::default()
    };
    let plan = RegionPlanner::new(RegionConfig::default())
        .unwrap()
        .plan(&request, &words)
        .unwrap();

    assert_eq!(plan.mode, DivideMode::Matrix);
    assert!(!plan.use_base);
    let rows = &plan.layout.rows;
    assert_eq!(rows.len(), 2);

    assert_eq!((rows[0].start, rows[0].end), (0.0, 0.5));
    assert_eq!(rows[0].cells.len(), 1);
    assert_eq!((rows[0].cells[0].start, rows[0].cells[0].end), (0.0, 1.0));

    assert_eq!((rows[1].start, rows[1].end), (0.5, 1.0));
    assert_eq!(rows[1].cells.len(), 2);
    assert_eq!(rows[1].cells[0].end, 0.5);
    assert_eq!(rows[1].cells[1].end, 1.0);
}

#[test]
fn test_two_row_scenario_preserves_shape() {
    let config = RegionConfig::default();
    let planner = RegionPlanner::new(config.clone()).unwrap();

    // (width, height, latent height, latent width)
    for (width, height, h, w) in [
        (64, 64, 8, 8),
        (96, 64, 8, 12),
        (680, 488, 61, 85),
        (680, 488, 31, 43),
        (520, 376, 24, 33),
    ] {
        let request = GenerationRequest {
            width,
            height,
            prompt: "sky ADDROW left ADDCOL right".into(),
            ratios: "1;1,1".into(),
            base_ratios: String::new(),
            ..Default::default()
        };
        let plan = planner.plan(&request, &words).unwrap();
        let mut session = RegionSession::new(plan, config.clone()).unwrap();

        let x = randn((2, h * w, CHANNELS));
        let context = randn((2, 3 * config.block_tokens, CHANNELS));
        let out = session
            .forward(&ScaledDotProduct, &x, &context, None)
            .unwrap();
        assert_eq!(out.dims(), x.dims(), "{}x{} at {}x{}", width, height, h, w);
    }
}

#[test]
fn test_regions_see_only_their_context() {
    let config = RegionConfig::default();
    let layout = LayoutBuilder::new(&config)
        .matrix("1;1,1", "", Some(&vec![vec![0], vec![0, 0]]))
        .unwrap();
    let mapper = ResolutionMapper::new(64, 64);
    let x = randn((1, 64, CHANNELS));
    let blocks: Vec<Tensor> = (0..3).map(|_| randn((1, 77, CHANNELS))).collect();
    let context = Tensor::cat(&blocks, 1).unwrap();

    let out = MatrixCompositor::new(&layout, &mapper, 0, 77)
        .composite(&ScaledDotProduct, &x, &context, None)
        .unwrap()
        .reshape((8, 8, CHANNELS))
        .unwrap();

    let plain = |ctx: &Tensor| {
        ScaledDotProduct
            .attend(&x, ctx, None)
            .unwrap()
            .reshape((8, 8, CHANNELS))
            .unwrap()
    };
    let top = plain(&blocks[0]).narrow(0, 0, 4).unwrap();
    let bottom_left = plain(&blocks[1]).narrow(0, 4, 4).unwrap().narrow(1, 0, 4).unwrap();
    let bottom_right = plain(&blocks[2]).narrow(0, 4, 4).unwrap().narrow(1, 4, 4).unwrap();

    assert_close(&out.narrow(0, 0, 4).unwrap(), &top);
    let bottom = out.narrow(0, 4, 4).unwrap();
    assert_close(&bottom.narrow(1, 0, 4).unwrap(), &bottom_left);
    assert_close(&bottom.narrow(1, 4, 4).unwrap(), &bottom_right);
}

#[test]
fn test_blend_identity() {
    let config = RegionConfig::default();
    let builder = LayoutBuilder::new(&config);
    let breaks = vec![vec![0, 0]];
    let mapper = ResolutionMapper::new(64, 64);

    let x = randn((1, 64, CHANNELS));
    let base = randn((1, 77, CHANNELS));
    let regions = randn((1, 2 * 77, CHANNELS));
    let with_base = Tensor::cat(&[&base, &regions], 1).unwrap();

    let plain_layout = builder.matrix("1,1", "", Some(&breaks)).unwrap();
    let plain = MatrixCompositor::new(&plain_layout, &mapper, 0, 77)
        .composite(&ScaledDotProduct, &x, &regions, None)
        .unwrap();

    // weight 0: the regional output, untouched
    let zero = builder.matrix("1,1", "0", Some(&breaks)).unwrap();
    let out = MatrixCompositor::new(&zero, &mapper, 1, 77)
        .composite(&ScaledDotProduct, &x, &with_base, None)
        .unwrap();
    assert_close(&out, &plain);

    // weight 1: the base output everywhere
    let one = builder.matrix("1,1", "1", Some(&breaks)).unwrap();
    let out = MatrixCompositor::new(&one, &mapper, 1, 77)
        .composite(&ScaledDotProduct, &x, &with_base, None)
        .unwrap();
    let base_out = ScaledDotProduct.attend(&x, &base, None).unwrap();
    assert_close(&out, &base_out);
}

#[test]
fn test_ratio_broadcast_onto_prompt_cells() {
    let parser = RatioParser::new(Default::default());

    let ones = parser.parse("1,1,1", parse_float).unwrap();
    assert_eq!(broadcast(ones, &[3]).unwrap(), vec![vec![1.0, 1.0, 1.0]]);

    let short = parser.parse("1,2", parse_float).unwrap();
    assert_eq!(broadcast(short, &[3]).unwrap(), vec![vec![1.0, 2.0, 2.0]]);
}

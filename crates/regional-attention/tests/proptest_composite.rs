//! Property-based tests for the matrix compositor.
//!
//! - Output shape always equals input shape
//! - No region is attended more than once per call
//! - Every output position comes from some region

use std::cell::Cell;

use candle_core::{DType, Device, Tensor};
use proptest::prelude::*;

use regional_attention::MatrixCompositor;
use regional_core::{LayoutBuilder, RegionConfig, ResolutionMapper};

/// Strategy for ratio text with 1-3 rows of 1-4 cells.
fn ratio_text_strategy() -> impl Strategy<Value = String> {
    prop::collection::vec(prop::collection::vec(1u32..6, 1..5), 1..4).prop_map(|rows| {
        rows.iter()
            .map(|r| r.iter().map(u32::to_string).collect::<Vec<_>>().join(","))
            .collect::<Vec<_>>()
            .join(";")
    })
}

proptest! {
    #![proptest_config(ProptestConfig {
        cases: 48,
        max_shrink_iters: 50,
        ..ProptestConfig::default()
    })]

    /// Property: compositing preserves the feature map shape.
    #[test]
    fn prop_output_matches_input(
        ratios in ratio_text_strategy(),
        height in 1usize..12,
        width in 1usize..12,
        batch in 1usize..3,
    ) {
        let layout = LayoutBuilder::new(&RegionConfig::default())
            .matrix(&ratios, "", None)
            .unwrap();
        let regions = layout.region_count();
        let mapper = ResolutionMapper::new(width * 8, height * 8);

        let x = Tensor::zeros((batch, height * width, 3), DType::F32, &Device::Cpu).unwrap();
        let context = Tensor::zeros((batch, regions, 3), DType::F32, &Device::Cpu).unwrap();
        let calls = Cell::new(0usize);
        let attend = |x: &Tensor, _: &Tensor, _: Option<&Tensor>| {
            calls.set(calls.get() + 1);
            x.affine(1.0, 1.0)
        };

        let out = MatrixCompositor::new(&layout, &mapper, 0, 1)
            .composite(&attend, &x, &context, None)
            .unwrap();
        prop_assert_eq!(out.dims(), x.dims());
        prop_assert!(calls.get() <= regions.max(1));

        let total: f32 = out.sum_all().unwrap().to_scalar().unwrap();
        prop_assert_eq!(total as usize, batch * height * width * 3);
    }
}

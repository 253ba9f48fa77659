//! Composite a two-row layout and print which region fed each grid cell.
//!
//! Usage:
//! ```bash
//! RUST_LOG=debug cargo run --example composite_grid -p regional-attention
//! ```

use candle_core::{DType, Device, Tensor};
use regional_attention::RegionSession;
use regional_core::{GenerationRequest, RegionConfig, RegionPlanner};

fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Enable tracing
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    let config = RegionConfig::default();
    let request = GenerationRequest {
        width: 96,
        height: 64,
        prompt: "night sky ADDROW red fox ADDCOL snowy owl ADDCOL pine tree".into(),
        ratios: "1,1;2,1,2,1".into(),
        base_ratios: String::new(),
        ..Default::default()
    };

    // stand-in tokenizer: one token per word
    let words = |text: &str| text.split_whitespace().count();
    let plan = RegionPlanner::new(config.clone())?.plan(&request, &words)?;
    println!("Prompt sent to the host: {}", plan.prompt);
    println!("{}", plan.summary);

    let blocks = plan.layout.total_blocks();
    let mut session = RegionSession::new(plan, config.clone())?;

    // block i of the context holds the value i, and attention returns the
    // mean of its context, so each output cell shows its region index
    let device = Device::Cpu;
    let context = Tensor::arange(0f32, blocks as f32, &device)?
        .reshape((1, blocks, 1))?
        .repeat((1, 1, config.block_tokens))?
        .reshape((1, blocks * config.block_tokens, 1))?;
    let mean = |x: &Tensor, ctx: &Tensor, _: Option<&Tensor>| {
        let v = ctx.mean_all()?.to_scalar::<f32>()?;
        x.ones_like()?.affine(v as f64, 0.0)
    };

    let (h, w) = (8, 12);
    let x = Tensor::zeros((1, h * w, 1), DType::F32, &device)?;
    let out = session.forward(&mean, &x, &context, None)?;

    println!();
    for row in out.reshape((h, w))?.to_vec2::<f32>()? {
        let line: Vec<String> = row.iter().map(|v| format!("{:.0}", v)).collect();
        println!("{}", line.join(" "));
    }

    Ok(())
}

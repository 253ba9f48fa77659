//! Regional Attention Compositor
//!
//! Drop-in replacement for a diffusion model's cross-attention call that
//! conditions each region of the image on its own slice of the prompt.
//!
//! # How It Works
//!
//! The packed prompt context is a sequence of fixed-size token blocks. For
//! every region the compositor slices the region's blocks out of the
//! context, runs the host's attention primitive, crops the result to the
//! region's pixels and stitches the crops back into a feature map of the
//! input's shape.
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────────┐
//! │                  Regional Cross-Attention                       │
//! ├─────────────────────────────────────────────────────────────────┤
//! │                                                                 │
//! │  x [B, H*W, C] ──┬──► attend(x, ctx[cell 0]) ──► crop ──┐       │
//! │                  ├──► attend(x, ctx[cell 1]) ──► crop ──┤       │
//! │                  └──► attend(x, ctx[cell n]) ──► crop ──┤       │
//! │                                                         ▼       │
//! │  ┌───────────┬─────┐                                            │
//! │  │  cell 0   │  1  │   blend with base (optional)               │
//! │  ├─────┬─────┴─────┤   cat columns, then rows                   │
//! │  │  2  │    n      │   reshape to [B, H*W, C]                   │
//! │  └─────┴───────────┘                                            │
//! └─────────────────────────────────────────────────────────────────┘
//! ```
//!
//! # Example
//!
//! ```
//! use candle_core::{DType, Device, Tensor};
//! use regional_attention::{RegionSession, ScaledDotProduct};
//! use regional_core::{GenerationRequest, RegionConfig, RegionPlanner};
//!
//! let config = RegionConfig::default();
//! let request = GenerationRequest {
//!     width: 64,
//!     height: 64,
//!     prompt: "red ADDCOL blue".into(),
//!     ratios: "1,1".into(),
//!     ..Default::default()
//! };
//! let words = |text: &str| text.split_whitespace().count();
//! let plan = RegionPlanner::new(config.clone()).unwrap().plan(&request, &words).unwrap();
//! let mut session = RegionSession::new(plan, config).unwrap();
//!
//! let x = Tensor::zeros((1, 64, 8), DType::F32, &Device::Cpu).unwrap();
//! let context = Tensor::ones((1, 2 * 77, 8), DType::F32, &Device::Cpu).unwrap();
//! let out = session.forward(&ScaledDotProduct, &x, &context, None).unwrap();
//! assert_eq!(out.dims(), x.dims());
//! ```

mod attend;
mod error;
pub mod grid;
mod matrix;
mod segments;
mod session;

pub use attend::{Attend, ScaledDotProduct};
pub use error::{AttentionError, Result};
pub use matrix::MatrixCompositor;
pub use segments::SegmentCompositor;
pub use session::RegionSession;

/// Prelude for common imports
pub mod prelude {
    pub use super::{Attend, AttentionError, RegionSession, Result, ScaledDotProduct};
    pub use regional_core::prelude::*;
}

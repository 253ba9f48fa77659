//! Regional Prompting Core
//!
//! Planning half of regional prompting for diffusion models: an image is
//! split into rectangular regions, each conditioned on its own slice of the
//! prompt, and cross-attention outputs are stitched back together per layer.
//! This crate turns ratio text and keyword prompts into a resolution
//! independent [`Layout`], recovers grid sizes for each attention call, and
//! tracks which conditioning branch a call belongs to.
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────────┐
//! │                       Region Planning                           │
//! ├─────────────────────────────────────────────────────────────────┤
//! │                                                                 │
//! │  "1,2,1;1,1"   ──► RatioParser ──► broadcast ──┐                │
//! │                                                ▼                │
//! │  prompt ──► PromptRewriter ──► break grid ──► LayoutBuilder     │
//! │     │                                          │                │
//! │     ▼                                          ▼                │
//! │  "a BREAK b BREAK c"                        Layout              │
//! │  (handed to the host)           rows × cells of [start, end)    │
//! │                                                │                │
//! │  seq_len ──► ResolutionMapper ──► (h, w) ──► pixel_rects        │
//! │                                                                 │
//! │  PassState: positive ─16 calls─► negative ─16 calls─► ...       │
//! └─────────────────────────────────────────────────────────────────┘
//! ```
//!
//! # Example
//!
//! ```
//! use regional_core::{GenerationRequest, RegionConfig, RegionPlanner};
//!
//! let planner = RegionPlanner::new(RegionConfig::default()).unwrap();
//! let request = GenerationRequest {
//!     prompt: "sky ADDROW cat ADDCOL dog".into(),
//!     ratios: "1;1,1".into(),
//!     ..Default::default()
//! };
//! let words = |text: &str| text.split_whitespace().count();
//! let plan = planner.plan(&request, &words).unwrap();
//!
//! assert_eq!(plan.layout.region_count(), 3);
//! assert_eq!(plan.prompt, "sky BREAK cat BREAK dog");
//! ```

mod config;
mod error;
pub mod layout;
mod pass;
mod plan;
mod prompt;
pub mod ratio;
mod resolution;
mod tokens;

pub use config::{Delimiters, Keywords, RegionConfig};
pub use error::{RegionError, Result};
pub use layout::{
    DivideMode, FracRange, Layout, LayoutBuilder, PixelRect, RegionCell, RegionRow, Span,
};
pub use pass::{Branch, PassState};
pub use plan::{GenerationRequest, RegionPlan, RegionPlanner};
pub use prompt::{BaseSegment, PromptRewriter};
pub use ratio::{Grid, RatioParser};
pub use resolution::{round_dim, GridDims, HiresPass, ResolutionMapper};
pub use tokens::{TokenCounter, TokenRange, TokenTable};

/// Tokens per packed context block, start and end markers included
pub const DEFAULT_BLOCK_TOKENS: usize = 77;

/// Usable prompt tokens per context block
pub const DEFAULT_CHUNK_TOKENS: usize = 75;

/// Cross-attention layers a UNet step visits per branch
pub const DEFAULT_LAYERS_PER_STEP: usize = 16;

/// Prelude for common imports
pub mod prelude {
    pub use super::{
        Branch, DivideMode, GenerationRequest, Layout, PassState, RegionConfig, RegionError,
        RegionPlan, RegionPlanner, ResolutionMapper, Result, TokenCounter,
    };
}

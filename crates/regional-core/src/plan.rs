//! Per-generation planning: mode selection, prompt rewriting and layout

use crate::layout::{DivideMode, Layout, LayoutBuilder};
use crate::prompt::PromptRewriter;
use crate::resolution::{HiresPass, ResolutionMapper};
use crate::tokens::{TokenCounter, TokenTable};
use crate::{RegionConfig, RegionError, Result};
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

/// Settings and prompts for one generation
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct GenerationRequest {
    /// Output width in pixels
    pub width: usize,
    /// Output height in pixels
    pub height: usize,
    /// Images per batch
    pub batch_size: usize,
    /// Optional second, upscaled pass
    pub hires: Option<HiresPass>,
    /// Requested divide mode; promoted to matrix by row keywords or delimiters
    pub mode: DivideMode,
    /// Region ratio text
    pub ratios: String,
    /// Base blend weights
    pub base_ratios: String,
    /// Treat the first segment as the base prompt
    pub use_base: bool,
    /// Prefix the first segment to every region prompt
    pub use_common: bool,
    /// Prefix the first negative segment to every negative region prompt
    pub use_common_negative: bool,
    /// Positive prompt
    pub prompt: String,
    /// Negative prompt
    pub negative_prompt: String,
}

impl Default for GenerationRequest {
    fn default() -> Self {
        Self {
            width: 512,
            height: 512,
            batch_size: 1,
            hires: None,
            mode: DivideMode::Horizontal,
            ratios: "1,1".into(),
            base_ratios: "0.2".into(),
            use_base: false,
            use_common: false,
            use_common_negative: false,
            prompt: String::new(),
            negative_prompt: String::new(),
        }
    }
}

impl GenerationRequest {
    /// Parameter line recorded alongside generated images
    pub fn summary(&self, mode: DivideMode) -> String {
        format!(
            "mode:{},divide ratio : {}, Use base : {}, Base ratio : {}, Use common : {}, Use N-common : {}",
            mode,
            self.ratios,
            self.use_base,
            self.base_ratios,
            self.use_common,
            self.use_common_negative
        )
    }
}

/// Everything the compositor needs for one generation
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RegionPlan {
    /// Divide mode
    pub mode: DivideMode,
    /// Fractional layout
    pub layout: Layout,
    /// Whether a base segment leads the context
    pub use_base: bool,
    /// Breaks inside the base segment
    pub base_breaks: usize,
    /// Rewritten positive prompt handed to the host
    pub prompt: String,
    /// Rewritten negative prompt handed to the host
    pub negative_prompt: String,
    /// Positive prompt as submitted, for image metadata
    pub original_prompt: String,
    /// Negative prompt as submitted, for image metadata
    pub original_negative_prompt: String,
    /// Positive block ranges (one-dimensional modes)
    pub positive_tokens: TokenTable,
    /// Negative block ranges (one-dimensional modes)
    pub negative_tokens: TokenTable,
    /// Output width
    pub width: usize,
    /// Output height
    pub height: usize,
    /// Images per batch
    pub batch_size: usize,
    /// Second-pass `(width, height)`
    pub hires_target: Option<(usize, usize)>,
    /// Parameter line for the generated image
    pub summary: String,
}

impl RegionPlan {
    /// Resolution mapper for this generation
    pub fn resolution(&self) -> ResolutionMapper {
        let mapper = ResolutionMapper::new(self.width, self.height);
        match self.hires_target {
            Some((w, h)) => mapper.with_hires(w, h),
            None => mapper,
        }
    }

    /// Whether both branches carry the same number of segments
    pub fn branches_match(&self) -> bool {
        self.positive_tokens.len() == self.negative_tokens.len()
    }

    /// Context blocks consumed by the base segment
    pub fn base_blocks(&self) -> usize {
        if self.use_base {
            1 + self.base_breaks
        } else {
            0
        }
    }
}

/// Turns a [`GenerationRequest`] into a [`RegionPlan`]
#[derive(Debug, Clone)]
pub struct RegionPlanner {
    config: RegionConfig,
    rewriter: PromptRewriter,
    layouts: LayoutBuilder,
}

impl RegionPlanner {
    /// Create a planner, validating the configuration
    pub fn new(config: RegionConfig) -> Result<Self> {
        config.validate()?;
        Ok(Self {
            rewriter: PromptRewriter::new(&config.keywords),
            layouts: LayoutBuilder::new(&config),
            config,
        })
    }

    /// Configuration in use
    pub fn config(&self) -> &RegionConfig {
        &self.config
    }

    /// Divide mode for a request
    ///
    /// Row/column keywords in the prompt or a row delimiter in the ratios
    /// select the matrix mode; otherwise the requested mode stands.
    pub fn select_mode(&self, request: &GenerationRequest) -> DivideMode {
        if self.rewriter.has_layout_keywords(&request.prompt)
            || request.ratios.contains(self.config.delimiters.row)
        {
            DivideMode::Matrix
        } else {
            request.mode
        }
    }

    /// Plan a generation
    pub fn plan<T: TokenCounter + ?Sized>(
        &self,
        request: &GenerationRequest,
        tokenizer: &T,
    ) -> Result<RegionPlan> {
        if request.width == 0 || request.height == 0 || request.batch_size == 0 {
            return Err(RegionError::Config(format!(
                "Invalid generation size {}x{} (batch {})",
                request.width, request.height, request.batch_size
            )));
        }

        let mode = self.select_mode(request);
        let mut plan = match mode {
            DivideMode::Matrix => self.plan_matrix(request)?,
            DivideMode::Horizontal | DivideMode::Vertical => {
                self.plan_segments(request, mode, tokenizer)?
            }
        };
        plan.hires_target = request
            .hires
            .map(|h| h.target(request.width, request.height));

        info!(
            "Planned {} regions in {} mode (base: {})",
            plan.layout.region_count(),
            mode,
            plan.use_base
        );
        debug!("Rewritten prompt: {:?}", plan.prompt);
        debug!("Rewritten negative prompt: {:?}", plan.negative_prompt);

        Ok(plan)
    }

    fn plan_matrix(&self, request: &GenerationRequest) -> Result<RegionPlan> {
        let (base, main) = self.rewriter.split_base(&request.prompt, request.use_base)?;

        let (layout, main) = if self.rewriter.has_layout_keywords(&main) {
            let breaks = self.rewriter.break_grid(&main)?;
            let layout = self
                .layouts
                .matrix(&request.ratios, &request.base_ratios, Some(&breaks))?;
            (layout, main)
        } else {
            let layout = self
                .layouts
                .matrix(&request.ratios, &request.base_ratios, None)?;
            let main = self.rewriter.pad_segments(&main, layout.region_count());
            (layout, main)
        };

        let prompt = self.rewriter.rewrite(base.as_ref(), &main);
        let segments = self.rewriter.segment_count(&prompt);
        let negative_prompt = self
            .rewriter
            .expand_negative(&request.negative_prompt, segments);

        Ok(RegionPlan {
            mode: DivideMode::Matrix,
            layout,
            use_base: base.is_some(),
            base_breaks: base.as_ref().map(|b| b.breaks).unwrap_or(0),
            prompt,
            negative_prompt,
            original_prompt: request.prompt.clone(),
            original_negative_prompt: request.negative_prompt.clone(),
            positive_tokens: TokenTable::default(),
            negative_tokens: TokenTable::default(),
            width: request.width,
            height: request.height,
            batch_size: request.batch_size,
            hires_target: None,
            summary: request.summary(DivideMode::Matrix),
        })
    }

    fn plan_segments<T: TokenCounter + ?Sized>(
        &self,
        request: &GenerationRequest,
        mode: DivideMode,
        tokenizer: &T,
    ) -> Result<RegionPlan> {
        let prompt = if request.use_common {
            self.rewriter.apply_common(&request.prompt)
        } else {
            request.prompt.clone()
        };
        let negative_prompt = if request.use_common_negative {
            self.rewriter.apply_common(&request.negative_prompt)
        } else {
            request.negative_prompt.clone()
        };

        let layout = self
            .layouts
            .segments(mode, &request.ratios, &request.base_ratios)?;

        let brk = self.config.keywords.brk.as_str();
        let positive_tokens =
            TokenTable::build(&prompt, brk, self.config.chunk_tokens, tokenizer);
        let negative_tokens =
            TokenTable::build(&negative_prompt, brk, self.config.chunk_tokens, tokenizer);

        let expected = layout.region_count() + usize::from(request.use_base);
        if positive_tokens.len() != expected {
            return Err(RegionError::RegionCountMismatch {
                expected,
                actual: positive_tokens.len(),
            });
        }
        debug!(
            "Token tables: positive {:?}, negative {:?}",
            positive_tokens.token_counts(),
            negative_tokens.token_counts()
        );

        Ok(RegionPlan {
            mode,
            layout,
            use_base: request.use_base,
            base_breaks: 0,
            prompt,
            negative_prompt,
            original_prompt: request.prompt.clone(),
            original_negative_prompt: request.negative_prompt.clone(),
            positive_tokens,
            negative_tokens,
            width: request.width,
            height: request.height,
            batch_size: request.batch_size,
            hires_target: None,
            summary: request.summary(mode),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn words(text: &str) -> usize {
        text.split_whitespace().count()
    }

    fn planner() -> RegionPlanner {
        RegionPlanner::new(RegionConfig::default()).unwrap()
    }

    #[test]
    fn test_mode_selection() {
        let p = planner();
        let mut request = GenerationRequest {
            prompt: "a BREAK b".into(),
            ..Default::default()
        };
        assert_eq!(p.select_mode(&request), DivideMode::Horizontal);

        request.ratios = "1;1".into();
        assert_eq!(p.select_mode(&request), DivideMode::Matrix);

        request.ratios = "1,1".into();
        request.prompt = "a ADDCOL b".into();
        assert_eq!(p.select_mode(&request), DivideMode::Matrix);
    }

    #[test]
    fn test_matrix_plan_with_keywords() {
        let request = GenerationRequest {
            prompt: "sky ADDROW cat ADDCOL dog".into(),
            negative_prompt: "blurry".into(),
            ratios: "1;1,1".into(),
            base_ratios: String::new(),
            ..Default::default()
        };
        let plan = planner().plan(&request, &words).unwrap();

        assert_eq!(plan.mode, DivideMode::Matrix);
        assert_eq!(plan.layout.rows.len(), 2);
        assert_eq!(plan.layout.region_count(), 3);
        assert!(!plan.use_base);
        assert_eq!(plan.prompt, "sky BREAK cat BREAK dog");
        assert_eq!(plan.original_prompt, "sky ADDROW cat ADDCOL dog");
        assert_eq!(plan.original_negative_prompt, "blurry");
        assert_eq!(plan.negative_prompt.matches("BREAK").count(), 2);
        assert_eq!(plan.base_blocks(), 0);
    }

    #[test]
    fn test_matrix_plan_with_base_keyword() {
        let request = GenerationRequest {
            prompt: "forest BREAK fog ADDBASE elf ADDCOL orc".into(),
            ratios: "1,1".into(),
            base_ratios: "0.3".into(),
            ..Default::default()
        };
        let plan = planner().plan(&request, &words).unwrap();
        assert!(plan.use_base);
        assert_eq!(plan.base_breaks, 1);
        assert_eq!(plan.base_blocks(), 2);
        assert_eq!(plan.layout.region_count(), 2);
        assert!(plan.layout.cells().all(|c| c.base_weight == 0.3));
        assert!(plan.prompt.starts_with("forest BREAK fog"));
    }

    #[test]
    fn test_matrix_plan_pads_prompt() {
        let request = GenerationRequest {
            prompt: "cat BREAK dog".into(),
            ratios: "1,1,1;1,1".into(),
            base_ratios: String::new(),
            ..Default::default()
        };
        let plan = planner().plan(&request, &words).unwrap();
        assert_eq!(plan.layout.region_count(), 3);
        assert_eq!(plan.prompt.matches("BREAK").count(), 2);
    }

    #[test]
    fn test_segment_plan() {
        let request = GenerationRequest {
            prompt: "red BREAK green BREAK blue".into(),
            negative_prompt: "bad".into(),
            ratios: "1,2,1".into(),
            ..Default::default()
        };
        let plan = planner().plan(&request, &words).unwrap();
        assert_eq!(plan.mode, DivideMode::Horizontal);
        assert_eq!(plan.positive_tokens.len(), 3);
        assert_eq!(plan.negative_tokens.len(), 1);
        assert!(!plan.branches_match());
    }

    #[test]
    fn test_segment_plan_count_mismatch() {
        let request = GenerationRequest {
            prompt: "red BREAK green".into(),
            ratios: "1,1,1".into(),
            ..Default::default()
        };
        let err = planner().plan(&request, &words).unwrap_err();
        assert!(matches!(
            err,
            RegionError::RegionCountMismatch {
                expected: 3,
                actual: 2
            }
        ));
    }

    #[test]
    fn test_segment_plan_common_prompt() {
        let request = GenerationRequest {
            prompt: "best quality BREAK cat BREAK dog".into(),
            negative_prompt: "lowres BREAK blurry BREAK noisy".into(),
            ratios: "1,1".into(),
            use_common: true,
            use_common_negative: true,
            ..Default::default()
        };
        let plan = planner().plan(&request, &words).unwrap();
        assert_eq!(plan.positive_tokens.len(), 2);
        assert!(plan.prompt.starts_with("best quality, cat"));
        assert!(plan.negative_prompt.starts_with("lowres, blurry"));
        assert_eq!(plan.original_prompt, request.prompt);
        assert_eq!(plan.original_negative_prompt, request.negative_prompt);
    }

    #[test]
    fn test_hires_target_recorded() {
        let request = GenerationRequest {
            prompt: "a BREAK b".into(),
            hires: Some(HiresPass {
                scale: 2.0,
                resize_x: 0,
                resize_y: 0,
            }),
            ..Default::default()
        };
        let plan = planner().plan(&request, &words).unwrap();
        assert_eq!(plan.hires_target, Some((1024, 1024)));
        assert_eq!(plan.resolution().target_for(128 * 128), (512, 512));
    }

    #[test]
    fn test_summary() {
        let request = GenerationRequest::default();
        let line = request.summary(DivideMode::Vertical);
        assert!(line.starts_with("mode:Vertical,divide ratio : 1,1"));
    }

    #[test]
    fn test_invalid_size_rejected() {
        let request = GenerationRequest {
            width: 0,
            ..Default::default()
        };
        assert!(planner().plan(&request, &words).is_err());
    }
}

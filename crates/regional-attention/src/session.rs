//! Per-generation state driving the compositors

use crate::matrix::MatrixCompositor;
use crate::segments::SegmentCompositor;
use crate::{Attend, Result};
use candle_core::Tensor;
use regional_core::{DivideMode, PassState, RegionConfig, RegionPlan, ResolutionMapper};
use tracing::{debug, info};

/// Regional attention for one generation
///
/// Call [`forward`](Self::forward) in place of every cross-attention call, in
/// the order the host issues them, and [`reset`](Self::reset) before the
/// next generation.
#[derive(Debug, Clone)]
pub struct RegionSession {
    plan: RegionPlan,
    mapper: ResolutionMapper,
    pass: PassState,
    config: RegionConfig,
}

impl RegionSession {
    /// Create a session for a planned generation
    pub fn new(plan: RegionPlan, config: RegionConfig) -> Result<Self> {
        config.validate()?;
        let mapper = plan.resolution();
        let pass = PassState::new(config.layers_per_step)?;

        info!(
            "Regional session: {} mode, {} regions, {}x{} (hires: {:?})",
            plan.mode,
            plan.layout.region_count(),
            plan.width,
            plan.height,
            plan.hires_target
        );

        Ok(Self {
            plan,
            mapper,
            pass,
            config,
        })
    }

    /// Plan in use
    pub fn plan(&self) -> &RegionPlan {
        &self.plan
    }

    /// Branch bookkeeping
    pub fn pass_state(&self) -> &PassState {
        &self.pass
    }

    /// Composite one attention call
    pub fn forward<A: Attend + ?Sized>(
        &mut self,
        attn: &A,
        x: &Tensor,
        context: &Tensor,
        mask: Option<&Tensor>,
    ) -> Result<Tensor> {
        debug!(
            "Attention call: x {:?}, context {:?}, branch {}",
            x.dims(),
            context.dims(),
            self.pass.active()
        );

        let block_tokens = self.config.block_tokens;
        let out = match self.plan.mode {
            DivideMode::Matrix => {
                MatrixCompositor::from_plan(&self.plan, &self.mapper, block_tokens)
                    .composite(attn, x, context, mask)?
            }
            DivideMode::Horizontal | DivideMode::Vertical => {
                SegmentCompositor::from_plan(&self.plan, &self.mapper, block_tokens).composite(
                    attn,
                    x,
                    context,
                    mask,
                    self.pass.active(),
                    self.plan.batch_size,
                )?
            }
        };

        self.pass.advance();
        Ok(out)
    }

    /// Start a new generation
    pub fn reset(&mut self) {
        self.pass.reset();
    }
}

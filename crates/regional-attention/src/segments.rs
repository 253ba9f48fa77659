//! One-dimensional compositor for horizontal and vertical layouts
//!
//! Segments address the context through token tables rather than break
//! counts. Horizontal layouts crop columns of the reshaped grid, vertical
//! layouts crop the flat sequence directly.
//!
//! The positive and negative prompts may split into different numbers of
//! segments. The host then either runs the two branches as separate calls
//! (the [`Branch`] in effect picks the table) or stacks them in one batch,
//! which is split in half and composited per branch.

use crate::grid::{blend, crop_span, feature_dims, to_grid, BlockContext};
use crate::{Attend, AttentionError, Result};
use candle_core::{Tensor, D};
use regional_core::{
    Branch, DivideMode, GridDims, Layout, RegionError, RegionPlan, ResolutionMapper, TokenTable,
};
use tracing::{debug, trace};

/// Composites one attention call over a one-dimensional [`Layout`]
#[derive(Debug, Clone, Copy)]
pub struct SegmentCompositor<'a> {
    layout: &'a Layout,
    mapper: &'a ResolutionMapper,
    positive: &'a TokenTable,
    negative: &'a TokenTable,
    use_base: bool,
    block_tokens: usize,
}

impl<'a> SegmentCompositor<'a> {
    /// Compositor for `layout` with per-branch token tables
    ///
    /// With `use_base`, the first range of each table is the base segment.
    pub fn new(
        layout: &'a Layout,
        mapper: &'a ResolutionMapper,
        positive: &'a TokenTable,
        negative: &'a TokenTable,
        use_base: bool,
        block_tokens: usize,
    ) -> Self {
        Self {
            layout,
            mapper,
            positive,
            negative,
            use_base,
            block_tokens,
        }
    }

    /// Compositor for a planned generation
    pub fn from_plan(
        plan: &'a RegionPlan,
        mapper: &'a ResolutionMapper,
        block_tokens: usize,
    ) -> Self {
        Self::new(
            &plan.layout,
            mapper,
            &plan.positive_tokens,
            &plan.negative_tokens,
            plan.use_base,
            block_tokens,
        )
    }

    /// Replace one attention call, routing the batch to the right tables
    ///
    /// `active` is the branch the host is currently running when it issues
    /// the branches separately; `batch_size` is the generation's batch size.
    pub fn composite<A: Attend + ?Sized>(
        &self,
        attn: &A,
        x: &Tensor,
        context: &Tensor,
        mask: Option<&Tensor>,
        active: Branch,
        batch_size: usize,
    ) -> Result<Tensor> {
        let (batch, _, _) = feature_dims(x)?;

        if self.positive.len() == self.negative.len() {
            return self.composite_branch(attn, x, context, mask, Branch::Positive);
        }
        if batch == batch_size {
            debug!("Separate branch call, using {} table", active);
            return self.composite_branch(attn, x, context, mask, active);
        }
        if batch % 2 != 0 {
            return Err(AttentionError::UnevenBatch { batch });
        }

        debug!("Splitting batch of {} into positive and negative halves", batch);
        let xs = x.chunk(2, 0)?;
        let contexts = context.chunk(2, 0)?;
        let (pos_mask, neg_mask) = match mask {
            Some(m) => {
                let (p, n) = split_mask(m, batch)?;
                (Some(p), Some(n))
            }
            None => (None, None),
        };

        let positive = self.composite_branch(
            attn,
            &xs[0],
            &contexts[0],
            pos_mask.as_ref(),
            Branch::Positive,
        )?;
        let negative = self.composite_branch(
            attn,
            &xs[1],
            &contexts[1],
            neg_mask.as_ref(),
            Branch::Negative,
        )?;
        Ok(Tensor::cat(&[positive, negative], 0)?)
    }

    /// Composite a batch that belongs entirely to `branch`
    pub fn composite_branch<A: Attend + ?Sized>(
        &self,
        attn: &A,
        x: &Tensor,
        context: &Tensor,
        mask: Option<&Tensor>,
        branch: Branch,
    ) -> Result<Tensor> {
        let table = match branch {
            Branch::Positive => self.positive,
            Branch::Negative => self.negative,
        };
        if branch == Branch::Negative && table.len() == 1 {
            return Ok(attn.attend(x, context, mask)?);
        }
        if self.layout.is_single_region() {
            return Ok(attn.attend(x, context, mask)?);
        }

        let segments = self.layout.segments();
        let expected = segments.len() + usize::from(self.use_base);
        if table.len() != expected {
            return Err(RegionError::RegionCountMismatch {
                expected,
                actual: table.len(),
            }
            .into());
        }

        let (batch, seq, _) = feature_dims(x)?;
        let blocks = BlockContext::new(context, mask, self.block_tokens)?;

        let grid = match self.layout.mode {
            DivideMode::Horizontal => Some(self.mapper.checked_grid_for(seq)?),
            _ => None,
        };
        let (axis, spans) = match grid {
            Some(dims) => (2, self.layout.segment_spans(dims.width)),
            None => (1, self.layout.segment_spans(seq)),
        };

        let (base, ranges) = match table.ranges().split_first() {
            Some((first, rest)) if self.use_base => {
                let (ctx, m) = blocks.slice(first.start, first.len())?;
                let base = arrange(&attn.attend(x, &ctx, m.as_ref())?, grid)?;
                (Some(base), rest)
            }
            _ => (None, table.ranges()),
        };

        let mut parts = Vec::with_capacity(segments.len());
        for (i, ((range, cell), span)) in ranges.iter().zip(segments).zip(&spans).enumerate() {
            let (ctx, m) = blocks.slice(range.start, range.len())?;
            if span.is_empty() {
                trace!("Segment {} has no positions", i);
                continue;
            }
            trace!(
                "Segment {}: blocks {}..{}, span {}..{}",
                i,
                range.start,
                range.end,
                span.start,
                span.end
            );

            let out = arrange(&attn.attend(x, &ctx, m.as_ref())?, grid)?;
            let mut out = crop_span(&out, axis, *span)?;
            if let Some(base) = &base {
                out = blend(&out, &crop_span(base, axis, *span)?, cell.base_weight)?;
            }
            parts.push(out);
        }

        if parts.is_empty() {
            return Err(RegionError::NoRegions.into());
        }
        let joined = Tensor::cat(&parts, axis)?;
        let channels = joined.dim(D::Minus1)?;
        Ok(joined.reshape((batch, seq, channels))?)
    }
}

/// Positive and negative halves of a mask for a stacked batch
///
/// A mask without a batch axis, or with a batch of one, is shared by both
/// halves.
fn split_mask(mask: &Tensor, batch: usize) -> Result<(Tensor, Tensor)> {
    let mask_batch = if mask.rank() < 2 { 1 } else { mask.dim(0)? };
    match mask_batch {
        1 => Ok((mask.clone(), mask.clone())),
        b if b == batch => {
            let half = batch / 2;
            Ok((mask.narrow(0, 0, half)?, mask.narrow(0, half, half)?))
        }
        _ => Err(AttentionError::ShapeMismatch {
            expected: "mask batch of 1 or the full batch",
            actual: mask.dims().to_vec(),
        }),
    }
}

/// Grid view for horizontal layouts, flat sequence otherwise
fn arrange(out: &Tensor, grid: Option<GridDims>) -> Result<Tensor> {
    match grid {
        Some(dims) => to_grid(out, dims),
        None => Ok(out.clone()),
    }
}

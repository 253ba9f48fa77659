//! Two-dimensional compositor over rows of cells
//!
//! ```text
//! context: [ base | cell 0,0 | cell 1,0 | cell 1,1 BREAK ... ]
//!            │       │          │          │
//!            ▼       ▼          ▼          ▼
//!          attend  attend     attend     attend
//!            │       │          │          │
//!            │     crop ──┐   crop ──┐   crop ──┐
//!            └──────────blend──────blend──────blend
//!                         │          └── cat(width) ──┘
//!                         └──────── cat(height) ───────┘
//! ```

use crate::grid::{blend, crop, feature_dims, to_grid, BlockContext};
use crate::{Attend, Result};
use candle_core::Tensor;
use regional_core::{Layout, RegionError, RegionPlan, ResolutionMapper};
use tracing::trace;

/// Composites one attention call over a matrix [`Layout`]
#[derive(Debug, Clone, Copy)]
pub struct MatrixCompositor<'a> {
    layout: &'a Layout,
    mapper: &'a ResolutionMapper,
    base_blocks: usize,
    block_tokens: usize,
}

impl<'a> MatrixCompositor<'a> {
    /// Compositor for `layout`; `base_blocks` is zero without a base prompt
    pub fn new(
        layout: &'a Layout,
        mapper: &'a ResolutionMapper,
        base_blocks: usize,
        block_tokens: usize,
    ) -> Self {
        Self {
            layout,
            mapper,
            base_blocks,
            block_tokens,
        }
    }

    /// Compositor for a planned generation
    pub fn from_plan(
        plan: &'a RegionPlan,
        mapper: &'a ResolutionMapper,
        block_tokens: usize,
    ) -> Self {
        Self::new(&plan.layout, mapper, plan.base_blocks(), block_tokens)
    }

    /// Replace one attention call on `x` with its regional composite
    pub fn composite<A: Attend + ?Sized>(
        &self,
        attn: &A,
        x: &Tensor,
        context: &Tensor,
        mask: Option<&Tensor>,
    ) -> Result<Tensor> {
        let (batch, seq, _) = feature_dims(x)?;

        if self.layout.is_single_region() {
            return Ok(attn.attend(x, context, mask)?);
        }

        let dims = self.mapper.checked_grid_for(seq)?;
        let blocks = BlockContext::new(context, mask, self.block_tokens)?;
        let mut cursor = 0;

        let base = if self.base_blocks > 0 {
            let (ctx, m) = blocks.slice(cursor, self.base_blocks)?;
            cursor += self.base_blocks;
            Some(to_grid(&attn.attend(x, &ctx, m.as_ref())?, dims)?)
        } else {
            None
        };

        let rects = self.layout.pixel_rects(dims.height, dims.width);
        let mut strips = Vec::with_capacity(self.layout.rows.len());

        for (r, (row, rects)) in self.layout.rows.iter().zip(&rects).enumerate() {
            let mut cells = Vec::with_capacity(row.cells.len());
            for (c, (cell, rect)) in row.cells.iter().zip(rects).enumerate() {
                let count = cell.blocks();
                blocks.check(cursor, count)?;
                let start = cursor;
                cursor += count;

                if rect.area() == 0 {
                    trace!("Cell ({}, {}) has no pixels at {}x{}", r, c, dims.height, dims.width);
                    continue;
                }
                trace!(
                    "Cell ({}, {}): blocks {}..{}, rows {}..{}, cols {}..{}",
                    r,
                    c,
                    start,
                    cursor,
                    rect.rows.start,
                    rect.rows.end,
                    rect.cols.start,
                    rect.cols.end
                );

                let (ctx, m) = blocks.slice(start, count)?;
                let out = to_grid(&attn.attend(x, &ctx, m.as_ref())?, dims)?;
                let mut out = crop(&out, *rect)?;
                if let Some(base) = &base {
                    out = blend(&out, &crop(base, *rect)?, cell.base_weight)?;
                }
                cells.push(out);
            }
            if !cells.is_empty() {
                strips.push(Tensor::cat(&cells, 2)?);
            }
        }

        if strips.is_empty() {
            return Err(RegionError::NoRegions.into());
        }
        let grid = Tensor::cat(&strips, 1)?;
        let channels = grid.dim(3)?;
        Ok(grid.reshape((batch, seq, channels))?)
    }
}

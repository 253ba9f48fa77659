//! Tensor helpers for cropping, blending and context slicing

use crate::{AttentionError, Result};
use candle_core::Tensor;
use regional_core::{GridDims, PixelRect, Span};

/// Validate a `[batch, seq, channels]` feature map
pub fn feature_dims(x: &Tensor) -> Result<(usize, usize, usize)> {
    x.dims3().map_err(|_| AttentionError::ShapeMismatch {
        expected: "[batch, seq, channels]",
        actual: x.dims().to_vec(),
    })
}

/// Number of whole context blocks in a `[batch, tokens, dim]` context
pub fn context_blocks(context: &Tensor, block_tokens: usize) -> Result<usize> {
    let (_, tokens, _) = context.dims3().map_err(|_| AttentionError::ShapeMismatch {
        expected: "[batch, tokens, dim]",
        actual: context.dims().to_vec(),
    })?;
    if block_tokens == 0 || tokens % block_tokens != 0 {
        return Err(AttentionError::ShapeMismatch {
            expected: "context length divisible by the block size",
            actual: context.dims().to_vec(),
        });
    }
    Ok(tokens / block_tokens)
}

/// Packed context addressed in fixed-size token blocks
#[derive(Debug, Clone, Copy)]
pub struct BlockContext<'a> {
    context: &'a Tensor,
    mask: Option<&'a Tensor>,
    block_tokens: usize,
    available: usize,
}

impl<'a> BlockContext<'a> {
    /// Wrap a context and its optional key mask
    pub fn new(context: &'a Tensor, mask: Option<&'a Tensor>, block_tokens: usize) -> Result<Self> {
        Ok(Self {
            context,
            mask,
            block_tokens,
            available: context_blocks(context, block_tokens)?,
        })
    }

    /// Blocks held by the context
    pub fn available(&self) -> usize {
        self.available
    }

    /// Fail unless blocks `[start, start + count)` exist
    pub fn check(&self, start: usize, count: usize) -> Result<()> {
        let needed = start + count;
        if needed > self.available {
            return Err(AttentionError::ContextExhausted {
                needed,
                available: self.available,
            });
        }
        Ok(())
    }

    /// Context and mask restricted to blocks `[start, start + count)`
    ///
    /// The mask is narrowed along its last (token) axis.
    pub fn slice(&self, start: usize, count: usize) -> Result<(Tensor, Option<Tensor>)> {
        self.check(start, count)?;
        let offset = start * self.block_tokens;
        let len = count * self.block_tokens;
        let context = self.context.narrow(1, offset, len)?;
        let mask = match self.mask {
            Some(mask) => {
                let last = mask.rank().saturating_sub(1);
                Some(mask.narrow(last, offset, len)?)
            }
            None => None,
        };
        Ok((context, mask))
    }
}

/// View a flat `[batch, seq, c]` output as `[batch, height, width, c]`
pub fn to_grid(out: &Tensor, dims: GridDims) -> Result<Tensor> {
    let (batch, seq, channels) = feature_dims(out)?;
    if seq != dims.area() {
        return Err(AttentionError::ShapeMismatch {
            expected: "attention output covering the feature grid",
            actual: out.dims().to_vec(),
        });
    }
    Ok(out.reshape((batch, dims.height, dims.width, channels))?)
}

/// Crop a `[batch, height, width, c]` grid to `rect`
pub fn crop(grid: &Tensor, rect: PixelRect) -> Result<Tensor> {
    Ok(grid
        .narrow(1, rect.rows.start, rect.rows.len())?
        .narrow(2, rect.cols.start, rect.cols.len())?)
}

/// Crop `dim` of `t` to `span`
pub fn crop_span(t: &Tensor, dim: usize, span: Span) -> Result<Tensor> {
    Ok(t.narrow(dim, span.start, span.len())?)
}

/// `out * (1 - weight) + base * weight`
///
/// Weights of zero and one return an operand unchanged.
pub fn blend(out: &Tensor, base: &Tensor, weight: f64) -> Result<Tensor> {
    if weight <= 0.0 {
        return Ok(out.clone());
    }
    if weight >= 1.0 {
        return Ok(base.clone());
    }
    let mixed = out.affine(1.0 - weight, 0.0)?.add(&base.affine(weight, 0.0)?)?;
    Ok(mixed)
}

//! The attention primitive the compositor drives

use candle_core::{Tensor, D};

/// One cross-attention evaluation
///
/// `x` is `[batch, seq, channels]`, `context` is `[batch, tokens, dim]` and
/// the result is `[batch, seq, channels_out]`. The compositor calls this
/// once per region with a slice of the context.
pub trait Attend {
    fn attend(&self, x: &Tensor, context: &Tensor, mask: Option<&Tensor>)
        -> candle_core::Result<Tensor>;
}

impl<F> Attend for F
where
    F: Fn(&Tensor, &Tensor, Option<&Tensor>) -> candle_core::Result<Tensor>,
{
    fn attend(
        &self,
        x: &Tensor,
        context: &Tensor,
        mask: Option<&Tensor>,
    ) -> candle_core::Result<Tensor> {
        self(x, context, mask)
    }
}

/// Single-head scaled dot-product attention without projections
///
/// Queries are `x`, keys and values are `context`; both must share their
/// last dimension. A mask of `[batch, tokens]` or `[batch, seq, tokens]`
/// keeps positions where it is non-zero.
#[derive(Debug, Clone, Copy, Default)]
pub struct ScaledDotProduct;

impl Attend for ScaledDotProduct {
    fn attend(
        &self,
        x: &Tensor,
        context: &Tensor,
        mask: Option<&Tensor>,
    ) -> candle_core::Result<Tensor> {
        let scale = 1.0 / (x.dim(D::Minus1)? as f64).sqrt();
        let keys = context.t()?.contiguous()?;
        let scores = x.matmul(&keys)?.affine(scale, 0.0)?;

        let scores = match mask {
            Some(mask) => {
                let mask = if mask.rank() == 2 {
                    mask.unsqueeze(1)?
                } else {
                    mask.clone()
                };
                let mask = mask.broadcast_as(scores.shape())?;
                let masked = Tensor::full(f32::NEG_INFINITY, scores.shape(), scores.device())?
                    .to_dtype(scores.dtype())?;
                mask.where_cond(&scores, &masked)?
            }
            None => scores,
        };

        let weights = candle_nn::ops::softmax(&scores, D::Minus1)?;
        weights.matmul(context)
    }
}

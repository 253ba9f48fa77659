//! Mapping flattened feature maps back onto 2-D grids
//!
//! A UNet attention layer sees the latent at some integer downsampling of the
//! requested image size. The layer only reports its flattened length, so the
//! grid is recovered from the nominal size: `scale = round(sqrt(H*W/N))`,
//! then each side is divided by `scale` rounding halves up.

use crate::{RegionError, Result};
use serde::{Deserialize, Serialize};

/// Divide rounding halves up
///
/// Generated grid sizes on exact half boundaries round upward (680x488 on
/// its second downsampling gives 43x31). The remainder is compared against
/// the exact half, so odd divisors round to nearest and a divisor of 1 is
/// exact division.
pub fn round_dim(x: usize, y: usize) -> usize {
    if y == 0 {
        return 0;
    }
    x / y + usize::from(2 * (x % y) >= y)
}

fn is_power_of_two(n: usize) -> bool {
    n != 0 && n & (n - 1) == 0
}

/// Grid dimensions of one layer's feature map
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct GridDims {
    pub height: usize,
    pub width: usize,
}

impl GridDims {
    /// Number of positions in the grid
    pub fn area(&self) -> usize {
        self.height * self.width
    }
}

/// Second, upscaled sampling pass
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct HiresPass {
    /// Upscale factor used when no explicit size is given
    pub scale: f64,
    /// Explicit target width (0 when unset)
    pub resize_x: usize,
    /// Explicit target height (0 when unset)
    pub resize_y: usize,
}

impl HiresPass {
    /// Target `(width, height)` for a first pass of `width` x `height`
    ///
    /// An explicit size wins when it exceeds the first pass size, otherwise
    /// the first pass size is scaled.
    pub fn target(&self, width: usize, height: usize) -> (usize, usize) {
        let w = if self.resize_x > width {
            self.resize_x
        } else {
            (width as f64 * self.scale) as usize
        };
        let h = if self.resize_y > height {
            self.resize_y
        } else {
            (height as f64 * self.scale) as usize
        };
        (w, h)
    }
}

/// Recovers grid dimensions for each attention call
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ResolutionMapper {
    width: usize,
    height: usize,
    hires: Option<(usize, usize)>,
}

impl ResolutionMapper {
    /// Mapper for a `width` x `height` generation
    pub fn new(width: usize, height: usize) -> Self {
        Self {
            width,
            height,
            hires: None,
        }
    }

    /// Add the target size of a second pass
    pub fn with_hires(mut self, width: usize, height: usize) -> Self {
        self.hires = Some((width, height));
        self
    }

    /// Nominal `(height, width)` of the pass a feature map of `seq_len`
    /// belongs to
    ///
    /// First-pass layers always sit at a power-of-two area ratio; anything
    /// else belongs to the second pass.
    pub fn target_for(&self, seq_len: usize) -> (usize, usize) {
        match self.hires {
            Some((w, h)) if !is_power_of_two(self.height * self.width / seq_len.max(1)) => (h, w),
            _ => (self.height, self.width),
        }
    }

    /// Grid dimensions for a feature map of `seq_len` positions
    pub fn grid_for(&self, seq_len: usize) -> Result<GridDims> {
        if seq_len == 0 {
            return Err(RegionError::GridMismatch {
                height: 0,
                width: 0,
                seq_len,
            });
        }
        let (height, width) = self.target_for(seq_len);
        let scale = ((height * width) as f64 / seq_len as f64)
            .sqrt()
            .round()
            .max(1.0) as usize;

        Ok(GridDims {
            height: round_dim(height, scale),
            width: round_dim(width, scale),
        })
    }

    /// [`grid_for`](Self::grid_for), failing unless the grid covers exactly
    /// `seq_len` positions
    pub fn checked_grid_for(&self, seq_len: usize) -> Result<GridDims> {
        let dims = self.grid_for(seq_len)?;
        if dims.area() != seq_len {
            return Err(RegionError::GridMismatch {
                height: dims.height,
                width: dims.width,
                seq_len,
            });
        }
        Ok(dims)
    }
}

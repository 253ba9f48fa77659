//! Region layout: fractional partitions and their pixel mapping
//!
//! Ratios become cut points in three steps: `percentify` (weights to
//! fractions of the row), `cumsum` (fractions to cut points) and `rangify`
//! (cut points to `[start, end)` pairs starting at zero). The resulting
//! [`Layout`] is resolution independent; [`Layout::pixel_rects`] maps it onto
//! a concrete grid.

use crate::ratio::{
    broadcast, broadcast_with_row_weights, parse_float, shape_of, split_row_weights, Grid,
    Position, RatioParser,
};
use crate::{RegionConfig, RegionError, Result};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// How a layer's feature map is divided
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum DivideMode {
    /// Side-by-side columns across the width
    Horizontal,
    /// Stacked bands along the flattened sequence
    Vertical,
    /// Rows of cells, each row with its own columns
    Matrix,
}

impl DivideMode {
    /// Whether the mode partitions a single axis
    pub fn is_one_dimensional(&self) -> bool {
        !matches!(self, DivideMode::Matrix)
    }

    /// Name as written in presets
    pub fn as_str(&self) -> &'static str {
        match self {
            DivideMode::Horizontal => "Horizontal",
            DivideMode::Vertical => "Vertical",
            DivideMode::Matrix => "Matrix",
        }
    }
}

impl fmt::Display for DivideMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for DivideMode {
    type Err = RegionError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "horizontal" => Ok(DivideMode::Horizontal),
            "vertical" => Ok(DivideMode::Vertical),
            "matrix" => Ok(DivideMode::Matrix),
            other => Err(RegionError::Config(format!("Unknown divide mode: {}", other))),
        }
    }
}

/// Half-open fractional range within [0, 1]
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct FracRange {
    pub start: f64,
    pub end: f64,
}

/// Divide every value by the sum of all values
pub fn percentify(values: &[f64]) -> Option<Vec<f64>> {
    let sum: f64 = values.iter().sum();
    if sum <= 0.0 || !sum.is_finite() {
        return None;
    }
    Some(values.iter().map(|v| v / sum).collect())
}

/// Running sum, in place
pub fn cumsum(values: &mut [f64]) {
    for i in 1..values.len() {
        values[i] += values[i - 1];
    }
}

/// Pair consecutive cut points into ranges, starting from zero
pub fn rangify(cuts: &[f64]) -> Vec<FracRange> {
    std::iter::once(0.0)
        .chain(cuts.iter().copied())
        .zip(cuts.iter().copied())
        .map(|(start, end)| FracRange { start, end })
        .collect()
}

/// Apply percentify, cumsum and rangify to one list of weights
pub fn fractional_ranges(weights: &[f64]) -> Option<Vec<FracRange>> {
    let mut fractions = percentify(weights)?;
    cumsum(&mut fractions);
    Some(rangify(&fractions))
}

/// One region within a row
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RegionCell {
    /// Fractional start within the row
    pub start: f64,
    /// Fractional end within the row
    pub end: f64,
    /// Blend factor against the base output
    pub base_weight: f64,
    /// Unrelated breaks inside this region's prompt
    pub break_count: usize,
}

impl RegionCell {
    /// Context blocks this cell consumes
    pub fn blocks(&self) -> usize {
        1 + self.break_count
    }
}

/// One row of regions
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RegionRow {
    /// Fractional start within the layer height
    pub start: f64,
    /// Fractional end within the layer height
    pub end: f64,
    /// Cells left to right
    pub cells: Vec<RegionCell>,
}

/// Half-open pixel interval along one axis
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Span {
    pub start: usize,
    pub end: usize,
}

impl Span {
    /// Number of pixels covered
    pub fn len(&self) -> usize {
        self.end - self.start
    }

    /// Whether the span covers no pixels
    pub fn is_empty(&self) -> bool {
        self.end == self.start
    }
}

/// Pixel rectangle on a downsampled grid
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct PixelRect {
    /// Vertical extent
    pub rows: Span,
    /// Horizontal extent
    pub cols: Span,
}

impl PixelRect {
    /// Pixel count
    pub fn area(&self) -> usize {
        self.rows.len() * self.cols.len()
    }
}

/// Map fractional range ends onto `extent` pixels with trailing-edge
/// correction
///
/// Each span starts where the previous one stopped. Ends are truncated,
/// except the trailing end which snaps to `extent`.
pub fn partition_extent(
    ends: impl IntoIterator<Item = f64>,
    extent: usize,
    edge_tolerance: f64,
) -> Vec<Span> {
    let mut cursor = 0usize;
    ends.into_iter()
        .map(|end| {
            let stop = if end >= 1.0 - edge_tolerance {
                extent
            } else {
                ((extent as f64 * end) as usize).clamp(cursor, extent)
            };
            let span = Span {
                start: cursor,
                end: stop,
            };
            cursor = stop;
            span
        })
        .collect()
}

/// Resolution-independent partition of a feature map
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Layout {
    /// Divide mode selected at planning time
    pub mode: DivideMode,
    /// Rows top to bottom; one-dimensional layouts hold a single row
    pub rows: Vec<RegionRow>,
    /// Tolerance for trailing-edge detection
    pub edge_tolerance: f64,
}

impl Layout {
    /// Total number of regions
    pub fn region_count(&self) -> usize {
        self.rows.iter().map(|r| r.cells.len()).sum()
    }

    /// Whether the layout degenerates to plain attention
    pub fn is_single_region(&self) -> bool {
        self.region_count() <= 1
    }

    /// Segments of a one-dimensional layout
    pub fn segments(&self) -> &[RegionCell] {
        self.rows.first().map(|r| r.cells.as_slice()).unwrap_or(&[])
    }

    /// All cells in row-major order
    pub fn cells(&self) -> impl Iterator<Item = &RegionCell> {
        self.rows.iter().flat_map(|r| r.cells.iter())
    }

    /// Context blocks consumed by all regions
    pub fn total_blocks(&self) -> usize {
        self.cells().map(RegionCell::blocks).sum()
    }

    /// Pixel rectangles of every cell on a `height` x `width` grid
    pub fn pixel_rects(&self, height: usize, width: usize) -> Vec<Vec<PixelRect>> {
        let row_spans =
            partition_extent(self.rows.iter().map(|r| r.end), height, self.edge_tolerance);
        self.rows
            .iter()
            .zip(row_spans)
            .map(|(row, rows)| {
                partition_extent(row.cells.iter().map(|c| c.end), width, self.edge_tolerance)
                    .into_iter()
                    .map(|cols| PixelRect { rows, cols })
                    .collect()
            })
            .collect()
    }

    /// Spans of the one-dimensional segments along an axis of `extent`
    pub fn segment_spans(&self, extent: usize) -> Vec<Span> {
        partition_extent(
            self.segments().iter().map(|c| c.end),
            extent,
            self.edge_tolerance,
        )
    }
}

/// Builds [`Layout`]s from ratio text
#[derive(Debug, Clone)]
pub struct LayoutBuilder {
    parser: RatioParser,
    edge_tolerance: f64,
}

impl LayoutBuilder {
    /// Create a builder using the configured delimiters
    pub fn new(config: &RegionConfig) -> Self {
        Self {
            parser: RatioParser::new(config.delimiters),
            edge_tolerance: config.edge_tolerance,
        }
    }

    /// Build a matrix layout
    ///
    /// The first ratio of each row is the row's height weight, the rest are
    /// its column weights. With `breaks`, ratios and base weights are
    /// broadcast onto its shape; without, the ratio text defines the shape
    /// and every cell has zero breaks.
    pub fn matrix(
        &self,
        ratios: &str,
        base_ratios: &str,
        breaks: Option<&Grid<usize>>,
    ) -> Result<Layout> {
        let raw = self.parser.parse(ratios, parse_float)?;
        let (weighted, breaks) = match breaks {
            Some(breaks) => (
                broadcast_with_row_weights(raw, &shape_of(breaks))?,
                breaks.clone(),
            ),
            None => {
                let weighted = split_row_weights(raw);
                let zeros = weighted.cells.iter().map(|r| vec![0; r.len()]).collect();
                (weighted, zeros)
            }
        };
        let shape = shape_of(&breaks);
        if shape.is_empty() || shape.iter().all(|&w| w == 0) {
            return Err(RegionError::NoRegions);
        }
        let base = self.base_weights(base_ratios, &shape)?;

        let row_ranges =
            fractional_ranges(&weighted.rows).ok_or(RegionError::ZeroRowWeights)?;

        let rows = row_ranges
            .into_iter()
            .enumerate()
            .map(|(r, range)| {
                let cell_ranges = fractional_ranges(&weighted.cells[r])
                    .ok_or(RegionError::ZeroWeightSum { row: r })?;
                let cells = cell_ranges
                    .into_iter()
                    .zip(&base[r])
                    .zip(&breaks[r])
                    .map(|((c, &base_weight), &break_count)| RegionCell {
                        start: c.start,
                        end: c.end,
                        base_weight,
                        break_count,
                    })
                    .collect();
                Ok(RegionRow {
                    start: range.start,
                    end: range.end,
                    cells,
                })
            })
            .collect::<Result<Vec<_>>>()?;

        Ok(Layout {
            mode: DivideMode::Matrix,
            rows,
            edge_tolerance: self.edge_tolerance,
        })
    }

    /// Build a one-dimensional layout from a flat ratio list
    pub fn segments(&self, mode: DivideMode, ratios: &str, base_ratios: &str) -> Result<Layout> {
        if !mode.is_one_dimensional() {
            return Err(RegionError::Config(
                "Segment layouts need a one-dimensional mode".into(),
            ));
        }
        let weights: Vec<f64> = self
            .parser
            .parse(ratios, parse_float)?
            .into_iter()
            .flatten()
            .collect();
        let ranges = fractional_ranges(&weights).ok_or(RegionError::ZeroWeightSum { row: 0 })?;
        let base = self.base_weights(base_ratios, &[ranges.len()])?;

        let cells = ranges
            .into_iter()
            .zip(&base[0])
            .map(|(c, &base_weight)| RegionCell {
                start: c.start,
                end: c.end,
                base_weight,
                break_count: 0,
            })
            .collect();

        Ok(Layout {
            mode,
            rows: vec![RegionRow {
                start: 0.0,
                end: 1.0,
                cells,
            }],
            edge_tolerance: self.edge_tolerance,
        })
    }

    /// Per-cell base weights broadcast onto `shape`; blank text means zero
    fn base_weights(&self, text: &str, shape: &[usize]) -> Result<Grid<f64>> {
        if text.trim().is_empty() {
            return Ok(shape.iter().map(|&w| vec![0.0; w]).collect());
        }
        let raw = self.parser.parse(text, parse_weight)?;
        broadcast(raw, shape)
    }
}

/// Parse a blend weight in [0, 1]
fn parse_weight(token: &str, pos: Position) -> Result<f64> {
    let value = parse_float(token, pos)?;
    if value > 1.0 {
        return Err(RegionError::invalid_ratio(
            pos.row,
            pos.col,
            token,
            "base weight must not exceed 1",
        ));
    }
    Ok(value)
}

//! Ratio text parsing and broadcasting
//!
//! Ratio text is a two-level list: rows separated by one delimiter, cells
//! within a row by another (`"1,2;1,1,1"`). The same splitter reads prompt
//! text on the row/column keywords, which gives the reference structure that
//! ratio lists are broadcast onto.

use crate::{Delimiters, RegionError, Result};

/// Row-major nested list, rows may differ in length
pub type Grid<T> = Vec<Vec<T>>;

/// Location of a token inside the text being parsed
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Position {
    /// Row index
    pub row: usize,
    /// Cell index within the row
    pub col: usize,
}

/// Grid whose first value per row was split off as the row's own weight
#[derive(Debug, Clone, PartialEq)]
pub struct RowWeighted<T> {
    /// One weight per row
    pub rows: Vec<T>,
    /// Cell weights per row
    pub cells: Grid<T>,
}

/// Splits delimited text into a [`Grid`]
#[derive(Debug, Clone)]
pub struct RatioParser {
    row: String,
    col: String,
}

impl RatioParser {
    /// Parser for ratio text
    pub fn new(delimiters: Delimiters) -> Self {
        Self {
            row: delimiters.row.to_string(),
            col: delimiters.col.to_string(),
        }
    }

    /// Parser splitting on arbitrary separators, such as prompt keywords
    pub fn with_separators(row: impl Into<String>, col: impl Into<String>) -> Self {
        Self {
            row: row.into(),
            col: col.into(),
        }
    }

    /// Split text into rows and cells, mapping every trimmed token
    pub fn parse<T, F>(&self, text: &str, mut map: F) -> Result<Grid<T>>
    where
        F: FnMut(&str, Position) -> Result<T>,
    {
        text.split(self.row.as_str())
            .enumerate()
            .map(|(row, line)| {
                line.split(self.col.as_str())
                    .enumerate()
                    .map(|(col, token)| map(token.trim(), Position { row, col }))
                    .collect::<Result<Vec<T>>>()
            })
            .collect()
    }
}

/// Split the first value of each row off as its row weight
///
/// A row with a single value uses it both as row weight and as its only cell.
pub fn split_row_weights<T: Clone>(grid: Grid<T>) -> RowWeighted<T> {
    let rows = grid.iter().filter_map(|r| r.first().cloned()).collect();
    let cells = grid
        .into_iter()
        .map(|mut r| if r.len() > 1 { r.split_off(1) } else { r })
        .collect();
    RowWeighted { rows, cells }
}

/// Row lengths of a grid
pub fn shape_of<T>(grid: &Grid<T>) -> Vec<usize> {
    grid.iter().map(Vec::len).collect()
}

/// Drape `input` onto the row lengths in `shape`
///
/// Rows are matched in order. A short row repeats its last value, a long row
/// spills its remainder into the next reference row, values beyond the
/// reference are dropped, and missing rows repeat the last value seen.
pub fn broadcast<T: Clone>(input: Grid<T>, shape: &[usize]) -> Result<Grid<T>> {
    broadcast_impl(input, shape, false).map(|w| w.cells)
}

/// [`broadcast`] while splitting off a row weight at the start of every
/// reference row
///
/// Spilled values start the next reference row, so their first value
/// becomes that row's weight. Missing row weights repeat the last one.
pub fn broadcast_with_row_weights<T: Clone>(
    input: Grid<T>,
    shape: &[usize],
) -> Result<RowWeighted<T>> {
    broadcast_impl(input, shape, true)
}

fn broadcast_impl<T: Clone>(
    input: Grid<T>,
    shape: &[usize],
    row_weights: bool,
) -> Result<RowWeighted<T>> {
    if shape.is_empty() {
        return Ok(RowWeighted {
            rows: Vec::new(),
            cells: Vec::new(),
        });
    }

    let last = input
        .iter()
        .rev()
        .find_map(|r| r.last())
        .cloned()
        .ok_or(RegionError::EmptyRatios {
            expected_rows: shape.len(),
        })?;

    let mut rows = Vec::with_capacity(shape.len());
    let mut cells: Grid<T> = Vec::with_capacity(shape.len());

    'input: for row in &input {
        let mut rest: &[T] = row;
        while let Some(first) = rest.first() {
            let Some(&width) = shape.get(cells.len()) else {
                break 'input;
            };
            if row_weights {
                rows.push(first.clone());
                if rest.len() > 1 {
                    rest = &rest[1..];
                }
            }
            if rest.len() <= width {
                let mut filled = rest.to_vec();
                if let Some(pad) = rest.last() {
                    filled.resize(width, pad.clone());
                }
                cells.push(filled);
                break;
            }
            cells.push(rest[..width].to_vec());
            rest = &rest[width..];
        }
    }

    while cells.len() < shape.len() {
        cells.push(vec![last.clone(); shape[cells.len()]]);
    }
    if row_weights {
        let pad = rows.last().cloned().unwrap_or(last);
        rows.resize(shape.len(), pad);
    }

    Ok(RowWeighted { rows, cells })
}

/// Parse a non-negative finite float
pub fn parse_float(token: &str, pos: Position) -> Result<f64> {
    let value: f64 = token
        .parse()
        .map_err(|e: std::num::ParseFloatError| {
            RegionError::invalid_ratio(pos.row, pos.col, token, e.to_string())
        })?;
    if !value.is_finite() || value < 0.0 {
        return Err(RegionError::invalid_ratio(
            pos.row,
            pos.col,
            token,
            "must be a finite non-negative number",
        ));
    }
    Ok(value)
}

/// Mapper counting occurrences of `keyword` in each token
pub fn count_keyword(keyword: &str) -> impl Fn(&str, Position) -> Result<usize> + '_ {
    move |token: &str, _: Position| Ok(token.matches(keyword).count())
}
